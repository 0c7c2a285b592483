//! High-level Slurm operations: the fixed remote command set, job lifecycle
//! helpers, and the render-with-fallback pipeline.

use thiserror::Error;

use crate::ssh::{CommandOutput, Console, DecodeError, SshError};
use crate::style::{render, StyleContext, StyledDocument};
use crate::table::{ParseError, Table};

/// Column carrying job identifiers in `squeue` output
const JOB_ID_COLUMN: &str = "JOBID";

/// The fixed set of remote commands the console issues.
///
/// Nothing outside this set is ever executed on the console's own
/// initiative; [`SlurmCommand::Raw`] carries operator-typed text only.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SlurmCommand {
    /// Full queue listing (`squeue`)
    Queue,
    /// Queue listing for one user (`squeue -u`)
    QueueForUser(String),
    /// Node and partition status (`sinfo`)
    NodeStatus,
    /// Scheduler diagnostics (`sdiag`)
    Diagnostics,
    /// Cancel a job by identifier (`scancel`)
    Cancel(String),
    /// Operator-typed passthrough, sent as-is
    Raw(String),
}

impl SlurmCommand {
    /// The shell command line sent to the login node.
    ///
    /// Arguments are interpolated without quoting or escaping: the operator
    /// already has shell access to the target, so the command line is theirs
    /// to own.
    #[must_use]
    pub fn shell(&self) -> String {
        match self {
            Self::Queue => "squeue".to_string(),
            Self::QueueForUser(user) => format!("squeue -u {user}"),
            Self::NodeStatus => "sinfo".to_string(),
            Self::Diagnostics => "sdiag".to_string(),
            Self::Cancel(job_id) => format!("scancel {job_id}"),
            Self::Raw(text) => text.clone(),
        }
    }
}

/// Error type for operations that need decoded, parseable output
#[derive(Debug, Error)]
pub enum OpsError {
    #[error(transparent)]
    Ssh(#[from] SshError),
    #[error(transparent)]
    Decode(#[from] DecodeError),
    #[error(transparent)]
    Parse(#[from] ParseError),
}

/// Run the queue listing and parse it.
///
/// # Errors
/// Transport failures, undecodable stdout, or empty output.
pub async fn list_jobs(console: &mut Console) -> Result<Table, OpsError> {
    run_table(console, &SlurmCommand::Queue).await
}

/// Run the queue listing filtered to one user and parse it.
pub async fn list_jobs_for_user(console: &mut Console, username: &str) -> Result<Table, OpsError> {
    run_table(console, &SlurmCommand::QueueForUser(username.to_string())).await
}

async fn run_table(console: &mut Console, command: &SlurmCommand) -> Result<Table, OpsError> {
    let output = console.execute(&command.shell()).await?;
    let stdout = output.stdout?;
    Ok(Table::parse(&stdout)?)
}

/// Job identifiers from the JOBID column, in row order.
///
/// Rows too short to reach the column are skipped rather than failing: a
/// ragged queue line is the scheduler's formatting problem, not a reason to
/// lose the rest of the jobs.
///
/// # Errors
/// [`ParseError::MissingColumn`] when the table has no JOBID column.
pub fn extract_job_ids(table: &Table) -> Result<Vec<String>, ParseError> {
    let idx = table.require_column(JOB_ID_COLUMN)?;
    Ok(table
        .rows()
        .iter()
        .filter_map(|row| row.get(idx).cloned())
        .collect())
}

/// Result of a cancellation request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CancelOutcome {
    /// scancel produced no error output
    Cancelled,
    /// scancel wrote to stderr; the message is surfaced verbatim
    Rejected(String),
}

impl CancelOutcome {
    /// Classify a finished scancel run.
    ///
    /// An empty (after trimming) stderr is the sole success signal: scancel
    /// stays quiet on success and reports every refusal on stderr, and the
    /// exec channel is read for streams only, not exit status.
    #[must_use]
    pub fn from_output(output: &CommandOutput) -> Self {
        match &output.stderr {
            Ok(text) if text.trim().is_empty() => Self::Cancelled,
            Ok(text) => Self::Rejected(text.trim().to_string()),
            Err(e) => Self::Rejected(e.to_string()),
        }
    }
}

/// Cancel a job by identifier.
///
/// # Errors
/// Transport failures only; a remote refusal is a [`CancelOutcome::Rejected`]
/// value, not an error.
pub async fn cancel_job(console: &mut Console, job_id: &str) -> Result<CancelOutcome, SshError> {
    let command = SlurmCommand::Cancel(job_id.to_string());
    let output = console.execute(&command.shell()).await?;
    Ok(CancelOutcome::from_output(&output))
}

/// A rendered command result: a styled table when the output parses, the
/// raw text verbatim when it does not.
///
/// Falling back instead of failing is required behavior here: whatever the
/// command printed, the operator must see something.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandView {
    Table(StyledDocument),
    Raw(String),
}

/// Execute a command and render its output with the raw-text fallback.
///
/// # Errors
/// Transport failures only; parse and decode problems degrade to
/// [`CommandView::Raw`].
pub async fn run_view(
    console: &mut Console,
    command: &SlurmCommand,
) -> Result<CommandView, SshError> {
    let output = console.execute(&command.shell()).await?;
    let username = console.username().unwrap_or_default().to_string();
    Ok(view_output(&output, &username))
}

/// Pure rendering half of [`run_view`], split out for testing.
#[must_use]
pub fn view_output(output: &CommandOutput, username: &str) -> CommandView {
    let text = match &output.stdout {
        Ok(text) => text.clone(),
        // undecodable stdout: show what we got, lossily, rather than nothing
        Err(e) => return CommandView::Raw(String::from_utf8_lossy(e.as_bytes()).into_owned()),
    };

    match Table::parse(&text) {
        Ok(table) if !table.columns().is_empty() => {
            let ctx = StyleContext {
                username: username.to_string(),
            };
            CommandView::Table(render(&table, &ctx))
        }
        _ => {
            // nothing tabular to show; prefer stderr chatter over a blank pane
            if text.trim().is_empty() {
                if let Ok(err_text) = &output.stderr {
                    if !err_text.trim().is_empty() {
                        return CommandView::Raw(err_text.clone());
                    }
                }
            }
            CommandView::Raw(text)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ssh::StreamKind;
    use crate::style::CellStyle;

    fn output(stdout: &str, stderr: &str) -> CommandOutput {
        CommandOutput {
            command: "test".to_string(),
            stdout: Ok(stdout.to_string()),
            stderr: Ok(stderr.to_string()),
        }
    }

    fn undecodable(stream: StreamKind) -> Result<String, crate::ssh::DecodeError> {
        String::from_utf8(vec![0x73, 0x71, 0xff]).map_err(|source| crate::ssh::DecodeError {
            stream,
            source,
        })
    }

    #[test]
    fn test_command_strings() {
        assert_eq!(SlurmCommand::Queue.shell(), "squeue");
        assert_eq!(
            SlurmCommand::QueueForUser("alice".to_string()).shell(),
            "squeue -u alice"
        );
        assert_eq!(SlurmCommand::NodeStatus.shell(), "sinfo");
        assert_eq!(SlurmCommand::Diagnostics.shell(), "sdiag");
        assert_eq!(
            SlurmCommand::Cancel("123".to_string()).shell(),
            "scancel 123"
        );
        assert_eq!(
            SlurmCommand::Raw("squeue --long".to_string()).shell(),
            "squeue --long"
        );
    }

    #[test]
    fn test_extract_job_ids_in_row_order() {
        let table =
            Table::parse("JOBID PARTITION USER\n321 batch alice\n123 gpu bob\n222 batch carol\n")
                .unwrap();
        assert_eq!(extract_job_ids(&table).unwrap(), ["321", "123", "222"]);
    }

    #[test]
    fn test_extract_job_ids_missing_column() {
        let table = Table::parse("NODELIST STATE\nnode01 idle\n").unwrap();
        assert_eq!(
            extract_job_ids(&table),
            Err(ParseError::MissingColumn("JOBID".to_string()))
        );
    }

    #[test]
    fn test_extract_job_ids_skips_short_rows() {
        // JOBID is the last column, so a short row has no value for it
        let table = Table::parse("USER JOBID\nalice 123\nbob\ncarol 456\n").unwrap();
        assert_eq!(extract_job_ids(&table).unwrap(), ["123", "456"]);
    }

    #[test]
    fn test_cancel_outcome_empty_stderr_is_success() {
        assert_eq!(
            CancelOutcome::from_output(&output("", "")),
            CancelOutcome::Cancelled
        );
        assert_eq!(
            CancelOutcome::from_output(&output("", "  \n")),
            CancelOutcome::Cancelled
        );
    }

    #[test]
    fn test_cancel_outcome_stderr_is_rejection() {
        assert_eq!(
            CancelOutcome::from_output(&output("", "Invalid job id specified\n")),
            CancelOutcome::Rejected("Invalid job id specified".to_string())
        );
    }

    #[test]
    fn test_cancel_outcome_undecodable_stderr_is_rejection() {
        let out = CommandOutput {
            command: "scancel 123".to_string(),
            stdout: Ok(String::new()),
            stderr: undecodable(StreamKind::Stderr),
        };
        assert!(matches!(
            CancelOutcome::from_output(&out),
            CancelOutcome::Rejected(_)
        ));
    }

    #[test]
    fn test_view_output_renders_tables() {
        let out = output(
            "JOBID PARTITION NAME USER ST\n123 batch job1 alice R\n",
            "",
        );
        match view_output(&out, "alice") {
            CommandView::Table(doc) => {
                assert_eq!(doc.rows[0][4].style, CellStyle::Running);
                assert_eq!(doc.rows[0][3].style, CellStyle::SelfUser);
            }
            CommandView::Raw(text) => panic!("expected table, got raw: {text}"),
        }
    }

    #[test]
    fn test_view_output_empty_stdout_falls_back_to_stderr() {
        let out = output("", "squeue: error: Invalid user\n");
        assert_eq!(
            view_output(&out, "alice"),
            CommandView::Raw("squeue: error: Invalid user\n".to_string())
        );
    }

    #[test]
    fn test_view_output_undecodable_stdout_is_lossy_raw() {
        let out = CommandOutput {
            command: "squeue".to_string(),
            stdout: undecodable(StreamKind::Stdout),
            stderr: Ok(String::new()),
        };
        match view_output(&out, "alice") {
            CommandView::Raw(text) => assert!(text.starts_with("sq")),
            CommandView::Table(_) => panic!("expected raw fallback"),
        }
    }
}
