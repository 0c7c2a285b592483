//! smon - Remote Slurm monitoring console over SSH

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use dialoguer::theme::ColorfulTheme;
use dialoguer::{Password, Select};
use owo_colors::OwoColorize;
use tracing_subscriber::EnvFilter;

use smon::config::{ConfigError, ConnectionConfig, ConnectionParams, FileConfig};
use smon::display;
use smon::ops::{self, CancelOutcome, SlurmCommand};
use smon::ssh::Console;

#[derive(Parser)]
#[command(name = "smon")]
#[command(about = "Remote Slurm monitoring console over SSH", long_about = None)]
#[command(version)]
struct Cli {
    /// Login node hostname (default: $SSH_HOST or config file)
    #[arg(long, global = true)]
    host: Option<String>,

    /// SSH port (default: $SSH_PORT, config file, or 22)
    #[arg(short, long, global = true)]
    port: Option<u16>,

    /// Username to authenticate as (default: $SSH_USER or config file)
    #[arg(short, long, global = true)]
    login: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show the job queue
    Jobs {
        /// Only your own jobs (squeue -u <session user>)
        #[arg(short, long, conflicts_with = "user")]
        mine: bool,

        /// Only jobs of the given user
        #[arg(short, long)]
        user: Option<String>,
    },

    /// Show node and partition status
    Nodes,

    /// Show scheduler diagnostics
    Diag,

    /// Cancel a job (interactive selection when no job id is given)
    Cancel {
        /// Job ID to cancel
        job_id: Option<String>,
    },

    /// Run an arbitrary command on the login node and render its output
    Run {
        /// Command and arguments, sent as-is
        #[arg(required = true, trailing_var_arg = true, allow_hyphen_values = true)]
        command: Vec<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let file = FileConfig::load().unwrap_or_else(|e| {
        eprintln!("Warning: {e:#}, ignoring config file");
        FileConfig::default()
    });

    let params = ConnectionParams {
        host: cli.host,
        port: cli.port,
        username: cli.login,
        password: None,
        connect_timeout: None,
    }
    .or(ConnectionParams::from_env())
    .or(ConnectionParams::from_file(&file));

    let config = resolve_connection(params)?;

    let mut console = Console::new();
    console
        .connect(&config)
        .await
        .with_context(|| format!("failed to connect to {}:{}", config.host, config.port))?;

    let result = match cli.command {
        Commands::Jobs { mine, user } => handle_jobs(&mut console, mine, user.as_deref()).await,
        Commands::Nodes => handle_view(&mut console, &SlurmCommand::NodeStatus).await,
        Commands::Diag => handle_view(&mut console, &SlurmCommand::Diagnostics).await,
        Commands::Cancel { job_id } => handle_cancel(&mut console, job_id).await,
        Commands::Run { command } => {
            handle_view(&mut console, &SlurmCommand::Raw(command.join(" "))).await
        }
    };

    // close the session before reporting, so errors do not leak it
    console.disconnect().await;

    println!("{}", result?);
    Ok(())
}

/// Complete the connection parameters, prompting for the password when it is
/// the only thing missing.
fn resolve_connection(params: ConnectionParams) -> Result<ConnectionConfig> {
    match params.clone().finish() {
        Ok(config) => Ok(config),
        Err(ConfigError::Missing {
            field: "password", ..
        }) => {
            let prompt = format!(
                "Password for {}@{}",
                params.username.as_deref().unwrap_or(""),
                params.host.as_deref().unwrap_or("")
            );
            let password = Password::with_theme(&ColorfulTheme::default())
                .with_prompt(prompt)
                .interact()
                .context("failed to read password")?;
            let mut params = params;
            params.password = Some(password);
            Ok(params.finish()?)
        }
        Err(e) => Err(e.into()),
    }
}

async fn handle_jobs(console: &mut Console, mine: bool, user: Option<&str>) -> Result<String> {
    let command = if let Some(user) = user {
        SlurmCommand::QueueForUser(user.to_string())
    } else if mine {
        let username = console.username().context("no active session")?.to_string();
        SlurmCommand::QueueForUser(username)
    } else {
        SlurmCommand::Queue
    };

    handle_view(console, &command).await
}

async fn handle_view(console: &mut Console, command: &SlurmCommand) -> Result<String> {
    let view = ops::run_view(console, command).await?;
    Ok(display::format_view(&view))
}

async fn handle_cancel(console: &mut Console, job_id: Option<String>) -> Result<String> {
    let job_id = match job_id {
        Some(id) => id,
        None => match select_job(console).await? {
            Some(id) => id,
            None => return Ok("No jobs found for your user".yellow().to_string()),
        },
    };

    match ops::cancel_job(console, &job_id).await? {
        CancelOutcome::Cancelled => {
            let mut output = format!(
                "{}\n\n",
                format!("Job {job_id} has been cancelled").green()
            );
            // show the queue as it stands now
            let view = ops::run_view(console, &SlurmCommand::Queue).await?;
            output.push_str(&display::format_view(&view));
            Ok(output)
        }
        CancelOutcome::Rejected(message) => anyhow::bail!("scancel: {message}"),
    }
}

/// Offer an interactive pick over the session user's own job ids.
async fn select_job(console: &mut Console) -> Result<Option<String>> {
    let username = console.username().context("no active session")?.to_string();
    let table = ops::list_jobs_for_user(console, &username).await?;
    let job_ids = ops::extract_job_ids(&table)?;
    if job_ids.is_empty() {
        return Ok(None);
    }

    let selection = Select::with_theme(&ColorfulTheme::default())
        .with_prompt("Select the job to cancel")
        .items(&job_ids)
        .default(0)
        .interact()
        .context("selection aborted")?;

    Ok(Some(job_ids[selection].clone()))
}
