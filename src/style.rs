//! Column-aware styling of parsed tables.
//!
//! The rules here decide *what* a cell means (running job, own job, downed
//! node); how that is painted on screen is the display layer's business.
//! Styling is recomputed per render and never fails: malformed tables come
//! out as unstyled cells, not errors.

use crate::table::Table;

/// Width of the USER column in squeue's default output format. Usernames
/// longer than this are truncated in the output, so the self-match compares
/// prefixes rather than whole names.
const USER_DISPLAY_WIDTH: usize = 8;

/// Display style resolved for a single cell
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CellStyle {
    #[default]
    None,
    /// Job state code `R`
    Running,
    /// Job state code `PD`
    Pending,
    /// USER cell belonging to the session's own user
    SelfUser,
    /// Node state `down` / `down*`
    Alert,
}

/// A cell with its resolved style
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StyledCell {
    pub text: String,
    pub style: CellStyle,
}

impl StyledCell {
    fn empty() -> Self {
        Self {
            text: String::new(),
            style: CellStyle::None,
        }
    }
}

/// Presentation-ready table: header plus styled cells. Rows are padded to
/// the column count so short rows show as blanks under their columns.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StyledDocument {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<StyledCell>>,
}

/// Ambient context consulted by the style rules
#[derive(Debug, Clone)]
pub struct StyleContext {
    /// Username of the active session, for the self-highlight rule
    pub username: String,
}

/// Resolve the style for one cell.
///
/// Rules are checked in a fixed priority order and the first match wins, so
/// at most one style ever applies to a cell:
///
/// 1. `ST` column: `PD` is pending, `R` is running
/// 2. `USER` column: the first eight characters of the cell equal the same
///    prefix of the context username
/// 3. `STATE` column: `down` and `down*` are alerts
///
/// Everything else is unstyled.
#[must_use]
pub fn cell_style(column: &str, value: &str, ctx: &StyleContext) -> CellStyle {
    match column {
        "ST" => match value {
            "PD" => CellStyle::Pending,
            "R" => CellStyle::Running,
            _ => CellStyle::None,
        },
        "USER" if user_prefix_matches(value, &ctx.username) => CellStyle::SelfUser,
        "STATE" if value == "down" || value == "down*" => CellStyle::Alert,
        _ => CellStyle::None,
    }
}

/// Compare the first `USER_DISPLAY_WIDTH` characters of both names.
/// Character-based, so multi-byte usernames do not split mid-codepoint.
fn user_prefix_matches(cell: &str, username: &str) -> bool {
    if username.is_empty() {
        return false;
    }
    cell.chars()
        .take(USER_DISPLAY_WIDTH)
        .eq(username.chars().take(USER_DISPLAY_WIDTH))
}

/// Apply the style rules to a parsed table.
///
/// Total over any table shape: short rows are padded with empty unstyled
/// cells, and cells beyond the header's column count are kept unstyled
/// rather than dropped.
#[must_use]
pub fn render(table: &Table, ctx: &StyleContext) -> StyledDocument {
    let columns = table.columns().to_vec();

    let rows = table
        .rows()
        .iter()
        .map(|row| {
            let mut cells: Vec<StyledCell> = row
                .iter()
                .enumerate()
                .map(|(i, value)| StyledCell {
                    text: value.clone(),
                    style: columns
                        .get(i)
                        .map_or(CellStyle::None, |c| cell_style(c, value, ctx)),
                })
                .collect();
            while cells.len() < columns.len() {
                cells.push(StyledCell::empty());
            }
            cells
        })
        .collect();

    StyledDocument { columns, rows }
}
