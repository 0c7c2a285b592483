//! Terminal realization of styled documents.
//!
//! Maps the style engine's output onto ANSI colors and a framed table. This
//! is the only module that knows what a style looks like; everything above
//! it deals in [`CellStyle`] tags.

use owo_colors::OwoColorize;
use tabled::{
    builder::Builder,
    settings::{object::Rows, Alignment, Modify, Style},
};

use crate::ops::CommandView;
use crate::style::{CellStyle, StyledCell, StyledDocument};

/// Paint one cell according to its style tag
fn paint(cell: &StyledCell) -> String {
    match cell.style {
        CellStyle::None => cell.text.clone(),
        CellStyle::Running => cell.text.green().to_string(),
        CellStyle::Pending => cell.text.yellow().to_string(),
        CellStyle::SelfUser => cell.text.bright_blue().italic().to_string(),
        CellStyle::Alert => cell.text.bright_red().to_string(),
    }
}

/// Format a styled document as a framed terminal table
#[must_use]
pub fn format_document(doc: &StyledDocument) -> String {
    let mut builder = Builder::default();
    builder.push_record(doc.columns.iter().map(|c| c.bright_green().bold().to_string()));
    for row in &doc.rows {
        builder.push_record(row.iter().map(paint));
    }

    let mut table = builder.build();
    table
        .with(Style::rounded())
        .with(Modify::new(Rows::first()).with(Alignment::center()));

    table.to_string()
}

/// Format a command view: tabular output gets the framed table, anything
/// that could not be parsed is shown verbatim
#[must_use]
pub fn format_view(view: &CommandView) -> String {
    match view {
        CommandView::Table(doc) => format_document(doc),
        CommandView::Raw(text) => text.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::style::{render, StyleContext};
    use crate::table::Table;

    fn doc(raw: &str) -> StyledDocument {
        let table = Table::parse(raw).unwrap();
        render(
            &table,
            &StyleContext {
                username: "alice".to_string(),
            },
        )
    }

    #[test]
    fn test_format_document_contains_all_cells() {
        let out = format_document(&doc("JOBID NAME\n123 job1\n124 job2\n"));
        for needle in ["JOBID", "NAME", "123", "job1", "124", "job2"] {
            assert!(out.contains(needle), "missing '{needle}' in: {out}");
        }
    }

    #[test]
    fn test_format_document_header_only() {
        let out = format_document(&doc("NODELIST STATE\n"));
        assert!(out.contains("NODELIST"));
    }

    #[test]
    fn test_format_document_ragged_rows_do_not_panic() {
        let out = format_document(&doc("JOBID NAME USER\n123\n124 job2 bob extra\n"));
        assert!(out.contains("123"));
        assert!(out.contains("extra"));
    }

    #[test]
    fn test_format_view_raw_passthrough() {
        let text = "sdiag output at Mon Jan 01\nServer thread count: 3";
        let view = CommandView::Raw(text.to_string());
        assert_eq!(format_view(&view), text);
    }
}
