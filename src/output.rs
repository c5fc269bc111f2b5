//! Row rendering for the command line

use crate::resource::{FieldValue, ProjectedRow};
use anyhow::Result;
use clap::ValueEnum;
use std::io::Write;

/// Gap between table columns
const COLUMN_GAP: &str = "  ";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    #[default]
    Table,
    Csv,
    Json,
}

/// Render `rows` with header `columns` in `format`
pub fn render<W: Write>(
    out: &mut W,
    format: OutputFormat,
    columns: &[String],
    rows: &[ProjectedRow],
) -> Result<()> {
    match format {
        OutputFormat::Table => render_table(out, columns, rows),
        OutputFormat::Csv => render_csv(out, columns, rows),
        OutputFormat::Json => render_json(out, rows),
    }
}

fn cell_text(row: &ProjectedRow, column: &str) -> String {
    row.get(column).map(FieldValue::render).unwrap_or_default()
}

pub fn render_table<W: Write>(out: &mut W, columns: &[String], rows: &[ProjectedRow]) -> Result<()> {
    if rows.is_empty() {
        writeln!(out, "No results")?;
        return Ok(());
    }

    let cells: Vec<Vec<String>> = rows
        .iter()
        .map(|row| columns.iter().map(|c| cell_text(row, c)).collect())
        .collect();

    let widths: Vec<usize> = columns
        .iter()
        .enumerate()
        .map(|(i, c)| {
            cells
                .iter()
                .map(|r| r[i].chars().count())
                .chain(std::iter::once(c.chars().count()))
                .max()
                .unwrap_or(0)
        })
        .collect();

    write_table_line(out, columns.iter().map(String::as_str), &widths)?;
    for row in &cells {
        write_table_line(out, row.iter().map(String::as_str), &widths)?;
    }
    Ok(())
}

fn write_table_line<'a, W: Write>(
    out: &mut W,
    cells: impl Iterator<Item = &'a str>,
    widths: &[usize],
) -> Result<()> {
    let line = cells
        .zip(widths)
        .map(|(cell, &width)| format!("{:<width$}", cell, width = width))
        .collect::<Vec<_>>()
        .join(COLUMN_GAP);
    writeln!(out, "{}", line.trim_end())?;
    Ok(())
}

/// Quote a CSV field when it holds a delimiter, quote or line break
fn csv_field(value: &str) -> String {
    if value.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

pub fn render_csv<W: Write>(out: &mut W, columns: &[String], rows: &[ProjectedRow]) -> Result<()> {
    let header: Vec<String> = columns.iter().map(|c| csv_field(c)).collect();
    write!(out, "{}\r\n", header.join(","))?;

    for row in rows {
        let line: Vec<String> = columns
            .iter()
            .map(|c| csv_field(&cell_text(row, c)))
            .collect();
        write!(out, "{}\r\n", line.join(","))?;
    }
    Ok(())
}

pub fn render_json<W: Write>(out: &mut W, rows: &[ProjectedRow]) -> Result<()> {
    serde_json::to_writer_pretty(&mut *out, rows)?;
    writeln!(out)?;
    Ok(())
}
