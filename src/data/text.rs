use std::fs;
use std::io::Write;
use std::path::Path;

use crate::error::{PipelineError, Result};

// ---------------------------------------------------------------------------
// Whitespace-delimited tables
// ---------------------------------------------------------------------------

/// A text table with a header row. Cells are kept as text so that label
/// columns (e.g. progenitor mass) survive untouched.
#[derive(Debug, Clone, PartialEq)]
pub struct TextTable {
    pub header: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl TextTable {
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.header.iter().position(|h| h == name)
    }
}

/// Read a headed, whitespace-delimited table.
pub fn read_table(path: &Path) -> Result<TextTable> {
    let text = fs::read_to_string(path).map_err(|e| PipelineError::io(path, e))?;
    let mut lines = text.lines().enumerate().filter(|(_, l)| !l.trim().is_empty());

    let header: Vec<String> = match lines.next() {
        Some((_, line)) => line.split_whitespace().map(str::to_string).collect(),
        None => {
            return Err(PipelineError::Parse {
                path: path.to_path_buf(),
                line: 1,
                message: "empty table".into(),
            })
        }
    };

    let mut rows = Vec::new();
    for (line_no, line) in lines {
        let row: Vec<String> = line.split_whitespace().map(str::to_string).collect();
        if row.len() != header.len() {
            return Err(PipelineError::Parse {
                path: path.to_path_buf(),
                line: line_no + 1,
                message: format!("{} cells under {} columns", row.len(), header.len()),
            });
        }
        rows.push(row);
    }

    Ok(TextTable { header, rows })
}

/// Read a numeric table with no header, dropping `footer` trailing lines.
pub fn read_numeric_rows(path: &Path, header: usize, footer: usize) -> Result<Vec<Vec<f64>>> {
    let text = fs::read_to_string(path).map_err(|e| PipelineError::io(path, e))?;
    let lines: Vec<(usize, &str)> = text
        .lines()
        .enumerate()
        .skip(header)
        .filter(|(_, l)| !l.trim().is_empty())
        .collect();
    let keep = lines.len().saturating_sub(footer);

    lines[..keep]
        .iter()
        .map(|&(line_no, line)| {
            line.split_whitespace()
                .map(|tok| parse_f64(path, line_no + 1, tok))
                .collect()
        })
        .collect()
}

pub fn parse_f64(path: &Path, line: usize, tok: &str) -> Result<f64> {
    tok.parse::<f64>().map_err(|_| PipelineError::Parse {
        path: path.to_path_buf(),
        line,
        message: format!("'{tok}' is not a number"),
    })
}

/// Write rows under a header, columns left-justified to a common width.
pub fn write_table(path: &Path, header: &[String], rows: &[Vec<String>]) -> Result<()> {
    let mut widths: Vec<usize> = header.iter().map(String::len).collect();
    for row in rows {
        for (w, cell) in widths.iter_mut().zip(row) {
            *w = (*w).max(cell.len());
        }
    }

    let mut out = String::new();
    push_line(&mut out, header, &widths);
    for row in rows {
        push_line(&mut out, row, &widths);
    }
    write_file(path, out.as_bytes())
}

/// Write rows with no header, one space-separated line each.
pub fn write_rows(path: &Path, rows: &[Vec<String>]) -> Result<()> {
    let mut out = String::new();
    for row in rows {
        out.push_str(&row.join(" "));
        out.push('\n');
    }
    write_file(path, out.as_bytes())
}

fn push_line(out: &mut String, cells: &[String], widths: &[usize]) {
    let line: Vec<String> = cells
        .iter()
        .zip(widths)
        .map(|(cell, &w)| format!("{cell:<w$}"))
        .collect();
    out.push_str(line.join("  ").trim_end());
    out.push('\n');
}

fn write_file(path: &Path, bytes: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).map_err(|e| PipelineError::io(parent, e))?;
        }
    }
    let mut file = fs::File::create(path).map_err(|e| PipelineError::io(path, e))?;
    file.write_all(bytes).map_err(|e| PipelineError::io(path, e))
}
