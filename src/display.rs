//! Terminal column formatting for the listing commands.

const DEFAULT_WIDTH: usize = 80;
const GAP: usize = 2;

/// Best-effort terminal width; honors COLUMNS, else a sensible default.
pub fn terminal_width() -> usize {
    std::env::var("COLUMNS")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(DEFAULT_WIDTH)
}

/// Render lines in as many columns as fit, column-major like `ls`.
pub fn format_columns(lines: &[String], width: usize) -> Vec<String> {
    if lines.is_empty() {
        return Vec::new();
    }
    let max_len = lines.iter().map(|l| l.len()).max().unwrap_or(1).max(1);
    let ncols = ((width + GAP) / (max_len + GAP)).max(1);
    let nrows = lines.len().div_ceil(ncols);
    let mut rows = Vec::with_capacity(nrows);
    for i in 0..nrows {
        let mut row = String::new();
        for j in 0..ncols {
            let k = j * nrows + i;
            if k < lines.len() {
                if j > 0 {
                    row.push_str(&" ".repeat(GAP));
                }
                row.push_str(&format!("{:<max_len$}", lines[k]));
            }
        }
        rows.push(row.trim_end().to_string());
    }
    rows
}

pub fn print_columns(lines: &[String], width: usize) {
    for row in format_columns(lines, width) {
        println!("{row}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lines(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_empty_input_renders_nothing() {
        assert!(format_columns(&[], 80).is_empty());
    }

    #[test]
    fn test_single_column_when_lines_are_wide() {
        let rows = format_columns(&lines(&["aaaaaaaaaa", "bbbbbbbbbb"]), 12);
        assert_eq!(rows, vec!["aaaaaaaaaa", "bbbbbbbbbb"]);
    }

    #[test]
    fn test_column_major_order() {
        // Width 10 with 3-char entries fits two columns; four entries give
        // two rows, filled down the first column first.
        let rows = format_columns(&lines(&["aaa", "bbb", "ccc", "ddd"]), 10);
        assert_eq!(rows, vec!["aaa  ccc", "bbb  ddd"]);
    }

    #[test]
    fn test_width_env_fallback() {
        assert!(terminal_width() >= 1);
    }
}
