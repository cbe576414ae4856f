//! CSV rendering.
//!
//! UTF-8, comma-delimited, `\n` line endings, no trailing newline. Blocks
//! are separated by one empty line.

use crate::table::{Block, HEADER};

pub fn render(blocks: &[Block]) -> String {
    blocks
        .iter()
        .map(render_block)
        .collect::<Vec<_>>()
        .join("\n\n")
}

fn render_block(block: &Block) -> String {
    let mut lines = Vec::with_capacity(block.rows.len() + 1);
    lines.push(HEADER.map(escape_csv).join(","));
    for row in &block.rows {
        lines.push(format!("{},{}", escape_csv(row.metric), row.value));
    }
    lines.join("\n")
}

fn escape_csv(value: &str) -> String {
    let needs_quotes = value.contains(',') || value.contains('"') || value.contains('\n');
    if needs_quotes {
        let escaped = value.replace('"', "\"\"");
        format!("\"{escaped}\"")
    } else {
        value.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::MetricRow;

    #[test]
    fn test_escape_csv() {
        assert_eq!(escape_csv("Booked"), "Booked");
        assert_eq!(escape_csv("a,b"), "\"a,b\"");
        assert_eq!(escape_csv("say \"hi\""), "\"say \"\"hi\"\"\"");
    }

    #[test]
    fn test_large_values_have_no_separators() {
        let block = Block {
            name: "users",
            title: "Users",
            rows: vec![MetricRow {
                metric: "Total",
                value: 1_234_567,
            }],
        };
        assert_eq!(render(&[block]), "Metric,Value\nTotal,1234567");
    }
}
