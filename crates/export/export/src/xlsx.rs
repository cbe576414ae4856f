//! Spreadsheet rendering with `rust_xlsxwriter`.

use chrono::{DateTime, Utc};
use dashboard_core::error::{DashboardError, DashboardResult};
use rust_xlsxwriter::{DocProperties, ExcelDateTime, Format, Workbook, XlsxError};

use crate::table::{Block, HEADER};

/// Renders one worksheet per block, named after the block.
///
/// The document creation time is pinned to `at`, so identical inputs give
/// identical bytes.
pub fn render(blocks: &[Block], title: &str, at: DateTime<Utc>) -> DashboardResult<Vec<u8>> {
    build(blocks, title, at).map_err(|e| DashboardError::export("xlsx", e.to_string()))
}

fn build(blocks: &[Block], title: &str, at: DateTime<Utc>) -> Result<Vec<u8>, XlsxError> {
    let mut workbook = Workbook::new();

    let created = ExcelDateTime::from_timestamp(at.timestamp())?;
    let properties = DocProperties::new()
        .set_title(title)
        .set_creation_datetime(&created);
    workbook.set_properties(&properties);

    let header = Format::new().set_bold();
    for block in blocks {
        let sheet = workbook.add_worksheet();
        sheet.set_name(block.name)?;
        sheet.set_column_width(0, 16.0)?;

        for (col, label) in HEADER.iter().enumerate() {
            sheet.write_string_with_format(0, col as u16, *label, &header)?;
        }
        for (i, row) in block.rows.iter().enumerate() {
            let r = i as u32 + 1;
            sheet.write_string(r, 0, row.metric)?;
            sheet.write_number(r, 1, row.value as f64)?;
        }
    }

    workbook.save_to_buffer()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::{meetings_block, users_block};
    use dashboard_core::types::{MeetingCounts, UserCounts};

    #[test]
    fn test_renders_zip_container() {
        let blocks = vec![
            meetings_block(&MeetingCounts::default()),
            users_block(&UserCounts::default()),
        ];
        let bytes = render(&blocks, "Meetdesk Dashboard Report", Utc::now()).unwrap();
        assert!(bytes.starts_with(b"PK"));
    }
}
