//! Result table and xlsx serialization

use rust_xlsxwriter::{Format, Workbook, XlsxError};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{PipelineError, Result};

/// Fixed column headers, in output order
pub const COLUMNS: [&str; 4] = ["File Name", "Email", "Contact", "Text"];

pub const SHEET_NAME: &str = "Sheet1";

pub const OUTPUT_FILE_NAME: &str = "output.xlsx";

pub const XLSX_MIME_TYPE: &str =
    "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet";

/// Excel rejects cells longer than this many characters
pub const MAX_CELL_CHARS: usize = 32_767;

/// One row of output: a recognised document and what was mined from it
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractionRecord {
    pub file_name: String,
    pub email: String,
    pub contact: String,
    pub text: String,
}

impl ExtractionRecord {
    fn cells(&self) -> [&str; 4] {
        [&self.file_name, &self.email, &self.contact, &self.text]
    }
}

/// Ordered, immutable set of records ready to be written out once
#[derive(Debug, Clone, Default)]
pub struct ResultTable {
    records: Vec<ExtractionRecord>,
}

impl ResultTable {
    pub fn build(records: Vec<ExtractionRecord>) -> Self {
        Self { records }
    }

    /// Write the table as an xlsx workbook: bold header row, one row per record
    pub fn serialize(self) -> Result<Vec<u8>> {
        let bytes = self.write_workbook().map_err(|e| PipelineError::Table(e.to_string()))?;
        debug!("Serialized {} rows into {} bytes", self.records.len(), bytes.len());
        Ok(bytes)
    }

    fn write_workbook(&self) -> std::result::Result<Vec<u8>, XlsxError> {
        let mut workbook = Workbook::new();
        let worksheet = workbook.add_worksheet();
        worksheet.set_name(SHEET_NAME)?;

        let header_format = Format::new().set_bold();
        for (col, header) in COLUMNS.iter().enumerate() {
            worksheet.write_string_with_format(0, col as u16, *header, &header_format)?;
        }

        for (idx, record) in self.records.iter().enumerate() {
            let row = (idx + 1) as u32;
            for (col, value) in record.cells().into_iter().enumerate() {
                if value.is_empty() {
                    continue;
                }
                let value = fit_cell(value, &record.file_name, COLUMNS[col]);
                worksheet.write_string(row, col as u16, value)?;
            }
        }

        worksheet.autofit();
        workbook.save_to_buffer()
    }
}

/// Truncate a value to what Excel accepts in one cell
fn fit_cell<'a>(value: &'a str, file_name: &str, column: &str) -> &'a str {
    match value.char_indices().nth(MAX_CELL_CHARS) {
        Some((cut, _)) => {
            warn!(
                "Truncated {} for {} to {} characters",
                column, file_name, MAX_CELL_CHARS
            );
            &value[..cut]
        }
        None => value,
    }
}
