// ============================================================
// SHEET INFRASTRUCTURE LAYER
// ============================================================
// Loading source spreadsheets into a plain string grid and writing
// the fixed output template

mod csv_reader;
mod workbook_reader;
mod xlsx_writer;

use std::path::Path;

use crate::domain::column::ColumnDescriptor;
use crate::domain::error::{AppError, Result};

pub use csv_reader::CsvSheetReader;
pub use workbook_reader::WorkbookReader;
pub use xlsx_writer::{OutputWriter, OUTPUT_HEADERS};

/// First sheet of a source file with every cell stringified.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SheetGrid {
    rows: Vec<Vec<String>>,
}

impl SheetGrid {
    pub fn new(rows: Vec<Vec<String>>) -> Self {
        Self { rows }
    }

    pub fn header(&self) -> Option<&[String]> {
        self.rows.first().map(Vec::as_slice)
    }

    /// Rows after the header.
    pub fn data_rows(&self) -> impl Iterator<Item = &[String]> {
        self.rows.iter().skip(1).map(Vec::as_slice)
    }

    pub fn columns(&self) -> Vec<ColumnDescriptor> {
        self.header()
            .map(|header| {
                header
                    .iter()
                    .enumerate()
                    .map(|(index, title)| ColumnDescriptor::new(index, title.clone()))
                    .collect()
            })
            .unwrap_or_default()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceFormat {
    Workbook,
    Delimited,
}

impl SourceFormat {
    pub fn from_path(path: &Path) -> Result<Self> {
        let extension = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.to_ascii_lowercase())
            .unwrap_or_default();

        match extension.as_str() {
            "xlsx" | "xlsm" | "xlsb" | "xls" | "ods" => Ok(SourceFormat::Workbook),
            "csv" | "tsv" | "txt" => Ok(SourceFormat::Delimited),
            other => Err(AppError::IoError(format!(
                "Unsupported file type '{}': {}",
                other,
                path.display()
            ))),
        }
    }
}

/// Loads the first sheet of `path`, dispatching on the file extension.
pub fn load_grid(path: &Path) -> Result<SheetGrid> {
    match SourceFormat::from_path(path)? {
        SourceFormat::Workbook => WorkbookReader::new().read_first_sheet(path),
        SourceFormat::Delimited => CsvSheetReader::new().read_file(path),
    }
}
