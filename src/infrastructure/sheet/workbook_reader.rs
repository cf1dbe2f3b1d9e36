use std::path::Path;

use calamine::{open_workbook_auto, Data, Reader};
use tracing::debug;

use super::SheetGrid;
use crate::domain::aggregation::format_number;
use crate::domain::error::{AppError, Result};

/// Reads xlsx/xlsm/xlsb/xls/ods workbooks through calamine.
#[derive(Debug, Default)]
pub struct WorkbookReader;

impl WorkbookReader {
    pub fn new() -> Self {
        Self
    }

    pub fn read_first_sheet(&self, path: &Path) -> Result<SheetGrid> {
        let mut workbook = open_workbook_auto(path)
            .map_err(|e| AppError::IoError(format!("无法打开文件: {}", e)))?;

        let range = workbook
            .worksheet_range_at(0)
            .ok_or_else(|| AppError::IoError("文件中没有工作表".to_string()))?
            .map_err(|e| AppError::IoError(format!("无法读取工作表: {}", e)))?;

        let rows: Vec<Vec<String>> = range
            .rows()
            .map(|row| row.iter().map(cell_to_string).collect())
            .collect();

        debug!(path = %path.display(), rows = rows.len(), "Loaded workbook sheet");
        Ok(SheetGrid::new(rows))
    }
}

/// Integral floats lose their `.0` so phone numbers survive as typed.
pub(crate) fn cell_to_string(cell: &Data) -> String {
    match cell {
        Data::String(s) => s.clone(),
        Data::Float(f) => format_number(*f),
        Data::Int(i) => i.to_string(),
        Data::Empty => String::new(),
        other => other.to_string(),
    }
}
