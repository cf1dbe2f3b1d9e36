use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tracing::{debug, info, warn};

use super::SpreadsheetBackend;
use crate::domain::aggregation::{AggregatedValue, AggregationEvaluator};
use crate::domain::column::ColumnDescriptor;
use crate::domain::duplicates::{DuplicateDetector, DuplicateMerger};
use crate::domain::error::{AppError, Result};
use crate::domain::mapping::Mapping;
use crate::domain::order::{ConversionResult, OrderRow, ResultOrigin};
use crate::infrastructure::sheet::{load_grid, OutputWriter, SheetGrid};

/// In-process backend: reads with calamine/csv, writes with rust_xlsxwriter.
/// Holds no per-session data.
pub struct LocalSpreadsheetBackend {
    output_sheet_name: String,
}

impl LocalSpreadsheetBackend {
    pub fn new(output_sheet_name: impl Into<String>) -> Self {
        Self {
            output_sheet_name: output_sheet_name.into(),
        }
    }
}

async fn run_blocking<T, F>(task: F, wrap: fn(String) -> AppError) -> Result<T>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T> + Send + 'static,
{
    tokio::task::spawn_blocking(task)
        .await
        .map_err(|e| wrap(format!("后台任务失败: {}", e)))?
}

#[async_trait]
impl SpreadsheetBackend for LocalSpreadsheetBackend {
    async fn read_columns(&self, path: &str) -> Result<Vec<ColumnDescriptor>> {
        let source = PathBuf::from(path);
        let columns = run_blocking(
            move || load_grid(&source).map(|grid| grid.columns()),
            AppError::IoError,
        )
        .await?;
        debug!(path, columns = columns.len(), "read_columns");
        Ok(columns)
    }

    async fn convert_with_mapping(
        &self,
        path: &str,
        mapping: &Mapping,
    ) -> Result<ConversionResult> {
        let source = PathBuf::from(path);
        let mapping = mapping.clone();
        let result = run_blocking(
            move || {
                let grid = load_grid(&source)
                    .map_err(|e| AppError::ConversionError(e.message()))?;
                Ok(convert_grid(&grid, &mapping))
            },
            AppError::ConversionError,
        )
        .await?;

        info!(
            path,
            total_rows = result.total_rows,
            duplicate_count = result.duplicate_count,
            "Converted source file"
        );
        Ok(result)
    }

    async fn merge_duplicates(&self, rows: &[OrderRow]) -> Result<ConversionResult> {
        if rows.is_empty() {
            return Err(AppError::MergeError(
                "没有可合并的数据，请先选择并转换文件".to_string(),
            ));
        }
        let merged = DuplicateMerger::merge(rows);
        info!(before = rows.len(), after = merged.len(), "Merged duplicate rows");
        Ok(ConversionResult::new(merged, ResultOrigin::Merged))
    }

    async fn export_file(&self, rows: &[OrderRow], output_path: &str) -> Result<String> {
        if rows.is_empty() {
            return Err(AppError::ExportError(
                "没有可导出的数据，请先选择并转换文件".to_string(),
            ));
        }
        let rows = rows.to_vec();
        let count = rows.len();
        let target = PathBuf::from(output_path);
        let writer = OutputWriter::new(self.output_sheet_name.clone());
        run_blocking(
            move || writer.write(&rows, Path::new(&target)),
            AppError::ExportError,
        )
        .await?;

        info!(output_path, rows = count, "Exported workbook");
        Ok(format!("成功导出 {} 条数据", count))
    }
}

/// Applies `mapping` to every data row, drops rows without any recipient
/// information and groups duplicates.
pub(crate) fn convert_grid(grid: &SheetGrid, mapping: &Mapping) -> ConversionResult {
    let mut rows = Vec::new();
    let mut unresolved_cells = 0usize;

    for source in grid.data_rows() {
        let mut row = OrderRow::default();
        for (key, entry) in mapping.iter() {
            match AggregationEvaluator::evaluate_row(entry, source) {
                AggregatedValue::Resolved(value) => row.set(key, value),
                AggregatedValue::Unresolved(_) => {
                    row.set(key, String::new());
                    row.mark_unresolved(key);
                    unresolved_cells += 1;
                }
            }
        }

        let (name, phone, address) = row.recipient_key();
        if name.is_empty() && phone.is_empty() && address.is_empty() {
            continue;
        }
        rows.push(row);
    }

    if unresolved_cells > 0 {
        warn!(unresolved_cells, "Some mapped values could not be resolved");
    }

    DuplicateDetector::assign_groups(&mut rows);
    ConversionResult::new(rows, ResultOrigin::Converted)
}
