pub mod local;

use crate::domain::column::ColumnDescriptor;
use crate::domain::error::Result;
use crate::domain::mapping::Mapping;
use crate::domain::order::{ConversionResult, OrderRow};
use async_trait::async_trait;

pub use local::LocalSpreadsheetBackend;

/// Spreadsheet parsing, conversion, merging and writing.
///
/// Merge and export receive the rows explicitly so a backend never has to
/// remember the last conversion it produced.
#[async_trait]
pub trait SpreadsheetBackend {
    async fn read_columns(&self, path: &str) -> Result<Vec<ColumnDescriptor>>;
    async fn convert_with_mapping(&self, path: &str, mapping: &Mapping)
        -> Result<ConversionResult>;
    async fn merge_duplicates(&self, rows: &[OrderRow]) -> Result<ConversionResult>;
    async fn export_file(&self, rows: &[OrderRow], output_path: &str) -> Result<String>;
}
