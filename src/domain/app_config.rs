use serde::{Deserialize, Serialize};
use validator::Validate;

/// A host dialog filter, e.g. `Excel 文件` → `["xlsx", "xls"]`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct FileFilter {
    #[validate(length(min = 1))]
    pub name: String,
    #[validate(length(min = 1))]
    pub extensions: Vec<String>,
}

impl FileFilter {
    pub fn new(name: &str, extensions: &[&str]) -> Self {
        Self {
            name: name.to_string(),
            extensions: extensions.iter().map(|ext| ext.to_string()).collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct AppConfig {
    /// `tracing_subscriber` env-filter directive; `RUST_LOG` wins when set.
    #[validate(length(min = 1))]
    pub log_filter: String,

    #[validate(nested)]
    pub open_filters: Vec<FileFilter>,

    #[validate(nested)]
    pub save_filters: Vec<FileFilter>,

    #[validate(length(min = 1))]
    pub default_export_name: String,

    /// Sheet name of the exported workbook (Excel caps names at 31 chars).
    #[validate(length(min = 1, max = 31))]
    pub output_sheet_name: String,

    /// Number of distinct row colours used to tell duplicate groups apart.
    #[validate(range(min = 1, max = 32))]
    pub duplicate_palette_size: usize,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            log_filter: "info".to_string(),
            open_filters: vec![
                FileFilter::new("Excel 文件", &["xlsx", "xls", "xlsm", "ods"]),
                FileFilter::new("CSV 文件", &["csv", "tsv", "txt"]),
            ],
            save_filters: vec![FileFilter::new("Excel 文件", &["xlsx"])],
            default_export_name: "output.xlsx".to_string(),
            output_sheet_name: "工作表1".to_string(),
            duplicate_palette_size: 6,
        }
    }
}
