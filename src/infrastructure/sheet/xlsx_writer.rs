use std::path::Path;

use rust_xlsxwriter::{Format, Workbook};

use crate::domain::error::{AppError, Result};
use crate::domain::field_schema::FieldSchema;
use crate::domain::order::OrderRow;

/// Header row of the order template, one entry per canonical field in schema
/// order.
pub const OUTPUT_HEADERS: [&str; 7] = [
    "收件人姓名（必填）",
    "收件人手机号（必填）",
    "收货地址（必填）",
    "商品名称(必填) -- 多商品用\u{201c}；\u{201d}隔开",
    "商品规格(非必填) -- 多商品用\u{201c}；\u{201d}隔开",
    "商品数量(必填) -- 多商品用\u{201c}；\u{201d}隔开",
    "备注（非必填）",
];

pub struct OutputWriter {
    sheet_name: String,
}

impl OutputWriter {
    pub fn new(sheet_name: impl Into<String>) -> Self {
        Self {
            sheet_name: sheet_name.into(),
        }
    }

    pub fn write(&self, rows: &[OrderRow], output_path: &Path) -> Result<()> {
        let mut workbook = Workbook::new();
        let header_format = Format::new().set_bold();

        let sheet = workbook
            .add_worksheet()
            .set_name(&self.sheet_name)
            .map_err(|e| AppError::ExportError(format!("设置工作表名失败: {}", e)))?;

        for (col, header) in OUTPUT_HEADERS.iter().enumerate() {
            sheet
                .write_string_with_format(0, col as u16, *header, &header_format)
                .map_err(|e| AppError::ExportError(format!("写入表头失败: {}", e)))?;
        }

        // Data starts on the second row; every cell is written as text so
        // phone numbers keep leading zeros.
        for (row_idx, row) in rows.iter().enumerate() {
            let r = (row_idx + 1) as u32;
            for (col, field) in FieldSchema::fields().iter().enumerate() {
                sheet
                    .write_string(r, col as u16, row.get(field.key))
                    .map_err(|e| AppError::ExportError(format!("写入失败: {}", e)))?;
            }
        }

        workbook
            .save(output_path)
            .map_err(|e| AppError::ExportError(format!("保存文件失败: {}", e)))?;

        Ok(())
    }
}
