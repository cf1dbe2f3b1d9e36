// ============================================================
// CSV SHEET READER
// ============================================================
// Delimited sources with encoding and delimiter detection

use std::fs;
use std::path::Path;

use csv::{ReaderBuilder, Trim};
use encoding_rs::{Encoding, GB18030, UTF_8};
use tracing::debug;

use super::SheetGrid;
use crate::domain::error::{AppError, Result};

/// CSV reader for exports that arrive as text instead of a workbook.
/// Values are trimmed.
#[derive(Debug, Default)]
pub struct CsvSheetReader {
    /// Delimiter character; detected from the content when `None`
    delimiter: Option<u8>,
}

impl CsvSheetReader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_delimiter(mut self, delimiter: u8) -> Self {
        self.delimiter = Some(delimiter);
        self
    }

    pub fn read_file(&self, path: &Path) -> Result<SheetGrid> {
        let bytes = fs::read(path)
            .map_err(|e| AppError::IoError(format!("无法打开文件: {}", e)))?;
        let (content, encoding) = decode(&bytes);
        debug!(path = %path.display(), encoding = encoding.name(), "Decoded CSV source");
        self.parse_content(&content)
    }

    /// Parses every record, header included, into a grid.
    pub fn parse_content(&self, content: &str) -> Result<SheetGrid> {
        let delimiter = self
            .delimiter
            .unwrap_or_else(|| Self::detect_delimiter(content));

        let mut reader = ReaderBuilder::new()
            .delimiter(delimiter)
            .has_headers(false)
            .trim(Trim::All)
            .flexible(true) // Allow rows with different lengths
            .from_reader(content.as_bytes());

        let mut rows = Vec::new();
        for (index, result) in reader.records().enumerate() {
            let record = result.map_err(|e| {
                AppError::IoError(format!("Failed to parse CSV row {}: {}", index + 1, e))
            })?;
            rows.push(record.iter().map(str::to_string).collect());
        }

        Ok(SheetGrid::new(rows))
    }

    /// Detect delimiter from content (comma, semicolon, tab, pipe)
    pub fn detect_delimiter(content: &str) -> u8 {
        let candidates = [b',', b';', b'\t', b'|'];
        let sample_lines: Vec<_> = content.lines().take(10).collect();

        let mut best_delimiter = b',';
        let mut best_score = 0.0f32;

        if sample_lines.is_empty() {
            return best_delimiter;
        }

        for &delimiter in &candidates {
            let field_counts: Vec<usize> = sample_lines
                .iter()
                .map(|line| line.bytes().filter(|&b| b == delimiter).count())
                .collect();

            // Score by consistency (low standard deviation) and frequency
            let avg = field_counts.iter().sum::<usize>() as f32 / field_counts.len() as f32;
            let variance = field_counts
                .iter()
                .map(|&x| (x as f32 - avg).powi(2))
                .sum::<f32>()
                / field_counts.len() as f32;

            let score = avg / (1.0 + variance.sqrt());

            if score > best_score {
                best_score = score;
                best_delimiter = delimiter;
            }
        }

        best_delimiter
    }
}

/// BOM first, then strict UTF-8, then GB18030 (what Chinese spreadsheet
/// tools emit by default).
fn decode(bytes: &[u8]) -> (String, &'static Encoding) {
    if let Some((encoding, bom_len)) = Encoding::for_bom(bytes) {
        let (content, _) = encoding.decode_without_bom_handling(&bytes[bom_len..]);
        return (content.into_owned(), encoding);
    }

    if let Ok(content) = std::str::from_utf8(bytes) {
        return (content.to_string(), UTF_8);
    }

    let (content, _, _) = GB18030.decode(bytes);
    (content.into_owned(), GB18030)
}
