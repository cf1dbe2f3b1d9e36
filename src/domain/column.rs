use serde::{Deserialize, Serialize};

/// One column discovered in the source spreadsheet's header row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnDescriptor {
    pub index: usize,
    pub code: String,
    pub title: String,
}

impl ColumnDescriptor {
    pub fn new(index: usize, title: impl Into<String>) -> Self {
        Self {
            index,
            code: column_code(index),
            title: title.into(),
        }
    }
}

/// Spreadsheet column letters for a zero-based index (0 = A, 25 = Z, 26 = AA).
pub fn column_code(index: usize) -> String {
    let mut letters = Vec::new();
    let mut n = index;
    loop {
        letters.push(b'A' + (n % 26) as u8);
        if n < 26 {
            break;
        }
        n = n / 26 - 1;
    }
    letters.reverse();
    String::from_utf8_lossy(&letters).into_owned()
}
