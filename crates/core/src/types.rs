//! Domain types for extracted table rows and validated records.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// One data row as extracted from the document table, before validation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractedRow {
    /// 1-based row number within the table (the header row counts).
    pub number: usize,

    /// Normalized cell texts in document order, after unwrapping any
    /// content controls.
    pub cells: Vec<String>,
}

impl ExtractedRow {
    /// Create a new extracted row.
    pub fn new(number: usize, cells: Vec<String>) -> Self {
        Self { number, cells }
    }

    /// Whether the three mapped cells (name, greeting, dear) are all empty.
    pub fn is_blank(&self) -> bool {
        self.cells.iter().take(3).all(|c| c.is_empty())
    }
}

/// A validated record driving one generated page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RowRecord {
    /// Recipient name, e.g. "Ivanov I.I.".
    pub name: String,

    /// Greeting kind, e.g. "Birthday".
    pub greeting: String,

    /// Salutation word, e.g. "Dear".
    pub dear: String,
}

impl RowRecord {
    /// Build a record from an extracted row.
    ///
    /// Returns `Ok(None)` for a fully blank row (a trailing spacer row in
    /// the source table). A row with data in some cells but an empty
    /// required cell is an error naming the field and the row number.
    pub fn from_row(row: &ExtractedRow) -> Result<Option<Self>> {
        if row.cells.len() < 3 {
            return Err(Error::TooFewCells {
                row: row.number,
                found: row.cells.len(),
            });
        }

        if row.is_blank() {
            return Ok(None);
        }

        let field = |index: usize, name: &'static str| -> Result<String> {
            let value = &row.cells[index];
            if value.is_empty() {
                Err(Error::EmptyField {
                    row: row.number,
                    field: name,
                })
            } else {
                Ok(value.clone())
            }
        };

        Ok(Some(Self {
            name: field(0, "name")?,
            greeting: field(1, "greeting")?,
            dear: field(2, "dear")?,
        }))
    }
}

/// Validate extracted rows into an ordered record sequence.
///
/// Fully blank rows are skipped silently; any other malformed row aborts.
/// An empty result after processing all rows is an error, since there is
/// nothing to render.
pub fn build_records(rows: &[ExtractedRow]) -> Result<Vec<RowRecord>> {
    let mut records = Vec::new();

    for row in rows {
        if let Some(record) = RowRecord::from_row(row)? {
            records.push(record);
        } else {
            log::debug!("skipping blank table row {}", row.number);
        }
    }

    if records.is_empty() {
        return Err(Error::NoRecords);
    }

    Ok(records)
}
