//! Error types for card insert generation.

use thiserror::Error;

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while extracting rows or rendering pages.
#[derive(Error, Debug)]
pub enum Error {
    /// Failed to open or read an input file.
    #[error("Failed to read file: {0}")]
    IoError(#[from] std::io::Error),

    /// ZIP archive error (the .docx container).
    #[error("ZIP error: {0}")]
    ZipError(String),

    /// XML parsing error (word/document.xml).
    #[error("XML parsing error: {0}")]
    XmlError(String),

    /// The document contains no tables at all.
    #[error("No tables found in the document; a table with 3 columns is required")]
    NoTables,

    /// The configured table index does not exist in the document.
    #[error("Table index {index} is out of range; the document has {count} table(s)")]
    TableIndexOutOfRange { index: usize, count: usize },

    /// A data row resolved to fewer than 3 cells after unwrapping
    /// content controls.
    #[error("Table row {row} has only {found} cell(s); at least 3 are required")]
    TooFewCells { row: usize, found: usize },

    /// A non-blank row is missing one of its required fields.
    #[error("Empty '{field}' cell in table row {row}")]
    EmptyField { row: usize, field: &'static str },

    /// Every row was blank or skipped.
    #[error("No rows with data to render")]
    NoRecords,

    /// The template PDF has too few pages to serve as cover + reference.
    #[error("Template PDF must contain at least 2 pages (static cover + reference page), found {0}")]
    TemplateTooShort(usize),

    /// Failed to parse or rewrite a PDF document.
    #[error("PDF error: {0}")]
    PdfError(String),

    /// Failed to parse the configured typeface.
    #[error("Font error: {0}")]
    FontError(String),
}
