//! DOCX table extraction backend for card insert generation.
//!
//! Parses .docx files, which are ZIP archives containing XML documents,
//! and extracts the recipient table from `word/document.xml`.

pub mod parser;

pub use parser::DocxParser;
