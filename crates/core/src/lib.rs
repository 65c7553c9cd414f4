//! Core domain types, row validation, text normalization, and insert
//! layout configuration for card insert generation.

pub mod error;
pub mod layout;
pub mod normalize;
pub mod types;

pub use error::{Error, Result};
pub use layout::{Align, InsertLayout, LabelPlacement, TextColor};
pub use normalize::normalize_text;
pub use types::{build_records, ExtractedRow, RowRecord};
