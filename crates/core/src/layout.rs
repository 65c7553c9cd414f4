//! Insert layout configuration.
//!
//! One immutable [`InsertLayout`] describes everything the renderer needs:
//! the typeface size and color, where each of the two labels sits on the
//! page, and the format templates that turn a record into label text. It is
//! passed explicitly into the renderer rather than living in module state,
//! so tests and the CLI can substitute alternate layouts.

use serde::{Deserialize, Serialize};

use crate::types::RowRecord;

/// Horizontal alignment of a label relative to its anchor point.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Align {
    /// The anchor is the left edge of the string.
    Left,
    /// The anchor is the horizontal center of the string.
    Center,
}

/// RGB text color with 0-255 components.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextColor {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl TextColor {
    /// Components scaled to the 0.0-1.0 range used by PDF operators.
    pub fn to_unit_rgb(self) -> (f32, f32, f32) {
        (
            f32::from(self.r) / 255.0,
            f32::from(self.g) / 255.0,
            f32::from(self.b) / 255.0,
        )
    }
}

/// Position, rotation, and alignment for one text label.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LabelPlacement {
    /// Anchor X in page units.
    pub x: f32,
    /// Anchor Y in page units.
    pub y: f32,
    /// Counter-clockwise rotation in degrees, applied around the anchor.
    pub rotate_deg: f32,
    /// Horizontal alignment relative to the anchor.
    pub align: Align,
}

/// Fixed per-run rendering configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InsertLayout {
    /// Font size in points, shared by both labels.
    pub font_size: f32,

    /// Fill color, shared by both labels.
    pub color: TextColor,

    /// Placement of the salutation label ("Dear Ivanov I.I.!").
    pub salutation: LabelPlacement,

    /// Placement of the greeting label ("Birthday").
    pub greeting: LabelPlacement,

    /// Format template for the salutation label.
    pub salutation_format: String,

    /// Format template for the greeting label.
    pub greeting_format: String,
}

impl Default for InsertLayout {
    fn default() -> Self {
        Self {
            font_size: 10.0,
            color: TextColor { r: 220, g: 0, b: 0 },
            salutation: LabelPlacement {
                x: 75.0,
                y: 480.0,
                rotate_deg: 90.0,
                align: Align::Left,
            },
            greeting: LabelPlacement {
                x: 118.0,
                y: 500.0,
                rotate_deg: 90.0,
                align: Align::Left,
            },
            salutation_format: "{dear} {name}!".to_string(),
            greeting_format: "{greeting}".to_string(),
        }
    }
}

impl InsertLayout {
    /// Render the salutation label text for a record.
    pub fn salutation_text(&self, record: &RowRecord) -> String {
        substitute(&self.salutation_format, record)
    }

    /// Render the greeting label text for a record.
    pub fn greeting_text(&self, record: &RowRecord) -> String {
        substitute(&self.greeting_format, record)
    }
}

/// Substitute `{dear}`, `{name}`, and `{greeting}` placeholders.
fn substitute(template: &str, record: &RowRecord) -> String {
    template
        .replace("{dear}", &record.dear)
        .replace("{name}", &record.name)
        .replace("{greeting}", &record.greeting)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record() -> RowRecord {
        RowRecord {
            name: "Ivanov I.I.".to_string(),
            greeting: "Birthday".to_string(),
            dear: "Dear".to_string(),
        }
    }

    #[test]
    fn test_default_label_texts() {
        let layout = InsertLayout::default();
        assert_eq!(layout.salutation_text(&record()), "Dear Ivanov I.I.!");
        assert_eq!(layout.greeting_text(&record()), "Birthday");
    }

    #[test]
    fn test_custom_templates() {
        let layout = InsertLayout {
            salutation_format: "{name} ({greeting})".to_string(),
            ..InsertLayout::default()
        };
        assert_eq!(layout.salutation_text(&record()), "Ivanov I.I. (Birthday)");
    }

    #[test]
    fn test_color_to_unit_rgb() {
        let (r, g, b) = TextColor { r: 220, g: 0, b: 0 }.to_unit_rgb();
        assert!((r - 220.0 / 255.0).abs() < 1e-6);
        assert_eq!(g, 0.0);
        assert_eq!(b, 0.0);
    }

    #[test]
    fn test_layout_deserializes_from_json() {
        let json = r#"{
            "font_size": 12.0,
            "color": { "r": 0, "g": 0, "b": 0 },
            "salutation": { "x": 10.0, "y": 20.0, "rotate_deg": 0.0, "align": "center" },
            "greeting": { "x": 30.0, "y": 40.0, "rotate_deg": 90.0, "align": "left" },
            "salutation_format": "{dear} {name}",
            "greeting_format": "{greeting}"
        }"#;
        let layout: InsertLayout = serde_json::from_str(json).unwrap();
        assert_eq!(layout.salutation.align, Align::Center);
        assert_eq!(layout.greeting.rotate_deg, 90.0);
    }
}
