//! Single-page overlay rendering.
//!
//! Produces the transient one-page PDF holding the two positioned, rotated
//! text labels for one record. The artifact is sized exactly to the
//! template's reference page and is later merged onto a fresh copy of it.

use inserts_core::{Align, InsertLayout, LabelPlacement, Result};
use pdf_writer::{Content, Name, Pdf, Rect, Ref, Str};

use crate::font::Typeface;

/// Resource name of the embedded label font on the overlay page.
const FONT_RESOURCE: Name<'static> = Name(b"FIns");

/// Renders overlay artifacts for records, against a fixed layout and
/// typeface.
pub struct OverlayRenderer<'a> {
    layout: &'a InsertLayout,
    typeface: &'a Typeface,
}

impl<'a> OverlayRenderer<'a> {
    /// Create a renderer borrowing the run's layout and typeface.
    pub fn new(layout: &'a InsertLayout, typeface: &'a Typeface) -> Self {
        Self { layout, typeface }
    }

    /// Render a one-page overlay of the given dimensions carrying the
    /// salutation and greeting labels.
    ///
    /// The output contains nothing nondeterministic: rendering the same
    /// strings twice yields byte-identical artifacts.
    pub fn render(
        &self,
        page_width: f32,
        page_height: f32,
        salutation_text: &str,
        greeting_text: &str,
    ) -> Result<Vec<u8>> {
        let mut pdf = Pdf::new();

        let catalog_id = Ref::new(1);
        let page_tree_id = Ref::new(2);
        let page_id = Ref::new(3);
        let content_id = Ref::new(4);
        let font_id = Ref::new(5);
        let mut next_ref = 6;

        pdf.catalog(catalog_id).pages(page_tree_id);

        let chars: std::collections::BTreeSet<char> = salutation_text
            .chars()
            .chain(greeting_text.chars())
            .collect();
        self.typeface
            .embed_into(&mut pdf, font_id, &mut next_ref, chars)?;

        let mut content = Content::new();
        let (r, g, b) = self.layout.color.to_unit_rgb();
        content.set_fill_rgb(r, g, b);

        self.draw_label(&mut content, salutation_text, &self.layout.salutation)?;
        self.draw_label(&mut content, greeting_text, &self.layout.greeting)?;

        let content_bytes = content.finish();
        pdf.stream(content_id, &content_bytes);

        {
            let mut page = pdf.page(page_id);
            page.media_box(Rect::new(0.0, 0.0, page_width, page_height));
            page.parent(page_tree_id);
            page.contents(content_id);
            page.resources().fonts().pair(FONT_RESOURCE, font_id);
        }

        {
            let mut page_tree = pdf.pages(page_tree_id);
            page_tree.kids([page_id]);
            page_tree.count(1);
        }

        Ok(pdf.finish())
    }

    /// Draw one label: translate to its anchor, rotate around it, show the
    /// string at the local origin, and restore the previous transform so
    /// the labels stay independent.
    fn draw_label(
        &self,
        content: &mut Content,
        text: &str,
        placement: &LabelPlacement,
    ) -> Result<()> {
        content.save_state();
        content.transform([1.0, 0.0, 0.0, 1.0, placement.x, placement.y]);

        if placement.rotate_deg != 0.0 {
            let radians = placement.rotate_deg.to_radians();
            let (sin, cos) = radians.sin_cos();
            content.transform([cos, sin, -sin, cos, 0.0, 0.0]);
        }

        let offset = match placement.align {
            Align::Left => 0.0,
            Align::Center => -self.typeface.string_width(text, self.layout.font_size)? / 2.0,
        };

        content.begin_text();
        content.set_font(FONT_RESOURCE, self.layout.font_size);
        content.next_line(offset, 0.0);
        content.show(Str(&self.typeface.encode_text(text)?));
        content.end_text();

        content.restore_state();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_util::system_typeface;
    use inserts_core::TextColor;
    use lopdf::{Document, Object};

    fn media_box_of(bytes: &[u8]) -> [f32; 4] {
        let doc = Document::load_mem(bytes).unwrap();
        let pages = doc.get_pages();
        let page_id = *pages.get(&1).unwrap();
        let page = doc.get_object(page_id).unwrap().as_dict().unwrap();
        let Ok(Object::Array(values)) = page.get(b"MediaBox") else {
            panic!("overlay page has no MediaBox");
        };
        let mut out = [0.0f32; 4];
        for (slot, value) in out.iter_mut().zip(values) {
            *slot = match value {
                Object::Integer(i) => *i as f32,
                Object::Real(r) => *r,
                other => panic!("unexpected MediaBox entry: {other:?}"),
            };
        }
        out
    }

    #[test]
    fn test_overlay_matches_requested_dimensions() {
        let Some(typeface) = system_typeface() else {
            return;
        };
        let layout = InsertLayout::default();
        let renderer = OverlayRenderer::new(&layout, &typeface);

        let bytes = renderer.render(200.0, 400.0, "Dear Ivanov I.I.!", "Birthday").unwrap();
        let media_box = media_box_of(&bytes);
        assert_eq!(media_box, [0.0, 0.0, 200.0, 400.0]);

        let doc = Document::load_mem(&bytes).unwrap();
        assert_eq!(doc.get_pages().len(), 1);
    }

    #[test]
    fn test_rendering_is_deterministic() {
        let Some(typeface) = system_typeface() else {
            return;
        };
        let layout = InsertLayout::default();
        let renderer = OverlayRenderer::new(&layout, &typeface);

        let first = renderer.render(200.0, 400.0, "Dear Petrova A.B.!", "Anniversary").unwrap();
        let second = renderer.render(200.0, 400.0, "Dear Petrova A.B.!", "Anniversary").unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_center_alignment_changes_output() {
        let Some(typeface) = system_typeface() else {
            return;
        };
        let left = InsertLayout::default();
        let mut centered = InsertLayout::default();
        centered.salutation.align = Align::Center;

        let left_bytes = OverlayRenderer::new(&left, &typeface)
            .render(200.0, 400.0, "Dear Ivanov I.I.!", "Birthday")
            .unwrap();
        let centered_bytes = OverlayRenderer::new(&centered, &typeface)
            .render(200.0, 400.0, "Dear Ivanov I.I.!", "Birthday")
            .unwrap();
        assert_ne!(left_bytes, centered_bytes);
    }

    #[test]
    fn test_overlay_content_shows_both_labels() {
        let Some(typeface) = system_typeface() else {
            return;
        };
        let layout = InsertLayout {
            color: TextColor { r: 0, g: 0, b: 0 },
            ..InsertLayout::default()
        };
        let renderer = OverlayRenderer::new(&layout, &typeface);
        let bytes = renderer.render(200.0, 400.0, "Dear Ivanov I.I.!", "Birthday").unwrap();

        let doc = Document::load_mem(&bytes).unwrap();
        let pages = doc.get_pages();
        let page_id = *pages.get(&1).unwrap();
        let content = doc.get_and_decode_page_content(page_id).unwrap();

        let shown: Vec<&[u8]> = content
            .operations
            .iter()
            .filter(|op| op.operator == "Tj")
            .filter_map(|op| match op.operands.first() {
                Some(Object::String(bytes, _)) => Some(bytes.as_slice()),
                _ => None,
            })
            .collect();

        assert_eq!(shown.len(), 2);
        assert_eq!(shown[0], typeface.encode_text("Dear Ivanov I.I.!").unwrap());
        assert_eq!(shown[1], typeface.encode_text("Birthday").unwrap());
    }
}
