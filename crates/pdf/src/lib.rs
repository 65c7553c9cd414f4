//! PDF generation for card inserts.
//!
//! For each validated record, an overlay carrying the two rotated labels is
//! rendered at the template's reference-page size and merged onto a fresh
//! copy of that page; the output document is the template's cover page
//! followed by one stamped page per record, in record order.

pub mod compose;
pub mod font;
pub mod overlay;

#[cfg(test)]
mod test_util;

pub use compose::PageCompositor;
pub use font::Typeface;
pub use overlay::OverlayRenderer;

use inserts_core::{InsertLayout, Result, RowRecord};

/// Render the full output document for an ordered record sequence.
///
/// Strictly sequential: output page order mirrors record order, and every
/// record renders against its own re-parsed copy of the reference page.
pub fn render_inserts(
    records: &[RowRecord],
    template: Vec<u8>,
    typeface: &Typeface,
    layout: &InsertLayout,
) -> Result<Vec<u8>> {
    let mut compositor = PageCompositor::new(template)?;
    let renderer = OverlayRenderer::new(layout, typeface);
    let (page_width, page_height) = compositor.reference_size();

    for record in records {
        let salutation = layout.salutation_text(record);
        let greeting = layout.greeting_text(record);

        let overlay = renderer.render(page_width, page_height, &salutation, &greeting)?;
        compositor.push_overlay(&overlay)?;
        log::debug!("rendered insert page for {}", record.name);
    }

    compositor.finish()
}
