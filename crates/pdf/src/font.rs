//! Typeface loading, measurement, and Type0 font embedding.

use std::collections::BTreeMap;
use std::path::Path;

use inserts_core::{Error, Result};
use pdf_writer::types::{CidFontType, FontFlags, SystemInfo};
use pdf_writer::{Name, Pdf, Rect, Ref, Str};
use ttf_parser::Face;

/// Fallback advance (in 1000-units-per-em space) for glyphs without
/// horizontal metrics.
const DEFAULT_WIDTH: f32 = 500.0;

/// A loaded TrueType face used for all rendered text.
///
/// Owns the raw font program; the face is re-parsed on demand since
/// `ttf_parser::Face` borrows the data it reads.
#[derive(Debug)]
pub struct Typeface {
    data: Vec<u8>,
}

impl Typeface {
    /// Validate and wrap raw TTF/OTF bytes.
    pub fn from_bytes(data: Vec<u8>) -> Result<Self> {
        Face::parse(&data, 0).map_err(|e| Error::FontError(format!("Invalid font file: {}", e)))?;
        Ok(Self { data })
    }

    /// Load a typeface from a font file on disk.
    pub fn from_file(path: &Path) -> Result<Self> {
        let data = std::fs::read(path)?;
        Self::from_bytes(data).map_err(|e| match e {
            Error::FontError(msg) => Error::FontError(format!("{}: {}", path.display(), msg)),
            other => other,
        })
    }

    fn face(&self) -> Result<Face<'_>> {
        Face::parse(&self.data, 0).map_err(|e| Error::FontError(format!("Invalid font file: {}", e)))
    }

    /// Measure the rendered width of a string at the given size, from the
    /// face's glyph advances.
    pub fn string_width(&self, text: &str, size: f32) -> Result<f32> {
        let face = self.face()?;
        let scale = size / f32::from(face.units_per_em());

        let mut width = 0.0f32;
        for ch in text.chars() {
            let glyph = face.glyph_index(ch).unwrap_or(ttf_parser::GlyphId(0));
            let advance = face
                .glyph_hor_advance(glyph)
                .map(f32::from)
                .unwrap_or(DEFAULT_WIDTH * f32::from(face.units_per_em()) / 1000.0);
            width += advance * scale;
        }

        Ok(width)
    }

    /// Encode a string as big-endian glyph ids for an Identity-H font.
    ///
    /// Code points the face cannot map fall back to glyph 0 (.notdef) with
    /// a warning rather than aborting the run.
    pub fn encode_text(&self, text: &str) -> Result<Vec<u8>> {
        let face = self.face()?;
        let mut bytes = Vec::with_capacity(text.len() * 2);

        for ch in text.chars() {
            let gid = match face.glyph_index(ch) {
                Some(glyph) => glyph.0,
                None => {
                    log::warn!("typeface has no glyph for U+{:04X}", ch as u32);
                    0
                }
            };
            bytes.push((gid >> 8) as u8);
            bytes.push((gid & 0xFF) as u8);
        }

        Ok(bytes)
    }

    /// Embed the face into a PDF as a Type0/CIDFontType2 font with
    /// Identity-H encoding, covering exactly the given code points.
    ///
    /// Writes the font dictionary under `font_id`; supporting objects are
    /// allocated from `next_ref`.
    pub(crate) fn embed_into(
        &self,
        pdf: &mut Pdf,
        font_id: Ref,
        next_ref: &mut i32,
        chars: impl IntoIterator<Item = char>,
    ) -> Result<()> {
        let face = self.face()?;
        let scale = 1000.0 / f32::from(face.units_per_em());

        let bbox = face.global_bounding_box();
        let ascent = f32::from(face.ascender()) * scale;
        let descent = f32::from(face.descender()) * scale;

        // With Identity-H the CID is the glyph id, so only the glyphs the
        // run actually shows need widths and ToUnicode entries.
        let mut cid_widths: BTreeMap<u16, f32> = BTreeMap::new();
        let mut cid_unicode: BTreeMap<u16, u32> = BTreeMap::new();
        for ch in chars {
            if let Some(glyph) = face.glyph_index(ch) {
                let width = face
                    .glyph_hor_advance(glyph)
                    .map(|advance| f32::from(advance) * scale)
                    .unwrap_or(DEFAULT_WIDTH);
                cid_widths.insert(glyph.0, width);
                cid_unicode.entry(glyph.0).or_insert(ch as u32);
            }
        }

        let mut alloc = || {
            let id = Ref::new(*next_ref);
            *next_ref += 1;
            id
        };
        let descriptor_id = alloc();
        let cid_font_id = alloc();
        let font_file_id = alloc();
        let to_unicode_id = alloc();

        pdf.stream(font_file_id, &self.data)
            .pair(Name(b"Length1"), self.data.len() as i32);

        let cmap = to_unicode_cmap(&cid_unicode);
        pdf.stream(to_unicode_id, cmap.as_bytes());

        let family = face
            .names()
            .into_iter()
            .find(|name| name.name_id == ttf_parser::name_id::FAMILY)
            .and_then(|name| name.to_string())
            .unwrap_or_else(|| format!("Font{}", font_id.get()));
        let base_font = family.replace(' ', "#20");
        let base_font = Name(base_font.as_bytes());

        {
            let mut descriptor = pdf.font_descriptor(descriptor_id);
            descriptor
                .name(base_font)
                .flags(FontFlags::SYMBOLIC)
                .bbox(Rect::new(
                    f32::from(bbox.x_min) * scale,
                    f32::from(bbox.y_min) * scale,
                    f32::from(bbox.x_max) * scale,
                    f32::from(bbox.y_max) * scale,
                ))
                .italic_angle(0.0)
                .ascent(ascent)
                .descent(descent)
                .cap_height(ascent)
                .stem_v(80.0)
                .font_file2(font_file_id);
        }

        {
            let mut cid_font = pdf.cid_font(cid_font_id);
            cid_font
                .subtype(CidFontType::Type2)
                .base_font(base_font)
                .system_info(SystemInfo {
                    registry: Str(b"Adobe"),
                    ordering: Str(b"Identity"),
                    supplement: 0,
                })
                .font_descriptor(descriptor_id)
                .default_width(DEFAULT_WIDTH)
                .cid_to_gid_map_predefined(Name(b"Identity"));

            let mut widths = cid_font.widths();
            let mut entries = cid_widths.iter().peekable();
            while let Some((&start, &first)) = entries.next() {
                let mut run = vec![first];
                let mut last = start;
                while let Some(&(&next, &width)) = entries.peek() {
                    if next == last + 1 {
                        run.push(width);
                        last = next;
                        entries.next();
                    } else {
                        break;
                    }
                }
                widths.consecutive(start, run);
            }
        }

        pdf.type0_font(font_id)
            .base_font(base_font)
            .encoding_predefined(Name(b"Identity-H"))
            .descendant_font(cid_font_id)
            .to_unicode(to_unicode_id);

        Ok(())
    }
}

/// Build a ToUnicode CMap mapping the used CIDs back to code points.
fn to_unicode_cmap(cid_unicode: &BTreeMap<u16, u32>) -> String {
    let pairs: Vec<(u16, u32)> = cid_unicode.iter().map(|(&cid, &uni)| (cid, uni)).collect();

    let mut sections = String::new();
    for chunk in pairs.chunks(100) {
        sections.push_str(&format!("{} beginbfchar\n", chunk.len()));
        for (cid, unicode) in chunk {
            sections.push_str(&format!("<{:04X}> <{:04X}>\n", cid, unicode));
        }
        sections.push_str("endbfchar\n");
    }

    format!(
        "/CIDInit /ProcSet findresource begin
12 dict begin
begincmap
/CIDSystemInfo
<< /Registry (Adobe)
   /Ordering (Identity)
   /Supplement 0
>> def
/CMapName /Adobe-Identity-UCS def
/CMapVersion 1.0 def
/CMapType 1 def
/WMode 0 def
1 begincodespacerange
<0000> <FFFF>
endcodespacerange
{}
endcmap
CMapName currentdict /CMap defineresource pop
end
end",
        sections
    )
}
