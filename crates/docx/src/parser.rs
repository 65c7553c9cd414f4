//! DOCX recipient-table parser implementation.

use inserts_core::{normalize_text, Error, ExtractedRow, Result};
use quick_xml::events::Event;
use quick_xml::Reader;
use std::io::{Read, Seek};
use zip::ZipArchive;

/// Path of the main document part inside the .docx archive.
const DOCUMENT_PART: &str = "word/document.xml";

/// Parser for the recipient table embedded in a DOCX document.
///
/// Tables are located among the top-level `w:tbl` elements of the document
/// body and selected by a zero-based index. Row cells may be authored
/// directly (`w:tc`) or wrapped in a content control (`w:sdt`); both forms
/// yield the same cell ordering.
pub struct DocxParser {
    table_index: usize,
    has_header_row: bool,
}

impl DocxParser {
    /// Create a parser targeting the first table, with a header row.
    pub fn new() -> Self {
        Self {
            table_index: 0,
            has_header_row: true,
        }
    }

    /// Select which top-level table to read (zero-based).
    pub fn with_table_index(mut self, index: usize) -> Self {
        self.table_index = index;
        self
    }

    /// Set whether the first table row is a header to skip.
    pub fn with_header_row(mut self, has_header: bool) -> Self {
        self.has_header_row = has_header;
        self
    }

    /// Parse a .docx file from a reader and extract the data rows of the
    /// target table, normalized and numbered.
    pub fn parse<R: Read + Seek>(&self, reader: R) -> Result<Vec<ExtractedRow>> {
        let mut archive = ZipArchive::new(reader)
            .map_err(|e| Error::ZipError(format!("Failed to open ZIP: {}", e)))?;

        let content = read_file_from_archive(&mut archive, DOCUMENT_PART)?;
        self.extract_rows_from_xml(&content)
    }

    /// Extract the target table's rows from the document XML.
    fn extract_rows_from_xml(&self, xml_content: &str) -> Result<Vec<ExtractedRow>> {
        // Text runs are concatenated verbatim; whitespace is only collapsed
        // by normalization afterwards, so the reader must not trim text.
        let mut reader = Reader::from_str(xml_content);

        let mut table_count = 0usize;
        let mut tbl_depth = 0usize;
        let mut in_target = false;

        let mut rows: Vec<Vec<CellContainer>> = Vec::new();
        let mut in_row = false;
        let mut containers: Vec<CellContainer> = Vec::new();

        // Open w:tc elements in the current row, counting nested tables'
        // cells so only depth-0 cells become row cells.
        let mut tc_depth = 0usize;
        let mut current_cell: Option<String> = None;

        let mut sdt_depth = 0usize;
        let mut sdt_pr_depth = 0usize;
        // Depth of the w:sdt acting as the current row-level cell wrapper.
        let mut wrapper_depth: Option<usize> = None;
        let mut wrapped_cells: Vec<String> = Vec::new();

        let mut in_text = false;

        loop {
            match reader.read_event() {
                Ok(Event::Start(ref e)) => match local_name(e.name().as_ref()) {
                    b"tbl" => {
                        if tbl_depth == 0 {
                            if table_count == self.table_index {
                                in_target = true;
                            }
                            table_count += 1;
                        }
                        tbl_depth += 1;
                    }
                    b"tr" if in_target && tbl_depth == 1 => {
                        in_row = true;
                        containers = Vec::new();
                    }
                    b"sdtPr" if in_target && in_row => {
                        sdt_pr_depth += 1;
                    }
                    b"sdt" if in_target && in_row => {
                        sdt_depth += 1;
                        if tc_depth == 0
                            && tbl_depth == 1
                            && sdt_pr_depth == 0
                            && wrapper_depth.is_none()
                        {
                            wrapper_depth = Some(sdt_depth);
                            wrapped_cells = Vec::new();
                        }
                    }
                    b"tc" if in_target && in_row && sdt_pr_depth == 0 => {
                        if tc_depth == 0 && tbl_depth == 1 {
                            current_cell = Some(String::new());
                        }
                        tc_depth += 1;
                    }
                    b"t" if current_cell.is_some() && sdt_pr_depth == 0 => {
                        in_text = true;
                    }
                    _ => {}
                },
                Ok(Event::Empty(ref e)) => {
                    // A self-closing w:tc is an empty cell.
                    if local_name(e.name().as_ref()) == b"tc"
                        && in_target
                        && in_row
                        && sdt_pr_depth == 0
                        && tc_depth == 0
                        && tbl_depth == 1
                    {
                        push_cell(
                            String::new(),
                            wrapper_depth.is_some(),
                            &mut wrapped_cells,
                            &mut containers,
                        );
                    }
                }
                Ok(Event::Text(ref e)) => {
                    if in_text {
                        if let Some(cell) = current_cell.as_mut() {
                            let text = e.unescape().map_err(|err| {
                                Error::XmlError(format!("Error unescaping text: {}", err))
                            })?;
                            cell.push_str(&text);
                        }
                    }
                }
                Ok(Event::End(ref e)) => match local_name(e.name().as_ref()) {
                    b"tbl" => {
                        tbl_depth = tbl_depth.saturating_sub(1);
                        if tbl_depth == 0 {
                            in_target = false;
                        }
                    }
                    b"tr" if in_target && tbl_depth == 1 => {
                        in_row = false;
                        rows.push(std::mem::take(&mut containers));
                    }
                    b"sdtPr" if sdt_pr_depth > 0 => {
                        sdt_pr_depth -= 1;
                    }
                    b"sdt" if in_target && in_row => {
                        if wrapper_depth == Some(sdt_depth) {
                            wrapper_depth = None;
                            containers
                                .push(CellContainer::Wrapped(std::mem::take(&mut wrapped_cells)));
                        }
                        sdt_depth = sdt_depth.saturating_sub(1);
                    }
                    b"tc" if in_target && in_row && sdt_pr_depth == 0 => {
                        tc_depth = tc_depth.saturating_sub(1);
                        if tc_depth == 0 && tbl_depth == 1 {
                            if let Some(text) = current_cell.take() {
                                push_cell(
                                    text,
                                    wrapper_depth.is_some(),
                                    &mut wrapped_cells,
                                    &mut containers,
                                );
                            }
                        }
                    }
                    b"t" => {
                        in_text = false;
                    }
                    _ => {}
                },
                Ok(Event::Eof) => break,
                Err(e) => {
                    return Err(Error::XmlError(format!(
                        "Error parsing document XML: {}",
                        e
                    )));
                }
                _ => {}
            }
        }

        if table_count == 0 {
            return Err(Error::NoTables);
        }
        if self.table_index >= table_count {
            return Err(Error::TableIndexOutOfRange {
                index: self.table_index,
                count: table_count,
            });
        }

        log::debug!(
            "table {} of {}: {} row(s) including header",
            self.table_index,
            table_count,
            rows.len()
        );

        let start = if self.has_header_row { 1 } else { 0 };
        let mut out = Vec::new();

        for (i, row_containers) in rows.into_iter().enumerate().skip(start) {
            let number = i + 1;
            let cells: Vec<String> = row_containers
                .into_iter()
                .flat_map(CellContainer::into_cells)
                .map(|text| normalize_text(&text))
                .collect();

            if cells.len() < 3 {
                return Err(Error::TooFewCells {
                    row: number,
                    found: cells.len(),
                });
            }

            out.push(ExtractedRow::new(number, cells));
        }

        Ok(out)
    }
}

impl Default for DocxParser {
    fn default() -> Self {
        Self::new()
    }
}

/// A row child that contributes table cells, resolved once per row.
enum CellContainer {
    /// A `w:tc` authored directly under the row.
    Direct(String),
    /// The cells hosted by a `w:sdt` content control, in source order.
    Wrapped(Vec<String>),
}

impl CellContainer {
    fn into_cells(self) -> Vec<String> {
        match self {
            CellContainer::Direct(cell) => vec![cell],
            CellContainer::Wrapped(cells) => cells,
        }
    }
}

/// Route a finished cell to the active content-control wrapper, or
/// directly to the row.
fn push_cell(
    text: String,
    wrapper_active: bool,
    wrapped_cells: &mut Vec<String>,
    containers: &mut Vec<CellContainer>,
) {
    if wrapper_active {
        wrapped_cells.push(text);
    } else {
        containers.push(CellContainer::Direct(text));
    }
}

/// Read a file from the ZIP archive.
fn read_file_from_archive<R: Read + Seek>(
    archive: &mut ZipArchive<R>,
    path: &str,
) -> Result<String> {
    let mut file = archive
        .by_name(path)
        .map_err(|e| Error::ZipError(format!("File not found in archive '{}': {}", path, e)))?;

    let mut content = String::new();
    file.read_to_string(&mut content)
        .map_err(|e| Error::ZipError(format!("Failed to read '{}': {}", path, e)))?;

    Ok(content)
}

/// Extract the local name from a potentially namespaced XML element name.
fn local_name(name: &[u8]) -> &[u8] {
    if let Some(pos) = name.iter().position(|&b| b == b':') {
        &name[pos + 1..]
    } else {
        name
    }
}
