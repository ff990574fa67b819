//! Positioned text extraction from PDFs using pdf-extract.
//!
//! pdf-extract reports one glyph at a time through [`OutputDev`]. Glyphs that
//! continue along the same baseline are joined into lines, and lines stacked
//! closely on top of each other are joined into text boxes. Each box becomes
//! one [`TextFragment`] with a region in PDF user space (y grows upward).

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::path::Path;

use pdf_extract::{Document, MediaBox, OutputDev, OutputError, Transform};
use tracing::{debug, trace};

use super::{LayoutProvider, Page, TextFragment};
use crate::error::ProviderError;
use crate::geometry::Region;

/// Glyph gap, relative to font size, that still continues a line.
const CHAR_MARGIN: f64 = 2.0;

/// Vertical gap, relative to line height, that still continues a box.
const LINE_MARGIN: f64 = 0.5;

/// Layout provider for PDF documents.
#[derive(Debug, Clone)]
pub struct PdfLayoutProvider {
    char_margin: f64,
    line_margin: f64,
}

impl Default for PdfLayoutProvider {
    fn default() -> Self {
        Self {
            char_margin: CHAR_MARGIN,
            line_margin: LINE_MARGIN,
        }
    }
}

impl PdfLayoutProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the horizontal glyph gap (in font sizes) that still joins a line.
    pub fn with_char_margin(mut self, margin: f64) -> Self {
        self.char_margin = margin;
        self
    }

    /// Set the vertical line gap (in line heights) that still joins a box.
    pub fn with_line_margin(mut self, margin: f64) -> Self {
        self.line_margin = margin;
        self
    }
}

impl LayoutProvider for PdfLayoutProvider {
    fn load(&self, path: &Path) -> Result<Vec<Page>, ProviderError> {
        let doc = Document::load(path).map_err(|e| ProviderError::unreadable(path, e))?;
        let mut collector = FragmentCollector::new(self.char_margin, self.line_margin);

        // pdf-extract panics on some malformed content streams
        let outcome = catch_unwind(AssertUnwindSafe(|| {
            pdf_extract::output_doc(&doc, &mut collector)
        }));
        match outcome {
            Ok(Ok(())) => {}
            Ok(Err(e)) => return Err(ProviderError::unreadable(path, e)),
            Err(_) => return Err(ProviderError::unreadable(path, "extractor panicked")),
        }

        let pages = collector.finish();
        debug!("Extracted {} pages from {}", pages.len(), path.display());
        Ok(pages)
    }
}

/// A line being assembled from glyphs.
#[derive(Debug, Clone)]
struct Line {
    text: String,
    region: Region,
    baseline: f64,
    end_x: f64,
    size: f64,
}

struct FragmentCollector {
    char_margin: f64,
    line_margin: f64,
    pages: Vec<Page>,
    page_number: Option<u32>,
    lines: Vec<Line>,
    current: Option<Line>,
}

impl FragmentCollector {
    fn new(char_margin: f64, line_margin: f64) -> Self {
        Self {
            char_margin,
            line_margin,
            pages: Vec::new(),
            page_number: None,
            lines: Vec::new(),
            current: None,
        }
    }

    fn finish(mut self) -> Vec<Page> {
        self.close_page();
        self.pages
    }

    fn close_line(&mut self) {
        if let Some(line) = self.current.take() {
            if !line.text.trim().is_empty() {
                self.lines.push(line);
            }
        }
    }

    fn close_page(&mut self) {
        self.close_line();
        let Some(number) = self.page_number.take() else {
            return;
        };
        let lines = std::mem::take(&mut self.lines);
        let fragments = group_lines(lines, self.line_margin);
        trace!("Page {} has {} fragments", number, fragments.len());
        self.pages.push(Page { number, fragments });
    }

    fn continues_line(&self, line: &Line, x: f64, y: f64, size: f64) -> bool {
        let tolerance = line.size.max(size);
        (y - line.baseline).abs() < tolerance * 0.2
            && x >= line.end_x - tolerance * 0.5
            && x - line.end_x <= tolerance * self.char_margin
    }
}

impl OutputDev for FragmentCollector {
    fn begin_page(
        &mut self,
        page_num: u32,
        _media_box: &MediaBox,
        _art_box: Option<(f64, f64, f64, f64)>,
    ) -> Result<(), OutputError> {
        self.close_page();
        self.page_number = Some(page_num);
        Ok(())
    }

    fn end_page(&mut self) -> Result<(), OutputError> {
        self.close_page();
        Ok(())
    }

    fn output_character(
        &mut self,
        trm: &Transform,
        width: f64,
        _spacing: f64,
        font_size: f64,
        char: &str,
    ) -> Result<(), OutputError> {
        // Rendered size: the font size vector pushed through the text matrix
        let sx = font_size * (trm.m11 + trm.m21);
        let sy = font_size * (trm.m12 + trm.m22);
        let size = (sx * sy).abs().sqrt();
        let (x, y) = (trm.m31, trm.m32);
        let advance = width * size;
        let glyph = Region::new(x, x + advance, y, y + size);

        let joins = self
            .current
            .as_ref()
            .is_some_and(|line| self.continues_line(line, x, y, size));
        if joins {
            if let Some(line) = self.current.as_mut() {
                if x - line.end_x > line.size * 0.25 && !line.text.ends_with(' ') {
                    line.text.push(' ');
                }
                line.text.push_str(char);
                line.region = line.region.merge(&glyph);
                line.end_x = x + advance;
                line.size = line.size.max(size);
            }
        } else {
            self.close_line();
            self.current = Some(Line {
                text: char.to_string(),
                region: glyph,
                baseline: y,
                end_x: x + advance,
                size,
            });
        }
        Ok(())
    }

    fn begin_word(&mut self) -> Result<(), OutputError> {
        Ok(())
    }

    fn end_word(&mut self) -> Result<(), OutputError> {
        Ok(())
    }

    fn end_line(&mut self) -> Result<(), OutputError> {
        self.close_line();
        Ok(())
    }
}

/// Join consecutive lines that sit directly above one another into boxes.
fn group_lines(lines: Vec<Line>, line_margin: f64) -> Vec<TextFragment> {
    let mut boxes: Vec<(String, Region, f64)> = Vec::new();

    for line in lines {
        let text = line.text.trim().to_string();
        if let Some((box_text, region, height)) = boxes.last_mut() {
            let h = height.max(line.region.height());
            let horizontal = line.region.xmin() < region.xmax() && line.region.xmax() > region.xmin();
            let gap = region.ymin() - line.region.ymax();
            if horizontal && gap >= -h * 0.5 && gap <= h * line_margin {
                box_text.push('\n');
                box_text.push_str(&text);
                *region = region.merge(&line.region);
                *height = h;
                continue;
            }
        }
        let height = line.region.height();
        boxes.push((text, line.region, height));
    }

    boxes
        .into_iter()
        .map(|(text, region, _)| TextFragment::new(text, region))
        .collect()
}
