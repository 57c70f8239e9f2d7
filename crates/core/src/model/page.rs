//! Page and text fragment types supplied by the text-extraction collaborator.

use serde::{Deserialize, Serialize};

use crate::utils::{HasBBox, Rect};

/// A contiguous run of characters (usually one OCR word) with its box.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextFragment {
    pub text: String,
    /// Bounding box in page coordinates (top-left origin).
    pub rect: Rect,
    /// Visual line identifier; fragments of one line share it.
    pub line: u32,
    /// Text block (paragraph) identifier, when the extractor reports one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub block: Option<u32>,
}

impl TextFragment {
    pub fn new(text: impl Into<String>, rect: Rect, line: u32) -> Self {
        Self {
            text: text.into(),
            rect,
            line,
            block: None,
        }
    }

    pub fn with_block(mut self, block: u32) -> Self {
        self.block = Some(block);
        self
    }
}

impl HasBBox for TextFragment {
    fn x0(&self) -> f64 {
        self.rect.0
    }
    fn y0(&self) -> f64 {
        self.rect.1
    }
    fn x1(&self) -> f64 {
        self.rect.2
    }
    fn y1(&self) -> f64 {
        self.rect.3
    }
}

/// One page of searchable text.
///
/// `text` is the flattened page text; the fragments appear in it in order,
/// separated by arbitrary whitespace.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Page {
    /// Zero-based page index.
    pub index: usize,
    pub width: f64,
    pub height: f64,
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub fragments: Vec<TextFragment>,
}

impl Page {
    pub fn new(
        index: usize,
        width: f64,
        height: f64,
        text: impl Into<String>,
        fragments: Vec<TextFragment>,
    ) -> Self {
        Self {
            index,
            width,
            height,
            text: text.into(),
            fragments,
        }
    }

    /// Builds a page whose text is the fragments joined with a space inside
    /// a line and a newline between lines.
    pub fn from_fragments(
        index: usize,
        width: f64,
        height: f64,
        fragments: Vec<TextFragment>,
    ) -> Self {
        let mut text = String::new();
        let mut last_line = None;
        for frag in &fragments {
            match last_line {
                None => {}
                Some(line) if line == frag.line => text.push(' '),
                Some(_) => text.push('\n'),
            }
            text.push_str(&frag.text);
            last_line = Some(frag.line);
        }
        Self::new(index, width, height, text, fragments)
    }

    /// Page rectangle in page coordinates.
    pub fn bbox(&self) -> Rect {
        (0.0, 0.0, self.width, self.height)
    }

    /// Fills `text` from the fragments when the extractor left it empty.
    pub fn ensure_text(&mut self) {
        if self.text.is_empty() && !self.fragments.is_empty() {
            let rebuilt = Self::from_fragments(
                self.index,
                self.width,
                self.height,
                std::mem::take(&mut self.fragments),
            );
            *self = rebuilt;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_fragments_joins_lines_with_newlines() {
        let page = Page::from_fragments(
            0,
            100.0,
            100.0,
            vec![
                TextFragment::new("The", (0.0, 0.0, 10.0, 10.0), 0),
                TextFragment::new("quick", (12.0, 0.0, 30.0, 10.0), 0),
                TextFragment::new("fox", (0.0, 12.0, 10.0, 22.0), 1),
            ],
        );
        assert_eq!(page.text, "The quick\nfox");
    }

    #[test]
    fn ensure_text_keeps_supplied_text() {
        let mut page = Page::new(
            0,
            10.0,
            10.0,
            "given",
            vec![TextFragment::new("other", (0.0, 0.0, 1.0, 1.0), 0)],
        );
        page.ensure_text();
        assert_eq!(page.text, "given");
    }
}
