//! Text Locator: finds a quote inside a page's extracted text.
//!
//! Exact, case-sensitive search runs first. The fallback compares both sides
//! after OCR-tolerant normalization and projects the hit back onto the
//! original text through a byte offset map.

use unicode_normalization::UnicodeNormalization;

use crate::error::{LayoutError, Result};
use crate::model::{MatchKind, TextSpan};

/// What to do with a hyphen that ends a line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum HyphenBreak {
    /// `"exam-\nple"` becomes `"example"`.
    Join,
    /// `"well-\nknown"` becomes `"well-known"`.
    Keep,
}

/// Normalized text plus, for every normalized byte, the byte range of the
/// original character it came from.
#[derive(Debug, Default)]
struct Normalized {
    text: String,
    origin: Vec<(usize, usize)>,
}

impl Normalized {
    fn push(&mut self, ch: char, src: (usize, usize)) {
        self.text.push(ch);
        self.origin.extend(std::iter::repeat_n(src, ch.len_utf8()));
    }

    /// Original byte range covering normalized bytes `[start, end)`.
    fn project(&self, start: usize, end: usize) -> Option<(usize, usize)> {
        if start >= end {
            return None;
        }
        let first = self.origin.get(start)?;
        let last = self.origin.get(end - 1)?;
        Some((first.0, last.1))
    }
}

fn is_line_hyphen(ch: char) -> bool {
    matches!(ch, '-' | '\u{00ad}' | '\u{2010}' | '\u{2011}')
}

fn fold_punct(ch: char) -> Option<char> {
    match ch {
        '\u{2018}' | '\u{2019}' | '\u{201a}' | '\u{201b}' | '\u{2032}' => Some('\''),
        '\u{201c}' | '\u{201d}' | '\u{201e}' | '\u{201f}' | '\u{2033}' => Some('"'),
        '\u{2010}' | '\u{2011}' | '\u{2012}' | '\u{2013}' | '\u{2014}' | '\u{2015}'
        | '\u{2212}' => Some('-'),
        // soft hyphen is invisible unless it breaks a line
        '\u{00ad}' => None,
        _ => Some(ch),
    }
}

/// Length in bytes of a line break run following a hyphen at `pos`, when the
/// hyphen ends a line: optional blanks, a newline, then any whitespace.
fn hyphen_break_len(chars: &[(usize, char)], pos: usize) -> Option<usize> {
    let mut i = pos + 1;
    while i < chars.len() && matches!(chars[i].1, ' ' | '\t') {
        i += 1;
    }
    if i >= chars.len() || !matches!(chars[i].1, '\n' | '\r') {
        return None;
    }
    while i < chars.len() && chars[i].1.is_whitespace() {
        i += 1;
    }
    Some(i - pos - 1)
}

fn normalize(s: &str, fold_case: bool, hyphens: HyphenBreak) -> Normalized {
    let chars: Vec<(usize, char)> = s.char_indices().collect();
    let mut out = Normalized::default();
    let mut pending_space: Option<(usize, usize)> = None;
    let mut i = 0;

    while i < chars.len() {
        let (at, ch) = chars[i];
        let src = (at, at + ch.len_utf8());

        if is_line_hyphen(ch)
            && let Some(skip) = hyphen_break_len(&chars, i)
        {
            if hyphens == HyphenBreak::Keep {
                if let Some(space) = pending_space.take() {
                    out.push(' ', space);
                }
                out.push('-', src);
            }
            i += 1 + skip;
            continue;
        }

        if ch.is_whitespace() {
            if !out.text.is_empty() && pending_space.is_none() {
                pending_space = Some(src);
            }
            i += 1;
            continue;
        }

        for folded in std::iter::once(ch).nfkc().filter_map(fold_punct) {
            if folded.is_whitespace() {
                if !out.text.is_empty() && pending_space.is_none() {
                    pending_space = Some(src);
                }
                continue;
            }
            if let Some(space) = pending_space.take() {
                out.push(' ', space);
            }
            if fold_case {
                for lower in folded.to_lowercase() {
                    out.push(lower, src);
                }
            } else {
                out.push(folded, src);
            }
        }
        i += 1;
    }
    out
}

/// Normalizes a quote the way the locator's fallback does, joining
/// line-end hyphenation. Used for duplicate detection and uid hashing.
pub fn normalize_quote(s: &str, fold_case: bool) -> String {
    normalize(s, fold_case, HyphenBreak::Join).text
}

/// Finds the first occurrence of `quote` in `page_text`.
pub fn locate(quote: &str, page_text: &str) -> Result<TextSpan> {
    locate_with(quote, page_text, false)
}

/// Like [`locate`], optionally lowercasing both sides in the fallback.
pub fn locate_with(quote: &str, page_text: &str, fold_case: bool) -> Result<TextSpan> {
    let not_found = || LayoutError::QuoteNotFound {
        quote: quote.to_string(),
    };
    if quote.trim().is_empty() {
        return Err(not_found());
    }

    if let Some(start) = page_text.find(quote) {
        return Ok(TextSpan {
            start,
            end: start + quote.len(),
            kind: MatchKind::Exact,
        });
    }

    for hyphens in [HyphenBreak::Join, HyphenBreak::Keep] {
        let needle = normalize(quote, fold_case, hyphens);
        if needle.text.is_empty() {
            return Err(not_found());
        }
        let haystack = normalize(page_text, fold_case, hyphens);
        if let Some(pos) = haystack.text.find(&needle.text)
            && let Some((start, end)) = haystack.project(pos, pos + needle.text.len())
        {
            tracing::trace!(start, end, ?hyphens, "normalized quote match");
            return Ok(TextSpan {
                start,
                end,
                kind: MatchKind::Normalized,
            });
        }
    }

    Err(not_found())
}
