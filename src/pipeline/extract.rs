//! Diagram-fence extraction: find every Mermaid block in a document.
//!
//! The scan is line-based with an explicit byte cursor that only moves
//! forward, so blocks come out in document order and never overlap.
//!
//! ## Recognised fences
//!
//! ```text
//! ```mermaid          ~~~ mermaid          ````mermaid title
//! graph TD; A-->B;    sequenceDiagram      ...
//! ```                 ~~~                  ````
//! ```
//!
//! An opening line is optional indentation, three or more backticks or
//! tildes, optional whitespace, then the `mermaid` tag (anything after a
//! non-word character is ignored). The closing line uses the same fence
//! character, at least as many of them, and nothing else.
//!
//! An opening fence with no closing line, or a fence with only whitespace
//! inside, yields no block; scanning continues past it.

use once_cell::sync::Lazy;
use regex::Regex;
use std::ops::Range;

/// Info-string tag that marks a fence as a diagram.
pub const DIAGRAM_LANGUAGE: &str = "mermaid";

static OPENING_FENCE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(
        r"^[ \t]*(?P<fence>`{{3,}}|~{{3,}})[ \t]*{DIAGRAM_LANGUAGE}(?:[^\w-].*)?$"
    ))
    .unwrap()
});

static CLOSING_FENCE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[ \t]*(?P<fence>`{3,}|~{3,})[ \t]*$").unwrap());

/// One diagram fence found in a document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiagramBlock<'a> {
    /// The whole fence, opening line through closing fence, without the
    /// closing line's trailing newline.
    pub matched: &'a str,
    /// The diagram definition between the fence lines.
    pub source: &'a str,
    /// 0-based position among the document's blocks.
    pub ordinal: usize,
    /// Byte range of `matched` within the document.
    pub span: Range<usize>,
}

/// Lazily iterate the diagram blocks in `text`.
///
/// The iterator is `Clone`; cloning it (or calling this again) restarts the
/// scan from wherever the clone was taken.
pub fn extract_blocks(text: &str) -> Blocks<'_> {
    Blocks {
        text,
        pos: 0,
        next_ordinal: 0,
    }
}

/// Iterator returned by [`extract_blocks`].
#[derive(Debug, Clone)]
pub struct Blocks<'a> {
    text: &'a str,
    pos: usize,
    next_ordinal: usize,
}

/// A line of the document: `content` excludes the line break, `next` is
/// where the following line starts.
#[derive(Debug, Clone, Copy)]
struct Line {
    start: usize,
    end: usize,
    next: usize,
}

impl<'a> Blocks<'a> {
    fn line_at(&self, start: usize) -> Option<Line> {
        if start >= self.text.len() {
            return None;
        }
        let rest = &self.text[start..];
        let (mut end, next) = match rest.find('\n') {
            Some(i) => (start + i, start + i + 1),
            None => (self.text.len(), self.text.len()),
        };
        if end > start && self.text.as_bytes()[end - 1] == b'\r' {
            end -= 1;
        }
        Some(Line { start, end, next })
    }

    fn content(&self, line: Line) -> &'a str {
        let text: &'a str = self.text;
        &text[line.start..line.end]
    }

    /// Find the closing line for a fence opened with `fence`, scanning from
    /// `from`.
    fn find_closing(&self, fence: &str, from: usize) -> Option<Line> {
        let marker = fence.as_bytes()[0];
        let mut pos = from;
        while let Some(line) = self.line_at(pos) {
            if let Some(caps) = CLOSING_FENCE.captures(self.content(line)) {
                let close = &caps["fence"];
                if close.as_bytes()[0] == marker && close.len() >= fence.len() {
                    return Some(line);
                }
            }
            pos = line.next;
        }
        None
    }
}

impl<'a> Iterator for Blocks<'a> {
    type Item = DiagramBlock<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        let text: &'a str = self.text;
        while let Some(open) = self.line_at(self.pos) {
            let Some(caps) = OPENING_FENCE.captures(self.content(open)) else {
                self.pos = open.next;
                continue;
            };
            let fence = caps.name("fence").map_or("", |m| m.as_str());

            let Some(close) = self.find_closing(fence, open.next) else {
                // Unclosed: no block here, resume on the following line.
                self.pos = open.next;
                continue;
            };

            self.pos = close.next;

            // Source runs up to the line break that precedes the closing line.
            let source_end = if close.start > open.next {
                let mut end = close.start - 1;
                if end > open.next && text.as_bytes()[end - 1] == b'\r' {
                    end -= 1;
                }
                end
            } else {
                open.next
            };
            let source = &text[open.next..source_end];
            if source.trim().is_empty() {
                continue;
            }

            let ordinal = self.next_ordinal;
            self.next_ordinal += 1;
            return Some(DiagramBlock {
                matched: &text[open.start..close.end],
                source,
                ordinal,
                span: open.start..close.end,
            });
        }
        self.pos = text.len();
        None
    }
}
