//! Order-preserving substitution of diagram fences by image references.
//!
//! [`DocumentRewriter`] keeps the raw document text untouched and a cursor into
//! it. Each substitution replaces exactly the byte range the extractor found
//! for a block and moves the cursor to its end, so text that merely looks like
//! a fence is never touched and inserted references are never scanned again.

use crate::error::Md2PngError;
use crate::pipeline::extract::DiagramBlock;
use std::path::Path;

/// Incrementally rewritten document text.
#[derive(Debug, Clone)]
pub struct DocumentRewriter<'a> {
    raw: &'a str,
    out: String,
    cursor: usize,
    applied: usize,
}

impl<'a> DocumentRewriter<'a> {
    pub fn new(raw: &'a str) -> Self {
        Self {
            raw,
            out: String::with_capacity(raw.len()),
            cursor: 0,
            applied: 0,
        }
    }

    /// Replace `block`'s span with `replacement`.
    ///
    /// Blocks must come from the same text, in document order. A span that
    /// starts before the previous substitution ended, or lies outside the
    /// text, is an error.
    pub fn substitute(
        &mut self,
        block: &DiagramBlock<'_>,
        replacement: &str,
    ) -> Result<(), Md2PngError> {
        let span = block.span.clone();
        if span.start < self.cursor || span.end > self.raw.len() || span.start > span.end {
            return Err(Md2PngError::Internal(format!(
                "substitution #{} at bytes {}..{} is out of order (cursor at {})",
                self.applied, span.start, span.end, self.cursor
            )));
        }
        debug_assert_eq!(&self.raw[span.clone()], block.matched);

        self.out.push_str(&self.raw[self.cursor..span.start]);
        self.out.push_str(replacement);
        self.cursor = span.end;
        self.applied += 1;
        Ok(())
    }

    /// Number of substitutions applied so far.
    pub fn applied(&self) -> usize {
        self.applied
    }

    /// The document as it stands: every substitution so far applied, the
    /// remainder untouched.
    #[cfg(test)]
    fn current(&self) -> String {
        let mut text = self.out.clone();
        text.push_str(&self.raw[self.cursor..]);
        text
    }

    /// Finish rewriting and return the transformed text.
    pub fn finish(mut self) -> String {
        self.out.push_str(&self.raw[self.cursor..]);
        self.out
    }
}

/// `<img src="…">` pointing at a generated image.
pub fn image_reference(link: &str) -> String {
    format!("<img src=\"{}\">", escape_attr(link))
}

/// Spell a path with `/` separators for use inside a document.
pub fn link_path(path: &Path) -> String {
    let s = path.to_string_lossy();
    if cfg!(windows) {
        s.replace('\\', "/")
    } else {
        s.into_owned()
    }
}

fn escape_attr(input: &str) -> String {
    input
        .replace('&', "&amp;")
        .replace('"', "&quot;")
        .replace('<', "&lt;")
}
