//! Newline-delimited record reassembly.
//!
//! HTTP body chunks do not respect record boundaries: one chunk may carry
//! half a record, or several. Splitting happens on raw bytes so a multi-byte
//! UTF-8 character cut across two chunks is never mangled.

use crate::domain::RelayError;

/// Buffers partial lines between body chunks.
#[derive(Debug, Default)]
pub struct LineDecoder {
    buf: Vec<u8>,
    /// Bytes of `buf` already known to hold no newline.
    scanned: usize,
}

impl LineDecoder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed bytes, returning every line completed by them. Blank lines are
    /// dropped.
    ///
    /// # Errors
    ///
    /// `Protocol` if a completed line is not valid UTF-8.
    pub fn push(&mut self, bytes: &[u8]) -> Result<Vec<String>, RelayError> {
        self.buf.extend_from_slice(bytes);

        let mut lines = Vec::new();
        let mut start = 0;
        while let Some(offset) = self.buf[self.scanned..].iter().position(|b| *b == b'\n') {
            let end = self.scanned + offset;
            match Self::clean(&self.buf[start..end]) {
                Ok(Some(text)) => lines.push(text),
                Ok(None) => {}
                Err(e) => {
                    self.reset();
                    return Err(e);
                }
            }
            start = end + 1;
            self.scanned = start;
        }
        self.buf.drain(..start);
        self.scanned = self.buf.len();
        Ok(lines)
    }

    /// Take whatever remains once the body has ended.
    ///
    /// # Errors
    ///
    /// `Protocol` if the trailing bytes are not valid UTF-8.
    pub fn finish(&mut self) -> Result<Option<String>, RelayError> {
        let rest = std::mem::take(&mut self.buf);
        self.scanned = 0;
        Self::clean(&rest)
    }

    fn reset(&mut self) {
        self.buf.clear();
        self.scanned = 0;
    }

    fn clean(raw: &[u8]) -> Result<Option<String>, RelayError> {
        let text = std::str::from_utf8(raw).map_err(|e| {
            RelayError::Protocol(format!("generation record is not UTF-8: {e}"))
        })?;
        let trimmed = text.trim();
        Ok((!trimmed.is_empty()).then(|| trimmed.to_string()))
    }
}
