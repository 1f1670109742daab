use kite_core::WatchError;

/// Largest watch frame accepted before the stream is abandoned.
pub(crate) const MAX_FRAME_BYTES: usize = 16 * 1024 * 1024;

/// Splits a byte stream into newline-terminated lines.
#[derive(Debug)]
pub(crate) struct LineDecoder {
    buf: Vec<u8>,
    /// Bytes buffered after the last newline.
    partial: usize,
    limit: usize,
}

impl Default for LineDecoder {
    fn default() -> Self {
        Self::with_limit(MAX_FRAME_BYTES)
    }
}

impl LineDecoder {
    pub(crate) fn with_limit(limit: usize) -> Self {
        Self {
            buf: Vec::new(),
            partial: 0,
            limit,
        }
    }

    /// Buffer `chunk`. Fails once an unterminated line grows past the limit.
    pub(crate) fn push(&mut self, chunk: &[u8]) -> Result<(), WatchError> {
        self.partial = match chunk.iter().rposition(|b| *b == b'\n') {
            Some(pos) => chunk.len() - pos - 1,
            None => self.partial + chunk.len(),
        };
        if self.partial > self.limit {
            self.clear();
            return Err(WatchError::Decode(format!(
                "watch frame exceeds {} bytes",
                self.limit
            )));
        }
        self.buf.extend_from_slice(chunk);
        Ok(())
    }

    /// Next complete line without its terminator.
    pub(crate) fn next_line(&mut self) -> Option<Vec<u8>> {
        let pos = self.buf.iter().position(|b| *b == b'\n')?;
        let mut line: Vec<u8> = self.buf.drain(..=pos).collect();
        line.pop();
        if line.last() == Some(&b'\r') {
            line.pop();
        }
        Some(line)
    }

    /// Whatever is left once the stream has ended.
    pub(crate) fn finish(&mut self) -> Option<Vec<u8>> {
        if self.buf.iter().all(u8::is_ascii_whitespace) {
            self.buf.clear();
            return None;
        }
        self.partial = 0;
        Some(std::mem::take(&mut self.buf))
    }

    pub(crate) fn clear(&mut self) {
        self.buf.clear();
        self.partial = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reassembles_lines_across_chunks() {
        let mut d = LineDecoder::default();
        d.push(b"{\"a\":").unwrap();
        assert!(d.next_line().is_none());
        d.push(b"1}\r\n{\"b\":2}\n{\"c\"").unwrap();
        assert_eq!(d.next_line().unwrap(), b"{\"a\":1}");
        assert_eq!(d.next_line().unwrap(), b"{\"b\":2}");
        assert!(d.next_line().is_none());
        assert_eq!(d.finish().unwrap(), b"{\"c\"");
    }

    #[test]
    fn trailing_whitespace_is_not_a_frame() {
        let mut d = LineDecoder::default();
        d.push(b"\n  ").unwrap();
        assert_eq!(d.next_line().unwrap(), b"");
        assert!(d.finish().is_none());
    }

    #[test]
    fn unterminated_line_past_limit_is_rejected() {
        let mut d = LineDecoder::with_limit(8);
        d.push(b"{\"a\":").unwrap();
        let err = d.push(b"\"bbbb").unwrap_err();
        assert!(matches!(err, WatchError::Decode(msg) if msg.contains("8 bytes")));
        assert!(d.finish().is_none());
    }

    #[test]
    fn limit_applies_per_line_not_per_stream() {
        let mut d = LineDecoder::with_limit(8);
        for _ in 0..10 {
            d.push(b"{\"a\":1}\n").unwrap();
            assert_eq!(d.next_line().unwrap(), b"{\"a\":1}");
        }
        d.push(b"1234").unwrap();
        d.push(b"5678\n123").unwrap();
        assert_eq!(d.next_line().unwrap(), b"12345678");
    }
}
