//! Line framing for server-sent event bodies.

/// Buffers raw bytes and yields complete lines, without `\r`, skipping blank
/// lines and `:` comments.
#[derive(Debug, Default)]
pub(crate) struct LineBuffer {
    buffer: String,
}

impl LineBuffer {
    pub(crate) fn push(&mut self, bytes: &[u8]) -> Vec<String> {
        self.buffer.push_str(&String::from_utf8_lossy(bytes));

        let mut lines = Vec::new();
        while let Some(line_end) = self.buffer.find('\n') {
            let line = self.buffer[..line_end].trim_end_matches('\r').to_string();
            self.buffer.drain(..=line_end);
            if line.is_empty() || line.starts_with(':') {
                continue;
            }
            lines.push(line);
        }
        lines
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_across_chunk_boundaries() {
        let mut buf = LineBuffer::default();
        assert!(buf.push(b"data: {\"a\"").is_empty());
        let lines = buf.push(b":1}\r\n\r\n: keep-alive\nevent: ping\n");
        assert_eq!(lines, vec!["data: {\"a\":1}", "event: ping"]);
    }
}
