//! Incremental line reader for the engine's diagnostic stream.
//!
//! ffmpeg terminates its periodic status line with `\r` rather than `\n`, so
//! both bytes end a line here. Bytes are decoded lossily; one bad byte must not
//! stop progress reporting.

use tokio::io::{AsyncBufRead, AsyncBufReadExt};

/// Lazy, finite sequence of diagnostic lines.
///
/// Yields `None` once the underlying stream reaches EOF. The sequence cannot be
/// restarted.
pub struct DiagnosticLines<R> {
    reader: R,
    pending: Vec<u8>,
    done: bool,
}

impl<R: AsyncBufRead + Unpin> DiagnosticLines<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            pending: Vec::new(),
            done: false,
        }
    }

    /// Next non-empty line, without its terminator.
    pub async fn next_line(&mut self) -> std::io::Result<Option<String>> {
        loop {
            if self.done {
                return Ok(None);
            }

            let (consumed, terminated) = {
                let buf = self.reader.fill_buf().await?;
                if buf.is_empty() {
                    self.done = true;
                    if self.pending.is_empty() {
                        return Ok(None);
                    }
                    return Ok(Some(self.take_pending()));
                }
                match buf.iter().position(|b| *b == b'\n' || *b == b'\r') {
                    Some(idx) => {
                        self.pending.extend_from_slice(&buf[..idx]);
                        (idx + 1, true)
                    }
                    None => {
                        self.pending.extend_from_slice(buf);
                        (buf.len(), false)
                    }
                }
            };
            self.reader.consume(consumed);

            // "\r\n" produces an empty line between the two bytes; skip it.
            if terminated && !self.pending.is_empty() {
                return Ok(Some(self.take_pending()));
            }
        }
    }

    fn take_pending(&mut self) -> String {
        let line = String::from_utf8_lossy(&self.pending).into_owned();
        self.pending.clear();
        line
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::BufReader;

    async fn collect(input: &[u8]) -> Vec<String> {
        let mut lines = DiagnosticLines::new(BufReader::new(input));
        let mut out = Vec::new();
        while let Some(line) = lines.next_line().await.unwrap() {
            out.push(line);
        }
        out
    }

    #[tokio::test]
    async fn test_splits_on_newline_and_carriage_return() {
        let input = b"Duration: 00:00:10.00\nframe=1 time=00:00:01.00\rframe=2 time=00:00:02.00\r\nend";
        assert_eq!(
            collect(input).await,
            vec![
                "Duration: 00:00:10.00",
                "frame=1 time=00:00:01.00",
                "frame=2 time=00:00:02.00",
                "end",
            ]
        );
    }

    #[tokio::test]
    async fn test_empty_stream() {
        assert!(collect(b"").await.is_empty());
        assert!(collect(b"\r\n\n").await.is_empty());
    }

    #[tokio::test]
    async fn test_invalid_utf8_is_replaced() {
        let lines = collect(b"bad \xff byte\nok\n").await;
        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with("bad "));
        assert_eq!(lines[1], "ok");
    }

    #[tokio::test]
    async fn test_lines_spanning_buffer_refills() {
        let long = "x".repeat(20_000);
        let input = format!("{}\nshort\n", long);
        let mut lines = DiagnosticLines::new(BufReader::with_capacity(16, input.as_bytes()));

        assert_eq!(lines.next_line().await.unwrap().as_deref(), Some(long.as_str()));
        assert_eq!(lines.next_line().await.unwrap().as_deref(), Some("short"));
        assert_eq!(lines.next_line().await.unwrap(), None);
        assert_eq!(lines.next_line().await.unwrap(), None);
    }
}
