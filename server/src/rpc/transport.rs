//! Line-delimited transport for JSON-RPC 2.0 messages.

use super::protocol::JsonRpcResponse;
use std::io;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};

/// Newline-delimited JSON transport over any async reader/writer pair
pub struct LineTransport<R, W> {
    reader: R,
    writer: W,
}

impl LineTransport<BufReader<tokio::io::Stdin>, tokio::io::Stdout> {
    /// Transport over the process's stdin/stdout
    pub fn stdio() -> Self {
        Self::new(BufReader::new(tokio::io::stdin()), tokio::io::stdout())
    }
}

impl<R, W> LineTransport<R, W>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    pub fn new(reader: R, writer: W) -> Self {
        Self { reader, writer }
    }

    /// Next non-empty line, or `None` at EOF
    pub async fn read_line(&mut self) -> io::Result<Option<String>> {
        loop {
            let mut line = String::new();
            let bytes_read = self.reader.read_line(&mut line).await?;

            if bytes_read == 0 {
                return Ok(None); // EOF
            }

            let line = line.trim();
            if !line.is_empty() {
                return Ok(Some(line.to_string()));
            }
        }
    }

    /// Write one response as a single line
    pub async fn write_response(&mut self, response: &JsonRpcResponse) -> io::Result<()> {
        let json = serde_json::to_string(response)?;
        self.writer.write_all(json.as_bytes()).await?;
        self.writer.write_all(b"\n").await?;
        self.writer.flush().await
    }

    pub fn into_writer(self) -> W {
        self.writer
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_lines_skips_blank() {
        tokio_test::block_on(async {
            let input: &[u8] = b"\n  \n{\"a\":1}\n\n{\"b\":2}";
            let mut transport = LineTransport::new(input, Vec::new());

            assert_eq!(transport.read_line().await.unwrap().as_deref(), Some("{\"a\":1}"));
            assert_eq!(transport.read_line().await.unwrap().as_deref(), Some("{\"b\":2}"));
            assert_eq!(transport.read_line().await.unwrap(), None);
        });
    }

    #[test]
    fn test_write_response_appends_newline() {
        tokio_test::block_on(async {
            let input: &[u8] = b"";
            let mut transport = LineTransport::new(input, Vec::new());
            let response = JsonRpcResponse::success(
                Some(serde_json::json!(7)),
                serde_json::json!({"status": "ok"}),
            );
            transport.write_response(&response).await.unwrap();

            let written = String::from_utf8(transport.into_writer()).unwrap();
            assert!(written.ends_with('\n'));
            assert_eq!(written.lines().count(), 1);
            assert!(written.contains("\"id\":7"));
        });
    }
}
