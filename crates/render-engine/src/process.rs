//! Helpers for the ffmpeg child processes.

use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::ChildStderr;
use tokio::task::JoinHandle;

/// Keeps reading a child's stderr so the pipe never fills up, and hands
/// the text over once the child is done.
#[derive(Debug)]
pub(crate) struct StderrCapture {
    task: Option<JoinHandle<String>>,
}

impl StderrCapture {
    pub(crate) fn spawn(stderr: Option<ChildStderr>) -> Self {
        let task = stderr.map(|mut stderr| {
            tokio::spawn(async move {
                let mut raw = Vec::new();
                let _ = stderr.read_to_end(&mut raw).await;
                String::from_utf8_lossy(&raw).trim().to_string()
            })
        });
        Self { task }
    }

    /// Everything the child wrote. Call after the child has exited.
    pub(crate) async fn collect(mut self) -> String {
        match self.task.take() {
            Some(task) => task.await.unwrap_or_default(),
            None => String::new(),
        }
    }
}

impl Drop for StderrCapture {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

/// Fill `buf` from `reader`, stopping early only at end of stream.
/// Returns the number of bytes read.
pub(crate) async fn read_full<R: AsyncRead + Unpin>(
    reader: &mut R,
    buf: &mut [u8],
) -> std::io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        let n = reader.read(&mut buf[filled..]).await?;
        if n == 0 {
            break;
        }
        filled += n;
    }
    Ok(filled)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn read_full_reports_short_reads() {
        let mut reader: &[u8] = b"abcde";
        let mut buf = [0u8; 8];
        assert_eq!(read_full(&mut reader, &mut buf).await.unwrap(), 5);
        assert_eq!(read_full(&mut reader, &mut buf).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn read_full_fills_whole_buffer() {
        let mut reader: &[u8] = b"abcdefgh-rest";
        let mut buf = [0u8; 8];
        assert_eq!(read_full(&mut reader, &mut buf).await.unwrap(), 8);
        assert_eq!(&buf, b"abcdefgh");
    }

    #[tokio::test]
    async fn missing_stderr_collects_empty() {
        assert_eq!(StderrCapture::spawn(None).collect().await, "");
    }
}
