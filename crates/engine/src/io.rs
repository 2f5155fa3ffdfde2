use std::{
    io,
    pin::Pin,
    sync::{Arc, Mutex},
    task::{Context, Poll},
};

use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};

/// Plaintext exchanged with the server.
#[derive(Debug, Default)]
pub(crate) struct Recording {
    pub(crate) sent: Vec<u8>,
    pub(crate) received: Vec<u8>,
    pub(crate) limit_exceeded: bool,
}

/// A stream recording all data written to and read from it.
///
/// Writes beyond `max_sent` and reads beyond `max_recv` fail, so that the
/// transcript never exceeds the configured limits.
pub(crate) struct RecordingIo<S> {
    inner: S,
    recording: Arc<Mutex<Recording>>,
    max_sent: usize,
    max_recv: usize,
}

impl<S> RecordingIo<S> {
    pub(crate) fn new(inner: S, max_sent: usize, max_recv: usize) -> Self {
        Self {
            inner,
            recording: Arc::default(),
            max_sent,
            max_recv,
        }
    }

    /// Returns a handle to the recording.
    pub(crate) fn recording(&self) -> Arc<Mutex<Recording>> {
        self.recording.clone()
    }

    fn lock(&self) -> io::Result<std::sync::MutexGuard<'_, Recording>> {
        self.recording
            .lock()
            .map_err(|_| io::Error::other("transcript recording is poisoned"))
    }
}

impl<S: AsyncRead + Unpin> AsyncRead for RecordingIo<S> {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        let this = self.get_mut();
        let filled = buf.filled().len();

        match Pin::new(&mut this.inner).poll_read(cx, buf) {
            Poll::Ready(Ok(())) => {
                let data = &buf.filled()[filled..];
                let mut recording = this.lock()?;

                if recording.received.len() + data.len() > this.max_recv {
                    recording.limit_exceeded = true;
                    // A failed read must not hand out any data.
                    buf.set_filled(filled);
                    return Poll::Ready(Err(io::Error::other(format!(
                        "received data exceeds limit of {} bytes",
                        this.max_recv
                    ))));
                }

                recording.received.extend_from_slice(data);
                Poll::Ready(Ok(()))
            }
            other => other,
        }
    }
}

impl<S: AsyncWrite + Unpin> AsyncWrite for RecordingIo<S> {
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        let this = self.get_mut();

        {
            let mut recording = this.lock()?;
            if recording.sent.len() + buf.len() > this.max_sent {
                recording.limit_exceeded = true;
                return Poll::Ready(Err(io::Error::other(format!(
                    "sent data exceeds limit of {} bytes",
                    this.max_sent
                ))));
            }
        }

        match Pin::new(&mut this.inner).poll_write(cx, buf) {
            Poll::Ready(Ok(n)) => {
                this.lock()?.sent.extend_from_slice(&buf[..n]);
                Poll::Ready(Ok(n))
            }
            other => other,
        }
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.get_mut().inner).poll_flush(cx)
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.get_mut().inner).poll_shutdown(cx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    #[tokio::test]
    async fn test_records_both_directions() {
        let (client, mut server) = tokio::io::duplex(1024);
        let mut io = RecordingIo::new(client, 16, 16);
        let recording = io.recording();

        io.write_all(b"ping").await.unwrap();
        let mut buf = [0u8; 4];
        server.read_exact(&mut buf).await.unwrap();
        server.write_all(b"pong").await.unwrap();
        io.read_exact(&mut buf).await.unwrap();

        let recording = recording.lock().unwrap();
        assert_eq!(recording.sent, b"ping");
        assert_eq!(recording.received, b"pong");
        assert!(!recording.limit_exceeded);
    }

    #[tokio::test]
    async fn test_sent_limit() {
        let (client, _server) = tokio::io::duplex(1024);
        let mut io = RecordingIo::new(client, 4, 16);
        let recording = io.recording();

        io.write_all(b"abcd").await.unwrap();
        assert!(io.write_all(b"e").await.is_err());

        let recording = recording.lock().unwrap();
        assert_eq!(recording.sent, b"abcd");
        assert!(recording.limit_exceeded);
    }

    #[tokio::test]
    async fn test_recv_limit() {
        let (client, mut server) = tokio::io::duplex(1024);
        let mut io = RecordingIo::new(client, 16, 4);
        let recording = io.recording();

        server.write_all(b"too long").await.unwrap();
        drop(server);

        let mut buf = Vec::new();
        assert!(io.read_to_end(&mut buf).await.is_err());
        assert!(buf.is_empty());

        let recording = recording.lock().unwrap();
        assert!(recording.limit_exceeded);
        assert!(recording.received.is_empty());
    }

    #[tokio::test]
    async fn test_recv_limit_fills_nothing() {
        let (client, mut server) = tokio::io::duplex(1024);
        let mut io = RecordingIo::new(client, 16, 2);

        server.write_all(b"abc").await.unwrap();

        let mut buf = [0u8; 8];
        let mut read_buf = ReadBuf::new(&mut buf);
        let result =
            std::future::poll_fn(|cx| Pin::new(&mut io).poll_read(cx, &mut read_buf)).await;

        assert!(result.is_err());
        assert!(read_buf.filled().is_empty());
    }
}
