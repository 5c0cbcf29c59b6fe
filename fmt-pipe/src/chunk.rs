use std::{
    io,
    pin::Pin,
    task::{Context, Poll, ready},
};

use bytes::{Bytes, BytesMut};
use futures::{Stream, StreamExt, stream};
use tokio::io::{AsyncRead, ReadBuf};

/// Re-chunks a byte stream into chunks of exactly `size` bytes; only the last
/// chunk may be shorter.
pub fn fixed_chunks<S>(input: S, size: usize) -> impl Stream<Item = Bytes> + Send
where
    S: Stream<Item = Bytes> + Send + 'static,
{
    assert!(size > 0, "chunk size must be positive");

    let state = (input.boxed(), BytesMut::new(), false);
    stream::unfold(state, move |(mut input, mut pending, mut done)| async move {
        loop {
            if pending.len() >= size {
                let chunk = pending.split_to(size).freeze();
                return Some((chunk, (input, pending, done)));
            }
            if done {
                if pending.is_empty() {
                    return None;
                }
                let chunk = pending.split().freeze();
                return Some((chunk, (input, pending, done)));
            }
            match input.next().await {
                Some(bytes) => pending.extend_from_slice(&bytes),
                None => done = true,
            }
        }
    })
}

/// Caps every read from `inner` at `chunk_size` bytes.
pub struct ChunkedReader<R> {
    inner: R,
    chunk_size: usize,
}

impl<R> ChunkedReader<R> {
    pub fn new(inner: R, chunk_size: usize) -> Self {
        assert!(chunk_size > 0, "chunk size must be positive");
        Self { inner, chunk_size }
    }

    pub fn into_inner(self) -> R {
        self.inner
    }
}

impl<R: AsyncRead + Unpin> AsyncRead for ChunkedReader<R> {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        let this = self.get_mut();
        let limit = this.chunk_size.min(buf.remaining());

        let n = {
            let mut limited = ReadBuf::new(buf.initialize_unfilled_to(limit));
            ready!(Pin::new(&mut this.inner).poll_read(cx, &mut limited))?;
            limited.filled().len()
        };
        buf.advance(n);
        Poll::Ready(Ok(()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::AsyncReadExt;

    #[tokio::test]
    async fn test_fixed_chunks_realigns() {
        let input = stream::iter(vec![
            Bytes::from_static(b"abc"),
            Bytes::from_static(b""),
            Bytes::from_static(b"defghij"),
        ]);
        let chunks: Vec<Bytes> = fixed_chunks(input, 4).collect().await;
        assert_eq!(
            chunks,
            vec![
                Bytes::from_static(b"abcd"),
                Bytes::from_static(b"efgh"),
                Bytes::from_static(b"ij"),
            ]
        );
    }

    #[tokio::test]
    async fn test_fixed_chunks_empty_input() {
        let chunks: Vec<Bytes> = fixed_chunks(stream::empty(), 3).collect().await;
        assert!(chunks.is_empty());
    }

    #[tokio::test]
    async fn test_chunked_reader_caps_reads() -> anyhow::Result<()> {
        let data = vec![7u8; 100];
        let mut reader = ChunkedReader::new(&data[..], 37);

        let mut buf = [0u8; 64];
        assert_eq!(reader.read(&mut buf).await?, 37);
        assert_eq!(reader.read(&mut buf).await?, 37);
        assert_eq!(reader.read(&mut buf).await?, 26);
        assert_eq!(reader.read(&mut buf).await?, 0);
        Ok(())
    }
}
