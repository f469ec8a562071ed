//! Draining of streamed response bodies

use bytes::{Bytes, BytesMut};
use futures::{Stream, TryStreamExt};

/// Collect a chunked body into one contiguous buffer.
///
/// Chunks are kept in arrival order. The first stream error aborts the whole
/// read and nothing collected so far is returned.
pub async fn collect_body<S, E>(stream: S) -> std::result::Result<Bytes, E>
where
    S: Stream<Item = std::result::Result<Bytes, E>>,
{
    futures::pin_mut!(stream);

    let mut chunks = Vec::new();
    let mut total = 0;
    while let Some(chunk) = stream.try_next().await? {
        total += chunk.len();
        chunks.push(chunk);
    }

    Ok(concat(chunks, total))
}

fn concat(mut chunks: Vec<Bytes>, total: usize) -> Bytes {
    match chunks.len() {
        0 => Bytes::new(),
        1 => chunks.pop().unwrap_or_default(),
        _ => {
            let mut buffer = BytesMut::with_capacity(total);
            for chunk in chunks {
                buffer.extend_from_slice(&chunk);
            }
            buffer.freeze()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::stream;

    #[tokio::test]
    async fn concatenates_chunks_in_order() {
        let chunks: Vec<Result<Bytes, std::io::Error>> = vec![
            Ok(Bytes::from_static(b"hel")),
            Ok(Bytes::from_static(b"")),
            Ok(Bytes::from_static(b"lo ")),
            Ok(Bytes::from_static(b"world")),
        ];

        let body = collect_body(stream::iter(chunks)).await.unwrap();
        assert_eq!(body, Bytes::from_static(b"hello world"));
    }

    #[tokio::test]
    async fn empty_stream_yields_empty_buffer() {
        let chunks: Vec<Result<Bytes, std::io::Error>> = Vec::new();
        let body = collect_body(stream::iter(chunks)).await.unwrap();
        assert!(body.is_empty());
    }

    #[tokio::test]
    async fn first_error_rejects_the_read() {
        let chunks = vec![
            Ok(Bytes::from_static(b"partial")),
            Err(std::io::Error::new(std::io::ErrorKind::UnexpectedEof, "cut")),
            Ok(Bytes::from_static(b"never seen")),
        ];

        let err = collect_body(stream::iter(chunks)).await.unwrap_err();
        assert_eq!(err.kind(), std::io::ErrorKind::UnexpectedEof);
    }
}
