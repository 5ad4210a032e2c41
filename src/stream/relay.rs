//! True streaming: upstream text chunks forwarded as content deltas.
//!
//! The upstream stream endpoint returns raw text. Chunk boundaries may split a
//! multi-byte UTF-8 sequence, so undecodable tails are carried into the next
//! chunk. An upstream failure mid-stream is logged, any carried bytes are flushed,
//! and the client still gets a regular `stop` finish.

use bytes::Bytes;
use futures::stream::{self, Stream, StreamExt};
use std::convert::Infallible;
use tracing::warn;

use crate::types::openai::FinishReason;
use crate::BoxStream;

use super::{sse_bytes, ChunkMeta, SSE_DONE};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Role,
    Body,
    Finish,
    Sentinel,
    Closed,
}

struct Relay {
    upstream: BoxStream<'static, Bytes>,
    meta: ChunkMeta,
    decoder: Utf8Carry,
    phase: Phase,
}

/// Forward `upstream` as SSE chunks.
pub fn relay_upstream(
    meta: ChunkMeta,
    upstream: BoxStream<'static, Bytes>,
) -> impl Stream<Item = Result<Bytes, Infallible>> + Send {
    let relay = Relay {
        upstream,
        meta,
        decoder: Utf8Carry::default(),
        phase: Phase::Role,
    };
    stream::unfold(relay, |mut r| async move {
        loop {
            match r.phase {
                Phase::Role => {
                    r.phase = Phase::Body;
                    let frame = sse_bytes(&r.meta.role_chunk());
                    return Some((Ok(frame), r));
                }
                Phase::Body => match r.upstream.next().await {
                    Some(Ok(bytes)) => {
                        let text = r.decoder.push(&bytes);
                        if !text.is_empty() {
                            let frame = sse_bytes(&r.meta.content_chunk(text));
                            return Some((Ok(frame), r));
                        }
                    }
                    next => {
                        if let Some(Err(e)) = next {
                            warn!(model = %r.meta.model, "Upstream stream failed: {}", e);
                        }
                        // Carried bytes are flushed before finishing, on error or end.
                        r.phase = Phase::Finish;
                        let rest = r.decoder.finish();
                        if !rest.is_empty() {
                            let frame = sse_bytes(&r.meta.content_chunk(rest));
                            return Some((Ok(frame), r));
                        }
                    }
                },
                Phase::Finish => {
                    r.phase = Phase::Sentinel;
                    let frame = sse_bytes(&r.meta.finish_chunk(FinishReason::Stop));
                    return Some((Ok(frame), r));
                }
                Phase::Sentinel => {
                    r.phase = Phase::Closed;
                    return Some((Ok(Bytes::from_static(SSE_DONE.as_bytes())), r));
                }
                Phase::Closed => return None,
            }
        }
    })
}

/// Incremental UTF-8 decoder that holds back an incomplete trailing sequence.
#[derive(Debug, Default)]
pub(crate) struct Utf8Carry {
    pending: Vec<u8>,
}

impl Utf8Carry {
    /// Decode as much as possible; invalid bytes become U+FFFD.
    pub(crate) fn push(&mut self, bytes: &[u8]) -> String {
        self.pending.extend_from_slice(bytes);
        let mut out = String::new();
        let mut start = 0;
        loop {
            match std::str::from_utf8(&self.pending[start..]) {
                Ok(s) => {
                    out.push_str(s);
                    start = self.pending.len();
                    break;
                }
                Err(e) => {
                    let valid = start + e.valid_up_to();
                    out.push_str(&String::from_utf8_lossy(&self.pending[start..valid]));
                    match e.error_len() {
                        Some(bad) => {
                            out.push(char::REPLACEMENT_CHARACTER);
                            start = valid + bad;
                        }
                        // Truncated sequence at the end: wait for more bytes.
                        None => {
                            start = valid;
                            break;
                        }
                    }
                }
            }
        }
        self.pending.drain(..start);
        out
    }

    /// Flush whatever is left at end of stream.
    pub(crate) fn finish(&mut self) -> String {
        let rest = String::from_utf8_lossy(&self.pending).into_owned();
        self.pending.clear();
        rest
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Error;
    use crate::transport::TransportError;

    async fn collect(upstream: Vec<crate::Result<Bytes>>) -> Vec<String> {
        let stream: BoxStream<'static, Bytes> = Box::pin(stream::iter(upstream));
        relay_upstream(ChunkMeta::new("gpt4o"), stream)
            .map(|frame| String::from_utf8(frame.unwrap().to_vec()).unwrap())
            .collect()
            .await
    }

    #[test]
    fn test_utf8_split_across_chunks() {
        let bytes = "héllo".as_bytes();
        let mut carry = Utf8Carry::default();
        let first = carry.push(&bytes[..2]);
        let second = carry.push(&bytes[2..]);
        assert_eq!(first, "h");
        assert_eq!(second, "éllo");
        assert_eq!(carry.finish(), "");
    }

    #[test]
    fn test_invalid_bytes_replaced() {
        let mut carry = Utf8Carry::default();
        assert_eq!(carry.push(&[b'a', 0xff, b'b']), "a\u{fffd}b");
    }

    #[tokio::test]
    async fn test_relay_sequence() {
        let frames = collect(vec![Ok(Bytes::from("Hel")), Ok(Bytes::from("lo"))]).await;
        assert_eq!(frames.len(), 5);
        assert!(frames[0].contains("\"role\":\"assistant\""));
        assert!(frames[1].contains("\"content\":\"Hel\""));
        assert!(frames[3].contains("\"finish_reason\":\"stop\""));
        assert_eq!(frames[4], SSE_DONE);
    }

    #[tokio::test]
    async fn test_relay_error_still_finishes() {
        let frames = collect(vec![
            Ok(Bytes::from("partial")),
            Err(Error::Transport(TransportError::Other("reset".into()))),
            Ok(Bytes::from("never")),
        ])
        .await;
        assert_eq!(frames.len(), 4);
        assert!(!frames.iter().any(|f| f.contains("never")));
        assert_eq!(frames.last().unwrap(), SSE_DONE);
    }

    #[tokio::test]
    async fn test_relay_error_flushes_carried_bytes() {
        let e_acute = "é".as_bytes();
        let frames = collect(vec![
            Ok(Bytes::from("caf")),
            Ok(Bytes::copy_from_slice(&e_acute[..1])),
            Err(Error::Transport(TransportError::Other("reset".into()))),
        ])
        .await;
        // role, "caf", flushed tail, finish, done
        assert_eq!(frames.len(), 5);
        assert!(frames[1].contains("\"content\":\"caf\""));
        assert!(frames[2].contains("\"content\":\"\u{fffd}\""));
        assert!(frames[3].contains("\"finish_reason\":\"stop\""));
        assert_eq!(frames[4], SSE_DONE);
    }
}
