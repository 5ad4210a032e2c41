//! Emulated streaming: one completed response replayed as a chunk sequence.
//!
//! The assembler is a plain [`Iterator`]; each `next()` yields exactly one
//! frame, so a client that disconnects simply stops pulling.

use bytes::Bytes;
use futures::stream::{self, Stream};
use std::convert::Infallible;

use crate::tools::Interception;
use crate::types::openai::{ChatCompletionChunk, FinishReason};
use crate::types::tool::ToolCall;

use super::{sse_frame, ChunkMeta, SSE_DONE};

/// Where the assembler is in its sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssemblerState {
    Start,
    RoleSent,
    ContentSent,
    /// Number of tool-call chunks emitted so far.
    ToolCallsSent(usize),
    Finished,
    Done,
}

/// One emitted element.
#[derive(Debug, Clone)]
pub enum StreamFrame {
    Chunk(ChatCompletionChunk),
    Done,
}

impl StreamFrame {
    pub fn to_sse(&self) -> String {
        match self {
            StreamFrame::Chunk(chunk) => sse_frame(chunk),
            StreamFrame::Done => SSE_DONE.to_string(),
        }
    }

    pub fn chunk(&self) -> Option<&ChatCompletionChunk> {
        match self {
            StreamFrame::Chunk(chunk) => Some(chunk),
            StreamFrame::Done => None,
        }
    }
}

/// Role, then content (if any), then one chunk per tool call, then finish,
/// then the `[DONE]` sentinel.
#[derive(Debug)]
pub struct ChunkAssembler {
    meta: ChunkMeta,
    text: String,
    calls: Vec<ToolCall>,
    state: AssemblerState,
}

impl ChunkAssembler {
    pub fn new(meta: ChunkMeta, text: impl Into<String>, calls: Vec<ToolCall>) -> Self {
        Self {
            meta,
            text: text.into(),
            calls,
            state: AssemblerState::Start,
        }
    }

    pub fn from_interception(meta: ChunkMeta, interception: Interception) -> Self {
        Self::new(
            meta,
            interception.text,
            interception.tool_calls.unwrap_or_default(),
        )
    }

    pub fn state(&self) -> AssemblerState {
        self.state
    }

    pub fn finish_reason(&self) -> FinishReason {
        if self.calls.is_empty() {
            FinishReason::Stop
        } else {
            FinishReason::ToolCalls
        }
    }

    /// SSE byte stream for an HTTP body.
    pub fn into_sse_stream(self) -> impl Stream<Item = Result<Bytes, Infallible>> + Send {
        stream::iter(self.map(|frame| Ok(Bytes::from(frame.to_sse()))))
    }
}

impl Iterator for ChunkAssembler {
    type Item = StreamFrame;

    fn next(&mut self) -> Option<StreamFrame> {
        loop {
            match self.state {
                AssemblerState::Start => {
                    self.state = AssemblerState::RoleSent;
                    return Some(StreamFrame::Chunk(self.meta.role_chunk()));
                }
                AssemblerState::RoleSent => {
                    self.state = AssemblerState::ContentSent;
                    if !self.text.is_empty() {
                        return Some(StreamFrame::Chunk(self.meta.content_chunk(self.text.as_str())));
                    }
                }
                AssemblerState::ContentSent => {
                    self.state = AssemblerState::ToolCallsSent(0);
                }
                AssemblerState::ToolCallsSent(sent) if sent < self.calls.len() => {
                    self.state = AssemblerState::ToolCallsSent(sent + 1);
                    let chunk = self.meta.tool_call_chunk(&self.calls[sent], sent as u32);
                    return Some(StreamFrame::Chunk(chunk));
                }
                AssemblerState::ToolCallsSent(_) => {
                    self.state = AssemblerState::Finished;
                    return Some(StreamFrame::Chunk(self.meta.finish_chunk(self.finish_reason())));
                }
                AssemblerState::Finished => {
                    self.state = AssemblerState::Done;
                    return Some(StreamFrame::Done);
                }
                AssemblerState::Done => return None,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn meta() -> ChunkMeta {
        ChunkMeta::new("gpt-4o")
    }

    #[test]
    fn test_text_only_sequence() {
        let frames: Vec<_> = ChunkAssembler::new(meta(), "Hello", vec![]).collect();
        assert_eq!(frames.len(), 4);
        assert_eq!(frames[1].chunk().unwrap().choices[0].delta.content.as_deref(), Some("Hello"));
        assert_eq!(frames[2].chunk().unwrap().choices[0].finish_reason, Some(FinishReason::Stop));
        assert!(matches!(frames[3], StreamFrame::Done));
    }

    #[test]
    fn test_empty_text_skips_content_chunk() {
        let calls = vec![ToolCall::new("call_1", "f", "{}")];
        let frames: Vec<_> = ChunkAssembler::new(meta(), "", calls).collect();
        // role, tool call, finish, done
        assert_eq!(frames.len(), 4);
        let delta = &frames[1].chunk().unwrap().choices[0].delta;
        assert!(delta.content.is_none());
        assert_eq!(delta.tool_calls.as_ref().unwrap()[0].index, 0);
        assert_eq!(
            frames[2].chunk().unwrap().choices[0].finish_reason,
            Some(FinishReason::ToolCalls)
        );
    }

    #[test]
    fn test_indices_follow_extraction_order() {
        let calls = vec![
            ToolCall::new("a", "first", "{}"),
            ToolCall::new("b", "second", "{}"),
        ];
        let frames: Vec<_> = ChunkAssembler::new(meta(), "x", calls).collect();
        let deltas: Vec<_> = frames
            .iter()
            .filter_map(|f| f.chunk())
            .filter_map(|c| c.choices[0].delta.tool_calls.as_ref())
            .map(|d| (d[0].index, d[0].id.clone().unwrap()))
            .collect();
        assert_eq!(deltas, vec![(0, "a".to_string()), (1, "b".to_string())]);
    }

    #[test]
    fn test_exhausted_assembler_stays_done() {
        let mut assembler = ChunkAssembler::new(meta(), "", vec![]);
        assert_eq!(assembler.by_ref().count(), 3);
        assert_eq!(assembler.state(), AssemblerState::Done);
        assert!(assembler.next().is_none());
    }

    #[test]
    fn test_sse_terminates_with_done() {
        let frames: Vec<String> = ChunkAssembler::new(meta(), "hi", vec![])
            .map(|f| f.to_sse())
            .collect();
        assert!(frames.iter().all(|f| f.starts_with("data: ") && f.ends_with("\n\n")));
        assert_eq!(frames.last().unwrap(), SSE_DONE);
    }
}
