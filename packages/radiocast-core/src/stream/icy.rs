//! ICY (Shoutcast) protocol metadata handling.
//!
//! Radio servers asked for `Icy-MetaData: 1` interleave a metadata block
//! after every `icy-metaint` audio bytes. [`IcyDemuxer`] splits such a stream
//! back into plain audio and the `StreamTitle` values it carries.

use bytes::{Bytes, BytesMut};

use crate::protocol_constants::ICY_BLOCK_SIZE;

/// Output of one [`IcyDemuxer::push`] call.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct DemuxedChunk {
    /// Audio bytes with metadata blocks removed.
    pub audio: Bytes,
    /// Non-empty stream titles completed within this chunk, in order.
    pub titles: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DemuxState {
    /// Copying audio; `remaining` bytes until the next length byte.
    Audio { remaining: usize },
    /// The next byte is the metadata length (in 16-byte blocks).
    Length,
    /// Collecting `remaining` metadata bytes.
    Metadata { remaining: usize },
}

/// Stateful splitter for ICY-interleaved audio streams.
///
/// Chunk boundaries are arbitrary: a metadata block may straddle any number
/// of pushes. Each instance should be used for a single stream.
pub struct IcyDemuxer {
    metaint: Option<usize>,
    state: DemuxState,
    /// Partially received metadata block.
    metadata: Vec<u8>,
    /// Scratch buffer reused across push() calls.
    output_buffer: BytesMut,
}

impl IcyDemuxer {
    /// Creates a demuxer for the given `icy-metaint`.
    ///
    /// `None` (or zero) means the server sends no metadata and every byte is
    /// audio.
    #[must_use]
    pub fn new(metaint: Option<usize>) -> Self {
        let metaint = metaint.filter(|m| *m > 0);
        Self {
            metaint,
            state: DemuxState::Audio {
                remaining: metaint.unwrap_or(0),
            },
            metadata: Vec::new(),
            output_buffer: BytesMut::new(),
        }
    }

    /// Splits a chunk into audio and completed stream titles.
    pub fn push(&mut self, chunk: &[u8]) -> DemuxedChunk {
        let Some(metaint) = self.metaint else {
            return DemuxedChunk {
                audio: Bytes::copy_from_slice(chunk),
                titles: Vec::new(),
            };
        };

        self.output_buffer.reserve(chunk.len());
        let mut titles = Vec::new();
        let mut remaining = chunk;

        while !remaining.is_empty() {
            match self.state {
                DemuxState::Audio { remaining: until_meta } => {
                    let n = until_meta.min(remaining.len());
                    self.output_buffer.extend_from_slice(&remaining[..n]);
                    remaining = &remaining[n..];
                    self.state = if n == until_meta {
                        DemuxState::Length
                    } else {
                        DemuxState::Audio {
                            remaining: until_meta - n,
                        }
                    };
                }
                DemuxState::Length => {
                    let len = remaining[0] as usize * ICY_BLOCK_SIZE;
                    remaining = &remaining[1..];
                    self.state = if len == 0 {
                        DemuxState::Audio { remaining: metaint }
                    } else {
                        self.metadata.clear();
                        DemuxState::Metadata { remaining: len }
                    };
                }
                DemuxState::Metadata { remaining: left } => {
                    let n = left.min(remaining.len());
                    self.metadata.extend_from_slice(&remaining[..n]);
                    remaining = &remaining[n..];
                    if n == left {
                        if let Some(title) = parse_stream_title(&self.metadata) {
                            titles.push(title);
                        }
                        self.state = DemuxState::Audio { remaining: metaint };
                    } else {
                        self.state = DemuxState::Metadata { remaining: left - n };
                    }
                }
            }
        }

        DemuxedChunk {
            audio: self.output_buffer.split().freeze(),
            titles,
        }
    }
}

/// Extracts the `StreamTitle` value from a metadata block.
///
/// Returns `None` when the block carries no title or an empty one.
pub(crate) fn parse_stream_title(block: &[u8]) -> Option<String> {
    let end = block.iter().rposition(|b| *b != 0).map_or(0, |i| i + 1);
    let text = String::from_utf8_lossy(&block[..end]);

    const KEY: &str = "StreamTitle='";
    let start = text.find(KEY)? + KEY.len();
    let rest = &text[start..];
    // Titles may contain apostrophes, so the terminator is "';", not "'"
    let value = match rest.find("';") {
        Some(i) => &rest[..i],
        None => rest.trim_end_matches(';').trim_end_matches('\''),
    };

    let value = value.trim();
    if value.is_empty() {
        log::trace!("[ICY] Empty StreamTitle");
        None
    } else {
        Some(value.to_string())
    }
}
