use vlbi_block::Block;

use crate::{boyer_moore::BoyerMoore, frame::FrameFormat};

/// A frame located inside an incoming block. `block` is sliced to start
/// exactly at the sync word (or, for VDIF, at the structural frame
/// boundary) and span exactly one frame.
pub struct Frame {
    pub format: FrameFormat,
    pub ntrack: usize,
    pub block: Block,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Searching,
    Verified,
}

/// Locates dataframe boundaries in an otherwise opaque byte stream.
///
/// Mark4/VLBA/Mark5B: Boyer-Moore scan for the sync pattern; the first
/// hit is only tentative until a second sync word shows up exactly one
/// frame later, at which point the framer switches to `Verified` and
/// stops re-scanning. A miss resumes the search one byte past it.
///
/// VDIF has no fixed sync word, so frames are cut at fixed strides from
/// the start of the stream; validity there is structural, not scanned.
pub struct Framer {
    format: FrameFormat,
    ntrack: usize,
    scanner: Option<BoyerMoore>,
    state: State,
}

impl Framer {
    pub fn new(format: FrameFormat, ntrack: usize) -> Self {
        let sync = format.sync_word();
        let scanner = if sync.is_empty() { None } else { Some(BoyerMoore::new(sync)) };
        let state = if scanner.is_none() { State::Verified } else { State::Searching };
        Self { format, ntrack, scanner, state }
    }

    pub fn is_verified(&self) -> bool {
        self.state == State::Verified
    }

    /// Scans `block` and returns every full frame found in it. Leftover
    /// bytes too short to form another frame are dropped; the next `feed`
    /// call starts a fresh scan over its own block rather than stitching
    /// a frame across a block boundary.
    pub fn feed(&mut self, block: Block) -> Vec<Frame> {
        let frame_size = self.format.frame_size(self.ntrack);
        let bytes = block.as_slice();
        let mut frames = Vec::new();
        let mut cursor = 0usize;

        match &self.scanner {
            None => {
                while cursor + frame_size <= bytes.len() {
                    frames.push(Frame { format: self.format, ntrack: self.ntrack, block: block.sub(cursor, frame_size) });
                    cursor += frame_size;
                }
            }
            Some(scanner) => loop {
                if self.state == State::Verified {
                    if cursor + frame_size > bytes.len() {
                        break;
                    }
                    frames.push(Frame { format: self.format, ntrack: self.ntrack, block: block.sub(cursor, frame_size) });
                    cursor += frame_size;
                    continue;
                }

                let Some(hit) = scanner.find(bytes, cursor) else { break };
                let verify_at = hit + frame_size;
                let sync = self.format.sync_word();
                let verifies = bytes.get(verify_at..verify_at + sync.len()).map(|w| w == sync).unwrap_or(false);
                if verifies {
                    self.state = State::Verified;
                    cursor = hit;
                } else {
                    cursor = hit + 1;
                }
            },
        }

        frames
    }
}
