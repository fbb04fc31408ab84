//! Network-transfer size constraint solver, ported from the source's
//! `constraints.h` (`constrain()`): given network parameters and an
//! optional frame/compression hint, produces a `blocksize`/`read_size`/
//! `write_size` triple satisfying invariant I6 (`read_size <= write_size`,
//! both divide `blocksize`, `write_size <= MTU - protocol_overhead`).
//!
//! `write_size` is the datagram payload length on the wire; `read_size` is
//! the per-packet stride used to place payloads into a destination block
//! (see [`crate::udp::BlockFiller`]). When `read_size < write_size`, only
//! the first `read_size` bytes of each datagram carry real data — the
//! remainder is alignment padding the sender added to round the datagram
//! up, and the receiver drops it.

use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConstraintError {
    #[error("MTU {mtu} too small for protocol overhead {protocol_overhead}")]
    MtuTooSmall { mtu: usize, protocol_overhead: usize },
    #[error("no write_size divides blocksize {blocksize} and fits within {max_write} bytes")]
    NoFittingWriteSize { blocksize: usize, max_write: usize },
    #[error(
        "compression ratio {numerator}/{denominator} does not yield a read_size dividing blocksize {blocksize} at write_size {write_size}"
    )]
    IncompatibleCompression { blocksize: usize, write_size: usize, numerator: usize, denominator: usize },
}

/// Network parameters feeding the solver (the "netparms_type" of the
/// original header).
#[derive(Debug, Clone, Copy)]
pub struct NetworkParams {
    pub mtu: usize,
    pub protocol_overhead: usize,
    pub blocksize: usize,
}

/// Hint that the caller cares about whole disk/tape frames (the header's
/// `BYFRAMESIZE` option): when given, `write_size` must also divide
/// `frame_size`, so a frame is never split across a PSN discontinuity.
#[derive(Debug, Clone, Copy)]
pub struct FrameHint {
    pub frame_size: usize,
}

/// Compression ratio as packed/unpacked bit widths (an
/// `extractor_config`'s `packed_width()` over `bits_per_input_word`).
/// `numerator <= denominator`: compression only ever shrinks.
#[derive(Debug, Clone, Copy)]
pub struct CompressionRatio {
    pub numerator: usize,
    pub denominator: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConstraintSet {
    pub blocksize: usize,
    pub read_size: usize,
    pub write_size: usize,
}

/// Solves for `blocksize`/`read_size`/`write_size` satisfying I6. Starts
/// from the largest 8-byte-aligned `write_size` that fits under the MTU
/// budget (rule #2: datagrams must be a multiple of 8 bytes) and backs off
/// until it also divides `blocksize` and, if `frame` is given, `frame_size`
/// (rule #4: a frame is sent in an integral number of datagrams).
pub fn constrain(
    params: NetworkParams,
    frame: Option<FrameHint>,
    compression: Option<CompressionRatio>,
) -> Result<ConstraintSet, ConstraintError> {
    let max_write = params
        .mtu
        .checked_sub(params.protocol_overhead)
        .ok_or(ConstraintError::MtuTooSmall { mtu: params.mtu, protocol_overhead: params.protocol_overhead })?;

    let mut write_size = (max_write / 8) * 8;
    while write_size > 0 {
        let divides_block = params.blocksize % write_size == 0;
        let divides_frame = frame.is_none_or(|f| f.frame_size % write_size == 0);
        if divides_block && divides_frame {
            break;
        }
        write_size -= 8;
    }
    if write_size == 0 {
        return Err(ConstraintError::NoFittingWriteSize { blocksize: params.blocksize, max_write });
    }

    let read_size = match compression {
        None => write_size,
        Some(ratio) => {
            let scaled = write_size * ratio.numerator / ratio.denominator;
            let exact = scaled * ratio.denominator == write_size * ratio.numerator;
            if scaled == 0 || !exact || params.blocksize % scaled != 0 {
                return Err(ConstraintError::IncompatibleCompression {
                    blocksize: params.blocksize,
                    write_size,
                    numerator: ratio.numerator,
                    denominator: ratio.denominator,
                });
            }
            scaled
        }
    };

    Ok(ConstraintSet { blocksize: params.blocksize, read_size, write_size })
}
