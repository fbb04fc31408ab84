//! UDP-sequence receivers: `udps` (reordering) and `udpsnor` (no reordering).
//!
//! Both protocols prefix every datagram with a 64-bit big-endian packet
//! sequence number (PSN). A receiver tracks one [`SenderState`] per peer
//! address, capped at [`MAX_SENDERS`] entries the way the source's
//! `per_sender_type per_sender[8]` is a fixed-size array, not a growable
//! map.
//!
//! Each datagram's payload is `write_size` bytes on the wire; only the
//! first `read_size` bytes of it are real data (see
//! [`crate::constraints`]) and are placed at `(psn - base) * read_size`
//! in a block handed out by a [`vlbi_block::BlockPool`] — the rest, if
//! any, is sender-side alignment padding the receiver drops.

use std::{
    collections::BTreeMap,
    io,
    net::{SocketAddr, UdpSocket},
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
};

use indexmap::IndexMap;
use tracing::warn;
use vlbi_block::{Block, BlockPool};

use crate::error::NetError;

pub const PSN_SIZE: usize = 8;
pub const MAX_SENDERS: usize = 8;

/// A short well-known list of keep-alive token bytes sent back to a
/// sender every `ack_period` packets. Content is arbitrary: the purpose
/// is ARP/NAT keep-alive, not reliability, so the receiver just rotates
/// through them.
const ACK_TOKENS: [u8; 4] = [0xa5, 0x5a, 0xc3, 0x3c];

/// Sizing and policy shared by both receiver variants.
#[derive(Debug, Clone, Copy)]
pub struct ReceiverConfig {
    /// Stride, in bytes, of one PSN's slot inside a destination block.
    pub read_size: usize,
    /// Bytes of payload carried per datagram on the wire.
    pub write_size: usize,
    /// Packets between keep-alive acks; `0` disables acks.
    pub ack_period: u64,
    /// On a read failure with some packets already stored, whether to
    /// push the partially-filled block downstream (sliced to its written
    /// extent) instead of discarding it.
    pub allow_variable_block_size: bool,
}

/// Per-sender bookkeeping: gap/out-of-order/restart counters are exposed as
/// plain `u64` snapshots rather than atomics, since a sender's state is only
/// ever touched by the one worker thread that owns the socket; the
/// aggregated totals a control-protocol `?` query reads are separate
/// [`AtomicU64`] fields on the receiver.
#[derive(Debug, Clone, Copy, Default)]
pub struct SenderStats {
    pub npacket: u64,
    pub ngap: u64,
    pub nooo: u64,
    pub ooo_sum: u64,
    pub nrestart: u64,
    pub last_ack_seq: u64,
}

/// Fills destination blocks pulled from a [`BlockPool`] at a fixed
/// `read_size` stride, PSN-indexed from whatever PSN opened the current
/// block. Per §4.5 step 5: a write that would land past the current
/// block's end instead completes it and starts a fresh one for that PSN.
struct BlockFiller {
    pool: Arc<BlockPool>,
    read_size: usize,
    allow_variable_block_size: bool,
    current: Option<Block>,
    base_psn: u64,
    written_slots: usize,
}

impl BlockFiller {
    fn new(pool: Arc<BlockPool>, read_size: usize, allow_variable_block_size: bool) -> Self {
        Self { pool, read_size, allow_variable_block_size, current: None, base_psn: 0, written_slots: 0 }
    }

    fn open_block(&mut self, psn: u64) {
        self.current = Some(self.pool.get());
        self.base_psn = psn;
        self.written_slots = 0;
    }

    /// Writes the first `read_size` bytes of `payload` (zero-filled if
    /// shorter) at this PSN's slot. Returns a completed block when this
    /// PSN doesn't fit in the currently open one.
    fn accept(&mut self, psn: u64, payload: &[u8]) -> Option<Block> {
        if self.current.is_none() {
            self.open_block(psn);
        }
        let capacity = self.current.as_ref().unwrap().len() / self.read_size;
        let mut slot = psn.saturating_sub(self.base_psn) as usize;

        let mut completed = None;
        if slot >= capacity {
            completed = self.current.take();
            self.open_block(psn);
            slot = 0;
        }

        let block = self.current.as_mut().unwrap();
        let pos = slot * self.read_size;
        let slice = block.as_mut_slice();
        let n = payload.len().min(self.read_size);
        slice[pos..pos + n].copy_from_slice(&payload[..n]);
        for b in &mut slice[pos + n..pos + self.read_size] {
            *b = 0;
        }
        self.written_slots = self.written_slots.max(slot + 1);

        completed
    }

    /// Partial-block policy on a read failure: returns the in-progress
    /// block sliced to its written extent if configured to allow
    /// variable-size blocks, else discards it.
    fn finish_partial(&mut self) -> Option<Block> {
        let block = self.current.take()?;
        let written = self.written_slots * self.read_size;
        self.written_slots = 0;
        if self.allow_variable_block_size && written > 0 { Some(block.sub(0, written.min(block.len()))) } else { None }
    }

    /// Unconditionally hands back whatever is in progress, regardless of
    /// fullness — used at end-of-stream so the last block isn't stranded
    /// waiting for a PSN that will never arrive.
    fn flush(&mut self) -> Option<Block> {
        self.current.take()
    }

    /// Abandons the in-progress block, e.g. on sender restart.
    fn reset(&mut self) {
        self.current = None;
        self.written_slots = 0;
    }
}

struct SenderState {
    expected_psn: u64,
    stats: SenderStats,
    filler: BlockFiller,
}

impl SenderState {
    fn new(first_psn: u64, pool: Arc<BlockPool>, read_size: usize, allow_variable_block_size: bool) -> Self {
        Self {
            expected_psn: first_psn,
            stats: SenderStats { npacket: 0, ..Default::default() },
            filler: BlockFiller::new(pool, read_size, allow_variable_block_size),
        }
    }
}

/// A PSN so far behind `expected` that it can only mean the sender process
/// restarted (e.g. a new recording was armed) rather than plain reordering.
fn looks_like_restart(expected: u64, got: u64) -> bool {
    got < expected && expected - got > (1 << 20)
}

fn split_psn(datagram: &[u8]) -> Option<(u64, &[u8])> {
    if datagram.len() < PSN_SIZE {
        return None;
    }
    let (head, payload) = datagram.split_at(PSN_SIZE);
    Some((u64::from_be_bytes(head.try_into().unwrap()), payload))
}

/// Sends a keep-alive ack datagram every `ack_period` packets, per §4.5
/// step 4. The ack's own content never matters; it just has to reach the
/// sender to keep ARP/NAT state warm.
fn maybe_send_ack(socket: &UdpSocket, sender: SocketAddr, stats: &mut SenderStats, ack_period: u64) {
    if ack_period == 0 || stats.npacket - stats.last_ack_seq < ack_period {
        return;
    }
    let token = ACK_TOKENS[(stats.npacket / ack_period) as usize % ACK_TOKENS.len()];
    if let Err(e) = socket.send_to(&[token], sender) {
        warn!(%e, "failed to send keep-alive ack");
    }
    stats.last_ack_seq = stats.npacket;
}

/// Outcome of one `recv_one` call.
#[derive(Debug)]
pub enum RecvOutcome {
    /// An in-order (or gap-advancing) payload was accepted into the
    /// in-progress block; nothing completed yet.
    Accepted { sender: SocketAddr },
    /// Accepted, and this write completed the in-progress block, which is
    /// handed back ready for downstream handoff.
    BlockReady { sender: SocketAddr, block: Block },
    /// The packet was older than what has already been delivered for this
    /// sender and was dropped.
    Stale,
    /// `recvmsg` was interrupted (EINTR) or the socket was closed out from
    /// under the reader (EBADF, via a cancel callback closing the fd).
    /// Per the partial-block policy, whatever was already written to the
    /// active sender's block is returned sliced to its written extent if
    /// configured to allow variable-size blocks, else dropped.
    Interrupted { partial: Option<Block> },
}

/// No-reorder UDP-PSN receiver, ported from the source's `udpsnorreader`:
/// anything arriving out of order relative to what has already been
/// accepted for that sender is dropped rather than buffered.
pub struct UdpSequentialReceiver {
    socket: UdpSocket,
    pool: Arc<BlockPool>,
    config: ReceiverConfig,
    senders: IndexMap<SocketAddr, SenderState>,
    last_active: Option<SocketAddr>,
    total_gap: AtomicU64,
    total_ooo: AtomicU64,
    total_restart: AtomicU64,
}

impl UdpSequentialReceiver {
    pub fn new(socket: UdpSocket, pool: Arc<BlockPool>, config: ReceiverConfig) -> Self {
        Self {
            socket,
            pool,
            config,
            senders: IndexMap::with_capacity(MAX_SENDERS),
            last_active: None,
            total_gap: AtomicU64::new(0),
            total_ooo: AtomicU64::new(0),
            total_restart: AtomicU64::new(0),
        }
    }

    pub fn total_gap(&self) -> u64 {
        self.total_gap.load(Ordering::Relaxed)
    }

    pub fn total_out_of_order(&self) -> u64 {
        self.total_ooo.load(Ordering::Relaxed)
    }

    pub fn total_restarts(&self) -> u64 {
        self.total_restart.load(Ordering::Relaxed)
    }

    fn finish_active_partial(&mut self) -> Option<Block> {
        let addr = self.last_active.take()?;
        self.senders.get_mut(&addr)?.filler.finish_partial()
    }

    /// Receives and processes exactly one datagram.
    pub fn recv_one(&mut self) -> Result<RecvOutcome, NetError> {
        let mut buf = vec![0u8; PSN_SIZE + self.config.write_size + 64];
        let (n, sender) = match self.socket.recv_from(&mut buf) {
            Ok(v) => v,
            Err(e) if matches!(e.kind(), io::ErrorKind::Interrupted) => {
                return Ok(RecvOutcome::Interrupted { partial: self.finish_active_partial() });
            }
            Err(e) if e.raw_os_error() == Some(libc::EBADF) => {
                return Ok(RecvOutcome::Interrupted { partial: self.finish_active_partial() });
            }
            Err(e) => return Err(NetError::Io(e)),
        };
        let Some((psn, payload)) = split_psn(&buf[..n]) else {
            warn!(len = n, "udpsnor: short datagram missing PSN prefix, dropping");
            return Ok(RecvOutcome::Stale);
        };

        if !self.senders.contains_key(&sender) && self.senders.len() >= MAX_SENDERS {
            self.senders.shift_remove_index(0);
        }
        let (pool, read_size, allow_variable) = (self.pool.clone(), self.config.read_size, self.config.allow_variable_block_size);
        let state =
            self.senders.entry(sender).or_insert_with(|| SenderState::new(psn, pool, read_size, allow_variable));
        self.last_active = Some(sender);

        state.stats.npacket += 1;

        if looks_like_restart(state.expected_psn, psn) {
            state.stats.nrestart += 1;
            self.total_restart.fetch_add(1, Ordering::Relaxed);
            state.expected_psn = psn;
            state.filler.reset();
        }

        if psn < state.expected_psn {
            state.stats.nooo += 1;
            state.stats.ooo_sum += state.expected_psn - psn;
            self.total_ooo.fetch_add(1, Ordering::Relaxed);
            return Ok(RecvOutcome::Stale);
        }
        if psn > state.expected_psn {
            let gap = psn - state.expected_psn;
            state.stats.ngap += gap;
            self.total_gap.fetch_add(gap, Ordering::Relaxed);
        }
        state.expected_psn = psn + 1;

        maybe_send_ack(&self.socket, sender, &mut state.stats, self.config.ack_period);

        match state.filler.accept(psn, payload) {
            Some(block) => Ok(RecvOutcome::BlockReady { sender, block }),
            None => Ok(RecvOutcome::Accepted { sender }),
        }
    }

    /// Hands back a sender's in-progress block regardless of fullness,
    /// e.g. when the transfer is being torn down cleanly.
    pub fn flush(&mut self, addr: &SocketAddr) -> Option<Block> {
        self.senders.get_mut(addr)?.filler.flush()
    }

    pub fn sender_stats(&self, addr: &SocketAddr) -> Option<SenderStats> {
        self.senders.get(addr).map(|s| s.stats)
    }
}

/// Reordering UDP-PSN receiver (`udps`). Shares [`SenderState`]/PSN handling
/// with [`UdpSequentialReceiver`] but holds a small out-of-order window per
/// sender instead of dropping early arrivals; packets are released in PSN
/// order once the gap they were waiting on arrives or the window fills.
pub struct UdpReorderReceiver {
    socket: UdpSocket,
    pool: Arc<BlockPool>,
    config: ReceiverConfig,
    window: usize,
    senders: IndexMap<SocketAddr, ReorderState>,
}

struct ReorderState {
    base: SenderState,
    /// Highest PSN observed so far for this sender, independent of
    /// `expected_psn` (which lags while a gap is held open for reorder).
    /// Used to flag a late arrival as out-of-order even when it still
    /// lands in-window and gets released in order.
    highest_seen: u64,
    pending: BTreeMap<u64, Vec<u8>>,
}

impl UdpReorderReceiver {
    pub fn new(socket: UdpSocket, pool: Arc<BlockPool>, config: ReceiverConfig, window: usize) -> Self {
        Self { socket, pool, config, window, senders: IndexMap::with_capacity(MAX_SENDERS) }
    }

    /// Receives one datagram and returns any blocks completed while
    /// releasing payloads now ready for delivery in ascending PSN order.
    pub fn recv_ready(&mut self) -> Result<Vec<Block>, NetError> {
        let mut buf = vec![0u8; PSN_SIZE + self.config.write_size + 64];
        let (n, sender) = match self.socket.recv_from(&mut buf) {
            Ok(v) => v,
            Err(e) if matches!(e.kind(), io::ErrorKind::Interrupted) => return Ok(Vec::new()),
            Err(e) if e.raw_os_error() == Some(libc::EBADF) => return Ok(Vec::new()),
            Err(e) => return Err(NetError::Io(e)),
        };
        let Some((psn, payload)) = split_psn(&buf[..n]) else {
            return Ok(Vec::new());
        };

        if !self.senders.contains_key(&sender) && self.senders.len() >= MAX_SENDERS {
            self.senders.shift_remove_index(0);
        }
        let (pool, read_size, allow_variable) = (self.pool.clone(), self.config.read_size, self.config.allow_variable_block_size);
        let state = self.senders.entry(sender).or_insert_with(|| ReorderState {
            base: SenderState::new(psn, pool, read_size, allow_variable),
            highest_seen: psn,
            pending: BTreeMap::new(),
        });

        state.base.stats.npacket += 1;
        if looks_like_restart(state.base.expected_psn, psn) {
            state.base.stats.nrestart += 1;
            state.base.expected_psn = psn;
            state.highest_seen = psn;
            state.base.filler.reset();
            state.pending.clear();
        }

        if psn < state.base.expected_psn {
            state.base.stats.nooo += 1;
            state.base.stats.ooo_sum += state.base.expected_psn - psn;
            return Ok(Vec::new());
        }

        // Out-of-order relative to the highest PSN seen, even though it
        // still lands ahead of `expected_psn` and will be released in
        // order once the reorder window closes the gap.
        if psn < state.highest_seen {
            state.base.stats.nooo += 1;
            state.base.stats.ooo_sum += state.highest_seen - psn;
        } else {
            state.highest_seen = psn;
        }

        maybe_send_ack(&self.socket, sender, &mut state.base.stats, self.config.ack_period);

        state.pending.insert(psn, payload.to_vec());
        if state.pending.len() > self.window {
            // Window exhausted: force the gap closed by advancing past it,
            // counting whatever never arrived.
            if let Some((&first, _)) = state.pending.iter().next() {
                let gap = first.saturating_sub(state.base.expected_psn);
                state.base.stats.ngap += gap;
                state.base.expected_psn = first;
            }
        }

        let mut ready_blocks = Vec::new();
        while let Some(payload) = state.pending.remove(&state.base.expected_psn) {
            if let Some(block) = state.base.filler.accept(state.base.expected_psn, &payload) {
                ready_blocks.push(block);
            }
            state.base.expected_psn += 1;
        }
        Ok(ready_blocks)
    }

    /// Hands back a sender's in-progress block regardless of fullness.
    pub fn flush(&mut self, addr: &SocketAddr) -> Option<Block> {
        self.senders.get_mut(addr)?.base.filler.flush()
    }

    pub fn sender_stats(&self, addr: &SocketAddr) -> Option<SenderStats> {
        self.senders.get(addr).map(|s| s.base.stats)
    }
}

#[cfg(test)]
mod tests {
    use std::net::UdpSocket;

    use super::*;

    fn datagram(psn: u64, payload: &[u8]) -> Vec<u8> {
        let mut v = psn.to_be_bytes().to_vec();
        v.extend_from_slice(payload);
        v
    }

    fn bind_pair() -> (UdpSocket, SocketAddr) {
        let recv = UdpSocket::bind("127.0.0.1:0").unwrap();
        let addr = recv.local_addr().unwrap();
        (recv, addr)
    }

    fn config(read_size: usize, write_size: usize) -> ReceiverConfig {
        ReceiverConfig { read_size, write_size, ack_period: 0, allow_variable_block_size: true }
    }

    #[test]
    fn in_order_packets_advance_expected_psn() {
        let (recv_sock, addr) = bind_pair();
        let send_sock = UdpSocket::bind("127.0.0.1:0").unwrap();
        let pool = Arc::new(BlockPool::new(48, 1).unwrap());
        let mut recv = UdpSequentialReceiver::new(recv_sock, pool, config(8, 8));

        send_sock.send_to(&datagram(0, &[1; 8]), addr).unwrap();
        send_sock.send_to(&datagram(1, &[2; 8]), addr).unwrap();

        assert!(matches!(recv.recv_one().unwrap(), RecvOutcome::Accepted { .. }));
        assert!(matches!(recv.recv_one().unwrap(), RecvOutcome::Accepted { .. }));
        assert_eq!(recv.total_gap(), 0);
        assert_eq!(recv.total_out_of_order(), 0);
        assert_eq!(recv.sender_stats(&addr).unwrap().npacket, 2);
    }

    #[test]
    fn first_packet_is_not_double_counted() {
        let (recv_sock, addr) = bind_pair();
        let send_sock = UdpSocket::bind("127.0.0.1:0").unwrap();
        let pool = Arc::new(BlockPool::new(48, 1).unwrap());
        let mut recv = UdpSequentialReceiver::new(recv_sock, pool, config(8, 8));

        send_sock.send_to(&datagram(0, &[1; 8]), addr).unwrap();
        recv.recv_one().unwrap();
        assert_eq!(recv.sender_stats(&addr).unwrap().npacket, 1);
    }

    #[test]
    fn gap_is_counted() {
        let (recv_sock, addr) = bind_pair();
        let send_sock = UdpSocket::bind("127.0.0.1:0").unwrap();
        let pool = Arc::new(BlockPool::new(48, 1).unwrap());
        let mut recv = UdpSequentialReceiver::new(recv_sock, pool, config(8, 8));

        send_sock.send_to(&datagram(0, &[1; 8]), addr).unwrap();
        send_sock.send_to(&datagram(5, &[2; 8]), addr).unwrap();

        recv.recv_one().unwrap();
        recv.recv_one().unwrap();
        assert_eq!(recv.total_gap(), 4);
    }

    #[test]
    fn stale_psn_is_dropped_not_written() {
        let (recv_sock, addr) = bind_pair();
        let send_sock = UdpSocket::bind("127.0.0.1:0").unwrap();
        let pool = Arc::new(BlockPool::new(48, 1).unwrap());
        let mut recv = UdpSequentialReceiver::new(recv_sock, pool, config(8, 8));

        send_sock.send_to(&datagram(5, &[1; 8]), addr).unwrap();
        send_sock.send_to(&datagram(2, &[2; 8]), addr).unwrap();

        recv.recv_one().unwrap();
        assert!(matches!(recv.recv_one().unwrap(), RecvOutcome::Stale));
        assert_eq!(recv.total_out_of_order(), 1);
    }

    #[test]
    fn ack_is_sent_after_ack_period_packets() {
        let (recv_sock, recv_addr) = bind_pair();
        let send_sock = UdpSocket::bind("127.0.0.1:0").unwrap();
        send_sock.connect(recv_addr).unwrap();
        let sender_addr = send_sock.local_addr().unwrap();
        let pool = Arc::new(BlockPool::new(16, 1).unwrap());
        let mut recv = UdpSequentialReceiver::new(
            recv_sock,
            pool,
            ReceiverConfig { read_size: 8, write_size: 8, ack_period: 2, allow_variable_block_size: true },
        );

        send_sock.send(&datagram(0, &[1; 8])).unwrap();
        send_sock.send(&datagram(1, &[2; 8])).unwrap();

        recv.recv_one().unwrap();
        recv.recv_one().unwrap();
        assert_eq!(recv.sender_stats(&sender_addr).unwrap().last_ack_seq, 2);

        let mut ack_buf = [0u8; 16];
        send_sock.set_read_timeout(Some(std::time::Duration::from_millis(200))).unwrap();
        let (n, _) = send_sock.recv_from(&mut ack_buf).unwrap();
        assert_eq!(n, 1);
        assert!(ACK_TOKENS.contains(&ack_buf[0]));
    }

    /// S1: `[0,1,2,4,3,5]` of 8-byte payloads at `read_size=write_size=8`,
    /// `blocksize=48`, via the reordering receiver. Expect one downstream
    /// block of 48 bytes containing payloads at their PSN-indexed
    /// positions, `pkt_in=6`, `pkt_lost=0`, `pkt_ooo=1`, `ooo_sum=1`.
    #[test]
    fn reorder_receiver_assembles_one_block_with_psn_indexed_payloads() {
        let (recv_sock, addr) = bind_pair();
        let send_sock = UdpSocket::bind("127.0.0.1:0").unwrap();
        let pool = Arc::new(BlockPool::new(48, 1).unwrap());
        let mut recv = UdpReorderReceiver::new(recv_sock, pool, config(8, 8), 8);

        for psn in [0u64, 1, 2, 4, 3, 5] {
            send_sock.send_to(&datagram(psn, &[psn as u8; 8]), addr).unwrap();
        }

        let mut completed = Vec::new();
        for _ in 0..6 {
            completed.extend(recv.recv_ready().unwrap());
        }
        assert!(completed.is_empty(), "the 6th packet exactly fills the block but doesn't overflow it yet");
        let block = recv.flush(&addr).expect("in-progress block should still hold all 6 payloads");
        assert_eq!(block.len(), 48);
        for psn in 0u64..6 {
            let slice = &block.as_slice()[(psn as usize) * 8..(psn as usize + 1) * 8];
            assert!(slice.iter().all(|&b| b == psn as u8));
        }

        let stats = recv.sender_stats(&addr).unwrap();
        assert_eq!(stats.npacket, 6);
        assert_eq!(stats.ngap, 0);
        assert_eq!(stats.nooo, 1);
        assert_eq!(stats.ooo_sum, 1);
    }

    #[test]
    fn reorder_receiver_releases_in_psn_order() {
        let (recv_sock, addr) = bind_pair();
        let send_sock = UdpSocket::bind("127.0.0.1:0").unwrap();
        let pool = Arc::new(BlockPool::new(32, 1).unwrap());
        let mut recv = UdpReorderReceiver::new(recv_sock, pool, config(4, 4), 8);

        send_sock.send_to(&datagram(0, &[0; 4]), addr).unwrap();
        send_sock.send_to(&datagram(2, &[2; 4]), addr).unwrap();
        send_sock.send_to(&datagram(1, &[1; 4]), addr).unwrap();

        recv.recv_ready().unwrap();
        recv.recv_ready().unwrap();
        recv.recv_ready().unwrap();

        let block = recv.flush(&addr).unwrap();
        assert_eq!(&block.as_slice()[0..4], &[0; 4]);
        assert_eq!(&block.as_slice()[4..8], &[1; 4]);
        assert_eq!(&block.as_slice()[8..12], &[2; 4]);
    }
}
