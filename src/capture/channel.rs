use crate::error::SegmentationError;
use crate::frame::FramePacket;
use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

/// Shared slot guarded by the channel mutex.
struct Slot {
    packet: Option<FramePacket>,
    /// A frame is waiting to be copied out
    producer_done: bool,
    /// The last frame has been copied out; the producer may write again
    consumer_done: bool,
}

impl Slot {
    /// Move the pending frame out and hand the slot back to the producer.
    fn take(&mut self) -> Option<FramePacket> {
        if !self.producer_done {
            return None;
        }
        let packet = self.packet.take()?;
        self.producer_done = false;
        self.consumer_done = true;
        Some(packet)
    }
}

/// Single-slot rendezvous between one acquisition thread and one
/// tracking thread.
///
/// The producer and consumer strictly alternate: `produce` cannot write a
/// new frame until the previous one has been taken by `consume`, and
/// `consume` cannot return until a frame has been written. At most one
/// frame is ever in flight, so a slow consumer throttles acquisition
/// instead of letting frames pile up.
///
/// Share it between threads with an `Arc`.
pub struct FrameChannel {
    slot: Mutex<Slot>,
    condition: Condvar,
}

impl Default for FrameChannel {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameChannel {
    pub fn new() -> Self {
        Self {
            slot: Mutex::new(Slot {
                packet: None,
                producer_done: false,
                consumer_done: true,
            }),
            condition: Condvar::new(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Slot> {
        self.slot.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Publish a captured frame, blocking until the previous one has been
    /// consumed.
    pub fn produce(&self, packet: FramePacket) {
        let slot = self.lock();
        let mut slot = self
            .condition
            .wait_while(slot, |slot| !slot.consumer_done)
            .unwrap_or_else(PoisonError::into_inner);

        slot.packet = Some(packet);
        slot.consumer_done = false;
        slot.producer_done = true;
        drop(slot);

        self.condition.notify_all();
    }

    /// Take the next frame, blocking until one is produced.
    ///
    /// Blocks forever if nothing is ever produced; use
    /// [`consume_timeout`](Self::consume_timeout) to bound the wait.
    pub fn consume(&self) -> FramePacket {
        let mut slot = self.lock();
        loop {
            if let Some(packet) = slot.take() {
                drop(slot);
                self.condition.notify_all();
                return packet;
            }
            slot = self
                .condition
                .wait(slot)
                .unwrap_or_else(PoisonError::into_inner);
        }
    }

    /// Like [`consume`](Self::consume), but gives up after `timeout` with
    /// [`SegmentationError::ChannelStall`].
    pub fn consume_timeout(&self, timeout: Duration) -> Result<FramePacket, SegmentationError> {
        let deadline = Instant::now() + timeout;
        let mut slot = self.lock();
        loop {
            if let Some(packet) = slot.take() {
                drop(slot);
                self.condition.notify_all();
                return Ok(packet);
            }

            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Err(SegmentationError::ChannelStall { waited: timeout });
            }
            slot = self
                .condition
                .wait_timeout(slot, remaining)
                .unwrap_or_else(PoisonError::into_inner)
                .0;
        }
    }

    /// True while a produced frame has not been consumed yet.
    pub fn has_pending(&self) -> bool {
        self.lock().producer_done
    }
}
