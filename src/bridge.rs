// Copyright The Rusted Firmware-A Contributors.
//
// SPDX-License-Identifier: BSD-3-Clause

//! Mailbox doorbell to protocol engine bridge.
//!
//! A doorbell interrupt carries no payload; the message sits in the channel's
//! shared memory. The top half ([`Doorbell::ring`]) only flips a per-channel
//! state flag and schedules the bottom half through the embedding firmware's
//! asynchronous notification primitive. The bottom half
//! ([`ChannelBridge::process_pending`]) runs the protocol engine outside
//! interrupt context and signals the response back to the peer.
//!
//! The protocol contract allows at most one outstanding message per channel,
//! so a single atomic flag per channel is enough; no queue is needed.

use crate::platform::{DriverError, Platform};
use alloc::sync::Arc;
use core::fmt::{self, Display, Formatter};
use core::sync::atomic::{AtomicU8, AtomicU32, Ordering};
use log::warn;
use num_enum::{IntoPrimitive, TryFromPrimitive};

/// Per-channel doorbell state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, IntoPrimitive, TryFromPrimitive)]
#[repr(u8)]
enum ChannelState {
    /// No doorbell outstanding.
    Idle = 0,
    /// A doorbell was rung and the bottom half has not claimed it yet.
    Pending = 1,
    /// The bottom half is processing the message.
    Processing = 2,
}

#[derive(Debug)]
struct DoorbellState {
    state: AtomicU8,
    /// Doorbells coalesced into an already pending event.
    overruns: AtomicU32,
}

/// The asynchronous notification primitive that schedules the bottom half.
/// Implemented by the embedding firmware (typically an event raised towards
/// the thread that calls [`ChannelBridge::process_pending`]).
pub trait BottomHalfNotifier: Send + Sync {
    /// Schedules a bottom-half run. Must be callable from interrupt context
    /// and must not block.
    fn send_async(&self);
}

/// Operations on a bound mailbox channel, implemented by the platform's
/// mailbox driver handle.
pub trait MailboxChannel {
    /// Acknowledges the received doorbell. The doorbell carries no payload,
    /// so nothing is drained.
    fn acknowledge(&mut self) -> Result<(), DriverError>;

    /// Rings the peer's doorbell to signal that the response is ready in
    /// shared memory.
    fn notify_peer(&mut self) -> Result<(), DriverError>;
}

/// The protocol engine failed to process a channel message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProcessingError;

impl Display for ProcessingError {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        write!(f, "channel processing failed")
    }
}

/// The protocol engine's message processing entry point.
pub trait ChannelProcessor {
    /// Processes the message pending in the shared memory of the channel
    /// bound to `mailbox_index`.
    fn process_channel(&mut self, mailbox_index: u32) -> Result<(), ProcessingError>;
}

/// Registry of channel bridges, indexed by global mailbox index. Implemented
/// by the embedding firmware; the builder registers every mailbox channel it
/// binds before attaching protocol resources to it.
pub trait NotificationDispatcher<P: Platform> {
    /// Takes ownership of the bridge serving `mailbox_index`.
    fn register(&mut self, mailbox_index: u32, bridge: ChannelBridge<P>);
}

/// Receive-side token handed to the mailbox driver when a channel is bound.
///
/// The driver calls [`ring`](Self::ring) from its doorbell interrupt handler.
/// Clones share the channel state with the [`ChannelBridge`] they were
/// created with.
#[derive(Clone)]
pub struct Doorbell {
    state: Arc<DoorbellState>,
    notifier: Arc<dyn BottomHalfNotifier>,
}

impl Doorbell {
    /// Creates the doorbell for one channel, scheduling its bottom half
    /// through `notifier`.
    pub fn new(notifier: Arc<dyn BottomHalfNotifier>) -> Self {
        Self {
            state: Arc::new(DoorbellState {
                state: AtomicU8::new(ChannelState::Idle.into()),
                overruns: AtomicU32::new(0),
            }),
            notifier,
        }
    }

    /// Top half, called from the doorbell interrupt handler.
    ///
    /// Marks the channel pending and schedules the bottom half. A second ring
    /// before the bottom half has claimed the event is coalesced into the one
    /// already pending. A ring while the message is being processed violates
    /// the single-outstanding-message contract and panics.
    pub fn ring(&self) {
        match self.state.state.compare_exchange(
            ChannelState::Idle.into(),
            ChannelState::Pending.into(),
            Ordering::AcqRel,
            Ordering::Acquire,
        ) {
            Ok(_) => self.notifier.send_async(),
            Err(current) => match ChannelState::try_from(current) {
                Ok(ChannelState::Pending) => {
                    self.state.overruns.fetch_add(1, Ordering::Relaxed);
                    warn!("Doorbell rung while one is already pending, coalescing");
                }
                Ok(ChannelState::Processing) => {
                    panic!("Doorbell rung while the previous message is still being processed")
                }
                _ => unreachable!("Invalid doorbell state {current}"),
            },
        }
    }

    /// Doorbells that were coalesced rather than individually served.
    pub fn overruns(&self) -> u32 {
        self.state.overruns.load(Ordering::Relaxed)
    }

    /// Bottom half claims the pending event. Returns false when no event is
    /// pending (a spurious bottom-half run).
    fn claim(&self) -> bool {
        self.state
            .state
            .compare_exchange(
                ChannelState::Pending.into(),
                ChannelState::Processing.into(),
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_ok()
    }

    /// Bottom half releases the channel after processing.
    fn complete(&self) {
        self.state
            .state
            .store(ChannelState::Idle.into(), Ordering::Release);
    }
}

/// Bottom-half side of one mailbox channel: the doorbell state, the bound
/// mailbox handle and the mailbox index the protocol engine knows the
/// channel by.
pub struct ChannelBridge<P: Platform> {
    mailbox_index: u32,
    channel: P::MailboxChannel,
    doorbell: Doorbell,
}

impl<P: Platform> ChannelBridge<P> {
    pub(crate) fn new(mailbox_index: u32, channel: P::MailboxChannel, doorbell: Doorbell) -> Self {
        Self {
            mailbox_index,
            channel,
            doorbell,
        }
    }

    /// Global mailbox index of the channel.
    pub fn mailbox_index(&self) -> u32 {
        self.mailbox_index
    }

    /// Bottom half: runs the protocol engine on the pending message and
    /// signals the response to the peer. Returns false when no message was
    /// pending.
    ///
    /// The configuration is live at this point; there is no defined recovery
    /// for a mailbox or engine failure, so those panic.
    ///
    /// The channel returns to idle before the peer is notified: the peer may
    /// ring again as soon as it sees the response.
    pub fn process_pending<E: ChannelProcessor>(&mut self, engine: &mut E) -> bool {
        if !self.doorbell.claim() {
            return false;
        }

        if self.channel.acknowledge().is_err() {
            panic!(
                "Failed to acknowledge doorbell on mailbox {}",
                self.mailbox_index
            );
        }

        if engine.process_channel(self.mailbox_index).is_err() {
            panic!(
                "Protocol engine failed on mailbox {}",
                self.mailbox_index
            );
        }

        self.doorbell.complete();

        if self.channel.notify_peer().is_err() {
            panic!(
                "Failed to notify peer on mailbox {}",
                self.mailbox_index
            );
        }

        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::test::{FakeEngine, FakeMailbox, FakeNotifier, FakePlatform};

    fn bridge(
        notifier: &Arc<FakeNotifier>,
        mailbox: FakeMailbox,
    ) -> (ChannelBridge<FakePlatform>, Doorbell) {
        let doorbell = Doorbell::new(notifier.clone());
        let bridge = ChannelBridge::new(0, mailbox, doorbell.clone());
        (bridge, doorbell)
    }

    #[test]
    fn ring_schedules_bottom_half_once() {
        let notifier = Arc::new(FakeNotifier::default());
        let doorbell = Doorbell::new(notifier.clone());

        doorbell.ring();

        assert_eq!(notifier.notifications(), 1);
        assert_eq!(doorbell.overruns(), 0);
    }

    #[test]
    fn second_ring_while_pending_is_coalesced() {
        let notifier = Arc::new(FakeNotifier::default());
        let mailbox = FakeMailbox::default();
        let log = mailbox.log();
        let (mut bridge, doorbell) = bridge(&notifier, mailbox);
        let mut engine = FakeEngine::default();

        doorbell.ring();
        doorbell.ring();

        // Two interrupts, one scheduled bottom half, one processing cycle.
        assert_eq!(notifier.notifications(), 1);
        assert_eq!(doorbell.overruns(), 1);
        assert!(bridge.process_pending(&mut engine));
        assert_eq!(engine.processed, [0]);
        assert_eq!(log.acknowledged(), 1);
        assert_eq!(log.peer_notifications(), 1);
        assert!(!bridge.process_pending(&mut engine));
    }

    #[test]
    fn spurious_bottom_half_run_is_ignored() {
        let notifier = Arc::new(FakeNotifier::default());
        let mailbox = FakeMailbox::default();
        let log = mailbox.log();
        let (mut bridge, _doorbell) = bridge(&notifier, mailbox);
        let mut engine = FakeEngine::default();

        assert!(!bridge.process_pending(&mut engine));
        assert!(engine.processed.is_empty());
        assert_eq!(log.acknowledged(), 0);
        assert_eq!(log.peer_notifications(), 0);
    }

    #[test]
    fn channel_is_reusable_after_processing() {
        let notifier = Arc::new(FakeNotifier::default());
        let mailbox = FakeMailbox::default();
        let log = mailbox.log();
        let (mut bridge, doorbell) = bridge(&notifier, mailbox);
        let mut engine = FakeEngine::default();

        doorbell.ring();
        assert!(bridge.process_pending(&mut engine));
        doorbell.ring();
        assert!(bridge.process_pending(&mut engine));

        assert_eq!(notifier.notifications(), 2);
        assert_eq!(engine.processed, [0, 0]);
        assert_eq!(log.peer_notifications(), 2);
        assert_eq!(doorbell.overruns(), 0);
    }

    #[test]
    #[should_panic(expected = "still being processed")]
    fn ring_while_processing_panics() {
        let notifier = Arc::new(FakeNotifier::default());
        let doorbell = Doorbell::new(notifier);

        doorbell.ring();
        assert!(doorbell.claim());
        doorbell.ring();
    }

    #[test]
    #[should_panic(expected = "Protocol engine failed")]
    fn engine_failure_panics() {
        let notifier = Arc::new(FakeNotifier::default());
        let (mut bridge, doorbell) = bridge(&notifier, FakeMailbox::default());
        let mut engine = FakeEngine {
            fail: true,
            ..FakeEngine::default()
        };

        doorbell.ring();
        bridge.process_pending(&mut engine);
    }

    #[test]
    #[should_panic(expected = "acknowledge doorbell")]
    fn acknowledge_failure_panics() {
        let notifier = Arc::new(FakeNotifier::default());
        let mailbox = FakeMailbox::default();
        mailbox.log().fail_acknowledge();
        let (mut bridge, doorbell) = bridge(&notifier, mailbox);
        let mut engine = FakeEngine::default();

        doorbell.ring();
        bridge.process_pending(&mut engine);
    }
}
