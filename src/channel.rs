use std::fmt::Debug;
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use crate::config::ChannelConfig;
use crate::sync::{Monitor, WaitMode};
use crate::{Error, Result};

enum Slot<T> {
    Empty,
    Full(T),
    /// Terminal: the producer is done, or a side shut the channel down
    Closed,
}

/// Everything guarded by the channel's lock.
struct Handoff<T> {
    slot: Slot<T>,
    /// Values taken by the receiver so far
    taken: u64,
}

impl<T> Slot<T> {
    #[inline(always)]
    fn state(&self) -> SlotState {
        match self {
            Slot::Empty => SlotState::Empty,
            Slot::Full(_) => SlotState::Full,
            Slot::Closed => SlotState::Closed,
        }
    }
}

/// Observable tag of a channel's slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SlotState {
    Empty,
    Full,
    Closed,
}

/// Single-slot rendezvous between one producer and one consumer thread.
///
/// [`send`](Channel::send) returns once the value has been taken, so the
/// producer is never more than one value ahead. The stream ends with an
/// explicit [`close`](Channel::close); there are no sentinel values.
///
/// The awaitables returned by `send` and `receive` block the polling thread
/// while they wait. They are meant to be awaited inside a routine that has a
/// thread of its own.
pub struct Channel<T> {
    monitor: Monitor<Handoff<T>>,
    name: String,
}

impl<T> Debug for Channel<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Channel")
            .field("name", &self.name)
            .field("mode", &self.wait_mode())
            .field("state", &self.state())
            .finish()
    }
}

impl<T> Default for Channel<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Channel<T> {
    pub fn new() -> Self {
        Self::with_config(ChannelConfig::default())
    }

    pub fn with_mode(wait_mode: WaitMode) -> Self {
        Self::with_config(ChannelConfig::new(wait_mode))
    }

    pub fn with_config(config: ChannelConfig) -> Self {
        log::trace!("{}: new channel ({})", config.name, config.wait_mode);
        Self {
            monitor: Monitor::new(
                Handoff {
                    slot: Slot::Empty,
                    taken: 0,
                },
                config.wait_mode,
            ),
            name: config.name,
        }
    }

    #[inline(always)]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline(always)]
    pub fn wait_mode(&self) -> WaitMode {
        self.monitor.mode()
    }

    pub fn state(&self) -> SlotState {
        self.monitor.lock().slot.state()
    }

    pub fn is_closed(&self) -> bool {
        self.state() == SlotState::Closed
    }

    /// Hands `value` over, completing once the consumer has taken it.
    pub fn send(&self, value: T) -> Sending<'_, T> {
        Sending {
            channel: self,
            value: Some(value),
        }
    }

    /// Waits for the next value; `None` once the channel is closed.
    pub fn receive(&self) -> Receiving<'_, T> {
        Receiving { channel: self }
    }

    /// Blocking form of [`send`](Channel::send).
    ///
    /// Succeeds once the receiver has taken `value`, even if the channel is
    /// closed right after. [`Error::Disconnected`] means `value` itself was
    /// dropped by a close.
    pub fn send_blocking(&self, value: T) -> Result<()> {
        let mut handoff = self.monitor.lock();
        handoff.wait_until(|h| !matches!(h.slot, Slot::Full(_)));
        if let Slot::Closed = handoff.slot {
            log::debug!("{}: send after close", self.name);
            return Err(Error::SendAfterClose);
        }
        let ticket = handoff.taken;
        handoff.slot = Slot::Full(value);
        log::trace!("{}: empty -> full", self.name);
        handoff.notify();

        handoff.wait_until(|h| h.taken != ticket || matches!(h.slot, Slot::Closed));
        if handoff.taken != ticket {
            Ok(())
        } else {
            log::debug!("{}: pending value dropped by close", self.name);
            Err(Error::Disconnected)
        }
    }

    pub fn recv_blocking(&self) -> Option<T> {
        let mut handoff = self.monitor.lock();
        handoff.wait_until(|h| !matches!(h.slot, Slot::Empty));
        match std::mem::replace(&mut handoff.slot, Slot::Empty) {
            Slot::Full(value) => {
                handoff.taken += 1;
                log::trace!("{}: full -> empty", self.name);
                handoff.notify();
                Some(value)
            }
            Slot::Closed => {
                handoff.slot = Slot::Closed;
                None
            }
            Slot::Empty => unreachable!("woken on an empty slot"),
        }
    }

    /// Marks the end of the stream and wakes both sides.
    ///
    /// Closing twice leaves the channel closed and reports
    /// [`Error::AlreadyClosed`].
    pub fn close(&self) -> Result<()> {
        if self.close_slot() {
            Ok(())
        } else {
            log::debug!("{}: closed twice", self.name);
            Err(Error::AlreadyClosed)
        }
    }

    /// Closes the channel if nobody did yet.
    ///
    /// This is the path for a side that stops early: it unblocks a peer
    /// that would otherwise wait forever. A value still pending in the slot
    /// is dropped and its sender gets [`Error::Disconnected`].
    pub fn shutdown(&self) {
        if self.close_slot() {
            log::debug!("{}: shut down", self.name);
        }
    }

    fn close_slot(&self) -> bool {
        let mut handoff = self.monitor.lock();
        if let Slot::Closed = handoff.slot {
            return false;
        }
        let pending = std::mem::replace(&mut handoff.slot, Slot::Closed);
        log::trace!("{}: {:?} -> closed", self.name, pending.state());
        handoff.notify();
        drop(handoff);
        drop(pending);
        true
    }
}

/// Awaitable returned by [`Channel::send`].
#[must_use = "nothing is sent unless awaited"]
pub struct Sending<'c, T> {
    channel: &'c Channel<T>,
    value: Option<T>,
}

impl<T> Unpin for Sending<'_, T> {}

impl<T> Future for Sending<'_, T> {
    type Output = Result<()>;

    fn poll(mut self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<Result<()>> {
        let value = self.value.take().expect("Sending polled after completion");
        Poll::Ready(self.channel.send_blocking(value))
    }
}

/// Awaitable returned by [`Channel::receive`].
#[must_use = "nothing is received unless awaited"]
pub struct Receiving<'c, T> {
    channel: &'c Channel<T>,
}

impl<T> Future for Receiving<'_, T> {
    type Output = Option<T>;

    fn poll(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<Option<T>> {
        Poll::Ready(self.channel.recv_blocking())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use coro::{Generator, Step};
    use rand::Rng;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    fn wait_for(channel: &Channel<i32>, state: SlotState) {
        while channel.state() != state {
            std::thread::yield_now();
        }
    }

    fn send_then_close(mode: WaitMode, values: Vec<i32>) -> Vec<Option<i32>> {
        let channel = Channel::with_mode(mode);
        std::thread::scope(|s| {
            let chan = &channel;
            s.spawn(move || {
                let mut producer = Generator::new(move |co| async move {
                    for value in values {
                        chan.send(value).await?;
                        co.produce(()).await;
                    }
                    chan.close()
                });
                while producer.step().is_produced() {}
                producer.take_output().unwrap().unwrap();
            });
            let consumer = s.spawn(move || {
                let mut consumer = Generator::new(move |co| async move {
                    loop {
                        let received = chan.receive().await;
                        let end = received.is_none();
                        co.produce(received).await;
                        if end {
                            break;
                        }
                    }
                });
                let mut seen = Vec::new();
                while let Step::Produced(received) = consumer.step() {
                    seen.push(received);
                }
                seen
            });
            consumer.join().unwrap()
        })
    }

    #[test]
    fn test_one_two_three_eos() {
        assert_eq!(
            send_then_close(WaitMode::Block, vec![1, 2, 3]),
            vec![Some(1), Some(2), Some(3), None]
        );
    }

    #[test]
    fn test_spin_mode_delivers_the_same() {
        assert_eq!(
            send_then_close(WaitMode::Spin, vec![1, 2, 3]),
            vec![Some(1), Some(2), Some(3), None]
        );
    }

    #[test]
    fn test_order_and_no_duplicates() {
        let channel = Channel::with_mode(WaitMode::Block);
        let received = std::thread::scope(|s| {
            s.spawn(|| {
                for value in 0..500 {
                    channel.send_blocking(value).unwrap();
                }
                channel.close().unwrap();
            });
            let mut rng = rand::thread_rng();
            let mut received = Vec::new();
            while let Some(value) = channel.recv_blocking() {
                if rng.gen_ratio(1, 10) {
                    std::thread::sleep(Duration::from_micros(rng.gen_range(1..200)));
                }
                received.push(value);
            }
            received
        });
        assert_eq!(received, (0..500).collect::<Vec<_>>());
    }

    #[test]
    fn test_backpressure() {
        let channel = Channel::with_mode(WaitMode::Block);
        let returned = AtomicUsize::new(0);
        std::thread::scope(|s| {
            s.spawn(|| {
                channel.send_blocking(1).unwrap();
                returned.fetch_add(1, Ordering::SeqCst);
                channel.send_blocking(2).unwrap();
                returned.fetch_add(1, Ordering::SeqCst);
            });
            wait_for(&channel, SlotState::Full);
            assert_eq!(returned.load(Ordering::SeqCst), 0);
            assert_eq!(channel.recv_blocking(), Some(1));

            wait_for(&channel, SlotState::Full);
            std::thread::sleep(Duration::from_millis(50));
            assert_eq!(returned.load(Ordering::SeqCst), 1);
            assert_eq!(channel.state(), SlotState::Full);
            assert_eq!(channel.recv_blocking(), Some(2));
        });
        assert_eq!(returned.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_receive_after_close() {
        let channel = Channel::<i32>::new();
        channel.close().unwrap();
        assert!(channel.is_closed());
        assert_eq!(channel.recv_blocking(), None);
        assert_eq!(channel.recv_blocking(), None);
    }

    #[test]
    fn test_close_wakes_blocked_receiver() {
        let channel = Channel::<i32>::with_mode(WaitMode::Block);
        std::thread::scope(|s| {
            let receiver = s.spawn(|| channel.recv_blocking());
            std::thread::sleep(Duration::from_millis(10));
            channel.close().unwrap();
            assert_eq!(receiver.join().unwrap(), None);
        });
    }

    #[test]
    fn test_logic_faults() {
        let channel = Channel::with_mode(WaitMode::Block);
        channel.close().unwrap();
        assert!(matches!(channel.close(), Err(Error::AlreadyClosed)));
        assert!(matches!(channel.send_blocking(1), Err(Error::SendAfterClose)));
        channel.shutdown();
        assert!(channel.is_closed());
    }

    #[test]
    fn test_shutdown_with_pending_value() {
        let channel = Channel::with_mode(WaitMode::Block);
        std::thread::scope(|s| {
            let sender = s.spawn(|| channel.send_blocking(7));
            wait_for(&channel, SlotState::Full);
            channel.shutdown();
            assert!(matches!(sender.join().unwrap(), Err(Error::Disconnected)));
        });
        assert_eq!(channel.recv_blocking(), None);
    }

    #[test]
    fn test_debug_shows_mode_and_state() {
        let channel = Channel::<i32>::with_config(
            ChannelConfig::new(WaitMode::Spin).with_name("dbg"),
        );
        assert_eq!(channel.wait_mode(), WaitMode::Spin);
        channel.close().unwrap();
        let shown = format!("{channel:?}");
        assert!(shown.contains("\"dbg\""));
        assert!(shown.contains("Spin"));
        assert!(shown.contains("Closed"));
    }

    #[test]
    fn test_taken_value_survives_close() {
        for _ in 0..200 {
            let channel = Channel::with_mode(WaitMode::Block);
            std::thread::scope(|s| {
                let sender = s.spawn(|| channel.send_blocking(7));
                assert_eq!(channel.recv_blocking(), Some(7));
                channel.shutdown();
                assert!(sender.join().unwrap().is_ok());
            });
        }
    }

    #[test]
    fn test_abandoned_receiving_routine() {
        let channel = Channel::with_mode(WaitMode::Block);
        let (received, delivered, fault) = std::thread::scope(|s| {
            let receiver = s.spawn(|| {
                let chan = &channel;
                let mut consumer = Generator::new(move |co| async move {
                    while let Some(value) = chan.receive().await {
                        co.produce(value).await;
                    }
                });
                let received = consumer.step().produced();
                drop(consumer);
                channel.shutdown();
                received
            });
            let mut delivered = 0;
            let fault = loop {
                match channel.send_blocking(10 + delivered) {
                    Ok(()) => delivered += 1,
                    Err(err) => break err,
                }
            };
            (receiver.join().unwrap(), delivered, fault)
        });
        assert_eq!(received, Some(10));
        assert_eq!(delivered, 1);
        assert!(matches!(fault, Error::Disconnected | Error::SendAfterClose));
    }
}
