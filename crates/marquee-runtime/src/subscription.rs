#![forbid(unsafe_code)]

//! Background message sources feeding the stage loop.
//!
//! The engines are single-threaded, so nothing here touches them. A
//! subscription runs on its own thread and only *posts* messages into a
//! channel; the stage loop drains that channel on its own thread and applies
//! the messages in arrival order.
//!
//! Built-ins:
//! - [`Every`]: a fixed-interval clock (frame pulses).
//! - [`Script`]: a canned message list, optionally paced, for tests and
//!   scripted demos.
//!
//! # Teardown
//!
//! [`SubscriptionManager::stop`] and [`SubscriptionManager::stop_all`] set
//! the subscription's [`StopSignal`] and join its thread, so no message is
//! produced by a subscription after it has been stopped. Dropping the manager
//! stops everything.

use std::collections::HashMap;
use std::sync::mpsc;
use std::thread;
use std::time::Duration;

use tracing::debug;

use crate::cancellation::{CancelReason, CancellationSource, CancellationToken};

pub type SubId = u64;

/// A source of messages running on a background thread.
pub trait Subscription<M: Send + 'static>: Send {
    /// Stable identity; starting a second subscription with a running id is
    /// a no-op.
    fn id(&self) -> SubId;

    /// Produce messages until `stop` fires or the receiver goes away.
    fn run(&self, sender: mpsc::Sender<M>, stop: StopSignal);
}

/// Read side of a subscription's stop request.
#[derive(Clone, Debug)]
pub struct StopSignal {
    token: CancellationToken,
}

impl StopSignal {
    pub(crate) fn new() -> (Self, CancellationSource) {
        let source = CancellationSource::new();
        let signal = Self {
            token: source.token(),
        };
        (signal, source)
    }

    pub fn is_stopped(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Sleep up to `duration`, waking early on stop. Returns `true` if
    /// stopped.
    pub fn wait_timeout(&self, duration: Duration) -> bool {
        self.token.wait_timeout(duration).is_some()
    }
}

struct Running {
    stop: CancellationSource,
    thread: Option<thread::JoinHandle<()>>,
}

impl Running {
    fn halt(mut self) {
        self.stop.cancel(CancelReason::Requested);
        if let Some(handle) = self.thread.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for Running {
    fn drop(&mut self) {
        self.stop.cancel(CancelReason::Requested);
    }
}

/// Owns running subscriptions and the channel they post into.
pub struct SubscriptionManager<M: Send + 'static> {
    active: HashMap<SubId, Running>,
    sender: mpsc::Sender<M>,
    receiver: mpsc::Receiver<M>,
}

impl<M: Send + 'static> Default for SubscriptionManager<M> {
    fn default() -> Self {
        Self::new()
    }
}

impl<M: Send + 'static> SubscriptionManager<M> {
    pub fn new() -> Self {
        let (sender, receiver) = mpsc::channel();
        Self {
            active: HashMap::new(),
            sender,
            receiver,
        }
    }

    /// Sender for posting messages from outside any subscription (the
    /// progress completion callback, for one).
    pub fn sender(&self) -> mpsc::Sender<M> {
        self.sender.clone()
    }

    pub fn is_running(&self, id: SubId) -> bool {
        self.active.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.active.len()
    }

    pub fn is_empty(&self) -> bool {
        self.active.is_empty()
    }

    /// Start `sub` on its own thread. Returns `false` if its id is already
    /// running.
    pub fn start(&mut self, sub: Box<dyn Subscription<M>>) -> bool {
        let id = sub.id();
        if self.active.contains_key(&id) {
            return false;
        }
        debug!(sub_id = id, "starting subscription");
        let (signal, stop) = StopSignal::new();
        let sender = self.sender.clone();
        let thread = thread::spawn(move || sub.run(sender, signal));
        self.active.insert(
            id,
            Running {
                stop,
                thread: Some(thread),
            },
        );
        true
    }

    /// Stop one subscription and join its thread.
    pub fn stop(&mut self, id: SubId) -> bool {
        match self.active.remove(&id) {
            Some(running) => {
                debug!(sub_id = id, "stopping subscription");
                running.halt();
                true
            }
            None => false,
        }
    }

    pub fn stop_all(&mut self) {
        for (id, running) in self.active.drain() {
            debug!(sub_id = id, "stopping subscription");
            running.halt();
        }
    }

    /// Wait up to `timeout` for the next message.
    pub fn recv_timeout(&self, timeout: Duration) -> Option<M> {
        self.receiver.recv_timeout(timeout).ok()
    }
}

impl<M: Send + 'static> Drop for SubscriptionManager<M> {
    fn drop(&mut self) {
        self.stop_all();
    }
}

/// Fixed-interval clock.
pub struct Every<M: Send + 'static> {
    id: SubId,
    interval: Duration,
    make_msg: Box<dyn Fn() -> M + Send + Sync>,
}

impl<M: Send + 'static> Every<M> {
    pub fn with_id(
        id: SubId,
        interval: Duration,
        make_msg: impl Fn() -> M + Send + Sync + 'static,
    ) -> Self {
        Self {
            id,
            interval,
            make_msg: Box::new(make_msg),
        }
    }
}

impl<M: Send + 'static> Subscription<M> for Every<M> {
    fn id(&self) -> SubId {
        self.id
    }

    fn run(&self, sender: mpsc::Sender<M>, stop: StopSignal) {
        while !stop.wait_timeout(self.interval) {
            if sender.send((self.make_msg)()).is_err() {
                break;
            }
        }
    }
}

/// Sends a fixed list of messages, `pace` apart, then ends.
pub struct Script<M: Send + 'static> {
    id: SubId,
    pace: Duration,
    messages: Vec<M>,
}

impl<M: Send + Clone + 'static> Script<M> {
    pub fn new(id: SubId, messages: Vec<M>) -> Self {
        Self {
            id,
            pace: Duration::ZERO,
            messages,
        }
    }

    #[must_use]
    pub fn paced(mut self, pace: Duration) -> Self {
        self.pace = pace;
        self
    }
}

impl<M: Send + Clone + Sync + 'static> Subscription<M> for Script<M> {
    fn id(&self) -> SubId {
        self.id
    }

    fn run(&self, sender: mpsc::Sender<M>, stop: StopSignal) {
        for msg in &self.messages {
            if !self.pace.is_zero() && stop.wait_timeout(self.pace) {
                return;
            }
            if stop.is_stopped() || sender.send(msg.clone()).is_err() {
                return;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, PartialEq)]
    enum Msg {
        Frame,
        Value(i32),
    }

    fn queued(mgr: &SubscriptionManager<Msg>) -> Vec<Msg> {
        std::iter::from_fn(|| mgr.recv_timeout(Duration::ZERO)).collect()
    }

    #[test]
    fn stop_signal_tracks_source() {
        let (signal, source) = StopSignal::new();
        assert!(!signal.is_stopped());
        source.cancel(CancelReason::Requested);
        assert!(signal.is_stopped());
        assert!(signal.wait_timeout(Duration::from_secs(5)));
    }

    #[test]
    fn script_sends_in_order() {
        let sub = Script::new(1, vec![Msg::Value(1), Msg::Value(2)]);
        let (tx, rx) = mpsc::channel();
        let (signal, _source) = StopSignal::new();
        sub.run(tx, signal);
        assert_eq!(rx.try_iter().collect::<Vec<_>>(), vec![Msg::Value(1), Msg::Value(2)]);
    }

    #[test]
    fn stopped_script_sends_nothing() {
        let sub = Script::new(1, vec![Msg::Value(1)]).paced(Duration::from_secs(10));
        let (tx, rx) = mpsc::channel();
        let (signal, source) = StopSignal::new();
        source.cancel(CancelReason::Requested);
        sub.run(tx, signal);
        assert!(rx.try_iter().next().is_none());
    }

    #[test]
    fn manager_receives_frames_then_stops() {
        let mut mgr = SubscriptionManager::<Msg>::new();
        assert!(mgr.start(Box::new(Every::with_id(7, Duration::from_millis(5), || Msg::Frame))));
        assert!(!mgr.start(Box::new(Every::with_id(7, Duration::from_millis(5), || Msg::Frame))));

        assert_eq!(mgr.recv_timeout(Duration::from_secs(2)), Some(Msg::Frame));

        assert!(mgr.stop(7));
        assert!(!mgr.is_running(7));
        let _ = queued(&mgr);
        thread::sleep(Duration::from_millis(30));
        assert!(queued(&mgr).is_empty(), "frames after stop");
    }

    #[test]
    fn manager_sender_posts_into_same_channel() {
        let mgr = SubscriptionManager::<Msg>::new();
        mgr.sender().send(Msg::Value(9)).unwrap();
        assert_eq!(mgr.recv_timeout(Duration::from_millis(100)), Some(Msg::Value(9)));
    }

    #[test]
    fn stop_all_halts_everything() {
        let mut mgr = SubscriptionManager::<Msg>::new();
        mgr.start(Box::new(Every::with_id(1, Duration::from_millis(5), || Msg::Value(1))));
        mgr.start(Box::new(Every::with_id(2, Duration::from_millis(5), || Msg::Value(2))));
        assert_eq!(mgr.len(), 2);

        mgr.stop_all();
        assert!(mgr.is_empty());
        let _ = queued(&mgr);
        thread::sleep(Duration::from_millis(30));
        assert!(queued(&mgr).is_empty());
    }
}
