#![forbid(unsafe_code)]

//! Wall-clock driver for a [`Stage`].
//!
//! The loop owns nothing but timing. A frame clock ([`Every`]) posts
//! [`StageMsg::Frame`] from its own thread; the loop measures real elapsed
//! time between frames and hands it to [`Stage::frame`]. Commands arrive in
//! the same channel from whatever subscriptions the host started, so frames
//! and commands are applied on one thread in arrival order.
//!
//! The loop ends on the first of: a cancelled token, the optional run
//! deadline, a `quit` command, or [`StageMsg::InputClosed`]. Either way the
//! stage is unmounted and every subscription is stopped and joined before
//! [`StageLoop::run`] returns.

use std::time::Duration;

use tracing::{debug, info, info_span};
use web_time::Instant;

use crate::cancellation::{CancelReason, CancellationToken};
use crate::config::millis;
use crate::stage::{Reply, Stage, StageMsg};
use crate::subscription::{Every, SubscriptionManager};

/// Id of the frame clock within the loop's [`SubscriptionManager`].
pub const FRAME_CLOCK_ID: u64 = 0x4652_414D_4530; // "FRAME0"

/// How a run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoopExit {
    pub reason: CancelReason,
    pub frames: u64,
    pub elapsed: Duration,
}

/// Drives a stage from real time.
#[derive(Debug, Clone)]
pub struct StageLoop {
    frame_interval: Duration,
    deadline: Option<Duration>,
}

impl StageLoop {
    pub fn new(frame_interval: Duration) -> Self {
        Self {
            frame_interval,
            deadline: None,
        }
    }

    /// End the run with [`CancelReason::Deadline`] after `limit`.
    #[must_use]
    pub fn with_deadline(mut self, limit: Duration) -> Self {
        self.deadline = Some(limit);
        self
    }

    /// Mount `stage` and run until cancelled. Every command reply other than
    /// `Quit` is passed to `on_reply`.
    pub fn run(
        &self,
        stage: &mut Stage,
        subs: &mut SubscriptionManager<StageMsg>,
        cancel: &CancellationToken,
        mut on_reply: impl FnMut(&Reply),
    ) -> LoopExit {
        let _span = info_span!(
            "stage",
            frame_ms = millis(self.frame_interval),
            deadline_ms = self.deadline.map(millis),
        )
        .entered();

        subs.start(Box::new(Every::with_id(
            FRAME_CLOCK_ID,
            self.frame_interval,
            || StageMsg::Frame,
        )));
        stage.mount();

        let started = Instant::now();
        let mut last_frame = started;
        let mut frames = 0u64;
        let poll = self.frame_interval.max(Duration::from_millis(1));

        let reason = loop {
            if let Some(reason) = cancel.reason() {
                break reason;
            }
            if self.deadline.is_some_and(|limit| started.elapsed() >= limit) {
                break CancelReason::Deadline;
            }
            match subs.recv_timeout(poll) {
                Some(StageMsg::Frame) => {
                    let now = Instant::now();
                    stage.frame(now.duration_since(last_frame));
                    last_frame = now;
                    frames += 1;
                }
                Some(StageMsg::Command(command)) => {
                    debug!(?command, "command received");
                    match stage.apply(command) {
                        Reply::Quit => break CancelReason::Requested,
                        reply => on_reply(&reply),
                    }
                }
                Some(StageMsg::InputClosed) => break CancelReason::InputClosed,
                None => {}
            }
        };

        stage.unmount();
        subs.stop_all();
        let exit = LoopExit {
            reason,
            frames,
            elapsed: started.elapsed(),
        };
        info!(
            reason = ?exit.reason,
            frames = exit.frames,
            elapsed_ms = millis(exit.elapsed),
            "stage loop ended"
        );
        exit
    }
}
