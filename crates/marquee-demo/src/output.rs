//! Text rendering of stage events for stdout.

use std::io::{self, Write};

use marquee_core::{PhaseMap, StepIndex, ToggleOutcome};
use marquee_runtime::{Reply, View};

#[must_use]
pub fn view_line(view: View) -> String {
    match view {
        View::Loading => "== loading ==".to_string(),
        View::Main => "== main view ==".to_string(),
    }
}

/// Pipeline row: each phase, lit ones in brackets, joined by connectors.
#[must_use]
pub fn step_line(phases: &PhaseMap, index: StepIndex) -> String {
    let connectors = phases.connectors(index);
    let mut line = format!("step {index}: ");
    for (i, state) in phases.states(index).into_iter().enumerate() {
        if i > 0 {
            line.push_str(if connectors[i - 1] { " == " } else { " -- " });
        }
        if state.active {
            line.push('[');
            line.push_str(state.name);
            line.push(']');
        } else {
            line.push_str(state.name);
        }
    }
    if phases.is_scanning(index) {
        line.push_str("  (scanning)");
    }
    line
}

#[must_use]
pub fn reply_line(reply: &Reply) -> String {
    match reply {
        Reply::Toggled { id, outcome } => match outcome {
            ToggleOutcome::Selected => format!("+ {id}"),
            ToggleOutcome::Deselected => format!("- {id}"),
            ToggleOutcome::SideEffectOpened => format!("opened {id}; `dismiss` to close"),
            ToggleOutcome::Ignored => format!("no such item: {id}"),
        },
        Reply::Dismissed => "closed".to_string(),
        Reply::Selected { key } => format!("metric -> {key}"),
        Reply::UnknownCategory { key } => format!("no such category: {key}"),
        Reply::Reset => "selection cleared".to_string(),
        Reply::Status(status) => status.to_string(),
        Reply::NotReady => "still loading; try `status`".to_string(),
        Reply::Quit => "bye".to_string(),
    }
}

/// Line sink shared by the stage watchers.
///
/// Watch callbacks cannot return errors, so the first failed write is kept
/// and every later line is dropped. [`Console::finish`] reports it.
pub struct Console<W: Write> {
    out: W,
    error: Option<io::Error>,
}

impl<W: Write> Console<W> {
    pub fn new(out: W) -> Self {
        Self { out, error: None }
    }

    pub fn line(&mut self, text: &str) {
        if self.error.is_some() {
            return;
        }
        if let Err(err) = writeln!(self.out, "{text}") {
            self.error = Some(err);
        }
    }

    /// Flush, or return the first write error.
    pub fn finish(&mut self) -> io::Result<()> {
        match self.error.take() {
            Some(err) => Err(err),
            None => self.out.flush(),
        }
    }
}
