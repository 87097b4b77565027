#![forbid(unsafe_code)]

//! The stage: one instance of each engine plus the current view.
//!
//! A [`Stage`] mirrors the page it drives. It opens on [`View::Loading`]
//! with the progress simulator running; the simulator's completion callback
//! posts a `LoadingComplete` event, and the next frame switches to
//! [`View::Main`], starts the pipeline indicator, and begins animating the
//! metric. Host input arrives as [`Command`]s.
//!
//! The stage never reads a clock. [`Stage::frame`] takes the elapsed time,
//! so tests drive it with synthetic frames and [`StageLoop`](crate::StageLoop)
//! drives it with real ones.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::fmt;
use std::rc::Rc;
use std::str::FromStr;
use std::time::Duration;

use marquee_core::{
    CategoricalValueInterpolator, ConfigError, CyclicStepScheduler, PhaseMap, ProgressPhase,
    ProgressSimulator, RunHandle, StepIndex, ToggleOutcome, ToggleSelectionModel,
};
use thiserror::Error;
use tracing::{debug, info, trace, warn};

use crate::config::{StageConfig, micros};
use crate::reactive::Observable;

/// Which top-level view is on screen.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum View {
    Loading,
    Main,
}

impl fmt::Display for View {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Loading => "loading",
            Self::Main => "main",
        })
    }
}

/// Host input, usually one line of text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Toggle(String),
    Dismiss,
    Select(String),
    Reset,
    Status,
    Quit,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CommandError {
    #[error("empty command")]
    Empty,
    #[error("unknown command: {0}")]
    Unknown(String),
    #[error("`{command}` needs an argument")]
    MissingArgument { command: &'static str },
}

impl FromStr for Command {
    type Err = CommandError;

    /// `toggle <id>`, `dismiss`, `select <key>`, `reset`, `status`, `quit`.
    /// The argument is the rest of the line, trimmed, so keys may contain
    /// spaces.
    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let line = line.trim();
        let (word, rest) = match line.split_once(char::is_whitespace) {
            Some((word, rest)) => (word, rest.trim()),
            None => (line, ""),
        };
        let arg = |command: &'static str| {
            if rest.is_empty() {
                Err(CommandError::MissingArgument { command })
            } else {
                Ok(rest.to_string())
            }
        };
        match word.to_ascii_lowercase().as_str() {
            "" => Err(CommandError::Empty),
            "toggle" => arg("toggle").map(Self::Toggle),
            "select" => arg("select").map(Self::Select),
            "dismiss" => Ok(Self::Dismiss),
            "reset" => Ok(Self::Reset),
            "status" => Ok(Self::Status),
            "quit" | "exit" => Ok(Self::Quit),
            other => Err(CommandError::Unknown(other.to_string())),
        }
    }
}

/// Messages delivered to the stage loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StageMsg {
    /// A frame pulse; the loop measures the real elapsed time itself.
    Frame,
    Command(Command),
    /// The command source reached end of input.
    InputClosed,
}

/// Result of applying a [`Command`].
#[derive(Debug, Clone, PartialEq)]
pub enum Reply {
    Toggled { id: String, outcome: ToggleOutcome },
    Dismissed,
    Selected { key: String },
    UnknownCategory { key: String },
    Reset,
    Status(Box<StageStatus>),
    /// The main view is not up yet; only `status` and `quit` are accepted.
    NotReady,
    Quit,
}

/// Snapshot of everything a render surface shows.
#[derive(Debug, Clone, PartialEq)]
pub struct StageStatus {
    pub view: View,
    pub progress_percent: u8,
    pub progress_phase: ProgressPhase,
    pub step: StepIndex,
    pub active_phases: Vec<String>,
    pub scanning: bool,
    pub summary: String,
    pub side_effect: Option<String>,
    pub category: String,
    pub metric_label: String,
    pub metric_sub_label: String,
    pub metric_value: f64,
    pub metric_target: f64,
}

impl fmt::Display for StageStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.view == View::Loading {
            return write!(f, "loading {:>3}% ({:?})", self.progress_percent, self.progress_phase);
        }
        write!(
            f,
            "step {} [{}]{} | {} | {} {}: {:.1}/{:.0} ({})",
            self.step,
            self.active_phases.join(", "),
            if self.scanning { " scanning" } else { "" },
            self.summary,
            self.category,
            self.metric_label,
            self.metric_value,
            self.metric_target,
            self.metric_sub_label,
        )?;
        if let Some(payload) = &self.side_effect {
            write!(f, " | viewing {payload}")?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StageEvent {
    LoadingComplete,
}

/// Host model wiring the four engines together.
pub struct Stage {
    progress: ProgressSimulator,
    loading_run: Option<RunHandle>,
    pipeline: CyclicStepScheduler,
    pipeline_run: Option<RunHandle>,
    phases: PhaseMap,
    skills: ToggleSelectionModel,
    metric: CategoricalValueInterpolator<String>,
    events: Rc<RefCell<VecDeque<StageEvent>>>,
    view: Observable<View>,
    step: Observable<StepIndex>,
    summary: Observable<String>,
}

impl fmt::Debug for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Stage")
            .field("view", &self.view.get())
            .field("progress", &self.progress)
            .field("step", &self.pipeline.index())
            .field("selected", &self.skills.selected_count())
            .field("category", self.metric.current())
            .finish()
    }
}

impl Stage {
    /// Build every engine from `config`. Nothing runs until [`mount`](Self::mount).
    pub fn new(config: &StageConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let progress = match config.seed {
            Some(seed) => ProgressSimulator::with_seed(config.progress_config(), seed)?,
            None => ProgressSimulator::new(config.progress_config())?,
        };
        let pipeline = CyclicStepScheduler::new(config.step_config())?;
        let skills = ToggleSelectionModel::new(config.catalog()?);
        let metric = CategoricalValueInterpolator::new(
            config.category_table()?,
            config.initial_category.clone(),
            config.spring_params()?,
        )?;
        let summary = Observable::new(skills.summary());
        Ok(Self {
            progress,
            loading_run: None,
            step: Observable::new(pipeline.index()),
            pipeline,
            pipeline_run: None,
            phases: config.phase_map()?,
            skills,
            metric,
            events: Rc::new(RefCell::new(VecDeque::new())),
            view: Observable::new(View::Loading),
            summary,
        })
    }

    /// Start the loading simulation. A second mount while mounted is ignored;
    /// mounting again after [`unmount`](Self::unmount) replays the loading
    /// view.
    pub fn mount(&mut self) {
        if self.loading_run.is_some() || self.pipeline_run.is_some() {
            warn!("stage already mounted");
            return;
        }
        self.view.set(View::Loading);
        let events = Rc::clone(&self.events);
        self.loading_run = Some(self.progress.start(move || {
            events.borrow_mut().push_back(StageEvent::LoadingComplete);
        }));
        debug!("stage mounted");
    }

    /// Stop every running engine. Returns `true` if anything was running.
    pub fn unmount(&mut self) -> bool {
        let mut stopped = false;
        if let Some(run) = self.loading_run.take() {
            stopped |= self.progress.stop(run);
        }
        if let Some(run) = self.pipeline_run.take() {
            stopped |= self.pipeline.stop(run);
        }
        self.events.borrow_mut().clear();
        debug!(stopped, "stage unmounted");
        stopped
    }

    /// Advance every engine by `dt`.
    pub fn frame(&mut self, dt: Duration) {
        trace!(dt_us = micros(dt), "stage frame");
        let was_main = self.view.get() == View::Main;

        self.progress.tick(dt);
        loop {
            let event = self.events.borrow_mut().pop_front();
            match event {
                Some(StageEvent::LoadingComplete) => self.enter_main(),
                None => break,
            }
        }

        if was_main {
            if let Some(index) = self.pipeline.tick(dt) {
                self.step.set(index);
            }
            self.metric.advance(dt);
        }
    }

    fn enter_main(&mut self) {
        self.loading_run = None;
        if !self.view.set(View::Main) {
            return;
        }
        self.pipeline_run = Some(self.pipeline.start());
        info!("loading complete; main view shown");
    }

    /// Apply one host command.
    pub fn apply(&mut self, command: Command) -> Reply {
        let loading = self.view.get() == View::Loading;
        match command {
            Command::Status => Reply::Status(Box::new(self.status())),
            Command::Quit => Reply::Quit,
            command if loading => {
                warn!(?command, "command ignored while loading");
                Reply::NotReady
            }
            Command::Toggle(id) => {
                let outcome = self.skills.toggle(&id);
                self.summary.set(self.skills.summary());
                Reply::Toggled { id, outcome }
            }
            Command::Dismiss => {
                self.skills.dismiss_side_effect();
                Reply::Dismissed
            }
            Command::Select(key) => match self.metric.try_select_category(&key) {
                Ok(()) => Reply::Selected { key },
                Err(err) => {
                    warn!(%err, "select ignored");
                    Reply::UnknownCategory { key }
                }
            },
            Command::Reset => {
                self.skills.reset();
                self.summary.set(self.skills.summary());
                Reply::Reset
            }
        }
    }

    #[must_use]
    pub fn status(&self) -> StageStatus {
        let step = self.pipeline.index();
        let entry = self.metric.current_entry();
        StageStatus {
            view: self.view.get(),
            progress_percent: self.progress.percent(),
            progress_phase: self.progress.phase(),
            step,
            active_phases: self
                .phases
                .states(step)
                .into_iter()
                .filter(|s| s.active)
                .map(|s| s.name.to_string())
                .collect(),
            scanning: self.phases.is_scanning(step),
            summary: self.skills.summary(),
            side_effect: self
                .skills
                .active_side_effect()
                .and_then(|e| e.side_effect_payload.clone()),
            category: self.metric.current().clone(),
            metric_label: entry.label.clone(),
            metric_sub_label: entry.sub_label.clone(),
            metric_value: self.metric.displayed_value(),
            metric_target: self.metric.target_value(),
        }
    }

    /// Current view, observable.
    pub fn view(&self) -> &Observable<View> {
        &self.view
    }

    /// Pipeline index, observable. Only changes while the main view is up.
    pub fn step(&self) -> &Observable<StepIndex> {
        &self.step
    }

    /// Selection caption, observable.
    pub fn summary(&self) -> &Observable<String> {
        &self.summary
    }

    pub fn progress(&self) -> &ProgressSimulator {
        &self.progress
    }

    pub fn pipeline(&self) -> &CyclicStepScheduler {
        &self.pipeline
    }

    pub fn phases(&self) -> &PhaseMap {
        &self.phases
    }

    pub fn skills(&self) -> &ToggleSelectionModel {
        &self.skills
    }

    pub fn metric(&self) -> &CategoricalValueInterpolator<String> {
        &self.metric
    }
}
