use std::cell::RefCell;
use std::fmt::Display;
use std::io::{self, BufReader, Write};
use std::path::PathBuf;
use std::rc::Rc;
use std::time::Duration;

use clap::{ArgAction, Parser};
use marquee_runtime::{CancellationSource, Stage, StageConfig, StageLoop, SubscriptionManager};
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::error::{DemoError, Result};
use crate::input::LineInput;
use crate::output::{Console, reply_line, step_line, view_line};

#[derive(Debug, Parser)]
#[command(
    name = "marquee-demo",
    about = "Run the Marquee stage in a terminal and drive it with line commands",
    long_about = "Run the Marquee stage in a terminal.\n\n\
        Commands on stdin: toggle <id>, dismiss, select <key>, reset, status, quit.",
    version
)]
pub struct Cli {
    /// Stage configuration file (`.toml`, or `.json`).
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Seed for the loading simulation; overrides the file.
    #[arg(long, value_name = "N")]
    pub seed: Option<u64>,

    /// Frame interval in milliseconds; overrides the file.
    #[arg(long, value_name = "MS")]
    pub frame_ms: Option<u64>,

    /// Stop after this many seconds. Without it the run ends on `quit` or
    /// end of input.
    #[arg(long, value_name = "S")]
    pub duration_secs: Option<u64>,

    /// More log output on stderr (-v info, -vv debug, -vvv trace).
    /// `RUST_LOG` takes precedence.
    #[arg(short, long, action = ArgAction::Count)]
    pub verbose: u8,
}

impl Cli {
    /// Load the configured file (or defaults) and apply command-line
    /// overrides.
    pub fn stage_config(&self) -> Result<StageConfig> {
        let mut config = match &self.config {
            Some(path) => StageConfig::from_path(path)?,
            None => StageConfig::default(),
        };
        if let Some(seed) = self.seed {
            config.seed = Some(seed);
        }
        if let Some(frame_ms) = self.frame_ms {
            if frame_ms == 0 {
                return Err(DemoError::invalid("--frame-ms must be at least 1"));
            }
            config.frame_ms = frame_ms;
        }
        if self.duration_secs == Some(0) {
            return Err(DemoError::invalid("--duration-secs must be at least 1"));
        }
        Ok(config)
    }
}

fn log_level(verbose: u8) -> &'static str {
    match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    }
}

fn init_logging(verbose: u8) -> Result<()> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level(verbose)));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .try_init()
        .map_err(|err| DemoError::Logging {
            message: err.to_string(),
        })
}

pub fn run_from_env() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose)?;
    run(cli)
}

pub fn run(cli: Cli) -> Result<()> {
    let config = cli.stage_config()?;
    let mut stage = Stage::new(&config)?;
    let console = Rc::new(RefCell::new(Console::new(io::stdout())));

    let out = Rc::clone(&console);
    let _view = stage
        .view()
        .watch(move |view| out.borrow_mut().line(&view_line(*view)));
    let phases = stage.phases().clone();
    let out = Rc::clone(&console);
    let _step = stage
        .step()
        .watch(move |index| out.borrow_mut().line(&step_line(&phases, *index)));
    console.borrow_mut().line(&view_line(stage.view().get()));

    let mut subs = SubscriptionManager::new();
    subs.start(Box::new(
        LineInput::new(BufReader::new(io::stdin())).close_on_eof(cli.duration_secs.is_none()),
    ));

    let mut stage_loop = StageLoop::new(config.frame_interval());
    if let Some(secs) = cli.duration_secs {
        stage_loop = stage_loop.with_deadline(Duration::from_secs(secs));
    }
    let cancel = CancellationSource::new();
    let exit = stage_loop.run(&mut stage, &mut subs, &cancel.token(), |reply| {
        console.borrow_mut().line(&reply_line(reply));
    });

    write_status(&mut console.borrow_mut(), &stage.status())?;
    info!(reason = ?exit.reason, frames = exit.frames, "demo finished");
    Ok(())
}

/// Final status line, then surface any stdout failure from the run.
fn write_status<W: Write>(console: &mut Console<W>, status: &impl Display) -> Result<()> {
    console.line(&status.to_string());
    console.finish()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DemoError;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("marquee-demo").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn flags_parse() {
        let cli = parse(&["--seed", "9", "--frame-ms", "33", "--duration-secs", "5", "-vv"]);
        assert_eq!(cli.seed, Some(9));
        assert_eq!(cli.frame_ms, Some(33));
        assert_eq!(cli.duration_secs, Some(5));
        assert_eq!(cli.verbose, 2);
        assert!(cli.config.is_none());
    }

    #[test]
    fn overrides_apply_on_top_of_file() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(file, "seed = 1\nframe_ms = 50").unwrap();
        let path = file.path().to_str().unwrap().to_string();

        let config = parse(&["--config", &path, "--seed", "7"]).stage_config().unwrap();
        assert_eq!(config.seed, Some(7));
        assert_eq!(config.frame_ms, 50);
    }

    #[test]
    fn zero_frame_is_an_invalid_argument() {
        let err = parse(&["--frame-ms", "0"]).stage_config().unwrap_err();
        assert!(matches!(err, DemoError::InvalidArgument { .. }));
        assert_eq!(err.exit_code(), 2);
    }

    #[test]
    fn missing_config_file_fails_to_load() {
        let err = parse(&["--config", "/definitely/not/here.toml"])
            .stage_config()
            .unwrap_err();
        assert!(matches!(err, DemoError::Config(_)));
    }

    struct FullDisk;

    impl Write for FullDisk {
        fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
            Err(io::Error::from(io::ErrorKind::StorageFull))
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn stdout_failure_is_an_io_error() {
        let mut console = Console::new(FullDisk);
        console.line("== loading ==");
        let err = write_status(&mut console, &"view=main").unwrap_err();
        assert!(matches!(err, DemoError::Io(_)));
        assert_eq!(err.exit_code(), 1);
    }

    #[test]
    fn verbosity_maps_to_levels() {
        assert_eq!(log_level(0), "warn");
        assert_eq!(log_level(1), "info");
        assert_eq!(log_level(2), "debug");
        assert_eq!(log_level(9), "trace");
    }
}
