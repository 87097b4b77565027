//! Line commands from a reader (stdin in the binary).

use std::io::BufRead;
use std::sync::Mutex;
use std::sync::mpsc;
use std::thread;
use std::time::Duration;

use marquee_runtime::{Command, StageMsg, StopSignal, SubId, Subscription};
use tracing::{debug, warn};

/// Subscription id of the command reader.
pub const INPUT_ID: SubId = 0x494E_5055_54; // "INPUT"

const POLL: Duration = Duration::from_millis(25);

/// Parses each line of `reader` into a [`Command`].
///
/// Blank lines are skipped and malformed lines are logged. Blocking reads
/// happen on a detached thread so stopping the subscription never waits on
/// the reader.
pub struct LineInput<R> {
    reader: Mutex<Option<R>>,
    close_on_eof: bool,
}

impl<R: BufRead + Send + 'static> LineInput<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader: Mutex::new(Some(reader)),
            close_on_eof: true,
        }
    }

    /// Whether end of input posts [`StageMsg::InputClosed`]. Default: true.
    #[must_use]
    pub fn close_on_eof(mut self, close: bool) -> Self {
        self.close_on_eof = close;
        self
    }
}

impl<R: BufRead + Send + 'static> Subscription<StageMsg> for LineInput<R> {
    fn id(&self) -> SubId {
        INPUT_ID
    }

    fn run(&self, sender: mpsc::Sender<StageMsg>, stop: StopSignal) {
        let reader = self
            .reader
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take();
        let Some(reader) = reader else {
            warn!("line input already consumed");
            return;
        };

        let (line_tx, line_rx) = mpsc::channel::<Option<String>>();
        thread::spawn(move || {
            for line in reader.lines() {
                let Ok(line) = line else { break };
                if line_tx.send(Some(line)).is_err() {
                    return;
                }
            }
            let _ = line_tx.send(None);
        });

        while !stop.is_stopped() {
            match line_rx.recv_timeout(POLL) {
                Ok(Some(line)) => {
                    if line.trim().is_empty() {
                        continue;
                    }
                    match line.parse::<Command>() {
                        Ok(command) => {
                            if sender.send(StageMsg::Command(command)).is_err() {
                                return;
                            }
                        }
                        Err(err) => warn!(%err, line = %line.trim(), "bad command"),
                    }
                }
                Ok(None) | Err(mpsc::RecvTimeoutError::Disconnected) => {
                    debug!("input closed");
                    if self.close_on_eof {
                        let _ = sender.send(StageMsg::InputClosed);
                    }
                    return;
                }
                Err(mpsc::RecvTimeoutError::Timeout) => {}
            }
        }
    }
}
