use std::time::Duration;

use crate::error::Result;
use crate::output::Clock;
use crate::pipeline::{RunSummary, StreamProcessor};
use crate::shutdown::Shutdown;
use crate::source::command::AudioSource;

/// Keeps the audio source alive: open, process until the stream ends, wait,
/// repeat. Nothing but the shutdown flag ends the loop.
pub struct Supervisor<S: AudioSource, C: Clock> {
    source: S,
    processor: StreamProcessor<C>,
    retry_delay: Duration,
    shutdown: Shutdown,
}

impl<S: AudioSource, C: Clock> Supervisor<S, C> {
    pub fn new(source: S, processor: StreamProcessor<C>, shutdown: Shutdown) -> Self {
        let retry_delay = processor.config().retry_delay;
        Self {
            source,
            processor,
            retry_delay,
            shutdown,
        }
    }

    /// One independent attempt. The stream and everything the run allocated
    /// are dropped before this returns.
    pub fn run_once(&mut self) -> Result<RunSummary> {
        let stream = self.source.open()?;
        self.processor.run(stream)
    }

    /// Returns the number of attempts made, once shutdown is requested.
    pub fn run(&mut self) -> u64 {
        let mut attempts = 0u64;
        while !self.shutdown.is_triggered() {
            attempts += 1;
            match self.run_once() {
                Ok(summary) => log::info!(
                    "stream ended after {} s of audio, {} rows written",
                    summary.frames,
                    summary.emissions
                ),
                Err(e) => {
                    let kind = e.kind();
                    log::error!("run {} aborted ({}): {:#}", attempts, kind, anyhow::Error::from(e));
                }
            }

            if self.shutdown.is_triggered() {
                break;
            }
            log::info!("restarting in {} s", self.retry_delay.as_secs_f32());
            if self.shutdown.wait(self.retry_delay) {
                break;
            }
        }
        log::info!("shutting down after {} runs", attempts);
        attempts
    }
}
