use crate::cadence::Cadence;
use crate::logger::{BatchLogger, LogError, LogRecord};
use crate::provider::MetricsProvider;
use crate::screen::Screen;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Running,
    Flushing,
    Draining,
    Terminated,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IterationOutcome {
    Buffered { pending: usize },
    Flushed { written: usize },
    FlushFailed { pending: usize },
    SampleFailed,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SessionStats {
    pub iterations: u64,
    pub samples_failed: u64,
    pub records_written: u64,
    pub flushes: u64,
    pub flush_failures: u64,
}

/// Sampling loop state: provider, screen, log buffer and pacing.
///
/// Nothing here is shared; the loop owns the buffer and is the only caller
/// of the logger, so a single task drives everything.
pub struct Session<P, S> {
    provider: P,
    screen: S,
    logger: BatchLogger,
    cadence: Cadence,
    state: SessionState,
    stats: SessionStats,
}

impl<P: MetricsProvider, S: Screen> Session<P, S> {
    pub fn new(provider: P, screen: S, logger: BatchLogger, cadence: Cadence) -> Self {
        Self {
            provider,
            screen,
            logger,
            cadence,
            state: SessionState::Running,
            stats: SessionStats::default(),
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn stats(&self) -> SessionStats {
        self.stats
    }

    /// One tick: sample, draw, buffer, and flush when the batch is full.
    ///
    /// Failures are reported and swallowed; the loop always continues.
    pub fn run_iteration(&mut self) -> IterationOutcome {
        self.stats.iterations += 1;

        let snapshot = match self.provider.sample() {
            Ok(snapshot) => snapshot,
            Err(err) => {
                self.stats.samples_failed += 1;
                warn!(error = %err, "снимок пропущен");
                return IterationOutcome::SampleFailed;
            }
        };

        if let Err(err) = self.screen.draw(&snapshot) {
            debug!(error = %err, "не удалось отрисовать экран");
        }

        self.logger.append(&LogRecord::from_snapshot(&snapshot));
        if !self.logger.should_flush() {
            return IterationOutcome::Buffered {
                pending: self.logger.len(),
            };
        }

        self.state = SessionState::Flushing;
        let outcome = match self.logger.flush() {
            Ok(written) => {
                self.record_flush(written);
                IterationOutcome::Flushed { written }
            }
            Err(err) => {
                self.stats.flush_failures += 1;
                error!(
                    error = %err,
                    pending = self.logger.len(),
                    "сброс журнала не удался, данные остаются в буфере"
                );
                IterationOutcome::FlushFailed {
                    pending: self.logger.len(),
                }
            }
        };
        self.state = SessionState::Running;
        outcome
    }

    /// Final flush on shutdown. Returns `None` when the buffer was empty.
    pub fn drain(&mut self) -> Option<Result<usize, LogError>> {
        self.state = SessionState::Draining;
        if let Err(err) = self.screen.exit_notice() {
            debug!(error = %err, "не удалось вывести сообщение о выходе");
        }

        let result = if self.logger.is_empty() {
            None
        } else {
            let pending = self.logger.len();
            info!(pending, "сбрасываем буфер журнала перед выходом");
            let result = self.logger.force_flush();
            match &result {
                Ok(written) => {
                    self.record_flush(*written);
                    info!(written, "буфер журнала сохранён");
                }
                Err(err) => {
                    self.stats.flush_failures += 1;
                    error!(error = %err, lost = pending, "не удалось сохранить буфер журнала");
                }
            }
            Some(result)
        };

        self.state = SessionState::Terminated;
        result
    }

    /// Runs ticks until the shutdown flag is raised, then drains.
    ///
    /// The flag is checked between iterations and while waiting out the
    /// cadence delay; an iteration in progress always completes.
    pub async fn run(
        &mut self,
        mut shutdown: watch::Receiver<bool>,
    ) -> Option<Result<usize, LogError>> {
        info!(
            period = %humantime::format_duration(self.cadence.period()),
            flush_threshold = self.logger.threshold(),
            log_dir = %self.logger.dir().display(),
            "цикл сбора запущен"
        );

        loop {
            if *shutdown.borrow() {
                break;
            }

            let start = self.cadence.tick_start();
            match self.run_iteration() {
                IterationOutcome::Flushed { written } => {
                    info!(written, "пакет записей сохранён в журнал");
                }
                IterationOutcome::Buffered { pending }
                | IterationOutcome::FlushFailed { pending } => {
                    debug!(pending, "записей в буфере");
                }
                IterationOutcome::SampleFailed => {}
            }
            let delay = self.cadence.remaining_delay(start);
            if delay.is_zero() {
                debug!(
                    elapsed = %humantime::format_duration(start.elapsed()),
                    "итерация превысила период, следующая начнётся сразу"
                );
            }

            tokio::select! {
                biased;
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
                _ = tokio::time::sleep(delay) => {}
            }
        }

        info!("получен сигнал остановки цикла сбора");
        let result = self.drain();
        let stats = self.stats();
        info!(
            state = ?self.state(),
            iterations = stats.iterations,
            samples_failed = stats.samples_failed,
            records_written = stats.records_written,
            flushes = stats.flushes,
            flush_failures = stats.flush_failures,
            "сессия завершена"
        );
        result
    }

    fn record_flush(&mut self, written: usize) {
        self.stats.flushes += 1;
        self.stats.records_written += written as u64;
    }
}
