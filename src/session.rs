//! Serialized worker around [`StepDistEngine`].
//!
//! Motion samples and location fixes arrive on arbitrary threads at their own
//! pace. The session funnels them, together with every control call, through
//! one channel into a worker thread that owns the engine and ticks it at the
//! configured update interval. Ticks always consume the most recent motion
//! sample, so late or duplicated sensor deliveries are harmless.

use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use chrono::Utc;
use log::{debug, info, warn};

use crate::config::StepDistConfig;
use crate::engine::StepDistEngine;
use crate::error::{Result, StepDistError};
use crate::events::{StatusInfo, StepDistListener};
use crate::persistence::CalibrationStore;
use crate::{LocationFix, MotionSample};

/// Current wall-clock time in epoch seconds.
pub fn epoch_seconds() -> f64 {
    Utc::now().timestamp_millis() as f64 / 1000.0
}

enum Command {
    Start(StepDistConfig, Sender<Result<()>>),
    Stop(Sender<()>),
    Motion(MotionSample),
    Fix(LocationFix),
    SetBodyHeight(f64, Sender<Result<()>>),
    ResetCalibration(Sender<Result<()>>),
    SetLocationAvailable(bool),
    TotalSteps(Sender<u32>),
    StepsPerMinute(Sender<u32>),
    Status(Sender<StatusInfo>),
    Shutdown,
}

/// Handle to a running worker. Dropping it shuts the worker down.
pub struct StepDistSession {
    commands: Sender<Command>,
    worker: Option<JoinHandle<()>>,
}

impl StepDistSession {
    /// Create the engine (loading the persisted record) and spawn its worker.
    pub fn spawn(
        store: Box<dyn CalibrationStore>,
        listener: Box<dyn StepDistListener>,
    ) -> Result<Self> {
        crate::init_logging();
        let engine = StepDistEngine::new(store, listener)?;
        let (commands, receiver) = mpsc::channel();

        let worker = thread::Builder::new()
            .name("stepdist-worker".to_string())
            .spawn(move || run_worker(engine, receiver))
            .map_err(|e| StepDistError::InvalidInput {
                message: format!("failed to spawn worker thread: {}", e),
            })?;

        info!("[Session] Worker started");
        Ok(Self {
            commands,
            worker: Some(worker),
        })
    }

    pub fn start(&self, config: StepDistConfig) -> Result<()> {
        self.request(|reply| Command::Start(config, reply))?
    }

    pub fn stop(&self) -> Result<()> {
        self.request(Command::Stop)
    }

    pub fn feed_motion_sample(&self, sample: MotionSample) -> Result<()> {
        self.send(Command::Motion(sample))
    }

    /// Queue a location fix; it is stamped with the worker's clock.
    pub fn feed_location_fix(&self, fix: LocationFix) -> Result<()> {
        self.send(Command::Fix(fix))
    }

    pub fn set_body_height(&self, meters: f64) -> Result<()> {
        self.request(|reply| Command::SetBodyHeight(meters, reply))?
    }

    pub fn reset_calibration(&self) -> Result<()> {
        self.request(Command::ResetCalibration)?
    }

    pub fn set_location_available(&self, available: bool) -> Result<()> {
        self.send(Command::SetLocationAvailable(available))
    }

    pub fn total_steps(&self) -> Result<u32> {
        self.request(Command::TotalSteps)
    }

    pub fn steps_per_minute(&self) -> Result<u32> {
        self.request(Command::StepsPerMinute)
    }

    pub fn status(&self) -> Result<StatusInfo> {
        self.request(Command::Status)
    }

    /// Stop the worker and wait for it to exit.
    pub fn shutdown(mut self) {
        self.close();
    }

    fn send(&self, command: Command) -> Result<()> {
        self.commands
            .send(command)
            .map_err(|_| StepDistError::SessionClosed)
    }

    fn request<T, F>(&self, build: F) -> Result<T>
    where
        F: FnOnce(Sender<T>) -> Command,
    {
        let (reply, response) = mpsc::channel();
        self.send(build(reply))?;
        response.recv().map_err(|_| StepDistError::SessionClosed)
    }

    fn close(&mut self) {
        if let Some(worker) = self.worker.take() {
            let _ = self.commands.send(Command::Shutdown);
            if worker.join().is_err() {
                warn!("[Session] Worker panicked");
            }
            info!("[Session] Worker stopped");
        }
    }
}

impl Drop for StepDistSession {
    fn drop(&mut self) {
        self.close();
    }
}

// ============================================================================
// Worker
// ============================================================================

fn tick_period(engine: &StepDistEngine) -> Option<Duration> {
    engine
        .config()
        .map(|c| Duration::from_secs_f64(c.update_interval))
}

fn run_worker(mut engine: StepDistEngine, receiver: Receiver<Command>) {
    let mut next_tick: Option<Instant> = None;

    loop {
        if let Some(deadline) = next_tick {
            let now = Instant::now();
            if now >= deadline {
                if let Err(e) = engine.tick(epoch_seconds()) {
                    warn!("[Session] Tick failed: {}", e);
                }
                next_tick = tick_period(&engine).map(|period| {
                    let next = deadline + period;
                    if next < now {
                        // Fell behind: skip the missed ticks
                        now + period
                    } else {
                        next
                    }
                });
                continue;
            }
        }

        let command = match next_tick {
            Some(deadline) => {
                match receiver.recv_timeout(deadline.saturating_duration_since(Instant::now())) {
                    Ok(command) => command,
                    Err(RecvTimeoutError::Timeout) => continue,
                    Err(RecvTimeoutError::Disconnected) => break,
                }
            }
            None => match receiver.recv() {
                Ok(command) => command,
                Err(_) => break,
            },
        };

        match command {
            Command::Start(config, reply) => {
                let result = engine.start(config);
                if result.is_ok() {
                    next_tick = tick_period(&engine).map(|period| Instant::now() + period);
                }
                let _ = reply.send(result);
            }
            Command::Stop(reply) => {
                engine.stop();
                next_tick = None;
                let _ = reply.send(());
            }
            Command::Motion(sample) => {
                if let Err(e) = engine.feed_motion_sample(sample) {
                    debug!("[Session] Motion sample dropped: {}", e);
                }
            }
            Command::Fix(fix) => {
                if let Err(e) = engine.feed_location_fix(fix, epoch_seconds()) {
                    debug!("[Session] Location fix dropped: {}", e);
                }
            }
            Command::SetBodyHeight(meters, reply) => {
                let _ = reply.send(engine.set_body_height(meters));
            }
            Command::ResetCalibration(reply) => {
                let _ = reply.send(engine.reset_calibration());
            }
            Command::SetLocationAvailable(available) => engine.set_location_available(available),
            Command::TotalSteps(reply) => {
                let _ = reply.send(engine.total_steps());
            }
            Command::StepsPerMinute(reply) => {
                let _ = reply.send(engine.steps_per_minute(epoch_seconds()));
            }
            Command::Status(reply) => {
                let _ = reply.send(engine.status());
            }
            Command::Shutdown => break,
        }
    }

    engine.stop();
}
