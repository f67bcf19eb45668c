//! The capture loop.
//!
//! Every cycle:
//! 1. ask the printer for its state (keep the old one if it doesn't answer)
//! 2. take a picture
//! 3. save it and upload it, unless the camera came back empty-handed
//! 4. every `CLEANUP_INTERVAL` cycles, delete the oldest images
//! 5. sleep 60s while printing, 120s otherwise
//!
//! Nothing in a cycle stops the loop except a printer that answers the status
//! request with an error: the state is then unknown and waiting won't fix it.
use std::future::Future;
use std::io;
use std::num::NonZeroUsize;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use log::*;

use crate::config::{ConfigError, Session};
use crate::defaults::CLEANUP_INTERVAL;
use crate::drivers::camera;
use crate::drivers::device::{CaptureSource, Frame};
use crate::model::{Cadence, DeviceState, Fingerprint, Rotation};
use crate::remote::{ImageSink, PollOutcome, RemoteError, StatusSource};
use crate::report::Reporter;
use crate::store::ImageStore;

#[derive(thiserror::Error, Debug)]
pub enum SchedulerError {
    #[error("Printer status is unknown: {0}")]
    Status(#[from] RemoteError),
    #[error("Could not listen for the stop signal: {0}")]
    Signal(#[source] std::io::Error),
}

/// Wall time for file names, and the sleep between cycles
#[async_trait]
pub trait Clock: Send {
    fn now(&self) -> DateTime<Utc>;
    async fn sleep(&mut self, duration: Duration);
}

pub struct SystemClock;

#[async_trait]
impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }

    async fn sleep(&mut self, duration: Duration) {
        tokio::time::sleep(duration).await
    }
}

/// What to capture and how much of it to keep
#[derive(Debug, Clone)]
pub struct Settings {
    pub fingerprint: Fingerprint,
    pub rotation: Rotation,
    pub max_images: NonZeroUsize,
}

impl From<&Session> for Settings {
    fn from(session: &Session) -> Self {
        Settings {
            fingerprint: session.fingerprint.clone(),
            rotation: session.rotation,
            max_images: session.max_images,
        }
    }
}

pub struct Scheduler {
    settings: Settings,
    store: ImageStore,
    camera: Box<dyn CaptureSource>,
    status: Box<dyn StatusSource>,
    uploader: Box<dyn ImageSink>,
    clock: Box<dyn Clock>,
    reporter: Reporter,
    state: DeviceState,
    since_cleanup: u32,
    cycles: u64,
    released: bool,
}

impl Scheduler {
    pub fn new(
        settings: Settings,
        store: ImageStore,
        camera: Box<dyn CaptureSource>,
        status: Box<dyn StatusSource>,
        uploader: Box<dyn ImageSink>,
        reporter: Reporter,
    ) -> Self {
        Scheduler {
            settings,
            store,
            camera,
            status,
            uploader,
            clock: Box::new(SystemClock),
            reporter,
            state: DeviceState::default(),
            since_cleanup: 0,
            cycles: 0,
            released: false,
        }
    }

    pub fn with_clock(mut self, clock: Box<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Builds the real thing from a validated session: image directory, HTTP
    /// clients, then the camera, which has to take one test picture.
    pub async fn start(session: &Session, reporter: Reporter) -> Result<Self, ConfigError> {
        let store = session.open_store()?;
        let status = session.status_client()?;
        let uploader = session.uploader()?;
        let camera = verified(camera::open(session.camera.as_deref())).await?;

        Ok(Self::new(
            Settings::from(session),
            store,
            camera,
            Box::new(status),
            Box::new(uploader),
            reporter,
        ))
    }

    pub fn state(&self) -> &DeviceState {
        &self.state
    }

    pub fn cadence(&self) -> Cadence {
        Cadence::for_state(&self.state)
    }

    pub fn cycles(&self) -> u64 {
        self.cycles
    }

    pub fn reporter(&self) -> &Reporter {
        &self.reporter
    }

    /// Runs until the status endpoint fails or the future is dropped
    pub async fn run(&mut self) -> Result<(), SchedulerError> {
        info!(
            "Capturing every {:?} while printing, every {:?} otherwise",
            Cadence::Active.interval(),
            Cadence::Idle.interval()
        );
        loop {
            self.step().await?;
        }
    }

    /// Runs until `stop` resolves. A stop that fails to even start listening
    /// is an error, not a request to stop.
    pub async fn run_until<F>(&mut self, stop: F) -> Result<(), SchedulerError>
    where
        F: Future<Output = io::Result<()>>,
    {
        let signal = tokio::select! {
            // Checked first, the loop never hands control back on its own
            biased;
            signal = stop => signal,
            result = self.run() => return result,
        };

        signal.map_err(SchedulerError::Signal)?;
        self.reporter.interrupted();
        Ok(())
    }

    /// Same as `run`, but stops after `count` cycles
    #[cfg(test)]
    async fn run_cycles(&mut self, count: u64) -> Result<(), SchedulerError> {
        for _ in 0..count {
            self.step().await?;
        }
        Ok(())
    }

    async fn step(&mut self) -> Result<(), SchedulerError> {
        let cadence = self.cycle().await?;
        let interval = cadence.interval();
        trace!("Sleeping {interval:?} ({cadence})");
        self.clock.sleep(interval).await;
        Ok(())
    }

    /// One pass through the loop body, without the sleep. Returns the cadence
    /// to sleep for.
    pub async fn cycle(&mut self) -> Result<Cadence, SchedulerError> {
        self.refresh_state().await?;

        match self.camera.capture().await {
            Ok(frame) => self.store_and_upload(frame).await,
            Err(e) => self.reporter.capture_failed(self.camera.name(), &e),
        }

        // Delete images every so often, not every cycle
        self.since_cleanup += 1;
        if self.since_cleanup >= CLEANUP_INTERVAL {
            self.since_cleanup = 0;
            let result = self
                .store
                .enforce_retention(&self.settings.fingerprint, self.settings.max_images);
            self.reporter.cleanup(&result);
        }

        self.cycles += 1;
        self.reporter.cycle_finished();
        Ok(self.cadence())
    }

    async fn refresh_state(&mut self) -> Result<(), SchedulerError> {
        match self.status.poll().await? {
            PollOutcome::State(state) => {
                if state != self.state {
                    self.reporter.state_changed(&self.state, &state);
                    self.state = state;
                }
            }
            PollOutcome::Unreachable => {
                self.reporter.poll_unreachable(self.status.endpoint(), &self.state)
            }
        }
        Ok(())
    }

    async fn store_and_upload(&self, frame: Frame) {
        let record = match self.store.save_at(
            &self.settings.fingerprint,
            frame,
            self.settings.rotation,
            self.clock.now(),
        ) {
            Ok(record) => record,
            Err(e) => {
                self.reporter.save_failed(&e);
                return;
            }
        };

        let outcome = self.uploader.upload(record.bytes()).await;
        self.reporter.upload(&record, &outcome);
    }

    /// Gives the camera back. Safe to call more than once.
    pub fn release_camera(&mut self) {
        if !self.released {
            self.camera.release();
            self.released = true;
            info!("Released camera {}", self.camera.name());
        }
    }

    pub fn shutdown(mut self) {
        self.release_camera();
    }
}

impl Drop for Scheduler {
    fn drop(&mut self) {
        self.release_camera();
    }
}

/// Takes one test picture; a camera that can't is released before the error is returned
pub async fn verified(mut camera: Box<dyn CaptureSource>) -> Result<Box<dyn CaptureSource>, ConfigError> {
    info!("Verifying camera {}", camera.name());
    match camera.verify().await {
        Ok(()) => Ok(camera),
        Err(source) => {
            camera.release();
            Err(ConfigError::Camera {
                camera: camera.name().to_string(),
                source,
            })
        }
    }
}
