use std::path::Path;
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use image::{DynamicImage, ImageBuffer, Rgb, RgbImage};
use log::*;
use tokio::process::Command;

use super::device::{CaptureSource, Frame};
use super::{DeviceError, Result};
use crate::defaults;
use crate::drivers::hardware_enabled;

/// Picks a capture source for the configured camera id.
///
/// No id means the Pi camera module (`raspistill`). An id is a V4L device
/// path captured with `fswebcam`; relative ids live under `/dev/v4l/by-id/`.
/// With hardware disabled every id maps to a simulated camera.
pub fn open(camera: Option<&str>) -> Box<dyn CaptureSource> {
    if !hardware_enabled() {
        warn!("Hardware is disabled, using a simulated camera");
        return Box::new(SimulatedCamera::new(640, 480));
    }

    match camera {
        Some(id) => Box::new(CommandCamera::v4l(id)),
        None => Box::new(CommandCamera::raspistill()),
    }
}

/// Turns a camera id into a device path
pub fn resolve_device(id: &str) -> String {
    if Path::new(id).is_absolute() {
        id.to_string()
    } else {
        format!("{}{}", defaults::V4L_BY_ID, id)
    }
}

/// A camera driven by an external still-capture program that writes one JPEG
/// to stdout.
#[derive(Debug)]
pub struct CommandCamera {
    name: String,
    program: String,
    args: Vec<String>,
    timeout: Duration,
    released: bool,
}

impl CommandCamera {
    pub fn new(name: &str, program: &str, args: &[&str]) -> Self {
        CommandCamera {
            name: String::from(name),
            program: String::from(program),
            args: args.iter().map(|a| a.to_string()).collect(),
            timeout: defaults::capture_timeout(),
            released: false,
        }
    }

    /// A USB webcam, through fswebcam
    pub fn v4l(id: &str) -> Self {
        let device = resolve_device(id);
        trace!("Using {device} as the capture device");
        Self::new(
            &device,
            "fswebcam",
            &["--quiet", "--no-banner", "-d", &device, "--jpeg", "95", "-"],
        )
    }

    /// The Pi camera module
    pub fn raspistill() -> Self {
        Self::new(
            "raspistill",
            "raspistill",
            &[
                "--drc",
                "high",
                "--timeout",
                "1",
                "--nopreview",
                "--brightness",
                "50",
                "--ISO",
                "100",
                "-e",
                "jpg",
                "-o",
                "-",
            ],
        )
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

#[async_trait]
impl CaptureSource for CommandCamera {
    fn name(&self) -> &str {
        &self.name
    }

    async fn capture(&mut self) -> Result<Frame> {
        if self.released {
            return Err(DeviceError::NoConnection(self.name.clone()));
        }

        trace!("Image capture command = `{} {:?}`", self.program, self.args);

        // kill_on_drop: if the timeout fires, dropping the child kills it
        let child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| DeviceError::NoConnection(format!("{} ({}: {e})", self.name, self.program)))?;

        let output = match tokio::time::timeout(self.timeout, child.wait_with_output()).await {
            Ok(output) => output?,
            Err(_) => {
                return Err(DeviceError::CommunicationError(format!(
                    "{} did not finish within {:?}",
                    self.program, self.timeout
                )))
            }
        };

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(DeviceError::CommunicationError(format!(
                "{} exited with {}: {}",
                self.program,
                output.status,
                stderr.trim()
            )));
        }

        if output.stdout.is_empty() {
            return Err(DeviceError::NoFrame(self.name.clone()));
        }

        trace!("Got {} bytes from {}", output.stdout.len(), self.program);
        Ok(image::load_from_memory(&output.stdout)?)
    }

    fn release(&mut self) {
        if !self.released {
            debug!("Releasing camera {}", self.name);
            self.released = true;
        }
    }
}

/// Generates frames instead of talking to hardware
#[derive(Debug)]
pub struct SimulatedCamera {
    width: u32,
    height: u32,
    frames: u32,
    released: bool,
}

impl SimulatedCamera {
    pub fn new(width: u32, height: u32) -> Self {
        SimulatedCamera {
            width: width.max(1),
            height: height.max(1),
            frames: 0,
            released: false,
        }
    }

    pub fn frames(&self) -> u32 {
        self.frames
    }
}

#[async_trait]
impl CaptureSource for SimulatedCamera {
    fn name(&self) -> &str {
        "simulated"
    }

    async fn capture(&mut self) -> Result<Frame> {
        if self.released {
            return Err(DeviceError::NoConnection(self.name().to_string()));
        }

        // Dark frame with a white dot that walks along the diagonal
        let mut img: RgbImage = ImageBuffer::new(self.width, self.height);
        let step = self.frames % self.width.min(self.height);
        *img.get_pixel_mut(step, step) = Rgb([255, 255, 255]);
        self.frames = self.frames.wrapping_add(1);

        trace!("Simulated frame #{}", self.frames);
        Ok(DynamicImage::ImageRgb8(img))
    }

    fn release(&mut self) {
        self.released = true;
    }
}
