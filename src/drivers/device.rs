use async_trait::async_trait;
use image::DynamicImage;

use crate::drivers::Result;

/// One decoded frame, before rotation and encoding
pub type Frame = DynamicImage;

/// Anything that can take a still picture on demand.
///
/// The scheduler owns its source for the whole process lifetime and calls
/// `release` exactly once on the way out.
#[async_trait]
pub trait CaptureSource: Send {
    fn name(&self) -> &str;
    /// Takes one picture. Never blocks indefinitely.
    async fn capture(&mut self) -> Result<Frame>;
    /// Gives the device back. Later captures fail with `NoConnection`.
    fn release(&mut self);
    /// Takes and discards one picture to prove the device works
    async fn verify(&mut self) -> Result<()> {
        self.capture().await.map(|_| ())
    }
}
