use thiserror::Error;

pub mod camera;
pub mod device;

#[derive(Error, Debug)]
pub enum DeviceError {
    #[error("No device `{0}` connected")]
    NoConnection(String),
    #[error("Communication error: {0}")]
    CommunicationError(String),
    #[error("Camera `{0}` returned no frame")]
    NoFrame(String),
    #[error("Could not decode frame: {0}")]
    DecodeError(#[from] image::ImageError),
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

/// A custom error type using the DeviceError defined above
pub type Result<T> = std::result::Result<T, DeviceError>;

pub fn hardware_enabled() -> bool {
    crate::defaults::hardware_enabled()
}
