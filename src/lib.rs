pub mod config;
pub mod defaults;
pub mod drivers;
pub mod model;
pub mod remote;
pub mod report;
pub mod scheduler;
pub mod store;

pub mod prelude {
    pub use crate::config::{Cli, ConfigError, Session};
    pub use crate::drivers::device::{CaptureSource, Frame};
    pub use crate::drivers::DeviceError;
    pub use crate::model::{Cadence, DeviceState, Fingerprint, Rotation};
    pub use crate::remote::{ImageSink, PollOutcome, StatusSource, UploadOutcome};
    pub use crate::report::Reporter;
    pub use crate::scheduler::{Scheduler, SchedulerError};
    pub use crate::store::ImageStore;
}
