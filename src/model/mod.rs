mod fingerprint;
mod rotation;
mod state;
mod status;

pub use fingerprint::Fingerprint;
pub use rotation::Rotation;
pub use state::{Cadence, DeviceState};
pub use status::{PrinterInfo, PrinterStatus};
