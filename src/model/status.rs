use serde::{Deserialize, Serialize};

use super::DeviceState;

// Only the fields the loop needs. PrusaLink sends a lot more (job, storage,
// temperatures); serde drops whatever isn't listed here.

/// Body of `GET /api/v1/status`
#[derive(Debug, PartialEq, Serialize, Deserialize, Clone)]
pub struct PrinterStatus {
    pub printer: PrinterInfo,
}

#[derive(Debug, PartialEq, Serialize, Deserialize, Clone)]
pub struct PrinterInfo {
    pub state: String,
}

impl PrinterStatus {
    pub fn from_json(body: &[u8]) -> std::result::Result<Self, serde_json::Error> {
        serde_json::from_slice(body)
    }

    pub fn device_state(&self) -> DeviceState {
        DeviceState::from_remote(&self.printer.state)
    }
}
