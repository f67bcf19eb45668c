//! Printer state as seen by the capture loop
use std::fmt::Display;
use std::time::Duration;

use crate::defaults;

/// The state PrusaLink reports while a job is running
pub const PRINTING: &str = "PRINTING";

/// The last state reported by the printer.
///
/// Only `PRINTING` matters for scheduling; every other value (`IDLE`,
/// `PAUSED`, `FINISHED`, `ATTENTION`, ...) is kept verbatim for the logs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeviceState {
    Printing,
    Other(String),
}

impl DeviceState {
    pub fn from_remote(state: &str) -> Self {
        if state.trim().eq_ignore_ascii_case(PRINTING) {
            DeviceState::Printing
        } else {
            DeviceState::Other(state.trim().to_string())
        }
    }

    pub fn is_printing(&self) -> bool {
        matches!(self, DeviceState::Printing)
    }
}

/// Until the printer answers, assume it is idle
impl Default for DeviceState {
    fn default() -> Self {
        DeviceState::Other(String::from("IDLE"))
    }
}

impl Display for DeviceState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DeviceState::Printing => write!(f, "{PRINTING}"),
            DeviceState::Other(state) => write!(f, "{state}"),
        }
    }
}

/// How often the loop captures, derived from the device state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cadence {
    Active,
    Idle,
}

impl Cadence {
    pub fn for_state(state: &DeviceState) -> Self {
        if state.is_printing() {
            Cadence::Active
        } else {
            Cadence::Idle
        }
    }

    /// Time to sleep between two cycles
    pub fn interval(&self) -> Duration {
        match self {
            Cadence::Active => defaults::active_cadence(),
            Cadence::Idle => defaults::idle_cadence(),
        }
    }
}

impl Display for Cadence {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_printing_is_active() {
        let state = DeviceState::from_remote("PRINTING");
        assert_eq!(state, DeviceState::Printing);
        assert_eq!(Cadence::for_state(&state), Cadence::Active);
        assert_eq!(Cadence::Active.interval(), Duration::from_secs(60));
    }

    #[test]
    fn test_everything_else_is_idle() {
        for remote in ["IDLE", "PAUSED", "FINISHED", "ATTENTION", "BUSY", "ERROR", ""] {
            let state = DeviceState::from_remote(remote);
            assert!(!state.is_printing());
            assert_eq!(Cadence::for_state(&state), Cadence::Idle);
        }
        assert_eq!(Cadence::Idle.interval(), Duration::from_secs(120));
    }

    #[test]
    fn test_default_is_idle() {
        let state = DeviceState::default();
        assert_eq!(state.to_string(), "IDLE");
        assert_eq!(Cadence::for_state(&state), Cadence::Idle);
    }
}
