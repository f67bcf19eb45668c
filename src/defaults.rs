use std::env::var;
use std::time::Duration;

/// Images kept per fingerprint when no limit is configured
pub const DEFAULT_MAX_IMAGES: usize = 500;

/// Timestamp embedded in image file names. Fixed width, so sorting the
/// strings sorts the captures chronologically.
pub const TIMESTAMP_FMT: &str = "%Y-%m-%d_%H_%M_%S";

pub const SNAPSHOT_URL: &str = "https://connect.prusa3d.com/c/snapshot";

/// Retention is enforced once every this many cycles
pub const CLEANUP_INTERVAL: u32 = 20;

pub const MIN_FINGERPRINT_LEN: usize = 16;

pub const DEFAULT_PRINTER_NAME: &str = "printer";

/// Where relative camera ids are looked up
pub const V4L_BY_ID: &str = "/dev/v4l/by-id/";

pub const JPEG_QUALITY: u8 = 90;

pub fn img_dir() -> String {
    var("PRUSACAM_IMG_DIR").unwrap_or(String::from("./img"))
}

/// Set `PRUSACAM_HARDWARE=0` to run against a simulated camera
pub fn hardware_enabled() -> bool {
    match var("PRUSACAM_HARDWARE") {
        Ok(v) => !matches!(v.trim().to_lowercase().as_str(), "0" | "false" | "no" | "off"),
        Err(_) => true,
    }
}

pub fn active_cadence() -> Duration {
    Duration::from_secs(60)
}

pub fn idle_cadence() -> Duration {
    Duration::from_secs(120)
}

pub fn http_timeout() -> Duration {
    Duration::from_secs(10)
}

pub fn connect_timeout() -> Duration {
    Duration::from_secs(5)
}

pub fn capture_timeout() -> Duration {
    Duration::from_secs(30)
}
