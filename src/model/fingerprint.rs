use std::fmt;

use crate::config::ConfigError;
use crate::defaults::MIN_FINGERPRINT_LEN;

/// The identity set for a camera token the first time it is used.
///
/// Every upload is tagged with it and every stored image is named after it,
/// so it also namespaces the image directory.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Fingerprint(String);

impl Fingerprint {
    pub fn new(value: &str) -> Result<Self, ConfigError> {
        let len = value.chars().count();
        if len < MIN_FINGERPRINT_LEN {
            return Err(ConfigError::FingerprintTooShort(len));
        }
        // Goes into a file name and an HTTP header as is
        if let Some(c) = value.chars().find(|&c| !allowed(c)) {
            return Err(ConfigError::BadFingerprint(c));
        }
        Ok(Fingerprint(value.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

fn allowed(c: char) -> bool {
    c.is_ascii_graphic() && c != '/' && c != '\\'
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
