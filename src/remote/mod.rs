//! The two HTTP endpoints the loop talks to: PrusaLink on the printer for its
//! state, and Prusa Connect for the snapshots.
//!
//! Both clients separate "never reached the server" (timeouts, refused
//! connections) from "the server answered with something we can't use". The
//! first is always a normal outcome; only the status poller turns the second
//! into an error.
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

pub mod status;
pub mod upload;

pub use status::{PollOutcome, StatusClient};
pub use upload::{SnapshotUploader, UploadOutcome};

use crate::defaults;

#[derive(Error, Debug)]
pub enum RemoteError {
    /// The server answered with something other than 200
    #[error("{endpoint} responded {code}: {body}")]
    Status {
        endpoint: String,
        code: u16,
        body: String,
    },
    #[error("Could not decode response from {endpoint}: {source}")]
    Decode {
        endpoint: String,
        #[source]
        source: serde_json::Error,
    },
    /// The value itself is left out, it is usually a secret
    #[error("The `{0}` value contains characters that can't be sent in a header")]
    BadHeader(&'static str),
    #[error("HTTP client error: {0}")]
    Client(#[from] reqwest::Error),
}

pub type Result<T> = std::result::Result<T, RemoteError>;

/// Something that reports the printer state
#[async_trait]
pub trait StatusSource: Send + Sync {
    /// Where the state comes from, for the logs
    fn endpoint(&self) -> &str;
    async fn poll(&self) -> Result<PollOutcome>;
}

/// Somewhere to push a finished JPEG
#[async_trait]
pub trait ImageSink: Send + Sync {
    async fn upload(&self, image: &[u8]) -> UploadOutcome;
}

pub(crate) fn build_client(timeout: Duration) -> Result<reqwest::Client> {
    let client = reqwest::Client::builder()
        .timeout(timeout)
        .connect_timeout(defaults::connect_timeout().min(timeout))
        .build()?;
    Ok(client)
}

pub(crate) fn header_value(name: &'static str, value: &str) -> Result<reqwest::header::HeaderValue> {
    let mut value =
        reqwest::header::HeaderValue::from_str(value).map_err(|_| RemoteError::BadHeader(name))?;
    value.set_sensitive(true);
    Ok(value)
}
