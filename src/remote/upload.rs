use std::time::Duration;

use async_trait::async_trait;
use log::*;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, CONTENT_TYPE};
use reqwest::StatusCode;

use super::{build_client, header_value, ImageSink, Result};
use crate::model::Fingerprint;

/// What happened to one upload. None of these stop the loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UploadOutcome {
    Success,
    /// No answer in time; the image is dropped
    Unreachable,
    /// The server answered with something other than 200
    Rejected { code: u16, body: String },
}

impl UploadOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, UploadOutcome::Success)
    }
}

/// Pushes snapshots to Prusa Connect for one camera token
#[derive(Debug, Clone)]
pub struct SnapshotUploader {
    client: reqwest::Client,
    url: String,
    headers: HeaderMap,
}

impl SnapshotUploader {
    pub fn new(url: &str, token: &str, fingerprint: &Fingerprint, timeout: Duration) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("image/jpg"));
        headers.insert(
            HeaderName::from_static("fingerprint"),
            header_value("fingerprint", fingerprint.as_str())?,
        );
        headers.insert(HeaderName::from_static("token"), header_value("token", token)?);

        Ok(SnapshotUploader {
            client: build_client(timeout)?,
            url: url.to_string(),
            headers,
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// One PUT with the JPEG as the body. No retries here; the next cycle
    /// brings a fresh image anyway.
    pub async fn upload(&self, image: &[u8]) -> UploadOutcome {
        trace!("Uploading {} bytes to {}", image.len(), self.url);

        let resp = match self
            .client
            .put(&self.url)
            .headers(self.headers.clone())
            .body(image.to_vec())
            .send()
            .await
        {
            Ok(resp) => resp,
            Err(e) => {
                debug!("No response from {}: {e}", self.url);
                return UploadOutcome::Unreachable;
            }
        };

        let code = resp.status();
        if code == StatusCode::OK {
            return UploadOutcome::Success;
        }

        let body = resp.text().await.unwrap_or_default();
        UploadOutcome::Rejected {
            code: code.as_u16(),
            body: body.trim().to_string(),
        }
    }
}

#[async_trait]
impl ImageSink for SnapshotUploader {
    async fn upload(&self, image: &[u8]) -> UploadOutcome {
        SnapshotUploader::upload(self, image).await
    }
}
