use std::time::Duration;

use async_trait::async_trait;
use log::*;
use reqwest::header::HeaderValue;
use reqwest::StatusCode;

use super::{build_client, header_value, RemoteError, Result, StatusSource};
use crate::model::{DeviceState, PrinterStatus};

/// What a status poll came back with
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollOutcome {
    State(DeviceState),
    /// No answer at all. Keep whatever state we knew and ask again next cycle.
    Unreachable,
}

/// Client for the PrusaLink status endpoint on the printer
#[derive(Debug, Clone)]
pub struct StatusClient {
    client: reqwest::Client,
    url: String,
    api_key: HeaderValue,
}

impl StatusClient {
    /// `address` is the printer's host, optionally with a port (`192.168.1.20`, `printer.lan:8080`)
    pub fn new(address: &str, api_key: &str, timeout: Duration) -> Result<Self> {
        Ok(StatusClient {
            client: build_client(timeout)?,
            url: format!("http://{}/api/v1/status", address.trim_end_matches('/')),
            api_key: header_value("x-api-key", api_key)?,
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// One GET against the status endpoint.
    ///
    /// Returns `Unreachable` when no response arrived in time, and an error
    /// when the printer answered with a non-200 status or a body without
    /// `printer.state`.
    pub async fn poll(&self) -> Result<PollOutcome> {
        trace!("Polling printer status at {}", self.url);

        let resp = match self
            .client
            .get(&self.url)
            .header("x-api-key", self.api_key.clone())
            .send()
            .await
        {
            Ok(resp) => resp,
            Err(e) => {
                debug!("No response from {}: {e}", self.url);
                return Ok(PollOutcome::Unreachable);
            }
        };

        let code = resp.status();
        let body = match resp.bytes().await {
            Ok(body) => body,
            Err(e) => {
                debug!("Response from {} was cut short: {e}", self.url);
                return Ok(PollOutcome::Unreachable);
            }
        };

        if code != StatusCode::OK {
            return Err(RemoteError::Status {
                endpoint: self.url.clone(),
                code: code.as_u16(),
                body: String::from_utf8_lossy(&body).trim().to_string(),
            });
        }

        let status = PrinterStatus::from_json(&body).map_err(|source| RemoteError::Decode {
            endpoint: self.url.clone(),
            source,
        })?;

        trace!("Printer reports {}", status.printer.state);
        Ok(PollOutcome::State(status.device_state()))
    }
}

#[async_trait]
impl StatusSource for StatusClient {
    fn endpoint(&self) -> &str {
        &self.url
    }

    async fn poll(&self) -> Result<PollOutcome> {
        StatusClient::poll(self).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_url() {
        let client = StatusClient::new("192.168.1.20", "key", Duration::from_secs(1)).unwrap();
        assert_eq!(client.url(), "http://192.168.1.20/api/v1/status");

        let client = StatusClient::new("printer.lan:8080/", "key", Duration::from_secs(1)).unwrap();
        assert_eq!(client.url(), "http://printer.lan:8080/api/v1/status");
    }

    #[test]
    fn test_bad_api_key_is_rejected_up_front() {
        let err = StatusClient::new("192.168.1.20", "bad\nkey", Duration::from_secs(1)).unwrap_err();
        assert!(matches!(err, RemoteError::BadHeader("x-api-key")));
    }
}
