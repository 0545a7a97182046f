//! Shared HTTP send-and-classify helper used by every target publisher: issues the
//! POST, maps the response status to the stage error taxonomy, and extracts a
//! `Retry-After` hint from 429 responses for the caller's retry loop.

use std::collections::BTreeMap;
use std::time::Duration;

use alert_core::error::StageError;
use alert_core::retry::RetryAfter;

const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(2);

pub fn build_client(request_timeout: Duration) -> Result<reqwest::Client, StageError> {
    reqwest::Client::builder()
        .timeout(request_timeout)
        .connect_timeout(DEFAULT_CONNECT_TIMEOUT)
        .build()
        .map_err(|err| StageError::Permanent(format!("failed to build http client: {err}")))
}

/// POSTs `body` to `url` with `headers` merged in, returning the outcome the retry
/// loop in `alert_core::publishing` expects.
pub async fn post_json(
    http: &reqwest::Client,
    url: &str,
    headers: &BTreeMap<String, String>,
    body: &str,
) -> (Result<(), StageError>, Option<RetryAfter>) {
    let mut request = http
        .post(url)
        .header("content-type", "application/json")
        .body(body.to_string());
    for (name, value) in headers {
        request = request.header(name, value);
    }

    let response = match request.send().await {
        Ok(response) => response,
        Err(err) => {
            let error = if err.is_timeout() {
                StageError::Timeout(Duration::from_secs(0))
            } else {
                StageError::Transient(format!("request failed: {err}"))
            };
            return (Err(error), None);
        }
    };

    let status = response.status();
    if status.is_success() {
        (Ok(()), None)
    } else if status.as_u16() == 429 {
        let retry_after = response
            .headers()
            .get("retry-after")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse::<u64>().ok())
            .map(|secs| RetryAfter(Duration::from_secs(secs)));
        (Err(StageError::Transient("rate limited (429)".into())), retry_after)
    } else if status.is_server_error() {
        (Err(StageError::Transient(format!("server error {status}"))), None)
    } else {
        (Err(StageError::Permanent(format!("client error {status}"))), None)
    }
}
