use bytes::Bytes;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use std::future::Future;
use std::time::Duration;
use tracing::debug;

use crate::core::cancel::CancelToken;
use crate::core::error::{Error, Result, Source};

const USER_AGENT: &str = "dynasty-dash/0.1";

pub(crate) fn http_client() -> Client {
    Client::builder()
        .user_agent(USER_AGENT)
        .build()
        .unwrap_or_default()
}

fn status_text(status: StatusCode) -> String {
    status.canonical_reason().unwrap_or_default().to_string()
}

/// Sends `request` and maps transport failures and non-2xx responses into
/// the typed error for `source`.
pub(crate) async fn send(
    source: Source,
    request: RequestBuilder,
    cancel: &CancelToken,
) -> Result<Response> {
    cancel
        .run(async {
            let response = request
                .send()
                .await
                .map_err(|e| Error::status(source, 0, e.to_string()))?;
            check_status(source, response)
        })
        .await
}

pub(crate) fn check_status(source: Source, response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        Ok(response)
    } else {
        debug!(%status, url = %response.url(), "Request returned an error status");
        Err(Error::status(source, status.as_u16(), status_text(status)))
    }
}

pub(crate) async fn read_json<T: DeserializeOwned>(
    source: Source,
    response: Response,
    cancel: &CancelToken,
) -> Result<T> {
    let status = response.status().as_u16();
    let text = cancel
        .run(async {
            response
                .text()
                .await
                .map_err(|e| Error::status(source, 0, e.to_string()))
        })
        .await?;
    serde_json::from_str(&text)
        .map_err(|e| Error::status(source, status, format!("malformed response: {e}")))
}

pub(crate) async fn get_json<T: DeserializeOwned>(
    source: Source,
    request: RequestBuilder,
    cancel: &CancelToken,
) -> Result<T> {
    let response = send(source, request, cancel).await?;
    read_json(source, response, cancel).await
}

pub(crate) async fn get_bytes(
    source: Source,
    request: RequestBuilder,
    cancel: &CancelToken,
) -> Result<Bytes> {
    let response = send(source, request, cancel).await?;
    cancel
        .run(async {
            response
                .bytes()
                .await
                .map_err(|e| Error::status(source, 0, e.to_string()))
        })
        .await
}

/// Retries a read while it fails with a transport error or a 5xx status.
///
/// # Parameters
/// - `operation`: Closure returning a future
/// - `retries`: Number of retry attempts (total runs = 1 initial + retries)
/// - `delay_ms`: Milliseconds between retry attempts
///
/// Never wrap writes in this.
pub(crate) async fn with_retry<F, Fut, T>(mut operation: F, retries: usize, delay_ms: u64) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut attempt = 1;
    loop {
        match operation().await {
            Ok(val) => return Ok(val),
            Err(err) if attempt > retries || !is_transient(&err) => return Err(err),
            Err(err) => {
                debug!(
                    "Attempt {}/{} failed: {}. Retrying...",
                    attempt, retries, err
                );
                attempt += 1;
                tokio::time::sleep(Duration::from_millis(delay_ms)).await;
            }
        }
    }
}

fn is_transient(err: &Error) -> bool {
    matches!(err.status_code(), Some(0) | Some(500..=599))
}
