// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! HTTP transport for event streams.

use std::time::Duration;

use futures::StreamExt;
use reqwest::header::{ACCEPT, CACHE_CONTROL, CONTENT_TYPE};
use reqwest::{Client, Response, Url};

use crate::error::ConnectionError;
use crate::protocol::FrameDecoder;
use crate::subscription::Subscription;

/// Media type of an event stream.
pub const EVENT_STREAM_MIME: &str = "text/event-stream";

/// Header carrying the id of the last received event.
const LAST_EVENT_ID: &str = "Last-Event-ID";

// ============================================================================
// StreamConfig - Configuration shared by all subscriptions of a consumer
// ============================================================================

/// Configuration for connecting to event streams.
///
/// # Examples
///
/// ```
/// use evstream_lib::protocol::StreamConfig;
/// use std::time::Duration;
///
/// // Defaults
/// let config = StreamConfig::new();
///
/// // With all options
/// let config = StreamConfig::new()
///     .with_connect_timeout(Duration::from_secs(5))
///     .with_credentials("admin", "password")
///     .with_last_event_id("41")
///     .with_header("X-Client", "dashboard")
///     .with_max_line_length(64 * 1024);
/// ```
#[derive(Debug, Clone)]
pub struct StreamConfig {
    connect_timeout: Duration,
    credentials: Option<(String, String)>,
    last_event_id: Option<String>,
    headers: Vec<(String, String)>,
    max_line_length: usize,
}

impl StreamConfig {
    /// Default connection timeout.
    pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

    /// Creates a configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self {
            connect_timeout: Self::DEFAULT_CONNECT_TIMEOUT,
            credentials: None,
            last_event_id: None,
            headers: Vec::new(),
            max_line_length: FrameDecoder::DEFAULT_MAX_LINE_LENGTH,
        }
    }

    /// Sets the connection timeout.
    ///
    /// Only establishing the connection is bounded; an open stream may stay
    /// silent indefinitely.
    #[must_use]
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Sets HTTP basic authentication credentials.
    #[must_use]
    pub fn with_credentials(
        mut self,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        self.credentials = Some((username.into(), password.into()));
        self
    }

    /// Sets the `Last-Event-ID` sent when connecting, so the server can
    /// resume after that event.
    #[must_use]
    pub fn with_last_event_id(mut self, id: impl Into<String>) -> Self {
        self.last_event_id = Some(id.into());
        self
    }

    /// Adds an extra request header.
    #[must_use]
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Sets the longest line accepted from the stream, in bytes.
    ///
    /// A longer line fails the subscription with
    /// [`ConnectionError::LineTooLong`].
    #[must_use]
    pub fn with_max_line_length(mut self, max: usize) -> Self {
        self.max_line_length = max;
        self
    }

    /// Returns the connection timeout.
    #[must_use]
    pub fn connect_timeout(&self) -> Duration {
        self.connect_timeout
    }

    /// Returns the credentials if set.
    #[must_use]
    pub fn credentials(&self) -> Option<(&str, &str)> {
        self.credentials
            .as_ref()
            .map(|(u, p)| (u.as_str(), p.as_str()))
    }

    /// Returns the configured `Last-Event-ID`.
    #[must_use]
    pub fn last_event_id(&self) -> Option<&str> {
        self.last_event_id.as_deref()
    }

    /// Returns the extra request headers.
    #[must_use]
    pub fn headers(&self) -> &[(String, String)] {
        &self.headers
    }

    /// Returns the longest accepted line, in bytes.
    #[must_use]
    pub fn max_line_length(&self) -> usize {
        self.max_line_length
    }

    /// Builds the HTTP client for this configuration.
    ///
    /// # Errors
    ///
    /// Returns error if the HTTP client cannot be created.
    pub fn build_client(&self) -> Result<Client, ConnectionError> {
        Client::builder()
            .connect_timeout(self.connect_timeout)
            .build()
            .map_err(ConnectionError::Http)
    }
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// Connection task
// ============================================================================

/// Connects `subscription` to its endpoint and feeds it until it closes.
///
/// Every failure is reported through [`Subscription::dispatch_error`].
/// Closing the subscription drops the in-flight request or response.
pub(crate) async fn run(client: Client, config: StreamConfig, subscription: Subscription) {
    let mut state = subscription.watch_state();

    tokio::select! {
        _ = state.wait_for(|s| s.is_closed()) => {
            tracing::debug!(
                subscription = %subscription.id(),
                "Connection task stopped by close"
            );
        }
        result = stream(&client, &config, &subscription) => {
            if let Err(err) = result {
                subscription.dispatch_error(err);
            }
        }
    }
}

/// Reads the stream. Only returns once the connection failed or ended.
async fn stream(
    client: &Client,
    config: &StreamConfig,
    subscription: &Subscription,
) -> Result<(), ConnectionError> {
    let response = connect(client, config, subscription.endpoint()).await?;

    subscription.dispatch_open();

    let mut body = response.bytes_stream();
    let mut decoder = FrameDecoder::with_max_line_length(config.max_line_length());

    while let Some(chunk) = body.next().await {
        let chunk = chunk.map_err(ConnectionError::Http)?;

        for event in decoder.feed(&chunk)? {
            subscription.dispatch(&event);
        }
        if let Some(retry) = decoder.take_retry() {
            tracing::debug!(retry = ?retry, "Server advertised retry delay");
            subscription.set_retry_hint(retry);
        }
    }

    Err(ConnectionError::StreamEnded)
}

/// Sends the request and validates the response head.
async fn connect(
    client: &Client,
    config: &StreamConfig,
    endpoint: &str,
) -> Result<Response, ConnectionError> {
    let url = Url::parse(endpoint)
        .map_err(|e| ConnectionError::InvalidEndpoint(format!("{endpoint}: {e}")))?;

    tracing::debug!(url = %url, "Connecting to event stream");

    let mut request = client
        .get(url)
        .header(ACCEPT, EVENT_STREAM_MIME)
        .header(CACHE_CONTROL, "no-cache");

    if let Some(id) = config.last_event_id() {
        request = request.header(LAST_EVENT_ID, id);
    }
    for (name, value) in config.headers() {
        request = request.header(name.as_str(), value.as_str());
    }
    if let Some((username, password)) = config.credentials() {
        request = request.basic_auth(username, Some(password));
    }

    let response = request.send().await.map_err(ConnectionError::Http)?;

    let status = response.status();
    if !status.is_success() {
        return Err(ConnectionError::Status {
            code: status.as_u16(),
            reason: status.canonical_reason().unwrap_or("Unknown").to_string(),
        });
    }

    let content_type = response
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default();
    if !content_type.starts_with(EVENT_STREAM_MIME) {
        let found = if content_type.is_empty() {
            "<none>"
        } else {
            content_type
        };
        return Err(ConnectionError::UnexpectedContentType(found.to_string()));
    }

    Ok(response)
}
