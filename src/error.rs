// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Error types for the `evstream` library.
//!
//! Failures fall in three groups: transport failures reported through a
//! subscription's error channel, payload decoding failures that stay local
//! to a single handler, and misuse of a closed subscription.

use thiserror::Error;

/// The main error type for this library.
#[derive(Debug, Error)]
pub enum Error {
    /// The connection to the event stream failed or dropped.
    #[error("connection error: {0}")]
    Connection(#[from] ConnectionError),

    /// An event payload could not be decoded.
    #[error("decode error: {0}")]
    Decode(#[from] DecodeError),

    /// An operation was attempted on a subscription that does not allow it.
    #[error("usage error: {0}")]
    Usage(#[from] UsageError),
}

/// Errors related to the transport connection.
///
/// These are never returned from [`EventStreamConsumer::open`](crate::EventStreamConsumer::open).
/// They are delivered once through the subscription's error listeners, after
/// which the subscription is closed.
#[derive(Debug, Error)]
pub enum ConnectionError {
    /// The HTTP request failed (unreachable host, reset, TLS...).
    #[cfg(feature = "http")]
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The endpoint is not a valid URL.
    #[error("invalid endpoint: {0}")]
    InvalidEndpoint(String),

    /// The server answered with a non-success status.
    #[error("HTTP {code} - {reason}")]
    Status {
        /// Numeric status code.
        code: u16,
        /// Canonical reason phrase.
        reason: String,
    },

    /// The server answered with something other than an event stream.
    #[error("unexpected content type: {0}")]
    UnexpectedContentType(String),

    /// The server closed the stream.
    #[error("stream ended by server")]
    StreamEnded,

    /// A single line of the stream exceeded the decoder limit.
    #[error("event stream line exceeds {limit} bytes")]
    LineTooLong {
        /// Maximum accepted line length, in bytes.
        limit: usize,
    },

    /// No tokio runtime was available to run the connection.
    #[error("no tokio runtime available to drive the connection")]
    NoRuntime,
}

/// Errors raised while decoding an event payload for a typed handler.
#[derive(Debug, Error)]
pub enum DecodeError {
    /// The payload is not valid JSON for the expected schema.
    #[error("invalid JSON payload for '{event_type}' event: {source}")]
    Json {
        /// Type of the event whose payload failed to decode.
        event_type: String,
        /// Underlying parser error.
        #[source]
        source: serde_json::Error,
    },
}

impl DecodeError {
    /// Returns the event type the payload belonged to.
    #[must_use]
    pub fn event_type(&self) -> &str {
        match self {
            Self::Json { event_type, .. } => event_type,
        }
    }
}

/// Errors caused by using a subscription incorrectly.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum UsageError {
    /// Handlers cannot be registered on a closed subscription.
    #[error("subscription is closed")]
    SubscriptionClosed,
}

/// A specialized Result type for this library.
pub type Result<T> = std::result::Result<T, Error>;
