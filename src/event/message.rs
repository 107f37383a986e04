// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Events received from a stream.

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;

use crate::error::DecodeError;

/// A single event received from an event stream.
///
/// Events are immutable once built. An event without an explicit type is
/// a `"message"` event.
///
/// # Examples
///
/// ```
/// use evstream_lib::Event;
///
/// let event = Event::new("sensors", r#"{"temperature": 21.5}"#);
/// assert_eq!(event.event_type(), "sensors");
///
/// let unnamed = Event::message("hello");
/// assert_eq!(unnamed.event_type(), "message");
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct Event {
    event_type: String,
    data: String,
    id: Option<String>,
    received_at: DateTime<Utc>,
}

impl Event {
    /// Type given to events that carry no `event:` field.
    pub const DEFAULT_TYPE: &'static str = "message";

    /// Creates an event with the given type and payload.
    ///
    /// An empty type is replaced by [`Event::DEFAULT_TYPE`].
    #[must_use]
    pub fn new(event_type: impl Into<String>, data: impl Into<String>) -> Self {
        let event_type = event_type.into();
        let event_type = if event_type.is_empty() {
            Self::DEFAULT_TYPE.to_string()
        } else {
            event_type
        };

        Self {
            event_type,
            data: data.into(),
            id: None,
            received_at: Utc::now(),
        }
    }

    /// Creates an unnamed (`"message"`) event.
    #[must_use]
    pub fn message(data: impl Into<String>) -> Self {
        Self::new(Self::DEFAULT_TYPE, data)
    }

    /// Sets the event id.
    #[must_use]
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    /// Returns the event type.
    #[must_use]
    pub fn event_type(&self) -> &str {
        &self.event_type
    }

    /// Returns the raw payload.
    #[must_use]
    pub fn data(&self) -> &str {
        &self.data
    }

    /// Returns the event id, if the server sent one.
    #[must_use]
    pub fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    /// Returns when the event was received.
    #[must_use]
    pub fn received_at(&self) -> DateTime<Utc> {
        self.received_at
    }

    /// Decodes the payload as JSON into `T`.
    ///
    /// # Errors
    ///
    /// Returns [`DecodeError::Json`] if the payload does not match `T`.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, DecodeError> {
        serde_json::from_str(&self.data).map_err(|source| DecodeError::Json {
            event_type: self.event_type.clone(),
            source,
        })
    }
}
