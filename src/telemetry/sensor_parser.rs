// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Parser for `sensors` event payloads.

use serde::{Deserialize, Serialize};

use crate::error::DecodeError;
use crate::event::Event;

/// A sensor reading pushed by the device as a `sensors` event.
///
/// # Examples
///
/// ```
/// use evstream_lib::telemetry::SensorReading;
///
/// let json = r#"{"temperature": 21.5, "humidity": 40}"#;
/// let reading: SensorReading = serde_json::from_str(json).unwrap();
///
/// assert_eq!(reading.temperature, 21.5);
/// assert_eq!(reading.humidity, Some(40.0));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SensorReading {
    /// Temperature in degrees Celsius.
    pub temperature: f32,

    /// Relative humidity in percent, when the device has a humidity sensor.
    #[serde(default)]
    pub humidity: Option<f32>,
}

impl SensorReading {
    /// Event type under which readings are published.
    pub const EVENT_TYPE: &'static str = "sensors";

    /// Decodes a reading from an event.
    ///
    /// The event type is not checked, so readings relayed under another
    /// name can be decoded too.
    ///
    /// # Errors
    ///
    /// Returns [`DecodeError::Json`] if the payload is not a reading.
    pub fn from_event(event: &Event) -> Result<Self, DecodeError> {
        event.json()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_temperature_only() {
        let reading: SensorReading = serde_json::from_str(r#"{"temperature": 150}"#).unwrap();
        assert!((reading.temperature - 150.0).abs() < f32::EPSILON);
        assert!(reading.humidity.is_none());
    }

    #[test]
    fn parse_with_humidity() {
        let reading: SensorReading =
            serde_json::from_str(r#"{"temperature": 120, "humidity": 45}"#).unwrap();
        assert_eq!(reading.humidity, Some(45.0));
    }

    #[test]
    fn unknown_fields_are_ignored() {
        let reading: SensorReading =
            serde_json::from_str(r#"{"temperature": 21.5, "pressure": 1013}"#).unwrap();
        assert!((reading.temperature - 21.5).abs() < f32::EPSILON);
    }

    #[test]
    fn missing_temperature_fails() {
        let event = Event::new("sensors", r#"{"humidity": 40}"#);
        let err = SensorReading::from_event(&event).unwrap_err();
        assert_eq!(err.event_type(), "sensors");
    }

    #[test]
    fn from_event_decodes_payload() {
        let event = Event::new("sensors", r#"{"temperature": 21.5}"#);
        let reading = SensorReading::from_event(&event).unwrap();
        assert!((reading.temperature - 21.5).abs() < f32::EPSILON);
    }
}
