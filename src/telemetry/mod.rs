// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Typed payloads published by sensor devices.
//!
//! Devices push periodic readings as `sensors` events whose payload is a
//! JSON object:
//!
//! ```text
//! event: sensors
//! id: 12
//! data: {"temperature": 132, "humidity": 41}
//! ```
//!
//! # Examples
//!
//! ```
//! use evstream_lib::Subscription;
//!
//! let sub = Subscription::new("http://192.168.1.90/events");
//! sub.on_sensors(|reading| println!("{} °C", reading.temperature)).unwrap();
//! ```

mod sensor_parser;

pub use sensor_parser::SensorReading;
