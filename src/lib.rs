// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! `evstream` Lib - A Rust library to consume Server-Sent Events streams.
//!
//! This library connects to the `text/event-stream` endpoint of a device
//! (typically a sensor board pushing readings on `/events`), dispatches the
//! received events to handlers registered per event type, and reports
//! connection failures on a separate error channel.
//!
//! # Features
//!
//! - **Ordered dispatch**: handlers for a type run in registration order
//! - **Typed payloads**: decode JSON payloads per event type with `on_json`
//! - **Fault isolation**: a failing or panicking handler never affects the others
//! - **Explicit close**: idempotent, callable from inside a handler
//!
//! # Quick Start
//!
//! ```no_run
//! use evstream_lib::EventStreamConsumer;
//!
//! #[tokio::main]
//! async fn main() -> evstream_lib::Result<()> {
//!     let consumer = EventStreamConsumer::new()?;
//!     let sub = consumer.open("http://192.168.1.90/events");
//!
//!     sub.on_open(|| println!("created connection"))?;
//!     sub.on_error(|err| eprintln!("{err}"))?;
//!     sub.on_message(|event| println!("{}", event.data()))?;
//!     sub.on_sensors(|reading| println!("{}", reading.temperature))?;
//!     sub.on_close(|| println!("connection closed"))?;
//!
//!     sub.closed().await;
//!     Ok(())
//! }
//! ```
//!
//! ## Handlers in place before connecting
//!
//! ```no_run
//! use evstream_lib::{EventStreamConsumer, Subscription};
//!
//! # async fn example() -> evstream_lib::Result<()> {
//! let consumer = EventStreamConsumer::new()?;
//!
//! let sub = Subscription::new("http://192.168.1.90/events");
//! sub.on_sensors(|reading| println!("{}", reading.temperature))?;
//! consumer.connect(&sub);
//! # Ok(())
//! # }
//! ```
//!
//! # Cargo features
//!
//! - `http` (default): the `reqwest` transport and [`EventStreamConsumer`].
//!   Without it, [`Subscription`] can still be driven by any other transport.

#[cfg(feature = "http")]
mod consumer;
pub mod error;
pub mod event;
pub mod protocol;
pub mod subscription;
pub mod telemetry;

#[cfg(feature = "http")]
pub use consumer::EventStreamConsumer;
pub use error::{ConnectionError, DecodeError, Error, Result, UsageError};
pub use event::{Event, SubscriptionId};
pub use protocol::FrameDecoder;
#[cfg(feature = "http")]
pub use protocol::StreamConfig;
pub use subscription::{ConnectionState, HandlerId, HandlerRegistry, Subscription};
pub use telemetry::SensorReading;
