// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Subscriptions to an event stream.
//!
//! # Overview
//!
//! - [`Subscription`] - Handle to one logical connection and its handlers
//! - [`ConnectionState`] - `Connecting`, `Open` or `Closed`
//! - [`HandlerRegistry`] - Ordered registry that dispatches events to handlers
//! - [`HandlerId`] - Identifier returned on registration, used to unsubscribe
//!
//! # Usage
//!
//! ```no_run
//! use evstream_lib::EventStreamConsumer;
//!
//! # async fn example() -> evstream_lib::Result<()> {
//! let consumer = EventStreamConsumer::new()?;
//! let sub = consumer.open("http://192.168.1.90/events");
//!
//! let id = sub.on_message(|event| println!("{}", event.data()))?;
//! sub.on_sensors(|reading| println!("{}", reading.temperature))?;
//!
//! // Later
//! sub.unsubscribe(id);
//! sub.close();
//! # Ok(())
//! # }
//! ```
//!
//! # Transports
//!
//! A subscription does no I/O itself. The HTTP transport drives it, and
//! any other transport can do the same through
//! [`Subscription::dispatch_open`], [`Subscription::dispatch`] and
//! [`Subscription::dispatch_error`].

mod callback;
mod handle;
mod state;

pub use callback::{HandlerId, HandlerRegistry};
pub use handle::Subscription;
pub use state::ConnectionState;
