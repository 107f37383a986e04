// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Wire protocol for consuming event streams.
//!
//! - [`FrameDecoder`]: incremental `text/event-stream` parser
//! - [`StreamConfig`]: connection settings for the HTTP transport
//!
//! The HTTP transport sends `GET <endpoint>` with
//! `Accept: text/event-stream` (devices reject other requests with
//! `406 Not Acceptable`), checks that the response is an event stream, then
//! decodes the body frame by frame into the subscription.

mod frame;
#[cfg(feature = "http")]
mod http;

pub use frame::FrameDecoder;
#[cfg(feature = "http")]
pub use http::{EVENT_STREAM_MIME, StreamConfig};
#[cfg(feature = "http")]
pub(crate) use http::run;
