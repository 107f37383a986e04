// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Event records delivered to handlers.
//!
//! An [`Event`] carries its type name (`"message"` when the server sent
//! none), the raw payload and the optional event id. Handlers that expect a
//! structured payload decode it with [`Event::json`].

mod message;
mod subscription_id;

pub use message::Event;
pub use subscription_id::SubscriptionId;
