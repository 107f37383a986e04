// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Connection state of a subscription.

use std::fmt;

/// Connection state of a [`Subscription`](super::Subscription).
///
/// The only allowed transitions are `Connecting -> Open`,
/// `Connecting -> Closed` and `Open -> Closed`. `Closed` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum ConnectionState {
    /// The transport is establishing the connection.
    Connecting,
    /// The stream is established and events are being delivered.
    Open,
    /// The subscription was closed or the connection failed.
    Closed,
}

impl ConnectionState {
    /// Returns `true` if moving from `self` to `next` is a valid transition.
    #[must_use]
    pub fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Connecting, Self::Open | Self::Closed) | (Self::Open, Self::Closed)
        )
    }

    /// Returns `true` for the terminal state.
    #[must_use]
    pub fn is_closed(self) -> bool {
        self == Self::Closed
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Connecting => "connecting",
            Self::Open => "open",
            Self::Closed => "closed",
        };
        f.write_str(name)
    }
}
