// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Entry point for consuming event streams over HTTP.

use reqwest::Client;

use crate::error::{ConnectionError, Result};
use crate::event::Event;
use crate::protocol::{self, StreamConfig};
use crate::subscription::{HandlerId, Subscription};

/// Opens subscriptions to event streams and manages their handlers.
///
/// The consumer holds one HTTP client shared by all the subscriptions it
/// opens. Each subscription is driven by its own tokio task.
///
/// # Examples
///
/// ```no_run
/// use evstream_lib::EventStreamConsumer;
///
/// # async fn example() -> evstream_lib::Result<()> {
/// let consumer = EventStreamConsumer::new()?;
/// let sub = consumer.open("http://192.168.1.90/events");
///
/// consumer.on(&sub, "message", |event| println!("{}", event.data()))?;
/// sub.on_sensors(|reading| println!("{} °C", reading.temperature))?;
/// sub.on_error(|err| eprintln!("{err}"))?;
///
/// // Hand a clone to whatever should stop the stream.
/// let trigger = sub.clone();
/// tokio::spawn(async move {
///     tokio::time::sleep(std::time::Duration::from_secs(60)).await;
///     trigger.close();
/// });
///
/// sub.closed().await;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct EventStreamConsumer {
    client: Client,
    config: StreamConfig,
}

impl EventStreamConsumer {
    /// Creates a consumer with the default configuration.
    ///
    /// # Errors
    ///
    /// Returns error if the HTTP client cannot be created.
    pub fn new() -> Result<Self> {
        Self::with_config(StreamConfig::default())
    }

    /// Creates a consumer with a custom configuration.
    ///
    /// # Errors
    ///
    /// Returns error if the HTTP client cannot be created.
    pub fn with_config(config: StreamConfig) -> Result<Self> {
        let client = config.build_client()?;
        Ok(Self { client, config })
    }

    /// Returns the configuration.
    #[must_use]
    pub fn config(&self) -> &StreamConfig {
        &self.config
    }

    /// Opens a subscription to `endpoint`.
    ///
    /// Returns immediately with a subscription in the `Connecting` state.
    /// Connection failures are never returned here: they arrive once through
    /// the subscription's error callbacks, after which it is closed.
    ///
    /// The connection runs on the current tokio runtime. Events can in
    /// principle arrive before handlers registered after this call; use
    /// [`Subscription::new`] followed by [`connect`](Self::connect) to have
    /// handlers in place first.
    #[must_use]
    pub fn open(&self, endpoint: impl Into<String>) -> Subscription {
        let subscription = Subscription::new(endpoint);
        self.connect(&subscription);
        subscription
    }

    /// Starts the transport for a subscription created with
    /// [`Subscription::new`].
    ///
    /// Does nothing if the subscription is closed or already has a
    /// transport. Without a tokio runtime the subscription fails with
    /// [`ConnectionError::NoRuntime`].
    pub fn connect(&self, subscription: &Subscription) {
        if subscription.is_closed() || !subscription.attach_transport() {
            tracing::debug!(
                subscription = %subscription.id(),
                "Subscription is closed or already connected"
            );
            return;
        }

        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            subscription.dispatch_error(ConnectionError::NoRuntime);
            return;
        };

        tracing::debug!(
            subscription = %subscription.id(),
            endpoint = subscription.endpoint(),
            "Opening event stream"
        );
        runtime.spawn(protocol::run(
            self.client.clone(),
            self.config.clone(),
            subscription.clone(),
        ));
    }

    /// Registers `handler` for events of `event_type` on `subscription`.
    ///
    /// # Errors
    ///
    /// Returns [`UsageError::SubscriptionClosed`](crate::UsageError::SubscriptionClosed)
    /// if the subscription is closed.
    pub fn on<F>(
        &self,
        subscription: &Subscription,
        event_type: &str,
        handler: F,
    ) -> Result<HandlerId>
    where
        F: Fn(&Event) + Send + Sync + 'static,
    {
        subscription.on(event_type, handler)
    }

    /// Closes `subscription` and releases its connection.
    ///
    /// Returns `false` if it was already closed.
    pub fn close(&self, subscription: &Subscription) -> bool {
        subscription.close()
    }
}
