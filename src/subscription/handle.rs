// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The subscription handle.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use parking_lot::{Mutex, ReentrantMutex};
use tokio::sync::watch;

use super::{ConnectionState, HandlerId, HandlerRegistry};
use crate::error::{ConnectionError, DecodeError, Result, UsageError};
use crate::event::{Event, SubscriptionId};
use crate::telemetry::SensorReading;

/// Handle to one logical connection to an event stream.
///
/// A subscription is created in [`ConnectionState::Connecting`] and driven
/// by a transport through [`dispatch_open`](Self::dispatch_open),
/// [`dispatch`](Self::dispatch) and [`dispatch_error`](Self::dispatch_error).
/// Once closed it stays closed; open a new subscription to reconnect.
///
/// Cloning the handle is cheap and every clone refers to the same
/// subscription, so the owner can hand a clone to whatever triggers the
/// close (a button, a signal handler, a timer).
///
/// # Examples
///
/// ```
/// use evstream_lib::{ConnectionState, Event, Subscription};
///
/// let sub = Subscription::new("http://192.168.1.90/events");
/// sub.on("message", |event| println!("{}", event.data())).unwrap();
///
/// sub.dispatch_open();
/// sub.dispatch(&Event::message("hello"));
///
/// assert!(sub.close());
/// assert!(!sub.close());
/// assert_eq!(sub.state(), ConnectionState::Closed);
/// ```
#[derive(Clone)]
pub struct Subscription {
    inner: Arc<Inner>,
}

struct Inner {
    id: SubscriptionId,
    endpoint: String,
    state: watch::Sender<ConnectionState>,
    registry: HandlerRegistry,
    last_event_id: Mutex<Option<String>>,
    retry_hint: Mutex<Option<Duration>>,
    transport_attached: AtomicBool,
    /// Held while handlers run and while the state changes, so a close from
    /// another thread waits for the in-flight dispatch. Re-entrant so a
    /// handler may close its own subscription.
    dispatch_gate: ReentrantMutex<()>,
}

impl Subscription {
    /// Creates a subscription in the `Connecting` state, not yet bound to a
    /// transport.
    #[must_use]
    pub fn new(endpoint: impl Into<String>) -> Self {
        let (state, _) = watch::channel(ConnectionState::Connecting);
        Self {
            inner: Arc::new(Inner {
                id: SubscriptionId::new(),
                endpoint: endpoint.into(),
                state,
                registry: HandlerRegistry::new(),
                last_event_id: Mutex::new(None),
                retry_hint: Mutex::new(None),
                transport_attached: AtomicBool::new(false),
                dispatch_gate: ReentrantMutex::new(()),
            }),
        }
    }

    /// Returns the subscription identifier.
    #[must_use]
    pub fn id(&self) -> SubscriptionId {
        self.inner.id
    }

    /// Returns the endpoint this subscription targets.
    #[must_use]
    pub fn endpoint(&self) -> &str {
        &self.inner.endpoint
    }

    /// Returns the current connection state.
    #[must_use]
    pub fn state(&self) -> ConnectionState {
        *self.inner.state.borrow()
    }

    /// Returns `true` once the subscription is closed.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.state().is_closed()
    }

    /// Returns the id of the last received event that carried one.
    #[must_use]
    pub fn last_event_id(&self) -> Option<String> {
        self.inner.last_event_id.lock().clone()
    }

    /// Returns the reconnection delay last advertised by the server.
    ///
    /// The subscription never reconnects by itself; callers that do can use
    /// this as their delay.
    #[must_use]
    pub fn retry_hint(&self) -> Option<Duration> {
        *self.inner.retry_hint.lock()
    }

    /// Returns the number of handlers registered for `event_type`.
    #[must_use]
    pub fn handler_count(&self, event_type: &str) -> usize {
        self.inner.registry.handler_count(event_type)
    }

    // =========================================================================
    // Registration
    // =========================================================================

    /// Registers a handler for events of `event_type`.
    ///
    /// Handlers for the same type run in registration order. Registering for
    /// `"message"` captures events sent without a type.
    ///
    /// # Errors
    ///
    /// Returns [`UsageError::SubscriptionClosed`] if the subscription is closed.
    pub fn on<F>(&self, event_type: &str, handler: F) -> Result<HandlerId>
    where
        F: Fn(&Event) + Send + Sync + 'static,
    {
        self.ensure_not_closed()?;
        Ok(self.inner.registry.on(event_type, handler))
    }

    /// Registers a handler for unnamed events.
    ///
    /// # Errors
    ///
    /// Returns [`UsageError::SubscriptionClosed`] if the subscription is closed.
    pub fn on_message<F>(&self, handler: F) -> Result<HandlerId>
    where
        F: Fn(&Event) + Send + Sync + 'static,
    {
        self.on(Event::DEFAULT_TYPE, handler)
    }

    /// Registers a handler that receives the payload decoded as JSON into `T`.
    ///
    /// A payload that does not match `T` skips this handler only; the
    /// failure goes to the [`on_decode_error`](Self::on_decode_error)
    /// callbacks.
    ///
    /// # Errors
    ///
    /// Returns [`UsageError::SubscriptionClosed`] if the subscription is closed.
    pub fn on_json<T, F>(&self, event_type: &str, handler: F) -> Result<HandlerId>
    where
        T: serde::de::DeserializeOwned + 'static,
        F: Fn(T) + Send + Sync + 'static,
    {
        self.ensure_not_closed()?;
        Ok(self.inner.registry.on_json(event_type, handler))
    }

    /// Registers a handler for `sensors` events.
    ///
    /// # Errors
    ///
    /// Returns [`UsageError::SubscriptionClosed`] if the subscription is closed.
    pub fn on_sensors<F>(&self, handler: F) -> Result<HandlerId>
    where
        F: Fn(SensorReading) + Send + Sync + 'static,
    {
        self.on_json(SensorReading::EVENT_TYPE, handler)
    }

    /// Registers a callback for when the stream opens.
    ///
    /// # Errors
    ///
    /// Returns [`UsageError::SubscriptionClosed`] if the subscription is closed.
    pub fn on_open<F>(&self, callback: F) -> Result<HandlerId>
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.ensure_not_closed()?;
        Ok(self.inner.registry.on_open(callback))
    }

    /// Registers a callback for transport failures.
    ///
    /// # Errors
    ///
    /// Returns [`UsageError::SubscriptionClosed`] if the subscription is closed.
    pub fn on_error<F>(&self, callback: F) -> Result<HandlerId>
    where
        F: Fn(&ConnectionError) + Send + Sync + 'static,
    {
        self.ensure_not_closed()?;
        Ok(self.inner.registry.on_error(callback))
    }

    /// Registers a callback fired once when the subscription closes.
    ///
    /// # Errors
    ///
    /// Returns [`UsageError::SubscriptionClosed`] if the subscription is closed.
    pub fn on_close<F>(&self, callback: F) -> Result<HandlerId>
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.ensure_not_closed()?;
        Ok(self.inner.registry.on_close(callback))
    }

    /// Registers a callback for payload decoding failures of typed handlers.
    ///
    /// # Errors
    ///
    /// Returns [`UsageError::SubscriptionClosed`] if the subscription is closed.
    pub fn on_decode_error<F>(&self, callback: F) -> Result<HandlerId>
    where
        F: Fn(&DecodeError) + Send + Sync + 'static,
    {
        self.ensure_not_closed()?;
        Ok(self.inner.registry.on_decode_error(callback))
    }

    /// Unregisters a handler.
    ///
    /// Returns `true` if the handler was registered. Safe to call from
    /// inside a handler.
    pub fn unsubscribe(&self, id: HandlerId) -> bool {
        self.inner.registry.unsubscribe(id)
    }

    fn ensure_not_closed(&self) -> Result<()> {
        if self.is_closed() {
            return Err(UsageError::SubscriptionClosed.into());
        }
        Ok(())
    }

    // =========================================================================
    // Lifecycle
    // =========================================================================

    /// Closes the subscription.
    ///
    /// Returns `true` if this call closed it and `false` if it was already
    /// closed. After this returns no handler is invoked again, even if the
    /// call happens inside a handler. Close callbacks fire once.
    ///
    /// Called from another thread while handlers are running, this blocks
    /// until the event being dispatched has been delivered. A handler must
    /// therefore not wait on a thread that is itself closing the
    /// subscription.
    pub fn close(&self) -> bool {
        if !self.transition(ConnectionState::Closed) {
            return false;
        }
        tracing::info!(
            subscription = %self.inner.id,
            endpoint = %self.inner.endpoint,
            "Subscription closed"
        );
        self.finish();
        true
    }

    /// Waits until the subscription is closed.
    pub async fn closed(&self) {
        let mut rx = self.inner.state.subscribe();
        // The sender lives as long as `self`, so this cannot fail.
        let _ = rx.wait_for(|state| state.is_closed()).await;
    }

    /// Marks the subscription as driven by a transport. Returns `false` if
    /// one was already attached.
    pub(crate) fn attach_transport(&self) -> bool {
        !self.inner.transport_attached.swap(true, Ordering::AcqRel)
    }

    pub(crate) fn watch_state(&self) -> watch::Receiver<ConnectionState> {
        self.inner.state.subscribe()
    }

    pub(crate) fn set_retry_hint(&self, retry: Duration) {
        *self.inner.retry_hint.lock() = Some(retry);
    }

    // =========================================================================
    // Transport side
    // =========================================================================

    /// Marks the connection as established and fires open callbacks.
    ///
    /// Returns `false` (and does nothing) unless the subscription was
    /// `Connecting`.
    pub fn dispatch_open(&self) -> bool {
        let _gate = self.inner.dispatch_gate.lock();
        if !self.transition(ConnectionState::Open) {
            tracing::debug!(subscription = %self.inner.id, "Ignoring open notification");
            return false;
        }
        tracing::info!(
            subscription = %self.inner.id,
            endpoint = %self.inner.endpoint,
            "Event stream opened"
        );
        self.inner.registry.dispatch_open();
        true
    }

    /// Delivers an event to the handlers registered for its type.
    ///
    /// Events received after close are discarded. Returns the number of
    /// handlers invoked.
    pub fn dispatch(&self, event: &Event) -> usize {
        let _gate = self.inner.dispatch_gate.lock();
        if self.is_closed() {
            tracing::debug!(
                subscription = %self.inner.id,
                event_type = event.event_type(),
                "Discarding event for closed subscription"
            );
            return 0;
        }
        if let Some(id) = event.id() {
            *self.inner.last_event_id.lock() = Some(id.to_string());
        }

        tracing::debug!(
            subscription = %self.inner.id,
            event_type = event.event_type(),
            "Dispatching event"
        );
        self.inner.registry.dispatch(event, || !self.is_closed())
    }

    /// Reports a transport failure and closes the subscription.
    ///
    /// Error callbacks fire exactly once, followed by close callbacks.
    /// Returns `false` if the subscription was already closed, in which case
    /// the error is dropped.
    pub fn dispatch_error(&self, error: ConnectionError) -> bool {
        if !self.transition(ConnectionState::Closed) {
            tracing::debug!(
                subscription = %self.inner.id,
                error = %error,
                "Ignoring error for closed subscription"
            );
            return false;
        }
        tracing::warn!(
            subscription = %self.inner.id,
            endpoint = %self.inner.endpoint,
            error = %error,
            "Event stream failed"
        );
        self.inner.registry.dispatch_error(&error);
        self.finish();
        true
    }

    /// Fires close callbacks and releases all handlers.
    fn finish(&self) {
        self.inner.registry.dispatch_closed();
        self.inner.registry.clear();
    }

    fn transition(&self, next: ConnectionState) -> bool {
        let _gate = self.inner.dispatch_gate.lock();
        self.inner.state.send_if_modified(|state| {
            if state.can_transition_to(next) {
                tracing::debug!(
                    subscription = %self.inner.id,
                    from = %state,
                    to = %next,
                    "State transition"
                );
                *state = next;
                true
            } else {
                false
            }
        })
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.inner.id)
            .field("endpoint", &self.inner.endpoint)
            .field("state", &self.state())
            .field("registry", &self.inner.registry)
            .finish_non_exhaustive()
    }
}
