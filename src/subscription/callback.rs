// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Handler management for stream subscriptions.
//!
//! This module provides the core types for managing handlers:
//!
//! - [`HandlerId`] - Unique identifier for unsubscribing
//! - [`HandlerRegistry`] - Ordered registry for storing and dispatching handlers

use std::any::Any;
use std::collections::HashMap;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use parking_lot::RwLock;

use crate::error::{ConnectionError, DecodeError};
use crate::event::Event;

/// Unique identifier for a registered handler.
///
/// Returned by every registration method and accepted by
/// [`Subscription::unsubscribe`](super::Subscription::unsubscribe).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HandlerId(u64);

impl HandlerId {
    /// Creates a new handler ID with the given value.
    #[must_use]
    pub(crate) fn new(id: u64) -> Self {
        Self(id)
    }

    /// Returns the raw ID value.
    #[must_use]
    pub fn value(&self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for HandlerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Handler({})", self.0)
    }
}

/// Event handler. Typed handlers report payload decoding failures through
/// the returned error; plain handlers always succeed.
type EventCallback = Arc<dyn Fn(&Event) -> Result<(), DecodeError> + Send + Sync>;

/// Callback fired when the stream opens or closes.
type LifecycleCallback = Arc<dyn Fn() + Send + Sync>;

/// Callback fired on transport failure.
type ErrorCallback = Arc<dyn Fn(&ConnectionError) + Send + Sync>;

/// Callback fired when a typed handler could not decode a payload.
type DecodeErrorCallback = Arc<dyn Fn(&DecodeError) + Send + Sync>;

/// A registered callback.
///
/// `active` is cleared on removal so that a dispatch already iterating over
/// a snapshot skips it.
struct Entry<C> {
    id: HandlerId,
    active: AtomicBool,
    callback: C,
}

impl<C> Entry<C> {
    fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    fn deactivate(&self) {
        self.active.store(false, Ordering::Release);
    }
}

/// Ordered list of callbacks of one kind.
struct HandlerList<C> {
    entries: RwLock<Vec<Arc<Entry<C>>>>,
}

impl<C> HandlerList<C> {
    fn new() -> Self {
        Self {
            entries: RwLock::new(Vec::new()),
        }
    }

    fn push(&self, id: HandlerId, callback: C) {
        self.entries.write().push(Arc::new(Entry {
            id,
            active: AtomicBool::new(true),
            callback,
        }));
    }

    fn remove(&self, id: HandlerId) -> bool {
        let mut entries = self.entries.write();
        match entries.iter().position(|entry| entry.id == id) {
            Some(pos) => {
                entries.remove(pos).deactivate();
                true
            }
            None => false,
        }
    }

    /// Copies the current entries so callbacks run without holding the lock.
    fn snapshot(&self) -> Vec<Arc<Entry<C>>> {
        self.entries.read().clone()
    }

    fn clear(&self) {
        for entry in self.entries.write().drain(..) {
            entry.deactivate();
        }
    }

    fn len(&self) -> usize {
        self.entries.read().len()
    }
}

/// Registry for managing subscription handlers.
///
/// Event handlers are grouped by event type and invoked in registration
/// order. Locks are only held while registering, removing, or taking a
/// snapshot, never while a handler runs, so handlers may register,
/// unsubscribe or close the subscription from inside a dispatch.
///
/// # Fault isolation
///
/// A panicking handler is caught and logged; the remaining handlers are
/// still invoked.
pub struct HandlerRegistry {
    /// Counter for generating unique handler IDs.
    next_id: AtomicU64,
    /// Event handlers keyed by event type.
    event_handlers: RwLock<HashMap<String, Arc<HandlerList<EventCallback>>>>,
    open_callbacks: HandlerList<LifecycleCallback>,
    error_callbacks: HandlerList<ErrorCallback>,
    close_callbacks: HandlerList<LifecycleCallback>,
    decode_error_callbacks: HandlerList<DecodeErrorCallback>,
}

impl HandlerRegistry {
    /// Creates a new empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self {
            next_id: AtomicU64::new(1),
            event_handlers: RwLock::new(HashMap::new()),
            open_callbacks: HandlerList::new(),
            error_callbacks: HandlerList::new(),
            close_callbacks: HandlerList::new(),
            decode_error_callbacks: HandlerList::new(),
        }
    }

    fn next_id(&self) -> HandlerId {
        HandlerId::new(self.next_id.fetch_add(1, Ordering::Relaxed))
    }

    // =========================================================================
    // Registration methods
    // =========================================================================

    /// Registers a handler for events of `event_type`.
    pub fn on<F>(&self, event_type: &str, handler: F) -> HandlerId
    where
        F: Fn(&Event) + Send + Sync + 'static,
    {
        self.register_event(
            event_type,
            Arc::new(move |event: &Event| {
                handler(event);
                Ok(())
            }),
        )
    }

    /// Registers a handler that receives the payload decoded as `T`.
    ///
    /// When decoding fails the handler is skipped and the failure is
    /// reported to the decode error callbacks.
    pub fn on_json<T, F>(&self, event_type: &str, handler: F) -> HandlerId
    where
        T: serde::de::DeserializeOwned + 'static,
        F: Fn(T) + Send + Sync + 'static,
    {
        self.register_event(
            event_type,
            Arc::new(move |event: &Event| {
                let value = event.json::<T>()?;
                handler(value);
                Ok(())
            }),
        )
    }

    fn register_event(&self, event_type: &str, callback: EventCallback) -> HandlerId {
        let id = self.next_id();
        // Push under the map lock so `unsubscribe` cannot drop the list in between.
        self.event_handlers
            .write()
            .entry(event_type.to_string())
            .or_insert_with(|| Arc::new(HandlerList::new()))
            .push(id, callback);
        id
    }

    /// Registers a callback for when the stream opens.
    pub fn on_open<F>(&self, callback: F) -> HandlerId
    where
        F: Fn() + Send + Sync + 'static,
    {
        let id = self.next_id();
        self.open_callbacks.push(id, Arc::new(callback));
        id
    }

    /// Registers a callback for transport failures.
    pub fn on_error<F>(&self, callback: F) -> HandlerId
    where
        F: Fn(&ConnectionError) + Send + Sync + 'static,
    {
        let id = self.next_id();
        self.error_callbacks.push(id, Arc::new(callback));
        id
    }

    /// Registers a callback for when the subscription closes.
    pub fn on_close<F>(&self, callback: F) -> HandlerId
    where
        F: Fn() + Send + Sync + 'static,
    {
        let id = self.next_id();
        self.close_callbacks.push(id, Arc::new(callback));
        id
    }

    /// Registers a callback for payload decoding failures.
    pub fn on_decode_error<F>(&self, callback: F) -> HandlerId
    where
        F: Fn(&DecodeError) + Send + Sync + 'static,
    {
        let id = self.next_id();
        self.decode_error_callbacks.push(id, Arc::new(callback));
        id
    }

    // =========================================================================
    // Unsubscription
    // =========================================================================

    /// Unregisters a handler by its ID.
    ///
    /// Returns `true` if a handler was found and removed. A handler removed
    /// during a dispatch is not invoked for the rest of that dispatch.
    pub fn unsubscribe(&self, id: HandlerId) -> bool {
        {
            let mut handlers = self.event_handlers.write();
            let found = handlers
                .iter()
                .find_map(|(event_type, list)| list.remove(id).then(|| event_type.clone()));
            if let Some(event_type) = found {
                if handlers.get(&event_type).is_some_and(|list| list.len() == 0) {
                    handlers.remove(&event_type);
                }
                return true;
            }
        }
        self.open_callbacks.remove(id)
            || self.error_callbacks.remove(id)
            || self.close_callbacks.remove(id)
            || self.decode_error_callbacks.remove(id)
    }

    /// Clears all handlers.
    pub fn clear(&self) {
        for list in self.event_handlers.write().drain().map(|(_, list)| list) {
            list.clear();
        }
        self.open_callbacks.clear();
        self.error_callbacks.clear();
        self.close_callbacks.clear();
        self.decode_error_callbacks.clear();
    }

    // =========================================================================
    // Dispatch methods
    // =========================================================================

    /// Dispatches an event to the handlers registered for its type.
    ///
    /// `live` is checked before every invocation; once it returns `false`
    /// no further handler is called. Returns the number of handlers invoked.
    pub fn dispatch(&self, event: &Event, live: impl Fn() -> bool) -> usize {
        let Some(list) = self.event_handlers.read().get(event.event_type()).cloned() else {
            return 0;
        };

        let mut invoked = 0;
        for entry in list.snapshot() {
            if !live() {
                break;
            }
            if !entry.is_active() {
                continue;
            }
            invoked += 1;

            match guarded(entry.id, || (entry.callback)(event)) {
                Some(Err(err)) => {
                    tracing::warn!(
                        handler = %entry.id,
                        event_type = event.event_type(),
                        error = %err,
                        "Handler could not decode event payload"
                    );
                    self.dispatch_decode_error(&err);
                }
                Some(Ok(())) | None => {}
            }
        }
        invoked
    }

    /// Dispatches the open notification.
    pub fn dispatch_open(&self) {
        for entry in self.open_callbacks.snapshot() {
            if entry.is_active() {
                guarded(entry.id, || (entry.callback)());
            }
        }
    }

    /// Dispatches a transport failure.
    pub fn dispatch_error(&self, error: &ConnectionError) {
        for entry in self.error_callbacks.snapshot() {
            if entry.is_active() {
                guarded(entry.id, || (entry.callback)(error));
            }
        }
    }

    /// Dispatches the close notification.
    pub fn dispatch_closed(&self) {
        for entry in self.close_callbacks.snapshot() {
            if entry.is_active() {
                guarded(entry.id, || (entry.callback)());
            }
        }
    }

    fn dispatch_decode_error(&self, error: &DecodeError) {
        for entry in self.decode_error_callbacks.snapshot() {
            if entry.is_active() {
                guarded(entry.id, || (entry.callback)(error));
            }
        }
    }

    // =========================================================================
    // Statistics
    // =========================================================================

    /// Returns the number of handlers registered for `event_type`.
    #[must_use]
    pub fn handler_count(&self, event_type: &str) -> usize {
        self.event_handlers
            .read()
            .get(event_type)
            .map_or(0, |list| list.len())
    }

    /// Returns the total number of registered callbacks.
    #[must_use]
    pub fn callback_count(&self) -> usize {
        let events: usize = self
            .event_handlers
            .read()
            .values()
            .map(|list| list.len())
            .sum();
        events
            + self.open_callbacks.len()
            + self.error_callbacks.len()
            + self.close_callbacks.len()
            + self.decode_error_callbacks.len()
    }

    /// Returns `true` if there are no registered callbacks.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.callback_count() == 0
    }
}

/// Runs a callback, catching and logging a panic.
///
/// Returns `None` if the callback panicked.
fn guarded<R>(id: HandlerId, f: impl FnOnce() -> R) -> Option<R> {
    match catch_unwind(AssertUnwindSafe(f)) {
        Ok(value) => Some(value),
        Err(payload) => {
            tracing::error!(
                handler = %id,
                panic = panic_message(payload.as_ref()),
                "Handler panicked"
            );
            None
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        msg
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg
    } else {
        "<non-string panic>"
    }
}

impl Default for HandlerRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for HandlerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HandlerRegistry")
            .field("callback_count", &self.callback_count())
            .finish()
    }
}
