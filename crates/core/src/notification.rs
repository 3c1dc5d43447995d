// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Priority-ordered, fault-isolated observer fan-out
//!
//! Each capability (transitions, output, warnings) has its own strongly typed
//! observer trait and its own [`Notification`] list. The observer list is
//! copy-on-write: `notify_all` iterates an immutable snapshot, so concurrent
//! notifications from different event sources never see a list being modified.
//!
//! A panicking observer is caught and reported to the error hook; the
//! remaining observers still run and the caller never sees the panic.

use crate::error::panic_message;
use crate::instance::{OutputEvent, TransitionEvent, WarningEvent};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, RwLock};

/// Priority used when the caller does not pick one. Lower runs first.
pub const DEFAULT_OBSERVER_PRIORITY: i32 = 100;

pub trait TransitionObserver: Send + Sync {
    fn new_transition(&self, event: &TransitionEvent);
}

pub trait OutputObserver: Send + Sync {
    fn new_output(&self, event: &OutputEvent);
}

pub trait WarningObserver: Send + Sync {
    fn new_warning(&self, event: &WarningEvent);
}

impl<F: Fn(&TransitionEvent) + Send + Sync> TransitionObserver for F {
    fn new_transition(&self, event: &TransitionEvent) {
        self(event)
    }
}

impl<F: Fn(&OutputEvent) + Send + Sync> OutputObserver for F {
    fn new_output(&self, event: &OutputEvent) {
        self(event)
    }
}

impl<F: Fn(&WarningEvent) + Send + Sync> WarningObserver for F {
    fn new_warning(&self, event: &WarningEvent) {
        self(event)
    }
}

/// Report of an observer that panicked during notification
#[derive(Debug, Clone)]
pub struct ObserverFault {
    pub priority: i32,
    pub message: String,
}

pub type ErrorHook = Arc<dyn Fn(&ObserverFault) + Send + Sync>;

struct Registered<O: ?Sized> {
    priority: i32,
    observer: Arc<O>,
}

impl<O: ?Sized> Clone for Registered<O> {
    fn clone(&self) -> Self {
        Self {
            priority: self.priority,
            observer: Arc::clone(&self.observer),
        }
    }
}

pub struct Notification<O: ?Sized> {
    observers: RwLock<Arc<Vec<Registered<O>>>>,
    error_hook: Option<ErrorHook>,
}

impl<O: ?Sized> Default for Notification<O> {
    fn default() -> Self {
        Self::new()
    }
}

impl<O: ?Sized> Notification<O> {
    pub fn new() -> Self {
        Self {
            observers: RwLock::new(Arc::new(Vec::new())),
            error_hook: None,
        }
    }

    /// Replace the default error hook, which logs the fault
    pub fn with_error_hook(mut self, hook: impl Fn(&ObserverFault) + Send + Sync + 'static) -> Self {
        self.error_hook = Some(Arc::new(hook));
        self
    }

    /// Register an observer. Equal priorities keep registration order.
    pub fn add_observer(&self, observer: Arc<O>, priority: i32) {
        let mut observers = self.observers.write().unwrap_or_else(|e| e.into_inner());
        let mut next: Vec<Registered<O>> = observers.iter().cloned().collect();
        let index = next.partition_point(|r| r.priority <= priority);
        next.insert(index, Registered { priority, observer });
        *observers = Arc::new(next);
    }

    /// Remove every registration of the given observer. Returns whether one was found.
    pub fn remove_observer(&self, observer: &Arc<O>) -> bool {
        let mut observers = self.observers.write().unwrap_or_else(|e| e.into_inner());
        let mut next: Vec<Registered<O>> = observers.iter().cloned().collect();
        let before = next.len();
        next.retain(|r| !Arc::ptr_eq(&r.observer, observer));
        let removed = next.len() != before;
        *observers = Arc::new(next);
        removed
    }

    pub fn len(&self) -> usize {
        self.snapshot().len()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshot().is_empty()
    }

    /// Invoke `notify` for each observer in priority order, isolating panics
    pub fn notify_all(&self, notify: impl Fn(&O)) {
        for registered in self.snapshot().iter() {
            let result = catch_unwind(AssertUnwindSafe(|| notify(&*registered.observer)));
            if let Err(payload) = result {
                let fault = ObserverFault {
                    priority: registered.priority,
                    message: panic_message(payload.as_ref()),
                };
                self.report(&fault);
            }
        }
    }

    fn report(&self, fault: &ObserverFault) {
        match &self.error_hook {
            Some(hook) => {
                if catch_unwind(AssertUnwindSafe(|| hook(fault))).is_err() {
                    tracing::error!(priority = fault.priority, error = %fault.message, "observer failed and error hook panicked");
                }
            }
            None => {
                tracing::error!(priority = fault.priority, error = %fault.message, "observer failed");
            }
        }
    }

    fn snapshot(&self) -> Arc<Vec<Registered<O>>> {
        Arc::clone(&self.observers.read().unwrap_or_else(|e| e.into_inner()))
    }
}

#[cfg(test)]
#[path = "notification_tests.rs"]
mod tests;
