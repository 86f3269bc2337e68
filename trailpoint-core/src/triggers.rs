//! Trigger Queue and Shared Engine State
//!
//! A *trigger* is a named reason to publish out of schedule (`"lock"`,
//! `"radius"`, `"time"`, `"imm"`, or a caller-supplied name). Triggers
//! accumulate in a bounded, ordered, duplicate-free set and the whole set is
//! drained into exactly one publish payload.
//!
//! Trigger raising can happen from outside the polling loop - cloud command
//! dispatch and transport completion contexts both call into it - so the live
//! set sits behind one mutex together with the list of one-shot publish
//! callbacks, which those same contexts register. Critical sections are short
//! and never block: list append, snapshot, or drain only. The send call
//! itself is never made under this lock.
//!
//! Ordering contract: triggers raised before a publish attempt begins are
//! included in that attempt's payload and cleared atomically with payload
//! composition; triggers raised during composition may land in the next
//! cycle.

use heapless::Vec;

use crate::constants::MAX_TRIGGERS;

/// How a trigger should be treated by the scheduler
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerKind {
    /// Publish once the min-interval gate allows
    Normal,
    /// Publish now, overriding all timers
    Immediate,
}

/// Ordered set of distinct trigger names plus the immediate flag
///
/// Insertion order is preserved and duplicates are ignored. The set is
/// bounded; a trigger raised while full is dropped (the publish it would
/// justify is already pending).
#[derive(Debug, Default)]
pub struct TriggerSet {
    names: Vec<&'static str, MAX_TRIGGERS>,
    immediate: bool,
}

impl TriggerSet {
    /// Create an empty set
    pub const fn new() -> Self {
        Self {
            names: Vec::new(),
            immediate: false,
        }
    }

    /// Queue a trigger; `Immediate` additionally raises the immediate flag
    pub fn raise(&mut self, kind: TriggerKind, name: &'static str) {
        if !self.names.contains(&name) {
            let _ = self.names.push(name);
        }

        if kind == TriggerKind::Immediate {
            self.immediate = true;
        }
    }

    /// Check whether any trigger is queued
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Number of distinct queued triggers
    pub fn len(&self) -> usize {
        self.names.len()
    }

    /// Immediate flag state
    pub fn immediate(&self) -> bool {
        self.immediate
    }

    /// Clear the immediate flag once the immediate publish is underway
    pub fn clear_immediate(&mut self) {
        self.immediate = false;
    }

    /// Take the queued names, leaving the set empty
    ///
    /// Called exactly once per successful payload composition.
    pub fn drain(&mut self) -> Vec<&'static str, MAX_TRIGGERS> {
        core::mem::take(&mut self.names)
    }

    /// Queued names in insertion order
    pub fn names(&self) -> &[&'static str] {
        &self.names
    }
}

#[cfg(feature = "std")]
pub use shared::{PublishCallback, TriggerHandle};

#[cfg(feature = "std")]
mod shared {
    use std::sync::{Arc, Mutex, PoisonError};

    use super::{TriggerKind, TriggerSet};
    use crate::errors::PublishStatus;

    /// One-shot callback invoked with the terminal outcome of the next publish
    pub type PublishCallback = Box<dyn FnMut(PublishStatus) + Send>;

    /// State shared between the polling loop and foreign contexts
    #[derive(Default)]
    pub(crate) struct SharedState {
        pub(crate) triggers: TriggerSet,
        pub(crate) publish_callbacks: std::vec::Vec<PublishCallback>,
    }

    /// Cloneable handle for raising triggers and registering publish
    /// callbacks from any context
    #[derive(Clone, Default)]
    pub struct TriggerHandle {
        inner: Arc<Mutex<SharedState>>,
    }

    impl TriggerHandle {
        /// Create a handle over fresh shared state
        pub fn new() -> Self {
            Self::default()
        }

        /// Queue a trigger; safe to call from transport completion contexts
        pub fn trigger(&self, kind: TriggerKind, name: &'static str) {
            self.with_state(|state| state.triggers.raise(kind, name));
        }

        /// Register a one-shot callback for the next publish outcome
        ///
        /// Callbacks registered after a send has started are delivered with
        /// the outcome of the *next* publish, not the in-flight one.
        pub fn register_publish_callback(&self, callback: PublishCallback) {
            self.with_state(|state| state.publish_callbacks.push(callback));
        }

        /// Check whether any trigger is queued
        pub fn triggers_pending(&self) -> bool {
            self.with_state(|state| !state.triggers.is_empty())
        }

        /// Immediate flag state
        pub fn immediate(&self) -> bool {
            self.with_state(|state| state.triggers.immediate())
        }

        /// Run a short, non-blocking closure under the shared lock
        pub(crate) fn with_state<R>(&self, f: impl FnOnce(&mut SharedState) -> R) -> R {
            let mut guard = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
            f(&mut guard)
        }
    }
}
