//! Test utilities for cofx-dispatch stores
//!
//! - [`RecordingMiddleware`]: observer capturing every message reaching the store
//! - [`TestHarness`]: action channel for capturing actions emitted by effects
//! - Assertion macros for verifying emitted actions
//!
//! # Example
//!
//! ```ignore
//! use cofx_dispatch::testing::RecordingMiddleware;
//!
//! let recorder = RecordingMiddleware::new();
//! let store = CofxStore::builder(State::default(), reducer)
//!     .middleware(recorder.clone())
//!     .build();
//!
//! store.dispatch(create_effect(load, ["id"])).await?;
//! assert_eq!(recorder.names(), vec!["LOADING", "LOADED"]);
//! ```

use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::mpsc;

use crate::action::{Action, Msg};
use crate::error::EffectError;
use crate::store::Middleware;

/// One message as seen by [`RecordingMiddleware`].
#[derive(Debug, Clone, PartialEq)]
pub struct Recorded {
    /// Type string of the message
    pub name: &'static str,
    /// Whether the reducer reported a change
    pub changed: bool,
    /// Payload of an error message
    pub error: Option<EffectError>,
}

/// Observer middleware that records every reduced message.
///
/// Clones share the same log, so keep one clone and hand the other to the
/// store builder.
#[derive(Debug, Clone, Default)]
pub struct RecordingMiddleware {
    log: Arc<Mutex<Vec<Recorded>>>,
}

impl RecordingMiddleware {
    pub fn new() -> Self {
        Self::default()
    }

    /// Everything recorded so far, oldest first.
    pub fn recorded(&self) -> Vec<Recorded> {
        self.log.lock().clone()
    }

    /// Type strings of the recorded messages.
    pub fn names(&self) -> Vec<&'static str> {
        self.log.lock().iter().map(|entry| entry.name).collect()
    }

    /// Change flags of the recorded messages.
    pub fn changes(&self) -> Vec<bool> {
        self.log.lock().iter().map(|entry| entry.changed).collect()
    }

    /// Errors carried by recorded error messages.
    pub fn errors(&self) -> Vec<EffectError> {
        self.log
            .lock()
            .iter()
            .filter_map(|entry| entry.error.clone())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.log.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.log.lock().is_empty()
    }

    pub fn clear(&self) {
        self.log.lock().clear();
    }
}

impl<A: Action> Middleware<A> for RecordingMiddleware {
    fn before(&mut self, _msg: &Msg<A>) {}

    fn after(&mut self, msg: &Msg<A>, state_changed: bool) {
        self.log.lock().push(Recorded {
            name: msg.name(),
            changed: state_changed,
            error: msg.error().cloned(),
        });
    }
}

/// Channel-backed capture of actions for tests.
///
/// Hand [`TestHarness::sender`] to code under test (an effect function
/// closure, for instance) and drain what it emitted.
///
/// # Example
///
/// ```ignore
/// let mut harness = TestHarness::<Action>::new();
/// let tx = harness.sender();
/// let notify = EffectFn::new(move |_cx, _args| {
///     let tx = tx.clone();
///     async move {
///         let _ = tx.send(Action::Notified);
///         Ok(Value::Null)
///     }
/// });
///
/// store.dispatch(create_effect(notify, Vec::<Value>::new())).await?;
/// assert_emitted!(harness.drain_emitted(), Action::Notified);
/// ```
#[derive(Debug)]
pub struct TestHarness<A: Action> {
    tx: mpsc::UnboundedSender<A>,
    rx: mpsc::UnboundedReceiver<A>,
}

impl<A: Action> TestHarness<A> {
    pub fn new() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self { tx, rx }
    }

    /// Clone of the action sender.
    pub fn sender(&self) -> mpsc::UnboundedSender<A> {
        self.tx.clone()
    }

    /// Emit an action into the channel.
    pub fn emit(&self, action: A) {
        let _ = self.tx.send(action);
    }

    /// Drain all emitted actions.
    pub fn drain_emitted(&mut self) -> Vec<A> {
        let mut actions = Vec::new();
        while let Ok(action) = self.rx.try_recv() {
            actions.push(action);
        }
        actions
    }

    /// Drain and keep only the actions named `name`.
    pub fn drain_named(&mut self, name: &str) -> Vec<A> {
        self.drain_emitted()
            .into_iter()
            .filter(|action| action.name() == name)
            .collect()
    }

    /// Check if any actions were emitted.
    pub fn has_emitted(&mut self) -> bool {
        !self.drain_emitted().is_empty()
    }
}

impl<A: Action> Default for TestHarness<A> {
    fn default() -> Self {
        Self::new()
    }
}

/// Assert that an action matching a pattern was emitted.
///
/// # Example
///
/// ```ignore
/// let actions = harness.drain_emitted();
/// assert_emitted!(actions, Action::Loaded(_));
/// ```
#[macro_export]
macro_rules! assert_emitted {
    ($actions:expr, $pattern:pat $(if $guard:expr)?) => {
        assert!(
            $actions.iter().any(|a| matches!(a, $pattern $(if $guard)?)),
            "Expected action matching `{}` to be emitted, but got: {:?}",
            stringify!($pattern),
            $actions
        );
    };
}

/// Assert that no action matching a pattern was emitted.
#[macro_export]
macro_rules! assert_not_emitted {
    ($actions:expr, $pattern:pat $(if $guard:expr)?) => {
        assert!(
            !$actions.iter().any(|a| matches!(a, $pattern $(if $guard)?)),
            "Expected action matching `{}` NOT to be emitted, but it was: {:?}",
            stringify!($pattern),
            $actions
        );
    };
}

/// Find the first action matching a pattern.
#[macro_export]
macro_rules! find_emitted {
    ($actions:expr, $pattern:pat $(if $guard:expr)?) => {
        $actions.iter().find(|a| matches!(a, $pattern $(if $guard)?))
    };
}

/// Count the actions matching a pattern.
///
/// # Example
///
/// ```ignore
/// assert_eq!(count_emitted!(actions, Action::Tick), 3);
/// ```
#[macro_export]
macro_rules! count_emitted {
    ($actions:expr, $pattern:pat $(if $guard:expr)?) => {
        $actions.iter().filter(|a| matches!(a, $pattern $(if $guard)?)).count()
    };
}
