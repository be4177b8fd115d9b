//! Action trait and the messages that reach a reducer

use std::fmt::Debug;

use crate::error::EffectError;

/// Type string of a create-effect envelope.
pub const EFFECT: &str = "@@cofx/EFFECT";
/// Type string of the bundle-for-effects marker.
pub const BATCH: &str = "@@cofx/BATCH";
/// Type string of the bundle-for-plain-actions marker.
pub const BATCH_ACTIONS: &str = "@@cofx/BATCH_ACTIONS";
/// Type string of the standardized error action.
pub const ERROR: &str = "@@cofx/ERROR";

/// Marker trait for actions that can be dispatched to the store
///
/// Actions represent intents to change state. They should be:
/// - Clone: Actions may be logged, replayed, or handed to several waiters
/// - Debug: For debugging and logging
/// - Send + 'static: Effects run on tokio tasks
///
/// `name()` is the action's type string. Waiters registered with `take`
/// are keyed by it.
///
/// Use `#[derive(Action)]` from `cofx-dispatch-macros` to auto-implement this trait.
pub trait Action: Clone + Debug + Send + 'static {
    /// Get the action type string
    fn name(&self) -> &'static str;
}

/// Everything a reducer can receive.
///
/// Application actions travel as [`Msg::Action`]. The batch markers carry an
/// ordered list of inner messages that the batching reducer folds in one
/// pass, and [`Msg::Error`] is dispatched when an effect fails.
#[derive(Debug, Clone, PartialEq)]
pub enum Msg<A> {
    /// A plain application action.
    Action(A),
    /// Bundle-for-effects marker.
    Batch(Vec<Msg<A>>),
    /// Bundle-for-plain-actions marker, produced by the `batch` effect.
    BatchActions(Vec<Msg<A>>),
    /// Standardized error action carrying the failure reason.
    Error(EffectError),
}

impl<A: Action> Msg<A> {
    /// The type string used for logging and for waking waiters.
    pub fn name(&self) -> &'static str {
        match self {
            Msg::Action(action) => action.name(),
            Msg::Batch(_) => BATCH,
            Msg::BatchActions(_) => BATCH_ACTIONS,
            Msg::Error(_) => ERROR,
        }
    }

    /// Borrow the application action, if this is one.
    pub fn action(&self) -> Option<&A> {
        match self {
            Msg::Action(action) => Some(action),
            _ => None,
        }
    }

    /// Take the application action, if this is one.
    pub fn into_action(self) -> Option<A> {
        match self {
            Msg::Action(action) => Some(action),
            _ => None,
        }
    }

    /// Borrow the failure reason of an error action.
    pub fn error(&self) -> Option<&EffectError> {
        match self {
            Msg::Error(err) => Some(err),
            _ => None,
        }
    }

    /// Whether this message is one of the two batch markers.
    pub fn is_batch(&self) -> bool {
        matches!(self, Msg::Batch(_) | Msg::BatchActions(_))
    }
}

impl<A: Action> From<A> for Msg<A> {
    fn from(action: A) -> Self {
        Msg::Action(action)
    }
}
