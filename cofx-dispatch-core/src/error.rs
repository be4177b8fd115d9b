//! Error type shared by effect functions, selectors and the task runner

use serde_json::Value;

/// Why an effect run failed.
///
/// This is the payload of the standardized error action
/// ([`Msg::Error`](crate::Msg::Error)) and the error the caller's
/// [`EffectTask`](crate::EffectTask) resolves with.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum EffectError {
    /// The effect function rejected with a value.
    #[error("effect rejected with {0}")]
    Rejected(Value),

    /// The effect function failed with a message.
    #[error("{0}")]
    Message(String),

    /// A JSON value could not be decoded into the requested type.
    #[error("failed to decode effect value: {0}")]
    Decode(String),

    /// The run was cancelled through its token or aborted.
    #[error("effect cancelled")]
    Cancelled,

    /// The effect function panicked.
    #[error("effect panicked: {0}")]
    Panicked(String),

    /// No tokio runtime was available to spawn the run on.
    #[error("no tokio runtime available to run the effect")]
    NoRuntime,

    /// The waiter registered by `take` was dropped before it fired.
    #[error("waiter for `{0}` was dropped before the action arrived")]
    WaiterDropped(String),

    /// A descriptor reached the runner that nothing knows how to interpret.
    #[error("unhandled effect `{0}`")]
    Unhandled(&'static str),

    /// A step resolved to a different outcome than its helper expected.
    #[error("unexpected effect outcome, expected {expected}")]
    UnexpectedOutcome { expected: &'static str },
}

impl EffectError {
    /// Reject with an arbitrary JSON value.
    pub fn rejected(value: impl Into<Value>) -> Self {
        EffectError::Rejected(value.into())
    }

    /// Fail with a message.
    pub fn message(message: impl Into<String>) -> Self {
        EffectError::Message(message.into())
    }

    /// Whether the run ended because it was cancelled.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, EffectError::Cancelled)
    }
}

impl From<serde_json::Error> for EffectError {
    fn from(err: serde_json::Error) -> Self {
        EffectError::Decode(err.to_string())
    }
}
