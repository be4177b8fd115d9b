//! Batching reducer wrapper
//!
//! Wraps an application reducer so that the two batch markers
//! ([`Msg::Batch`] and [`Msg::BatchActions`]) are folded through it
//! left to right within a single outer dispatch. The store sees one
//! dispatch, one `changed` flag, one notification.
//!
//! ```ignore
//! let reducer = enable_batching(app_reducer).on_error(|state: &mut AppState, err| {
//!     state.last_error = Some(err.to_string());
//!     true
//! });
//! let mut store = Store::with_batching(AppState::default(), reducer);
//! store.dispatch(batch_actions([AppAction::Add(1), AppAction::Add(2)]));
//! ```

use crate::action::{Action, Msg};
use crate::error::EffectError;
use crate::store::Reducer;

/// A reducer for the standardized error action.
pub type ErrorReducer<S> = fn(&mut S, &EffectError) -> bool;

/// Reducer wrapper that understands every [`Msg`] variant.
pub struct BatchingReducer<S, A> {
    reducer: Reducer<S, A>,
    on_error: Option<ErrorReducer<S>>,
}

impl<S, A> Clone for BatchingReducer<S, A> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<S, A> Copy for BatchingReducer<S, A> {}

impl<S, A> std::fmt::Debug for BatchingReducer<S, A> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BatchingReducer")
            .field("handles_errors", &self.on_error.is_some())
            .finish()
    }
}

/// Wrap `reducer` so it can fold batch markers.
pub fn enable_batching<S, A: Action>(reducer: Reducer<S, A>) -> BatchingReducer<S, A> {
    BatchingReducer {
        reducer,
        on_error: None,
    }
}

impl<S, A: Action> BatchingReducer<S, A> {
    /// Route [`Msg::Error`] to `on_error`. Without it error actions leave state untouched.
    pub fn on_error(mut self, on_error: ErrorReducer<S>) -> Self {
        self.on_error = Some(on_error);
        self
    }

    /// Apply a message to `state`, returning whether anything changed.
    pub fn reduce(&self, state: &mut S, msg: Msg<A>) -> bool {
        match msg {
            Msg::Action(action) => (self.reducer)(state, action),
            Msg::Batch(inner) | Msg::BatchActions(inner) => inner
                .into_iter()
                .fold(false, |changed, msg| self.reduce(state, msg) | changed),
            Msg::Error(err) => self.on_error.is_some_and(|on_error| on_error(state, &err)),
        }
    }
}

/// Bundle plain actions into a single [`Msg::BatchActions`].
pub fn batch_actions<A, I>(actions: I) -> Msg<A>
where
    A: Action,
    I: IntoIterator,
    I::Item: Into<Msg<A>>,
{
    Msg::BatchActions(actions.into_iter().map(Into::into).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Clone, Debug, PartialEq)]
    enum TestAction {
        Push(i32),
        NoOp,
    }

    impl Action for TestAction {
        fn name(&self) -> &'static str {
            match self {
                TestAction::Push(_) => "Push",
                TestAction::NoOp => "NoOp",
            }
        }
    }

    #[derive(Default)]
    struct TestState {
        items: Vec<i32>,
        errors: usize,
    }

    fn test_reducer(state: &mut TestState, action: TestAction) -> bool {
        match action {
            TestAction::Push(n) => {
                state.items.push(n);
                true
            }
            TestAction::NoOp => false,
        }
    }

    fn count_errors(state: &mut TestState, _err: &EffectError) -> bool {
        state.errors += 1;
        true
    }

    #[test]
    fn test_plain_action_passes_through() {
        let reducer = enable_batching(test_reducer);
        let mut state = TestState::default();

        assert!(reducer.reduce(&mut state, Msg::Action(TestAction::Push(1))));
        assert!(!reducer.reduce(&mut state, Msg::Action(TestAction::NoOp)));
        assert_eq!(state.items, vec![1]);
    }

    #[test]
    fn test_batch_actions_fold_in_order() {
        let reducer = enable_batching(test_reducer);
        let mut state = TestState::default();

        let changed = reducer.reduce(
            &mut state,
            batch_actions([TestAction::Push(1), TestAction::NoOp, TestAction::Push(2)]),
        );

        assert!(changed);
        assert_eq!(state.items, vec![1, 2]);
    }

    #[test]
    fn test_batch_marker_folds_nested() {
        let reducer = enable_batching(test_reducer);
        let mut state = TestState::default();

        let msg = Msg::Batch(vec![
            Msg::Action(TestAction::Push(1)),
            batch_actions([TestAction::Push(2), TestAction::Push(3)]),
        ]);
        assert!(reducer.reduce(&mut state, msg));
        assert_eq!(state.items, vec![1, 2, 3]);
    }

    #[test]
    fn test_batch_of_noops_is_unchanged() {
        let reducer = enable_batching(test_reducer);
        let mut state = TestState::default();

        assert!(!reducer.reduce(&mut state, batch_actions([TestAction::NoOp, TestAction::NoOp])));
        assert!(!reducer.reduce(&mut state, Msg::BatchActions(vec![])));
    }

    #[test]
    fn test_error_without_handler_is_ignored() {
        let reducer = enable_batching(test_reducer);
        let mut state = TestState::default();

        assert!(!reducer.reduce(&mut state, Msg::Error(EffectError::message("x"))));
        assert_eq!(state.errors, 0);
    }

    #[test]
    fn test_error_with_handler() {
        let reducer = enable_batching(test_reducer).on_error(count_errors);
        let mut state = TestState::default();

        assert!(reducer.reduce(&mut state, Msg::Error(EffectError::message("x"))));
        assert_eq!(state.errors, 1);
    }
}
