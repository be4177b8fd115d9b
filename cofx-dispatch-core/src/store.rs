//! Centralized state store with reducer pattern

use crate::action::{Action, Msg};
use crate::batch::{enable_batching, BatchingReducer};
use std::marker::PhantomData;

/// A reducer function that handles actions and mutates state
///
/// Returns `true` if the state changed.
pub type Reducer<S, A> = fn(&mut S, A) -> bool;

/// Centralized state store with Redux-like reducer pattern
///
/// The store holds the application state and provides a single point
/// for state mutations through the `dispatch` method. Every store runs its
/// reducer through a [`BatchingReducer`], so batch markers and error actions
/// are always understood.
///
/// # Type Parameters
/// * `S` - The application state type
/// * `A` - The action type (must implement `Action`)
///
/// # Example
/// ```ignore
/// #[derive(Default)]
/// struct AppState {
///     counter: i32,
/// }
///
/// #[derive(Action, Clone, Debug)]
/// enum MyAction {
///     Increment,
///     Decrement,
/// }
///
/// fn reducer(state: &mut AppState, action: MyAction) -> bool {
///     match action {
///         MyAction::Increment => {
///             state.counter += 1;
///             true
///         }
///         MyAction::Decrement => {
///             state.counter -= 1;
///             true
///         }
///     }
/// }
///
/// let mut store = Store::new(AppState::default(), reducer);
/// store.dispatch(MyAction::Increment);
/// assert_eq!(store.state().counter, 1);
/// ```
pub struct Store<S, A: Action> {
    state: S,
    reducer: BatchingReducer<S, A>,
    _marker: PhantomData<A>,
}

impl<S, A: Action> Store<S, A> {
    /// Create a new store with initial state and reducer
    pub fn new(state: S, reducer: Reducer<S, A>) -> Self {
        Self::with_batching(state, enable_batching(reducer))
    }

    /// Create a store from an already configured batching reducer
    pub fn with_batching(state: S, reducer: BatchingReducer<S, A>) -> Self {
        Self {
            state,
            reducer,
            _marker: PhantomData,
        }
    }

    /// Dispatch a message to the store
    ///
    /// Returns `true` if the state changed.
    pub fn dispatch(&mut self, msg: impl Into<Msg<A>>) -> bool {
        self.reducer.reduce(&mut self.state, msg.into())
    }

    /// Get a reference to the current state
    pub fn state(&self) -> &S {
        &self.state
    }
}

/// Store with middleware support
///
/// Wraps a `Store` and lets middleware observe every message
/// before and after it is processed by the reducer.
pub struct StoreWithMiddleware<S, A: Action, M: Middleware<A>> {
    store: Store<S, A>,
    middleware: M,
}

impl<S, A: Action, M: Middleware<A>> StoreWithMiddleware<S, A, M> {
    /// Create a new store with middleware
    pub fn new(state: S, reducer: Reducer<S, A>, middleware: M) -> Self {
        Self::from_store(Store::new(state, reducer), middleware)
    }

    /// Attach middleware to an existing store
    pub fn from_store(store: Store<S, A>, middleware: M) -> Self {
        Self { store, middleware }
    }

    /// Dispatch a message through middleware and store
    pub fn dispatch(&mut self, msg: impl Into<Msg<A>>) -> bool {
        let msg = msg.into();
        self.middleware.before(&msg);
        let changed = self.store.dispatch(msg.clone());
        self.middleware.after(&msg, changed);
        changed
    }

    /// Get a reference to the current state
    pub fn state(&self) -> &S {
        self.store.state()
    }
}

/// Middleware trait for observing messages
///
/// Implement this trait to add logging, persistence, or other
/// cross-cutting concerns to your store. Middleware sees plain actions,
/// batch markers and error actions alike; create-effect envelopes never
/// reach it because they are run, not reduced.
pub trait Middleware<A: Action> {
    /// Called before the message is handed to the reducer
    fn before(&mut self, msg: &Msg<A>);

    /// Called after the message is processed by the reducer
    fn after(&mut self, msg: &Msg<A>, state_changed: bool);
}

/// Middleware that logs messages (for debugging)
#[derive(Debug, Clone, Default)]
pub struct LoggingMiddleware {
    /// Whether to log before dispatch
    pub log_before: bool,
    /// Whether to log after dispatch
    pub log_after: bool,
}

impl LoggingMiddleware {
    /// Create a new logging middleware with default settings (log after only)
    pub fn new() -> Self {
        Self {
            log_before: false,
            log_after: true,
        }
    }
}

impl<A: Action> Middleware<A> for LoggingMiddleware {
    fn before(&mut self, msg: &Msg<A>) {
        if self.log_before {
            tracing::debug!(action = %msg.name(), "Dispatching action");
        }
    }

    fn after(&mut self, msg: &Msg<A>, state_changed: bool) {
        if self.log_after {
            tracing::debug!(
                action = %msg.name(),
                state_changed = state_changed,
                "Action processed"
            );
        }
    }
}

/// Compose multiple middleware into a single middleware
pub struct ComposedMiddleware<A: Action> {
    middlewares: Vec<Box<dyn Middleware<A> + Send>>,
}

impl<A: Action> std::fmt::Debug for ComposedMiddleware<A> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ComposedMiddleware")
            .field("middlewares_count", &self.middlewares.len())
            .finish()
    }
}

impl<A: Action> Default for ComposedMiddleware<A> {
    fn default() -> Self {
        Self::new()
    }
}

impl<A: Action> ComposedMiddleware<A> {
    /// Create a new composed middleware
    pub fn new() -> Self {
        Self {
            middlewares: Vec::new(),
        }
    }

    /// Add a middleware to the composition
    pub fn add<M: Middleware<A> + Send + 'static>(&mut self, middleware: M) {
        self.middlewares.push(Box::new(middleware));
    }

    /// Number of composed middlewares
    pub fn len(&self) -> usize {
        self.middlewares.len()
    }

    /// Whether nothing has been added
    pub fn is_empty(&self) -> bool {
        self.middlewares.is_empty()
    }
}

impl<A: Action> Middleware<A> for ComposedMiddleware<A> {
    fn before(&mut self, msg: &Msg<A>) {
        for middleware in &mut self.middlewares {
            middleware.before(msg);
        }
    }

    fn after(&mut self, msg: &Msg<A>, state_changed: bool) {
        // Call in reverse order for proper nesting
        for middleware in self.middlewares.iter_mut().rev() {
            middleware.after(msg, state_changed);
        }
    }
}
