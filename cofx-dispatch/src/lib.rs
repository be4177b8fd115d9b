//! cofx-dispatch: effect middleware for Redux-style stores
//!
//! Side effects are async functions that yield descriptors (`put`, `select`,
//! `take`, `store`, `batch`) for the middleware to perform. Dispatching a
//! create-effect envelope runs the function on tokio; failures come back as a
//! standardized error action and through the returned task.
//!
//! # Example
//! ```ignore
//! use cofx_dispatch::prelude::*;
//! use serde_json::Value;
//!
//! #[derive(Action, Clone, Debug)]
//! #[action(prefix = "session/", rename_all = "SCREAMING_SNAKE_CASE")]
//! enum SessionAction {
//!     LoginRequested,
//!     LoggedIn(String),
//! }
//!
//! let login_flow = EffectFn::new(|cx: Cx<Session, SessionAction>, _args: Vec<Value>| async move {
//!     cx.take("session/LOGIN_REQUESTED").await?;
//!     cx.put(SessionAction::LoggedIn("alice".into())).await?;
//!     Ok(Value::Null)
//! });
//!
//! let store = CofxStore::new(Session::default(), reducer);
//! let flow = store.dispatch(create_effect(login_flow, Vec::<Value>::new()));
//! store.dispatch(SessionAction::LoginRequested);
//! flow.await?;
//! ```

// Re-export everything from core
pub use cofx_dispatch_core::*;

// Re-export derive macros
pub use cofx_dispatch_macros::Action;

/// Prelude for convenient imports
pub mod prelude {
    // Traits and messages
    pub use cofx_dispatch_core::{Action, EffectError, Msg};

    // Effects
    pub use cofx_dispatch_core::effect;
    pub use cofx_dispatch_core::{
        create_effect, create_effects, CreateEffect, Cx, Effect, EffectCreator, EffectFn,
        EffectResult, Envelope, Outcome,
    };

    // Store
    pub use cofx_dispatch_core::{
        batch_actions, enable_batching, BatchingReducer, CofxStore, CofxStoreBuilder, Dispatched,
        EffectTask, LoggingMiddleware, Middleware, Reducer, StoreHandle,
    };

    // Logging
    pub use cofx_dispatch_core::{ActionLoggerConfig, ActionLoggerMiddleware};

    // Derive macros
    pub use cofx_dispatch_macros::Action;
}
