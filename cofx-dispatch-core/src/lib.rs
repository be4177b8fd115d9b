//! Core traits and types for cofx-dispatch
//!
//! This crate provides an effect middleware for Redux-style stores: side
//! effects are written as async functions that yield plain descriptors
//! (`put`, `select`, `take`, `store`, `batch`) instead of touching the store
//! directly, which keeps them easy to test.
//!
//! # Core Concepts
//!
//! - **Action**: Events that describe state changes, identified by a type string
//! - **Msg**: What a reducer receives: an action, a batch marker or an error action
//! - **Effect**: A descriptor yielded by an effect function
//! - **CofxStore**: Store wrapped in the effect middleware
//! - **Batching reducer**: Folds batch markers through the base reducer in one pass
//!
//! # Basic Example
//!
//! ```ignore
//! use cofx_dispatch::prelude::*;
//! use serde_json::{json, Value};
//!
//! #[derive(Action, Clone, Debug)]
//! enum TodoAction {
//!     Loaded(Vec<String>),
//! }
//!
//! fn reducer(state: &mut Vec<String>, action: TodoAction) -> bool {
//!     match action {
//!         TodoAction::Loaded(todos) => { *state = todos; true }
//!     }
//! }
//!
//! let load = EffectFn::new(|cx: Cx<Vec<String>, TodoAction>, args: Vec<Value>| async move {
//!     let todos = cx.call(fetch_todos(args)).await?;
//!     cx.put(TodoAction::Loaded(serde_json::from_value(todos)?)).await?;
//!     Ok(Value::Null)
//! });
//!
//! let store = CofxStore::new(Vec::new(), reducer);
//! store.dispatch(create_effect(load, [json!("inbox")])).await?;
//! ```
//!
//! # Failures
//!
//! When an effect function fails, the middleware dispatches
//! [`Msg::Error`] once with the error and the task returned by `dispatch`
//! resolves with the same error. Reducers see it through
//! [`BatchingReducer::on_error`].

pub mod action;
pub mod batch;
pub mod effect;
pub mod error;
pub mod handler;
pub mod logger;
pub mod middleware;
pub mod runner;
pub mod store;
pub mod testing;
pub mod waiter;

// Core exports
pub use action::{Action, Msg, BATCH, BATCH_ACTIONS, EFFECT, ERROR};
pub use error::EffectError;

// Store exports
pub use batch::{batch_actions, enable_batching, BatchingReducer, ErrorReducer};
pub use store::{
    ComposedMiddleware, LoggingMiddleware, Middleware, Reducer, Store, StoreWithMiddleware,
};

// Effect exports
pub use effect::{
    create_effect, create_effects, CreateEffect, Effect, EffectCreator, EffectFn, EffectKind,
    EffectResult, Envelope, Selector,
};
pub use handler::EffectHandler;
pub use middleware::{CofxStore, CofxStoreBuilder, Dispatched, EffectTask, StoreHandle};
pub use runner::{Cx, Intercepted, Interceptor, Outcome};
pub use waiter::{Detached, Waiters};

// Logging exports
pub use logger::{
    ActionLog, ActionLogConfig, ActionLogEntry, ActionLoggerConfig, ActionLoggerMiddleware,
};

// Testing exports
pub use testing::{Recorded, RecordingMiddleware, TestHarness};

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::action::{Action, Msg};
    pub use crate::batch::{batch_actions, enable_batching, BatchingReducer};
    pub use crate::effect::{
        create_effect, create_effects, CreateEffect, Effect, EffectCreator, EffectFn,
        EffectResult, Envelope,
    };
    pub use crate::error::EffectError;
    pub use crate::middleware::{CofxStore, CofxStoreBuilder, Dispatched, EffectTask, StoreHandle};
    pub use crate::runner::{Cx, Outcome};
    pub use crate::store::{
        ComposedMiddleware, LoggingMiddleware, Middleware, Reducer, Store, StoreWithMiddleware,
    };
}
