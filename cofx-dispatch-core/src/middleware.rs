//! Effect middleware and the store it wraps
//!
//! [`CofxStore`] is a cheaply cloneable, thread-safe store whose `dispatch`
//! accepts any [`Envelope`]:
//!
//! 1. Waiters registered (through `take`) for the envelope's type are
//!    detached. Later registrations wait for the next dispatch.
//! 2. Plain messages go through the observer middleware and the batching
//!    reducer, exactly like [`StoreWithMiddleware`].
//! 3. Create-effect envelopes are spawned on tokio through the runner, with
//!    an [`EffectHandler`] resolving their descriptors against this store.
//! 4. The detached waiters are woken, so a `take` continuation already sees
//!    the reduced state.
//! 5. A failed run dispatches [`Msg::Error`] once and hands the same error
//!    back through the returned [`EffectTask`].
//!
//! # Example
//!
//! ```ignore
//! let store = CofxStore::builder(AppState::default(), reducer)
//!     .middleware(LoggingMiddleware::new())
//!     .extra_argument(json!({ "api": "https://example.com" }))
//!     .build();
//!
//! // Plain actions reduce synchronously.
//! store.dispatch(AppAction::Reset);
//!
//! // Effects run concurrently; await the task for the result.
//! let user = store.dispatch(create_effect(fetch_user, [42])).await?;
//! ```

use std::fmt;
use std::future::{Future, IntoFuture};
use std::panic::AssertUnwindSafe;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use futures::FutureExt;
use parking_lot::Mutex;
use serde_json::Value;
use tokio::runtime::Handle;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::action::{Action, Msg};
use crate::batch::{enable_batching, BatchingReducer};
use crate::effect::{CreateEffect, EffectResult, Envelope};
use crate::error::EffectError;
use crate::handler::EffectHandler;
use crate::runner::{self, Interceptor};
use crate::store::{ComposedMiddleware, Middleware, Reducer, Store, StoreWithMiddleware};
use crate::waiter::Waiters;

struct Shared<S, A: Action> {
    store: Mutex<StoreWithMiddleware<S, A, ComposedMiddleware<A>>>,
    waiters: Waiters<Envelope<S, A>>,
    extra_argument: Option<Value>,
    runtime: Option<Handle>,
    version: watch::Sender<u64>,
}

/// Store wrapped in the effect middleware.
pub struct CofxStore<S, A: Action> {
    shared: Arc<Shared<S, A>>,
}

impl<S, A: Action> Clone for CofxStore<S, A> {
    fn clone(&self) -> Self {
        Self {
            shared: self.shared.clone(),
        }
    }
}

impl<S, A: Action> fmt::Debug for CofxStore<S, A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CofxStore")
            .field("waiters", &self.shared.waiters)
            .field("version", &*self.shared.version.borrow())
            .finish_non_exhaustive()
    }
}

impl<S, A> CofxStore<S, A>
where
    S: Send + 'static,
    A: Action,
{
    /// Create a store with no observer middleware.
    pub fn new(state: S, reducer: Reducer<S, A>) -> Self {
        Self::builder(state, reducer).build()
    }

    /// Start configuring a store.
    pub fn builder(state: S, reducer: Reducer<S, A>) -> CofxStoreBuilder<S, A> {
        CofxStoreBuilder::new(state, reducer)
    }

    /// Dispatch an action, a message or a create-effect envelope.
    pub fn dispatch(&self, envelope: impl Into<Envelope<S, A>>) -> Dispatched {
        let envelope = envelope.into();
        let woken = self.shared.waiters.detach(envelope.name());
        let wake_with = (!woken.is_empty()).then(|| envelope.clone());

        let dispatched = match envelope {
            Envelope::Msg(msg) => Dispatched::Reduced(self.reduce(msg)),
            Envelope::Effect(effect) => Dispatched::Spawned(self.spawn_effect(effect)),
        };

        if let Some(envelope) = wake_with {
            woken.fire(&envelope);
        }
        dispatched
    }

    /// Read the state under the lock.
    pub fn with_state<R>(&self, f: impl FnOnce(&S) -> R) -> R {
        f(self.shared.store.lock().state())
    }

    /// Snapshot of the current state.
    pub fn get_state(&self) -> S
    where
        S: Clone,
    {
        self.with_state(S::clone)
    }

    /// Receiver bumped once per dispatch that changed state.
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.shared.version.subscribe()
    }

    /// Whether a `take` is waiting on `action_type`.
    pub fn has_waiters(&self, action_type: &str) -> bool {
        self.shared.waiters.has_pending(action_type)
    }

    /// Number of `take`s waiting on `action_type`.
    pub fn waiter_count(&self, action_type: &str) -> usize {
        self.shared.waiters.pending(action_type)
    }

    pub(crate) fn waiters(&self) -> &Waiters<Envelope<S, A>> {
        &self.shared.waiters
    }

    fn reduce(&self, msg: Msg<A>) -> bool {
        let changed = self.shared.store.lock().dispatch(msg);
        if changed {
            self.shared.version.send_modify(|version| *version += 1);
        }
        changed
    }

    fn spawn_effect(&self, effect: CreateEffect<S, A>) -> EffectTask {
        let CreateEffect {
            func,
            mut args,
            cancel,
        } = effect;
        if let Some(extra) = &self.shared.extra_argument {
            args.push(extra.clone());
        }

        let runtime = match self.shared.runtime.clone().or_else(|| Handle::try_current().ok()) {
            Some(runtime) => runtime,
            None => {
                tracing::warn!("effect dispatched outside a tokio runtime");
                self.dispatch(Msg::Error(EffectError::NoRuntime));
                return EffectTask::ready(Err(EffectError::NoRuntime));
            }
        };

        tracing::debug!(arg_count = args.len(), "starting effect");

        let interceptor: Arc<dyn Interceptor<S, A>> = Arc::new(EffectHandler::new(self.clone()));
        let run = AssertUnwindSafe(runner::run(func, args, cancel, interceptor)).catch_unwind();
        let store = self.clone();

        let join = runtime.spawn(async move {
            let result = match run.await {
                Ok(result) => result,
                Err(panic) => Err(EffectError::Panicked(panic_message(panic.as_ref()))),
            };
            match &result {
                Ok(_) => tracing::debug!("effect finished"),
                Err(EffectError::Cancelled) => tracing::debug!("effect cancelled"),
                Err(err) => {
                    tracing::warn!(error = %err, "effect failed");
                    store.dispatch(Msg::Error(err.clone()));
                }
            }
            result
        });

        EffectTask::spawned(join)
    }
}

/// Builder for [`CofxStore`].
pub struct CofxStoreBuilder<S, A: Action> {
    state: S,
    reducer: BatchingReducer<S, A>,
    middleware: ComposedMiddleware<A>,
    extra_argument: Option<Value>,
    runtime: Option<Handle>,
}

impl<S, A> CofxStoreBuilder<S, A>
where
    S: Send + 'static,
    A: Action,
{
    pub fn new(state: S, reducer: Reducer<S, A>) -> Self {
        Self {
            state,
            reducer: enable_batching(reducer),
            middleware: ComposedMiddleware::new(),
            extra_argument: None,
            runtime: None,
        }
    }

    /// Replace the reducer with a configured batching reducer.
    pub fn batching_reducer(mut self, reducer: BatchingReducer<S, A>) -> Self {
        self.reducer = reducer;
        self
    }

    /// Add an observer middleware. Observers run in the order added.
    pub fn middleware<M: Middleware<A> + Send + 'static>(mut self, middleware: M) -> Self {
        self.middleware.add(middleware);
        self
    }

    /// Append `value` to the arguments of every effect run.
    pub fn extra_argument(mut self, value: impl Into<Value>) -> Self {
        self.extra_argument = Some(value.into());
        self
    }

    /// Spawn effects on `runtime` instead of the ambient one.
    pub fn runtime(mut self, runtime: Handle) -> Self {
        self.runtime = Some(runtime);
        self
    }

    pub fn build(self) -> CofxStore<S, A> {
        let store = Store::with_batching(self.state, self.reducer);
        let (version, _) = watch::channel(0);
        CofxStore {
            shared: Arc::new(Shared {
                store: Mutex::new(StoreWithMiddleware::from_store(store, self.middleware)),
                waiters: Waiters::new(),
                extra_argument: self.extra_argument,
                runtime: self.runtime,
                version,
            }),
        }
    }
}

/// Dispatch and state accessors handed out by the `store` effect.
pub struct StoreHandle<S, A: Action> {
    store: CofxStore<S, A>,
}

impl<S, A: Action> Clone for StoreHandle<S, A> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
        }
    }
}

impl<S, A: Action> fmt::Debug for StoreHandle<S, A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StoreHandle").finish_non_exhaustive()
    }
}

impl<S, A> StoreHandle<S, A>
where
    S: Send + 'static,
    A: Action,
{
    pub(crate) fn new(store: CofxStore<S, A>) -> Self {
        Self { store }
    }

    pub fn dispatch(&self, envelope: impl Into<Envelope<S, A>>) -> Dispatched {
        self.store.dispatch(envelope)
    }

    pub fn get_state(&self) -> S
    where
        S: Clone,
    {
        self.store.get_state()
    }

    pub fn with_state<R>(&self, f: impl FnOnce(&S) -> R) -> R {
        self.store.with_state(f)
    }
}

/// Result of [`CofxStore::dispatch`].
///
/// Awaiting it yields the effect's result, or `null` for a reduced message.
#[derive(Debug)]
pub enum Dispatched {
    /// The message was reduced; whether state changed.
    Reduced(bool),
    /// A create-effect envelope is running.
    Spawned(EffectTask),
}

impl Dispatched {
    /// Whether a reduced message changed state.
    pub fn changed(&self) -> bool {
        matches!(self, Dispatched::Reduced(true))
    }

    /// The running task, if an effect was spawned.
    pub fn into_task(self) -> Option<EffectTask> {
        match self {
            Dispatched::Spawned(task) => Some(task),
            Dispatched::Reduced(_) => None,
        }
    }
}

impl IntoFuture for Dispatched {
    type Output = EffectResult;
    type IntoFuture = EffectTask;

    fn into_future(self) -> EffectTask {
        match self {
            Dispatched::Reduced(_) => EffectTask::ready(Ok(Value::Null)),
            Dispatched::Spawned(task) => task,
        }
    }
}

/// Handle to a running effect.
///
/// Dropping it detaches the run; it keeps going.
#[derive(Debug)]
pub struct EffectTask {
    inner: TaskInner,
}

#[derive(Debug)]
enum TaskInner {
    Spawned(JoinHandle<EffectResult>),
    Ready(Option<EffectResult>),
}

impl EffectTask {
    fn spawned(join: JoinHandle<EffectResult>) -> Self {
        Self {
            inner: TaskInner::Spawned(join),
        }
    }

    fn ready(result: EffectResult) -> Self {
        Self {
            inner: TaskInner::Ready(Some(result)),
        }
    }

    /// Abort the run. The task then resolves with [`EffectError::Cancelled`].
    pub fn abort(&self) {
        if let TaskInner::Spawned(join) = &self.inner {
            join.abort();
        }
    }

    /// Whether the run has finished.
    pub fn is_finished(&self) -> bool {
        match &self.inner {
            TaskInner::Spawned(join) => join.is_finished(),
            TaskInner::Ready(_) => true,
        }
    }
}

impl Future for EffectTask {
    type Output = EffectResult;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<EffectResult> {
        match &mut self.get_mut().inner {
            TaskInner::Spawned(join) => match Pin::new(join).poll(cx) {
                Poll::Ready(Ok(result)) => Poll::Ready(result),
                Poll::Ready(Err(err)) if err.is_cancelled() => Poll::Ready(Err(EffectError::Cancelled)),
                Poll::Ready(Err(err)) => Poll::Ready(Err(EffectError::Panicked(err.to_string()))),
                Poll::Pending => Poll::Pending,
            },
            TaskInner::Ready(result) => {
                Poll::Ready(result.take().unwrap_or(Err(EffectError::Cancelled)))
            }
        }
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}
