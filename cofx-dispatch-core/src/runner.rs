//! Task runner for effect functions
//!
//! Runs an [`EffectFn`] with a [`Cx`] through which it yields
//! [`Effect`] descriptors. Each yielded descriptor is first offered to an
//! [`Interceptor`] (the store's effect handler); whatever the interceptor
//! passes back is interpreted here: `call`, `delay`, `all` and `race`.
//!
//! An optional [`CancellationToken`] is raced against the whole run.
//! Cancelling it drops the run at its current suspension point.
//!
//! # Example
//!
//! ```ignore
//! let greet = EffectFn::new(|cx: Cx<State, Action>, args: Vec<Value>| async move {
//!     cx.delay(Duration::from_millis(10)).await?;
//!     let (index, _) = cx.race(vec![take("STOP"), delay(Duration::from_secs(1))]).await?;
//!     Ok(json!({ "stopped": index == 0, "args": args }))
//! });
//!
//! let token = CancellationToken::new();
//! let result = runner::run(greet, vec![], Some(token.clone()), interceptor).await;
//! ```

use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use futures::future::{self, BoxFuture, FutureExt};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio_util::sync::CancellationToken;

use crate::action::Action;
use crate::effect::{self, Effect, EffectFn, EffectResult, Envelope};
use crate::error::EffectError;
use crate::middleware::StoreHandle;

/// What a yielded effect resolved to.
pub enum Outcome<S, A: Action> {
    /// The step finished without a value (`put`, `batch`, `delay`).
    Done,
    /// A JSON value (`select`, `call`).
    Value(Value),
    /// The dispatch that woke a `take`: a message, or a create-effect
    /// envelope for `take(EFFECT)`.
    Action(Envelope<S, A>),
    /// Store accessors from `store`.
    Store(StoreHandle<S, A>),
    /// Outcomes of `all`, in input order.
    All(Vec<Outcome<S, A>>),
    /// Winner of a `race` and its outcome.
    Race {
        index: usize,
        outcome: Box<Outcome<S, A>>,
    },
}

impl<S, A: Action> Outcome<S, A> {
    /// Unwrap a value outcome. `Done` reads as `null`.
    pub fn into_value(self) -> EffectResult {
        match self {
            Outcome::Value(value) => Ok(value),
            Outcome::Done => Ok(Value::Null),
            _ => Err(EffectError::UnexpectedOutcome { expected: "value" }),
        }
    }

    /// Unwrap the dispatch a `take` resolved with.
    pub fn into_action(self) -> Result<Envelope<S, A>, EffectError> {
        match self {
            Outcome::Action(envelope) => Ok(envelope),
            _ => Err(EffectError::UnexpectedOutcome { expected: "action" }),
        }
    }

    /// Unwrap the store accessors.
    pub fn into_store(self) -> Result<StoreHandle<S, A>, EffectError> {
        match self {
            Outcome::Store(handle) => Ok(handle),
            _ => Err(EffectError::UnexpectedOutcome { expected: "store" }),
        }
    }
}

impl<S, A: Action> fmt::Debug for Outcome<S, A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Outcome::Done => f.write_str("Done"),
            Outcome::Value(value) => f.debug_tuple("Value").field(value).finish(),
            Outcome::Action(envelope) => f.debug_tuple("Action").field(envelope).finish(),
            Outcome::Store(_) => f.write_str("Store(..)"),
            Outcome::All(outcomes) => f.debug_tuple("All").field(outcomes).finish(),
            Outcome::Race { index, outcome } => f
                .debug_struct("Race")
                .field("index", index)
                .field("outcome", outcome)
                .finish(),
        }
    }
}

/// A pending step.
pub type StepFuture<S, A> = BoxFuture<'static, Result<Outcome<S, A>, EffectError>>;

/// Result of offering an effect to an interceptor.
pub enum Intercepted<S, A: Action> {
    /// The interceptor took the effect; await this for its outcome.
    Resolved(StepFuture<S, A>),
    /// Not the interceptor's kind; the runner interprets it.
    Passed(Effect<S, A>),
}

/// Hook the runner offers every yielded effect to.
pub trait Interceptor<S, A: Action>: Send + Sync {
    fn intercept(&self, effect: Effect<S, A>) -> Intercepted<S, A>;
}

/// Context handed to a running effect function.
///
/// Every helper builds a descriptor and yields it with [`Cx::yield_effect`]
/// as soon as it is called; awaiting the returned future is the suspension
/// point.
pub struct Cx<S, A> {
    interceptor: Arc<dyn Interceptor<S, A>>,
}

impl<S, A> Clone for Cx<S, A> {
    fn clone(&self) -> Self {
        Self {
            interceptor: self.interceptor.clone(),
        }
    }
}

impl<S, A> fmt::Debug for Cx<S, A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Cx(..)")
    }
}

impl<S, A> Cx<S, A>
where
    S: Send + 'static,
    A: Action,
{
    pub fn new(interceptor: Arc<dyn Interceptor<S, A>>) -> Self {
        Self { interceptor }
    }

    /// Yield a descriptor and get a future for its outcome.
    ///
    /// The interceptor sees the effect immediately, before the returned
    /// future is polled. A `take` is registered at this point.
    pub fn yield_effect(&self, effect: Effect<S, A>) -> StepFuture<S, A> {
        resolve(self.interceptor.clone(), effect)
    }

    /// Dispatch an action, message or create-effect envelope.
    pub fn put(
        &self,
        envelope: impl Into<Envelope<S, A>>,
    ) -> impl Future<Output = Result<(), EffectError>> + Send + 'static {
        let step = self.yield_effect(effect::put(envelope));
        async move { step.await.map(|_| ()) }
    }

    /// Read the state through `selector`.
    pub fn select<F>(&self, selector: F, args: Vec<Value>) -> impl Future<Output = EffectResult> + Send + 'static
    where
        F: Fn(&S, &[Value]) -> EffectResult + Send + Sync + 'static,
    {
        let step = self.yield_effect(effect::select(selector, args));
        async move { step.await?.into_value() }
    }

    /// Read the state through `selector` and decode the result.
    pub fn select_as<T, F>(
        &self,
        selector: F,
        args: Vec<Value>,
    ) -> impl Future<Output = Result<T, EffectError>> + Send + 'static
    where
        T: DeserializeOwned,
        F: Fn(&S, &[Value]) -> EffectResult + Send + Sync + 'static,
    {
        let value = self.select(selector, args);
        async move { Ok(serde_json::from_value(value.await?)?) }
    }

    /// Wait for the next dispatch of `action_type`.
    ///
    /// Resolves with the dispatched envelope; only `take(EFFECT)` sees a
    /// create-effect one.
    pub fn take(
        &self,
        action_type: impl Into<String>,
    ) -> impl Future<Output = Result<Envelope<S, A>, EffectError>> + Send + 'static {
        let step = self.yield_effect(effect::take(action_type));
        async move { step.await?.into_action() }
    }

    /// Get dispatch and state accessors.
    pub fn store(&self) -> impl Future<Output = Result<StoreHandle<S, A>, EffectError>> + Send + 'static {
        let step = self.yield_effect(effect::store());
        async move { step.await?.into_store() }
    }

    /// Dispatch plain messages as one bundle and each effect individually.
    pub fn batch<I>(&self, envelopes: I) -> impl Future<Output = Result<(), EffectError>> + Send + 'static
    where
        I: IntoIterator,
        I::Item: Into<Envelope<S, A>>,
    {
        let step = self.yield_effect(effect::batch(envelopes));
        async move { step.await.map(|_| ()) }
    }

    /// Await `future` as a step of the run.
    pub fn call<F>(&self, future: F) -> impl Future<Output = EffectResult> + Send + 'static
    where
        F: Future<Output = EffectResult> + Send + 'static,
    {
        let step = self.yield_effect(effect::call(future));
        async move { step.await?.into_value() }
    }

    /// Sleep for `duration`.
    pub fn delay(&self, duration: Duration) -> impl Future<Output = Result<(), EffectError>> + Send + 'static {
        let step = self.yield_effect(effect::delay(duration));
        async move { step.await.map(|_| ()) }
    }

    /// Resolve every effect concurrently; fails with the first error.
    pub fn all(
        &self,
        effects: Vec<Effect<S, A>>,
    ) -> impl Future<Output = Result<Vec<Outcome<S, A>>, EffectError>> + Send + 'static {
        let step = self.yield_effect(effect::all(effects));
        async move {
            match step.await? {
                Outcome::All(outcomes) => Ok(outcomes),
                _ => Err(EffectError::UnexpectedOutcome { expected: "all" }),
            }
        }
    }

    /// Resolve with the index and outcome of the first effect to finish.
    pub fn race(
        &self,
        effects: Vec<Effect<S, A>>,
    ) -> impl Future<Output = Result<(usize, Outcome<S, A>), EffectError>> + Send + 'static {
        let step = self.yield_effect(effect::race(effects));
        async move {
            match step.await? {
                Outcome::Race { index, outcome } => Ok((index, *outcome)),
                _ => Err(EffectError::UnexpectedOutcome { expected: "race" }),
            }
        }
    }
}

/// Start `func` with `args`, resolving yielded effects through `interceptor`.
///
/// The function is invoked once, on the first poll of the returned future,
/// so a panic while building its future surfaces from that poll.
pub fn run<S, A>(
    func: EffectFn<S, A>,
    args: Vec<Value>,
    cancel: Option<CancellationToken>,
    interceptor: Arc<dyn Interceptor<S, A>>,
) -> BoxFuture<'static, EffectResult>
where
    S: Send + 'static,
    A: Action,
{
    let cx = Cx::new(interceptor);
    let task = async move { func.call(cx, args).await };
    match cancel {
        None => task.boxed(),
        Some(token) => Box::pin(async move {
            tokio::select! {
                biased;
                _ = token.cancelled() => Err(EffectError::Cancelled),
                result = task => result,
            }
        }),
    }
}

fn resolve<S, A>(interceptor: Arc<dyn Interceptor<S, A>>, effect: Effect<S, A>) -> StepFuture<S, A>
where
    S: Send + 'static,
    A: Action,
{
    match interceptor.intercept(effect) {
        Intercepted::Resolved(step) => step,
        Intercepted::Passed(effect) => run_native(interceptor, effect),
    }
}

fn run_native<S, A>(interceptor: Arc<dyn Interceptor<S, A>>, effect: Effect<S, A>) -> StepFuture<S, A>
where
    S: Send + 'static,
    A: Action,
{
    match effect {
        Effect::Call(future) => future.map(|result| result.map(Outcome::Value)).boxed(),
        Effect::Delay(duration) => async move {
            tokio::time::sleep(duration).await;
            Ok(Outcome::Done)
        }
        .boxed(),
        Effect::All(effects) => {
            let steps: Vec<_> = effects
                .into_iter()
                .map(|effect| resolve(interceptor.clone(), effect))
                .collect();
            future::try_join_all(steps).map(|result| result.map(Outcome::All)).boxed()
        }
        // A race over nothing never settles.
        Effect::Race(effects) if effects.is_empty() => future::pending().boxed(),
        Effect::Race(effects) => {
            let steps: Vec<_> = effects
                .into_iter()
                .map(|effect| resolve(interceptor.clone(), effect))
                .collect();
            future::select_all(steps)
                .map(|(result, index, _rest)| {
                    result.map(|outcome| Outcome::Race {
                        index,
                        outcome: Box::new(outcome),
                    })
                })
                .boxed()
        }
        other => {
            let label = other.label();
            future::ready(Err(EffectError::Unhandled(label))).boxed()
        }
    }
}
