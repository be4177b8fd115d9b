//! Effect descriptors and create-effect envelopes
//!
//! Effect functions describe their side effects as values and hand them to
//! the runner through [`Cx`](crate::Cx). The middleware owns five kinds:
//!
//! | Descriptor | Resolves with |
//! |---|---|
//! | [`put`] | `Outcome::Done` once the envelope has been dispatched |
//! | [`select`] | the selector's result against the current state |
//! | [`take`] | the next dispatched envelope of that type |
//! | [`store`] | a [`StoreHandle`](crate::StoreHandle) |
//! | [`batch`] | `Outcome::Done` once every envelope has been dispatched |
//!
//! [`call`], [`delay`], [`all`] and [`race`] are interpreted by the runner
//! itself; the classifier reports them as `None` and the handler passes
//! them through untouched.
//!
//! # Example
//!
//! ```ignore
//! use cofx_dispatch::prelude::*;
//! use serde_json::{json, Value};
//!
//! let fetch_user = EffectFn::new(|cx: Cx<AppState, AppAction>, args: Vec<Value>| async move {
//!     let id = args[0].clone();
//!     cx.put(AppAction::Loading).await?;
//!     let user = cx.call(api::fetch_user(id)).await?;
//!     cx.put(AppAction::UserLoaded(user.clone())).await?;
//!     Ok(user)
//! });
//!
//! store.dispatch(create_effect(fetch_user, [json!(42)])).await?;
//! ```

use std::collections::BTreeMap;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use futures::future::BoxFuture;
use serde_json::Value;
use tokio_util::sync::CancellationToken;

use crate::action::{Action, Msg, EFFECT};
use crate::error::EffectError;
use crate::runner::Cx;

/// What an effect function or a selector produces.
pub type EffectResult = Result<Value, EffectError>;

type BoxedEffectFn<S, A> =
    dyn Fn(Cx<S, A>, Vec<Value>) -> BoxFuture<'static, EffectResult> + Send + Sync;

/// A shareable async effect function.
///
/// Two `EffectFn`s are equal when they are clones of the same function.
pub struct EffectFn<S, A> {
    inner: Arc<BoxedEffectFn<S, A>>,
}

impl<S, A> Clone for EffectFn<S, A> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<S, A> fmt::Debug for EffectFn<S, A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("EffectFn")
            .field(&Arc::as_ptr(&self.inner).cast::<()>())
            .finish()
    }
}

impl<S, A> PartialEq for EffectFn<S, A> {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

impl<S, A> EffectFn<S, A>
where
    S: Send + 'static,
    A: Action,
{
    /// Wrap an async function taking the runner context and the arguments.
    pub fn new<F, Fut>(func: F) -> Self
    where
        F: Fn(Cx<S, A>, Vec<Value>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = EffectResult> + Send + 'static,
    {
        Self {
            inner: Arc::new(
                move |cx: Cx<S, A>, args: Vec<Value>| -> BoxFuture<'static, EffectResult> {
                    Box::pin(func(cx, args))
                },
            ),
        }
    }

    pub(crate) fn call(&self, cx: Cx<S, A>, args: Vec<Value>) -> BoxFuture<'static, EffectResult> {
        (self.inner)(cx, args)
    }
}

impl<S, A> EffectFn<S, A> {
    /// Whether both handles point at the same function.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        std::ptr::addr_eq(Arc::as_ptr(&self.inner), Arc::as_ptr(&other.inner))
    }
}

/// A state selector with extra arguments.
pub struct Selector<S> {
    inner: Arc<dyn Fn(&S, &[Value]) -> EffectResult + Send + Sync>,
}

impl<S> Clone for Selector<S> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<S> fmt::Debug for Selector<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Selector(..)")
    }
}

impl<S> Selector<S> {
    /// Wrap a selector function.
    pub fn new<F>(func: F) -> Self
    where
        F: Fn(&S, &[Value]) -> EffectResult + Send + Sync + 'static,
    {
        Self {
            inner: Arc::new(func),
        }
    }

    /// Run the selector against `state`.
    pub fn apply(&self, state: &S, args: &[Value]) -> EffectResult {
        (self.inner)(state, args)
    }
}

/// Payload of a create-effect envelope: the function to run, its arguments
/// and an optional cancellation token.
pub struct CreateEffect<S, A> {
    pub func: EffectFn<S, A>,
    pub args: Vec<Value>,
    pub cancel: Option<CancellationToken>,
}

impl<S, A> CreateEffect<S, A> {
    /// A create-effect payload with no arguments.
    pub fn new(func: EffectFn<S, A>) -> Self {
        Self {
            func,
            args: Vec::new(),
            cancel: None,
        }
    }

    /// Race the run against `token`; cancelling it aborts the run.
    pub fn with_cancel(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }
}

impl<S, A> Clone for CreateEffect<S, A> {
    fn clone(&self) -> Self {
        Self {
            func: self.func.clone(),
            args: self.args.clone(),
            cancel: self.cancel.clone(),
        }
    }
}

impl<S, A> fmt::Debug for CreateEffect<S, A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CreateEffect")
            .field("func", &self.func)
            .field("args", &self.args)
            .field("cancellable", &self.cancel.is_some())
            .finish()
    }
}

// Tokens carry no identity worth comparing, only their presence.
impl<S, A> PartialEq for CreateEffect<S, A> {
    fn eq(&self, other: &Self) -> bool {
        self.func == other.func
            && self.args == other.args
            && self.cancel.is_some() == other.cancel.is_some()
    }
}

/// Anything the effect store can dispatch.
pub enum Envelope<S, A> {
    /// Reduced by the store.
    Msg(Msg<A>),
    /// Run by the effect middleware.
    Effect(CreateEffect<S, A>),
}

impl<S, A: Action> Envelope<S, A> {
    /// The envelope's type string.
    pub fn name(&self) -> &'static str {
        match self {
            Envelope::Msg(msg) => msg.name(),
            Envelope::Effect(_) => EFFECT,
        }
    }

    /// Whether this is a create-effect envelope.
    pub fn is_effect(&self) -> bool {
        matches!(self, Envelope::Effect(_))
    }

    /// Borrow the application action, if this is a plain one.
    pub fn action(&self) -> Option<&A> {
        match self {
            Envelope::Msg(msg) => msg.action(),
            Envelope::Effect(_) => None,
        }
    }

    /// Take the application action, if this is a plain one.
    pub fn into_action(self) -> Option<A> {
        self.into_msg().and_then(Msg::into_action)
    }

    /// Take the message, if this is not a create-effect envelope.
    pub fn into_msg(self) -> Option<Msg<A>> {
        match self {
            Envelope::Msg(msg) => Some(msg),
            Envelope::Effect(_) => None,
        }
    }

    /// Take the create-effect payload.
    pub fn into_effect(self) -> Option<CreateEffect<S, A>> {
        match self {
            Envelope::Effect(effect) => Some(effect),
            Envelope::Msg(_) => None,
        }
    }
}

impl<S, A: Clone> Clone for Envelope<S, A> {
    fn clone(&self) -> Self {
        match self {
            Envelope::Msg(msg) => Envelope::Msg(msg.clone()),
            Envelope::Effect(effect) => Envelope::Effect(effect.clone()),
        }
    }
}

impl<S, A: fmt::Debug> fmt::Debug for Envelope<S, A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Envelope::Msg(msg) => f.debug_tuple("Msg").field(msg).finish(),
            Envelope::Effect(effect) => f.debug_tuple("Effect").field(effect).finish(),
        }
    }
}

impl<S, A: PartialEq> PartialEq for Envelope<S, A> {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Envelope::Msg(a), Envelope::Msg(b)) => a == b,
            (Envelope::Effect(a), Envelope::Effect(b)) => a == b,
            _ => false,
        }
    }
}

impl<S, A: Action> From<A> for Envelope<S, A> {
    fn from(action: A) -> Self {
        Envelope::Msg(Msg::Action(action))
    }
}

impl<S, A> From<Msg<A>> for Envelope<S, A> {
    fn from(msg: Msg<A>) -> Self {
        Envelope::Msg(msg)
    }
}

impl<S, A> From<CreateEffect<S, A>> for Envelope<S, A> {
    fn from(effect: CreateEffect<S, A>) -> Self {
        Envelope::Effect(effect)
    }
}

/// The effect kinds owned by the middleware.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EffectKind {
    Put,
    Select,
    Take,
    Store,
    Batch,
}

impl EffectKind {
    /// Upper-case tag of the kind.
    pub fn as_str(self) -> &'static str {
        match self {
            EffectKind::Put => "PUT",
            EffectKind::Select => "SELECT",
            EffectKind::Take => "TAKE",
            EffectKind::Store => "STORE",
            EffectKind::Batch => "BATCH",
        }
    }
}

impl fmt::Display for EffectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A step yielded by an effect function.
pub enum Effect<S, A> {
    /// Dispatch an envelope.
    Put(Envelope<S, A>),
    /// Read the current state through a selector.
    Select {
        selector: Selector<S>,
        args: Vec<Value>,
    },
    /// Wait for the next dispatch of a type.
    Take(String),
    /// Get dispatch and state accessors.
    Store,
    /// Dispatch plain messages as one bundle, then each effect on its own.
    Batch(Vec<Envelope<S, A>>),
    /// Await an arbitrary future.
    Call(BoxFuture<'static, EffectResult>),
    /// Sleep.
    Delay(Duration),
    /// Resolve every effect concurrently, failing fast.
    All(Vec<Effect<S, A>>),
    /// Resolve with whichever effect finishes first.
    Race(Vec<Effect<S, A>>),
}

impl<S, A> Effect<S, A> {
    /// Classify the descriptor. Runner-native descriptors are `None`.
    pub fn kind(&self) -> Option<EffectKind> {
        match self {
            Effect::Put(_) => Some(EffectKind::Put),
            Effect::Select { .. } => Some(EffectKind::Select),
            Effect::Take(_) => Some(EffectKind::Take),
            Effect::Store => Some(EffectKind::Store),
            Effect::Batch(_) => Some(EffectKind::Batch),
            Effect::Call(_) | Effect::Delay(_) | Effect::All(_) | Effect::Race(_) => None,
        }
    }

    /// Short tag for logs and errors.
    pub fn label(&self) -> &'static str {
        match self.kind() {
            Some(kind) => kind.as_str(),
            None => match self {
                Effect::Call(_) => "CALL",
                Effect::Delay(_) => "DELAY",
                Effect::All(_) => "ALL",
                _ => "RACE",
            },
        }
    }
}

impl<S, A: fmt::Debug> fmt::Debug for Effect<S, A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Effect::Put(envelope) => f.debug_tuple("Put").field(envelope).finish(),
            Effect::Select { args, .. } => f.debug_struct("Select").field("args", args).finish(),
            Effect::Take(ty) => f.debug_tuple("Take").field(ty).finish(),
            Effect::Store => f.write_str("Store"),
            Effect::Batch(envelopes) => f.debug_tuple("Batch").field(envelopes).finish(),
            Effect::Call(_) => f.write_str("Call(..)"),
            Effect::Delay(duration) => f.debug_tuple("Delay").field(duration).finish(),
            Effect::All(effects) => f.debug_tuple("All").field(effects).finish(),
            Effect::Race(effects) => f.debug_tuple("Race").field(effects).finish(),
        }
    }
}

/// Dispatch `envelope`.
pub fn put<S, A>(envelope: impl Into<Envelope<S, A>>) -> Effect<S, A> {
    Effect::Put(envelope.into())
}

/// Call `selector(state, args)`.
pub fn select<S, A, F>(selector: F, args: Vec<Value>) -> Effect<S, A>
where
    F: Fn(&S, &[Value]) -> EffectResult + Send + Sync + 'static,
{
    Effect::Select {
        selector: Selector::new(selector),
        args,
    }
}

/// Wait for the next dispatch of `action_type`.
pub fn take<S, A>(action_type: impl Into<String>) -> Effect<S, A> {
    Effect::Take(action_type.into())
}

/// Get dispatch and state accessors.
pub fn store<S, A>() -> Effect<S, A> {
    Effect::Store
}

/// Dispatch plain messages as one bundle and each effect individually.
pub fn batch<S, A, I>(envelopes: I) -> Effect<S, A>
where
    I: IntoIterator,
    I::Item: Into<Envelope<S, A>>,
{
    Effect::Batch(envelopes.into_iter().map(Into::into).collect())
}

/// Await `future` inside the run.
pub fn call<S, A, F>(future: F) -> Effect<S, A>
where
    F: Future<Output = EffectResult> + Send + 'static,
{
    Effect::Call(Box::pin(future))
}

/// Sleep for `duration`.
pub fn delay<S, A>(duration: Duration) -> Effect<S, A> {
    Effect::Delay(duration)
}

/// Resolve every effect concurrently.
pub fn all<S, A>(effects: Vec<Effect<S, A>>) -> Effect<S, A> {
    Effect::All(effects)
}

/// Resolve with the first effect to finish.
pub fn race<S, A>(effects: Vec<Effect<S, A>>) -> Effect<S, A> {
    Effect::Race(effects)
}

/// Build a create-effect envelope payload for `func` with `args`.
pub fn create_effect<S, A, I>(func: EffectFn<S, A>, args: I) -> CreateEffect<S, A>
where
    I: IntoIterator,
    I::Item: Into<Value>,
{
    CreateEffect {
        func,
        args: args.into_iter().map(Into::into).collect(),
        cancel: None,
    }
}

/// A named action creator wrapping an effect function.
pub struct EffectCreator<S, A> {
    name: String,
    func: EffectFn<S, A>,
}

impl<S, A> Clone for EffectCreator<S, A> {
    fn clone(&self) -> Self {
        Self {
            name: self.name.clone(),
            func: self.func.clone(),
        }
    }
}

impl<S, A> fmt::Debug for EffectCreator<S, A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EffectCreator")
            .field("name", &self.name)
            .finish()
    }
}

impl<S, A> EffectCreator<S, A> {
    /// The name the creator was registered under.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The wrapped function.
    pub fn func(&self) -> &EffectFn<S, A> {
        &self.func
    }

    /// Create-effect payload calling the function with no arguments.
    pub fn call(&self) -> CreateEffect<S, A> {
        CreateEffect::new(self.func.clone())
    }

    /// Create-effect payload calling the function with `args`.
    pub fn call_with<I>(&self, args: I) -> CreateEffect<S, A>
    where
        I: IntoIterator,
        I::Item: Into<Value>,
    {
        create_effect(self.func.clone(), args)
    }
}

/// Turn named effect functions into named action creators.
pub fn create_effects<S, A, K, I>(effects: I) -> BTreeMap<String, EffectCreator<S, A>>
where
    I: IntoIterator<Item = (K, EffectFn<S, A>)>,
    K: Into<String>,
{
    effects
        .into_iter()
        .map(|(name, func)| {
            let name = name.into();
            (name.clone(), EffectCreator { name, func })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[derive(Clone, Debug, PartialEq)]
    enum TestAction {
        Ping,
    }

    impl Action for TestAction {
        fn name(&self) -> &'static str {
            "PING"
        }
    }

    type TestEffect = Effect<(), TestAction>;

    fn noop() -> EffectFn<(), TestAction> {
        EffectFn::new(|_cx, _args| async { Ok(Value::Null) })
    }

    #[test]
    fn test_classify_owned_kinds() {
        assert_eq!(put::<(), TestAction>(TestAction::Ping).kind(), Some(EffectKind::Put));
        assert_eq!(
            select::<(), TestAction, _>(|_, _| Ok(Value::Null), vec![]).kind(),
            Some(EffectKind::Select)
        );
        assert_eq!(take::<(), TestAction>("PING").kind(), Some(EffectKind::Take));
        assert_eq!(store::<(), TestAction>().kind(), Some(EffectKind::Store));
        assert_eq!(
            batch::<(), TestAction, _>([TestAction::Ping]).kind(),
            Some(EffectKind::Batch)
        );
    }

    #[test]
    fn test_native_kinds_are_unclassified() {
        let native: Vec<TestEffect> = vec![
            call(async { Ok(Value::Null) }),
            delay(Duration::from_millis(1)),
            all(vec![]),
            race(vec![]),
        ];
        let labels: Vec<_> = native.iter().map(Effect::label).collect();

        assert!(native.iter().all(|effect| effect.kind().is_none()));
        assert_eq!(labels, vec!["CALL", "DELAY", "ALL", "RACE"]);
    }

    #[test]
    fn test_create_effect_shape() {
        let func = noop();
        let effect = create_effect(func.clone(), ["one", "two"]);

        assert_eq!(
            effect,
            CreateEffect {
                func: func.clone(),
                args: vec![json!("one"), json!("two")],
                cancel: None,
            }
        );
        assert_ne!(effect, create_effect(noop(), ["one", "two"]));

        let envelope: Envelope<(), TestAction> = effect.clone().into();
        assert!(envelope.is_effect());
        assert_eq!(envelope.name(), EFFECT);
        assert!(envelope.action().is_none());
        assert_eq!(envelope.into_effect(), Some(effect));
    }

    #[test]
    fn test_envelope_from_action() {
        let envelope: Envelope<(), TestAction> = TestAction::Ping.into();
        assert_eq!(envelope, Envelope::Msg(Msg::Action(TestAction::Ping)));
        assert_eq!(envelope.name(), "PING");
        assert_eq!(envelope.action(), Some(&TestAction::Ping));
        assert!(envelope.clone().into_effect().is_none());
        assert_eq!(envelope.into_action(), Some(TestAction::Ping));
    }

    #[test]
    fn test_create_effects_builds_named_creators() {
        let one = noop();
        let two = noop();
        let creators = create_effects([("one", one.clone()), ("two", two.clone())]);

        assert_eq!(creators.len(), 2);
        assert_eq!(creators["one"].name(), "one");
        assert_eq!(creators["one"].call(), CreateEffect::new(one));
        assert_eq!(
            creators["two"].call_with([1, 2]),
            create_effect(two, [json!(1), json!(2)])
        );
    }

    #[test]
    fn test_selector_apply() {
        let selector = Selector::new(|state: &i64, args: &[Value]| {
            let offset = args.first().and_then(Value::as_i64).unwrap_or(0);
            Ok(json!(state + offset))
        });
        assert_eq!(selector.apply(&40, &[json!(2)]).unwrap(), json!(42));
    }
}
