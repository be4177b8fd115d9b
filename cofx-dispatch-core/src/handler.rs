//! Effect handler: resolves the middleware-owned descriptors against a store

use futures::future::{self, FutureExt};

use crate::action::{Action, Msg};
use crate::effect::{Effect, Envelope};
use crate::error::EffectError;
use crate::middleware::{CofxStore, StoreHandle};
use crate::runner::{Intercepted, Interceptor, Outcome};

/// Interceptor wiring `put`, `select`, `take`, `store` and `batch` to a
/// [`CofxStore`]. Every other descriptor is passed back to the runner.
pub struct EffectHandler<S, A: Action> {
    store: CofxStore<S, A>,
}

impl<S, A> EffectHandler<S, A>
where
    S: Send + 'static,
    A: Action,
{
    pub fn new(store: CofxStore<S, A>) -> Self {
        Self { store }
    }
}

impl<S, A> Interceptor<S, A> for EffectHandler<S, A>
where
    S: Send + 'static,
    A: Action,
{
    fn intercept(&self, effect: Effect<S, A>) -> Intercepted<S, A> {
        if let Some(kind) = effect.kind() {
            tracing::trace!(effect = %kind, "handling effect");
        }

        match effect {
            Effect::Put(envelope) => {
                // A put of a create-effect envelope starts an independent run;
                // its task handle is not awaited.
                let _ = self.store.dispatch(envelope);
                done()
            }
            Effect::Select { selector, args } => {
                let result = self.store.with_state(|state| selector.apply(state, &args));
                Intercepted::Resolved(future::ready(result.map(Outcome::Value)).boxed())
            }
            Effect::Take(action_type) => {
                let rx = self.store.waiters().wait(action_type.clone());
                Intercepted::Resolved(
                    async move {
                        rx.await
                            .map(Outcome::Action)
                            .map_err(|_| EffectError::WaiterDropped(action_type))
                    }
                    .boxed(),
                )
            }
            Effect::Store => {
                let handle = StoreHandle::new(self.store.clone());
                Intercepted::Resolved(future::ready(Ok(Outcome::Store(handle))).boxed())
            }
            Effect::Batch(envelopes) => {
                dispatch_batch(&self.store, envelopes);
                done()
            }
            other => Intercepted::Passed(other),
        }
    }
}

fn done<S, A>() -> Intercepted<S, A>
where
    S: Send + 'static,
    A: Action,
{
    Intercepted::Resolved(future::ready(Ok(Outcome::Done)).boxed())
}

/// Two-phase batch: plain messages go out together as one bundle, then each
/// create-effect envelope is dispatched on its own, in input order.
fn dispatch_batch<S, A>(store: &CofxStore<S, A>, envelopes: Vec<Envelope<S, A>>)
where
    S: Send + 'static,
    A: Action,
{
    let mut plain = Vec::new();
    let mut effects = Vec::new();
    for envelope in envelopes {
        match envelope {
            Envelope::Msg(msg) => plain.push(msg),
            Envelope::Effect(effect) => effects.push(effect),
        }
    }

    tracing::debug!(plain = plain.len(), effects = effects.len(), "dispatching batch");

    if !plain.is_empty() {
        store.dispatch(Msg::BatchActions(plain));
    }
    for effect in effects {
        let _ = store.dispatch(effect);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::effect::{self, create_effect, EffectFn};
    use crate::runner::Cx;
    use crate::testing::RecordingMiddleware;
    use serde_json::{json, Value};
    use std::sync::Arc;

    #[derive(Clone, Debug, PartialEq)]
    enum TestAction {
        Push(i32),
        Loaded,
    }

    impl Action for TestAction {
        fn name(&self) -> &'static str {
            match self {
                TestAction::Push(_) => "PUSH",
                TestAction::Loaded => "LOADED",
            }
        }
    }

    fn reducer(state: &mut Vec<i32>, action: TestAction) -> bool {
        match action {
            TestAction::Push(n) => {
                state.push(n);
                true
            }
            TestAction::Loaded => false,
        }
    }

    fn resolve(
        handler: &EffectHandler<Vec<i32>, TestAction>,
        effect: Effect<Vec<i32>, TestAction>,
    ) -> crate::runner::StepFuture<Vec<i32>, TestAction> {
        match handler.intercept(effect) {
            Intercepted::Resolved(step) => step,
            Intercepted::Passed(effect) => panic!("passed through: {}", effect.label()),
        }
    }

    #[tokio::test]
    async fn test_put_dispatches_synchronously() {
        let store = CofxStore::new(Vec::new(), reducer);
        let handler = EffectHandler::new(store.clone());

        let step = resolve(&handler, effect::put(TestAction::Push(1)));
        // State changed before the step is awaited.
        assert_eq!(store.get_state(), vec![1]);
        assert!(matches!(step.await, Ok(Outcome::Done)));
    }

    #[tokio::test]
    async fn test_select_reads_current_state() {
        let store = CofxStore::new(vec![1, 2, 3], reducer);
        let handler = EffectHandler::new(store);

        let step = resolve(
            &handler,
            effect::select(
                |state: &Vec<i32>, args: &[Value]| {
                    let idx = args[0].as_u64().unwrap_or(0) as usize;
                    Ok(json!(state[idx]))
                },
                vec![json!(2)],
            ),
        );
        assert_eq!(step.await.unwrap().into_value().unwrap(), json!(3));
    }

    #[tokio::test]
    async fn test_select_error_propagates() {
        let store = CofxStore::new(Vec::new(), reducer);
        let handler = EffectHandler::new(store);

        let step = resolve(
            &handler,
            effect::select(|_: &Vec<i32>, _: &[Value]| Err(EffectError::message("bad selector")), vec![]),
        );
        assert_eq!(step.await.unwrap_err(), EffectError::message("bad selector"));
    }

    #[tokio::test]
    async fn test_take_waits_for_next_dispatch() {
        let store = CofxStore::new(Vec::new(), reducer);
        let handler = EffectHandler::new(store.clone());

        let step = resolve(&handler, effect::take("LOADED"));
        assert!(store.has_waiters("LOADED"));

        store.dispatch(TestAction::Loaded);
        let taken = step.await.unwrap().into_action().unwrap();
        assert_eq!(taken, Envelope::Msg(Msg::Action(TestAction::Loaded)));
        assert!(!store.has_waiters("LOADED"));
    }

    #[tokio::test]
    async fn test_store_hands_back_accessors() {
        let store = CofxStore::new(vec![9], reducer);
        let handler = EffectHandler::new(store.clone());

        let handle = resolve(&handler, effect::store()).await.unwrap().into_store().unwrap();
        handle.dispatch(TestAction::Push(10));

        assert_eq!(handle.get_state(), vec![9, 10]);
        assert_eq!(store.get_state(), vec![9, 10]);
    }

    #[tokio::test]
    async fn test_native_effects_pass_through() {
        let store = CofxStore::new(Vec::new(), reducer);
        let handler = EffectHandler::new(store);

        let passed = handler.intercept(effect::delay(std::time::Duration::from_millis(1)));
        assert!(matches!(passed, Intercepted::Passed(Effect::Delay(_))));
    }

    #[tokio::test]
    async fn test_batch_splits_plain_and_effects() {
        let recorder = RecordingMiddleware::new();
        let store = CofxStore::builder(Vec::new(), reducer)
            .middleware(recorder.clone())
            .build();
        let handler = EffectHandler::new(store.clone());

        let pushes = EffectFn::new(|cx: Cx<Vec<i32>, TestAction>, args: Vec<Value>| async move {
            for arg in args {
                cx.put(TestAction::Push(arg.as_i64().unwrap_or(0) as i32)).await?;
            }
            Ok(Value::Null)
        });

        let step = resolve(
            &handler,
            effect::batch::<_, TestAction, Vec<Envelope<Vec<i32>, TestAction>>>(vec![
                TestAction::Push(1).into(),
                create_effect(pushes, [3]).into(),
                TestAction::Push(2).into(),
            ]),
        );
        assert!(matches!(step.await, Ok(Outcome::Done)));

        // Plain actions landed together, before the effect had a chance to run.
        assert_eq!(store.get_state(), vec![1, 2]);
        assert_eq!(recorder.names(), vec![crate::action::BATCH_ACTIONS]);

        while store.get_state().len() < 3 {
            tokio::task::yield_now().await;
        }
        assert_eq!(store.get_state(), vec![1, 2, 3]);
        assert_eq!(recorder.names(), vec![crate::action::BATCH_ACTIONS, "PUSH"]);
    }

    #[tokio::test]
    async fn test_handler_is_usable_as_trait_object() {
        let store = CofxStore::new(Vec::new(), reducer);
        let interceptor: Arc<dyn Interceptor<Vec<i32>, TestAction>> =
            Arc::new(EffectHandler::new(store.clone()));
        let cx = Cx::new(interceptor);

        cx.put(TestAction::Push(5)).await.unwrap();
        let total = cx
            .select_as::<i32, _>(|state: &Vec<i32>, _: &[Value]| Ok(json!(state.iter().sum::<i32>())), vec![])
            .await
            .unwrap();
        assert_eq!(total, 5);
    }
}
