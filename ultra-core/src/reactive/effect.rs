//! Effect Runner
//!
//! An Effect runs an action once immediately and again every time one of its
//! sources fires. Subscriptions are explicit: the sources are passed in,
//! nothing is inferred from reads.
//!
//! # Cleanup
//!
//! The action may return a [`Teardown`] for that specific run (for example,
//! cancelling a timer the run started). The previous run's teardown is
//! executed before the next run, and the latest one is executed when the
//! effect is disposed. Disposal then unsubscribes from every source.
//!
//! # Async Actions
//!
//! [`Effect::run_async`] accepts an action returning a future. Each run is
//! spawned onto the ambient tokio runtime and its teardown is captured once
//! the future resolves. Runs are NOT serialized: a source firing while an
//! earlier future is still pending starts a second, overlapping run and
//! does not cancel the first. Guarding against overlap is the caller's job.

use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, warn};

use super::cleanup::{guard_with, Teardown};
use super::subscriber::{Source, Unsubscribe};

/// Counter for generating unique effect IDs.
static EFFECT_ID_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Generate a new unique effect ID.
fn next_effect_id() -> u64 {
    EFFECT_ID_COUNTER.fetch_add(1, Ordering::Relaxed)
}

type Action = Box<dyn Fn() -> Option<Teardown> + Send + Sync>;

struct EffectState {
    id: u64,
    action: Action,
    /// Teardown returned by the most recent run.
    last: Mutex<Option<Teardown>>,
    disposed: AtomicBool,
    run_count: AtomicUsize,
    subscriptions: Mutex<Vec<Unsubscribe>>,
}

impl EffectState {
    fn execute(&self) {
        if self.disposed.load(Ordering::SeqCst) {
            return;
        }

        let previous = self.last.lock().take();
        if let Some(previous) = previous {
            previous.run();
        }

        let teardown = guard_with("effect action", || (self.action)()).flatten();
        self.run_count.fetch_add(1, Ordering::SeqCst);

        if self.disposed.load(Ordering::SeqCst) {
            // Disposed from inside the action; nothing will run this later.
            if let Some(teardown) = teardown {
                teardown.run();
            }
            return;
        }
        *self.last.lock() = teardown;
    }

    fn dispose(&self) {
        if self.disposed.swap(true, Ordering::SeqCst) {
            return;
        }

        let last = self.last.lock().take();
        if let Some(last) = last {
            last.run();
        }

        let subscriptions = std::mem::take(&mut *self.subscriptions.lock());
        for handle in &subscriptions {
            handle.call();
        }
        debug!(effect = self.id, sources = subscriptions.len(), "effect disposed");
    }
}

/// A side-effecting action re-run whenever one of its sources fires.
///
/// # Example
///
/// ```rust
/// use ultra_core::reactive::{Effect, ReactiveCell};
///
/// let count = ReactiveCell::new(0);
/// let seen = count.clone();
/// let effect = Effect::run(move || {
///     println!("count = {}", seen.get());
///     None
/// }, &[&count]);
///
/// count.set(1); // re-runs
/// effect.dispose();
/// count.set(2); // no longer observed
/// ```
#[derive(Clone)]
pub struct Effect {
    state: Arc<EffectState>,
}

impl Effect {
    /// Run `action` now and on every notification from `sources`.
    pub fn run<F>(action: F, sources: &[&dyn Source]) -> Self
    where
        F: Fn() -> Option<Teardown> + Send + Sync + 'static,
    {
        let state = Arc::new(EffectState {
            id: next_effect_id(),
            action: Box::new(action),
            last: Mutex::new(None),
            disposed: AtomicBool::new(false),
            run_count: AtomicUsize::new(0),
            subscriptions: Mutex::new(Vec::with_capacity(sources.len())),
        });

        state.execute();

        for source in sources {
            let target = Arc::clone(&state);
            let handle = source.watch(Arc::new(move || target.execute()));
            state.subscriptions.lock().push(handle);
        }

        Self { state }
    }

    /// Like [`Effect::run`], for actions that return a future.
    ///
    /// Must be called within a tokio runtime; runs triggered outside one are
    /// skipped with a warning.
    pub fn run_async<F, Fut>(action: F, sources: &[&dyn Source]) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Option<Teardown>> + Send + 'static,
    {
        Self::run(
            move || {
                let handle = match tokio::runtime::Handle::try_current() {
                    Ok(handle) => handle,
                    Err(_) => {
                        warn!("async effect triggered outside a tokio runtime; run skipped");
                        return None;
                    }
                };

                let slot = Arc::new(Mutex::new(PendingTeardown::Pending));
                let future = action();
                let resolved = Arc::clone(&slot);
                handle.spawn(async move {
                    let outcome = tokio::spawn(future).await;
                    match outcome {
                        Ok(teardown) => PendingTeardown::resolve(&resolved, teardown),
                        Err(err) => warn!(error = %err, "async effect action failed"),
                    }
                });

                Some(Teardown::new(move || PendingTeardown::tear_down(&slot)))
            },
            sources,
        )
    }

    /// Re-run the action by hand.
    pub fn execute(&self) {
        self.state.execute();
    }

    /// Run the latest per-run teardown, then unsubscribe from every source.
    ///
    /// Idempotent.
    pub fn dispose(&self) {
        self.state.dispose();
    }

    pub fn is_disposed(&self) -> bool {
        self.state.disposed.load(Ordering::SeqCst)
    }

    /// Number of times the action has run.
    pub fn run_count(&self) -> usize {
        self.state.run_count.load(Ordering::SeqCst)
    }

    /// Number of live source subscriptions.
    pub fn source_count(&self) -> usize {
        self.state.subscriptions.lock().len()
    }

    pub fn id(&self) -> u64 {
        self.state.id
    }

    /// Convert into the combined teardown handle.
    pub fn into_teardown(self) -> Teardown {
        Teardown::new(move || self.dispose())
    }
}

impl From<Effect> for Teardown {
    fn from(effect: Effect) -> Self {
        effect.into_teardown()
    }
}

impl std::fmt::Debug for Effect {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Effect")
            .field("id", &self.state.id)
            .field("run_count", &self.run_count())
            .field("source_count", &self.source_count())
            .field("disposed", &self.is_disposed())
            .finish()
    }
}

/// Run `action` now and whenever a source fires; returns the combined teardown.
pub fn effect<F>(action: F, sources: &[&dyn Source]) -> Teardown
where
    F: Fn() -> Option<Teardown> + Send + Sync + 'static,
{
    Effect::run(action, sources).into_teardown()
}

/// Teardown of one async run, which may resolve after it was asked to run.
enum PendingTeardown {
    Pending,
    Ready(Teardown),
    TornDown,
}

impl PendingTeardown {
    fn resolve(slot: &Mutex<PendingTeardown>, teardown: Option<Teardown>) {
        let mut state = slot.lock();
        match std::mem::replace(&mut *state, PendingTeardown::TornDown) {
            PendingTeardown::TornDown => {
                drop(state);
                // Torn down before the future resolved: run it now.
                if let Some(teardown) = teardown {
                    teardown.run();
                }
            }
            _ => {
                *state = match teardown {
                    Some(teardown) => PendingTeardown::Ready(teardown),
                    None => PendingTeardown::Pending,
                };
            }
        }
    }

    fn tear_down(slot: &Mutex<PendingTeardown>) {
        let previous = std::mem::replace(&mut *slot.lock(), PendingTeardown::TornDown);
        if let PendingTeardown::Ready(teardown) = previous {
            teardown.run();
        }
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reactive::ReactiveCell;
    use std::sync::atomic::AtomicI32;

    fn counter() -> Arc<AtomicI32> {
        Arc::new(AtomicI32::new(0))
    }

    #[test]
    fn effect_runs_on_creation() {
        let runs = counter();
        let r = runs.clone();
        let effect = Effect::run(
            move || {
                r.fetch_add(1, Ordering::SeqCst);
                None
            },
            &[],
        );

        assert_eq!(runs.load(Ordering::SeqCst), 1);
        assert_eq!(effect.run_count(), 1);
    }

    #[test]
    fn effect_reruns_on_any_source() {
        let a = ReactiveCell::new(0);
        let b = ReactiveCell::new(String::new());
        let runs = counter();
        let r = runs.clone();

        let effect = Effect::run(
            move || {
                r.fetch_add(1, Ordering::SeqCst);
                None
            },
            &[&a, &b],
        );

        a.set(1);
        b.set("x".into());
        assert_eq!(runs.load(Ordering::SeqCst), 3);
        assert_eq!(effect.source_count(), 2);
    }

    #[test]
    fn previous_teardown_runs_before_next_run() {
        let cell = ReactiveCell::new(0);
        let log = Arc::new(Mutex::new(Vec::new()));
        let l = log.clone();
        let c = cell.clone();

        let effect = Effect::run(
            move || {
                let n = c.get();
                l.lock().push(format!("run {n}"));
                let l = l.clone();
                Some(Teardown::new(move || l.lock().push(format!("teardown {n}"))))
            },
            &[&cell],
        );

        cell.set(1);
        effect.dispose();

        assert_eq!(
            *log.lock(),
            vec!["run 0", "teardown 0", "run 1", "teardown 1"]
        );
    }

    #[test]
    fn disposal_unsubscribes() {
        let cell = ReactiveCell::new(0);
        let runs = counter();
        let r = runs.clone();

        let teardown = effect(
            move || {
                r.fetch_add(1, Ordering::SeqCst);
                None
            },
            &[&cell],
        );

        teardown.run();
        cell.set(1);

        assert_eq!(runs.load(Ordering::SeqCst), 1);
        assert_eq!(cell.subscriber_count(), 0);
    }

    #[test]
    fn dispose_is_idempotent() {
        let teardowns = counter();
        let t = teardowns.clone();
        let effect = Effect::run(
            move || {
                let t = t.clone();
                Some(Teardown::new(move || {
                    t.fetch_add(1, Ordering::SeqCst);
                }))
            },
            &[],
        );

        effect.dispose();
        effect.dispose();
        effect.execute();

        assert!(effect.is_disposed());
        assert_eq!(teardowns.load(Ordering::SeqCst), 1);
        assert_eq!(effect.run_count(), 1);
    }

    #[test]
    fn panicking_action_is_isolated() {
        let cell = ReactiveCell::new(0);
        let c = cell.clone();
        let effect = Effect::run(
            move || {
                if c.get() == 1 {
                    panic!("action failure");
                }
                None
            },
            &[&cell],
        );

        cell.set(1);
        cell.set(2);
        assert_eq!(effect.run_count(), 3);
    }

    #[tokio::test]
    async fn async_teardown_captured_after_resolution() {
        let cell = ReactiveCell::new(0);
        let teardowns = counter();
        let t = teardowns.clone();

        let effect = Effect::run_async(
            move || {
                let t = t.clone();
                async move {
                    tokio::task::yield_now().await;
                    Some(Teardown::new(move || {
                        t.fetch_add(1, Ordering::SeqCst);
                    }))
                }
            },
            &[&cell],
        );

        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        effect.dispose();
        assert_eq!(teardowns.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn async_teardown_after_early_dispose_still_runs() {
        let teardowns = counter();
        let t = teardowns.clone();
        let (tx, rx) = tokio::sync::oneshot::channel::<()>();
        let rx = Arc::new(Mutex::new(Some(rx)));

        let effect = Effect::run_async(
            move || {
                let t = t.clone();
                let rx = rx.lock().take();
                async move {
                    if let Some(rx) = rx {
                        let _ = rx.await;
                    }
                    Some(Teardown::new(move || {
                        t.fetch_add(1, Ordering::SeqCst);
                    }))
                }
            },
            &[],
        );

        effect.dispose();
        assert_eq!(teardowns.load(Ordering::SeqCst), 0);

        tx.send(()).unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        assert_eq!(teardowns.load(Ordering::SeqCst), 1);
    }
}
