//! Correlation ids scoped to the current thread or task.
//!
//! The active id lives in thread-local storage. Synchronous code activates it
//! with [`CorrelationGuard`] or [`correlation_scope`]; async code wraps the
//! future with [`CorrelationExt`], which installs the task's id around every
//! `poll` so the value follows the task across worker threads.
//!
//! # Example
//!
//! ```
//! use trading212_client::observability::{CorrelationGuard, CorrelationId, current_correlation_id};
//!
//! {
//!     let _outer = CorrelationGuard::enter(Some(CorrelationId::new("A")));
//!     {
//!         let _inner = CorrelationGuard::enter(Some(CorrelationId::new("B")));
//!         assert_eq!(current_correlation_id().unwrap().as_str(), "B");
//!     }
//!     assert_eq!(current_correlation_id().unwrap().as_str(), "A");
//! }
//! assert!(current_correlation_id().is_none());
//! ```

use std::cell::RefCell;
use std::fmt;
use std::future::Future;
use std::marker::PhantomData;
use std::pin::Pin;
use std::task::{Context, Poll};

use uuid::Uuid;

thread_local! {
    static CURRENT: RefCell<Option<CorrelationId>> = const { RefCell::new(None) };
}

/// Opaque identifier tying together all log lines of one logical operation.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CorrelationId(String);

impl CorrelationId {
    /// Wrap an existing identifier.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Generate a random identifier (UUID v4).
    #[must_use]
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Identifier text.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CorrelationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for CorrelationId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for CorrelationId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// Swap the thread's current id, returning the previous one.
///
/// Silently does nothing while the thread-local is being torn down.
fn replace_current(value: Option<CorrelationId>) -> Option<CorrelationId> {
    CURRENT
        .try_with(|current| current.replace(value))
        .ok()
        .flatten()
}

/// The correlation id active on this thread or task, if any.
#[must_use]
pub fn current_correlation_id() -> Option<CorrelationId> {
    CURRENT
        .try_with(|current| current.borrow().clone())
        .ok()
        .flatten()
}

/// Set the current id. Nothing restores the previous value.
pub fn set_correlation_id(id: impl Into<CorrelationId>) {
    replace_current(Some(id.into()));
}

/// Clear the current id.
pub fn clear_correlation_id() {
    replace_current(None);
}

/// Activates a correlation id until dropped, then restores the previous one.
///
/// Restoration also happens on early returns and panics. The guard is tied to
/// the thread it was created on; use [`CorrelationExt`] across `.await`s.
#[must_use = "the correlation id is deactivated as soon as the guard is dropped"]
#[derive(Debug)]
pub struct CorrelationGuard {
    id: CorrelationId,
    previous: Option<CorrelationId>,
    _not_send: PhantomData<*const ()>,
}

impl CorrelationGuard {
    /// Activate `id`, or a freshly generated one when `None`.
    pub fn enter(id: Option<CorrelationId>) -> Self {
        let id = id.unwrap_or_else(CorrelationId::generate);
        let previous = replace_current(Some(id.clone()));
        Self {
            id,
            previous,
            _not_send: PhantomData,
        }
    }

    /// The id this guard activated.
    #[must_use]
    pub const fn id(&self) -> &CorrelationId {
        &self.id
    }
}

impl Drop for CorrelationGuard {
    fn drop(&mut self) {
        replace_current(self.previous.take());
    }
}

/// Run `f` with a correlation id active, restoring the previous id afterwards.
pub fn correlation_scope<R>(id: Option<CorrelationId>, f: impl FnOnce(&CorrelationId) -> R) -> R {
    let guard = CorrelationGuard::enter(id);
    f(guard.id())
}

/// Future carrying its own correlation id.
///
/// Created through [`CorrelationExt`].
#[must_use = "futures do nothing unless polled"]
pub struct Correlated<F> {
    inner: Pin<Box<F>>,
    id: Option<CorrelationId>,
}

impl<F> fmt::Debug for Correlated<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Correlated").field("id", &self.id).finish_non_exhaustive()
    }
}

impl<F> Correlated<F> {
    fn new(inner: F, id: Option<CorrelationId>) -> Self {
        Self {
            inner: Box::pin(inner),
            id,
        }
    }
}

/// Installs the task's id for one poll and saves it back afterwards, so
/// `set`/`clear` inside the task persist across polls.
struct PollScope<'a> {
    task_id: &'a mut Option<CorrelationId>,
    previous: Option<CorrelationId>,
}

impl<'a> PollScope<'a> {
    fn enter(task_id: &'a mut Option<CorrelationId>) -> Self {
        let previous = replace_current(task_id.take());
        Self { task_id, previous }
    }
}

impl Drop for PollScope<'_> {
    fn drop(&mut self) {
        *self.task_id = replace_current(self.previous.take());
    }
}

impl<F: Future> Future for Correlated<F> {
    type Output = F::Output;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();
        let _scope = PollScope::enter(&mut this.id);
        this.inner.as_mut().poll(cx)
    }
}

/// Attach a correlation id to a future.
pub trait CorrelationExt: Future + Sized {
    /// Run the future with `id` active.
    fn with_correlation(self, id: impl Into<CorrelationId>) -> Correlated<Self> {
        Correlated::new(self, Some(id.into()))
    }

    /// Run the future with a newly generated id active.
    fn in_new_correlation(self) -> Correlated<Self> {
        Correlated::new(self, Some(CorrelationId::generate()))
    }

    /// Carry the caller's current id (if any) into the future, e.g. before
    /// `tokio::spawn`.
    fn with_current_correlation(self) -> Correlated<Self> {
        Correlated::new(self, current_correlation_id())
    }
}

impl<F: Future> CorrelationExt for F {}

#[cfg(test)]
mod tests {
    use super::*;

    fn current() -> Option<String> {
        current_correlation_id().map(|id| id.as_str().to_string())
    }

    #[test]
    fn nested_scopes_restore_outer_value() {
        clear_correlation_id();
        {
            let _a = CorrelationGuard::enter(Some("A".into()));
            assert_eq!(current().as_deref(), Some("A"));
            {
                let _b = CorrelationGuard::enter(Some("B".into()));
                assert_eq!(current().as_deref(), Some("B"));
            }
            assert_eq!(current().as_deref(), Some("A"));
        }
        assert_eq!(current(), None);
    }

    #[test]
    fn inner_scope_error_still_restores() {
        clear_correlation_id();
        correlation_scope(Some("A".into()), |_| {
            let result: Result<(), String> =
                correlation_scope(Some("B".into()), |_| Err("boom".to_string()));
            assert!(result.is_err());
            assert_eq!(current().as_deref(), Some("A"));
        });
        assert_eq!(current(), None);
    }

    #[test]
    fn inner_scope_panic_still_restores() {
        clear_correlation_id();
        let _a = CorrelationGuard::enter(Some("A".into()));
        let outcome = std::panic::catch_unwind(|| {
            let _b = CorrelationGuard::enter(Some("B".into()));
            panic!("inner failure");
        });
        assert!(outcome.is_err());
        assert_eq!(current().as_deref(), Some("A"));
    }

    #[test]
    fn scope_without_id_generates_one() {
        clear_correlation_id();
        let generated = correlation_scope(None, |id| {
            assert_eq!(current_correlation_id().as_ref(), Some(id));
            id.clone()
        });
        assert_eq!(generated.as_str().len(), 36);
        assert_eq!(current(), None);
    }

    #[test]
    fn generated_ids_are_unique() {
        assert_ne!(CorrelationId::generate(), CorrelationId::generate());
    }

    #[test]
    fn direct_accessors() {
        clear_correlation_id();
        set_correlation_id("manual");
        assert_eq!(current().as_deref(), Some("manual"));
        set_correlation_id(String::from("again"));
        assert_eq!(current().as_deref(), Some("again"));
        clear_correlation_id();
        assert_eq!(current(), None);
    }

    #[test]
    fn guard_restores_manual_value() {
        clear_correlation_id();
        set_correlation_id("manual");
        {
            let _guard = CorrelationGuard::enter(Some("scoped".into()));
        }
        assert_eq!(current().as_deref(), Some("manual"));
        clear_correlation_id();
    }

    #[test]
    fn threads_do_not_share_ids() {
        let _main = CorrelationGuard::enter(Some("main".into()));
        let seen = std::thread::spawn(|| {
            let before = current_correlation_id();
            let _worker = CorrelationGuard::enter(Some("worker".into()));
            (before, current_correlation_id())
        })
        .join()
        .unwrap();
        assert_eq!(seen.0, None);
        assert_eq!(seen.1.unwrap().as_str(), "worker");
        assert_eq!(current().as_deref(), Some("main"));
    }

    #[tokio::test]
    async fn correlated_future_sees_its_id_and_restores_caller() {
        clear_correlation_id();
        let seen = async {
            tokio::task::yield_now().await;
            current()
        }
        .with_correlation("task-1")
        .await;
        assert_eq!(seen.as_deref(), Some("task-1"));
        assert_eq!(current(), None);
    }

    #[tokio::test]
    async fn set_inside_task_persists_across_polls() {
        let seen = async {
            set_correlation_id("changed");
            tokio::task::yield_now().await;
            current()
        }
        .with_correlation("original")
        .await;
        assert_eq!(seen.as_deref(), Some("changed"));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn tasks_on_multi_thread_runtime_are_isolated() {
        let handles: Vec<_> = (0..16)
            .map(|i| {
                let id = format!("task-{i}");
                tokio::spawn(
                    async move {
                        let mut seen = Vec::new();
                        for _ in 0..5 {
                            tokio::task::yield_now().await;
                            seen.push(current());
                        }
                        (id, seen)
                    }
                    .with_correlation(format!("task-{i}")),
                )
            })
            .collect();

        for handle in handles {
            let (id, seen) = handle.await.unwrap();
            assert!(seen.iter().all(|value| value.as_deref() == Some(id.as_str())));
        }
    }

    #[tokio::test]
    async fn current_correlation_is_propagated_into_spawned_task() {
        let _guard = CorrelationGuard::enter(Some("parent".into()));
        let seen = tokio::spawn(async { current() }.with_current_correlation())
            .await
            .unwrap();
        assert_eq!(seen.as_deref(), Some("parent"));
    }
}
