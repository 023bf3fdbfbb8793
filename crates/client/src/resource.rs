//! Observable, retryable three-phase load state around one async fetch.

use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use futures_util::future::{BoxFuture, FutureExt};
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::sync::watch;
use tokio::task::JoinHandle;

/// Load phase of a [`Resource`]. The phases are mutually exclusive.
#[derive(Debug, Clone, PartialEq)]
pub enum LoadState<T, E> {
    Loading,
    Success(T),
    Failure(E),
}

impl<T, E> LoadState<T, E> {
    pub fn is_loading(&self) -> bool {
        matches!(self, LoadState::Loading)
    }

    pub fn data(&self) -> Option<&T> {
        match self {
            LoadState::Success(data) => Some(data),
            _ => None,
        }
    }

    pub fn error(&self) -> Option<&E> {
        match self {
            LoadState::Failure(error) => Some(error),
            _ => None,
        }
    }
}

type Fetch<T, E> = Arc<dyn Fn() -> BoxFuture<'static, Result<T, E>> + Send + Sync>;

/// Wraps a fetch so that observers see `Loading → Success | Failure`, can
/// retry with [`Resource::refresh`], and can be re-notified after an in-place
/// edit of loaded data.
///
/// ```rust,ignore
/// let items = Resource::new(move || {
///     let session = session.clone();
///     async move { session.get_items().await }
/// });
/// // after spending one item locally:
/// items.update(|items| items[0].quantity -= 1);
/// ```
///
/// Overlapping refreshes are resolved by issue order: a completion belonging
/// to anything but the most recent `refresh` is discarded.
pub struct Resource<T, E> {
    inner: Arc<ResourceInner<T, E>>,
}

struct ResourceInner<T, E> {
    fetch: Fetch<T, E>,
    state: watch::Sender<LoadState<T, E>>,
    generation: Mutex<u64>,
}

impl<T, E> Clone for Resource<T, E> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<T, E> Resource<T, E>
where
    T: Send + Sync + 'static,
    E: Send + Sync + 'static,
{
    /// Create the resource and start the first fetch. Must be called inside a
    /// tokio runtime.
    pub fn new<F, Fut>(fetch: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
    {
        let (state, _) = watch::channel(LoadState::Loading);
        let resource = Self {
            inner: Arc::new(ResourceInner {
                fetch: Arc::new(move || fetch().boxed()),
                state,
                generation: Mutex::new(0),
            }),
        };
        resource.refresh();
        resource
    }

    /// Discard the current outcome and fetch again from `Loading`.
    pub fn refresh(&self) {
        let generation = {
            let mut current = self.inner.generation();
            *current += 1;
            self.inner.state.send_replace(LoadState::Loading);
            *current
        };
        let pending = (self.inner.fetch)();
        let inner = self.inner.clone();
        tokio::spawn(async move {
            let outcome = pending.await;
            let current = inner.generation();
            if *current != generation {
                crate::log_debug!("Discarding stale fetch {} (current {})", generation, *current);
                return;
            }
            inner.state.send_replace(match outcome {
                Ok(data) => LoadState::Success(data),
                Err(error) => LoadState::Failure(error),
            });
        });
    }

    /// Make observers re-read the held value without refetching.
    pub fn notify(&self) {
        self.inner.state.send_modify(|_| {});
    }

    /// Edit loaded data in place and notify observers. Returns `false` (and
    /// does nothing) unless the resource is in `Success`.
    pub fn update(&self, edit: impl FnOnce(&mut T)) -> bool {
        self.inner.state.send_if_modified(|state| match state {
            LoadState::Success(data) => {
                edit(data);
                true
            }
            _ => false,
        })
    }

    /// Refresh every time `trigger` fires, until its sender is gone. Abort the
    /// returned handle to stop early.
    pub fn refresh_on(&self, mut trigger: broadcast::Receiver<()>) -> JoinHandle<()> {
        let resource = self.clone();
        tokio::spawn(async move {
            loop {
                match trigger.recv().await {
                    Ok(()) | Err(RecvError::Lagged(_)) => resource.refresh(),
                    Err(RecvError::Closed) => break,
                }
            }
        })
    }

    pub fn subscribe(&self) -> watch::Receiver<LoadState<T, E>> {
        self.inner.state.subscribe()
    }

    pub fn is_loading(&self) -> bool {
        self.inner.state.borrow().is_loading()
    }
}

impl<T, E> Resource<T, E>
where
    T: Clone + Send + Sync + 'static,
    E: Clone + Send + Sync + 'static,
{
    pub fn state(&self) -> LoadState<T, E> {
        self.inner.state.borrow().clone()
    }

    pub fn data(&self) -> Option<T> {
        self.inner.state.borrow().data().cloned()
    }

    /// Wait until the current fetch has settled.
    pub async fn loaded(&self) -> LoadState<T, E> {
        let mut rx = self.subscribe();
        let settled = match rx.wait_for(|state| !state.is_loading()).await {
            Ok(state) => state.clone(),
            Err(_) => self.state(),
        };
        settled
    }
}

impl<T, E> ResourceInner<T, E> {
    fn generation(&self) -> MutexGuard<'_, u64> {
        self.generation.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
