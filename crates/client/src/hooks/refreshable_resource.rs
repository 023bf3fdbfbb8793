use std::future::Future;

use dioxus::prelude::*;

use super::use_watch;
use crate::resource::{LoadState, Resource};

/// A hook that creates a [`Resource`] and provides it through the context so
/// that child components can refresh it.
///
/// You can access it using `use_refresh_resource::<T, E>()`.
///
/// ### Example
///
/// ```rust,ignore
/// // In a component.
/// let items = use_refreshable_resource(move || {
///     let session = session.clone();
///     async move { session.get_items().await }
/// });
/// let state = use_resource_state(&items);
///
/// // Now in a child component, you can trigger a refresh of the resource.
/// let items = use_refresh_resource::<Vec<Item>, SessionError>();
///
/// rsx! {
///     button { onclick: move |_| items.refresh(), "Refresh data" }
/// }
/// ```
///
/// The fetch is spawned on tokio, so the host must run one.
pub fn use_refreshable_resource<T, E, F, Fut>(fetch: F) -> Resource<T, E>
where
    T: Send + Sync + 'static,
    E: Send + Sync + 'static,
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<T, E>> + Send + 'static,
{
    use_context_provider(move || Resource::new(fetch))
}

/// See `use_refreshable_resource`.
pub fn use_refresh_resource<T, E>() -> Resource<T, E>
where
    T: 'static,
    E: 'static,
{
    use_context::<Resource<T, E>>()
}

/// Load state of `resource` as a signal.
pub fn use_resource_state<T, E>(resource: &Resource<T, E>) -> Signal<LoadState<T, E>>
where
    T: Clone + Send + Sync + 'static,
    E: Clone + Send + Sync + 'static,
{
    let resource = resource.clone();
    use_watch(move || resource.subscribe())
}
