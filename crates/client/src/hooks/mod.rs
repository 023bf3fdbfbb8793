//! Dioxus hooks over the session observables.
//!
//! NOTE: The core never depends on a UI framework. These hooks only mirror
//! `watch` channels into signals so components re-render on change; all
//! state still lives in [`WorldSession`](crate::session::WorldSession) and
//! [`Resource`](crate::resource::Resource).

mod refreshable_resource;

use dioxus::prelude::*;
use tokio::sync::watch;

use crate::ws::ConnectionState;
use crate::WorldSession;

pub use refreshable_resource::{use_refresh_resource, use_refreshable_resource, use_resource_state};

/// Mirror a `watch` channel into a signal.
///
/// `subscribe` runs once, on first render. The signal is updated every time
/// the channel changes for as long as the component is mounted.
///
/// ```rust,ignore
/// let flag = use_watch(|| session.watch_message_notification());
/// rsx! { if flag() { span { class: "unread", "●" } } }
/// ```
pub fn use_watch<T>(subscribe: impl FnOnce() -> watch::Receiver<T>) -> Signal<T>
where
    T: Clone + 'static,
{
    let receiver = use_hook(subscribe);
    let initial = receiver.clone();
    let value = use_signal(move || initial.borrow().clone());
    use_future(move || {
        let mut receiver = receiver.clone();
        let mut value = value;
        async move {
            while receiver.changed().await.is_ok() {
                let latest = receiver.borrow_and_update().clone();
                value.set(latest);
            }
        }
    });
    value
}

/// Connection state of the session's push channel.
pub fn use_connection_state(session: &WorldSession) -> Signal<ConnectionState> {
    use_watch(|| session.watch_connection())
}
