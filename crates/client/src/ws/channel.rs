//! Push channel with connection state and auto-reconnect.
//!
//! A [`PushChannel`] owns at most one live link to the server's event
//! endpoint. After an unplanned close it re-arms a single flat-delay
//! reconnect timer, forever, until [`PushChannel::disconnect`] moves it into
//! a terminal state that ignores further close events.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use bunker_shared::PushEvent;
use futures_channel::mpsc::{unbounded, UnboundedReceiver, UnboundedSender};
use futures_util::future::{BoxFuture, FutureExt, Shared};
use futures_util::StreamExt;
use tokio::sync::{oneshot, watch};
use tokio::task::JoinHandle;

use super::connector::{Connector, FrameStream};
use crate::error::TransportError;

/// Connection state for a push channel
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Inactive,
    Connecting,
    Open,
    ReconnectScheduled,
}

impl ConnectionState {
    pub fn is_open(&self) -> bool {
        matches!(self, ConnectionState::Open)
    }

    pub fn is_connecting(&self) -> bool {
        matches!(
            self,
            ConnectionState::Connecting | ConnectionState::ReconnectScheduled
        )
    }
}

type PendingConnect = Shared<BoxFuture<'static, Result<(), TransportError>>>;

/// A managed push connection to one broadcast endpoint.
pub struct PushChannel {
    inner: Arc<Inner>,
}

struct Inner {
    url: String,
    connector: Arc<dyn Connector>,
    reconnect_delay: Duration,
    state: watch::Sender<ConnectionState>,
    core: Mutex<Core>,
}

struct Core {
    /// Cleared by `disconnect`; once false the channel never connects again.
    active: bool,
    /// Bumped by `disconnect` so late completions from old tasks are ignored.
    generation: u64,
    pending: Option<PendingConnect>,
    attempt: Option<JoinHandle<()>>,
    reader: Option<JoinHandle<()>>,
    reconnect: Option<JoinHandle<()>>,
    subscribers: Vec<UnboundedSender<PushEvent>>,
}

impl PushChannel {
    /// Create an idle channel. Nothing is opened until [`PushChannel::connect`]
    /// or [`PushChannel::open`] is called.
    pub fn new(url: impl Into<String>, connector: Arc<dyn Connector>, reconnect_delay: Duration) -> Self {
        let (state, _) = watch::channel(ConnectionState::Inactive);
        Self {
            inner: Arc::new(Inner {
                url: url.into(),
                connector,
                reconnect_delay,
                state,
                core: Mutex::new(Core {
                    active: true,
                    generation: 0,
                    pending: None,
                    attempt: None,
                    reader: None,
                    reconnect: None,
                    subscribers: Vec::new(),
                }),
            }),
        }
    }

    pub fn url(&self) -> &str {
        &self.inner.url
    }

    /// Open the link, resolving once the handshake completes.
    ///
    /// Idempotent: while an attempt is in flight every caller shares its
    /// outcome, and an already open channel resolves immediately. A failed
    /// handshake still arms the reconnect timer.
    pub async fn connect(&self) -> Result<(), TransportError> {
        Inner::connect(&self.inner).await
    }

    /// Start connecting in the background without waiting for the outcome.
    pub fn open(&self) {
        if let Err(e) = Inner::begin_connect(&self.inner) {
            crate::log_debug!("Not opening {}: {}", self.inner.url, e);
        }
    }

    /// Close the active link, cancel any pending reconnect, detach all
    /// subscribers and stop reconnecting for good. Safe to call repeatedly.
    pub fn disconnect(&self) {
        let mut core = self.inner.core();
        if core.active {
            crate::log_info!("Disconnecting push channel {}", self.inner.url);
        }
        core.active = false;
        core.generation += 1;
        for task in [core.attempt.take(), core.reader.take(), core.reconnect.take()]
            .into_iter()
            .flatten()
        {
            task.abort();
        }
        core.pending = None;
        core.subscribers.clear();
        self.inner.state.send_replace(ConnectionState::Inactive);
    }

    /// Receive every decoded event from now on, in network arrival order.
    /// Dropping the receiver detaches it.
    pub fn subscribe(&self) -> UnboundedReceiver<PushEvent> {
        let (tx, rx) = unbounded();
        let mut core = self.inner.core();
        if core.active {
            core.subscribers.push(tx);
        }
        rx
    }

    pub fn state(&self) -> ConnectionState {
        *self.inner.state.borrow()
    }

    /// Observe state transitions.
    pub fn watch_state(&self) -> watch::Receiver<ConnectionState> {
        self.inner.state.subscribe()
    }

    pub fn is_connected(&self) -> bool {
        self.state().is_open()
    }

    /// Whether `disconnect` has not been called yet.
    pub fn is_active(&self) -> bool {
        self.inner.core().active
    }
}

impl Drop for PushChannel {
    fn drop(&mut self) {
        self.disconnect();
    }
}

impl Inner {
    fn core(&self) -> MutexGuard<'_, Core> {
        self.core.lock().unwrap_or_else(PoisonError::into_inner)
    }

    async fn connect(self: &Arc<Self>) -> Result<(), TransportError> {
        match Self::begin_connect(self)? {
            Some(pending) => pending.await,
            None => Ok(()),
        }
    }

    /// Returns the in-flight attempt to wait on, or `None` if already open.
    fn begin_connect(self: &Arc<Self>) -> Result<Option<PendingConnect>, TransportError> {
        let mut core = self.core();
        if !core.active {
            return Err(TransportError::Disconnected);
        }
        if self.state.borrow().is_open() {
            return Ok(None);
        }
        if let Some(pending) = &core.pending {
            return Ok(Some(pending.clone()));
        }

        let (done_tx, done_rx) = oneshot::channel();
        let pending: PendingConnect = async move {
            done_rx
                .await
                .unwrap_or(Err(TransportError::Cancelled))
        }
        .boxed()
        .shared();

        self.state.send_replace(ConnectionState::Connecting);
        core.pending = Some(pending.clone());
        core.attempt = Some(tokio::spawn(self.clone().attempt(core.generation, done_tx)));
        Ok(Some(pending))
    }

    async fn attempt(
        self: Arc<Self>,
        generation: u64,
        done: oneshot::Sender<Result<(), TransportError>>,
    ) {
        crate::log_info!("Connecting to {}", self.url);
        let result = self.connector.connect(&self.url).await;

        let mut core = self.core();
        if !core.active || core.generation != generation {
            let _ = done.send(Err(TransportError::Cancelled));
            return;
        }
        core.attempt = None;

        match result {
            Ok(frames) => {
                crate::log_info!("Push channel connected to {}", self.url);
                core.pending = None;
                self.state.send_replace(ConnectionState::Open);
                core.reader = Some(tokio::spawn(self.clone().read_frames(generation, frames)));
                drop(core);
                let _ = done.send(Ok(()));
            }
            Err(e) => {
                crate::log_error!("Push channel error for {}: {}", self.url, e);
                drop(core);
                let _ = done.send(Err(e));
                self.handle_close(generation);
            }
        }
    }

    async fn read_frames(self: Arc<Self>, generation: u64, mut frames: FrameStream) {
        while let Some(frame) = frames.next().await {
            match frame {
                Ok(text) => match PushEvent::from_frame(&text) {
                    Ok(event) => self.deliver(event),
                    Err(e) => crate::log_error!("Failed to parse push frame {:?}: {}", text, e),
                },
                Err(e) => {
                    crate::log_error!("Push channel read error: {}", e);
                    break;
                }
            }
        }
        self.handle_close(generation);
    }

    fn deliver(&self, event: PushEvent) {
        crate::log_debug!("Push event received: {:?}", event);
        self.core()
            .subscribers
            .retain(|tx| tx.unbounded_send(event.clone()).is_ok());
    }

    /// Close handler for the current link. Arms the reconnect timer unless the
    /// channel was disconnected or a timer is already pending.
    fn handle_close(self: &Arc<Self>, generation: u64) {
        let mut core = self.core();
        if !core.active || core.generation != generation {
            return;
        }
        crate::log_info!("Push channel to {} closed", self.url);
        core.pending = None;
        core.reader = None;
        if core.reconnect.is_none() {
            crate::log_info!(
                "Reconnecting to {} in {}ms",
                self.url,
                self.reconnect_delay.as_millis()
            );
            core.reconnect = Some(tokio::spawn(self.clone().reconnect_after_delay(generation)));
        }
        self.state.send_replace(ConnectionState::ReconnectScheduled);
    }

    async fn reconnect_after_delay(self: Arc<Self>, generation: u64) {
        tokio::time::sleep(self.reconnect_delay).await;
        {
            let mut core = self.core();
            if !core.active || core.generation != generation {
                return;
            }
            core.reconnect = None;
        }
        if let Err(e) = Self::connect(&self).await {
            crate::log_warn!("Could not connect to {}: {}. Retrying...", self.url, e);
            // A failed handshake re-arms through `handle_close`; this only
            // covers attempts that ended without reaching it.
            self.handle_close(generation);
        }
    }
}
