//! World session: the selected world, its bunker, its clock, and the push
//! events and notification flags that go with them.
//!
//! A [`WorldSession`] is built once by the host application with its RPC
//! client and push connector, then driven with [`WorldSession::select_world`]
//! and [`WorldSession::disconnect`]. Everything else reads the exposed
//! observables:
//!
//! ```rust,ignore
//! let session = WorldSession::from_config(ClientConfig::from_env());
//! session.select_world(3).await?;
//!
//! let mut clock = session.watch_world_time();
//! while clock.changed().await.is_ok() {
//!     render_clock(*clock.borrow());
//! }
//! ```

mod commands;

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use bunker_shared::{
    broadcast_url, lobby_path, world_path, Broadcast, Bunker, ItemType, PushEvent, World,
};
use chrono::{NaiveDateTime, Utc};
use futures_channel::mpsc::UnboundedReceiver;
use futures_util::future::{BoxFuture, FutureExt, Shared};
use futures_util::StreamExt;
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::api_client::{call, no_args, ApiClient, RpcClient};
use crate::clock;
use crate::config::ClientConfig;
use crate::error::{EventHandlerError, SessionError};
use crate::ws::{ConnectionState, Connector, PushChannel, TungsteniteConnector};

/// The world currently being played.
///
/// World, bunker and clock are only set while a world is selected. Switching
/// worlds or disconnecting tears the previous session down (timers stopped,
/// push channel closed, cached state cleared) before anything new starts.
pub struct WorldSession {
    inner: Arc<SessionInner>,
}

struct SessionInner {
    rpc: Arc<dyn RpcClient>,
    connector: Arc<dyn Connector>,
    config: ClientConfig,
    world: watch::Sender<Option<World>>,
    bunker: watch::Sender<Option<Bunker>>,
    world_time: watch::Sender<Option<NaiveDateTime>>,
    message_notification: watch::Sender<bool>,
    radio_notification: watch::Sender<bool>,
    connection: watch::Sender<ConnectionState>,
    transcript: watch::Sender<Vec<Broadcast>>,
    expedition_done: broadcast::Sender<()>,
    active: Mutex<Active>,
}

type PendingSelect = Shared<BoxFuture<'static, Result<(), SessionError>>>;

/// Per-session resources. Replaced wholesale on every teardown.
#[derive(Default)]
struct Active {
    /// Incremented by every teardown; work started under an older epoch must
    /// not touch state.
    epoch: u64,
    /// World being selected or selected.
    world_id: Option<i32>,
    /// Outcome of the selection still in flight, shared by every caller
    /// asking for the same world.
    selecting: Option<PendingSelect>,
    channel: Option<PushChannel>,
    tasks: Vec<JoinHandle<()>>,
    radio_pulse: Option<JoinHandle<()>>,
    most_recent_unread: Option<String>,
    item_types: Option<Arc<HashMap<String, ItemType>>>,
}

impl WorldSession {
    pub fn new(rpc: Arc<dyn RpcClient>, connector: Arc<dyn Connector>, config: ClientConfig) -> Self {
        let (expedition_done, _) = broadcast::channel(16);
        Self {
            inner: Arc::new(SessionInner {
                rpc,
                connector,
                config,
                world: watch::channel(None).0,
                bunker: watch::channel(None).0,
                world_time: watch::channel(None).0,
                message_notification: watch::channel(false).0,
                radio_notification: watch::channel(false).0,
                connection: watch::channel(ConnectionState::Inactive).0,
                transcript: watch::channel(Vec::new()).0,
                expedition_done,
                active: Mutex::new(Active::default()),
            }),
        }
    }

    /// HTTP RPC against `config.api_url` and WebSocket push links.
    pub fn from_config(config: ClientConfig) -> Self {
        let rpc = ApiClient::new().with_base_url(config.api_url.clone());
        Self::new(Arc::new(rpc), Arc::new(TungsteniteConnector), config)
    }

    pub fn config(&self) -> &ClientConfig {
        &self.inner.config
    }

    pub(crate) fn rpc(&self) -> &dyn RpcClient {
        &*self.inner.rpc
    }

    /// Make `world_id` the active world.
    ///
    /// Does nothing if it already is. If it is still being selected, waits for
    /// that selection and returns its outcome. Otherwise the previous session
    /// is torn down first, then world and bunker are fetched, and only once
    /// both succeed is anything published and the push channel, clock and
    /// unread poll started. On failure the session is left with no world
    /// selected and the error is returned to every waiting caller.
    pub async fn select_world(&self, world_id: i32) -> Result<(), SessionError> {
        let pending = {
            let mut active = self.inner.active();
            if active.world_id == Some(world_id) {
                match &active.selecting {
                    Some(pending) => pending.clone(),
                    None => {
                        crate::log_debug!("World {} already selected", world_id);
                        return Ok(());
                    }
                }
            } else {
                self.inner.teardown(&mut active);
                active.world_id = Some(world_id);
                let pending = self
                    .inner
                    .clone()
                    .select(active.epoch, world_id)
                    .boxed()
                    .shared();
                active.selecting = Some(pending.clone());
                pending
            }
        };
        pending.await
    }

    /// Leave the current world: stop timers, close the push channel and clear
    /// cached state. Safe to call with no world selected.
    pub fn disconnect(&self) {
        let mut active = self.inner.active();
        if let Some(world_id) = active.world_id {
            crate::log_info!("Leaving world {}", world_id);
        }
        self.inner.teardown(&mut active);
    }

    /// Fetch the bunker again and publish it.
    pub async fn refresh_bunker(&self) -> Result<(), SessionError> {
        let epoch = self.inner.active().epoch;
        self.inner.refresh_bunker(epoch).await
    }

    /// Start over in the current world: leave it, join it again, and select
    /// the fresh bunker.
    pub async fn restart(&self) -> Result<(), SessionError> {
        let world_id = self.world_id()?;
        call::<()>(self.rpc(), &world_path(world_id, "leave"), no_args()).await?;
        call::<()>(
            self.rpc(),
            &lobby_path("join_world"),
            serde_json::json!({ "worldId": world_id }),
        )
        .await?;
        self.disconnect();
        self.select_world(world_id).await
    }

    /// Acknowledge the message notification locally, e.g. when the messages
    /// view is opened.
    pub fn clear_message_notification(&self) {
        set_if_changed(&self.inner.message_notification, false);
    }

    // --- Observables ---

    /// Id of the selected world.
    pub fn world_id(&self) -> Result<i32, SessionError> {
        self.inner.world_id()
    }

    pub fn world(&self) -> Option<World> {
        self.inner.world.borrow().clone()
    }

    pub fn bunker(&self) -> Option<Bunker> {
        self.inner.bunker.borrow().clone()
    }

    /// Simulated time, refreshed every clock interval.
    pub fn world_time(&self) -> Option<NaiveDateTime> {
        *self.inner.world_time.borrow()
    }

    pub fn message_notification(&self) -> bool {
        *self.inner.message_notification.borrow()
    }

    pub fn radio_notification(&self) -> bool {
        *self.inner.radio_notification.borrow()
    }

    pub fn connection_state(&self) -> ConnectionState {
        *self.inner.connection.borrow()
    }

    pub fn radio_connected(&self) -> bool {
        self.connection_state().is_open()
    }

    /// Broadcasts received since the world was selected, oldest first.
    pub fn transcript(&self) -> Vec<Broadcast> {
        self.inner.transcript.borrow().clone()
    }

    pub fn watch_world(&self) -> watch::Receiver<Option<World>> {
        self.inner.world.subscribe()
    }

    pub fn watch_bunker(&self) -> watch::Receiver<Option<Bunker>> {
        self.inner.bunker.subscribe()
    }

    pub fn watch_world_time(&self) -> watch::Receiver<Option<NaiveDateTime>> {
        self.inner.world_time.subscribe()
    }

    pub fn watch_message_notification(&self) -> watch::Receiver<bool> {
        self.inner.message_notification.subscribe()
    }

    pub fn watch_radio_notification(&self) -> watch::Receiver<bool> {
        self.inner.radio_notification.subscribe()
    }

    pub fn watch_connection(&self) -> watch::Receiver<ConnectionState> {
        self.inner.connection.subscribe()
    }

    pub fn watch_transcript(&self) -> watch::Receiver<Vec<Broadcast>> {
        self.inner.transcript.subscribe()
    }

    /// Fires once per resolved expedition.
    pub fn subscribe_expeditions(&self) -> broadcast::Receiver<()> {
        self.inner.expedition_done.subscribe()
    }

    // --- Clock helpers ---

    /// Age in whole world years of someone born on `date_of_birth`.
    pub fn age(&self, date_of_birth: chrono::NaiveDate) -> Option<i32> {
        self.world_time().map(|now| clock::age_at(date_of_birth, now))
    }

    /// Render a real server timestamp in world time.
    pub fn format_timestamp(&self, instant: chrono::DateTime<Utc>) -> Option<String> {
        self.world()
            .map(|world| clock::format_world_timestamp(&world, instant, Utc::now()))
    }
}

impl Drop for WorldSession {
    fn drop(&mut self) {
        self.disconnect();
    }
}

impl SessionInner {
    fn active(&self) -> MutexGuard<'_, Active> {
        self.active.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn is_current(&self, epoch: u64) -> bool {
        self.active().epoch == epoch
    }

    fn world_id(&self) -> Result<i32, SessionError> {
        self.world
            .borrow()
            .as_ref()
            .map(|world| world.id)
            .ok_or(SessionError::NoWorldSelected)
    }

    /// Stop everything belonging to the current session and clear its state.
    fn teardown(&self, active: &mut Active) {
        active.epoch += 1;
        active.world_id = None;
        active.selecting = None;
        for task in active.tasks.drain(..) {
            task.abort();
        }
        if let Some(pulse) = active.radio_pulse.take() {
            pulse.abort();
        }
        if let Some(channel) = active.channel.take() {
            channel.disconnect();
        }
        active.most_recent_unread = None;
        active.item_types = None;

        set_if_changed(&self.world, None);
        set_if_changed(&self.bunker, None);
        set_if_changed(&self.world_time, None);
        set_if_changed(&self.message_notification, false);
        set_if_changed(&self.radio_notification, false);
        set_if_changed(&self.connection, ConnectionState::Inactive);
        self.transcript.send_if_modified(|transcript| {
            let had_entries = !transcript.is_empty();
            transcript.clear();
            had_entries
        });
    }

    async fn select(self: Arc<Self>, epoch: u64, world_id: i32) -> Result<(), SessionError> {
        crate::log_info!("Selecting world {}", world_id);
        let result = match self.load(world_id).await {
            Ok((world, bunker)) => self.install(epoch, world, bunker),
            Err(e) => Err(e),
        };

        if let Err(e) = &result {
            crate::log_warn!("Could not select world {}: {}", world_id, e);
            let mut active = self.active();
            if active.epoch == epoch {
                self.teardown(&mut active);
            }
        }
        result
    }

    async fn load(&self, world_id: i32) -> Result<(World, Bunker), SessionError> {
        let world: World = call(&*self.rpc, &world_path(world_id, "get_world"), no_args()).await?;
        let bunker: Bunker = call(&*self.rpc, &world_path(world_id, "get_bunker"), no_args()).await?;
        Ok((world, bunker))
    }

    /// Publish a freshly loaded session and start its channel and timers.
    fn install(self: &Arc<Self>, epoch: u64, world: World, bunker: Bunker) -> Result<(), SessionError> {
        let url = broadcast_url(&self.config.websocket_url, &bunker.broadcast_id)
            .map_err(|e| SessionError::Endpoint(e.to_string()))?;

        let mut active = self.active();
        if active.epoch != epoch {
            return Err(SessionError::Superseded);
        }
        active.selecting = None;

        let channel = PushChannel::new(url.as_str(), self.connector.clone(), self.config.reconnect_delay());
        let events = channel.subscribe();
        let states = channel.watch_state();
        channel.open();

        let world_id = world.id;
        self.world_time
            .send_replace(Some(clock::world_time_at(&world, Utc::now())));
        self.world.send_replace(Some(world.clone()));
        self.bunker.send_replace(Some(bunker));

        active.tasks.push(tokio::spawn(self.clone().run_clock(epoch, world)));
        active.tasks.push(tokio::spawn(self.clone().watch_unread(epoch, world_id)));
        active.tasks.push(tokio::spawn(self.clone().pump_events(epoch, events)));
        active.tasks.push(tokio::spawn(self.clone().track_connection(epoch, states)));
        active.channel = Some(channel);

        crate::log_info!("World {} selected, push endpoint {}", world_id, url);
        Ok(())
    }

    async fn run_clock(self: Arc<Self>, epoch: u64, world: World) {
        let mut ticks = tokio::time::interval(self.config.clock_interval());
        ticks.set_missed_tick_behavior(MissedTickBehavior::Skip);
        // The first tick completes immediately; install already published.
        ticks.tick().await;
        loop {
            ticks.tick().await;
            let active = self.active();
            if active.epoch != epoch {
                break;
            }
            self.world_time
                .send_replace(Some(clock::world_time_at(&world, Utc::now())));
        }
    }

    async fn watch_unread(self: Arc<Self>, epoch: u64, world_id: i32) {
        let mut polls = tokio::time::interval(self.config.unread_poll_interval());
        polls.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            polls.tick().await;
            let path = world_path(world_id, "has_unread_messages");
            match call::<Option<String>>(&*self.rpc, &path, no_args()).await {
                Ok(marker) => self.apply_unread(epoch, marker),
                Err(e) => crate::log_warn!("Unread message check failed: {}", e),
            }
        }
    }

    /// Raise the flag for a marker not seen before, clear it when nothing is
    /// unread, and leave it alone for an already-seen marker.
    fn apply_unread(&self, epoch: u64, marker: Option<String>) {
        let mut active = self.active();
        if active.epoch != epoch {
            return;
        }
        match &marker {
            Some(latest) if active.most_recent_unread.as_ref() != Some(latest) => {
                set_if_changed(&self.message_notification, true);
            }
            None => set_if_changed(&self.message_notification, false),
            Some(_) => {}
        }
        active.most_recent_unread = marker;
    }

    async fn pump_events(self: Arc<Self>, epoch: u64, mut events: UnboundedReceiver<PushEvent>) {
        while let Some(event) = events.next().await {
            if let Err(e) = self.dispatch(epoch, event) {
                crate::log_error!("Error in event handler: {}", e);
            }
        }
        crate::log_debug!("Event stream for session {} ended", epoch);
    }

    async fn track_connection(self: Arc<Self>, epoch: u64, mut states: watch::Receiver<ConnectionState>) {
        loop {
            let state = *states.borrow_and_update();
            if !self.is_current(epoch) {
                break;
            }
            set_if_changed(&self.connection, state);
            if states.changed().await.is_err() {
                break;
            }
        }
    }

    /// Handle one push event. Each event is independent: a failure here is
    /// reported to the caller and must not affect the next event.
    fn dispatch(self: &Arc<Self>, epoch: u64, event: PushEvent) -> Result<(), EventHandlerError> {
        let mut active = self.active();
        if active.epoch != epoch {
            return Err(EventHandlerError::Stale {
                event_epoch: epoch,
                current_epoch: active.epoch,
            });
        }

        match event {
            PushEvent::Tick => {
                active.tasks.retain(|task| !task.is_finished());
                let inner = self.clone();
                active.tasks.push(tokio::spawn(async move {
                    if let Err(e) = inner.refresh_bunker(epoch).await {
                        crate::log_warn!("Bunker refresh after tick failed: {}", e);
                    }
                }));
            }
            PushEvent::ExpeditionResolved => {
                // No receivers is fine.
                let _ = self.expedition_done.send(());
            }
            PushEvent::MessageArrived => {
                set_if_changed(&self.message_notification, true);
            }
            PushEvent::Broadcast(broadcast) => {
                self.transcript.send_modify(|transcript| transcript.push(broadcast));
                set_if_changed(&self.radio_notification, true);
                if let Some(pulse) = active.radio_pulse.take() {
                    pulse.abort();
                }
                let inner = self.clone();
                let duration = self.config.radio_pulse();
                active.radio_pulse = Some(tokio::spawn(async move {
                    tokio::time::sleep(duration).await;
                    if inner.is_current(epoch) {
                        set_if_changed(&inner.radio_notification, false);
                    }
                }));
            }
        }
        Ok(())
    }

    async fn refresh_bunker(&self, epoch: u64) -> Result<(), SessionError> {
        if !self.is_current(epoch) {
            return Err(SessionError::Superseded);
        }
        let world_id = self.world_id()?;
        let bunker: Bunker = call(&*self.rpc, &world_path(world_id, "get_bunker"), no_args()).await?;

        let active = self.active();
        if active.epoch != epoch {
            return Err(SessionError::Superseded);
        }
        self.bunker.send_replace(Some(bunker));
        Ok(())
    }
}

/// Publish `value` only if it differs from the current one.
fn set_if_changed<T: PartialEq>(tx: &watch::Sender<T>, value: T) {
    tx.send_if_modified(|current| {
        if *current == value {
            false
        } else {
            *current = value;
            true
        }
    });
}
