// The bot facade: connection lifecycle, outbound emits, and read-only
// accessors over the mirrored world.

use crate::domain::entity::Entity;
use crate::frameworks::config;
use crate::interface_adapters::clients::game_data::GameData;
use crate::interface_adapters::framing;
use crate::interface_adapters::host::route_host_message;
use crate::interface_adapters::{handlers, net};
use crate::use_cases::types::{BotEvents, CharacterSession, HostMessage};
use crate::use_cases::{simulation, store::WorldStore};
use serde_json::{Value, json};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, PoisonError, RwLock};
use tokio::sync::futures::Notified;
use tokio::sync::{Notify, mpsc};
use tracing::{Instrument, error, info_span, warn};

pub(crate) struct BotInner {
    pub(crate) session: CharacterSession,
    pub(crate) store: WorldStore,
    pub(crate) data: GameData,
    pub(crate) events: Arc<dyn BotEvents>,
    /// Present while a socket task is draining it; emits before `connect`
    /// are logged and dropped.
    outbound: RwLock<Option<mpsc::Sender<String>>>,
    host: RwLock<Option<mpsc::Sender<HostMessage>>>,
    pub(crate) shutdown: Notify,
    running: AtomicBool,
}

/// One logged-in character: a cheap handle over the shared bot state.
///
/// Cloning shares the same connection and world mirror. Accessors read the
/// own-character record under the entity mutex and may be called from any
/// context.
#[derive(Clone)]
pub struct Bot {
    pub(crate) inner: Arc<BotInner>,
}

impl Bot {
    pub fn new(
        session: CharacterSession,
        data: GameData,
        events: impl BotEvents + 'static,
    ) -> Self {
        Self {
            inner: Arc::new(BotInner {
                session,
                store: WorldStore::new(),
                data,
                events: Arc::new(events),
                outbound: RwLock::new(None),
                host: RwLock::new(None),
                shutdown: Notify::new(),
                running: AtomicBool::new(false),
            }),
        }
    }

    // -- lifecycle --------------------------------------------------------

    /// Opens the socket and starts the network and tick contexts. The call
    /// returns immediately; `welcome`/`start` handling runs the login
    /// handshake and eventually fires [`BotEvents::on_connect`].
    pub fn connect(&self) {
        if self.inner.running.swap(true, Ordering::SeqCst) {
            warn!(name = %self.inner.session.character_name, "connect on a running bot ignored");
            return;
        }

        let router = Arc::new(handlers::game_router(self.clone()));
        let (outbound_tx, outbound_rx) = mpsc::channel(config::OUTBOUND_CHANNEL_CAPACITY);
        *self.outbound_slot() = Some(outbound_tx);

        // One span per bot so every log line carries the character name.
        let span = info_span!("bot", name = %self.inner.session.character_name);
        tokio::spawn(net::socket_task(self.clone(), router, outbound_rx).instrument(span.clone()));
        tokio::spawn(simulation::run(self.clone()).instrument(span));
    }

    /// Stops both contexts and closes the socket. Scheduled re-login timers
    /// are cancelled by the same signal.
    pub fn stop(&self) {
        self.inner.running.store(false, Ordering::SeqCst);
        self.inner.shutdown.notify_waiters();
        *self.outbound_slot() = None;
    }

    pub fn is_running(&self) -> bool {
        self.inner.running.load(Ordering::SeqCst)
    }

    pub(crate) fn shutdown_signal(&self) -> Notified<'_> {
        self.inner.shutdown.notified()
    }

    // -- outbound ---------------------------------------------------------

    /// Encodes and enqueues one event frame. Frames emitted before the
    /// socket opens (or after it is full) are logged and dropped.
    pub fn emit(&self, event: &str, data: Value) {
        let frame = framing::encode_event(event, &data);
        let guard = self
            .inner
            .outbound
            .read()
            .unwrap_or_else(PoisonError::into_inner);
        match guard.as_ref() {
            Some(tx) => {
                if let Err(e) = tx.try_send(frame) {
                    warn!(event, error = %e, "dropping outbound event");
                }
            }
            None => {
                error!(event, "emit on a socket that has not opened yet");
            }
        }
    }

    /// Re-sends the `auth` event with the session credentials. Used on
    /// `welcome` and by the `game_error` re-login timer.
    pub fn login(&self) {
        let session = &self.inner.session;
        self.emit(
            "auth",
            json!({
                "user": session.user_id,
                "character": session.character_id,
                "auth": session.auth_token,
                "width": 1920,
                "height": 1080,
                "scale": 2,
                "no_html": true,
                "no_graphics": true,
            }),
        );
    }

    // -- host process bridge ----------------------------------------------

    /// Installs the channel the host process listens on for service requests.
    pub fn attach_host(&self, to_host: mpsc::Sender<HostMessage>) {
        *self
            .inner
            .host
            .write()
            .unwrap_or_else(PoisonError::into_inner) = Some(to_host);
    }

    /// Sends an opaque service request to the host process, if one is
    /// attached.
    pub fn send_service_request(&self, target: &str, payload: Value) -> bool {
        let message = HostMessage {
            command: "service_request".to_string(),
            requester: self.inner.session.character_name.clone(),
            target: target.to_string(),
            payload,
        };
        let guard = self.inner.host.read().unwrap_or_else(PoisonError::into_inner);
        match guard.as_ref() {
            Some(tx) => tx.try_send(message).is_ok(),
            None => {
                warn!(service = target, "service request with no host attached");
                false
            }
        }
    }

    /// Entry point for the host process to inject inter-bot notices.
    pub fn deliver_host_message(&self, message: HostMessage) {
        route_host_message(self, message);
    }

    // -- accessors --------------------------------------------------------

    pub fn x(&self) -> f64 {
        self.inner.store.with_character(|c| c.x())
    }

    pub fn y(&self) -> f64 {
        self.inner.store.with_character(|c| c.y())
    }

    pub fn speed(&self) -> f64 {
        self.inner.store.with_character(|c| c.speed())
    }

    pub fn hp(&self) -> i64 {
        self.character_int("hp")
    }

    pub fn max_hp(&self) -> i64 {
        self.character_int("max_hp")
    }

    pub fn mp(&self) -> i64 {
        self.character_int("mp")
    }

    pub fn max_mp(&self) -> i64 {
        self.character_int("max_mp")
    }

    pub fn gold(&self) -> i64 {
        self.character_int("gold")
    }

    pub fn range(&self) -> i64 {
        self.character_int("range")
    }

    pub fn map(&self) -> String {
        self.character_text("map")
    }

    pub fn map_id(&self) -> i64 {
        self.character_int("m")
    }

    pub fn ctype(&self) -> String {
        self.character_text("ctype")
    }

    /// The own-entity id; falls back to the session name before the first
    /// snapshot arrives.
    pub fn id(&self) -> String {
        self.inner.store.with_character(|c| {
            c.id()
                .unwrap_or(&self.inner.session.character_name)
                .to_string()
        })
    }

    pub fn is_alive(&self) -> bool {
        self.inner.store.with_character(|c| !c.rip())
    }

    pub fn is_moving(&self) -> bool {
        self.inner.store.with_character(|c| c.moving())
    }

    pub fn party(&self) -> Value {
        self.inner.store.party()
    }

    /// A copy of one live entity, if the mirror knows it.
    pub fn entity(&self, id: &str) -> Option<Entity> {
        self.inner.store.entity(id)
    }

    pub fn entity_count(&self) -> usize {
        self.inner.store.entity_count()
    }

    pub fn chest_ids(&self) -> Vec<String> {
        self.inner.store.chest_ids()
    }

    pub fn store(&self) -> &WorldStore {
        &self.inner.store
    }

    pub fn session(&self) -> &CharacterSession {
        &self.inner.session
    }

    pub(crate) fn game_data(&self) -> &GameData {
        &self.inner.data
    }

    pub(crate) fn events(&self) -> &Arc<dyn BotEvents> {
        &self.inner.events
    }

    fn character_int(&self, key: &str) -> i64 {
        self.inner
            .store
            .with_character(|c| c.int(key).unwrap_or_default())
    }

    fn character_text(&self, key: &str) -> String {
        self.inner
            .store
            .with_character(|c| c.text(key).unwrap_or_default().to_string())
    }

    fn outbound_slot(
        &self,
    ) -> std::sync::RwLockWriteGuard<'_, Option<mpsc::Sender<String>>> {
        self.inner
            .outbound
            .write()
            .unwrap_or_else(PoisonError::into_inner)
    }
}
