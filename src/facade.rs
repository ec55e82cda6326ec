//! Data access facade.
//!
//! [`DataFacade`] gives every entity the same operation surface regardless of
//! which store answers. Each operation makes one attempt against the remote API;
//! if that attempt fails for any reason (connection, timeout, non-2xx, body that
//! does not decode) the same operation is served by the [`FallbackProvider`]
//! instead. There is no retry loop. Every result is tagged with its
//! [`DataSource`] so callers can tell the two apart.
//!
//! The remote attempt is skipped entirely when the client is configured
//! `offline_only`, when the persisted mock-mode flag is set, or, under
//! [`FallbackPolicy::Sticky`], while the current session was established locally.
//!
//! Sign-in is the one exception to "any failure falls back": when the server
//! answers and refuses the credentials (401 or another 4xx), the refusal is
//! returned as [`FacadeError::Validation`] and no local session is started.

use chrono::{DateTime, Utc};
use log::{debug, info, warn};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value as JsonValue};
use uuid::Uuid;

use crate::config::{ClientConfig, FallbackPolicy};
use crate::error::{FacadeError, GatewayError};
use crate::fallback::{active_at, recent_of, Collection, FallbackProvider};
use crate::gateway::{HttpTransport, Method, RemoteGateway, Transport};
use crate::local_store::LocalStore;
use crate::models::{Alert, EntityKind, Event, Location, NewUser, Reading, Sensor, Timestamped, User};
use crate::session::{self, AuthStatus, Session, SessionSource, MOCK_MODE_KEY, USER_KEY};

pub const DASHBOARD_READINGS: usize = 5;
pub const DASHBOARD_EVENTS: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataSource {
    Remote,
    Fallback,
}

/// A result together with the store that produced it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sourced<T> {
    pub source: DataSource,
    pub data: T,
}

impl<T> Sourced<T> {
    pub fn remote(data: T) -> Self {
        Self { source: DataSource::Remote, data }
    }

    pub fn fallback(data: T) -> Self {
        Self { source: DataSource::Fallback, data }
    }

    pub fn is_remote(&self) -> bool {
        self.source == DataSource::Remote
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Sourced<U> {
        Sourced { source: self.source, data: f(self.data) }
    }
}

/// What the dashboard screen shows.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DashboardSnapshot {
    /// `Remote` only when every part came from the remote API.
    pub source: DataSource,
    pub recent_readings: Vec<Reading>,
    pub active_alerts: Vec<Alert>,
    pub recent_events: Vec<Event>,
}

#[derive(Debug, Deserialize)]
struct AuthPayload {
    token: String,
    #[serde(alias = "usuario")]
    user: User,
}

pub struct DataFacade {
    config: ClientConfig,
    store: LocalStore,
    gateway: RemoteGateway,
    fallback: FallbackProvider,
}

impl DataFacade {
    /// Opens the local store under `config.data_dir` and talks HTTP to `config.api_base_url`.
    pub fn open(config: ClientConfig) -> Result<Self, FacadeError> {
        config.validate()?;
        let transport = HttpTransport::new(&config.api_base_url, config.timeout())?;
        Self::with_transport(config, Box::new(transport))
    }

    pub fn with_transport(config: ClientConfig, transport: Box<dyn Transport>) -> Result<Self, FacadeError> {
        config.validate()?;
        let store = LocalStore::open(&config.data_dir)?;

        let mut facade = Self {
            config,
            store,
            gateway: RemoteGateway::new(transport),
            fallback: FallbackProvider::seeded(Utc::now()),
        };
        if facade.config.persist_fallback {
            facade.restore_fallback();
        }

        info!(
            "Data facade ready (api: {}, policy: {:?}, offline_only: {})",
            facade.config.api_base_url, facade.config.fallback_policy, facade.config.offline_only
        );
        Ok(facade)
    }

    pub fn store(&self) -> &LocalStore {
        &self.store
    }

    pub fn fallback(&self) -> &FallbackProvider {
        &self.fallback
    }

    /// Whether the next operation will try the remote API at all.
    pub fn remote_enabled(&self) -> Result<bool, FacadeError> {
        if self.config.offline_only || self.is_offline_mode()? {
            return Ok(false);
        }
        if self.config.fallback_policy == FallbackPolicy::Sticky
            && session::stored_source(&self.store)? == Some(SessionSource::Local)
        {
            return Ok(false);
        }
        Ok(true)
    }

    pub fn is_offline_mode(&self) -> Result<bool, FacadeError> {
        Ok(self.store.get(MOCK_MODE_KEY)?.as_deref() == Some("true"))
    }

    pub fn set_offline_mode(&mut self, enabled: bool) -> Result<(), FacadeError> {
        self.store.set(MOCK_MODE_KEY, if enabled { "true" } else { "false" })?;
        info!("Offline mode {}", if enabled { "enabled" } else { "disabled" });
        Ok(())
    }

    // ---- entities ----

    pub fn list<E: Collection>(&self) -> Result<Sourced<Vec<E>>, FacadeError> {
        if let Some(rows) = self.call_remote::<Vec<E>>(Method::Get, &E::KIND.path(), None)? {
            return Ok(Sourced::remote(rows));
        }
        Ok(Sourced::fallback(self.fallback.list::<E>()))
    }

    /// Not-found is `data: None`, never an error.
    pub fn get_by_id<E: Collection>(&self, id: i64) -> Result<Sourced<Option<E>>, FacadeError> {
        if let Some(found) = self.call_remote::<Option<E>>(Method::Get, &E::KIND.item_path(id), None)? {
            return Ok(Sourced::remote(found));
        }
        Ok(Sourced::fallback(self.fallback.get::<E>(id)))
    }

    pub fn create<E: Collection>(&mut self, draft: E::Draft) -> Result<Sourced<E>, FacadeError> {
        let now = Utc::now();
        E::from_draft(0, draft.clone(), now).validate()?;

        let body = serde_json::to_value(&draft)?;
        if let Some(created) = self.call_remote::<E>(Method::Post, &E::KIND.path(), Some(body))? {
            return Ok(Sourced::remote(created));
        }

        let created = self.fallback.create::<E>(draft, now)?;
        self.persist_rows::<E>()?;
        Ok(Sourced::fallback(created))
    }

    /// Shallow merge of `patch` over the stored record; `data: None` when `id` is unknown.
    pub fn update<E: Collection>(&mut self, id: i64, patch: &JsonValue) -> Result<Sourced<Option<E>>, FacadeError> {
        if !patch.is_object() {
            return Err(FacadeError::validation("update payload must be a JSON object"));
        }

        if let Some(updated) = self.call_remote::<E>(Method::Put, &E::KIND.item_path(id), Some(patch.clone()))? {
            return Ok(Sourced::remote(Some(updated)));
        }

        let updated = self.fallback.update::<E>(id, patch)?;
        if updated.is_some() {
            self.persist_rows::<E>()?;
        }
        Ok(Sourced::fallback(updated))
    }

    /// `data: true` exactly when a record with `id` existed and was removed.
    pub fn delete<E: Collection>(&mut self, id: i64) -> Result<Sourced<bool>, FacadeError> {
        if self
            .call_remote::<JsonValue>(Method::Delete, &E::KIND.item_path(id), None)?
            .is_some()
        {
            return Ok(Sourced::remote(true));
        }

        let removed = self.fallback.delete::<E>(id);
        if removed {
            self.persist_rows::<E>()?;
        }
        Ok(Sourced::fallback(removed))
    }

    /// At most `n` records, newest first.
    pub fn recent<E: Collection + Timestamped>(&self, n: usize) -> Result<Sourced<Vec<E>>, FacadeError> {
        Ok(self.list::<E>()?.map(|rows| recent_of(rows, n)))
    }

    pub fn active_alerts(&self) -> Result<Sourced<Vec<Alert>>, FacadeError> {
        self.active_alerts_at(Utc::now())
    }

    /// Alerts created less than 24 hours before `now`.
    pub fn active_alerts_at(&self, now: DateTime<Utc>) -> Result<Sourced<Vec<Alert>>, FacadeError> {
        Ok(self.list::<Alert>()?.map(|rows| active_at(rows, now)))
    }

    pub fn dashboard(&self) -> Result<DashboardSnapshot, FacadeError> {
        self.dashboard_at(Utc::now())
    }

    pub fn dashboard_at(&self, now: DateTime<Utc>) -> Result<DashboardSnapshot, FacadeError> {
        let readings = self.recent::<Reading>(DASHBOARD_READINGS)?;
        let alerts = self.active_alerts_at(now)?;
        let events = self.recent::<Event>(DASHBOARD_EVENTS)?;

        let all_remote = readings.is_remote() && alerts.is_remote() && events.is_remote();
        Ok(DashboardSnapshot {
            source: if all_remote { DataSource::Remote } else { DataSource::Fallback },
            recent_readings: readings.data,
            active_alerts: alerts.data,
            recent_events: events.data,
        })
    }

    // ---- session ----

    pub fn login(&mut self, email: &str, senha: &str) -> Result<Sourced<Session>, FacadeError> {
        session::validate_credentials(email, senha)?;

        let body = json!({ "email": email, "senha": senha });
        if let Some(auth) = self.call_auth("/auth/login", body)? {
            let session = session::persist(&self.store, &auth.user, &auth.token, SessionSource::Remote)?;
            info!("Signed in {} against remote API", session.email);
            return Ok(Sourced::remote(session));
        }

        let user = match self.fallback.find_user_by_email(email) {
            Some(user) => user,
            None => self.provision_local_user(NewUser {
                nome: session::display_name_from_email(email),
                email: email.trim().to_string(),
                cpf: String::new(),
                localizacao: String::new(),
            })?,
        };
        let session = self.start_local_session(&user)?;
        Ok(Sourced::fallback(session))
    }

    pub fn register(&mut self, nome: &str, email: &str, senha: &str) -> Result<Sourced<Session>, FacadeError> {
        session::validate_registration(nome, email, senha)?;

        let body = json!({ "nome": nome, "email": email, "senha": senha });
        if let Some(auth) = self.call_auth("/auth/register", body)? {
            let session = session::persist(&self.store, &auth.user, &auth.token, SessionSource::Remote)?;
            info!("Registered {} against remote API", session.email);
            return Ok(Sourced::remote(session));
        }

        if self.fallback.find_user_by_email(email).is_some() {
            return Err(FacadeError::validation("email is already registered"));
        }
        let user = self.provision_local_user(NewUser {
            nome: nome.trim().to_string(),
            email: email.trim().to_string(),
            cpf: String::new(),
            localizacao: String::new(),
        })?;
        let session = self.start_local_session(&user)?;
        Ok(Sourced::fallback(session))
    }

    /// Always clears the local session; the remote logout is best-effort.
    pub fn logout(&mut self) -> Result<(), FacadeError> {
        if let Some((current, _)) = session::load(&self.store)? {
            if current.source == SessionSource::Remote && self.remote_enabled()? {
                if let Err(e) = self.gateway.request(&self.store, Method::Post, "/auth/logout", None) {
                    debug!("Remote logout failed, clearing locally anyway: {e}");
                }
            }
        }

        session::clear(&self.store)?;
        info!("Signed out");
        Ok(())
    }

    /// Re-checks the persisted session, e.g. on app start.
    ///
    /// Remote sessions are verified with `GET /auth/me`: a 401 signs out, any other
    /// failure keeps the cached session.
    pub fn check_auth_status(&self) -> Result<AuthStatus, FacadeError> {
        let Some((cached, _)) = session::load(&self.store)? else {
            return Ok(AuthStatus::signed_out());
        };
        if cached.source == SessionSource::Local || !self.remote_enabled()? {
            return Ok(AuthStatus::signed_in(cached));
        }

        match self.gateway.request(&self.store, Method::Get, "/auth/me", None) {
            Ok(data) => {
                let fresh = data
                    .get("user")
                    .or_else(|| data.get("usuario"))
                    .cloned()
                    .and_then(|raw| serde_json::from_value::<User>(raw).ok());
                match fresh {
                    Some(user) => {
                        self.store.set_json(USER_KEY, &user)?;
                        Ok(AuthStatus::signed_in(Session::new(&user, cached.auth_token, SessionSource::Remote)))
                    }
                    None => Ok(AuthStatus::signed_in(cached)),
                }
            }
            Err(GatewayError::Unauthorized(_)) => Ok(AuthStatus::signed_out()),
            Err(e) => {
                warn!("Could not verify session, keeping cached one: {e}");
                Ok(AuthStatus::signed_in(cached))
            }
        }
    }

    pub fn current_session(&self) -> Result<Option<Session>, FacadeError> {
        Ok(session::load(&self.store)?.map(|(current, _)| current))
    }

    /// Wipes the local store (session, flags, persisted collections) and reseeds the fallback.
    pub fn reset_local_data(&mut self) -> Result<usize, FacadeError> {
        let cleared = self.store.clear()?;
        self.fallback = FallbackProvider::seeded(Utc::now());
        Ok(cleared)
    }

    // ---- internals ----

    /// One remote attempt. `None` means "serve this from the fallback".
    fn call_remote<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        body: Option<JsonValue>,
    ) -> Result<Option<T>, FacadeError> {
        match self.try_remote(method, path, body)? {
            Some(Ok(data)) => Ok(decode_reply(path, data)),
            Some(Err(e)) => {
                warn!("Remote call {method:?} {path} failed, falling back: {e}");
                Ok(None)
            }
            None => Ok(None),
        }
    }

    /// Like [`Self::call_remote`], except that a refusal from a reachable server is final.
    fn call_auth(&self, path: &str, body: JsonValue) -> Result<Option<AuthPayload>, FacadeError> {
        match self.try_remote(Method::Post, path, Some(body))? {
            Some(Ok(data)) => Ok(decode_reply(path, data)),
            Some(Err(GatewayError::Unauthorized(message))) => Err(FacadeError::Validation(message)),
            Some(Err(GatewayError::Status { status, message })) if (400..500).contains(&status) => {
                Err(FacadeError::Validation(message))
            }
            Some(Err(e)) => {
                warn!("Remote sign-in on {path} failed, falling back: {e}");
                Ok(None)
            }
            None => Ok(None),
        }
    }

    /// `None` when the remote is disabled, otherwise the raw outcome of one request.
    fn try_remote(
        &self,
        method: Method,
        path: &str,
        body: Option<JsonValue>,
    ) -> Result<Option<Result<JsonValue, GatewayError>>, FacadeError> {
        if !self.remote_enabled()? {
            debug!("Remote disabled, serving {path} locally");
            return Ok(None);
        }
        Ok(Some(self.gateway.request(&self.store, method, path, body)))
    }

    fn provision_local_user(&mut self, draft: NewUser) -> Result<User, FacadeError> {
        let user = self.fallback.create::<User>(draft, Utc::now())?;
        self.persist_rows::<User>()?;
        Ok(user)
    }

    fn start_local_session(&self, user: &User) -> Result<Session, FacadeError> {
        let token = format!("local-{}", Uuid::new_v4());
        let session = session::persist(&self.store, user, &token, SessionSource::Local)?;
        info!("Signed in {} against local fallback", session.email);
        Ok(session)
    }

    fn persist_rows<E: Collection>(&self) -> Result<(), FacadeError> {
        if self.config.persist_fallback {
            self.store.set_json(&collection_key(E::KIND), self.fallback.rows::<E>())?;
        }
        Ok(())
    }

    fn restore_fallback(&mut self) {
        self.restore_rows::<Sensor>();
        self.restore_rows::<Reading>();
        self.restore_rows::<Location>();
        self.restore_rows::<Event>();
        self.restore_rows::<Alert>();
        self.restore_rows::<User>();
    }

    fn restore_rows<E: Collection>(&mut self) {
        match self.store.get_json::<Vec<E>>(&collection_key(E::KIND)) {
            Ok(Some(rows)) => {
                debug!("Restored {} persisted {}", rows.len(), E::KIND.collection());
                self.fallback.replace_rows(rows);
            }
            Ok(None) => {}
            Err(e) => warn!("Ignoring unreadable persisted {}: {e}", E::KIND.collection()),
        }
    }
}

fn decode_reply<T: DeserializeOwned>(path: &str, data: JsonValue) -> Option<T> {
    match serde_json::from_value(data) {
        Ok(value) => Some(value),
        Err(e) => {
            warn!("Undecodable answer for {path}, falling back: {e}");
            None
        }
    }
}

pub fn collection_key(kind: EntityKind) -> String {
    format!("@ecosafe:collection:{}", kind.collection())
}
