//! Session state persisted in the local store.
//!
//! A session is three keys: the bearer token, the cached user record and the
//! source flag. Any of them missing means "no session"; logout removes all
//! three in one transaction.

use log::warn;
use serde::{Deserialize, Serialize};

use crate::error::{FacadeError, StoreError};
use crate::local_store::LocalStore;
use crate::models::User;

pub const TOKEN_KEY: &str = "@ecosafe:token";
pub const USER_KEY: &str = "@ecosafe:user";
pub const SOURCE_KEY: &str = "@ecosafe:source";
pub const MOCK_MODE_KEY: &str = "@ecosafe:mock_mode";

pub const MIN_PASSWORD_LEN: usize = 6;

/// Which side authenticated the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionSource {
    Remote,
    Local,
}

impl SessionSource {
    pub fn as_str(self) -> &'static str {
        match self {
            SessionSource::Remote => "remote",
            SessionSource::Local => "local",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "remote" => Some(SessionSource::Remote),
            "local" => Some(SessionSource::Local),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub subject_id: i64,
    pub display_name: String,
    pub email: String,
    pub auth_token: String,
    pub source: SessionSource,
}

impl Session {
    pub fn new(user: &User, token: impl Into<String>, source: SessionSource) -> Self {
        Self {
            subject_id: user.id_usuario,
            display_name: user.nome.clone(),
            email: user.email.clone(),
            auth_token: token.into(),
            source,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthStatus {
    pub is_authenticated: bool,
    pub session: Option<Session>,
}

impl AuthStatus {
    pub fn signed_out() -> Self {
        Self { is_authenticated: false, session: None }
    }

    pub fn signed_in(session: Session) -> Self {
        Self { is_authenticated: true, session: Some(session) }
    }
}

pub fn persist(store: &LocalStore, user: &User, token: &str, source: SessionSource) -> Result<Session, FacadeError> {
    store.set(TOKEN_KEY, token)?;
    store.set_json(USER_KEY, user)?;
    store.set(SOURCE_KEY, source.as_str())?;
    Ok(Session::new(user, token, source))
}

/// Reads the stored session back, or `None` if any part is missing or unreadable.
pub fn load(store: &LocalStore) -> Result<Option<(Session, User)>, StoreError> {
    let (Some(token), Some(raw_user), Some(raw_source)) =
        (store.get(TOKEN_KEY)?, store.get(USER_KEY)?, store.get(SOURCE_KEY)?)
    else {
        return Ok(None);
    };

    let user: User = match serde_json::from_str(&raw_user) {
        Ok(user) => user,
        Err(e) => {
            warn!("Cached user is unreadable, treating as signed out: {e}");
            return Ok(None);
        }
    };
    let Some(source) = SessionSource::parse(&raw_source) else {
        warn!("Unknown session source {raw_source:?}, treating as signed out");
        return Ok(None);
    };

    Ok(Some((Session::new(&user, token, source), user)))
}

pub fn stored_source(store: &LocalStore) -> Result<Option<SessionSource>, StoreError> {
    Ok(store.get(SOURCE_KEY)?.as_deref().and_then(SessionSource::parse))
}

pub fn clear(store: &LocalStore) -> Result<usize, StoreError> {
    store.remove(&[TOKEN_KEY, USER_KEY, SOURCE_KEY])
}

pub fn validate_credentials(email: &str, senha: &str) -> Result<(), FacadeError> {
    if email.trim().is_empty() || senha.is_empty() {
        return Err(FacadeError::validation("email and password are required"));
    }
    if !email.contains('@') {
        return Err(FacadeError::validation("email must be a valid address"));
    }
    Ok(())
}

pub fn validate_registration(nome: &str, email: &str, senha: &str) -> Result<(), FacadeError> {
    if nome.trim().is_empty() {
        return Err(FacadeError::validation("name is required"));
    }
    validate_credentials(email, senha)?;
    if senha.chars().count() < MIN_PASSWORD_LEN {
        return Err(FacadeError::validation(format!(
            "password must have at least {MIN_PASSWORD_LEN} characters"
        )));
    }
    Ok(())
}

/// `"maria.souza@x.com"` -> `"Maria.souza"`.
pub fn display_name_from_email(email: &str) -> String {
    let local = email.split('@').next().unwrap_or_default();
    let mut chars = local.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => email.to_string(),
    }
}
