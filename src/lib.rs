//! # EcoSafe Core
//!
//! Offline-first data access layer for the EcoSafe environmental monitoring app.
//! Screens ask for sensors, readings, locations, events, alerts and users; this
//! crate answers from the remote API when it can and from a local fallback store
//! when it cannot, and keeps the login session in an LMDB-backed key-value store
//! that survives app restarts.
//!
//! ## Layers
//!
//! - [`local_store`] - persistent string-keyed store (session, flags, collections)
//! - [`gateway`] - timeout-bounded HTTP calls with bearer token and 401 teardown
//! - [`fallback`] - seeded in-memory collections emulating the API
//! - [`facade`] - one operation surface per entity, remote first, fallback second
//!
//! ## Quick Start
//!
//! ```no_run
//! use ecosafe_core::config::ClientConfig;
//! use ecosafe_core::facade::DataFacade;
//! use ecosafe_core::models::{Alert, Level, NewAlert};
//!
//! let mut facade = DataFacade::open(ClientConfig::default())?;
//! let session = facade.login("admin@ecosafe.com", "123456")?;
//! println!("signed in via {:?}", session.source);
//!
//! let alert = facade.create::<Alert>(NewAlert {
//!     id_evento: 1,
//!     mensagem: "Nível do rio subindo".to_string(),
//!     nivel_urgencia: Level::High,
//!     data_hora: None,
//! })?;
//! let active = facade.active_alerts()?;
//! assert!(active.data.iter().any(|a| a.id_alerta == alert.data.id_alerta));
//! # Ok::<(), ecosafe_core::error::FacadeError>(())
//! ```
//!
//! ## FFI Functions
//!
//! Every function below returns a JSON-encoded [`AppResponse`] as a C string that
//! must be released with [`free_response`]:
//!
//! - [`create_client`] / [`close_client`] - client lifecycle
//! - [`login`], [`register`], [`logout`], [`check_auth_status`] - session
//! - [`list_records`], [`get_record`], [`create_record`], [`update_record`], [`delete_record`] - CRUD
//! - [`recent_records`], [`active_alerts`], [`dashboard`] - queries
//! - [`set_offline_mode`], [`reset_local_data`] - local state

pub mod app_response;
pub mod config;
pub mod error;
pub mod facade;
pub mod fallback;
pub mod gateway;
pub mod local_store;
pub mod models;
pub mod session;

use std::ffi::{CStr, CString};
use std::os::raw::c_char;

use log::{info, warn};
use serde::Serialize;

use crate::app_response::AppResponse;
use crate::config::ClientConfig;
use crate::error::FacadeError;
use crate::facade::DataFacade;
use crate::models::{Alert, EntityKind, Event, Location, Reading, Sensor, User};

/// Runs `$body` with `$record` aliased to the record type of `$kind`.
macro_rules! with_record_type {
    ($kind:expr, $record:ident => $body:expr) => {
        match $kind {
            EntityKind::Sensor => {
                type $record = Sensor;
                $body
            }
            EntityKind::Reading => {
                type $record = Reading;
                $body
            }
            EntityKind::Location => {
                type $record = Location;
                $body
            }
            EntityKind::Event => {
                type $record = Event;
                $body
            }
            EntityKind::Alert => {
                type $record = Alert;
                $body
            }
            EntityKind::User => {
                type $record = User;
                $body
            }
        }
    };
}

/// Creates a client from a JSON [`ClientConfig`].
///
/// Returns a pointer to the client, or null if the configuration is invalid or
/// the local store cannot be opened. The pointer must be released with
/// [`close_client`].
///
/// # Examples
///
/// ```no_run
/// use std::ffi::CString;
/// use ecosafe_core::create_client;
///
/// let config = CString::new(r#"{"api_base_url":"http://10.0.2.2:8080/api","data_dir":"ecosafe_data"}"#).unwrap();
/// let client = create_client(config.as_ptr());
/// assert!(!client.is_null());
/// ```
#[no_mangle]
#[allow(clippy::not_unsafe_ptr_arg_deref)]
pub extern "C" fn create_client(config_json: *const c_char) -> *mut DataFacade {
    if config_json.is_null() {
        warn!("Null config pointer passed to create_client");
        return std::ptr::null_mut();
    }

    let raw = match unsafe { CStr::from_ptr(config_json).to_str() } {
        Ok(s) => s,
        Err(e) => {
            warn!("Invalid UTF-8 in config parameter: {e}");
            return std::ptr::null_mut();
        }
    };

    let config = match ClientConfig::from_json(raw) {
        Ok(config) => config,
        Err(e) => {
            warn!("Invalid client configuration: {e}");
            return std::ptr::null_mut();
        }
    };

    match DataFacade::open(config) {
        Ok(facade) => {
            info!("Client created");
            Box::into_raw(Box::new(facade))
        }
        Err(e) => {
            warn!("Failed to create client: {e}");
            std::ptr::null_mut()
        }
    }
}

/// Releases a client created by [`create_client`].
#[no_mangle]
#[allow(clippy::not_unsafe_ptr_arg_deref)]
pub extern "C" fn close_client(state: *mut DataFacade) -> *const c_char {
    if state.is_null() {
        let error = AppResponse::BadRequest("Null state pointer passed to close_client".to_string());
        return response_to_c_string(&error);
    }

    drop(unsafe { Box::from_raw(state) });
    response_to_c_string(&AppResponse::success("Client closed"))
}

/// Releases a string returned by any function of this library.
#[no_mangle]
#[allow(clippy::not_unsafe_ptr_arg_deref)]
pub extern "C" fn free_response(ptr: *const c_char) {
    if !ptr.is_null() {
        drop(unsafe { CString::from_raw(ptr as *mut c_char) });
    }
}

/// Signs in. The `Ok` payload is a sourced [`session::Session`].
#[no_mangle]
#[allow(clippy::not_unsafe_ptr_arg_deref)]
pub extern "C" fn login(state: *mut DataFacade, email: *const c_char, senha: *const c_char) -> *const c_char {
    let facade = match facade_mut(state, "login") {
        Ok(facade) => facade,
        Err(error_ptr) => return error_ptr,
    };
    let email = match c_ptr_to_string(email, "email") {
        Ok(email) => email,
        Err(error_ptr) => return error_ptr,
    };
    let senha = match c_ptr_to_string(senha, "senha") {
        Ok(senha) => senha,
        Err(error_ptr) => return error_ptr,
    };

    respond(facade.login(&email, &senha))
}

/// Creates an account and signs in.
#[no_mangle]
#[allow(clippy::not_unsafe_ptr_arg_deref)]
pub extern "C" fn register(
    state: *mut DataFacade,
    nome: *const c_char,
    email: *const c_char,
    senha: *const c_char,
) -> *const c_char {
    let facade = match facade_mut(state, "register") {
        Ok(facade) => facade,
        Err(error_ptr) => return error_ptr,
    };
    let nome = match c_ptr_to_string(nome, "nome") {
        Ok(nome) => nome,
        Err(error_ptr) => return error_ptr,
    };
    let email = match c_ptr_to_string(email, "email") {
        Ok(email) => email,
        Err(error_ptr) => return error_ptr,
    };
    let senha = match c_ptr_to_string(senha, "senha") {
        Ok(senha) => senha,
        Err(error_ptr) => return error_ptr,
    };

    respond(facade.register(&nome, &email, &senha))
}

#[no_mangle]
#[allow(clippy::not_unsafe_ptr_arg_deref)]
pub extern "C" fn logout(state: *mut DataFacade) -> *const c_char {
    let facade = match facade_mut(state, "logout") {
        Ok(facade) => facade,
        Err(error_ptr) => return error_ptr,
    };

    match facade.logout() {
        Ok(()) => response_to_c_string(&AppResponse::success("Signed out")),
        Err(e) => response_to_c_string(&AppResponse::from(e)),
    }
}

/// The `Ok` payload is a [`session::AuthStatus`].
#[no_mangle]
#[allow(clippy::not_unsafe_ptr_arg_deref)]
pub extern "C" fn check_auth_status(state: *mut DataFacade) -> *const c_char {
    let facade = match facade_mut(state, "check_auth_status") {
        Ok(facade) => facade,
        Err(error_ptr) => return error_ptr,
    };

    respond(facade.check_auth_status())
}

#[no_mangle]
#[allow(clippy::not_unsafe_ptr_arg_deref)]
pub extern "C" fn set_offline_mode(state: *mut DataFacade, enabled: bool) -> *const c_char {
    let facade = match facade_mut(state, "set_offline_mode") {
        Ok(facade) => facade,
        Err(error_ptr) => return error_ptr,
    };

    match facade.set_offline_mode(enabled) {
        Ok(()) => response_to_c_string(&AppResponse::success(format!("Offline mode set to {enabled}"))),
        Err(e) => response_to_c_string(&AppResponse::from(e)),
    }
}

/// Lists a whole collection. `kind` is a collection name such as `"sensores"`.
///
/// # Examples
///
/// ```no_run
/// use std::ffi::CString;
/// use ecosafe_core::{create_client, list_records, free_response};
///
/// let config = CString::new("{}").unwrap();
/// let client = create_client(config.as_ptr());
///
/// let kind = CString::new("alertas").unwrap();
/// let response = list_records(client, kind.as_ptr());
/// free_response(response);
/// ```
#[no_mangle]
#[allow(clippy::not_unsafe_ptr_arg_deref)]
pub extern "C" fn list_records(state: *mut DataFacade, kind: *const c_char) -> *const c_char {
    let (facade, kind) = match facade_and_kind(state, kind, "list_records") {
        Ok(pair) => pair,
        Err(error_ptr) => return error_ptr,
    };

    with_record_type!(kind, R => respond(facade.list::<R>()))
}

/// The `Ok` payload is a sourced record, with `data: null` for an unknown id.
#[no_mangle]
#[allow(clippy::not_unsafe_ptr_arg_deref)]
pub extern "C" fn get_record(state: *mut DataFacade, kind: *const c_char, id: i64) -> *const c_char {
    let (facade, kind) = match facade_and_kind(state, kind, "get_record") {
        Ok(pair) => pair,
        Err(error_ptr) => return error_ptr,
    };

    with_record_type!(kind, R => respond(facade.get_by_id::<R>(id)))
}

/// Creates a record from a JSON draft (every field except the id).
#[no_mangle]
#[allow(clippy::not_unsafe_ptr_arg_deref)]
pub extern "C" fn create_record(state: *mut DataFacade, kind: *const c_char, json_ptr: *const c_char) -> *const c_char {
    let (facade, kind) = match facade_and_kind(state, kind, "create_record") {
        Ok(pair) => pair,
        Err(error_ptr) => return error_ptr,
    };
    let json_str = match c_ptr_to_string(json_ptr, "JSON") {
        Ok(json) => json,
        Err(error_ptr) => return error_ptr,
    };

    with_record_type!(kind, R => {
        match serde_json::from_str::<<R as models::Record>::Draft>(&json_str) {
            Ok(draft) => respond(facade.create::<R>(draft)),
            Err(e) => response_to_c_string(&AppResponse::SerializationError(format!("Invalid JSON: {e}"))),
        }
    })
}

/// Merges a JSON object of fields over the record with `id`. `data` is null when
/// no such record exists.
#[no_mangle]
#[allow(clippy::not_unsafe_ptr_arg_deref)]
pub extern "C" fn update_record(
    state: *mut DataFacade,
    kind: *const c_char,
    id: i64,
    json_ptr: *const c_char,
) -> *const c_char {
    let (facade, kind) = match facade_and_kind(state, kind, "update_record") {
        Ok(pair) => pair,
        Err(error_ptr) => return error_ptr,
    };
    let json_str = match c_ptr_to_string(json_ptr, "JSON") {
        Ok(json) => json,
        Err(error_ptr) => return error_ptr,
    };
    let patch: serde_json::Value = match serde_json::from_str(&json_str) {
        Ok(patch) => patch,
        Err(e) => {
            let error = AppResponse::SerializationError(format!("Error deserializing JSON: {e}"));
            return response_to_c_string(&error);
        }
    };

    with_record_type!(kind, R => respond(facade.update::<R>(id, &patch)))
}

/// The `Ok` payload is a sourced boolean: `false` when nothing was deleted.
#[no_mangle]
#[allow(clippy::not_unsafe_ptr_arg_deref)]
pub extern "C" fn delete_record(state: *mut DataFacade, kind: *const c_char, id: i64) -> *const c_char {
    let (facade, kind) = match facade_and_kind(state, kind, "delete_record") {
        Ok(pair) => pair,
        Err(error_ptr) => return error_ptr,
    };

    with_record_type!(kind, R => respond(facade.delete::<R>(id)))
}

/// Newest `limit` records of a timestamped collection (`leituras`, `eventos`, `alertas`).
#[no_mangle]
#[allow(clippy::not_unsafe_ptr_arg_deref)]
pub extern "C" fn recent_records(state: *mut DataFacade, kind: *const c_char, limit: u32) -> *const c_char {
    let (facade, kind) = match facade_and_kind(state, kind, "recent_records") {
        Ok(pair) => pair,
        Err(error_ptr) => return error_ptr,
    };
    let limit = limit as usize;

    match kind {
        EntityKind::Reading => respond(facade.recent::<Reading>(limit)),
        EntityKind::Event => respond(facade.recent::<Event>(limit)),
        EntityKind::Alert => respond(facade.recent::<Alert>(limit)),
        other => {
            let error = AppResponse::BadRequest(format!("{} records carry no timestamp", other.collection()));
            response_to_c_string(&error)
        }
    }
}

#[no_mangle]
#[allow(clippy::not_unsafe_ptr_arg_deref)]
pub extern "C" fn active_alerts(state: *mut DataFacade) -> *const c_char {
    let facade = match facade_mut(state, "active_alerts") {
        Ok(facade) => facade,
        Err(error_ptr) => return error_ptr,
    };

    respond(facade.active_alerts())
}

#[no_mangle]
#[allow(clippy::not_unsafe_ptr_arg_deref)]
pub extern "C" fn dashboard(state: *mut DataFacade) -> *const c_char {
    let facade = match facade_mut(state, "dashboard") {
        Ok(facade) => facade,
        Err(error_ptr) => return error_ptr,
    };

    respond(facade.dashboard())
}

/// Clears session, flags and persisted collections, then reseeds the fallback data.
#[no_mangle]
#[allow(clippy::not_unsafe_ptr_arg_deref)]
pub extern "C" fn reset_local_data(state: *mut DataFacade) -> *const c_char {
    let facade = match facade_mut(state, "reset_local_data") {
        Ok(facade) => facade,
        Err(error_ptr) => return error_ptr,
    };

    match facade.reset_local_data() {
        Ok(count) => response_to_c_string(&AppResponse::success(format!("Cleared {count} local keys"))),
        Err(e) => response_to_c_string(&AppResponse::from(e)),
    }
}

/// Serializes a facade result into an [`AppResponse`] C string.
fn respond<T: Serialize>(result: Result<T, FacadeError>) -> *const c_char {
    let response = match result {
        Ok(value) => match serde_json::to_string(&value) {
            Ok(json) => AppResponse::Ok(json),
            Err(e) => AppResponse::SerializationError(format!("Failed to serialize result: {e}")),
        },
        Err(e) => AppResponse::from(e),
    };
    response_to_c_string(&response)
}

fn facade_mut<'a>(state: *mut DataFacade, caller: &str) -> Result<&'a mut DataFacade, *const c_char> {
    match unsafe { state.as_mut() } {
        Some(facade) => Ok(facade),
        None => {
            let error = AppResponse::BadRequest(format!("Null state pointer passed to {caller}"));
            Err(response_to_c_string(&error))
        }
    }
}

fn facade_and_kind<'a>(
    state: *mut DataFacade,
    kind: *const c_char,
    caller: &str,
) -> Result<(&'a mut DataFacade, EntityKind), *const c_char> {
    let facade = facade_mut(state, caller)?;
    let kind_str = c_ptr_to_string(kind, "kind")?;
    match kind_str.parse::<EntityKind>() {
        Ok(kind) => Ok((facade, kind)),
        Err(msg) => Err(response_to_c_string(&AppResponse::BadRequest(msg))),
    }
}

/// Converts an [`AppResponse`] to a C-compatible string.
///
/// Returns a null pointer if serialization or C string creation fails.
fn response_to_c_string(response: &AppResponse) -> *const c_char {
    let json = match serde_json::to_string(response) {
        Ok(j) => j,
        Err(e) => {
            warn!("Error serializing response: {e}");
            return std::ptr::null();
        }
    };

    match CString::new(json) {
        Ok(c_str) => c_str.into_raw(),
        Err(e) => {
            warn!("Error creating CString: {e}");
            std::ptr::null()
        }
    }
}

/// Converts a C string pointer to a Rust String.
///
/// On failure the error is already encoded as an [`AppResponse`] C string,
/// ready to be returned to the FFI caller.
fn c_ptr_to_string(ptr: *const c_char, field_name: &str) -> Result<String, *const c_char> {
    if ptr.is_null() {
        let error = AppResponse::BadRequest(format!("Null {field_name} pointer"));
        return Err(response_to_c_string(&error));
    }

    match unsafe { CStr::from_ptr(ptr).to_str() } {
        Ok(s) => Ok(s.to_string()),
        Err(e) => {
            let error = AppResponse::BadRequest(format!("Invalid UTF-8 in {field_name}: {e}"));
            Err(response_to_c_string(&error))
        }
    }
}
