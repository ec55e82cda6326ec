use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};
use serde_json::Error as SerdeError;

use crate::error::{FacadeError, GatewayError, StoreError};

#[derive(Debug, Serialize, Deserialize)]
pub enum AppResponse {
    DatabaseError(String),
    SerializationError(String),
    NetworkError(String),
    ValidationError(String),
    BadRequest(String),
    Ok(String),
}

impl Display for AppResponse {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            AppResponse::DatabaseError(msg) => write!(f, "Database error: {}", msg),
            AppResponse::SerializationError(msg) => write!(f, "Serialization error: {}", msg),
            AppResponse::NetworkError(msg) => write!(f, "Network error: {}", msg),
            AppResponse::ValidationError(msg) => write!(f, "Validation error: {}", msg),
            AppResponse::BadRequest(msg) => write!(f, "Bad Request: {}", msg),
            AppResponse::Ok(msg) => write!(f, "Ok: {}", msg),
        }
    }
}

impl From<StoreError> for AppResponse {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Lmdb(lmdb::Error::MapFull) =>
                AppResponse::DatabaseError("Local store is full".to_string()),
            StoreError::Lmdb(lmdb::Error::Corrupted) =>
                AppResponse::DatabaseError("Local store is corrupted".to_string()),
            StoreError::Io(io_err) =>
                AppResponse::DatabaseError(format!("IO error: {}", io_err)),
            StoreError::Json(json_err) =>
                AppResponse::SerializationError(format!("Stored value is not valid JSON: {}", json_err)),
            _ => AppResponse::DatabaseError(format!("Local store error: {}", err)),
        }
    }
}

impl From<SerdeError> for AppResponse {
    fn from(err: SerdeError) -> Self {
        AppResponse::SerializationError(format!("JSON serialization error: {}", err))
    }
}

impl From<GatewayError> for AppResponse {
    fn from(err: GatewayError) -> Self {
        AppResponse::NetworkError(err.to_string())
    }
}

impl From<FacadeError> for AppResponse {
    fn from(err: FacadeError) -> Self {
        match err {
            FacadeError::Validation(msg) => AppResponse::ValidationError(msg),
            FacadeError::Store(store_err) => AppResponse::from(store_err),
            FacadeError::Gateway(gateway_err) => AppResponse::from(gateway_err),
            FacadeError::Serialization(serde_err) => AppResponse::from(serde_err),
        }
    }
}

impl AppResponse {
    pub fn success(msg: impl Into<String>) -> Self {
        AppResponse::Ok(msg.into())
    }
}
