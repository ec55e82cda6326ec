//! Domain records served by the data access layer.
//!
//! Every entity uses the backend's wire names (`id_sensor`, `nivel_urgencia`, ...)
//! so that the same struct decodes remote responses, persisted fallback
//! collections and FFI payloads. Each entity comes with a `New*` draft that
//! carries every field except the id.
//!
//! Foreign-key-like fields (`id_sensor`, `id_local`, `id_evento`) are weak
//! references: they are never checked for existence.

use std::fmt::Debug;
use std::str::FromStr;

use chrono::{DateTime, NaiveDateTime, SecondsFormat, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use crate::error::FacadeError;

/// The entity collections known to the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
    Sensor,
    Reading,
    Location,
    Event,
    Alert,
    User,
}

impl EntityKind {
    pub const ALL: [EntityKind; 6] = [
        EntityKind::Sensor,
        EntityKind::Reading,
        EntityKind::Location,
        EntityKind::Event,
        EntityKind::Alert,
        EntityKind::User,
    ];

    /// Collection name as used by the backend routes.
    pub fn collection(self) -> &'static str {
        match self {
            EntityKind::Sensor => "sensores",
            EntityKind::Reading => "leituras",
            EntityKind::Location => "locais",
            EntityKind::Event => "eventos",
            EntityKind::Alert => "alertas",
            EntityKind::User => "usuarios",
        }
    }

    pub fn singular(self) -> &'static str {
        match self {
            EntityKind::Sensor => "sensor",
            EntityKind::Reading => "reading",
            EntityKind::Location => "location",
            EntityKind::Event => "event",
            EntityKind::Alert => "alert",
            EntityKind::User => "user",
        }
    }

    pub fn path(self) -> String {
        format!("/{}", self.collection())
    }

    pub fn item_path(self, id: i64) -> String {
        format!("/{}/{}", self.collection(), id)
    }
}

impl FromStr for EntityKind {
    type Err = String;

    fn from_str(name: &str) -> Result<Self, Self::Err> {
        let name = name.trim().to_lowercase();
        EntityKind::ALL
            .into_iter()
            .find(|kind| kind.collection() == name || kind.singular() == name)
            .ok_or_else(|| format!("Unknown entity kind: {name}"))
    }
}

/// Risk / urgency scale shared by events and alerts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Level {
    #[serde(rename = "baixo", alias = "low")]
    Low,
    #[serde(rename = "médio", alias = "medio", alias = "medium")]
    Medium,
    #[serde(rename = "alto", alias = "high")]
    High,
    #[serde(rename = "crítico", alias = "critico", alias = "critical")]
    Critical,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SensorStatus {
    #[default]
    #[serde(rename = "ativo", alias = "active")]
    Active,
    #[serde(rename = "inativo", alias = "inactive")]
    Inactive,
    #[serde(rename = "manutenção", alias = "manutencao", alias = "maintenance")]
    Maintenance,
}

/// A record that can be listed, fetched, created, patched and deleted.
pub trait Record: Serialize + DeserializeOwned + Clone + Debug {
    /// Everything but the id.
    type Draft: Serialize + DeserializeOwned + Clone + Debug;

    const KIND: EntityKind;
    /// Wire name of the id field.
    const ID_FIELD: &'static str;

    fn id(&self) -> i64;

    /// Builds the record a local store would hold for `draft` under `id`.
    /// Missing timestamps are stamped with `now`.
    fn from_draft(id: i64, draft: Self::Draft, now: DateTime<Utc>) -> Self;

    /// Required-field check, run before any create or update.
    fn validate(&self) -> Result<(), FacadeError> {
        Ok(())
    }
}

/// A record ordered by an ISO-8601 timestamp.
pub trait Timestamped: Record {
    fn timestamp(&self) -> &str;
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sensor {
    pub id_sensor: i64,
    pub tipo: String,
    pub localizacao: String,
    pub unidade_medida: String,
    #[serde(default)]
    pub status: SensorStatus,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewSensor {
    pub tipo: String,
    pub localizacao: String,
    pub unidade_medida: String,
    #[serde(default)]
    pub status: SensorStatus,
}

impl Record for Sensor {
    type Draft = NewSensor;
    const KIND: EntityKind = EntityKind::Sensor;
    const ID_FIELD: &'static str = "id_sensor";

    fn id(&self) -> i64 {
        self.id_sensor
    }

    fn from_draft(id: i64, draft: NewSensor, _now: DateTime<Utc>) -> Self {
        Sensor {
            id_sensor: id,
            tipo: draft.tipo,
            localizacao: draft.localizacao,
            unidade_medida: draft.unidade_medida,
            status: draft.status,
        }
    }

    fn validate(&self) -> Result<(), FacadeError> {
        require_text(&[
            ("tipo", self.tipo.as_str()),
            ("localizacao", self.localizacao.as_str()),
            ("unidade_medida", self.unidade_medida.as_str()),
        ])
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reading {
    pub id_leitura: i64,
    pub id_sensor: i64,
    pub valor_lido: f64,
    pub data_hora: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewReading {
    pub id_sensor: i64,
    pub valor_lido: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_hora: Option<String>,
}

impl Record for Reading {
    type Draft = NewReading;
    const KIND: EntityKind = EntityKind::Reading;
    const ID_FIELD: &'static str = "id_leitura";

    fn id(&self) -> i64 {
        self.id_leitura
    }

    fn from_draft(id: i64, draft: NewReading, now: DateTime<Utc>) -> Self {
        Reading {
            id_leitura: id,
            id_sensor: draft.id_sensor,
            valor_lido: draft.valor_lido,
            data_hora: draft.data_hora.unwrap_or_else(|| format_timestamp(now)),
        }
    }

    fn validate(&self) -> Result<(), FacadeError> {
        if !self.valor_lido.is_finite() {
            return Err(FacadeError::validation("valor_lido must be a finite number"));
        }
        Ok(())
    }
}

impl Timestamped for Reading {
    fn timestamp(&self) -> &str {
        &self.data_hora
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub id_local: i64,
    pub nome: String,
    #[serde(default)]
    pub cidade: String,
    #[serde(default)]
    pub estado: String,
    /// `"lat,lng"`.
    #[serde(default)]
    pub coordenadas: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewLocation {
    pub nome: String,
    #[serde(default)]
    pub cidade: String,
    #[serde(default)]
    pub estado: String,
    #[serde(default)]
    pub coordenadas: String,
}

impl Record for Location {
    type Draft = NewLocation;
    const KIND: EntityKind = EntityKind::Location;
    const ID_FIELD: &'static str = "id_local";

    fn id(&self) -> i64 {
        self.id_local
    }

    fn from_draft(id: i64, draft: NewLocation, _now: DateTime<Utc>) -> Self {
        Location {
            id_local: id,
            nome: draft.nome,
            cidade: draft.cidade,
            estado: draft.estado,
            coordenadas: draft.coordenadas,
        }
    }

    fn validate(&self) -> Result<(), FacadeError> {
        require_text(&[("nome", self.nome.as_str())])
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub id_evento: i64,
    pub tipo_evento: String,
    pub id_local: i64,
    pub nivel_risco: Level,
    pub data_evento: String,
    #[serde(default)]
    pub detalhes: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewEvent {
    pub tipo_evento: String,
    pub id_local: i64,
    pub nivel_risco: Level,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_evento: Option<String>,
    #[serde(default)]
    pub detalhes: String,
}

impl Record for Event {
    type Draft = NewEvent;
    const KIND: EntityKind = EntityKind::Event;
    const ID_FIELD: &'static str = "id_evento";

    fn id(&self) -> i64 {
        self.id_evento
    }

    fn from_draft(id: i64, draft: NewEvent, now: DateTime<Utc>) -> Self {
        Event {
            id_evento: id,
            tipo_evento: draft.tipo_evento,
            id_local: draft.id_local,
            nivel_risco: draft.nivel_risco,
            data_evento: draft.data_evento.unwrap_or_else(|| format_timestamp(now)),
            detalhes: draft.detalhes,
        }
    }

    fn validate(&self) -> Result<(), FacadeError> {
        require_text(&[("tipo_evento", self.tipo_evento.as_str())])?;
        require_reference("id_local", self.id_local)
    }
}

impl Timestamped for Event {
    fn timestamp(&self) -> &str {
        &self.data_evento
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alert {
    pub id_alerta: i64,
    pub id_evento: i64,
    pub mensagem: String,
    pub nivel_urgencia: Level,
    pub data_hora: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewAlert {
    pub id_evento: i64,
    pub mensagem: String,
    pub nivel_urgencia: Level,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_hora: Option<String>,
}

impl Record for Alert {
    type Draft = NewAlert;
    const KIND: EntityKind = EntityKind::Alert;
    const ID_FIELD: &'static str = "id_alerta";

    fn id(&self) -> i64 {
        self.id_alerta
    }

    fn from_draft(id: i64, draft: NewAlert, now: DateTime<Utc>) -> Self {
        Alert {
            id_alerta: id,
            id_evento: draft.id_evento,
            mensagem: draft.mensagem,
            nivel_urgencia: draft.nivel_urgencia,
            data_hora: draft.data_hora.unwrap_or_else(|| format_timestamp(now)),
        }
    }

    fn validate(&self) -> Result<(), FacadeError> {
        require_text(&[("mensagem", self.mensagem.as_str())])?;
        require_reference("id_evento", self.id_evento)
    }
}

impl Timestamped for Alert {
    fn timestamp(&self) -> &str {
        &self.data_hora
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id_usuario: i64,
    pub nome: String,
    pub email: String,
    #[serde(default)]
    pub cpf: String,
    #[serde(default)]
    pub localizacao: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewUser {
    pub nome: String,
    pub email: String,
    #[serde(default)]
    pub cpf: String,
    #[serde(default)]
    pub localizacao: String,
}

impl Record for User {
    type Draft = NewUser;
    const KIND: EntityKind = EntityKind::User;
    const ID_FIELD: &'static str = "id_usuario";

    fn id(&self) -> i64 {
        self.id_usuario
    }

    fn from_draft(id: i64, draft: NewUser, _now: DateTime<Utc>) -> Self {
        User {
            id_usuario: id,
            nome: draft.nome,
            email: draft.email,
            cpf: draft.cpf,
            localizacao: draft.localizacao,
        }
    }

    fn validate(&self) -> Result<(), FacadeError> {
        require_text(&[("nome", self.nome.as_str())])?;
        if !self.email.contains('@') {
            return Err(FacadeError::validation("email must be a valid address"));
        }
        Ok(())
    }
}

/// Shallow merge: keys present in `patch` overwrite, absent keys are kept.
/// The id key is ignored so a patch can never re-key a record.
pub fn merge_patch<E: Record>(existing: &E, patch: &JsonValue) -> Result<E, FacadeError> {
    let fields = patch
        .as_object()
        .ok_or_else(|| FacadeError::validation("update payload must be a JSON object"))?;

    let mut merged = serde_json::to_value(existing)?;
    if let Some(target) = merged.as_object_mut() {
        for (key, value) in fields {
            if key != E::ID_FIELD {
                target.insert(key.clone(), value.clone());
            }
        }
    }

    serde_json::from_value(merged)
        .map_err(|e| FacadeError::validation(format!("invalid {} update: {e}", E::KIND.collection())))
}

/// Parses RFC 3339, or a zone-less `YYYY-MM-DDTHH:MM:SS[.fff]` read as UTC.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Some(ts.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .map(|naive| naive.and_utc())
}

pub fn format_timestamp(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Millis, true)
}

fn require_text(fields: &[(&str, &str)]) -> Result<(), FacadeError> {
    match fields.iter().find(|(_, value)| value.trim().is_empty()) {
        Some((name, _)) => Err(FacadeError::validation(format!("{name} is required"))),
        None => Ok(()),
    }
}

fn require_reference(name: &str, id: i64) -> Result<(), FacadeError> {
    if id == 0 {
        return Err(FacadeError::validation(format!("{name} is required")));
    }
    Ok(())
}
