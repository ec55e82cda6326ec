//! Local substitute for the remote API.
//!
//! [`FallbackProvider`] holds one ordered vector per entity and emulates the
//! backend's CRUD and query surface on them. It starts from a seed dataset whose
//! timestamps are relative to the seeding instant, or from collections previously
//! persisted in the local store.

use chrono::{DateTime, Duration, Utc};
use log::debug;
use serde_json::Value as JsonValue;

use crate::error::FacadeError;
use crate::models::{
    format_timestamp, merge_patch, parse_timestamp, Alert, Event, Level, Location, Reading, Record, Sensor,
    SensorStatus, Timestamped, User,
};

/// Trailing window for [`FallbackProvider::active_alerts`].
pub const ACTIVE_WINDOW_HOURS: i64 = 24;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct FallbackData {
    pub sensors: Vec<Sensor>,
    pub readings: Vec<Reading>,
    pub locations: Vec<Location>,
    pub events: Vec<Event>,
    pub alerts: Vec<Alert>,
    pub users: Vec<User>,
}

/// A record type with a backing vector in [`FallbackData`].
pub trait Collection: Record {
    fn rows(data: &FallbackData) -> &Vec<Self>;
    fn rows_mut(data: &mut FallbackData) -> &mut Vec<Self>;
}

macro_rules! impl_collection {
    ($record:ty, $field:ident) => {
        impl Collection for $record {
            fn rows(data: &FallbackData) -> &Vec<Self> {
                &data.$field
            }

            fn rows_mut(data: &mut FallbackData) -> &mut Vec<Self> {
                &mut data.$field
            }
        }
    };
}

impl_collection!(Sensor, sensors);
impl_collection!(Reading, readings);
impl_collection!(Location, locations);
impl_collection!(Event, events);
impl_collection!(Alert, alerts);
impl_collection!(User, users);

#[derive(Debug, Clone, Default)]
pub struct FallbackProvider {
    data: FallbackData,
}

impl FallbackProvider {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn seeded(now: DateTime<Utc>) -> Self {
        Self { data: seed_data(now) }
    }

    pub fn data(&self) -> &FallbackData {
        &self.data
    }

    pub fn rows<E: Collection>(&self) -> &[E] {
        E::rows(&self.data)
    }

    pub fn replace_rows<E: Collection>(&mut self, rows: Vec<E>) {
        *E::rows_mut(&mut self.data) = rows;
    }

    pub fn list<E: Collection>(&self) -> Vec<E> {
        self.rows::<E>().to_vec()
    }

    pub fn get<E: Collection>(&self, id: i64) -> Option<E> {
        self.rows::<E>().iter().find(|row| row.id() == id).cloned()
    }

    /// Ids are minted as one past the largest id in the collection.
    pub fn next_id<E: Collection>(&self) -> i64 {
        self.rows::<E>().iter().map(|row| row.id()).max().unwrap_or(0) + 1
    }

    pub fn create<E: Collection>(&mut self, draft: E::Draft, now: DateTime<Utc>) -> Result<E, FacadeError> {
        let record = E::from_draft(self.next_id::<E>(), draft, now);
        record.validate()?;
        E::rows_mut(&mut self.data).push(record.clone());
        debug!("Fallback created {} {}", E::KIND.singular(), record.id());
        Ok(record)
    }

    pub fn update<E: Collection>(&mut self, id: i64, patch: &JsonValue) -> Result<Option<E>, FacadeError> {
        let rows = E::rows_mut(&mut self.data);
        let Some(slot) = rows.iter_mut().find(|row| row.id() == id) else {
            return Ok(None);
        };

        let merged = merge_patch(&*slot, patch)?;
        merged.validate()?;
        *slot = merged.clone();
        Ok(Some(merged))
    }

    pub fn delete<E: Collection>(&mut self, id: i64) -> bool {
        let rows = E::rows_mut(&mut self.data);
        let before = rows.len();
        rows.retain(|row| row.id() != id);
        rows.len() != before
    }

    pub fn recent<E: Collection + Timestamped>(&self, n: usize) -> Vec<E> {
        recent_of(self.list::<E>(), n)
    }

    pub fn active_alerts(&self, now: DateTime<Utc>) -> Vec<Alert> {
        active_at(self.list::<Alert>(), now)
    }

    pub fn find_user_by_email(&self, email: &str) -> Option<User> {
        self.data
            .users
            .iter()
            .find(|user| user.email.eq_ignore_ascii_case(email.trim()))
            .cloned()
    }
}

/// Top `n` records by timestamp, newest first. Unparseable timestamps sort last;
/// ties keep their input order.
pub fn recent_of<E: Timestamped>(mut records: Vec<E>, n: usize) -> Vec<E> {
    records.sort_by_cached_key(|record| std::cmp::Reverse(parse_timestamp(record.timestamp())));
    records.truncate(n);
    records
}

/// Alerts created less than [`ACTIVE_WINDOW_HOURS`] before `now`.
pub fn active_at(alerts: Vec<Alert>, now: DateTime<Utc>) -> Vec<Alert> {
    let window = Duration::hours(ACTIVE_WINDOW_HOURS);
    alerts
        .into_iter()
        .filter(|alert| {
            parse_timestamp(&alert.data_hora)
                .map(|created| now.signed_duration_since(created) < window)
                .unwrap_or(false)
        })
        .collect()
}

fn seed_data(now: DateTime<Utc>) -> FallbackData {
    let ago = |minutes: i64| format_timestamp(now - Duration::minutes(minutes));

    let locations = vec![
        location(1, "Centro de São Paulo", "São Paulo", "SP", "-23.5505,-46.6333"),
        location(2, "Zona Sul do Rio", "Rio de Janeiro", "RJ", "-22.9068,-43.1729"),
        location(3, "Porto Alegre Centro", "Porto Alegre", "RS", "-30.0346,-51.2177"),
    ];

    let sensors = vec![
        sensor(1, "Sensor de Umidade", "Centro de São Paulo - Marginal", "%", SensorStatus::Active),
        sensor(2, "Sensor de Temperatura", "Zona Sul do Rio - Copacabana", "°C", SensorStatus::Active),
        sensor(3, "Sensor de Pressão Atmosférica", "Porto Alegre Centro", "hPa", SensorStatus::Maintenance),
        sensor(4, "Sensor de Velocidade do Vento", "Centro de São Paulo - Viaduto", "km/h", SensorStatus::Active),
        sensor(5, "Sensor de Pluviometria", "Zona Sul do Rio - Ipanema", "mm", SensorStatus::Inactive),
    ];

    let readings = [(1, 1, 85.5, 5), (2, 2, 28.3, 10), (3, 4, 45.2, 15), (4, 1, 90.1, 20), (5, 5, 12.7, 30)]
        .into_iter()
        .map(|(id, sensor_id, value, minutes)| Reading {
            id_leitura: id,
            id_sensor: sensor_id,
            valor_lido: value,
            data_hora: ago(minutes),
        })
        .collect();

    let events = vec![
        Event {
            id_evento: 1,
            tipo_evento: "Enchente".to_string(),
            id_local: 1,
            nivel_risco: Level::High,
            data_evento: ago(2 * 60),
            detalhes: "Nível do rio acima do normal após fortes chuvas. Monitoramento contínuo necessário.".to_string(),
        },
        Event {
            id_evento: 2,
            tipo_evento: "Vento Forte".to_string(),
            id_local: 2,
            nivel_risco: Level::Medium,
            data_evento: ago(6 * 60),
            detalhes: "Ventos de até 60km/h registrados na região costeira.".to_string(),
        },
        Event {
            id_evento: 3,
            tipo_evento: "Incêndio Florestal".to_string(),
            id_local: 3,
            nivel_risco: Level::Critical,
            data_evento: ago(12 * 60),
            detalhes: "Foco de incêndio detectado na região metropolitana. Bombeiros acionados.".to_string(),
        },
    ];

    let alerts = vec![
        alert(1, 1, "ALERTA: Risco de enchente detectado na região central de São Paulo", Level::High, ago(60)),
        alert(2, 3, "CRÍTICO: Incêndio florestal em expansão - Evacuação necessária", Level::Critical, ago(10 * 60)),
        alert(3, 2, "ATENÇÃO: Ventos fortes podem causar danos materiais", Level::Medium, ago(5 * 60)),
    ];

    let users = vec![
        user(1, "João Silva", "joao@email.com", "123.456.789-01", "São Paulo, SP"),
        user(2, "Maria Santos", "maria@email.com", "987.654.321-09", "Rio de Janeiro, RJ"),
    ];

    FallbackData { sensors, readings, locations, events, alerts, users }
}

fn location(id: i64, nome: &str, cidade: &str, estado: &str, coordenadas: &str) -> Location {
    Location {
        id_local: id,
        nome: nome.to_string(),
        cidade: cidade.to_string(),
        estado: estado.to_string(),
        coordenadas: coordenadas.to_string(),
    }
}

fn sensor(id: i64, tipo: &str, localizacao: &str, unidade: &str, status: SensorStatus) -> Sensor {
    Sensor {
        id_sensor: id,
        tipo: tipo.to_string(),
        localizacao: localizacao.to_string(),
        unidade_medida: unidade.to_string(),
        status,
    }
}

fn alert(id: i64, event_id: i64, mensagem: &str, nivel: Level, data_hora: String) -> Alert {
    Alert {
        id_alerta: id,
        id_evento: event_id,
        mensagem: mensagem.to_string(),
        nivel_urgencia: nivel,
        data_hora,
    }
}

fn user(id: i64, nome: &str, email: &str, cpf: &str, localizacao: &str) -> User {
    User {
        id_usuario: id,
        nome: nome.to_string(),
        email: email.to_string(),
        cpf: cpf.to_string(),
        localizacao: localizacao.to_string(),
    }
}
