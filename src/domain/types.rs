//! Shared types for live tracking and backend records

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Deserializer, Serialize};

/// Newtype wrapper for worker IDs to provide type safety
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WorkerId(pub String);

impl std::fmt::Display for WorkerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for WorkerId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// A single worker position update pushed by the realtime backend
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocationEvent {
    pub worker_id: WorkerId,
    pub latitude: f64,
    pub longitude: f64,
    /// Accepts RFC 3339 strings or epoch milliseconds on the wire
    #[serde(deserialize_with = "deserialize_timestamp")]
    pub timestamp: DateTime<Utc>,
}

impl LocationEvent {
    pub fn new(
        worker_id: impl Into<WorkerId>,
        latitude: f64,
        longitude: f64,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self { worker_id: worker_id.into(), latitude, longitude, timestamp }
    }

    /// Position as `[lat, lng]`
    #[inline]
    pub fn position(&self) -> [f64; 2] {
        [self.latitude, self.longitude]
    }
}

fn deserialize_timestamp<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
where
    D: Deserializer<'de>,
{
    use serde::de::{self, Visitor};

    struct TimestampVisitor;

    impl<'de> Visitor<'de> for TimestampVisitor {
        type Value = DateTime<Utc>;

        fn expecting(&self, formatter: &mut std::fmt::Formatter) -> std::fmt::Result {
            formatter.write_str("an RFC 3339 string or epoch milliseconds")
        }

        fn visit_str<E>(self, value: &str) -> Result<DateTime<Utc>, E>
        where
            E: de::Error,
        {
            DateTime::parse_from_rfc3339(value)
                .map(|dt| dt.with_timezone(&Utc))
                .map_err(|e| E::custom(format!("invalid timestamp {value:?}: {e}")))
        }

        fn visit_u64<E>(self, value: u64) -> Result<DateTime<Utc>, E>
        where
            E: de::Error,
        {
            let ms = i64::try_from(value).map_err(|_| E::custom("timestamp out of range"))?;
            self.visit_i64(ms)
        }

        fn visit_i64<E>(self, value: i64) -> Result<DateTime<Utc>, E>
        where
            E: de::Error,
        {
            Utc.timestamp_millis_opt(value)
                .single()
                .ok_or_else(|| E::custom("timestamp out of range"))
        }

        fn visit_f64<E>(self, value: f64) -> Result<DateTime<Utc>, E>
        where
            E: de::Error,
        {
            if !value.is_finite() {
                return Err(E::custom("timestamp is not finite"));
            }
            self.visit_i64(value as i64)
        }
    }

    deserializer.deserialize_any(TimestampVisitor)
}

/// Session role supplied by the identity provider
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Worker,
    Customer,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Worker => "worker",
            Role::Customer => "customer",
        }
    }

    /// Room joined on the realtime channel for this role, if any
    pub fn room_for(&self, user_id: &str) -> Option<String> {
        match self {
            Role::Worker => Some(format!("worker-{user_id}")),
            Role::Customer => Some(format!("customer-{user_id}")),
            Role::Admin => None,
        }
    }
}

impl std::str::FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "admin" => Ok(Role::Admin),
            "worker" => Ok(Role::Worker),
            "customer" => Ok(Role::Customer),
            other => Err(format!("unknown role: {other}")),
        }
    }
}

/// Job lifecycle as reported by the backend
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Pending,
    Accepted,
    InProgress,
    Completed,
    Cancelled,
    #[serde(other)]
    Unknown,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Pending => "pending",
            JobStatus::Accepted => "accepted",
            JobStatus::InProgress => "in_progress",
            JobStatus::Completed => "completed",
            JobStatus::Cancelled => "cancelled",
            JobStatus::Unknown => "unknown",
        }
    }

    /// Accepted or in progress
    pub fn is_active(&self) -> bool {
        matches!(self, JobStatus::Accepted | JobStatus::InProgress)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    #[serde(alias = "_id")]
    pub id: String,
    #[serde(default)]
    pub title: String,
    /// Plain address string or `{ "address": ..., "coordinates": ... }`
    #[serde(default)]
    pub location: Option<serde_json::Value>,
    #[serde(default = "default_job_status")]
    pub status: JobStatus,
    /// Assigned worker; absent while the job is still open
    #[serde(default)]
    pub worker: Option<serde_json::Value>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl Job {
    /// Address for display, whichever shape the backend sent
    pub fn location_label(&self) -> Option<&str> {
        match self.location.as_ref()? {
            serde_json::Value::String(address) => Some(address),
            serde_json::Value::Object(map) => map.get("address").and_then(|v| v.as_str()),
            _ => None,
        }
    }
}

fn default_job_status() -> JobStatus {
    JobStatus::Pending
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transaction {
    #[serde(alias = "_id")]
    pub id: String,
    #[serde(default)]
    pub amount: Option<f64>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdminUser {
    #[serde(alias = "_id")]
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub role: Option<String>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// Dashboard counters; the backend shape is open-ended
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AdminAnalytics {
    #[serde(flatten)]
    pub fields: serde_json::Map<String, serde_json::Value>,
}
