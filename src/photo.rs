use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One indexed image. Only files carrying GPS coordinates become records;
/// `relative_path` is the identity key within a scan root.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PhotoRecord {
    pub relative_path: String,
    pub name: String,
    pub latitude: f64,
    pub longitude: f64,
    #[serde(rename = "date", with = "timestamp::iso")]
    pub captured_at: DateTime<Utc>,
    #[serde(with = "timestamp::millis")]
    pub last_modified: DateTime<Utc>,
    pub thumbnail_path: String,
}

impl PhotoRecord {
    pub fn name_from_path(relative_path: &str) -> String {
        relative_path
            .rsplit('/')
            .next()
            .unwrap_or(relative_path)
            .to_string()
    }
}

/// Sidecar timestamps are accepted as either ISO-8601 strings or epoch
/// milliseconds and normalized to millisecond precision internally.
pub mod timestamp {
    use chrono::{DateTime, NaiveDateTime, SecondsFormat, TimeZone, Utc};
    use serde::de::{Deserializer, Error as DeError};
    use serde::{Deserialize, Serializer};
    use std::time::SystemTime;

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Millis(i64),
        Float(f64),
        Text(String),
    }

    pub fn from_millis(ms: i64) -> Option<DateTime<Utc>> {
        Utc.timestamp_millis_opt(ms).single()
    }

    /// Drop sub-millisecond precision so an instant survives a sidecar
    /// round-trip unchanged.
    pub fn to_millis_precision(dt: DateTime<Utc>) -> DateTime<Utc> {
        from_millis(dt.timestamp_millis()).unwrap_or(dt)
    }

    pub fn from_system_time(t: SystemTime) -> DateTime<Utc> {
        to_millis_precision(DateTime::<Utc>::from(t))
    }

    pub fn parse_flexible(s: &str) -> Option<DateTime<Utc>> {
        let s = s.trim();
        if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
            return Some(to_millis_precision(dt.with_timezone(&Utc)));
        }
        for fmt in ["%Y-%m-%d %H:%M:%S", "%Y:%m:%d %H:%M:%S"] {
            if let Ok(naive) = NaiveDateTime::parse_from_str(s, fmt) {
                return Some(Utc.from_utc_datetime(&naive));
            }
        }
        None
    }

    fn decode<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
    where
        D: Deserializer<'de>,
    {
        match Raw::deserialize(deserializer)? {
            Raw::Millis(ms) => {
                from_millis(ms).ok_or_else(|| D::Error::custom("epoch millis out of range"))
            }
            Raw::Float(ms) => from_millis(ms as i64)
                .ok_or_else(|| D::Error::custom("epoch millis out of range")),
            Raw::Text(s) => parse_flexible(&s)
                .ok_or_else(|| D::Error::custom(format!("unrecognized timestamp: {}", s))),
        }
    }

    pub mod iso {
        use super::*;

        pub fn serialize<S: Serializer>(
            dt: &DateTime<Utc>,
            serializer: S,
        ) -> Result<S::Ok, S::Error> {
            serializer.serialize_str(&dt.to_rfc3339_opts(SecondsFormat::Millis, true))
        }

        pub fn deserialize<'de, D: Deserializer<'de>>(
            deserializer: D,
        ) -> Result<DateTime<Utc>, D::Error> {
            super::decode(deserializer)
        }
    }

    pub mod millis {
        use super::*;

        pub fn serialize<S: Serializer>(
            dt: &DateTime<Utc>,
            serializer: S,
        ) -> Result<S::Ok, S::Error> {
            serializer.serialize_i64(dt.timestamp_millis())
        }

        pub fn deserialize<'de, D: Deserializer<'de>>(
            deserializer: D,
        ) -> Result<DateTime<Utc>, D::Error> {
            super::decode(deserializer)
        }
    }
}
