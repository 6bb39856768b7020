//! Serde adapters for durations in config files.

/// Serialized as an integer count of milliseconds. Deserializes from either
/// an integer count of milliseconds or a time expression string.
pub mod millis {
    use std::time::Duration;

    use serde::{de::Error, Deserialize, Deserializer, Serializer};

    use crate::time::{DurationExt, TimeExpr, TimeParser};

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Millis(u64),
        Text(String),
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let expr = match Raw::deserialize(deserializer)? {
            Raw::Millis(ms) => TimeExpr::from(ms),
            Raw::Text(text) => TimeExpr::Text(text),
        };

        TimeParser::strict().parse(&expr).map_err(D::Error::custom)
    }

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_i64(duration.as_millis_i64())
    }
}
