use serde::{Serialize, Deserialize, Serializer, Deserializer};
use std::time::Duration;

/// Serializes Duration as seconds
pub fn serialize_duration<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    duration.as_secs_f64().serialize(serializer)
}

/// Deserializes Duration from seconds, rejecting negative or non-finite values
pub fn deserialize_duration<'de, D>(deserializer: D) -> Result<Duration, D::Error>
where
    D: Deserializer<'de>,
{
    let secs = f64::deserialize(deserializer)?;
    Duration::try_from_secs_f64(secs).map_err(serde::de::Error::custom)
}
