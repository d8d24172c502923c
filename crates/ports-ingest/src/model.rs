//! Port record shapes
//!
//! `RawPort` mirrors one member value of the input document, `StoredPort`
//! mirrors one row of the `ports` table.

use serde::{Deserialize, Deserializer, Serialize};

/// A port record as decoded from the input document.
///
/// Decoding is permissive: missing fields and explicit `null`s become empty
/// strings or lists, and unknown fields are ignored.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct RawPort {
    /// Taken from the member key, never from the body.
    #[serde(skip)]
    pub key: String,
    #[serde(deserialize_with = "nullable")]
    pub name: String,
    #[serde(deserialize_with = "nullable")]
    pub city: String,
    #[serde(deserialize_with = "nullable")]
    pub province: String,
    #[serde(deserialize_with = "nullable")]
    pub country: String,
    #[serde(deserialize_with = "nullable")]
    pub code: String,
    #[serde(deserialize_with = "nullable")]
    pub timezone: String,
    #[serde(deserialize_with = "nullable")]
    pub coordinates: Vec<f64>,
    #[serde(deserialize_with = "nullable")]
    pub alias: Vec<String>,
    #[serde(deserialize_with = "nullable")]
    pub unlocs: Vec<String>,
}

/// One row of the `ports` table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct StoredPort {
    pub key: String,
    pub code: String,
    pub name: String,
    pub city: String,
    pub province: String,
    pub country: String,
    pub timezone: String,
    pub latitude: f64,
    pub longitude: f64,
    pub unlocs: Vec<String>,
    pub alias: Vec<String>,
}

/// A decoded port that fails domain validation.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("Port {key}: invalid coordinates {coordinates:?}, expected [latitude, longitude]")]
pub struct InvalidPortError {
    pub key: String,
    pub coordinates: Vec<f64>,
}

impl TryFrom<RawPort> for StoredPort {
    type Error = InvalidPortError;

    fn try_from(raw: RawPort) -> Result<Self, Self::Error> {
        let (latitude, longitude) = match *raw.coordinates.as_slice() {
            [latitude, longitude] => (latitude, longitude),
            _ => {
                return Err(InvalidPortError {
                    key: raw.key,
                    coordinates: raw.coordinates,
                })
            },
        };

        Ok(StoredPort {
            key: raw.key,
            code: raw.code,
            name: raw.name,
            city: raw.city,
            province: raw.province,
            country: raw.country,
            timezone: raw.timezone,
            latitude,
            longitude,
            unlocs: raw.unlocs,
            alias: raw.alias,
        })
    }
}

fn nullable<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}
