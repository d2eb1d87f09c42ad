//! Raw payload shapes returned by the policy backend.
//!
//! Every field is defaulted, and an explicit `null` reads the same as a
//! missing field. Area entries are parsed one at a time and individual
//! approved policies are kept as raw JSON for
//! [`AreaDetail::parsed_policies`], so a single malformed entry never
//! rejects its siblings.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};

/// Reads `null` as `T::default()`.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Reads a sequence item by item, dropping items that do not parse as `T`.
/// `null` reads as an empty sequence.
fn lenient_seq<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let values: Vec<serde_json::Value> = null_as_default(deserializer)?;
    Ok(values
        .into_iter()
        .enumerate()
        .filter_map(|(index, value)| match serde_json::from_value::<T>(value) {
            Ok(item) => Some(item),
            Err(e) => {
                tracing::warn!(index, error = %e, "skipping malformed entry");
                None
            }
        })
        .collect())
}

/// Per-country record from `GET /countries`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RawCountryRecord {
    pub country: Option<String>,
    /// Server-side area count. Diagnostic only; coverage is recomputed.
    #[serde(deserialize_with = "null_as_default")]
    pub area_points: f64,
    #[serde(deserialize_with = "null_as_default")]
    pub total_approved_policies: u64,
    #[serde(deserialize_with = "lenient_seq")]
    pub areas_with_approved_policies: Vec<String>,
    #[serde(deserialize_with = "lenient_seq")]
    pub areas_detail: Vec<AreaDetail>,
    pub level: Option<String>,
    pub color: Option<String>,
}

/// One policy area of a [`RawCountryRecord`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AreaDetail {
    pub area_name: Option<String>,
    #[serde(deserialize_with = "null_as_default")]
    pub approved_policies: Vec<serde_json::Value>,
}

impl AreaDetail {
    /// Parses each approved policy independently, dropping entries that do
    /// not match [`RawPolicy`].
    #[must_use]
    pub fn parsed_policies(&self) -> Vec<RawPolicy> {
        self.approved_policies
            .iter()
            .filter_map(|value| match serde_json::from_value::<RawPolicy>(value.clone()) {
                Ok(policy) if !policy.policy_name.trim().is_empty() => Some(policy),
                Ok(_) => {
                    tracing::warn!(area = ?self.area_name, "skipping policy with empty name");
                    None
                }
                Err(e) => {
                    tracing::warn!(area = ?self.area_name, error = %e, "skipping malformed policy");
                    None
                }
            })
            .collect()
    }
}

/// An approved policy as the backend reports it.
///
/// `policy_name` is the only required field. Master-policy payloads also
/// carry the owning country and area.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawPolicy {
    #[serde(default)]
    pub id: Option<serde_json::Value>,
    pub policy_name: String,
    #[serde(default)]
    pub policy_description: Option<String>,
    #[serde(default)]
    pub approved_at: Option<String>,
    #[serde(default)]
    pub country: Option<String>,
    #[serde(default)]
    pub policy_area: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
}

/// Body of `GET /public/statistics-fast`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PublicStatistics {
    #[serde(deserialize_with = "null_as_default")]
    pub countries_with_policies: u64,
    #[serde(deserialize_with = "null_as_default")]
    pub total_policies: u64,
    #[serde(deserialize_with = "null_as_default")]
    pub total_countries: u64,
}
