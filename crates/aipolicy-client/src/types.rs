//! Response envelopes of the policy backend.

use serde::Deserialize;

/// `GET /countries` → `{ "countries": [...] }`.
///
/// Records stay raw here so the client can skip malformed ones individually.
#[derive(Debug, Deserialize)]
pub struct CountriesResponse {
    #[serde(default)]
    pub countries: Vec<serde_json::Value>,
}

/// `GET /public/master-policies-*` → `{ "policies": [...] }`.
#[derive(Debug, Deserialize)]
pub struct PoliciesResponse {
    #[serde(default)]
    pub policies: Vec<serde_json::Value>,
}
