use super::*;

fn test_client(base_url: &str) -> PolicyApiClient {
    PolicyApiClient::with_base_url(base_url, "aipolicy-test/0.1", ClientTimeouts::default())
        .expect("client construction should not fail")
}

#[test]
fn build_url_appends_to_base_path() {
    let client = test_client("https://api.example.org/api");
    let url = client.build_url("countries", &[]).unwrap();
    assert_eq!(url.as_str(), "https://api.example.org/api/countries");
}

#[test]
fn build_url_strips_trailing_slash() {
    let client = test_client("https://api.example.org/api///");
    let url = client
        .build_url("public/master-policies-fast", &[("limit", "50")])
        .unwrap();
    assert_eq!(
        url.as_str(),
        "https://api.example.org/api/public/master-policies-fast?limit=50"
    );
}

#[test]
fn build_url_encodes_country_names() {
    let client = test_client("https://api.example.org");
    let url = client
        .build_url("public/master-policies-no-dedup", &[("country", "Côte d'Ivoire")])
        .unwrap();
    assert!(
        !url.as_str().contains(' ') && url.as_str().contains("country=C%C3%B4te"),
        "country should be percent-encoded: {url}"
    );
}

#[test]
fn invalid_base_url_is_rejected() {
    let result = PolicyApiClient::with_base_url("not a url", "ua", ClientTimeouts::default());
    assert!(matches!(result, Err(ApiError::InvalidBaseUrl { .. })));
}

#[test]
fn parse_each_drops_malformed_values() {
    let values = vec![
        serde_json::json!({ "policy_name": "Kept" }),
        serde_json::json!({ "policy_description": "no name" }),
        serde_json::json!(42),
    ];
    let parsed: Vec<RawPolicy> = parse_each(values, "policy");
    assert_eq!(parsed.len(), 1);
    assert_eq!(parsed[0].policy_name, "Kept");
}
