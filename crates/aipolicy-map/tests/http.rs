//! End-to-end: `MapDataService` over a real `PolicyApiClient` and a mocked
//! backend.

use std::time::Duration;

use aipolicy_cache::FetchPolicy;
use aipolicy_client::{ClientTimeouts, PolicyApiClient};
use aipolicy_coverage::CoverageLevel;
use aipolicy_map::{MapDataService, ServiceSettings};
use serde_json::json;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn settings() -> ServiceSettings {
    let policy = FetchPolicy::new(Duration::from_secs(3600), Duration::from_secs(5))
        .with_retries(1, Duration::ZERO);
    ServiceSettings {
        countries: policy,
        policies: policy,
        statistics: policy,
        policies_limit: 1000,
    }
}

fn service(server: &MockServer) -> MapDataService<PolicyApiClient> {
    let client = PolicyApiClient::with_base_url(&server.uri(), "aipolicy-test/0.1", ClientTimeouts::default())
        .expect("client construction should not fail");
    MapDataService::new(client, settings())
}

fn advanced_country(name: &str) -> serde_json::Value {
    let areas = [
        "AI Safety",
        "CyberSafety",
        "Digital Education",
        "Digital Inclusion",
        "Digital Leisure",
        "Disinformation",
        "Digital Work",
        "Mental Health",
    ];
    json!({
        "country": name,
        "areas_detail": areas.iter().map(|area| json!({
            "area_name": area,
            "approved_policies": [{ "policy_name": format!("{area} act") }]
        })).collect::<Vec<_>>()
    })
}

#[tokio::test]
async fn loads_map_from_backend_with_statistics() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/countries"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "countries": [advanced_country("UK"), { "country": "Chad" }]
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/public/statistics-fast"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "countries_with_policies": 1,
            "total_policies": 8,
            "total_countries": 2
        })))
        .expect(1)
        .mount(&server)
        .await;

    let service = service(&server);
    let snapshot = service.fetch_map_data().await.unwrap();
    service.fetch_map_data().await.unwrap();

    let uk = snapshot.country("United Kingdom").unwrap();
    assert_eq!(uk.approved_area_count, 8);
    assert_eq!(uk.level, CoverageLevel::Advanced);
    assert_eq!(uk.color, "#22c55e");
    assert_eq!(snapshot.country("Chad").unwrap().level, CoverageLevel::None);
    assert_eq!(snapshot.map_stats.total_policies, 8);
}

#[tokio::test]
async fn backend_outage_after_first_load_serves_stale_map() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/countries"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "countries": [advanced_country("Germany")]
        })))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/countries"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/public/statistics-fast"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let service = service(&server);
    let first = service.fetch_map_data().await.unwrap();
    assert!(!first.served_stale);
    assert_eq!(first.map_stats.total_policies, 8, "derived when statistics fail");

    let second = service.refresh().await.unwrap();
    assert!(second.served_stale);
    assert_eq!(second.countries(), first.countries());
}
