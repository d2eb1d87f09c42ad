//! Subcommand handlers. Each loads what it needs through the
//! [`MapDataService`] and prints plain text to stdout.

use std::collections::BTreeMap;
use std::sync::Arc;

use aipolicy_client::PolicyApiClient;
use aipolicy_core::AreaId;
use aipolicy_coverage::CountryCoverage;
use aipolicy_map::{MapDataService, MapSnapshot};

use crate::ViewArgs;

type Service = MapDataService<PolicyApiClient>;

/// Hydrates from disk, loads (or refreshes) and applies the requested view.
async fn load_map(service: &Service, view: ViewArgs) -> anyhow::Result<Arc<MapSnapshot>> {
    service.hydrate();
    if view.refresh {
        service.refresh().await?;
    } else {
        service.fetch_map_data().await?;
    }
    let snapshot = service.set_view(view.area, view.mode);
    if snapshot.served_stale {
        tracing::warn!(
            fetched_at = ?snapshot.fetched_at,
            "backend unavailable; showing cached country data"
        );
    }
    Ok(snapshot)
}

fn area_list(coverage: &CountryCoverage) -> String {
    coverage
        .approved_areas
        .iter()
        .copied()
        .map(AreaId::as_str)
        .collect::<Vec<_>>()
        .join(",")
}

pub(crate) async fn run_countries(
    service: &Service,
    view: ViewArgs,
    json: bool,
) -> anyhow::Result<()> {
    let snapshot = load_map(service, view).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(snapshot.countries())?);
        return Ok(());
    }

    for country in snapshot.countries() {
        let marker = if country.masked { "-" } else { " " };
        println!(
            "{marker} {:<40} {:<10} {:>2}/{} {} {}",
            country.canonical_name,
            country.level.as_str(),
            country.approved_area_count,
            AreaId::ALL.len(),
            country.color,
            area_list(country),
        );
    }
    println!("{} countries (mode: {})", snapshot.countries().len(), snapshot.options.color_mode);
    Ok(())
}

pub(crate) async fn run_suggest(
    service: &Service,
    view: ViewArgs,
    query: &str,
    limit: usize,
) -> anyhow::Result<()> {
    load_map(service, view).await?;
    for name in service.suggest(query, limit) {
        println!("{name}");
    }
    Ok(())
}

pub(crate) async fn run_stats(service: &Service, view: ViewArgs) -> anyhow::Result<()> {
    let snapshot = load_map(service, view).await?;
    let stats = snapshot.map_stats;
    println!("countries:               {}", stats.total_countries);
    println!("countries with policies: {}", stats.countries_with_policies);
    println!("total policies:          {}", stats.total_policies);
    println!(
        "levels:                  none {} / emerging {} / developing {} / advanced {}",
        stats.level_counts.none,
        stats.level_counts.emerging,
        stats.level_counts.developing,
        stats.level_counts.advanced,
    );
    if let Some(fetched_at) = snapshot.fetched_at {
        println!("data as of:              {}", fetched_at.format("%Y-%m-%d %H:%M:%S UTC"));
    }
    Ok(())
}

pub(crate) async fn run_country(service: &Service, name: &str) -> anyhow::Result<()> {
    // Coverage context comes from the cache; the policy list never does.
    service.hydrate();
    let detail = service.country_detail(name).await?;

    println!("{}", detail.canonical_name);
    if let Some(coverage) = &detail.coverage {
        println!(
            "  level {} ({} of {} areas): {}",
            coverage.level,
            coverage.approved_area_count,
            AreaId::ALL.len(),
            area_list(coverage),
        );
    }
    if detail.policies.is_empty() {
        println!("  no policies found");
    }
    for policy in &detail.policies {
        println!(
            "  - {} [{}] {}",
            policy.policy_name,
            policy.policy_area.as_deref().unwrap_or("unassigned"),
            policy.approved_at.as_deref().unwrap_or(""),
        );
    }
    Ok(())
}

pub(crate) async fn run_policies(service: &Service, limit: usize) -> anyhow::Result<()> {
    service.hydrate();
    let cached = service.master_policies().await?;
    for policy in cached.data.iter().take(limit) {
        println!(
            "{:<32} {:<28} {}",
            policy.country.as_deref().unwrap_or("?"),
            policy.policy_area.as_deref().unwrap_or("?"),
            policy.policy_name,
        );
    }
    println!(
        "showing {} of {} policies{}",
        limit.min(cached.data.len()),
        cached.data.len(),
        if cached.stale { " (stale)" } else { "" },
    );
    Ok(())
}

fn print_counts(title: &str, counts: &BTreeMap<String, u64>) {
    println!("{title}:");
    let mut sorted: Vec<_> = counts.iter().collect();
    sorted.sort_by(|a, b| b.1.cmp(a.1).then_with(|| a.0.cmp(b.0)));
    for (key, count) in sorted {
        println!("  {key:<40} {count}");
    }
}

pub(crate) async fn run_admin_stats(service: &Service) -> anyhow::Result<()> {
    service.hydrate();
    let cached = service.admin_statistics().await?;
    let stats = &cached.data;
    println!("total policies: {}", stats.total_policies);
    print_counts("by area", &stats.by_area);
    print_counts("by status", &stats.by_status);
    print_counts("by country", &stats.by_country);
    Ok(())
}

pub(crate) async fn run_cache_stats(service: &Service, view: ViewArgs) -> anyhow::Result<()> {
    load_map(service, view).await?;
    println!("{}", serde_json::to_string_pretty(&service.cache_statistics())?);
    Ok(())
}
