mod commands;

use aipolicy_client::PolicyApiClient;
use aipolicy_core::AreaId;
use aipolicy_coverage::ColorMode;
use aipolicy_map::MapDataService;
use clap::{Args, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "aipolicy-cli")]
#[command(about = "Query AI policy coverage by country")]
struct Cli {
    #[command(flatten)]
    view: ViewArgs,

    #[command(subcommand)]
    command: Commands,
}

/// How the map is loaded and colored.
#[derive(Debug, Clone, Copy, Args)]
pub(crate) struct ViewArgs {
    /// Color mode: semantic, rgb-pure, area-dominant or atlas
    #[arg(long, global = true, default_value = "semantic")]
    pub mode: ColorMode,
    /// Mask countries without an approved policy in this area (e.g. ai-safety)
    #[arg(long, global = true)]
    pub area: Option<AreaId>,
    /// Refetch even when cached data is still fresh
    #[arg(long, global = true)]
    pub refresh: bool,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// List every country with its coverage level and color
    Countries {
        /// Print the coverage entries as JSON
        #[arg(long)]
        json: bool,
    },
    /// Suggest country names containing a query
    Suggest {
        query: String,
        /// Maximum number of suggestions
        #[arg(long, default_value = "10")]
        limit: usize,
    },
    /// Show headline map statistics
    Stats,
    /// Show every policy for one country, bypassing the cache
    Country { name: String },
    /// List master policies
    Policies {
        /// Maximum number of policies to show
        #[arg(long, default_value = "20")]
        limit: usize,
    },
    /// Show policy totals per area, country and status
    AdminStats,
    /// Load the map and print cache counters
    CacheStats,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    // `.env` was loaded above.
    let config = aipolicy_core::load_app_config_from_env()?;
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(config.log_level.clone()))?;
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .init();
    tracing::debug!(?config, "configuration loaded");

    let client = PolicyApiClient::from_config(&config)
        .map_err(|e| anyhow::anyhow!("failed to build policy API client: {e}"))?;
    let service = MapDataService::from_config(client, &config);

    match cli.command {
        Commands::Countries { json } => commands::run_countries(&service, cli.view, json).await,
        Commands::Suggest { query, limit } => {
            commands::run_suggest(&service, cli.view, &query, limit).await
        }
        Commands::Stats => commands::run_stats(&service, cli.view).await,
        Commands::Country { name } => commands::run_country(&service, &name).await,
        Commands::Policies { limit } => commands::run_policies(&service, limit).await,
        Commands::AdminStats => commands::run_admin_stats(&service).await,
        Commands::CacheStats => commands::run_cache_stats(&service, cli.view).await,
    }
}
