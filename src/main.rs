use std::sync::Arc;

use clap::Parser;
use color_eyre::eyre::{Result, eyre};
use tracing::{debug, info, warn};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use patchbay_image_cache::application::{FetchImagesUseCase, ResolveTokenUseCase};
use patchbay_image_cache::infrastructure::storage::TOKEN_ENV_VAR;
use patchbay_image_cache::infrastructure::{
    AppConfig, CliArgs, ConfigStore, DeviceImageCache, HttpImageFetcher, ObjectUrlRegistry,
};

fn init_logging(config: &AppConfig) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.log_level.to_string()));

    if let Some(log_path) = &config.log_path {
        if let Some(parent) = log_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(log_path)?;

        let file_layer = fmt::layer()
            .with_writer(file)
            .with_ansi(false)
            .with_target(true)
            .with_thread_ids(false);

        tracing_subscriber::registry()
            .with(filter)
            .with(file_layer)
            .init();

        info!(path = %log_path.display(), "Logging initialized");
    } else {
        let stderr_layer = fmt::layer().with_writer(std::io::stderr).with_target(false);
        tracing_subscriber::registry()
            .with(filter)
            .with(stderr_layer)
            .init();
    }

    Ok(())
}

fn load_config(args: &CliArgs) -> Result<AppConfig> {
    let mut config = ConfigStore::new()?.load(args.config.as_deref())?;
    config.merge_with_args(args);
    Ok(config)
}

fn create_cache(config: &AppConfig, args: &CliArgs) -> Result<DeviceImageCache> {
    let mut fetcher = HttpImageFetcher::new(
        config.http.base_url.as_deref(),
        &config.http.user_agent,
        ObjectUrlRegistry::new(),
    )?;

    let resolved = ResolveTokenUseCase::new().execute(
        args.token.clone(),
        std::env::var(TOKEN_ENV_VAR).ok(),
        config.http.token.clone(),
    );
    match resolved {
        Some(resolved) => fetcher = fetcher.with_token_provider(Arc::new(resolved.provider)),
        None => warn!("No API token configured, requests are unauthenticated"),
    }

    Ok(DeviceImageCache::new(Arc::new(fetcher), config.cache.limits()))
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    let _ = dotenvy::dotenv();

    let args = CliArgs::parse();
    let config = load_config(&args)?;

    init_logging(&config)?;

    info!(version = patchbay_image_cache::VERSION, "Starting patchbay-images");

    if args.images.is_empty() {
        return Err(eyre!("no images given, pass at least one [device-id=]url[@version]"));
    }

    let cache = create_cache(&config, &args)?;
    let watcher = cache.clone();
    let _subscription = cache.subscribe(move || {
        let stats = watcher.stats();
        debug!(
            entries = stats.current_entries,
            inflight = stats.inflight,
            "Image cache changed"
        );
    });

    let report = FetchImagesUseCase::new(cache.clone())
        .execute(&args.images, args.tenant.as_deref(), args.priority)
        .await;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("{report}");
    }

    cache.clear_all();
    Ok(())
}
