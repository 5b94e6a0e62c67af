//! CLI command implementations

use std::sync::Arc;

use anyhow::Context;
use chrono::Utc;
use clap::Subcommand;
use driftnet_core::config::DriftnetConfig;
use driftnet_core::{
    DriftnetError, ExtractorRegistry, FsObjectStore, HttpTransport, LinkResolver, MediaCache,
    MediaService, ObjectStore, ReqwestTransport, TempObjectReaper, normalize_host,
};
use tokio_util::sync::CancellationToken;

/// Available CLI commands
#[derive(Subcommand)]
pub enum Commands {
    /// Show which capability handles a link, without network access
    Resolve {
        /// Media link
        link: String,
    },
    /// Extract media from a link and print it as JSON
    Fetch {
        /// Media link
        link: String,
        /// Mirror items into the local object store when the source requires it
        #[arg(long)]
        mirror: bool,
    },
    /// List registered capabilities and their hosts
    Sources,
    /// Delete expired objects from the cache bucket
    Reap {
        /// Run a single pass instead of the periodic scheduler
        #[arg(long)]
        once: bool,
    },
}

/// Handle the CLI command
///
/// # Errors
/// Returns the error of the command that failed
pub async fn handle_command(command: Commands) -> anyhow::Result<()> {
    let config = DriftnetConfig::from_env();

    match command {
        Commands::Resolve { link } => resolve_link(&config, &link),
        Commands::Fetch { link, mirror } => fetch_media(&config, &link, mirror).await,
        Commands::Sources => list_sources(&config),
        Commands::Reap { once } => reap(&config, once).await,
    }
}

fn build_transport(config: &DriftnetConfig) -> anyhow::Result<Arc<dyn HttpTransport>> {
    let transport = ReqwestTransport::new(
        &config.extraction.user_agent,
        config.extraction.connect_timeout,
    )
    .context("failed to build HTTP client")?;
    Ok(Arc::new(transport))
}

fn build_registry(
    config: &DriftnetConfig,
    transport: Arc<dyn HttpTransport>,
) -> anyhow::Result<Arc<ExtractorRegistry>> {
    let registry = driftnet_extract::default_registry(transport, &config.extraction)
        .map_err(DriftnetError::from)?;
    Ok(Arc::new(registry))
}

fn local_store(config: &DriftnetConfig) -> Arc<dyn ObjectStore> {
    Arc::new(FsObjectStore::new(config.storage.root.clone()))
}

/// Print the capability a link resolves to
///
/// # Errors
/// - `DriftnetError::Resolve` - The link is invalid or unsupported
pub fn resolve_link(config: &DriftnetConfig, link: &str) -> anyhow::Result<()> {
    let registry = build_registry(config, build_transport(config)?)?;
    let resolver = LinkResolver::new(registry);

    let info = resolver.resolve(link).map_err(DriftnetError::from)?;
    let host = info.url.host_str().map(normalize_host).unwrap_or_default();

    println!("Source:  {}", info.source);
    println!("Host:    {host}");
    println!("Caching: {:?}", info.extractor.cache_policy());

    Ok(())
}

/// Extract a link and print the media as JSON
///
/// Ctrl-C cancels the extraction.
///
/// # Errors
/// - `DriftnetError::Resolve` - The link is invalid or unsupported
/// - `DriftnetError::Extract` - Extraction failed
/// - `DriftnetError::Cache` - Mirroring failed
pub async fn fetch_media(config: &DriftnetConfig, link: &str, mirror: bool) -> anyhow::Result<()> {
    let transport = build_transport(config)?;
    let registry = build_registry(config, Arc::clone(&transport))?;

    let mut service = MediaService::new(
        LinkResolver::new(registry),
        config.extraction.extract_timeout,
    );
    if mirror {
        let cache = MediaCache::new(
            local_store(config),
            transport,
            config.storage.bucket.as_str(),
            &config.cache,
        )
        .map_err(DriftnetError::from)?;
        service = service.with_cache(cache);
    }

    let cancel = CancellationToken::new();
    let ctrl_c = {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                cancel.cancel();
            }
        })
    };

    let result = service.fetch(link, &cancel).await;
    ctrl_c.abort();

    let media = result?;
    let json = serde_json::to_string_pretty(&media).context("failed to encode media")?;
    println!("{json}");

    Ok(())
}

/// List registered capabilities
///
/// # Errors
/// - `DriftnetError::Registry` - Built-in capabilities collide
pub fn list_sources(config: &DriftnetConfig) -> anyhow::Result<()> {
    let registry = build_registry(config, build_transport(config)?)?;

    println!("Supported sources");
    println!("{:-<60}", "");
    for extractor in registry.extractors() {
        let mut hosts = extractor.hosts();
        hosts.sort();
        println!("{:<14} {}", extractor.source().as_str(), hosts.join(", "));
    }
    println!(
        "\n{} sources, {} hosts",
        registry.len(),
        registry.supported_hosts().len()
    );

    Ok(())
}

/// Run the cache reaper against the local object store
///
/// # Errors
/// - `ReaperError` - A single pass failed (`--once` only)
pub async fn reap(config: &DriftnetConfig, once: bool) -> anyhow::Result<()> {
    let reaper = TempObjectReaper::new(
        local_store(config),
        config.storage.bucket.as_str(),
        config.reaper.clone(),
    );

    if once {
        let report = reaper
            .run_tick(Utc::now(), &CancellationToken::new())
            .await
            .context("reaper pass failed")?;
        println!(
            "Scanned {} objects, deleted {}",
            report.scanned, report.deleted
        );
        return Ok(());
    }

    println!(
        "Reaping bucket '{}' every {:?}, press Ctrl-C to stop",
        config.storage.bucket, config.reaper.interval
    );
    let handle = reaper.spawn();

    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for Ctrl-C")?;

    if handle.shutdown().await {
        println!("Reaper stopped");
    } else {
        println!("Reaper stopped after cancelling an in-flight pass");
    }

    Ok(())
}
