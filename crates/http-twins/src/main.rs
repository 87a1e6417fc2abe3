//! http-twins: serves the demo book catalogue with request mirroring.

use std::sync::Arc;
use std::time::Duration;

use http_twins::config::TwinsConfig;
use http_twins::demo::BookStore;
use http_twins::handlers::HandlerRegistry;
use http_twins::mirror::{DirectiveTable, MirrorCoordinator, Properties, SenderRegistry};
use http_twins::server::{self, AppState};
use http_twins::stats::MirrorStats;

fn main() -> anyhow::Result<()> {
    // Parse CLI args
    let args: Vec<String> = std::env::args().collect();
    let config_path = args
        .iter()
        .position(|a| a == "--config")
        .and_then(|i| args.get(i + 1).cloned())
        .or_else(|| args.get(1).filter(|a| !a.starts_with('-')).cloned())
        .or_else(|| std::env::var("TWINS_CONFIG").ok())
        .unwrap_or_else(|| "http-twins.toml".to_string());

    let config = TwinsConfig::load(&config_path)?;

    // Build the tokio runtime first, the tonic exporter needs a reactor context
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;

    runtime.block_on(async {
        let tracing_guard = twins_tracing::init_tracing(&config.tracing);

        tracing::info!(
            config_path = %config_path,
            listen_address = %config.server.listen_address,
            otlp_export = tracing_guard.is_exporting(),
            "Starting http-twins"
        );

        run(config).await
    })
}

async fn run(config: TwinsConfig) -> anyhow::Result<()> {
    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(config.mirror.timeout_secs))
        .build()?;

    let registry = Arc::new(HandlerRegistry::with_builtins());
    let senders = Arc::new(SenderRegistry::http(client));
    let directives = DirectiveTable::from_routes(&config.routes)?;
    if directives.is_empty() {
        tracing::warn!("No mirror routes configured, requests are served without mirroring");
    } else {
        tracing::info!(routes = directives.len(), "Mirror routes loaded");
    }

    // Unknown names are not fatal: each dispatch reports a failed outcome.
    for route in &config.routes {
        if let Some(sender) = route.directive.remote_sender.as_deref() {
            if senders.resolve(Some(sender)).is_none() {
                tracing::warn!(
                    method = %route.method,
                    path = %route.path,
                    sender = %sender,
                    known = ?senders.names(),
                    "Route names an unregistered remote sender"
                );
            }
        }
        for name in &route.directive.local_destinations {
            if registry.resolve(name).is_none() {
                tracing::warn!(
                    method = %route.method,
                    path = %route.path,
                    handler = %name,
                    known = ?registry.names(),
                    "Route names an unregistered local handler"
                );
            }
        }
    }

    let properties = Arc::new(Properties::new(config.flat_properties()));
    let coordinator = MirrorCoordinator::new(
        &config.mirror,
        senders,
        registry,
        properties,
        MirrorStats::new(),
    );

    let state = AppState {
        config,
        coordinator,
        directives: Arc::new(directives),
        books: BookStore::new(),
    };

    server::run(state).await
}
