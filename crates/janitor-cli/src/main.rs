//! kube-janitor - periodic Kubernetes resource reaper
//!
//! Loads the declarative configuration, connects to the cluster, exposes
//! metrics and health endpoints, and runs the reaping engine on a fixed
//! interval (or once with `--once`).

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use kube::config::{KubeConfigOptions, Kubeconfig};
use miette::{IntoDiagnostic, Result, WrapErr};
use prometheus_client::registry::Registry;
use tokio::time::Instant;
use tracing::{error, info};

use janitor_core::Config;
use janitor_kube::{Janitor, JanitorMetrics};

mod logging;
mod opts;
mod server;

use opts::Opts;

/// Grace period before the first run after startup.
const SETTLE_DELAY: Duration = Duration::from_secs(10);

#[tokio::main]
async fn main() -> Result<()> {
    let opts = Opts::parse();
    logging::init(&opts.log);

    info!(path = %opts.config.display(), "reading configuration from file");
    let config = Config::load(&opts.config)
        .into_diagnostic()
        .wrap_err("failed to load configuration")?;
    info!(
        rules = config.rules.len(),
        ttlMode = config.ttl_mode_enabled(),
        dryRun = opts.dry_run,
        "configuration loaded"
    );

    let client = build_client(opts.kubeconfig.as_deref()).await?;

    let metrics = Arc::new(JanitorMetrics::default());
    let mut registry = Registry::default();
    metrics.register(&mut registry);

    let janitor = Janitor::new(client, config, metrics)
        .dry_run(opts.dry_run)
        .page_limit(opts.kube_items_per_page);

    if opts.once {
        janitor.run().await.into_diagnostic()?;
        return Ok(());
    }

    let bind = opts.server.bind_addr()?;
    let mut http_server = tokio::spawn(server::serve(
        bind,
        opts.server.read_timeout,
        opts.server.write_timeout,
        Arc::new(registry),
    ));

    let worker = async {
        // wait for settle down
        tokio::time::sleep(SETTLE_DELAY).await;
        loop {
            info!("starting janitor run");
            let started = Instant::now();
            match janitor.run().await {
                Ok(()) => info!(
                    duration = %humantime::format_duration(started.elapsed()),
                    nextRunIn = %humantime::format_duration(opts.interval),
                    "janitor run finished"
                ),
                Err(err) => error!(error = %err, "janitor run failed"),
            }
            tokio::time::sleep(opts.interval).await;
        }
    };

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            info!("received interrupt, shutting down");
            Ok(())
        }
        result = &mut http_server => {
            result
                .into_diagnostic()
                .wrap_err("metrics server task failed")?
                .into_diagnostic()
                .wrap_err("metrics server failed")
        }
        _ = worker => unreachable!("janitor worker loop never returns"),
    }
}

/// Build a client from an explicit kubeconfig, or infer the configuration
/// (in-cluster service account, then local defaults).
async fn build_client(kubeconfig: Option<&Path>) -> Result<kube::Client> {
    let config = match kubeconfig {
        Some(path) => {
            let kubeconfig = Kubeconfig::read_from(path)
                .into_diagnostic()
                .wrap_err_with(|| format!("failed to read kubeconfig '{}'", path.display()))?;
            kube::Config::from_custom_kubeconfig(kubeconfig, &KubeConfigOptions::default())
                .await
                .into_diagnostic()
                .wrap_err("failed to load kubeconfig")?
        }
        None => kube::Config::infer()
            .await
            .into_diagnostic()
            .wrap_err("failed to infer cluster configuration")?,
    };

    kube::Client::try_from(config)
        .into_diagnostic()
        .wrap_err("failed to build kubernetes client")
}
