//! Pause operator binary.
//!
//! Watches one managed resource kind and pauses resources that have settled.

use anyhow::Result;
use clap::Parser;
use futures::StreamExt;
use kube::Client;
use kube::api::{Api, DynamicObject};
use kube::runtime::Controller;
use kube::runtime::controller::Config as ControllerConfig;
use kube::runtime::watcher::Config as WatcherConfig;
use pause_core::DecisionEngine;
use pause_core::providers::{RealRng, SystemClock};
use pause_operator::config::{OperatorConfig, parse_duration};
use pause_operator::controller::{ControllerContext, PauseReconciler, error_policy, reconcile};
use pause_operator::observability::{LogFormat, TracingConfig, init_tracing};
use pause_operator::store::KubeStore;
use std::sync::Arc;
use std::time::Duration;

/// Pause reconciliation of managed resources once they are Ready and Synced.
#[derive(Parser, Debug)]
#[command(name = "pause-operator")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// API group of the watched kind
    #[arg(long, env = "PAUSE_TARGET_GROUP", default_value = "")]
    group: String,

    /// API version of the watched kind
    #[arg(long, env = "PAUSE_TARGET_VERSION")]
    api_version: String,

    /// Kind to watch
    #[arg(long, env = "PAUSE_TARGET_KIND")]
    kind: String,

    /// Plural resource name, guessed from the kind when omitted
    #[arg(long, env = "PAUSE_TARGET_PLURAL")]
    plural: Option<String>,

    /// Only watch this namespace
    #[arg(short, long, env = "PAUSE_NAMESPACE")]
    namespace: Option<String>,

    /// Only watch resources matching this label selector
    #[arg(short = 'l', long, env = "PAUSE_LABEL_SELECTOR")]
    label_selector: Option<String>,

    /// Minimum time a resource stays unpaused before it can be paused again
    #[arg(long, env = "PAUSE_FROZEN_DURATION", default_value = "5m", value_parser = parse_duration)]
    frozen_duration: Duration,

    /// Force an unpause after this long paused (disabled when omitted)
    #[arg(long, env = "PAUSE_UNPAUSE_POLL_INTERVAL", value_parser = parse_duration)]
    unpause_poll_interval: Option<Duration>,

    /// Resources evaluated in parallel
    #[arg(long, env = "PAUSE_MAX_CONCURRENT_RECONCILES", default_value = "10")]
    max_concurrent_reconciles: u16,

    /// Attempts per evaluation when updates conflict
    #[arg(long, env = "PAUSE_MAX_ATTEMPTS", default_value = "2")]
    max_attempts: u32,

    /// Requeue delay after a failed evaluation
    #[arg(long, env = "PAUSE_ERROR_REQUEUE", default_value = "30s", value_parser = parse_duration)]
    error_requeue: Duration,

    /// Log format: json, pretty or compact
    #[arg(long)]
    log_format: Option<LogFormat>,
}

impl Cli {
    fn operator_config(&self) -> OperatorConfig {
        let mut config = OperatorConfig::new(&self.group, &self.api_version, &self.kind)
            .with_frozen_duration(self.frozen_duration)
            .with_max_concurrent_reconciles(self.max_concurrent_reconciles)
            .with_max_attempts(self.max_attempts)
            .with_error_requeue(self.error_requeue);
        config.plural = self.plural.clone();
        config.namespace = self.namespace.clone();
        config.label_selector = self.label_selector.clone();
        config.unpause_poll_interval = self.unpause_poll_interval;
        config
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut tracing_config = TracingConfig::from_env();
    if let Some(format) = cli.log_format {
        tracing_config = tracing_config.with_log_format(format);
    }
    init_tracing(&tracing_config)?;

    let config = cli.operator_config();
    config.validate()?;

    tracing::info!(
        group = %config.group,
        version = %config.version,
        kind = %config.kind,
        namespace = ?config.namespace,
        frozen_duration = ?config.frozen_duration,
        unpause_poll_interval = ?config.unpause_poll_interval,
        "Starting pause operator"
    );

    let client = Client::try_default().await?;
    tracing::info!("Connected to Kubernetes cluster");

    run_controller(client, config).await
}

/// Run the controller until a termination signal arrives.
async fn run_controller(client: Client, config: OperatorConfig) -> Result<()> {
    let api_resource = config.api_resource();
    let api: Api<DynamicObject> = match &config.namespace {
        Some(namespace) => Api::namespaced_with(client.clone(), namespace, &api_resource),
        None => Api::all_with(client.clone(), &api_resource),
    };

    let mut watcher_config = WatcherConfig::default();
    if let Some(selector) = &config.label_selector {
        watcher_config = watcher_config.labels(selector);
    }

    let store = KubeStore::new(client, api_resource.clone());
    let engine = DecisionEngine::new(config.policy(), Arc::new(RealRng::new()));
    let reconciler = PauseReconciler::new(store, engine, Arc::new(SystemClock))
        .with_max_attempts(config.max_attempts);
    let ctx = Arc::new(ControllerContext::new(reconciler, config.error_requeue));

    Controller::new_with(api, watcher_config, api_resource)
        .with_config(ControllerConfig::default().concurrency(config.max_concurrent_reconciles))
        .shutdown_on_signal()
        .run(reconcile::<KubeStore>, error_policy::<KubeStore>, ctx)
        .for_each(|result| async move {
            match result {
                Ok((obj, action)) => {
                    tracing::debug!(resource = %obj.name, ?action, "Reconciled resource");
                }
                Err(e) => {
                    tracing::warn!(error = %e, "Controller stream error");
                }
            }
        })
        .await;

    tracing::info!("Pause operator stopped");
    Ok(())
}
