//! injector-worker: loads instrumentation configuration and admits workloads.
//!
//! Reads ConfigMap and custom-resource YAML from the config directory into the
//! rule registry, then evaluates every workload file given on the command
//! line and prints the resulting patch list as JSON. With `--watch` and no
//! workload files it keeps the registry hot-reloaded until interrupted.

use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tracing::{error, info, warn};

use injector_core::config::{load_dotenv, Config};
use injector_patch::{AdmissionEngine, AdmissionRequest, NamespaceLookup, StaticNamespaces};
use injector_rules::loader::{ConfigLoader, LoadStatus, ObjectApplier};
use injector_rules::{Registry, RuleResolver};

// ── CLI ─────────────────────────────────────────────────────────────

/// Instrumentation injector: resolves rules and prints workload patches.
#[derive(Parser, Debug)]
#[command(name = "injector-worker", version, about)]
struct Cli {
    /// Directory holding ConfigMap and custom-resource YAML files.
    #[arg(long, env = "INJECTOR_CONFIG_DIR")]
    config_dir: Option<PathBuf>,

    /// Namespace the injector runs in.
    #[arg(long, env = "INJECTOR_NAMESPACE")]
    namespace: Option<String>,

    /// Skip namespace-scoped rules during resolution.
    #[arg(long)]
    crds_disabled: bool,

    /// Keep watching the config directory.
    #[arg(long)]
    watch: bool,

    /// YAML list of namespace metadata used by namespace naming strategies.
    #[arg(long, env = "INJECTOR_NAMESPACES_FILE")]
    namespaces: Option<PathBuf>,

    /// Namespace for workloads that carry none.
    #[arg(long, default_value = "default")]
    namespace_hint: String,

    /// Print the registry contents after loading.
    #[arg(long)]
    describe: bool,

    /// Workload (pod) YAML or JSON files to admit.
    workloads: Vec<PathBuf>,
}

impl Cli {
    fn config(&self) -> Config {
        let mut config = Config::from_env();
        if let Some(dir) = &self.config_dir {
            config.config_dir = dir.clone();
        }
        if let Some(namespace) = &self.namespace {
            config.namespace = namespace.clone();
        }
        config.crds_disabled |= self.crds_disabled;
        config.watch = self.watch;
        config
    }
}

fn namespaces(path: Option<&PathBuf>) -> anyhow::Result<StaticNamespaces> {
    let Some(path) = path else {
        return Ok(StaticNamespaces::new());
    };
    let contents = fs::read_to_string(path)
        .with_context(|| format!("reading namespaces file {}", path.display()))?;
    let namespaces = StaticNamespaces::from_yaml(&contents)?;
    info!(path = %path.display(), count = namespaces.len(), "loaded namespace metadata");
    Ok(namespaces)
}

// ── main ────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    load_dotenv();
    let cli = Cli::parse();
    let config = cli.config();
    config.log_summary();

    let registry = Arc::new(Registry::default());
    let applier = ObjectApplier::new(Arc::clone(&registry), &config);
    let mut loader = ConfigLoader::new(config.config_dir.clone(), applier.clone());

    for result in loader.load_all()? {
        if let LoadStatus::Failed { .. } = result.status {
            warn!(%result, "configuration file rejected");
        } else {
            info!(%result, "configuration file");
        }
    }
    if config.watch {
        loader.watch()?;
    }
    if cli.describe {
        println!("{}", serde_json::to_string_pretty(&registry.describe())?);
    }

    let namespaces: Arc<dyn NamespaceLookup> = Arc::new(namespaces(cli.namespaces.as_ref())?);
    let engine = AdmissionEngine::new(applier, RuleResolver::new(config.crds_disabled), namespaces);

    let mut failed = 0usize;
    for path in &cli.workloads {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("reading workload {}", path.display()))?;
        match engine.admit(&AdmissionRequest::pod(cli.namespace_hint.as_str(), contents)) {
            Ok(patches) => {
                info!(path = %path.display(), patches = patches.len(), "workload admitted");
                println!("{}", serde_json::to_string_pretty(&patches)?);
            }
            Err(e) => {
                error!(path = %path.display(), error = %e, "admission failed");
                failed += 1;
            }
        }
    }

    if config.watch && cli.workloads.is_empty() {
        info!(dir = %loader.config_dir().display(), "watching for configuration changes");
        tokio::signal::ctrl_c().await?;
        info!("injector-worker exited cleanly");
    }

    if failed > 0 {
        anyhow::bail!("{} of {} workloads failed admission", failed, cli.workloads.len());
    }
    Ok(())
}
