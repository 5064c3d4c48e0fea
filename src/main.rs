// ABOUTME: Entry point for the prism binary.
// ABOUTME: Parses CLI arguments, initializes tracing, discovers agents, and starts the HTTP server.

use std::sync::Arc;

use anyhow::Context;
use clap::{Args, Parser, Subcommand};

use prism_core::AgentRegistry;
use prism_loader::{Discovery, DiscoveryReport};
use prism_server::{AppState, Frontend, PrismConfig, create_router, mount};

#[derive(Debug, Parser)]
#[command(name = "prism", version, about = "Playground for discovering and chatting with agents")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Discover agents in a package and serve the playground.
    Start(StartArgs),
    /// Discover agents in a package and print them with their scenarios.
    List {
        /// Dotted package identifier, e.g. `my_agents` or `company.support`.
        package: String,
    },
}

#[derive(Debug, Args)]
struct StartArgs {
    /// Dotted package identifier, e.g. `my_agents` or `company.support`.
    package: String,

    #[arg(long)]
    host: Option<String>,

    #[arg(long)]
    port: Option<u16>,

    /// Path prefix to mount every route under.
    #[arg(long)]
    root_path: Option<String>,

    /// Runtime worker threads.
    #[arg(short = 'w', long)]
    workers: Option<usize>,

    /// Proxy the UI to the dev server instead of serving built files.
    #[arg(long)]
    dev: bool,
}

impl StartArgs {
    /// Export the given flags as PRISM_* variables so config loading sees one source.
    fn export_env(&self) {
        // SAFETY: runs on the main thread before any runtime or other thread starts
        unsafe {
            std::env::set_var("PRISM_PACKAGE", &self.package);
            if let Some(host) = &self.host {
                std::env::set_var("PRISM_HOST", host);
            }
            if let Some(port) = self.port {
                std::env::set_var("PRISM_PORT", port.to_string());
            }
            if let Some(root_path) = &self.root_path {
                std::env::set_var("PRISM_ROOT_PATH", root_path);
            }
            if let Some(workers) = self.workers {
                std::env::set_var("PRISM_WORKERS", workers.to_string());
            }
            if self.dev {
                std::env::set_var("PRISM_DEV", "true");
            }
        }
    }
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "prism=info,prism_server=info,prism_loader=info,prism_agent=info,tower_http=debug"
                    .parse()
                    .unwrap()
            }),
        )
        .init();

    let cli = Cli::parse();
    match cli.command {
        Command::Start(args) => {
            args.export_env();
            let config = PrismConfig::from_env()?;
            start(config)
        }
        Command::List { package } => list(&package),
    }
}

fn discovery(search_path: Option<&str>) -> Discovery {
    match search_path {
        Some(list) => Discovery::default().search_path_list(list),
        None => Discovery::default(),
    }
}

/// Discover agents for the configured package. Failure leaves the registry empty
/// rather than stopping the server.
fn load_registry(config: &PrismConfig) -> Arc<AgentRegistry> {
    let registry = Arc::new(AgentRegistry::new());
    if let Err(e) = discovery(config.search_path.as_deref()).discover(&config.package, &registry) {
        tracing::error!(
            package = %config.package,
            error = %e,
            "agent discovery failed, serving without agents"
        );
    }
    registry
}

fn start(config: PrismConfig) -> anyhow::Result<()> {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(config.workers)
        .enable_all()
        .build()
        .context("failed to build the async runtime")?;
    runtime.block_on(serve(config))
}

async fn serve(config: PrismConfig) -> anyhow::Result<()> {
    tracing::info!(package = %config.package, workers = config.workers, "prism starting up");

    let registry = load_registry(&config);
    let state = AppState::new(registry)
        .with_run_timeout(config.run_timeout)
        .shared();

    let frontend = if config.dev {
        Frontend::dev_proxy(config.dev_server_url.clone())
    } else {
        Frontend::static_dir(config.static_dir.clone())
    };
    let app = mount(create_router(state, Some(frontend)), &config.root_path);

    let listener = tokio::net::TcpListener::bind(config.bind_addr())
        .await
        .with_context(|| format!("failed to bind {}", config.bind_addr()))?;
    tracing::info!(
        addr = %listener.local_addr()?,
        root_path = %config.root_path,
        dev = config.dev,
        "prism listening"
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    tracing::info!("prism shut down");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
}

fn list(package: &str) -> anyhow::Result<()> {
    let search_path = std::env::var("PRISM_PATH").ok();
    let registry = AgentRegistry::new();
    let report = discovery(search_path.as_deref())
        .discover(package, &registry)
        .with_context(|| format!("failed to discover agents in '{}'", package))?;

    print!("{}", render_listing(&report, &registry));
    Ok(())
}

fn render_listing(report: &DiscoveryReport, registry: &AgentRegistry) -> String {
    let mut out = format!("{} ({})\n", report.package, report.root.display());
    if registry.is_empty() {
        out.push_str("  no agents found\n");
    }
    for summary in registry.list_all() {
        out.push_str(&format!("  {}\n", summary.name));
        for scenario in &summary.scenarios {
            out.push_str(&format!("    - {}\n", scenario.name));
        }
    }
    for skipped in &report.skipped {
        out.push_str(&format!("  ! {} skipped: {}\n", skipped.module, skipped.reason));
    }
    out
}
