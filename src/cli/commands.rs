use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::info;

use crate::config::DispatchConfig;
use crate::demo::{demo_registry, demo_services};
use crate::dispatcher::{DispatchOutcome, Dispatcher};
use crate::logging::{init_logging, LogConfig};
use crate::middleware::MetricsMiddleware;
use crate::retry::RetryPolicy;
use crate::runtime_config::RuntimeConfig;
use crate::server::{standard_pipeline, AppService, HttpServer};

/// Command-line interface for dyndispatch
#[derive(Parser, Debug)]
#[command(name = "dyndispatch", version)]
#[command(about = "Dynamic action dispatch server", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Serve the bundled handlers over HTTP
    Serve {
        /// YAML configuration file
        #[arg(short, long, env = "DYND_CONFIG")]
        config: Option<PathBuf>,

        /// Listen address, overriding `http.addr`
        #[arg(long)]
        addr: Option<String>,
    },
    /// List registered handlers and their actions
    Routes {
        #[arg(short, long, env = "DYND_CONFIG")]
        config: Option<PathBuf>,
    },
    /// Dispatch one path in-process and print the result size
    Dispatch {
        /// Request path, e.g. `/dynamic/account/photo/1045.jpg`
        path: String,

        #[arg(short, long, env = "DYND_CONFIG")]
        config: Option<PathBuf>,

        /// Attempts before giving up
        #[arg(long, default_value_t = 1)]
        attempts: u32,

        /// Delay between attempts in milliseconds
        #[arg(long, default_value_t = 100)]
        retry_delay_ms: u64,
    },
}

pub fn run_cli() -> Result<()> {
    let cli = Cli::parse();
    match cli.command {
        Commands::Serve { config, addr } => serve(config.as_deref(), addr),
        Commands::Routes { config } => {
            let config = DispatchConfig::load(config.as_deref())?;
            print!("{}", render_routes(&config)?);
            Ok(())
        }
        Commands::Dispatch {
            path,
            config,
            attempts,
            retry_delay_ms,
        } => {
            let config = DispatchConfig::load(config.as_deref())?;
            let policy = RetryPolicy::new(attempts, Duration::from_millis(retry_delay_ms));
            let runtime = RuntimeConfig::from_env().build_tokio()?;
            let body = runtime.block_on(dispatch_once(&config, &path, policy))?;
            match body {
                Some(bytes) => println!("{path}: {} bytes", bytes.len()),
                None => println!("{path}: not applicable"),
            }
            Ok(())
        }
    }
}

fn demo_dispatcher(config: &DispatchConfig) -> Result<Dispatcher> {
    let registry = demo_registry(&config.namespace).context("failed to build handler registry")?;
    Ok(Dispatcher::from_config(
        config,
        Arc::new(registry),
        Arc::new(demo_services()),
    ))
}

fn serve(config_path: Option<&Path>, addr: Option<String>) -> Result<()> {
    let _log_guard = init_logging(&LogConfig::from_env())?;
    let mut config = DispatchConfig::load(config_path)?;
    if let Some(addr) = addr {
        config.http.addr = addr;
    }

    let runtime_config = RuntimeConfig::from_env();
    runtime_config.apply_to_may();
    let runtime = runtime_config.build_tokio()?;

    let dispatcher = demo_dispatcher(&config)?;
    info!(
        handlers = dispatcher.handlers().len(),
        prefix = %config.route_prefix(),
        strict_types = config.strict_types,
        stack_size = runtime_config.stack_size,
        "starting dyndispatch"
    );

    let metrics = Arc::new(MetricsMiddleware::new());
    let pipeline = standard_pipeline(dispatcher, &config.route_prefix(), Arc::clone(&metrics));
    let service =
        AppService::new(Arc::new(pipeline), runtime.handle().clone()).with_metrics(metrics);
    let handle = HttpServer(service)
        .start(config.http.addr.as_str())
        .with_context(|| format!("failed to bind {}", config.http.addr))?;
    handle
        .join()
        .map_err(|_| anyhow::anyhow!("server coroutine panicked"))?;
    Ok(())
}

/// One line per action: `GET <prefix><handler>/<action>[/{arg}...]  <qualified name>`.
pub fn render_routes(config: &DispatchConfig) -> Result<String> {
    let dispatcher = demo_dispatcher(config)?;
    let prefix = config.route_prefix();
    let suffix = &config.handler_suffix;
    let mut out = String::new();
    for (qualified, descriptor) in dispatcher.handlers().handlers() {
        let segment = descriptor
            .name()
            .strip_suffix(suffix.as_str())
            .unwrap_or(descriptor.name())
            .to_lowercase();
        for action in descriptor.actions() {
            let args: String = (0..action.arity()).map(|i| format!("/{{arg{i}}}")).collect();
            out.push_str(&format!(
                "GET {prefix}{segment}/{}{args}  {qualified}\n",
                action.name()
            ));
        }
    }
    Ok(out)
}

async fn dispatch_once(
    config: &DispatchConfig,
    path: &str,
    policy: RetryPolicy,
) -> Result<Option<Vec<u8>>> {
    let dispatcher = demo_dispatcher(config)?;
    let dispatcher = &dispatcher;
    let outcome = policy
        .run(move |_| dispatcher.dispatch_path::<Vec<u8>>(path))
        .await?;
    Ok(match outcome {
        DispatchOutcome::Completed(bytes) => Some(bytes),
        DispatchOutcome::NotApplicable(_) => None,
    })
}
