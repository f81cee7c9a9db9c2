use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use uni_gateway::gateway::{
    ConfigLoader, ConfigSource, GatewaySnapshot, ModelList, list_all_models, resolve_models,
};

/// Inspect the gateway configuration the way the serving process sees it.
#[derive(Debug, Parser)]
#[command(name = "uni-gateway", version)]
struct Cli {
    /// Configuration file; `CONFIG_URL` is tried when it yields nothing.
    #[arg(long, global = true, value_name = "FILE", default_value = "./api.yaml")]
    config: PathBuf,

    /// Remote YAML configuration used as fallback.
    #[arg(long, global = true, value_name = "URL", env = "CONFIG_URL")]
    config_url: Option<String>,

    /// Emit logs as JSON lines.
    #[arg(long, global = true)]
    json_logs: bool,

    /// Export spans to this OTLP/HTTP endpoint (requires `gateway-otel`).
    #[arg(long, global = true, value_name = "URL")]
    otel_endpoint: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Print the model catalog, optionally filtered by an API key's entitlements.
    Models {
        #[arg(long, value_name = "KEY")]
        key: Option<String>,
    },
    /// Load and validate the configuration.
    Check,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    let _telemetry = match uni_gateway::telemetry::init_tracing(
        "uni-gateway",
        cli.json_logs,
        cli.otel_endpoint.as_deref(),
    ) {
        Ok(guard) => guard,
        Err(err) => {
            eprintln!("failed to initialize logging: {err}");
            return ExitCode::FAILURE;
        }
    };

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("{err}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    let mut loader = ConfigLoader::new(&cli.config);
    if let Some(url) = cli.config_url.filter(|url| !url.trim().is_empty()) {
        loader = loader.with_config_url(url);
    }
    let snapshot = load_snapshot(&loader).await?;
    println!("{}", render(&cli.command, &snapshot)?);
    Ok(())
}

fn render(
    command: &Command,
    snapshot: &GatewaySnapshot,
) -> Result<String, Box<dyn std::error::Error>> {
    match command {
        Command::Models { key } => {
            let models = match key {
                Some(key) => resolve_models(key, snapshot)?,
                None => list_all_models(snapshot),
            };
            Ok(serde_json::to_string_pretty(&ModelList::new(models))?)
        }
        Command::Check => {
            let models: usize = snapshot
                .providers()
                .iter()
                .map(|provider| provider.models().len())
                .sum();
            Ok(format!(
                "ok: providers={} models={} api_keys={}",
                snapshot.providers().len(),
                models,
                snapshot.api_keys().len()
            ))
        }
    }
}

async fn load_snapshot(
    loader: &ConfigLoader,
) -> Result<GatewaySnapshot, Box<dyn std::error::Error>> {
    match loader.load().await? {
        Some(snapshot) => Ok(snapshot),
        None => Err(format!(
            "no configuration found at {} or CONFIG_URL",
            loader.path().display()
        )
        .into()),
    }
}
