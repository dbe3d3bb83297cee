use std::io::Read;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use serde_json::Value as JsonValue;
use tracing::info;

use lambda_sync::controller::Controller;
use lambda_sync::modules::aws::facts::{self, FactsQuery};
use lambda_sync::modules::aws::invoke::{self, InvokeParams};
use lambda_sync::modules::aws::AwsClients;
use lambda_sync::telemetry;
use lambda_sync::utils::Config;

mod cli;

use cli::{Cli, Commands};

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();

    if let Err(e) = telemetry::init_telemetry() {
        eprintln!("Failed to initialize telemetry: {}", e);
    }

    let cli = Cli::parse();
    let outcome = run(cli).await;
    telemetry::shutdown_telemetry();

    match outcome {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

fn load_config(cli: &Cli) -> Result<Config> {
    let mut config = Config::load(cli.config.as_deref())?;

    if cli.region.is_some() {
        config.region = cli.region.clone();
    }
    if cli.profile.is_some() {
        config.profile = cli.profile.clone();
    }
    if cli.endpoint_url.is_some() {
        config.endpoint_url = cli.endpoint_url.clone();
    }

    info!("Loaded configuration: {}", config);
    Ok(config)
}

fn read_input(file: &str) -> Result<String> {
    if file == "-" {
        let mut buffer = String::new();
        std::io::stdin()
            .read_to_string(&mut buffer)
            .context("Failed to read input document from stdin")?;
        Ok(buffer)
    } else {
        std::fs::read_to_string(file)
            .with_context(|| format!("Failed to read input document: {}", file))
    }
}

fn parse_json_arg(name: &str, value: Option<&str>) -> Result<Option<JsonValue>> {
    value
        .map(|v| serde_json::from_str(v).with_context(|| format!("--{} must be valid JSON", name)))
        .transpose()
}

fn print(document: &impl serde::Serialize) -> Result<()> {
    let rendered =
        serde_json::to_string_pretty(document).context("Failed to render output document")?;
    println!("{}", rendered);
    Ok(())
}

/// Returns whether the command succeeded.
async fn run(cli: Cli) -> Result<bool> {
    let config = load_config(&cli)?;
    let clients = AwsClients::from_config(&config).await;

    match cli.command {
        Commands::Apply { file, check } => {
            let text = read_input(&file)?;
            let controller = Controller::with_modules(config.retry_policy(), clients.modules());

            let document = controller.reconcile_document(&text, check).await;
            print(&document)?;
            Ok(document.is_success())
        }
        Commands::Facts {
            function_name,
            versions,
            max_items,
        } => {
            let query = FactsQuery {
                function_name,
                include_versions: versions,
                max_items,
            };
            let document = facts::gather(clients.lambda.as_ref(), &query).await?;
            print(&document)?;
            Ok(true)
        }
        Commands::Invoke {
            function_name,
            qualifier,
            invocation_type,
            tail,
            client_context,
            payload,
            check,
        } => {
            let params = InvokeParams {
                function_name,
                qualifier,
                invocation_type,
                tail_log: tail,
                client_context: parse_json_arg("client-context", client_context.as_deref())?,
                payload: parse_json_arg("payload", payload.as_deref())?,
            };
            let document = invoke::invoke(clients.lambda.as_ref(), &params, check).await?;
            print(&document)?;
            Ok(document["function_error"].is_null())
        }
    }
}
