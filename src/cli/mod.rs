use std::path::PathBuf;

use clap::{Parser, Subcommand};
use lambda_sync::modules::aws::clients::InvocationType;

#[derive(Parser, Debug)]
#[command(name = "lambda-sync")]
#[command(about = "Reconciles AWS Lambda resources against a declared state", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// YAML configuration file [default: $LAMBDA_SYNC_CONFIG]
    #[arg(long)]
    pub config: Option<PathBuf>,

    #[arg(long, env = "AWS_REGION")]
    pub region: Option<String>,

    #[arg(long, env = "AWS_PROFILE")]
    pub profile: Option<String>,

    #[arg(long, env = "AWS_ENDPOINT_URL")]
    pub endpoint_url: Option<String>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Reconcile one resource described by an input document
    Apply {
        /// Input document (YAML or JSON); `-` reads stdin
        #[arg(long, short, default_value = "-")]
        file: String,

        /// Report what would change without changing anything
        #[arg(long)]
        check: bool,
    },
    /// Gather read-only facts about functions
    Facts {
        #[arg(long)]
        function_name: Option<String>,

        /// Include published versions
        #[arg(long)]
        versions: bool,

        #[arg(long)]
        max_items: Option<usize>,
    },
    /// Invoke a function
    Invoke {
        #[arg(long)]
        function_name: String,

        #[arg(long)]
        qualifier: Option<String>,

        #[arg(long, value_enum, default_value_t = InvocationType::RequestResponse)]
        invocation_type: InvocationType,

        /// Return the last 4 KB of the execution log
        #[arg(long)]
        tail: bool,

        /// Client context as a JSON object
        #[arg(long)]
        client_context: Option<String>,

        /// Event payload as JSON
        #[arg(long)]
        payload: Option<String>,

        /// Validate parameters and permissions with a dry run only
        #[arg(long)]
        check: bool,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_is_well_formed() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_apply_defaults_to_stdin() {
        let cli = Cli::try_parse_from(["lambda-sync", "apply"]).unwrap();
        match cli.command {
            Commands::Apply { file, check } => {
                assert_eq!(file, "-");
                assert!(!check);
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_config_path_is_only_taken_from_the_flag() {
        let cli = Cli::try_parse_from(["lambda-sync", "apply"]).unwrap();
        assert_eq!(cli.config, None);

        let cli =
            Cli::try_parse_from(["lambda-sync", "--config", "sync.yaml", "apply"]).unwrap();
        assert_eq!(cli.config, Some(PathBuf::from("sync.yaml")));
    }

    #[test]
    fn test_invoke_parses_invocation_type() {
        let cli = Cli::try_parse_from([
            "lambda-sync",
            "--region",
            "eu-west-1",
            "invoke",
            "--function-name",
            "fn-A",
            "--invocation-type",
            "dry-run",
        ])
        .unwrap();

        assert_eq!(cli.region.as_deref(), Some("eu-west-1"));
        match cli.command {
            Commands::Invoke {
                function_name,
                invocation_type,
                ..
            } => {
                assert_eq!(function_name, "fn-A");
                assert_eq!(invocation_type, InvocationType::DryRun);
            }
            other => panic!("unexpected command {:?}", other),
        }
    }
}
