//! # attest CLI entry point
//!
//! Parses command-line arguments, loads [`EngineConfig`] from the
//! environment and dispatches to subcommand handlers. Logs go to stderr so
//! stdout carries only JSON results.

use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use attest_cli::config::{run_config, ConfigArgs};
use attest_cli::generate::{run_generate, GenerateArgs};
use attest_cli::run::{run_run, RunArgs};
use attest_cli::systems::{run_systems, SystemsArgs};
use attest_cli::verify::{run_verify, VerifyArgs};
use attest_service::EngineConfig;

/// Attest proof engine CLI.
///
/// Generates and verifies proofs with the configured backends and runs
/// queued jobs on an in-process worker pool.
#[derive(Parser, Debug)]
#[command(name = "attest", version, about, long_about = None)]
struct Cli {
    /// Enable verbose output. Repeat for more verbosity (-v, -vv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// List registered proof systems and their capabilities.
    Systems(SystemsArgs),

    /// Generate a proof from command-line input.
    Generate(GenerateArgs),

    /// Verify a proof against its verification key.
    Verify(VerifyArgs),

    /// Submit a request file to the worker pool and wait for the results.
    Run(RunArgs),

    /// Print the effective engine configuration.
    Config(ConfigArgs),
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    let config = EngineConfig::from_env();
    init_tracing(
        cli.verbose,
        config.as_ref().map(|c| c.log_json).unwrap_or(false),
    );

    let config = match config {
        Ok(config) => config,
        Err(e) => {
            tracing::error!("invalid configuration: {e}");
            return ExitCode::from(1);
        }
    };
    tracing::debug!(?config, "attest CLI starting");

    let result = match &cli.command {
        Commands::Systems(args) => run_systems(args, &config),
        Commands::Generate(args) => run_generate(args, &config).await,
        Commands::Verify(args) => run_verify(args, &config),
        Commands::Run(args) => run_run(args, &config).await,
        Commands::Config(args) => run_config(args, &config),
    };

    match result {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            tracing::error!("{e:#}");
            ExitCode::from(1)
        }
    }
}

/// `RUST_LOG` wins over `-v`; without either the level is `info`.
fn init_tracing(verbose: u8, json: bool) {
    let level = match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    use attest_core::ProofSystemId;

    #[test]
    fn cli_parse_systems() {
        let cli = Cli::try_parse_from(["attest", "systems", "--ids"]).unwrap();
        if let Commands::Systems(args) = cli.command {
            assert!(args.ids);
        } else {
            panic!("expected systems");
        }
    }

    #[test]
    fn cli_parse_generate_defaults() {
        let cli = Cli::try_parse_from(["attest", "generate", "commitment", "--value", "hello"])
            .unwrap();
        if let Commands::Generate(args) = cli.command {
            assert_eq!(args.system, ProofSystemId::commitment());
            assert_eq!(args.data_type, "string");
            assert_eq!(args.value, "hello");
            assert!(!args.run_async);
            assert_eq!(args.priority, 0);
            assert!(args.out.is_none());
        } else {
            panic!("expected generate");
        }
    }

    #[test]
    fn cli_parse_generate_async_low_priority() {
        let cli = Cli::try_parse_from([
            "attest",
            "generate",
            "stark",
            "--type",
            "json",
            "--value",
            r#"{"a":7,"b":8,"c":56}"#,
            "--async",
            "--priority",
            "-1",
        ])
        .unwrap();
        if let Commands::Generate(args) = cli.command {
            assert_eq!(args.system, ProofSystemId::stark());
            assert_eq!(args.data_type, "json");
            assert!(args.run_async);
            assert_eq!(args.priority, -1);
        } else {
            panic!("expected generate");
        }
    }

    #[test]
    fn cli_rejects_out_of_range_priority() {
        assert!(Cli::try_parse_from([
            "attest", "generate", "stark", "--value", "x", "--priority", "5"
        ])
        .is_err());
    }

    #[test]
    fn cli_rejects_malformed_system_id() {
        assert!(Cli::try_parse_from(["attest", "generate", "Not An Id", "--value", "x"]).is_err());
    }

    #[test]
    fn cli_parse_verify() {
        let cli = Cli::try_parse_from([
            "attest",
            "verify",
            "commitment",
            "proof.json",
            "vk.json",
            "--public-inputs",
            "inputs.json",
        ])
        .unwrap();
        if let Commands::Verify(args) = cli.command {
            assert_eq!(args.proof, PathBuf::from("proof.json"));
            assert_eq!(args.verification_key, PathBuf::from("vk.json"));
            assert_eq!(args.public_inputs, Some(PathBuf::from("inputs.json")));
        } else {
            panic!("expected verify");
        }
    }

    #[test]
    fn cli_parse_run_with_overrides() {
        let cli = Cli::try_parse_from([
            "attest",
            "-vv",
            "run",
            "requests.json",
            "--concurrency",
            "2",
            "--timeout",
            "30",
        ])
        .unwrap();
        assert_eq!(cli.verbose, 2);
        if let Commands::Run(args) = cli.command {
            assert_eq!(args.requests, PathBuf::from("requests.json"));
            assert_eq!(args.concurrency, Some(2));
            assert_eq!(args.timeout, 30);
        } else {
            panic!("expected run");
        }
    }

    #[test]
    fn cli_parse_config() {
        let cli = Cli::try_parse_from(["attest", "config"]).unwrap();
        assert!(matches!(cli.command, Commands::Config(_)));
    }

    #[test]
    fn cli_requires_a_subcommand() {
        assert!(Cli::try_parse_from(["attest"]).is_err());
    }
}
