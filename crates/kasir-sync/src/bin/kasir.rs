//! # Kasir Operator CLI
//!
//! Small maintenance commands for a till.
//!
//! ## Usage
//! ```bash
//! # Encode / decode a value with the configured codec secret
//! kasir encode "token-123"
//! kasir decode "q3Jx...=="
//!
//! # Ask the integrator for a POS group
//! kasir group-pos group_pos=G1 browser=firefox "waktu=2024-01-01 10:00:00"
//!
//! # Check the local database connection
//! kasir db-check
//!
//! # Write the current configuration to the default path
//! kasir init-config
//!
//! # Use a specific config file
//! kasir --config ./kasir.toml db-check
//! ```
//!
//! Log level is controlled with `RUST_LOG` (default `DEFAULT_LOG_FILTER`).

use std::collections::BTreeMap;
use std::env;
use std::path::PathBuf;

use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use kasir_core::Codec;
use kasir_db::Database;
use kasir_sync::{AppConfig, ClientError, IntegratorClient};

const USAGE: &str = "\
Kasir operator CLI

Usage: kasir [--config <PATH>] <COMMAND> [ARGS]

Commands:
  encode <TEXT>            Encode TEXT with the configured codec secret
  decode <TEXT>            Decode TEXT produced by `encode`
  group-pos <KEY=VALUE>... Fetch the POS group (needs group_pos, browser, waktu)
  db-check                 Connect to the configured database and run SELECT 1
  init-config              Save the effective configuration to the config file

Options:
  -c, --config <PATH>      Config file (default: platform config dir/kasir.toml)
  -h, --help               Show this help message";

/// Debug output for this binary and the kasir library crates.
const DEFAULT_LOG_FILTER: &str =
    "info,kasir=debug,kasir_core=debug,kasir_db=debug,kasir_sync=debug,sqlx=warn";

fn init_tracing() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() {
    init_tracing();

    let args: Vec<String> = env::args().skip(1).collect();

    let mut config_path: Option<PathBuf> = None;
    let mut rest = Vec::new();
    let mut i = 0;
    while i < args.len() {
        match args[i].as_str() {
            "--config" | "-c" => {
                if i + 1 < args.len() {
                    config_path = Some(PathBuf::from(&args[i + 1]));
                    i += 1;
                }
            }
            "--help" | "-h" => {
                println!("{USAGE}");
                return;
            }
            _ => rest.push(args[i].clone()),
        }
        i += 1;
    }

    let Some((command, command_args)) = rest.split_first() else {
        eprintln!("{USAGE}");
        std::process::exit(2);
    };

    if let Err(err) = run(command, command_args, config_path).await {
        error!(error = %err, "Command failed");
        eprintln!("error: {err}");
        std::process::exit(1);
    }
}

async fn run(
    command: &str,
    args: &[String],
    config_path: Option<PathBuf>,
) -> Result<(), ClientError> {
    match command {
        "encode" => {
            let config = AppConfig::load(config_path)?;
            let text = single_arg(command, args)?;
            println!("{}", codec(&config)?.encode(text));
        }
        "decode" => {
            let config = AppConfig::load(config_path)?;
            let text = single_arg(command, args)?;
            println!("{}", codec(&config)?.decode(text)?);
        }
        "group-pos" => {
            let config = AppConfig::load(config_path)?;
            let params = parse_pairs(args)?;
            let client = IntegratorClient::new(config.integrator)?;
            let response = client.fetch_group_pos(params).await?;
            println!("{}", serde_json::to_string_pretty(&response)?);
        }
        "db-check" => {
            let config = AppConfig::load(config_path)?;
            let db = Database::from_config(&config.database).await?;
            let healthy = db.health_check().await;
            db.close().await;
            if !healthy {
                return Err(ClientError::Database(kasir_db::DbError::ConnectionFailed(
                    "health check query failed".into(),
                )));
            }
            info!(driver = %db.driver(), "Database reachable");
            println!("ok ({})", db.driver());
        }
        "init-config" => {
            let config = AppConfig::load_or_default(config_path.clone());
            config.save(config_path.clone())?;
            let shown = config_path.or_else(AppConfig::default_config_path);
            println!(
                "config written to {}",
                shown.map(|p| p.display().to_string()).unwrap_or_default()
            );
        }
        other => {
            return Err(ClientError::InvalidConfig(format!(
                "unknown command '{other}' (see --help)"
            )));
        }
    }
    Ok(())
}

fn codec(config: &AppConfig) -> Result<Codec, ClientError> {
    if config.codec.secret.is_empty() {
        return Err(ClientError::InvalidConfig(
            "codec secret is not set ([codec] secret or KASIR_SECRET)".into(),
        ));
    }
    Ok(Codec::new(config.codec.secret.clone()))
}

fn single_arg<'a>(command: &str, args: &'a [String]) -> Result<&'a str, ClientError> {
    match args {
        [one] => Ok(one.as_str()),
        _ => Err(ClientError::InvalidConfig(format!(
            "'{command}' takes exactly one argument"
        ))),
    }
}

fn parse_pairs(args: &[String]) -> Result<BTreeMap<String, String>, ClientError> {
    args.iter()
        .map(|arg| {
            arg.split_once('=')
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .ok_or_else(|| {
                    ClientError::InvalidConfig(format!("expected KEY=VALUE, got '{arg}'"))
                })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_filter_names_library_targets() {
        for target in ["kasir_core", "kasir_db", "kasir_sync"] {
            assert!(DEFAULT_LOG_FILTER.contains(&format!("{target}=debug")));
        }
        assert!(EnvFilter::try_new(DEFAULT_LOG_FILTER).is_ok());
    }

    #[test]
    fn test_parse_pairs() {
        let args = vec!["group_pos=G1".to_string(), "waktu=2024-01-01 10:00:00".to_string()];
        let pairs = parse_pairs(&args).unwrap();
        assert_eq!(pairs.get("waktu").map(String::as_str), Some("2024-01-01 10:00:00"));

        let err = parse_pairs(&["oops".to_string()]).unwrap_err();
        assert!(err.is_config_error());
    }
}
