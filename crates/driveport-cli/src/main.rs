use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use tracing::{debug, info};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use driveport_core::{ClientConfig, DriveManager, FileId, StorageClientBuilder};

#[derive(Debug, Clone, Copy, ValueEnum)]
enum LogFormat {
    Pretty,
    Json,
}

/// Upload, resolve and download files on Google Drive.
#[derive(Debug, Parser)]
#[command(name = "driveport", version)]
struct Cli {
    /// Account label the session is authorized for (token cache key).
    #[arg(long, env = "DRIVEPORT_ACCOUNT")]
    account: String,

    /// Path to the OAuth client secret descriptor (client_secret.json).
    #[arg(long, env = "DRIVEPORT_SECRETS")]
    secrets: PathBuf,

    /// Optional JSON config file.
    #[arg(long, env = "DRIVEPORT_CONFIG")]
    config: Option<PathBuf>,

    #[arg(long, value_enum, default_value = "pretty")]
    log_format: LogFormat,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Print the id of the file with exactly this name.
    Resolve { name: String },

    /// Download a file by id.
    Fetch {
        id: String,
        /// Write to this path instead of stdout.
        #[arg(short, long)]
        out: Option<PathBuf>,
    },

    /// Upload a local file; with --id, replace that file instead of creating one.
    Upload {
        path: PathBuf,
        #[arg(long)]
        id: Option<String>,
    },
}

fn init_tracing(format: LogFormat) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = tracing_subscriber::registry().with(filter);
    match format {
        LogFormat::Pretty => registry
            .with(fmt::layer().with_writer(std::io::stderr).with_target(false))
            .try_init(),
        LogFormat::Json => registry
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .try_init(),
    }
    .context("failed to install tracing subscriber")
}

async fn load_config(path: Option<&PathBuf>) -> Result<ClientConfig> {
    let config = match path {
        Some(path) => ClientConfig::from_json_file(path)
            .await
            .with_context(|| format!("loading config {}", path.display()))?,
        None => ClientConfig::default(),
    };
    Ok(config.with_env_overrides())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_format)?;

    let config = load_config(cli.config.as_ref()).await?;
    debug!(account = %cli.account, secrets = %cli.secrets.display(), "connecting");
    let client = StorageClientBuilder::new(&cli.account, &cli.secrets)
        .config(config)
        .connect()
        .await
        .context("connecting to Google Drive")?;

    match cli.command {
        Command::Resolve { name } => match client.resolve_file_id(&name).await? {
            Some(id) => {
                info!(%name, file_id = %id, "resolved name");
                println!("{id}");
            }
            None => anyhow::bail!("no remote file named '{name}'"),
        },
        Command::Fetch { id, out } => {
            let id = FileId::parse(&id)?;
            let bytes = client
                .read_file(&id)
                .await
                .with_context(|| format!("downloading {id}"))?;
            match out {
                Some(path) => {
                    tokio::fs::write(&path, &bytes)
                        .await
                        .with_context(|| format!("writing {}", path.display()))?;
                    info!(file_id = %id, bytes = bytes.len(), out = %path.display(), "saved download");
                }
                None => {
                    use std::io::Write;
                    std::io::stdout()
                        .write_all(&bytes)
                        .context("writing to stdout")?;
                }
            }
        }
        Command::Upload { path, id } => {
            let id = id.as_deref().map(FileId::parse).transpose()?;
            let uploaded = client
                .upload_file(id.as_ref(), &path)
                .await
                .with_context(|| format!("uploading {}", path.display()))?;
            info!(file_id = %uploaded, path = %path.display(), replaced = id.is_some(), "upload finished");
            println!("{uploaded}");
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_upload_with_id() {
        let cli = Cli::try_parse_from([
            "driveport",
            "--account",
            "alice",
            "--secrets",
            "client_secret.json",
            "upload",
            "notes.txt",
            "--id",
            "abc",
        ])
        .unwrap();

        match cli.command {
            Command::Upload { path, id } => {
                assert_eq!(path, PathBuf::from("notes.txt"));
                assert_eq!(id.as_deref(), Some("abc"));
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn cli_definition_is_consistent() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }
}
