use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

use podcast_feed_editor::config::Config;
use podcast_feed_editor::feed::{build_client, normalize, serialize, FeedEdit, Fetcher};
use podcast_feed_editor::publish::{Publisher, S3Publisher};
use podcast_feed_editor::server;

const DEFAULT_CONFIG_PATH: &str = "podcast-feed-editor.toml";

#[derive(Parser, Debug)]
#[command(
    name = "podcast-feed-editor",
    version,
    about = "Load, edit, regenerate and publish podcast RSS feeds"
)]
struct Args {
    /// Config file (TOML); missing file means defaults
    #[arg(long, value_name = "FILE", global = true, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the HTTP API
    Serve {
        /// Override the configured port
        #[arg(long)]
        port: Option<u16>,
    },
    /// Print the normalized feed record of a file or http(s) URL as JSON
    Inspect {
        #[arg(value_name = "SOURCE")]
        source: String,
    },
    /// Print the RSS document for an edit payload (JSON file)
    Render {
        #[arg(value_name = "EDIT_JSON")]
        edit: PathBuf,
    },
    /// Upload an RSS document and print its public URL
    Publish {
        #[arg(value_name = "XML_FILE")]
        xml: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    let mut config = Config::load_with_env(&args.config)
        .with_context(|| format!("Failed to load config from '{}'", args.config.display()))?;

    match args.command {
        Command::Serve { port } => {
            if let Some(port) = port {
                config.port = port;
            }
            server::serve(config).await
        }
        Command::Inspect { source } => inspect(&config, &source).await,
        Command::Render { edit } => render(&edit),
        Command::Publish { xml } => publish(&config, &xml).await,
    }
}

async fn inspect(config: &Config, source: &str) -> Result<()> {
    let content = if source.starts_with("http://") || source.starts_with("https://") {
        let client = build_client(config.allow_private_hosts)
            .context("Failed to build HTTP client")?;
        Fetcher::new(client, config)
            .fetch(source)
            .await
            .with_context(|| format!("Failed to fetch '{source}'"))?
    } else {
        std::fs::read(source).with_context(|| format!("Failed to read '{source}'"))?
    };

    let feed = normalize(&content).with_context(|| format!("Failed to parse '{source}'"))?;
    let json = serde_json::to_string_pretty(&feed).context("Failed to encode feed as JSON")?;
    print_line(&json)
}

fn render(path: &Path) -> Result<()> {
    let content = std::fs::read(path)
        .with_context(|| format!("Failed to read '{}'", path.display()))?;
    let edit: FeedEdit = serde_json::from_slice(&content)
        .with_context(|| format!("Invalid feed edit JSON in '{}'", path.display()))?;

    let xml = serialize(&edit.into_feed()).context("Failed to write RSS document")?;
    print_line(&xml)
}

async fn publish(config: &Config, path: &Path) -> Result<()> {
    let xml = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read '{}'", path.display()))?;
    if xml.trim().is_empty() {
        anyhow::bail!("'{}' is empty", path.display());
    }

    let publisher = S3Publisher::from_config(&config.s3).await;
    let url = publisher.publish(xml).await?;
    print_line(&url)
}

fn print_line(text: &str) -> Result<()> {
    let mut stdout = std::io::stdout().lock();
    writeln!(stdout, "{text}").context("Failed to write to stdout")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_is_well_formed() {
        Args::command().debug_assert();
    }

    #[test]
    fn test_serve_defaults() {
        let args = Args::try_parse_from(["podcast-feed-editor", "serve"]).unwrap();
        assert_eq!(args.config, PathBuf::from(DEFAULT_CONFIG_PATH));
        assert!(matches!(args.command, Command::Serve { port: None }));
    }

    #[test]
    fn test_serve_port_and_config() {
        let args = Args::try_parse_from([
            "podcast-feed-editor",
            "serve",
            "--port",
            "8080",
            "--config",
            "/etc/feeds.toml",
        ])
        .unwrap();
        assert_eq!(args.config, PathBuf::from("/etc/feeds.toml"));
        assert!(matches!(args.command, Command::Serve { port: Some(8080) }));
    }

    #[test]
    fn test_subcommand_required() {
        assert!(Args::try_parse_from(["podcast-feed-editor"]).is_err());
    }
}
