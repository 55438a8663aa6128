use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::net::SocketAddr;
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use relnodes::config::Config;
use relnodes::service::{ClientConfig, DirectoryClient, DirectoryServer};

#[derive(Parser)]
#[command(
    name = "relnodes",
    version,
    about = "Reverse resource directory: which hosts manage this resource?",
    long_about = None
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Log format (text, json)
    #[arg(long, global = true, default_value = "text")]
    log_format: String,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the directory service
    Serve {
        /// Address to listen on, e.g. 0.0.0.0:8141
        #[arg(short, long)]
        bind: Option<SocketAddr>,

        /// Data directory holding catalogs/ and index/
        #[arg(short, long)]
        data_dir: Option<PathBuf>,

        /// TOML configuration file
        #[arg(short, long)]
        config: Option<PathBuf>,
    },

    /// Query a running directory service
    Query {
        /// Resource reference (Type[Title]) or bare type
        resource: String,

        /// Fetch parameter mappings instead of the hostname list
        #[arg(short, long)]
        parameters: bool,

        /// Base URL of the directory service
        #[arg(short, long, default_value = "http://localhost:8141")]
        server: String,
    },

    /// Upload a catalog document for a host
    Push {
        /// Hostname the catalog belongs to
        hostname: String,

        /// Path to the YAML catalog document
        file: PathBuf,

        /// Base URL of the directory service
        #[arg(short, long, default_value = "http://localhost:8141")]
        server: String,
    },

    /// Remove a host's catalog from the directory
    Remove {
        /// Hostname to remove
        hostname: String,

        /// Base URL of the directory service
        #[arg(short, long, default_value = "http://localhost:8141")]
        server: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize tracing/logging
    setup_tracing(&cli.log_format, cli.verbose)?;

    match cli.command {
        Commands::Serve {
            bind,
            data_dir,
            config,
        } => {
            serve(bind, data_dir, config).await?;
        }

        Commands::Query {
            resource,
            parameters,
            server,
        } => {
            query(resource, parameters, server).await?;
        }

        Commands::Push {
            hostname,
            file,
            server,
        } => {
            tracing::info!(host = %hostname, file = %file.display(), "Uploading catalog");
            push(hostname, file, server).await?;
        }

        Commands::Remove { hostname, server } => {
            tracing::info!(host = %hostname, "Removing catalog");
            remove(hostname, server).await?;
        }
    }

    Ok(())
}

fn setup_tracing(format: &str, verbose: bool) -> Result<()> {
    let env_filter = if verbose {
        tracing_subscriber::EnvFilter::new("relnodes=debug,info")
    } else {
        tracing_subscriber::EnvFilter::new("relnodes=info,warn")
    };

    match format {
        "json" => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().json())
                .init();
        }
        _ => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().pretty())
                .init();
        }
    }

    Ok(())
}

async fn serve(
    bind: Option<SocketAddr>,
    data_dir: Option<PathBuf>,
    config_path: Option<PathBuf>,
) -> Result<()> {
    let mut config = match config_path {
        Some(path) => Config::from_file(&path)?,
        None => Config::from_env()?,
    };
    if let Some(bind) = bind {
        config.server.bind_address = bind;
    }
    if let Some(data_dir) = data_dir {
        config.storage.data_dir = data_dir;
    }
    config.validate()?;

    let server = DirectoryServer::new(config)?;
    server.start().await?;
    Ok(())
}

async fn query(resource: String, parameters: bool, server: String) -> Result<()> {
    let client = DirectoryClient::new(&ClientConfig::new(server))?;
    if parameters {
        let mapping = client.parameters(&resource).await?;
        print!("{}", serde_yaml_ng::to_string(&mapping)?);
    } else {
        let hosts = client.hosts(&resource).await?;
        print!("{}", serde_yaml_ng::to_string(&hosts)?);
    }
    Ok(())
}

async fn push(hostname: String, file: PathBuf, server: String) -> Result<()> {
    let document = std::fs::read(&file)
        .with_context(|| format!("Failed to read catalog file: {}", file.display()))?;
    let client = DirectoryClient::new(&ClientConfig::new(server))?;
    client.put_catalog(&hostname, document).await?;
    println!("Catalog for {hostname} uploaded");
    Ok(())
}

async fn remove(hostname: String, server: String) -> Result<()> {
    let client = DirectoryClient::new(&ClientConfig::new(server))?;
    client.delete_catalog(&hostname).await?;
    println!("Catalog for {hostname} removed");
    Ok(())
}
