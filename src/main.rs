use std::path::PathBuf;
use std::sync::Arc;

use anyhow::bail;
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use repobase::config::ServerConfig;
use repobase::hub::Hub;
use repobase::server::{AppState, create_router};

#[derive(Parser)]
#[command(name = "repobase")]
#[command(about = "Access-controlled query and import server for data repositories", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Administrative commands
    Admin {
        #[command(subcommand)]
        command: AdminCommands,
    },

    /// Manage namespaces (repo bases)
    Namespace {
        #[command(subcommand)]
        command: NamespaceCommands,
    },

    /// Start the server
    Serve {
        /// TOML configuration file
        #[arg(long)]
        config: Option<PathBuf>,

        /// Host to bind to
        #[arg(long)]
        host: Option<String>,

        /// Port to bind to
        #[arg(long, short)]
        port: Option<u16>,

        /// Data directory for the catalog, engine files and uploads
        #[arg(long)]
        data_dir: Option<PathBuf>,
    },
}

#[derive(Subcommand)]
enum AdminCommands {
    /// Initialize the data directory and catalog
    Init {
        /// Data directory for the catalog, engine files and uploads
        #[arg(long, default_value = "./data")]
        data_dir: PathBuf,
    },
}

#[derive(Subcommand)]
enum NamespaceCommands {
    /// Create a namespace owned by the user of the same name
    Add {
        name: String,

        #[arg(long, default_value = "./data")]
        data_dir: PathBuf,
    },

    /// List namespaces
    List {
        #[arg(long, default_value = "./data")]
        data_dir: PathBuf,
    },
}

fn config_for(data_dir: PathBuf) -> ServerConfig {
    ServerConfig {
        data_dir,
        ..ServerConfig::default()
    }
}

fn open_initialized(config: &ServerConfig) -> anyhow::Result<Hub> {
    if !config.catalog_path().exists() {
        bail!("Data directory not initialized. Run 'repobase admin init' first.");
    }
    Ok(Hub::open(config)?)
}

fn run_init(data_dir: PathBuf) -> anyhow::Result<()> {
    let config = config_for(data_dir);
    if config.catalog_path().exists() {
        bail!(
            "Already initialized. Catalog exists at: {}",
            config.catalog_path().display()
        );
    }

    Hub::open(&config)?;
    println!("Initialized {}", config.data_dir.display());
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("repobase=info".parse()?))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Admin { command } => match command {
            AdminCommands::Init { data_dir } => run_init(data_dir)?,
        },
        Commands::Namespace { command } => match command {
            NamespaceCommands::Add { name, data_dir } => {
                let hub = open_initialized(&config_for(data_dir))?;
                let namespace = hub.create_namespace(&name)?;
                println!("Created namespace '{}'", namespace.name);
            }
            NamespaceCommands::List { data_dir } => {
                let hub = open_initialized(&config_for(data_dir))?;
                for namespace in hub.list_namespaces()? {
                    println!("{}", namespace.name);
                }
            }
        },
        Commands::Serve {
            config,
            host,
            port,
            data_dir,
        } => {
            let mut config = match config {
                Some(path) => ServerConfig::load(&path)?,
                None => ServerConfig::default(),
            };
            if let Some(host) = host {
                config.host = host;
            }
            if let Some(port) = port {
                config.port = port;
            }
            if let Some(data_dir) = data_dir {
                config.data_dir = data_dir;
            }

            let hub = open_initialized(&config)?;
            let state = Arc::new(AppState::new(hub));

            let app = create_router(state);
            let addr = config.socket_addr()?;

            info!("Starting server on {}", addr);

            let listener = tokio::net::TcpListener::bind(addr).await?;
            axum::serve(listener, app).await?;
        }
    }

    Ok(())
}
