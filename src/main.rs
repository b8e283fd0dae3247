use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use std::path::PathBuf;
use std::sync::Arc;

use shelf::api::{ApiClient, FilterCriteria};
use shelf::app::{App, Screen};
use shelf::config::Config;
use shelf::query::QueryClient;

/// Get the config directory path (~/.config/shelf/)
fn get_config_dir() -> Result<PathBuf> {
    let home = std::env::var("HOME").context("HOME environment variable not set")?;
    Ok(PathBuf::from(home).join(".config").join("shelf"))
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum StartScreen {
    Home,
    Favourites,
    Archive,
}

#[derive(Parser, Debug)]
#[command(name = "shelf", about = "Terminal bookmark list for a bookmarks server")]
struct Args {
    /// Only bookmarks with this favourited flag
    #[arg(long, value_name = "BOOL")]
    favourited: Option<bool>,

    /// Only bookmarks with this archived flag
    #[arg(long, value_name = "BOOL")]
    archived: Option<bool>,

    /// Only these bookmark ids (repeatable)
    #[arg(long = "id", value_name = "ID")]
    ids: Vec<String>,

    /// Screen to start on when no filter flags are given
    #[arg(long, value_enum, default_value = "home")]
    screen: StartScreen,

    /// Server base URL (overrides server_url in the config file)
    #[arg(long, value_name = "URL")]
    server: Option<String>,

    /// Config file (default ~/.config/shelf/config.toml)
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,
}

impl Args {
    fn initial_screen(&self) -> Screen {
        if self.favourited.is_some() || self.archived.is_some() || !self.ids.is_empty() {
            return Screen::Custom(FilterCriteria {
                favourited: self.favourited,
                archived: self.archived,
                ids: (!self.ids.is_empty()).then(|| self.ids.clone()),
            });
        }
        match self.screen {
            StartScreen::Home => Screen::Home,
            StartScreen::Favourites => Screen::Favourites,
            StartScreen::Archive => Screen::Archive,
        }
    }
}

/// Send logs to a file; the TUI owns stdout/stderr.
fn init_tracing(config_dir: &std::path::Path) -> Result<()> {
    let log_path = config_dir.join("shelf.log");
    let log_file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)
        .with_context(|| format!("Failed to open log file {}", log_path.display()))?;

    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::sync::Mutex::new(log_file))
        .with_ansi(false)
        .init();
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config_dir = get_config_dir()?;
    if !config_dir.exists() {
        std::fs::create_dir_all(&config_dir).context("Failed to create config directory")?;
    }

    // Set directory permissions on Unix (user-only access); it may hold an API key
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        if let Ok(metadata) = std::fs::metadata(&config_dir) {
            let mut perms = metadata.permissions();
            perms.set_mode(0o700);
            let _ = std::fs::set_permissions(&config_dir, perms);
        }
    }

    init_tracing(&config_dir)?;

    let config_path = args
        .config
        .clone()
        .unwrap_or_else(|| config_dir.join("config.toml"));
    let mut config = Config::load(&config_path)
        .with_context(|| format!("Failed to load {}", config_path.display()))?;
    if let Some(server) = &args.server {
        config.server_url = server.clone();
        config.validate().context("Invalid --server")?;
    }
    tracing::debug!(?config, "Effective configuration");

    let api = ApiClient::new(
        &config.server_url,
        config.resolve_api_key(),
        config.api_options(),
    )
    .context("Failed to create API client")?;
    let client = Arc::new(QueryClient::new(Arc::new(api), config.cache_options()));

    let screen = args.initial_screen();
    tracing::info!(
        server = %config.server_url,
        screen = screen.label(),
        criteria = %screen.criteria().describe(),
        "Starting"
    );

    let mut app = App::new(client, screen, config.refresh_interval());
    shelf::ui::run(&mut app).await?;

    Ok(())
}
