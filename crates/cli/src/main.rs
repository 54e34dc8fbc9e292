// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Tunnel Launcher Contributors

// Tunnel Launcher - CLI front end
// Keeps a session with the tunnel daemon and drives it from the terminal

mod console;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use colored::Colorize;
use dialoguer::Password;
use tokio::sync::watch;
use tracing_subscriber::EnvFilter;

use tunnel_launcher_common::{
    LauncherConfig, NotificationMode, SettingsStore, TomlSettingsStore, UpdateStatus, UserStatus,
};
use tunnel_launcher_core::properties::{CONNECTED, NOTIFICATION_MODE, USER_INFO};
use tunnel_launcher_core::{
    DaemonBackend, ExitRequired, HttpTransport, LauncherSession, LifecycleController, OwnerThread,
    SystemBackend,
};

use console::{print_tunnels_table, ConsoleLogSink, TerminalPrompt};

const DEFAULT_LOG_FILTER: &str = "tunnel_launcher=info,tunnel_launcher_core=info";

/// How long one-shot commands wait for the daemon's first node list
const CONNECT_WAIT: Duration = Duration::from_secs(15);

#[derive(Parser)]
#[command(name = "tunnel-launcher")]
#[command(about = "Launcher for the tunnel daemon", long_about = None)]
#[command(version)]
struct Cli {
    /// Verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Launcher config file (default: ~/.config/tunnel-launcher/launcher.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Always run the daemon as a plain process, even if the service is installed
    #[arg(long, global = true)]
    force_daemon: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Stay connected and print daemon logs until Ctrl-C
    Run,

    /// Show connection, account and working mode
    Status,

    /// Log in to the account
    Login {
        /// Account token (prompted when omitted)
        #[arg(short, long)]
        token: Option<String>,
    },

    /// Log out of the account
    Logout,

    /// List tunnels
    Tunnels,

    /// Enable a tunnel
    Enable { id: u32 },

    /// Disable a tunnel
    Disable { id: u32 },

    /// Delete a tunnel
    Delete {
        id: u32,

        /// Skip confirmation
        #[arg(short = 'y', long)]
        yes: bool,
    },

    /// Switch between plain daemon and system service
    SwitchMode {
        /// Skip confirmation
        #[arg(short = 'y', long)]
        yes: bool,
    },

    /// Install a downloaded update
    Update {
        /// Directory holding the downloaded update
        #[arg(long)]
        ready_dir: PathBuf,

        /// Release note shown before installing
        #[arg(long, default_value = "")]
        note: String,
    },

    /// Choose which daemon notifications are shown
    Notifications {
        #[arg(value_enum)]
        mode: NotificationArg,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum NotificationArg {
    ShowAll,
    SuppressAll,
    SuppressInfo,
}

impl From<NotificationArg> for NotificationMode {
    fn from(arg: NotificationArg) -> Self {
        match arg {
            NotificationArg::ShowAll => NotificationMode::ShowAll,
            NotificationArg::SuppressAll => NotificationMode::SuppressAll,
            NotificationArg::SuppressInfo => NotificationMode::SuppressInfo,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("tunnel_launcher=debug,tunnel_launcher_core=debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER))
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let mut config = match &cli.config {
        Some(path) => LauncherConfig::load_from(path),
        None => LauncherConfig::load(),
    }
    .context("Failed to load launcher config")?;
    config.force_daemon |= cli.force_daemon;

    let launcher = Launcher::build(config).await?;
    let outcome = launcher.execute(cli.command).await;
    launcher.session.shutdown().await;
    launcher.owner.shutdown();

    match outcome? {
        Some(ExitRequired::ModeSwitched(mode)) => {
            tracing::info!("Exiting after switching to {}", mode);
        }
        Some(ExitRequired::ModeSwitchFailed) => {
            tracing::warn!("Exiting after a failed working mode switch");
        }
        Some(ExitRequired::UpdateHandoff) => {
            tracing::info!("Exiting for the updater");
        }
        None => {}
    }
    Ok(())
}

struct Launcher {
    session: LauncherSession,
    owner: Arc<OwnerThread>,
    sink: Arc<ConsoleLogSink>,
}

impl Launcher {
    async fn build(config: LauncherConfig) -> Result<Self> {
        let settings_store: Arc<dyn SettingsStore> = Arc::new(
            TomlSettingsStore::default_location().context("Failed to locate launcher settings")?,
        );
        let settings = settings_store.load().unwrap_or_default();

        let backend: Arc<dyn DaemonBackend> =
            Arc::new(SystemBackend::from_config(&config).context("Failed to set up daemon backend")?);
        let lifecycle = Arc::new(
            LifecycleController::detect(backend, config.force_daemon)
                .await
                .context("Failed to detect daemon working mode")?,
        );

        let owner = OwnerThread::spawn("launcher-owner").context("Failed to start owner thread")?;
        let sink = Arc::new(ConsoleLogSink::new(settings.notification_mode));
        let transport = Arc::new(HttpTransport::new(config.clone()));

        let session = LauncherSession::new(
            config,
            transport,
            lifecycle,
            owner.clone(),
            sink.clone(),
            settings_store,
        )?;

        Ok(Self { session, owner, sink })
    }

    async fn execute(&self, command: Commands) -> Result<Option<ExitRequired>> {
        match command {
            Commands::Run => self.run().await.map(|_| None),
            Commands::Status => self.status().await.map(|_| None),
            Commands::Login { token } => self.login(token).await.map(|_| None),
            Commands::Logout => self.logout().await.map(|_| None),
            Commands::Tunnels => self.tunnels().await.map(|_| None),
            Commands::Enable { id } => self.set_enabled(id, true).await.map(|_| None),
            Commands::Disable { id } => self.set_enabled(id, false).await.map(|_| None),
            Commands::Delete { id, yes } => self.delete(id, yes).await.map(|_| None),
            Commands::SwitchMode { yes } => {
                let prompt = TerminalPrompt { assume_yes: yes };
                Ok(self.session.switch_working_mode(&prompt).await?)
            }
            Commands::Update { ready_dir, note } => self.update(ready_dir, note).await,
            Commands::Notifications { mode } => {
                self.session.set_notification_mode(mode.into())?;
                println!("{}", "✓ Notification preference saved".green());
                Ok(None)
            }
        }
    }

    /// Start the daemon if needed and wait for its first node list
    async fn connect(&self) -> Result<()> {
        self.session.start().await.context("Failed to start the daemon")?;

        let graph = self.session.graph();
        let (tx, mut rx) = watch::channel(false);
        let subscription = graph.subscribe_to(&[CONNECTED], move |change| {
            if let Some(connected) = change.value::<bool>() {
                let _ = tx.send(*connected);
            }
        });

        let result = if self.session.connected() {
            Ok(Ok(()))
        } else {
            tokio::time::timeout(CONNECT_WAIT, rx.wait_for(|c| *c))
                .await
                .map(|r| r.map(|_| ()))
        };
        graph.unsubscribe(subscription);

        match result {
            Ok(Ok(())) => Ok(()),
            Ok(Err(_)) => anyhow::bail!("Connection watcher closed"),
            Err(_) => anyhow::bail!(
                "Daemon did not answer within {}s. Is it running?",
                CONNECT_WAIT.as_secs()
            ),
        }
    }

    async fn run(&self) -> Result<()> {
        let graph = self.session.graph();
        let sink = self.sink.clone();
        graph.subscribe_to(&[NOTIFICATION_MODE], move |change| {
            if let Some(mode) = change.value::<NotificationMode>() {
                sink.set_notification_mode(*mode);
            }
        });
        graph.subscribe_to(&[CONNECTED, USER_INFO], |change| match change.name.as_str() {
            CONNECTED if change.value::<bool>() == Some(&true) => {
                println!("{}", "✓ Connected to daemon".green().bold());
            }
            CONNECTED => println!("{}", "Disconnected from daemon, retrying...".yellow()),
            _ => {
                if let Some(user) = change.value::<tunnel_launcher_common::UserInfo>() {
                    println!("{}", describe_user(user.status, &user.name).dimmed());
                }
            }
        });

        self.session.start().await.context("Failed to start the daemon")?;
        println!("Working mode: {}. Press Ctrl-C to exit.", self.session.working_mode().cyan());
        tokio::signal::ctrl_c().await.context("Failed to wait for Ctrl-C")?;
        Ok(())
    }

    async fn status(&self) -> Result<()> {
        let connected = self.connect().await;
        println!("{}", "Tunnel Launcher Status".bold());
        println!("  Working mode: {}", self.session.working_mode().cyan());
        match connected {
            Ok(()) => {
                let user = self.session.user_info();
                println!("  Daemon:       {}", "connected".green());
                println!("  Account:      {}", describe_user(user.status, &user.name));
                println!("  Nodes:        {}", self.session.nodes().len());
                let update = self.session.update_text();
                if !update.is_empty() {
                    println!("  Update:       {}", update);
                }
            }
            Err(e) => println!("  Daemon:       {} ({})", "unreachable".red(), e),
        }
        Ok(())
    }

    async fn login(&self, token: Option<String>) -> Result<()> {
        self.connect().await?;
        if self.session.logged_in() {
            println!("Already logged in as {}", self.session.user_info().name.cyan());
            return Ok(());
        }

        let token = match token {
            Some(token) => token,
            None => Password::new()
                .with_prompt("Account token")
                .interact()
                .context("Failed to read token")?,
        };
        self.session.set_user_token(token)?;
        self.session.login_or_logout().await.context("Login failed")?;
        println!("{}", "✓ Login request accepted".green().bold());
        Ok(())
    }

    async fn logout(&self) -> Result<()> {
        self.connect().await?;
        if !self.session.logged_in() {
            println!("{}", "Not logged in.".yellow());
            return Ok(());
        }
        self.session.login_or_logout().await.context("Logout failed")?;
        println!("{}", "✓ Logged out".green().bold());
        Ok(())
    }

    async fn tunnels(&self) -> Result<()> {
        self.connect().await?;
        self.session.reload_tunnels().await.context("Failed to load tunnels")?;
        let views = self.session.tunnel_views();
        if views.is_empty() {
            println!("{}", "No tunnels found.".yellow());
            return Ok(());
        }
        print_tunnels_table(&views);
        Ok(())
    }

    async fn set_enabled(&self, id: u32, enabled: bool) -> Result<()> {
        self.connect().await?;
        self.session.set_tunnel_enabled(id, enabled).await?;
        let verb = if enabled { "enabled" } else { "disabled" };
        println!("{}", format!("✓ Tunnel {} {}", id, verb).green().bold());
        Ok(())
    }

    async fn delete(&self, id: u32, yes: bool) -> Result<()> {
        use tunnel_launcher_core::UserPrompt;

        self.connect().await?;
        let prompt = TerminalPrompt { assume_yes: yes };
        if !prompt.confirm(&format!("Delete tunnel {}?", id)) {
            println!("Cancelled.");
            return Ok(());
        }
        self.session.delete_tunnel(id).await?;
        println!("{}", format!("✓ Tunnel {} deleted", id).green().bold());
        Ok(())
    }

    async fn update(&self, ready_dir: PathBuf, note: String) -> Result<Option<ExitRequired>> {
        let ready_dir = ready_dir.to_string_lossy().into_owned();
        self.session.set_update(Some(UpdateStatus {
            update_manager_running: true,
            update_available: true,
            update_ready_dir: ready_dir,
            note,
            ..Default::default()
        }))?;
        let prompt = TerminalPrompt { assume_yes: false };
        Ok(self.session.confirm_update(&prompt).await?)
    }
}

fn describe_user(status: UserStatus, name: &str) -> String {
    match status {
        UserStatus::NoLogin => "not logged in".to_string(),
        UserStatus::Pending => "logging in...".to_string(),
        UserStatus::LoggedIn => format!("logged in as {}", name),
    }
}
