//! Drivemirror Daemon - Background watcher and upload service
//!
//! This binary watches one local directory and mirrors new files onto the
//! remote store:
//! - Retrieves the remote tree once at startup
//! - Optionally reports pre-existing local content as new
//! - Dispatches each filesystem event on its own task
//! - Keeps the access token fresh when refresh credentials are configured
//! - Shuts down gracefully on SIGTERM/SIGINT
//!
//! # Architecture
//!
//! Events from the OS watcher and the initial scan share one channel. The
//! main loop pulls from it and hands every event to the `ChangeDispatcher`.
//! The loop is controlled by a `CancellationToken` that is triggered on
//! receipt of SIGTERM or SIGINT.

use std::{
    path::{Path, PathBuf},
    sync::Arc,
};

use anyhow::{bail, Context, Result};
use clap::Parser;
use drivemirror_core::{
    config::{Config, ValidationError, ENV_VAR},
    domain::RemoteId,
    ports::{IRemoteStore, InMemoryRemoteStore},
};
use drivemirror_drive::{
    auth::{AccessToken, TokenRefresher},
    client::DriveClient,
    provider::DriveRemoteStore,
};
use drivemirror_sync::{
    scan::scan_existing, watcher::FileWatcher, ChangeDispatcher, ChangeEvent, DispatchOutcome,
    RemoteTree,
};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use tracing_subscriber::EnvFilter;

/// Command-line arguments
#[derive(Debug, Parser)]
#[command(
    name = "drivemirrord",
    version,
    about = "Mirror new files from a local directory onto Google Drive"
)]
struct Args {
    /// Path to the configuration file (overrides the DRIVEMIRROR_ENV profile)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Work against an in-memory remote store instead of Drive
    #[arg(long)]
    dry_run: bool,
}

// ============================================================================
// DaemonService
// ============================================================================

/// Owns the configuration and the shutdown token for one daemon run
struct DaemonService {
    config: Config,
    dry_run: bool,
    shutdown: CancellationToken,
}

impl DaemonService {
    fn new(config: Config, dry_run: bool, shutdown: CancellationToken) -> Self {
        Self {
            config,
            dry_run,
            shutdown,
        }
    }

    /// Runs the daemon until shutdown
    ///
    /// 1. Connects to the remote store and retrieves the remote tree
    /// 2. Starts watching the sync root
    /// 3. Runs the initial scan, if enabled
    /// 4. Dispatches events until the shutdown token fires
    async fn run(&self) -> Result<()> {
        let root = tokio::fs::canonicalize(self.config.sync.expanded_root())
            .await
            .with_context(|| {
                format!(
                    "Sync root is not accessible: {}",
                    self.config.sync.root.display()
                )
            })?;
        let root_id = RemoteId::new(self.config.remote.root_id.clone())
            .context("Invalid remote.root_id")?;

        let store = self.connect(&root_id).await?;

        let tree = tokio::select! {
            tree = RemoteTree::bootstrap(store, &root_id) => {
                Arc::new(tree.context("Failed to retrieve the remote tree")?)
            }
            _ = self.shutdown.cancelled() => {
                info!("Shutdown signal received while retrieving the remote tree");
                return Ok(());
            }
        };

        let dispatcher = Arc::new(
            ChangeDispatcher::new(root.clone(), tree)?
                .with_stability_check(self.config.sync.stability_check_ms),
        );

        let (mut watcher, mut events) = FileWatcher::new()?;
        watcher.watch(&root)?;

        if self.config.sync.initial_scan {
            let tx = watcher.sender();
            let scan_root = root.clone();
            tokio::spawn(async move {
                if let Err(e) = scan_existing(&scan_root, &tx).await {
                    warn!(error = %e, "Initial scan failed");
                }
            });
        }

        info!(root = %root.display(), "Watching for changes");
        self.event_loop(&dispatcher, &mut events).await;

        watcher.unwatch(&root).ok();
        Ok(())
    }

    /// Builds the remote store for this run
    async fn connect(&self, root_id: &RemoteId) -> Result<Arc<dyn IRemoteStore>> {
        if self.dry_run {
            warn!("Dry run: changes go to an in-memory store and are discarded on exit");
            let store: Arc<dyn IRemoteStore> = Arc::new(InMemoryRemoteStore::new(root_id.clone()));
            return Ok(store);
        }

        let auth = &self.config.auth;
        let remote = &self.config.remote;

        let (access_token, refresher) = match (
            auth.client_id.as_deref(),
            auth.client_secret.as_deref(),
            auth.refresh_token.as_deref(),
        ) {
            (Some(id), Some(secret), Some(refresh_token)) => {
                let refresher = TokenRefresher::new(id, secret, &auth.token_url)?;
                let token = refresher.refresh(refresh_token).await?;
                (token.access_token.clone(), Some((refresher, token)))
            }
            _ => match auth.access_token.clone() {
                Some(token) => {
                    warn!("No refresh credentials configured, the access token will not be renewed");
                    (token, None)
                }
                None => bail!("No access token or refresh credentials configured"),
            },
        };

        let client = DriveClient::with_base_urls(access_token, &remote.base_url, &remote.upload_url);
        let store = Arc::new(DriveRemoteStore::new(client));

        if let Some((refresher, token)) = refresher {
            tokio::spawn(keep_token_fresh(
                refresher,
                token,
                Arc::clone(&store),
                self.shutdown.child_token(),
            ));
        }

        info!(base_url = %remote.base_url, "Connected to Drive");
        let store: Arc<dyn IRemoteStore> = store;
        Ok(store)
    }

    /// Dispatches events until shutdown or until the watcher goes away
    async fn event_loop(
        &self,
        dispatcher: &Arc<ChangeDispatcher>,
        events: &mut tokio::sync::mpsc::Receiver<ChangeEvent>,
    ) {
        let mut tasks = JoinSet::new();

        loop {
            tokio::select! {
                event = events.recv() => match event {
                    Some(event) => {
                        let dispatcher = Arc::clone(dispatcher);
                        tasks.spawn(async move { handle_event(&dispatcher, event).await });
                    }
                    None => {
                        warn!("Change event channel closed");
                        break;
                    }
                },
                Some(joined) = tasks.join_next(), if !tasks.is_empty() => {
                    if let Err(e) = joined {
                        error!(error = %e, "Event task panicked");
                    }
                }
                _ = self.shutdown.cancelled() => {
                    info!("Shutdown signal received");
                    break;
                }
            }
        }

        if !tasks.is_empty() {
            info!(pending = tasks.len(), "Aborting in-flight event tasks");
        }
        tasks.shutdown().await;
    }
}

/// Dispatches one event and logs what happened
async fn handle_event(dispatcher: &ChangeDispatcher, event: ChangeEvent) {
    let path = event.path().map(Path::to_path_buf);

    match dispatcher.dispatch(event).await {
        Ok(DispatchOutcome::Uploaded(item)) => {
            info!(id = %item.id, label = %item.label, "Uploaded");
        }
        Ok(outcome) => debug!(outcome = ?outcome, "Event handled"),
        Err(e) => error!(path = ?path, error = %e, "Failed to handle change event"),
    }
}

/// Replaces the store's access token shortly before each expiry
async fn keep_token_fresh(
    refresher: TokenRefresher,
    mut token: AccessToken,
    store: Arc<DriveRemoteStore>,
    cancel: CancellationToken,
) {
    loop {
        tokio::select! {
            _ = tokio::time::sleep(token.refresh_due_in()) => {}
            _ = cancel.cancelled() => return,
        }

        let Some(refresh_token) = token.refresh_token.clone() else {
            warn!("No refresh token left, access token will expire");
            return;
        };

        match refresher.refresh(&refresh_token).await {
            Ok(fresh) => {
                store.set_access_token(fresh.access_token.clone()).await;
                token = fresh;
            }
            Err(e) => {
                error!(error = %e, "Token refresh failed, retrying in one minute");
                tokio::select! {
                    _ = tokio::time::sleep(std::time::Duration::from_secs(60)) => {}
                    _ = cancel.cancelled() => return,
                }
            }
        }
    }
}

// ============================================================================
// Startup helpers
// ============================================================================

/// Log filter directive: `-v` flags override the configured level
fn log_level(verbose: u8, configured: &str) -> String {
    match verbose {
        0 => configured.to_string(),
        1 => "debug".to_string(),
        _ => "trace".to_string(),
    }
}

/// Validation errors that prevent startup
///
/// Credentials are irrelevant for a dry run.
fn blocking_errors(errors: Vec<ValidationError>, dry_run: bool) -> Vec<ValidationError> {
    errors
        .into_iter()
        .filter(|e| !(dry_run && (e.field == "auth" || e.field.starts_with("auth."))))
        .collect()
}

fn load_config(args: &Args) -> Result<(PathBuf, Config)> {
    let env = std::env::var(ENV_VAR).ok();
    let path = Config::resolve_path(args.config.as_deref(), env.as_deref());

    let config = if args.config.is_some() {
        Config::load(&path)
            .with_context(|| format!("Failed to load configuration from {}", path.display()))?
    } else {
        Config::load_or_default(&path)
    };
    Ok((path, config))
}

// ============================================================================
// Graceful shutdown signal handler
// ============================================================================

/// Waits for SIGTERM or SIGINT and triggers the cancellation token
async fn shutdown_signal(token: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received SIGINT (Ctrl+C)");
        }
        _ = terminate => {
            info!("Received SIGTERM");
        }
    }

    token.cancel();
}

// ============================================================================
// Main entry point
// ============================================================================

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let (config_path, config) = load_config(&args)?;

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(log_level(args.verbose, &config.logging.level)));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(true)
        .init();

    info!(config_path = %config_path.display(), "Drivemirror daemon starting (drivemirrord)");

    let errors = blocking_errors(config.validate(), args.dry_run);
    if !errors.is_empty() {
        for e in &errors {
            error!(field = %e.field, "{}", e.message);
        }
        bail!("Invalid configuration ({} errors)", errors.len());
    }

    let shutdown_token = CancellationToken::new();

    let signal_token = shutdown_token.clone();
    tokio::spawn(async move {
        shutdown_signal(signal_token).await;
    });

    let service = DaemonService::new(config, args.dry_run, shutdown_token.clone());
    let result = service.run().await;
    shutdown_token.cancel();

    match &result {
        Ok(()) => info!("Drivemirror daemon shut down gracefully"),
        Err(e) => error!(error = %e, "Drivemirror daemon exiting with error"),
    }

    result
}

// ============================================================================
// Tests
// ============================================================================
