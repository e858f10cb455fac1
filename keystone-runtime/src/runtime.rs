use std::sync::Arc;

use tokio::sync::broadcast;

use keystone_core::{ComponentRepository, HostContext, StopOutcome};

use crate::config::{LoggingConfig, RuntimeConfig};
use crate::error::{io_err, RuntimeError};
use crate::factory::{assemble, FactoryTable};

/// Install the global subscriber. `RUST_LOG` wins over the configured filter.
/// Safe to call more than once; later calls are ignored.
pub fn init_tracing(logging: &LoggingConfig) {
    use tracing_subscriber::{fmt, EnvFilter};

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(logging.filter.as_str()));
    let builder = fmt().with_env_filter(filter).with_target(false);
    let _ = if logging.json {
        builder.json().try_init()
    } else {
        builder.try_init()
    };
}

/// Assemble the configured repository and block the current thread until it
/// has been started, signalled and stopped.
pub fn start_blocking(
    config: &RuntimeConfig,
    factories: &FactoryTable,
) -> Result<StopOutcome, RuntimeError> {
    init_tracing(&config.logging);
    let repo = assemble(config, factories)?;
    let context = Arc::new(HostContext::new(config.name.clone()));

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|e| io_err("tokio-runtime", e))?;
    let (_shutdown_tx, shutdown_rx) = broadcast::channel::<()>(1);
    runtime.block_on(run(repo, context, shutdown_rx))
}

/// Bind, start, wait for ctrl-c or `shutdown`, then stop.
///
/// A message on `shutdown` or the last sender being dropped both count as a
/// shutdown request. If this future is dropped before it completes the
/// repository is still stopped.
pub async fn run(
    repo: Arc<ComponentRepository>,
    context: Arc<HostContext>,
    mut shutdown: broadcast::Receiver<()>,
) -> Result<StopOutcome, RuntimeError> {
    let guard = StopGuard::new(Arc::clone(&repo));

    repo.bind_context(&context);
    let starter = Arc::clone(&repo);
    tokio::task::spawn_blocking(move || starter.start()).await??;
    tracing::info!(repository = %repo, context = context.name(), "repository running");

    tokio::select! {
        _ = shutdown.recv() => {
            tracing::info!("shutdown requested, stopping repository");
        }
        signal = tokio::signal::ctrl_c() => {
            signal.map_err(RuntimeError::Signal)?;
            tracing::info!("received ctrl-c, stopping repository");
        }
    }

    let outcome = guard.stop().await?;
    match &outcome {
        StopOutcome::Stopped { attempted, failures } => tracing::info!(
            attempted = *attempted,
            failures = failures.len(),
            "repository stopped",
        ),
        StopOutcome::Skipped { status } => {
            tracing::debug!(%status, "stop skipped");
        }
    }
    Ok(outcome)
}

/// Stops the repository on drop unless [`StopGuard::stop`] ran first.
struct StopGuard {
    repo: Arc<ComponentRepository>,
    armed: bool,
}

impl StopGuard {
    fn new(repo: Arc<ComponentRepository>) -> Self {
        Self { repo, armed: true }
    }

    async fn stop(mut self) -> Result<StopOutcome, RuntimeError> {
        self.armed = false;
        let repo = Arc::clone(&self.repo);
        Ok(tokio::task::spawn_blocking(move || repo.stop()).await?)
    }
}

impl Drop for StopGuard {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        let outcome = self.repo.stop();
        if outcome.ran() {
            tracing::warn!(
                failures = outcome.failures().len(),
                "run loop exited early, repository stopped",
            );
        }
    }
}
