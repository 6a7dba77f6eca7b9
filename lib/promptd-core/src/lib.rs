use crate::config::ConfigError;
use crate::platform::{EventBridge, EventDispatcher, HeadlessSurfaceFactory, HostEvent, PlatformError};
use log::{debug, trace};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

pub mod config;
pub mod coordinator;
mod event_loop_host;
pub mod host_shim;
pub mod lifecycle;
pub mod paths;
pub mod platform;
pub mod registry;
pub mod request;
pub mod surface_key;

pub use config::{Config, ConfigRef};
pub use coordinator::{FailureReason, Outcome, RequestCoordinator};
pub use event_loop_host::{EventLoopHost, HostTerminator};

const SHUTDOWN_POLL_INTERVAL: Duration = Duration::from_millis(100);
// Stdin is read on a blocking thread that cannot be interrupted
const RUNTIME_SHUTDOWN_TIMEOUT: Duration = Duration::from_millis(250);

pub fn version() -> &'static str {
    option_env!("VERSION").unwrap_or("v0.0.0-dev")
}

/// Runs the host until the last prompt is dismissed or `shutdown` is raised.
pub fn start(shutdown: Arc<AtomicBool>, config: Config) -> PromptdResult<()> {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|e| format!("Failed to start async runtime: {e}"))?;

    let result = runtime.block_on(run(shutdown, config));
    runtime.shutdown_timeout(RUNTIME_SHUTDOWN_TIMEOUT);
    result
}

pub async fn run(shutdown: Arc<AtomicBool>, config: Config) -> PromptdResult<()> {
    let config: ConfigRef = Arc::new(config);
    let bridge = EventBridge::new();
    let dispatcher = bridge.dispatcher();

    let factory = Arc::new(HeadlessSurfaceFactory::new(config.headless_auto_dismiss()));
    let notifier = Arc::new(host_shim::JsonLineNotifier::stdout());
    let terminator = Arc::new(HostTerminator::new(shutdown.clone(), dispatcher.clone()));
    let coordinator = Arc::new(RequestCoordinator::new(
        config,
        factory,
        notifier,
        terminator,
        dispatcher.clone(),
    ));

    tokio::spawn(host_shim::forward_stdin(dispatcher.clone()));
    tokio::spawn(watch_shutdown(shutdown, dispatcher));

    trace!("Starting event loop");
    EventLoopHost::run(bridge, coordinator).await;

    Ok(())
}

async fn watch_shutdown(shutdown: Arc<AtomicBool>, dispatcher: EventDispatcher) {
    while !shutdown.load(Ordering::SeqCst) {
        tokio::time::sleep(SHUTDOWN_POLL_INTERVAL).await;
    }
    debug!("Shutdown requested");
    dispatcher.send(HostEvent::Shutdown);
}

#[derive(Debug, Error)]
pub enum PromptdFatalError {
    #[error("{0}")]
    Error(String),
    #[error("Platform error: {0}")]
    PlatformError(#[from] PlatformError),
    #[error(transparent)]
    Config(#[from] ConfigError),
}

pub type PromptdResult<T> = Result<T, PromptdFatalError>;

impl From<&str> for PromptdFatalError {
    fn from(value: &str) -> Self {
        PromptdFatalError::Error(value.to_owned())
    }
}

impl From<String> for PromptdFatalError {
    fn from(error: String) -> Self {
        PromptdFatalError::Error(error)
    }
}
