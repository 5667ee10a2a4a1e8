//! Engine process lifecycle: start, bounded retry, deactivation.

use std::future::Future;
use std::net::TcpListener;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::FutureExt;
use tokio::net::TcpStream;
use tokio::process::{Child, Command};
use tokio::time::sleep;
use tower_lsp::Client;
use tower_lsp::lsp_types::MessageType;
use tracing::{info, warn};

use crate::config::Settings;
use crate::engine::client::EngineClient;
use crate::engine::error::EngineError;
use crate::state::{LiveEngine, SharedState};

/// How long to wait for the engine to accept connections (seconds).
const READY_TIMEOUT_SECS: u64 = 10;

/// Pause between readiness probes.
const READY_POLL_INTERVAL: Duration = Duration::from_millis(200);

/// How an engine gets launched: command line and workspace root.
#[derive(Debug, Clone)]
pub struct EngineSpec {
    pub command: String,
    pub args: Vec<String>,
    pub root: PathBuf,
    pub port: Option<u16>,
}

impl EngineSpec {
    pub fn from_settings(settings: &Settings, root: &Path) -> Self {
        Self {
            command: settings.engine_command(),
            args: settings.engine_args(),
            root: root.to_path_buf(),
            port: settings.engine_port(),
        }
    }
}

/// Outcome of the bounded start loop.
#[derive(Debug)]
pub enum StartOutcome {
    Started(LiveEngine),
    Failed,
}

/// Sink for attempt-outcome notifications, routed to the editor.
#[async_trait]
pub trait Notify: Send + Sync {
    async fn notify(&self, level: MessageType, message: String);
}

#[async_trait]
impl Notify for Client {
    async fn notify(&self, level: MessageType, message: String) {
        self.log_message(level, message).await;
    }
}

/// Launches the engine and proves it responsive.
///
/// The warm-up `load` query is part of the start: an engine that accepts
/// connections but cannot answer counts as a failed start, and the child is
/// reaped before the error is returned.
pub async fn start(client: &EngineClient, spec: &EngineSpec) -> Result<LiveEngine, EngineError> {
    let port = match spec.port {
        Some(port) => port,
        None => free_port()?,
    };

    let mut child = Command::new(&spec.command)
        .args(&spec.args)
        .arg("--port")
        .arg(port.to_string())
        .arg("--root")
        .arg(&spec.root)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .kill_on_drop(true)
        .spawn()
        .map_err(|e| EngineError::Spawn(format!("{}: {}", spec.command, e)))?;

    if let Err(e) = await_ready(port).await {
        reap(&mut child).await;
        return Err(e);
    }

    if let Err(e) = client.load(port).await {
        warn!("Engine warm-up on port {} failed: {}", port, e);
        reap(&mut child).await;
        return Err(e);
    }

    info!("Engine ready on port {}", port);
    Ok(live_engine(port, child))
}

/// Runs `start_fn` up to `max_attempts` times with a fixed pause between
/// failures, reporting each attempt's outcome through `notify`. Exhaustion
/// produces exactly one final error notification.
pub async fn start_with_retry<N, F, Fut>(
    notify: &N,
    max_attempts: u32,
    delay: Duration,
    start_fn: F,
) -> StartOutcome
where
    N: Notify,
    F: Fn() -> Fut,
    Fut: Future<Output = Result<LiveEngine, EngineError>>,
{
    for attempt in 1..=max_attempts {
        match start_fn().await {
            Ok(engine) => {
                notify
                    .notify(
                        MessageType::INFO,
                        format!("Lumen engine started on port {}", engine.port()),
                    )
                    .await;
                return StartOutcome::Started(engine);
            }
            Err(e) => {
                warn!("Engine start attempt {}/{} failed: {}", attempt, max_attempts, e);
                notify
                    .notify(
                        MessageType::WARNING,
                        format!("Engine start attempt {}/{} failed: {}", attempt, max_attempts, e),
                    )
                    .await;
                if attempt < max_attempts {
                    sleep(delay).await;
                }
            }
        }
    }

    notify
        .notify(
            MessageType::ERROR,
            format!("Failed to start the Lumen engine after {} attempts", max_attempts),
        )
        .await;
    StartOutcome::Failed
}

/// Releases the current engine, if any. Safe to call repeatedly; in-flight
/// queries are not cancelled and fail against the dead port.
pub async fn stop(state: &SharedState) {
    let engine = state.modify(|s| s.engine.take());
    if let Some(engine) = engine {
        info!("Stopping engine on port {}", engine.port());
        engine.deactivate().await;
    }
}

async fn await_ready(port: u16) -> Result<(), EngineError> {
    let attempts = READY_TIMEOUT_SECS * 1000 / READY_POLL_INTERVAL.as_millis() as u64;
    for _ in 0..attempts {
        if TcpStream::connect(("127.0.0.1", port)).await.is_ok() {
            return Ok(());
        }
        sleep(READY_POLL_INTERVAL).await;
    }
    Err(EngineError::StartTimeout(READY_TIMEOUT_SECS))
}

async fn reap(child: &mut Child) {
    let _ = child.start_kill();
    let _ = child.wait().await;
}

fn live_engine(port: u16, child: Child) -> LiveEngine {
    let child = Arc::new(tokio::sync::Mutex::new(Some(child)));
    LiveEngine::new(port, move || {
        let child = child.clone();
        async move {
            if let Some(mut child) = child.lock().await.take() {
                let _ = child.start_kill();
                let _ = child.wait().await;
            }
        }
        .boxed()
    })
}

fn free_port() -> Result<u16, EngineError> {
    // Bind-then-drop; the engine binds the same port right after. A lost
    // race surfaces as a failed attempt and goes through retry.
    let listener = TcpListener::bind(("127.0.0.1", 0))?;
    Ok(listener.local_addr()?.port())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
    use tokio::sync::Mutex;

    #[derive(Default)]
    struct RecordingNotify {
        messages: Mutex<Vec<(MessageType, String)>>,
    }

    #[async_trait]
    impl Notify for RecordingNotify {
        async fn notify(&self, level: MessageType, message: String) {
            self.messages.lock().await.push((level, message));
        }
    }

    fn noop_engine(port: u16) -> LiveEngine {
        LiveEngine::new(port, || Box::pin(async {}))
    }

    #[tokio::test(start_paused = true)]
    async fn retry_exhausts_attempts_with_one_final_error() {
        let notify = RecordingNotify::default();
        let attempts = AtomicU32::new(0);

        let outcome = start_with_retry(&notify, 3, Duration::from_secs(1), || {
            attempts.fetch_add(1, Ordering::SeqCst);
            async { Err(EngineError::Spawn("lumen-engine: not found".to_string())) }
        })
        .await;

        assert!(matches!(outcome, StartOutcome::Failed));
        assert_eq!(attempts.load(Ordering::SeqCst), 3);

        let messages = notify.messages.lock().await;
        let errors: Vec<_> = messages
            .iter()
            .filter(|(level, _)| *level == MessageType::ERROR)
            .collect();
        assert_eq!(errors.len(), 1);
        assert!(errors[0].1.contains("after 3 attempts"));
    }

    #[tokio::test(start_paused = true)]
    async fn retry_stops_at_first_success() {
        let notify = RecordingNotify::default();
        let attempts = AtomicU32::new(0);

        let outcome = start_with_retry(&notify, 5, Duration::from_secs(1), || {
            let attempt = attempts.fetch_add(1, Ordering::SeqCst) + 1;
            async move {
                if attempt <= 2 {
                    Err(EngineError::StartTimeout(10))
                } else {
                    Ok(noop_engine(4025))
                }
            }
        })
        .await;

        let StartOutcome::Started(engine) = outcome else {
            panic!("expected a started engine");
        };
        assert_eq!(engine.port(), 4025);
        assert_eq!(attempts.load(Ordering::SeqCst), 3);

        let messages = notify.messages.lock().await;
        assert!(
            messages
                .iter()
                .all(|(level, _)| *level != MessageType::ERROR)
        );
        assert_eq!(
            messages.last().map(|(level, _)| *level),
            Some(MessageType::INFO)
        );
    }

    #[tokio::test]
    async fn stop_is_idempotent_and_runs_the_hook_once() {
        let state = SharedState::default();
        let deactivations = Arc::new(AtomicUsize::new(0));

        let counter = deactivations.clone();
        state.modify(|s| {
            s.engine = Some(LiveEngine::new(4025, move || {
                let counter = counter.clone();
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                }
                .boxed()
            }));
        });

        stop(&state).await;
        stop(&state).await;

        assert_eq!(deactivations.load(Ordering::SeqCst), 1);
        assert_eq!(state.read().engine_port(), None);
    }

    #[tokio::test]
    async fn start_surfaces_spawn_failure() {
        let spec = EngineSpec {
            command: "definitely-not-a-real-command-xyz".to_string(),
            args: vec![],
            root: PathBuf::from("/tmp"),
            port: Some(4025),
        };

        let result = start(&EngineClient::default(), &spec).await;
        match result {
            Err(EngineError::Spawn(message)) => {
                assert!(message.contains("definitely-not-a-real-command-xyz"));
            }
            other => panic!("expected spawn failure, got: {:?}", other),
        }
    }
}
