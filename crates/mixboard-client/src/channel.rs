//! Self-healing push channel
//!
//! One tokio task owns the connection and the reconnect state. Every
//! resumption point (connect finished, frame arrived, backoff elapsed, manual
//! reconnect, teardown) is selected inside that task, so the state is never
//! touched from two places at once.

use futures::StreamExt;
use mixboard::{DecodeError, PushMessage};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::backoff::{ChannelStatus, ReconnectPolicy, ReconnectState, RetryDecision};
use crate::error::{ClientError, TransportError};
use crate::transport::{Connector, FrameStream};

/// Message handler callback type
pub type MessageHandler = Arc<dyn Fn(PushMessage) + Send + Sync>;

/// Hooks into a channel's lifecycle. Every method defaults to doing nothing.
pub trait ChannelObserver: Send + Sync + 'static {
    /// Transport opened
    fn on_open(&self) {}

    /// A payload was not a valid push message; it has been discarded
    fn on_decode_error(&self, _error: &DecodeError, _raw: &str) {}

    /// The transport failed or closed
    fn on_transport_error(&self, _error: &TransportError) {}

    /// A retry will start after `delay`
    fn on_retry_scheduled(&self, _attempt: u32, _delay: Duration) {}

    /// Automatic retries stopped
    fn on_exhausted(&self, _error: &ClientError) {}
}

/// Observer that only logs
pub struct LoggingObserver;

impl ChannelObserver for LoggingObserver {
    fn on_decode_error(&self, error: &DecodeError, raw: &str) {
        warn!(error = %error, len = raw.len(), "Discarded push message");
    }

    fn on_exhausted(&self, error: &ClientError) {
        warn!(error = %error, "Push channel disconnected, waiting for manual reconnect");
    }
}

enum Command {
    Reconnect,
}

enum Phase {
    Connecting,
    Open(FrameStream),
    Backoff(Duration),
    Exhausted,
    Stopped,
}

/// Builder for a push channel
pub struct ResilientChannel<C: Connector> {
    connector: C,
    policy: ReconnectPolicy,
    handler: MessageHandler,
    observer: Arc<dyn ChannelObserver>,
}

impl<C: Connector> ResilientChannel<C> {
    /// Create a channel builder for `connector`
    pub fn builder(connector: C) -> Self {
        Self {
            connector,
            policy: ReconnectPolicy::default(),
            handler: Arc::new(|_: PushMessage| {}),
            observer: Arc::new(LoggingObserver),
        }
    }

    /// Set the reconnect policy
    pub fn policy(mut self, policy: ReconnectPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Set the handler that receives every valid push message
    pub fn on_message<F>(mut self, handler: F) -> Self
    where
        F: Fn(PushMessage) + Send + Sync + 'static,
    {
        self.handler = Arc::new(handler);
        self
    }

    /// Set the lifecycle observer
    pub fn observer<O: ChannelObserver>(mut self, observer: O) -> Self {
        self.observer = Arc::new(observer);
        self
    }

    /// Start connecting in the background. Must be called inside a tokio runtime.
    pub fn spawn(self) -> ChannelHandle {
        let state = ReconnectState::new();
        let (status_tx, status_rx) = watch::channel(state.status());
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let cancel = CancellationToken::new();

        info!(endpoint = self.connector.endpoint(), "Starting push channel");

        let worker = Worker {
            connector: self.connector,
            policy: self.policy,
            state,
            handler: self.handler,
            observer: self.observer,
            status: status_tx,
            commands: command_rx,
            cancel: cancel.clone(),
        };
        let task = tokio::spawn(worker.run());

        ChannelHandle {
            commands: command_tx,
            status: status_rx,
            cancel,
            task: Some(task),
        }
    }
}

/// Control surface for a running channel. Dropping it tears the channel down.
pub struct ChannelHandle {
    commands: mpsc::UnboundedSender<Command>,
    status: watch::Receiver<ChannelStatus>,
    cancel: CancellationToken,
    task: Option<JoinHandle<()>>,
}

impl ChannelHandle {
    /// Current health
    pub fn status(&self) -> ChannelStatus {
        *self.status.borrow()
    }

    /// Watch health changes
    pub fn subscribe(&self) -> watch::Receiver<ChannelStatus> {
        self.status.clone()
    }

    pub fn is_connected(&self) -> bool {
        self.status().connected
    }

    pub fn is_exhausted(&self) -> bool {
        self.status().exhausted
    }

    /// Drop any live connection or pending retry and connect again now,
    /// with a full retry budget.
    pub fn reconnect(&self) {
        let _ = self.commands.send(Command::Reconnect);
    }

    /// Stop the channel and wait for its task to finish
    pub async fn shutdown(mut self) {
        self.cancel.cancel();
        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
    }
}

impl Drop for ChannelHandle {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

struct Worker<C: Connector> {
    connector: C,
    policy: ReconnectPolicy,
    state: ReconnectState,
    handler: MessageHandler,
    observer: Arc<dyn ChannelObserver>,
    status: watch::Sender<ChannelStatus>,
    commands: mpsc::UnboundedReceiver<Command>,
    cancel: CancellationToken,
}

impl<C: Connector> Worker<C> {
    async fn run(mut self) {
        let mut phase = Phase::Connecting;
        loop {
            phase = match phase {
                Phase::Connecting => self.connect().await,
                Phase::Open(stream) => self.read(stream).await,
                Phase::Backoff(delay) => self.backoff(delay).await,
                Phase::Exhausted => self.idle().await,
                Phase::Stopped => break,
            };
            self.status.send_replace(self.state.status());
        }

        self.state.on_shutdown();
        self.status.send_replace(self.state.status());
        debug!(endpoint = self.connector.endpoint(), "Push channel stopped");
    }

    async fn connect(&mut self) -> Phase {
        tokio::select! {
            _ = self.cancel.cancelled() => Phase::Stopped,
            command = self.commands.recv() => self.on_command(command),
            result = self.connector.connect() => match result {
                Ok(stream) => {
                    self.state.on_open();
                    info!(endpoint = self.connector.endpoint(), "Push channel connected");
                    self.observer.on_open();
                    Phase::Open(stream)
                }
                Err(e) => {
                    warn!(error = %e, attempt = self.state.attempt(), "Push channel connect failed");
                    self.observer.on_transport_error(&e);
                    self.after_close()
                }
            },
        }
    }

    async fn read(&mut self, mut stream: FrameStream) -> Phase {
        loop {
            tokio::select! {
                _ = self.cancel.cancelled() => return Phase::Stopped,
                command = self.commands.recv() => return self.on_command(command),
                frame = stream.next() => match frame {
                    Some(Ok(raw)) => self.dispatch(&raw),
                    Some(Err(e)) => {
                        warn!(error = %e, "Push channel broke");
                        self.observer.on_transport_error(&e);
                        return self.after_close();
                    }
                    None => {
                        info!("Push channel closed by server");
                        return self.after_close();
                    }
                },
            }
        }
    }

    async fn backoff(&mut self, delay: Duration) -> Phase {
        tokio::select! {
            _ = self.cancel.cancelled() => Phase::Stopped,
            command = self.commands.recv() => self.on_command(command),
            _ = tokio::time::sleep(delay) => Phase::Connecting,
        }
    }

    async fn idle(&mut self) -> Phase {
        tokio::select! {
            _ = self.cancel.cancelled() => Phase::Stopped,
            command = self.commands.recv() => self.on_command(command),
        }
    }

    fn on_command(&mut self, command: Option<Command>) -> Phase {
        match command {
            Some(Command::Reconnect) => {
                info!("Manual reconnect");
                self.state.reset();
                Phase::Connecting
            }
            // Every handle is gone
            None => Phase::Stopped,
        }
    }

    fn after_close(&mut self) -> Phase {
        match self.state.on_close(&self.policy) {
            RetryDecision::Retry { attempt, delay } => {
                info!(
                    delay_ms = delay.as_millis() as u64,
                    attempt,
                    max_attempts = self.policy.max_attempts,
                    "Reconnecting"
                );
                self.observer.on_retry_scheduled(attempt, delay);
                Phase::Backoff(delay)
            }
            RetryDecision::Exhausted => {
                let error = ClientError::Exhausted {
                    attempts: self.policy.max_attempts,
                };
                warn!(error = %error, "Max reconnection attempts reached");
                self.observer.on_exhausted(&error);
                Phase::Exhausted
            }
        }
    }

    fn dispatch(&self, raw: &str) {
        match PushMessage::decode(raw.as_bytes()) {
            Ok(message) => {
                debug!(kind = message.kind(), "Push message received");
                (self.handler)(message);
            }
            Err(e) => self.observer.on_decode_error(&e, raw),
        }
    }
}
