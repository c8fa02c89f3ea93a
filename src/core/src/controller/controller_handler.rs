use std::sync::Arc;

use log::{debug, info};
use tokio::sync::{broadcast, mpsc, oneshot};

use crate::configuration::{Config, ReconcilePolicy};
use crate::error_handling::types::*;
use crate::network::{CredentialSource, HttpSessionApi, SessionApi};
use crate::session_management::{
    Accepted, Session, SessionController, SessionEvent, SessionView, StartRequest,
};

const COMMAND_CAPACITY: usize = 16;

/// User intents sent to the driver, each with its reply channel.
#[derive(Debug)]
pub enum Command {
    Rehydrate(oneshot::Sender<Result<SessionView, ControllerError>>),
    Start(StartRequest, oneshot::Sender<Result<Accepted, StartError>>),
    Stop(oneshot::Sender<Result<Accepted, StopError>>),
    DismissEnded(oneshot::Sender<Result<(), SessionError>>),
    Logout(oneshot::Sender<()>),
    Restore(Session, oneshot::Sender<()>),
    Snapshot(oneshot::Sender<Session>),
    Shutdown,
}

/// Single-context driver loop.
///
/// # Fields Overview
///
/// - `core`: the state machine, never shared
/// - `commands`: intents coming from every [`ControllerHandle`]
pub struct Controller<A: SessionApi> {
    core: SessionController<A>,
    commands: mpsc::Receiver<Command>,
}

impl Controller<HttpSessionApi> {
    /// Builds a driver talking HTTP to the server named in `config`.
    pub fn new(
        config: &Config,
        credentials: Arc<dyn CredentialSource>,
    ) -> Result<(Self, ControllerHandle), ControllerError> {
        config.validate()?;
        let api = HttpSessionApi::new(config.api_origin(), config.request_timeout())
            .map_err(|e| ControllerError::Client(e.to_string()))?;
        debug!("Using API at {}", config.api_origin());
        Ok(Self::with_api(Arc::new(api), credentials, config.policy()))
    }
}

impl<A: SessionApi> Controller<A> {
    pub fn with_api(
        api: Arc<A>,
        credentials: Arc<dyn CredentialSource>,
        policy: ReconcilePolicy,
    ) -> (Self, ControllerHandle) {
        let (commands_tx, commands) = mpsc::channel(COMMAND_CAPACITY);
        let core = SessionController::new(api, credentials, policy);
        let handle = ControllerHandle {
            commands: commands_tx,
            events: core.event_sender(),
        };
        (Self { core, commands }, handle)
    }

    /// Runs until [`ControllerHandle::shutdown`] or until every handle is dropped.
    ///
    /// Commands are handled one at a time; while a start or stop call is awaited, further
    /// commands wait in the queue.
    pub async fn run(mut self) -> Result<(), ControllerError> {
        info!("Controller running");
        loop {
            tokio::select! {
                command = self.commands.recv() => match command {
                    Some(Command::Shutdown) | None => break,
                    Some(command) => self.handle_command(command).await,
                },
                wakeup = self.core.next_wakeup() => self.core.handle_wakeup(wakeup),
            }
        }
        info!("Controller stopped");
        Ok(())
    }

    async fn handle_command(&mut self, command: Command) {
        match command {
            Command::Rehydrate(reply) => {
                let result = self.core.rehydrate().await;
                Self::reply(reply, result, "rehydrate");
            }
            Command::Start(request, reply) => {
                let result = self.core.request_start(request).await;
                Self::reply(reply, result, "start");
            }
            Command::Stop(reply) => {
                let result = self.core.request_stop().await;
                Self::reply(reply, result, "stop");
            }
            Command::DismissEnded(reply) => {
                let result = self.core.dismiss_ended();
                Self::reply(reply, result, "dismiss");
            }
            Command::Logout(reply) => {
                self.core.logout().await;
                Self::reply(reply, (), "logout");
            }
            Command::Restore(session, reply) => {
                self.core.restore_session(session);
                Self::reply(reply, (), "restore");
            }
            Command::Snapshot(reply) => {
                let session = self.core.session().clone();
                Self::reply(reply, session, "snapshot");
            }
            Command::Shutdown => {}
        }
    }

    fn reply<T>(reply: oneshot::Sender<T>, value: T, command: &str) {
        if reply.send(value).is_err() {
            debug!("Caller of `{}` went away before the reply", command);
        }
    }
}

/// Cloneable front door to a running [`Controller`].
#[derive(Debug, Clone)]
pub struct ControllerHandle {
    commands: mpsc::Sender<Command>,
    events: broadcast::Sender<SessionEvent>,
}

impl ControllerHandle {
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    async fn request<T>(
        &self,
        command: impl FnOnce(oneshot::Sender<T>) -> Command,
    ) -> Result<T, ControllerError> {
        let (reply, response) = oneshot::channel();
        self.commands
            .send(command(reply))
            .await
            .map_err(|_| ControllerError::ChannelClosed)?;
        response.await.map_err(|_| ControllerError::ChannelClosed)
    }

    pub async fn rehydrate(&self) -> Result<SessionView, ControllerError> {
        self.request(Command::Rehydrate).await?
    }

    pub async fn start(&self, request: StartRequest) -> Result<Accepted, ControllerError> {
        Ok(self.request(|reply| Command::Start(request, reply)).await??)
    }

    pub async fn stop(&self) -> Result<Accepted, ControllerError> {
        Ok(self.request(Command::Stop).await??)
    }

    pub async fn dismiss_ended(&self) -> Result<(), ControllerError> {
        Ok(self.request(Command::DismissEnded).await??)
    }

    pub async fn logout(&self) -> Result<(), ControllerError> {
        self.request(Command::Logout).await
    }

    pub async fn restore(&self, session: Session) -> Result<(), ControllerError> {
        self.request(|reply| Command::Restore(session, reply)).await
    }

    pub async fn session(&self) -> Result<Session, ControllerError> {
        self.request(Command::Snapshot).await
    }

    pub async fn shutdown(&self) -> Result<(), ControllerError> {
        self.commands
            .send(Command::Shutdown)
            .await
            .map_err(|_| ControllerError::ChannelClosed)
    }
}
