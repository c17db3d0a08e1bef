//! Single-task runtime that owns all redirect state and handles browser
//! events strictly in arrival order.

use serde::Serialize;
use serde_json::Value;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

use crate::config::RedirectConfig;
use crate::coordinator::{Decision, NavigationCoordinator};
use crate::error::{CoreError, CoreResult};
use crate::events::HostEvent;
use crate::host::{SharedHost, WindowId};
use crate::intent::IntentStore;
use crate::reactor::FocusCleanupReactor;
use crate::registry::Session;
use crate::storage::KvStore;

#[derive(Debug)]
pub enum EventOutcome {
    IntentReset,
    Navigation(Decision),
    /// The update carried no URL.
    Skipped,
    /// A storage change; holds the cleanup task when a tab is due to close.
    StorageChanged(Option<JoinHandle<()>>),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceSnapshot {
    pub designated_window: Option<WindowId>,
    pub intent: Value,
}

enum ServiceCommand {
    Event(HostEvent),
    Snapshot(oneshot::Sender<ServiceSnapshot>),
}

/// Cloneable sender side of a running [`RedirectService`].
#[derive(Clone)]
pub struct RedirectHandle {
    sender: mpsc::UnboundedSender<ServiceCommand>,
}

impl RedirectHandle {
    pub fn submit(&self, event: HostEvent) -> CoreResult<()> {
        self.sender
            .send(ServiceCommand::Event(event))
            .map_err(|_| CoreError::Internal("redirect service stopped".to_string()))
    }

    /// Resolves after every previously submitted event has been handled.
    pub async fn snapshot(&self) -> CoreResult<ServiceSnapshot> {
        let (reply, rx) = oneshot::channel();
        self.sender
            .send(ServiceCommand::Snapshot(reply))
            .map_err(|_| CoreError::Internal("redirect service stopped".to_string()))?;
        rx.await
            .map_err(|_| CoreError::Internal("redirect service dropped snapshot".to_string()))
    }
}

pub struct RedirectService {
    coordinator: NavigationCoordinator,
    reactor: FocusCleanupReactor,
    session: Session,
    intents: IntentStore,
    commands: mpsc::UnboundedReceiver<ServiceCommand>,
}

impl RedirectService {
    pub fn new(
        host: SharedHost,
        config: RedirectConfig,
        kv: Box<dyn KvStore>,
    ) -> (Self, RedirectHandle) {
        let (sender, commands) = mpsc::unbounded_channel();
        let intents = IntentStore::new(
            kv,
            config.meeting.initial_state_marker.clone(),
            config.cleanup.clear_on_consume,
        );
        let service = Self {
            reactor: FocusCleanupReactor::new(host.clone(), &config),
            coordinator: NavigationCoordinator::new(host, config),
            session: Session::new(),
            intents,
            commands,
        };
        (service, RedirectHandle { sender })
    }

    /// Starts the service on the current runtime.
    pub fn spawn(host: SharedHost, config: RedirectConfig, kv: Box<dyn KvStore>) -> RedirectHandle {
        tracing::info!("starting redirect service on host {}", host.id());
        let (service, handle) = Self::new(host, config, kv);
        tokio::spawn(service.run());
        handle
    }

    pub async fn run(mut self) {
        while let Some(command) = self.commands.recv().await {
            match command {
                ServiceCommand::Event(event) => {
                    if let Err(error) = self.handle_event(event).await {
                        tracing::warn!("redirect event handling failed: {error}");
                    }
                }
                ServiceCommand::Snapshot(reply) => {
                    let _ = reply.send(self.snapshot());
                }
            }
        }
        tracing::debug!("redirect service stopped");
    }

    pub async fn handle_event(&mut self, event: HostEvent) -> CoreResult<EventOutcome> {
        match &event {
            HostEvent::TabCreated { .. } => {
                self.coordinator.on_tab_created(&mut self.intents);
                Ok(EventOutcome::IntentReset)
            }
            HostEvent::TabUpdated { .. } => {
                let Some(navigation) = event.navigation() else {
                    return Ok(EventOutcome::Skipped);
                };
                let decision = self
                    .coordinator
                    .on_tab_updated(&mut self.session, &mut self.intents, &navigation)
                    .await?;
                match &decision {
                    Decision::Ignore | Decision::Allow => {
                        tracing::debug!("{:?} for tab {} ({})", decision, navigation.tab, navigation.url)
                    }
                    _ => {}
                }
                Ok(EventOutcome::Navigation(decision))
            }
            HostEvent::StorageChanged { changes } => {
                let cleanup = self
                    .reactor
                    .on_storage_changed(&self.session, &mut self.intents, changes)
                    .await;
                Ok(EventOutcome::StorageChanged(cleanup))
            }
        }
    }

    pub fn snapshot(&self) -> ServiceSnapshot {
        ServiceSnapshot {
            designated_window: self.session.designated(),
            intent: self.intents.record(),
        }
    }
}
