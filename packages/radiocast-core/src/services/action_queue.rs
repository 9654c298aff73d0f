//! Serialized execution of renderer actions.
//!
//! At most one [`RemoteAction`] is in flight at any time. Each dispatch is
//! identified by an [`ActionTicket`]; its completion comes back through the
//! coordinator's command channel and is matched against the in-flight ticket,
//! so results of purged actions are ignored instead of advancing the queue.

use std::collections::VecDeque;
use std::sync::Arc;

use tokio::sync::mpsc;

use super::coordinator::Command;
use super::session::SessionToken;
use crate::error::{ErrorCode, SoapResult};
use crate::renderer::soap::SoapError;
use crate::renderer::{ActionKind, ActionResponse, RemoteTransport, RendererDevice};
use crate::runtime::{TaskSpawner, TokioSpawner};

/// One command bound to a renderer and the session that issued it.
#[derive(Debug, Clone)]
pub struct RemoteAction {
    pub device: RendererDevice,
    pub token: SessionToken,
    pub kind: ActionKind,
}

/// Identity of one dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ActionTicket(u64);

/// Completion handle given to the dispatcher with every action.
///
/// Dropping it unresolved resolves the action as failed, so an action can
/// never hold the queue forever.
pub struct ActionResolver {
    ticket: ActionTicket,
    tx: Option<mpsc::UnboundedSender<Command>>,
}

impl ActionResolver {
    pub(crate) fn new(ticket: ActionTicket, tx: mpsc::UnboundedSender<Command>) -> Self {
        Self {
            ticket,
            tx: Some(tx),
        }
    }

    pub fn ticket(&self) -> ActionTicket {
        self.ticket
    }

    /// Reports the action's outcome to the coordinator.
    pub fn resolve(mut self, outcome: SoapResult<ActionResponse>) {
        self.send(outcome);
    }

    fn send(&mut self, outcome: SoapResult<ActionResponse>) {
        if let Some(tx) = self.tx.take() {
            // Closed channel means the coordinator is gone; nothing to advance
            let _ = tx.send(Command::ActionResolved {
                ticket: self.ticket,
                outcome,
            });
        }
    }
}

impl Drop for ActionResolver {
    fn drop(&mut self) {
        if self.tx.is_some() {
            log::warn!("[ActionQueue] Action {:?} dropped without result", self.ticket);
            self.send(Err(SoapError::Fault("Action abandoned".into())));
        }
    }
}

/// Starts the asynchronous execution of an action.
///
/// Must return promptly; the result is delivered through `resolver`.
pub trait ActionDispatcher: Send + Sync {
    fn dispatch(&self, action: &RemoteAction, resolver: ActionResolver);
}

/// Dispatcher executing actions through a [`RemoteTransport`].
pub struct TransportDispatcher {
    transport: Arc<dyn RemoteTransport>,
    spawner: TokioSpawner,
}

impl TransportDispatcher {
    pub fn new(transport: Arc<dyn RemoteTransport>, spawner: TokioSpawner) -> Self {
        Self { transport, spawner }
    }
}

impl ActionDispatcher for TransportDispatcher {
    fn dispatch(&self, action: &RemoteAction, resolver: ActionResolver) {
        let transport = Arc::clone(&self.transport);
        let device = action.device.clone();
        let kind = action.kind.clone();
        self.spawner.spawn(async move {
            let outcome = transport.execute(&device, &kind).await;
            if let Err(e) = &outcome {
                log::warn!(
                    "[ActionQueue] {} on {} failed ({}): {}",
                    kind.name(),
                    device.name,
                    e.code(),
                    e
                );
            }
            resolver.resolve(outcome);
        });
    }
}

/// FIFO of renderer actions with a single in-flight slot.
pub struct ActionQueue {
    pending: VecDeque<RemoteAction>,
    in_flight: Option<(ActionTicket, RemoteAction)>,
    next_ticket: u64,
    dispatcher: Arc<dyn ActionDispatcher>,
    tx: mpsc::UnboundedSender<Command>,
}

impl ActionQueue {
    pub fn new(dispatcher: Arc<dyn ActionDispatcher>, tx: mpsc::UnboundedSender<Command>) -> Self {
        Self {
            pending: VecDeque::new(),
            in_flight: None,
            next_ticket: 0,
            dispatcher,
            tx,
        }
    }

    /// Appends an action, dispatching it at once if the queue is idle.
    pub fn schedule(&mut self, action: RemoteAction) {
        log::debug!(
            "[ActionQueue] Scheduled {} for {} ({} pending)",
            action.kind.name(),
            action.device.id,
            self.pending.len()
        );
        self.pending.push_back(action);
        if self.in_flight.is_none() {
            self.dispatch_next();
        }
    }

    /// Completes the in-flight action identified by `ticket` and dispatches
    /// the next one.
    ///
    /// Returns the completed action, or `None` for a ticket that is no longer
    /// in flight (its action was purged).
    pub fn on_action_resolved(&mut self, ticket: ActionTicket) -> Option<RemoteAction> {
        match self.in_flight.take() {
            Some((current, action)) if current == ticket => {
                self.dispatch_next();
                Some(action)
            }
            other => {
                self.in_flight = other;
                log::debug!("[ActionQueue] Ignoring result of purged action {:?}", ticket);
                None
            }
        }
    }

    /// Drops pending actions for `device_id` (all devices if `None`).
    ///
    /// An in-flight action for a matching device is forgotten: its request is
    /// not cancelled, but its result will no longer be treated as authoritative.
    /// Returns the number of actions removed.
    pub fn purge(&mut self, device_id: Option<&str>) -> usize {
        let matches = |action: &RemoteAction| device_id.map_or(true, |id| action.device.id == id);

        let before = self.pending.len();
        self.pending.retain(|a| !matches(a));
        let mut removed = before - self.pending.len();

        if self.in_flight.as_ref().is_some_and(|(_, a)| matches(a)) {
            self.in_flight = None;
            removed += 1;
        }

        if removed > 0 {
            log::info!(
                "[ActionQueue] Purged {} action(s) for {}",
                removed,
                device_id.unwrap_or("all devices")
            );
        }

        if self.in_flight.is_none() {
            self.dispatch_next();
        }
        removed
    }

    /// Drops everything, pending and in flight.
    pub fn clear(&mut self) {
        self.purge(None);
    }

    /// `true` while an action is dispatched and unresolved.
    pub fn is_running(&self) -> bool {
        self.in_flight.is_some()
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    fn dispatch_next(&mut self) {
        let Some(action) = self.pending.pop_front() else {
            return;
        };
        self.next_ticket += 1;
        let ticket = ActionTicket(self.next_ticket);
        log::debug!(
            "[ActionQueue] Dispatching {} to {} ({:?})",
            action.kind.name(),
            action.device.id,
            ticket
        );
        self.dispatcher
            .dispatch(&action, ActionResolver::new(ticket, self.tx.clone()));
        self.in_flight = Some((ticket, action));
    }
}
