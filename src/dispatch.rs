use crate::{
    controller::GameController,
    error::GameError,
    gateway::DoorsGateway,
    session::Session,
    view::GameView,
};
use rand::Rng;
use std::fmt;
use tokio::{
    sync::mpsc,
    task::JoinHandle,
};
use tracing::{
    error,
    info,
    warn,
};

/// A state-changing call that has been handed to the worker and not yet
/// confirmed or rejected.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum PendingAction {
    Start,
    /// Reset an active game, then start a new one.
    Restart,
    PickDoor { choice: u64, door_count: u64 },
    CashOut,
    Withdraw,
    Reset,
}

impl fmt::Display for PendingAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PendingAction::Start => write!(f, "start game"),
            PendingAction::Restart => write!(f, "restart game"),
            PendingAction::PickDoor { choice, door_count } => {
                write!(f, "pick door {} of {}", choice + 1, door_count)
            }
            PendingAction::CashOut => write!(f, "cash out"),
            PendingAction::Withdraw => write!(f, "withdraw"),
            PendingAction::Reset => write!(f, "reset game"),
        }
    }
}

/// At most one action in flight per session.
#[derive(Debug, Default)]
pub struct ActionGate {
    in_flight: Option<PendingAction>,
}

impl ActionGate {
    pub fn try_begin(&mut self, action: PendingAction) -> Result<(), GameError> {
        if let Some(pending) = self.in_flight {
            return Err(GameError::ActionInFlight(pending));
        }
        self.in_flight = Some(action);
        Ok(())
    }

    pub fn finish(&mut self) -> Option<PendingAction> {
        self.in_flight.take()
    }

    pub fn in_flight(&self) -> Option<PendingAction> {
        self.in_flight
    }

    pub fn is_busy(&self) -> bool {
        self.in_flight.is_some()
    }
}

pub enum WorkerCommand<G> {
    Sync(Session<G>),
    Perform {
        action: PendingAction,
        session: Session<G>,
    },
    /// Forget the previous session's view.
    Clear,
    Shutdown,
}

#[derive(Clone, Debug)]
pub enum WorkerEvent {
    Synced {
        view: GameView,
        error: Option<GameError>,
    },
    Finished {
        action: PendingAction,
        result: Result<String, GameError>,
        view: GameView,
    },
    /// The previous session's view was dropped.
    Cleared { view: GameView },
}

pub async fn action_worker<G, R>(
    mut controller: GameController<R>,
    mut cmd_rx: mpsc::UnboundedReceiver<WorkerCommand<G>>,
    event_tx: mpsc::UnboundedSender<WorkerEvent>,
) where
    G: DoorsGateway,
    R: Rng + Send + Sync,
{
    while let Some(cmd) = cmd_rx.recv().await {
        let event = match cmd {
            WorkerCommand::Sync(session) => {
                let error = controller.sync_view(&session).await.err();
                WorkerEvent::Synced {
                    view: controller.view().clone(),
                    error,
                }
            }
            WorkerCommand::Perform { action, session } => {
                let result = controller.perform(action, &session).await;
                match &result {
                    Ok(message) => info!(%action, %message, "action confirmed"),
                    Err(err) if err.is_silent() => info!(%action, %err, "action abandoned"),
                    Err(err) => error!(%action, %err, "action failed"),
                }
                WorkerEvent::Finished {
                    action,
                    result,
                    view: controller.view().clone(),
                }
            }
            WorkerCommand::Clear => {
                controller.reset_view();
                WorkerEvent::Cleared {
                    view: controller.view().clone(),
                }
            }
            WorkerCommand::Shutdown => break,
        };
        if event_tx.send(event).is_err() {
            warn!("worker event receiver dropped");
            break;
        }
    }
}

/// The UI side of the worker: submits actions and tracks the in-flight one.
pub struct ActionDispatcher<G> {
    gate: ActionGate,
    cmd_tx: mpsc::UnboundedSender<WorkerCommand<G>>,
}

impl<G: DoorsGateway> ActionDispatcher<G> {
    pub fn spawn<R>(
        controller: GameController<R>,
    ) -> (Self, mpsc::UnboundedReceiver<WorkerEvent>, JoinHandle<()>)
    where
        R: Rng + Send + Sync + 'static,
    {
        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let handle = tokio::spawn(action_worker(controller, cmd_rx, event_tx));
        let dispatcher = Self {
            gate: ActionGate::default(),
            cmd_tx,
        };
        (dispatcher, event_rx, handle)
    }

    /// Rejects with `ActionInFlight` while another action is pending.
    pub fn submit(
        &mut self,
        action: PendingAction,
        session: &Session<G>,
    ) -> Result<(), GameError> {
        self.gate.try_begin(action)?;
        let sent = self.cmd_tx.send(WorkerCommand::Perform {
            action,
            session: session.clone(),
        });
        if sent.is_err() {
            self.gate.finish();
            return Err(GameError::Connection("action worker stopped".to_string()));
        }
        Ok(())
    }

    pub fn request_sync(&self, session: &Session<G>) {
        let _ = self.cmd_tx.send(WorkerCommand::Sync(session.clone()));
    }

    pub fn clear_view(&self) {
        let _ = self.cmd_tx.send(WorkerCommand::Clear);
    }

    pub fn shutdown(&self) {
        let _ = self.cmd_tx.send(WorkerCommand::Shutdown);
    }

    /// Must see every worker event so the in-flight flag clears.
    pub fn on_event(&mut self, event: &WorkerEvent) {
        if let WorkerEvent::Finished { action, .. } = event
            && self.gate.in_flight() == Some(*action)
        {
            self.gate.finish();
        }
    }

    pub fn in_flight(&self) -> Option<PendingAction> {
        self.gate.in_flight()
    }

    pub fn is_busy(&self) -> bool {
        self.gate.is_busy()
    }
}

#[cfg(test)]
mod tests {
    #![allow(non_snake_case)]
    use super::*;
    use crate::{
        controller::ControllerConfig,
        gateway::{
            AbiRevision,
            PlayerRecord,
        },
        test_helpers::TestContext,
    };
    use rand::{
        SeedableRng,
        rngs::StdRng,
    };
    use std::sync::Arc;
    use tokio::sync::Notify;

    fn controller() -> GameController<StdRng> {
        GameController::with_rng(ControllerConfig::default(), StdRng::seed_from_u64(3))
    }

    #[test]
    fn gate__second_action_while_busy__is_rejected() {
        // given
        let mut gate = ActionGate::default();
        gate.try_begin(PendingAction::Start).unwrap();

        // when
        let result = gate.try_begin(PendingAction::CashOut);

        // then
        assert_eq!(result, Err(GameError::ActionInFlight(PendingAction::Start)));
        assert_eq!(gate.in_flight(), Some(PendingAction::Start));
    }

    #[test]
    fn gate__after_finish__accepts_next_action() {
        let mut gate = ActionGate::default();
        gate.try_begin(PendingAction::Start).unwrap();

        assert_eq!(gate.finish(), Some(PendingAction::Start));

        assert!(gate.try_begin(PendingAction::CashOut).is_ok());
    }

    #[test]
    fn pending_action__display__is_one_based_for_doors() {
        let action = PendingAction::PickDoor {
            choice: 2,
            door_count: 6,
        };
        assert_eq!(action.to_string(), "pick door 3 of 6");
    }

    #[tokio::test]
    async fn submit__while_pending__rejects_until_worker_confirms() {
        // given
        let ctx = TestContext::new(AbiRevision::WithReset);
        let hold = Arc::new(Notify::new());
        ctx.chain.hold_calls(hold.clone());
        let session = ctx.alice();
        let (mut dispatcher, mut events, _handle) = ActionDispatcher::spawn(controller());
        dispatcher.submit(PendingAction::Start, &session).unwrap();

        // when
        let second = dispatcher.submit(PendingAction::CashOut, &session);

        // then
        assert_eq!(second, Err(GameError::ActionInFlight(PendingAction::Start)));
        assert!(dispatcher.is_busy());

        hold.notify_one();
        let event = events.recv().await.unwrap();
        dispatcher.on_event(&event);
        let WorkerEvent::Finished { action, result, view } = event else {
            panic!("expected a finished event");
        };
        assert_eq!(action, PendingAction::Start);
        assert_eq!(result, Ok("Game started!".to_string()));
        assert_eq!(view.stage, "1");
        assert!(!dispatcher.is_busy());
        assert_eq!(ctx.chain.player(ctx.alice_address()), PlayerRecord::new(1, 10, true));
    }

    #[tokio::test]
    async fn on_event__failed_action__still_clears_flag() {
        // given
        let ctx = TestContext::new(AbiRevision::WithReset);
        let session = ctx.alice();
        let (mut dispatcher, mut events, _handle) = ActionDispatcher::spawn(controller());

        // when
        dispatcher.submit(PendingAction::CashOut, &session).unwrap();
        let event = events.recv().await.unwrap();
        dispatcher.on_event(&event);

        // then
        assert!(matches!(
            event,
            WorkerEvent::Finished {
                result: Err(GameError::NoActiveGame),
                ..
            }
        ));
        assert!(!dispatcher.is_busy());
    }

    #[tokio::test]
    async fn request_sync__reports_read_failure_with_stale_view() {
        // given
        let ctx = TestContext::new(AbiRevision::WithReset);
        ctx.chain.fail_reads(true);
        let (dispatcher, mut events, _handle) = ActionDispatcher::spawn(controller());

        // when
        dispatcher.request_sync(&ctx.alice());
        let event = events.recv().await.unwrap();

        // then
        let WorkerEvent::Synced { view, error } = event else {
            panic!("expected a sync event");
        };
        assert!(matches!(error, Some(GameError::Read(_))));
        assert_eq!(view, GameView::placeholder());
    }
}
