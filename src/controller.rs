use crate::{
    dispatch::PendingAction,
    error::GameError,
    gateway::{
        DoorsGateway,
        PlayerRecord,
    },
    session::Session,
    view::{
        DoorLayout,
        DoorRound,
        GameView,
        OwnerPanel,
        Screen,
        Wager,
    },
};
use rand::{
    Rng,
    SeedableRng,
    rngs::StdRng,
};
use tracing::{
    info,
    warn,
};

pub const DEFAULT_CLAIM_MIN_STAGE: u64 = 2;

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ControllerConfig {
    pub wager: Wager,
    pub layout: DoorLayout,
    /// Stage from which the claim affordance is shown next to cash-out.
    pub claim_min_stage: u64,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            wager: Wager::default(),
            layout: DoorLayout::default(),
            claim_min_stage: DEFAULT_CLAIM_MIN_STAGE,
        }
    }
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum PickOutcome {
    /// The contract accepted the pick; the view reflects its verdict.
    Survived,
    /// The pick reverted and the round is over.
    Lost { reason: Option<String> },
}

/// Turns user intents into contract calls and keeps a view model that is
/// re-derived from the contract after every call.
///
/// The controller never advances game state on its own. The only thing it
/// remembers between syncs is how many doors the current stage offered, so
/// that two syncs of the same record render the same doors.
pub struct GameController<R = StdRng> {
    config: ControllerConfig,
    rng: R,
    round: Option<DoorRound>,
    view: GameView,
}

impl GameController<StdRng> {
    pub fn new(config: ControllerConfig) -> Self {
        Self::with_rng(config, StdRng::from_os_rng())
    }
}

impl<R: Rng> GameController<R> {
    pub fn with_rng(config: ControllerConfig, rng: R) -> Self {
        Self {
            config,
            rng,
            round: None,
            view: GameView::placeholder(),
        }
    }

    pub fn view(&self) -> &GameView {
        &self.view
    }

    pub fn config(&self) -> &ControllerConfig {
        &self.config
    }

    pub fn round(&self) -> Option<DoorRound> {
        self.round
    }

    /// Drops everything derived from the previous session.
    pub fn reset_view(&mut self) {
        self.round = None;
        self.view = GameView::placeholder();
    }

    /// Re-reads the player record and rebuilds the view. On a read failure
    /// the previous view is left untouched.
    pub async fn sync_view<G: DoorsGateway>(
        &mut self,
        session: &Session<G>,
    ) -> Result<&GameView, GameError> {
        self.refresh(session).await?;
        Ok(&self.view)
    }

    pub async fn start_game<G: DoorsGateway>(
        &mut self,
        session: &Session<G>,
    ) -> Result<(), GameError> {
        let record = self.read_record(session).await?;
        if record.active {
            return Err(GameError::GameAlreadyActive);
        }
        info!(wager = self.config.wager.amount, "starting game");
        session.gateway.start_game(self.config.wager.amount).await?;

        self.round = None;
        self.view.screen = Screen::Active;
        let _ = self.refresh(session).await;
        Ok(())
    }

    /// Clears an active game, then starts a fresh one.
    pub async fn restart_game<G: DoorsGateway>(
        &mut self,
        session: &Session<G>,
    ) -> Result<(), GameError> {
        self.reset_game(session).await?;
        self.start_game(session).await
    }

    pub async fn pick_door<G: DoorsGateway>(
        &mut self,
        session: &Session<G>,
        choice: u64,
        door_count: u64,
    ) -> Result<PickOutcome, GameError> {
        let record = self.read_record(session).await?;
        if !record.active {
            return Err(GameError::NoActiveGame);
        }
        let presented = self
            .round
            .filter(|round| round.stage == record.stage)
            .map_or(0, |round| round.door_count);
        if presented != door_count || choice >= door_count {
            return Err(GameError::InvalidDoor {
                choice,
                door_count: presented,
            });
        }

        info!(choice, door_count, stage = record.stage, "picking door");
        match session.gateway.pick_door(choice, door_count).await {
            Ok(()) => {
                let _ = self.refresh(session).await;
                Ok(PickOutcome::Survived)
            }
            Err(GameError::ContractRevert { reason }) => {
                warn!(?reason, stage = record.stage, "pick reverted; round lost");
                if session.gateway.revision().supports_reset()
                    && let Err(err) = session.gateway.reset_game().await
                {
                    warn!(%err, "reset after lost round failed");
                }
                self.round = None;
                self.view.screen = Screen::Idle;
                let _ = self.refresh(session).await;
                Ok(PickOutcome::Lost { reason })
            }
            Err(err) => Err(err),
        }
    }

    pub async fn cash_out<G: DoorsGateway>(
        &mut self,
        session: &Session<G>,
    ) -> Result<(), GameError> {
        let record = self.read_record(session).await?;
        if !record.active {
            return Err(GameError::NoActiveGame);
        }
        info!(stage = record.stage, multiplier = record.multiplier, "cashing out");
        session.gateway.cash_out().await?;

        self.round = None;
        self.view.doors.clear();
        self.view.claim_visible = false;
        self.view.cash_out_visible = false;
        let _ = self.refresh(session).await;
        Ok(())
    }

    /// Withdraws the whole house balance. Returns the amount withdrawn, zero
    /// when there was nothing to take.
    pub async fn withdraw<G: DoorsGateway>(
        &mut self,
        session: &Session<G>,
    ) -> Result<u64, GameError> {
        if !session.is_owner() {
            return Err(GameError::NotOwner);
        }
        let balance = session.gateway.house_balance().await?;
        if balance == 0 {
            info!("house balance is empty; skipping withdraw");
            return Ok(0);
        }
        info!(amount = balance, "withdrawing house balance");
        session.gateway.withdraw(balance).await?;
        let _ = self.refresh(session).await;
        Ok(balance)
    }

    pub async fn reset_game<G: DoorsGateway>(
        &mut self,
        session: &Session<G>,
    ) -> Result<(), GameError> {
        if !session.gateway.revision().supports_reset() {
            return Err(GameError::Unsupported("reset_game"));
        }
        info!("resetting game");
        session.gateway.reset_game().await?;

        self.round = None;
        self.view.screen = Screen::Idle;
        let _ = self.refresh(session).await;
        Ok(())
    }

    /// Runs one action and describes its outcome for the status line.
    pub async fn perform<G: DoorsGateway>(
        &mut self,
        action: PendingAction,
        session: &Session<G>,
    ) -> Result<String, GameError> {
        match action {
            PendingAction::Start => {
                self.start_game(session).await?;
                Ok("Game started!".to_string())
            }
            PendingAction::Restart => {
                self.restart_game(session).await?;
                Ok("Game restarted!".to_string())
            }
            PendingAction::PickDoor { choice, door_count } => {
                match self.pick_door(session, choice, door_count).await? {
                    PickOutcome::Survived => Ok("Door picked!".to_string()),
                    PickOutcome::Lost { reason } => Ok(format!(
                        "Round lost: {}",
                        reason.as_deref().unwrap_or("the contract reverted")
                    )),
                }
            }
            PendingAction::CashOut => {
                self.cash_out(session).await?;
                Ok("Cashed out winnings!".to_string())
            }
            PendingAction::Withdraw => match self.withdraw(session).await? {
                0 => Ok("House balance is empty; nothing to withdraw".to_string()),
                amount => Ok(format!(
                    "Withdraw successful! ({})",
                    self.config.wager.format(amount)
                )),
            },
            PendingAction::Reset => {
                self.reset_game(session).await?;
                Ok("Game reset.".to_string())
            }
        }
    }

    async fn read_record<G: DoorsGateway>(
        &self,
        session: &Session<G>,
    ) -> Result<PlayerRecord, GameError> {
        session.gateway.player(session.account).await
    }

    async fn refresh<G: DoorsGateway>(
        &mut self,
        session: &Session<G>,
    ) -> Result<PlayerRecord, GameError> {
        let record = self.read_record(session).await.inspect_err(|err| {
            warn!(%err, "player read failed; keeping previous view");
        })?;
        let owner_panel = if session.is_owner() {
            let balance = session.gateway.house_balance().await.inspect_err(|err| {
                warn!(%err, "house balance read failed; keeping previous view");
            })?;
            Some(OwnerPanel {
                house_balance: self.config.wager.format(balance),
            })
        } else {
            None
        };

        self.view = if record.active {
            let door_count = self.door_count_for(record.stage);
            GameView::active(
                &record,
                &self.config.wager,
                door_count,
                self.config.claim_min_stage,
                owner_panel,
            )
        } else {
            self.round = None;
            GameView::idle(owner_panel)
        };
        Ok(record)
    }

    fn door_count_for(&mut self, stage: u64) -> u64 {
        match self.round {
            Some(round) if round.stage == stage => round.door_count,
            _ => {
                let door_count = self.config.layout.draw(&mut self.rng);
                self.round = Some(DoorRound { stage, door_count });
                door_count
            }
        }
    }
}
