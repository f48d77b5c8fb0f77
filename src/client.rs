use crate::ui;
use color_eyre::eyre::{
    Result,
    WrapErr,
    eyre,
};
use doors_client::{
    bindings::{
        Action,
        Affordances,
    },
    controller::{
        ControllerConfig,
        GameController,
    },
    deployment::{
        DeploymentEnv,
        DeploymentStore,
        parse_contract_id,
    },
    dispatch::{
        ActionDispatcher,
        PendingAction,
        WorkerEvent,
    },
    error::GameError,
    gateway::{
        AbiRevision,
        ContractBinding,
        FuelDoorsGateway,
    },
    persistence::{
        FileSessionStore,
        STATE_ROOT,
    },
    session::{
        Session,
        SessionManager,
    },
    view::{
        DoorLayout,
        FIXED_DOOR_COUNT,
        GameView,
        Screen,
        Wager,
        parse_units,
    },
    wallets::KeystoreProvider,
};
use fuels::prelude::{
    AssetId,
    Provider,
};
use std::{
    path::PathBuf,
    str::FromStr,
};
use tracing::{
    error,
    info,
    warn,
};

pub const DEFAULT_TESTNET_RPC_URL: &str = "https://testnet.fuel.network";
pub const DEFAULT_DEVNET_RPC_URL: &str = "https://devnet.fuel.network";
pub const DEFAULT_LOCAL_RPC_URL: &str = "http://localhost:4000/";
const DEFAULT_TICKER: &str = "ETH";
const MAX_ERRORS: usize = 50;

#[derive(Clone, Debug)]
pub enum NetworkTarget {
    Testnet { url: String },
    Devnet { url: String },
    LocalNode { url: String },
}

impl NetworkTarget {
    pub fn env(&self) -> DeploymentEnv {
        match self {
            NetworkTarget::Testnet { .. } => DeploymentEnv::Test,
            NetworkTarget::Devnet { .. } => DeploymentEnv::Dev,
            NetworkTarget::LocalNode { .. } => DeploymentEnv::Local,
        }
    }

    pub fn url(&self) -> &str {
        match self {
            NetworkTarget::Testnet { url }
            | NetworkTarget::Devnet { url }
            | NetworkTarget::LocalNode { url } => url,
        }
    }
}

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub network: NetworkTarget,
    pub wallet_name: String,
    pub wallet_dir: PathBuf,
    pub contract_id: Option<String>,
    pub wager_asset_id: Option<String>,
    pub abi_revision: Option<AbiRevision>,
    pub wager: String,
    pub decimals: u32,
    pub ticker: Option<String>,
    pub fixed_doors: bool,
    pub claim_min_stage: u64,
    pub disconnect: bool,
}

/// Everything the UI needs for one frame.
#[derive(Clone, Debug)]
pub struct AppSnapshot {
    pub network: String,
    pub account: Option<String>,
    pub owner: bool,
    pub revision: AbiRevision,
    pub wager: String,
    pub view: GameView,
    pub pending: Option<PendingAction>,
    pub status: String,
    pub errors: Vec<String>,
    pub affordances: Affordances,
}

impl AppSnapshot {
    fn new(network: String, revision: AbiRevision, wager: String) -> Self {
        let mut snapshot = Self {
            network,
            account: None,
            owner: false,
            revision,
            wager,
            view: GameView::placeholder(),
            pending: None,
            status: String::new(),
            errors: Vec::new(),
            affordances: Affordances::default(),
        };
        snapshot.refresh_affordances();
        snapshot
    }

    fn set_session<G>(&mut self, session: &Session<G>) {
        self.account = Some(session.account_hex());
        self.owner = session.is_owner();
        self.refresh_affordances();
    }

    fn clear_session(&mut self) {
        self.account = None;
        self.owner = false;
        self.view = GameView::placeholder();
        self.refresh_affordances();
    }

    fn set_view(&mut self, view: GameView) {
        self.view = view;
        self.refresh_affordances();
    }

    fn set_pending(&mut self, pending: Option<PendingAction>) {
        self.pending = pending;
        self.refresh_affordances();
    }

    fn set_status(&mut self, message: impl Into<String>) {
        self.status = message.into();
        self.errors.clear();
    }

    fn push_error(&mut self, message: impl Into<String>) {
        let message = message.into();
        error!("{}", message);
        self.errors.push(message);
        if self.errors.len() > MAX_ERRORS {
            let drain = self.errors.len() - MAX_ERRORS;
            self.errors.drain(0..drain);
        }
    }

    /// Silent errors only touch the status line.
    fn report(&mut self, err: &GameError) {
        if err.is_silent() {
            self.status = err.to_string();
        } else {
            self.push_error(err.to_string());
        }
    }

    fn refresh_affordances(&mut self) {
        let doors = match self.view.screen {
            Screen::Active => self.view.door_count(),
            Screen::Idle => 0,
        };
        self.affordances = Affordances {
            connected: self.account.is_some(),
            doors,
            cash_out: self.view.cash_out_visible,
            owner: self.owner,
            reset_supported: self.revision.supports_reset(),
            busy: self.pending.is_some(),
        };
    }
}

type Manager = SessionManager<KeystoreProvider, FileSessionStore>;
type Dispatcher = ActionDispatcher<FuelDoorsGateway>;

struct ResolvedDeployment {
    binding: ContractBinding,
    ticker: Option<String>,
}

async fn resolve_deployment(config: &AppConfig) -> Result<ResolvedDeployment> {
    let env = config.network.env();
    let url = config.network.url();
    let store = DeploymentStore::new(env).wrap_err("opening deployment store")?;
    let record = store.latest()?;

    let contract_id = match (config.contract_id.as_deref(), record.as_ref()) {
        (Some(raw), _) => parse_contract_id(raw)?,
        (None, Some(record)) => parse_contract_id(&record.contract_id)?,
        (None, None) => return Err(eyre!(format_deployment_summary(env, url, &store))),
    };
    let revision = config
        .abi_revision
        .or(record.as_ref().map(|r| r.abi_revision))
        .unwrap_or_default();
    let recorded_asset = record.as_ref().and_then(|r| r.wager_asset_id.clone());
    let wager_asset_id = match config.wager_asset_id.clone().or(recorded_asset) {
        Some(raw) => AssetId::from_str(&raw)
            .map_err(|e| eyre!("Invalid wager asset id {raw:?}: {e}"))?,
        None => {
            let provider = Provider::connect(url)
                .await
                .wrap_err_with(|| format!("Failed to connect to provider at {url}"))?;
            let consensus_parameters = provider.consensus_parameters().await?;
            let base_asset_id = *consensus_parameters.base_asset_id();
            info!(
                asset = %hex::encode(*base_asset_id),
                "no wager asset configured; using the base asset"
            );
            base_asset_id
        }
    };
    let ticker = config
        .ticker
        .clone()
        .or(record.and_then(|r| r.wager_ticker));

    Ok(ResolvedDeployment {
        binding: ContractBinding {
            contract_id,
            wager_asset_id,
            revision,
        },
        ticker,
    })
}

fn format_deployment_summary(env: DeploymentEnv, url: &str, store: &DeploymentStore) -> String {
    format!(
        "No deployment recorded for {env} at {url}.\n\n\
         Record one in {} or pass --contract-id <id> (and --abi-revision) explicitly.",
        store.path().display()
    )
}

pub async fn run_app(config: AppConfig) -> Result<()> {
    let deployment = resolve_deployment(&config).await?;
    let binding = deployment.binding;
    let amount = parse_units(&config.wager, config.decimals).map_err(|e| eyre!(e))?;
    let ticker = deployment
        .ticker
        .unwrap_or_else(|| DEFAULT_TICKER.to_string());
    let wager = Wager::new(amount, config.decimals, ticker);
    info!(
        contract = %binding.contract_id,
        revision = %binding.revision,
        wager = amount,
        "resolved deployment"
    );

    let provider = KeystoreProvider::new(
        config.wallet_dir.clone(),
        config.wallet_name.clone(),
        config.network.url(),
        binding,
    );
    let store = FileSessionStore::new(STATE_ROOT)?;
    let mut manager = SessionManager::new(provider, store);
    if config.disconnect {
        manager.disconnect()?;
        info!("cleared persisted session");
    }

    let layout = if config.fixed_doors {
        DoorLayout::Fixed(FIXED_DOOR_COUNT)
    } else {
        DoorLayout::default()
    };
    let controller = GameController::new(ControllerConfig {
        wager: wager.clone(),
        layout,
        claim_min_stage: config.claim_min_stage,
    });
    let (mut dispatcher, mut worker_events, worker) = ActionDispatcher::spawn(controller);

    let mut snapshot = AppSnapshot::new(
        format!("{} ({})", config.network.env(), config.network.url()),
        binding.revision,
        wager.format(wager.amount),
    );
    // restoring may prompt for a password, so it runs before the UI owns the terminal
    match manager.restore_if_persisted().await {
        Ok(Some(session)) => {
            snapshot.set_session(session);
            snapshot.set_status("Session restored");
            dispatcher.request_sync(session);
        }
        Ok(None) => snapshot.set_status("Press c to connect your wallet"),
        Err(err) => snapshot.report(&err),
    }

    let mut ui_state = ui::UiState::default();
    let mut input_events = ui::input_event_stream();

    ui::terminal_enter(&mut ui_state)?;
    info!("UI ready");
    let res = run_loop(
        &mut manager,
        &mut dispatcher,
        &mut worker_events,
        &mut snapshot,
        &mut ui_state,
        &mut input_events,
    )
    .await;
    ui::terminal_exit()?;

    dispatcher.shutdown();
    if let Err(err) = worker.await {
        warn!(%err, "action worker ended abnormally");
    }
    res
}

async fn run_loop(
    manager: &mut Manager,
    dispatcher: &mut Dispatcher,
    worker_events: &mut tokio::sync::mpsc::UnboundedReceiver<WorkerEvent>,
    snapshot: &mut AppSnapshot,
    ui_state: &mut ui::UiState,
    input_events: &mut ui::InputEventReceiver,
) -> Result<()> {
    ui::draw(ui_state, snapshot).wrap_err("initial draw failed")?;
    loop {
        tokio::select! {
            maybe_event = worker_events.recv() => {
                let Some(event) = maybe_event else {
                    warn!("action worker channel closed");
                    break;
                };
                dispatcher.on_event(&event);
                apply_worker_event(event, snapshot, ui_state, dispatcher.in_flight());
                ui::draw(ui_state, snapshot).wrap_err("draw after worker event failed")?;
            }
            _ = tokio::signal::ctrl_c() => {
                break;
            }
            raw_ev = ui::next_raw_event(input_events) => {
                let event = raw_ev?;
                let Some(ev) = ui::interpret_event(ui_state, event, snapshot) else {
                    continue;
                };
                match ev {
                    ui::UserEvent::Quit => break,
                    ui::UserEvent::Redraw => {}
                    ui::UserEvent::Action(action) => {
                        handle_action(action, manager, dispatcher, snapshot, ui_state, input_events)
                            .await?;
                    }
                    ui::UserEvent::Sign(action) => {
                        submit(action, manager, dispatcher, snapshot);
                    }
                    ui::UserEvent::Decline(action) => {
                        let err = GameError::TransactionRejected(format!(
                            "declined to sign {action}"
                        ));
                        snapshot.report(&err);
                    }
                    ui::UserEvent::ConfirmRestart => {
                        request_signature(PendingAction::Restart, manager, dispatcher, snapshot, ui_state);
                    }
                    ui::UserEvent::DeclineRestart => {
                        snapshot.set_status("Kept the active game");
                    }
                }
                ui::draw(ui_state, snapshot).wrap_err("draw after input failed")?;
            }
        }
    }
    Ok(())
}

fn apply_worker_event(
    event: WorkerEvent,
    snapshot: &mut AppSnapshot,
    ui_state: &mut ui::UiState,
    in_flight: Option<PendingAction>,
) {
    match event {
        WorkerEvent::Synced { view, error } => {
            // a disconnect may have raced a sync
            if snapshot.account.is_some() {
                snapshot.set_view(view);
            }
            if let Some(err) = error {
                snapshot.report(&err);
            }
        }
        WorkerEvent::Cleared { view } => snapshot.set_view(view),
        WorkerEvent::Finished {
            action,
            result,
            view,
        } => {
            snapshot.set_pending(in_flight);
            // the session that submitted this action is gone
            if snapshot.account.is_none() {
                info!(%action, "dropping result of a disconnected session");
                return;
            }
            snapshot.set_view(view);
            match result {
                Ok(message) => snapshot.set_status(message),
                Err(GameError::GameAlreadyActive)
                    if matches!(action, PendingAction::Start)
                        && snapshot.revision.supports_reset() =>
                {
                    ui_state.confirm_restart();
                }
                Err(GameError::GameAlreadyActive) => {
                    snapshot.push_error(
                        "A game is already active; cash out or finish it before starting another",
                    );
                }
                Err(err) => snapshot.report(&err),
            }
        }
    }
}

async fn handle_action(
    action: Action,
    manager: &mut Manager,
    dispatcher: &mut Dispatcher,
    snapshot: &mut AppSnapshot,
    ui_state: &mut ui::UiState,
    input_events: &ui::InputEventReceiver,
) -> Result<()> {
    match action {
        Action::Connect => {
            // the password prompt needs the plain terminal
            input_events.pause();
            ui::terminal_exit()?;
            let connected = manager.connect().await;
            ui::terminal_enter(ui_state)?;
            input_events.resume();
            match connected {
                Ok(session) => {
                    snapshot.set_session(session);
                    snapshot.set_status(format!("Connected as {}", session.account_hex()));
                    dispatcher.request_sync(session);
                }
                Err(err) => snapshot.report(&err),
            }
        }
        Action::Disconnect => {
            if let Err(err) = manager.disconnect() {
                snapshot.report(&err);
            }
            dispatcher.clear_view();
            snapshot.clear_session();
            snapshot.set_status("Disconnected");
        }
        Action::Refresh => match manager.session() {
            Some(session) => dispatcher.request_sync(session),
            None => snapshot.report(&GameError::NotConnected),
        },
        Action::Start => {
            request_signature(PendingAction::Start, manager, dispatcher, snapshot, ui_state);
        }
        Action::CashOut => {
            request_signature(PendingAction::CashOut, manager, dispatcher, snapshot, ui_state);
        }
        Action::Withdraw => {
            request_signature(PendingAction::Withdraw, manager, dispatcher, snapshot, ui_state);
        }
        Action::Reset => {
            request_signature(PendingAction::Reset, manager, dispatcher, snapshot, ui_state);
        }
        Action::PickSelected => {
            let pick = PendingAction::PickDoor {
                choice: ui_state.selected_door(),
                door_count: snapshot.view.door_count(),
            };
            request_signature(pick, manager, dispatcher, snapshot, ui_state);
        }
        Action::PickDoor(choice) => {
            let pick = PendingAction::PickDoor {
                choice,
                door_count: snapshot.view.door_count(),
            };
            request_signature(pick, manager, dispatcher, snapshot, ui_state);
        }
        // handled by the UI itself
        Action::SelectPrev | Action::SelectNext | Action::Quit => {}
    }
    Ok(())
}

/// Opens the signing prompt unless the action could not be sent anyway.
fn request_signature(
    action: PendingAction,
    manager: &Manager,
    dispatcher: &Dispatcher,
    snapshot: &mut AppSnapshot,
    ui_state: &mut ui::UiState,
) {
    if manager.session().is_none() {
        snapshot.report(&GameError::NotConnected);
        return;
    }
    if let Some(pending) = dispatcher.in_flight() {
        snapshot.report(&GameError::ActionInFlight(pending));
        return;
    }
    ui_state.request_signature(action);
}

fn submit(
    action: PendingAction,
    manager: &Manager,
    dispatcher: &mut Dispatcher,
    snapshot: &mut AppSnapshot,
) {
    let Some(session) = manager.session() else {
        snapshot.report(&GameError::NotConnected);
        return;
    };
    match dispatcher.submit(action, session) {
        Ok(()) => {
            snapshot.set_pending(dispatcher.in_flight());
            snapshot.set_status(format!("Submitted {action}"));
        }
        Err(err) => snapshot.report(&err),
    }
}
