//! In-memory stand-ins for the wallet, the contract and the session store.

use crate::{
    error::GameError,
    gateway::{
        AbiRevision,
        DoorsGateway,
        PlayerRecord,
    },
    persistence::{
        PersistedSession,
        SessionStore,
    },
    session::Session,
    wallets::{
        Authorization,
        WalletProvider,
    },
};
use fuels::types::Address;
use std::{
    collections::HashMap,
    sync::{
        Arc,
        Mutex,
        MutexGuard,
    },
};
use tokio::sync::Notify;

/// Multiplier gained per safe door, ten times the real value.
pub const MULTIPLIER_STEP: u64 = 5;

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum ChainCall {
    StartGame { caller: Address, wager: u64 },
    PickDoor { caller: Address, choice: u64, num_doors: u64 },
    CashOut { caller: Address },
    Withdraw { caller: Address, amount: u64 },
    ResetGame { caller: Address },
}

#[derive(Debug, Default)]
struct ChainState {
    owner: Address,
    players: HashMap<Address, PlayerRecord>,
    wagers: HashMap<Address, u64>,
    house_balance: u64,
    trap: Option<u64>,
    fail_reads: bool,
    fail_calls: Option<GameError>,
    calls: Vec<ChainCall>,
}

/// Simulates the game contract closely enough to drive the client. State
/// changes only happen when a call succeeds; a revert leaves it untouched.
#[derive(Clone, Debug, Default)]
pub struct FakeChain {
    state: Arc<Mutex<ChainState>>,
    hold: Arc<Mutex<Option<Arc<Notify>>>>,
}

impl FakeChain {
    pub fn new(owner: Address) -> Self {
        let chain = Self::default();
        chain.lock().owner = owner;
        chain
    }

    fn lock(&self) -> MutexGuard<'_, ChainState> {
        self.state.lock().unwrap()
    }

    pub fn owner(&self) -> Address {
        self.lock().owner
    }

    pub fn player(&self, who: Address) -> PlayerRecord {
        self.lock().players.get(&who).copied().unwrap_or_default()
    }

    pub fn set_player(&self, who: Address, record: PlayerRecord) {
        self.lock().players.insert(who, record);
    }

    pub fn house_balance(&self) -> u64 {
        self.lock().house_balance
    }

    pub fn set_house_balance(&self, amount: u64) {
        self.lock().house_balance = amount;
    }

    /// The door that reverts with `Trap` on the next picks.
    pub fn set_trap(&self, door: Option<u64>) {
        self.lock().trap = door;
    }

    pub fn fail_reads(&self, fail: bool) {
        self.lock().fail_reads = fail;
    }

    /// Every state-changing call fails with `err` before reaching the contract.
    pub fn fail_calls(&self, err: Option<GameError>) {
        self.lock().fail_calls = err;
    }

    /// State-changing calls wait for a permit on `notify` before executing.
    pub fn hold_calls(&self, notify: Arc<Notify>) {
        *self.hold.lock().unwrap() = Some(notify);
    }

    /// Confirmed state-changing calls, oldest first.
    pub fn calls(&self) -> Vec<ChainCall> {
        self.lock().calls.clone()
    }

    fn read(&self) -> Result<MutexGuard<'_, ChainState>, GameError> {
        let state = self.lock();
        if state.fail_reads {
            return Err(GameError::Read("node unreachable".to_string()));
        }
        Ok(state)
    }

    async fn transact<T>(
        &self,
        apply: impl FnOnce(&mut ChainState) -> Result<T, GameError>,
    ) -> Result<T, GameError> {
        let hold = self.hold.lock().unwrap().clone();
        if let Some(notify) = hold {
            notify.notified().await;
        }
        let mut state = self.lock();
        if let Some(err) = state.fail_calls.clone() {
            return Err(err);
        }
        apply(&mut state)
    }
}

#[derive(Clone, Debug)]
pub struct FakeGateway {
    chain: FakeChain,
    caller: Address,
    revision: AbiRevision,
}

impl FakeGateway {
    pub fn new(chain: FakeChain, caller: Address, revision: AbiRevision) -> Self {
        Self {
            chain,
            caller,
            revision,
        }
    }
}

impl DoorsGateway for FakeGateway {
    fn revision(&self) -> AbiRevision {
        self.revision
    }

    async fn owner(&self) -> Result<Address, GameError> {
        Ok(self.chain.read()?.owner)
    }

    async fn player(&self, who: Address) -> Result<PlayerRecord, GameError> {
        Ok(self.chain.read()?.players.get(&who).copied().unwrap_or_default())
    }

    async fn house_balance(&self) -> Result<u64, GameError> {
        Ok(self.chain.read()?.house_balance)
    }

    async fn start_game(&self, wager: u64) -> Result<(), GameError> {
        let caller = self.caller;
        self.chain
            .transact(|state| {
                if state.players.get(&caller).is_some_and(|p| p.active) {
                    return Err(GameError::revert("GameAlreadyActive"));
                }
                if wager == 0 {
                    return Err(GameError::revert("WrongWager"));
                }
                state.players.insert(caller, PlayerRecord::new(1, 10, true));
                state.wagers.insert(caller, wager);
                state.house_balance = state.house_balance.saturating_add(wager);
                state.calls.push(ChainCall::StartGame { caller, wager });
                Ok(())
            })
            .await
    }

    async fn pick_door(&self, choice: u64, num_doors: u64) -> Result<(), GameError> {
        let caller = self.caller;
        self.chain
            .transact(|state| {
                let record = state.players.get(&caller).copied().unwrap_or_default();
                if !record.active {
                    return Err(GameError::revert("NoActiveGame"));
                }
                if choice >= num_doors {
                    return Err(GameError::revert("InvalidDoor"));
                }
                if state.trap == Some(choice) {
                    return Err(GameError::revert("Trap"));
                }
                state.players.insert(
                    caller,
                    PlayerRecord::new(
                        record.stage + 1,
                        record.multiplier + MULTIPLIER_STEP,
                        true,
                    ),
                );
                state.calls.push(ChainCall::PickDoor {
                    caller,
                    choice,
                    num_doors,
                });
                Ok(())
            })
            .await
    }

    async fn cash_out(&self) -> Result<(), GameError> {
        let caller = self.caller;
        self.chain
            .transact(|state| {
                let record = state.players.get(&caller).copied().unwrap_or_default();
                if !record.active {
                    return Err(GameError::revert("NoActiveGame"));
                }
                let wager = state.wagers.remove(&caller).unwrap_or_default();
                let payout = wager.saturating_mul(record.multiplier) / 10;
                if payout > state.house_balance {
                    return Err(GameError::revert("InsufficientHouseFunds"));
                }
                state.house_balance -= payout;
                state.players.insert(caller, PlayerRecord::default());
                state.calls.push(ChainCall::CashOut { caller });
                Ok(())
            })
            .await
    }

    async fn withdraw(&self, amount: u64) -> Result<(), GameError> {
        let caller = self.caller;
        self.chain
            .transact(|state| {
                if caller != state.owner {
                    return Err(GameError::revert("NotOwner"));
                }
                if amount > state.house_balance {
                    return Err(GameError::revert("InsufficientHouseFunds"));
                }
                state.house_balance -= amount;
                state.calls.push(ChainCall::Withdraw { caller, amount });
                Ok(())
            })
            .await
    }

    async fn reset_game(&self) -> Result<(), GameError> {
        if !self.revision.supports_reset() {
            return Err(GameError::Unsupported("reset_game"));
        }
        let caller = self.caller;
        self.chain
            .transact(|state| {
                state.players.insert(caller, PlayerRecord::default());
                state.wagers.remove(&caller);
                state.calls.push(ChainCall::ResetGame { caller });
                Ok(())
            })
            .await
    }
}

#[derive(Clone, Debug)]
pub struct FakeWalletProvider {
    chain: FakeChain,
    account: Address,
    revision: AbiRevision,
    present: bool,
    failure: Option<GameError>,
    requests: Arc<Mutex<Vec<Authorization>>>,
}

impl FakeWalletProvider {
    pub fn new(chain: FakeChain, account: Address) -> Self {
        Self {
            chain,
            account,
            revision: AbiRevision::WithReset,
            present: true,
            failure: None,
            requests: Arc::default(),
        }
    }

    pub fn absent(chain: FakeChain) -> Self {
        Self {
            present: false,
            ..Self::new(chain, Address::zeroed())
        }
    }

    pub fn with_revision(mut self, revision: AbiRevision) -> Self {
        self.revision = revision;
        self
    }

    /// `request_account` fails with `err`, e.g. a declined unlock.
    pub fn failing(mut self, err: GameError) -> Self {
        self.failure = Some(err);
        self
    }

    pub fn requests(&self) -> Vec<Authorization> {
        self.requests.lock().unwrap().clone()
    }
}

impl WalletProvider for FakeWalletProvider {
    type Gateway = FakeGateway;

    fn is_present(&self) -> bool {
        self.present
    }

    async fn request_account(
        &self,
        authorization: Authorization,
    ) -> Result<(Address, FakeGateway), GameError> {
        self.requests.lock().unwrap().push(authorization);
        if let Some(err) = self.failure.clone() {
            return Err(err);
        }
        let gateway = FakeGateway::new(self.chain.clone(), self.account, self.revision);
        Ok((self.account, gateway))
    }
}

#[derive(Clone, Debug, Default)]
pub struct MemorySessionStore {
    session: Option<PersistedSession>,
}

impl MemorySessionStore {
    pub fn with(session: PersistedSession) -> Self {
        Self {
            session: Some(session),
        }
    }
}

impl SessionStore for MemorySessionStore {
    fn load(&self) -> Result<Option<PersistedSession>, GameError> {
        Ok(self.session.clone())
    }

    fn save(&mut self, session: &PersistedSession) -> Result<(), GameError> {
        self.session = Some(session.clone());
        Ok(())
    }

    fn clear(&mut self) -> Result<(), GameError> {
        self.session = None;
        Ok(())
    }
}

/// A fake chain with an owner and one player, Alice.
pub struct TestContext {
    pub chain: FakeChain,
    alice: Address,
    owner: Address,
    revision: AbiRevision,
}

impl TestContext {
    pub fn new(revision: AbiRevision) -> Self {
        let owner = Address::from([0xAA; 32]);
        let alice = Address::from([0x11; 32]);
        Self {
            chain: FakeChain::new(owner),
            alice,
            owner,
            revision,
        }
    }

    pub fn alice_address(&self) -> Address {
        self.alice
    }

    pub fn owner_address(&self) -> Address {
        self.owner
    }

    pub fn alice(&self) -> Session<FakeGateway> {
        self.session_for(self.alice)
    }

    pub fn owner(&self) -> Session<FakeGateway> {
        self.session_for(self.owner)
    }

    pub fn session_for(&self, who: Address) -> Session<FakeGateway> {
        let gateway = FakeGateway::new(self.chain.clone(), who, self.revision);
        Session::new(who, self.owner, gateway)
    }

    pub fn wallet_for(&self, who: Address) -> FakeWalletProvider {
        FakeWalletProvider::new(self.chain.clone(), who).with_revision(self.revision)
    }
}
