use crate::{
    doors_types as doors,
    error::GameError,
};
use fuels::{
    prelude::{
        AssetId,
        Bech32ContractId,
        CallParameters,
        ContractId,
        Execution,
        Provider,
        VariableOutputPolicy,
        WalletUnlocked,
    },
    types::{
        Address,
        errors::{
            Error as FuelsError,
            transaction::Reason,
        },
    },
};
use serde::{
    Deserialize,
    Serialize,
};
use std::fmt;

const DEFAULT_GAS_FORWARDED: u64 = 1_000_000;

/// Snapshot of `players(address)`. Owned by the contract; never cached.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct PlayerRecord {
    pub stage: u64,
    /// Fixed point, ten times the real multiplier.
    pub multiplier: u64,
    pub active: bool,
}

impl PlayerRecord {
    pub fn new(stage: u64, multiplier: u64, active: bool) -> Self {
        Self {
            stage,
            multiplier,
            active,
        }
    }
}

impl From<doors::Player> for PlayerRecord {
    fn from(player: doors::Player) -> Self {
        Self {
            stage: player.stage,
            multiplier: player.multiplier,
            active: player.active,
        }
    }
}

/// Deployed contracts differ only in whether `reset_game` exists.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AbiRevision {
    #[default]
    Original,
    WithReset,
}

impl AbiRevision {
    pub fn supports_reset(self) -> bool {
        matches!(self, AbiRevision::WithReset)
    }
}

impl fmt::Display for AbiRevision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            AbiRevision::Original => "original",
            AbiRevision::WithReset => "with-reset",
        };
        write!(f, "{name}")
    }
}

/// Contract handle bound to one signing account.
///
/// Every state-changing method resolves only once the transaction is
/// confirmed or rejected; an `Ok` means the chain accepted it.
pub trait DoorsGateway: Clone + Send + Sync + 'static {
    fn revision(&self) -> AbiRevision;

    fn owner(&self) -> impl Future<Output = Result<Address, GameError>> + Send;

    fn player(
        &self,
        who: Address,
    ) -> impl Future<Output = Result<PlayerRecord, GameError>> + Send;

    /// Balance of the wager asset held by the contract.
    fn house_balance(&self) -> impl Future<Output = Result<u64, GameError>> + Send;

    fn start_game(&self, wager: u64)
    -> impl Future<Output = Result<(), GameError>> + Send;

    fn pick_door(
        &self,
        choice: u64,
        num_doors: u64,
    ) -> impl Future<Output = Result<(), GameError>> + Send;

    fn cash_out(&self) -> impl Future<Output = Result<(), GameError>> + Send;

    fn withdraw(&self, amount: u64) -> impl Future<Output = Result<(), GameError>> + Send;

    fn reset_game(&self) -> impl Future<Output = Result<(), GameError>> + Send;
}

/// Where the game contract lives and what it takes as a stake.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct ContractBinding {
    pub contract_id: ContractId,
    pub wager_asset_id: AssetId,
    pub revision: AbiRevision,
}

#[derive(Clone)]
pub struct FuelDoorsGateway {
    instance: doors::DoorsContract<WalletUnlocked>,
    provider: Provider,
    binding: ContractBinding,
}

impl FuelDoorsGateway {
    pub fn new(binding: ContractBinding, wallet: WalletUnlocked, provider: Provider) -> Self {
        let instance = doors::DoorsContract::new(binding.contract_id, wallet);
        Self {
            instance,
            provider,
            binding,
        }
    }

    fn gas_params(&self, amount: u64) -> CallParameters {
        CallParameters::new(amount, self.binding.wager_asset_id, DEFAULT_GAS_FORWARDED)
    }
}

impl DoorsGateway for FuelDoorsGateway {
    fn revision(&self) -> AbiRevision {
        self.binding.revision
    }

    async fn owner(&self) -> Result<Address, GameError> {
        self.instance
            .methods()
            .owner()
            .simulate(Execution::StateReadOnly)
            .await
            .map(|response| response.value)
            .map_err(read_error)
    }

    async fn player(&self, who: Address) -> Result<PlayerRecord, GameError> {
        self.instance
            .methods()
            .players(who)
            .simulate(Execution::StateReadOnly)
            .await
            .map(|response| response.value.into())
            .map_err(read_error)
    }

    async fn house_balance(&self) -> Result<u64, GameError> {
        let contract: Bech32ContractId = self.binding.contract_id.into();
        self.provider
            .get_contract_asset_balance(&contract, self.binding.wager_asset_id)
            .await
            .map_err(read_error)
    }

    async fn start_game(&self, wager: u64) -> Result<(), GameError> {
        self.instance
            .methods()
            .start_game()
            .call_params(self.gas_params(wager))
            .map_err(call_error)?
            .call()
            .await
            .map_err(call_error)?;
        Ok(())
    }

    async fn pick_door(&self, choice: u64, num_doors: u64) -> Result<(), GameError> {
        self.instance
            .methods()
            .pick_door(choice, num_doors)
            .call()
            .await
            .map_err(call_error)?;
        Ok(())
    }

    async fn cash_out(&self) -> Result<(), GameError> {
        self.instance
            .methods()
            .cash_out()
            .with_variable_output_policy(VariableOutputPolicy::EstimateMinimum)
            .call()
            .await
            .map_err(call_error)?;
        Ok(())
    }

    async fn withdraw(&self, amount: u64) -> Result<(), GameError> {
        self.instance
            .methods()
            .withdraw(amount)
            .with_variable_output_policy(VariableOutputPolicy::EstimateMinimum)
            .call()
            .await
            .map_err(call_error)?;
        Ok(())
    }

    async fn reset_game(&self) -> Result<(), GameError> {
        if !self.binding.revision.supports_reset() {
            return Err(GameError::Unsupported("reset_game"));
        }
        self.instance
            .methods()
            .reset_game()
            .call()
            .await
            .map_err(call_error)?;
        Ok(())
    }
}

fn read_error(err: FuelsError) -> GameError {
    GameError::Read(err.to_string())
}

/// Only an executed-and-reverted transaction is a contract verdict. A
/// transaction that never ran (builder, validation, squeezed out) is not.
fn call_error(err: FuelsError) -> GameError {
    match err {
        FuelsError::Transaction(Reason::Reverted { reason, .. }) => GameError::ContractRevert {
            reason: revert_reason(&reason),
        },
        other => GameError::Connection(other.to_string()),
    }
}

fn revert_reason(raw: &str) -> Option<String> {
    let reason = raw.trim();
    if reason.is_empty() {
        None
    } else {
        Some(reason.to_string())
    }
}
