use clap::{
    ArgGroup,
    Parser,
};
use color_eyre::eyre::{
    Result,
    WrapErr,
};
use doors_client::{
    controller::DEFAULT_CLAIM_MIN_STAGE,
    deployment,
    gateway::AbiRevision,
    persistence::STATE_ROOT,
    wallets,
};
use std::{
    path::Path,
    sync::OnceLock,
};
use tracing_appender::{
    non_blocking::WorkerGuard,
    rolling,
};
use tracing_subscriber::{
    EnvFilter,
    fmt,
};

mod client;
mod ui;

static LOG_GUARD: OnceLock<WorkerGuard> = OnceLock::new();

#[derive(Parser, Debug)]
#[command(
    name = "doors",
    about = "Terminal client for the doors wager game",
    version,
    group(
        ArgGroup::new("network")
            .args(["devnet", "testnet", "local"])
            .required(true)
    )
)]
struct Args {
    /// Connect to Fuel devnet
    #[arg(long)]
    devnet: bool,

    /// Connect to Fuel testnet
    #[arg(long)]
    testnet: bool,

    /// Connect to a local Fuel node
    #[arg(long)]
    local: bool,

    /// Override the RPC URL for the selected network
    #[arg(long)]
    rpc_url: Option<String>,

    /// forc-wallet profile to play with
    #[arg(long, env = "DOORS_WALLET")]
    wallet: String,

    /// Override forc-wallet directory (defaults to ~/.fuel/wallets)
    #[arg(long)]
    wallet_dir: Option<String>,

    /// Game contract id (defaults to the latest recorded deployment)
    #[arg(long)]
    contract_id: Option<String>,

    /// Asset staked by each game (defaults to the deployment's, then the base asset)
    #[arg(long)]
    wager_asset_id: Option<String>,

    /// ABI revision of the deployed contract
    #[arg(long, value_enum)]
    abi_revision: Option<RevisionArg>,

    /// Stake per game, in whole coins
    #[arg(long, default_value = "1")]
    wager: String,

    /// Decimal places of the wager asset
    #[arg(long, default_value_t = 9)]
    decimals: u32,

    /// Display ticker of the wager asset
    #[arg(long)]
    ticker: Option<String>,

    /// Always offer five doors instead of a random five to eight
    #[arg(long)]
    fixed_doors: bool,

    /// Stage from which the claim prompt is shown
    #[arg(long, default_value_t = DEFAULT_CLAIM_MIN_STAGE)]
    claim_min_stage: u64,

    /// Forget the persisted session before starting
    #[arg(long)]
    disconnect: bool,
}

#[derive(Debug, Clone, Copy, clap::ValueEnum)]
enum RevisionArg {
    Original,
    WithReset,
}

impl From<RevisionArg> for AbiRevision {
    fn from(arg: RevisionArg) -> Self {
        match arg {
            RevisionArg::Original => AbiRevision::Original,
            RevisionArg::WithReset => AbiRevision::WithReset,
        }
    }
}

impl Args {
    fn into_config(self) -> Result<client::AppConfig> {
        let network = if self.devnet {
            client::NetworkTarget::Devnet {
                url: self
                    .rpc_url
                    .unwrap_or_else(|| client::DEFAULT_DEVNET_RPC_URL.to_string()),
            }
        } else if self.testnet {
            client::NetworkTarget::Testnet {
                url: self
                    .rpc_url
                    .unwrap_or_else(|| client::DEFAULT_TESTNET_RPC_URL.to_string()),
            }
        } else {
            client::NetworkTarget::LocalNode {
                url: self
                    .rpc_url
                    .unwrap_or_else(|| client::DEFAULT_LOCAL_RPC_URL.to_string()),
            }
        };
        let wallet_dir = wallets::resolve_wallet_dir(self.wallet_dir.as_deref())
            .wrap_err("resolving wallet directory")?;

        Ok(client::AppConfig {
            network,
            wallet_name: self.wallet,
            wallet_dir,
            contract_id: self.contract_id,
            wager_asset_id: self.wager_asset_id,
            abi_revision: self.abi_revision.map(AbiRevision::from),
            wager: self.wager,
            decimals: self.decimals,
            ticker: self.ticker,
            fixed_doors: self.fixed_doors,
            claim_min_stage: self.claim_min_stage,
            disconnect: self.disconnect,
        })
    }
}

/// The terminal belongs to the UI, so logs go to `.doors/logs`.
fn init_tracing() {
    let appender = rolling::daily(Path::new(STATE_ROOT).join("logs"), "doors.log");
    let (writer, guard) = tracing_appender::non_blocking(appender);
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let installed = fmt()
        .with_env_filter(filter)
        .with_writer(writer)
        .with_ansi(false)
        .try_init();
    if installed.is_ok() {
        let _ = LOG_GUARD.set(guard);
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    init_tracing();
    tracing::info!("starting doors client");
    deployment::ensure_structure().wrap_err("initializing deployment directories")?;
    let config = Args::parse().into_config()?;
    client::run_app(config).await
}
