use crate::{
    error::GameError,
    gateway::DoorsGateway,
    persistence::{
        PersistedSession,
        SessionStore,
    },
    wallets::{
        Authorization,
        WalletProvider,
    },
};
use fuels::types::Address;
use tracing::{
    info,
    warn,
};

/// Lowercase hex with a `0x` prefix, the form persisted and displayed.
pub fn account_hex(address: &Address) -> String {
    format!("0x{}", hex::encode(address.as_slice()))
}

/// Compares two hex addresses ignoring case and an optional `0x` prefix.
pub fn same_account(a: &str, b: &str) -> bool {
    fn normalize(raw: &str) -> String {
        let trimmed = raw.trim();
        let body = trimmed
            .strip_prefix("0x")
            .or_else(|| trimmed.strip_prefix("0X"))
            .unwrap_or(trimmed);
        body.to_ascii_lowercase()
    }
    normalize(a) == normalize(b)
}

/// A connected account plus the contract handle that signs as it.
#[derive(Clone, Debug)]
pub struct Session<G> {
    pub account: Address,
    pub owner: Address,
    pub gateway: G,
}

impl<G> Session<G> {
    pub fn new(account: Address, owner: Address, gateway: G) -> Self {
        Self {
            account,
            owner,
            gateway,
        }
    }

    pub fn account_hex(&self) -> String {
        account_hex(&self.account)
    }

    pub fn is_owner(&self) -> bool {
        same_account(&account_hex(&self.account), &account_hex(&self.owner))
    }
}

pub struct SessionManager<P: WalletProvider, S> {
    provider: P,
    store: S,
    session: Option<Session<P::Gateway>>,
}

impl<P, S> SessionManager<P, S>
where
    P: WalletProvider,
    S: SessionStore,
{
    pub fn new(provider: P, store: S) -> Self {
        Self {
            provider,
            store,
            session: None,
        }
    }

    pub fn session(&self) -> Option<&Session<P::Gateway>> {
        self.session.as_ref()
    }

    pub fn is_connected(&self) -> bool {
        self.session.is_some()
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Interactive connect, triggered by the user.
    pub async fn connect(&mut self) -> Result<&Session<P::Gateway>, GameError> {
        self.establish(Authorization::Interactive).await
    }

    /// Re-establishes the last session at start-up. Returns `Ok(None)` when
    /// nothing was persisted.
    pub async fn restore_if_persisted(
        &mut self,
    ) -> Result<Option<&Session<P::Gateway>>, GameError> {
        let persisted = match self.store.load() {
            Ok(persisted) => persisted,
            Err(err) => {
                warn!(%err, "ignoring unreadable persisted session");
                None
            }
        };
        if !persisted.is_some_and(|p| p.connected) {
            return Ok(None);
        }
        info!("restoring persisted session");
        self.establish(Authorization::Silent).await.map(Some)
    }

    /// Forgets the session locally; the wallet itself stays untouched.
    pub fn disconnect(&mut self) -> Result<(), GameError> {
        if let Some(session) = self.session.take() {
            info!(account = %session.account_hex(), "disconnected");
        }
        self.store.clear()
    }

    async fn establish(
        &mut self,
        authorization: Authorization,
    ) -> Result<&Session<P::Gateway>, GameError> {
        if !self.provider.is_present() {
            return Err(GameError::NoWallet(
                "no wallet provider is available".to_string(),
            ));
        }
        let (account, gateway) = self
            .provider
            .request_account(authorization)
            .await
            .map_err(GameError::into_connection)?;
        let owner = gateway
            .owner()
            .await
            .map_err(GameError::into_connection)?;
        let session = Session::new(account, owner, gateway);
        let account = session.account_hex();

        if let Ok(Some(previous)) = self.store.load()
            && let Some(previous_account) = previous.account.as_deref()
            && !same_account(previous_account, &account)
        {
            warn!(
                previous = %previous_account,
                current = %account,
                "active account changed; replacing persisted session"
            );
        }
        if let Err(err) = self.store.save(&PersistedSession::connected(&account)) {
            warn!(%err, "failed to persist session");
        }

        info!(%account, owner = session.is_owner(), "wallet connected");
        Ok(&*self.session.insert(session))
    }
}
