use crate::{
    error::GameError,
    gateway::{
        ContractBinding,
        DoorsGateway,
        FuelDoorsGateway,
    },
};
use color_eyre::eyre::{
    Result,
    WrapErr,
    eyre,
};
use eth_keystore::decrypt_key;
use fuels::{
    accounts::wallet::DEFAULT_DERIVATION_PATH_PREFIX,
    crypto::SecretKey,
    prelude::{
        Provider,
        WalletUnlocked,
    },
    types::Address,
};
use rpassword::prompt_password;
use std::{
    fs,
    path::{
        Path,
        PathBuf,
    },
};
use tracing::info;

/// Lets a restored session unlock the keystore without a prompt.
pub const PASSWORD_ENV: &str = "DOORS_WALLET_PASSWORD";

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Authorization {
    /// The user asked to connect; prompting is expected.
    Interactive,
    /// Restoring a persisted session; prompt only if nothing else works.
    Silent,
}

/// Source of the active account and its signing capability.
pub trait WalletProvider {
    type Gateway: DoorsGateway;

    fn is_present(&self) -> bool;

    /// Unlocks the active account and binds a contract handle that signs as it.
    fn request_account(
        &self,
        authorization: Authorization,
    ) -> impl Future<Output = Result<(Address, Self::Gateway), GameError>>;
}

#[derive(Clone, Debug)]
pub struct WalletDescriptor {
    pub name: String,
    pub path: PathBuf,
}

impl WalletDescriptor {
    pub fn new(name: impl Into<String>, path: PathBuf) -> Self {
        Self {
            name: name.into(),
            path,
        }
    }
}

pub fn default_wallet_dir() -> Result<PathBuf> {
    let home = std::env::var("HOME").wrap_err("HOME environment variable not set")?;
    Ok(PathBuf::from(home).join(".fuel").join("wallets"))
}

pub fn resolve_wallet_dir(dir: Option<&str>) -> Result<PathBuf> {
    match dir {
        Some(raw) => {
            let expanded = shellexpand::tilde(raw);
            Ok(PathBuf::from(expanded.into_owned()))
        }
        None => default_wallet_dir(),
    }
}

pub fn list_wallets(dir: &Path) -> Result<Vec<WalletDescriptor>> {
    if !dir.exists() {
        return Ok(Vec::new());
    }
    let mut wallets = Vec::new();
    for entry in fs::read_dir(dir).wrap_err("Failed to read wallet directory")? {
        let entry = entry.wrap_err("Failed to read wallet entry")?;
        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        if path.extension().and_then(|ext| ext.to_str()) != Some("wallet") {
            continue;
        }
        let name = path
            .file_stem()
            .and_then(|stem| stem.to_str())
            .ok_or_else(|| eyre!("Invalid wallet filename {:?}", path))?
            .to_owned();
        wallets.push(WalletDescriptor::new(name, path));
    }
    wallets.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(wallets)
}

pub fn find_wallet(dir: &Path, name: &str) -> Option<WalletDescriptor> {
    list_wallets(dir)
        .ok()?
        .into_iter()
        .find(|w| w.name == name)
}

fn unlock_wallet(
    descriptor: &WalletDescriptor,
    password: &str,
    provider: &Provider,
) -> Result<WalletUnlocked> {
    let secret = decrypt_key(&descriptor.path, password.as_bytes())
        .map_err(|_| eyre!("Invalid password for wallet '{}'", descriptor.name))?;

    if let Ok(secret_key) = SecretKey::try_from(secret.as_slice()) {
        return Ok(WalletUnlocked::new_from_private_key(
            secret_key,
            Some(provider.clone()),
        ));
    }

    if let Ok(mnemonic) = std::str::from_utf8(&secret) {
        let word_count = mnemonic.split_whitespace().count();
        if word_count >= 12 {
            let derivation_path = format!("{DEFAULT_DERIVATION_PATH_PREFIX}/0'/0/0");
            let private_key =
                SecretKey::new_from_mnemonic_phrase_with_path(mnemonic, &derivation_path)?;
            return Ok(WalletUnlocked::new_from_private_key(
                private_key,
                Some(provider.clone()),
            ));
        }
    }

    Err(eyre!(
        "Wallet '{}' contained unsupported key material",
        descriptor.name
    ))
}

/// A forc-wallet keystore on disk, unlocked with a password.
#[derive(Clone, Debug)]
pub struct KeystoreProvider {
    dir: PathBuf,
    wallet_name: String,
    rpc_url: String,
    binding: ContractBinding,
}

impl KeystoreProvider {
    pub fn new(
        dir: PathBuf,
        wallet_name: impl Into<String>,
        rpc_url: impl Into<String>,
        binding: ContractBinding,
    ) -> Self {
        Self {
            dir,
            wallet_name: wallet_name.into(),
            rpc_url: rpc_url.into(),
            binding,
        }
    }

    fn password(&self, authorization: Authorization) -> Result<String, GameError> {
        if let Ok(password) = std::env::var(PASSWORD_ENV) {
            return Ok(password);
        }
        if authorization == Authorization::Silent {
            info!(
                wallet = %self.wallet_name,
                "restored session needs the wallet password; prompting"
            );
        }
        let prompt = format!("Enter password for wallet '{}': ", self.wallet_name);
        prompt_password(prompt)
            .map_err(|e| GameError::TransactionRejected(format!("password prompt: {e}")))
    }
}

impl WalletProvider for KeystoreProvider {
    type Gateway = FuelDoorsGateway;

    fn is_present(&self) -> bool {
        list_wallets(&self.dir)
            .map(|wallets| !wallets.is_empty())
            .unwrap_or(false)
    }

    async fn request_account(
        &self,
        authorization: Authorization,
    ) -> Result<(Address, FuelDoorsGateway), GameError> {
        let descriptor = find_wallet(&self.dir, &self.wallet_name).ok_or_else(|| {
            GameError::NoWallet(format!(
                "wallet '{}' not found in {}",
                self.wallet_name,
                self.dir.display()
            ))
        })?;
        let password = self.password(authorization)?;
        let provider = Provider::connect(&self.rpc_url).await.map_err(|e| {
            GameError::Connection(format!(
                "failed to connect to provider at {}: {e}",
                self.rpc_url
            ))
        })?;
        let wallet = unlock_wallet(&descriptor, &password, &provider)
            .map_err(|e| GameError::Connection(format!("{e:#}")))?;
        let account = Address::from(wallet.address());
        let gateway = FuelDoorsGateway::new(self.binding, wallet, provider);
        Ok((account, gateway))
    }
}

#[cfg(test)]
mod tests {
    #![allow(non_snake_case)]
    use super::*;
    use tempdir::TempDir;

    #[test]
    fn list_wallets__only_wallet_files_sorted_by_name() {
        // given
        let dir = TempDir::new("wallets").unwrap();
        fs::write(dir.path().join("zed.wallet"), b"{}").unwrap();
        fs::write(dir.path().join("alice.wallet"), b"{}").unwrap();
        fs::write(dir.path().join("notes.txt"), b"ignored").unwrap();
        fs::create_dir(dir.path().join("nested.wallet")).unwrap();

        // when
        let wallets = list_wallets(dir.path()).unwrap();

        // then
        let names: Vec<_> = wallets.iter().map(|w| w.name.as_str()).collect();
        assert_eq!(names, vec!["alice", "zed"]);
    }

    #[test]
    fn list_wallets__missing_dir__is_empty() {
        let dir = TempDir::new("wallets").unwrap();
        let missing = dir.path().join("nope");
        assert!(list_wallets(&missing).unwrap().is_empty());
    }

    #[test]
    fn resolve_wallet_dir__explicit_path__is_used_verbatim() {
        let resolved = resolve_wallet_dir(Some("/tmp/keys")).unwrap();
        assert_eq!(resolved, PathBuf::from("/tmp/keys"));
    }

    #[test]
    fn find_wallet__unknown_name__is_none() {
        let dir = TempDir::new("wallets").unwrap();
        fs::write(dir.path().join("alice.wallet"), b"{}").unwrap();
        assert!(find_wallet(dir.path(), "bob").is_none());
        assert!(find_wallet(dir.path(), "alice").is_some());
    }
}
