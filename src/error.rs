use crate::dispatch::PendingAction;
use thiserror::Error;

/// Everything that can go wrong between a key press and a refreshed view.
///
/// The first five variants mirror what the wallet and the chain can report.
/// The rest are preconditions the client checks before it spends a
/// transaction on something the contract would refuse anyway.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum GameError {
    #[error("No wallet available: {0}")]
    NoWallet(String),
    #[error("Wallet connection failed: {0}")]
    Connection(String),
    #[error("Transaction rejected: {0}")]
    TransactionRejected(String),
    #[error("Contract reverted: {}", reason.as_deref().unwrap_or("no reason given"))]
    ContractRevert { reason: Option<String> },
    #[error("Reading game state failed: {0}")]
    Read(String),
    #[error("Wallet is not connected")]
    NotConnected,
    #[error("A game is already active for this account")]
    GameAlreadyActive,
    #[error("No active game for this account")]
    NoActiveGame,
    #[error("Only the contract owner can do that")]
    NotOwner,
    #[error("Door {choice} is not one of the {door_count} doors on offer")]
    InvalidDoor { choice: u64, door_count: u64 },
    #[error("This deployment does not support {0}")]
    Unsupported(&'static str),
    #[error("Still waiting for {0} to confirm")]
    ActionInFlight(PendingAction),
    #[error("Session persistence failed: {0}")]
    Persistence(String),
}

impl GameError {
    pub fn revert(reason: impl Into<String>) -> Self {
        GameError::ContractRevert {
            reason: Some(reason.into()),
        }
    }

    /// Errors the user caused on purpose; they only change the status line.
    pub fn is_silent(&self) -> bool {
        matches!(
            self,
            GameError::TransactionRejected(_) | GameError::ActionInFlight(_)
        )
    }

    /// Wallet-side failures surface as connection errors once a provider
    /// has been found.
    pub(crate) fn into_connection(self) -> Self {
        match self {
            GameError::NoWallet(_) | GameError::Connection(_) => self,
            GameError::TransactionRejected(_) => self,
            other => GameError::Connection(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(non_snake_case)]
    use super::*;

    #[test]
    fn display__revert_without_reason__uses_generic_message() {
        let err = GameError::ContractRevert { reason: None };
        assert_eq!(err.to_string(), "Contract reverted: no reason given");
    }

    #[test]
    fn display__revert_with_reason__surfaces_reason() {
        let err = GameError::revert("Trap");
        assert_eq!(err.to_string(), "Contract reverted: Trap");
    }

    #[test]
    fn into_connection__read_error__becomes_connection_error() {
        let err = GameError::Read("timeout".into()).into_connection();
        assert_eq!(
            err,
            GameError::Connection("Reading game state failed: timeout".into())
        );
    }

    #[test]
    fn into_connection__no_wallet__is_preserved() {
        let err = GameError::NoWallet("empty".into()).into_connection();
        assert!(matches!(err, GameError::NoWallet(_)));
    }
}
