#![allow(non_snake_case)]
use doors_client::{
    error::GameError,
    gateway::AbiRevision,
    persistence::{
        FileSessionStore,
        PersistedSession,
        SessionStore,
    },
    session::{
        SessionManager,
        account_hex,
    },
    test_helpers::TestContext,
    wallets::Authorization,
};
use tempdir::TempDir;

#[tokio::test]
async fn connect__then_restart__restores_without_interaction() {
    // given
    let dir = TempDir::new("doors-session").unwrap();
    let ctx = TestContext::new(AbiRevision::WithReset);
    let first_run = ctx.wallet_for(ctx.alice_address());
    let mut manager =
        SessionManager::new(first_run, FileSessionStore::new(dir.path()).unwrap());
    manager.connect().await.unwrap();
    drop(manager);

    // when
    let second_run = ctx.wallet_for(ctx.alice_address());
    let mut manager = SessionManager::new(
        second_run.clone(),
        FileSessionStore::new(dir.path()).unwrap(),
    );
    let restored = manager
        .restore_if_persisted()
        .await
        .unwrap()
        .map(|session| session.account);

    // then
    assert_eq!(restored, Some(ctx.alice_address()));
    assert_eq!(second_run.requests(), vec![Authorization::Silent]);
}

#[tokio::test]
async fn connect__owner_account__is_owner() {
    let dir = TempDir::new("doors-session").unwrap();
    let ctx = TestContext::new(AbiRevision::Original);
    let wallet = ctx.wallet_for(ctx.owner_address());
    let mut manager = SessionManager::new(wallet, FileSessionStore::new(dir.path()).unwrap());

    let is_owner = manager.connect().await.unwrap().is_owner();

    assert!(is_owner);
}

#[tokio::test]
async fn connect__declined_unlock__stays_disconnected() {
    // given
    let dir = TempDir::new("doors-session").unwrap();
    let ctx = TestContext::new(AbiRevision::WithReset);
    let wallet = ctx
        .wallet_for(ctx.alice_address())
        .failing(GameError::TransactionRejected("prompt closed".to_string()));
    let mut manager = SessionManager::new(wallet, FileSessionStore::new(dir.path()).unwrap());

    // when
    let result = manager.connect().await.map(|_| ());

    // then
    assert!(matches!(result, Err(GameError::TransactionRejected(_))));
    assert!(!manager.is_connected());
    assert_eq!(manager.store().load().unwrap(), None);
}

#[tokio::test]
async fn connect__provider_failure__is_a_connection_error() {
    let dir = TempDir::new("doors-session").unwrap();
    let ctx = TestContext::new(AbiRevision::WithReset);
    let wallet = ctx
        .wallet_for(ctx.alice_address())
        .failing(GameError::Read("node down".to_string()));
    let mut manager = SessionManager::new(wallet, FileSessionStore::new(dir.path()).unwrap());

    let result = manager.connect().await.map(|_| ());

    assert!(matches!(result, Err(GameError::Connection(_))));
}

#[tokio::test]
async fn restore_if_persisted__other_account__overwrites_persisted_entry() {
    // given
    let dir = TempDir::new("doors-session").unwrap();
    let ctx = TestContext::new(AbiRevision::WithReset);
    let mut store = FileSessionStore::new(dir.path()).unwrap();
    store
        .save(&PersistedSession::connected(account_hex(&ctx.owner_address())))
        .unwrap();
    let wallet = ctx.wallet_for(ctx.alice_address());
    let mut manager = SessionManager::new(wallet, store);

    // when
    manager.restore_if_persisted().await.unwrap();

    // then
    let reopened = FileSessionStore::new(dir.path()).unwrap();
    let persisted = reopened.load().unwrap().unwrap();
    assert_eq!(persisted.account, Some(account_hex(&ctx.alice_address())));
}

#[tokio::test]
async fn disconnect__next_start__does_not_restore() {
    // given
    let dir = TempDir::new("doors-session").unwrap();
    let ctx = TestContext::new(AbiRevision::WithReset);
    let mut manager = SessionManager::new(
        ctx.wallet_for(ctx.alice_address()),
        FileSessionStore::new(dir.path()).unwrap(),
    );
    manager.connect().await.unwrap();

    // when
    manager.disconnect().unwrap();

    // then
    let next = ctx.wallet_for(ctx.alice_address());
    let mut manager =
        SessionManager::new(next.clone(), FileSessionStore::new(dir.path()).unwrap());
    let restored = manager.restore_if_persisted().await.unwrap().is_some();
    assert!(!restored);
    assert!(next.requests().is_empty());
}
