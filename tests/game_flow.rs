#![allow(non_snake_case)]
use doors_client::{
    controller::{
        ControllerConfig,
        GameController,
        PickOutcome,
    },
    dispatch::PendingAction,
    error::GameError,
    gateway::{
        AbiRevision,
        PlayerRecord,
    },
    test_helpers::{
        ChainCall,
        TestContext,
    },
    view::{
        DoorLayout,
        GameView,
        Screen,
    },
};
use rand::{
    SeedableRng,
    rngs::StdRng,
};

fn controller() -> GameController<StdRng> {
    GameController::with_rng(ControllerConfig::default(), StdRng::seed_from_u64(42))
}

#[tokio::test]
async fn sync_view__fresh_session__shows_placeholders() {
    let ctx = TestContext::new(AbiRevision::WithReset);
    let mut controller = controller();

    // when
    let view = controller.sync_view(&ctx.alice()).await.unwrap().clone();

    // then
    assert_eq!(view.stage, "-");
    assert_eq!(view.multiplier, "-");
    assert_eq!(view.winnings, "-");
    assert!(view.doors.is_empty());
    assert!(!view.cash_out_visible);
}

#[tokio::test]
async fn start_game__confirmed__shows_first_stage() {
    let ctx = TestContext::new(AbiRevision::WithReset);
    let mut controller = controller();
    let alice = ctx.alice();

    // when
    controller.start_game(&alice).await.unwrap();

    // then
    let view = controller.view();
    assert_eq!(view.screen, Screen::Active);
    assert_eq!(view.stage, "1");
    assert_eq!(view.multiplier, "1.0x");
    assert_eq!(view.winnings, "1 ETH");
    assert!((5..=8).contains(&view.door_count()));
    assert!(view.cash_out_visible);
    assert_eq!(
        ctx.chain.calls(),
        vec![ChainCall::StartGame {
            caller: ctx.alice_address(),
            wager: 1_000_000_000,
        }]
    );
}

#[tokio::test]
async fn start_game__rejected__game_not_started() {
    // given
    let ctx = TestContext::new(AbiRevision::WithReset);
    ctx.chain.fail_calls(Some(GameError::TransactionRejected(
        "user declined".to_string(),
    )));
    let mut controller = controller();

    // when
    let result = controller.start_game(&ctx.alice()).await;

    // then
    assert!(matches!(result, Err(GameError::TransactionRejected(_))));
    assert_eq!(controller.view(), &GameView::placeholder());
    assert_eq!(ctx.chain.player(ctx.alice_address()), PlayerRecord::default());
}

#[tokio::test]
async fn pick_door__reverted__returns_to_placeholders() {
    // given
    let ctx = TestContext::new(AbiRevision::WithReset);
    let mut controller = GameController::with_rng(
        ControllerConfig {
            layout: DoorLayout::Fixed(6),
            ..ControllerConfig::default()
        },
        StdRng::seed_from_u64(42),
    );
    let alice = ctx.alice();
    controller.start_game(&alice).await.unwrap();
    ctx.chain.set_trap(Some(2));

    // when
    let outcome = controller.pick_door(&alice, 2, 6).await.unwrap();

    // then
    assert_eq!(
        outcome,
        PickOutcome::Lost {
            reason: Some("Trap".to_string())
        }
    );
    assert_eq!(controller.view(), &GameView::placeholder());
    assert!(controller.round().is_none());
    assert!(matches!(
        ctx.chain.calls().last(),
        Some(ChainCall::ResetGame { .. })
    ));
}

#[tokio::test]
async fn pick_door__reverted_without_reset__resyncs_from_contract() {
    // given
    let ctx = TestContext::new(AbiRevision::Original);
    let mut controller = GameController::with_rng(
        ControllerConfig {
            layout: DoorLayout::Fixed(5),
            ..ControllerConfig::default()
        },
        StdRng::seed_from_u64(42),
    );
    let alice = ctx.alice();
    controller.start_game(&alice).await.unwrap();
    ctx.chain.set_trap(Some(0));

    // when
    let outcome = controller.pick_door(&alice, 0, 5).await.unwrap();

    // then
    assert!(matches!(outcome, PickOutcome::Lost { .. }));
    assert!(
        !ctx.chain
            .calls()
            .iter()
            .any(|call| matches!(call, ChainCall::ResetGame { .. }))
    );
    // the contract still reports the game, so the view does too
    assert_eq!(controller.view().stage, "1");
}

#[tokio::test]
async fn pick_door__safe_doors__multiplier_follows_contract() {
    // given
    let ctx = TestContext::new(AbiRevision::WithReset);
    let mut controller = controller();
    let alice = ctx.alice();
    controller.start_game(&alice).await.unwrap();

    // when
    for _ in 0..2 {
        let door_count = controller.view().door_count();
        controller.pick_door(&alice, 0, door_count).await.unwrap();
    }

    // then
    let view = controller.view();
    assert_eq!(view.stage, "3");
    assert_eq!(view.multiplier, "2.0x");
    assert_eq!(view.winnings, "2 ETH");
    assert!(view.claim_visible);
}

#[tokio::test]
async fn cash_out__active_game__clears_doors_and_claim() {
    // given
    let ctx = TestContext::new(AbiRevision::WithReset);
    ctx.chain.set_house_balance(10_000_000_000);
    let mut controller = controller();
    let alice = ctx.alice();
    controller.start_game(&alice).await.unwrap();
    let door_count = controller.view().door_count();
    controller.pick_door(&alice, 1, door_count).await.unwrap();

    // when
    let message = controller
        .perform(PendingAction::CashOut, &alice)
        .await
        .unwrap();

    // then
    assert_eq!(message, "Cashed out winnings!");
    let view = controller.view();
    assert!(view.doors.is_empty());
    assert!(!view.claim_visible);
    assert!(!view.cash_out_visible);
    assert_eq!(view.stage, "-");
    // 11 coins in, 1.5 coins paid out
    assert_eq!(ctx.chain.house_balance(), 9_500_000_000);
}

#[tokio::test]
async fn cash_out__reverted__state_unchanged() {
    // given
    let ctx = TestContext::new(AbiRevision::WithReset);
    let mut controller = controller();
    let alice = ctx.alice();
    controller.start_game(&alice).await.unwrap();
    let before = controller.view().clone();
    ctx.chain
        .fail_calls(Some(GameError::revert("InsufficientHouseFunds")));

    // when
    let result = controller.cash_out(&alice).await;

    // then
    assert_eq!(result, Err(GameError::revert("InsufficientHouseFunds")));
    assert_eq!(controller.view(), &before);
}

#[tokio::test]
async fn restart_game__active_game__resets_then_starts() {
    // given
    let ctx = TestContext::new(AbiRevision::WithReset);
    ctx.chain
        .set_player(ctx.alice_address(), PlayerRecord::new(4, 25, true));
    let mut controller = controller();
    let alice = ctx.alice();

    // when
    let message = controller
        .perform(PendingAction::Restart, &alice)
        .await
        .unwrap();

    // then
    assert_eq!(message, "Game restarted!");
    assert_eq!(controller.view().stage, "1");
    let calls = ctx.chain.calls();
    assert!(matches!(calls[0], ChainCall::ResetGame { .. }));
    assert!(matches!(calls[1], ChainCall::StartGame { .. }));
}

#[tokio::test]
async fn reset_game__navigates_to_idle() {
    let ctx = TestContext::new(AbiRevision::WithReset);
    let mut controller = controller();
    let alice = ctx.alice();
    controller.start_game(&alice).await.unwrap();

    controller.reset_game(&alice).await.unwrap();

    assert_eq!(controller.view().screen, Screen::Idle);
    assert_eq!(ctx.chain.player(ctx.alice_address()), PlayerRecord::default());
}

#[tokio::test]
async fn withdraw__owner__drains_house_and_refreshes_panel() {
    // given
    let ctx = TestContext::new(AbiRevision::Original);
    let alice = ctx.alice();
    let owner = ctx.owner();
    let mut player = controller();
    let mut house = controller();
    player.start_game(&alice).await.unwrap();

    // when
    let withdrawn = house.withdraw(&owner).await.unwrap();

    // then
    assert_eq!(withdrawn, 1_000_000_000);
    assert_eq!(ctx.chain.house_balance(), 0);
    let panel = house.view().owner_panel.clone().unwrap();
    assert_eq!(panel.house_balance, "0 ETH");
}
