#![allow(non_snake_case)]
use doors_client::{
    controller::{
        ControllerConfig,
        GameController,
    },
    dispatch::{
        ActionDispatcher,
        PendingAction,
        WorkerEvent,
    },
    error::GameError,
    gateway::AbiRevision,
    test_helpers::TestContext,
    view::{
        DoorLayout,
        Screen,
    },
};
use rand::{
    SeedableRng,
    rngs::StdRng,
};
use std::sync::Arc;
use tokio::sync::Notify;

fn controller() -> GameController<StdRng> {
    GameController::with_rng(
        ControllerConfig {
            layout: DoorLayout::Fixed(6),
            ..ControllerConfig::default()
        },
        StdRng::seed_from_u64(9),
    )
}

async fn finish(
    dispatcher: &mut ActionDispatcher<doors_client::test_helpers::FakeGateway>,
    events: &mut tokio::sync::mpsc::UnboundedReceiver<WorkerEvent>,
) -> WorkerEvent {
    let event = events.recv().await.unwrap();
    dispatcher.on_event(&event);
    event
}

#[tokio::test]
async fn pick_door__while_pending__second_pick_is_rejected() {
    // given
    let ctx = TestContext::new(AbiRevision::WithReset);
    let session = ctx.alice();
    let (mut dispatcher, mut events, _worker) = ActionDispatcher::spawn(controller());
    dispatcher.submit(PendingAction::Start, &session).unwrap();
    finish(&mut dispatcher, &mut events).await;
    let hold = Arc::new(Notify::new());
    ctx.chain.hold_calls(hold.clone());
    let first = PendingAction::PickDoor {
        choice: 0,
        door_count: 6,
    };
    dispatcher.submit(first, &session).unwrap();

    // when
    let second = dispatcher.submit(
        PendingAction::PickDoor {
            choice: 1,
            door_count: 6,
        },
        &session,
    );

    // then
    assert_eq!(second, Err(GameError::ActionInFlight(first)));
    hold.notify_one();
    let event = finish(&mut dispatcher, &mut events).await;
    let WorkerEvent::Finished { result, view, .. } = event else {
        panic!("expected the pick to finish");
    };
    assert_eq!(result, Ok("Door picked!".to_string()));
    assert_eq!(view.stage, "2");
    assert_eq!(dispatcher.in_flight(), None);
}

#[tokio::test]
async fn start__already_active__reports_game_already_active() {
    // given
    let ctx = TestContext::new(AbiRevision::WithReset);
    let session = ctx.alice();
    let (mut dispatcher, mut events, _worker) = ActionDispatcher::spawn(controller());
    dispatcher.submit(PendingAction::Start, &session).unwrap();
    finish(&mut dispatcher, &mut events).await;

    // when
    dispatcher.submit(PendingAction::Start, &session).unwrap();
    let event = finish(&mut dispatcher, &mut events).await;

    // then
    let WorkerEvent::Finished { result, view, .. } = event else {
        panic!("expected the start to finish");
    };
    assert_eq!(result, Err(GameError::GameAlreadyActive));
    assert_eq!(view.screen, Screen::Active);
}

#[tokio::test]
async fn clear_view__after_disconnect__emits_placeholder() {
    // given
    let ctx = TestContext::new(AbiRevision::WithReset);
    let session = ctx.alice();
    let (mut dispatcher, mut events, _worker) = ActionDispatcher::spawn(controller());
    dispatcher.submit(PendingAction::Start, &session).unwrap();
    finish(&mut dispatcher, &mut events).await;

    // when
    dispatcher.clear_view();
    let event = finish(&mut dispatcher, &mut events).await;

    // then
    let WorkerEvent::Cleared { view } = event else {
        panic!("expected a cleared event");
    };
    assert!(view.doors.is_empty());
    assert_eq!(view.stage, "-");
}

#[tokio::test]
async fn clear_view__while_action_pending__clears_after_it_finishes() {
    // given
    let ctx = TestContext::new(AbiRevision::WithReset);
    let session = ctx.alice();
    let hold = Arc::new(Notify::new());
    ctx.chain.hold_calls(hold.clone());
    let (mut dispatcher, mut events, _worker) = ActionDispatcher::spawn(controller());
    dispatcher.submit(PendingAction::Start, &session).unwrap();

    // when
    dispatcher.clear_view();
    hold.notify_one();
    let first = finish(&mut dispatcher, &mut events).await;
    let second = finish(&mut dispatcher, &mut events).await;

    // then
    assert!(matches!(first, WorkerEvent::Finished { .. }));
    let WorkerEvent::Cleared { view } = second else {
        panic!("expected the clear to arrive last");
    };
    assert_eq!(view.screen, Screen::Idle);
    assert_eq!(view.stage, "-");
}
