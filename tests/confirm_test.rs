use s7_admin::{
    ActiveDialog, ConfirmOptions, ConfirmOutcome, ConfirmPreset, ConfirmationService,
    DialogResponse, DialogState,
};
use std::time::Duration;

/// Wait until a dialog with a different id than `previous` is on screen
async fn next_dialog(
    service: &ConfirmationService,
    previous: Option<&ActiveDialog>,
) -> ActiveDialog {
    let previous_id = previous.map(|d| d.id);
    let mut updates = service.subscribe();
    let dialog = updates
        .wait_for(|d| d.as_ref().is_some_and(|d| Some(d.id) != previous_id))
        .await
        .expect("service dropped");
    dialog.clone().unwrap()
}

#[tokio::test]
async fn test_cancel_resolves_cancelled() {
    let service = ConfirmationService::new();
    let caller = tokio::spawn({
        let service = service.clone();
        async move { service.confirm(ConfirmOptions::new()).await }
    });

    next_dialog(&service, None).await;
    assert!(service.cancel());

    assert_eq!(caller.await.unwrap(), ConfirmOutcome::Cancelled);
    assert_eq!(service.state(), DialogState::Idle);
}

#[tokio::test]
async fn test_accept_resolves_confirmed() {
    let service = ConfirmationService::new();
    let caller = tokio::spawn({
        let service = service.clone();
        async move {
            service
                .confirm(ConfirmOptions::preset(ConfirmPreset::Logout))
                .await
        }
    });

    let dialog = next_dialog(&service, None).await;
    assert_eq!(dialog.options.confirm_label, "Sign out");
    assert!(service.respond(dialog.id, DialogResponse::Accept));

    let outcome = caller.await.unwrap();
    assert!(outcome.is_confirmed());
    assert_eq!(outcome, ConfirmOutcome::Confirmed);
}

#[tokio::test]
async fn test_ban_returns_typed_reason() {
    let service = ConfirmationService::new();
    let caller = tokio::spawn({
        let service = service.clone();
        async move { service.confirm(ConfirmOptions::preset(ConfirmPreset::Ban)).await }
    });

    let dialog = next_dialog(&service, None).await;
    assert!(dialog.options.ask_reason);
    assert!(service.set_reason("  spam "));
    assert_eq!(service.current().unwrap().reason, "  spam ");
    assert!(service.accept());

    let outcome = caller.await.unwrap();
    assert_eq!(outcome.reason(), Some("spam"));
}

#[tokio::test]
async fn test_queued_requests_are_answered_in_order() {
    let service = ConfirmationService::new();

    let first = tokio::spawn({
        let service = service.clone();
        async move {
            service
                .confirm(ConfirmOptions::new().title("First"))
                .await
        }
    });
    let first_dialog = next_dialog(&service, None).await;
    assert_eq!(first_dialog.options.title, "First");

    let second = tokio::spawn({
        let service = service.clone();
        async move {
            service
                .confirm(ConfirmOptions::new().title("Second"))
                .await
        }
    });

    // Second request waits behind the first without replacing it
    let mut updates = service.subscribe();
    updates
        .wait_for(|d| d.as_ref().is_some_and(|d| d.queued == 1))
        .await
        .unwrap();
    assert_eq!(service.state(), DialogState::AwaitingInput(first_dialog.id));

    assert!(service.cancel());
    assert_eq!(first.await.unwrap(), ConfirmOutcome::Cancelled);

    let second_dialog = next_dialog(&service, Some(&first_dialog)).await;
    assert_eq!(second_dialog.options.title, "Second");
    assert_eq!(second_dialog.queued, 0);
    assert!(service.accept());
    assert_eq!(second.await.unwrap(), ConfirmOutcome::Confirmed);

    assert_eq!(service.state(), DialogState::Idle);
}

#[tokio::test]
async fn test_abandoned_caller_does_not_block_queue() {
    let service = ConfirmationService::new();

    let abandoned = tokio::spawn({
        let service = service.clone();
        async move { service.confirm(ConfirmOptions::new().title("Gone")).await }
    });
    let gone = next_dialog(&service, None).await;
    abandoned.abort();
    let _ = abandoned.await;

    let waiting = tokio::spawn({
        let service = service.clone();
        async move { service.confirm(ConfirmOptions::new().title("Next")).await }
    });

    // Answering a dialog nobody waits on still advances the queue
    assert!(service.accept());
    let next = next_dialog(&service, Some(&gone)).await;
    assert_eq!(next.options.title, "Next");
    assert!(service.accept());

    let outcome = tokio::time::timeout(Duration::from_secs(5), waiting)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(outcome, ConfirmOutcome::Confirmed);
}

#[tokio::test]
async fn test_cancel_all_on_shutdown() {
    let service = ConfirmationService::new();
    let callers: Vec<_> = (0..3)
        .map(|_| {
            let service = service.clone();
            tokio::spawn(async move { service.confirm(ConfirmOptions::new()).await })
        })
        .collect();

    let mut updates = service.subscribe();
    updates
        .wait_for(|d| d.as_ref().is_some_and(|d| d.queued == 2))
        .await
        .unwrap();

    assert_eq!(service.cancel_all(), 3);
    for caller in callers {
        assert_eq!(caller.await.unwrap(), ConfirmOutcome::Cancelled);
    }
    assert_eq!(service.current(), None);
}

#[tokio::test]
async fn test_abandoned_queued_request_is_never_shown() {
    let service = ConfirmationService::new();

    let live = tokio::spawn({
        let service = service.clone();
        async move { service.confirm(ConfirmOptions::new().title("Live")).await }
    });
    let live_dialog = next_dialog(&service, None).await;

    let gone = tokio::spawn({
        let service = service.clone();
        async move { service.confirm(ConfirmOptions::new().title("Gone")).await }
    });
    let mut updates = service.subscribe();
    updates
        .wait_for(|d| d.as_ref().is_some_and(|d| d.queued == 1))
        .await
        .unwrap();
    gone.abort();
    let _ = gone.await;

    assert!(service.respond(live_dialog.id, DialogResponse::Accept));
    assert_eq!(live.await.unwrap(), ConfirmOutcome::Confirmed);

    assert_eq!(service.current(), None);
    assert_eq!(service.state(), DialogState::Idle);
}
