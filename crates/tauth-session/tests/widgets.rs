mod common;

use common::*;
use serde_json::json;
use std::sync::Arc;
use tauth_identity_bridge::IdentityBridge;
use tauth_session::{
    AuthController, AuthError, ButtonPhase, MountOutcome, MountedButton, WidgetKind,
    WidgetMountCoordinator,
};
use tokio::sync::Notify;

struct Widgets {
    controller: Arc<AuthController>,
    client: Arc<RecordingClient>,
}

fn widgets(helper: ScriptedHelper, loader_gate: Option<Arc<Notify>>) -> Widgets {
    let client = RecordingClient::new();
    let loader = match loader_gate {
        Some(gate) => CountingLoader::gated(client.clone(), gate),
        None => CountingLoader::new(client.clone()),
    };
    let controller = AuthController::builder(config("http://127.0.0.1:9"), Arc::new(IdentityBridge::new(loader)))
        .transport_helper(Arc::new(helper))
        .build()
        .unwrap();
    Widgets {
        controller: Arc::new(controller),
        client,
    }
}

#[tokio::test]
async fn test_login_button_mounts_when_signed_out() {
    let w = widgets(ScriptedHelper::with_nonce("n-1"), None);
    let widget = WidgetMountCoordinator::new(WidgetKind::LoginButton, "#login", w.controller.clone());

    let outcome = widget.render().await;

    let expected = MountedButton {
        epoch: 1,
        target: "#login".to_string(),
        phase: ButtonPhase::Ready,
    };
    assert_eq!(outcome, MountOutcome::Mounted(expected.clone()));
    assert_eq!(widget.mounted(), Some(expected));
    assert_eq!(w.client.renders(), vec!["#login"]);
    assert_eq!(w.client.inits()[0].nonce, "n-1");
}

#[tokio::test]
async fn test_signed_in_widgets() {
    let w = widgets(ScriptedHelper::with_nonce("n-1"), None);
    w.controller.mark_authenticated(json!({"user_id": "1", "display": "Ann"}));

    let header = WidgetMountCoordinator::new(WidgetKind::HeaderButton, "#header", w.controller.clone());
    let login = WidgetMountCoordinator::new(WidgetKind::LoginButton, "#login", w.controller.clone());

    assert_eq!(
        header.render().await,
        MountOutcome::SignedIn {
            display: Some("Ann".to_string())
        }
    );
    assert_eq!(login.render().await, MountOutcome::Hidden);
    assert!(w.client.renders().is_empty());
}

#[tokio::test]
async fn test_detach_during_render_discards_mount() {
    let gate = Arc::new(Notify::new());
    let w = widgets(ScriptedHelper::with_nonce("n-1"), Some(gate.clone()));
    let widget = WidgetMountCoordinator::new(WidgetKind::LoginButton, "#login", w.controller.clone());

    let (outcome, ()) = tokio::join!(widget.render(), async {
        widget.detach();
        gate.notify_one();
    });

    assert_eq!(outcome, MountOutcome::Superseded);
    assert_eq!(widget.mounted(), None);
    assert!(w.client.renders().is_empty());
    assert_eq!(widget.current_epoch(), 2);
}

#[tokio::test]
async fn test_late_exchange_does_not_touch_newer_mount() {
    let gate = Arc::new(Notify::new());
    let helper = ScriptedHelper {
        exchange_gate: Some(gate.clone()),
        ..ScriptedHelper::with_nonce("n-1")
    };
    *helper.exchange.lock() = Some(Ok(json!({"user_id": "1", "display": "Ann"})));
    let w = widgets(helper, None);
    let widget = WidgetMountCoordinator::new(WidgetKind::LoginButton, "#login", w.controller.clone());
    widget.render().await;

    let (result, rerendered) = tokio::join!(widget.submit_credential(Some("tok1".into())), async {
        let outcome = widget.render().await;
        gate.notify_one();
        outcome
    });

    assert!(result.is_ok());
    assert!(w.controller.is_authenticated());
    assert!(matches!(rerendered, MountOutcome::Mounted(ref button) if button.epoch == 2));
    assert_eq!(
        widget.mounted(),
        Some(MountedButton {
            epoch: 2,
            target: "#login".to_string(),
            phase: ButtonPhase::Ready,
        })
    );
}

#[tokio::test]
async fn test_identity_callback_drives_button_phase() {
    let helper = ScriptedHelper::with_nonce("n-1");
    *helper.exchange.lock() = Some(Ok(json!({"user_id": "1", "display": "Ann"})));
    let w = widgets(helper, None);
    let widget = WidgetMountCoordinator::new(WidgetKind::LoginButton, "#login", w.controller.clone());
    widget.render().await;

    w.client.fire_credential(Some("tok1"));
    settle(|| widget.mounted().map(|b| b.phase) == Some(ButtonPhase::Completed)).await;

    assert!(w.controller.is_authenticated());
    assert_eq!(widget.mounted().map(|b| b.phase), Some(ButtonPhase::Completed));
}

#[tokio::test]
async fn test_identity_callback_from_old_render_leaves_new_mount() {
    let gate = Arc::new(Notify::new());
    let helper = ScriptedHelper {
        exchange_gate: Some(gate.clone()),
        ..ScriptedHelper::with_nonce("n-1")
    };
    *helper.exchange.lock() = Some(Ok(json!({"user_id": "1", "display": "Ann"})));
    let w = widgets(helper, None);
    let widget = WidgetMountCoordinator::new(WidgetKind::LoginButton, "#login", w.controller.clone());
    widget.render().await;

    w.client.fire_credential(Some("tok1"));
    settle(|| {
        !w.controller.has_pending_nonce()
            && widget.mounted().map(|b| b.phase) == Some(ButtonPhase::Submitting)
    })
    .await;
    assert_eq!(widget.mounted().map(|b| b.phase), Some(ButtonPhase::Submitting));

    let rerendered = widget.render().await;
    assert!(matches!(rerendered, MountOutcome::Mounted(ref button) if button.epoch == 2));
    gate.notify_one();
    settle(|| w.controller.is_authenticated()).await;
    for _ in 0..10 {
        tokio::task::yield_now().await;
    }

    assert!(w.controller.is_authenticated());
    assert_eq!(
        widget.mounted(),
        Some(MountedButton {
            epoch: 2,
            target: "#login".to_string(),
            phase: ButtonPhase::Ready,
        })
    );
}

#[tokio::test]
async fn test_failed_submission_marks_button() {
    let w = widgets(ScriptedHelper::with_nonce("n-1"), None);
    let widget = WidgetMountCoordinator::new(WidgetKind::LoginButton, "#login", w.controller.clone());
    widget.render().await;

    let err = widget.submit_credential(None).await.unwrap_err();

    assert_eq!(err, AuthError::MissingCredential);
    assert_eq!(widget.mounted().map(|b| b.phase), Some(ButtonPhase::Failed));
}

#[tokio::test]
async fn test_render_failure_is_reported() {
    let w = widgets(ScriptedHelper::default(), None);
    let widget = WidgetMountCoordinator::new(WidgetKind::LoginButton, "#login", w.controller.clone());

    // No nonce available: the helper declines and the fallback host refuses connections
    match widget.render().await {
        MountOutcome::Failed(detail) => assert_eq!(detail.code, "nonce_failed"),
        other => panic!("expected failure, got {:?}", other),
    }
    assert_eq!(widget.mounted(), None);
}

#[tokio::test]
async fn test_watch_rerenders_on_auth_change() {
    let w = widgets(ScriptedHelper::with_nonce("n-1"), None);
    let widget = Arc::new(WidgetMountCoordinator::new(
        WidgetKind::HeaderButton,
        "#header",
        w.controller.clone(),
    ));
    widget.render().await;
    assert!(widget.mounted().is_some());

    let watcher = widget.watch();
    w.controller.mark_authenticated(json!({"user_id": "1", "display": "Ann"}));

    for _ in 0..100 {
        if widget.mounted().is_none() {
            break;
        }
        tokio::task::yield_now().await;
    }

    assert!(widget.mounted().is_none());
    assert_eq!(widget.current_epoch(), 2);
    watcher.abort();
}
