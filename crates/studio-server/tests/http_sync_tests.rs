//! Auto-save over the HTTP API

use pretty_assertions::assert_eq;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use studio_core::{OwnerId, ProfilePatch, StudioConfig, SyncConfig};
use studio_server::{bind, AppState, StaticTokenAuthenticator};
use studio_sync::{AutoSaveController, HttpProfileStore, SaveStatus};
use studio_test_utils::sample_profile;
use tokio::sync::oneshot;

const TOKEN: &str = "e2e-token";

struct Running {
    base_url: String,
    state: AppState,
    owner: OwnerId,
    stop: Option<oneshot::Sender<()>>,
}

impl Drop for Running {
    fn drop(&mut self) {
        if let Some(stop) = self.stop.take() {
            let _ = stop.send(());
        }
    }
}

fn start() -> Running {
    let owner = OwnerId::new();
    let state = AppState::new(&StudioConfig::default()).with_authenticator(Arc::new(
        StaticTokenAuthenticator::default().with_token(TOKEN, owner),
    ));

    let (stop, stopped) = oneshot::channel::<()>();
    let address: SocketAddr = ([127, 0, 0, 1], 0).into();
    let (bound, server) = bind(state.clone(), address, async {
        let _ = stopped.await;
    })
    .unwrap();
    tokio::spawn(server);

    Running {
        base_url: format!("http://{bound}"),
        state,
        owner,
        stop: Some(stop),
    }
}

async fn wait_for_status(controller: &AutoSaveController, done: impl Fn(&SaveStatus) -> bool) {
    let mut status = controller.watch_status();
    tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            if done(&status.borrow_and_update()) {
                break;
            }
            status.changed().await.unwrap();
        }
    })
    .await
    .unwrap();
}

#[tokio::test]
async fn test_debounced_edits_are_saved_over_http() {
    let server = start();
    let created = server.state.store.create(sample_profile(server.owner)).unwrap();

    let store = Arc::new(HttpProfileStore::new(&server.base_url, TOKEN));
    let editor = AutoSaveController::open(
        store,
        server.state.store.as_ref(),
        created.id,
        SyncConfig::default().with_debounce(Duration::from_millis(50)),
    )
    .await
    .unwrap();
    assert_eq!(editor.snapshot(), created);

    editor.apply(ProfilePatch::new().title("Over the wire")).unwrap();
    editor.apply(ProfilePatch::new().bio("Two edits, one write")).unwrap();
    wait_for_status(&editor, |s| matches!(s, SaveStatus::Saved { .. })).await;

    let stored = server.state.store.get(created.id).unwrap();
    assert_eq!(stored.title, "Over the wire");
    assert_eq!(stored.bio, "Two edits, one write");
    assert_eq!(editor.snapshot(), stored);

    let stats = editor.close().await;
    assert_eq!(stats.flushes_started, 1);
    assert_eq!(server.state.store.feed().active_subscriptions(), 0);
}

#[tokio::test]
async fn test_rejected_credentials_surface_as_error_status() {
    let server = start();
    let created = server.state.store.create(sample_profile(server.owner)).unwrap();

    let store = Arc::new(HttpProfileStore::new(&server.base_url, "wrong-token"));
    let editor = AutoSaveController::open(
        store,
        server.state.store.as_ref(),
        created.id,
        SyncConfig::default().with_debounce(Duration::from_millis(20)),
    )
    .await
    .unwrap();

    editor.apply(ProfilePatch::new().title("Not allowed")).unwrap();
    wait_for_status(&editor, SaveStatus::is_error).await;

    assert_eq!(server.state.store.get(created.id).unwrap(), created);
    assert_eq!(editor.snapshot().title, "Not allowed");
    assert!(editor.has_unsaved_changes());
}

#[tokio::test]
async fn test_missing_profile_fails_open() {
    let server = start();
    let store = Arc::new(HttpProfileStore::new(&server.base_url, TOKEN));

    let result = AutoSaveController::open(
        store,
        server.state.store.as_ref(),
        studio_core::ProfileId::new(),
        SyncConfig::default(),
    )
    .await;

    assert!(matches!(result, Err(studio_sync::SyncError::Load(_))));
    assert_eq!(server.state.store.feed().active_subscriptions(), 0);
}
