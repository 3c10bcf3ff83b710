//! End-to-end editing workflow
//!
//! Drives two editing sessions against one in-memory record store: the
//! happy path (open, edit, autosave, save, close), a lock conflict between
//! concurrent sessions, and the broadcast notification flow when the holder
//! lets go of an item.

use std::sync::Arc;
use std::time::Duration;

use copydesk::authoring::{
    events, AuthoringService, CloseOutcome, EditSession, SessionPhase, StaticPrompts,
};
use copydesk::autosave::AutosaveService;
use copydesk::identity::{FixedIdentity, IdentityProvider, Privileges};
use copydesk::lock::LockService;
use copydesk::store::MemoryStore;
use copydesk::types::{ContentField, FieldValue, Item};

const AUTOSAVE_MS: u64 = 50;

fn stack(
    store: Arc<MemoryStore>,
    user: &str,
    session: &str,
) -> (Arc<AuthoringService>, Arc<dyn IdentityProvider>) {
    let identity: Arc<dyn IdentityProvider> = Arc::new(FixedIdentity::new(user, session));
    let lock = Arc::new(LockService::new(
        store.clone(),
        identity.clone(),
        Privileges::default(),
    ));
    let autosave = Arc::new(AutosaveService::with_delay(
        store.clone(),
        Duration::from_millis(AUTOSAVE_MS),
    ));
    let authoring = Arc::new(AuthoringService::new(
        store,
        lock,
        autosave,
        Arc::new(StaticPrompts::confirming()),
    ));
    (authoring, identity)
}

fn seeded() -> Arc<MemoryStore> {
    let _ = env_logger::builder().is_test(true).try_init();
    let store = Arc::new(MemoryStore::new());
    let mut item = Item::new("story-1");
    item.fields
        .insert(ContentField::Headline, FieldValue::text("city hall vote"));
    item.fields
        .insert(ContentField::Slugline, FieldValue::text("cityhall"));
    store.seed(item);
    store
}

async fn wait_until(mut done: impl FnMut() -> bool) {
    for _ in 0..200 {
        if done() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("condition not reached in time");
}

#[tokio::test]
async fn full_edit_save_close_cycle() {
    let store = seeded();
    let id = "story-1".to_string();
    let (authoring, identity) = stack(store.clone(), "alice", "alice-session");

    let session = EditSession::open(authoring, identity, &id, false)
        .await
        .expect("open");
    assert!(session.is_editable());
    assert_eq!(session.phase(), SessionPhase::Editing);

    // Edit, let the debounced autosave land server-side.
    session.set_field(ContentField::Headline, FieldValue::text("vote postponed"));
    session.autosave();
    wait_until(|| store.autosave(&id).is_some()).await;
    let draft = store.autosave(&id).expect("draft");
    assert_eq!(
        draft.fields.get(&ContentField::Headline),
        Some(&FieldValue::text("vote postponed"))
    );
    assert!(session.save_enabled());

    // A committed save promotes the draft and removes it.
    let saved = session.save().await.expect("save");
    assert_eq!(
        saved.fields.get(&ContentField::Headline),
        Some(&FieldValue::text("vote postponed"))
    );
    assert!(store.autosave(&id).is_none());
    assert!(!session.is_dirty());

    // Closing releases the lock.
    let outcome = session.close().await;
    assert!(matches!(outcome, CloseOutcome::Closed(_)));
    assert_eq!(session.phase(), SessionPhase::Closed);
    let stored = store.item(&id).expect("stored");
    assert!(stored.lock_user.is_none());
    assert_eq!(
        stored.fields.get(&ContentField::Headline),
        Some(&FieldValue::text("vote postponed"))
    );
}

#[tokio::test]
async fn second_session_opens_read_only_while_locked() {
    let store = seeded();
    let id = "story-1".to_string();

    let (alice, alice_id) = stack(store.clone(), "alice", "alice-session");
    let alice_session = EditSession::open(alice, alice_id, &id, false)
        .await
        .expect("alice open");
    assert!(alice_session.is_editable());

    let (bob, bob_id) = stack(store.clone(), "bob", "bob-session");
    let bob_session = EditSession::open(bob, bob_id, &id, false)
        .await
        .expect("bob open");

    // Bob sees Alice's lock and degrades to read-only.
    assert!(!bob_session.is_editable());
    assert!(!bob_session.can_unlock());
    let bob_view = bob_session.working_item();
    assert_eq!(bob_view.lock_user.as_deref(), Some("alice"));
    assert!(bob_view.locked);

    // The canonical lock is untouched by Bob's failed attempt.
    let stored = store.item(&id).expect("stored");
    assert_eq!(stored.lock_session.as_deref(), Some("alice-session"));
}

#[tokio::test]
async fn unlock_broadcast_reaches_the_waiting_session() {
    let store = seeded();
    let id = "story-1".to_string();
    let (events_tx, _keepalive) = events::channel(16);

    let (alice, alice_id) = stack(store.clone(), "alice", "alice-session");
    let alice_session = EditSession::open(alice, alice_id, &id, false)
        .await
        .expect("alice open");

    let (bob, bob_id) = stack(store.clone(), "bob", "bob-session");
    let bob_session = EditSession::open(bob, bob_id, &id, false)
        .await
        .expect("bob open");
    bob_session.subscribe(events_tx.subscribe());
    assert!(!bob_session.is_editable());

    // Alice closes; her session announces the unlock.
    let outcome = alice_session.close().await;
    assert!(matches!(outcome, CloseOutcome::Closed(_)));
    events_tx
        .send(copydesk::authoring::ItemEvent::unlocked(
            id.clone(),
            "alice",
            "alice-session",
        ))
        .expect("broadcast");

    // Bob's listener clears the stale lock fields.
    wait_until(|| bob_session.working_item().lock_user.is_none()).await;
    let bob_view = bob_session.working_item();
    assert!(!bob_view.locked);
    assert!(!bob_view.editable);

    // Bob can now take the item over for himself.
    bob_session.take_over().await;
    assert!(bob_session.is_editable());
    let stored = store.item(&id).expect("stored");
    assert_eq!(stored.lock_session.as_deref(), Some("bob-session"));
}

#[tokio::test]
async fn publish_from_a_dirty_session_saves_first() {
    let store = seeded();
    let id = "story-1".to_string();
    let (authoring, identity) = stack(store.clone(), "alice", "alice-session");

    let session = EditSession::open(authoring, identity, &id, false)
        .await
        .expect("open");
    session.set_field(ContentField::Headline, FieldValue::text("vote passes"));
    session.autosave();

    let published = session.publish().await.expect("publish").expect("proceed");
    assert_eq!(
        published.fields.get(&ContentField::Headline),
        Some(&FieldValue::text("vote passes"))
    );
    assert!(store.is_published(&id));
    assert!(store.item(&id).expect("stored").lock_user.is_none());
    assert!(!session.is_dirty());
}
