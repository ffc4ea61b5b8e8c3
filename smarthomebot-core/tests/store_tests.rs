// ABOUTME: Tests for the persisted registry store and the write-through shared state
// ABOUTME: Covers round-trips, corrupt files, init and rollback when a save fails

use chrono::{TimeZone, Utc};
use smarthomebot_core::registry::{Rejection, RoleOp};
use smarthomebot_core::store::{RegistryState, StateStore, StoreError};
use smarthomebot_core::timers::{parse_timer, TimerKind, TimerRecord};
use smarthomebot_core::SharedState;

const OWNER: i64 = 1000;

fn temp_store() -> (tempfile::TempDir, StateStore) {
    let dir = tempfile::tempdir().unwrap();
    let store = StateStore::new(dir.path().join("state.json"));
    (dir, store)
}

#[test]
fn test_save_then_load_roundtrips_every_set() {
    let (_dir, store) = temp_store();
    let mut state = RegistryState::new(OWNER, "123:abc", "0.1.0");
    state.users.request_join(5).unwrap();
    state.users.add_user(6).unwrap();
    state.users.promote(6).unwrap();
    state.users.ban_user(7, OWNER).unwrap();
    state.users.request_join(8).unwrap();
    state.users.dismiss_join(8).unwrap();
    state.users.record_chat_member(9);
    state.chats.allowed_chats.insert(-100);
    let now = Utc.with_ymd_and_hms(2024, 5, 1, 8, 0, 0).unwrap();
    state
        .timers
        .push(TimerRecord::timer(now, &parse_timer("90s").unwrap(), -100));

    store.save(&state).unwrap();
    let loaded = store.load().unwrap();
    assert_eq!(loaded, state);
    assert!(loaded.users.pending_requests.contains(&5));
    assert!(loaded.users.rejected_requests.contains(&8));
    assert!(loaded.users.chat_members.contains(&9));
    assert_eq!(loaded.timers.list(TimerKind::Timer).len(), 1);
}

#[test]
fn test_missing_section_is_corrupt_state() {
    let (_dir, store) = temp_store();
    std::fs::write(
        store.path(),
        r#"{"BOT_DATA": {}, "USERS": {"owner": 1}, "CHATS": {}}"#,
    )
    .unwrap();
    match store.load() {
        Err(StoreError::CorruptState { section, .. }) => assert_eq!(section, "TIMERS"),
        other => panic!("Expected CorruptState, got {:?}", other),
    }
}

#[test]
fn test_invalid_json_is_parse_error() {
    let (_dir, store) = temp_store();
    std::fs::write(store.path(), "{not json").unwrap();
    assert!(matches!(store.load(), Err(StoreError::Parse { .. })));
}

#[test]
fn test_missing_file_is_io_error() {
    let (_dir, store) = temp_store();
    assert!(matches!(store.load(), Err(StoreError::Io { .. })));
}

#[test]
fn test_save_leaves_no_temp_file() {
    let (dir, store) = temp_store();
    store.save(&RegistryState::new(OWNER, "", "0.1.0")).unwrap();
    let names: Vec<_> = std::fs::read_dir(dir.path())
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().to_string())
        .collect();
    assert_eq!(names, vec!["state.json".to_string()]);
}

#[test]
fn test_init_refuses_to_overwrite() {
    let (_dir, store) = temp_store();
    let state = store.init(OWNER, "123:abc", "0.1.0").unwrap();
    assert!(state.users.admins.contains(&OWNER));
    assert!(state.users.allowed.contains(&OWNER));
    assert!(matches!(
        store.init(OWNER, "123:abc", "0.1.0"),
        Err(StoreError::AlreadyInitialized(_))
    ));
}

#[test]
fn test_open_repairs_hand_edited_state() {
    let (_dir, store) = temp_store();
    std::fs::write(
        store.path(),
        r#"{
            "BOT_DATA": {"bot_token": "", "bot_id": 0, "bot_version": "0.1.0"},
            "USERS": {"owner": 1000, "admins": [], "allowed_users": [5],
                      "banned_users": [1000], "chat_members": [5],
                      "user_requests": [5], "user_rejects": []},
            "CHATS": {"allowed_chats": []},
            "TIMERS": {"timers": [], "alarms": []}
        }"#,
    )
    .unwrap();
    let _shared = SharedState::open(store.clone()).unwrap();
    let repaired = store.load().unwrap();
    assert!(!repaired.users.banned.contains(&OWNER));
    assert!(repaired.users.admins.contains(&OWNER));
    assert!(!repaired.users.pending_requests.contains(&5));
    assert!(!repaired.users.chat_members.contains(&5));
}

#[test]
fn test_inspect_reports_repairs_without_rewriting() {
    let (_dir, store) = temp_store();
    let original = r#"{
        "BOT_DATA": {"bot_token": "", "bot_id": 0, "bot_version": "0.1.0"},
        "USERS": {"owner": 1000, "admins": [], "allowed_users": [],
                  "banned_users": [1000], "chat_members": [],
                  "user_requests": [], "user_rejects": []},
        "CHATS": {"allowed_chats": []},
        "TIMERS": {"timers": [], "alarms": []}
    }"#;
    std::fs::write(store.path(), original).unwrap();

    let (state, repairs) = store.inspect().unwrap();
    assert!(repairs.contains(&"owner removed from banned users"));
    assert!(repairs.contains(&"owner added to admins"));
    assert!(!state.users.banned.contains(&OWNER));

    assert_eq!(std::fs::read_to_string(store.path()).unwrap(), original);
    assert!(store.load().unwrap().users.banned.contains(&OWNER));
}

#[tokio::test]
async fn test_apply_role_writes_through() {
    let (_dir, store) = temp_store();
    let state = store.init(OWNER, "", "0.1.0").unwrap();
    let shared = SharedState::new(store.clone(), state);

    shared.request_join(5).await.unwrap().unwrap();
    shared
        .apply_role(&RoleOp::ApproveJoin(5))
        .await
        .unwrap()
        .unwrap();

    let on_disk = store.load().unwrap();
    assert!(on_disk.users.allowed.contains(&5));
    assert!(!on_disk.users.pending_requests.contains(&5));
}

#[tokio::test]
async fn test_rejection_leaves_state_untouched() {
    let (_dir, store) = temp_store();
    let state = store.init(OWNER, "", "0.1.0").unwrap();
    let shared = SharedState::new(store.clone(), state);
    let before = shared.snapshot().await;

    let outcome = shared
        .apply_role(&RoleOp::BanUser {
            user: OWNER,
            actor: 2,
        })
        .await
        .unwrap();
    assert_eq!(outcome, Err(Rejection::IsOwner));
    assert_eq!(shared.snapshot().await, before);
    assert_eq!(store.load().unwrap(), before);
}

#[tokio::test]
async fn test_failed_save_rolls_back_memory() {
    let dir = tempfile::tempdir().unwrap();
    // parent is a regular file, so create_dir_all fails
    let blocker = dir.path().join("blocker");
    std::fs::write(&blocker, "x").unwrap();
    let store = StateStore::new(blocker.join("state.json"));
    let shared = SharedState::new(store, RegistryState::new(OWNER, "", "0.1.0"));

    let result = shared.apply_role(&RoleOp::AddUser(5)).await;
    assert!(result.is_err());
    assert!(!shared.roles().await.is_allowed(5));
}

#[tokio::test]
async fn test_chat_member_only_persists_on_change() {
    let (_dir, store) = temp_store();
    let state = store.init(OWNER, "", "0.1.0").unwrap();
    let shared = SharedState::new(store.clone(), state);

    assert!(shared.record_chat_member(9).await.unwrap());
    assert!(!shared.record_chat_member(9).await.unwrap());
    assert!(!shared.record_chat_member(OWNER).await.unwrap());
    assert!(store.load().unwrap().users.chat_members.contains(&9));
}

#[tokio::test]
async fn test_timer_add_and_remove() {
    let (_dir, store) = temp_store();
    let state = store.init(OWNER, "", "0.1.0").unwrap();
    let shared = SharedState::new(store.clone(), state);
    let record = TimerRecord::timer(Utc::now(), &parse_timer("5m").unwrap(), 42);

    shared.add_timer(record.clone()).await.unwrap();
    assert_eq!(shared.timers(TimerKind::Timer).await, vec![record.clone()]);
    assert_eq!(store.load().unwrap().timers.len(), 1);

    assert!(shared.remove_timer(&record).await.unwrap());
    assert!(!shared.remove_timer(&record).await.unwrap());
    assert!(store.load().unwrap().timers.is_empty());
}
