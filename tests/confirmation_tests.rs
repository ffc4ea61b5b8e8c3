// ABOUTME: Integration tests for the yes/no confirmation flow from command to applied change
// ABOUTME: Covers apply, abort, foreign presses, superseded prompts, rejections and reboot

mod common;

use common::*;
use smarthomebot::bot::confirm::{ABORTED, EXPIRED, NOT_SAVED, NOT_YOURS};
use std::sync::atomic::Ordering;

const PROMPT_ID: Option<i32> = Some(77);

#[tokio::test]
async fn test_yes_applies_staged_ban_and_edits_prompt() {
    let h = harness();
    h.say(direct(ADMIN, "/ban 3")).await;

    let (text, yes, _no) = h.platform.last_prompt(ADMIN).expect("prompt sent");
    assert_eq!(text, "Do you really want to ban user 3?");
    // nothing happens before the press
    assert!(h.on_disk().users.allowed.contains(&USER));

    h.tap(press(ADMIN, ADMIN, PROMPT_ID, &yes)).await;

    let disk = h.on_disk();
    assert!(!disk.users.allowed.contains(&USER));
    assert!(disk.users.banned.contains(&USER));

    let edits = h.platform.edits();
    assert_eq!(edits.len(), 1);
    assert_eq!(edits[0].1, 77);
    assert_eq!(edits[0].2, "Do you really want to ban user 3?\n\nUser 3 banned.");
    assert_eq!(h.platform.answers(), vec![("cb-2".to_string(), None)]);
}

#[tokio::test]
async fn test_no_aborts_without_mutation() {
    let h = harness();
    h.say(direct(ADMIN, "/removeuser 3")).await;
    let (_, yes, no) = h.platform.last_prompt(ADMIN).unwrap();

    h.tap(press(ADMIN, ADMIN, PROMPT_ID, &no)).await;
    assert!(h.on_disk().users.allowed.contains(&USER));
    assert!(h.platform.edits()[0].2.ends_with(ABORTED));

    // the slot is cleared, so the other button is now stale
    h.tap(press(ADMIN, ADMIN, PROMPT_ID, &yes)).await;
    assert!(h.on_disk().users.allowed.contains(&USER));
    assert_eq!(
        h.platform.answers().last().unwrap().1.as_deref(),
        Some(EXPIRED)
    );
}

#[tokio::test]
async fn test_press_by_someone_else_is_refused() {
    let h = harness();
    h.say(in_group(GROUP, ADMIN, "/ban 3")).await;
    let (_, yes, _) = h.platform.last_prompt(GROUP).unwrap();

    h.tap(press(GROUP, OWNER, PROMPT_ID, &yes)).await;
    assert_eq!(h.platform.answers()[0].1.as_deref(), Some(NOT_YOURS));
    assert!(h.on_disk().users.allowed.contains(&USER));

    // the issuer can still confirm
    h.tap(press(GROUP, ADMIN, PROMPT_ID, &yes)).await;
    assert!(h.on_disk().users.banned.contains(&USER));
}

#[tokio::test]
async fn test_superseded_prompt_reports_expired() {
    let h = harness();
    h.say(direct(ADMIN, "/ban 3")).await;
    let (_, first_yes, _) = h.platform.last_prompt(ADMIN).unwrap();
    h.say(direct(ADMIN, "/promote 3")).await;
    let (_, second_yes, _) = h.platform.last_prompt(ADMIN).unwrap();

    h.tap(press(ADMIN, ADMIN, Some(1), &first_yes)).await;
    assert_eq!(h.platform.answers()[0].1.as_deref(), Some(EXPIRED));
    assert!(!h.on_disk().users.banned.contains(&USER));

    h.tap(press(ADMIN, ADMIN, Some(2), &second_yes)).await;
    assert!(h.on_disk().users.admins.contains(&USER));
}

#[tokio::test]
async fn test_rejection_is_reported_in_prompt() {
    let h = harness();
    h.say(direct(ADMIN, "/ban 1")).await;
    let (_, yes, _) = h.platform.last_prompt(ADMIN).unwrap();

    h.tap(press(ADMIN, ADMIN, PROMPT_ID, &yes)).await;
    assert!(h.platform.edits()[0]
        .2
        .ends_with("Rejected: the bot owner cannot be changed."));
    assert!(!h.on_disk().users.banned.contains(&OWNER));
}

#[tokio::test]
async fn test_outcome_is_sent_when_prompt_cannot_be_edited() {
    let h = harness();
    h.platform.fail_edits.store(true, Ordering::SeqCst);
    h.say(direct(ADMIN, "/unban 3")).await;
    let (_, yes, _) = h.platform.last_prompt(ADMIN).unwrap();

    h.tap(press(ADMIN, ADMIN, PROMPT_ID, &yes)).await;
    assert_eq!(
        h.platform.last_text_to(ADMIN).as_deref(),
        Some("Rejected: user is not banned.")
    );

    // without a message id there is nothing to edit
    h.say(direct(ADMIN, "/dismiss 4")).await;
    let (_, yes, _) = h.platform.last_prompt(ADMIN).unwrap();
    h.tap(press(ADMIN, ADMIN, None, &yes)).await;
    assert_eq!(
        h.platform.last_text_to(ADMIN).as_deref(),
        Some("Rejected: there is no pending join request from this user.")
    );
}

#[tokio::test]
async fn test_join_then_approve_grants_access() {
    let h = harness();
    h.say(direct(STRANGER, "/join")).await;
    h.say(direct(OWNER, "/approve 4")).await;
    let (_, yes, _) = h.platform.last_prompt(OWNER).unwrap();
    h.tap(press(OWNER, OWNER, PROMPT_ID, &yes)).await;

    let disk = h.on_disk();
    assert!(disk.users.allowed.contains(&STRANGER));
    assert!(!disk.users.pending_requests.contains(&STRANGER));
    assert!(!disk.users.chat_members.contains(&STRANGER));

    h.say(direct(STRANGER, "/start")).await;
    assert!(h
        .platform
        .last_text_to(STRANGER)
        .unwrap()
        .starts_with("SmartHomeBot is running."));
}

#[tokio::test]
async fn test_unrelated_callback_data_is_acknowledged_silently() {
    let h = harness();
    h.tap(press(ADMIN, ADMIN, PROMPT_ID, "something:else")).await;
    assert_eq!(h.platform.answers(), vec![("cb-2".to_string(), None)]);
    assert!(h.platform.edits().is_empty());
    assert!(h.platform.sent().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_confirmed_reboot_waits_then_reboots() {
    let h = harness();
    h.say(direct(OWNER, "/reboot 30")).await;
    let (text, yes, _) = h.platform.last_prompt(OWNER).unwrap();
    assert_eq!(text, "Do you really want to reboot the host in 30 seconds?");

    let started = tokio::time::Instant::now();
    h.tap(press(OWNER, OWNER, PROMPT_ID, &yes)).await;

    assert!(started.elapsed() >= std::time::Duration::from_secs(30));
    assert_eq!(h.rebooter.calls.load(Ordering::SeqCst), 1);
    assert!(h.platform.edits()[0].2.ends_with("Rebooting in 30 seconds."));
}

#[tokio::test(start_paused = true)]
async fn test_reboot_uses_default_delay_and_reports_failure() {
    let h = harness();
    h.rebooter.fail.store(true, Ordering::SeqCst);
    h.say(direct(OWNER, "/reboot")).await;
    let (text, yes, _) = h.platform.last_prompt(OWNER).unwrap();
    assert_eq!(text, "Do you really want to reboot the host in 10 seconds?");

    h.tap(press(OWNER, OWNER, PROMPT_ID, &yes)).await;
    assert_eq!(h.rebooter.calls.load(Ordering::SeqCst), 1);
    assert_eq!(
        h.platform.last_text_to(OWNER).as_deref(),
        Some("Reboot failed: permission denied")
    );
}

#[tokio::test]
async fn test_failed_save_reports_and_leaves_state_unchanged() {
    let h = harness();
    h.say(direct(ADMIN, "/ban 3")).await;
    let (_, yes, _) = h.platform.last_prompt(ADMIN).unwrap();

    // a directory in place of the temp file makes the atomic write fail
    std::fs::create_dir(h.dir.path().join("state.json.tmp")).unwrap();
    h.tap(press(ADMIN, ADMIN, PROMPT_ID, &yes)).await;

    assert_eq!(
        h.platform.edits()[0].2,
        format!("Do you really want to ban user 3?\n\n{}", NOT_SAVED)
    );
    let roles = h.app.state.roles().await;
    assert!(!roles.is_banned(USER));
    assert!(roles.is_allowed(USER));
    assert!(!h.on_disk().users.banned.contains(&USER));
}

#[tokio::test]
async fn test_yes_rechecks_preconditions_against_current_state() {
    let h = harness();
    h.say(direct(OWNER, "/ban 3")).await;
    let (_, ban_yes, _) = h.platform.last_prompt(OWNER).unwrap();

    // another admin promotes the target while the ban is still staged
    h.say(direct(ADMIN, "/promote 3")).await;
    let (_, promote_yes, _) = h.platform.last_prompt(ADMIN).unwrap();
    h.tap(press(ADMIN, ADMIN, PROMPT_ID, &promote_yes)).await;
    assert!(h.on_disk().users.admins.contains(&USER));

    h.tap(press(OWNER, OWNER, PROMPT_ID, &ban_yes)).await;
    let edits = h.platform.edits();
    let outcome = &edits.last().unwrap().2;
    assert!(
        outcome.ends_with("Rejected: user is an admin, demote them first."),
        "got: {}",
        outcome
    );
    let disk = h.on_disk();
    assert!(disk.users.admins.contains(&USER));
    assert!(!disk.users.banned.contains(&USER));
}
