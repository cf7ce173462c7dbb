use chrono::{Duration, NaiveDate, Utc};
use uuid::Uuid;

use vibes_db::Database;
use vibes_db::models::{AcceptOutcome, DeleteOutcome, PhotoOutcome, RequestOutcome};
use vibes_types::notifications::{Notification, NotificationPayload};

fn db() -> Database {
    Database::open_in_memory().unwrap()
}

fn add_user(db: &Database, name: &str) {
    db.create_user(name, &format!("{name}@example.com"), "argon2-hash", Utc::now())
        .unwrap();
}

fn day(s: &str) -> NaiveDate {
    s.parse().unwrap()
}

fn upload(db: &Database, owner: &str, date: &str) -> PhotoOutcome {
    db.insert_photo(owner, day(date), "aGVsbG8=", "", "Smile", Utc::now())
        .unwrap()
}

fn photo_id(outcome: PhotoOutcome) -> String {
    match outcome {
        PhotoOutcome::Created { photo, .. } => photo.id,
        PhotoOutcome::QuotaExceeded => panic!("expected a created photo"),
    }
}

// -- Photos --

#[test]
fn photo_quota_is_hard_capped_at_three() {
    let db = db();
    add_user(&db, "bob");

    for _ in 0..3 {
        assert!(matches!(upload(&db, "bob", "2024-05-05"), PhotoOutcome::Created { .. }));
    }

    assert!(matches!(upload(&db, "bob", "2024-05-05"), PhotoOutcome::QuotaExceeded));
    assert_eq!(db.count_photos_for_day("bob", day("2024-05-05")).unwrap(), 3);

    // the cap is per day, not global
    assert!(matches!(upload(&db, "bob", "2024-05-06"), PhotoOutcome::Created { .. }));
}

#[test]
fn same_day_ids_get_numeric_suffixes() {
    let db = db();
    add_user(&db, "alice");

    assert_eq!(photo_id(upload(&db, "alice", "2024-03-02")), "alice_2024-03-02");
    assert_eq!(photo_id(upload(&db, "alice", "2024-03-02")), "alice_2024-03-02_2");
    assert_eq!(photo_id(upload(&db, "alice", "2024-03-02")), "alice_2024-03-02_3");
}

#[test]
fn freed_ids_are_reused_after_delete() {
    let db = db();
    add_user(&db, "alice");

    let first = photo_id(upload(&db, "alice", "2024-03-02"));
    let _second = photo_id(upload(&db, "alice", "2024-03-02"));

    assert_eq!(db.delete_photo(&first, "alice").unwrap(), DeleteOutcome::Deleted);
    assert_eq!(photo_id(upload(&db, "alice", "2024-03-02")), "alice_2024-03-02");
}

#[test]
fn only_the_first_upload_of_a_day_is_flagged() {
    let db = db();
    add_user(&db, "alice");

    match upload(&db, "alice", "2024-03-02") {
        PhotoOutcome::Created { first_of_day, .. } => assert!(first_of_day),
        _ => panic!("expected created"),
    }
    match upload(&db, "alice", "2024-03-02") {
        PhotoOutcome::Created { first_of_day, .. } => assert!(!first_of_day),
        _ => panic!("expected created"),
    }
}

#[test]
fn like_toggle_is_its_own_inverse() {
    let db = db();
    add_user(&db, "alice");
    add_user(&db, "bob");
    let id = photo_id(upload(&db, "alice", "2024-03-02"));

    let on = db.toggle_like(&id, "bob").unwrap().unwrap();
    assert!(on.liked);
    assert_eq!(on.owner, "alice");

    let off = db.toggle_like(&id, "bob").unwrap().unwrap();
    assert!(!off.liked);

    let photo = db.get_photo(&id).unwrap().unwrap();
    assert!(photo.likes.is_empty());

    assert!(db.toggle_like("missing_photo", "bob").unwrap().is_none());
}

#[test]
fn comments_append_in_order() {
    let db = db();
    add_user(&db, "alice");
    add_user(&db, "bob");
    let id = photo_id(upload(&db, "alice", "2024-03-02"));

    let (owner, _) = db.add_comment(&id, "bob", "first", Utc::now()).unwrap().unwrap();
    assert_eq!(owner, "alice");
    db.add_comment(&id, "bob", "second", Utc::now()).unwrap().unwrap();

    let photo = db.get_photo(&id).unwrap().unwrap();
    let texts: Vec<&str> = photo.comments.iter().map(|c| c.text.as_str()).collect();
    assert_eq!(texts, vec!["first", "second"]);
}

#[test]
fn delete_photo_is_owner_only() {
    let db = db();
    add_user(&db, "alice");
    add_user(&db, "bob");
    let id = photo_id(upload(&db, "alice", "2024-03-02"));

    assert_eq!(db.delete_photo(&id, "bob").unwrap(), DeleteOutcome::Forbidden);
    assert_eq!(db.delete_photo(&id, "alice").unwrap(), DeleteOutcome::Deleted);
    assert_eq!(db.delete_photo(&id, "alice").unwrap(), DeleteOutcome::NotFound);
}

// -- Streak --

#[test]
fn consecutive_days_grow_the_streak_and_unlock_at_seven() {
    let db = db();
    add_user(&db, "alice");

    // six consecutive days through 2024-03-01
    for d in ["2024-02-25", "2024-02-26", "2024-02-27", "2024-02-28", "2024-02-29", "2024-03-01"] {
        db.record_first_post_of_day("alice", day(d)).unwrap().unwrap();
    }
    let user = db.get_user("alice").unwrap().unwrap();
    assert_eq!(user.streak_count, 6);
    assert!(user.achievements.is_empty());

    let update = db.record_first_post_of_day("alice", day("2024-03-02")).unwrap().unwrap();
    assert_eq!(update.count, 7);
    assert_eq!(update.new_achievements, vec!["streak_7"]);

    let user = db.get_user("alice").unwrap().unwrap();
    assert_eq!(user.streak_count, 7);
    assert_eq!(user.achievements, vec!["streak_7".to_string()]);
    assert_eq!(user.last_post_date, Some(day("2024-03-02")));
}

#[test]
fn streak_update_is_idempotent_per_day() {
    let db = db();
    add_user(&db, "alice");

    db.record_first_post_of_day("alice", day("2024-03-01")).unwrap().unwrap();
    let again = db.record_first_post_of_day("alice", day("2024-03-01")).unwrap().unwrap();
    assert!(!again.changed);
    assert_eq!(db.get_user("alice").unwrap().unwrap().streak_count, 1);
}

#[test]
fn a_gap_resets_the_streak_but_keeps_achievements() {
    let db = db();
    add_user(&db, "alice");

    for i in 0..7 {
        let d = day("2024-03-01") + Duration::days(i);
        db.record_first_post_of_day("alice", d).unwrap().unwrap();
    }
    assert_eq!(db.get_user("alice").unwrap().unwrap().streak_count, 7);

    let update = db.record_first_post_of_day("alice", day("2024-04-01")).unwrap().unwrap();
    assert_eq!(update.count, 1);
    assert!(update.new_achievements.is_empty());
    assert_eq!(
        db.get_user("alice").unwrap().unwrap().achievements,
        vec!["streak_7".to_string()]
    );
}

#[test]
fn streak_for_unknown_user_is_none() {
    let db = db();
    assert!(db.record_first_post_of_day("ghost", day("2024-03-01")).unwrap().is_none());
}

// -- Friends --

#[test]
fn friend_request_lifecycle() {
    let db = db();
    add_user(&db, "alice");
    add_user(&db, "bob");

    assert_eq!(db.add_friend_request("alice", "bob").unwrap(), RequestOutcome::Sent);
    assert_eq!(
        db.get_user("bob").unwrap().unwrap().pending_requests,
        vec!["alice".to_string()]
    );

    assert_eq!(db.add_friend_request("alice", "bob").unwrap(), RequestOutcome::AlreadyPending);
    assert_eq!(db.add_friend_request("alice", "ghost").unwrap(), RequestOutcome::NotFound);

    assert_eq!(db.accept_friend_request("bob", "alice").unwrap(), AcceptOutcome::Accepted);

    let alice = db.get_user("alice").unwrap().unwrap();
    let bob = db.get_user("bob").unwrap().unwrap();
    assert_eq!(alice.friends, vec!["bob".to_string()]);
    assert_eq!(bob.friends, vec!["alice".to_string()]);
    assert!(bob.pending_requests.is_empty());

    // accepting twice consumes nothing further
    assert_eq!(db.accept_friend_request("bob", "alice").unwrap(), AcceptOutcome::NoPending);
    assert_eq!(db.add_friend_request("alice", "bob").unwrap(), RequestOutcome::AlreadyFriends);

    assert!(db.remove_friend("alice", "bob").unwrap());
    assert!(db.get_user("alice").unwrap().unwrap().friends.is_empty());
    assert!(db.get_user("bob").unwrap().unwrap().friends.is_empty());
}

#[test]
fn removing_a_friend_cancels_a_pending_request() {
    let db = db();
    add_user(&db, "alice");
    add_user(&db, "bob");

    db.add_friend_request("alice", "bob").unwrap();
    assert!(db.remove_friend("bob", "alice").unwrap());
    assert!(db.get_user("bob").unwrap().unwrap().pending_requests.is_empty());

    // a fresh request goes through again
    assert_eq!(db.add_friend_request("alice", "bob").unwrap(), RequestOutcome::Sent);
}

// -- Challenges --

#[test]
fn selection_is_deterministic_and_overrides_pin_one_date() {
    let db = db();

    let a = db.select_challenge(day("2024-06-01")).unwrap().unwrap();
    let b = db.select_challenge(day("2024-06-01")).unwrap().unwrap();
    assert_eq!(a.id, b.id);

    let before = db.select_challenge(day("2024-05-31")).unwrap().unwrap();
    let after = db.select_challenge(day("2024-06-02")).unwrap().unwrap();

    assert!(db.set_override(day("2024-06-01"), 3).unwrap());
    let pinned = db.select_challenge(day("2024-06-01")).unwrap().unwrap();
    assert_eq!(pinned.id, 3);

    // neighbors still follow the rotation formula
    assert_eq!(db.select_challenge(day("2024-05-31")).unwrap().unwrap().id, before.id);
    assert_eq!(db.select_challenge(day("2024-06-02")).unwrap().unwrap().id, after.id);

    // an override can be replaced
    assert!(db.set_override(day("2024-06-01"), 5).unwrap());
    assert_eq!(db.select_challenge(day("2024-06-01")).unwrap().unwrap().id, 5);

    assert!(!db.set_override(day("2024-06-01"), 999).unwrap());
}

#[test]
fn catalogue_is_seeded_and_admin_extensible() {
    let db = db();
    let catalogue = db.challenge_catalogue().unwrap();
    assert_eq!(catalogue.len(), 10);
    assert_eq!(catalogue[0].id, 1);

    let added = db.add_challenge("🌧️", "Rainy Day", "Whatever the weather looks like").unwrap();
    assert_eq!(added.id, 11);
    assert_eq!(db.challenge_catalogue().unwrap().len(), 11);
}

// -- Notifications --

fn note(recipient: &str, offset_secs: i64) -> Notification {
    Notification {
        id: Uuid::new_v4(),
        recipient: recipient.to_string(),
        title: "❤️ New like!".into(),
        body: "alice liked your photo!".into(),
        origin: "alice".into(),
        payload: NotificationPayload::Like { photo_id: "bob_2024-05-05".into() },
        timestamp: Utc::now() + Duration::seconds(offset_secs),
        read: false,
    }
}

#[test]
fn inbox_is_newest_first_with_page_scoped_unread_count() {
    let db = db();
    add_user(&db, "bob");

    let first = note("bob", 0);
    let second = note("bob", 1);
    let third = note("bob", 2);
    for n in [&first, &second, &third] {
        db.append_notification(n).unwrap();
    }

    let (page, unread) = db.notifications_for("bob", 50).unwrap();
    assert_eq!(page.len(), 3);
    assert_eq!(unread, 3);
    assert_eq!(page[0].id, third.id);
    assert_eq!(page[2].id, first.id);

    // the unread count covers the returned page, not the whole inbox
    let (page, unread) = db.notifications_for("bob", 2).unwrap();
    assert_eq!(page.len(), 2);
    assert_eq!(unread, 2);
}

#[test]
fn mark_read_is_recipient_scoped_and_silent() {
    let db = db();
    add_user(&db, "bob");
    add_user(&db, "mallory");

    let n = note("bob", 0);
    db.append_notification(&n).unwrap();

    // someone else's mark-read does nothing, and unknown ids are fine
    db.mark_notification_read("mallory", &n.id.to_string()).unwrap();
    db.mark_notification_read("bob", "no-such-id").unwrap();
    let (_, unread) = db.notifications_for("bob", 50).unwrap();
    assert_eq!(unread, 1);

    db.mark_notification_read("bob", &n.id.to_string()).unwrap();
    let (page, unread) = db.notifications_for("bob", 50).unwrap();
    assert_eq!(unread, 0);
    assert!(page[0].read);
}

#[test]
fn clear_deletes_the_whole_inbox() {
    let db = db();
    add_user(&db, "bob");

    for i in 0..4 {
        db.append_notification(&note("bob", i)).unwrap();
    }
    assert_eq!(db.clear_notifications("bob").unwrap(), 4);
    let (page, unread) = db.notifications_for("bob", 50).unwrap();
    assert!(page.is_empty());
    assert_eq!(unread, 0);
}

// -- Device registry --

#[test]
fn device_registry_honors_ttl() {
    let db = db();
    add_user(&db, "bob");
    let now = Utc::now();

    db.register_device("bob", "https://push.example/bob", Some("ios"), now + Duration::hours(1))
        .unwrap();
    assert_eq!(
        db.device_endpoint("bob", now).unwrap().as_deref(),
        Some("https://push.example/bob")
    );

    // past the TTL the endpoint is gone, and pruning removes the row
    let later = now + Duration::hours(2);
    assert!(db.device_endpoint("bob", later).unwrap().is_none());
    assert_eq!(db.prune_expired_devices(later).unwrap(), 1);

    // re-registering refreshes the TTL
    db.register_device("bob", "https://push.example/bob2", None, later + Duration::hours(1))
        .unwrap();
    assert_eq!(
        db.device_endpoint("bob", later).unwrap().as_deref(),
        Some("https://push.example/bob2")
    );
}
