//! Session hub behaviour through a recording dispatcher.
//!
//! No sockets: every broadcast and caller-only reply lands in
//! `RecordingDispatcher`, so ordering and targeting can be asserted
//! exactly.

use std::sync::Arc;

use poker_collab::testing::{Delivery, RecordingDispatcher};
use poker_collab::{ClientRequest, ServerEvent, SessionHub, SessionRegistry};
use poker_core::{RoomId, RoomParams, RoomSnapshot};
use uuid::Uuid;

type Hub = SessionHub<RecordingDispatcher>;

fn new_hub() -> Hub {
    SessionHub::new(
        Arc::new(SessionRegistry::new()),
        Arc::new(RecordingDispatcher::new()),
    )
}

fn params(titles: &[&str]) -> RoomParams {
    RoomParams {
        room_name: "Sprint 7".to_string(),
        admin_name: "Alice".to_string(),
        avatar_url: None,
        item_titles: titles.iter().map(|t| t.to_string()).collect(),
        estimate_options: ["1", "2", "3", "5", "8", "13", "?"]
            .iter()
            .map(|s| s.to_string())
            .collect(),
        is_free_text: false,
    }
}

/// Room with admin Alice and participant Bob, recorder cleared.
async fn setup(hub: &Hub, titles: &[&str]) -> (RoomId, Uuid, Uuid) {
    let admin = Uuid::new_v4();
    let bob = Uuid::new_v4();
    let room_id = hub.create_room(admin, params(titles)).await;
    hub.join_room(bob, &room_id, "Bob".to_string(), None).await;
    hub.dispatcher().clear();
    (room_id, admin, bob)
}

async fn snapshot(hub: &Hub, room_id: &RoomId) -> RoomSnapshot {
    hub.registry().get(room_id).await.unwrap().lock().await.snapshot()
}

fn errors(hub: &Hub, caller: Uuid) -> Vec<String> {
    hub.dispatcher()
        .caller_events(caller)
        .into_iter()
        .filter_map(|e| match e {
            ServerEvent::Error(msg) => Some(msg),
            _ => None,
        })
        .collect()
}

#[tokio::test]
async fn test_create_then_join_yields_two_participants() {
    let hub = new_hub();
    let admin = Uuid::new_v4();
    let bob = Uuid::new_v4();
    let room_id = hub.create_room(admin, params(&["a"])).await;
    hub.join_room(bob, &room_id, "Bob".to_string(), Some("https://img/bob.png".to_string()))
        .await;

    let snap = hub.dispatcher().last_snapshot(&room_id).unwrap();
    assert_eq!(snap.players.len(), 2);
    assert_eq!(snap.admin_connection_id, admin);
    assert_eq!(snap.player(bob).unwrap().avatar_url, "https://img/bob.png");

    let members = hub.dispatcher().members(&room_id);
    assert!(members.contains(&admin));
    assert!(members.contains(&bob));
}

#[tokio::test]
async fn test_create_room_request_replies_to_caller_only() {
    let hub = new_hub();
    let admin = Uuid::new_v4();
    hub.handle(admin, ClientRequest::create_room(params(&["a"]))).await;

    let deliveries = hub.dispatcher().deliveries();
    assert_eq!(deliveries.len(), 1);
    let room_id = match &deliveries[0] {
        Delivery::Caller(caller, ServerEvent::RoomCreated(room_id)) => {
            assert_eq!(*caller, admin);
            room_id.clone()
        }
        other => panic!("Expected RoomCreated reply, got {other:?}"),
    };
    assert!(hub.registry().contains(&room_id).await);
}

#[tokio::test]
async fn test_duplicate_join_keeps_one_entry_but_rebroadcasts() {
    let hub = new_hub();
    let (room_id, _, bob) = setup(&hub, &["a"]).await;

    hub.join_room(bob, &room_id, "Bobby".to_string(), None).await;

    let events = hub.dispatcher().room_events(&room_id);
    assert_eq!(events.len(), 1);
    let snap = events[0].snapshot().unwrap();
    assert_eq!(snap.players.len(), 2);
    assert_eq!(snap.player(bob).unwrap().name, "Bob");
}

#[tokio::test]
async fn test_join_unknown_room_reports_error() {
    let hub = new_hub();
    let caller = Uuid::new_v4();
    hub.join_room(caller, &RoomId::from("nope0000"), "Eve".to_string(), None)
        .await;

    assert_eq!(errors(&hub, caller), vec!["Room not found!".to_string()]);
    assert!(hub.registry().is_empty().await);
}

#[tokio::test]
async fn test_other_operations_on_unknown_room_are_silent() {
    let hub = new_hub();
    let caller = Uuid::new_v4();
    let missing = RoomId::from("nope0000");
    hub.start_room(caller, &missing).await;
    hub.show_votes(caller, &missing).await;
    hub.next_task(caller, &missing).await;
    hub.send_vote(caller, &missing, "3".to_string()).await;
    assert!(hub.dispatcher().deliveries().is_empty());
}

#[tokio::test]
async fn test_start_without_items_reports_error() {
    let hub = new_hub();
    let (room_id, admin, _) = setup(&hub, &[]).await;

    hub.start_room(admin, &room_id).await;

    assert_eq!(
        errors(&hub, admin),
        vec!["You must add at least one task first!".to_string()]
    );
    assert!(hub.dispatcher().room_events(&room_id).is_empty());
    assert!(!snapshot(&hub, &room_id).await.is_started);
}

#[tokio::test]
async fn test_non_admin_operations_are_silent() {
    let hub = new_hub();
    let (room_id, _, bob) = setup(&hub, &["a", "b"]).await;

    hub.start_room(bob, &room_id).await;
    hub.next_task(bob, &room_id).await;
    hub.show_votes(bob, &room_id).await;
    hub.toggle_peek(bob, &room_id, true).await;
    hub.add_tasks(bob, &room_id, vec!["c".to_string()]).await;

    assert!(hub.dispatcher().deliveries().is_empty());
    let snap = snapshot(&hub, &room_id).await;
    assert!(!snap.is_started);
    assert_eq!(snap.current_task_index, 0);
    assert_eq!(snap.tasks.len(), 2);
}

#[tokio::test]
async fn test_vote_before_start_is_silent() {
    let hub = new_hub();
    let (room_id, _, bob) = setup(&hub, &["a"]).await;

    hub.send_vote(bob, &room_id, "5".to_string()).await;
    hub.send_vote(Uuid::new_v4(), &room_id, "5".to_string()).await;

    assert!(hub.dispatcher().deliveries().is_empty());
}

#[tokio::test]
async fn test_reveal_without_votes_reports_error() {
    let hub = new_hub();
    let (room_id, admin, _) = setup(&hub, &["a"]).await;
    hub.start_room(admin, &room_id).await;
    hub.dispatcher().clear();

    hub.show_votes(admin, &room_id).await;

    assert_eq!(errors(&hub, admin), vec!["No one has voted yet!".to_string()]);
    assert!(hub.dispatcher().room_events(&room_id).is_empty());
    assert!(!snapshot(&hub, &room_id).await.is_votes_revealed);
}

#[tokio::test]
async fn test_toggle_peek_broadcasts_flag_only() {
    let hub = new_hub();
    let (room_id, admin, _) = setup(&hub, &["a"]).await;

    hub.toggle_peek(admin, &room_id, true).await;

    assert_eq!(
        hub.dispatcher().room_events(&room_id),
        vec![ServerEvent::PeekStatusChanged(true)]
    );
}

#[tokio::test]
async fn test_next_task_signals_then_snapshots() {
    let hub = new_hub();
    let (room_id, admin, bob) = setup(&hub, &["Login", "Logout"]).await;
    hub.start_room(admin, &room_id).await;
    hub.send_vote(admin, &room_id, "1".to_string()).await;
    hub.send_vote(bob, &room_id, "2".to_string()).await;
    hub.show_votes(admin, &room_id).await;
    hub.dispatcher().clear();

    hub.next_task(admin, &room_id).await;

    let events = hub.dispatcher().room_events(&room_id);
    assert_eq!(events.len(), 2);
    assert_eq!(events[0], ServerEvent::NewTaskTriggered);
    let snap = events[1].snapshot().unwrap();
    assert_eq!(snap.current_task_index, 1);
    assert!(!snap.is_votes_revealed);
    assert!(snap.players.iter().all(|p| !p.has_voted));
    assert_eq!(snap.history.len(), 1);
    assert_eq!(snap.history[0].title, "Login");
    assert_eq!(snap.history[0].average, Some(1.5));
    assert!(snap.tasks[0].is_completed);
    assert_eq!(snap.active_task.as_ref().unwrap().title, "Logout");
}

#[tokio::test]
async fn test_next_task_without_active_item_still_resets() {
    let hub = new_hub();
    let (room_id, admin, bob) = setup(&hub, &["only"]).await;
    hub.start_room(admin, &room_id).await;
    hub.next_task(admin, &room_id).await;
    hub.send_vote(bob, &room_id, "8".to_string()).await;
    hub.show_votes(admin, &room_id).await;

    hub.next_task(admin, &room_id).await;
    hub.next_task(admin, &room_id).await;

    let snap = snapshot(&hub, &room_id).await;
    assert_eq!(snap.current_task_index, 1);
    assert_eq!(snap.history.len(), 1);
    assert!(!snap.is_votes_revealed);
    assert!(!snap.player(bob).unwrap().has_voted);
}

#[tokio::test]
async fn test_delete_active_item_resets_round() {
    let hub = new_hub();
    let (room_id, admin, bob) = setup(&hub, &["a", "b"]).await;
    hub.start_room(admin, &room_id).await;
    hub.send_vote(bob, &room_id, "3".to_string()).await;
    let active = snapshot(&hub, &room_id).await.tasks[0].id;
    hub.dispatcher().clear();

    hub.handle(
        admin,
        ClientRequest::DeleteTask {
            room_id: room_id.clone(),
            task_id: active.to_string(),
        },
    )
    .await;

    let events = hub.dispatcher().room_events(&room_id);
    assert_eq!(events[0], ServerEvent::NewTaskTriggered);
    let snap = events[1].snapshot().unwrap();
    assert_eq!(snap.tasks.len(), 1);
    assert_eq!(snap.active_task.as_ref().unwrap().title, "b");
    assert!(snap.players.iter().all(|p| p.vote.is_empty()));
    assert!(!snap.is_votes_revealed);
}

#[tokio::test]
async fn test_locked_items_reject_edit_and_delete() {
    let hub = new_hub();
    let (room_id, admin, bob) = setup(&hub, &["a", "b"]).await;
    hub.start_room(admin, &room_id).await;
    let before = snapshot(&hub, &room_id).await;
    let (first, second) = (before.tasks[0].id, before.tasks[1].id);

    hub.next_task(admin, &room_id).await;
    hub.send_vote(bob, &room_id, "5".to_string()).await;
    hub.show_votes(admin, &room_id).await;
    hub.dispatcher().clear();

    // finished item, then revealed active item
    hub.update_task(admin, &room_id, first, "x".to_string()).await;
    hub.delete_task(admin, &room_id, first).await;
    hub.update_task(admin, &room_id, second, "y".to_string()).await;
    hub.delete_task(admin, &room_id, second).await;

    let errs = errors(&hub, admin);
    assert_eq!(errs.len(), 4);
    assert!(errs[0].contains("edit"));
    assert!(errs[1].contains("delete"));
    assert!(hub.dispatcher().room_events(&room_id).is_empty());

    let after = snapshot(&hub, &room_id).await;
    assert_eq!(after.tasks.len(), 2);
    assert_eq!(after.tasks[0].title, "a");
    assert_eq!(after.tasks[1].title, "b");
}

#[tokio::test]
async fn test_malformed_task_id_is_ignored() {
    let hub = new_hub();
    let (room_id, admin, _) = setup(&hub, &["a"]).await;

    hub.handle(
        admin,
        ClientRequest::UpdateTask {
            room_id: room_id.clone(),
            task_id: "not-a-guid".to_string(),
            new_title: "x".to_string(),
        },
    )
    .await;

    assert!(hub.dispatcher().deliveries().is_empty());
}

#[tokio::test]
async fn test_add_tasks_appends_in_order() {
    let hub = new_hub();
    let (room_id, admin, _) = setup(&hub, &["a"]).await;

    hub.add_tasks(admin, &room_id, vec!["b".to_string(), "c".to_string()])
        .await;

    let snap = hub.dispatcher().last_snapshot(&room_id).unwrap();
    let titles: Vec<&str> = snap.tasks.iter().map(|t| t.title.as_str()).collect();
    assert_eq!(titles, vec!["a", "b", "c"]);
}

#[tokio::test]
async fn test_errors_do_not_leak_across_rooms() {
    let hub = new_hub();
    let (room_a, admin_a, _) = setup(&hub, &[]).await;
    let (room_b, admin_b, _) = setup(&hub, &["x"]).await;
    hub.dispatcher().clear();

    hub.start_room(admin_a, &room_a).await;
    hub.start_room(admin_b, &room_b).await;

    assert_eq!(errors(&hub, admin_a).len(), 1);
    assert!(errors(&hub, admin_b).is_empty());
    assert!(hub.dispatcher().room_events(&room_a).is_empty());
    assert!(hub.dispatcher().last_snapshot(&room_b).unwrap().is_started);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_votes_are_not_lost() {
    let hub = Arc::new(new_hub());
    let admin = Uuid::new_v4();
    let room_id = hub.create_room(admin, params(&["a"])).await;

    let voters: Vec<Uuid> = (0..32).map(|_| Uuid::new_v4()).collect();
    for (i, voter) in voters.iter().enumerate() {
        hub.join_room(*voter, &room_id, format!("p{i}"), None).await;
    }
    hub.start_room(admin, &room_id).await;

    let mut tasks = Vec::new();
    for (i, voter) in voters.iter().copied().enumerate() {
        let hub = hub.clone();
        let room_id = room_id.clone();
        tasks.push(tokio::spawn(async move {
            hub.send_vote(voter, &room_id, (i % 5).to_string()).await;
        }));
    }
    for task in tasks {
        task.await.unwrap();
    }

    let snap = snapshot(&hub, &room_id).await;
    for (i, voter) in voters.iter().enumerate() {
        assert_eq!(snap.player(*voter).unwrap().vote, (i % 5).to_string());
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_advances_finalize_distinct_items() {
    let hub = Arc::new(new_hub());
    let admin = Uuid::new_v4();
    let room_id = hub.create_room(admin, params(&["a", "b", "c"])).await;
    hub.start_room(admin, &room_id).await;

    let mut tasks = Vec::new();
    for _ in 0..2 {
        let hub = hub.clone();
        let room_id = room_id.clone();
        tasks.push(tokio::spawn(async move {
            hub.next_task(admin, &room_id).await;
        }));
    }
    for task in tasks {
        task.await.unwrap();
    }

    let snap = snapshot(&hub, &room_id).await;
    assert_eq!(snap.current_task_index, 2);
    let titles: Vec<&str> = snap.history.iter().map(|h| h.title.as_str()).collect();
    assert_eq!(titles, vec!["a", "b"]);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_vote_lands_wholly_before_or_after_advance() {
    for _ in 0..20 {
        let hub = Arc::new(new_hub());
        let (room_id, admin, bob) = setup(&hub, &["a", "b"]).await;
        hub.start_room(admin, &room_id).await;

        let vote = {
            let hub = hub.clone();
            let room_id = room_id.clone();
            tokio::spawn(async move { hub.send_vote(bob, &room_id, "5".to_string()).await })
        };
        let advance = {
            let hub = hub.clone();
            let room_id = room_id.clone();
            tokio::spawn(async move { hub.next_task(admin, &room_id).await })
        };
        vote.await.unwrap();
        advance.await.unwrap();

        let snap = snapshot(&hub, &room_id).await;
        let recorded = snap.history[0]
            .results
            .iter()
            .any(|r| r.name == "Bob" && r.vote == "5");
        let still_cast = snap.player(bob).unwrap().vote == "5";
        assert!(recorded != still_cast, "vote must land on exactly one side of the advance");
    }
}

#[tokio::test]
async fn test_cursor_stays_in_bounds() {
    let hub = new_hub();
    let (room_id, admin, bob) = setup(&hub, &["a", "b"]).await;
    hub.start_room(admin, &room_id).await;

    for round in 0..6 {
        hub.send_vote(bob, &room_id, "3".to_string()).await;
        if round % 2 == 0 {
            hub.show_votes(admin, &room_id).await;
        }
        hub.next_task(admin, &room_id).await;
        if round == 3 {
            hub.add_tasks(admin, &room_id, vec!["late".to_string()]).await;
        }
        let snap = snapshot(&hub, &room_id).await;
        assert!(snap.current_task_index <= snap.tasks.len());
    }
    let snap = snapshot(&hub, &room_id).await;
    assert_eq!(snap.current_task_index, 3);
    assert_eq!(snap.history.len(), 3);
}
