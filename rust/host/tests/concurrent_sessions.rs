/// Many sessions hosted side by side, driven from concurrent tasks.
use std::collections::HashSet;
use std::sync::Arc;

use cardtable_engine::player::RosterPlayer;
use cardtable_engine::{PublicState, SessionEvent};
use cardtable_host::{HostError, HostSettings, SessionManager};
use serde_json::json;
use tokio::task::JoinSet;

fn roster(n: usize) -> Vec<RosterPlayer> {
    (1..=n)
        .map(|i| RosterPlayer::new(format!("p{}", i), format!("Player {}", i)))
        .collect()
}

#[tokio::test]
async fn concurrent_session_creation_yields_unique_ids() {
    let manager = Arc::new(SessionManager::new(HostSettings::default()).expect("manager"));
    let mut join_set = JoinSet::new();
    let session_count: u64 = 10;

    for i in 0..session_count {
        let manager = Arc::clone(&manager);
        join_set.spawn(async move {
            let game = if i % 2 == 0 { "teen_patti" } else { "rummy" };
            manager
                .create_session(game, &format!("table {}", i), json!({ "seed": 1000 + i }))
                .expect("create session")
        });
    }

    let mut ids = HashSet::new();
    while let Some(result) = join_set.join_next().await {
        ids.insert(result.expect("task completed"));
    }
    assert_eq!(ids.len(), session_count as usize);
    assert_eq!(manager.sessions().len(), ids.len());
    for id in &ids {
        assert!(manager.public_state(id).is_ok());
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn sessions_fold_out_independently() {
    let manager = Arc::new(SessionManager::new(HostSettings::default()).expect("manager"));
    let mut ids = Vec::new();
    for i in 0..6u64 {
        let id = manager
            .create_session("teen_patti", "fold", json!({ "seed": i, "round_limit": 1 }))
            .unwrap();
        manager.set_players(&id, roster(3)).unwrap();
        manager.start_round(&id).unwrap();
        ids.push(id);
    }

    let mut join_set = JoinSet::new();
    for id in ids.clone() {
        let manager = Arc::clone(&manager);
        join_set.spawn(async move {
            let mut sub = manager.subscribe(&id).unwrap();
            for player in ["p1", "p2"] {
                manager
                    .handle_action(&id, json!({ "type": "FOLD", "player_id": player }))
                    .unwrap();
            }
            sub.drain()
        });
    }

    while let Some(result) = join_set.join_next().await {
        let events = result.expect("task completed");
        let names: Vec<&str> = events.iter().map(SessionEvent::name).collect();
        assert!(names.contains(&"hand_complete"));
        assert_eq!(names.iter().filter(|n| **n == "session_ended").count(), 1);
        let winner = events.iter().find_map(|e| match e {
            SessionEvent::HandComplete { summary } => Some(summary.winner_id.clone()),
            _ => None,
        });
        assert_eq!(winner.as_deref(), Some("p3"));
    }

    for id in &ids {
        match manager.public_state(id).unwrap() {
            PublicState::TeenPatti(state) => assert!(!state.is_active),
            other => panic!("unexpected state {:?}", other),
        }
    }
}

#[tokio::test]
async fn rejected_actions_publish_nothing() {
    let manager = SessionManager::new(HostSettings::default()).expect("manager");
    let id = manager
        .create_session("rummy", "quiet", json!({ "seed": 8 }))
        .unwrap();
    manager.set_players(&id, roster(2)).unwrap();
    manager.start_round(&id).unwrap();
    let mut sub = manager.subscribe(&id).unwrap();

    let err = manager
        .handle_action(
            &id,
            json!({ "type": "DRAW_CARD", "player_id": "p2", "source": "draw_pile" }),
        )
        .unwrap_err();
    assert!(matches!(err, HostError::Session(_)));
    let err = manager
        .handle_action(&id, json!({ "type": "DRAW_CARD", "player_id": "p1" }))
        .unwrap_err();
    assert!(matches!(err, HostError::InvalidAction(_)));
    assert!(sub.drain().is_empty());

    manager
        .handle_action(
            &id,
            json!({ "type": "DRAW_CARD", "player_id": "p1", "source": "draw_pile" }),
        )
        .unwrap();
    assert_eq!(sub.drain().len(), 1);

    let hand = manager.player_hand(&id, "p1").unwrap();
    assert_eq!(hand["cards"].as_array().map(Vec::len), Some(14));
    assert!(matches!(
        manager.player_hand("missing", "p1"),
        Err(HostError::SessionNotFound(_))
    ));
}

#[tokio::test]
async fn roster_is_locked_once_play_starts() {
    let manager = SessionManager::new(HostSettings::default()).expect("manager");
    let id = manager
        .create_session("teen_patti", "lock", serde_json::Value::Null)
        .unwrap();
    manager.set_players(&id, roster(2)).unwrap();
    manager
        .add_player(&id, RosterPlayer::new("p3", "Late"))
        .unwrap();
    manager.remove_player(&id, "p3").unwrap();
    manager.start_round(&id).unwrap();
    let err = manager
        .add_player(&id, RosterPlayer::new("p4", "Later"))
        .unwrap_err();
    assert_eq!(err.to_string(), cardtable_engine::SessionError::RosterLocked.to_string());
}
