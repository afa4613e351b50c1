//! Integration tests for SessionManager with session change events
//!
//! These tests verify that the SessionManager correctly:
//! - Emits change events on mutations
//! - Supports multiple subscribers
//! - Handles concurrent access from multiple threads

use game_settings_engine::models::{Cause, ErrorKey, FieldName, OptionDraft, Owner, ValidationErrors};
use game_settings_engine::{GameSettingsConfig, SessionChange, SessionManager};
use indexmap::IndexMap;
use std::sync::Arc;
use tokio::time::{Duration, timeout};

fn drafts(ids: &[&str]) -> IndexMap<String, OptionDraft> {
    ids.iter()
        .map(|id| (id.to_string(), OptionDraft::new(*id, "prefs")))
        .collect()
}

fn label_error(option_id: &str) -> ValidationErrors {
    let mut errors = ValidationErrors::new();
    errors.insert(
        ErrorKey::new(Owner::option(option_id), FieldName::Label),
        Cause::Empty,
    );
    errors
}

#[tokio::test]
async fn test_load_schema_events_in_order() {
    let session = SessionManager::new();
    let mut rx = session.subscribe();

    session.load_schema(
        GameSettingsConfig::default(),
        drafts(&["a", "b"]),
        label_error("a"),
    );

    let mut events = Vec::new();
    for _ in 0..4 {
        let event = timeout(Duration::from_millis(100), rx.recv())
            .await
            .expect("Timeout waiting for event")
            .expect("Channel closed");
        events.push(event);
    }

    assert_eq!(
        events,
        vec![
            SessionChange::SchemaLoaded {
                options: 0,
                files: 0
            },
            SessionChange::DraftChanged {
                option_id: "a".to_string()
            },
            SessionChange::DraftChanged {
                option_id: "b".to_string()
            },
            SessionChange::ValidationChanged {
                error_count: 1,
                can_save: false
            },
        ]
    );
}

#[tokio::test]
async fn test_multiple_subscribers_receive_events() {
    let session = Arc::new(SessionManager::new());
    let mut rx1 = session.subscribe();
    let mut rx2 = session.subscribe();

    session.set_backups(vec!["05.03.2024_14.07.09".to_string()]);

    for rx in [&mut rx1, &mut rx2] {
        let event = timeout(Duration::from_millis(100), rx.recv())
            .await
            .expect("Timeout waiting for event")
            .expect("Channel closed");
        assert_eq!(event, SessionChange::BackupsChanged { count: 1 });
    }
}

#[tokio::test]
async fn test_removing_a_draft_clears_its_errors() {
    let session = SessionManager::new();
    session.load_schema(
        GameSettingsConfig::default(),
        drafts(&["a", "b"]),
        label_error("a"),
    );
    assert!(!session.read(|s| s.can_save()));

    let mut rx = session.subscribe();
    let changes = session.remove_draft("a", ValidationErrors::new());

    assert_eq!(
        changes,
        vec![
            SessionChange::DraftRemoved {
                option_id: "a".to_string()
            },
            SessionChange::ValidationChanged {
                error_count: 0,
                can_save: true
            },
        ]
    );
    let first = timeout(Duration::from_millis(100), rx.recv())
        .await
        .expect("Timeout waiting for event")
        .expect("Channel closed");
    assert_eq!(first, changes[0]);
    assert!(session.read(|s| s.can_save()));
}

#[tokio::test]
async fn test_concurrent_updates_from_threads() {
    let session = Arc::new(SessionManager::new());

    let mut handles = Vec::new();
    for thread in 0..8 {
        let session = Arc::clone(&session);
        handles.push(std::thread::spawn(move || {
            for n in 0..25 {
                let id = format!("opt-{}-{}", thread, n);
                session.set_draft(OptionDraft::new(id, "prefs"), ValidationErrors::new());
            }
        }));
    }
    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(session.read(|s| s.drafts.len()), 200);
}

#[tokio::test]
async fn test_reads_during_writes_see_consistent_state() {
    let session = Arc::new(SessionManager::new());

    let writer = {
        let session = Arc::clone(&session);
        tokio::task::spawn_blocking(move || {
            for n in 0..100 {
                session.update(|s| {
                    s.backups.push(format!("backup-{}", n));
                    s.active_profile = Some(format!("profile-{}", n));
                });
            }
        })
    };

    for _ in 0..100 {
        session.read(|s| {
            // Both fields are always written together
            match &s.active_profile {
                Some(profile) => {
                    let n = s.backups.len() - 1;
                    assert_eq!(profile, &format!("profile-{}", n));
                }
                None => assert!(s.backups.is_empty()),
            }
        });
        tokio::task::yield_now().await;
    }

    writer.await.unwrap();
    assert_eq!(session.read(|s| s.backups.len()), 100);
}
