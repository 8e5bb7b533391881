//! Tests with several threads contending for the same records, each with
//! its own arena handle as separate agent processes would have.

use std::fs;
use std::thread;
use std::time::Duration;
use strictly_arena::{Arena, ArenaConfig, ErrorKind, LockDir, MoveNotes, Side};
use tempfile::TempDir;

fn test_config(dir: &TempDir) -> ArenaConfig {
    ArenaConfig::default()
        .with_data_dir(dir.path())
        .with_lock_retry_ms(1)
        .with_lock_timeout_ms(20_000)
}

fn open_arena(dir: &TempDir) -> Arena {
    Arena::with_chess(test_config(dir)).expect("Failed to open arena")
}

fn active_count(arena: &Arena) -> usize {
    arena
        .list_sessions()
        .expect("List failed")
        .iter()
        .filter(|s| s.is_active())
        .count()
}

#[test]
fn test_lock_excludes_other_threads() {
    let dir = TempDir::new().expect("Failed to create temp dir");
    let counter = dir.path().join("counter");
    fs::write(&counter, "0").expect("Write failed");

    thread::scope(|scope| {
        for _ in 0..4 {
            scope.spawn(|| {
                let locks = LockDir::new(
                    dir.path(),
                    Duration::from_secs(20),
                    Duration::from_millis(1),
                    Duration::from_secs(60),
                );
                for _ in 0..25 {
                    let _guard = locks.acquire("counter").expect("Acquire failed");
                    let value: u32 = fs::read_to_string(&counter)
                        .expect("Read failed")
                        .parse()
                        .expect("Not a number");
                    thread::yield_now();
                    fs::write(&counter, (value + 1).to_string()).expect("Write failed");
                }
            });
        }
    });

    let total = fs::read_to_string(&counter).expect("Read failed");
    assert_eq!(total, "100");
    assert!(!dir.path().join("counter.lock").exists());
}

#[test]
fn test_concurrent_creates_yield_one_session() {
    let dir = TempDir::new().expect("Failed to create temp dir");

    let results: Vec<_> = thread::scope(|scope| {
        let handles: Vec<_> = (0..6)
            .map(|_| {
                let arena = open_arena(&dir);
                scope.spawn(move || arena.create_session())
            })
            .collect();
        handles
            .into_iter()
            .map(|h| h.join().expect("Creator panicked"))
            .collect()
    });

    let created = results.iter().filter(|r| r.is_ok()).count();
    assert_eq!(created, 1);
    for result in results.iter().filter_map(|r| r.as_ref().err()) {
        assert_eq!(result.kind, ErrorKind::Conflict);
    }
    assert_eq!(active_count(&open_arena(&dir)), 1);
}

#[test]
fn test_finishing_races_creation_without_second_active() {
    let dir = TempDir::new().expect("Failed to create temp dir");
    let arena = open_arena(&dir);

    for _ in 0..25 {
        let white = arena.join("alice", Some(Side::White)).expect("White join failed");
        let black = arena.join("bob", None).expect("Black join failed");
        arena.offer_draw(&white.ticket.ticket_id).expect("Offer failed");

        let finisher = open_arena(&dir);
        let creator = open_arena(&dir);
        let accept_ticket = black.ticket.ticket_id.clone();
        thread::scope(|scope| {
            scope.spawn(move || finisher.accept_draw(&accept_ticket).expect("Accept failed"));
            scope.spawn(move || {
                if let Err(e) = creator.create_session() {
                    assert_eq!(e.kind, ErrorKind::Conflict);
                }
            });
        });

        assert!(active_count(&arena) <= 1);
        if active_count(&arena) == 1 {
            let err = arena.create_session().unwrap_err();
            assert_eq!(err.kind, ErrorKind::Conflict);
        }
    }
}

#[test]
fn test_racing_submissions_apply_one_move() {
    let dir = TempDir::new().expect("Failed to create temp dir");
    let arena = open_arena(&dir);
    let white = arena.join("alice", Some(Side::White)).expect("White join failed");
    arena.join("bob", None).expect("Black join failed");

    let results: Vec<_> = thread::scope(|scope| {
        let handles: Vec<_> = ["e2e4", "d2d4", "c2c4"]
            .into_iter()
            .map(|mv| {
                let arena = open_arena(&dir);
                let ticket = white.ticket.ticket_id.clone();
                scope.spawn(move || {
                    arena.submit_move(&ticket, mv, &MoveNotes::new("Race".to_string()))
                })
            })
            .collect();
        handles
            .into_iter()
            .map(|h| h.join().expect("Submitter panicked"))
            .collect()
    });

    assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
    for err in results.iter().filter_map(|r| r.as_ref().err()) {
        assert_eq!(err.kind, ErrorKind::IllegalMove);
    }

    let session = arena.get_session(&white.session.id).expect("Reload failed");
    assert_eq!(session.ply(), 1);
    assert_eq!(session.illegal_attempts.len(), 2);
    assert_eq!(session.positions.len(), 2);
    assert_eq!(session.turn, Side::Black);
}

#[test]
fn test_concurrent_joins_fill_distinct_seats() {
    let dir = TempDir::new().expect("Failed to create temp dir");

    let results: Vec<_> = thread::scope(|scope| {
        let handles: Vec<_> = ["alice", "bob", "carol"]
            .into_iter()
            .map(|name| {
                let arena = open_arena(&dir);
                scope.spawn(move || arena.join(name, None))
            })
            .collect();
        handles
            .into_iter()
            .map(|h| h.join().expect("Joiner panicked"))
            .collect()
    });

    let seated: Vec<_> = results.iter().filter_map(|r| r.as_ref().ok()).collect();
    assert_eq!(seated.len(), 2);
    assert_ne!(seated[0].side, seated[1].side);
    assert_eq!(seated[0].session.id, seated[1].session.id);

    let session = open_arena(&dir)
        .get_session(&seated[0].session.id)
        .expect("Reload failed");
    assert!(session.is_full());
}
