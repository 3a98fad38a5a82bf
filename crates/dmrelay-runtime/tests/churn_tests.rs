//! Registry churn tests
//!
//! Hammers the shared registry with concurrent binds and unbinds to verify
//! the atomicity contract: every presence transition is decided inside the
//! mutating critical section, so racing tasks can never observe two
//! `first_connection` or two `last_connection` verdicts for one transition.

use dmrelay_runtime::{BindOutcome, ConnectionId, SharedRegistry, UserId};
use futures::future::join_all;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

// ----------------------------------------------------------------------------
// Test Utilities
// ----------------------------------------------------------------------------

fn user(id: &str) -> UserId {
    UserId::new(id).unwrap()
}

// ----------------------------------------------------------------------------
// Concurrent Churn Tests
// ----------------------------------------------------------------------------

#[tokio::test]
async fn test_racing_binds_yield_one_online_transition() {
    let registry = SharedRegistry::new();
    let online_transitions = Arc::new(AtomicU64::new(0));

    let tasks: Vec<_> = (0..32u64)
        .map(|i| {
            let registry = registry.clone();
            let online_transitions = online_transitions.clone();
            tokio::spawn(async move {
                let outcome = registry.bind(user("alice"), ConnectionId::new(i));
                if matches!(
                    outcome,
                    BindOutcome::Bound {
                        first_connection: true,
                        ..
                    }
                ) {
                    online_transitions.fetch_add(1, Ordering::Relaxed);
                }
            })
        })
        .collect();
    join_all(tasks).await;

    assert_eq!(online_transitions.load(Ordering::Relaxed), 1);
    assert!(registry.is_online(&user("alice")));
    assert_eq!(registry.connection_count(), 32);
}

#[tokio::test]
async fn test_racing_unbinds_yield_one_offline_transition() {
    let registry = SharedRegistry::new();
    registry.bind(user("alice"), ConnectionId::new(1));
    registry.bind(user("alice"), ConnectionId::new(2));

    let offline_transitions = Arc::new(AtomicU64::new(0));
    let tasks: Vec<_> = [1u64, 2]
        .into_iter()
        .map(|raw| {
            let registry = registry.clone();
            let offline_transitions = offline_transitions.clone();
            tokio::spawn(async move {
                if let Some(outcome) = registry.unbind(ConnectionId::new(raw)) {
                    if outcome.last_connection {
                        offline_transitions.fetch_add(1, Ordering::Relaxed);
                    }
                }
            })
        })
        .collect();
    join_all(tasks).await;

    assert_eq!(offline_transitions.load(Ordering::Relaxed), 1);
    assert!(!registry.is_online(&user("alice")));
    assert_eq!(registry.connection_count(), 0);
}

#[tokio::test]
async fn test_sustained_bind_unbind_churn_stays_consistent() {
    let registry = SharedRegistry::new();

    let tasks: Vec<_> = (0..16u64)
        .map(|worker| {
            let registry = registry.clone();
            tokio::spawn(async move {
                let user_id = user(&format!("user-{}", worker % 4));
                for round in 0..100u64 {
                    let connection_id = ConnectionId::new(worker * 1_000 + round);
                    registry.bind(user_id.clone(), connection_id);
                    tokio::task::yield_now().await;
                    registry.unbind(connection_id);
                }
            })
        })
        .collect();
    join_all(tasks).await;

    // Every bind was matched by an unbind, so the registry must be empty
    assert_eq!(registry.connection_count(), 0);
    assert_eq!(registry.online_user_count(), 0);
}

#[tokio::test]
async fn test_connection_id_reuse_displaces_previous_owner() {
    let registry = SharedRegistry::new();
    let recycled = ConnectionId::new(7);

    registry.bind(user("alice"), recycled);
    assert!(registry.is_online(&user("alice")));

    // The transport recycled the id before Alice's close was processed
    registry.bind(user("bob"), recycled);

    assert!(!registry.is_online(&user("alice")));
    assert!(registry.is_online(&user("bob")));
    assert_eq!(registry.user_for(recycled), Some(user("bob")));
    assert_eq!(registry.connection_count(), 1);
}
