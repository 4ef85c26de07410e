//! Database integration tests.
//!
//! These tests require a running `PostgreSQL` instance.
//! Run with: `cargo test --test db_integration -- --ignored`
//!
//! Environment variables:
//!   `TEST_DB_HOST` (default: localhost)
//!   `TEST_DB_PORT` (default: 5433)
//!   `TEST_DB_USER` (default: `univote_test`)
//!   `TEST_DB_PASSWORD` (default: `univote_test`)
//!   `TEST_DB_NAME` (default: `univote_test`)

#![allow(clippy::unwrap_used)]

use std::sync::Arc;

use chrono::{Duration, Utc};
use sea_orm::Set;
use serde_json::json;
use univote_common::{AppError, IdGenerator};
use univote_db::entities::{poll, poll_option, user, vote};
use univote_db::repositories::{PollRepository, UserRepository, VoteRepository};
use univote_db::test_utils::{TestDatabase, TestDbConfig};

fn id_gen() -> IdGenerator {
    IdGenerator::new()
}

async fn seed_user(repo: &UserRepository, username: &str) -> user::Model {
    let ids = id_gen();
    repo.create(user::ActiveModel {
        id: Set(ids.generate()),
        username: Set(username.to_string()),
        name: Set(username.to_string()),
        email: Set(format!("{username}@example.edu")),
        role: Set(user::UserRole::Student),
        managed_poll_ids: Set(None),
        token: Set(Some(ids.generate_token())),
        created_at: Set(Utc::now().into()),
    })
    .await
    .unwrap()
}

async fn seed_poll(
    repo: &PollRepository,
    creator: &str,
    option_texts: &[&str],
    expires_in: Duration,
) -> (poll::Model, Vec<poll_option::Model>) {
    let ids = id_gen();
    let poll_id = ids.generate();
    let poll_model = poll::ActiveModel {
        id: Set(poll_id.clone()),
        question: Set("Which option?".to_string()),
        poll_type: Set(poll::PollType::SingleChoice),
        target_audience: Set(poll::TargetAudience::All),
        status: Set(poll::PollStatus::Active),
        expires_at: Set((Utc::now() + expires_in).into()),
        results_published: Set(false),
        created_by: Set(creator.to_string()),
        created_at: Set(Utc::now().into()),
    };
    let options = option_texts
        .iter()
        .enumerate()
        .map(|(i, text)| poll_option::ActiveModel {
            id: Set(ids.generate()),
            poll_id: Set(poll_id.clone()),
            option_text: Set((*text).to_string()),
            votes: Set(0),
            display_order: Set(i as i32),
        })
        .collect();
    repo.create(poll_model, options).await.unwrap()
}

fn ballot(user_id: &str, poll_id: &str, option_ids: &[String]) -> vote::ActiveModel {
    vote::ActiveModel {
        id: Set(id_gen().generate()),
        user_id: Set(user_id.to_string()),
        poll_id: Set(poll_id.to_string()),
        selected_option_ids: Set(json!(option_ids)),
        created_at: Set(Utc::now().into()),
    }
}

#[tokio::test]
#[ignore = "requires running PostgreSQL instance"]
async fn test_database_connection() {
    let config = TestDbConfig::default();
    let result = TestDatabase::with_config(config).await;
    assert!(result.is_ok(), "Failed to connect: {:?}", result.err());
}

#[tokio::test]
#[ignore = "requires running PostgreSQL instance"]
async fn test_duplicate_vote_rejected_by_unique_index() {
    let db = TestDatabase::create_unique().await.unwrap();
    univote_db::migrate(db.connection()).await.unwrap();
    let conn = Arc::clone(&db.conn);

    let users = UserRepository::new(Arc::clone(&conn));
    let polls = PollRepository::new(Arc::clone(&conn));

    let voter = seed_user(&users, "alice").await;
    let (poll, options) = seed_poll(&polls, &voter.id, &["A", "B"], Duration::hours(1)).await;

    let pick = vec![options[0].id.clone()];
    polls
        .apply_vote(ballot(&voter.id, &poll.id, &pick), &poll.id, &pick)
        .await
        .unwrap();

    // Second ballot from the same user adjudicates at the index, not in
    // application code.
    let err = polls
        .apply_vote(ballot(&voter.id, &poll.id, &pick), &poll.id, &pick)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::DuplicateVote));

    // The rejected ballot left the tallies untouched.
    let refreshed = polls.options_of(&poll.id).await.unwrap();
    assert_eq!(refreshed[0].votes, 1);
    assert_eq!(refreshed[1].votes, 0);

    db.drop_database().await.unwrap();
}

#[tokio::test]
#[ignore = "requires running PostgreSQL instance"]
async fn test_concurrent_voters_sum_correctly() {
    let db = TestDatabase::create_unique().await.unwrap();
    univote_db::migrate(db.connection()).await.unwrap();
    let conn = Arc::clone(&db.conn);

    let users = UserRepository::new(Arc::clone(&conn));
    let polls = PollRepository::new(Arc::clone(&conn));

    let creator = seed_user(&users, "creator").await;
    let (poll, options) = seed_poll(&polls, &creator.id, &["A", "B"], Duration::hours(1)).await;

    let mut handles = Vec::new();
    for i in 0..10 {
        let users = users.clone();
        let polls = polls.clone();
        let poll_id = poll.id.clone();
        let option_id = options[i % 2].id.clone();
        handles.push(tokio::spawn(async move {
            let voter = seed_user(&users, &format!("voter{i}")).await;
            let pick = vec![option_id];
            polls
                .apply_vote(ballot(&voter.id, &poll_id, &pick), &poll_id, &pick)
                .await
        }));
    }
    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    // In-place increments never lose updates under concurrency.
    let refreshed = polls.options_of(&poll.id).await.unwrap();
    assert_eq!(refreshed[0].votes + refreshed[1].votes, 10);
    assert_eq!(refreshed[0].votes, 5);
    assert_eq!(refreshed[1].votes, 5);

    db.drop_database().await.unwrap();
}

#[tokio::test]
#[ignore = "requires running PostgreSQL instance"]
async fn test_tally_sum_matches_ledger_fanout() {
    let db = TestDatabase::create_unique().await.unwrap();
    univote_db::migrate(db.connection()).await.unwrap();
    let conn = Arc::clone(&db.conn);

    let users = UserRepository::new(Arc::clone(&conn));
    let polls = PollRepository::new(Arc::clone(&conn));
    let votes = VoteRepository::new(Arc::clone(&conn));

    let creator = seed_user(&users, "creator").await;
    let (poll, options) = seed_poll(&polls, &creator.id, &["A", "B", "C"], Duration::hours(1)).await;

    // Multi-select ballots fan out one increment per selected option.
    let u1 = seed_user(&users, "u1").await;
    let pick1 = vec![options[0].id.clone(), options[2].id.clone()];
    polls
        .apply_vote(ballot(&u1.id, &poll.id, &pick1), &poll.id, &pick1)
        .await
        .unwrap();

    let u2 = seed_user(&users, "u2").await;
    let pick2 = vec![options[1].id.clone()];
    polls
        .apply_vote(ballot(&u2.id, &poll.id, &pick2), &poll.id, &pick2)
        .await
        .unwrap();

    let tally_sum: i32 = polls
        .options_of(&poll.id)
        .await
        .unwrap()
        .iter()
        .map(|o| o.votes)
        .sum();
    let ledger_fanout: usize = votes
        .list_by_poll(&poll.id)
        .await
        .unwrap()
        .iter()
        .map(|v| v.selected_option_ids.as_array().map_or(0, Vec::len))
        .sum();
    assert_eq!(tally_sum as usize, ledger_fanout);

    db.drop_database().await.unwrap();
}

#[tokio::test]
#[ignore = "requires running PostgreSQL instance"]
async fn test_sweep_closes_expired_active_polls() {
    let db = TestDatabase::create_unique().await.unwrap();
    univote_db::migrate(db.connection()).await.unwrap();
    let conn = Arc::clone(&db.conn);

    let users = UserRepository::new(Arc::clone(&conn));
    let polls = PollRepository::new(Arc::clone(&conn));

    let creator = seed_user(&users, "creator").await;
    let (expired, _) = seed_poll(&polls, &creator.id, &["A", "B"], Duration::hours(-1)).await;
    let (open, _) = seed_poll(&polls, &creator.id, &["A", "B"], Duration::hours(1)).await;

    let swept = polls.close_expired(Utc::now()).await.unwrap();
    assert_eq!(swept, 1);

    assert_eq!(
        polls.get_by_id(&expired.id).await.unwrap().status,
        poll::PollStatus::Closed
    );
    assert_eq!(
        polls.get_by_id(&open.id).await.unwrap().status,
        poll::PollStatus::Active
    );

    // Idempotent: a second sweep transitions nothing.
    assert_eq!(polls.close_expired(Utc::now()).await.unwrap(), 0);

    db.drop_database().await.unwrap();
}

#[tokio::test]
#[ignore = "requires running PostgreSQL instance"]
async fn test_poll_delete_cascades_to_ledger() {
    let db = TestDatabase::create_unique().await.unwrap();
    univote_db::migrate(db.connection()).await.unwrap();
    let conn = Arc::clone(&db.conn);

    let users = UserRepository::new(Arc::clone(&conn));
    let polls = PollRepository::new(Arc::clone(&conn));
    let votes = VoteRepository::new(Arc::clone(&conn));

    let voter = seed_user(&users, "alice").await;
    let (poll, options) = seed_poll(&polls, &voter.id, &["A", "B"], Duration::hours(1)).await;

    let pick = vec![options[1].id.clone()];
    polls
        .apply_vote(ballot(&voter.id, &poll.id, &pick), &poll.id, &pick)
        .await
        .unwrap();
    assert!(votes.has_voted(&voter.id, &poll.id).await.unwrap());

    polls.delete(&poll.id).await.unwrap();

    assert!(polls.find_by_id(&poll.id).await.unwrap().is_none());
    assert!(votes.list_by_poll(&poll.id).await.unwrap().is_empty());

    db.drop_database().await.unwrap();
}
