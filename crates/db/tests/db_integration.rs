//! Database integration tests.
//!
//! These tests require a running `PostgreSQL` instance.
//! Run with: `cargo test --test db_integration -- --ignored`
//!
//! Environment variables:
//!   `TEST_DB_HOST` (default: localhost)
//!   `TEST_DB_PORT` (default: 5433)
//!   `TEST_DB_USER` (default: `livepoll_test`)
//!   `TEST_DB_PASSWORD` (default: `livepoll_test`)
//!   `TEST_DB_NAME` (default: `livepoll_test`)

#![allow(clippy::unwrap_used)]

use std::sync::Arc;

use chrono::Utc;
use livepoll_common::ResubmissionPolicy;
use livepoll_db::entities::poll::{PollStatus, PollType};
use livepoll_db::entities::{host, participant, poll, poll_option, response, session};
use livepoll_db::repositories::{
    ExclusivePublish, HostRepository, ParticipantRepository, PollRepository, ResponseRepository,
    SessionRepository, SubmitOutcome,
};
use livepoll_db::test_utils::{TestDatabase, TestDbConfig};
use sea_orm::{ColumnTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter, Set};
use serde_json::json;

struct Fixture {
    db: TestDatabase,
    conn: Arc<DatabaseConnection>,
}

impl Fixture {
    async fn new() -> Self {
        let db = TestDatabase::create_unique().await.unwrap();
        let conn = db.shared();
        Self { db, conn }
    }

    async fn host_and_session(&self) -> session::Model {
        HostRepository::new(self.conn.clone())
            .create(host::ActiveModel {
                id: Set("h1".to_string()),
                email: Set("host@example.com".to_string()),
                name: Set("Host".to_string()),
                password_hash: Set("hash".to_string()),
                token: Set("token-h1".to_string()),
                created_at: Set(Utc::now().into()),
            })
            .await
            .unwrap();

        SessionRepository::new(self.conn.clone())
            .try_create(session_model("s1", "ABC123"))
            .await
            .unwrap()
            .unwrap()
    }

    async fn poll(&self, id: &str) -> poll::Model {
        let options = ["Red", "Blue"]
            .iter()
            .enumerate()
            .map(|(i, text)| poll_option::ActiveModel {
                id: Set(format!("{id}-o{i}")),
                poll_id: Set(id.to_string()),
                position: Set(i32::try_from(i).unwrap()),
                text: Set((*text).to_string()),
            })
            .collect();

        PollRepository::new(self.conn.clone())
            .create_with_options(
                poll::ActiveModel {
                    id: Set(id.to_string()),
                    session_id: Set("s1".to_string()),
                    question: Set("Colour?".to_string()),
                    poll_type: Set(PollType::SingleChoice),
                    status: Set(PollStatus::Draft),
                    created_at: Set(Utc::now().into()),
                    published_at: Set(None),
                    closed_at: Set(None),
                },
                options,
            )
            .await
            .unwrap()
            .0
    }

    async fn teardown(self) {
        drop(self.conn);
        self.db.drop_database().await.unwrap();
    }
}

fn session_model(id: &str, code: &str) -> session::ActiveModel {
    session::ActiveModel {
        id: Set(id.to_string()),
        host_id: Set("h1".to_string()),
        join_code: Set(code.to_string()),
        name: Set("Lecture".to_string()),
        created_at: Set(Utc::now().into()),
    }
}

fn participant_model(id: &str, name: &str) -> participant::ActiveModel {
    participant::ActiveModel {
        id: Set(id.to_string()),
        session_id: Set("s1".to_string()),
        name: Set(name.to_string()),
        email: Set("ada@example.com".to_string()),
        created_at: Set(Utc::now().into()),
    }
}

fn response_model(id: &str, poll_id: &str, participant_id: &str, option: &str) -> response::ActiveModel {
    let now = Utc::now();
    response::ActiveModel {
        id: Set(id.to_string()),
        poll_id: Set(poll_id.to_string()),
        participant_id: Set(participant_id.to_string()),
        payload: Set(json!({ "optionId": option })),
        created_at: Set(now.into()),
        updated_at: Set(now.into()),
    }
}

#[tokio::test]
#[ignore = "requires running PostgreSQL instance"]
async fn test_database_connection() {
    let result = TestDatabase::with_config(TestDbConfig::default()).await;
    assert!(result.is_ok(), "Failed to connect: {:?}", result.err());
}

#[tokio::test]
#[ignore = "requires running PostgreSQL instance"]
async fn test_join_code_collision_reported() {
    let fx = Fixture::new().await;
    fx.host_and_session().await;

    let sessions = SessionRepository::new(fx.conn.clone());
    let again = sessions.try_create(session_model("s2", "ABC123")).await.unwrap();
    assert!(again.is_none());

    let found = sessions.find_by_join_code("ABC123").await.unwrap().unwrap();
    assert_eq!(found.id, "s1");

    fx.teardown().await;
}

#[tokio::test]
#[ignore = "requires running PostgreSQL instance"]
async fn test_concurrent_joins_share_one_participant() {
    let fx = Fixture::new().await;
    fx.host_and_session().await;

    let repo = ParticipantRepository::new(fx.conn.clone());
    let handles: Vec<_> = (0..8)
        .map(|i| {
            let repo = repo.clone();
            tokio::spawn(async move {
                repo.join(
                    participant_model(&format!("p{i}"), &format!("Ada {i}")),
                    "s1",
                    "ada@example.com",
                )
                .await
                .unwrap()
            })
        })
        .collect();

    let mut ids = Vec::new();
    let mut created = 0;
    for handle in handles {
        let (participant, new) = handle.await.unwrap();
        ids.push(participant.id);
        if new {
            created += 1;
        }
    }

    assert_eq!(created, 1);
    ids.dedup();
    assert_eq!(ids.len(), 1);
    let stored = participant::Entity::find()
        .filter(participant::Column::SessionId.eq("s1"))
        .count(fx.conn.as_ref())
        .await
        .unwrap();
    assert_eq!(stored, 1);

    fx.teardown().await;
}

#[tokio::test]
#[ignore = "requires running PostgreSQL instance"]
async fn test_concurrent_publish_has_one_winner() {
    let fx = Fixture::new().await;
    fx.host_and_session().await;
    fx.poll("poll1").await;

    let repo = PollRepository::new(fx.conn.clone());
    let handles: Vec<_> = (0..4)
        .map(|_| {
            let repo = repo.clone();
            tokio::spawn(async move {
                repo.transition("poll1", PollStatus::Draft, PollStatus::Published)
                    .await
                    .unwrap()
            })
        })
        .collect();

    let mut winners = 0;
    for handle in handles {
        if handle.await.unwrap() {
            winners += 1;
        }
    }
    assert_eq!(winners, 1);

    let stored = repo.get_by_id("poll1").await.unwrap();
    assert_eq!(stored.status, PollStatus::Published);
    assert!(stored.published_at.is_some());

    let options = repo.find_options("poll1").await.unwrap();
    assert_eq!(options.len(), 2);
    assert_eq!(options[0].text, "Red");

    fx.teardown().await;
}

#[tokio::test]
#[ignore = "requires running PostgreSQL instance"]
async fn test_concurrent_exclusive_publish_in_one_session() {
    let fx = Fixture::new().await;
    fx.host_and_session().await;
    let ids = ["poll1", "poll2", "poll3", "poll4"];
    for id in ids {
        fx.poll(id).await;
    }

    let repo = PollRepository::new(fx.conn.clone());
    let handles: Vec<_> = ids
        .iter()
        .map(|id| {
            let repo = repo.clone();
            let id = (*id).to_string();
            tokio::spawn(async move { repo.publish_exclusive(&id, "s1").await.unwrap() })
        })
        .collect();

    let mut outcomes = Vec::new();
    for handle in handles {
        outcomes.push(handle.await.unwrap());
    }
    let winners = outcomes
        .iter()
        .filter(|o| **o == ExclusivePublish::Published)
        .count();
    assert_eq!(winners, 1);
    assert_eq!(
        outcomes
            .iter()
            .filter(|o| **o == ExclusivePublish::SessionBusy)
            .count(),
        3
    );

    let published = repo.find_published_by_session("s1").await.unwrap();
    assert_eq!(published.len(), 1);

    fx.teardown().await;
}

#[tokio::test]
#[ignore = "requires running PostgreSQL instance"]
async fn test_resubmission_overwrites_single_row() {
    let fx = Fixture::new().await;
    fx.host_and_session().await;
    fx.poll("poll1").await;

    let polls = PollRepository::new(fx.conn.clone());
    assert!(
        polls
            .transition("poll1", PollStatus::Draft, PollStatus::Published)
            .await
            .unwrap()
    );

    let (participant, _) = ParticipantRepository::new(fx.conn.clone())
        .join(participant_model("p1", "Ada"), "s1", "ada@example.com")
        .await
        .unwrap();

    let responses = ResponseRepository::new(fx.conn.clone());
    responses
        .submit(
            response_model("r1", "poll1", &participant.id, "poll1-o0"),
            "poll1",
            &participant.id,
            ResubmissionPolicy::Overwrite,
        )
        .await
        .unwrap();
    let second = responses
        .submit(
            response_model("r2", "poll1", &participant.id, "poll1-o1"),
            "poll1",
            &participant.id,
            ResubmissionPolicy::Overwrite,
        )
        .await
        .unwrap();

    let SubmitOutcome::Stored(stored) = second else {
        panic!("expected stored outcome, got {second:?}");
    };
    assert_eq!(stored.id, "r1");
    assert_eq!(stored.payload, json!({ "optionId": "poll1-o1" }));
    assert_eq!(responses.find_by_poll("poll1").await.unwrap().len(), 1);

    let rejected = responses
        .submit(
            response_model("r3", "poll1", &participant.id, "poll1-o0"),
            "poll1",
            &participant.id,
            ResubmissionPolicy::Reject,
        )
        .await
        .unwrap();
    assert_eq!(rejected, SubmitOutcome::Duplicate);

    fx.teardown().await;
}

#[tokio::test]
#[ignore = "requires running PostgreSQL instance"]
async fn test_submit_after_close_rejected() {
    let fx = Fixture::new().await;
    fx.host_and_session().await;
    fx.poll("poll1").await;

    let polls = PollRepository::new(fx.conn.clone());
    polls
        .transition("poll1", PollStatus::Draft, PollStatus::Published)
        .await
        .unwrap();
    polls
        .transition("poll1", PollStatus::Published, PollStatus::Closed)
        .await
        .unwrap();

    let (participant, _) = ParticipantRepository::new(fx.conn.clone())
        .join(participant_model("p1", "Ada"), "s1", "ada@example.com")
        .await
        .unwrap();

    let outcome = ResponseRepository::new(fx.conn.clone())
        .submit(
            response_model("r1", "poll1", &participant.id, "poll1-o0"),
            "poll1",
            &participant.id,
            ResubmissionPolicy::Overwrite,
        )
        .await
        .unwrap();

    assert_eq!(outcome, SubmitOutcome::PollNotOpen(PollStatus::Closed));

    fx.teardown().await;
}

#[test]
fn test_database_url_format() {
    let config = TestDbConfig {
        host: "testhost".to_string(),
        port: 5432,
        username: "testuser".to_string(),
        password: "testpass".to_string(),
        database: "testdb".to_string(),
    };

    let url = config.database_url();
    assert!(url.starts_with("postgres://"));
    assert!(url.contains("testhost"));
    assert!(url.contains("testdb"));
}
