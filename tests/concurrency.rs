mod common;

use common::{ballot, open_poll, register, setup};
use slider_vote::PollError;
use slider_vote::handlers;
use slider_vote::models::PollStatus;
use std::sync::Arc;
use tokio::task::JoinHandle;

async fn join_all<T>(handles: Vec<JoinHandle<T>>) -> Vec<T> {
    let mut out = Vec::with_capacity(handles.len());
    for handle in handles {
        out.push(handle.await.expect("task panicked"));
    }
    out
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn distinct_voters_submitting_at_once_all_land() {
    const VOTERS: usize = 24;

    let t = setup().await;
    let (poll, options) = open_poll(&t.db, &["A", "B", "C"]).await;
    let voters: Vec<String> = (0..VOTERS).map(|i| format!("voter-{}", i)).collect();
    let refs: Vec<&str> = voters.iter().map(String::as_str).collect();
    register(&t.db, &poll.id, &refs).await;

    let handles = voters
        .into_iter()
        .enumerate()
        .map(|(i, voter)| {
            let db = Arc::clone(&t.db);
            let poll_id = poll.id.clone();
            let scores = ballot(&options, &[0.1, 0.5, (i % 10) as f64 / 10.0]);
            tokio::spawn(async move {
                handlers::submit_or_update_ballot(&db, &*db, &poll_id, &voter, &scores).await
            })
        })
        .collect();

    for result in join_all(handles).await {
        assert!(!result.unwrap().was_update);
    }
    assert_eq!(t.db.count_ballots(&poll.id).await.unwrap(), VOTERS as i64);
    assert_eq!(t.db.count_scores(&poll.id).await.unwrap(), (VOTERS * 3) as i64);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn racing_first_submissions_from_one_voter_yield_one_ballot() {
    const ATTEMPTS: usize = 8;

    let t = setup().await;
    let (poll, options) = open_poll(&t.db, &["A", "B", "C", "D"]).await;
    register(&t.db, &poll.id, &["zoe"]).await;

    let handles = (0..ATTEMPTS)
        .map(|i| {
            let db = Arc::clone(&t.db);
            let poll_id = poll.id.clone();
            // One uniform value per attempt, so a mixed ballot would show.
            let value = i as f64 / ATTEMPTS as f64;
            let scores = ballot(&options, &[value; 4]);
            tokio::spawn(async move {
                handlers::submit_or_update_ballot(&db, &*db, &poll_id, "zoe", &scores).await
            })
        })
        .collect();

    let receipts: Vec<_> = join_all(handles)
        .await
        .into_iter()
        .map(|r| r.unwrap())
        .collect();
    assert_eq!(receipts.iter().filter(|r| !r.was_update).count(), 1);
    assert!(receipts.iter().all(|r| r.ballot_id == receipts[0].ballot_id));

    assert_eq!(t.db.count_ballots(&poll.id).await.unwrap(), 1);
    let stored = t.db.get_ballot(&poll.id, "zoe").await.unwrap().unwrap();
    assert_eq!(stored.revision, ATTEMPTS as i64);
    assert_eq!(stored.scores.len(), 4);
    let first = stored.scores[0].value;
    assert!(
        stored.scores.iter().all(|s| s.value == first),
        "mixed generations: {:?}",
        stored.scores
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_closes_produce_exactly_one_snapshot() {
    const CLOSERS: usize = 8;

    let t = setup().await;
    let (poll, options) = open_poll(&t.db, &["A", "B"]).await;
    register(&t.db, &poll.id, &["v1", "v2"]).await;
    for (voter, values) in [("v1", [0.9, 0.2]), ("v2", [0.7, 0.4])] {
        handlers::submit_or_update_ballot(&t.db, &*t.db, &poll.id, voter, &ballot(&options, &values))
            .await
            .unwrap();
    }

    let handles = (0..CLOSERS)
        .map(|_| {
            let db = Arc::clone(&t.db);
            let poll_id = poll.id.clone();
            tokio::spawn(async move { handlers::close_poll(&db, &poll_id).await })
        })
        .collect();

    let mut winners = Vec::new();
    for result in join_all(handles).await {
        match result {
            Ok(snapshot) => winners.push(snapshot),
            Err(PollError::InvalidState { actual, .. }) => assert_eq!(actual, PollStatus::Closed),
            Err(e) => panic!("unexpected close failure: {}", e),
        }
    }
    assert_eq!(winners.len(), 1);

    assert_eq!(t.db.count_snapshots(&poll.id).await.unwrap(), 1);
    let linked = t.db.get_poll(&poll.id).await.unwrap().snapshot_id;
    assert_eq!(linked.as_deref(), Some(winners[0].id.as_str()));
    assert_eq!(handlers::get_results(&t.db, &poll.id).await.unwrap(), winners[0]);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn submissions_racing_close_are_all_or_nothing() {
    const VOTERS: usize = 12;

    let t = setup().await;
    let (poll, options) = open_poll(&t.db, &["A", "B"]).await;
    let voters: Vec<String> = (0..VOTERS).map(|i| format!("late-{}", i)).collect();
    let refs: Vec<&str> = voters.iter().map(String::as_str).collect();
    register(&t.db, &poll.id, &refs).await;

    let submissions = voters
        .into_iter()
        .map(|voter| {
            let db = Arc::clone(&t.db);
            let poll_id = poll.id.clone();
            let scores = ballot(&options, &[0.8, 0.3]);
            tokio::spawn(async move {
                handlers::submit_or_update_ballot(&db, &*db, &poll_id, &voter, &scores).await
            })
        })
        .collect();
    let closer = {
        let db = Arc::clone(&t.db);
        let poll_id = poll.id.clone();
        tokio::spawn(async move { handlers::close_poll(&db, &poll_id).await })
    };

    let submitted = join_all(submissions).await;
    let snapshot = closer.await.unwrap().unwrap();

    let accepted = submitted
        .into_iter()
        .filter(|r| match r {
            Ok(_) => true,
            Err(PollError::InvalidState { .. }) => false,
            Err(e) => panic!("unexpected submission failure: {}", e),
        })
        .count() as i64;

    // Whatever committed is complete; nothing rejected left a row behind.
    let ballots = t.db.count_ballots(&poll.id).await.unwrap();
    assert_eq!(ballots, accepted);
    assert_eq!(t.db.count_scores(&poll.id).await.unwrap(), ballots * 2);
    assert_eq!(snapshot.ranking.len(), 2);
}
