// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::auth::AuthRecord;

fn record(name: &str, token: &str) -> AuthRecord {
    AuthRecord {
        name: name.to_owned(),
        path: format!("/tmp/{name}"),
        token: token.to_owned(),
        email: Some(format!("{name}@example.com")),
        account_id: None,
    }
}

#[tokio::test]
async fn round_robin_and_cooldown() {
    let pool = RoundRobinAuthPool::new();
    pool.load(vec![record("a.json", "tok-a"), record("b.json", "tok-b")]).await;

    let first = pool.pick().await.unwrap();
    pool.mark_cooldown(&first.name, 60).await;

    let second = pool.pick().await.unwrap();
    assert_ne!(second.name, first.name);
}

#[tokio::test]
async fn blacklist_then_probation_then_recovery() {
    let mut now = 1000u64;
    let pool = RoundRobinAuthPool::new();
    pool.load(vec![record("a.json", "tok-a")]).await;

    let picked = pool.pick_at(now).await.unwrap();
    assert_eq!(picked.name, "a.json");

    pool.mark_result_at(now, "a.json", 401, Some("token_expired"), None).await;
    assert!(pool.pick_at(now).await.is_none());

    now += DEFAULT_BLACKLIST_SECONDS + 1;
    let probe1 = pool.pick_at(now).await.unwrap();
    assert_eq!(probe1.name, "a.json");
    pool.mark_result_at(now, "a.json", 200, None, None).await;

    // Still probation: immediate pick blocked by the probe interval.
    assert!(pool.pick_at(now).await.is_none());
    now += PROBATION_PROBE_INTERVAL_SECONDS + 1;
    let probe2 = pool.pick_at(now).await;
    assert!(probe2.is_some());
    pool.mark_result_at(now, "a.json", 200, None, None).await;

    // Back in normal rotation: no waiting needed.
    assert!(pool.pick_at(now).await.is_some());
    let health = pool.health_snapshot_at(now).await;
    assert_eq!(health[0].status, crate::auth::AuthStatus::Ok);
    assert_eq!(health[0].blacklist_reason, None);
}

#[tokio::test]
async fn token_change_resets_blacklist_state() {
    let now = 2000u64;
    let pool = RoundRobinAuthPool::new();
    pool.load(vec![record("a.json", "tok-old")]).await;

    pool.mark_result_at(now, "a.json", 401, Some("token_expired"), None).await;
    assert!(pool.pick_at(now).await.is_none());

    // Same file name but refreshed token returns to normal rotation.
    pool.load(vec![record("a.json", "tok-new")]).await;
    assert!(pool.pick_at(now).await.is_some());
}

#[tokio::test]
async fn reload_with_same_token_preserves_health() {
    let now = 3000u64;
    let pool = RoundRobinAuthPool::new();
    pool.load(vec![record("a.json", "tok-a")]).await;

    pool.pick_at(now).await.unwrap();
    pool.mark_result_at(now, "a.json", 401, None, None).await;
    pool.load(vec![record("a.json", "tok-a")]).await;

    assert!(pool.pick_at(now).await.is_none());
    let health = pool.health_snapshot_at(now).await;
    assert_eq!(health[0].hard_failures, 1);
    assert_eq!(health[0].used, 1);
    assert_eq!(health[0].blacklist_reason.as_deref(), Some("token_invalid"));
}

#[tokio::test]
async fn reload_with_changed_token_keeps_usage_counters() {
    let now = 4000u64;
    let pool = RoundRobinAuthPool::new();
    pool.load(vec![record("a.json", "tok-a")]).await;

    pool.pick_at(now).await.unwrap();
    pool.mark_result_at(now, "a.json", 401, None, None).await;
    pool.load(vec![record("a.json", "tok-b")]).await;

    let health = pool.health_snapshot_at(now).await;
    assert_eq!(health[0].used, 1);
    assert_eq!(health[0].errors, 1);
    assert_eq!(health[0].hard_failures, 0);
    assert_eq!(health[0].blacklist_reason, None);
    assert_eq!(health[0].status, crate::auth::AuthStatus::Ok);
}

#[test]
fn rate_limit_cooldown_ladder_is_capped() {
    let ladder: Vec<u64> = (1u32..=7).map(rate_limit_cooldown_seconds).collect();
    assert_eq!(ladder, vec![30, 60, 120, 240, 480, 900, 900]);
}

#[test]
fn blacklist_ttl_ladder_is_capped() {
    let ladder: Vec<u64> = (1u32..=6).map(blacklist_ttl_seconds).collect();
    assert_eq!(ladder, vec![900, 1800, 3600, 7200, 14400, 14400]);
}

#[tokio::test]
async fn persistent_rate_limiting_escalates_to_blacklist() {
    let now = 5000u64;
    let pool = RoundRobinAuthPool::new();
    pool.load(vec![record("a.json", "tok-a")]).await;

    for _ in 0..4 {
        pool.mark_result_at(now, "a.json", 429, None, None).await;
    }
    let health = pool.health_snapshot_at(now).await;
    assert_eq!(health[0].status, crate::auth::AuthStatus::Cooldown);
    assert_eq!(health[0].blacklist_reason, None);

    // The fifth strike ejects the auth outright.
    pool.mark_result_at(now, "a.json", 429, None, None).await;
    let health = pool.health_snapshot_at(now).await;
    assert_eq!(health[0].status, crate::auth::AuthStatus::Blacklist);
    assert_eq!(health[0].blacklist_reason.as_deref(), Some("rate_limited_persistent"));
    assert_eq!(health[0].rate_limit_strikes, 5);
}

#[tokio::test]
async fn transient_failures_apply_short_cooldown() {
    let now = 6000u64;
    let pool = RoundRobinAuthPool::new();
    pool.load(vec![record("a.json", "tok-a")]).await;

    for status in [500u16, 408, 409, 425, 418] {
        pool.mark_result_at(now, "a.json", status, None, None).await;
        let health = pool.health_snapshot_at(now).await;
        assert_eq!(
            health[0].cooldown_seconds,
            Some(DEFAULT_TRANSIENT_COOLDOWN_SECONDS),
            "status {status}"
        );
    }
}

#[tokio::test]
async fn success_clears_cooldown_and_strikes() {
    let now = 7000u64;
    let pool = RoundRobinAuthPool::new();
    pool.load(vec![record("a.json", "tok-a")]).await;

    pool.mark_result_at(now, "a.json", 429, None, None).await;
    pool.mark_result_at(now, "a.json", 200, None, None).await;

    let health = pool.health_snapshot_at(now).await;
    assert_eq!(health[0].cooldown_seconds, None);
    assert_eq!(health[0].rate_limit_strikes, 0);
    assert!(pool.pick_at(now).await.is_some());
}

#[tokio::test]
async fn cooldown_never_decreases_from_override() {
    let now = 8000u64;
    let pool = RoundRobinAuthPool::new();
    pool.load(vec![record("a.json", "tok-a")]).await;

    pool.mark_result_at(now, "a.json", 429, None, Some(300)).await;
    pool.mark_result_at(now, "a.json", 429, None, Some(10)).await;

    let health = pool.health_snapshot_at(now).await;
    assert_eq!(health[0].cooldown_seconds, Some(300));
}

#[tokio::test]
async fn mark_result_for_unknown_name_is_a_noop() {
    let pool = RoundRobinAuthPool::new();
    pool.load(vec![record("a.json", "tok-a")]).await;
    pool.mark_result("missing.json", 401, None, None).await;
    assert!(pool.pick().await.is_some());
}

#[tokio::test]
async fn stats_tally_status_labels() {
    let now = 9000u64;
    let pool = RoundRobinAuthPool::new();
    pool.load(vec![
        record("a.json", "tok-a"),
        record("b.json", "tok-b"),
        record("c.json", "tok-c"),
    ])
    .await;

    pool.mark_result_at(now, "a.json", 401, None, None).await;
    pool.mark_result_at(now, "b.json", 429, None, None).await;

    let stats = pool.stats_at(now).await;
    assert_eq!(stats.total, 3);
    assert_eq!(stats.blacklist, 1);
    assert_eq!(stats.cooldown, 1);
    assert_eq!(stats.ok, 1);
    assert_eq!(stats.probation, 0);
}

#[tokio::test]
async fn empty_pool_picks_nothing() {
    let pool = RoundRobinAuthPool::new();
    assert!(pool.pick().await.is_none());
    assert_eq!(pool.count().await, 0);
    assert!(pool.auth_files().await.is_empty());
}
