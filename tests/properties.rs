//! Invariant/property tests (spec §8, P1-P7) against a tempdir-backed
//! `Store`, exercising the claim primitives and entity state machines
//! directly rather than through the full orchestrator.

mod common;

use common::test_store;
use rssbox::account::Account;
use rssbox::download::Download;
use rssbox::types::{AccountStatus, DownloadStatus};
use std::collections::HashSet;
use std::time::Duration;

/// P1 — no double-claim: `K` concurrent callers against `N` pending
/// Downloads yield exactly `min(K, N)` successful claims, each on a
/// distinct row.
#[tokio::test]
async fn p1_no_double_claim_under_concurrent_claimants() {
    let (store, _dir) = test_store().await;
    for i in 0..3 {
        Download::create(&store, &format!("d{i}"), &format!("magnet:?xt=urn:btih:{i:040}"))
            .await
            .unwrap();
    }

    let mut handles = Vec::new();
    for worker in 0..5 {
        let store = store.clone();
        handles.push(tokio::spawn(async move {
            store.claim_pending_download(&format!("worker-{worker}")).await.unwrap()
        }));
    }

    let mut claimed_ids = HashSet::new();
    let mut successes = 0;
    for handle in handles {
        if let Some(row) = handle.await.unwrap() {
            successes += 1;
            assert!(claimed_ids.insert(row.id), "the same Download was claimed twice");
        }
    }

    assert_eq!(successes, 3, "exactly min(K, N) claims should succeed");
}

/// P2 — Account/Download bijection: whenever an Account is DOWNLOADING,
/// LOCKED, or UPLOADING, its `download_id` names a Download in PROCESSING.
#[tokio::test]
async fn p2_downloading_account_references_a_processing_download() {
    let (store, _dir) = test_store().await;
    store.upsert_account("acc1", "pw", 0).await.unwrap();
    let id = Download::create(&store, "x", "magnet:?xt=urn:btih:1").await.unwrap();
    Account::mark_as_downloading(&store, "acc1", id, "HASH1").await.unwrap();

    assert_bijection_holds(&store).await;

    // Also holds while the account is LOCKED (being polled) or UPLOADING.
    Account::unlock(&store, "acc1", AccountStatus::Locked).await.unwrap();
    assert_bijection_holds(&store).await;

    rssbox::account::Account::mark_as_uploading(&store, "acc1", "worker-x").await.unwrap();
    // uploading doesn't change download_id; still paired with the same row.
    assert_bijection_holds(&store).await;
}

async fn assert_bijection_holds(store: &rssbox::store::Store) {
    for account in store.list_accounts().await.unwrap() {
        let status = AccountStatus::from_i32(account.status);
        if matches!(
            status,
            AccountStatus::Downloading | AccountStatus::Locked | AccountStatus::Uploading
        ) {
            let download_id = account
                .download_id
                .unwrap_or_else(|| panic!("account {} in {status:?} has no download_id", account.id));
            let download = store
                .get_download(download_id.into())
                .await
                .unwrap()
                .unwrap_or_else(|| panic!("account {}'s download {download_id} is missing", account.id));
            assert_eq!(
                DownloadStatus::from_i32(download.status),
                DownloadStatus::Processing,
                "account {} references a download not in PROCESSING",
                account.id
            );
        }
    }
}

/// P3 — retry monotonicity: a Download's `retries` counter never decreases,
/// whether burned by a hard failure or left untouched by a soft one.
#[tokio::test]
async fn p3_retries_never_decrease() {
    let (store, _dir) = test_store().await;
    let id = Download::create(&store, "x", "magnet:?xt=urn:btih:1").await.unwrap();

    let mut last = 0i64;
    let steps = [false, true, false, false, true];
    for soft in steps {
        Download::mark_as_failed(&store, id, soft, 10, Duration::from_secs(1)).await.unwrap();
        let download = Download::get(&store, id).await.unwrap().unwrap();
        assert!(download.retries >= last, "retries decreased: {} -> {}", last, download.retries);
        last = download.retries;
    }
    // two of the five steps were soft and should not have burned a retry.
    assert_eq!(last, 3);
}

/// P4 — reaper liveness: locks held by a worker with no (or a stale)
/// heartbeat are released within one reaper pass, returning both the
/// Account and the Download to a claimable state.
#[tokio::test]
async fn p4_reaper_releases_locks_held_by_a_dead_worker() {
    let (store, _dir) = test_store().await;
    store.upsert_account("acc1", "pw", 0).await.unwrap();
    let id = Download::create(&store, "x", "magnet:?xt=urn:btih:1").await.unwrap();

    store.claim_pending_download("ghost").await.unwrap();
    store.claim_free_account("ghost").await.unwrap();
    // "ghost" never calls upsert_heartbeat, so it's orphaned immediately.

    let reaper = rssbox::reaper::Reaper::new(store.clone(), Duration::from_secs(1), Duration::from_secs(0));
    reaper.sweep_once().await.unwrap();

    // Both rows are claimable again by a fresh worker.
    let claimed_download = store.claim_pending_download("worker-new").await.unwrap();
    assert!(claimed_download.is_some());
    assert_eq!(claimed_download.unwrap().id, id.into());

    let claimed_account = store.claim_free_account("worker-new").await.unwrap();
    assert_eq!(claimed_account.unwrap().id, "acc1");
}

/// P5 — download deadline: once `added_at + download_timeout` has elapsed,
/// the next check marks the Download TIMEOUT — never before.
#[tokio::test]
async fn p5_download_deadline_fires_only_after_elapsing() {
    let (store, _dir) = test_store().await;
    let id = Download::create(&store, "x", "magnet:?xt=urn:btih:1").await.unwrap();

    let not_yet = Account::download_timeout(
        &store,
        chrono::Utc::now().timestamp(),
        id,
        Duration::from_secs(3600),
        Duration::from_secs(7 * 86400),
    )
    .await
    .unwrap();
    assert!(!not_yet);
    assert_eq!(Download::get(&store, id).await.unwrap().unwrap().status, DownloadStatus::Pending);

    let stale_added_at = chrono::Utc::now().timestamp() - 7200;
    let fired = Account::download_timeout(
        &store,
        stale_added_at,
        id,
        Duration::from_secs(3600),
        Duration::from_secs(7 * 86400),
    )
    .await
    .unwrap();
    assert!(fired);
    assert_eq!(Download::get(&store, id).await.unwrap().unwrap().status, DownloadStatus::Timeout);
}

/// P6 — every terminal Download carries an `expire_at` in the future.
#[tokio::test]
async fn p6_every_terminal_status_carries_a_future_ttl() {
    let (store, _dir) = test_store().await;
    let now = chrono::Utc::now().timestamp();
    let ttl = Duration::from_secs(7 * 86400);

    let error_id = Download::create(&store, "err", "magnet:?xt=urn:btih:1").await.unwrap();
    Download::mark_as_failed(&store, error_id, false, 0, ttl).await.unwrap();

    let timeout_id = Download::create(&store, "timeout", "magnet:?xt=urn:btih:2").await.unwrap();
    Download::mark_as_timeout(&store, timeout_id, ttl).await.unwrap();

    let too_large_id = Download::create(&store, "big", "magnet:?xt=urn:btih:3").await.unwrap();
    Download::mark_as_too_large(&store, too_large_id, ttl).await.unwrap();

    let invalid_id = Download::create(&store, "bad", "magnet:?xt=urn:btih:4").await.unwrap();
    Download::mark_as_invalid_torrent(&store, invalid_id, ttl).await.unwrap();

    for id in [error_id, timeout_id, too_large_id, invalid_id] {
        let download = Download::get(&store, id).await.unwrap().unwrap();
        assert!(download.status.is_terminal());
        assert!(download.expire_at.unwrap() > now, "expire_at must be in the future");
    }
}

/// P7 — idempotent ingest: re-inserting an already-known `url` returns the
/// existing id rather than creating a duplicate row.
#[tokio::test]
async fn p7_duplicate_url_is_absorbed_into_the_existing_row() {
    let (store, _dir) = test_store().await;
    let first = Download::create(&store, "first-name", "magnet:?xt=urn:btih:DUPLICATE").await.unwrap();
    let second = Download::create(&store, "second-name", "magnet:?xt=urn:btih:DUPLICATE").await.unwrap();

    assert_eq!(first, second);
    assert_eq!(store.list_downloads().await.unwrap().len(), 1);
}
