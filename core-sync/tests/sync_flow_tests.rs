//! Refresh, preview and push against an in-memory remote service.

mod common;

use std::sync::Arc;

use common::{coordinator, track, FakeMusicService, MemoryStore};
use core_library::{NamedTrack, PlaylistId, SortSpec};
use core_runtime::{CoreEvent, RegistryEvent, SyncEvent};
use core_sync::{CompositeUpdate, SyncCoordinator, SyncError};

fn ids(raw: &[&str]) -> Vec<PlaylistId> {
    raw.iter().map(|id| PlaylistId::new(*id)).collect()
}

async fn two_leaves() -> Arc<FakeMusicService> {
    let service = FakeMusicService::new();
    service
        .add_playlist("l1", "Leaf 1", vec![track("t:1", "Alpha"), track("t:2", "Bravo")], true)
        .await;
    service
        .add_playlist("l2", "Leaf 2", vec![track("t:3", "Charlie")], true)
        .await;
    service
}

/// p = [l1]; q = [p, l2]
async fn nested(service: &Arc<FakeMusicService>, coordinator: &SyncCoordinator) -> (PlaylistId, PlaylistId) {
    coordinator.refresh_from_remote().await.unwrap();
    let p = coordinator
        .create_composite("Inner", ids(&["l1"]), None, None)
        .await
        .unwrap();
    let q = coordinator
        .create_composite("Outer", vec![p.clone(), PlaylistId::new("l2")], None, None)
        .await
        .unwrap();
    assert_eq!(service.uris_of(q.as_str()).await, vec!["t:1", "t:2", "t:3"]);
    (p, q)
}

fn drain(events: &mut tokio::sync::broadcast::Receiver<CoreEvent>) -> Vec<CoreEvent> {
    let mut received = Vec::new();
    while let Ok(event) = events.try_recv() {
        received.push(event);
    }
    received
}

#[tokio::test]
async fn test_component_change_marks_composite_then_sync_pushes() {
    let service = two_leaves().await;
    let coordinator = coordinator(service.clone(), MemoryStore::new()).await;

    let report = coordinator.refresh_from_remote().await.unwrap();
    assert_eq!(report.inserted, ids(&["l1", "l2"]));

    let p = coordinator
        .create_composite("Mix", ids(&["l1", "l2"]), None, None)
        .await
        .unwrap();
    assert_eq!(service.uris_of(p.as_str()).await, vec!["t:1", "t:2", "t:3"]);

    let created = coordinator.playlist(p.as_str()).await.unwrap();
    assert!(!created.needs_sync);
    assert_eq!(service.snapshot_of(p.as_str()).await, Some(created.snapshot_id.clone()));

    // l1 gains a track in another client
    service
        .edit_tracks("l1", vec![track("t:1", "Alpha"), track("t:2", "Bravo"), track("t:4", "Delta")])
        .await;

    let report = coordinator.refresh_from_remote().await.unwrap();
    assert_eq!(report.changed, ids(&["l1"]));
    assert_eq!(report.newly_stale, vec![p.clone()]);

    let stale = coordinator.playlist(p.as_str()).await.unwrap();
    assert!(stale.needs_sync);
    assert_eq!(stale.snapshot_id, created.snapshot_id);

    let preview = coordinator.preview_sync(p.as_str()).await.unwrap();
    let added: Vec<_> = preview.iter().filter(|d| d.added).map(|d| d.uri.as_str()).collect();
    assert_eq!(added, vec!["t:4"]);
    assert!(preview.iter().all(|d| !d.removed && !d.reordered));

    let report = coordinator.sync_playlist(p.as_str()).await.unwrap();
    assert_eq!(report.pushed, vec![p.clone()]);

    let synced = coordinator.playlist(p.as_str()).await.unwrap();
    assert!(!synced.needs_sync);
    assert_eq!(service.snapshot_of(p.as_str()).await, Some(synced.snapshot_id.clone()));
    assert_eq!(
        synced.last_sync_tracks,
        vec![
            NamedTrack::new("Alpha", "t:1"),
            NamedTrack::new("Bravo", "t:2"),
            NamedTrack::new("Delta", "t:4"),
            NamedTrack::new("Charlie", "t:3"),
        ]
    );
    assert_eq!(service.uris_of(p.as_str()).await, vec!["t:1", "t:2", "t:4", "t:3"]);

    // Our own push does not make anything stale
    assert!(coordinator.refresh_from_remote().await.unwrap().is_noop());
}

#[tokio::test]
async fn test_push_is_batched() {
    let service = two_leaves().await;
    let coordinator = coordinator(service.clone(), MemoryStore::new()).await;
    coordinator.refresh_from_remote().await.unwrap();

    let p = coordinator
        .create_composite("Mix", ids(&["l1", "l2"]), None, None)
        .await
        .unwrap();

    let writes: Vec<usize> = service
        .writes()
        .await
        .into_iter()
        .filter(|(id, _)| id == p.as_str())
        .map(|(_, count)| count)
        .collect();
    assert_eq!(writes, vec![2, 1]);
}

#[tokio::test]
async fn test_nested_sync_pushes_components_first() {
    let service = two_leaves().await;
    let coordinator = coordinator(service.clone(), MemoryStore::new()).await;
    let (p, q) = nested(&service, &coordinator).await;
    let mut events = coordinator.event_bus().subscribe();

    service.edit_tracks("l1", vec![track("t:9", "Zulu")]).await;
    let report = coordinator.refresh_from_remote().await.unwrap();
    assert_eq!(report.newly_stale, vec![p.clone(), q.clone()]);

    let report = coordinator.sync_playlists(std::slice::from_ref(&q)).await.unwrap();
    assert_eq!(report.pushed, vec![p.clone(), q.clone()]);
    assert_eq!(service.uris_of(q.as_str()).await, vec!["t:9", "t:3"]);

    for id in [&p, &q] {
        assert!(!coordinator.playlist(id.as_str()).await.unwrap().needs_sync);
    }
    assert!(coordinator.refresh_from_remote().await.unwrap().is_noop());

    let received = drain(&mut events);
    assert!(matches!(
        received[0],
        CoreEvent::Registry(RegistryEvent::Merged { changed: 1, newly_stale: 2, .. })
    ));
    match &received[1] {
        CoreEvent::Sync(SyncEvent::Started { plan, .. }) => {
            assert_eq!(plan, &vec![p.to_string(), q.to_string()]);
        }
        other => panic!("expected Started, got {:?}", other),
    }
    let pushed: Vec<_> = received
        .iter()
        .filter_map(|event| match event {
            CoreEvent::Sync(SyncEvent::PlaylistPushed { playlist_id, .. }) => Some(playlist_id.clone()),
            _ => None,
        })
        .collect();
    assert_eq!(pushed, vec![p.to_string(), q.to_string()]);
    assert!(received
        .iter()
        .any(|event| matches!(event, CoreEvent::Sync(SyncEvent::Completed { pushed: 2, .. }))));
}

#[tokio::test]
async fn test_preview_of_nested_composite_matches_push() {
    let service = two_leaves().await;
    let coordinator = coordinator(service.clone(), MemoryStore::new()).await;
    let (p, q) = nested(&service, &coordinator).await;

    service
        .edit_tracks("l1", vec![track("t:1", "Alpha"), track("t:9", "Zulu"), track("t:2", "Bravo")])
        .await;
    coordinator.refresh_from_remote().await.unwrap();
    let writes_before = service.writes().await.len();

    let preview = coordinator.preview_sync(q.as_str()).await.unwrap();
    let added: Vec<_> = preview.iter().filter(|d| d.added).map(|d| d.uri.as_str()).collect();
    assert_eq!(added, vec!["t:9"]);
    assert!(preview.iter().all(|d| !d.removed));
    // Nothing was pushed, p still holds its old content remotely
    assert_eq!(service.writes().await.len(), writes_before);
    assert_eq!(service.uris_of(p.as_str()).await, vec!["t:1", "t:2"]);

    let previewed: Vec<String> = preview
        .iter()
        .filter(|d| !d.removed)
        .map(|d| d.uri.clone())
        .collect();
    coordinator.sync_playlist(q.as_str()).await.unwrap();
    assert_eq!(service.uris_of(q.as_str()).await, previewed);
}

#[tokio::test]
async fn test_push_during_refresh_keeps_pushed_snapshot() {
    let service = two_leaves().await;
    let coordinator = Arc::new(coordinator(service.clone(), MemoryStore::new()).await);
    coordinator.refresh_from_remote().await.unwrap();
    let p = coordinator
        .create_composite("Mix", ids(&["l1", "l2"]), None, None)
        .await
        .unwrap();

    service
        .edit_tracks("l1", vec![track("t:1", "Alpha"), track("t:2", "Bravo"), track("t:4", "Delta")])
        .await;
    coordinator.refresh_from_remote().await.unwrap();
    assert!(coordinator.playlist(p.as_str()).await.unwrap().needs_sync);

    // The listing is read before the push but delivered after it
    let (entered, release) = service.hold_listing().await;
    let refresh = {
        let coordinator = coordinator.clone();
        tokio::spawn(async move { coordinator.refresh_from_remote().await })
    };
    entered.notified().await;

    coordinator.sync_playlist(p.as_str()).await.unwrap();
    let pushed = coordinator.playlist(p.as_str()).await.unwrap().snapshot_id;
    release.notify_one();

    let report = refresh.await.unwrap().unwrap();
    assert!(!report.changed.contains(&p));
    assert!(report.newly_deleted.is_empty());

    let after = coordinator.playlist(p.as_str()).await.unwrap();
    assert_eq!(after.snapshot_id, pushed);
    assert!(!after.needs_sync);
    assert!(coordinator.refresh_from_remote().await.unwrap().is_noop());
}

#[tokio::test]
async fn test_sync_stops_at_first_failure() {
    let service = two_leaves().await;
    let coordinator = coordinator(service.clone(), MemoryStore::new()).await;
    let (p, q) = nested(&service, &coordinator).await;
    let before = coordinator.registry().await;

    service.edit_tracks("l1", vec![track("t:9", "Zulu")]).await;
    coordinator.refresh_from_remote().await.unwrap();
    service.fail_writes_to(p.as_str()).await;
    let mut events = coordinator.event_bus().subscribe();

    let err = coordinator.sync_playlists(std::slice::from_ref(&q)).await.unwrap_err();
    assert!(matches!(err, SyncError::RemoteRequestFailed(_)));

    // q was never attempted
    assert_eq!(service.uris_of(q.as_str()).await, vec!["t:1", "t:2", "t:3"]);
    for id in [&p, &q] {
        let playlist = coordinator.playlist(id.as_str()).await.unwrap();
        assert!(playlist.needs_sync);
        assert_eq!(playlist.last_sync_tracks, before.get(id.as_str()).unwrap().last_sync_tracks);
    }

    let received = drain(&mut events);
    assert!(received.iter().any(|event| matches!(
        event,
        CoreEvent::Sync(SyncEvent::Failed { playlist_id, pushed: 0, .. }) if playlist_id == p.as_str()
    )));
}

#[tokio::test]
async fn test_concurrent_sync_of_same_playlist_is_busy() {
    let service = two_leaves().await;
    let coordinator = Arc::new(coordinator(service.clone(), MemoryStore::new()).await);
    coordinator.refresh_from_remote().await.unwrap();
    let p = coordinator
        .create_composite("Mix", ids(&["l1"]), None, None)
        .await
        .unwrap();

    let (entered, release) = service.hold_writes().await;
    let background = {
        let coordinator = coordinator.clone();
        let p = p.clone();
        tokio::spawn(async move { coordinator.sync_playlist(p.as_str()).await })
    };
    entered.notified().await;

    match coordinator.sync_playlist(p.as_str()).await {
        Err(SyncError::Busy { playlist_id }) => assert_eq!(playlist_id, p.as_str()),
        other => panic!("expected Busy, got {:?}", other),
    }

    release.notify_one();
    background.await.unwrap().unwrap();
    assert!(coordinator.sync_playlist(p.as_str()).await.is_ok());
}

#[tokio::test]
async fn test_update_composite_resorts_and_rejects_cycles() {
    let service = two_leaves().await;
    let coordinator = coordinator(service.clone(), MemoryStore::new()).await;
    let (p, q) = nested(&service, &coordinator).await;

    coordinator
        .update_composite(
            q.as_str(),
            CompositeUpdate {
                sort_spec: Some("songName;d".parse::<SortSpec>().unwrap()),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(service.uris_of(q.as_str()).await, vec!["t:3", "t:2", "t:1"]);
    assert_eq!(coordinator.playlist(q.as_str()).await.unwrap().sort_spec.encode(), "songName;d");

    let snapshot_before = service.snapshot_of(p.as_str()).await;
    let err = coordinator
        .update_composite(
            p.as_str(),
            CompositeUpdate {
                components: Some(vec![q.clone()]),
                ..Default::default()
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        SyncError::Library(core_library::LibraryError::CycleDetected { .. })
    ));
    assert_eq!(service.snapshot_of(p.as_str()).await, snapshot_before);
    assert_eq!(coordinator.playlist(p.as_str()).await.unwrap().component_playlist_ids, ids(&["l1"]));
}

#[tokio::test]
async fn test_leaf_and_unknown_ids_are_rejected() {
    let service = two_leaves().await;
    let coordinator = coordinator(service, MemoryStore::new()).await;
    coordinator.refresh_from_remote().await.unwrap();

    assert!(matches!(
        coordinator.preview_sync("l1").await,
        Err(SyncError::NotComposite(_))
    ));
    assert!(matches!(
        coordinator.sync_playlist("nope").await,
        Err(SyncError::PlaylistNotFound(_))
    ));
    assert!(coordinator
        .create_composite("Empty", vec![], None, None)
        .await
        .is_err());
    assert!(coordinator
        .create_composite("Ghost", ids(&["ghost"]), None, None)
        .await
        .is_err());
}

#[tokio::test]
async fn test_refresh_if_needed_runs_once_per_session() {
    let service = two_leaves().await;
    let coordinator = coordinator(service, MemoryStore::new()).await;
    let session = core_sync::SyncSession::new();

    assert!(coordinator.refresh_if_needed(&session, false).await.unwrap().is_some());
    assert!(coordinator.refresh_if_needed(&session, false).await.unwrap().is_none());
    assert!(coordinator.refresh_if_needed(&session, true).await.unwrap().is_some());
}
