use pretty_assertions::assert_eq;
use serde_json::json;
use std::fs;
use std::sync::Arc;
use tempfile::TempDir;
use warden_bus::events;
use warden_dashboard::{AppContext, DashboardConfig, DashboardError, PersistError, SnapshotStore};
use warden_state::{middleware_fn, SetOptions, StateChange, SubscribeOptions, WriteOutcome};
use warden_test_utils::{recording_listener, recording_subscriber, Recorder};

fn persisted_config(dir: &TempDir) -> DashboardConfig {
    DashboardConfig::new()
        .with_persistence(true)
        .with_persist_path(dir.path().join("state.json"))
}

#[test]
fn test_reset_restores_active_section() {
    let ctx = AppContext::bootstrap(&DashboardConfig::default()).unwrap();
    ctx.store().set("ui.activeSection", json!("appeals")).unwrap();
    ctx.store().set("ui.loading", json!(true)).unwrap();

    ctx.reset().unwrap();

    assert_eq!(ctx.store().get_state("ui.activeSection"), Some(json!("overview")));
    assert_eq!(ctx.store().get_state("ui.loading"), Some(json!(false)));
}

#[test]
fn test_loading_flag_from_default_tree() {
    let ctx = AppContext::bootstrap(&DashboardConfig::default()).unwrap();
    let (calls, cb) = recording_subscriber();
    ctx.store()
        .subscribe("ui.loading", cb, SubscribeOptions::new())
        .unwrap()
        .detach();

    ctx.store().set("ui.loading", json!(true)).unwrap();

    let calls = calls.calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].value, Some(json!(true)));
    assert_eq!(calls[0].old_value, Some(json!(false)));
    assert_eq!(calls[0].path.to_string(), "ui.loading");
}

#[test]
fn test_store_changes_reach_context_bus() {
    let ctx = AppContext::bootstrap(&DashboardConfig::default()).unwrap();
    let (seen, l) = recording_listener();
    ctx.bus().on(events::STATE_CHANGED, l);

    ctx.store().set("currentGuildId", json!("g1")).unwrap();

    assert_eq!(
        seen.calls(),
        vec![json!({ "path": "currentGuildId", "value": "g1", "oldValue": null })]
    );
}

#[test]
fn test_navigate_sets_section_and_emits() {
    let ctx = AppContext::bootstrap(&DashboardConfig::default()).unwrap();
    let (seen, l) = recording_listener();
    ctx.bus().on(events::NAVIGATE, l);

    ctx.navigate("settings").unwrap();

    assert_eq!(ctx.store().get_state("ui.activeSection"), Some(json!("settings")));
    assert_eq!(
        seen.calls(),
        vec![json!({ "section": "settings", "from": "overview" })]
    );
}

#[test]
fn test_navigate_during_dispatch_is_queued_without_event() {
    let ctx = Arc::new(AppContext::bootstrap(&DashboardConfig::default()).unwrap());
    let (seen, l) = recording_listener();
    ctx.bus().on(events::NAVIGATE, l);
    let outcomes = Recorder::new();
    let log = outcomes.clone();
    let inner = Arc::downgrade(&ctx);
    ctx.store()
        .subscribe(
            "currentGuildId",
            move |_: &StateChange| {
                if let Some(ctx) = inner.upgrade() {
                    log.record(ctx.navigate("appeals")?);
                }
                Ok(())
            },
            SubscribeOptions::new(),
        )
        .unwrap()
        .detach();

    ctx.store().set("currentGuildId", json!("g1")).unwrap();

    assert_eq!(outcomes.calls(), vec![WriteOutcome::Queued]);
    assert_eq!(ctx.store().get_state("ui.activeSection"), Some(json!("appeals")));
    assert!(seen.is_empty());
}

#[test]
fn test_vetoed_navigate_emits_nothing() {
    let ctx = AppContext::bootstrap(&DashboardConfig::default()).unwrap();
    let (seen, l) = recording_listener();
    ctx.bus().on(events::NAVIGATE, l);
    ctx.store().add_middleware(middleware_fn(|_, _| Ok(None)));

    assert_eq!(ctx.navigate("settings").unwrap(), WriteOutcome::Vetoed);
    assert_eq!(ctx.store().get_state("ui.activeSection"), Some(json!("overview")));
    assert!(seen.is_empty());
}

#[test]
fn test_autosave_round_trip() {
    let dir = TempDir::new().unwrap();
    let config = persisted_config(&dir);

    {
        let ctx = AppContext::bootstrap(&config).unwrap();
        assert!(ctx.is_persisting());
        ctx.store().set("ui.theme", json!("light")).unwrap();
        ctx.store()
            .set_state(
                "filters.actions",
                json!({ "type": "ban" }),
                SetOptions::new().merge(),
            )
            .unwrap();
        ctx.store().set("ui.loading", json!(true)).unwrap();
    }

    let ctx = AppContext::bootstrap(&config).unwrap();
    assert_eq!(ctx.store().get_state("ui.theme"), Some(json!("light")));
    assert_eq!(
        ctx.store().get_state("filters.actions"),
        Some(json!({ "type": "ban", "moderator": "all", "dateRange": "7d" }))
    );
    assert_eq!(ctx.store().get_state("ui.loading"), Some(json!(false)));
}

#[test]
fn test_unrelated_writes_do_not_touch_snapshot() {
    let dir = TempDir::new().unwrap();
    let config = persisted_config(&dir);
    let ctx = AppContext::bootstrap(&config).unwrap();

    ctx.store().set("ui.loading", json!(true)).unwrap();

    assert!(!config.persist.path.exists());
}

#[test]
fn test_disable_persistence_stops_autosave() {
    let dir = TempDir::new().unwrap();
    let config = persisted_config(&dir);
    let ctx = AppContext::bootstrap(&config).unwrap();

    assert!(ctx.disable_persistence());
    assert!(!ctx.disable_persistence());
    ctx.store().set("ui.theme", json!("light")).unwrap();

    assert!(!config.persist.path.exists());
    assert_eq!(ctx.bus().listener_count(events::STATE_CHANGED), 0);
}

#[test]
fn test_reset_saves_defaults_when_persisting() {
    let dir = TempDir::new().unwrap();
    let config = persisted_config(&dir);
    let ctx = AppContext::bootstrap(&config).unwrap();
    ctx.store().set("ui.theme", json!("light")).unwrap();

    ctx.reset().unwrap();

    let reloaded = AppContext::bootstrap(&config).unwrap();
    assert_eq!(reloaded.store().get_state("ui.theme"), Some(json!("dark")));
}

#[test]
fn test_corrupt_snapshot_fails_bootstrap() {
    let dir = TempDir::new().unwrap();
    let config = persisted_config(&dir);
    fs::write(&config.persist.path, "{ not json").unwrap();

    let err = AppContext::bootstrap(&config).unwrap_err();

    assert!(matches!(
        err,
        DashboardError::Persist(PersistError::Corrupt { .. })
    ));
}

#[test]
fn test_snapshot_ignores_keys_no_longer_persisted() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("state.json");
    fs::write(
        &path,
        r#"{
  "version": 1,
  "savedAt": "2024-01-01T00:00:00Z",
  "entries": { "ui.theme": "light", "ui.loading": true }
}"#,
    )
    .unwrap();

    let ctx = AppContext::bootstrap(&DashboardConfig::default()).unwrap();
    let snapshots = SnapshotStore::new(&path, ["ui.theme"]).unwrap();
    let restored = snapshots.restore(ctx.store()).unwrap();

    assert_eq!(restored, 1);
    assert_eq!(ctx.store().get_state("ui.theme"), Some(json!("light")));
    assert_eq!(ctx.store().get_state("ui.loading"), Some(json!(false)));
}

#[test]
fn test_restore_is_silent() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("state.json");
    let ctx = AppContext::bootstrap(&DashboardConfig::default()).unwrap();
    let snapshots = SnapshotStore::new(&path, ["ui.theme"]).unwrap();
    ctx.store().set("ui.theme", json!("light")).unwrap();
    snapshots.save(ctx.store()).unwrap();
    ctx.reset().unwrap();

    let (calls, cb) = recording_subscriber();
    ctx.store()
        .subscribe("ui.theme", cb, SubscribeOptions::new())
        .unwrap()
        .detach();
    snapshots.restore(ctx.store()).unwrap();

    assert!(calls.is_empty());
    assert_eq!(ctx.store().get_state("ui.theme"), Some(json!("light")));
}

#[test]
fn test_missing_snapshot_restores_nothing_and_clear_is_idempotent() {
    let dir = TempDir::new().unwrap();
    let snapshots = SnapshotStore::new(dir.path().join("absent.json"), ["ui.theme"]).unwrap();
    let ctx = AppContext::bootstrap(&DashboardConfig::default()).unwrap();

    assert_eq!(snapshots.load().unwrap(), None);
    assert_eq!(snapshots.restore(ctx.store()).unwrap(), 0);
    snapshots.clear().unwrap();
    snapshots.save(ctx.store()).unwrap();
    assert!(snapshots.path().exists());
    snapshots.clear().unwrap();
    assert!(!snapshots.path().exists());
}
