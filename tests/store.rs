mod common;

use chrono::Utc;
use common::sales_workbook;
use excelviz::axes::{AxisSelection, ChartKind};
use excelviz::chart::ChartDataset;
use excelviz::error::VizError;
use excelviz::saving::{RECENT_UPLOADS, SavedAnalysis, Store};

fn analysis(id: &str, file_id: &str) -> SavedAnalysis {
    SavedAnalysis {
        id: id.to_string(),
        file_id: file_id.to_string(),
        file_name: "sales.xlsx".to_string(),
        title: "Sales".to_string(),
        selection: AxisSelection::new(Some("Month"), Some("Sales"), None, ChartKind::Bar).unwrap(),
        dataset: ChartDataset::Distribution {
            labels: vec!["a".into(), "b".into()],
            counts: vec![2, 1],
        },
        summary: Some("two a, one b".to_string()),
        created_at: Utc::now(),
    }
}

#[test]
fn upload_round_trip_and_listing() {
    let dir = tempfile::tempdir().unwrap();
    let store = Store::open(dir.path()).unwrap();
    let bytes = sales_workbook();

    let saved = store.save_upload("alice", "sales.xlsx", &bytes).unwrap();
    assert_eq!(saved.size, bytes.len() as u64);

    let (info, loaded) = store.load_upload("alice", &saved.id).unwrap();
    assert_eq!(info, saved);
    assert_eq!(loaded, bytes);

    assert_eq!(store.list_uploads("alice").unwrap(), vec![saved.clone()]);
    assert!(dir.path().join("alice").join("uploads.json").exists());
}

#[test]
fn uploads_are_private_to_their_owner() {
    let dir = tempfile::tempdir().unwrap();
    let store = Store::open(dir.path()).unwrap();
    let saved = store.save_upload("alice", "a.xlsx", b"bytes").unwrap();

    assert!(matches!(store.load_upload("bob", &saved.id), Err(VizError::NotFound(_))));
    assert!(store.list_uploads("bob").unwrap().is_empty());
    assert!(matches!(store.delete_upload("bob", &saved.id), Err(VizError::NotFound(_))));
}

#[test]
fn recent_uploads_are_newest_first_and_bounded() {
    let dir = tempfile::tempdir().unwrap();
    let store = Store::open(dir.path()).unwrap();
    let mut ids = Vec::new();
    for i in 0..7 {
        ids.push(store.save_upload("alice", &format!("f{}.xlsx", i), b"x").unwrap().id);
        std::thread::sleep(std::time::Duration::from_millis(5));
    }

    let recent = store.recent_uploads("alice").unwrap();
    assert_eq!(recent.len(), RECENT_UPLOADS);
    assert_eq!(recent[0].id, ids[6]);
    assert_eq!(recent[4].id, ids[2]);
}

#[test]
fn deleting_an_upload_keeps_its_analyses() {
    let dir = tempfile::tempdir().unwrap();
    let store = Store::open(dir.path()).unwrap();
    let upload = store.save_upload("alice", "a.xlsx", b"x").unwrap();
    let saved = analysis(&uuid::Uuid::new_v4().to_string(), &upload.id);
    store.save_analysis("alice", &saved).unwrap();

    store.delete_upload("alice", &upload.id).unwrap();
    assert!(matches!(store.load_upload("alice", &upload.id), Err(VizError::NotFound(_))));
    assert_eq!(store.load_analysis("alice", &saved.id).unwrap(), saved);
}

#[test]
fn analyses_round_trip_and_delete() {
    let dir = tempfile::tempdir().unwrap();
    let store = Store::open(dir.path()).unwrap();
    let first = analysis(&uuid::Uuid::new_v4().to_string(), "f1");
    std::thread::sleep(std::time::Duration::from_millis(5));
    let second = analysis(&uuid::Uuid::new_v4().to_string(), "f2");
    store.save_analysis("alice", &first).unwrap();
    store.save_analysis("alice", &second).unwrap();

    let history = store.list_analyses("alice").unwrap();
    assert_eq!(history, vec![second.clone(), first.clone()]);

    store.delete_analysis("alice", &first.id).unwrap();
    assert!(matches!(store.load_analysis("alice", &first.id), Err(VizError::NotFound(_))));
    assert!(matches!(store.delete_analysis("alice", &first.id), Err(VizError::NotFound(_))));
    assert_eq!(store.stats("alice").unwrap().charts_created, 1);
}

#[test]
fn malformed_ids_are_not_found() {
    let dir = tempfile::tempdir().unwrap();
    let store = Store::open(dir.path()).unwrap();
    assert!(matches!(store.load_analysis("alice", "../../etc/passwd"), Err(VizError::NotFound(_))));
    assert!(matches!(store.load_upload("alice", "nope"), Err(VizError::NotFound(_))));
    assert!(matches!(store.load_export("alice", "nope"), Err(VizError::NotFound(_))));
}

#[test]
fn invalid_user_ids_are_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let store = Store::open(dir.path()).unwrap();
    assert!(matches!(store.list_uploads("../alice"), Err(VizError::Unauthorized(_))));
}

#[test]
fn exports_and_stats() {
    let dir = tempfile::tempdir().unwrap();
    let store = Store::open(dir.path()).unwrap();
    store.save_upload("alice", "a.xlsx", b"x").unwrap();
    store.save_upload("alice", "b.xlsx", b"y").unwrap();

    let stored = store
        .save_export("alice", "Report", "Bar Chart", Some("f1"), b"%PDF-1.3 fake")
        .unwrap();
    let (info, bytes) = store.load_export("alice", &stored.id).unwrap();
    assert_eq!(info, stored);
    assert_eq!(bytes, b"%PDF-1.3 fake");
    assert_eq!(store.list_exports("alice").unwrap(), vec![stored]);

    let stats = store.stats("alice").unwrap();
    assert_eq!(stats.files_uploaded, 2);
    assert_eq!(stats.charts_created, 0);
}
