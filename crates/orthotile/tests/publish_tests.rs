//! Publishing against a local-directory destination and overlay uploads
//! through the service.

mod common;

use std::path::Path;
use std::sync::Arc;

use tempfile::TempDir;

use common::TestHarness;
use orthotile::config::StorageConfig;
use orthotile::publish::{
    create_remote_store, NoopObserver, Publisher, RemoteLayout, RemoteStoreError,
};
use orthotile::{ServiceError, ValidationError};

fn write(root: &Path, relative: &str, bytes: &[u8]) {
    let path = root.join(relative);
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(path, bytes).unwrap();
}

fn layout() -> RemoteLayout {
    RemoteLayout {
        prefix: "tiles".to_string(),
        cdn_domain: "tiles.example.com".to_string(),
        origin_includes_prefix: true,
    }
}

#[tokio::test]
async fn test_replace_into_local_directory() {
    let tmp = TempDir::new().unwrap();
    let dest = tmp.path().join("published");
    let tiles = tmp.path().join("tiles");

    let storage = StorageConfig {
        local_path: Some(dest.to_string_lossy().into_owned()),
        ..StorageConfig::default()
    };
    let store = create_remote_store(&storage).unwrap();
    assert!(dest.is_dir());

    write(&dest, "tiles/gruyere/13/1/1.png", b"stale");
    write(&dest, "tiles/koth/14/1/1.png", b"other site");
    write(&tiles, "14/14650/9750.png", b"new");
    write(&tiles, "15/29300/19500.png", b"new");

    let publisher = Publisher::new(Arc::clone(&store), layout(), 2);
    let report = publisher
        .replace(&tiles, "tiles/gruyere", &NoopObserver)
        .await
        .unwrap();

    assert_eq!(report.deleted_count, 1);
    assert_eq!(report.uploaded_count, 2);
    assert_eq!(report.total_file_count, 2);
    assert_eq!(report.upload_eta_seconds, 0);

    assert!(!dest.join("tiles/gruyere/13/1/1.png").exists());
    assert_eq!(
        std::fs::read(dest.join("tiles/gruyere/14/14650/9750.png")).unwrap(),
        b"new"
    );
    assert!(dest.join("tiles/koth/14/1/1.png").exists());
}

#[tokio::test]
async fn test_unreadable_tiles_dir_leaves_destination_untouched() {
    let tmp = TempDir::new().unwrap();
    let dest = tmp.path().join("published");
    let storage = StorageConfig {
        local_path: Some(dest.to_string_lossy().into_owned()),
        ..StorageConfig::default()
    };
    let store = create_remote_store(&storage).unwrap();
    write(&dest, "tiles/gruyere/13/1/1.png", b"keep");

    let publisher = Publisher::new(store, layout(), 2);
    let err = publisher
        .replace(&tmp.path().join("missing"), "tiles/gruyere", &NoopObserver)
        .await
        .unwrap_err();

    assert_eq!(err.deleted(), 0);
    assert!(dest.join("tiles/gruyere/13/1/1.png").exists());
}

#[test]
fn test_missing_destination_is_rejected() {
    let err = create_remote_store(&StorageConfig::default())
        .err()
        .expect("no bucket and no local path");
    assert!(matches!(err, RemoteStoreError::NotConfigured));
}

#[tokio::test]
async fn test_overlay_published_through_service() {
    let harness = TestHarness::new();

    let url = harness
        .service
        .publish_overlay("koth", "nfz-daily", "NFZ 2026-10-18.KML", b"<kml/>".to_vec())
        .await
        .unwrap();

    assert_eq!(url, "https://tiles.example.com/koth/nfz-daily.kml");
    assert_eq!(
        harness.remote_keys("tiles/koth").await,
        vec!["tiles/koth/nfz-daily.kml"]
    );
}

#[tokio::test]
async fn test_overlay_rejections() {
    let harness = TestHarness::new();

    let err = harness
        .service
        .publish_overlay("koth", "roads", "roads.kml", Vec::new())
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        ServiceError::Validation(ValidationError::UnknownOverlayCategory { .. })
    ));

    let err = harness
        .service
        .publish_overlay("koth", "boundaries", "boundaries.kmz", Vec::new())
        .await
        .unwrap_err();
    assert_eq!(err.to_string(), "File 'boundaries.kmz' must be a KML (.kml)");

    let err = harness
        .service
        .publish_overlay("nowhere", "boundaries", "b.kml", Vec::new())
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        ServiceError::Validation(ValidationError::UnknownSite { .. })
    ));

    assert!(harness.remote_keys("tiles").await.is_empty());
    assert_eq!(harness.service.sites().len(), 9);
    assert_eq!(harness.service.overlay_categories().len(), 4);
}
