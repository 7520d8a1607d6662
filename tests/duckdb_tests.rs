//! DuckDB-backed import tests

#![cfg(feature = "duckdb-backend")]

use division_import_sdk::database::{DatabaseError, DivisionStore, DuckDBBackend};
use division_import_sdk::models::{BoundingBox, BoxRelation, DivisionRecord};
use division_import_sdk::import::DivisionImporter;
use serde_json::json;
use std::io::{Cursor, Write};
use tempfile::tempdir;
use uuid::Uuid;
use zip::write::FileOptions;

fn archive() -> Vec<u8> {
    let manifest = "id,parent,geodata,national_id,en,ar\n\
                    1,,country.geojson,C1,Country,بلد\n\
                    2,1,region.geojson,R2,Region,منطقة\n";
    let polygon = |size: f64| {
        json!({
            "type": "Polygon",
            "coordinates": [[[0.0, 0.0], [size, 0.0], [size, size], [0.0, size], [0.0, 0.0]]]
        })
        .to_string()
    };

    let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
    for (name, content) in [
        ("manifest.csv", manifest.to_string()),
        ("country.geojson", polygon(4.0)),
        ("region.geojson", polygon(2.0)),
    ] {
        writer.start_file(name, FileOptions::default()).unwrap();
        writer.write_all(content.as_bytes()).unwrap();
    }
    writer.finish().unwrap().into_inner()
}

#[tokio::test]
async fn test_import_into_duckdb() {
    let backend = DuckDBBackend::in_memory().unwrap();
    backend.initialize().await.unwrap();
    let importer = DivisionImporter::new(backend);
    let tenant = Uuid::new_v4();

    let report = importer.import_archive(&archive(), tenant).await.unwrap();
    assert_eq!(report.inserted, 2);
    assert_eq!(report.failed, 0);

    let region = importer
        .store()
        .find_by_import_id(tenant, "2")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(region.level, 2);
    assert_eq!(region.label(&["ar"]), Some("منطقة"));
    assert_eq!(region.bounding_box.unwrap().max_x, 2.0);

    let report = importer.import_archive(&archive(), tenant).await.unwrap();
    assert_eq!(report.updated, 2);
    assert_eq!(importer.store().count(tenant).await.unwrap(), 2);
}

#[tokio::test]
async fn test_reimport_after_reopen_keeps_ids() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("divisions.duckdb");
    let tenant = Uuid::new_v4();

    let first_id = {
        let backend = DuckDBBackend::new(&path).unwrap();
        backend.initialize().await.unwrap();
        let importer = DivisionImporter::new(backend);
        let report = importer.import_archive(&archive(), tenant).await.unwrap();
        assert_eq!(report.inserted, 2);
        importer
            .store()
            .find_by_import_id(tenant, "1")
            .await
            .unwrap()
            .unwrap()
            .id
    };

    let backend = DuckDBBackend::new(&path).unwrap();
    backend.initialize().await.unwrap();
    let importer = DivisionImporter::new(backend);
    let report = importer.import_archive(&archive(), tenant).await.unwrap();
    assert_eq!(report.inserted, 0);
    assert_eq!(report.updated, 2);

    let root = importer
        .store()
        .find_by_import_id(tenant, "1")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(root.id, first_id);
}

fn record(import_id: &str, parent_id: Option<Uuid>, level: i64) -> DivisionRecord {
    let point = json!({ "type": "Point", "coordinates": [0.5, 0.5] });
    DivisionRecord {
        import_id: import_id.to_string(),
        national_id: format!("N{}", import_id),
        parent_id,
        name: [("en".to_string(), format!("Division {}", import_id))]
            .into_iter()
            .collect(),
        geojson: point.clone(),
        geometry: point,
        bounding_box: BoundingBox::new(0.5, 0.5, 0.5, 0.5),
        level,
    }
}

#[tokio::test]
async fn test_moves_are_checked_and_relevelled() {
    let backend = DuckDBBackend::in_memory().unwrap();
    backend.initialize().await.unwrap();
    let importer = DivisionImporter::new(backend);
    let tenant = Uuid::new_v4();
    let report = importer.import_archive(&archive(), tenant).await.unwrap();
    assert_eq!(report.inserted, 2);

    let store = importer.store();
    let country = store.find_by_import_id(tenant, "1").await.unwrap().unwrap();
    let region = store.find_by_import_id(tenant, "2").await.unwrap().unwrap();

    // Root under its own child
    let mut moved = record("1", Some(region.id), 3);
    moved.national_id = "C1".to_string();
    let err = store.upsert_division(tenant, &moved).await.unwrap_err();
    assert!(matches!(err, DatabaseError::Conflict(_)));
    let unchanged = store.get_division(tenant, country.id).await.unwrap().unwrap();
    assert_eq!(unchanged.parent_id, None);

    // A new root above the country pushes the whole subtree down
    let top = store.upsert_division(tenant, &record("0", None, 1)).await.unwrap();
    let mut moved = record("1", Some(top.id), 2);
    moved.national_id = "C1".to_string();
    store.upsert_division(tenant, &moved).await.unwrap();

    let region = store.get_division(tenant, region.id).await.unwrap().unwrap();
    assert_eq!(region.level, 3);
    assert_eq!(store.by_level(tenant, 3).await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_bounding_box_query() {
    let backend = DuckDBBackend::in_memory().unwrap();
    backend.initialize().await.unwrap();
    let importer = DivisionImporter::new(backend);
    let tenant = Uuid::new_v4();
    let report = importer.import_archive(&archive(), tenant).await.unwrap();
    assert_eq!(report.failed, 0);

    let store = importer.store();
    let hits = store
        .in_bounding_box(tenant, &BoundingBox::new(3.0, 3.0, 10.0, 10.0), BoxRelation::Intersects)
        .await
        .unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].import_id.as_deref(), Some("1"));

    let small = BoundingBox::new(1.0, 1.0, 1.5, 1.5);
    let hits = store
        .in_bounding_box(tenant, &small, BoxRelation::Contains)
        .await
        .unwrap();
    assert_eq!(hits.len(), 2);

    let hits = store
        .in_bounding_box(tenant, &BoundingBox::new(-1.0, -1.0, 3.0, 3.0), BoxRelation::Within)
        .await
        .unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].import_id.as_deref(), Some("2"));

    assert!(
        store
            .in_bounding_box(Uuid::new_v4(), &small, BoxRelation::Intersects)
            .await
            .unwrap()
            .is_empty()
    );
    assert!(matches!(
        store
            .in_bounding_box(tenant, &BoundingBox::new(0.0, 0.0, 0.0, 1.0), BoxRelation::Within)
            .await,
        Err(DatabaseError::InvalidInput(_))
    ));
}
