//! Archive import tests

use division_import_sdk::database::{DivisionStore, InMemoryBackend};
use division_import_sdk::import::{
    DivisionImporter, ImportError, ImportOptions, ImportResponse, UnresolvedPolicy,
};
use serde_json::{Value, json};
use std::io::{Cursor, Write};
use uuid::Uuid;
use zip::write::FileOptions;

const HEADER: &str = "id,parent,geodata,national_id,en,fr";

fn square(x: f64, y: f64, size: f64) -> Value {
    json!({
        "type": "Polygon",
        "coordinates": [[
            [x, y], [x + size, y], [x + size, y + size], [x, y + size], [x, y]
        ]]
    })
}

fn feature(geometry: Value) -> Value {
    json!({ "type": "Feature", "properties": {}, "geometry": geometry })
}

fn zip_archive(files: &[(&str, String)]) -> Vec<u8> {
    let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
    for (name, content) in files {
        writer.start_file(*name, FileOptions::default()).unwrap();
        writer.write_all(content.as_bytes()).unwrap();
    }
    writer.finish().unwrap().into_inner()
}

/// Country `1` with regions `2` and `3`, and district `4` under region `2`
fn country_archive() -> Vec<u8> {
    let manifest = [
        HEADER,
        "1,,country.geojson,C1,Country,Pays",
        "4,2,district.geojson,D4,District,District",
        "2,1,north.geojson,R2,North,Nord",
        "3,1,south.geojson,R3,South,Sud",
    ]
    .join("\n");

    zip_archive(&[
        ("index.csv", manifest),
        ("geo/country.geojson", feature(square(0.0, 0.0, 10.0)).to_string()),
        ("geo/north.geojson", square(0.0, 5.0, 5.0).to_string()),
        ("geo/south.geojson", square(0.0, 0.0, 5.0).to_string()),
        ("geo/district.geojson", square(1.0, 6.0, 1.0).to_string()),
    ])
}

mod import_run_tests {
    use super::*;

    #[tokio::test]
    async fn test_import_country_hierarchy() {
        let importer = DivisionImporter::new(InMemoryBackend::new());
        let tenant = Uuid::new_v4();

        let report = importer
            .import_archive(&country_archive(), tenant)
            .await
            .unwrap();

        assert_eq!(report.total_processed, 4);
        assert_eq!(report.imported, 4);
        assert_eq!(report.failed, 0);
        assert_eq!(report.inserted, 4);
        assert_eq!(report.levels, 3);
        assert_eq!(report.archive_sha256.len(), 64);

        let store = importer.store();
        let district = store.find_by_import_id(tenant, "4").await.unwrap().unwrap();
        assert_eq!(district.level, 3);
        assert_eq!(district.label(&["fr"]), Some("District"));
        assert_eq!(district.national_id.as_deref(), Some("D4"));

        let path: Vec<String> = store
            .breadcrumb(tenant, district.id)
            .await
            .unwrap()
            .into_iter()
            .filter_map(|d| d.import_id)
            .collect();
        assert_eq!(path, vec!["1", "2", "4"]);
    }

    #[tokio::test]
    async fn test_reimport_is_idempotent() {
        let importer = DivisionImporter::new(InMemoryBackend::new());
        let tenant = Uuid::new_v4();
        let archive = country_archive();

        let report = importer.import_archive(&archive, tenant).await.unwrap();
        assert_eq!(report.inserted, 4);
        let first = importer.store().find_by_import_id(tenant, "2").await.unwrap().unwrap();

        let report = importer.import_archive(&archive, tenant).await.unwrap();
        assert_eq!(report.imported, 4);
        assert_eq!(report.inserted, 0);
        assert_eq!(report.updated, 4);

        let second = importer.store().find_by_import_id(tenant, "2").await.unwrap().unwrap();
        assert_eq!(second.id, first.id);
        assert_eq!(second.parent_id, first.parent_id);
        assert_eq!(second.level, first.level);
        assert_eq!(second.created_at, first.created_at);
        assert_eq!(importer.store().count(tenant).await.unwrap(), 4);
    }

    #[tokio::test]
    async fn test_levels_follow_parents() {
        let importer = DivisionImporter::new(InMemoryBackend::new());
        let tenant = Uuid::new_v4();
        let report = importer
            .import_archive(&country_archive(), tenant)
            .await
            .unwrap();
        assert_eq!(report.failed, 0);

        let store = importer.store();
        for import_id in ["1", "2", "3", "4"] {
            let node = store.find_by_import_id(tenant, import_id).await.unwrap().unwrap();
            match node.parent_id {
                None => assert_eq!(node.level, 1),
                Some(parent_id) => {
                    let parent = store.get_division(tenant, parent_id).await.unwrap().unwrap();
                    assert_eq!(node.level, parent.level + 1);
                }
            }
        }
    }

    #[tokio::test]
    async fn test_parents_commit_before_children() {
        let importer = DivisionImporter::new(InMemoryBackend::new());
        let tenant = Uuid::new_v4();
        let report = importer
            .import_archive(&country_archive(), tenant)
            .await
            .unwrap();
        assert_eq!(report.levels, 3);

        let log = importer.store().commit_log(tenant);
        let position = |id: &str| log.iter().position(|c| c == id).unwrap();
        assert!(position("1") < position("2"));
        assert!(position("1") < position("3"));
        assert!(position("2") < position("4"));
        assert_eq!(log.len(), 4);
    }

    #[tokio::test]
    async fn test_feature_collection_uses_first_geometry() {
        let collection = json!({
            "type": "FeatureCollection",
            "features": [feature(square(2.0, 2.0, 1.0)), feature(square(50.0, 50.0, 1.0))]
        });
        let archive = zip_archive(&[
            ("index.csv", format!("{}\n1,,a.geojson,C1,A,A", HEADER)),
            ("a.geojson", collection.to_string()),
        ]);
        let importer = DivisionImporter::new(InMemoryBackend::new());
        let tenant = Uuid::new_v4();

        let report = importer.import_archive(&archive, tenant).await.unwrap();
        assert_eq!(report.imported, 1);

        let node = importer.store().find_by_import_id(tenant, "1").await.unwrap().unwrap();
        let bbox = node.bounding_box.unwrap();
        assert_eq!((bbox.min_x, bbox.min_y, bbox.max_x, bbox.max_y), (2.0, 2.0, 3.0, 3.0));
        assert_eq!(node.geojson, Some(collection));
    }

    #[tokio::test]
    async fn test_row_failure_does_not_abort_run() {
        let manifest = [
            HEADER,
            "1,,country.geojson,C1,Country,Pays",
            "2,1,missing.geojson,R2,North,Nord",
            "3,1,south.geojson,R3,South,Sud",
            "4,2,district.geojson,D4,District,District",
        ]
        .join("\n");
        let archive = zip_archive(&[
            ("index.csv", manifest),
            ("country.geojson", square(0.0, 0.0, 10.0).to_string()),
            ("south.geojson", square(0.0, 0.0, 5.0).to_string()),
            ("district.geojson", square(1.0, 6.0, 1.0).to_string()),
        ]);
        let importer = DivisionImporter::new(InMemoryBackend::new());
        let tenant = Uuid::new_v4();

        let report = importer.import_archive(&archive, tenant).await.unwrap();
        assert_eq!(report.total_processed, 4);
        assert_eq!(report.imported, 2);
        assert_eq!(report.failed, 2);
        assert_eq!(
            report.failed_details.get("2").map(String::as_str),
            Some("GeoJSON file not found: missing.geojson")
        );
        assert!(report.failed_details["4"].contains("'2'"));
        assert_eq!(importer.store().count(tenant).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_tenants_are_isolated() {
        let importer = DivisionImporter::new(InMemoryBackend::new());
        let tenant_a = Uuid::new_v4();
        let tenant_b = Uuid::new_v4();
        let archive = country_archive();

        let first = importer.import_archive(&archive, tenant_a).await.unwrap();
        assert_eq!(first.inserted, 4);
        let report = importer.import_archive(&archive, tenant_b).await.unwrap();
        assert_eq!(report.inserted, 4);

        let store = importer.store();
        let a = store.find_by_import_id(tenant_a, "1").await.unwrap().unwrap();
        let b = store.find_by_import_id(tenant_b, "1").await.unwrap().unwrap();
        assert_ne!(a.id, b.id);
        assert!(store.get_division(tenant_b, a.id).await.unwrap().is_none());

        assert_eq!(store.delete_all(tenant_a).await.unwrap(), 4);
        assert_eq!(store.count(tenant_b).await.unwrap(), 4);
    }

    #[tokio::test]
    async fn test_child_only_archive_anchors_to_stored_parent() {
        let importer = DivisionImporter::new(InMemoryBackend::new());
        let tenant = Uuid::new_v4();
        let first = importer
            .import_archive(&country_archive(), tenant)
            .await
            .unwrap();
        assert_eq!(first.imported, 4);

        let archive = zip_archive(&[
            ("index.csv", format!("{}\n5,4,village.geojson,V5,Village,Village", HEADER)),
            ("village.geojson", square(1.2, 6.2, 0.1).to_string()),
        ]);
        let report = importer.import_archive(&archive, tenant).await.unwrap();
        assert_eq!(report.inserted, 1);

        let village = importer.store().find_by_import_id(tenant, "5").await.unwrap().unwrap();
        assert_eq!(village.level, 4);
    }
}

mod reparent_tests {
    use super::*;

    async fn imported_country() -> (DivisionImporter<InMemoryBackend>, Uuid) {
        let importer = DivisionImporter::new(InMemoryBackend::new());
        let tenant = Uuid::new_v4();
        let report = importer
            .import_archive(&country_archive(), tenant)
            .await
            .unwrap();
        assert_eq!(report.imported, 4);
        (importer, tenant)
    }

    #[tokio::test]
    async fn test_moving_root_under_its_child_is_rejected() {
        let (importer, tenant) = imported_country().await;
        let archive = zip_archive(&[
            ("index.csv", format!("{}\n1,2,country.geojson,C1,Country,Pays", HEADER)),
            ("country.geojson", square(0.0, 0.0, 10.0).to_string()),
        ]);

        let report = importer.import_archive(&archive, tenant).await.unwrap();
        assert_eq!(report.imported, 0);
        assert_eq!(report.failed, 1);
        assert!(report.failed_details["1"].contains("cycle"));

        let store = importer.store();
        let country = store.find_by_import_id(tenant, "1").await.unwrap().unwrap();
        let region = store.find_by_import_id(tenant, "2").await.unwrap().unwrap();
        assert_eq!(country.parent_id, None);
        assert_eq!(country.level, 1);
        assert_eq!(region.parent_id, Some(country.id));
    }

    #[tokio::test]
    async fn test_moving_division_relevels_stored_descendants() {
        let (importer, tenant) = imported_country().await;
        let archive = zip_archive(&[
            ("index.csv", format!("{}\n2,3,north.geojson,R2,North,Nord", HEADER)),
            ("north.geojson", square(0.0, 5.0, 5.0).to_string()),
        ]);

        let report = importer.import_archive(&archive, tenant).await.unwrap();
        assert_eq!(report.updated, 1);

        let store = importer.store();
        let south = store.find_by_import_id(tenant, "3").await.unwrap().unwrap();
        let north = store.find_by_import_id(tenant, "2").await.unwrap().unwrap();
        let district = store.find_by_import_id(tenant, "4").await.unwrap().unwrap();
        assert_eq!(north.parent_id, Some(south.id));
        assert_eq!(north.level, 3);
        assert_eq!(district.level, 4);

        let path: Vec<String> = store
            .breadcrumb(tenant, district.id)
            .await
            .unwrap()
            .into_iter()
            .filter_map(|d| d.import_id)
            .collect();
        assert_eq!(path, vec!["1", "3", "2", "4"]);
    }
}

mod batch_rejection_tests {
    use super::*;

    #[tokio::test]
    async fn test_orphan_rejects_batch_without_writes() {
        let manifest = [
            HEADER,
            "1,,a.geojson,C1,A,A",
            "2,99,a.geojson,R2,B,B",
        ]
        .join("\n");
        let archive = zip_archive(&[
            ("index.csv", manifest),
            ("a.geojson", square(0.0, 0.0, 1.0).to_string()),
        ]);
        let importer = DivisionImporter::new(InMemoryBackend::new());
        let tenant = Uuid::new_v4();

        let err = importer.import_archive(&archive, tenant).await.unwrap_err();
        match err {
            ImportError::OrphanedParents { count, examples } => {
                assert_eq!(count, 1);
                assert!(examples[0].contains("99"));
            }
            other => panic!("unexpected error: {}", other),
        }
        assert_eq!(importer.store().count(tenant).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_missing_english_column_rejects_batch() {
        let archive = zip_archive(&[
            ("index.csv", "id,parent,geodata,national_id,fr\n1,,a.geojson,C1,A".to_string()),
            ("a.geojson", square(0.0, 0.0, 1.0).to_string()),
        ]);
        let importer = DivisionImporter::new(InMemoryBackend::new());
        let tenant = Uuid::new_v4();

        let err = importer.import_archive(&archive, tenant).await.unwrap_err();
        assert!(matches!(err, ImportError::MissingLanguageColumn));
        assert_eq!(importer.store().count(tenant).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_archive_without_manifest() {
        let archive = zip_archive(&[("a.geojson", square(0.0, 0.0, 1.0).to_string())]);
        let importer = DivisionImporter::new(InMemoryBackend::new());

        let err = importer
            .import_archive(&archive, Uuid::new_v4())
            .await
            .unwrap_err();
        assert!(matches!(err, ImportError::MissingManifest(_)));
    }

    #[tokio::test]
    async fn test_no_roots() {
        let manifest = [HEADER, "1,2,a.geojson,A1,A,A", "2,1,a.geojson,A2,B,B"].join("\n");
        let archive = zip_archive(&[
            ("index.csv", manifest),
            ("a.geojson", square(0.0, 0.0, 1.0).to_string()),
        ]);
        let importer = DivisionImporter::new(InMemoryBackend::new());

        let result = importer.import_archive(&archive, Uuid::new_v4()).await;
        let response = serde_json::to_value(ImportResponse::from(result)).unwrap();
        assert_eq!(
            response,
            json!({
                "success": false,
                "error": "No root divisions found (rows with an empty parent)"
            })
        );
    }

    #[tokio::test]
    async fn test_oversized_archive() {
        let options = ImportOptions::default().with_max_archive_bytes(16);
        let importer = DivisionImporter::with_options(InMemoryBackend::new(), options);

        let err = importer
            .import_archive(&country_archive(), Uuid::new_v4())
            .await
            .unwrap_err();
        assert!(matches!(err, ImportError::ArchiveTooLarge { limit: 16, .. }));
    }

    #[tokio::test]
    async fn test_highly_compressed_archive_hits_unpacked_limit() {
        let manifest = format!("{}\n1,,country.geojson,C1,Country,Pays", HEADER);
        // Valid JSON padded with whitespace that deflates to almost nothing
        let padded = format!("{}{}", square(0.0, 0.0, 10.0), " ".repeat(4 * 1024 * 1024));

        let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
        let options = FileOptions::default().compression_method(zip::CompressionMethod::Deflated);
        for (name, content) in [("index.csv", manifest), ("country.geojson", padded)] {
            writer.start_file(name, options).unwrap();
            writer.write_all(content.as_bytes()).unwrap();
        }
        let archive = writer.finish().unwrap().into_inner();

        let options = ImportOptions::default()
            .with_max_archive_bytes(64 * 1024)
            .with_max_unpacked_bytes(1024 * 1024);
        let importer = DivisionImporter::with_options(InMemoryBackend::new(), options);
        let tenant = Uuid::new_v4();

        let err = importer.import_archive(&archive, tenant).await.unwrap_err();
        assert!(matches!(err, ImportError::UnpackedTooLarge { .. }));
        assert_eq!(importer.store().count(tenant).await.unwrap(), 0);
    }
}

mod unresolved_policy_tests {
    use super::*;

    fn cyclic_archive() -> Vec<u8> {
        let manifest = [
            HEADER,
            "1,,a.geojson,C1,Root,Racine",
            "2,1,a.geojson,R2,Child,Enfant",
            "7,8,a.geojson,L7,Loop A,Boucle A",
            "8,7,a.geojson,L8,Loop B,Boucle B",
        ]
        .join("\n");
        zip_archive(&[
            ("index.csv", manifest),
            ("a.geojson", square(0.0, 0.0, 1.0).to_string()),
        ])
    }

    #[tokio::test]
    async fn test_fail_policy_rejects_cycles() {
        let importer = DivisionImporter::new(InMemoryBackend::new());
        let tenant = Uuid::new_v4();

        let err = importer
            .import_archive(&cyclic_archive(), tenant)
            .await
            .unwrap_err();
        match err {
            ImportError::UnresolvedHierarchy { count, cycles, .. } => {
                assert_eq!(count, 2);
                assert_eq!(cycles, vec![vec!["7".to_string(), "8".to_string()]]);
            }
            other => panic!("unexpected error: {}", other),
        }
        assert_eq!(importer.store().count(tenant).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_skip_policy_reports_cycles_as_failed() {
        let options = ImportOptions::default().with_unresolved_rows(UnresolvedPolicy::Skip);
        let importer = DivisionImporter::with_options(InMemoryBackend::new(), options);
        let tenant = Uuid::new_v4();

        let report = importer
            .import_archive(&cyclic_archive(), tenant)
            .await
            .unwrap();
        assert_eq!(report.total_processed, 4);
        assert_eq!(report.imported, 2);
        assert_eq!(report.failed, 2);
        assert!(report.failed_details.contains_key("7"));
        assert!(report.failed_details.contains_key("8"));
        assert_eq!(importer.store().count(tenant).await.unwrap(), 2);
    }
}

mod plan_tests {
    use super::*;

    #[tokio::test]
    async fn test_plan_does_not_write() {
        let importer = DivisionImporter::new(InMemoryBackend::new());
        let tenant = Uuid::new_v4();

        let plan = importer.plan(&country_archive(), tenant).await.unwrap();
        assert_eq!(plan.total_rows, 4);
        assert_eq!(plan.languages, vec!["en", "fr"]);
        assert_eq!(
            plan.levels,
            vec![
                vec!["1".to_string()],
                vec!["2".to_string(), "3".to_string()],
                vec!["4".to_string()],
            ]
        );
        assert_eq!(plan.existing, 0);
        assert!(plan.missing_geometry.is_empty());
        assert_eq!(importer.store().count(tenant).await.unwrap(), 0);

        let report = importer
            .import_archive(&country_archive(), tenant)
            .await
            .unwrap();
        assert_eq!(report.inserted, 4);
        let plan = importer.plan(&country_archive(), tenant).await.unwrap();
        assert_eq!(plan.existing, 4);
    }
}
