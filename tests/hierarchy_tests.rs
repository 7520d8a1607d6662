//! Hierarchy resolution tests

use division_import_sdk::models::ManifestRow;
use division_import_sdk::validation::{HierarchyResolution, HierarchyResolver};

fn row(id: &str, parent: &str, line: usize) -> ManifestRow {
    ManifestRow {
        import_id: id.to_string(),
        national_id: format!("N{}", id),
        parent_import_id: parent.to_string(),
        geodata_filename: format!("{}.geojson", id),
        name: [("en".to_string(), id.to_string())].into_iter().collect(),
        line,
    }
}

fn levels(resolution: HierarchyResolution) -> Vec<Vec<String>> {
    match resolution {
        HierarchyResolution::Resolved(levels) => levels,
        other => panic!("expected a resolved hierarchy, got {:?}", other),
    }
}

#[test]
fn test_levels_keep_manifest_order() {
    let rows = vec![
        row("c", "a", 2),
        row("a", "", 3),
        row("d", "b", 4),
        row("b", "", 5),
        row("e", "c", 6),
    ];

    let levels = levels(HierarchyResolver::default().resolve(&rows, |_| false));
    assert_eq!(
        levels,
        vec![
            vec!["a".to_string(), "b".to_string()],
            vec!["c".to_string(), "d".to_string()],
            vec!["e".to_string()],
        ]
    );
}

#[test]
fn test_every_row_placed_after_its_parent() {
    let rows: Vec<ManifestRow> = (0..50)
        .map(|i| {
            let parent = if i == 0 { String::new() } else { ((i - 1) / 3).to_string() };
            row(&i.to_string(), &parent, i + 2)
        })
        .collect();

    let levels = levels(HierarchyResolver::default().resolve(&rows, |_| false));
    let level_of = |id: &str| levels.iter().position(|l| l.iter().any(|x| x == id)).unwrap();

    assert_eq!(levels.iter().map(Vec::len).sum::<usize>(), rows.len());
    for r in rows.iter().filter(|r| !r.parent_import_id.is_empty()) {
        assert_eq!(level_of(&r.import_id), level_of(&r.parent_import_id) + 1);
    }
}

#[test]
fn test_orphans_reported_before_cycles() {
    let rows = vec![
        row("root", "", 2),
        row("x", "y", 3),
        row("y", "x", 4),
        row("lost", "nowhere", 5),
    ];

    match HierarchyResolver::default().resolve(&rows, |_| false) {
        HierarchyResolution::OrphanDetected(orphans) => {
            assert_eq!(orphans.len(), 1);
            assert_eq!(orphans[0].import_id, "lost");
            assert_eq!(orphans[0].parent_import_id, "nowhere");
            assert_eq!(orphans[0].line, 5);
        }
        other => panic!("unexpected resolution: {:?}", other),
    }
}

#[test]
fn test_stored_parent_anchors_row() {
    let rows = vec![row("child", "stored", 2), row("grandchild", "child", 3)];

    let levels = levels(HierarchyResolver::default().resolve(&rows, |id| id == "stored"));
    assert_eq!(
        levels,
        vec![vec!["child".to_string()], vec!["grandchild".to_string()]]
    );
}

#[test]
fn test_depth_limit_leaves_rows_unresolved() {
    let rows = vec![row("1", "", 2), row("2", "1", 3), row("3", "2", 4)];

    let levels = levels(HierarchyResolver::new(2).resolve(&rows, |_| false));
    assert_eq!(levels.len(), 3);

    match HierarchyResolver::new(1).resolve(&rows, |_| false) {
        HierarchyResolution::CycleOrUnresolved {
            levels,
            unresolved,
            cycles,
        } => {
            assert_eq!(levels.len(), 2);
            assert_eq!(unresolved, vec!["3".to_string()]);
            assert!(cycles.is_empty());
        }
        other => panic!("unexpected resolution: {:?}", other),
    }
}
