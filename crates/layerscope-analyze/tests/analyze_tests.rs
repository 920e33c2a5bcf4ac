use layerscope_analyze::{
    AnalysisConfig, CompareMode, DiffType, ImageAnalyzer, TreeCache, TreeCacheKey, efficiency,
};
use layerscope_core::{ContentHash, FileInfo, FileTree};
use layerscope_ingest::{FileRecord, ImageSource, LayerSource};

fn file(path: &str, size: u64, content: u8) -> FileInfo {
    FileInfo::new_file(path, size, Some(ContentHash::new([content; 32])))
}

fn layer(entries: &[(&str, FileInfo)]) -> FileTree {
    let mut tree = FileTree::new();
    for (path, info) in entries {
        tree.add_path(path, info.clone()).unwrap();
        tree.file_size += info.size;
    }
    tree
}

#[test]
fn test_distinct_paths_score_one() {
    let trees = vec![
        layer(&[("/a", file("/a", 100, 1))]),
        layer(&[("/b", file("/b", 100, 2))]),
    ];
    let report = efficiency(&trees).unwrap();

    assert_eq!(report.score, 1.0);
    assert!(report.inefficiencies.is_empty());
}

#[test]
fn test_rewritten_path_is_inefficient() {
    let trees = vec![
        layer(&[("/a", file("/a", 100, 1))]),
        layer(&[("/a", file("/a", 50, 2))]),
    ];
    let report = efficiency(&trees).unwrap();

    assert_eq!(report.inefficiencies.len(), 1);
    let data = &report.inefficiencies[0];
    assert_eq!(data.path, "/a");
    assert_eq!(data.cumulative_size, 150);
    assert_eq!(data.min_discovered_size, 50);
    assert!((report.score - 50.0 / 150.0).abs() < 1e-9);
}

#[test]
fn test_whiteout_cost_and_classification() {
    let trees = vec![
        layer(&[
            ("/dir", FileInfo::new_directory("/dir")),
            ("/dir/file", file("/dir/file", 10, 1)),
        ]),
        layer(&[
            ("/dir", FileInfo::new_directory("/dir")),
            ("/dir/.wh.file", FileInfo::default()),
        ]),
    ];

    let report = efficiency(&trees).unwrap();
    let data = &report.inefficiencies[0];
    assert_eq!(data.path, "/dir/file");
    assert_eq!(data.cumulative_size, 20);
    assert_eq!(data.min_discovered_size, 10);

    let mut cache = TreeCache::new(&trees);
    let tree = cache.get_layer(1, 0, CompareMode::Layer).unwrap();
    let file_id = tree.get_node("/dir/file").unwrap();
    let dir_id = tree.get_node("/dir").unwrap();
    assert_eq!(tree[file_id].data.diff_type, DiffType::Removed);
    assert_eq!(tree[dir_id].data.diff_type, DiffType::Removed);
}

#[test]
fn test_whiteout_with_survivor_leaves_directory_changed() {
    let trees = vec![
        layer(&[
            ("/dir", FileInfo::new_directory("/dir")),
            ("/dir/file", file("/dir/file", 10, 1)),
            ("/dir/keep", file("/dir/keep", 10, 2)),
        ]),
        layer(&[
            ("/dir", FileInfo::new_directory("/dir")),
            ("/dir/.wh.file", FileInfo::default()),
        ]),
    ];

    let mut cache = TreeCache::new(&trees);
    let tree = cache.get_layer(1, 0, CompareMode::Layer).unwrap();
    let dir_id = tree.get_node("/dir").unwrap();
    assert_eq!(tree[dir_id].data.diff_type, DiffType::Changed);
}

#[test]
fn test_cache_get_twice_builds_once() {
    let trees = vec![
        layer(&[("/a", file("/a", 1, 1))]),
        layer(&[("/a", file("/a", 1, 2)), ("/b", file("/b", 1, 1))]),
        layer(&[("/c", file("/c", 1, 1))]),
    ];
    let mut cache = TreeCache::new(&trees);
    let key = TreeCacheKey::new(0, 1, 2, 2);

    let first = cache.get(key).unwrap().render(true);
    let builds = cache.builds();
    let second = cache.get(key).unwrap().render(true);

    assert_eq!(first, second);
    assert_eq!(builds, 1);
    assert_eq!(cache.builds(), 1);
}

#[test]
fn test_aggregated_view_marks_everything_above_base() {
    let trees = vec![
        layer(&[("/base", file("/base", 1, 1))]),
        layer(&[("/one", file("/one", 1, 1))]),
        layer(&[("/two", file("/two", 1, 1))]),
    ];
    let mut cache = TreeCache::new(&trees);

    let tree = cache.get_layer(2, 0, CompareMode::Aggregated).unwrap();
    for (path, expected) in [
        ("/base", DiffType::Unchanged),
        ("/one", DiffType::Added),
        ("/two", DiffType::Added),
    ] {
        let id = tree.get_node(path).unwrap();
        assert_eq!(tree[id].data.diff_type, expected, "{path}");
    }

    let tree = cache.get_layer(2, 0, CompareMode::Layer).unwrap();
    let one = tree.get_node("/one").unwrap();
    assert_eq!(tree[one].data.diff_type, DiffType::Unchanged);
}

fn image() -> ImageSource {
    ImageSource {
        name: "demo".to_string(),
        history: Vec::new(),
        layers: vec![
            LayerSource {
                digest: "sha256:base".to_string(),
                records: vec![FileRecord::file("/a", 100).with_content("a".repeat(100))],
                ..LayerSource::default()
            },
            LayerSource {
                digest: "sha256:user".to_string(),
                command: Some("/bin/sh -c rewrite".to_string()),
                records: vec![FileRecord::file("/a", 50).with_content("b".repeat(50))],
                ..LayerSource::default()
            },
        ],
    }
}

#[test]
fn test_analyze_totals() {
    let analyzer = ImageAnalyzer::new();
    let result = analyzer.analyze_source(&image()).unwrap();

    assert_eq!(result.layers.len(), 2);
    assert_eq!(result.layers[1].command, "rewrite");
    assert_eq!(result.size_bytes, 150);
    assert_eq!(result.user_size_bytes, 50);
    assert_eq!(result.wasted_bytes, 150);
    assert!((result.wasted_user_percent - 3.0).abs() < 1e-9);

    let summary = result.summary();
    assert_eq!(summary.inefficiencies[0].path, "/a");
    assert_eq!(summary.inefficiencies[0].count, 2);
    let json = serde_json::to_value(&summary).unwrap();
    assert_eq!(json["name"], "demo");
}

#[test]
fn test_single_layer_has_no_user_bytes() {
    let mut source = image();
    source.layers.truncate(1);
    let result = ImageAnalyzer::new().analyze_source(&source).unwrap();

    assert_eq!(result.user_size_bytes, 0);
    assert_eq!(result.wasted_user_percent, 0.0);
    assert_eq!(result.efficiency, 1.0);
}

#[test]
fn test_tree_cache_prewarm_follows_config() {
    let analyzer = ImageAnalyzer::with_config(AnalysisConfig::default());
    let result = analyzer.analyze_source(&image()).unwrap();
    let cache = analyzer.tree_cache(&result).unwrap();
    // (0,0,0,0) (0,0,1,1); the aggregated view of layer 1 is the same key
    assert_eq!(cache.len(), 2);

    let lazy = ImageAnalyzer::with_config(
        AnalysisConfig::builder().prewarm_cache(false).build().unwrap(),
    );
    let cache = lazy.tree_cache(&result).unwrap();
    assert!(cache.is_empty());
}

#[test]
fn test_browsing_survives_deleting_base_files() {
    let source = ImageSource {
        name: "cleanup".to_string(),
        history: Vec::new(),
        layers: vec![
            LayerSource {
                digest: "sha256:base".to_string(),
                records: vec![
                    FileRecord::directory("/etc"),
                    FileRecord::file("/etc/motd", 10).with_content("x".repeat(10)),
                ],
                ..LayerSource::default()
            },
            LayerSource {
                digest: "sha256:app".to_string(),
                records: vec![FileRecord::file("/app/run", 4).with_content("exec")],
                ..LayerSource::default()
            },
            LayerSource {
                digest: "sha256:cleanup".to_string(),
                records: vec![FileRecord::whiteout("/etc/motd")],
                ..LayerSource::default()
            },
        ],
    };

    let analyzer = ImageAnalyzer::new();
    let result = analyzer.analyze_source(&source).unwrap();
    let mut cache = analyzer.tree_cache(&result).unwrap();

    let tree = cache.get_layer(2, 0, CompareMode::Aggregated).unwrap();
    let motd = tree.get_node("/etc/motd").unwrap();
    let etc = tree.get_node("/etc").unwrap();
    let app = tree.get_node("/app").unwrap();
    assert_eq!(tree[motd].data.diff_type, DiffType::Removed);
    assert_eq!(tree[etc].data.diff_type, DiffType::Removed);
    assert_eq!(tree[app].data.diff_type, DiffType::Added);
    assert!(tree[app].data.file_info.is_dir);
}
