//! Library-level mirror tests over real temp trees

mod common;

use common::{directories, set_mtime, snapshot, test_timeout_guard, write_file, Trees};
use mirrorsync::{sync_trees, ChangeDetectionStrategy, ProgressTracker, Reporter, SyncConfig, SyncStats};
use rstest::rstest;
use std::path::PathBuf;
use std::time::Duration;

async fn run(config: &SyncConfig) -> (SyncStats, String) {
    let mut out = Vec::new();
    let stats = sync_trees(config, Reporter::new(&mut out, false), ProgressTracker::new(false))
        .await
        .unwrap();
    (stats, String::from_utf8(out).unwrap())
}

fn block_on<F: std::future::Future>(future: F) -> F::Output {
    compio::runtime::Runtime::new().unwrap().block_on(future)
}

/// Source and destination overlapping in every way a run has to handle
fn populate_mixed(trees: &Trees) {
    write_file(&trees.src, "same.txt", "unchanged");
    write_file(&trees.dst, "same.txt", "unchanged");
    write_file(&trees.src, "docs/changed.md", "new text");
    write_file(&trees.dst, "docs/changed.md", "old");
    write_file(&trees.src, "docs/new/added.bin", "fresh");
    write_file(&trees.src, "empty.txt", "");
    write_file(&trees.dst, "gone.txt", "stale");
    write_file(&trees.dst, "old/deep/leftover.txt", "stale");

    set_mtime(&trees.dst.join("docs/changed.md"), 1_000_000_000);
    set_mtime(&trees.src.join("docs/changed.md"), 1_500_000_000);
    set_mtime(&trees.dst.join("same.txt"), 1_500_000_000);
    set_mtime(&trees.src.join("same.txt"), 1_500_000_000);
}

#[rstest]
#[case(ChangeDetectionStrategy::ModifiedDate)]
#[case(ChangeDetectionStrategy::ContentHash)]
fn test_destination_mirrors_source(#[case] strategy: ChangeDetectionStrategy) {
    let _guard = test_timeout_guard(Duration::from_secs(60));
    let trees = Trees::new();
    populate_mixed(&trees);

    let config = SyncConfig::new(&trees.src, &trees.dst, strategy);
    let (stats, _) = block_on(run(&config));

    assert!(stats.is_clean(), "failures: {:?}", stats.failures);
    assert_eq!(snapshot(&trees.dst), snapshot(&trees.src));
    assert_eq!(stats.files_removed, 2);
    assert_eq!(stats.files_added, 2);
    assert_eq!(stats.files_updated, 1);
    assert_eq!(stats.files_unchanged, 1);
    assert!(!trees.dst.join("old").exists());
}

#[compio::test]
async fn test_second_run_is_a_no_op() {
    let trees = Trees::new();
    populate_mixed(&trees);
    let config = SyncConfig::new(&trees.src, &trees.dst, ChangeDetectionStrategy::ModifiedDate);

    run(&config).await;
    let before = snapshot(&trees.dst);
    let (stats, output) = run(&config).await;

    assert_eq!(snapshot(&trees.dst), before);
    assert_eq!(stats.files_removed + stats.files_added + stats.files_updated, 0);
    assert_eq!(stats.directories_pruned, 0);
    assert!(!output.contains("Removing:"));
    assert!(!output.contains("Adding:"));
    assert!(!output.contains("Updating:"));
}

#[compio::test]
async fn test_remove_keeps_matching_files() {
    let trees = Trees::new();
    write_file(&trees.src, "a", "a");
    write_file(&trees.dst, "a", "a");
    write_file(&trees.dst, "b", "b");
    write_file(&trees.dst, "c", "c");

    let config = SyncConfig::new(&trees.src, &trees.dst, ChangeDetectionStrategy::ContentHash);
    let (stats, output) = run(&config).await;

    assert_eq!(stats.files_removed, 2);
    assert_eq!(snapshot(&trees.dst).into_keys().collect::<Vec<_>>(), vec![PathBuf::from("a")]);
    assert!(output.contains("Removing:\n"));
    for removed in ["b", "c"] {
        assert!(output.contains(&format!("{}\n", trees.dst.join(removed).display())));
    }
    assert!(!output.contains(&format!("{}\n", trees.dst.join("a").display())));
}

#[compio::test]
async fn test_add_creates_parent_directories() {
    let trees = Trees::new();
    write_file(&trees.src, "a", "1");
    write_file(&trees.src, "b/c", "2");

    let config = SyncConfig::new(&trees.src, &trees.dst, ChangeDetectionStrategy::ModifiedDate);
    let (stats, _) = run(&config).await;

    assert_eq!(stats.files_added, 2);
    assert!(trees.dst.join("b").is_dir());
    assert_eq!(std::fs::read_to_string(trees.dst.join("b/c")).unwrap(), "2");
}

#[compio::test]
async fn test_modified_date_copies_only_strictly_newer_sources() {
    let trees = Trees::new();
    let newer_src = write_file(&trees.src, "newer.txt", "from source");
    let newer_dst = write_file(&trees.dst, "newer.txt", "from dest");
    let older_src = write_file(&trees.src, "older.txt", "from source");
    let older_dst = write_file(&trees.dst, "older.txt", "from dest");
    let equal_src = write_file(&trees.src, "equal.txt", "from source");
    let equal_dst = write_file(&trees.dst, "equal.txt", "from dest");

    set_mtime(&newer_src, 2_000);
    set_mtime(&newer_dst, 1_000);
    set_mtime(&older_src, 1_000);
    set_mtime(&older_dst, 2_000);
    set_mtime(&equal_src, 1_000);
    set_mtime(&equal_dst, 1_000);

    let config = SyncConfig::new(&trees.src, &trees.dst, ChangeDetectionStrategy::ModifiedDate);
    let (stats, _) = run(&config).await;

    assert_eq!(stats.files_updated, 1);
    assert_eq!(stats.files_unchanged, 2);
    assert_eq!(std::fs::read_to_string(newer_dst).unwrap(), "from source");
    assert_eq!(std::fs::read_to_string(older_dst).unwrap(), "from dest");
    assert_eq!(std::fs::read_to_string(equal_dst).unwrap(), "from dest");
}

#[compio::test]
async fn test_content_hash_ignores_newer_identical_files() {
    let trees = Trees::new();
    let src = write_file(&trees.src, "same.txt", "identical");
    let dst = write_file(&trees.dst, "same.txt", "identical");
    set_mtime(&dst, 1_000);
    set_mtime(&src, 2_000_000_000);

    let config = SyncConfig::new(&trees.src, &trees.dst, ChangeDetectionStrategy::ContentHash);
    let (stats, output) = run(&config).await;

    assert_eq!(stats.files_updated, 0);
    assert_eq!(stats.files_unchanged, 1);
    assert!(!output.contains("Updating:"));
    // Untouched destination keeps its old timestamp
    let mtime = filetime::FileTime::from_last_modification_time(&std::fs::metadata(&dst).unwrap());
    assert_eq!(mtime.unix_seconds(), 1_000);
}

#[compio::test]
async fn test_content_hash_refreshes_differing_files_with_older_source() {
    let trees = Trees::new();
    let src = write_file(&trees.src, "drift.txt", "source bytes");
    let dst = write_file(&trees.dst, "drift.txt", "dest bytes!!");
    set_mtime(&src, 1_000);
    set_mtime(&dst, 2_000);

    let config = SyncConfig::new(&trees.src, &trees.dst, ChangeDetectionStrategy::ContentHash);
    let (stats, _) = run(&config).await;

    assert_eq!(stats.files_updated, 1);
    assert_eq!(std::fs::read_to_string(dst).unwrap(), "source bytes");
}

#[compio::test]
async fn test_pruning_propagates_upward() {
    let trees = Trees::new();
    write_file(&trees.src, "keep/file.txt", "k");
    write_file(&trees.dst, "keep/file.txt", "k");
    write_file(&trees.dst, "keep/nested/x.txt", "x");
    write_file(&trees.dst, "a/b/c/d.txt", "d");

    let config = SyncConfig::new(&trees.src, &trees.dst, ChangeDetectionStrategy::ContentHash);
    let (stats, _) = run(&config).await;

    assert_eq!(stats.files_removed, 2);
    assert_eq!(stats.directories_pruned, 4);
    assert_eq!(directories(&trees.dst), vec![PathBuf::from("keep")]);
    assert!(trees.dst.is_dir());
}

#[compio::test]
async fn test_dry_run_leaves_destination_untouched() {
    let trees = Trees::new();
    populate_mixed(&trees);
    let before = snapshot(&trees.dst);

    let mut config = SyncConfig::new(&trees.src, &trees.dst, ChangeDetectionStrategy::ModifiedDate);
    config.dry_run = true;
    let (stats, output) = run(&config).await;

    assert_eq!(snapshot(&trees.dst), before);
    assert!(trees.dst.join("old/deep").is_dir());
    assert_eq!(stats.files_removed, 2);
    assert_eq!(stats.files_added, 2);
    assert_eq!(stats.files_updated, 1);
    assert!(output.contains("Dry run: no changes were made"));
}

#[rstest]
#[case("")]
#[case("/")]
#[case("~")]
fn test_forbidden_source_root_mutates_nothing(#[case] source: &str) {
    let trees = Trees::new();
    write_file(&trees.dst, "precious.txt", "keep me");
    let before = snapshot(&trees.dst);

    let config = SyncConfig::new(source, &trees.dst, ChangeDetectionStrategy::ModifiedDate);
    let err = block_on(sync_trees(&config, Reporter::silent(), ProgressTracker::new(false))).unwrap_err();

    assert!(err.is_config_error());
    assert_eq!(snapshot(&trees.dst), before);
}

#[rstest]
#[case("")]
#[case("/")]
#[case("~")]
fn test_forbidden_destination_root_is_rejected(#[case] destination: &str) {
    let trees = Trees::new();
    write_file(&trees.src, "file.txt", "data");

    let config = SyncConfig::new(&trees.src, destination, ChangeDetectionStrategy::ModifiedDate);
    let mut out = Vec::new();
    let err = block_on(sync_trees(&config, Reporter::new(&mut out, false), ProgressTracker::new(false)))
        .unwrap_err();

    assert!(err.is_config_error());
    assert!(out.is_empty(), "nothing is reported before validation passes");
}

#[compio::test]
async fn test_nested_roots_are_rejected() {
    let trees = Trees::new();
    write_file(&trees.src, "file.txt", "data");
    let before = snapshot(&trees.src);

    let inner = trees.src.join("mirror");
    let config = SyncConfig::new(&trees.src, &inner, ChangeDetectionStrategy::ModifiedDate);
    let err = sync_trees(&config, Reporter::silent(), ProgressTracker::new(false))
        .await
        .unwrap_err();

    assert!(err.is_config_error());
    assert!(!inner.exists());
    assert_eq!(snapshot(&trees.src), before);
}

#[compio::test]
async fn test_numbered_report() {
    let trees = Trees::new();
    write_file(&trees.src, "one.txt", "1");

    let mut out = Vec::new();
    let config = SyncConfig::new(&trees.src, &trees.dst, ChangeDetectionStrategy::ModifiedDate);
    sync_trees(&config, Reporter::new(&mut out, true), ProgressTracker::new(false))
        .await
        .unwrap();

    let output = String::from_utf8(out).unwrap();
    assert!(output.contains(&format!("Adding:\n1. {}\n", trees.src.join("one.txt").display())));
}

#[compio::test]
async fn test_many_files_with_small_concurrency_bound() {
    let trees = Trees::new();
    for i in 0..200 {
        write_file(&trees.src, &format!("d{}/f{i}.txt", i % 7), &format!("v2 {i}"));
        write_file(&trees.dst, &format!("d{}/f{i}.txt", i % 7), &format!("v1 {i}"));
    }

    let mut config = SyncConfig::new(&trees.src, &trees.dst, ChangeDetectionStrategy::ContentHash);
    config.max_files_in_flight = 3;
    config.buffer_size = 4;
    let (stats, _) = run(&config).await;

    assert!(stats.is_clean());
    assert_eq!(stats.files_updated, 200);
    assert_eq!(snapshot(&trees.dst), snapshot(&trees.src));
}

#[compio::test]
async fn test_empty_directory_in_place_of_file_converges() {
    let trees = Trees::new();
    write_file(&trees.src, "x", "now a file");
    std::fs::create_dir_all(trees.dst.join("x")).unwrap();

    let config = SyncConfig::new(&trees.src, &trees.dst, ChangeDetectionStrategy::ModifiedDate);
    let (first, _) = run(&config).await;
    let (second, _) = run(&config).await;

    assert!(first.is_clean(), "failures: {:?}", first.failures);
    assert!(second.is_clean());
    assert_eq!(snapshot(&trees.dst), snapshot(&trees.src));
}

#[cfg(unix)]
#[compio::test]
async fn test_destination_symlink_is_never_written_through() {
    let trees = Trees::new();
    let victim = trees.src.parent().unwrap().join("victim.txt");
    std::fs::write(&victim, "untouched").unwrap();
    write_file(&trees.src, "a.txt", "source content");
    std::os::unix::fs::symlink(&victim, trees.dst.join("a.txt")).unwrap();

    let config = SyncConfig::new(&trees.src, &trees.dst, ChangeDetectionStrategy::ContentHash);
    let (stats, _) = run(&config).await;

    assert!(stats.is_clean(), "failures: {:?}", stats.failures);
    assert_eq!(std::fs::read_to_string(&victim).unwrap(), "untouched");
    assert!(!trees.dst.join("a.txt").is_symlink());
    assert_eq!(snapshot(&trees.dst), snapshot(&trees.src));
}

#[rstest]
#[case("/..")]
#[case("/tmp/..")]
fn test_parent_segments_cannot_reach_filesystem_root(#[case] destination: &str) {
    let trees = Trees::new();
    write_file(&trees.src, "file.txt", "data");

    let config = SyncConfig::new(&trees.src, destination, ChangeDetectionStrategy::ModifiedDate);
    let err = block_on(sync_trees(&config, Reporter::silent(), ProgressTracker::new(false))).unwrap_err();

    assert!(err.is_config_error());
}

#[cfg(unix)]
#[compio::test]
async fn test_symlink_to_filesystem_root_is_rejected() {
    let trees = Trees::new();
    write_file(&trees.src, "file.txt", "data");
    let link = trees.src.parent().unwrap().join("root-link");
    std::os::unix::fs::symlink("/", &link).unwrap();

    let config = SyncConfig::new(&trees.src, &link, ChangeDetectionStrategy::ModifiedDate);
    let err = sync_trees(&config, Reporter::silent(), ProgressTracker::new(false))
        .await
        .unwrap_err();

    assert!(err.is_config_error());
}
