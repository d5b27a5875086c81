mod common;

use common::MockFileJumpClient;
use filejump_fuse::error::FsError;
use filejump_fuse::index::{DirectoryIndex, DEFAULT_LISTING_CAPACITY, ROOT_ID};
use std::sync::Arc;

fn index_with(mock: &MockFileJumpClient) -> DirectoryIndex {
    DirectoryIndex::new(Arc::new(mock.clone()))
}

#[tokio::test]
async fn test_second_listing_comes_from_cache() {
    let mock = MockFileJumpClient::new();
    mock.add_file(0, "a.txt", b"a");
    mock.add_folder(0, "docs");
    let index = index_with(&mock);

    let first = index.list_directory(ROOT_ID).await;
    let second = index.list_directory(ROOT_ID).await;
    assert_eq!(first, second);
    assert_eq!(first.len(), 2);
    assert_eq!(mock.get_call_count("list_page"), 1);
}

#[tokio::test]
async fn test_pages_are_merged_in_order() {
    let mock = MockFileJumpClient::new();
    mock.set_page_size(2);
    let names = ["one", "two", "three", "four", "five"];
    for name in names {
        mock.add_file(0, name, b"x");
    }
    let index = index_with(&mock);

    let listing = index.list_directory(ROOT_ID).await;
    let listed: Vec<&str> = listing.iter().map(|entry| entry.name.as_str()).collect();
    assert_eq!(listed, names);
    assert_eq!(mock.get_call_count("list_page"), 3);
}

#[tokio::test]
async fn test_empty_folder_listing_is_cached() {
    let mock = MockFileJumpClient::new();
    let empty = mock.add_folder(0, "empty");
    let index = index_with(&mock);

    assert!(index.list_directory(empty.id).await.is_empty());
    assert!(index.list_directory(empty.id).await.is_empty());
    assert_eq!(mock.get_call_count("list_page"), 1);
}

#[tokio::test]
async fn test_least_recently_used_listing_is_evicted() {
    let mock = MockFileJumpClient::new();
    let folders: Vec<u64> = (0..=DEFAULT_LISTING_CAPACITY)
        .map(|i| mock.add_folder(0, &format!("folder{}", i)).id)
        .collect();
    let index = index_with(&mock);

    for id in &folders[..DEFAULT_LISTING_CAPACITY] {
        index.list_directory(*id).await;
    }
    // Touch the first folder so the second becomes the oldest
    index.list_directory(folders[0]).await;
    index.list_directory(folders[DEFAULT_LISTING_CAPACITY]).await;

    assert!(index.is_listing_cached(folders[0]).await);
    assert!(!index.is_listing_cached(folders[1]).await);
    for id in &folders[2..] {
        assert!(index.is_listing_cached(*id).await);
    }
}

#[tokio::test]
async fn test_failed_listing_is_not_cached() {
    let mock = MockFileJumpClient::new();
    mock.add_file(0, "a.txt", b"a");
    mock.make_operation_fail("list_page");
    let index = index_with(&mock);

    assert!(index.list_directory(ROOT_ID).await.is_empty());
    assert!(!index.is_listing_cached(ROOT_ID).await);

    mock.clear_operation_failures();
    assert_eq!(index.list_directory(ROOT_ID).await.len(), 1);
}

#[tokio::test]
async fn test_resolve_nested_path() {
    let mock = MockFileJumpClient::new();
    let docs = mock.add_folder(0, "docs");
    let reports = mock.add_folder(docs.id, "reports");
    mock.add_file(reports.id, "q1.pdf", b"pdf");
    let index = index_with(&mock);

    assert_eq!(index.resolve_path_to_id("/").await.unwrap(), ROOT_ID);
    assert_eq!(index.resolve_path_to_id("").await.unwrap(), ROOT_ID);
    assert_eq!(index.resolve_path_to_id("/docs/reports").await.unwrap(), reports.id);
    assert_eq!(index.cached_name(reports.id).await.as_deref(), Some("reports"));

    // Resolved paths are remembered
    mock.reset_call_counters();
    assert_eq!(index.resolve_path_to_id("/docs/reports/").await.unwrap(), reports.id);
    assert_eq!(mock.get_call_count("list_page"), 0);
}

#[tokio::test]
async fn test_child_names_are_bounded() {
    let mock = MockFileJumpClient::new();
    let files: Vec<u64> = (0..40)
        .map(|i| mock.add_file(0, &format!("file{}", i), b"x").id)
        .collect();
    // one remembered path keeps at most eight names
    let index = DirectoryIndex::with_capacity(Arc::new(mock.clone()), DEFAULT_LISTING_CAPACITY, 1);

    assert_eq!(index.list_directory(ROOT_ID).await.len(), 40);
    assert!(index.cached_name(files[0]).await.is_none());
    assert_eq!(index.cached_name(files[39]).await.as_deref(), Some("file39"));
}

#[tokio::test]
async fn test_resolve_rejects_missing_and_file_segments() {
    let mock = MockFileJumpClient::new();
    let docs = mock.add_folder(0, "docs");
    mock.add_file(docs.id, "notes.txt", b"n");
    let index = index_with(&mock);

    assert!(matches!(
        index.resolve_path_to_id("/nope").await,
        Err(FsError::NotFound)
    ));
    assert!(matches!(
        index.resolve_path_to_id("/docs/notes.txt").await,
        Err(FsError::NotFound)
    ));
    assert!(matches!(
        index.resolve_path_to_id("/Docs").await,
        Err(FsError::NotFound)
    ));
}

#[tokio::test]
async fn test_find_file() {
    let mock = MockFileJumpClient::new();
    let docs = mock.add_folder(0, "docs");
    let notes = mock.add_file(docs.id, "notes.txt", b"hello world");
    let index = index_with(&mock);

    let found = index.find_file("/docs/notes.txt").await.unwrap();
    assert_eq!(found.id, notes.id);
    assert_eq!(found.size, 11);
    assert!(index.find_file("/docs/NOTES.txt").await.is_none());
    assert!(index.find_file("/missing/notes.txt").await.is_none());
    assert!(index.find_file("/").await.is_none());
}

#[tokio::test]
async fn test_create_directory_then_find() {
    let mock = MockFileJumpClient::new();
    let index = index_with(&mock);

    // Prime the root listing so the create has something to invalidate
    assert!(index.list_directory(ROOT_ID).await.is_empty());
    let created = index.create_directory(ROOT_ID, "new").await.unwrap();

    let found = index.find_file("/new").await.unwrap();
    assert!(found.is_dir);
    assert_eq!(found.id, created.id);
    assert_eq!(index.resolve_path_to_id("/new").await.unwrap(), created.id);
}

#[tokio::test]
async fn test_delete_entry_invalidates_parent() {
    let mock = MockFileJumpClient::new();
    let docs = mock.add_folder(0, "docs");
    let file = mock.add_file(docs.id, "a.txt", b"a");
    let index = index_with(&mock);

    assert_eq!(index.list_directory(docs.id).await.len(), 1);
    assert!(index.delete_entry(docs.id, file.id).await);
    assert!(!index.is_listing_cached(docs.id).await);
    assert!(index.list_directory(docs.id).await.is_empty());
}

#[tokio::test]
async fn test_deleted_folder_path_is_forgotten() {
    let mock = MockFileJumpClient::new();
    let docs = mock.add_folder(0, "docs");
    let index = index_with(&mock);

    assert_eq!(index.resolve_path_to_id("/docs").await.unwrap(), docs.id);
    assert!(index.delete_entry(ROOT_ID, docs.id).await);
    assert!(matches!(
        index.resolve_path_to_id("/docs").await,
        Err(FsError::NotFound)
    ));
}

#[tokio::test]
async fn test_failed_delete_reports_false() {
    let mock = MockFileJumpClient::new();
    let file = mock.add_file(0, "a.txt", b"a");
    mock.make_operation_fail("delete");
    let index = index_with(&mock);

    assert!(!index.delete_entry(ROOT_ID, file.id).await);
    assert!(index.find_file("/a.txt").await.is_some());
}

#[tokio::test]
async fn test_download_file() {
    let mock = MockFileJumpClient::new();
    let file = mock.add_file(0, "a.txt", b"content");
    let index = index_with(&mock);
    let dir = tempfile::TempDir::new().unwrap();
    let dest = dir.path().join("copy");

    index.download_file(file.id, &dest).await.unwrap();
    assert_eq!(std::fs::read(&dest).unwrap(), b"content");
}
