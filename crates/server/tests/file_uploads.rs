use bytes::Bytes;
use chatter_server::auth::AuthManager;
use chatter_server::files::FileManager;
use tempfile::tempdir;

#[tokio::test]
async fn upload_and_download_roundtrip() {
    let dir = tempdir().unwrap();
    let db = dir.path().join("chatter.sqlite");
    let auth = AuthManager::new(&db).await.unwrap();
    let files = FileManager::new(&db, dir.path().join("uploads")).await.unwrap();

    let user = auth
        .register("alice@example.com".into(), "alice".into(), "pw123456".into())
        .await
        .unwrap()
        .0;

    let record = files
        .store_file(
            &user.id,
            "notes.txt".into(),
            "text/plain".into(),
            Bytes::from("meeting notes"),
        )
        .await
        .unwrap();
    assert_eq!(record.size, 13);

    let (fetched, data) = files.get_file(&record.id).await.unwrap();
    assert_eq!(fetched.filename, "notes.txt");
    assert_eq!(fetched.content_type, "text/plain");
    assert_eq!(data, Bytes::from("meeting notes"));
}

#[tokio::test]
async fn identical_content_shares_one_blob() {
    let dir = tempdir().unwrap();
    let db = dir.path().join("chatter.sqlite");
    let auth = AuthManager::new(&db).await.unwrap();
    let upload_dir = dir.path().join("uploads");
    let files = FileManager::new(&db, &upload_dir).await.unwrap();

    let user = auth
        .register("alice@example.com".into(), "alice".into(), "pw123456".into())
        .await
        .unwrap()
        .0;

    let a = files
        .store_file(&user.id, "a.bin".into(), "application/octet-stream".into(), Bytes::from("same bytes"))
        .await
        .unwrap();
    let b = files
        .store_file(&user.id, "b.bin".into(), "application/octet-stream".into(), Bytes::from("same bytes"))
        .await
        .unwrap();

    assert_ne!(a.id, b.id);
    assert_eq!(a.hash, b.hash);

    // Two metadata rows, one blob on disk
    assert_eq!(files.list_user_files(&user.id).await.unwrap().len(), 2);
    let blobs = std::fs::read_dir(&upload_dir).unwrap().count();
    assert_eq!(blobs, 1);
}

#[tokio::test]
async fn empty_uploads_and_unknown_ids_are_rejected() {
    let dir = tempdir().unwrap();
    let db = dir.path().join("chatter.sqlite");
    let files = FileManager::new(&db, dir.path().join("uploads")).await.unwrap();

    assert!(files
        .store_file("user", "empty".into(), "text/plain".into(), Bytes::new())
        .await
        .is_err());
    assert!(files.get_file("missing-id").await.is_err());
}
