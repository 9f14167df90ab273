use s7_admin::session::{ACCESS_TOKEN_KEY, REFRESH_TOKEN_KEY};
use s7_admin::{CookieStore, DualSessionStore, FileStorage, KeyValueStore, SessionStore, Tokens};
use std::path::Path;
use std::sync::Arc;
use tempfile::TempDir;

fn open_store(dir: &Path) -> (DualSessionStore, Arc<FileStorage>) {
    let storage = Arc::new(FileStorage::in_dir(dir));
    let cookies = Arc::new(CookieStore::open_in_dir(dir).unwrap());
    (DualSessionStore::new(storage.clone(), cookies), storage)
}

#[test]
fn test_stores_agree_after_every_write() {
    let dir = TempDir::new().unwrap();
    let (store, _) = open_store(dir.path());

    let steps = [
        Some(Tokens::new("a1", "r1")),
        Some(Tokens::new("a2", "r2")),
        None,
        Some(Tokens::new("a3", "r3")),
        None,
    ];

    for step in steps {
        match &step {
            Some(tokens) => store.set_tokens(tokens),
            None => store.clear_tokens(),
        }
        assert_eq!(store.storage_tokens(), step);
        assert_eq!(store.cookie_tokens(), step);
        assert_eq!(store.get_tokens(), step);
    }
}

#[test]
fn test_session_survives_reopen() {
    let dir = TempDir::new().unwrap();
    {
        let (store, _) = open_store(dir.path());
        store.set_tokens(&Tokens::new("acc", "ref"));
    }

    let (store, _) = open_store(dir.path());
    assert_eq!(store.get_tokens(), Some(Tokens::new("acc", "ref")));
    assert_eq!(store.cookie_tokens(), Some(Tokens::new("acc", "ref")));
}

#[test]
fn test_cookie_copy_restores_lost_storage() {
    let dir = TempDir::new().unwrap();
    {
        let (store, _) = open_store(dir.path());
        store.set_tokens(&Tokens::new("acc", "ref"));
    }
    std::fs::remove_file(dir.path().join("storage.json")).unwrap();

    let (store, storage) = open_store(dir.path());
    assert_eq!(store.storage_tokens(), None);
    assert_eq!(store.get_tokens(), Some(Tokens::new("acc", "ref")));
    // Reading does not write back
    assert_eq!(storage.get_item(ACCESS_TOKEN_KEY).unwrap(), None);
}

#[test]
fn test_storage_wins_over_cookies() {
    let dir = TempDir::new().unwrap();
    let (store, storage) = open_store(dir.path());
    store.set_tokens(&Tokens::new("cookie-acc", "cookie-ref"));

    storage.set_item(ACCESS_TOKEN_KEY, "storage-acc").unwrap();
    storage.set_item(REFRESH_TOKEN_KEY, "storage-ref").unwrap();

    assert_eq!(
        store.get_tokens(),
        Some(Tokens::new("storage-acc", "storage-ref"))
    );
}

#[test]
fn test_logout_clears_persisted_cookies() {
    let dir = TempDir::new().unwrap();
    {
        let (store, _) = open_store(dir.path());
        store.set_tokens(&Tokens::new("acc", "ref"));
        store.clear_tokens();
    }

    let (store, _) = open_store(dir.path());
    assert_eq!(store.get_tokens(), None);
    assert_eq!(store.cookies().cookie_header().unwrap(), None);
}
