use std::io::Read;

use sift_store::{
    Error, Location, Persisted, Quarantine, SingleVolume, StorageAdapter, StorageConfig,
};
use tempfile::tempdir;

fn loc(s: &str) -> Location {
    Location::new(s).unwrap()
}

/// Behavior every adapter must share.
fn exercise(store: &dyn StorageAdapter) {
    assert_eq!(store.put(&loc("main.tex"), b"hello").unwrap(), 5);
    assert!(store.exists(&loc("main.tex")));
    assert_eq!(store.size(&loc("main.tex")).unwrap(), 5);
    assert_eq!(
        store.checksum(&loc("main.tex")).unwrap(),
        "2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824"
    );

    let mut content = String::new();
    store
        .open(&loc("main.tex"))
        .unwrap()
        .read_to_string(&mut content)
        .unwrap();
    assert_eq!(content, "hello");

    store.copy(&loc("main.tex"), &loc("anc/copy.tex")).unwrap();
    store.move_to(&loc("anc/copy.tex"), &loc("removed/copy.tex")).unwrap();
    assert_eq!(
        store.list().unwrap(),
        vec![loc("main.tex"), loc("removed/copy.tex")]
    );

    // checksums follow the bytes, never a cache
    store.put(&loc("main.tex"), b"changed").unwrap();
    assert_ne!(
        store.checksum(&loc("main.tex")).unwrap(),
        "2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824"
    );

    assert!(store.delete(&loc("removed/copy.tex")).unwrap());
    assert!(!store.delete(&loc("removed/copy.tex")).unwrap());
    assert!(matches!(
        store.get(&loc("removed/copy.tex")),
        Err(Error::NotFound(_))
    ));
    assert!(matches!(
        store.move_to(&loc("missing"), &loc("elsewhere")),
        Err(Error::NotFound(_))
    ));
}

#[test]
fn single_volume_contract() {
    let dir = tempdir().unwrap();
    let store = SingleVolume::new(dir.path()).unwrap();
    exercise(&store);
}

#[test]
fn quarantine_contract() {
    let dir = tempdir().unwrap();
    let store = Quarantine::new(dir.path().join("fast"), dir.path().join("slow")).unwrap();
    exercise(&store);
}

#[test]
fn quarantine_persist_is_idempotent() {
    let dir = tempdir().unwrap();
    let durable = dir.path().join("slow");
    let store = Quarantine::new(dir.path().join("fast"), &durable).unwrap();
    store.put(&loc("figs/a.eps"), b"%!PS").unwrap();
    let before = store.checksum(&loc("figs/a.eps")).unwrap();

    let first = store.persist(&loc("figs/a.eps")).unwrap();
    assert!(matches!(first, Persisted::Moved | Persisted::Copied));
    assert!(durable.join("files").join("figs").join("a.eps").is_file());
    assert!(!dir.path().join("fast").join("files").join("figs").exists());

    assert_eq!(
        store.persist(&loc("figs/a.eps")).unwrap(),
        Persisted::AlreadyDurable
    );
    assert_eq!(store.checksum(&loc("figs/a.eps")).unwrap(), before);
    assert!(store.is_persisted(&loc("figs/a.eps")));
}

#[test]
fn put_file_moves_out_of_scratch() {
    let dir = tempdir().unwrap();
    let store = Quarantine::new(dir.path().join("fast"), dir.path().join("slow")).unwrap();
    let scratch = store.scratch_dir().unwrap();
    let blob = scratch.path().join("000001.blob");
    std::fs::write(&blob, b"data").unwrap();

    assert_eq!(store.put_file(&loc("data.csv"), &blob).unwrap(), 4);
    assert!(!blob.exists());
    assert_eq!(store.get(&loc("data.csv")).unwrap(), b"data");
}

#[test]
fn config_opens_per_workspace_roots() {
    let dir = tempdir().unwrap();
    let config = StorageConfig::Quarantine {
        ephemeral_root: dir.path().join("fast"),
        durable_root: dir.path().join("slow"),
    };
    let store = config.open("ws-1").unwrap();
    store.put(&loc("a.tex"), b"a").unwrap();
    store.persist(&loc("a.tex")).unwrap();

    assert!(dir.path().join("slow/ws-1/files/a.tex").is_file());
    store.purge().unwrap();
    assert!(!dir.path().join("slow/ws-1").exists());
    assert!(matches!(store.list(), Err(Error::Purged)));

    assert!(StorageConfig::default().open("../escape").is_err());
}
