use std::sync::Arc;

use veil_client::{InMemoryStore, JsonFileStore, KeyValueStore, ScopedStore};

#[test]
fn in_memory_set_get_remove() {
    let s = InMemoryStore::new();
    assert_eq!(s.get("k").unwrap(), None);
    s.set("k", "v").unwrap();
    assert_eq!(s.get("k").unwrap().as_deref(), Some("v"));
    s.remove("k").unwrap();
    s.remove("k").unwrap();
    assert_eq!(s.get("k").unwrap(), None);
}

#[test]
fn scoped_stores_do_not_see_each_other() {
    let backing: Arc<dyn KeyValueStore> = Arc::new(InMemoryStore::new());
    let alice = ScopedStore::new(backing.clone(), "alice-hash");
    let bob   = ScopedStore::new(backing.clone(), "bob-hash");

    alice.set("default_dc", "4").unwrap();
    assert_eq!(bob.get("default_dc").unwrap(), None);
    assert_eq!(alice.get("default_dc").unwrap().as_deref(), Some("4"));
    assert_eq!(backing.get("alice-hash/default_dc").unwrap().as_deref(), Some("4"));
}

#[test]
fn json_file_store_persists_across_instances() {
    let path = std::env::temp_dir().join(format!("veil-store-{}.json", std::process::id()));
    let _ = std::fs::remove_file(&path);

    {
        let s = JsonFileStore::new(&path);
        assert_eq!(s.get("default_dc").unwrap(), None);
        s.set("default_dc", "3").unwrap();
        s.set("other", "x").unwrap();
        s.remove("other").unwrap();
    }

    let s = JsonFileStore::new(&path);
    assert_eq!(s.get("default_dc").unwrap().as_deref(), Some("3"));
    assert_eq!(s.get("other").unwrap(), None);
    std::fs::remove_file(&path).unwrap();
}
