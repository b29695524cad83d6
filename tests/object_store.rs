use pythonic::{BridgeConfig, Converter, Decode, ForeignHandle, HostValue, ObjectStore, Session};
use pythonic_runtime::{live_objects, objects, refcount};

#[test]
fn test_same_object_same_key() {
    let mut store = ObjectStore::new();
    let obj = objects::new_dict();

    let first = store.put(ForeignHandle::borrowed(obj.raw())).unwrap();
    let second = store.put(ForeignHandle::borrowed(obj.raw())).unwrap();
    assert_eq!(first, second);
    assert_eq!(store.count(first), Some(2));

    assert!(store.drop_ref(first));
    assert!(store.get(first).is_some());
    assert!(store.drop_ref(first));
    assert!(store.drop_ref(first));
    assert!(store.get(first).is_none());
}

#[test]
fn test_clear_invalidates_every_key() {
    let mut store = ObjectStore::new();
    let keys: Vec<u64> = (0..5)
        .map(|i| store.put(objects::new_int_i64(1000 + i).into()).unwrap())
        .collect();
    assert_eq!(store.len(), 5);

    store.clear();
    for key in keys {
        assert!(store.get(key).is_none());
    }
}

#[test]
fn test_listing_does_not_change_counts() {
    let mut store = ObjectStore::new();
    let key = store.put(objects::new_str("listed").into()).unwrap();
    store.get(key);

    let before = store.count(key);
    let listing = store.list();
    assert_eq!(listing.len(), 1);
    assert_eq!(listing[0].count, 2);
    assert_eq!(listing[0].repr, "listed");
    assert_eq!(store.count(key), before);
}

#[test]
fn test_references_are_balanced() {
    let obj = objects::new_list(Vec::new());
    let base = refcount(obj.raw());
    {
        let mut conv = Converter::with_config(&BridgeConfig::default());
        let handle = conv.decode(obj.raw()).unwrap();
        assert!(handle.is_handle());
        assert_eq!(refcount(obj.raw()), base + 1);
    }
    assert_eq!(refcount(obj.raw()), base);
}

#[test]
fn test_session_teardown_releases_objects() {
    // first use imports __main__ and builtins, which stay alive
    Session::with_config(BridgeConfig::default())
        .pyeval("[1.0, 2.0, 3.0]", None, 1)
        .unwrap();
    let before = live_objects();
    {
        let mut session = Session::with_config(BridgeConfig::default());
        let list = session.pyeval("[1.0, 2.0, 3.0]", None, 1).unwrap().unwrap();
        let key = session.objstore_put(&list).unwrap();
        assert_eq!(HostValue::Handle(key), list);
        assert_eq!(session.converter().store().count(key), Some(2));
    }
    assert_eq!(live_objects(), before);
}
