use serde::Serialize;
use std::borrow::Cow;
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, OnceLock, RwLock};

static SNAPSHOT: OnceLock<SharedSnapshot> = OnceLock::new();

pub fn shared_snapshot() -> &'static SharedSnapshot {
    SNAPSHOT.get_or_init(SharedSnapshot::new)
}

/// Assemble a JSON object from already-serialized fragments. Values must be
/// valid JSON; they are never re-encoded. Keys are protocol constants and
/// never need escaping.
pub fn join_serialized<'a>(parts: impl IntoIterator<Item = (&'a str, &'a str)>) -> String {
    let mut out = String::with_capacity(64);
    out.push('{');
    let mut first = true;
    for (key, value) in parts {
        if !first {
            out.push(',');
        }
        first = false;
        out.push('"');
        out.push_str(key);
        out.push_str("\":");
        out.push_str(value);
    }
    out.push('}');
    out
}

/// Serialize a value into a shared fragment. Serialization of these types
/// only fails on pathological states; log and substitute null rather than
/// dropping the whole fan-out.
pub fn fragment<T: Serialize + ?Sized>(value: &T) -> Arc<str> {
    match serde_json::to_string(value) {
        Ok(s) => Arc::from(s),
        Err(e) => {
            eprintln!("[snapshot] serialize failed: {e:?}");
            Arc::from("null")
        }
    }
}

struct SnapshotInner {
    fields: BTreeMap<String, Arc<str>>,
    init_blob: Arc<str>,
}

/// Process-wide keyed state: the latest serialized value of each named field
/// plus the precomputed object new clients receive on `init`. Field writes
/// and the blob rebuild happen under one write lock, so a concurrent reader
/// never observes a torn object.
pub struct SharedSnapshot {
    inner: RwLock<SnapshotInner>,
}

impl SharedSnapshot {
    fn new() -> Self {
        Self {
            inner: RwLock::new(SnapshotInner {
                fields: BTreeMap::new(),
                init_blob: Arc::from("{}"),
            }),
        }
    }

    pub fn apply(&self, updates: impl IntoIterator<Item = (String, Arc<str>)>) {
        let mut inner = self.inner.write().expect("snapshot lock poisoned");
        for (key, value) in updates {
            inner.fields.insert(key, value);
        }
        let blob = join_serialized(inner.fields.iter().map(|(k, v)| (k.as_str(), v.as_ref())));
        inner.init_blob = Arc::from(blob);
    }

    pub fn set(&self, key: &str, value: Arc<str>) {
        self.apply([(key.to_string(), value)]);
    }

    pub fn get(&self, key: &str) -> Option<Arc<str>> {
        self.inner.read().expect("snapshot lock poisoned").fields.get(key).cloned()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.inner.read().expect("snapshot lock poisoned").fields.contains_key(key)
    }

    /// The `init` payload is withheld until the block list is known and
    /// non-empty.
    pub fn has_blocks(&self) -> bool {
        match self.get("blocks") {
            Some(blocks) => !blocks.is_empty() && blocks.as_ref() != "[]",
            None => false,
        }
    }

    pub fn init_blob(&self) -> Arc<str> {
        self.inner.read().expect("snapshot lock poisoned").init_blob.clone()
    }

    /// Consistent copy of all fields, used to seed a per-event cache.
    pub fn fields(&self) -> BTreeMap<String, Arc<str>> {
        self.inner.read().expect("snapshot lock poisoned").fields.clone()
    }

    /// Drop all fields. Test harness hook; production state is never
    /// destroyed.
    pub fn clear(&self) {
        let mut inner = self.inner.write().expect("snapshot lock poisoned");
        inner.fields.clear();
        inner.init_blob = Arc::from("{}");
    }
}

/// Collaborator registration: publish an extra named field into the shared
/// snapshot so newcomers receive it with `init`.
pub fn register_init_field<T: Serialize>(key: &str, value: &T) {
    shared_snapshot().set(key, fragment(value));
}

/// Per-event scratch map of key -> serialized fragment. Seeded from the
/// shared snapshot at event start, filled on demand, shared across every
/// client composition for that event.
pub struct SerializationCache {
    entries: HashMap<String, Arc<str>>,
}

impl SerializationCache {
    pub fn seeded() -> Self {
        let fields = shared_snapshot().fields();
        Self { entries: fields.into_iter().collect() }
    }

    pub fn empty() -> Self {
        Self { entries: HashMap::new() }
    }

    pub fn get(&self, key: &str) -> Option<Arc<str>> {
        self.entries.get(key).cloned()
    }

    pub fn get_or_insert_with(
        &mut self,
        key: &str,
        produce: impl FnOnce() -> String,
    ) -> Arc<str> {
        if let Some(hit) = self.entries.get(key) {
            return hit.clone();
        }
        let fragment: Arc<str> = Arc::from(produce());
        self.entries.insert(key.to_string(), fragment.clone());
        fragment
    }

    /// Serialize on first miss, reuse the fragment on every later hit.
    pub fn serialize_once<T: Serialize>(&mut self, key: &str, value: &T) -> Arc<str> {
        if let Some(hit) = self.entries.get(key) {
            return hit.clone();
        }
        let fragment = fragment(value);
        self.entries.insert(key.to_string(), fragment.clone());
        fragment
    }
}

/// An outgoing message under assembly: ordered response keys, each holding an
/// already-serialized fragment.
#[derive(Default)]
pub struct Response {
    parts: Vec<(Cow<'static, str>, Arc<str>)>,
}

impl Response {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, key: impl Into<Cow<'static, str>>, fragment: Arc<str>) {
        self.parts.push((key.into(), fragment));
    }

    pub fn is_empty(&self) -> bool {
        self.parts.is_empty()
    }

    /// Final message, or None when nothing accumulated (no empty sends).
    pub fn into_message(self) -> Option<String> {
        if self.parts.is_empty() {
            return None;
        }
        Some(join_serialized(self.parts.iter().map(|(k, v)| (k.as_ref(), v.as_ref()))))
    }
}
