use bitcoin::Txid;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, OnceLock};
use tokio::sync::{mpsc, Mutex, RwLock};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum TrackRbf {
    #[default]
    Off,
    All,
    FullRbf,
}

impl TrackRbf {
    pub fn parse(value: &str) -> Self {
        match value {
            "all" => TrackRbf::All,
            "fullRbf" => TrackRbf::FullRbf,
            _ => TrackRbf::Off,
        }
    }
}

/// Per-connection state. Every tracked handle holds the already-validated
/// canonical form; invalid input clears the slot rather than preserving a
/// stale value.
#[derive(Clone, Debug, Default)]
pub struct ClientSession {
    pub remote_address: String,
    pub want_blocks: bool,
    pub want_mempool_blocks: bool,
    pub want_live_chart: bool,
    pub want_stats: bool,
    pub want_tomahawk: bool,
    /// Followed txid.
    pub track_tx: Option<Txid>,
    /// Txid awaiting its first mempool sighting. Independent of `track_tx`;
    /// both may be set at once.
    pub track_mempool_tx: Option<Txid>,
    pub track_address: Option<String>,
    /// Raw input -> canonical form; responses are keyed by the raw input.
    pub track_addresses: Option<BTreeMap<String, String>>,
    pub track_scriptpubkeys: Option<Vec<String>>,
    pub track_asset: Option<String>,
    pub track_mempool_block: Option<usize>,
    pub track_rbf: TrackRbf,
    pub track_rbf_summary: bool,
    pub track_donation: Option<String>,
    pub track_bisq_market: Option<String>,
}

impl ClientSession {
    pub fn new(remote_address: String) -> Self {
        Self { remote_address, ..Default::default() }
    }
}

/// Handle to one live connection: the session plus the outbound channel into
/// the socket task. Sending into a closed channel is a silent skip, which is
/// exactly the contract for sends racing a disconnect.
pub struct ClientHandle {
    pub id: u64,
    pub session: Mutex<ClientSession>,
    outbound: mpsc::UnboundedSender<String>,
}

impl ClientHandle {
    pub fn new(id: u64, session: ClientSession, outbound: mpsc::UnboundedSender<String>) -> Self {
        Self { id, session: Mutex::new(session), outbound }
    }

    pub fn send(&self, message: String) {
        let _ = self.outbound.send(message);
    }
}

static REGISTRY: OnceLock<ClientRegistry> = OnceLock::new();
static NEXT_CLIENT_ID: AtomicU64 = AtomicU64::new(1);

pub fn clients() -> &'static ClientRegistry {
    REGISTRY.get_or_init(ClientRegistry::new)
}

pub fn next_client_id() -> u64 {
    NEXT_CLIENT_ID.fetch_add(1, Ordering::Relaxed)
}

/// All live connections. Fan-out iterates a snapshot taken at the top of
/// each event handler, so mid-event connects and disconnects never
/// invalidate the walk.
pub struct ClientRegistry {
    inner: RwLock<HashMap<u64, Arc<ClientHandle>>>,
}

impl ClientRegistry {
    fn new() -> Self {
        Self { inner: RwLock::new(HashMap::new()) }
    }

    pub async fn register(&self, handle: Arc<ClientHandle>) -> usize {
        let mut inner = self.inner.write().await;
        inner.insert(handle.id, handle);
        inner.len()
    }

    pub async fn unregister(&self, id: u64) -> usize {
        let mut inner = self.inner.write().await;
        inner.remove(&id);
        inner.len()
    }

    pub async fn snapshot(&self) -> Vec<Arc<ClientHandle>> {
        self.inner.read().await.values().cloned().collect()
    }

    pub async fn len(&self) -> usize {
        self.inner.read().await.len()
    }

    /// Test harness hook.
    pub async fn clear(&self) {
        self.inner.write().await.clear();
    }
}
