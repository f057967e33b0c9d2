pub mod ambient;
pub mod audit;
pub mod chain;
pub mod mempool;
pub mod node;
pub mod rbf;
pub mod templates;

pub use ambient::{BackendInfoApi, LoadingIndicatorsApi, PriceFeed};
pub use audit::{AuditApi, Repositories};
pub use chain::{BlockSource, DifficultyApi, FeeApi};
pub use mempool::MempoolSource;
pub use node::NodeBackend;
pub use rbf::RbfCache;
pub use templates::TemplateBuilder;

use anyhow::Result;
use std::sync::{Arc, OnceLock};

// Collaborators are installed once at startup, before the server is bound.
// An event handler or decoder running without its collaborator is a
// programming error, hence the expect on the getters.

static MEMPOOL: OnceLock<Arc<dyn MempoolSource>> = OnceLock::new();
static TEMPLATES: OnceLock<Arc<dyn TemplateBuilder>> = OnceLock::new();
static BLOCKS: OnceLock<Arc<dyn BlockSource>> = OnceLock::new();
static DIFFICULTY: OnceLock<Arc<dyn DifficultyApi>> = OnceLock::new();
static FEES: OnceLock<Arc<dyn FeeApi>> = OnceLock::new();
static PRICES: OnceLock<Arc<dyn PriceFeed>> = OnceLock::new();
static BACKEND_INFO: OnceLock<Arc<dyn BackendInfoApi>> = OnceLock::new();
static LOADING: OnceLock<Arc<dyn LoadingIndicatorsApi>> = OnceLock::new();
static NODE: OnceLock<Arc<dyn NodeBackend>> = OnceLock::new();
static RBF_CACHE: OnceLock<Arc<dyn RbfCache>> = OnceLock::new();
static AUDIT: OnceLock<Arc<dyn AuditApi>> = OnceLock::new();
static REPOSITORIES: OnceLock<Arc<dyn Repositories>> = OnceLock::new();

macro_rules! collaborator {
    ($cell:ident, $install:ident, $get:ident, $trait:ident, $name:literal) => {
        pub fn $install(value: Arc<dyn $trait>) -> Result<()> {
            $cell
                .set(value)
                .map_err(|_| anyhow::anyhow!(concat!($name, " already installed")))
        }

        pub fn $get() -> Arc<dyn $trait> {
            $cell.get().expect(concat!($name, " not installed")).clone()
        }
    };
}

collaborator!(MEMPOOL, install_mempool, mempool, MempoolSource, "mempool source");
collaborator!(TEMPLATES, install_templates, templates, TemplateBuilder, "template builder");
collaborator!(BLOCKS, install_blocks, blocks_api, BlockSource, "block source");
collaborator!(DIFFICULTY, install_difficulty, difficulty, DifficultyApi, "difficulty api");
collaborator!(FEES, install_fees, fees, FeeApi, "fee api");
collaborator!(PRICES, install_prices, prices, PriceFeed, "price feed");
collaborator!(BACKEND_INFO, install_backend_info, backend_info, BackendInfoApi, "backend info api");
collaborator!(LOADING, install_loading, loading_indicators, LoadingIndicatorsApi, "loading indicators api");
collaborator!(NODE, install_node, node, NodeBackend, "node backend");
collaborator!(RBF_CACHE, install_rbf_cache, rbf_cache, RbfCache, "rbf cache");
collaborator!(AUDIT, install_audit, audit, AuditApi, "audit api");
collaborator!(REPOSITORIES, install_repositories, repositories, Repositories, "repositories");
