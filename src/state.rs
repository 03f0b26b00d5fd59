use std::sync::{Arc, Mutex};

use meilisearch_sdk::client::Client;
use tracing::{info, warn};

use crate::{
    cache::{FEATURED_TTL, TtlCache},
    config::Config,
    error::AppError,
    model::{Brand, Car, Category},
    search::{init_search, sync_cars},
    services,
    store::Store,
};

pub struct AppState {
    pub config: Config,
    pub store: Option<Store>,
    pub search: Option<Client>,
    pub featured: FeaturedCache,
}

/// Per-source landing-page caches. The lock is only held for the
/// read-then-write segment of a cache access, never across an await.
pub struct FeaturedCache {
    pub cars: Mutex<TtlCache<Vec<Car>>>,
    pub brands: Mutex<TtlCache<Vec<Brand>>>,
    pub categories: Mutex<TtlCache<Vec<Category>>>,
}

impl FeaturedCache {
    pub fn new() -> Self {
        Self {
            cars: Mutex::new(TtlCache::new(FEATURED_TTL)),
            brands: Mutex::new(TtlCache::new(FEATURED_TTL)),
            categories: Mutex::new(TtlCache::new(FEATURED_TTL)),
        }
    }
}

impl Default for FeaturedCache {
    fn default() -> Self {
        Self::new()
    }
}

impl AppState {
    /// Builds the shared state, degrading instead of failing when a backing
    /// service is unreachable or unconfigured.
    pub async fn new() -> Arc<Self> {
        let config = Config::load();

        let store = match config.redis_url.as_deref() {
            Some(url) => match Store::connect(url).await {
                Ok(store) => Some(store),
                Err(e) => {
                    warn!("Document store unavailable: {e}");
                    None
                }
            },
            None => {
                warn!("REDIS_URL not set, document store disabled");
                None
            }
        };

        let search = match (config.meili_url.as_deref(), config.meili_key.as_deref()) {
            (Some(url), Some(key)) => match init_search(url, key).await {
                Ok(client) => Some(client),
                Err(e) => {
                    warn!("Search index unavailable: {e}");
                    None
                }
            },
            _ => {
                warn!("Search not configured, /search disabled");
                None
            }
        };

        if let (Some(store), Some(client)) = (&store, &search) {
            let cars = services::all_cars(store).await;
            match sync_cars(client, &cars).await {
                Ok(()) => info!("Indexed {} cars", cars.len()),
                Err(e) => warn!("Initial index sync failed: {e}"),
            }
        }

        Arc::new(Self {
            config,
            store,
            search,
            featured: FeaturedCache::new(),
        })
    }

    pub fn store(&self) -> Result<&Store, AppError> {
        self.store.as_ref().ok_or(AppError::ConfigMissing)
    }

    pub fn search(&self) -> Result<&Client, AppError> {
        self.search.as_ref().ok_or(AppError::ConfigMissing)
    }
}
