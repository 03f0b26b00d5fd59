//! Landing-page aggregation: the three featured fetches fan out as
//! independent tasks, every task settles regardless of its siblings, and a
//! failed source degrades the page instead of failing it. Results are
//! memoized per source with a short TTL.

use std::{future::Future, sync::Mutex};

use serde::Serialize;
use tracing::warn;

use crate::{
    cache::TtlCache,
    error::AppError,
    model::{Brand, Car, Category},
    services,
    state::AppState,
};

pub const FEATURED_CARS_KEY: &str = "featured_cars";
pub const FEATURED_BRANDS_KEY: &str = "featured_brands";
pub const FEATURED_CATEGORIES_KEY: &str = "featured_categories";

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FeaturedContent {
    pub cars: Vec<Car>,
    pub brands: Vec<Brand>,
    pub categories: Vec<Category>,
    /// Non-fatal degradation signal: how many of the three sources failed.
    pub failed_sources: usize,
}

pub async fn load_featured(state: &AppState, fresh: bool) -> Result<FeaturedContent, AppError> {
    let store = state.store()?;
    let cache = &state.featured;

    Ok(aggregate(
        fetch_with_cache(&cache.cars, FEATURED_CARS_KEY, fresh, || {
            services::featured_cars(store)
        }),
        fetch_with_cache(&cache.brands, FEATURED_BRANDS_KEY, fresh, || {
            services::featured_brands(store)
        }),
        fetch_with_cache(&cache.categories, FEATURED_CATEGORIES_KEY, fresh, || {
            services::featured_categories(store)
        }),
    )
    .await)
}

/// Settle-all join over the three sources. Each branch runs to completion
/// and a rejected branch becomes an empty list plus a failure count, never a
/// short-circuit. Values are filtered once more against the landing page's
/// own minimum shape.
pub async fn aggregate(
    cars: impl Future<Output = Result<Vec<Car>, AppError>>,
    brands: impl Future<Output = Result<Vec<Brand>, AppError>>,
    categories: impl Future<Output = Result<Vec<Category>, AppError>>,
) -> FeaturedContent {
    let (cars, brands, categories) = tokio::join!(cars, brands, categories);

    let mut failed_sources = 0;

    let cars = match cars {
        Ok(cars) => cars,
        Err(e) => {
            warn!("Featured cars source failed: {e}");
            failed_sources += 1;
            Vec::new()
        }
    };

    let brands = match brands {
        Ok(brands) => brands,
        Err(e) => {
            warn!("Featured brands source failed: {e}");
            failed_sources += 1;
            Vec::new()
        }
    };

    let categories = match categories {
        Ok(categories) => categories,
        Err(e) => {
            warn!("Featured categories source failed: {e}");
            failed_sources += 1;
            Vec::new()
        }
    };

    FeaturedContent {
        cars: cars
            .into_iter()
            .filter(|car| !car.id.is_empty() && !car.name.is_empty())
            .collect(),
        brands: brands
            .into_iter()
            .filter(|brand| !brand.id.is_empty() && !brand.name.is_empty() && !brand.logo.is_empty())
            .collect(),
        categories: categories
            .into_iter()
            .filter(|category| !category.name.is_empty())
            .collect(),
        failed_sources,
    }
}

/// Read-through cache wrapper. `bypass` skips the cache entirely, both the
/// read and the write back, for callers that must not reuse process-local
/// state.
pub async fn fetch_with_cache<V, F, Fut>(
    cache: &Mutex<TtlCache<V>>,
    key: &'static str,
    bypass: bool,
    fetcher: F,
) -> Result<V, AppError>
where
    V: Clone,
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<V, AppError>>,
{
    if !bypass {
        if let Some(hit) = cache.lock().unwrap().get(key) {
            return Ok(hit);
        }
    }

    let value = fetcher().await?;

    if !bypass {
        cache.lock().unwrap().insert(key, value.clone());
    }

    Ok(value)
}
