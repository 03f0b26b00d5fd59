//! Entity read services: every record returned here has passed
//! canonicalization and the validators. Store failures on read paths are
//! logged and collapse to empty results, except the featured lookups, which
//! keep their error so the landing-page aggregator can count failed sources.

use std::collections::HashSet;

use tracing::warn;

use crate::{
    error::AppError,
    model::{Brand, Car, Category},
    normalize::{
        is_valid_brand, is_valid_car, is_valid_category, normalize_brand, normalize_car,
        normalize_category,
    },
    store::{BRANDS, CARS, CATEGORIES, Doc, Store},
};

// Display caps for the landing surfaces.
pub const FEATURED_CAR_CAP: usize = 6;
pub const FEATURED_BRAND_CAP: usize = 8;
pub const FEATURED_CATEGORY_CAP: usize = 6;

// Per-field fetch limits applied before the two flag queries are merged.
const FEATURED_CAR_FETCH: usize = 10;
const FEATURED_BRAND_FETCH: usize = 12;
const FEATURED_CATEGORY_FETCH: usize = 8;

// The featured flag was written under both spellings across time.
pub const FEATURED_FIELD: &str = "featured";
pub const LEGACY_FEATURED_FIELD: &str = "isFeatured";

pub async fn all_cars(store: &Store) -> Vec<Car> {
    match store.list(CARS).await {
        Ok(docs) => assemble_cars(docs),
        Err(e) => {
            warn!("Car listing failed: {e}");
            Vec::new()
        }
    }
}

pub async fn car_by_id(store: &Store, id: &str) -> Option<Car> {
    match store.get(CARS, id).await {
        Ok(Some(raw)) => normalize_car(&raw, id).filter(is_valid_car),
        Ok(None) => None,
        Err(e) => {
            warn!("Car lookup {id} failed: {e}");
            None
        }
    }
}

pub async fn brand_by_id(store: &Store, id: &str) -> Option<Brand> {
    match store.get(BRANDS, id).await {
        Ok(Some(raw)) => normalize_brand(&raw, id).filter(is_valid_brand),
        Ok(None) => None,
        Err(e) => {
            warn!("Brand lookup {id} failed: {e}");
            None
        }
    }
}

pub async fn category_by_id(store: &Store, id: &str) -> Option<Category> {
    match store.get(CATEGORIES, id).await {
        Ok(Some(raw)) => normalize_category(&raw, id).filter(is_valid_category),
        Ok(None) => None,
        Err(e) => {
            warn!("Category lookup {id} failed: {e}");
            None
        }
    }
}

pub async fn all_brands(store: &Store) -> Vec<Brand> {
    let mut brands = match store.list(BRANDS).await {
        Ok(docs) => assemble_brands(docs),
        Err(e) => {
            warn!("Brand listing failed: {e}");
            Vec::new()
        }
    };
    brands.sort_by(|a, b| a.name.cmp(&b.name));
    brands
}

pub async fn all_categories(store: &Store) -> Vec<Category> {
    let mut categories = match store.list(CATEGORIES).await {
        Ok(docs) => assemble_categories(docs),
        Err(e) => {
            warn!("Category listing failed: {e}");
            Vec::new()
        }
    };
    categories.sort_by(|a, b| a.name.cmp(&b.name));
    categories
}

/// Featured lookup: one filtered query per flag spelling, run concurrently,
/// either side tolerating failure on its own. Merged first-occurrence-wins
/// by id, canonicalized, validated, truncated to the display cap.
pub async fn featured_cars(store: &Store) -> Result<Vec<Car>, AppError> {
    let (primary, legacy) = tokio::join!(
        store.find_flagged(CARS, FEATURED_FIELD, FEATURED_CAR_FETCH),
        store.find_flagged(CARS, LEGACY_FEATURED_FIELD, FEATURED_CAR_FETCH),
    );

    let docs = merge_flag_queries(primary, legacy)?;
    Ok(assemble_cars(docs).into_iter().take(FEATURED_CAR_CAP).collect())
}

pub async fn featured_brands(store: &Store) -> Result<Vec<Brand>, AppError> {
    let (primary, legacy) = tokio::join!(
        store.find_flagged(BRANDS, FEATURED_FIELD, FEATURED_BRAND_FETCH),
        store.find_flagged(BRANDS, LEGACY_FEATURED_FIELD, FEATURED_BRAND_FETCH),
    );

    let docs = merge_flag_queries(primary, legacy)?;
    Ok(assemble_brands(docs).into_iter().take(FEATURED_BRAND_CAP).collect())
}

pub async fn featured_categories(store: &Store) -> Result<Vec<Category>, AppError> {
    let (primary, legacy) = tokio::join!(
        store.find_flagged(CATEGORIES, FEATURED_FIELD, FEATURED_CATEGORY_FETCH),
        store.find_flagged(CATEGORIES, LEGACY_FEATURED_FIELD, FEATURED_CATEGORY_FETCH),
    );

    let docs = merge_flag_queries(primary, legacy)?;
    Ok(assemble_categories(docs)
        .into_iter()
        .take(FEATURED_CATEGORY_CAP)
        .collect())
}

/// Joins the two flag-field query outcomes. A single failed side degrades to
/// its sibling's results; only both failing is an error. Duplicated ids keep
/// their first occurrence.
pub(crate) fn merge_flag_queries(
    primary: Result<Vec<Doc>, AppError>,
    legacy: Result<Vec<Doc>, AppError>,
) -> Result<Vec<Doc>, AppError> {
    let (primary, legacy) = match (primary, legacy) {
        (Err(first), Err(second)) => {
            warn!("Both featured queries failed: {first}; {second}");
            return Err(first);
        }
        (primary, legacy) => (
            primary.unwrap_or_else(|e| {
                warn!("Featured query failed: {e}");
                Vec::new()
            }),
            legacy.unwrap_or_else(|e| {
                warn!("Legacy featured query failed: {e}");
                Vec::new()
            }),
        ),
    };

    let mut seen = HashSet::new();
    Ok(primary
        .into_iter()
        .chain(legacy)
        .filter(|(id, _)| seen.insert(id.clone()))
        .collect())
}

pub(crate) fn assemble_cars(docs: Vec<Doc>) -> Vec<Car> {
    docs.iter()
        .filter_map(|(id, raw)| normalize_car(raw, id))
        .filter(is_valid_car)
        .collect()
}

pub(crate) fn assemble_brands(docs: Vec<Doc>) -> Vec<Brand> {
    docs.iter()
        .filter_map(|(id, raw)| normalize_brand(raw, id))
        .filter(is_valid_brand)
        .collect()
}

pub(crate) fn assemble_categories(docs: Vec<Doc>) -> Vec<Category> {
    docs.iter()
        .filter_map(|(id, raw)| normalize_category(raw, id))
        .filter(is_valid_category)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{Value, json};

    fn car_doc(id: &str, flag_field: &str) -> Doc {
        (
            id.to_string(),
            json!({ "brand": "BMW", "model": id, "dailyPrice": 100, flag_field: true }),
        )
    }

    #[test]
    fn merge_keeps_both_flag_spellings() {
        let primary = Ok(vec![car_doc("a", "featured")]);
        let legacy = Ok(vec![car_doc("b", "isFeatured")]);

        let merged = merge_flag_queries(primary, legacy).unwrap();
        let ids: Vec<&str> = merged.iter().map(|(id, _)| id.as_str()).collect();
        assert_eq!(ids, ["a", "b"]);
    }

    #[test]
    fn merge_dedupes_by_id_first_wins() {
        let primary = Ok(vec![
            ("a".to_string(), json!({ "marker": "primary" })),
            ("b".to_string(), Value::Null),
        ]);
        let legacy = Ok(vec![
            ("a".to_string(), json!({ "marker": "legacy" })),
            ("c".to_string(), Value::Null),
        ]);

        let merged = merge_flag_queries(primary, legacy).unwrap();
        assert_eq!(merged.len(), 3);
        assert_eq!(merged[0].1["marker"], "primary");
    }

    #[test]
    fn merge_tolerates_one_failed_side() {
        let legacy = Ok(vec![car_doc("b", "isFeatured")]);
        let merged = merge_flag_queries(Err(AppError::ConfigMissing), legacy).unwrap();
        assert_eq!(merged.len(), 1);
    }

    #[test]
    fn merge_fails_only_when_both_sides_fail() {
        let merged = merge_flag_queries(Err(AppError::ConfigMissing), Err(AppError::ConfigMissing));
        assert!(merged.is_err());
    }

    #[test]
    fn featured_pipeline_caps_and_validates() {
        // Eight mergeable docs, one invalid (no price): cap of six applies
        // after validation drops the bad record.
        let primary: Vec<Doc> = (0..5).map(|i| car_doc(&format!("p{i}"), "featured")).collect();
        let mut legacy: Vec<Doc> = (0..3).map(|i| car_doc(&format!("l{i}"), "isFeatured")).collect();
        legacy.insert(0, ("bad".to_string(), json!({ "brand": "BMW", "isFeatured": true })));

        let docs = merge_flag_queries(Ok(primary), Ok(legacy)).unwrap();
        let cars: Vec<Car> = assemble_cars(docs).into_iter().take(FEATURED_CAR_CAP).collect();

        assert_eq!(cars.len(), FEATURED_CAR_CAP);
        assert!(cars.iter().all(|car| car.id != "bad"));
        assert_eq!(cars[0].id, "p0");
    }

    #[test]
    fn assemble_brands_sorts_nothing_itself() {
        let docs = vec![
            ("z".to_string(), json!({ "name": "Zeekr", "logo": "z.png", "slug": "zeekr" })),
            ("a".to_string(), json!({ "name": "Audi", "logo": "a.png", "slug": "audi" })),
        ];
        let brands = assemble_brands(docs);
        // Store order preserved; alphabetical sorting happens in all_brands.
        assert_eq!(brands[0].name, "Zeekr");
    }

    #[test]
    fn assemble_categories_drops_invalid_kind() {
        let docs = vec![
            ("1".to_string(), json!({ "name": "Luxury", "slug": "luxury", "type": "tag" })),
            ("2".to_string(), json!({ "name": "Odd", "slug": "odd", "type": "mystery" })),
        ];
        let categories = assemble_categories(docs);
        assert_eq!(categories.len(), 1);
        assert_eq!(categories[0].name, "Luxury");
    }
}
