//! Canonicalization of schema-drifted store documents.
//!
//! Every document read from the store passes through one of these functions
//! before it reaches any caller. Alias resolution order per field: canonical
//! name, then legacy alias, then a contextual default. Rejection is `None`,
//! never an error; the failure is logged and the record excluded.

use chrono::{Datelike, Utc};
use serde_json::Value;
use tracing::warn;

use crate::model::{Brand, Car, Category, CategoryKind};

fn str_field(raw: &Value, key: &str) -> Option<String> {
    raw.get(key)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
}

fn num_field(raw: &Value, key: &str) -> Option<f64> {
    // Type check only, never string parsing.
    raw.get(key).and_then(Value::as_f64)
}

fn bool_field(raw: &Value, key: &str) -> Option<bool> {
    raw.get(key).and_then(Value::as_bool)
}

fn string_list(raw: &Value, key: &str) -> Vec<String> {
    match raw.get(key).and_then(Value::as_array) {
        Some(items) => items
            .iter()
            .filter_map(Value::as_str)
            .filter(|item| !item.is_empty())
            .map(str::to_string)
            .collect(),
        None => Vec::new(),
    }
}

pub fn normalize_car(raw: &Value, id: &str) -> Option<Car> {
    if !raw.is_object() {
        warn!("Invalid car document {id}");
        return None;
    }

    let name = str_field(raw, "name").unwrap_or_else(|| {
        format!(
            "{} {}",
            str_field(raw, "brand").unwrap_or_else(|| "Unknown".into()),
            str_field(raw, "model").unwrap_or_else(|| "Model".into())
        )
    });

    let car = Car {
        id: id.to_string(),
        brand: str_field(raw, "brand").unwrap_or_else(|| "Unknown Brand".into()),
        model: str_field(raw, "model")
            .or_else(|| str_field(raw, "name"))
            .unwrap_or_else(|| "Unknown Model".into()),
        name,
        year: num_field(raw, "year")
            .map(|year| year as i32)
            .unwrap_or_else(|| Utc::now().year()),
        transmission: str_field(raw, "transmission").unwrap_or_else(|| "Automatic".into()),
        fuel: str_field(raw, "fuel")
            .or_else(|| str_field(raw, "fuelType"))
            .unwrap_or_else(|| "Petrol".into()),
        mileage: num_field(raw, "mileage").unwrap_or(0.0),
        daily_price: num_field(raw, "dailyPrice").unwrap_or(0.0),
        images: string_list(raw, "images"),
        description: str_field(raw, "description").unwrap_or_default(),
        features: string_list(raw, "features"),
        category: str_field(raw, "category")
            .or_else(|| str_field(raw, "type"))
            .unwrap_or_else(|| "Sedan".into()),
        is_available: bool_field(raw, "isAvailable")
            .or_else(|| bool_field(raw, "available"))
            .unwrap_or(true),
        is_featured: bool_field(raw, "isFeatured")
            .or_else(|| bool_field(raw, "featured"))
            .unwrap_or(false),
        fuel_type: str_field(raw, "fuelType"),
        kind: str_field(raw, "type"),
        available: bool_field(raw, "available"),
        featured: bool_field(raw, "featured"),
    };

    if car.brand.is_empty() || car.name.is_empty() || car.daily_price <= 0.0 {
        warn!(
            "Car {id} rejected: brand={:?} name={:?} dailyPrice={}",
            car.brand, car.name, car.daily_price
        );
        return None;
    }

    Some(car)
}

pub fn normalize_brand(raw: &Value, id: &str) -> Option<Brand> {
    let (Some(name), Some(logo), Some(slug)) = (
        str_field(raw, "name"),
        str_field(raw, "logo"),
        str_field(raw, "slug"),
    ) else {
        warn!("Brand {id} missing required fields");
        return None;
    };

    Some(Brand {
        id: id.to_string(),
        name,
        logo,
        slug,
        featured: bool_field(raw, "featured")
            .or_else(|| bool_field(raw, "isFeatured"))
            .unwrap_or(false),
        car_count: num_field(raw, "carCount").map(|count| count as u32).unwrap_or(0),
    })
}

pub fn normalize_category(raw: &Value, id: &str) -> Option<Category> {
    let (Some(name), Some(slug)) = (str_field(raw, "name"), str_field(raw, "slug")) else {
        warn!("Category {id} missing required fields");
        return None;
    };

    let kind = match str_field(raw, "type") {
        Some(value) => match CategoryKind::from_raw(&value) {
            Some(kind) => kind,
            None => {
                warn!("Category {id} has unknown type {value:?}");
                return None;
            }
        },
        None => CategoryKind::CarType,
    };

    Some(Category {
        id: id.to_string(),
        name,
        slug,
        kind,
        image: str_field(raw, "image"),
        description: str_field(raw, "description"),
        car_count: num_field(raw, "carCount").map(|count| count as u32).unwrap_or(0),
        featured: bool_field(raw, "featured")
            .or_else(|| bool_field(raw, "isFeatured"))
            .unwrap_or(false),
    })
}

// Last-resort shape checks, independent of normalization. A malformed record
// must never reach a caller even if canonicalization is bypassed.

pub fn is_valid_car(car: &Car) -> bool {
    !car.id.is_empty()
        && !car.brand.is_empty()
        && !car.model.is_empty()
        && !car.name.is_empty()
        && car.daily_price > 0.0
}

pub fn is_valid_brand(brand: &Brand) -> bool {
    !brand.id.is_empty()
        && !brand.name.is_empty()
        && !brand.logo.is_empty()
        && !brand.slug.is_empty()
}

pub fn is_valid_category(category: &Category) -> bool {
    !category.name.is_empty() && !category.slug.is_empty()
}

/// URL-safe identifier derived from a display name: lowercased, runs of
/// non-alphanumeric characters collapsed to a single dash.
pub fn slugify(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    let mut pending_dash = false;
    for ch in name.chars() {
        if ch.is_ascii_alphanumeric() {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            slug.push(ch.to_ascii_lowercase());
            pending_dash = false;
        } else {
            pending_dash = true;
        }
    }
    slug
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn car_legacy_aliases_resolve() {
        let raw = json!({
            "brand": "Toyota",
            "model": "Camry",
            "dailyPrice": 120,
            "fuelType": "Diesel",
            "type": "Sedan",
            "available": false,
            "featured": true,
        });

        let car = normalize_car(&raw, "c1").unwrap();
        assert_eq!(car.fuel, "Diesel");
        assert_eq!(car.category, "Sedan");
        assert!(!car.is_available);
        assert!(car.is_featured);
        // Legacy names still carried for old callers.
        assert_eq!(car.fuel_type.as_deref(), Some("Diesel"));
        assert_eq!(car.available, Some(false));
        assert_eq!(car.featured, Some(true));
    }

    #[test]
    fn car_canonical_fields_win_over_aliases() {
        let raw = json!({
            "brand": "Audi",
            "model": "A4",
            "dailyPrice": 200,
            "fuel": "Petrol",
            "fuelType": "Diesel",
            "category": "Sedan",
            "type": "Coupe",
            "isAvailable": true,
            "available": false,
        });

        let car = normalize_car(&raw, "c2").unwrap();
        assert_eq!(car.fuel, "Petrol");
        assert_eq!(car.category, "Sedan");
        assert!(car.is_available);
    }

    #[test]
    fn car_name_derives_from_brand_and_model() {
        let raw = json!({ "brand": "Nissan", "model": "Patrol", "dailyPrice": 300 });
        let car = normalize_car(&raw, "c3").unwrap();
        assert_eq!(car.name, "Nissan Patrol");
    }

    #[test]
    fn car_rejected_without_positive_price() {
        let missing = json!({ "brand": "Kia", "model": "Rio" });
        assert!(normalize_car(&missing, "c4").is_none());

        let zero = json!({ "brand": "Kia", "model": "Rio", "dailyPrice": 0 });
        assert!(normalize_car(&zero, "c5").is_none());

        let negative = json!({ "brand": "Kia", "model": "Rio", "dailyPrice": -5 });
        assert!(normalize_car(&negative, "c6").is_none());

        // A stringly-typed price is not parsed; it falls back to the
        // rejection default.
        let stringly = json!({ "brand": "Kia", "model": "Rio", "dailyPrice": "99" });
        assert!(normalize_car(&stringly, "c7").is_none());
    }

    #[test]
    fn car_arrays_coerce_and_drop_non_strings() {
        let raw = json!({
            "brand": "Ford",
            "model": "Focus",
            "dailyPrice": 90,
            "images": ["a.jpg", 7, null, "b.jpg"],
            "features": "leather",
        });

        let car = normalize_car(&raw, "c8").unwrap();
        assert_eq!(car.images, vec!["a.jpg", "b.jpg"]);
        assert!(car.features.is_empty());
    }

    #[test]
    fn brand_requires_name_logo_slug() {
        let raw = json!({ "name": "BMW", "logo": "bmw.png" });
        assert!(normalize_brand(&raw, "b1").is_none());

        let raw = json!({ "name": "BMW", "logo": "bmw.png", "slug": "bmw", "isFeatured": true });
        let brand = normalize_brand(&raw, "b1").unwrap();
        assert!(brand.featured);
        assert_eq!(brand.car_count, 0);
    }

    #[test]
    fn category_rejects_unknown_kind() {
        let raw = json!({ "name": "SUVs", "slug": "suvs", "type": "bodyStyle" });
        assert!(normalize_category(&raw, "k1").is_none());

        let raw = json!({ "name": "SUVs", "slug": "suvs" });
        let category = normalize_category(&raw, "k1").unwrap();
        assert_eq!(category.kind, CategoryKind::CarType);
    }

    #[test]
    fn validators_hold_the_line() {
        let raw = json!({ "brand": "Mini", "model": "Cooper", "dailyPrice": 150 });
        let mut car = normalize_car(&raw, "c9").unwrap();
        assert!(is_valid_car(&car));
        car.daily_price = 0.0;
        assert!(!is_valid_car(&car));
    }

    #[test]
    fn slugify_examples() {
        assert_eq!(slugify("Luxury"), "luxury");
        assert_eq!(slugify("Sports & Super Cars"), "sports-super-cars");
        assert_eq!(slugify("  SUV  "), "suv");
    }
}
