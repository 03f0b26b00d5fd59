//! HTTP handlers. Thin by design: validate, delegate to the store and the
//! read services, mirror car changes into the search index.

use std::sync::Arc;

use axum::{
    Json,
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
};
use chrono::Utc;
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::warn;

use crate::{
    auth::verify_admin,
    error::AppError,
    featured::{FeaturedContent, load_featured},
    model::{Brand, Car, Category},
    normalize::{normalize_car, slugify},
    search,
    services,
    state::AppState,
    store::{BRANDS, CARS, CATEGORIES},
};

const REQUIRED_CAR_FIELDS: [&str; 7] = [
    "name",
    "brand",
    "model",
    "year",
    "transmission",
    "fuel",
    "dailyPrice",
];

// ---------------------------------------------------------------------------
// Cars

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CarFilters {
    pub brand: Option<String>,
    pub transmission: Option<String>,
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub fuel: Option<String>,
    pub available: Option<bool>,
    pub min_price: Option<f64>,
    pub max_price: Option<f64>,
}

pub async fn list_cars(
    State(state): State<Arc<AppState>>,
    Query(filters): Query<CarFilters>,
) -> Result<Json<Vec<Car>>, AppError> {
    let store = state.store()?;
    Ok(Json(apply_filters(services::all_cars(store).await, &filters)))
}

pub async fn get_car(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<Car>, AppError> {
    let store = state.store()?;
    services::car_by_id(store, &id)
        .await
        .map(Json)
        .ok_or(AppError::NotFound("Car"))
}

pub async fn create_car(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Result<impl IntoResponse, AppError> {
    verify_admin(&headers, &state.config.admin_email_domain)?;
    let store = state.store()?;

    let doc = prepare_new_car(body)?;
    let id = store.insert(CARS, &doc).await?;
    index_car(&state, &doc, &id).await;

    Ok((StatusCode::CREATED, Json(attach_id(doc, &id))))
}

pub async fn update_car(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Result<Json<Value>, AppError> {
    verify_admin(&headers, &state.config.admin_email_domain)?;
    let store = state.store()?;

    let existing = store.get(CARS, &id).await?.ok_or(AppError::NotFound("Car"))?;
    let doc = merge_update(existing, body)?;
    store.put(CARS, &id, &doc).await?;
    index_car(&state, &doc, &id).await;

    Ok(Json(attach_id(doc, &id)))
}

pub async fn delete_car(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> Result<Json<Value>, AppError> {
    verify_admin(&headers, &state.config.admin_email_domain)?;
    let store = state.store()?;

    if !store.delete(CARS, &id).await? {
        return Err(AppError::NotFound("Car"));
    }
    unindex_car(&state, &id).await;

    Ok(Json(json!({ "message": "Car deleted successfully" })))
}

pub async fn featured_cars(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<Car>>, AppError> {
    Ok(Json(services::featured_cars(state.store()?).await?))
}

// ---------------------------------------------------------------------------
// Brands

pub async fn list_brands(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<Brand>>, AppError> {
    Ok(Json(services::all_brands(state.store()?).await))
}

pub async fn get_brand(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<Brand>, AppError> {
    let store = state.store()?;
    services::brand_by_id(store, &id)
        .await
        .map(Json)
        .ok_or(AppError::NotFound("Brand"))
}

pub async fn create_brand(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Result<impl IntoResponse, AppError> {
    verify_admin(&headers, &state.config.admin_email_domain)?;
    let store = state.store()?;

    let doc = prepare_new_brand(body)?;
    let id = store.insert(BRANDS, &doc).await?;

    Ok((StatusCode::CREATED, Json(attach_id(doc, &id))))
}

pub async fn update_brand(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Result<Json<Value>, AppError> {
    verify_admin(&headers, &state.config.admin_email_domain)?;
    let store = state.store()?;

    let existing = store
        .get(BRANDS, &id)
        .await?
        .ok_or(AppError::NotFound("Brand"))?;
    let doc = merge_update(existing, body)?;
    store.put(BRANDS, &id, &doc).await?;

    Ok(Json(attach_id(doc, &id)))
}

pub async fn delete_brand(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> Result<Json<Value>, AppError> {
    verify_admin(&headers, &state.config.admin_email_domain)?;
    let store = state.store()?;

    if !store.delete(BRANDS, &id).await? {
        return Err(AppError::NotFound("Brand"));
    }

    Ok(Json(json!({ "message": "Brand deleted successfully" })))
}

pub async fn featured_brands(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<Brand>>, AppError> {
    Ok(Json(services::featured_brands(state.store()?).await?))
}

// ---------------------------------------------------------------------------
// Categories

pub async fn list_categories(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<Category>>, AppError> {
    Ok(Json(services::all_categories(state.store()?).await))
}

pub async fn get_category(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<Category>, AppError> {
    let store = state.store()?;
    services::category_by_id(store, &id)
        .await
        .map(Json)
        .ok_or(AppError::NotFound("Category"))
}

pub async fn create_category(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Result<impl IntoResponse, AppError> {
    verify_admin(&headers, &state.config.admin_email_domain)?;
    let store = state.store()?;

    let doc = prepare_new_category(body)?;
    let id = store.insert(CATEGORIES, &doc).await?;

    Ok((StatusCode::CREATED, Json(attach_id(doc, &id))))
}

pub async fn update_category(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Result<Json<Value>, AppError> {
    verify_admin(&headers, &state.config.admin_email_domain)?;
    let store = state.store()?;

    let existing = store
        .get(CATEGORIES, &id)
        .await?
        .ok_or(AppError::NotFound("Category"))?;
    let doc = merge_update(existing, body)?;
    store.put(CATEGORIES, &id, &doc).await?;

    Ok(Json(attach_id(doc, &id)))
}

pub async fn delete_category(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> Result<Json<Value>, AppError> {
    verify_admin(&headers, &state.config.admin_email_domain)?;
    let store = state.store()?;

    if !store.delete(CATEGORIES, &id).await? {
        return Err(AppError::NotFound("Category"));
    }

    Ok(Json(json!({ "message": "Category deleted successfully" })))
}

pub async fn featured_categories(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<Category>>, AppError> {
    Ok(Json(services::featured_categories(state.store()?).await?))
}

// ---------------------------------------------------------------------------
// Landing page and search

#[derive(Debug, Default, Deserialize)]
pub struct HomeQuery {
    #[serde(default)]
    pub fresh: bool,
}

pub async fn home_featured(
    State(state): State<Arc<AppState>>,
    Query(query): Query<HomeQuery>,
) -> Result<Json<FeaturedContent>, AppError> {
    Ok(Json(load_featured(&state, query.fresh).await?))
}

#[derive(Debug, Default, Deserialize)]
pub struct SearchQuery {
    #[serde(default)]
    pub q: String,
}

pub async fn search_cars(
    State(state): State<Arc<AppState>>,
    Query(query): Query<SearchQuery>,
) -> Result<Json<Vec<Car>>, AppError> {
    let client = state.search()?;
    Ok(Json(search::search_cars(client, &query.q).await?))
}

// ---------------------------------------------------------------------------
// Payload shaping

fn attach_id(mut doc: Value, id: &str) -> Value {
    doc["id"] = json!(id);
    doc
}

/// Required fields are rejected when absent or falsy, so a zero dailyPrice
/// never reaches the store.
fn is_missing(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => true,
        Some(Value::String(s)) => s.is_empty(),
        Some(Value::Number(n)) => n.as_f64() == Some(0.0),
        Some(Value::Bool(b)) => !b,
        _ => false,
    }
}

fn as_object(body: Value) -> Result<serde_json::Map<String, Value>, AppError> {
    match body {
        Value::Object(map) => Ok(map),
        _ => Err(AppError::Validation("Expected a JSON object".into())),
    }
}

fn prepare_new_car(body: Value) -> Result<Value, AppError> {
    let mut doc = as_object(body)?;

    for field in REQUIRED_CAR_FIELDS {
        if is_missing(doc.get(field)) {
            return Err(AppError::Validation(format!("Missing required field: {field}")));
        }
    }

    let is_available = doc.get("isAvailable").and_then(Value::as_bool).unwrap_or(true);
    let is_featured = doc.get("isFeatured").and_then(Value::as_bool).unwrap_or(false);
    doc.insert("isAvailable".into(), json!(is_available));
    doc.insert("isFeatured".into(), json!(is_featured));
    // Legacy spellings written alongside so old flag queries keep matching.
    doc.insert("available".into(), json!(is_available));
    doc.insert("featured".into(), json!(is_featured));

    doc.entry("mileage").or_insert(json!(0));
    doc.entry("features").or_insert(json!([]));
    doc.entry("images").or_insert(json!([]));

    stamp(&mut doc, true);
    Ok(Value::Object(doc))
}

fn prepare_new_brand(body: Value) -> Result<Value, AppError> {
    let mut doc = as_object(body)?;

    for field in ["name", "logo"] {
        if is_missing(doc.get(field)) {
            return Err(AppError::Validation(format!("Missing required field: {field}")));
        }
    }

    derive_slug(&mut doc);
    let featured = doc.get("featured").and_then(Value::as_bool).unwrap_or(false);
    doc.insert("featured".into(), json!(featured));
    doc.entry("carCount").or_insert(json!(0));

    stamp(&mut doc, true);
    Ok(Value::Object(doc))
}

fn prepare_new_category(body: Value) -> Result<Value, AppError> {
    let mut doc = as_object(body)?;

    if is_missing(doc.get("name")) {
        return Err(AppError::Validation("Missing required field: name".into()));
    }

    derive_slug(&mut doc);
    let featured = doc.get("featured").and_then(Value::as_bool).unwrap_or(false);
    doc.insert("featured".into(), json!(featured));
    doc.entry("carCount").or_insert(json!(0));

    stamp(&mut doc, true);
    Ok(Value::Object(doc))
}

/// Shallow field merge of an update payload over the stored document. The id
/// lives in the hash field, never in the body.
fn merge_update(existing: Value, update: Value) -> Result<Value, AppError> {
    let mut doc = as_object(existing)?;
    let update = as_object(update)?;

    for (key, value) in update {
        if key != "id" {
            doc.insert(key, value);
        }
    }

    stamp(&mut doc, false);
    Ok(Value::Object(doc))
}

fn derive_slug(doc: &mut serde_json::Map<String, Value>) {
    let slug = doc
        .get("slug")
        .and_then(Value::as_str)
        .filter(|slug| !slug.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| slugify(doc.get("name").and_then(Value::as_str).unwrap_or_default()));
    doc.insert("slug".into(), json!(slug));
}

fn stamp(doc: &mut serde_json::Map<String, Value>, created: bool) {
    let now = Utc::now().to_rfc3339();
    if created {
        doc.insert("createdAt".into(), json!(now));
    }
    doc.insert("updatedAt".into(), json!(now));
}

fn apply_filters(cars: Vec<Car>, filters: &CarFilters) -> Vec<Car> {
    cars.into_iter()
        .filter(|car| filters.brand.as_deref().map_or(true, |brand| car.brand == brand))
        .filter(|car| {
            filters
                .transmission
                .as_deref()
                .map_or(true, |transmission| car.transmission == transmission)
        })
        .filter(|car| filters.kind.as_deref().map_or(true, |kind| car.category == kind))
        .filter(|car| filters.fuel.as_deref().map_or(true, |fuel| car.fuel == fuel))
        .filter(|car| filters.available.map_or(true, |available| car.is_available == available))
        .filter(|car| filters.min_price.map_or(true, |min| car.daily_price >= min))
        .filter(|car| filters.max_price.map_or(true, |max| car.daily_price <= max))
        .collect()
}

async fn index_car(state: &AppState, doc: &Value, id: &str) {
    let Some(client) = &state.search else { return };
    // A document the normalizer rejects is not searchable either.
    let Some(car) = normalize_car(doc, id) else { return };
    if let Err(e) = search::upsert_car(client, &car).await {
        warn!("Search index update for car {id} failed: {e}");
    }
}

async fn unindex_car(state: &AppState, id: &str) {
    let Some(client) = &state.search else { return };
    if let Err(e) = search::remove_car(client, id).await {
        warn!("Search index removal for car {id} failed: {e}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::assemble_cars;

    fn car_body() -> Value {
        json!({
            "name": "BMW X5",
            "brand": "BMW",
            "model": "X5",
            "year": 2022,
            "transmission": "Automatic",
            "fuel": "Petrol",
            "dailyPrice": 450,
        })
    }

    #[test]
    fn new_car_gets_defaults_and_legacy_mirrors() {
        let doc = prepare_new_car(car_body()).unwrap();
        assert_eq!(doc["isAvailable"], true);
        assert_eq!(doc["available"], true);
        assert_eq!(doc["isFeatured"], false);
        assert_eq!(doc["featured"], false);
        assert_eq!(doc["mileage"], 0);
        assert_eq!(doc["features"], json!([]));
        assert!(doc["createdAt"].is_string());
        assert_eq!(doc["createdAt"], doc["updatedAt"]);
    }

    #[test]
    fn new_car_rejects_missing_and_falsy_required_fields() {
        let mut body = car_body();
        body.as_object_mut().unwrap().remove("fuel");
        assert!(matches!(prepare_new_car(body), Err(AppError::Validation(_))));

        let mut body = car_body();
        body["dailyPrice"] = json!(0);
        assert!(matches!(prepare_new_car(body), Err(AppError::Validation(_))));

        assert!(prepare_new_car(json!([1, 2])).is_err());
    }

    #[test]
    fn new_category_derives_slug_and_defaults() {
        let doc = prepare_new_category(json!({ "name": "Luxury" })).unwrap();
        assert_eq!(doc["slug"], "luxury");
        assert_eq!(doc["featured"], false);
        assert!(doc["createdAt"].is_string());
        assert!(doc["updatedAt"].is_string());

        // A caller-provided slug is kept as-is.
        let doc = prepare_new_category(json!({ "name": "Luxury", "slug": "vip" })).unwrap();
        assert_eq!(doc["slug"], "vip");
    }

    #[test]
    fn new_brand_requires_logo() {
        let err = prepare_new_brand(json!({ "name": "BMW" }));
        assert!(matches!(err, Err(AppError::Validation(_))));

        let doc = prepare_new_brand(json!({ "name": "Land Rover", "logo": "lr.png" })).unwrap();
        assert_eq!(doc["slug"], "land-rover");
        assert_eq!(doc["carCount"], 0);
    }

    #[test]
    fn merge_update_strips_id_and_bumps_timestamp() {
        let existing = json!({ "name": "Old", "dailyPrice": 100, "updatedAt": "then" });
        let update = json!({ "id": "sneaky", "dailyPrice": 200 });

        let doc = merge_update(existing, update).unwrap();
        assert_eq!(doc["name"], "Old");
        assert_eq!(doc["dailyPrice"], 200);
        assert!(doc.get("id").is_none());
        assert_ne!(doc["updatedAt"], "then");
    }

    #[test]
    fn filters_combine() {
        let docs = vec![
            ("1".to_string(), json!({ "brand": "BMW", "model": "X5", "dailyPrice": 450, "fuel": "Petrol" })),
            ("2".to_string(), json!({ "brand": "BMW", "model": "i4", "dailyPrice": 300, "fuelType": "Electric" })),
            ("3".to_string(), json!({ "brand": "Kia", "model": "Rio", "dailyPrice": 90, "fuel": "Petrol" })),
        ];
        let cars = assemble_cars(docs);

        let filters = CarFilters {
            brand: Some("BMW".into()),
            ..Default::default()
        };
        assert_eq!(apply_filters(cars.clone(), &filters).len(), 2);

        let filters = CarFilters {
            brand: Some("BMW".into()),
            fuel: Some("Electric".into()),
            ..Default::default()
        };
        let filtered = apply_filters(cars.clone(), &filters);
        assert_eq!(filtered.len(), 1);
        assert_eq!(filtered[0].model, "i4");

        let filters = CarFilters {
            min_price: Some(100.0),
            max_price: Some(400.0),
            ..Default::default()
        };
        assert_eq!(apply_filters(cars, &filters).len(), 1);
    }

    #[test]
    fn stored_round_trip_lists_alphabetically() {
        // POST a category without a slug, then confirm the canonical read
        // side sorts it into place.
        let luxury = prepare_new_category(json!({ "name": "Luxury" })).unwrap();
        let vans = prepare_new_category(json!({ "name": "Vans" })).unwrap();
        let economy = prepare_new_category(json!({ "name": "Economy" })).unwrap();

        let docs = vec![
            ("1".to_string(), vans),
            ("2".to_string(), luxury),
            ("3".to_string(), economy),
        ];
        let mut categories = crate::services::assemble_categories(docs);
        categories.sort_by(|a, b| a.name.cmp(&b.name));

        let names: Vec<&str> = categories.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, ["Economy", "Luxury", "Vans"]);
        assert_eq!(categories[1].slug, "luxury");
        assert!(!categories[1].featured);
    }
}
