//! # Meilisearch
//!
//! Full-text search over the car fleet, kept in sync with the document
//! store: the whole collection is re-upserted at startup, and every car
//! create/update/delete mirrors the change into the index. Brands and
//! categories are small enough to browse without search and are not indexed.
//!
//! The frontend never talks to Meilisearch directly; `GET /search` proxies
//! queries through this backend so credentials stay server-side and the
//! response carries the same canonical car shape as every other endpoint.

use meilisearch_sdk::{
    client::Client,
    search::SearchResults,
    settings::{MinWordSizeForTypos, Settings, TypoToleranceSettings},
};

use crate::model::Car;

pub const CAR_INDEX: &str = "cars";
pub const CAR_ID: &str = "id";

pub async fn init_search(
    meili_url: &str,
    meili_key: &str,
) -> Result<Client, meilisearch_sdk::errors::Error> {
    let client = Client::new(meili_url, Some(meili_key))?;
    client.index(CAR_INDEX).set_settings(&index_settings()).await?;
    Ok(client)
}

/// Full re-upsert of the fleet, awaited to completion. Startup only.
pub async fn sync_cars(client: &Client, cars: &[Car]) -> Result<(), meilisearch_sdk::errors::Error> {
    client
        .index(CAR_INDEX)
        .add_or_update(cars, Some(CAR_ID))
        .await?
        .wait_for_completion(client, None, None)
        .await?;

    Ok(())
}

/// Single-document upsert on the write path. The task is enqueued, not
/// awaited; the store is the source of truth and the index trails it.
pub async fn upsert_car(client: &Client, car: &Car) -> Result<(), meilisearch_sdk::errors::Error> {
    client
        .index(CAR_INDEX)
        .add_or_update(std::slice::from_ref(car), Some(CAR_ID))
        .await?;

    Ok(())
}

pub async fn remove_car(client: &Client, id: &str) -> Result<(), meilisearch_sdk::errors::Error> {
    client.index(CAR_INDEX).delete_document(id).await?;
    Ok(())
}

pub async fn search_cars(
    client: &Client,
    query: &str,
) -> Result<Vec<Car>, meilisearch_sdk::errors::Error> {
    let results: SearchResults<Car> = client
        .index(CAR_INDEX)
        .search()
        .with_query(query)
        .execute()
        .await?;

    Ok(results.hits.into_iter().map(|hit| hit.result).collect())
}

fn index_settings() -> Settings {
    Settings::new()
        .with_ranking_rules([
            "words",
            "typo",
            "proximity",
            "exactness",
            "attribute",
            "sort",
        ])
        .with_searchable_attributes(["name", "brand", "model"])
        .with_filterable_attributes(["brand", "category", "fuel", "transmission", "isAvailable"])
        .with_sortable_attributes(["dailyPrice", "year"])
        .with_typo_tolerance(TypoToleranceSettings {
            enabled: Some(true),
            disable_on_attributes: None,
            disable_on_words: None,
            min_word_size_for_typos: Some(MinWordSizeForTypos {
                one_typo: Some(5),
                two_typos: Some(9),
            }),
        })
}
