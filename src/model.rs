//! Canonical entity types.
//!
//! Stored documents drifted over time: some were written with `fuel`,
//! `category`, `isAvailable`, `isFeatured`, others with `fuelType`, `type`,
//! `available`, `featured`. These structs are the single authoritative
//! in-process shape after alias resolution. The legacy-named fields are kept
//! on the wire for callers still reading the old names.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Car {
    pub id: String,
    pub brand: String,
    pub model: String,
    pub name: String,
    pub year: i32,
    pub transmission: String,
    pub fuel: String,
    pub mileage: f64,
    pub daily_price: f64,
    pub images: Vec<String>,
    pub description: String,
    pub features: Vec<String>,
    pub category: String,
    pub is_available: bool,
    pub is_featured: bool,

    // Legacy aliases, preserved for backward-compatible callers.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fuel_type: Option<String>,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub available: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub featured: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Brand {
    pub id: String,
    pub name: String,
    pub logo: String,
    pub slug: String,
    pub featured: bool,
    pub car_count: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Category {
    pub id: String,
    pub name: String,
    pub slug: String,
    #[serde(rename = "type")]
    pub kind: CategoryKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub car_count: u32,
    pub featured: bool,
}

/// Closed set of category kinds. Anything else in a stored document is a
/// data error and the document is dropped during normalization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CategoryKind {
    #[serde(rename = "carType")]
    CarType,
    #[serde(rename = "fuelType")]
    FuelType,
    #[serde(rename = "tag")]
    Tag,
}

impl CategoryKind {
    pub fn from_raw(value: &str) -> Option<Self> {
        match value {
            "carType" => Some(Self::CarType),
            "fuelType" => Some(Self::FuelType),
            "tag" => Some(Self::Tag),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn car_serializes_with_wire_field_names() {
        let car = Car {
            id: "c1".into(),
            brand: "BMW".into(),
            model: "X5".into(),
            name: "BMW X5".into(),
            year: 2022,
            transmission: "Automatic".into(),
            fuel: "Petrol".into(),
            mileage: 12000.0,
            daily_price: 450.0,
            images: vec![],
            description: String::new(),
            features: vec![],
            category: "SUV".into(),
            is_available: true,
            is_featured: false,
            fuel_type: Some("Petrol".into()),
            kind: None,
            available: None,
            featured: Some(true),
        };

        let value = serde_json::to_value(&car).unwrap();
        assert_eq!(value["dailyPrice"], 450.0);
        assert_eq!(value["isAvailable"], true);
        assert_eq!(value["fuelType"], "Petrol");
        assert_eq!(value["featured"], true);
        assert!(value.get("type").is_none());
        assert!(value.get("available").is_none());
    }

    #[test]
    fn category_kind_round_trips() {
        for raw in ["carType", "fuelType", "tag"] {
            let kind = CategoryKind::from_raw(raw).unwrap();
            assert_eq!(serde_json::to_value(kind).unwrap(), raw);
        }
        assert!(CategoryKind::from_raw("suv").is_none());
    }
}
