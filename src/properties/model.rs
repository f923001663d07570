//! Property records and sparse updates.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A property listing as stored (plus optional enrichment).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Property {
    /// Assigned by the store; absent on create requests.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub name: String,
    pub description: String,
    pub price: f64,
    pub latitude: f64,
    pub longitude: f64,
    pub user_id: String,
    pub image: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub location: String,
    pub size: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location_point: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location_id: Option<String>,
    /// Owner details from the user service; never written to the store.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_data: Option<Value>,
}

impl Property {
    /// Check field-level constraints, returning every violation.
    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut problems = Vec::new();

        if self.name.trim().is_empty() {
            problems.push("name must not be empty".to_string());
        }
        if self.user_id.trim().is_empty() {
            problems.push("user_id must not be empty".to_string());
        }
        if !self.price.is_finite() || self.price < 0.0 {
            problems.push(format!("price must be a non-negative number, got {}", self.price));
        }
        if !(-90.0..=90.0).contains(&self.latitude) {
            problems.push(format!("latitude must be within [-90, 90], got {}", self.latitude));
        }
        if !(-180.0..=180.0).contains(&self.longitude) {
            problems.push(format!("longitude must be within [-180, 180], got {}", self.longitude));
        }
        if self.size < 0 {
            problems.push(format!("size must be non-negative, got {}", self.size));
        }

        if problems.is_empty() {
            Ok(())
        } else {
            Err(problems)
        }
    }

    /// The row to insert: store-owned and derived fields stripped.
    pub fn for_insert(&self) -> Property {
        Property {
            id: None,
            user_data: None,
            ..self.clone()
        }
    }
}

/// Sparse patch: only fields that are present are changed.
///
/// `null` is treated the same as an absent field.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PropertyUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub price: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latitude: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub longitude: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<i64>,
}

impl PropertyUpdate {
    pub fn is_empty(&self) -> bool {
        self == &PropertyUpdate::default()
    }

    /// Apply the present fields to `property`, leaving the rest untouched.
    pub fn apply_to(&self, property: &mut Property) {
        fn set<T: Clone>(field: &mut T, value: &Option<T>) {
            if let Some(v) = value {
                *field = v.clone();
            }
        }

        set(&mut property.name, &self.name);
        set(&mut property.description, &self.description);
        set(&mut property.price, &self.price);
        set(&mut property.latitude, &self.latitude);
        set(&mut property.longitude, &self.longitude);
        set(&mut property.user_id, &self.user_id);
        set(&mut property.image, &self.image);
        set(&mut property.kind, &self.kind);
        set(&mut property.location, &self.location);
        set(&mut property.size, &self.size);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample() -> Property {
        serde_json::from_value(json!({
            "id": "abc123",
            "name": "Loft",
            "description": "Sunny loft",
            "price": 1200.0,
            "latitude": 52.52,
            "longitude": 13.40,
            "user_id": "u1",
            "image": "loft.png",
            "type": "apartment",
            "location": "Berlin",
            "size": 80,
            "created_at": "2024-01-01T00:00:00Z"
        }))
        .unwrap()
    }

    #[test]
    fn test_type_field_is_renamed_and_extra_columns_ignored() {
        let property = sample();
        assert_eq!(property.kind, "apartment");
        let value = serde_json::to_value(&property).unwrap();
        assert_eq!(value["type"], "apartment");
        assert!(value.get("user_data").is_none());
    }

    #[test]
    fn test_for_insert_strips_store_fields() {
        let mut property = sample();
        property.user_data = Some(json!({"name": "Ada"}));
        let row = serde_json::to_value(property.for_insert()).unwrap();
        assert!(row.get("id").is_none());
        assert!(row.get("user_data").is_none());
        assert_eq!(row["name"], "Loft");
    }

    #[test]
    fn test_validate_collects_all_problems() {
        let mut property = sample();
        property.name = " ".into();
        property.latitude = 91.0;
        property.size = -1;
        let problems = property.validate().unwrap_err();
        assert_eq!(problems.len(), 3);
        assert!(sample().validate().is_ok());
    }

    #[test]
    fn test_sparse_update_serializes_only_present_fields() {
        let patch: PropertyUpdate = serde_json::from_value(json!({"price": 500, "type": null})).unwrap();
        assert!(!patch.is_empty());
        assert_eq!(serde_json::to_value(&patch).unwrap(), json!({"price": 500.0}));
    }

    #[test]
    fn test_empty_update() {
        let patch: PropertyUpdate = serde_json::from_value(json!({})).unwrap();
        assert!(patch.is_empty());
    }

    #[test]
    fn test_apply_only_touches_present_fields() {
        let mut property = sample();
        let patch = PropertyUpdate {
            price: Some(500.0),
            ..Default::default()
        };
        patch.apply_to(&mut property);

        let mut expected = sample();
        expected.price = 500.0;
        assert_eq!(property, expected);
    }
}
