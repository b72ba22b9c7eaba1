use crate::error::DocumentError;
use serde::{Deserialize, Deserializer, Serialize, de::DeserializeOwned};
use serde_json::{Map, Number, Value};

pub const ORDERS: &str = "orders";
pub const PRODUCTS: &str = "products";

/// A stored document: opaque id plus its top-level field map.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub id: String,
    pub fields: Map<String, Value>,
}

impl Document {
    pub fn new(id: impl Into<String>, fields: Map<String, Value>) -> Self {
        Self {
            id: id.into(),
            fields,
        }
    }

    /// Build from a JSON value. Anything but an object yields an empty field map.
    pub fn from_value(id: impl Into<String>, value: Value) -> Self {
        let fields = match value {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        Self::new(id, fields)
    }

    /// True when the field exists, even if it holds null.
    pub fn has(&self, field: &str) -> bool {
        self.fields.contains_key(field)
    }

    /// True when the field exists and is not null.
    pub fn is_set(&self, field: &str) -> bool {
        matches!(self.fields.get(field), Some(v) if !v.is_null())
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields.get(field)
    }

    /// Deserialize a typed schema view of this document.
    pub fn view<T: DeserializeOwned>(&self) -> Result<T, DocumentError> {
        from_json(Value::Object(self.fields.clone()))
    }
}

/// Tri-state field: absent from the document, stored as null, or holding a value.
///
/// Use with `#[serde(default)]` so a missing key becomes `Absent`.
#[derive(Clone, Debug, PartialEq)]
pub enum Presence<T> {
    Absent,
    Null,
    Value(T),
}

impl<T> Default for Presence<T> {
    fn default() -> Self {
        Presence::Absent
    }
}

impl<T> Presence<T> {
    pub fn is_absent(&self) -> bool {
        matches!(self, Presence::Absent)
    }

}

impl Presence<Value> {
    /// The value as stored, with null kept as `Value::Null`; `None` only when absent.
    pub fn stored(&self) -> Option<Value> {
        match self {
            Presence::Absent => None,
            Presence::Null => Some(Value::Null),
            Presence::Value(v) => Some(v.clone()),
        }
    }
}

impl<'de, T: Deserialize<'de>> Deserialize<'de> for Presence<T> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Ok(match Option::<T>::deserialize(deserializer)? {
            Some(v) => Presence::Value(v),
            None => Presence::Null,
        })
    }
}

fn from_json<T: DeserializeOwned>(value: Value) -> Result<T, DocumentError> {
    T::deserialize(value).map_err(|e| DocumentError::Malformed {
        reason: e.to_string(),
    })
}

/// Accepts any JSON; yields `Some` only when the field holds a list.
fn list_or_none<'de, D, T>(deserializer: D) -> Result<Option<Vec<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    match Value::deserialize(deserializer)? {
        v @ Value::Array(_) => serde_json::from_value(v)
            .map(Some)
            .map_err(serde::de::Error::custom),
        _ => Ok(None),
    }
}

// orders

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderDoc {
    /// Kept raw; only the first entry is ever read.
    #[serde(default)]
    pub items: Option<Vec<Value>>,
    #[serde(default)]
    pub pickup_date: Presence<Value>,
    #[serde(default)]
    pub pickup_deadline_date: Presence<Value>,
}

impl OrderDoc {
    /// The representative item: orders are backfilled from their first line.
    pub fn first_item(&self) -> Result<Option<OrderItem>, DocumentError> {
        match self.items.as_deref().and_then(<[Value]>::first) {
            Some(item) => from_json(item.clone()).map(Some),
            None => Ok(None),
        }
    }
}

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderItem {
    #[serde(default)]
    pub product_id: Option<String>,
    #[serde(default)]
    pub round_id: Option<String>,
}

// products

/// Sales-history side of a product, as read by the order backfill.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductHistory {
    /// Rounds are matched on their raw `roundId`; siblings are never deserialized.
    #[serde(default)]
    pub sales_history: Option<Vec<Value>>,
}

impl ProductHistory {
    /// First round carrying `round_id`.
    pub fn round(&self, round_id: &str) -> Result<Option<SalesRound>, DocumentError> {
        let matched = self
            .sales_history
            .as_deref()
            .unwrap_or_default()
            .iter()
            .find(|r| r.get("roundId").and_then(Value::as_str) == Some(round_id));
        match matched {
            Some(round) => from_json(round.clone()).map(Some),
            None => Ok(None),
        }
    }
}

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SalesRound {
    #[serde(default)]
    pub round_id: Option<String>,
    #[serde(default)]
    pub pickup_date: Presence<Value>,
    #[serde(default)]
    pub pickup_deadline_date: Presence<Value>,
}

/// Product in the legacy shape (`name`, `pricingOptions`, top-level stock fields).
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LegacyProduct {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "list_or_none")]
    pub pricing_options: Option<Vec<PricingOption>>,
    #[serde(default)]
    pub price: Option<Number>,
    #[serde(default)]
    pub stock: Option<Number>,
    #[serde(default)]
    pub unit_type: Option<String>,
    #[serde(default)]
    pub max_order_per_person: Option<Value>,
    #[serde(default)]
    pub expiration_date: Option<Value>,
}

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PricingOption {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub price: Option<Number>,
    #[serde(default)]
    pub stock: Option<Number>,
    #[serde(default)]
    pub unit: Option<String>,
    #[serde(default)]
    pub limit_quantity: Option<Value>,
    #[serde(default)]
    pub expiration_date: Option<Value>,
}

/// One purchasable item of a product in the target schema.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductItem {
    pub name: String,
    pub price: Number,
    /// `-1` means unlimited.
    pub stock: Number,
    pub unit_type: String,
    pub limit_quantity: Option<Value>,
    pub expiration_date: Option<Value>,
}
