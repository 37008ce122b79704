use std::fmt::{Display, Formatter};
use std::str::FromStr;

use chrono::{DateTime, SubsecRound, Utc};
use mongodb::bson::oid::ObjectId;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// A document kind owned by one collection and addressed by a public string id.
pub trait Entity: Serialize + DeserializeOwned + Send + Sync {
    const COLLECTION: &'static str;
    /// Field holding the public id. The stored `_id` is the same value as an ObjectId.
    const ID_FIELD: &'static str;
    /// Key of the list in a paginated response.
    const LIST_KEY: &'static str;
    /// Human-readable name used in error messages.
    const LABEL: &'static str;

    fn public_id(&self) -> &str;
}

/// Fresh public id: the hex form of a new ObjectId.
pub fn new_public_id() -> String {
    ObjectId::new().to_hex()
}

/// Current instant at second precision.
pub fn timestamp() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(0)
}

/// Timestamps are BSON dates in storage and RFC 3339 strings on the wire.
///
/// The store encodes documents with a serializer that is not human readable,
/// which is what selects the BSON date form.
pub mod stored_datetime {
    use super::*;
    use mongodb::bson;

    pub fn serialize<S: Serializer>(
        value: &DateTime<Utc>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        if serializer.is_human_readable() {
            value.serialize(serializer)
        } else {
            bson::DateTime::from_chrono(*value).serialize(serializer)
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<DateTime<Utc>, D::Error> {
        if deserializer.is_human_readable() {
            DateTime::<Utc>::deserialize(deserializer)
        } else {
            bson::DateTime::deserialize(deserializer).map(bson::DateTime::to_chrono)
        }
    }
}

pub mod stored_datetime_optional {
    use super::*;
    use mongodb::bson;

    pub fn serialize<S: Serializer>(
        value: &Option<DateTime<Utc>>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        if serializer.is_human_readable() {
            value.serialize(serializer)
        } else {
            value.map(bson::DateTime::from_chrono).serialize(serializer)
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<DateTime<Utc>>, D::Error> {
        if deserializer.is_human_readable() {
            Option::<DateTime<Utc>>::deserialize(deserializer)
        } else {
            Option::<bson::DateTime>::deserialize(deserializer)
                .map(|value| value.map(bson::DateTime::to_chrono))
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Food {
    pub food_id: String,
    pub name: String,
    pub price: f64,
    pub food_image: String,
    pub menu_id: String,
    #[serde(with = "stored_datetime")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "stored_datetime")]
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Menu {
    pub menu_id: String,
    pub name: String,
    pub category: String,
    #[serde(
        with = "stored_datetime_optional",
        skip_serializing_if = "Option::is_none"
    )]
    pub start_date: Option<DateTime<Utc>>,
    #[serde(
        with = "stored_datetime_optional",
        skip_serializing_if = "Option::is_none"
    )]
    pub end_date: Option<DateTime<Utc>>,
    #[serde(with = "stored_datetime")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "stored_datetime")]
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RestaurantTable {
    pub table_id: String,
    pub table_number: i64,
    pub number_of_guests: i64,
    #[serde(with = "stored_datetime")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "stored_datetime")]
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientOrder {
    pub order_id: String,
    #[serde(with = "stored_datetime")]
    pub order_date: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub table_id: Option<String>,
    #[serde(with = "stored_datetime")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "stored_datetime")]
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OrderItem {
    pub order_item_id: String,
    pub order_id: String,
    pub food_id: String,
    pub quantity: i64,
    pub unit_price: f64,
    #[serde(with = "stored_datetime")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "stored_datetime")]
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Invoice {
    pub invoice_id: String,
    pub order_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payment_method: Option<PaymentMethod>,
    pub payment_status: PaymentStatus,
    #[serde(with = "stored_datetime")]
    pub payment_due_date: DateTime<Utc>,
    #[serde(with = "stored_datetime")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "stored_datetime")]
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum PaymentStatus {
    #[default]
    Pending,
    Paid,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum PaymentMethod {
    Card,
    Cash,
}

impl PaymentMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentMethod::Card => "CARD",
            PaymentMethod::Cash => "CASH",
        }
    }
}

#[derive(Debug, PartialEq, Eq)]
pub struct UnknownVariant {
    expected: &'static str,
    found: String,
}

impl Display for UnknownVariant {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "unknown value `{}`, expected one of {}", self.found, self.expected)
    }
}

impl FromStr for PaymentStatus {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PENDING" => Ok(PaymentStatus::Pending),
            "PAID" => Ok(PaymentStatus::Paid),
            other => Err(UnknownVariant {
                expected: "PENDING, PAID",
                found: other.to_owned(),
            }),
        }
    }
}

impl FromStr for PaymentMethod {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "CARD" => Ok(PaymentMethod::Card),
            "CASH" => Ok(PaymentMethod::Cash),
            other => Err(UnknownVariant {
                expected: "CARD, CASH",
                found: other.to_owned(),
            }),
        }
    }
}

impl Entity for Food {
    const COLLECTION: &'static str = "food";
    const ID_FIELD: &'static str = "food_id";
    const LIST_KEY: &'static str = "food_items";
    const LABEL: &'static str = "food item";

    fn public_id(&self) -> &str {
        &self.food_id
    }
}

impl Entity for Menu {
    const COLLECTION: &'static str = "menu";
    const ID_FIELD: &'static str = "menu_id";
    const LIST_KEY: &'static str = "menus";
    const LABEL: &'static str = "menu";

    fn public_id(&self) -> &str {
        &self.menu_id
    }
}

impl Entity for RestaurantTable {
    const COLLECTION: &'static str = "table";
    const ID_FIELD: &'static str = "table_id";
    const LIST_KEY: &'static str = "tables";
    const LABEL: &'static str = "table";

    fn public_id(&self) -> &str {
        &self.table_id
    }
}

impl Entity for ClientOrder {
    const COLLECTION: &'static str = "order";
    const ID_FIELD: &'static str = "order_id";
    const LIST_KEY: &'static str = "orders";
    const LABEL: &'static str = "order";

    fn public_id(&self) -> &str {
        &self.order_id
    }
}

impl Entity for OrderItem {
    const COLLECTION: &'static str = "orderItem";
    const ID_FIELD: &'static str = "order_item_id";
    const LIST_KEY: &'static str = "order_items";
    const LABEL: &'static str = "order item";

    fn public_id(&self) -> &str {
        &self.order_item_id
    }
}

impl Entity for Invoice {
    const COLLECTION: &'static str = "invoice";
    const ID_FIELD: &'static str = "invoice_id";
    const LIST_KEY: &'static str = "invoices";
    const LABEL: &'static str = "invoice";

    fn public_id(&self) -> &str {
        &self.invoice_id
    }
}
