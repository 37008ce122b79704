use std::borrow::Cow;
use std::fmt::Display;
use std::str::FromStr;

use chrono::{DateTime, Duration, Utc};
use mongodb::bson::{self, Document};
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize};
use validator::{Validate, ValidationError};

use crate::error::ApiError;
use crate::services::db_models::{
    new_public_id, ClientOrder, Food, Invoice, Menu, OrderItem, PaymentMethod, PaymentStatus,
    RestaurantTable,
};
use crate::services::money::round_to_cents;

/// Missing, `null` and blank strings all mean "not provided".
fn non_blank<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: FromStr,
    T::Err: Display,
{
    match Option::<String>::deserialize(deserializer)? {
        Some(raw) if !raw.trim().is_empty() => raw.parse().map(Some).map_err(D::Error::custom),
        _ => Ok(None),
    }
}

fn check_window(
    start: Option<&DateTime<Utc>>,
    end: Option<&DateTime<Utc>>,
) -> Result<(), ValidationError> {
    match (start, end) {
        (Some(start), Some(end)) if start >= end => Err(ValidationError::new("menu_window")
            .with_message(Cow::Borrowed("start_date must be before end_date"))),
        _ => Ok(()),
    }
}

/// Builds the `$set` document of a partial update. Absent values are skipped.
#[derive(Default)]
struct SetDocument(Document);

impl SetDocument {
    fn field<T: Serialize>(mut self, key: &str, value: Option<T>) -> Result<Self, ApiError> {
        if let Some(value) = value {
            let value = bson::to_bson(&value)
                .map_err(|err| ApiError::BadRequest(format!("{key}: {err}")))?;
            self.0.insert(key, value);
        }

        Ok(self)
    }

    /// Dates go into `$set` as BSON dates, matching how entities store them.
    fn date(mut self, key: &str, value: Option<DateTime<Utc>>) -> Self {
        if let Some(value) = value {
            self.0.insert(key, bson::DateTime::from_chrono(value));
        }

        self
    }

    fn stamped(self, now: DateTime<Utc>) -> Result<Document, ApiError> {
        Ok(self.date("updated_at", Some(now)).0)
    }
}

/// A validated partial payload that can be applied as a `$set`.
pub trait Patch: Validate {
    fn into_set(self, now: DateTime<Utc>) -> Result<Document, ApiError>;
}

#[derive(Debug, Deserialize, Validate)]
pub struct NewFood {
    #[validate(length(min = 2, max = 100))]
    pub name: String,
    #[validate(range(min = 0.0))]
    pub price: f64,
    #[validate(length(min = 1))]
    pub food_image: String,
    #[validate(length(min = 1))]
    pub menu_id: String,
}

impl NewFood {
    pub fn into_food(self, now: DateTime<Utc>) -> Result<Food, ApiError> {
        Ok(Food {
            food_id: new_public_id(),
            name: self.name,
            price: round_to_cents(self.price)?,
            food_image: self.food_image,
            menu_id: self.menu_id,
            created_at: now,
            updated_at: now,
        })
    }
}

#[derive(Debug, Default, Deserialize, Validate)]
pub struct FoodPatch {
    #[serde(default, deserialize_with = "non_blank")]
    #[validate(length(min = 2, max = 100))]
    pub name: Option<String>,
    #[validate(range(min = 0.0))]
    pub price: Option<f64>,
    #[serde(default, deserialize_with = "non_blank")]
    pub food_image: Option<String>,
    #[serde(default, deserialize_with = "non_blank")]
    pub menu_id: Option<String>,
}

impl Patch for FoodPatch {
    fn into_set(self, now: DateTime<Utc>) -> Result<Document, ApiError> {
        let price = self.price.map(round_to_cents).transpose()?;

        SetDocument::default()
            .field("name", self.name)?
            .field("price", price)?
            .field("food_image", self.food_image)?
            .field("menu_id", self.menu_id)?
            .stamped(now)
    }
}

#[derive(Debug, Deserialize, Validate)]
#[validate(schema(function = "validate_new_menu_window"))]
pub struct NewMenu {
    #[validate(length(min = 1, max = 100))]
    pub name: String,
    #[validate(length(min = 1, max = 100))]
    pub category: String,
    #[serde(default)]
    pub start_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub end_date: Option<DateTime<Utc>>,
}

fn validate_new_menu_window(menu: &NewMenu) -> Result<(), ValidationError> {
    check_window(menu.start_date.as_ref(), menu.end_date.as_ref())
}

impl NewMenu {
    pub fn into_menu(self, now: DateTime<Utc>) -> Menu {
        Menu {
            menu_id: new_public_id(),
            name: self.name,
            category: self.category,
            start_date: self.start_date,
            end_date: self.end_date,
            created_at: now,
            updated_at: now,
        }
    }
}

#[derive(Debug, Default, Deserialize, Validate)]
#[validate(schema(function = "validate_menu_patch_window"))]
pub struct MenuPatch {
    #[serde(default, deserialize_with = "non_blank")]
    #[validate(length(max = 100))]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "non_blank")]
    #[validate(length(max = 100))]
    pub category: Option<String>,
    #[serde(default, deserialize_with = "non_blank")]
    pub start_date: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "non_blank")]
    pub end_date: Option<DateTime<Utc>>,
}

fn validate_menu_patch_window(menu: &MenuPatch) -> Result<(), ValidationError> {
    check_window(menu.start_date.as_ref(), menu.end_date.as_ref())
}

impl MenuPatch {
    pub fn touches_window(&self) -> bool {
        self.start_date.is_some() || self.end_date.is_some()
    }

    /// Checks the window that results from applying this patch to `stored`.
    pub fn check_window_against(&self, stored: Option<&Menu>) -> Result<(), ApiError> {
        let start = self
            .start_date
            .or_else(|| stored.and_then(|menu| menu.start_date));
        let end = self.end_date.or_else(|| stored.and_then(|menu| menu.end_date));

        check_window(start.as_ref(), end.as_ref())
            .map_err(|err| ApiError::BadRequest(err.to_string()))
    }
}

impl Patch for MenuPatch {
    fn into_set(self, now: DateTime<Utc>) -> Result<Document, ApiError> {
        SetDocument::default()
            .field("name", self.name)?
            .field("category", self.category)?
            .date("start_date", self.start_date)
            .date("end_date", self.end_date)
            .stamped(now)
    }
}

#[derive(Debug, Deserialize, Validate)]
pub struct NewTable {
    #[validate(range(min = 1))]
    pub table_number: i64,
    #[serde(alias = "capacity")]
    #[validate(range(min = 1))]
    pub number_of_guests: i64,
}

impl NewTable {
    pub fn into_table(self, now: DateTime<Utc>) -> RestaurantTable {
        RestaurantTable {
            table_id: new_public_id(),
            table_number: self.table_number,
            number_of_guests: self.number_of_guests,
            created_at: now,
            updated_at: now,
        }
    }
}

#[derive(Debug, Default, Deserialize, Validate)]
pub struct TablePatch {
    #[validate(range(min = 1))]
    pub table_number: Option<i64>,
    #[serde(default, alias = "capacity")]
    #[validate(range(min = 1))]
    pub number_of_guests: Option<i64>,
}

impl Patch for TablePatch {
    fn into_set(self, now: DateTime<Utc>) -> Result<Document, ApiError> {
        SetDocument::default()
            .field("table_number", self.table_number)?
            .field("number_of_guests", self.number_of_guests)?
            .stamped(now)
    }
}

#[derive(Debug, Default, Deserialize, Validate)]
pub struct NewOrder {
    #[serde(default, deserialize_with = "non_blank")]
    pub table_id: Option<String>,
    #[serde(default)]
    pub order_date: Option<DateTime<Utc>>,
}

impl NewOrder {
    pub fn into_order(self, now: DateTime<Utc>) -> ClientOrder {
        ClientOrder {
            order_id: new_public_id(),
            order_date: self.order_date.unwrap_or(now),
            table_id: self.table_id,
            created_at: now,
            updated_at: now,
        }
    }
}

#[derive(Debug, Default, Deserialize, Validate)]
pub struct OrderPatch {
    #[serde(default, deserialize_with = "non_blank")]
    pub table_id: Option<String>,
    #[serde(default, deserialize_with = "non_blank")]
    pub order_date: Option<DateTime<Utc>>,
}

impl Patch for OrderPatch {
    fn into_set(self, now: DateTime<Utc>) -> Result<Document, ApiError> {
        SetDocument::default()
            .field("table_id", self.table_id)?
            .date("order_date", self.order_date)
            .stamped(now)
    }
}

#[derive(Debug, Serialize, Deserialize, Validate)]
pub struct NewOrderItem {
    #[validate(length(min = 1))]
    pub food_id: String,
    #[validate(range(min = 1))]
    pub quantity: i64,
    #[validate(range(min = 0.0))]
    pub unit_price: f64,
}

impl NewOrderItem {
    pub fn into_order_item(
        self,
        order_id: &str,
        now: DateTime<Utc>,
    ) -> Result<OrderItem, ApiError> {
        Ok(OrderItem {
            order_item_id: new_public_id(),
            order_id: order_id.to_owned(),
            food_id: self.food_id,
            quantity: self.quantity,
            unit_price: round_to_cents(self.unit_price)?,
            created_at: now,
            updated_at: now,
        })
    }
}

/// Line items posted together, either onto an existing order or onto a
/// fresh one opened for `table_id`.
#[derive(Debug, Deserialize, Validate)]
pub struct OrderItemPack {
    #[serde(default, deserialize_with = "non_blank")]
    pub table_id: Option<String>,
    #[serde(default, deserialize_with = "non_blank")]
    pub order_id: Option<String>,
    #[validate(length(min = 1), nested)]
    pub order_items: Vec<NewOrderItem>,
}

#[derive(Debug, Default, Deserialize, Validate)]
pub struct OrderItemPatch {
    #[serde(default, deserialize_with = "non_blank")]
    pub food_id: Option<String>,
    #[validate(range(min = 1))]
    pub quantity: Option<i64>,
    #[validate(range(min = 0.0))]
    pub unit_price: Option<f64>,
}

impl Patch for OrderItemPatch {
    fn into_set(self, now: DateTime<Utc>) -> Result<Document, ApiError> {
        let unit_price = self.unit_price.map(round_to_cents).transpose()?;

        SetDocument::default()
            .field("food_id", self.food_id)?
            .field("quantity", self.quantity)?
            .field("unit_price", unit_price)?
            .stamped(now)
    }
}

#[derive(Debug, Deserialize, Validate)]
pub struct NewInvoice {
    #[validate(length(min = 1))]
    pub order_id: String,
    #[serde(default, deserialize_with = "non_blank")]
    pub payment_method: Option<PaymentMethod>,
    #[serde(default, deserialize_with = "non_blank")]
    pub payment_status: Option<PaymentStatus>,
}

impl NewInvoice {
    /// Unset status means `PENDING`; payment is due one day after creation.
    pub fn into_invoice(self, now: DateTime<Utc>) -> Invoice {
        Invoice {
            invoice_id: new_public_id(),
            order_id: self.order_id,
            payment_method: self.payment_method,
            payment_status: self.payment_status.unwrap_or_default(),
            payment_due_date: now + Duration::days(1),
            created_at: now,
            updated_at: now,
        }
    }
}

#[derive(Debug, Default, Deserialize, Validate)]
pub struct InvoicePatch {
    #[serde(default, deserialize_with = "non_blank")]
    pub payment_method: Option<PaymentMethod>,
    #[serde(default, deserialize_with = "non_blank")]
    pub payment_status: Option<PaymentStatus>,
}

impl Patch for InvoicePatch {
    fn into_set(self, now: DateTime<Utc>) -> Result<Document, ApiError> {
        SetDocument::default()
            .field("payment_method", self.payment_method)?
            .field("payment_status", self.payment_status)?
            .stamped(now)
    }
}
