//! Read-side compositions: the per-order line aggregate and the invoice view
//! built on top of it.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use mongodb::bson::doc;
use rust_decimal::Decimal;
use serde::Serialize;

use crate::error::ApiError;
use crate::services::db_models::{
    ClientOrder, Food, Invoice, OrderItem, PaymentStatus, RestaurantTable,
};
use crate::services::db_utils::AppState;
use crate::services::handling::{fetch, find};
use crate::services::money::{line_amount, to_f64, MoneyError};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OrderLine {
    pub order_item_id: String,
    pub food_id: String,
    pub food_name: Option<String>,
    pub food_image: Option<String>,
    pub quantity: i64,
    pub unit_price: f64,
    pub amount: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OrderItemsAggregate {
    pub order_id: String,
    pub payment_due: f64,
    pub table_number: Option<i64>,
    pub order_items: Vec<OrderLine>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InvoiceView {
    pub invoice_id: String,
    pub order_id: String,
    pub payment_method: String,
    pub payment_status: PaymentStatus,
    pub payment_due: f64,
    pub table_number: Option<i64>,
    pub payment_due_date: DateTime<Utc>,
    pub order_details: Vec<OrderLine>,
}

fn corrupt(err: MoneyError) -> ApiError {
    ApiError::Internal(format!("stored order item is invalid: {err}"))
}

/// Folds line items into priced lines and their total.
fn price_lines(
    items: Vec<OrderItem>,
    foods: &HashMap<String, Option<Food>>,
) -> Result<(Vec<OrderLine>, Decimal), MoneyError> {
    let mut due = Decimal::ZERO;
    let mut lines = Vec::with_capacity(items.len());

    for item in items {
        let amount = line_amount(item.unit_price, item.quantity)?;
        due = due
            .checked_add(amount)
            .ok_or(MoneyError::OutOfRange(item.unit_price))?;

        let food = foods.get(&item.food_id).and_then(Option::as_ref);
        lines.push(OrderLine {
            order_item_id: item.order_item_id,
            food_name: food.map(|food| food.name.clone()),
            food_image: food.map(|food| food.food_image.clone()),
            food_id: item.food_id,
            quantity: item.quantity,
            unit_price: item.unit_price,
            amount: to_f64(amount),
        });
    }

    Ok((lines, due))
}

pub async fn items_by_order(
    state: &AppState,
    order_id: &str,
) -> Result<OrderItemsAggregate, ApiError> {
    let order = fetch::<ClientOrder>(state, order_id).await?;

    let table_number = match order.table_id.as_deref() {
        Some(table_id) => find::<RestaurantTable>(state, table_id)
            .await?
            .map(|table| table.table_number),
        None => None,
    };

    let items = state
        .store
        .find_many::<OrderItem>(doc! { "order_id": order_id })
        .await
        .map_err(|err| ApiError::store("error occurred while listing order items", err))?;

    let mut foods = HashMap::new();
    for item in &items {
        if !foods.contains_key(&item.food_id) {
            let food = find::<Food>(state, &item.food_id).await?;
            foods.insert(item.food_id.clone(), food);
        }
    }

    let (order_items, due) = price_lines(items, &foods).map_err(corrupt)?;

    Ok(OrderItemsAggregate {
        order_id: order.order_id,
        payment_due: to_f64(due),
        table_number,
        order_items,
    })
}

impl InvoiceView {
    pub fn compose(invoice: Invoice, aggregate: OrderItemsAggregate) -> Self {
        Self {
            invoice_id: invoice.invoice_id,
            order_id: invoice.order_id,
            payment_method: invoice
                .payment_method
                .map_or("null", |method| method.as_str())
                .to_owned(),
            payment_status: invoice.payment_status,
            payment_due: aggregate.payment_due,
            table_number: aggregate.table_number,
            payment_due_date: invoice.payment_due_date,
            order_details: aggregate.order_items,
        }
    }
}

pub async fn invoice_view(state: &AppState, invoice_id: &str) -> Result<InvoiceView, ApiError> {
    let invoice = fetch::<Invoice>(state, invoice_id).await?;
    let aggregate = items_by_order(state, &invoice.order_id).await?;

    Ok(InvoiceView::compose(invoice, aggregate))
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;
    use crate::services::db_models::PaymentMethod;

    fn noon() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 10, 18, 12, 0, 0).unwrap()
    }

    fn item(id: &str, food_id: &str, quantity: i64, unit_price: f64) -> OrderItem {
        OrderItem {
            order_item_id: id.to_owned(),
            order_id: "o1".to_owned(),
            food_id: food_id.to_owned(),
            quantity,
            unit_price,
            created_at: noon(),
            updated_at: noon(),
        }
    }

    fn invoice(payment_method: Option<PaymentMethod>) -> Invoice {
        Invoice {
            invoice_id: "i1".to_owned(),
            order_id: "o1".to_owned(),
            payment_method,
            payment_status: PaymentStatus::Pending,
            payment_due_date: noon(),
            created_at: noon(),
            updated_at: noon(),
        }
    }

    fn soup() -> Food {
        Food {
            food_id: "f1".to_owned(),
            name: "Soup".to_owned(),
            price: 4.5,
            food_image: "soup.png".to_owned(),
            menu_id: "m1".to_owned(),
            created_at: noon(),
            updated_at: noon(),
        }
    }

    #[test]
    fn lines_are_priced_and_summed() {
        let foods = HashMap::from([("f1".to_owned(), Some(soup())), ("f2".to_owned(), None)]);
        let items = vec![item("a", "f1", 3, 0.1), item("b", "f2", 2, 1.005)];

        let (lines, due) = price_lines(items, &foods).unwrap();

        assert_eq!(lines[0].amount, 0.3);
        assert_eq!(lines[0].food_name.as_deref(), Some("Soup"));
        assert_eq!(lines[1].amount, 2.01);
        assert_eq!(lines[1].food_name, None);
        assert_eq!(to_f64(due), 2.31);
    }

    #[test]
    fn view_flattens_the_aggregate() {
        let aggregate = OrderItemsAggregate {
            order_id: "o1".to_owned(),
            payment_due: 9.0,
            table_number: Some(7),
            order_items: Vec::new(),
        };

        let view = InvoiceView::compose(invoice(Some(PaymentMethod::Card)), aggregate);

        assert_eq!(view.payment_method, "CARD");
        assert_eq!(view.payment_due, 9.0);
        assert_eq!(view.table_number, Some(7));
        assert!(view.order_details.is_empty());
    }

    #[test]
    fn missing_payment_method_renders_as_null_string() {
        let aggregate = OrderItemsAggregate {
            order_id: "o1".to_owned(),
            payment_due: 0.0,
            table_number: None,
            order_items: Vec::new(),
        };

        let view = InvoiceView::compose(invoice(None), aggregate);
        let json = serde_json::to_value(&view).unwrap();

        assert_eq!(json["payment_method"], "null");
        assert_eq!(json["payment_status"], "PENDING");
    }
}
