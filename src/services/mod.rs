use actix_web::web::{self, JsonConfig, PathConfig, QueryConfig};
use actix_web::{get, HttpResponse, Responder};

use crate::error::ApiError;

pub mod db_models;
pub mod db_utils;
pub mod handling;
pub mod insertable;
pub mod invoice_view;
pub mod memory_handling;
pub mod money;
pub mod mongo_handling;
pub mod pagination;


#[get("/")]
pub async fn home_page() -> impl Responder {
    HttpResponse::Ok().body("Hotel management service")
}

#[get("/healthcheck")]
pub async fn healthcheck() -> impl Responder {
    HttpResponse::Ok().body("I'm alive!")
}

/// Registers every route plus the extractor configs that render bad input
/// through the shared error envelope.
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.app_data(JsonConfig::default().error_handler(|err, _| {
        ApiError::BadRequest(err.to_string()).into()
    }))
    .app_data(QueryConfig::default().error_handler(|err, _| {
        ApiError::BadRequest(err.to_string()).into()
    }))
    .app_data(PathConfig::default().error_handler(|err, _| {
        ApiError::BadRequest(err.to_string()).into()
    }))
    .service(home_page)
    .service(healthcheck)
    .service(
        web::scope("/foods")
            .service(foods_route::fetch_foods)
            .service(foods_route::fetch_food)
            .service(foods_route::create_food)
            .service(foods_route::update_food),
    )
    .service(
        web::scope("/menus")
            .service(menus_route::fetch_menus)
            .service(menus_route::fetch_menu)
            .service(menus_route::create_menu)
            .service(menus_route::update_menu),
    )
    .service(
        web::scope("/tables")
            .service(tables_route::fetch_tables)
            .service(tables_route::fetch_table)
            .service(tables_route::create_table)
            .service(tables_route::update_table),
    )
    .service(
        web::scope("/orders")
            .service(orders_route::fetch_orders)
            .service(orders_route::fetch_order)
            .service(orders_route::create_order)
            .service(orders_route::update_order),
    )
    .service(web::scope("/orderItems-order").service(order_items_route::fetch_items_by_order))
    .service(
        web::scope("/orderItems")
            .service(order_items_route::fetch_order_items)
            .service(order_items_route::fetch_order_item)
            .service(order_items_route::create_order_items)
            .service(order_items_route::update_order_item),
    )
    .service(
        web::scope("/invoices")
            .service(invoices_route::fetch_invoices)
            .service(invoices_route::fetch_invoice)
            .service(invoices_route::create_invoice)
            .service(invoices_route::update_invoice),
    );
}

// sub-route "/foods"
pub mod foods_route {
    use actix_web::web::{Data, Json, Path, Query};
    use actix_web::{get, patch, post, HttpResponse};
    use validator::Validate;

    use crate::error::ApiError;
    use crate::services::db_models::{timestamp, Food, Menu};
    use crate::services::db_utils::AppState;
    use crate::services::handling::{fetch, insert, list, require, update};
    use crate::services::insertable::{FoodPatch, NewFood};
    use crate::services::pagination::{PageQuery, WriteQuery};

    #[get("")]
    pub async fn fetch_foods(
        state: Data<AppState>,
        query: Query<PageQuery>,
    ) -> Result<HttpResponse, ApiError> {
        let page = list::<Food>(&state, &query).await?;

        Ok(HttpResponse::Ok().json(page))
    }

    #[get("/{food_id}")]
    pub async fn fetch_food(
        state: Data<AppState>,
        path: Path<String>,
    ) -> Result<HttpResponse, ApiError> {
        let food = fetch::<Food>(&state, &path).await?;

        Ok(HttpResponse::Ok().json(food))
    }

    #[post("")]
    pub async fn create_food(
        state: Data<AppState>,
        body: Json<NewFood>,
    ) -> Result<HttpResponse, ApiError> {
        let body = body.into_inner();
        body.validate()?;
        require::<Menu>(&state, &body.menu_id).await?;

        let food = body.into_food(timestamp())?;
        let ack = insert(&state, &food).await?;

        Ok(HttpResponse::Ok().json(ack))
    }

    #[patch("/{food_id}")]
    pub async fn update_food(
        state: Data<AppState>,
        path: Path<String>,
        query: Query<WriteQuery>,
        body: Json<FoodPatch>,
    ) -> Result<HttpResponse, ApiError> {
        let patch = body.into_inner();
        patch.validate()?;
        if let Some(menu_id) = patch.menu_id.as_deref() {
            require::<Menu>(&state, menu_id).await?;
        }

        let ack = update::<Food, _>(&state, &path, patch, query.mode()).await?;

        Ok(HttpResponse::Ok().json(ack))
    }
}

// sub-route "/menus"
pub mod menus_route {
    use actix_web::web::{Data, Json, Path, Query};
    use actix_web::{get, patch, post, HttpResponse};
    use validator::Validate;

    use crate::error::ApiError;
    use crate::services::db_models::{timestamp, Menu};
    use crate::services::db_utils::AppState;
    use crate::services::handling::{fetch, find, insert, list, update};
    use crate::services::insertable::{MenuPatch, NewMenu};
    use crate::services::pagination::{PageQuery, WriteQuery};

    #[get("")]
    pub async fn fetch_menus(
        state: Data<AppState>,
        query: Query<PageQuery>,
    ) -> Result<HttpResponse, ApiError> {
        let page = list::<Menu>(&state, &query).await?;

        Ok(HttpResponse::Ok().json(page))
    }

    #[get("/{menu_id}")]
    pub async fn fetch_menu(
        state: Data<AppState>,
        path: Path<String>,
    ) -> Result<HttpResponse, ApiError> {
        let menu = fetch::<Menu>(&state, &path).await?;

        Ok(HttpResponse::Ok().json(menu))
    }

    #[post("")]
    pub async fn create_menu(
        state: Data<AppState>,
        body: Json<NewMenu>,
    ) -> Result<HttpResponse, ApiError> {
        let body = body.into_inner();
        body.validate()?;

        let ack = insert(&state, &body.into_menu(timestamp())).await?;

        Ok(HttpResponse::Ok().json(ack))
    }

    #[patch("/{menu_id}")]
    pub async fn update_menu(
        state: Data<AppState>,
        path: Path<String>,
        query: Query<WriteQuery>,
        body: Json<MenuPatch>,
    ) -> Result<HttpResponse, ApiError> {
        let patch = body.into_inner();
        patch.validate()?;

        if patch.touches_window() {
            let stored = find::<Menu>(&state, &path).await?;
            patch.check_window_against(stored.as_ref())?;
        }

        let ack = update::<Menu, _>(&state, &path, patch, query.mode()).await?;

        Ok(HttpResponse::Ok().json(ack))
    }
}

// sub-route "/tables"
pub mod tables_route {
    use actix_web::web::{Data, Json, Path, Query};
    use actix_web::{get, patch, post, HttpResponse};
    use validator::Validate;

    use crate::error::ApiError;
    use crate::services::db_models::{timestamp, RestaurantTable};
    use crate::services::db_utils::AppState;
    use crate::services::handling::{fetch, insert, list, update};
    use crate::services::insertable::{NewTable, TablePatch};
    use crate::services::pagination::{PageQuery, WriteQuery};

    #[get("")]
    pub async fn fetch_tables(
        state: Data<AppState>,
        query: Query<PageQuery>,
    ) -> Result<HttpResponse, ApiError> {
        let page = list::<RestaurantTable>(&state, &query).await?;

        Ok(HttpResponse::Ok().json(page))
    }

    #[get("/{table_id}")]
    pub async fn fetch_table(
        state: Data<AppState>,
        path: Path<String>,
    ) -> Result<HttpResponse, ApiError> {
        let table = fetch::<RestaurantTable>(&state, &path).await?;

        Ok(HttpResponse::Ok().json(table))
    }

    #[post("")]
    pub async fn create_table(
        state: Data<AppState>,
        body: Json<NewTable>,
    ) -> Result<HttpResponse, ApiError> {
        let body = body.into_inner();
        body.validate()?;

        let ack = insert(&state, &body.into_table(timestamp())).await?;

        Ok(HttpResponse::Ok().json(ack))
    }

    #[patch("/{table_id}")]
    pub async fn update_table(
        state: Data<AppState>,
        path: Path<String>,
        query: Query<WriteQuery>,
        body: Json<TablePatch>,
    ) -> Result<HttpResponse, ApiError> {
        let patch = body.into_inner();
        patch.validate()?;

        let ack = update::<RestaurantTable, _>(&state, &path, patch, query.mode()).await?;

        Ok(HttpResponse::Ok().json(ack))
    }
}

// sub-route "/orders"
pub mod orders_route {
    use actix_web::web::{Data, Json, Path, Query};
    use actix_web::{get, patch, post, HttpResponse};
    use validator::Validate;

    use crate::error::ApiError;
    use crate::services::db_models::{timestamp, ClientOrder, RestaurantTable};
    use crate::services::db_utils::AppState;
    use crate::services::handling::{fetch, insert, list, require, update};
    use crate::services::insertable::{NewOrder, OrderPatch};
    use crate::services::pagination::{PageQuery, WriteQuery};

    #[get("")]
    pub async fn fetch_orders(
        state: Data<AppState>,
        query: Query<PageQuery>,
    ) -> Result<HttpResponse, ApiError> {
        let page = list::<ClientOrder>(&state, &query).await?;

        Ok(HttpResponse::Ok().json(page))
    }

    #[get("/{order_id}")]
    pub async fn fetch_order(
        state: Data<AppState>,
        path: Path<String>,
    ) -> Result<HttpResponse, ApiError> {
        let order = fetch::<ClientOrder>(&state, &path).await?;

        Ok(HttpResponse::Ok().json(order))
    }

    #[post("")]
    pub async fn create_order(
        state: Data<AppState>,
        body: Json<NewOrder>,
    ) -> Result<HttpResponse, ApiError> {
        let body = body.into_inner();
        body.validate()?;
        if let Some(table_id) = body.table_id.as_deref() {
            require::<RestaurantTable>(&state, table_id).await?;
        }

        let ack = insert(&state, &body.into_order(timestamp())).await?;

        Ok(HttpResponse::Ok().json(ack))
    }

    #[patch("/{order_id}")]
    pub async fn update_order(
        state: Data<AppState>,
        path: Path<String>,
        query: Query<WriteQuery>,
        body: Json<OrderPatch>,
    ) -> Result<HttpResponse, ApiError> {
        let patch = body.into_inner();
        patch.validate()?;
        if let Some(table_id) = patch.table_id.as_deref() {
            require::<RestaurantTable>(&state, table_id).await?;
        }

        let ack = update::<ClientOrder, _>(&state, &path, patch, query.mode()).await?;

        Ok(HttpResponse::Ok().json(ack))
    }
}

// sub-routes "/orderItems" and "/orderItems-order"
pub mod order_items_route {
    use actix_web::web::{Data, Json, Path, Query};
    use actix_web::{get, patch, post, HttpResponse};
    use serde::Serialize;
    use validator::Validate;

    use crate::error::ApiError;
    use crate::services::db_models::{timestamp, ClientOrder, Food, OrderItem, RestaurantTable};
    use crate::services::db_utils::AppState;
    use crate::services::handling::{fetch, insert, insert_all, list, require, update};
    use crate::services::insertable::{NewOrder, OrderItemPack, OrderItemPatch};
    use crate::services::invoice_view::items_by_order;
    use crate::services::pagination::{PageQuery, WriteQuery};

    #[derive(Debug, Serialize)]
    pub struct PackAck {
        pub order_id: String,
        pub inserted_ids: Vec<String>,
    }

    #[get("")]
    pub async fn fetch_order_items(
        state: Data<AppState>,
        query: Query<PageQuery>,
    ) -> Result<HttpResponse, ApiError> {
        let page = list::<OrderItem>(&state, &query).await?;

        Ok(HttpResponse::Ok().json(page))
    }

    #[get("/{order_item_id}")]
    pub async fn fetch_order_item(
        state: Data<AppState>,
        path: Path<String>,
    ) -> Result<HttpResponse, ApiError> {
        let item = fetch::<OrderItem>(&state, &path).await?;

        Ok(HttpResponse::Ok().json(item))
    }

    #[get("/{order_id}")]
    pub async fn fetch_items_by_order(
        state: Data<AppState>,
        path: Path<String>,
    ) -> Result<HttpResponse, ApiError> {
        let aggregate = items_by_order(&state, &path).await?;

        Ok(HttpResponse::Ok().json(aggregate))
    }

    /// Appends the pack to `order_id`, or opens a new order for `table_id`
    /// when no order is given. All references are checked before any write.
    #[post("")]
    pub async fn create_order_items(
        state: Data<AppState>,
        body: Json<OrderItemPack>,
    ) -> Result<HttpResponse, ApiError> {
        let pack = body.into_inner();
        pack.validate()?;

        match pack.order_id.as_deref() {
            Some(order_id) => require::<ClientOrder>(&state, order_id).await?,
            None => {
                if let Some(table_id) = pack.table_id.as_deref() {
                    require::<RestaurantTable>(&state, table_id).await?;
                }
            }
        }
        for item in &pack.order_items {
            require::<Food>(&state, &item.food_id).await?;
        }

        let now = timestamp();
        let order_id = match pack.order_id {
            Some(order_id) => order_id,
            None => {
                let order = NewOrder {
                    table_id: pack.table_id,
                    order_date: None,
                }
                .into_order(now);
                insert(&state, &order).await?;

                order.order_id
            }
        };

        let items = pack
            .order_items
            .into_iter()
            .map(|item| item.into_order_item(&order_id, now))
            .collect::<Result<Vec<_>, _>>()?;
        let ack = insert_all(&state, &items).await?;

        Ok(HttpResponse::Ok().json(PackAck {
            order_id,
            inserted_ids: ack.inserted_ids,
        }))
    }

    #[patch("/{order_item_id}")]
    pub async fn update_order_item(
        state: Data<AppState>,
        path: Path<String>,
        query: Query<WriteQuery>,
        body: Json<OrderItemPatch>,
    ) -> Result<HttpResponse, ApiError> {
        let patch = body.into_inner();
        patch.validate()?;
        if let Some(food_id) = patch.food_id.as_deref() {
            require::<Food>(&state, food_id).await?;
        }

        let ack = update::<OrderItem, _>(&state, &path, patch, query.mode()).await?;

        Ok(HttpResponse::Ok().json(ack))
    }
}

// sub-route "/invoices"
pub mod invoices_route {
    use actix_web::web::{Data, Json, Path, Query};
    use actix_web::{get, patch, post, HttpResponse};
    use validator::Validate;

    use crate::error::ApiError;
    use crate::services::db_models::{timestamp, ClientOrder, Invoice};
    use crate::services::db_utils::AppState;
    use crate::services::handling::{insert, list, require, update};
    use crate::services::insertable::{InvoicePatch, NewInvoice};
    use crate::services::invoice_view::invoice_view;
    use crate::services::pagination::{PageQuery, WriteQuery};

    #[get("")]
    pub async fn fetch_invoices(
        state: Data<AppState>,
        query: Query<PageQuery>,
    ) -> Result<HttpResponse, ApiError> {
        let page = list::<Invoice>(&state, &query).await?;

        Ok(HttpResponse::Ok().json(page))
    }

    #[get("/{invoice_id}")]
    pub async fn fetch_invoice(
        state: Data<AppState>,
        path: Path<String>,
    ) -> Result<HttpResponse, ApiError> {
        let view = invoice_view(&state, &path).await?;

        Ok(HttpResponse::Ok().json(view))
    }

    #[post("")]
    pub async fn create_invoice(
        state: Data<AppState>,
        body: Json<NewInvoice>,
    ) -> Result<HttpResponse, ApiError> {
        let body = body.into_inner();
        body.validate()?;
        require::<ClientOrder>(&state, &body.order_id).await?;

        let ack = insert(&state, &body.into_invoice(timestamp())).await?;

        Ok(HttpResponse::Ok().json(ack))
    }

    #[patch("/{invoice_id}")]
    pub async fn update_invoice(
        state: Data<AppState>,
        path: Path<String>,
        query: Query<WriteQuery>,
        body: Json<InvoicePatch>,
    ) -> Result<HttpResponse, ApiError> {
        let patch = body.into_inner();
        patch.validate()?;

        let ack = update::<Invoice, _>(&state, &path, patch, query.mode()).await?;

        Ok(HttpResponse::Ok().json(ack))
    }
}
