//! HTTP surface

use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{delete, get, post, put},
    Json, Router,
};
use serde::Deserialize;
use serde_json::{json, Value};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use uuid::Uuid;

use crate::domain::aggregates::{OrderStatus, PaymentMethod};
use crate::domain::value_objects::{Caller, ProductId, ShippingAddress};
use crate::services::{CartService, Checkout, OrderQuery, OrderService};
use crate::store::PageRequest;
use crate::EngineError;

pub mod body;
pub mod error;
pub mod identity;

use body::{optional_json, ApiJson};
use error::ApiError;
use identity::{AnyCaller, Buyer, Seller};

type ApiResult<T = Json<Value>> = Result<T, ApiError>;

#[derive(Clone)]
pub struct AppState {
    pub carts: CartService,
    pub orders: OrderService,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(|| async { Json(json!({"status": "healthy", "service": "storefront-orders"})) }))
        .route("/api/v1/cart", get(get_cart).delete(clear_cart))
        .route("/api/v1/cart/count", get(cart_count))
        .route("/api/v1/cart/items", post(add_cart_item).put(update_cart_item))
        .route("/api/v1/cart/items/:product_id", delete(remove_cart_item))
        .route("/api/v1/orders", get(list_my_orders).post(place_order))
        .route("/api/v1/orders/:id", get(get_order))
        .route("/api/v1/orders/:id/cancel", put(cancel_order))
        .route("/api/v1/orders/:id/status", put(update_order_status))
        .route("/api/v1/seller/orders", get(seller_orders))
        .route("/api/v1/seller/stats", get(seller_stats))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

// Cart

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddItemRequest { pub product_id: ProductId, pub quantity: Option<u32> }

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SetQuantityRequest { pub product_id: ProductId, pub quantity: u32 }

async fn get_cart(State(s): State<AppState>, Buyer(user): Buyer) -> ApiResult {
    let cart = s.carts.snapshot(&user).await?;
    Ok(Json(json!({"success": true, "cart": cart})))
}

async fn cart_count(State(s): State<AppState>, Buyer(user): Buyer) -> ApiResult {
    let count = s.carts.item_count(&user).await?;
    Ok(Json(json!({"success": true, "count": count})))
}

async fn add_cart_item(State(s): State<AppState>, Buyer(user): Buyer, ApiJson(r): ApiJson<AddItemRequest>) -> ApiResult {
    let cart = s.carts.add_item(&user, r.product_id, r.quantity.unwrap_or(1)).await?;
    Ok(Json(json!({"success": true, "cart": cart})))
}

async fn update_cart_item(State(s): State<AppState>, Buyer(user): Buyer, ApiJson(r): ApiJson<SetQuantityRequest>) -> ApiResult {
    let cart = s.carts.set_quantity(&user, r.product_id, r.quantity).await?;
    Ok(Json(json!({"success": true, "cart": cart})))
}

async fn remove_cart_item(State(s): State<AppState>, Buyer(user): Buyer, Path(product_id): Path<Uuid>) -> ApiResult {
    let cart = s.carts.remove_item(&user, product_id.into()).await?;
    Ok(Json(json!({"success": true, "cart": cart})))
}

async fn clear_cart(State(s): State<AppState>, Buyer(user): Buyer) -> ApiResult {
    let cart = s.carts.clear(&user).await?;
    Ok(Json(json!({"success": true, "cart": cart})))
}

// Orders

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaceOrderRequest {
    pub shipping_address: Option<ShippingAddress>,
    pub payment_method: Option<PaymentMethod>,
    pub notes: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct CancelRequest { pub reason: Option<String> }

#[derive(Debug, Deserialize)]
pub struct StatusRequest { pub status: String }

#[derive(Debug, Default, Deserialize)]
pub struct SellerOrderParams { pub status: Option<String>, pub page: Option<u32>, pub limit: Option<u32> }

async fn place_order(
    State(s): State<AppState>,
    Buyer(user): Buyer,
    ApiJson(r): ApiJson<PlaceOrderRequest>,
) -> ApiResult<(StatusCode, Json<Value>)> {
    let checkout = Checkout {
        shipping_address: r.shipping_address,
        payment_method: r.payment_method.unwrap_or_default(),
        notes: r.notes,
    };
    let order = s.orders.place_order(&user, checkout).await?;
    Ok((StatusCode::CREATED, Json(json!({"success": true, "message": "Order placed successfully!", "order": order}))))
}

async fn list_my_orders(State(s): State<AppState>, Buyer(user): Buyer) -> ApiResult {
    let page = s.orders.list_orders(&Caller::Buyer(user), OrderQuery::default()).await?;
    Ok(Json(json!({"success": true, "orders": page.orders})))
}

async fn get_order(State(s): State<AppState>, AnyCaller(caller): AnyCaller, Path(id): Path<Uuid>) -> ApiResult {
    let order = s.orders.get_order(&caller, id.into()).await?;
    Ok(Json(json!({"success": true, "order": order})))
}

async fn cancel_order(
    State(s): State<AppState>,
    Buyer(user): Buyer,
    Path(id): Path<Uuid>,
    body: Bytes,
) -> ApiResult {
    let reason = optional_json::<CancelRequest>(&body)?.and_then(|r| r.reason);
    let order = s.orders.cancel_order(&Caller::Buyer(user), id.into(), reason).await?;
    Ok(Json(json!({"success": true, "message": "Order cancelled successfully", "order": order})))
}

async fn update_order_status(
    State(s): State<AppState>,
    Seller(seller): Seller,
    Path(id): Path<Uuid>,
    ApiJson(r): ApiJson<StatusRequest>,
) -> ApiResult {
    let status: OrderStatus = r.status.parse()?;
    let order = s.orders.advance_status(&Caller::Seller(seller), id.into(), status).await?;
    Ok(Json(json!({"success": true, "order": order})))
}

/// `status=all` or an empty status means no filter.
fn status_filter(raw: Option<&str>) -> Result<Option<OrderStatus>, EngineError> {
    match raw.map(str::trim) {
        None | Some("") | Some("all") => Ok(None),
        Some(s) => s.parse().map(Some),
    }
}

async fn seller_orders(
    State(s): State<AppState>,
    Seller(seller): Seller,
    Query(p): Query<SellerOrderParams>,
) -> ApiResult {
    let query = OrderQuery {
        status: status_filter(p.status.as_deref())?,
        page: Some(PageRequest::new(p.page, p.limit)),
    };
    let page = s.orders.list_orders(&Caller::Seller(seller), query).await?;
    Ok(Json(json!({
        "success": true,
        "orders": page.orders,
        "totalPages": page.total_pages,
        "currentPage": page.current_page,
        "total": page.total,
    })))
}

async fn seller_stats(State(s): State<AppState>, Seller(_): Seller) -> ApiResult {
    let stats = s.orders.compute_stats().await?;
    Ok(Json(json!({"success": true, "stats": stats})))
}
