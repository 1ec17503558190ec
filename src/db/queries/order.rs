//! Order database queries

use anyhow::Result;
use async_trait::async_trait;
use sqlx::PgPool;

use crate::db::queries::settings;
use crate::services::planner::OrderStore;
use crate::types::{CreateOrderRequest, Order, Settings};

/// Create a new order. Callers validate required fields first.
pub async fn create_order(pool: &PgPool, request: &CreateOrderRequest) -> Result<Order> {
    let order = sqlx::query_as::<_, Order>(
        r#"
        INSERT INTO orders (client_name, phone_number, address, description, service_type)
        VALUES ($1, $2, $3, $4, $5)
        RETURNING id, client_name, phone_number, address, description, service_type,
                  time_range, completed, completed_at, photo_urls, created_at
        "#,
    )
    .bind(request.client_name.trim())
    .bind(request.phone_number.trim())
    .bind(request.address.trim())
    .bind(request.normalized_description())
    .bind(request.service_type)
    .fetch_one(pool)
    .await?;

    Ok(order)
}

/// List orders, newest first
pub async fn list_orders(pool: &PgPool) -> Result<Vec<Order>> {
    let orders = sqlx::query_as::<_, Order>(
        r#"
        SELECT id, client_name, phone_number, address, description, service_type,
               time_range, completed, completed_at, photo_urls, created_at
        FROM orders
        ORDER BY created_at DESC, id DESC
        "#,
    )
    .fetch_all(pool)
    .await?;

    Ok(orders)
}

/// List orders in insertion order (default manual visiting order)
pub async fn list_orders_for_planning(pool: &PgPool) -> Result<Vec<Order>> {
    let orders = sqlx::query_as::<_, Order>(
        r#"
        SELECT id, client_name, phone_number, address, description, service_type,
               time_range, completed, completed_at, photo_urls, created_at
        FROM orders
        ORDER BY id ASC
        "#,
    )
    .fetch_all(pool)
    .await?;

    Ok(orders)
}

/// Mark an order completed and append photos.
///
/// The completion timestamp is only set the first time.
pub async fn complete_order(pool: &PgPool, id: i32, photo_urls: &[String]) -> Result<Option<Order>> {
    let order = sqlx::query_as::<_, Order>(
        r#"
        UPDATE orders SET
            completed = TRUE,
            completed_at = COALESCE(completed_at, NOW()),
            photo_urls = photo_urls || $2::text[]
        WHERE id = $1
        RETURNING id, client_name, phone_number, address, description, service_type,
                  time_range, completed, completed_at, photo_urls, created_at
        "#,
    )
    .bind(id)
    .bind(photo_urls)
    .fetch_optional(pool)
    .await?;

    Ok(order)
}

/// Stored photos of one order, `None` if the order does not exist
pub async fn get_photo_urls(pool: &PgPool, id: i32) -> Result<Option<Vec<String>>> {
    let row: Option<(Vec<String>,)> = sqlx::query_as("SELECT photo_urls FROM orders WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await?;

    Ok(row.map(|(urls,)| urls))
}

/// Every stored photo across all orders
pub async fn get_all_photo_urls(pool: &PgPool) -> Result<Vec<String>> {
    let urls: Vec<String> = sqlx::query_scalar("SELECT unnest(photo_urls) FROM orders ORDER BY id")
        .fetch_all(pool)
        .await?;

    Ok(urls)
}

/// Delete an order, returns false if it did not exist
pub async fn delete_order(pool: &PgPool, id: i32) -> Result<bool> {
    let result = sqlx::query("DELETE FROM orders WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await?;

    Ok(result.rows_affected() > 0)
}

/// Delete every order, returns the number of deleted rows
pub async fn delete_all_orders(pool: &PgPool) -> Result<u64> {
    let result = sqlx::query("DELETE FROM orders").execute(pool).await?;
    Ok(result.rows_affected())
}

/// Overwrite the committed time window of one order, returns false if it does not exist
pub async fn save_time_window(pool: &PgPool, id: i32, window: &str) -> Result<bool> {
    let result = sqlx::query("UPDATE orders SET time_range = $2 WHERE id = $1")
        .bind(id)
        .bind(window)
        .execute(pool)
        .await?;

    Ok(result.rows_affected() > 0)
}

#[async_trait]
impl OrderStore for PgPool {
    async fn load_orders(&self) -> Result<Vec<Order>> {
        list_orders_for_planning(self).await
    }

    async fn load_settings(&self) -> Result<Settings> {
        settings::get_settings(self).await
    }

    async fn save_time_window(&self, order_id: i32, window: &str) -> Result<bool> {
        save_time_window(self, order_id, window).await
    }
}
