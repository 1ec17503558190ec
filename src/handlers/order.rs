//! Order message handlers

use std::sync::Arc;

use anyhow::Result;
use async_nats::{Client, Subscriber};
use futures::StreamExt;
use sqlx::PgPool;
use tracing::{debug, error, info, warn};

use crate::db::queries;
use crate::handlers::{respond, respond_error, respond_invalid};
use crate::services::photo_store::PhotoStore;
use crate::types::{
    CompleteOrderRequest, CreateOrderRequest, DeleteOrderRequest, DeleteOrdersResponse,
    EmptyPayload, ErrorResponse, ListResponse, Request, SuccessResponse,
};

/// Release photos one by one so a single failure does not keep the others
/// in storage. Returns how many were released.
pub(crate) async fn release_photos(store: &dyn PhotoStore, urls: &[String]) -> usize {
    let mut released = 0;
    for url in urls {
        match store.release(std::slice::from_ref(url)).await {
            Ok(()) => released += 1,
            Err(e) => warn!("Failed to release photo {} via {}: {}", url, store.name(), e),
        }
    }
    released
}

// ============================================================================
// List
// ============================================================================

/// Handle order.list messages
pub async fn handle_list(client: Client, mut subscriber: Subscriber, pool: PgPool) -> Result<()> {
    while let Some(msg) = subscriber.next().await {
        debug!("Received order.list message");

        let reply = match msg.reply {
            Some(ref reply) => reply.clone(),
            None => {
                warn!("Message without reply subject");
                continue;
            }
        };

        let request: Request<EmptyPayload> = match serde_json::from_slice(&msg.payload) {
            Ok(req) => req,
            Err(e) => {
                error!("Failed to parse request: {}", e);
                respond_invalid(&client, reply, e).await;
                continue;
            }
        };

        match queries::order::list_orders(&pool).await {
            Ok(orders) => {
                let response = SuccessResponse::new(request.id, ListResponse::new(orders));
                respond(&client, reply, &response).await?;
            }
            Err(e) => {
                error!("Failed to list orders: {:?}", e);
                let error = ErrorResponse::new(request.id, "DATABASE_ERROR", e.to_string());
                respond_error(&client, reply, error).await;
            }
        }
    }

    Ok(())
}

// ============================================================================
// Create
// ============================================================================

/// Handle order.create messages
pub async fn handle_create(client: Client, mut subscriber: Subscriber, pool: PgPool) -> Result<()> {
    while let Some(msg) = subscriber.next().await {
        debug!("Received order.create message");

        let reply = match msg.reply {
            Some(ref reply) => reply.clone(),
            None => {
                warn!("Message without reply subject");
                continue;
            }
        };

        // An unknown service type label fails here as INVALID_REQUEST
        let request: Request<CreateOrderRequest> = match serde_json::from_slice(&msg.payload) {
            Ok(req) => req,
            Err(e) => {
                error!("Failed to parse request: {}", e);
                respond_invalid(&client, reply, e).await;
                continue;
            }
        };

        let missing = request.payload.missing_fields();
        if !missing.is_empty() {
            let error = ErrorResponse::new(
                request.id,
                "VALIDATION_ERROR",
                format!("Missing required fields: {}", missing.join(", ")),
            )
            .with_details(serde_json::json!({ "missing": missing }));
            respond_error(&client, reply, error).await;
            continue;
        }

        match queries::order::create_order(&pool, &request.payload).await {
            Ok(order) => {
                info!("Created order {} ({})", order.id, order.service_type);
                let response = SuccessResponse::new(request.id, order);
                respond(&client, reply, &response).await?;
            }
            Err(e) => {
                error!("Failed to create order: {:?}", e);
                let error = ErrorResponse::new(request.id, "DATABASE_ERROR", e.to_string());
                respond_error(&client, reply, error).await;
            }
        }
    }

    Ok(())
}

// ============================================================================
// Complete
// ============================================================================

/// Handle order.complete messages (driver panel)
pub async fn handle_complete(client: Client, mut subscriber: Subscriber, pool: PgPool) -> Result<()> {
    while let Some(msg) = subscriber.next().await {
        debug!("Received order.complete message");

        let reply = match msg.reply {
            Some(ref reply) => reply.clone(),
            None => {
                warn!("Message without reply subject");
                continue;
            }
        };

        let request: Request<CompleteOrderRequest> = match serde_json::from_slice(&msg.payload) {
            Ok(req) => req,
            Err(e) => {
                error!("Failed to parse request: {}", e);
                respond_invalid(&client, reply, e).await;
                continue;
            }
        };

        let payload = &request.payload;
        match queries::order::complete_order(&pool, payload.id, &payload.photo_urls).await {
            Ok(Some(order)) => {
                info!("Order {} completed with {} new photo(s)", order.id, payload.photo_urls.len());
                let response = SuccessResponse::new(request.id, order);
                respond(&client, reply, &response).await?;
            }
            Ok(None) => {
                let error = ErrorResponse::new(request.id, "NOT_FOUND", format!("Order {} not found", payload.id));
                respond_error(&client, reply, error).await;
            }
            Err(e) => {
                error!("Failed to complete order {}: {:?}", payload.id, e);
                let error = ErrorResponse::new(request.id, "DATABASE_ERROR", e.to_string());
                respond_error(&client, reply, error).await;
            }
        }
    }

    Ok(())
}

// ============================================================================
// Delete
// ============================================================================

/// Handle order.delete messages
pub async fn handle_delete(
    client: Client,
    mut subscriber: Subscriber,
    pool: PgPool,
    photo_store: Arc<dyn PhotoStore>,
) -> Result<()> {
    while let Some(msg) = subscriber.next().await {
        debug!("Received order.delete message");

        let reply = match msg.reply {
            Some(ref reply) => reply.clone(),
            None => {
                warn!("Message without reply subject");
                continue;
            }
        };

        let request: Request<DeleteOrderRequest> = match serde_json::from_slice(&msg.payload) {
            Ok(req) => req,
            Err(e) => {
                error!("Failed to parse request: {}", e);
                respond_invalid(&client, reply, e).await;
                continue;
            }
        };
        let id = request.payload.id;

        let photos = match queries::order::get_photo_urls(&pool, id).await {
            Ok(Some(photos)) => photos,
            Ok(None) => {
                let error = ErrorResponse::new(request.id, "NOT_FOUND", format!("Order {} not found", id));
                respond_error(&client, reply, error).await;
                continue;
            }
            Err(e) => {
                error!("Failed to load photos of order {}: {:?}", id, e);
                let error = ErrorResponse::new(request.id, "DATABASE_ERROR", e.to_string());
                respond_error(&client, reply, error).await;
                continue;
            }
        };

        let photos_released = release_photos(photo_store.as_ref(), &photos).await;

        match queries::order::delete_order(&pool, id).await {
            Ok(true) => {
                info!("Deleted order {} ({}/{} photos released)", id, photos_released, photos.len());
                let response = SuccessResponse::new(
                    request.id,
                    DeleteOrdersResponse { deleted: 1, photos_released },
                );
                respond(&client, reply, &response).await?;
            }
            Ok(false) => {
                let error = ErrorResponse::new(request.id, "NOT_FOUND", format!("Order {} not found", id));
                respond_error(&client, reply, error).await;
            }
            Err(e) => {
                error!("Failed to delete order {}: {:?}", id, e);
                let error = ErrorResponse::new(request.id, "DATABASE_ERROR", e.to_string());
                respond_error(&client, reply, error).await;
            }
        }
    }

    Ok(())
}

/// Handle order.delete_all messages
pub async fn handle_delete_all(
    client: Client,
    mut subscriber: Subscriber,
    pool: PgPool,
    photo_store: Arc<dyn PhotoStore>,
) -> Result<()> {
    while let Some(msg) = subscriber.next().await {
        debug!("Received order.delete_all message");

        let reply = match msg.reply {
            Some(ref reply) => reply.clone(),
            None => {
                warn!("Message without reply subject");
                continue;
            }
        };

        let request: Request<EmptyPayload> = match serde_json::from_slice(&msg.payload) {
            Ok(req) => req,
            Err(e) => {
                error!("Failed to parse request: {}", e);
                respond_invalid(&client, reply, e).await;
                continue;
            }
        };

        let photos = match queries::order::get_all_photo_urls(&pool).await {
            Ok(photos) => photos,
            Err(e) => {
                error!("Failed to load photos: {:?}", e);
                let error = ErrorResponse::new(request.id, "DATABASE_ERROR", e.to_string());
                respond_error(&client, reply, error).await;
                continue;
            }
        };

        let photos_released = release_photos(photo_store.as_ref(), &photos).await;

        match queries::order::delete_all_orders(&pool).await {
            Ok(deleted) => {
                info!("Deleted {} orders ({}/{} photos released)", deleted, photos_released, photos.len());
                let response = SuccessResponse::new(request.id, DeleteOrdersResponse { deleted, photos_released });
                respond(&client, reply, &response).await?;
            }
            Err(e) => {
                error!("Failed to delete orders: {:?}", e);
                let error = ErrorResponse::new(request.id, "DATABASE_ERROR", e.to_string());
                respond_error(&client, reply, error).await;
            }
        }
    }

    Ok(())
}
