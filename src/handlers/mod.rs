//! NATS message handlers

pub mod order;
pub mod ping;
pub mod route;
pub mod settings;

use std::sync::Arc;

use anyhow::Result;
use async_nats::{Client, Subject};
use serde::Serialize;
use sqlx::PgPool;
use tracing::{error, info};
use uuid::Uuid;

use crate::config::Config;
use crate::services::geocoding::create_geocoder;
use crate::services::optimizer::create_optimizer;
use crate::services::photo_store::create_photo_store;
use crate::services::planner::RoutePlanner;
use crate::services::routing::create_routing_service;
use crate::types::ErrorResponse;

/// Serialize and publish a reply
pub(crate) async fn respond<T: Serialize>(client: &Client, reply: Subject, body: &T) -> Result<()> {
    client.publish(reply, serde_json::to_vec(body)?.into()).await?;
    Ok(())
}

/// Publish an error reply, logging instead of failing when the publish itself fails
pub(crate) async fn respond_error(client: &Client, reply: Subject, error: ErrorResponse) {
    if let Err(e) = respond(client, reply, &error).await {
        error!("Failed to publish {} reply: {}", error.error.code, e);
    }
}

/// Reply to a payload that could not be parsed. The request id is unknown.
pub(crate) async fn respond_invalid(client: &Client, reply: Subject, parse_error: serde_json::Error) {
    let error = ErrorResponse::new(Uuid::nil(), "INVALID_REQUEST", format!("Failed to parse request: {}", parse_error));
    respond_error(client, reply, error).await;
}

/// Start all message handlers
pub async fn start_handlers(client: Client, pool: PgPool, config: &Config) -> Result<()> {
    info!("Starting message handlers...");

    let geocoder = create_geocoder(&config.providers)?;
    let routing = create_routing_service(&config.providers)?;
    let optimizer = create_optimizer(&config.providers)?;
    let photo_store = create_photo_store(config.blob.as_ref())?;
    info!(
        "Providers: geocoder={}, routing={}, optimizer={}, photos={}",
        geocoder.name(),
        routing.name(),
        optimizer.name(),
        photo_store.name()
    );

    let planner = Arc::new(RoutePlanner::new(geocoder, routing, optimizer, &config.planner));

    // Subscribe to subjects
    let ping_sub = client.subscribe("dispatch.ping").await?;
    let order_list_sub = client.subscribe("dispatch.order.list").await?;
    let order_create_sub = client.subscribe("dispatch.order.create").await?;
    let order_complete_sub = client.subscribe("dispatch.order.complete").await?;
    let order_delete_sub = client.subscribe("dispatch.order.delete").await?;
    let order_delete_all_sub = client.subscribe("dispatch.order.delete_all").await?;
    let settings_get_sub = client.subscribe("dispatch.settings.get").await?;
    let settings_update_sub = client.subscribe("dispatch.settings.update").await?;
    let route_plan_sub = client.subscribe("dispatch.route.plan").await?;

    info!("Subscribed to NATS subjects");

    let client_ping = client.clone();
    let client_order_list = client.clone();
    let client_order_create = client.clone();
    let client_order_complete = client.clone();
    let client_order_delete = client.clone();
    let client_order_delete_all = client.clone();
    let client_settings_get = client.clone();
    let client_settings_update = client.clone();
    let client_route_plan = client.clone();

    let pool_order_list = pool.clone();
    let pool_order_create = pool.clone();
    let pool_order_complete = pool.clone();
    let pool_order_delete = pool.clone();
    let pool_order_delete_all = pool.clone();
    let pool_settings_get = pool.clone();
    let pool_settings_update = pool.clone();
    let pool_route_plan = pool.clone();

    let photos_delete = Arc::clone(&photo_store);
    let photos_delete_all = photo_store;

    let ping_handle = tokio::spawn(async move { ping::handle_ping(client_ping, ping_sub).await });

    // Order handlers
    let order_list_handle = tokio::spawn(async move {
        order::handle_list(client_order_list, order_list_sub, pool_order_list).await
    });
    let order_create_handle = tokio::spawn(async move {
        order::handle_create(client_order_create, order_create_sub, pool_order_create).await
    });
    let order_complete_handle = tokio::spawn(async move {
        order::handle_complete(client_order_complete, order_complete_sub, pool_order_complete).await
    });
    let order_delete_handle = tokio::spawn(async move {
        order::handle_delete(client_order_delete, order_delete_sub, pool_order_delete, photos_delete).await
    });
    let order_delete_all_handle = tokio::spawn(async move {
        order::handle_delete_all(
            client_order_delete_all,
            order_delete_all_sub,
            pool_order_delete_all,
            photos_delete_all,
        )
        .await
    });

    // Settings handlers
    let settings_get_handle = tokio::spawn(async move {
        settings::handle_get(client_settings_get, settings_get_sub, pool_settings_get).await
    });
    let settings_update_handle = tokio::spawn(async move {
        settings::handle_update(client_settings_update, settings_update_sub, pool_settings_update).await
    });

    // Route planning: one subscription, one recompute at a time
    let route_plan_handle = tokio::spawn(async move {
        route::handle_plan(client_route_plan, route_plan_sub, pool_route_plan, planner).await
    });

    info!("Message handlers started");

    // Wait for any handler to finish (which would indicate an error)
    tokio::select! {
        result = ping_handle => {
            error!("Ping handler finished: {:?}", result);
        }
        result = order_list_handle => {
            error!("Order list handler finished: {:?}", result);
        }
        result = order_create_handle => {
            error!("Order create handler finished: {:?}", result);
        }
        result = order_complete_handle => {
            error!("Order complete handler finished: {:?}", result);
        }
        result = order_delete_handle => {
            error!("Order delete handler finished: {:?}", result);
        }
        result = order_delete_all_handle => {
            error!("Order delete all handler finished: {:?}", result);
        }
        result = settings_get_handle => {
            error!("Settings get handler finished: {:?}", result);
        }
        result = settings_update_handle => {
            error!("Settings update handler finished: {:?}", result);
        }
        result = route_plan_handle => {
            error!("Route plan handler finished: {:?}", result);
        }
    }

    Ok(())
}
