//! Settings message handlers

use anyhow::Result;
use async_nats::{Client, Subscriber};
use futures::StreamExt;
use sqlx::PgPool;
use tracing::{debug, error, info, warn};

use crate::db::queries;
use crate::handlers::{respond, respond_error, respond_invalid};
use crate::types::{EmptyPayload, ErrorResponse, Request, SuccessResponse, UpdateSettingsRequest};

// ============================================================================
// Settings Get Handler
// ============================================================================

/// Handle settings.get messages
pub async fn handle_get(client: Client, mut subscriber: Subscriber, pool: PgPool) -> Result<()> {
    while let Some(msg) = subscriber.next().await {
        debug!("Received settings.get message");

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

        match queries::settings::get_settings(&pool).await {
            Ok(settings) => {
                let response = SuccessResponse::new(request.id, settings);
                respond(&client, reply, &response).await?;
            }
            Err(e) => {
                error!("Failed to get settings: {:?}", e);
                let error = ErrorResponse::new(request.id, "DATABASE_ERROR", e.to_string());
                respond_error(&client, reply, error).await;
            }
        }
    }

    Ok(())
}

// ============================================================================
// Settings Update Handler
// ============================================================================

/// Handle settings.update messages
pub async fn handle_update(client: Client, mut subscriber: Subscriber, pool: PgPool) -> Result<()> {
    while let Some(msg) = subscriber.next().await {
        debug!("Received settings.update message");

        let reply = match msg.reply {
            Some(ref reply) => reply.clone(),
            None => {
                warn!("Message without reply subject");
                continue;
            }
        };

        let request: Request<UpdateSettingsRequest> = match serde_json::from_slice(&msg.payload) {
            Ok(req) => req,
            Err(e) => {
                error!("Failed to parse request: {}", e);
                respond_invalid(&client, reply, e).await;
                continue;
            }
        };

        if let Err(message) = request.payload.validate() {
            let error = ErrorResponse::new(request.id, "VALIDATION_ERROR", message);
            respond_error(&client, reply, error).await;
            continue;
        }

        let payload = &request.payload;
        match queries::settings::save_settings(&pool, payload.start_hour, &payload.page_title).await {
            Ok(settings) => {
                info!("Settings updated: start hour {}, title {:?}", settings.start_hour, settings.page_title);
                let response = SuccessResponse::new(request.id, settings);
                respond(&client, reply, &response).await?;
            }
            Err(e) => {
                error!("Failed to save settings: {:?}", e);
                let error = ErrorResponse::new(request.id, "DATABASE_ERROR", e.to_string());
                respond_error(&client, reply, error).await;
            }
        }
    }

    Ok(())
}
