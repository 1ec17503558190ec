//! Route planning message handlers

use std::sync::Arc;

use anyhow::Result;
use async_nats::{Client, Subscriber};
use futures::StreamExt;
use serde_json::json;
use sqlx::PgPool;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::handlers::{respond, respond_error, respond_invalid};
use crate::services::planner::{PlanError, RoutePlanner};
use crate::types::{ErrorResponse, Request, RoutePlanRequest, SuccessResponse};

fn plan_error_response(request_id: Uuid, err: &PlanError) -> ErrorResponse {
    let response = ErrorResponse::new(request_id, err.code(), err.to_string());
    match err {
        PlanError::DepotNotFound(address) => response.with_details(json!({ "address": address })),
        PlanError::NoResolvableAddresses(count) => response.with_details(json!({ "orders": count })),
        _ => response,
    }
}

/// Handle route.plan messages.
///
/// The subscription is consumed sequentially, so two recomputes never
/// interleave their time window writes.
pub async fn handle_plan(
    client: Client,
    mut subscriber: Subscriber,
    pool: PgPool,
    planner: Arc<RoutePlanner>,
) -> Result<()> {
    while let Some(msg) = subscriber.next().await {
        debug!("Received route.plan message");

        let reply = match msg.reply {
            Some(ref reply) => reply.clone(),
            None => {
                warn!("Message without reply subject");
                continue;
            }
        };

        let request: Request<RoutePlanRequest> = match serde_json::from_slice(&msg.payload) {
            Ok(req) => req,
            Err(e) => {
                error!("Failed to parse request: {}", e);
                respond_invalid(&client, reply, e).await;
                continue;
            }
        };

        let mode = request.payload.mode;
        match planner.plan(&pool, request.payload).await {
            Ok(plan) => {
                info!(
                    "Planned {} route: {} orders, {:.1} km, {} warning(s)",
                    mode.as_str(),
                    plan.orders.len(),
                    plan.total_distance_km,
                    plan.warnings.len()
                );
                let response = SuccessResponse::new(request.id, plan);
                respond(&client, reply, &response).await?;
            }
            Err(e) => {
                match &e {
                    PlanError::Store(_) | PlanError::Provider(_) => error!("Route planning failed: {}", e),
                    _ => warn!("Route planning rejected: {}", e),
                }
                respond_error(&client, reply, plan_error_response(request.id, &e)).await;
            }
        }
    }

    Ok(())
}
