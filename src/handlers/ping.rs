//! Ping handler for health checks

use anyhow::Result;
use async_nats::{Client, Subscriber};
use futures::StreamExt;
use serde::Serialize;
use tracing::{debug, warn};

use crate::handlers::{respond, respond_invalid};
use crate::types::{EmptyPayload, Request, SuccessResponse};

#[derive(Debug, Serialize)]
struct PongResponse {
    pong: bool,
    version: &'static str,
}

impl PongResponse {
    fn current() -> Self {
        Self {
            pong: true,
            version: env!("CARGO_PKG_VERSION"),
        }
    }
}

/// Handle ping messages
pub async fn handle_ping(client: Client, mut subscriber: Subscriber) -> Result<()> {
    while let Some(msg) = subscriber.next().await {
        debug!("Received ping message");

        let reply = match msg.reply {
            Some(ref reply) => reply.clone(),
            None => {
                warn!("Ping message without reply subject");
                continue;
            }
        };

        let request: Request<EmptyPayload> = match serde_json::from_slice(&msg.payload) {
            Ok(req) => req,
            Err(e) => {
                warn!("Failed to parse ping request: {}", e);
                respond_invalid(&client, reply, e).await;
                continue;
            }
        };

        let response = SuccessResponse::new(request.id, PongResponse::current());
        respond(&client, reply, &response).await?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pong_carries_crate_version() {
        let json = serde_json::to_value(PongResponse::current()).unwrap();
        assert_eq!(json["pong"], true);
        assert_eq!(json["version"], env!("CARGO_PKG_VERSION"));
    }
}
