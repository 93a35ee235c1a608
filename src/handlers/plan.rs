//! Trip plan message handlers

use std::sync::Arc;
use anyhow::Result;
use async_nats::{Client, Subscriber};
use futures::StreamExt;
use sqlx::PgPool;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::db::queries;
use crate::services::hos::{PlanError, TripPlanner};
use crate::types::{
    ErrorResponse, GetPlanRequest, ListRequest, ListResponse, PlanRequest, Request, SuccessResponse,
};

/// Largest page a list request may ask for
const MAX_LIST_LIMIT: i64 = 200;

/// Map a planning failure onto the wire error
pub fn plan_error_response(request_id: Uuid, err: &PlanError) -> ErrorResponse {
    let message = match err {
        // Internal detail stays in the logs
        PlanError::Internal(_) => "Internal planning error".to_string(),
        _ => err.to_string(),
    };
    ErrorResponse::new(request_id, err.code(), message)
}

/// Handle hos.plan.create messages
///
/// Plans the trip, persists it and replies with the stored plan. An
/// insufficient cycle is a successful reply with `tripCompleted = false`.
pub async fn handle_create(
    client: Client,
    mut subscriber: Subscriber,
    pool: PgPool,
    planner: Arc<TripPlanner>,
) -> Result<()> {
    while let Some(msg) = subscriber.next().await {
        debug!("Received hos.plan.create message");

        let reply = match msg.reply {
            Some(ref reply) => reply.clone(),
            None => {
                warn!("Message without reply subject");
                continue;
            }
        };

        let request: Request<PlanRequest> = match serde_json::from_slice(&msg.payload) {
            Ok(req) => req,
            Err(e) => {
                error!("Failed to parse request: {}", e);
                let error = ErrorResponse::new(Uuid::nil(), "INVALID_REQUEST", e.to_string());
                let _ = client.publish(reply, serde_json::to_vec(&error)?.into()).await;
                continue;
            }
        };

        let plan = match planner.plan(&request.payload).await {
            Ok(plan) => plan,
            Err(e) => {
                match &e {
                    PlanError::Internal(_) => error!("Planning failed: {}", e),
                    _ => warn!("Planning rejected: {}", e),
                }
                let error = plan_error_response(request.id, &e);
                let _ = client.publish(reply, serde_json::to_vec(&error)?.into()).await;
                continue;
            }
        };

        match queries::trip_plan::insert_trip_plan(&pool, plan).await {
            Ok(stored) => {
                info!(
                    "Stored trip plan {} (completed: {}, {} daily sheets)",
                    stored.id,
                    stored.plan.trip_completed,
                    stored.plan.daily_sheets.len()
                );
                let response = SuccessResponse::new(request.id, stored);
                let _ = client.publish(reply, serde_json::to_vec(&response)?.into()).await;
            }
            Err(e) => {
                error!("Failed to store trip plan: {}", e);
                let error = ErrorResponse::new(request.id, "DATABASE_ERROR", e.to_string());
                let _ = client.publish(reply, serde_json::to_vec(&error)?.into()).await;
            }
        }
    }

    Ok(())
}

/// Handle hos.plan.get messages
pub async fn handle_get(
    client: Client,
    mut subscriber: Subscriber,
    pool: PgPool,
) -> Result<()> {
    while let Some(msg) = subscriber.next().await {
        debug!("Received hos.plan.get message");

        let reply = match msg.reply {
            Some(ref reply) => reply.clone(),
            None => {
                warn!("Message without reply subject");
                continue;
            }
        };

        let request: Request<GetPlanRequest> = match serde_json::from_slice(&msg.payload) {
            Ok(req) => req,
            Err(e) => {
                error!("Failed to parse request: {}", e);
                let error = ErrorResponse::new(Uuid::nil(), "INVALID_REQUEST", e.to_string());
                let _ = client.publish(reply, serde_json::to_vec(&error)?.into()).await;
                continue;
            }
        };

        match queries::trip_plan::get_trip_plan(&pool, request.payload.id).await {
            Ok(Some(stored)) => {
                let response = SuccessResponse::new(request.id, stored);
                let _ = client.publish(reply, serde_json::to_vec(&response)?.into()).await;
            }
            Ok(None) => {
                let error = ErrorResponse::new(
                    request.id,
                    "NOT_FOUND",
                    format!("Trip plan {} not found", request.payload.id),
                );
                let _ = client.publish(reply, serde_json::to_vec(&error)?.into()).await;
            }
            Err(e) => {
                error!("Failed to get trip plan: {}", e);
                let error = ErrorResponse::new(request.id, "DATABASE_ERROR", e.to_string());
                let _ = client.publish(reply, serde_json::to_vec(&error)?.into()).await;
            }
        }
    }

    Ok(())
}

/// Handle hos.plan.list messages
pub async fn handle_list(
    client: Client,
    mut subscriber: Subscriber,
    pool: PgPool,
) -> Result<()> {
    while let Some(msg) = subscriber.next().await {
        debug!("Received hos.plan.list message");

        let reply = match msg.reply {
            Some(ref reply) => reply.clone(),
            None => {
                warn!("Message without reply subject");
                continue;
            }
        };

        let request: Request<ListRequest> = match serde_json::from_slice(&msg.payload) {
            Ok(req) => req,
            Err(e) => {
                error!("Failed to parse request: {}", e);
                let error = ErrorResponse::new(Uuid::nil(), "INVALID_REQUEST", e.to_string());
                let _ = client.publish(reply, serde_json::to_vec(&error)?.into()).await;
                continue;
            }
        };

        let limit = request.payload.limit.clamp(1, MAX_LIST_LIMIT);
        let offset = request.payload.offset.max(0);

        match queries::trip_plan::list_trip_plans(&pool, limit, offset).await {
            Ok((items, total)) => {
                let response = SuccessResponse::new(
                    request.id,
                    ListResponse { items, total, limit, offset },
                );
                let _ = client.publish(reply, serde_json::to_vec(&response)?.into()).await;
            }
            Err(e) => {
                error!("Failed to list trip plans: {}", e);
                let error = ErrorResponse::new(request.id, "DATABASE_ERROR", e.to_string());
                let _ = client.publish(reply, serde_json::to_vec(&error)?.into()).await;
            }
        }
    }

    Ok(())
}
