//! NATS message handlers

pub mod ping;
pub mod plan;

use std::sync::Arc;
use anyhow::Result;
use async_nats::Client;
use sqlx::PgPool;
use tokio::select;
use tracing::{error, info};

use crate::config::Config;
use crate::services::geocoding::{create_location_resolver, LocationResolver};
use crate::services::hos::TripPlanner;
use crate::services::routing::{create_routing_service_with_fallback, RoutingService};

pub const SUBJECT_PING: &str = "hos.ping";
pub const SUBJECT_PLAN_CREATE: &str = "hos.plan.create";
pub const SUBJECT_PLAN_GET: &str = "hos.plan.get";
pub const SUBJECT_PLAN_LIST: &str = "hos.plan.list";

/// Start all message handlers
pub async fn start_handlers(client: Client, pool: PgPool, config: &Config) -> Result<()> {
    info!("Starting message handlers...");

    let resolver: Arc<dyn LocationResolver> = Arc::from(
        create_location_resolver(&config.geocoder_backend, &config.nominatim_url)?
    );
    info!("Location resolver initialized: {}", resolver.name());

    // Create routing service with automatic Valhalla detection
    let routing_service: Arc<dyn RoutingService> = Arc::from(
        create_routing_service_with_fallback(config.valhalla_url.clone()).await
    );
    info!("Routing service initialized: {}", routing_service.name());

    let rules = config.hos_rules();
    info!(
        "HOS rules {} (fuel stop {} min)",
        rules.version, rules.fuel_stop_duration_minutes
    );
    let planner = Arc::new(TripPlanner::new(rules, routing_service, resolver));
    let rules_version = planner.rules().version.clone();

    let ping_sub = client.subscribe(SUBJECT_PING).await?;
    let plan_create_sub = client.subscribe(SUBJECT_PLAN_CREATE).await?;
    let plan_get_sub = client.subscribe(SUBJECT_PLAN_GET).await?;
    let plan_list_sub = client.subscribe(SUBJECT_PLAN_LIST).await?;

    info!(
        "Subscribed to {}, {}, {}, {}",
        SUBJECT_PING, SUBJECT_PLAN_CREATE, SUBJECT_PLAN_GET, SUBJECT_PLAN_LIST
    );

    let client_ping = client.clone();
    let ping_handle = tokio::spawn(async move {
        ping::handle_ping(client_ping, ping_sub, rules_version).await
    });

    let client_create = client.clone();
    let pool_create = pool.clone();
    let plan_create_handle = tokio::spawn(async move {
        plan::handle_create(client_create, plan_create_sub, pool_create, planner).await
    });

    let client_get = client.clone();
    let pool_get = pool.clone();
    let plan_get_handle = tokio::spawn(async move {
        plan::handle_get(client_get, plan_get_sub, pool_get).await
    });

    let client_list = client.clone();
    let pool_list = pool;
    let plan_list_handle = tokio::spawn(async move {
        plan::handle_list(client_list, plan_list_sub, pool_list).await
    });

    info!("All handlers started, waiting for messages...");

    // Any handler ending means the subscription closed or failed
    select! {
        result = ping_handle => {
            error!("Ping handler finished: {:?}", result);
        }
        result = plan_create_handle => {
            error!("Plan create handler finished: {:?}", result);
        }
        result = plan_get_handle => {
            error!("Plan get handler finished: {:?}", result);
        }
        result = plan_list_handle => {
            error!("Plan list handler finished: {:?}", result);
        }
    }

    Ok(())
}
