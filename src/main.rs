//! HOS Planner - hours-of-service trip planning worker
//!
//! Connects to NATS and answers trip plan requests. The `plan` subcommand
//! runs the scheduler offline on synthetic route totals.

mod cli;
mod config;
mod db;
mod handlers;
mod services;
mod types;

use anyhow::{Context, Result};
use chrono::{NaiveDate, Utc};
use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use tracing_appender::rolling::{RollingFileAppender, Rotation};

use crate::cli::{Cli, Command};
use crate::services::hos::planner::validate_request;
use crate::services::hos::{assemble, ResolvedTrip};
use crate::services::routing::{RouteGeometry, RouteInfo};
use crate::types::{Coordinates, PlanRequest};

#[tokio::main]
async fn main() -> Result<()> {
    // Logs directory - use LOGS_DIR env var or default to ../logs
    let logs_dir = std::env::var("LOGS_DIR")
        .unwrap_or_else(|_| "../logs".to_string());
    std::fs::create_dir_all(&logs_dir).ok();

    // File appender for persistent logs (daily rotation)
    let file_appender = RollingFileAppender::new(
        Rotation::DAILY,
        &logs_dir,
        "hos-planner.log",
    );
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);

    // Logs go to stderr and the file; stdout is reserved for `plan` output
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info,hos_planner=debug".into()),
        ))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(tracing_subscriber::fmt::layer().with_writer(non_blocking).with_ansi(false))
        .init();

    let cli = Cli::parse();

    match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => serve().await,
        Command::Migrate => migrate().await,
        Command::Plan { miles, drive_minutes, cycle_used_hours, start_date } => {
            plan_offline(miles, drive_minutes, cycle_used_hours, start_date)
        }
    }
}

async fn serve() -> Result<()> {
    info!("Starting HOS Planner...");

    let config = config::Config::from_env()?;
    info!("Configuration loaded (fuel stop {} min)", config.fuel_stop_minutes);

    let pool = db::create_pool(&config.database_url).await?;
    info!("Connected to PostgreSQL");

    db::run_migrations(&pool).await?;

    // Optional NATS_USER/NATS_PASSWORD auth
    let nats_client = match (&config.nats_user, &config.nats_password) {
        (Some(user), Some(password)) => {
            async_nats::ConnectOptions::new()
                .user_and_password(user.clone(), password.clone())
                .connect(&config.nats_url)
                .await?
        }
        _ => async_nats::connect(&config.nats_url).await?,
    };
    info!("Connected to NATS at {}", config.nats_url);

    let handler_result = handlers::start_handlers(nats_client, pool, &config).await;

    if let Err(e) = handler_result {
        error!("Handler error: {}", e);
        return Err(e);
    }

    Ok(())
}

async fn migrate() -> Result<()> {
    let config = config::Config::from_env()?;
    let pool = db::create_pool(&config.database_url).await?;
    db::run_migrations(&pool).await?;
    pool.close().await;
    Ok(())
}

fn plan_offline(
    miles: f64,
    drive_minutes: u32,
    cycle_used_hours: f64,
    start_date: Option<NaiveDate>,
) -> Result<()> {
    let rules = config::hos_rules_from_env()?;

    let request = PlanRequest {
        current_location: "Origin".to_string(),
        pickup_location: "Pickup".to_string(),
        dropoff_location: "Dropoff".to_string(),
        cycle_used_hours,
        start_date,
        current_coordinates: None,
        pickup_coordinates: None,
        dropoff_coordinates: None,
    };
    validate_request(&request, &rules)?;

    let route = RouteInfo::from_totals(miles, f64::from(drive_minutes) * 60.0, RouteGeometry::empty())?;

    // No geocoding offline; every location sits at the null island placeholder
    let placeholder = Coordinates::new(0.0, 0.0);
    let trip = ResolvedTrip {
        current_location: request.current_location,
        pickup_location: request.pickup_location,
        dropoff_location: request.dropoff_location,
        current_coordinates: placeholder,
        pickup_coordinates: placeholder,
        dropoff_coordinates: placeholder,
    };

    let start_date = start_date.unwrap_or_else(|| Utc::now().date_naive());
    let plan = assemble(&rules, trip, route, cycle_used_hours, start_date)?;

    let json = serde_json::to_string_pretty(&plan).context("Failed to encode plan")?;
    println!("{}", json);
    Ok(())
}
