//! Trip plan database queries

use anyhow::Result;
use chrono::{DateTime, Utc};
use sqlx::types::Json;
use sqlx::PgPool;
use uuid::Uuid;

use crate::types::{StoredTripPlan, TripPlan, TripPlanSummary};

/// Persist a computed plan and return it with its identity
pub async fn insert_trip_plan(pool: &PgPool, plan: TripPlan) -> Result<StoredTripPlan> {
    let id = Uuid::new_v4();

    let (created_at,): (DateTime<Utc>,) = sqlx::query_as(
        r#"
        INSERT INTO trip_plans (
            id, current_location, pickup_location, dropoff_location,
            cycle_used_hours, total_miles, total_drive_minutes,
            trip_completed, rules_version, plan
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
        RETURNING created_at
        "#
    )
    .bind(id)
    .bind(&plan.current_location)
    .bind(&plan.pickup_location)
    .bind(&plan.dropoff_location)
    .bind(plan.cycle_used_hours)
    .bind(plan.total_miles)
    .bind(i32::try_from(plan.total_drive_minutes)?)
    .bind(plan.trip_completed)
    .bind(&plan.rules_version)
    .bind(Json(&plan))
    .fetch_one(pool)
    .await?;

    Ok(StoredTripPlan { id, created_at, plan })
}

/// Get a stored plan by id
pub async fn get_trip_plan(pool: &PgPool, id: Uuid) -> Result<Option<StoredTripPlan>> {
    let row: Option<(Uuid, DateTime<Utc>, Json<TripPlan>)> = sqlx::query_as(
        r#"
        SELECT id, created_at, plan
        FROM trip_plans
        WHERE id = $1
        "#
    )
    .bind(id)
    .fetch_optional(pool)
    .await?;

    Ok(row.map(|(id, created_at, Json(plan))| StoredTripPlan { id, created_at, plan }))
}

/// List plan summaries, newest first
pub async fn list_trip_plans(pool: &PgPool, limit: i64, offset: i64) -> Result<(Vec<TripPlanSummary>, i64)> {
    let items = sqlx::query_as::<_, TripPlanSummary>(
        r#"
        SELECT
            id, current_location, pickup_location, dropoff_location,
            total_miles, total_drive_minutes, trip_completed, created_at
        FROM trip_plans
        ORDER BY created_at DESC, id
        LIMIT $1 OFFSET $2
        "#
    )
    .bind(limit)
    .bind(offset)
    .fetch_all(pool)
    .await?;

    let (total,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM trip_plans")
        .fetch_one(pool)
        .await?;

    Ok((items, total))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::hos::planner::{assemble, ResolvedTrip};
    use crate::services::hos::HosRules;
    use crate::services::routing::{RouteGeometry, RouteInfo};
    use crate::types::Coordinates;
    use chrono::NaiveDate;

    fn sample_plan() -> TripPlan {
        let trip = ResolvedTrip {
            current_location: "Denver, CO".to_string(),
            pickup_location: "Denver, CO".to_string(),
            dropoff_location: "Kansas City, MO".to_string(),
            current_coordinates: Coordinates::new(39.7392, -104.9903),
            pickup_coordinates: Coordinates::new(39.7392, -104.9903),
            dropoff_coordinates: Coordinates::new(39.0997, -94.5786),
        };
        let route = RouteInfo {
            distance_miles: 605.0,
            drive_minutes: 540,
            geometry: RouteGeometry::empty(),
        };
        assemble(&HosRules::default(), trip, route, 20.0, NaiveDate::from_ymd_opt(2025, 5, 1).unwrap()).unwrap()
    }

    #[test]
    fn test_plan_survives_json_column_encoding() {
        let plan = sample_plan();
        let text = serde_json::to_string(&Json(&plan)).unwrap();
        let Json(decoded): Json<TripPlan> = serde_json::from_str(&text).unwrap();

        assert_eq!(decoded.segments.len(), plan.segments.len());
        assert_eq!(decoded.stops, plan.stops);
        assert_eq!(decoded.daily_sheets.len(), plan.daily_sheets.len());
        assert_eq!(decoded.start_date, plan.start_date);
        assert_eq!(decoded.total_elapsed_minutes, plan.total_elapsed_minutes);
        assert!((decoded.total_miles - plan.total_miles).abs() < 1e-9);
    }

    #[tokio::test]
    #[ignore = "Requires running PostgreSQL (DATABASE_URL)"]
    async fn test_insert_get_list_roundtrip() {
        let url = std::env::var("DATABASE_URL").unwrap();
        let pool = crate::db::create_pool(&url).await.unwrap();
        crate::db::run_migrations(&pool).await.unwrap();

        let stored = insert_trip_plan(&pool, sample_plan()).await.unwrap();
        let fetched = get_trip_plan(&pool, stored.id).await.unwrap().unwrap();
        assert_eq!(fetched.plan.segments.len(), stored.plan.segments.len());
        assert_eq!(fetched.plan.trip_completed, stored.plan.trip_completed);

        let (items, total) = list_trip_plans(&pool, 10, 0).await.unwrap();
        assert!(total >= 1);
        assert!(items.iter().any(|s| s.id == stored.id));

        assert!(get_trip_plan(&pool, Uuid::new_v4()).await.unwrap().is_none());
    }
}
