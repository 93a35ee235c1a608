//! Database queries

pub mod trip_plan;
