//! CLI argument parsing for the hos-planner binary.

use chrono::NaiveDate;
use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "hos-planner", about = "Hours-of-service trip planner")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand)]
pub enum Command {
    /// Start the NATS planner service (default if no subcommand given)
    Serve,
    /// Run database migrations and exit
    Migrate,
    /// Plan a synthetic trip offline and print the plan as JSON
    Plan {
        /// Total route distance in miles
        #[arg(long)]
        miles: f64,
        /// Total route drive time in minutes
        #[arg(long)]
        drive_minutes: u32,
        /// Hours already used in the 70-hour cycle
        #[arg(long, default_value_t = 0.0)]
        cycle_used_hours: f64,
        /// First day of the trip (YYYY-MM-DD), defaults to today
        #[arg(long)]
        start_date: Option<NaiveDate>,
    },
}
