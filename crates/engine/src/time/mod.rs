//! Simulation calendar.

mod clock;
mod system;

pub use clock::{
    days_between, DayPeriod, SimulationClock, Timestamp, DAYS_PER_YEAR,
    DEFAULT_DAY_DURATION_SECS, DEFAULT_START_YEAR_BC, HOURS_PER_DAY,
};
pub use system::TimeSystem;
