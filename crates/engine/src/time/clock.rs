use std::f32::consts::TAU;

use crate::ecs::Component;

pub const DAYS_PER_YEAR: u32 = 365;
pub const HOURS_PER_DAY: f32 = 24.0;
pub const DEFAULT_DAY_DURATION_SECS: f32 = 120.0;
pub const DEFAULT_START_YEAR_BC: i32 = 500;

/// Progress short of a full day by less than this still counts as the day edge.
const WRAP_EPSILON: f64 = 1e-6;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DayPeriod {
    Dawn,
    EarlyMorning,
    Morning,
    Midday,
    Afternoon,
    Dusk,
    Night,
    Midnight,
}

impl DayPeriod {
    pub const ALL: [DayPeriod; 8] = [
        DayPeriod::Dawn,
        DayPeriod::EarlyMorning,
        DayPeriod::Morning,
        DayPeriod::Midday,
        DayPeriod::Afternoon,
        DayPeriod::Dusk,
        DayPeriod::Night,
        DayPeriod::Midnight,
    ];

    /// Three-hour slice for `phase` in radians; hour zero starts at dawn.
    pub fn from_phase(phase: f32) -> Self {
        let hour = phase.rem_euclid(TAU) * HOURS_PER_DAY / TAU;
        let slice = ((hour / 3.0).floor() as usize).min(Self::ALL.len() - 1);
        Self::ALL[slice]
    }

    pub fn label(self) -> &'static str {
        match self {
            DayPeriod::Dawn => "dawn",
            DayPeriod::EarlyMorning => "early_morning",
            DayPeriod::Morning => "morning",
            DayPeriod::Midday => "midday",
            DayPeriod::Afternoon => "afternoon",
            DayPeriod::Dusk => "dusk",
            DayPeriod::Night => "night",
            DayPeriod::Midnight => "midnight",
        }
    }
}

/// A point on the simulation calendar.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Timestamp {
    pub year: i32,
    pub day: u32,
    pub phase: f32,
}

impl Timestamp {
    pub fn new(year: i32, day: u32, phase: f32) -> Self {
        Self { year, day, phase }
    }
}

/// Fractional days from `earlier` to `later`. Years count down, so a later
/// timestamp has a smaller year.
pub fn days_between(earlier: Timestamp, later: Timestamp) -> f32 {
    let years = (earlier.year - later.year) as f32;
    let days = later.day as f32 - earlier.day as f32;
    let fraction = (later.phase - earlier.phase) / TAU;
    years * DAYS_PER_YEAR as f32 + days + fraction
}

/// Simulation calendar kept as a world singleton.
#[derive(Debug, Clone, PartialEq)]
pub struct SimulationClock {
    year_bc: i32,
    day: u32,
    day_progress: f64,
    day_duration: f64,
    period: DayPeriod,
    period_change: bool,
    day_change: bool,
    year_change: bool,
}

impl Default for SimulationClock {
    fn default() -> Self {
        Self::new(DEFAULT_START_YEAR_BC, 1, DEFAULT_DAY_DURATION_SECS)
    }
}

impl SimulationClock {
    pub fn new(year_bc: i32, day: u32, day_duration_secs: f32) -> Self {
        let day_duration = if day_duration_secs > 0.0 {
            day_duration_secs as f64
        } else {
            DEFAULT_DAY_DURATION_SECS as f64
        };
        Self {
            year_bc,
            day: day.clamp(1, DAYS_PER_YEAR),
            day_progress: 0.0,
            day_duration,
            period: DayPeriod::Dawn,
            period_change: false,
            day_change: false,
            year_change: false,
        }
    }

    /// Restores a saved calendar position. Edge flags are cleared.
    pub fn restore(&mut self, year_bc: i32, day: u32, phase: f32) {
        self.year_bc = year_bc;
        self.day = day.clamp(1, DAYS_PER_YEAR);
        self.day_progress = (phase.rem_euclid(TAU) / TAU) as f64;
        if self.day_progress >= 1.0 {
            self.day_progress = 0.0;
        }
        self.period = DayPeriod::from_phase(self.phase());
        self.period_change = false;
        self.day_change = false;
        self.year_change = false;
    }

    pub fn advance(&mut self, dt: f32) {
        self.period_change = false;
        self.day_change = false;
        self.year_change = false;
        if dt.is_nan() || dt <= 0.0 {
            return;
        }

        self.day_progress += dt as f64 / self.day_duration;
        while self.day_progress >= 1.0 - WRAP_EPSILON {
            self.day_progress = (self.day_progress - 1.0).max(0.0);
            self.day_change = true;
            self.day += 1;
            if self.day > DAYS_PER_YEAR {
                self.day = 1;
                self.year_bc -= 1;
                self.year_change = true;
            }
        }

        let period = DayPeriod::from_phase(self.phase());
        if period != self.period {
            self.period = period;
            self.period_change = true;
        }
    }

    pub fn year_bc(&self) -> i32 {
        self.year_bc
    }

    pub fn day(&self) -> u32 {
        self.day
    }

    /// Intra-day angle in `[0, 2π)`.
    pub fn phase(&self) -> f32 {
        let phase = (self.day_progress * std::f64::consts::TAU) as f32;
        if phase >= TAU {
            0.0
        } else {
            phase
        }
    }

    pub fn hour(&self) -> f32 {
        self.day_progress as f32 * HOURS_PER_DAY
    }

    pub fn period(&self) -> DayPeriod {
        self.period
    }

    pub fn day_duration(&self) -> f32 {
        self.day_duration as f32
    }

    /// Radians of phase per second of simulation.
    pub fn day_speed(&self) -> f32 {
        (std::f64::consts::TAU / self.day_duration) as f32
    }

    /// Seconds of simulation that make up `hours` in-game hours.
    pub fn seconds_for_hours(&self, hours: f32) -> f32 {
        hours / HOURS_PER_DAY * self.day_duration()
    }

    pub fn period_change(&self) -> bool {
        self.period_change
    }

    pub fn day_change(&self) -> bool {
        self.day_change
    }

    pub fn year_change(&self) -> bool {
        self.year_change
    }

    pub fn now(&self) -> Timestamp {
        Timestamp::new(self.year_bc, self.day, self.phase())
    }
}

impl Component for SimulationClock {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stepping_a_full_year_rolls_the_year_once() {
        let mut clock = SimulationClock::new(500, 1, DEFAULT_DAY_DURATION_SECS);
        let dt = DEFAULT_DAY_DURATION_SECS / DAYS_PER_YEAR as f32;
        let mut year_pulses = 0;
        let mut day_pulses = 0;

        for _ in 0..(DAYS_PER_YEAR * DAYS_PER_YEAR) {
            clock.advance(dt);
            year_pulses += u32::from(clock.year_change());
            day_pulses += u32::from(clock.day_change());
            assert!((1..=DAYS_PER_YEAR).contains(&clock.day()));
            assert!((0.0..TAU).contains(&clock.phase()));
        }

        assert_eq!(clock.year_bc(), 499);
        assert_eq!(clock.day(), 1);
        assert_eq!(year_pulses, 1);
        assert_eq!(day_pulses, DAYS_PER_YEAR);
        assert!(clock.year_change());
    }

    #[test]
    fn edge_flags_only_last_one_tick() {
        let mut clock = SimulationClock::new(300, 365, 10.0);
        clock.advance(10.0);
        assert!(clock.day_change());
        assert!(clock.year_change());
        assert_eq!((clock.year_bc(), clock.day()), (299, 1));

        clock.advance(0.01);
        assert!(!clock.day_change());
        assert!(!clock.year_change());
    }

    #[test]
    fn periods_are_three_hour_slices_from_dawn() {
        assert_eq!(DayPeriod::from_phase(0.0), DayPeriod::Dawn);
        let hour = TAU / HOURS_PER_DAY;
        assert_eq!(DayPeriod::from_phase(hour * 3.5), DayPeriod::EarlyMorning);
        assert_eq!(DayPeriod::from_phase(hour * 12.0), DayPeriod::Afternoon);
        assert_eq!(DayPeriod::from_phase(hour * 23.9), DayPeriod::Midnight);
    }

    #[test]
    fn period_change_pulses_on_transition() {
        let mut clock = SimulationClock::new(400, 10, 24.0);
        clock.advance(2.5);
        assert!(!clock.period_change());
        clock.advance(1.0);
        assert!(clock.period_change());
        assert_eq!(clock.period(), DayPeriod::EarlyMorning);
        clock.advance(1.0);
        assert!(!clock.period_change());
    }

    #[test]
    fn days_between_spans_year_boundary() {
        let earlier = Timestamp::new(500, 364, 0.0);
        let later = Timestamp::new(499, 2, TAU / 2.0);
        assert!((days_between(earlier, later) - 3.5).abs() < 1e-4);
    }

    #[test]
    fn restore_sets_position_without_edges() {
        let mut clock = SimulationClock::default();
        clock.restore(321, 42, TAU / 4.0);
        assert_eq!(clock.now().year, 321);
        assert_eq!(clock.day(), 42);
        assert!((clock.hour() - 6.0).abs() < 1e-3);
        assert_eq!(clock.period(), DayPeriod::Morning);
        assert!(!clock.period_change());
    }
}
