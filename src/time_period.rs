//! Code for working with representative time periods.
//!
//! The planning year is compressed into one representative day per season. Each day is split into
//! hourly periods, labelled `season_hHH` (e.g. `winter_h07`). Periods within a day are
//! chronologically ordered, but days are independent: the last hour of one season does not chain
//! to the first hour of the next.
use crate::id::define_id_type;
use crate::units::Dimensionless;
use anyhow::{Context, Result, ensure};
use indexmap::IndexSet;
use serde::de::Error;
use serde::{Deserialize, Serialize};
use std::fmt::Display;
use std::str::FromStr;

define_id_type! {Season}

/// The number of days in a year, used to annualise representative-day totals
pub const DAYS_PER_YEAR: f64 = 365.0;

/// A single representative time period: an hour of a season's representative day
#[derive(Hash, Eq, PartialEq, Clone, Debug, PartialOrd, Ord)]
pub struct TimePeriod {
    /// The season whose representative day the period belongs to
    pub season: Season,
    /// The hour of the day, starting from zero
    pub hour: u8,
}

impl TimePeriod {
    /// Create a new [`TimePeriod`]
    pub fn new(season: &str, hour: u8) -> Self {
        Self {
            season: season.into(),
            hour,
        }
    }

    /// Whether this is the first period of its representative day
    pub fn is_first_of_day(&self) -> bool {
        self.hour == 0
    }
}

impl Display for TimePeriod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}_h{:02}", self.season, self.hour)
    }
}

impl FromStr for TimePeriod {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        let (season, hour) = s
            .rsplit_once("_h")
            .with_context(|| format!("Invalid time period '{s}': should be in form season_hHH"))?;
        ensure!(!season.is_empty(), "Invalid time period '{s}': empty season");
        ensure!(
            !hour.is_empty() && hour.chars().all(|c| c.is_ascii_digit()),
            "Invalid time period '{s}': hour must be a number"
        );
        let hour = hour
            .parse()
            .with_context(|| format!("Invalid time period '{s}': hour out of range"))?;

        Ok(Self::new(season, hour))
    }
}

impl<'de> Deserialize<'de> for TimePeriod {
    fn deserialize<D>(deserialiser: D) -> std::result::Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s: String = Deserialize::deserialize(deserialiser)?;
        s.parse().map_err(|err: anyhow::Error| D::Error::custom(err))
    }
}

impl Serialize for TimePeriod {
    fn serialize<S>(&self, serialiser: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serialiser.collect_str(self)
    }
}

/// The set of representative periods covered by the model
#[derive(PartialEq, Debug, Clone)]
pub struct TimeIndex {
    seasons: IndexSet<Season>,
    hours_per_day: u8,
}

impl TimeIndex {
    /// Create a new [`TimeIndex`] from an ordered list of seasons.
    ///
    /// # Arguments
    ///
    /// * `seasons` - One representative day is modelled per season, in this order
    /// * `hours_per_day` - Number of hourly periods in each representative day (at most 24)
    pub fn new(seasons: &[Season], hours_per_day: u8) -> Result<Self> {
        ensure!(!seasons.is_empty(), "At least one season must be given");
        ensure!(
            (1..=24).contains(&hours_per_day),
            "hours_per_day must be between 1 and 24"
        );

        let mut set = IndexSet::new();
        for season in seasons {
            ensure!(
                !season.0.is_empty() && !season.0.contains(char::is_whitespace),
                "Invalid season name '{season}'"
            );
            ensure!(set.insert(season.clone()), "Duplicate season: {season}");
        }

        Ok(Self {
            seasons: set,
            hours_per_day,
        })
    }

    /// Iterate over the seasons in order
    pub fn seasons(&self) -> impl Iterator<Item = &Season> {
        self.seasons.iter()
    }

    /// The number of hourly periods in each representative day
    pub fn hours_per_day(&self) -> u8 {
        self.hours_per_day
    }

    /// The number of representative days (one per season)
    pub fn num_days(&self) -> usize {
        self.seasons.len()
    }

    /// The total number of periods
    pub fn len(&self) -> usize {
        self.seasons.len() * self.hours_per_day as usize
    }

    /// Whether there are no periods (never true for a validated index)
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Multiplier converting representative-day totals into annual figures
    pub fn annualisation_factor(&self) -> Dimensionless {
        Dimensionless(DAYS_PER_YEAR / self.num_days() as f64)
    }

    /// Iterate over every period, season by season and hour by hour
    pub fn iter(&self) -> impl Iterator<Item = TimePeriod> + '_ {
        self.seasons.iter().flat_map(|season| {
            (0..self.hours_per_day).map(|hour| TimePeriod {
                season: season.clone(),
                hour,
            })
        })
    }

    /// Whether the period belongs to this index
    pub fn contains(&self, period: &TimePeriod) -> bool {
        period.hour < self.hours_per_day && self.seasons.contains(&period.season)
    }

    /// The preceding period of the same representative day, if any
    pub fn previous(&self, period: &TimePeriod) -> Option<TimePeriod> {
        (!period.is_first_of_day()).then(|| TimePeriod {
            season: period.season.clone(),
            hour: period.hour - 1,
        })
    }

    /// The periods in the window `(t - length, t]`, clipped to the start of the day.
    ///
    /// Periods are returned latest first.
    pub fn window_ending_at(
        &self,
        period: &TimePeriod,
        length: u8,
    ) -> impl Iterator<Item = TimePeriod> + '_ {
        let first = period.hour.saturating_sub(length.saturating_sub(1));
        let season = period.season.clone();
        (first..=period.hour)
            .rev()
            .map(move |hour| TimePeriod {
                season: season.clone(),
                hour,
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::{fixture, rstest};

    #[fixture]
    fn time_index() -> TimeIndex {
        TimeIndex::new(&["winter".into(), "summer".into()], 3).unwrap()
    }

    #[rstest]
    #[case("winter_h07", "winter", 7)]
    #[case("early_summer_h23", "early_summer", 23)]
    #[case("autumn_h0", "autumn", 0)]
    fn test_time_period_parse(#[case] label: &str, #[case] season: &str, #[case] hour: u8) {
        assert_eq!(
            label.parse::<TimePeriod>().unwrap(),
            TimePeriod::new(season, hour)
        );
    }

    #[rstest]
    #[case("winter07")]
    #[case("winter_hxx")]
    #[case("_h01")]
    #[case("winter_h")]
    #[case("winter_h300")]
    fn test_time_period_parse_invalid(#[case] label: &str) {
        assert!(label.parse::<TimePeriod>().is_err());
    }

    #[test]
    fn test_time_period_display() {
        assert_eq!(TimePeriod::new("winter", 7).to_string(), "winter_h07");
        assert_eq!(TimePeriod::new("summer", 23).to_string(), "summer_h23");
    }

    #[rstest]
    fn test_time_index_iter(time_index: TimeIndex) {
        let labels: Vec<_> = time_index.iter().map(|p| p.to_string()).collect();
        assert_eq!(
            labels,
            [
                "winter_h00",
                "winter_h01",
                "winter_h02",
                "summer_h00",
                "summer_h01",
                "summer_h02"
            ]
        );
        assert_eq!(time_index.len(), 6);
        assert_eq!(time_index.num_days(), 2);
        assert_eq!(time_index.annualisation_factor(), Dimensionless(182.5));
    }

    #[rstest]
    fn test_time_index_previous(time_index: TimeIndex) {
        // Days do not chain into each other
        assert_eq!(time_index.previous(&TimePeriod::new("summer", 0)), None);
        assert_eq!(
            time_index.previous(&TimePeriod::new("summer", 2)),
            Some(TimePeriod::new("summer", 1))
        );
    }

    #[rstest]
    fn test_time_index_window(time_index: TimeIndex) {
        let window: Vec<_> = time_index
            .window_ending_at(&TimePeriod::new("winter", 2), 2)
            .collect();
        assert_eq!(
            window,
            [TimePeriod::new("winter", 2), TimePeriod::new("winter", 1)]
        );

        // Clipped at the start of the day
        let window: Vec<_> = time_index
            .window_ending_at(&TimePeriod::new("winter", 1), 5)
            .collect();
        assert_eq!(
            window,
            [TimePeriod::new("winter", 1), TimePeriod::new("winter", 0)]
        );
    }

    #[rstest]
    fn test_time_index_contains(time_index: TimeIndex) {
        assert!(time_index.contains(&TimePeriod::new("winter", 2)));
        assert!(!time_index.contains(&TimePeriod::new("winter", 3)));
        assert!(!time_index.contains(&TimePeriod::new("spring", 0)));
    }

    #[rstest]
    #[case(&[], 24)]
    #[case(&["winter", "winter"], 24)]
    #[case(&["winter"], 0)]
    #[case(&["winter"], 25)]
    fn test_time_index_invalid(#[case] seasons: &[&str], #[case] hours: u8) {
        let seasons: Vec<Season> = seasons.iter().map(|&s| s.into()).collect();
        assert!(TimeIndex::new(&seasons, hours).is_err());
    }
}
