/// Temporal windows and per-station aggregation
pub mod window;

pub use window::{Aggregation, TemporalWindow};

use crate::error::{InterpolationError, Result};
use crate::mesh::Point;

use chrono::{Datelike, Months, NaiveDate};
use std::collections::BTreeMap;
use tracing::debug;

/// An observation well
#[derive(Debug, Clone, PartialEq)]
pub struct Station {
    pub id: String,
    pub x: f64,
    pub y: f64,
}

impl Station {
    pub fn new(id: impl Into<String>, x: f64, y: f64) -> Self {
        Self { id: id.into(), x, y }
    }

    pub fn location(&self) -> Point {
        Point::new(self.x, self.y)
    }
}

/// A single groundwater level (or depth) reading
#[derive(Debug, Clone, PartialEq)]
pub struct Measurement {
    pub station_id: String,
    pub date: NaiveDate,
    pub value: f64,
}

impl Measurement {
    pub fn new(station_id: impl Into<String>, date: NaiveDate, value: f64) -> Self {
        Self {
            station_id: station_id.into(),
            date,
            value,
        }
    }
}

/// Measurements joined with their station locations
///
/// Every station in the set has at least one measurement; each station's series is sorted by date
/// and holds at most one value per date.
#[derive(Debug, Clone)]
pub struct ObservationSet {
    stations: Vec<Station>,
    series: Vec<Vec<(NaiveDate, f64)>>,
}

impl ObservationSet {
    /// Join measurements with station coordinates
    ///
    /// * Measurements of unknown stations and measurements with a non-finite value are dropped
    /// * If a station id is listed more than once, its first coordinates are used
    /// * If a station has several measurements on the same date, the first one (in input order) is kept
    ///
    /// Returns an `EmptyObservations` Error if no measurement remains
    pub fn new(stations: Vec<Station>, measurements: Vec<Measurement>) -> Result<Self> {
        let mut lookup: BTreeMap<String, usize> = BTreeMap::new();
        let mut known: Vec<Station> = Vec::with_capacity(stations.len());
        for station in stations {
            if !(station.x.is_finite() && station.y.is_finite()) {
                debug!(station = %station.id, "station has no valid location; ignored");
                continue;
            }
            if !lookup.contains_key(&station.id) {
                lookup.insert(station.id.clone(), known.len());
                known.push(station);
            }
        }

        let num_measurements = measurements.len();
        let mut series: Vec<Vec<(NaiveDate, f64)>> = vec![Vec::new(); known.len()];
        for m in measurements {
            if !m.value.is_finite() {
                continue;
            }
            if let Some(&idx) = lookup.get(&m.station_id) {
                series[idx].push((m.date, m.value));
            }
        }

        for s in series.iter_mut() {
            // stable: the first measurement of a date survives the dedup
            s.sort_by_key(|(d, _)| *d);
            s.dedup_by_key(|(d, _)| *d);
        }

        let (stations, series): (Vec<Station>, Vec<Vec<(NaiveDate, f64)>>) = known
            .into_iter()
            .zip(series)
            .filter(|(_, s)| !s.is_empty())
            .unzip();

        if stations.is_empty() {
            return Err(InterpolationError::EmptyObservations);
        }

        let set = Self { stations, series };
        debug!(
            stations = set.stations.len(),
            kept = set.num_measurements(),
            dropped = num_measurements - set.num_measurements(),
            "prepared observations"
        );
        Ok(set)
    }

    pub fn stations(&self) -> &[Station] {
        &self.stations
    }

    pub fn num_stations(&self) -> usize {
        self.stations.len()
    }

    pub fn num_measurements(&self) -> usize {
        self.series.iter().map(Vec::len).sum()
    }

    pub fn station(&self, id: &str) -> Option<&Station> {
        self.stations.iter().find(|s| s.id == id)
    }

    /// Date-sorted measurements of a station
    pub fn series(&self, id: &str) -> Option<&[(NaiveDate, f64)]> {
        self.stations
            .iter()
            .position(|s| s.id == id)
            .map(|idx| self.series[idx].as_slice())
    }

    /// Earliest and latest measurement dates
    pub fn date_range(&self) -> (NaiveDate, NaiveDate) {
        let first = self.series.iter().filter_map(|s| s.first()).map(|(d, _)| *d);
        let last = self.series.iter().filter_map(|s| s.last()).map(|(d, _)| *d);
        (
            first.min().unwrap_or(NaiveDate::MIN),
            last.max().unwrap_or(NaiveDate::MAX),
        )
    }

    /// The first day of every month from the month of the earliest measurement to the month of the latest one
    pub fn monthly_dates(&self) -> Vec<NaiveDate> {
        let (first, last) = self.date_range();
        month_starts(first, last)
    }

    /// One value per station for a target date, paired with the station's location
    ///
    /// Stations without any measurement inside the window are left out.
    pub fn values_at(
        &self,
        target: NaiveDate,
        window: &TemporalWindow,
        aggregation: Aggregation,
    ) -> Vec<(Point, f64)> {
        let windowed: Vec<&[(NaiveDate, f64)]> = self
            .series
            .iter()
            .map(|s| window.select(target, s))
            .collect();

        self.stations
            .iter()
            .zip(window::aggregate(&windowed, target, aggregation))
            .filter_map(|(station, value)| Some((station.location(), value?)))
            .collect()
    }
}

/// First day of each month between two dates (inclusive of both dates' months)
pub fn month_starts(first: NaiveDate, last: NaiveDate) -> Vec<NaiveDate> {
    let mut dates = Vec::new();
    let mut month = first.with_day(1);
    while let Some(d) = month {
        if d > last {
            break;
        }
        dates.push(d);
        month = d.checked_add_months(Months::new(1));
    }
    dates
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn sample_set() -> ObservationSet {
        ObservationSet::new(
            vec![
                Station::new("A", 0.0, 0.0),
                Station::new("B", 1.0, 0.0),
                Station::new("A", 5.0, 5.0),
                Station::new("C", 0.0, 1.0),
                Station::new("silent", 3.0, 3.0),
            ],
            vec![
                Measurement::new("A", date(2000, 3, 1), 20.0),
                Measurement::new("A", date(2000, 1, 1), 10.0),
                Measurement::new("A", date(2000, 1, 1), 99.0),
                Measurement::new("B", date(2000, 2, 10), f64::NAN),
                Measurement::new("B", date(2000, 2, 15), 5.0),
                Measurement::new("C", date(2001, 6, 20), 7.0),
                Measurement::new("unknown", date(2000, 1, 1), 1.0),
            ],
        )
        .unwrap()
    }

    #[test]
    fn join_and_normalize() {
        let set = sample_set();

        assert_eq!(set.num_stations(), 3);
        assert_eq!(set.num_measurements(), 4);
        assert_eq!(set.station("A").unwrap().location(), Point::new(0.0, 0.0));
        assert!(set.station("silent").is_none());
        assert_eq!(
            set.series("A").unwrap(),
            &[(date(2000, 1, 1), 10.0), (date(2000, 3, 1), 20.0)]
        );
        assert_eq!(set.date_range(), (date(2000, 1, 1), date(2001, 6, 20)));
    }

    #[test]
    fn nothing_left() {
        let err = ObservationSet::new(
            vec![Station::new("A", 0.0, 0.0)],
            vec![
                Measurement::new("A", date(2000, 1, 1), f64::NAN),
                Measurement::new("B", date(2000, 1, 1), 1.0),
            ],
        )
        .unwrap_err();
        assert_eq!(err, InterpolationError::EmptyObservations);
    }

    #[test]
    fn monthly_target_dates() {
        let dates = sample_set().monthly_dates();
        assert_eq!(dates.len(), 18);
        assert_eq!(dates[0], date(2000, 1, 1));
        assert_eq!(dates[1], date(2000, 2, 1));
        assert_eq!(dates[17], date(2001, 6, 1));

        assert_eq!(
            month_starts(date(2000, 12, 31), date(2001, 1, 1)),
            vec![date(2000, 12, 1), date(2001, 1, 1)]
        );
    }

    #[test]
    fn station_values_for_a_date() {
        let set = sample_set();
        let window = TemporalWindow::default();

        let values = set.values_at(date(2000, 2, 1), &window, Aggregation::WindowMean);
        // C has nothing in the window
        assert_eq!(values.len(), 2);
        // union of dates {Jan 1, Feb 15, Mar 1}: A -> 10, 17.5 (45 of 60 days), 20
        assert_eq!(values[0].0, Point::new(0.0, 0.0));
        assert!((values[0].1 - 47.5 / 3.0).abs() < 1e-12);
        assert_eq!(values[1], (Point::new(1.0, 0.0), 5.0));

        let values = set.values_at(date(2000, 2, 1), &window, Aggregation::AtTargetDate);
        assert!((values[0].1 - (10.0 + 10.0 * 31.0 / 60.0)).abs() < 1e-12);
    }
}
