use chrono::{Months, NaiveDate};

/// How the measurements of one station inside a window are reduced to a single value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Aggregation {
    /// Mean of the station's time-interpolated series over every measurement date in the window
    #[default]
    WindowMean,
    /// The station's time-interpolated series evaluated at the target date
    AtTargetDate,
}

impl Aggregation {
    pub fn name(&self) -> &'static str {
        match self {
            Self::WindowMean => "window_mean",
            Self::AtTargetDate => "at_target_date",
        }
    }
}

/// Range of dates `[target - months_before, target + months_after]` (inclusive) considered for a target date
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TemporalWindow {
    pub months_before: u32,
    pub months_after: u32,
}

impl Default for TemporalWindow {
    fn default() -> Self {
        Self {
            months_before: 12,
            months_after: 1,
        }
    }
}

impl TemporalWindow {
    pub fn new(months_before: u32, months_after: u32) -> Self {
        Self {
            months_before,
            months_after,
        }
    }

    /// First and last date of the window around `target`
    ///
    /// Month arithmetic clamps to the end of shorter months (Mar 31 - 1 month = Feb 28/29).
    pub fn bounds(&self, target: NaiveDate) -> (NaiveDate, NaiveDate) {
        let start = target
            .checked_sub_months(Months::new(self.months_before))
            .unwrap_or(NaiveDate::MIN);
        let end = target
            .checked_add_months(Months::new(self.months_after))
            .unwrap_or(NaiveDate::MAX);
        (start, end)
    }

    /// The part of a date-sorted series which falls inside the window
    pub fn select<'s>(
        &self,
        target: NaiveDate,
        series: &'s [(NaiveDate, f64)],
    ) -> &'s [(NaiveDate, f64)] {
        let (start, end) = self.bounds(target);
        let first = series.partition_point(|(d, _)| *d < start);
        let last = series.partition_point(|(d, _)| *d <= end);
        &series[first..last.max(first)]
    }
}

/// Evaluate a date-sorted series at `date`
///
/// Linear in time (days) between the two bracketing measurements, constant beyond the first and
/// last measurement. `None` for an empty series.
pub fn value_at(series: &[(NaiveDate, f64)], date: NaiveDate) -> Option<f64> {
    let idx = series.partition_point(|(d, _)| *d < date);

    if idx == series.len() {
        return series.last().map(|(_, v)| *v);
    }

    let (d1, v1) = series[idx];
    if d1 == date || idx == 0 {
        return Some(v1);
    }

    let (d0, v0) = series[idx - 1];
    let span = (d1 - d0).num_days() as f64;
    let t = (date - d0).num_days() as f64 / span;
    Some(v0 + t * (v1 - v0))
}

/// Reduce the in-window series of several stations to one value per station
///
/// With [Aggregation::WindowMean], every station's series is evaluated on the union of all
/// stations' measurement dates (interpolating across interior gaps, holding the first/last value
/// at the edges) and averaged. Stations without any measurement in the window yield `None`.
pub fn aggregate(
    windowed: &[&[(NaiveDate, f64)]],
    target: NaiveDate,
    aggregation: Aggregation,
) -> Vec<Option<f64>> {
    match aggregation {
        Aggregation::AtTargetDate => windowed
            .iter()
            .map(|series| value_at(series, target))
            .collect(),
        Aggregation::WindowMean => {
            let mut union: Vec<NaiveDate> = windowed
                .iter()
                .flat_map(|series| series.iter().map(|(d, _)| *d))
                .collect();
            union.sort_unstable();
            union.dedup();

            windowed
                .iter()
                .map(|series| {
                    if series.is_empty() {
                        return None;
                    }
                    let sum: f64 = union
                        .iter()
                        .filter_map(|d| value_at(series, *d))
                        .sum();
                    Some(sum / union.len() as f64)
                })
                .collect()
        }
    }
}
