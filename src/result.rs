use crate::error::{DateFailure, InterpolationError, Result};
use crate::locate::PointLocator;
use crate::mesh::{Mesh, Point};
use crate::observations::{window, ObservationSet};

use bytes::{Buf, BufMut, Bytes, BytesMut};
use chrono::{Datelike, Months, NaiveDate};
#[cfg(feature = "json_export")]
use json::{object, JsonValue};
use std::fs::File;
use std::io::{BufWriter, Read, Write};
use std::path::Path;

const BINARY_MAGIC: &[u8; 4] = b"GWHI";
const BINARY_VERSION: u32 = 1;

/// Interpolated values for every (date, node) pair
///
/// Rows are dates (sorted), columns are mesh nodes (in node order). Missing values are NaN.
#[derive(Debug, Clone)]
pub struct InterpolationResult {
    dates: Vec<NaiveDate>,
    node_ids: Vec<u32>,
    /// row-major: `values[date_idx * num_nodes + node_idx]`
    values: Vec<f64>,
    failures: Vec<DateFailure>,
}

impl InterpolationResult {
    /// A table of NaN
    pub fn new(dates: Vec<NaiveDate>, node_ids: Vec<u32>) -> Self {
        Self {
            values: vec![f64::NAN; dates.len() * node_ids.len()],
            dates,
            node_ids,
            failures: Vec::new(),
        }
    }

    pub fn num_dates(&self) -> usize {
        self.dates.len()
    }

    pub fn num_nodes(&self) -> usize {
        self.node_ids.len()
    }

    pub fn dates(&self) -> &[NaiveDate] {
        &self.dates
    }

    pub fn node_ids(&self) -> &[u32] {
        &self.node_ids
    }

    /// Dates which could not be interpolated
    pub fn failures(&self) -> &[DateFailure] {
        &self.failures
    }

    pub fn record_failure(&mut self, failure: DateFailure) {
        self.failures.push(failure);
    }

    pub fn set_row(&mut self, date_idx: usize, values: &[f64]) {
        assert_eq!(
            values.len(),
            self.num_nodes(),
            "Expected one value per node; Cannot set result row!"
        );
        let n = self.num_nodes();
        self.values[date_idx * n..(date_idx + 1) * n].copy_from_slice(values);
    }

    /// Values of every node at one date
    pub fn row(&self, date_idx: usize) -> &[f64] {
        let n = self.num_nodes();
        &self.values[date_idx * n..(date_idx + 1) * n]
    }

    pub fn row_at(&self, date: NaiveDate) -> Option<&[f64]> {
        self.dates
            .binary_search(&date)
            .ok()
            .map(|idx| self.row(idx))
    }

    pub fn value(&self, date_idx: usize, node_id: u32) -> Option<f64> {
        let node_idx = self.node_ids.iter().position(|&id| id == node_id)?;
        self.values.get(date_idx * self.num_nodes() + node_idx).copied()
    }

    /// Number of rows holding at least one value
    pub fn filled_rows(&self) -> usize {
        (0..self.num_dates())
            .filter(|&idx| self.row(idx).iter().any(|v| !v.is_nan()))
            .count()
    }

    /// Node ids as column labels
    pub fn column_names(&self) -> Vec<String> {
        self.node_ids.iter().map(|id| id.to_string()).collect()
    }

    /// Move every date label to the last day of its month
    pub fn relabel_month_end(&mut self) {
        for date in self.dates.iter_mut() {
            if let Some(end) = month_end(*date) {
                *date = end;
            }
        }
        for failure in self.failures.iter_mut() {
            if let Some(end) = month_end(failure.date) {
                failure.date = end;
            }
        }
    }

    /// Sample every row at an arbitrary location (NaN where the location is outside the mesh)
    ///
    /// `locator` must have been built from the Mesh's triangle geometry.
    pub fn station_series(
        &self,
        mesh: &Mesh,
        locator: &dyn PointLocator,
        point: &Point,
    ) -> Vec<f64> {
        assert_eq!(
            mesh.num_nodes(),
            self.num_nodes(),
            "Result does not belong to this Mesh; Cannot sample rows!"
        );

        (0..self.num_dates())
            .map(|idx| {
                mesh.sample(locator, point, self.row(idx))
                    .unwrap_or(f64::NAN)
            })
            .collect()
    }

    /// Root mean square difference between the interpolated series at a station and its measurements
    ///
    /// Missing rows are skipped and the remaining series is interpolated linearly (in days) to each
    /// measurement date, so measurements falling in a gap are compared against the interpolated value.
    /// Measurements outside the range of filled rows are not compared. Returns `None` if the station
    /// is unknown or nothing could be compared.
    pub fn rmse_against(
        &self,
        mesh: &Mesh,
        locator: &dyn PointLocator,
        observations: &ObservationSet,
        station_id: &str,
    ) -> Option<f64> {
        let station = observations.station(station_id)?;
        let measured = observations.series(station_id)?;

        let sampled = self.station_series(mesh, locator, &station.location());
        let modeled: Vec<(NaiveDate, f64)> = self
            .dates
            .iter()
            .copied()
            .zip(sampled)
            .filter(|(_, v)| !v.is_nan())
            .collect();

        let (first, last) = (modeled.first()?.0, modeled.last()?.0);
        let squared_errors: Vec<f64> = measured
            .iter()
            .filter(|(d, _)| *d >= first && *d <= last)
            .filter_map(|(d, v)| Some((window::value_at(&modeled, *d)? - v).powi(2)))
            .collect();

        if squared_errors.is_empty() {
            None
        } else {
            Some((squared_errors.iter().sum::<f64>() / squared_errors.len() as f64).sqrt())
        }
    }

    /// Produce a Json Object with the dates, node ids, values (NaN as null) and failures
    #[cfg(feature = "json_export")]
    pub fn to_json(&self) -> JsonValue {
        let rows: Vec<JsonValue> = (0..self.num_dates())
            .map(|idx| {
                JsonValue::Array(
                    self.row(idx)
                        .iter()
                        .map(|&v| if v.is_nan() { JsonValue::Null } else { v.into() })
                        .collect(),
                )
            })
            .collect();

        let failures: Vec<JsonValue> = self
            .failures
            .iter()
            .map(|f| {
                object! {
                    "date": f.date.to_string(),
                    "error": f.error.to_string(),
                }
            })
            .collect();

        object! {
            "dates": self.dates.iter().map(|d| d.to_string()).collect::<Vec<_>>(),
            "node_ids": self.node_ids.clone(),
            "values": rows,
            "failures": failures,
        }
    }

    /// Write the table in a columnar little-endian binary layout:
    ///
    /// ```text
    /// "GWHI" | version: u32 | num_dates: u32 | num_nodes: u32
    /// node ids: num_nodes × u32
    /// dates (days since 0001-01-01, CE): num_dates × i32
    /// values, one column per node: num_nodes × num_dates × f64
    /// ```
    ///
    /// Failures are not stored.
    pub fn write_binary(&self, path: impl AsRef<Path>) -> Result<()> {
        let file = File::create(path.as_ref())?;
        let mut writer = BufWriter::new(file);

        // header
        let mut header_buf = BytesMut::with_capacity(16);
        header_buf.put(&BINARY_MAGIC[..]);
        header_buf.put_u32_le(BINARY_VERSION);
        header_buf.put_u32_le(self.num_dates() as u32);
        header_buf.put_u32_le(self.num_nodes() as u32);
        writer.write_all(header_buf.as_ref())?;

        let mut id_buf = BytesMut::with_capacity(self.num_nodes() * 4);
        for &id in self.node_ids.iter() {
            id_buf.put_u32_le(id);
        }
        writer.write_all(id_buf.as_ref())?;

        let mut date_buf = BytesMut::with_capacity(self.num_dates() * 4);
        for date in self.dates.iter() {
            date_buf.put_i32_le(date.num_days_from_ce());
        }
        writer.write_all(date_buf.as_ref())?;

        // columns
        let mut column_buf = BytesMut::with_capacity(self.num_dates() * 8);
        for node_idx in 0..self.num_nodes() {
            column_buf.clear();
            for date_idx in 0..self.num_dates() {
                column_buf.put_f64_le(self.values[date_idx * self.num_nodes() + node_idx]);
            }
            writer.write_all(column_buf.as_ref())?;
        }

        writer.flush()?;
        Ok(())
    }

    /// Read a table written by [write_binary](Self::write_binary)
    pub fn read_binary(path: impl AsRef<Path>) -> Result<Self> {
        let mut contents = Vec::new();
        File::open(path.as_ref())?.read_to_end(&mut contents)?;
        let mut buf = Bytes::from(contents);

        let truncated = || InterpolationError::Io("binary result file is truncated".to_string());

        if buf.remaining() < 16 {
            return Err(truncated());
        }
        let magic = buf.copy_to_bytes(4);
        if magic[..] != BINARY_MAGIC[..] || buf.get_u32_le() != BINARY_VERSION {
            return Err(InterpolationError::Io(
                "not a binary result file".to_string(),
            ));
        }
        let num_dates = buf.get_u32_le() as usize;
        let num_nodes = buf.get_u32_le() as usize;

        let expected = num_nodes
            .checked_mul(num_dates)
            .and_then(|cells| cells.checked_mul(8))
            .and_then(|bytes| bytes.checked_add(num_nodes.checked_mul(4)?))
            .and_then(|bytes| bytes.checked_add(num_dates.checked_mul(4)?));
        if expected != Some(buf.remaining()) {
            return Err(truncated());
        }

        let node_ids: Vec<u32> = (0..num_nodes).map(|_| buf.get_u32_le()).collect();
        let dates = (0..num_dates)
            .map(|_| {
                let days = buf.get_i32_le();
                NaiveDate::from_num_days_from_ce_opt(days).ok_or_else(|| {
                    InterpolationError::Io(format!("invalid day number {} in result file", days))
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let mut result = Self::new(dates, node_ids);
        for node_idx in 0..num_nodes {
            for date_idx in 0..num_dates {
                result.values[date_idx * num_nodes + node_idx] = buf.get_f64_le();
            }
        }
        Ok(result)
    }
}

fn month_end(date: NaiveDate) -> Option<NaiveDate> {
    date.with_day(1)?
        .checked_add_months(Months::new(1))?
        .pred_opt()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::locate::LocatorKind;
    use crate::mesh::tests::two_triangle_mesh;
    use crate::observations::{Measurement, Station};

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    /// Three months of the field h = t + x + y (t = month index) on the two-triangle mesh;
    /// the second month is missing
    fn sample_result() -> InterpolationResult {
        let mesh = two_triangle_mesh();
        let dates = vec![date(2000, 1, 1), date(2000, 2, 1), date(2000, 3, 1)];
        let mut result = InterpolationResult::new(dates, mesh.node_ids().collect());

        for t in [0, 2] {
            let row: Vec<f64> = mesh
                .nodes()
                .iter()
                .map(|n| t as f64 + n.coords.x + n.coords.y)
                .collect();
            result.set_row(t, &row);
        }
        result.record_failure(DateFailure {
            date: date(2000, 2, 1),
            error: InterpolationError::InsufficientObservations {
                found: 1,
                required: 3,
            },
        });
        result
    }

    #[test]
    fn table_access() {
        let result = sample_result();

        assert_eq!(result.num_dates(), 3);
        assert_eq!(result.num_nodes(), 4);
        assert_eq!(result.column_names(), vec!["1", "2", "3", "4"]);
        assert_eq!(result.filled_rows(), 2);
        assert_eq!(result.value(2, 4), Some(4.0));
        assert!(result.value(1, 4).unwrap().is_nan());
        assert_eq!(result.value(0, 99), None);
        assert_eq!(result.row_at(date(2000, 3, 1)).unwrap(), &[2.0, 3.0, 3.0, 4.0]);
        assert!(result.row_at(date(2000, 4, 1)).is_none());
    }

    #[test]
    fn month_end_labels() {
        let mut result = sample_result();
        result.relabel_month_end();
        assert_eq!(
            result.dates(),
            &[date(2000, 1, 31), date(2000, 2, 29), date(2000, 3, 31)]
        );
        assert_eq!(result.failures()[0].date, date(2000, 2, 29));
        assert_eq!(month_end(date(1999, 12, 15)), Some(date(1999, 12, 31)));
    }

    #[test]
    fn sample_at_station() {
        let mesh = two_triangle_mesh();
        let locator = LocatorKind::Indexed.build(mesh.triangle_geometry());
        let result = sample_result();

        let series = result.station_series(&mesh, locator.as_ref(), &Point::new(0.25, 0.5));
        assert!((series[0] - 0.75).abs() < 1e-12);
        assert!(series[1].is_nan());
        assert!((series[2] - 2.75).abs() < 1e-12);

        let outside = result.station_series(&mesh, locator.as_ref(), &Point::new(2.0, 2.0));
        assert!(outside.iter().all(|v| v.is_nan()));
    }

    #[test]
    fn rmse_at_station() {
        let mesh = two_triangle_mesh();
        let locator = LocatorKind::Indexed.build(mesh.triangle_geometry());
        let result = sample_result();

        let observations = ObservationSet::new(
            vec![Station::new("W", 0.5, 0.5), Station::new("far", 9.0, 9.0)],
            vec![
                // the series is 1 on Jan 1 and 3 on Mar 1 (60 days later)
                Measurement::new("W", date(2000, 1, 1), 2.0),
                Measurement::new("W", date(2000, 1, 31), 2.0),
                Measurement::new("W", date(2000, 3, 1), 3.0),
                // outside the result's date range
                Measurement::new("W", date(2001, 1, 1), 100.0),
                Measurement::new("far", date(2000, 1, 1), 1.0),
            ],
        )
        .unwrap();

        // errors: 1, 0, 0
        let rmse = result
            .rmse_against(&mesh, locator.as_ref(), &observations, "W")
            .unwrap();
        assert!((rmse - (1.0f64 / 3.0).sqrt()).abs() < 1e-12);

        assert!(result
            .rmse_against(&mesh, locator.as_ref(), &observations, "far")
            .is_none());
        assert!(result
            .rmse_against(&mesh, locator.as_ref(), &observations, "nobody")
            .is_none());
    }

    #[cfg(feature = "json_export")]
    #[test]
    fn json_export() {
        let exported = sample_result().to_json();

        assert_eq!(exported["dates"][1], "2000-02-01");
        assert_eq!(exported["node_ids"][3], 4);
        assert!(exported["values"][1][0].is_null());
        assert_eq!(exported["values"][2][3], 4.0);
        assert_eq!(exported["failures"].len(), 1);
        assert_eq!(exported["failures"][0]["date"], "2000-02-01");
    }

    #[test]
    fn binary_file() {
        let result = sample_result();
        let path = std::env::temp_dir().join(format!("gwh_result_{}.bin", std::process::id()));

        result.write_binary(&path).unwrap();
        let bytes = std::fs::read(&path).unwrap();
        assert_eq!(&bytes[..4], b"GWHI");
        assert_eq!(bytes.len(), 16 + 4 * 4 + 3 * 4 + 4 * 3 * 8);

        let loaded = InterpolationResult::read_binary(&path).unwrap();
        std::fs::remove_file(&path).unwrap();

        assert_eq!(loaded.dates(), result.dates());
        assert_eq!(loaded.node_ids(), result.node_ids());
        assert_eq!(loaded.row(2), result.row(2));
        assert!(loaded.row(1).iter().all(|v| v.is_nan()));
        assert!(loaded.failures().is_empty());
    }

    #[test]
    fn truncated_binary_file() {
        let path = std::env::temp_dir().join(format!("gwh_truncated_{}.bin", std::process::id()));
        std::fs::write(&path, b"GWHI\x01\x00").unwrap();
        let err = InterpolationResult::read_binary(&path).unwrap_err();
        std::fs::remove_file(&path).unwrap();
        assert!(matches!(err, InterpolationError::Io(_)));
    }

    #[test]
    fn oversized_binary_header() {
        let path = std::env::temp_dir().join(format!("gwh_oversized_{}.bin", std::process::id()));
        let mut header = BytesMut::new();
        header.put_slice(BINARY_MAGIC);
        header.put_u32_le(BINARY_VERSION);
        header.put_u32_le(u32::MAX);
        header.put_u32_le(u32::MAX);
        std::fs::write(&path, &header[..]).unwrap();

        let err = InterpolationResult::read_binary(&path).unwrap_err();
        std::fs::remove_file(&path).unwrap();
        assert_eq!(
            err,
            InterpolationError::Io("binary result file is truncated".to_string())
        );
    }
}
