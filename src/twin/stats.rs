//! Windowed cycle statistics.
//!
//! Statistics are recomputed on demand from the most recent records of the
//! history and never stored.
//!
//! # 95th percentile
//!
//! The p95 is the last of the 19 cut points that split the window into 20
//! equal groups, using the "exclusive" quantile method (positions at
//! `i·(n+1)/20`). For small windows the clamped interpolation can land above
//! the maximum; this is kept as-is so that values match existing dashboards.

use crate::twin::types::CycleRecord;

const QUANTILE_GROUPS: i64 = 20;
const P95_CUT: i64 = 19;

/// Which duration of a cycle record to aggregate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CycleField {
    /// Full cycle duration.
    #[default]
    Cycle,
    /// Anchor to opposite endpoint.
    Advance,
    /// Opposite endpoint back to anchor.
    Return,
}

impl CycleField {
    /// Extracts the selected duration from a record.
    #[must_use]
    pub fn of(self, record: &CycleRecord) -> i64 {
        match self {
            Self::Cycle => record.cycle_ms,
            Self::Advance => record.advance_ms,
            Self::Return => record.return_ms,
        }
    }
}

/// Aggregate statistics over a window of durations.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WindowStats {
    /// Arithmetic mean.
    pub avg: f64,
    /// 95th percentile (20-group exclusive method).
    pub p95: f64,
    /// Smallest value.
    pub min: f64,
    /// Largest value.
    pub max: f64,
    /// Number of values aggregated.
    pub n: usize,
}

/// Computes statistics over `values`; `None` for an empty window.
#[must_use]
pub fn window_stats(values: &[f64]) -> Option<WindowStats> {
    if values.is_empty() {
        return None;
    }

    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);

    let n = sorted.len();
    let sum: f64 = sorted.iter().sum();

    Some(WindowStats {
        avg: sum / n as f64,
        p95: p95(&sorted),
        min: sorted[0],
        max: sorted[n - 1],
        n,
    })
}

/// Computes statistics of one field over a window of records.
#[must_use]
pub fn record_stats(records: &[&CycleRecord], field: CycleField) -> Option<WindowStats> {
    let values: Vec<f64> = records.iter().map(|r| field.of(r) as f64).collect();
    window_stats(&values)
}

/// 95th percentile of ascending `sorted` values.
fn p95(sorted: &[f64]) -> f64 {
    let len = sorted.len();
    if len == 1 {
        return sorted[0];
    }

    let m = len as i64 + 1;
    let j = (P95_CUT * m / QUANTILE_GROUPS).clamp(1, len as i64 - 1);
    let delta = P95_CUT * m - j * QUANTILE_GROUPS;
    let j = j as usize;

    (sorted[j - 1] * (QUANTILE_GROUPS - delta) as f64 + sorted[j] * delta as f64)
        / QUANTILE_GROUPS as f64
}

/// Cycles per minute for a cycle duration; 0 for non-positive durations.
#[must_use]
pub fn cycles_per_minute(cycle_ms: f64) -> f64 {
    if cycle_ms > 0.0 {
        60_000.0 / cycle_ms
    } else {
        0.0
    }
}

/// Cycles per minute of the mean cycle duration over `records`.
///
/// This is the rate of the average cycle, not the average of per-cycle rates.
#[must_use]
pub fn windowed_cpm(records: &[&CycleRecord]) -> f64 {
    record_stats(records, CycleField::Cycle).map_or(0.0, |s| cycles_per_minute(s.avg))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::twin::types::Endpoint;
    use approx::assert_relative_eq;

    fn cycles(durations: &[i64]) -> Vec<CycleRecord> {
        durations
            .iter()
            .map(|&d| CycleRecord::new(Endpoint::Top, 0, d / 3, d, 0))
            .collect()
    }

    #[test]
    fn test_empty_window_is_none() {
        assert_eq!(window_stats(&[]), None);
        assert_eq!(record_stats(&[], CycleField::Cycle), None);
    }

    #[test]
    fn test_single_value() {
        let s = window_stats(&[2900.0]).unwrap();

        assert_eq!(s.n, 1);
        assert_relative_eq!(s.avg, 2900.0);
        assert_relative_eq!(s.p95, 2900.0);
        assert_relative_eq!(s.min, 2900.0);
        assert_relative_eq!(s.max, 2900.0);
    }

    #[test]
    fn test_p95_two_values_extrapolates() {
        let s = window_stats(&[200.0, 100.0]).unwrap();

        assert_relative_eq!(s.p95, 285.0);
        assert_relative_eq!(s.avg, 150.0);
        assert_relative_eq!(s.min, 100.0);
        assert_relative_eq!(s.max, 200.0);
    }

    #[test]
    fn test_p95_three_values() {
        let s = window_stats(&[2900.0, 2950.0, 2850.0]).unwrap();
        assert_relative_eq!(s.p95, 2990.0);
    }

    #[test]
    fn test_p95_five_values() {
        let s = window_stats(&[50.0, 10.0, 40.0, 20.0, 30.0]).unwrap();
        assert_relative_eq!(s.p95, 57.0);
    }

    #[test]
    fn test_p95_twenty_values_interpolates() {
        let values: Vec<f64> = (1..=20).map(f64::from).collect();
        let s = window_stats(&values).unwrap();

        assert_relative_eq!(s.p95, 19.95);
        assert_relative_eq!(s.avg, 10.5);
        assert_eq!(s.n, 20);
    }

    #[test]
    fn test_p95_constant_window() {
        let s = window_stats(&[3000.0; 7]).unwrap();
        assert_relative_eq!(s.p95, 3000.0);
    }

    #[test]
    fn test_record_stats_selects_field() {
        let records = vec![
            CycleRecord::new(Endpoint::Top, 0, 1000, 2900, 0),
            CycleRecord::new(Endpoint::Base, 1000, 2900, 3900, 0),
        ];
        let refs: Vec<&CycleRecord> = records.iter().collect();

        let adv = record_stats(&refs, CycleField::Advance).unwrap();
        assert_relative_eq!(adv.min, 1000.0);
        assert_relative_eq!(adv.max, 1900.0);

        let ret = record_stats(&refs, CycleField::Return).unwrap();
        assert_relative_eq!(ret.min, 1000.0);
        assert_relative_eq!(ret.max, 1900.0);

        let cyc = record_stats(&refs, CycleField::Cycle).unwrap();
        assert_relative_eq!(cyc.avg, 2900.0);
    }

    #[test]
    fn test_cycles_per_minute() {
        assert_relative_eq!(cycles_per_minute(3000.0), 20.0);
        assert_relative_eq!(cycles_per_minute(60_000.0), 1.0);
        assert_relative_eq!(cycles_per_minute(0.0), 0.0);
        assert_relative_eq!(cycles_per_minute(-5.0), 0.0);
    }

    #[test]
    fn test_windowed_cpm_uses_average_duration() {
        let records = cycles(&[2000, 4000]);
        let refs: Vec<&CycleRecord> = records.iter().collect();

        // Mean 3000ms -> 20 cpm (not mean of 30 and 15 = 22.5).
        assert_relative_eq!(windowed_cpm(&refs), 20.0);
    }

    #[test]
    fn test_windowed_cpm_empty() {
        assert_relative_eq!(windowed_cpm(&[]), 0.0);
    }
}
