//! Window statistics
//!
//! All functions are pure and work on non-null values unless noted. Quantiles
//! use linear interpolation between closest ranks.

use crate::ingestion::catalog::CanonicalField;
use crate::series::PlantRecord;
use serde::{Deserialize, Serialize};

/// Per (plant, field, window) summary
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldStats {
    pub field: CanonicalField,
    pub rows: usize,
    pub count: usize,
    pub non_null_pct: f64,
    pub sum: f64,
    pub mean: Option<f64>,
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub last: Option<f64>,
    pub std_dev: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrendDirection {
    Increasing,
    Decreasing,
    Stable,
}

/// First-half vs second-half comparison
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trend {
    pub direction: TrendDirection,
    /// `|second - first| / first * 100`, 0 when the first half averages 0
    pub magnitude_pct: f64,
    /// Signed counterpart of `magnitude_pct`
    pub change_pct: f64,
    pub first_half_mean: f64,
    pub second_half_mean: f64,
}

/// Non-null values of `field`, in date order
pub fn values(records: &[PlantRecord], field: CanonicalField) -> Vec<f64> {
    records.iter().filter_map(|r| r.value(field)).collect()
}

pub fn field_stats(records: &[PlantRecord], field: CanonicalField) -> FieldStats {
    let vals = values(records, field);
    let rows = records.len();
    let non_null_pct = if rows == 0 {
        0.0
    } else {
        vals.len() as f64 / rows as f64 * 100.0
    };

    FieldStats {
        field,
        rows,
        count: vals.len(),
        non_null_pct,
        sum: vals.iter().sum(),
        mean: mean(&vals),
        min: vals.iter().copied().reduce(f64::min),
        max: vals.iter().copied().reduce(f64::max),
        last: vals.last().copied(),
        std_dev: std_dev(&vals),
    }
}

pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        None
    } else {
        Some(values.iter().sum::<f64>() / values.len() as f64)
    }
}

/// Sample standard deviation (n - 1 denominator)
pub fn std_dev(values: &[f64]) -> Option<f64> {
    if values.len() < 2 {
        return None;
    }
    let m = mean(values)?;
    let var = values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / (values.len() - 1) as f64;
    Some(var.sqrt())
}

/// Quantile `q` in [0, 1], linear interpolation
pub fn quantile(values: &[f64], q: f64) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));

    let pos = q.clamp(0.0, 1.0) * (sorted.len() - 1) as f64;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    let frac = pos - lo as f64;
    Some(sorted[lo] + (sorted[hi] - sorted[lo]) * frac)
}

pub fn median(values: &[f64]) -> Option<f64> {
    quantile(values, 0.5)
}

/// Split by index into halves and compare their means. Direction uses strict
/// inequality, so any difference at all counts as a trend.
pub fn trend(values: &[f64]) -> Option<Trend> {
    if values.len() < 2 {
        return None;
    }
    let mid = values.len() / 2;
    let first = mean(&values[..mid])?;
    let second = mean(&values[mid..])?;

    let direction = if second > first {
        TrendDirection::Increasing
    } else if second < first {
        TrendDirection::Decreasing
    } else {
        TrendDirection::Stable
    };
    let (magnitude_pct, change_pct) = if first == 0.0 {
        (0.0, 0.0)
    } else {
        ((second - first).abs() / first * 100.0, (second - first) / first * 100.0)
    };

    Some(Trend {
        direction,
        magnitude_pct,
        change_pct,
        first_half_mean: first,
        second_half_mean: second,
    })
}

/// IQR outlier smoothing on a copy: values outside
/// `[Q1 - 1.5·IQR, Q3 + 1.5·IQR]` are replaced by the median
pub fn smooth_outliers_iqr(values: &[f64]) -> Vec<f64> {
    let (Some(q1), Some(q3), Some(med)) = (quantile(values, 0.25), quantile(values, 0.75), median(values))
    else {
        return values.to_vec();
    };
    let iqr = q3 - q1;
    let lower = q1 - 1.5 * iqr;
    let upper = q3 + 1.5 * iqr;

    values
        .iter()
        .map(|&v| if v < lower || v > upper { med } else { v })
        .collect()
}

/// `1 - stddev / mean`, clamped to [0, 1]. Fewer than two values or a zero
/// mean score 1.0.
pub fn consistency_score(values: &[f64]) -> f64 {
    let (Some(m), Some(sd)) = (mean(values), std_dev(values)) else {
        return 1.0;
    };
    if m == 0.0 {
        return 1.0;
    }
    (1.0 - sd / m).clamp(0.0, 1.0)
}

/// Pearson correlation over rows where both fields are present
pub fn pearson(records: &[PlantRecord], x: CanonicalField, y: CanonicalField) -> Option<f64> {
    let pairs: Vec<(f64, f64)> = records
        .iter()
        .filter_map(|r| Some((r.value(x)?, r.value(y)?)))
        .collect();
    if pairs.len() < 2 {
        return None;
    }
    let n = pairs.len() as f64;
    let mx = pairs.iter().map(|p| p.0).sum::<f64>() / n;
    let my = pairs.iter().map(|p| p.1).sum::<f64>() / n;

    let mut cov = 0.0;
    let mut vx = 0.0;
    let mut vy = 0.0;
    for (a, b) in &pairs {
        cov += (a - mx) * (b - my);
        vx += (a - mx).powi(2);
        vy += (b - my).powi(2);
    }
    if vx == 0.0 || vy == 0.0 {
        return None;
    }
    Some(cov / (vx.sqrt() * vy.sqrt()))
}

/// Non-null cells over all cells of the given fields, in percent
pub fn completeness_pct<'a>(
    records: &[PlantRecord],
    fields: impl IntoIterator<Item = &'a CanonicalField>,
) -> f64 {
    let fields: Vec<CanonicalField> = fields
        .into_iter()
        .copied()
        .filter(|f| *f != CanonicalField::Date)
        .collect();
    let cells = records.len() * fields.len();
    if cells == 0 {
        return 0.0;
    }
    let present: usize = records
        .iter()
        .map(|r| fields.iter().filter(|f| r.value(**f).is_some()).count())
        .sum();
    present as f64 / cells as f64 * 100.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use chrono::NaiveDate;

    #[test]
    fn test_quantiles_interpolate() {
        let v = [1.0, 2.0, 3.0, 4.0];
        assert_relative_eq!(quantile(&v, 0.25).unwrap(), 1.75);
        assert_relative_eq!(quantile(&v, 0.75).unwrap(), 3.25);
        assert_relative_eq!(median(&v).unwrap(), 2.5);
        assert_eq!(quantile(&[], 0.5), None);
    }

    #[test]
    fn test_trend_halves() {
        let t = trend(&[100.0, 100.0, 80.0, 80.0]).unwrap();
        assert_eq!(t.direction, TrendDirection::Decreasing);
        assert_relative_eq!(t.magnitude_pct, 20.0);
        assert_relative_eq!(t.change_pct, -20.0);
    }

    #[test]
    fn test_trend_strict_inequality() {
        let t = trend(&[50.0, 50.0000001]).unwrap();
        assert_eq!(t.direction, TrendDirection::Increasing);
        assert_eq!(trend(&[5.0, 5.0]).unwrap().direction, TrendDirection::Stable);
        assert!(trend(&[5.0]).is_none());
    }

    #[test]
    fn test_trend_zero_first_half() {
        let t = trend(&[0.0, 10.0]).unwrap();
        assert_eq!(t.direction, TrendDirection::Increasing);
        assert_eq!(t.magnitude_pct, 0.0);
    }

    #[test]
    fn test_iqr_replaces_with_median() {
        let v = [10.0, 11.0, 12.0, 11.0, 10.0, 500.0];
        let smoothed = smooth_outliers_iqr(&v);
        assert_relative_eq!(smoothed[5], 11.0);
        assert_eq!(&smoothed[..5], &v[..5]);
    }

    #[test]
    fn test_iqr_idempotent_on_clean_data() {
        let v = [10.0, 11.0, 12.0, 13.0];
        assert_eq!(smooth_outliers_iqr(&v), v.to_vec());
        assert!(smooth_outliers_iqr(&[]).is_empty());
    }

    #[test]
    fn test_consistency_score() {
        assert_eq!(consistency_score(&[0.0, 0.0]), 1.0);
        assert_eq!(consistency_score(&[3.0]), 1.0);
        assert_relative_eq!(consistency_score(&[10.0, 10.0, 10.0]), 1.0);
        assert_eq!(consistency_score(&[1.0, 100.0]), 0.0);
    }

    #[test]
    fn test_field_stats_and_completeness() {
        let d = |day| NaiveDate::from_ymd_opt(2024, 6, day).unwrap();
        let records = vec![
            PlantRecord::new(d(1))
                .with_value(CanonicalField::EnergyExport, Some(10.0))
                .with_value(CanonicalField::AvailabilityPct, None),
            PlantRecord::new(d(2))
                .with_value(CanonicalField::EnergyExport, Some(20.0))
                .with_value(CanonicalField::AvailabilityPct, Some(90.0)),
        ];
        let stats = field_stats(&records, CanonicalField::EnergyExport);
        assert_eq!(stats.count, 2);
        assert_relative_eq!(stats.sum, 30.0);
        assert_eq!(stats.last, Some(20.0));

        let fields = [CanonicalField::EnergyExport, CanonicalField::AvailabilityPct];
        assert_relative_eq!(completeness_pct(&records, &fields), 75.0);
    }

    #[test]
    fn test_pearson() {
        let d = |day| NaiveDate::from_ymd_opt(2024, 6, day).unwrap();
        let records: Vec<PlantRecord> = (1..=4)
            .map(|i| {
                PlantRecord::new(d(i))
                    .with_value(CanonicalField::IrradianceGhi, Some(i as f64))
                    .with_value(CanonicalField::EnergyExport, Some(2.0 * i as f64 + 1.0))
            })
            .collect();
        let r = pearson(&records, CanonicalField::EnergyExport, CanonicalField::IrradianceGhi).unwrap();
        assert_relative_eq!(r, 1.0, epsilon = 1e-12);
    }
}
