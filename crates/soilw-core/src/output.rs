//! Output aggregation: day/week/month/year accumulation with
//! optional cross-run Mean/SD columns, plus a thin CSV convenience.

use serde::{Deserialize, Serialize};

/// The aggregation period a row belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Period {
    Day,
    Week,
    Month,
    Year,
}

/// One named output column plus its running mean/variance across
/// aggregated runs (Welford's online algorithm), used for the
/// Mean/SD twin-column output the external writer expects.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct RunningStat {
    n: u64,
    mean: f64,
    m2: f64,
}

impl RunningStat {
    pub fn push(&mut self, x: f64) {
        self.n += 1;
        let delta = x - self.mean;
        self.mean += delta / self.n as f64;
        let delta2 = x - self.mean;
        self.m2 += delta * delta2;
    }

    pub fn mean(&self) -> f64 {
        self.mean
    }

    pub fn sd(&self) -> f64 {
        if self.n < 2 {
            0.0
        } else {
            (self.m2 / (self.n - 1) as f64).sqrt()
        }
    }
}

/// One time-stamped row of scalar output columns plus per-layer
/// columns (soil-layer file).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputRow {
    pub year: i32,
    pub doy_or_week_or_month: Option<u32>,
    pub columns: Vec<(String, f64)>,
    pub layer_columns: Vec<(String, Vec<f64>)>,
}

/// Accumulates rows for one [`Period`], optionally folding repeated
/// same-key rows (across stochastic replicate runs) into running
/// Mean/SD pairs instead of storing every replicate.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OutputAccumulator {
    pub period: Option<Period>,
    pub rows: Vec<OutputRow>,
    running: std::collections::BTreeMap<(i32, Option<u32>, String), RunningStat>,
}

impl OutputAccumulator {
    pub fn new(period: Period) -> Self {
        OutputAccumulator {
            period: Some(period),
            rows: Vec::new(),
            running: std::collections::BTreeMap::new(),
        }
    }

    /// Append one row, recorded verbatim for a single-run output.
    pub fn push_row(&mut self, row: OutputRow) {
        self.rows.push(row);
    }

    /// Fold one replicate's row into the running Mean/SD columns for
    /// an aggregated multi-run output.
    pub fn accumulate_replicate(&mut self, row: &OutputRow) {
        for (name, value) in &row.columns {
            let key = (row.year, row.doy_or_week_or_month, name.clone());
            self.running.entry(key).or_default().push(*value);
        }
    }

    /// Render the aggregated Mean/SD columns for one (year, period
    /// index) key, in column-insertion order as first observed.
    pub fn aggregated_columns(&self, year: i32, period_idx: Option<u32>) -> Vec<(String, f64, f64)> {
        self.running
            .iter()
            .filter(|((y, p, _), _)| *y == year && *p == period_idx)
            .map(|((_, _, name), stat)| (name.clone(), stat.mean(), stat.sd()))
            .collect()
    }

    /// Render this accumulator's single-run rows as CSV text: a
    /// header built from the first row's column names, then one line
    /// per row. Layer columns are suffixed `_layerN` (1-based).
    pub fn to_csv(&self) -> String {
        let mut out = String::new();
        let Some(first) = self.rows.first() else {
            return out;
        };

        let mut header = vec!["Year".to_string()];
        if first.doy_or_week_or_month.is_some() {
            header.push(match self.period {
                Some(Period::Day) => "Day".to_string(),
                Some(Period::Week) => "Week".to_string(),
                Some(Period::Month) => "Month".to_string(),
                _ => "Period".to_string(),
            });
        }
        for (name, _) in &first.columns {
            header.push(name.clone());
        }
        for (name, values) in &first.layer_columns {
            for i in 1..=values.len() {
                header.push(format!("{name}_layer{i}"));
            }
        }
        out.push_str(&header.join(","));
        out.push('\n');

        for row in &self.rows {
            let mut fields = vec![row.year.to_string()];
            if let Some(p) = row.doy_or_week_or_month {
                fields.push(p.to_string());
            }
            for (_, v) in &row.columns {
                fields.push(v.to_string());
            }
            for (_, values) in &row.layer_columns {
                for v in values {
                    fields.push(v.to_string());
                }
            }
            out.push_str(&fields.join(","));
            out.push('\n');
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn running_stat_matches_hand_computed_mean_sd() {
        let mut stat = RunningStat::default();
        for x in [2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0] {
            stat.push(x);
        }
        assert!((stat.mean() - 5.0).abs() < 1e-9);
        assert!((stat.sd() - 2.138_089_935_299_395).abs() < 1e-6);
    }

    #[test]
    fn csv_header_includes_layer_suffixes() {
        let mut acc = OutputAccumulator::new(Period::Day);
        acc.push_row(OutputRow {
            year: 1980,
            doy_or_week_or_month: Some(1),
            columns: vec![("PET".to_string(), 0.1)],
            layer_columns: vec![("SWC".to_string(), vec![1.0, 2.0])],
        });
        let csv = acc.to_csv();
        let header = csv.lines().next().unwrap();
        assert!(header.contains("SWC_layer1"));
        assert!(header.contains("SWC_layer2"));
        assert!(header.contains("Day"));
    }

    #[test]
    fn accumulate_replicate_builds_mean_and_sd() {
        let mut acc = OutputAccumulator::new(Period::Year);
        for pet in [0.1, 0.2, 0.3] {
            acc.accumulate_replicate(&OutputRow {
                year: 2001,
                doy_or_week_or_month: None,
                columns: vec![("PET".to_string(), pet)],
                layer_columns: vec![],
            });
        }
        let cols = acc.aggregated_columns(2001, None);
        assert_eq!(cols.len(), 1);
        assert!((cols[0].1 - 0.2).abs() < 1e-9);
    }
}
