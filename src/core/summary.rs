use std::io;

use super::types::{HistogramBin, SimulationReport};

pub const DEFAULT_HISTOGRAM_BINS: usize = 30;
pub const CSV_FILE_NAME: &str = "simulation_results.csv";
const CSV_HEADER: &str = "Ending Balance";

/// Equal-width bins spanning the observed range; the last bin is closed on the right.
pub fn histogram(values: &[f64], bins: usize) -> Vec<HistogramBin> {
    if values.is_empty() || bins == 0 {
        return Vec::new();
    }

    let min = values.iter().copied().fold(f64::INFINITY, f64::min);
    let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);

    if max <= min {
        return vec![HistogramBin {
            lower: min,
            upper: max,
            count: values.len() as u32,
        }];
    }

    let width = (max - min) / bins as f64;
    let mut out: Vec<HistogramBin> = (0..bins)
        .map(|i| HistogramBin {
            lower: min + i as f64 * width,
            upper: if i + 1 == bins {
                max
            } else {
                min + (i + 1) as f64 * width
            },
            count: 0,
        })
        .collect();

    for &value in values {
        let idx = (((value - min) / width).floor() as usize).min(bins - 1);
        out[idx].count += 1;
    }

    out
}

/// One row per trial under a single `Ending Balance` column, no index column.
pub fn write_csv<W: io::Write>(report: &SimulationReport, writer: W) -> Result<(), csv::Error> {
    let mut wtr = csv::Writer::from_writer(writer);
    wtr.write_record([CSV_HEADER])?;
    for balance in &report.ending_balances {
        wtr.write_record([balance.to_string()])?;
    }
    wtr.flush()?;
    Ok(())
}

pub fn csv_string(report: &SimulationReport) -> Result<String, String> {
    let mut buf = Vec::new();
    write_csv(report, &mut buf).map_err(|e| format!("Failed to write CSV: {e}"))?;
    String::from_utf8(buf).map_err(|e| format!("CSV output was not UTF-8: {e}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn report_with(ending_balances: Vec<f64>) -> SimulationReport {
        SimulationReport {
            ending_balances,
            depleted_trials: 0,
            depletion_fraction: 0.0,
            mean_balance: 0.0,
            min_balance: 0.0,
            max_balance: 0.0,
        }
    }

    #[test]
    fn histogram_counts_every_value_once() {
        let values: Vec<f64> = (0..=100).map(|v| v as f64).collect();
        let bins = histogram(&values, DEFAULT_HISTOGRAM_BINS);
        assert_eq!(bins.len(), 30);
        assert_eq!(bins.iter().map(|b| b.count).sum::<u32>(), 101);
        assert_eq!(bins[0].lower, 0.0);
        assert_eq!(bins[29].upper, 100.0);
    }

    #[test]
    fn histogram_puts_the_maximum_in_the_last_bin() {
        let bins = histogram(&[0.0, 5.0, 10.0], 2);
        assert_eq!(bins[0].count, 1);
        assert_eq!(bins[1].count, 2);
    }

    #[test]
    fn histogram_of_identical_values_is_a_single_bin() {
        let bins = histogram(&[0.0, 0.0, 0.0], 30);
        assert_eq!(
            bins,
            vec![HistogramBin {
                lower: 0.0,
                upper: 0.0,
                count: 3,
            }]
        );
    }

    #[test]
    fn histogram_of_nothing_is_empty() {
        assert!(histogram(&[], 30).is_empty());
        assert!(histogram(&[1.0, 2.0], 0).is_empty());
    }

    #[test]
    fn csv_has_header_and_one_row_per_trial() {
        let csv = csv_string(&report_with(vec![1500.5, 0.0, 42.0])).expect("csv");
        assert_eq!(csv, "Ending Balance\n1500.5\n0\n42\n");
    }

    #[test]
    fn csv_of_single_trial_round_trips_value() {
        let csv = csv_string(&report_with(vec![4_269_864.123456])).expect("csv");
        let mut rdr = csv::Reader::from_reader(csv.as_bytes());
        let headers = rdr.headers().expect("headers").clone();
        assert_eq!(headers.iter().collect::<Vec<_>>(), vec!["Ending Balance"]);
        let rows: Vec<f64> = rdr
            .records()
            .map(|r| r.expect("row")[0].parse().expect("number"))
            .collect();
        assert_eq!(rows, vec![4_269_864.123456]);
    }
}
