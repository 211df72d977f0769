use std::fs::File;

use clap::{Parser, Subcommand};
use swr::api::{Cli, build_request, run_http_server, run_request};
use swr::core::{HistogramBin, SimulationReport, histogram, write_csv};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(
    name = "swr",
    about = "Monte Carlo safe withdrawal rate estimator"
)]
struct App {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Serve the HTTP API and form page.
    Serve {
        #[arg(default_value_t = 8080)]
        port: u16,
    },
    /// Run one simulation and print the summary.
    Simulate(Cli),
}

#[tokio::main]
async fn main() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let app = App::parse();
    let outcome = match app.command {
        Command::Serve { port } => run_http_server(port)
            .await
            .map_err(|e| format!("Server error: {e}")),
        Command::Simulate(cli) => simulate(&cli),
    };

    if let Err(msg) = outcome {
        eprintln!("{msg}");
        std::process::exit(1);
    }
}

fn simulate(cli: &Cli) -> Result<(), String> {
    let request = build_request(cli)?;
    info!(
        trials = request.params.trial_count,
        years = request.params.horizon_years,
        seed = ?request.seed,
        "running simulation"
    );
    let report = run_request(&request)?;
    print_summary(&report);
    print_distribution(&histogram(&report.ending_balances, request.bins));
    if cli.show_trials {
        print_trials(&report);
    }

    if let Some(path) = &cli.csv {
        let file = File::create(path)
            .map_err(|e| format!("Failed to create {}: {e}", path.display()))?;
        write_csv(&report, file).map_err(|e| format!("Failed to write {}: {e}", path.display()))?;
        info!(path = %path.display(), rows = report.trial_count(), "wrote ending balances");
    }

    Ok(())
}

fn print_summary(report: &SimulationReport) {
    println!("Simulation Results");
    println!(
        "Percentage of simulations with a zero ending balance: {:.2}%",
        report.depletion_percentage()
    );
    println!("Average ending balance: {}", format_money(report.mean_balance));
    println!("Minimum ending balance: {}", format_money(report.min_balance));
    println!("Maximum ending balance: {}", format_money(report.max_balance));
}

const BAR_WIDTH: usize = 40;

fn print_distribution(bins: &[HistogramBin]) {
    println!();
    println!("Ending Balances Distribution");
    for line in distribution_lines(bins) {
        println!("{line}");
    }
}

fn print_trials(report: &SimulationReport) {
    println!();
    for line in trial_lines(report) {
        println!("{line}");
    }
}

fn distribution_lines(bins: &[HistogramBin]) -> Vec<String> {
    let peak = bins.iter().map(|b| b.count).max().unwrap_or(0).max(1) as usize;
    bins.iter()
        .map(|bin| {
            let bar = "#".repeat(bin.count as usize * BAR_WIDTH / peak);
            format!(
                "{:>20} - {:>20} | {:>7} {bar}",
                format_money(bin.lower),
                format_money(bin.upper),
                bin.count
            )
        })
        .collect()
}

fn trial_lines(report: &SimulationReport) -> Vec<String> {
    std::iter::once(format!("{:>7}  Ending Balance", "Trial"))
        .chain(
            report
                .ending_balances
                .iter()
                .enumerate()
                .map(|(idx, balance)| format!("{:>7}  {}", idx + 1, format_money(*balance))),
        )
        .collect()
}

/// Two decimals with thousands separators, e.g. `1,234,567.89`.
fn format_money(value: f64) -> String {
    let fixed = format!("{:.2}", value.abs());
    let (whole, frac) = fixed.split_once('.').unwrap_or((fixed.as_str(), "00"));

    let mut grouped = String::with_capacity(whole.len() + whole.len() / 3);
    for (i, ch) in whole.chars().enumerate() {
        if i > 0 && (whole.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }

    let sign = if value < 0.0 { "-" } else { "" };
    format!("{sign}{grouped}.{frac}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_money_groups_thousands() {
        assert_eq!(format_money(0.0), "0.00");
        assert_eq!(format_money(999.5), "999.50");
        assert_eq!(format_money(1_000.0), "1,000.00");
        assert_eq!(format_money(4_269_864.126), "4,269,864.13");
        assert_eq!(format_money(-12_345.0), "-12,345.00");
    }

    #[test]
    fn simulate_flags_reach_the_request() {
        let app = App::try_parse_from([
            "swr",
            "simulate",
            "--bins",
            "12",
            "--show-trials",
            "--simulations",
            "200",
            "--seed",
            "3",
        ])
        .expect("flags should parse");
        let Command::Simulate(cli) = app.command else {
            panic!("expected simulate subcommand");
        };
        assert!(cli.show_trials);

        let request = build_request(&cli).expect("valid inputs");
        assert_eq!(request.bins, 12);
        let report = run_request(&request).expect("runs");
        let lines = distribution_lines(&histogram(&report.ending_balances, request.bins));
        assert_eq!(lines.len(), 12);
    }

    #[test]
    fn distribution_bars_scale_to_the_fullest_bin() {
        let bins = histogram(&[0.0, 0.0, 0.0, 0.0, 10.0, 20.0], 2);
        let lines = distribution_lines(&bins);
        assert_eq!(lines.len(), 2);
        assert!(lines[0].ends_with(&"#".repeat(BAR_WIDTH)));
        assert!(lines[1].ends_with(&format!(" 2 {}", "#".repeat(BAR_WIDTH / 2))));
    }

    #[test]
    fn trial_lines_list_every_ending_balance() {
        let report = SimulationReport {
            ending_balances: vec![1_500.0, 0.0],
            depleted_trials: 1,
            depletion_fraction: 0.5,
            mean_balance: 750.0,
            min_balance: 0.0,
            max_balance: 1_500.0,
        };
        let lines = trial_lines(&report);
        assert_eq!(lines.len(), 3);
        assert!(lines[0].contains("Ending Balance"));
        assert_eq!(lines[1], "      1  1,500.00");
        assert_eq!(lines[2], "      2  0.00");
    }
}
