//! `ferry stats` – print persisted race telemetry.

use anyhow::Result;
use ferry_core::telemetry::TelemetryHistory;

use super::HISTORY_PER_CATEGORY;

pub fn run_stats(category: Option<&str>) -> Result<()> {
    let path = TelemetryHistory::default_path()?;
    let Some(history) = TelemetryHistory::load_from_path(&path, HISTORY_PER_CATEGORY)? else {
        println!("No race telemetry recorded.");
        return Ok(());
    };

    let categories: Vec<String> = match category {
        Some(c) => vec![c.to_string()],
        None => history.categories(),
    };
    if categories.is_empty() {
        println!("No race telemetry recorded.");
        return Ok(());
    }

    for cat in categories {
        let records = history.records(&cat);
        let fallbacks = records.iter().filter(|r| r.chosen.is_none()).count();
        let won: Vec<u64> = records
            .iter()
            .filter(|r| r.chosen.is_some())
            .map(|r| r.elapsed_ms)
            .collect();
        let avg = if won.is_empty() {
            "-".to_string()
        } else {
            format!("{} ms", won.iter().sum::<u64>() / won.len() as u64)
        };
        println!(
            "{}: {} race(s), {} fallback, avg win {}",
            cat,
            records.len(),
            fallbacks,
            avg
        );
        println!("  {:<20} {:>8} {:>6} {:>6}", "METHOD", "ATTEMPTS", "WINS", "FATAL");
        for s in history.method_stats(&cat) {
            println!(
                "  {:<20} {:>8} {:>6} {:>6}",
                s.method, s.attempts, s.wins, s.fatal
            );
        }
    }
    Ok(())
}
