use clap::{Parser, ValueEnum};
use party_battle::battle::log::ActionLogEntry;
use party_battle::{run_battle, BattleReport, BattleResult, Scenario};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::error;
use tracing_subscriber::EnvFilter;

/// Resolve a battle scenario and print its log.
#[derive(Debug, Parser)]
#[command(name = "party-battle", version, about)]
struct Args {
    /// RON file describing both parties and the reference tables
    scenario: PathBuf,

    /// Override the seed stored in the scenario
    #[arg(long)]
    seed: Option<u64>,

    #[arg(long, value_enum, default_value_t = OutputFormat::Summary)]
    format: OutputFormat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    /// The full report as JSON
    Json,
    /// One line per logged action
    Summary,
}

fn main() -> ExitCode {
    let directives = std::env::var(EnvFilter::DEFAULT_ENV).ok();
    tracing_subscriber::fmt()
        .with_env_filter(log_filter(directives.as_deref()))
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!(%err, "battle could not be run");
            ExitCode::FAILURE
        }
    }
}

/// `RUST_LOG` directives when present and valid, otherwise `info`.
fn log_filter(directives: Option<&str>) -> EnvFilter {
    directives
        .and_then(|d| EnvFilter::try_new(d).ok())
        .unwrap_or_else(|| EnvFilter::new("info"))
}

fn run(args: &Args) -> BattleResult<()> {
    let scenario = Scenario::load(&args.scenario)?;
    let state = scenario.into_state(args.seed)?;
    let report = run_battle(state);

    match args.format {
        OutputFormat::Json => match serde_json::to_string_pretty(&report) {
            Ok(text) => println!("{}", text),
            Err(err) => error!(%err, "report could not be encoded"),
        },
        OutputFormat::Summary => print_summary(&report),
    }
    Ok(())
}

fn print_summary(report: &BattleReport) {
    for entry in &report.log.entries {
        println!("{}", describe(entry));
    }
    println!();
    println!(
        "Outcome: {} (code {}) after {} turns",
        report.outcome,
        report.outcome.code(),
        report.log.total_turns
    );
    for actor in report.players.iter().chain(report.enemies.iter()) {
        println!(
            "  #{:<5} {:<16} {:>5}/{:<5} HP",
            actor.id, actor.name, actor.current_hp, actor.snapshot.max_hp
        );
    }
}

fn describe(entry: &ActionLogEntry) -> String {
    let mut line = format!(
        "[T{:02}] #{} {:?}",
        entry.turn, entry.actor_id, entry.declaration.kind
    );
    if let Some(skill) = entry.declaration.skill_id {
        line.push_str(&format!(" (skill {})", skill));
    }
    if let Some(tag) = &entry.declaration.extra {
        line.push_str(&format!(" [{}]", tag));
    }
    for effect in &entry.effects {
        line.push_str(&format!(" | {:?}", effect.kind));
        if let Some(target) = effect.target {
            line.push_str(&format!(" -> #{}", target));
        }
        if let Some(value) = effect.value {
            line.push_str(&format!(" {}", value));
        }
    }
    line
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracing::level_filters::LevelFilter;

    #[test]
    fn test_log_filter_defaults_to_info() {
        assert_eq!(log_filter(None).max_level_hint(), Some(LevelFilter::INFO));
    }

    #[test]
    fn test_log_filter_honours_rust_log() {
        assert_eq!(log_filter(Some("debug")).max_level_hint(), Some(LevelFilter::DEBUG));
    }
}
