use chrono::NaiveDate;
use clap::Parser;
use colored::*;
use eyre::{Context, Result};
use log::info;
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use teamplan::domain::WarningKind;
use teamplan::planner::{AlertKind, Confidence, PlanningEngine, PlanningResult};
use teamplan::snapshot::SnapshotDocument;

mod cli;
mod config;

use cli::Cli;
use cli::commands::Commands;
use config::{Config, OutputFormat};

fn setup_logging() -> Result<()> {
    // Create log directory
    let log_dir = dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("teamplan")
        .join("logs");

    fs::create_dir_all(&log_dir).context("Failed to create log directory")?;

    let log_file = log_dir.join("teamplan.log");

    // Setup env_logger with file output
    let target = Box::new(
        fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&log_file)
            .context("Failed to open log file")?,
    );

    env_logger::Builder::from_default_env()
        .target(env_logger::Target::Pipe(target))
        .init();

    info!("Logging initialized, writing to: {}", log_file.display());
    Ok(())
}

fn load_snapshot(cli: &Cli, config: &Config) -> Result<SnapshotDocument> {
    let path = cli.snapshot.as_ref().unwrap_or(&config.snapshot.path);
    SnapshotDocument::load(path).context(format!("Failed to load snapshot from {}", path.display()))
}

fn build_engine(document: SnapshotDocument, config: &Config) -> PlanningEngine {
    let calendar = Arc::new(document.calendar().clone());
    PlanningEngine::new(Arc::new(document), calendar).with_config(config.planner.clone())
}

fn planning_date(date: Option<NaiveDate>) -> NaiveDate {
    date.unwrap_or_else(|| chrono::Local::now().date_naive())
}

async fn run_application(cli: &Cli, config: &Config) -> Result<()> {
    info!("Starting application");

    if cli.is_verbose() {
        println!("{}", "Verbose mode enabled".yellow());
    }

    match &cli.command {
        Commands::Plan { team, date, format } => {
            handle_plan_command(cli, config, team, planning_date(*date), format.unwrap_or(config.output.format))
        }
        Commands::PlanAll { date, format } => {
            handle_plan_all_command(cli, config, planning_date(*date), format.unwrap_or(config.output.format)).await
        }
        Commands::Teams => handle_teams_command(cli, config),
        Commands::Validate => handle_validate_command(cli, config),
    }
}

fn handle_plan_command(cli: &Cli, config: &Config, team: &str, date: NaiveDate, format: OutputFormat) -> Result<()> {
    info!("Planning team {} as of {}", team, date);
    let engine = build_engine(load_snapshot(cli, config)?, config);
    let plan = engine
        .calculate_plan(team, date)
        .context(format!("Failed to plan team {}", team))?;
    print_plan(&plan, format)
}

async fn handle_plan_all_command(cli: &Cli, config: &Config, date: NaiveDate, format: OutputFormat) -> Result<()> {
    let document = load_snapshot(cli, config)?;
    let team_ids = document.team_ids();
    info!("Planning {} teams as of {}", team_ids.len(), date);

    let engine = Arc::new(build_engine(document, config));
    let handles: Vec<_> = team_ids
        .into_iter()
        .map(|team_id| {
            let engine = Arc::clone(&engine);
            tokio::task::spawn_blocking(move || {
                let plan = engine.calculate_plan(&team_id, date);
                (team_id, plan)
            })
        })
        .collect();

    let mut plans = Vec::with_capacity(handles.len());
    for handle in handles {
        let (team_id, plan) = handle.await.context("Planning task failed")?;
        plans.push(plan.context(format!("Failed to plan team {}", team_id))?);
    }

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&plans)?),
        OutputFormat::Summary => {
            for plan in &plans {
                print_summary(plan);
                println!();
            }
        }
    }
    Ok(())
}

fn handle_teams_command(cli: &Cli, config: &Config) -> Result<()> {
    let document = load_snapshot(cli, config)?;
    for team in &document.teams {
        let epics = document.epics.iter().filter(|e| e.team_id == team.id).count();
        println!(
            "{} {} ({} epics, WIP {})",
            team.id.bold(),
            team.name,
            epics,
            team.wip
                .epics
                .map(|l| l.to_string())
                .unwrap_or_else(|| format!("{} (default)", config.planner.default_wip_limit))
        );
        for member in &team.members {
            let line = format!(
                "  {:<4} {:<16} {:<24} {:.1}h/day",
                member.role.as_str(),
                member.account_id,
                member.display_name,
                member.hours_per_day
            );
            if member.active {
                println!("{}", line);
            } else {
                println!("{} {}", line.dimmed(), "(inactive)".dimmed());
            }
        }
    }
    Ok(())
}

fn handle_validate_command(cli: &Cli, config: &Config) -> Result<()> {
    let document = load_snapshot(cli, config)?;
    let stories: usize = document.epics.iter().map(|e| e.stories.len()).sum();
    println!(
        "{} {} teams, {} epics, {} stories, {} holidays",
        "Valid:".green(),
        document.teams.len(),
        document.epics.len(),
        stories,
        document.calendar().len()
    );
    Ok(())
}

fn print_plan(plan: &PlanningResult, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => println!("{}", plan.to_json()?),
        OutputFormat::Summary => print_summary(plan),
    }
    Ok(())
}

fn print_summary(plan: &PlanningResult) {
    println!(
        "{} {} as of {}",
        "Team:".green(),
        plan.team_id.bold(),
        plan.planning_date
    );

    for epic in &plan.epics {
        let confidence = match epic.confidence {
            Confidence::High => epic.confidence.to_string().green(),
            Confidence::Medium => epic.confidence.to_string().yellow(),
            Confidence::Low => epic.confidence.to_string().red(),
        };
        let window = match (epic.start_date, epic.end_date) {
            (Some(start), Some(end)) => format!("{} -> {}", start, end),
            _ => "unscheduled".to_string(),
        };
        let mut line = format!(
            "  {:<12} {:<26} {:>3}/{:<3} {:>5.1}% {}",
            epic.epic_key, window, epic.stories_active, epic.stories_total, epic.progress_percent, confidence
        );
        if let Some(delta) = epic.due_date_delta_days.filter(|d| *d > 0) {
            line.push_str(&format!(" {}", format!("{}d late", delta).red()));
        }
        if let (Some(position), Some(until)) = (epic.queue_position, epic.queued_until) {
            line.push_str(&format!(" {}", format!("queued #{} until {}", position, until).dimmed()));
        }
        println!("{}", line);
    }

    for alert in &plan.wip.alerts {
        let label = match alert.kind {
            AlertKind::Overload => "OVERLOAD".red(),
            AlertKind::Idle => "IDLE".yellow(),
        };
        println!("  {} {}", label, alert.message);
    }

    let blocking = plan
        .warnings
        .iter()
        .filter(|w| matches!(w.kind, WarningKind::NoCapacity | WarningKind::CircularDependency))
        .count();
    if !plan.warnings.is_empty() {
        println!(
            "  {} {} ({} affect the forecast)",
            "Warnings:".yellow(),
            plan.warnings.len(),
            blocking
        );
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Setup logging first
    setup_logging().context("Failed to setup logging")?;

    // Parse CLI arguments
    let cli = Cli::parse();

    // Load configuration
    let config = Config::load(cli.config.as_ref()).context("Failed to load configuration")?;

    info!("Starting with config from: {:?}", cli.config);

    // Run the main application logic
    run_application(&cli, &config).await.context("Application failed")?;

    Ok(())
}
