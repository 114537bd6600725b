//! Quidditch league CLI.
//!
//! State lives in a snapshot file: every command loads it, applies one
//! operation through the league manager, and writes it back. `run` keeps the
//! process alive and lets the virtual clock tick on its own.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Registry};

use ql_core::clock::TimeUnit;
use ql_core::models::BetKind;
use ql_core::{LeagueManager, MemoryStore};

#[derive(Parser)]
#[command(name = "ql")]
#[command(about = "Virtual-time Quidditch league simulator and betting book", long_about = None)]
struct Cli {
    /// League snapshot file
    #[arg(long, default_value = "league.qlsnap")]
    data: PathBuf,

    /// League seed; per-match seeds derive from it
    #[arg(long, default_value_t = 2025)]
    seed: u64,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create a fresh league with default teams and a first season
    Init,

    /// Show the virtual date, active season and upcoming matches
    Status,

    /// Current season table
    Standings,

    /// Advance the virtual clock, playing matches that become due
    Advance {
        amount: i64,

        /// minutes | hours | days
        #[arg(long, default_value = "hours")]
        unit: String,
    },

    /// Jump to the next unplayed match and play it
    Next,

    /// Let the clock run on its own for a stretch of real time
    Run {
        /// Real seconds to keep ticking
        #[arg(long, default_value_t = 30)]
        seconds: u64,

        /// Virtual seconds per real second
        #[arg(long, default_value_t = 60.0)]
        speed: f64,
    },

    /// Register a user account
    Register {
        name: String,

        /// Starting balance in knuts
        #[arg(long, default_value_t = 1000)]
        balance: i64,
    },

    /// Place a bet on a scheduled match
    Bet {
        user_id: String,
        match_id: String,

        /// winner | score | snitch | time | combined
        kind: String,

        /// e.g. "home", "190-50", "winner:home,time:30-60"
        prediction: String,
        stake: i64,
    },

    /// Record a free outcome prediction
    Predict {
        user_id: String,
        match_id: String,

        /// home | draw | away
        outcome: String,

        #[arg(long, default_value_t = 50)]
        confidence: u8,
    },
}

fn init_tracing() {
    // route the core's `log` records into tracing
    let _ = tracing_log::LogTracer::init();
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let layer = fmt::layer().with_target(true).with_level(true);
    Registry::default().with(filter).with(layer).init();
}

fn parse_bet_kind(raw: &str) -> Result<BetKind> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "winner" => Ok(BetKind::Winner),
        "score" => Ok(BetKind::Score),
        "snitch" => Ok(BetKind::Snitch),
        "time" => Ok(BetKind::Time),
        "combined" => Ok(BetKind::Combined),
        other => bail!("unknown bet kind: {other} (winner|score|snitch|time|combined)"),
    }
}

fn parse_time_unit(raw: &str) -> Result<TimeUnit> {
    TimeUnit::from_wire(raw).with_context(|| format!("unknown time unit: {raw}"))
}

fn print_summaries(manager: &LeagueManager, summaries: &[ql_core::SettlementSummary]) -> Result<()> {
    for s in summaries {
        let m = manager
            .store()
            .match_by_id(&s.match_id)?
            .context("settled match missing from store")?;
        let home = manager.store().team(&m.home_team_id)?.context("home team missing")?;
        let away = manager.store().team(&m.away_team_id)?.context("away team missing")?;
        let snitch = match &s.outcome.snitch_caught_by {
            Some(id) if *id == home.id => format!(", snitch to {}", home.name),
            Some(_) => format!(", snitch to {}", away.name),
            None => String::new(),
        };
        println!(
            "{} {} - {} {} ({}min{snitch}) | bets {}W/{}L, paid {}",
            home.name,
            s.outcome.home_score,
            s.outcome.away_score,
            away.name,
            s.outcome.duration_minutes,
            s.bets_won,
            s.bets_lost,
            s.total_paid_out,
        );
        for failure in &s.failures {
            eprintln!("  unsettled {}: {}", failure.item_id, failure.reason);
        }
    }
    Ok(())
}

fn print_status(manager: &LeagueManager) -> Result<()> {
    println!("virtual date: {}", manager.clock().current_date()?);
    let Some(season) = manager.store().active_season()? else {
        println!("no active season");
        return Ok(());
    };
    let matches = manager.store().matches_for_season(&season.id)?;
    let finished = matches.iter().filter(|m| m.is_finished()).count();
    println!("season: {} ({finished}/{} played)", season.name, matches.len());
    if let Some(next) = manager.store().next_unfinished_match()? {
        let home = manager.store().team(&next.home_team_id)?.context("home team missing")?;
        let away = manager.store().team(&next.away_team_id)?.context("away team missing")?;
        println!("next: [{}] {} vs {} at {}", next.id, home.name, away.name, next.scheduled_at);
    }
    Ok(())
}

fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();

    let manager = LeagueManager::open(Arc::new(MemoryStore::new()), cli.seed)?;

    let mutated = match cli.command {
        Commands::Init => {
            if cli.data.exists() {
                bail!("{} already exists, refusing to overwrite", cli.data.display());
            }
            manager.bootstrap()?;
            println!("league created with {} teams", manager.store().teams()?.len());
            print_status(&manager)?;
            true
        }
        command => {
            manager
                .load_from(&cli.data)
                .with_context(|| format!("cannot load {} (run `ql init` first)", cli.data.display()))?;
            run_command(&manager, command)?
        }
    };

    if mutated {
        manager.save_to(&cli.data)?;
    }
    Ok(())
}

/// Returns whether the snapshot needs rewriting.
fn run_command(manager: &LeagueManager, command: Commands) -> Result<bool> {
    match command {
        Commands::Init => unreachable!("handled before loading"),
        Commands::Status => {
            print_status(manager)?;
            Ok(false)
        }
        Commands::Standings => {
            for (position, row) in manager.standings()?.iter().enumerate() {
                println!(
                    "{:>2}. {:<24} {:>3}pts  {}-{}-{}  {}:{}",
                    position + 1,
                    row.team_name,
                    row.table_points,
                    row.wins,
                    row.draws,
                    row.losses,
                    row.points_for,
                    row.points_against,
                );
            }
            Ok(false)
        }
        Commands::Advance { amount, unit } => {
            let unit = parse_time_unit(&unit)?;
            let summaries = manager.advance_time(amount, unit)?;
            println!("virtual date: {}", manager.clock().current_date()?);
            print_summaries(manager, &summaries)?;
            Ok(true)
        }
        Commands::Next => {
            let summaries = manager.advance_to_next_match()?;
            println!("virtual date: {}", manager.clock().current_date()?);
            print_summaries(manager, &summaries)?;
            Ok(true)
        }
        Commands::Run { seconds, speed } => {
            manager.clock().set_speed(speed)?;
            manager.clock().resume()?;
            println!("ticking for {seconds}s of real time at {speed}x");
            for _ in 0..seconds {
                std::thread::sleep(Duration::from_secs(1));
                let summaries = manager.tick(Duration::from_secs(1))?;
                print_summaries(manager, &summaries)?;
            }
            manager.clock().pause()?;
            print_status(manager)?;
            Ok(true)
        }
        Commands::Register { name, balance } => {
            let user = manager.register_user(&name, balance)?;
            println!("registered {} with id {} ({balance} knuts)", user.name, user.id);
            Ok(true)
        }
        Commands::Bet { user_id, match_id, kind, prediction, stake } => {
            let kind = parse_bet_kind(&kind)?;
            let bet = manager.place_bet(&user_id, &match_id, kind, &prediction, stake)?;
            println!("bet {} placed, potential payout {}", bet.id, bet.potential_payout);
            Ok(true)
        }
        Commands::Predict { user_id, match_id, outcome, confidence } => {
            let prediction = manager.place_prediction(&user_id, &match_id, &outcome, confidence)?;
            println!("prediction {} recorded", prediction.id);
            Ok(true)
        }
    }
}
