use clap::Subcommand;
use focusloop_core::storage::Database;

#[derive(Subcommand)]
pub enum StatsAction {
    /// Today's session statistics
    Today,
    /// All-time session statistics
    All,
    /// Most recent completed sessions
    Recent {
        #[arg(long, default_value = "10")]
        limit: usize,
    },
}

pub fn run(action: StatsAction) -> Result<(), Box<dyn std::error::Error>> {
    let db = Database::open()?;
    match action {
        StatsAction::Today => {
            let stats = db.stats_today()?;
            println!("{}", serde_json::to_string_pretty(&stats)?);
        }
        StatsAction::All => {
            let stats = db.stats_all()?;
            println!("{}", serde_json::to_string_pretty(&stats)?);
        }
        StatsAction::Recent { limit } => {
            let rows = db.recent_sessions(limit)?;
            println!("{}", serde_json::to_string_pretty(&rows)?);
        }
    }
    Ok(())
}
