use clap::Subcommand;
use focusloop_core::storage::Config;

#[derive(Subcommand)]
pub enum ConfigAction {
    /// Print the current configuration as TOML
    Show,
    /// Update configuration values
    Set {
        #[arg(long)]
        focus: Option<u32>,
        #[arg(long = "break")]
        break_minutes: Option<u32>,
        #[arg(long)]
        long_break: Option<u32>,
        #[arg(long)]
        interval: Option<u32>,
        #[arg(long)]
        notifications: Option<bool>,
        #[arg(long)]
        tracking: Option<bool>,
    },
    /// Print the configuration file path
    Path,
}

pub fn run(action: ConfigAction) -> Result<(), Box<dyn std::error::Error>> {
    match action {
        ConfigAction::Show => {
            let config = Config::load()?;
            print!("{}", toml::to_string_pretty(&config)?);
        }
        ConfigAction::Set {
            focus,
            break_minutes,
            long_break,
            interval,
            notifications,
            tracking,
        } => {
            let mut config = Config::load()?;
            if let Some(v) = focus {
                config.session.focus_minutes = v;
            }
            if let Some(v) = break_minutes {
                config.session.break_minutes = v;
            }
            if let Some(v) = long_break {
                config.session.long_break_minutes = v;
            }
            if let Some(v) = interval {
                config.session.long_break_interval = v;
            }
            if let Some(v) = notifications {
                config.notifications.enabled = v;
            }
            if let Some(v) = tracking {
                config.tracking.enabled = v;
            }
            config.save()?;
            print!("{}", toml::to_string_pretty(&config)?);
        }
        ConfigAction::Path => {
            println!("{}", Config::path()?.display());
        }
    }
    Ok(())
}
