use clap::Subcommand;
use focusloop_core::session::{SessionMachine, SettingsUpdate};
use focusloop_core::Event;

use super::common;

#[derive(Subcommand)]
pub enum TimerAction {
    /// Start or resume the countdown
    Start,
    /// Pause the countdown (suppresses auto-resume)
    Pause,
    /// Reset the current phase to its full duration
    Reset,
    /// Skip to the next phase
    Skip,
    /// Update session durations (minutes)
    Set {
        #[arg(long)]
        focus: Option<u32>,
        #[arg(long = "break")]
        break_minutes: Option<u32>,
        #[arg(long)]
        long_break: Option<u32>,
        #[arg(long)]
        interval: Option<u32>,
    },
    /// Print current timer state as JSON
    Status,
    /// Run the countdown in the foreground
    Run {
        /// Stop after this many seconds (0 = until Ctrl-C)
        #[arg(long, default_value = "0")]
        seconds: u64,
    },
}

fn print_event(event: &Event) -> Result<(), Box<dyn std::error::Error>> {
    println!("{}", serde_json::to_string_pretty(event)?);
    Ok(())
}

pub fn run(action: TimerAction) -> Result<(), Box<dyn std::error::Error>> {
    match action {
        TimerAction::Start => {
            let mut machine = common::open_machine()?;
            match machine.start() {
                Some(event) => print_event(&event)?,
                None => print_event(&machine.snapshot_event())?,
            }
        }
        TimerAction::Pause => {
            let mut machine = common::open_machine()?;
            match machine.pause() {
                Some(event) => print_event(&event)?,
                None => print_event(&machine.snapshot_event())?,
            }
        }
        TimerAction::Reset => {
            let mut machine = common::open_machine()?;
            if let Some(event) = machine.reset() {
                print_event(&event)?;
            }
        }
        TimerAction::Skip => {
            let mut machine = common::open_machine()?;
            if let Some(event) = machine.skip() {
                print_event(&event)?;
            }
        }
        TimerAction::Set {
            focus,
            break_minutes,
            long_break,
            interval,
        } => {
            let mut machine = common::open_machine_quiet()?;
            let event = machine.update_settings(SettingsUpdate {
                focus_minutes: focus,
                break_minutes,
                long_break_minutes: long_break,
                long_break_interval: interval,
            });
            print_event(&event)?;
        }
        TimerAction::Status => {
            // Tick first so the printed state reflects wall-clock elapsed time.
            let mut machine = common::open_machine_quiet()?;
            if let Some(event) = machine.tick() {
                print_event(&event)?;
            }
            print_event(&machine.snapshot_event())?;
        }
        TimerAction::Run { seconds } => {
            let machine = common::open_machine()?;
            run_loop(machine, seconds)?;
        }
    }
    Ok(())
}

/// Foreground loop: 1-second ticks until the deadline or Ctrl-C. A pause is
/// persisted on Ctrl-C so the countdown stops counting while the process is
/// gone.
fn run_loop(mut machine: SessionMachine, seconds: u64) -> Result<(), Box<dyn std::error::Error>> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;
    runtime.block_on(async {
        machine.start();
        let mut interval = tokio::time::interval(std::time::Duration::from_secs(1));
        let deadline = (seconds > 0)
            .then(|| tokio::time::Instant::now() + std::time::Duration::from_secs(seconds));
        let ctrl_c = tokio::signal::ctrl_c();
        tokio::pin!(ctrl_c);

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    if let Some(event) = machine.tick() {
                        print_event(&event)?;
                    }
                    if let Some(deadline) = deadline {
                        if tokio::time::Instant::now() >= deadline {
                            break;
                        }
                    }
                }
                _ = &mut ctrl_c => {
                    machine.pause();
                    break;
                }
            }
        }
        Ok::<(), Box<dyn std::error::Error>>(())
    })
}
