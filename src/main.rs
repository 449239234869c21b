//! Binary entrypoint for the rovercore CLI.
//!
//! Commands:
//! - `init` - write a starter `rovercore.toml`
//! - `check-config` - load and validate the configuration, print the effective hub capacities
//! - `simulate [--waypoints <n>] [--loiter] [--accept-on <k>]` - fly a scripted
//!   mission against the in-memory autopilot and print the final status as JSON
//!
//! See the library crate docs for module-level details: `rovercore::`.
use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use log::info;

use rovercore::config::Config;
use rovercore::hub::Hub;

#[derive(Parser)]
#[command(name = "rovercore")]
#[command(about = "Ground-control core for an uncrewed ground vehicle")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file path (can be used before or after subcommand)
    #[arg(short, long, default_value = "rovercore.toml", global = true)]
    config: String,

    /// Verbose logging (-v, -vv for more; may appear before or after subcommand)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a default configuration file
    Init,
    /// Load and validate the configuration file
    CheckConfig,
    /// Run a scripted mission against the simulated autopilot
    #[cfg(feature = "simulator")]
    Simulate {
        /// Number of waypoints after the home item
        #[arg(short, long, default_value_t = 4)]
        waypoints: u16,
        /// Insert an unlimited loiter (measurement stop) after the first waypoint
        #[arg(long)]
        loiter: bool,
        /// Simulated autopilot only accepts jumps on this transmission
        #[arg(long, default_value_t = 1)]
        accept_on: u32,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let pre_config = match cli.command {
        Commands::Init => None,
        _ => Config::load(&cli.config).await.ok(),
    };
    init_logging(&pre_config, cli.verbose);

    match cli.command {
        Commands::Init => {
            if tokio::fs::try_exists(&cli.config).await.unwrap_or(false) {
                bail!("{} already exists; refusing to overwrite", cli.config);
            }
            Config::create_default(&cli.config).await?;
            info!("Configuration file created at {}", cli.config);
        }
        Commands::CheckConfig => {
            let config = match pre_config {
                Some(config) => config,
                None => Config::load(&cli.config).await?,
            };
            config.validate()?;
            let hub = Hub::from_named(&config.hub.capacities)?;
            println!("{} is valid", cli.config);
            for (name, _, capacity) in hub.depths() {
                println!("  {:<20} {}", name, capacity);
            }
        }
        #[cfg(feature = "simulator")]
        Commands::Simulate {
            waypoints,
            loiter,
            accept_on,
        } => {
            let config = pre_config.unwrap_or_default();
            config.validate()?;
            simulate::run(&config, waypoints, loiter, accept_on).await?;
        }
    }

    Ok(())
}

#[cfg(feature = "simulator")]
mod simulate {
    use std::sync::Arc;
    use std::time::Duration;

    use anyhow::Result;
    use log::{info, warn};

    use rovercore::config::Config;
    use rovercore::mission::MissionPhase;
    use rovercore::protocol::{CommandKind, InboundMessage, MissionItem};
    use rovercore::rover::Rover;
    use rovercore::transport::sim::{AckPolicy, SimulatedAutopilot};

    const SETTLE: Duration = Duration::from_millis(200);

    fn scripted_plan(waypoints: u16, loiter: bool) -> (Vec<MissionItem>, Option<u16>) {
        let mut items = vec![MissionItem::waypoint(0, 35.6762, 139.6503)];
        let mut loiter_seq = None;
        for n in 1..=waypoints {
            let seq = items.len() as u16;
            let offset = n as f64 * 1e-4;
            items.push(MissionItem::waypoint(seq, 35.6762 + offset, 139.6503 + offset));
            if loiter && n == 1 {
                loiter_seq = Some(seq + 1);
                items.push(MissionItem::loiter_unlimited(seq + 1));
            }
        }
        (items, loiter_seq)
    }

    pub async fn run(config: &Config, waypoints: u16, loiter: bool, accept_on: u32) -> Result<()> {
        let (plan, loiter_seq) = scripted_plan(waypoints, loiter);
        let sim = Arc::new(
            SimulatedAutopilot::new("sim")
                .with_mission(plan)
                .with_progress_echo(),
        );
        if accept_on > 1 {
            sim.set_policy(
                CommandKind::DoSetMissionCurrent,
                AckPolicy::AcceptOnAttempt(accept_on),
            );
        }

        let rover = Rover::new(config)?;
        rover.set_transport(sim.clone(), false).await?;
        rover.initiate(false).await?;
        rover.load_mission(false).await?;
        rover.conduct_mission().await?;

        if let Some(seq) = loiter_seq {
            sim.inject(InboundMessage::status_text(6, format!("Mission: {} LoitUnlim", seq)));
            tokio::time::sleep(SETTLE).await;
            info!("simulated measurement complete");
            rover.measurement_signal().raise();
            tokio::time::sleep(SETTLE).await;
        }

        loop {
            match rover.move_to_next_waypoint().await {
                Ok(seq) => {
                    sim.inject(InboundMessage::MissionItemReached { seq });
                }
                Err(e) if e.is_at_end() => break,
                Err(e) => {
                    warn!("stopping early: {}", e);
                    break;
                }
            }
        }

        let status = rover.report_mission_status().await;
        if let Some(last) = status.final_waypoint {
            sim.inject(InboundMessage::MissionItemReached { seq: last });
        }
        for _ in 0..20 {
            if rover.report_mission_status().await.phase == MissionPhase::Complete {
                break;
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
        }

        let route: Vec<_> = rover
            .mission()
            .blueprint()
            .await
            .items()
            .iter()
            .filter(|item| item.is_waypoint())
            .map(|item| serde_json::json!([item.seq, item.latitude(), item.longitude()]))
            .collect();
        let channels: Vec<_> = rover
            .hub()
            .depths()
            .into_iter()
            .map(|(name, depth, capacity)| serde_json::json!([name.as_str(), depth, capacity]))
            .collect();
        let report = serde_json::json!({
            "status": rover.report_mission_status().await,
            "route": route,
            "channels": channels,
            "metrics": rovercore::metrics::snapshot(),
            "transmissions": sim.transmissions().len(),
            "armed": sim.is_armed(),
            "mode": sim.custom_mode(),
        });
        rover.cleanup().await;
        println!("{}", serde_json::to_string_pretty(&report)?);
        Ok(())
    }
}

fn init_logging(config: &Option<Config>, verbosity: u8) {
    use std::io::Write;
    let mut builder = env_logger::Builder::new();
    // CLI verbosity overrides the configured level
    let configured = config
        .as_ref()
        .and_then(|cfg| cfg.logging.level.parse::<log::LevelFilter>().ok())
        .unwrap_or(log::LevelFilter::Info);
    let base_level = match verbosity {
        0 => configured,
        1 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    };
    builder.filter_level(base_level);

    let log_file = config
        .as_ref()
        .and_then(|cfg| cfg.logging.file.as_ref())
        .and_then(|file| {
            std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(file)
                .ok()
        });

    if let Some(f) = log_file {
        let write_mutex = std::sync::Arc::new(std::sync::Mutex::new(f));
        // Echo to the console only when attached to a terminal
        let is_tty = atty::is(atty::Stream::Stdout);
        builder.format(move |fmt, record| {
            let ts = chrono::Utc::now().format("%Y-%m-%dT%H:%M:%SZ");
            let line = format!("{} [{}] {}", ts, record.level(), record.args());
            if let Ok(mut guard) = write_mutex.lock() {
                let _ = writeln!(guard, "{}", line);
            }
            if is_tty {
                writeln!(fmt, "{}", line)
            } else {
                Ok(())
            }
        });
    } else {
        builder.format(|fmt, record| {
            writeln!(
                fmt,
                "{} [{}] {}",
                chrono::Utc::now().format("%Y-%m-%dT%H:%M:%SZ"),
                record.level(),
                record.args()
            )
        });
    }
    let _ = builder.try_init();
}
