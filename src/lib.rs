//! # rovercore - Ground-Control Core for an Uncrewed Ground Vehicle
//!
//! rovercore keeps a live command/telemetry link to an onboard autopilot,
//! tracks mission progress, and issues navigation commands with the delivery
//! guarantees the wire protocol lacks: MAVLink `COMMAND_ACK` carries no request
//! id and nothing is retransmitted for you.
//!
//! ## Features
//!
//! - **Bounded Message Hub**: independently sized channels give backpressure and
//!   keep command traffic apart from telemetry.
//! - **Ack Correlation**: an outstanding-command ledger matches each ack to the
//!   oldest pending command of the same kind.
//! - **Reliable Sync Commands**: up to five transmissions per command, success
//!   only on an explicit `Accepted`.
//! - **Mission State Machine**: Idle / Loaded / Loitering / Complete, driven by
//!   `MISSION_CURRENT`, `MISSION_ITEM_REACHED` and `STATUSTEXT`.
//! - **Measurement Gate**: holds at unlimited loiter items until the sensing
//!   subsystem signals, then drives on.
//! - **Simulated Autopilot**: in-memory transport with scripted ack policies.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use rovercore::config::Config;
//! use rovercore::rover::Rover;
//! use rovercore::transport::sim::SimulatedAutopilot;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::load("rovercore.toml").await?;
//!     let rover = Rover::new(&config)?;
//!     rover.set_transport(Arc::new(SimulatedAutopilot::new("sim")), false).await?;
//!     rover.initiate(false).await?;
//!     rover.load_mission(false).await?;
//!     rover.conduct_mission().await?;
//!     println!("{:?}", rover.report_mission_status().await);
//!     rover.shutdown().await;
//!     Ok(())
//! }
//! ```
//!
//! ## Module Organization
//!
//! - [`rover`] - facade owning the transport and the worker lifecycle
//! - [`dispatch`] - the worker set (sync/async dispatchers, measurement gate, inbound workers)
//! - [`mission`] - blueprint, execution state and the mission manager
//! - [`link`] - message distributor and outstanding-command ledger
//! - [`hub`] - bounded channels shared by all of the above
//! - [`transport`] - the autopilot link trait and the simulated autopilot
//! - [`protocol`] - decoded wire records
//! - [`config`] - TOML configuration
//!
//! ## Architecture
//!
//! ```text
//!  transport ──► link reader ──► MessageDistributor ──┬─► mission_message ─► mission progress ─► MissionManager
//!      ▲                                              ├─► sync_cmd_ack ──┐              │
//!      │                                              ├─► async_cmd_ack  │              ▼
//!      │                                              └─► logging        │     measurement_request
//!      │                                                                 ▼              │
//!      ├──────────────────────────── sync dispatcher ◄── sync_cmd ◄── MissionManager / Rover
//!      │                                   └──────────► sync_cmd_result ──►┘            │
//!      └──────────────────────────── async dispatcher ◄── async_cmd ◄── measurement gate
//! ```

pub mod config;
pub mod dispatch;
pub mod errors;
pub mod hub;
pub mod link;
pub mod logutil;
pub mod metrics;
pub mod mission;
pub mod protocol;
pub mod rover;
pub mod transport;
