//! # Rover Facade
//!
//! Owns the transport handle and the worker lifecycle, and exposes the
//! operations the network front door calls. Shared pieces (hub, distributor,
//! mission manager, measurement signal) live for the whole life of the `Rover`;
//! only the worker set is torn down and rebuilt.
//!
//! ```rust,no_run
//! # #[cfg(feature = "simulator")]
//! # async fn demo() -> rovercore::errors::Result<()> {
//! use std::sync::Arc;
//! use rovercore::config::Config;
//! use rovercore::rover::Rover;
//! use rovercore::transport::sim::SimulatedAutopilot;
//!
//! let rover = Rover::new(&Config::default())?;
//! rover.set_transport(Arc::new(SimulatedAutopilot::new("sim")), false).await?;
//! rover.initiate(false).await?;
//! rover.load_mission(false).await?;
//! rover.conduct_mission().await?;
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;

use log::{error, info, warn};
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::config::{Config, RoverConfig, ShutdownAction};
use crate::dispatch::{DispatchTuning, MeasurementSignal, WorkerContext, WorkerSet};
use crate::errors::{Result, RoverError};
use crate::hub::{Hub, SyncOutcome};
use crate::link::MessageDistributor;
use crate::mission::{MissionManager, MissionStatus};
use crate::protocol::command::{ROVER_MODE_GUIDED, ROVER_MODE_MANUAL};
use crate::protocol::CommandRecord;
use crate::transport::SharedTransport;

#[derive(Default)]
struct RoverInner {
    transport: Option<SharedTransport>,
    workers: Option<WorkerSet>,
}

pub struct Rover {
    settings: RoverConfig,
    tuning: DispatchTuning,
    hub: Arc<Hub>,
    distributor: Arc<MessageDistributor>,
    mission: Arc<MissionManager>,
    measurement: Arc<MeasurementSignal>,
    inner: Mutex<RoverInner>,
}

impl Rover {
    pub fn new(config: &Config) -> Result<Self> {
        let hub = Arc::new(Hub::from_named(&config.hub.capacities)?);
        let tuning = DispatchTuning::from_config(&config.dispatch);
        let mission = Arc::new(MissionManager::new(
            hub.clone(),
            config.rover.target(),
            tuning.result_timeout,
        ));
        Ok(Self {
            settings: config.rover.clone(),
            tuning,
            distributor: Arc::new(MessageDistributor::new(hub.clone())),
            hub,
            mission,
            measurement: Arc::new(MeasurementSignal::new()),
            inner: Mutex::new(RoverInner::default()),
        })
    }

    pub fn hub(&self) -> &Arc<Hub> {
        &self.hub
    }

    pub fn mission(&self) -> &Arc<MissionManager> {
        &self.mission
    }

    /// Handle the external sensing subsystem raises when a measurement is done.
    pub fn measurement_signal(&self) -> Arc<MeasurementSignal> {
        self.measurement.clone()
    }

    /// Bind the link to the vehicle.
    ///
    /// Fails with [`RoverError::ExistingConnection`] if one is bound and `force`
    /// is false. A forced replacement stops the running workers, since they are
    /// tied to the old link; call [`initiate`](Self::initiate) afterwards.
    pub async fn set_transport(&self, transport: SharedTransport, force: bool) -> Result<()> {
        let mut inner = self.inner.lock().await;
        if inner.transport.is_some() && !force {
            return Err(RoverError::ExistingConnection);
        }
        if let Some(workers) = inner.workers.take() {
            warn!("transport replaced; stopping worker set {}", workers.generation());
            workers.shutdown(self.tuning.join_timeout).await;
        }
        info!("transport bound: {}", transport.name());
        self.mission.set_transport(transport.clone());
        inner.transport = Some(transport);
        Ok(())
    }

    /// Start the worker set.
    ///
    /// A running set is left alone unless `reinitiate` is true, in which case it
    /// is stopped, the hub is drained, the ack ledger is reset and a fresh set
    /// is spawned.
    pub async fn initiate(&self, reinitiate: bool) -> Result<()> {
        let mut inner = self.inner.lock().await;
        let transport = inner.transport.clone().ok_or(RoverError::NotConnected)?;

        if let Some(workers) = inner.workers.as_ref() {
            if workers.is_running() && !reinitiate {
                info!("worker set {} already running", workers.generation());
                return Ok(());
            }
        }
        if let Some(workers) = inner.workers.take() {
            if let Some(fault) = workers.fault() {
                warn!("restarting after worker fault: {}", fault);
            }
            workers.shutdown(self.tuning.join_timeout).await;
        }
        self.hub.drain_all().await;
        self.distributor.reset();
        self.measurement.clear();

        inner.workers = Some(WorkerSet::spawn(WorkerContext {
            hub: self.hub.clone(),
            distributor: self.distributor.clone(),
            mission: self.mission.clone(),
            transport,
            measurement: self.measurement.clone(),
            target: self.settings.target(),
            tuning: self.tuning.clone(),
        }));
        Ok(())
    }

    /// Front-door variant of [`initiate`](Self::initiate): logs and reports success.
    pub async fn initiate_rover(&self) -> bool {
        match self.initiate(false).await {
            Ok(()) => true,
            Err(e) => {
                error!("rover initiation failed: {}", e);
                false
            }
        }
    }

    /// Leave the vehicle in the configured safe state, then stop the workers.
    ///
    /// The `[rover] on_shutdown` action goes through the sync path while the
    /// workers are still up; a failure is logged and does not stop the shutdown.
    pub async fn cleanup(&self) {
        let action = self.settings.on_shutdown;
        let target = self.settings.target();
        let command = match action {
            ShutdownAction::Keep => None,
            ShutdownAction::Disarm => Some(CommandRecord::disarm(target, false)),
            ShutdownAction::ReturnToLaunch => Some(CommandRecord::return_to_launch(target)),
        };
        if let Some(command) = command {
            match self.sync(command).await {
                Ok(_) => info!("shutdown action {:?} accepted", action),
                Err(e) => warn!("shutdown action {:?} failed: {}", action, e),
            }
        }
        self.shutdown().await;
    }

    pub async fn shutdown(&self) {
        let workers = self.inner.lock().await.workers.take();
        if let Some(workers) = workers {
            workers.shutdown(self.tuning.join_timeout).await;
        }
    }

    pub async fn workers_running(&self) -> bool {
        self.inner
            .lock()
            .await
            .workers
            .as_ref()
            .is_some_and(WorkerSet::is_running)
    }

    pub async fn worker_generation(&self) -> Option<Uuid> {
        self.inner
            .lock()
            .await
            .workers
            .as_ref()
            .map(WorkerSet::generation)
    }

    /// Fault that stopped the current worker set, if any.
    pub async fn worker_fault(&self) -> Option<String> {
        self.inner
            .lock()
            .await
            .workers
            .as_ref()
            .and_then(WorkerSet::fault)
    }

    async fn ensure_workers(&self) -> Result<()> {
        if self.workers_running().await {
            Ok(())
        } else {
            Err(RoverError::WorkersNotRunning)
        }
    }

    async fn sync(&self, command: CommandRecord) -> Result<SyncOutcome> {
        self.ensure_workers().await?;
        self.hub.round_trip(command, self.tuning.result_timeout).await
    }

    pub async fn arm_vehicle(&self) -> Result<()> {
        let command = CommandRecord::arm(self.settings.target(), self.settings.force_arm);
        self.sync(command).await?;
        info!("vehicle armed");
        Ok(())
    }

    pub async fn disarm_vehicle(&self) -> Result<()> {
        let command = CommandRecord::disarm(self.settings.target(), false);
        self.sync(command).await?;
        info!("vehicle disarmed");
        Ok(())
    }

    pub async fn set_auto_mode(&self) -> Result<()> {
        self.set_mode(self.settings.auto_mode).await
    }

    pub async fn set_guided_mode(&self) -> Result<()> {
        self.set_mode(ROVER_MODE_GUIDED).await
    }

    pub async fn set_manual_mode(&self) -> Result<()> {
        self.set_mode(ROVER_MODE_MANUAL).await
    }

    async fn set_mode(&self, custom_mode: u32) -> Result<()> {
        let command = CommandRecord::set_mode(self.settings.target(), custom_mode);
        self.sync(command).await?;
        info!("autopilot in mode {}", custom_mode);
        Ok(())
    }

    /// Transport bound, workers running and a plan downloaded.
    pub async fn ready_for_mission(&self) -> bool {
        let linked = self.inner.lock().await.transport.is_some();
        linked && self.workers_running().await && self.mission.is_plan_downloaded().await
    }

    pub async fn load_mission(&self, force: bool) -> Result<MissionStatus> {
        self.mission.load_mission(force).await
    }

    /// Switch to AUTO and arm.
    pub async fn conduct_mission(&self) -> Result<()> {
        if !self.ready_for_mission().await {
            return Err(RoverError::NotReady);
        }
        if let Err(e) = self.set_auto_mode().await {
            warn!("mode change failed: {}", e);
            return Err(RoverError::ModeFailed);
        }
        if let Err(e) = self.arm_vehicle().await {
            warn!("arming failed: {}", e);
            return Err(RoverError::ArmFailed);
        }
        info!("mission started");
        Ok(())
    }

    pub async fn move_to_next_waypoint(&self) -> Result<u16> {
        self.ensure_workers().await?;
        self.mission.move_to_next_waypoint().await
    }

    pub async fn move_to_next_mission_item(&self) -> Result<u16> {
        self.ensure_workers().await?;
        self.mission.move_to_next_mission_item().await
    }

    pub async fn restart_mission(&self) -> Result<MissionStatus> {
        self.mission.restart_mission().await
    }

    pub async fn report_mission_status(&self) -> MissionStatus {
        self.mission.status().await
    }

    /// Queue a fire-and-forget command.
    pub async fn submit_async(&self, command: CommandRecord) -> Result<()> {
        self.ensure_workers().await?;
        self.hub.async_cmd.send(command).await;
        Ok(())
    }
}
