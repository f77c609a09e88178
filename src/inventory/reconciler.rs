//! Hardware side effect of the readiness flag.

use std::sync::Arc;
use tracing::{debug, error, info};

use super::{MONITOR_UNIT, OPERATIONAL_STATUS_INTERFACE};
use crate::bus::{Directory, PropertyBus, UnitManager};
use crate::error::{AssemblyError, AssemblyResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconcileState {
    Idle,
    SettingFunctional,
    StartingUnit,
    StoppingUnit,
    Done,
    Failed,
}

/// Outcome of one readiness write, with every state it passed through.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reconciliation {
    member: String,
    trail: Vec<ReconcileState>,
    error: Option<AssemblyError>,
}

impl Reconciliation {
    fn new(member: &str) -> Self {
        Self {
            member: member.to_string(),
            trail: vec![ReconcileState::Idle],
            error: None,
        }
    }

    fn enter(&mut self, state: ReconcileState) {
        debug!("{}: {:?} -> {:?}", self.member, self.state(), state);
        self.trail.push(state);
    }

    fn fail(mut self, err: AssemblyError) -> Self {
        error!("Reconciling {} failed in {:?}: {}", self.member, self.state(), err);
        self.trail.push(ReconcileState::Failed);
        self.error = Some(err);
        self
    }

    pub fn state(&self) -> ReconcileState {
        self.trail.last().copied().unwrap_or(ReconcileState::Idle)
    }

    pub fn trail(&self) -> &[ReconcileState] {
        &self.trail
    }

    pub fn error(&self) -> Option<&AssemblyError> {
        self.error.as_ref()
    }

    pub fn into_result(self) -> AssemblyResult<()> {
        match self.error {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

pub struct HardwareReconciler {
    directory: Arc<dyn Directory>,
    properties: Arc<dyn PropertyBus>,
    units: Arc<dyn UnitManager>,
}

impl HardwareReconciler {
    pub fn new(directory: Arc<dyn Directory>, properties: Arc<dyn PropertyBus>, units: Arc<dyn UnitManager>) -> Self {
        Self {
            directory,
            properties,
            units,
        }
    }

    /// Drive the monitoring subsystem of `member` to match `ready`.
    ///
    /// `ready == true` only stops the monitoring unit. `ready == false` marks
    /// the member functional and, once that write succeeded, starts the unit.
    pub async fn run(&self, member: &str, ready: bool) -> Reconciliation {
        let mut run = Reconciliation::new(member);

        if ready {
            run.enter(ReconcileState::StoppingUnit);
            if let Err(e) = self.units.stop_unit(MONITOR_UNIT).await {
                return run.fail(e.into());
            }
        } else {
            run.enter(ReconcileState::SettingFunctional);
            if let Err(e) = self.mark_functional(member).await {
                return run.fail(e);
            }
            run.enter(ReconcileState::StartingUnit);
            if let Err(e) = self.units.start_unit(MONITOR_UNIT).await {
                return run.fail(e.into());
            }
        }

        run.enter(ReconcileState::Done);
        info!("{} ready to remove: {}", member, ready);
        run
    }

    pub async fn reconcile(&self, member: &str, ready: bool) -> AssemblyResult<()> {
        self.run(member, ready).await.into_result()
    }

    async fn mark_functional(&self, member: &str) -> AssemblyResult<()> {
        let services = self
            .directory
            .get_hosting_services(member, &[OPERATIONAL_STATUS_INTERFACE])
            .await
            .map_err(|e| {
                error!("Failed to find OperationalStatus host of {}: {}", member, e);
                AssemblyError::from(e)
            })?;
        let service = services
            .iter()
            .find(|(_, interfaces)| interfaces.iter().any(|i| i == OPERATIONAL_STATUS_INTERFACE))
            .map(|(service, _)| service.clone())
            .ok_or_else(|| AssemblyError::internal(format!("no service implements OperationalStatus on {}", member)))?;

        self.properties
            .set_property(&service, member, OPERATIONAL_STATUS_INTERFACE, "Functional", true.into())
            .await
            .map_err(AssemblyError::from)
    }
}
