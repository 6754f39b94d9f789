//! Simulation run state machine
//!
//! [`Simulation`] is the plain state container: identity, parameters,
//! settings, the resolved specs, the result and the run state. All transitions
//! live on it so they can be exercised without any I/O.
//!
//! [`SimulationController`] shares one `Simulation` behind a mutex and drives a
//! run: spec lookup, then analysis, with the display-only progress counter
//! ticking while each remote call is outstanding.

use crate::client::{ClientError, InferenceClient};
use crate::model::{
    AiModel, AnalysisResult, CrashParameters, RunState, Settings, VehicleIdentity, VehicleSpecs,
};
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use thiserror::Error;
use tokio::time::{Instant, interval_at};
use tracing::{debug, error, info};

/// The only message a user ever sees for a failed run
pub const RUN_FAILURE_MESSAGE: &str =
    "Failed to process simulation. Please verify car details or try again later.";

/// Errors from editing simulation inputs
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SimulationError {
    #[error("Inputs are locked while a simulation run is in progress")]
    RunInFlight,

    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

/// Display-only completion percentage.
///
/// Advances on a fixed schedule per state and never reflects real progress.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord)]
pub struct Progress(u8);

impl Progress {
    const FETCHING_STEP: u8 = 2;
    const FETCHING_CAP: u8 = 40;
    const ANALYZING_STEP: u8 = 1;
    const ANALYZING_CAP: u8 = 95;

    pub fn value(self) -> u8 {
        self.0
    }

    /// Value on entering `state`; Analyzing continues from the current value
    pub fn on_enter(self, state: RunState) -> Progress {
        match state {
            RunState::Idle | RunState::Error | RunState::FetchingSpecs => Progress(0),
            RunState::Analyzing => self,
            RunState::Completed => Progress(100),
        }
    }

    /// One scheduled tick in `state`
    pub fn advance(self, state: RunState) -> Progress {
        let (step, cap) = match state {
            RunState::FetchingSpecs => (Self::FETCHING_STEP, Self::FETCHING_CAP),
            RunState::Analyzing => (Self::ANALYZING_STEP, Self::ANALYZING_CAP),
            _ => return self,
        };
        if self.0 >= cap {
            self
        } else {
            Progress(self.0.saturating_add(step).min(cap))
        }
    }

    /// Tick period for `state`, if it has a schedule
    pub fn period(state: RunState) -> Option<Duration> {
        match state {
            RunState::FetchingSpecs => Some(Duration::from_millis(100)),
            RunState::Analyzing => Some(Duration::from_millis(200)),
            _ => None,
        }
    }
}

/// Everything one run needs, captured when the run starts
#[derive(Debug, Clone)]
pub struct RunRequest {
    pub identity: VehicleIdentity,
    /// Parameters with every unset modifier filled from the settings
    pub params: CrashParameters,
    pub ai_model: AiModel,
}

/// State container for one simulation session
#[derive(Debug, Clone, Default)]
pub struct Simulation {
    identity: VehicleIdentity,
    params: CrashParameters,
    settings: Settings,
    specs: Option<VehicleSpecs>,
    result: Option<AnalysisResult>,
    state: RunState,
    error: Option<String>,
    last_failure: Option<String>,
    progress: Progress,
}

impl Simulation {
    pub fn new(identity: VehicleIdentity, params: CrashParameters, settings: Settings) -> Self {
        Self {
            identity,
            params,
            settings,
            ..Self::default()
        }
    }

    pub fn identity(&self) -> &VehicleIdentity {
        &self.identity
    }

    pub fn params(&self) -> &CrashParameters {
        &self.params
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn specs(&self) -> Option<&VehicleSpecs> {
        self.specs.as_ref()
    }

    pub fn result(&self) -> Option<&AnalysisResult> {
        self.result.as_ref()
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    /// User-facing error message, set only in the Error state
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// Underlying cause of the last failed run, for diagnostics
    pub fn last_failure(&self) -> Option<&str> {
        self.last_failure.as_deref()
    }

    pub fn progress(&self) -> u8 {
        self.progress.value()
    }

    /// Parameters as they will be sent: settings fill unset modifiers
    pub fn effective_params(&self) -> CrashParameters {
        self.settings.merge_into(&self.params)
    }

    pub fn set_brand(&mut self, brand: impl Into<String>) -> Result<(), SimulationError> {
        self.edit_identity(|identity| identity.brand = brand.into())
    }

    pub fn set_series(&mut self, series: impl Into<String>) -> Result<(), SimulationError> {
        self.edit_identity(|identity| identity.series = series.into())
    }

    pub fn set_model(&mut self, model: impl Into<String>) -> Result<(), SimulationError> {
        self.edit_identity(|identity| identity.model = model.into())
    }

    pub fn set_year(&mut self, year: u16) -> Result<(), SimulationError> {
        self.edit_identity(|identity| identity.year = year)
    }

    pub fn set_identity(&mut self, identity: VehicleIdentity) -> Result<(), SimulationError> {
        self.edit_identity(|current| *current = identity)
    }

    pub fn update_params(&mut self, params: CrashParameters) -> Result<(), SimulationError> {
        self.ensure_editable()?;
        params.validate().map_err(SimulationError::InvalidInput)?;
        self.params = params;
        self.reset_after_edit();
        Ok(())
    }

    pub fn update_settings(&mut self, settings: Settings) -> Result<(), SimulationError> {
        self.ensure_editable()?;
        settings.validate().map_err(SimulationError::InvalidInput)?;
        self.settings = settings;
        self.reset_after_edit();
        Ok(())
    }

    fn edit_identity(
        &mut self,
        apply: impl FnOnce(&mut VehicleIdentity),
    ) -> Result<(), SimulationError> {
        self.ensure_editable()?;
        apply(&mut self.identity);
        self.specs = None;
        self.reset_after_edit();
        Ok(())
    }

    fn ensure_editable(&self) -> Result<(), SimulationError> {
        if self.state.is_in_flight() {
            return Err(SimulationError::RunInFlight);
        }
        Ok(())
    }

    /// Completed and Error fall back to Idle on any edit
    fn reset_after_edit(&mut self) {
        if matches!(self.state, RunState::Completed | RunState::Error) {
            debug!(from = %self.state, "Input edited, returning to idle");
            self.result = None;
            self.error = None;
            self.transition(RunState::Idle);
        }
    }

    fn transition(&mut self, next: RunState) {
        self.state = next;
        self.progress = self.progress.on_enter(next);
    }

    /// Start a run. Returns `None` while another run is outstanding.
    pub fn begin_run(&mut self) -> Option<RunRequest> {
        if self.state.is_in_flight() {
            debug!(state = %self.state, "Run requested while in flight, ignoring");
            return None;
        }

        self.result = None;
        self.error = None;
        self.last_failure = None;
        self.specs = None;
        self.transition(RunState::FetchingSpecs);

        Some(RunRequest {
            identity: self.identity.clone(),
            params: self.effective_params(),
            ai_model: self.settings.ai_model,
        })
    }

    pub fn specs_resolved(&mut self, specs: VehicleSpecs) {
        if self.state != RunState::FetchingSpecs {
            return;
        }
        self.specs = Some(specs);
        self.transition(RunState::Analyzing);
    }

    pub fn analysis_completed(&mut self, result: AnalysisResult) {
        if self.state != RunState::Analyzing {
            return;
        }
        self.result = Some(result);
        self.transition(RunState::Completed);
    }

    /// Fold any run failure into the single user-facing message
    pub fn run_failed(&mut self, cause: &ClientError) {
        if !self.state.is_in_flight() {
            return;
        }
        self.result = None;
        self.error = Some(RUN_FAILURE_MESSAGE.to_string());
        self.last_failure = Some(cause.to_string());
        self.transition(RunState::Error);
    }

    /// A run stopped before reaching Completed or Error; inputs unlock
    pub fn run_abandoned(&mut self) {
        if !self.state.is_in_flight() {
            return;
        }
        debug!(from = %self.state, "Run abandoned, returning to idle");
        self.result = None;
        self.transition(RunState::Idle);
    }

    pub fn tick_progress(&mut self) {
        self.progress = self.progress.advance(self.state);
    }
}

/// Returns an unfinished run to Idle when the future driving it is dropped
struct InFlight<'a> {
    controller: &'a SimulationController,
    settled: bool,
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        if !self.settled {
            info!("Simulation run cancelled");
            self.controller.lock().run_abandoned();
        }
    }
}

/// Shared handle that runs simulations against an inference client
#[derive(Clone)]
pub struct SimulationController {
    state: Arc<Mutex<Simulation>>,
    client: InferenceClient,
}

impl SimulationController {
    pub fn new(client: InferenceClient, simulation: Simulation) -> Self {
        Self {
            state: Arc::new(Mutex::new(simulation)),
            client,
        }
    }

    fn lock(&self) -> MutexGuard<'_, Simulation> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn client(&self) -> &InferenceClient {
        &self.client
    }

    /// Copy of the current state for rendering
    pub fn snapshot(&self) -> Simulation {
        self.lock().clone()
    }

    pub fn state(&self) -> RunState {
        self.lock().state()
    }

    pub fn progress(&self) -> u8 {
        self.lock().progress()
    }

    pub fn set_brand(&self, brand: impl Into<String>) -> Result<(), SimulationError> {
        self.lock().set_brand(brand)
    }

    pub fn set_series(&self, series: impl Into<String>) -> Result<(), SimulationError> {
        self.lock().set_series(series)
    }

    pub fn set_model(&self, model: impl Into<String>) -> Result<(), SimulationError> {
        self.lock().set_model(model)
    }

    pub fn set_year(&self, year: u16) -> Result<(), SimulationError> {
        self.lock().set_year(year)
    }

    pub fn set_identity(&self, identity: VehicleIdentity) -> Result<(), SimulationError> {
        self.lock().set_identity(identity)
    }

    pub fn update_params(&self, params: CrashParameters) -> Result<(), SimulationError> {
        self.lock().update_params(params)
    }

    pub fn update_settings(&self, settings: Settings) -> Result<(), SimulationError> {
        self.lock().update_settings(settings)
    }

    /// Run spec lookup then analysis. A call while another run is
    /// outstanding returns the current state without dispatching anything.
    /// Dropping the returned future mid-run returns the session to Idle.
    pub async fn run(&self) -> RunState {
        let started = self.lock().begin_run();
        let Some(request) = started else {
            return self.state();
        };
        let mut in_flight = InFlight {
            controller: self,
            settled: false,
        };
        let outcome = self.drive(request).await;
        in_flight.settled = true;
        outcome
    }

    async fn drive(&self, request: RunRequest) -> RunState {
        let identity = &request.identity;
        info!(vehicle = %identity, ai_model = %request.ai_model, "Simulation run started");

        let lookup = self
            .client
            .fetch_vehicle_specs(&identity.brand, &identity.model, identity.year);
        let specs = match self.with_progress(RunState::FetchingSpecs, lookup).await {
            Ok(specs) => specs,
            Err(e) => return self.fail(RunState::FetchingSpecs, e),
        };
        info!(
            vehicle = %identity,
            weight_kg = specs.weight_kg,
            rating = %specs.safety_rating,
            "Vehicle specs resolved"
        );
        self.lock().specs_resolved(specs.clone());

        let analysis = self
            .client
            .run_crash_analysis(&specs, &request.params, request.ai_model);
        let result = match self.with_progress(RunState::Analyzing, analysis).await {
            Ok(result) => result,
            Err(e) => return self.fail(RunState::Analyzing, e),
        };
        info!(
            vehicle = %identity,
            survival = result.survival_probability,
            sources = result.sources.len(),
            "Simulation run completed"
        );
        self.lock().analysis_completed(result);
        RunState::Completed
    }

    fn fail(&self, stage: RunState, cause: ClientError) -> RunState {
        error!(stage = %stage, error = %cause, "Simulation run failed");
        self.lock().run_failed(&cause);
        RunState::Error
    }

    /// Await `call`, ticking the progress counter on the schedule for `stage`
    async fn with_progress<F: Future>(&self, stage: RunState, call: F) -> F::Output {
        let Some(period) = Progress::period(stage) else {
            return call.await;
        };
        let mut ticker = interval_at(Instant::now() + period, period);
        tokio::pin!(call);

        loop {
            tokio::select! {
                biased;
                output = &mut call => return output,
                _ = ticker.tick() => {
                    self.lock().tick_progress();
                }
            }
        }
    }
}
