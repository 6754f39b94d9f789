//! Brand and model suggestions for the vehicle identity inputs
//!
//! Brand suggestions run through a [`Debouncer`]: only the last keystroke of
//! a burst triggers a search. Model suggestions are fetched right away when a
//! brand is picked from its dropdown. Fetch results are written to a shared
//! [`SuggestionState`]; whichever fetch finishes last wins.

mod debounce;
mod hit_test;

pub use debounce::Debouncer;
pub use hit_test::{Point, Rect, WidgetRegion};

use crate::AutocompleteConfig;
use crate::client::InferenceClient;
use crate::model::ModelSuggestion;
use crate::simulation::{SimulationController, SimulationError};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use tracing::debug;

/// The two autocomplete fields
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    Brand,
    Model,
}

/// What the front end needs to draw the suggestion dropdowns
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SuggestionState {
    pub brand_suggestions: Vec<String>,
    pub model_suggestions: Vec<ModelSuggestion>,
    pub show_brand_dropdown: bool,
    pub show_model_dropdown: bool,
    /// A suggestion fetch is outstanding (spinner)
    pub is_fetching: bool,
    fetches: usize,
}

impl SuggestionState {
    pub fn brand_dropdown_visible(&self) -> bool {
        self.show_brand_dropdown && !self.brand_suggestions.is_empty()
    }

    pub fn model_dropdown_visible(&self) -> bool {
        self.show_model_dropdown && !self.model_suggestions.is_empty()
    }
}

fn update<R>(state: &Mutex<SuggestionState>, apply: impl FnOnce(&mut SuggestionState) -> R) -> R {
    let mut guard = state.lock().unwrap_or_else(PoisonError::into_inner);
    apply(&mut guard)
}

/// Keeps the spinner on until the last overlapping fetch settles
struct FetchInFlight {
    state: Arc<Mutex<SuggestionState>>,
}

impl FetchInFlight {
    fn start(state: &Arc<Mutex<SuggestionState>>) -> Self {
        update(state, |s| {
            s.fetches += 1;
            s.is_fetching = true;
        });
        Self {
            state: state.clone(),
        }
    }
}

impl Drop for FetchInFlight {
    fn drop(&mut self) {
        update(&self.state, |s| {
            s.fetches = s.fetches.saturating_sub(1);
            s.is_fetching = s.fetches > 0;
        });
    }
}

pub struct AutocompleteController {
    client: InferenceClient,
    state: Arc<Mutex<SuggestionState>>,
    debouncer: Debouncer,
    brand_region: Option<WidgetRegion>,
    model_region: Option<WidgetRegion>,
    torn_down: Arc<AtomicBool>,
}

impl AutocompleteController {
    pub fn new(client: InferenceClient, config: &AutocompleteConfig) -> Self {
        Self {
            client,
            state: Arc::new(Mutex::new(SuggestionState::default())),
            debouncer: Debouncer::new(config.debounce()),
            brand_region: None,
            model_region: None,
            torn_down: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn snapshot(&self) -> SuggestionState {
        update(&self.state, |s| s.clone())
    }

    pub fn is_torn_down(&self) -> bool {
        self.torn_down.load(Ordering::SeqCst)
    }

    /// Brand text changed. Restarts the quiet period; when it elapses the
    /// text is searched unless it is too short or already a suggestion.
    pub fn on_brand_input(&mut self, text: &str) {
        if self.is_torn_down() {
            return;
        }
        update(&self.state, |s| s.show_brand_dropdown = true);

        let text = text.to_string();
        let client = self.client.clone();
        let state = self.state.clone();
        let torn_down = self.torn_down.clone();

        self.debouncer.schedule(async move {
            if text.chars().count() <= 1 {
                return;
            }
            let known = update(&state, |s| s.brand_suggestions.contains(&text));
            if known {
                debug!(brand = %text, "Brand already matches a suggestion, not searching");
                return;
            }

            let _fetch = FetchInFlight::start(&state);
            let brands = client.suggest_brands(&text).await;
            if torn_down.load(Ordering::SeqCst) {
                return;
            }
            debug!(partial = %text, count = brands.len(), "Brand suggestions received");
            update(&state, |s| {
                if !brands.is_empty() {
                    s.show_brand_dropdown = true;
                }
                s.brand_suggestions = brands;
            });
        });
    }

    pub fn on_brand_focus(&self) {
        update(&self.state, |s| s.show_brand_dropdown = true);
    }

    pub fn on_model_focus(&self) {
        update(&self.state, |s| {
            if !s.model_suggestions.is_empty() {
                s.show_model_dropdown = true;
            }
        });
    }

    /// Commit a brand picked from the dropdown and fetch its models for the
    /// current year
    pub async fn select_brand(
        &self,
        simulation: &SimulationController,
        brand: &str,
    ) -> Result<(), SimulationError> {
        simulation.set_brand(brand)?;
        update(&self.state, |s| s.show_brand_dropdown = false);
        let _fetch = FetchInFlight::start(&self.state);

        let year = simulation.snapshot().identity().year;
        let models = self.client.suggest_models(brand, year).await;
        if self.is_torn_down() {
            return Ok(());
        }
        debug!(brand, year, count = models.len(), "Model suggestions received");
        update(&self.state, |s| {
            if !models.is_empty() {
                s.show_model_dropdown = true;
            }
            s.model_suggestions = models;
        });
        Ok(())
    }

    /// Commit the model (and its series) at `index` of the model dropdown
    pub fn select_model(
        &self,
        simulation: &SimulationController,
        index: usize,
    ) -> Result<Option<ModelSuggestion>, SimulationError> {
        let Some(choice) = update(&self.state, |s| s.model_suggestions.get(index).cloned()) else {
            return Ok(None);
        };
        simulation.set_model(choice.model.clone())?;
        simulation.set_series(choice.series.clone())?;
        update(&self.state, |s| s.show_model_dropdown = false);
        Ok(Some(choice))
    }

    /// Register where a field and its dropdown are drawn
    pub fn set_region(&mut self, field: Field, region: WidgetRegion) {
        match field {
            Field::Brand => self.brand_region = Some(region),
            Field::Model => self.model_region = Some(region),
        }
    }

    /// Close every dropdown whose registered region does not contain `point`
    pub fn on_pointer_down(&self, point: Point) {
        if self.is_torn_down() {
            return;
        }
        let outside = |region: Option<WidgetRegion>| region.is_some_and(|r| !r.contains(point));
        let close_brand = outside(self.brand_region);
        let close_model = outside(self.model_region);
        update(&self.state, |s| {
            if close_brand {
                s.show_brand_dropdown = false;
            }
            if close_model {
                s.show_model_dropdown = false;
            }
        });
    }

    /// Cancel the pending search and stop reacting to pointer events and
    /// late fetch results
    pub fn teardown(&mut self) {
        self.torn_down.store(true, Ordering::SeqCst);
        self.debouncer.cancel();
        self.brand_region = None;
        self.model_region = None;
    }
}
