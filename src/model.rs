//! Domain types shared by the inference client, the simulation core and the
//! terminal front end.
//!
//! Field names on the wire-facing types (`VehicleSpecs`, `AnalysisResult`,
//! `DetailedInjury`, `ModelSuggestion`) are the camelCase names the inference
//! service is asked to produce and must not be renamed.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Failure to parse one of the labeled enums from user input
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("unknown {kind} '{value}' (expected one of: {expected})")]
pub struct ParseLabelError {
    pub kind: &'static str,
    pub value: String,
    pub expected: String,
}

/// Declares a closed set of labeled options. The label is both the serde
/// representation and the text that ends up in prompts.
macro_rules! labeled_enum {
    (
        $(#[$meta:meta])*
        $name:ident ($kind:literal) {
            $($(#[$vmeta:meta])* $variant:ident => $label:literal),+ $(,)?
        }
        default $default:ident
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub enum $name {
            $($(#[$vmeta])* #[serde(rename = $label)] $variant),+
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            pub fn label(self) -> &'static str {
                match self {
                    $($name::$variant => $label),+
                }
            }
        }

        impl Default for $name {
            fn default() -> Self {
                $name::$default
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.label())
            }
        }

        impl FromStr for $name {
            type Err = ParseLabelError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                let wanted = s.trim();
                $name::ALL
                    .iter()
                    .copied()
                    .find(|v| v.label().eq_ignore_ascii_case(wanted))
                    .ok_or_else(|| ParseLabelError {
                        kind: $kind,
                        value: s.to_string(),
                        expected: $name::ALL
                            .iter()
                            .map(|v| v.label())
                            .collect::<Vec<_>>()
                            .join(", "),
                    })
            }
        }
    };
}

labeled_enum! {
    /// What the vehicle collides with
    ImpactObject ("impact object") {
        Vehicle => "Vehicle",
        Wall => "Wall",
        TreePole => "Tree/Pole",
        Ditch => "Ditch",
    }
    default Vehicle
}

labeled_enum! {
    /// How well the airbags deployed
    AirbagStatus ("airbag status") {
        None => "None",
        Partial => "Partial",
        Optimal => "Optimal",
    }
    default Optimal
}

labeled_enum! {
    /// Clinical severity of a predicted injury
    Severity ("severity") {
        Low => "Low",
        Moderate => "Moderate",
        High => "High",
        Critical => "Critical",
    }
    default Low
}

labeled_enum! {
    Theme ("theme") {
        Dark => "dark",
        Light => "light",
    }
    default Dark
}

labeled_enum! {
    UnitSystem ("unit system") {
        Metric => "metric",
        Imperial => "imperial",
    }
    default Metric
}

labeled_enum! {
    AnalysisDepth ("analysis depth") {
        Standard => "Standard",
        Forensic => "Forensic",
    }
    default Standard
}

labeled_enum! {
    RoadCondition ("road condition") {
        Dry => "Dry",
        Wet => "Wet",
        Icy => "Icy",
        Gravel => "Gravel",
    }
    default Dry
}

labeled_enum! {
    TimeOfDay ("time of day") {
        Day => "Day",
        Night => "Night",
    }
    default Day
}

labeled_enum! {
    Verbosity ("verbosity") {
        Technical => "Technical",
        Casual => "Casual",
    }
    default Technical
}

labeled_enum! {
    OccupantAge ("occupant age") {
        Adult => "Adult",
        Child => "Child",
        Senior => "Senior",
    }
    default Adult
}

labeled_enum! {
    SeatPosture ("seat posture") {
        Upright => "Upright",
        Reclined => "Reclined",
    }
    default Upright
}

labeled_enum! {
    TireCondition ("tire condition") {
        New => "New",
        Worn => "Worn",
        Bald => "Bald",
    }
    default New
}

labeled_enum! {
    AirbagTechnology ("airbag technology") {
        Legacy => "Legacy",
        Modern => "Modern",
        Adaptive => "Adaptive",
    }
    default Modern
}

labeled_enum! {
    ImpactMaterial ("impact material") {
        Concrete => "Concrete",
        Steel => "Steel",
        Wood => "Wood",
        Earth => "Earth",
    }
    default Concrete
}

labeled_enum! {
    /// Which backend profile handles the crash analysis.
    ///
    /// Suggestions and spec lookups always run on the fast profile.
    AiModel ("ai model") {
        Detailed => "detailed",
        Fast => "fast",
    }
    default Detailed
}

/// User-entered vehicle identity
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct VehicleIdentity {
    pub brand: String,
    pub series: String,
    pub model: String,
    pub year: u16,
}

impl Default for VehicleIdentity {
    fn default() -> Self {
        Self {
            brand: "Tesla".to_string(),
            series: String::new(),
            model: "Model 3".to_string(),
            year: 2023,
        }
    }
}

impl fmt::Display for VehicleIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", self.year, self.brand, self.model)
    }
}

/// Physical and safety specifications resolved by the spec lookup
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VehicleSpecs {
    pub brand: String,
    #[serde(default)]
    pub series: String,
    pub model: String,
    pub year: u16,
    pub weight_kg: f64,
    /// e.g. "5 Stars NCAP"
    pub safety_rating: String,
    pub safety_features: Vec<String>,
}

/// One entry of the model dropdown
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelSuggestion {
    pub series: String,
    pub model: String,
}

/// Optional scenario modifiers.
///
/// Unset fields are omitted when serialized and rendered with their default
/// when a prompt is built, so new modifiers can be added without touching
/// older callers.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ScenarioModifiers {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub occupant_count: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub road_condition: Option<RoadCondition>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time_of_day: Option<TimeOfDay>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub occupant_age: Option<OccupantAge>,
    /// Pre-impact braking efficiency, 0-100
    #[serde(skip_serializing_if = "Option::is_none")]
    pub braking_efficiency: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seat_posture: Option<SeatPosture>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tire_condition: Option<TireCondition>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub airbag_technology: Option<AirbagTechnology>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cargo_mass_kg: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub impact_material: Option<ImpactMaterial>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub analysis_depth: Option<AnalysisDepth>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub verbosity: Option<Verbosity>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub show_equations: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unit_system: Option<UnitSystem>,
}

pub const DEFAULT_OCCUPANT_COUNT: u32 = 1;
pub const DEFAULT_BRAKING_EFFICIENCY: u8 = 0;
pub const DEFAULT_CARGO_MASS_KG: f64 = 0.0;

impl ScenarioModifiers {
    pub fn occupant_count(&self) -> u32 {
        self.occupant_count.unwrap_or(DEFAULT_OCCUPANT_COUNT)
    }

    pub fn road_condition(&self) -> RoadCondition {
        self.road_condition.unwrap_or_default()
    }

    pub fn time_of_day(&self) -> TimeOfDay {
        self.time_of_day.unwrap_or_default()
    }

    pub fn occupant_age(&self) -> OccupantAge {
        self.occupant_age.unwrap_or_default()
    }

    pub fn braking_efficiency(&self) -> u8 {
        self.braking_efficiency.unwrap_or(DEFAULT_BRAKING_EFFICIENCY)
    }

    pub fn seat_posture(&self) -> SeatPosture {
        self.seat_posture.unwrap_or_default()
    }

    pub fn tire_condition(&self) -> TireCondition {
        self.tire_condition.unwrap_or_default()
    }

    pub fn airbag_technology(&self) -> AirbagTechnology {
        self.airbag_technology.unwrap_or_default()
    }

    pub fn cargo_mass_kg(&self) -> f64 {
        self.cargo_mass_kg.unwrap_or(DEFAULT_CARGO_MASS_KG)
    }

    pub fn impact_material(&self) -> ImpactMaterial {
        self.impact_material.unwrap_or_default()
    }

    pub fn analysis_depth(&self) -> AnalysisDepth {
        self.analysis_depth.unwrap_or_default()
    }

    pub fn verbosity(&self) -> Verbosity {
        self.verbosity.unwrap_or_default()
    }

    pub fn show_equations(&self) -> bool {
        self.show_equations.unwrap_or(false)
    }

    pub fn unit_system(&self) -> UnitSystem {
        self.unit_system.unwrap_or_default()
    }
}

/// Crash scenario: the required core plus optional modifiers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CrashParameters {
    pub speed_kph: f64,
    /// Degrees, 0 (glancing) to 90 (head-on)
    pub impact_angle: f64,
    pub object_of_impact: ImpactObject,
    pub seatbelt_used: bool,
    pub airbag_status: AirbagStatus,
    #[serde(flatten)]
    pub modifiers: ScenarioModifiers,
}

impl Default for CrashParameters {
    fn default() -> Self {
        Self {
            speed_kph: 60.0,
            impact_angle: 90.0,
            object_of_impact: ImpactObject::Vehicle,
            seatbelt_used: true,
            airbag_status: AirbagStatus::Optimal,
            modifiers: ScenarioModifiers::default(),
        }
    }
}

impl CrashParameters {
    /// Range checks on the required fields and any set modifiers
    pub fn validate(&self) -> Result<(), String> {
        if !self.speed_kph.is_finite() || self.speed_kph < 0.0 {
            return Err(format!("speed must be a non-negative number, got {}", self.speed_kph));
        }
        if !(0.0..=90.0).contains(&self.impact_angle) {
            return Err(format!("impact angle must be within 0-90 degrees, got {}", self.impact_angle));
        }
        if self.modifiers.occupant_count == Some(0) {
            return Err("occupant count must be at least 1".to_string());
        }
        if let Some(braking) = self.modifiers.braking_efficiency
            && braking > 100
        {
            return Err(format!("braking efficiency must be within 0-100, got {braking}"));
        }
        if let Some(cargo) = self.modifiers.cargo_mass_kg
            && (!cargo.is_finite() || cargo < 0.0)
        {
            return Err(format!("cargo mass must be a non-negative number, got {cargo}"));
        }
        Ok(())
    }
}

/// User-facing configuration surface
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", default)]
pub struct Settings {
    pub theme: Theme,
    pub unit_system: UnitSystem,
    pub analysis_depth: AnalysisDepth,
    pub occupant_count: u32,
    pub road_condition: RoadCondition,
    pub time_of_day: TimeOfDay,
    pub verbosity: Verbosity,
    pub show_equations: bool,
    pub occupant_age: OccupantAge,
    pub braking_efficiency: u8,
    pub seat_posture: SeatPosture,
    pub tire_condition: TireCondition,
    pub airbag_technology: AirbagTechnology,
    pub cargo_mass_kg: f64,
    pub impact_material: ImpactMaterial,
    pub ai_model: AiModel,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            theme: Theme::default(),
            unit_system: UnitSystem::default(),
            analysis_depth: AnalysisDepth::default(),
            occupant_count: DEFAULT_OCCUPANT_COUNT,
            road_condition: RoadCondition::default(),
            time_of_day: TimeOfDay::default(),
            verbosity: Verbosity::default(),
            show_equations: false,
            occupant_age: OccupantAge::default(),
            braking_efficiency: DEFAULT_BRAKING_EFFICIENCY,
            seat_posture: SeatPosture::default(),
            tire_condition: TireCondition::default(),
            airbag_technology: AirbagTechnology::default(),
            cargo_mass_kg: DEFAULT_CARGO_MASS_KG,
            impact_material: ImpactMaterial::default(),
            ai_model: AiModel::default(),
        }
    }
}

impl Settings {
    pub fn validate(&self) -> Result<(), String> {
        if self.occupant_count == 0 {
            return Err("occupant count must be at least 1".to_string());
        }
        if self.braking_efficiency > 100 {
            return Err(format!(
                "braking efficiency must be within 0-100, got {}",
                self.braking_efficiency
            ));
        }
        if !self.cargo_mass_kg.is_finite() || self.cargo_mass_kg < 0.0 {
            return Err(format!(
                "cargo mass must be a non-negative number, got {}",
                self.cargo_mass_kg
            ));
        }
        Ok(())
    }

    /// Fill every modifier the parameters leave unset from these settings.
    /// Values already present on `params` win.
    pub fn merge_into(&self, params: &CrashParameters) -> CrashParameters {
        let mut merged = params.clone();
        let m = &mut merged.modifiers;
        m.occupant_count.get_or_insert(self.occupant_count);
        m.road_condition.get_or_insert(self.road_condition);
        m.time_of_day.get_or_insert(self.time_of_day);
        m.occupant_age.get_or_insert(self.occupant_age);
        m.braking_efficiency.get_or_insert(self.braking_efficiency);
        m.seat_posture.get_or_insert(self.seat_posture);
        m.tire_condition.get_or_insert(self.tire_condition);
        m.airbag_technology.get_or_insert(self.airbag_technology);
        m.cargo_mass_kg.get_or_insert(self.cargo_mass_kg);
        m.impact_material.get_or_insert(self.impact_material);
        m.analysis_depth.get_or_insert(self.analysis_depth);
        m.verbosity.get_or_insert(self.verbosity);
        m.show_equations.get_or_insert(self.show_equations);
        m.unit_system.get_or_insert(self.unit_system);
        merged
    }
}

/// A single predicted injury
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetailedInjury {
    pub label: String,
    /// Likelihood, 0-100
    pub chance: f64,
    pub severity: Severity,
    pub description: String,
}

/// Free-text risk summary per body region
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InjuryRiskBreakdown {
    pub head: String,
    pub chest: String,
    pub legs: String,
}

/// Web source the analysis was grounded on
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Source {
    pub title: String,
    pub uri: String,
}

/// Injury categories every analysis must cover, each with the keywords that
/// identify it in a returned label.
pub const REQUIRED_INJURY_CATEGORIES: [(&str, &[&str]); 4] = [
    ("Concussion", &["concussion", "mtbi"]),
    ("Traumatic Brain Injury", &["traumatic brain", "brain damage", "brain injur", "tbi"]),
    ("Bone Fractures", &["fracture", "broken bone"]),
    ("Internal Organ Damage", &["organ", "visceral"]),
];

/// `keyword` occurs in `label` starting at a word boundary
fn matches_at_word_start(label: &str, keyword: &str) -> bool {
    label.match_indices(keyword).any(|(at, _)| {
        label[..at]
            .chars()
            .next_back()
            .is_none_or(|c| !c.is_alphanumeric())
    })
}

/// Crash survivability analysis as produced by the inference service
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisResult {
    /// Percent, 0-100
    pub survival_probability: f64,
    pub estimated_g_force: f64,
    #[serde(rename = "kineticEnergyKJ")]
    pub kinetic_energy_kj: f64,
    pub injury_risk_breakdown: InjuryRiskBreakdown,
    pub specific_injuries: Vec<DetailedInjury>,
    pub reasoning: String,
    /// Filled from response grounding metadata, never from the body
    #[serde(default)]
    pub sources: Vec<Source>,
}

impl AnalysisResult {
    /// Names of required injury categories with no matching entry
    pub fn missing_injury_categories(&self) -> Vec<&'static str> {
        REQUIRED_INJURY_CATEGORIES
            .iter()
            .filter(|(_, keywords)| {
                !self.specific_injuries.iter().any(|injury| {
                    let label = injury.label.to_lowercase();
                    keywords.iter().any(|k| matches_at_word_start(&label, k))
                })
            })
            .map(|(name, _)| *name)
            .collect()
    }

    pub fn covers_required_injuries(&self) -> bool {
        self.missing_injury_categories().is_empty()
    }
}

/// Lifecycle of a simulation run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize)]
pub enum RunState {
    #[default]
    Idle,
    FetchingSpecs,
    Analyzing,
    Completed,
    Error,
}

impl RunState {
    /// A run is outstanding; inputs are locked and new runs are ignored
    pub fn is_in_flight(self) -> bool {
        matches!(self, RunState::FetchingSpecs | RunState::Analyzing)
    }
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunState::Idle => write!(f, "IDLE"),
            RunState::FetchingSpecs => write!(f, "FETCHING SPECS"),
            RunState::Analyzing => write!(f, "ANALYZING"),
            RunState::Completed => write!(f, "COMPLETED"),
            RunState::Error => write!(f, "ERROR"),
        }
    }
}
