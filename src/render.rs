//! Terminal dashboard for simulation results

use crate::model::{
    AnalysisResult, CrashParameters, RunState, Severity, Theme, UnitSystem, VehicleSpecs,
};
use crate::simulation::Simulation;
use colored::{Color, ColoredString, Colorize};
use std::fmt::Write;

const KG_TO_LB: f64 = 2.204_622_62;
const KPH_TO_MPH: f64 = 0.621_371_19;
const GAUGE_WIDTH: usize = 30;
const REGION_BAR_WIDTH: usize = 10;

/// Accent colors per theme
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Palette {
    pub accent: Color,
    pub good: Color,
    pub caution: Color,
    pub danger: Color,
}

impl Palette {
    pub fn for_theme(theme: Theme) -> Self {
        match theme {
            Theme::Dark => Self {
                accent: Color::BrightBlue,
                good: Color::BrightGreen,
                caution: Color::BrightYellow,
                danger: Color::BrightRed,
            },
            Theme::Light => Self {
                accent: Color::Blue,
                good: Color::Green,
                caution: Color::Yellow,
                danger: Color::Red,
            },
        }
    }

    pub fn severity(&self, severity: Severity) -> Color {
        match severity {
            Severity::Low => self.good,
            Severity::Moderate => self.caution,
            Severity::High => Color::Magenta,
            Severity::Critical => self.danger,
        }
    }
}

/// Chart score for a free-text region summary
pub fn region_risk_score(summary: &str) -> u8 {
    if summary.contains("Low") {
        20
    } else if summary.contains("High") {
        80
    } else {
        50
    }
}

pub fn injury_icon(label: &str) -> &'static str {
    let label = label.to_lowercase();
    if label.contains("brain") || label.contains("concussion") {
        "🧠"
    } else if label.contains("bone") || label.contains("fracture") {
        "🦴"
    } else if label.contains("organ") || label.contains("internal") {
        "🩸"
    } else {
        "🩹"
    }
}

/// Filled and empty segments of a horizontal bar for `percent`
pub fn bar(percent: f64, width: usize) -> (String, String) {
    let ratio = if percent.is_finite() {
        (percent / 100.0).clamp(0.0, 1.0)
    } else {
        0.0
    };
    let filled = (ratio * width as f64).round() as usize;
    ("█".repeat(filled), "░".repeat(width - filled))
}

pub fn format_mass(kg: f64, units: UnitSystem) -> String {
    match units {
        UnitSystem::Metric => format!("{kg:.0} kg"),
        UnitSystem::Imperial => format!("{:.0} lb", kg * KG_TO_LB),
    }
}

pub fn format_speed(kph: f64, units: UnitSystem) -> String {
    match units {
        UnitSystem::Metric => format!("{kph:.0} km/h"),
        UnitSystem::Imperial => format!("{:.0} mph", kph * KPH_TO_MPH),
    }
}

pub fn state_badge(state: RunState, palette: &Palette) -> ColoredString {
    let label = format!("[{state}]");
    match state {
        RunState::Idle => label.dimmed(),
        RunState::FetchingSpecs | RunState::Analyzing => label.color(palette.caution).bold(),
        RunState::Completed => label.color(palette.good).bold(),
        RunState::Error => label.color(palette.danger).bold(),
    }
}

/// One-line live status shown while a run is outstanding
pub fn progress_line(state: RunState, progress: u8, palette: &Palette) -> String {
    let (filled, empty) = bar(f64::from(progress), GAUGE_WIDTH);
    format!(
        "{} {}{} {:>3}%",
        state_badge(state, palette),
        filled.color(palette.accent),
        empty.dimmed(),
        progress
    )
}

/// Full dashboard for the current simulation state
pub fn dashboard(sim: &Simulation) -> String {
    let settings = sim.settings();
    let palette = Palette::for_theme(settings.theme);
    let units = settings.unit_system;
    let mut out = String::new();

    let rule = "─".repeat(64);
    let _ = writeln!(out, "{}", rule.color(palette.accent));
    let _ = writeln!(
        out,
        " {} {}  {}",
        "AeroSafety".bold(),
        sim.identity().to_string().dimmed(),
        state_badge(sim.state(), &palette)
    );
    let _ = writeln!(out, "{}", rule.color(palette.accent));

    if let Some(specs) = sim.specs() {
        write_vehicle(&mut out, specs, units);
    }
    write_scenario(&mut out, &sim.effective_params(), units);

    match (sim.state(), sim.result()) {
        (RunState::Completed, Some(result)) => write_result(&mut out, result, &palette),
        (RunState::Error, _) => {
            let message = sim.error().unwrap_or(crate::simulation::RUN_FAILURE_MESSAGE);
            let _ = writeln!(out, "\n {}", message.color(palette.danger).bold());
        }
        (state, _) if state.is_in_flight() => {
            let _ = writeln!(out, "\n {}", progress_line(state, sim.progress(), &palette));
        }
        _ => {}
    }

    out
}

fn write_vehicle(out: &mut String, specs: &VehicleSpecs, units: UnitSystem) {
    let series = if specs.series.is_empty() {
        String::new()
    } else {
        format!(" ({})", specs.series)
    };
    let _ = writeln!(
        out,
        " {} {} {} {}{}",
        "Vehicle:".dimmed(),
        specs.year,
        specs.brand,
        specs.model.bold(),
        series
    );
    let _ = writeln!(
        out,
        " {} {}   {} {}",
        "Weight:".dimmed(),
        format_mass(specs.weight_kg, units),
        "Rating:".dimmed(),
        specs.safety_rating
    );
    if !specs.safety_features.is_empty() {
        let _ = writeln!(
            out,
            " {} {}",
            "Features:".dimmed(),
            specs.safety_features.join(", ")
        );
    }
}

fn write_scenario(out: &mut String, params: &CrashParameters, units: UnitSystem) {
    let m = &params.modifiers;
    let _ = writeln!(
        out,
        " {} {} at {}° into {} ({}), seatbelt {}, airbag {}",
        "Scenario:".dimmed(),
        format_speed(params.speed_kph, units),
        params.impact_angle,
        params.object_of_impact,
        m.impact_material(),
        if params.seatbelt_used { "on" } else { "off" },
        params.airbag_status
    );
    let _ = writeln!(
        out,
        " {} {} occupant(s), {}, {} road, {}, {} tires",
        "Conditions:".dimmed(),
        m.occupant_count(),
        m.occupant_age(),
        m.road_condition(),
        m.time_of_day(),
        m.tire_condition()
    );
}

fn write_result(out: &mut String, result: &AnalysisResult, palette: &Palette) {
    let survival = result.survival_probability.clamp(0.0, 100.0);
    let (filled, empty) = bar(survival, GAUGE_WIDTH);
    let _ = writeln!(out);
    let _ = writeln!(
        out,
        " {} {}{} {}",
        "Survival".bold(),
        filled.color(palette.good),
        empty.color(palette.danger),
        format!("{survival:.1}%").color(palette.good).bold()
    );
    let _ = writeln!(
        out,
        " {} {:.1}%",
        "Fatality risk".dimmed(),
        100.0 - survival
    );
    let _ = writeln!(
        out,
        " {} {:.1} kJ   {} {:.1} g",
        "Kinetic energy".dimmed(),
        result.kinetic_energy_kj,
        "Peak G-force".dimmed(),
        result.estimated_g_force
    );

    let _ = writeln!(out, "\n {}", "Body region risk".bold());
    let breakdown = &result.injury_risk_breakdown;
    for (region, summary) in [
        ("Head", &breakdown.head),
        ("Chest", &breakdown.chest),
        ("Legs", &breakdown.legs),
    ] {
        let score = region_risk_score(summary);
        let (filled, empty) = bar(f64::from(score), REGION_BAR_WIDTH);
        let color = match score {
            0..=20 => palette.good,
            21..=50 => palette.caution,
            _ => palette.danger,
        };
        let _ = writeln!(
            out,
            "   {region:<6}{}{} {}",
            filled.color(color),
            empty.dimmed(),
            summary
        );
    }

    let _ = writeln!(out, "\n {}", "Trauma assessment".bold());
    for injury in &result.specific_injuries {
        let severity = palette.severity(injury.severity);
        let _ = writeln!(
            out,
            "   {} {} {} {}",
            injury_icon(&injury.label),
            injury.label.bold(),
            format!("{:.0}%", injury.chance).color(severity),
            format!("[{}]", injury.severity).color(severity)
        );
        if !injury.description.is_empty() {
            let _ = writeln!(out, "      {}", injury.description.dimmed());
        }
    }

    let _ = writeln!(out, "\n {}", "Reasoning".bold());
    for line in result.reasoning.lines() {
        let _ = writeln!(out, "   {line}");
    }

    if !result.sources.is_empty() {
        let _ = writeln!(out, "\n {}", "Sources".bold());
        for source in &result.sources {
            let _ = writeln!(out, "   {} {}", source.title, source.uri.dimmed());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Settings, Source};
    use crate::testing::{analysis_json, tesla_specs_json};

    #[test]
    fn test_region_risk_score() {
        assert_eq!(region_risk_score("Low - well protected"), 20);
        assert_eq!(region_risk_score("High risk of intrusion"), 80);
        assert_eq!(region_risk_score("Moderate"), 50);
        // "Low" wins when both appear
        assert_eq!(region_risk_score("Low to High"), 20);
    }

    #[test]
    fn test_injury_icons() {
        assert_eq!(injury_icon("Concussion (MTBI)"), "🧠");
        assert_eq!(injury_icon("Traumatic Brain Injury"), "🧠");
        assert_eq!(injury_icon("Bone Fractures"), "🦴");
        assert_eq!(injury_icon("Internal Organ Damage"), "🩸");
        assert_eq!(injury_icon("Whiplash"), "🩹");
    }

    #[test]
    fn test_bar_clamps() {
        assert_eq!(bar(50.0, 10), ("█".repeat(5), "░".repeat(5)));
        assert_eq!(bar(140.0, 4).0, "█".repeat(4));
        assert_eq!(bar(-3.0, 4).1, "░".repeat(4));
        assert_eq!(bar(f64::NAN, 4).1, "░".repeat(4));
    }

    #[test]
    fn test_unit_conversion() {
        assert_eq!(format_mass(1844.0, UnitSystem::Metric), "1844 kg");
        assert_eq!(format_mass(1844.0, UnitSystem::Imperial), "4065 lb");
        assert_eq!(format_speed(100.0, UnitSystem::Imperial), "62 mph");
    }

    #[test]
    fn test_palette_follows_theme() {
        assert_eq!(Palette::for_theme(Theme::Dark).accent, Color::BrightBlue);
        assert_eq!(Palette::for_theme(Theme::Light).danger, Color::Red);
    }

    #[test]
    fn test_dashboard_sections() {
        colored::control::set_override(false);

        let mut sim = Simulation::new(
            Default::default(),
            Default::default(),
            Settings {
                unit_system: UnitSystem::Imperial,
                ..Settings::default()
            },
        );
        sim.begin_run().unwrap();
        sim.specs_resolved(serde_json::from_value(tesla_specs_json()).unwrap());
        let mut result: AnalysisResult = serde_json::from_value(analysis_json()).unwrap();
        result.sources.push(Source {
            title: "Euro NCAP".to_string(),
            uri: "https://www.euroncap.com".to_string(),
        });
        sim.analysis_completed(result);

        let text = dashboard(&sim);
        assert!(text.contains("[COMPLETED]"));
        assert!(text.contains("Highland"));
        assert!(text.contains("4065 lb"));
        assert!(text.contains("37 mph"));
        assert!(text.contains("94.0%"));
        assert!(text.contains("256.1 kJ"));
        assert!(text.contains("Internal Organ Damage"));
        assert!(text.contains("Euro NCAP"));
    }

    #[test]
    fn test_dashboard_error_shows_generic_message() {
        colored::control::set_override(false);

        let mut sim = Simulation::default();
        sim.begin_run().unwrap();
        sim.run_failed(&crate::client::ClientError::Provider(
            crate::provider::ProviderError::EmptyResponse,
        ));

        let text = dashboard(&sim);
        assert!(text.contains("[ERROR]"));
        assert!(text.contains(crate::simulation::RUN_FAILURE_MESSAGE));
        assert!(!text.contains("no content"));
    }
}
