//! Natural-language instructions for each inference query

use crate::model::{
    AnalysisDepth, CrashParameters, OccupantAge, SeatPosture, UnitSystem, VehicleSpecs, Verbosity,
};

/// Strip characters that would break out of the quoted user text
fn quoted(input: &str) -> String {
    input.trim().replace('"', "'").replace(['\n', '\r'], " ")
}

pub fn brand_search(partial: &str, limit: usize) -> String {
    format!(
        "List {limit} car manufacturers that start with or match \"{}\". \
         Return only the names as a JSON array of strings.",
        quoted(partial)
    )
}

pub fn model_lookup(brand: &str, year: u16) -> String {
    format!(
        "List the most popular car models/series for the brand \"{}\" in the year {year}. \
         Return as a JSON array of objects with 'series' and 'model' keys.",
        quoted(brand)
    )
}

pub fn spec_lookup(brand: &str, model: &str, year: u16) -> String {
    format!(
        "Retrieve precise specifications for a {year} {} {}. \
         I need its curb weight in kg, safety rating (NCAP/IIHS), and standard safety features.",
        quoted(brand),
        quoted(model)
    )
}

fn yes_no(flag: bool) -> &'static str {
    if flag { "Yes" } else { "No" }
}

/// Build the combined survivability + trauma prompt.
///
/// Every modifier is rendered; unset ones show their default.
pub fn crash_analysis(specs: &VehicleSpecs, params: &CrashParameters) -> String {
    let m = &params.modifiers;

    let series = if specs.series.trim().is_empty() {
        String::new()
    } else {
        format!(" ({})", specs.series.trim())
    };
    let features = if specs.safety_features.is_empty() {
        "none listed".to_string()
    } else {
        specs.safety_features.join(", ")
    };
    let age_note = match m.occupant_age() {
        OccupantAge::Adult => "",
        OccupantAge::Child => " (account for child skeletal and restraint-fit differences)",
        OccupantAge::Senior => " (account for reduced bone density and injury tolerance)",
    };
    let posture_note = match m.seat_posture() {
        SeatPosture::Upright => "",
        SeatPosture::Reclined => " (consider submarining under the lap belt)",
    };

    let mut prompt = format!(
        "Perform a high-fidelity crash survivability and clinical trauma analysis.\n\n\
         VEHICLE: {} {} {}{series}\n\
         SPECS: {}kg, Rating: {}, Features: {features}\n\n",
        specs.year, specs.brand, specs.model, specs.weight_kg, specs.safety_rating,
    );

    prompt.push_str("CRASH PARAMETERS:\n");
    prompt.push_str(&format!("- Speed: {} km/h\n", params.speed_kph));
    prompt.push_str(&format!("- Angle: {}°\n", params.impact_angle));
    prompt.push_str(&format!("- Object: {}\n", params.object_of_impact));
    prompt.push_str(&format!("- Impact surface material: {}\n", m.impact_material()));
    prompt.push_str(&format!("- Seatbelt: {}\n", yes_no(params.seatbelt_used)));
    prompt.push_str(&format!(
        "- Airbag Deployment Status: {} (None/Partial/Optimal)\n",
        params.airbag_status
    ));
    prompt.push_str(&format!("- Airbag technology: {}\n", m.airbag_technology()));
    prompt.push_str(&format!(
        "- Pre-impact braking efficiency: {}% (reduce the effective impact speed accordingly)\n",
        m.braking_efficiency()
    ));
    prompt.push_str(&format!(
        "- Additional cargo mass: {} kg (add to the vehicle mass)\n",
        m.cargo_mass_kg()
    ));
    prompt.push_str(&format!("- Tire condition: {}\n", m.tire_condition()));
    prompt.push_str(&format!("- Road condition: {}\n", m.road_condition()));
    prompt.push_str(&format!("- Time of day: {}\n\n", m.time_of_day()));

    prompt.push_str("OCCUPANTS:\n");
    prompt.push_str(&format!("- Occupant count: {}\n", m.occupant_count()));
    prompt.push_str(&format!(
        "- Primary occupant age group: {}{age_note}\n",
        m.occupant_age()
    ));
    prompt.push_str(&format!("- Seating posture: {}{posture_note}\n\n", m.seat_posture()));

    prompt.push_str(
        "Based on vehicular physics and trauma medicine, calculate:\n\
         1. Kinetic Energy (kJ) and peak G-Force.\n\
         2. Survival Probability (%).\n\
         3. specificInjuries: YOU MUST ANALYZE THE RISK FOR:\n   - Concussion (MTBI)\n   \
         - Traumatic Brain Injury (Brain Damage)\n   - Bone Fractures (Broken Bones)\n   \
         - Internal Organ Damage\n   For each, provide a label, chance (0-100), \
         severity (Low/Moderate/High/Critical), and short description.\n",
    );
    prompt.push_str(&format!(
        "   Note: Airbag status \"{}\" significantly impacts head and chest injury probability.\n",
        params.airbag_status
    ));
    prompt.push_str("4. Detailed scientific reasoning.\n\n");

    prompt.push_str("REPORTING:\n");
    prompt.push_str(match m.analysis_depth() {
        AnalysisDepth::Standard => "- Depth: Standard. Summarize the dominant injury mechanisms.\n",
        AnalysisDepth::Forensic => {
            "- Depth: Forensic. Reconstruct the crash pulse, occupant kinematics and load paths step by step.\n"
        }
    });
    prompt.push_str(match m.verbosity() {
        Verbosity::Technical => "- Write the reasoning for an engineering audience.\n",
        Verbosity::Casual => "- Write the reasoning in plain language for a general audience.\n",
    });
    if m.show_equations() {
        prompt.push_str(
            "- Include the governing equations (e.g. KE = 1/2 m v^2, a = dv/dt) with substituted values.\n",
        );
    }
    if m.unit_system() == UnitSystem::Imperial {
        prompt.push_str(
            "- Quote speeds and masses in the reasoning in imperial units (mph, lb); numeric fields stay in kJ and g.\n",
        );
    }

    prompt
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{AirbagStatus, RoadCondition, Settings};

    fn tesla() -> VehicleSpecs {
        VehicleSpecs {
            brand: "Tesla".to_string(),
            series: String::new(),
            model: "Model 3".to_string(),
            year: 2023,
            weight_kg: 1844.0,
            safety_rating: "5 Stars NCAP".to_string(),
            safety_features: vec!["AEB".to_string(), "8 airbags".to_string()],
        }
    }

    #[test]
    fn test_brand_prompt_quotes_input() {
        let prompt = brand_search("Vo\"lvo", 5);
        assert!(prompt.starts_with("List 5 car manufacturers"));
        assert!(prompt.contains("\"Vo'lvo\""));
    }

    #[test]
    fn test_model_and_spec_prompts() {
        assert!(model_lookup("Volvo", 2021).contains("\"Volvo\" in the year 2021"));
        let spec = spec_lookup("Tesla", "Model 3", 2023);
        assert!(spec.contains("2023 Tesla Model 3"));
        assert!(spec.contains("curb weight in kg"));
    }

    #[test]
    fn test_analysis_prompt_defaults_for_unset_modifiers() {
        let prompt = crash_analysis(&tesla(), &CrashParameters::default());
        assert!(prompt.contains("VEHICLE: 2023 Tesla Model 3\n"));
        assert!(prompt.contains("SPECS: 1844kg, Rating: 5 Stars NCAP, Features: AEB, 8 airbags"));
        assert!(prompt.contains("- Speed: 60 km/h"));
        assert!(prompt.contains("- Seatbelt: Yes"));
        assert!(prompt.contains("- Road condition: Dry"));
        assert!(prompt.contains("- Occupant count: 1"));
        assert!(prompt.contains("- Depth: Standard"));
        assert!(prompt.contains("RISK FOR:\n   - Concussion (MTBI)\n   - Traumatic Brain Injury"));
        assert!(prompt.contains("   - Internal Organ Damage\n   For each, provide a label"));
        assert!(prompt.ends_with("engineering audience.\n"));
        assert!(!prompt.contains("governing equations"));
        assert!(!prompt.contains("imperial"));
    }

    #[test]
    fn test_analysis_prompt_reflects_settings() {
        let settings = Settings {
            road_condition: RoadCondition::Icy,
            occupant_count: 4,
            show_equations: true,
            unit_system: UnitSystem::Imperial,
            analysis_depth: AnalysisDepth::Forensic,
            occupant_age: OccupantAge::Senior,
            ..Settings::default()
        };
        let params = CrashParameters {
            airbag_status: AirbagStatus::Partial,
            seatbelt_used: false,
            ..CrashParameters::default()
        };
        let prompt = crash_analysis(&tesla(), &settings.merge_into(&params));
        assert!(prompt.contains("- Road condition: Icy"));
        assert!(prompt.contains("- Occupant count: 4"));
        assert!(prompt.contains("- Seatbelt: No"));
        assert!(prompt.contains("Airbag status \"Partial\""));
        assert!(prompt.contains("governing equations"));
        assert!(prompt.contains("imperial units"));
        assert!(prompt.contains("Depth: Forensic"));
        assert!(prompt.contains("reduced bone density"));
    }

    #[test]
    fn test_series_included_when_known() {
        let mut specs = tesla();
        specs.series = "Highland".to_string();
        let prompt = crash_analysis(&specs, &CrashParameters::default());
        assert!(prompt.contains("VEHICLE: 2023 Tesla Model 3 (Highland)"));
    }
}
