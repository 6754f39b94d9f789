//! End-to-end scenarios over the simulation, client and autocomplete layers,
//! all against a scripted inference backend.

#[cfg(test)]
mod tests {
    use crate::AutocompleteConfig;
    use crate::autocomplete::AutocompleteController;
    use crate::client::{CrashAnalysis, StructuredQuery};
    use crate::model::{
        AirbagStatus, AnalysisResult, CrashParameters, ImpactObject, RunState, Severity, Source,
        VehicleIdentity,
    };
    use crate::simulation::{RUN_FAILURE_MESSAGE, Simulation, SimulationController};
    use crate::testing::{ScriptedProvider, analysis_json, client_for, tesla_specs_json};
    use serde_json::json;
    use std::sync::Arc;
    use std::time::Duration;
    use tokio::sync::Notify;

    fn tesla_run(provider: &Arc<ScriptedProvider>) -> SimulationController {
        let identity = VehicleIdentity {
            brand: "Tesla".to_string(),
            series: String::new(),
            model: "Model 3".to_string(),
            year: 2023,
        };
        let params = CrashParameters {
            speed_kph: 60.0,
            impact_angle: 90.0,
            object_of_impact: ImpactObject::Vehicle,
            seatbelt_used: true,
            airbag_status: AirbagStatus::Optimal,
            ..CrashParameters::default()
        };
        SimulationController::new(
            client_for(provider),
            Simulation::new(identity, params, Default::default()),
        )
    }

    async fn wait_for_calls(provider: &ScriptedProvider, calls: usize) {
        while provider.call_count() < calls {
            tokio::task::yield_now().await;
        }
    }

    #[tokio::test]
    async fn test_successful_run_walks_every_state() {
        let gate = Arc::new(Notify::new());
        let provider = Arc::new(ScriptedProvider::gated(gate.clone()));
        provider.push_json(tesla_specs_json());
        provider.push_json(analysis_json());
        let controller = tesla_run(&provider);
        assert_eq!(controller.state(), RunState::Idle);

        let runner = controller.clone();
        let run = tokio::spawn(async move { runner.run().await });

        wait_for_calls(&provider, 1).await;
        let snapshot = controller.snapshot();
        assert_eq!(snapshot.state(), RunState::FetchingSpecs);
        assert!(snapshot.result().is_none());
        assert!(snapshot.specs().is_none());

        // A second run while the first is outstanding dispatches nothing
        assert_eq!(controller.run().await, RunState::FetchingSpecs);
        assert_eq!(provider.call_count(), 1);

        gate.notify_one();
        wait_for_calls(&provider, 2).await;
        let snapshot = controller.snapshot();
        assert_eq!(snapshot.state(), RunState::Analyzing);
        assert!(snapshot.specs().is_some());
        assert!(snapshot.result().is_none());

        assert_eq!(controller.run().await, RunState::Analyzing);
        assert_eq!(provider.call_count(), 2);

        gate.notify_one();
        assert_eq!(run.await.unwrap(), RunState::Completed);
        let snapshot = controller.snapshot();
        assert!(snapshot.result().is_some());
        assert_eq!(snapshot.progress(), 100);

        let requests = provider.requests();
        assert!(requests[0].prompt.contains("2023 Tesla Model 3"));
        assert!(requests[1].prompt.contains("VEHICLE: 2023 Tesla Model 3 (Highland)"));
    }

    #[tokio::test]
    async fn test_cancelled_run_can_be_restarted() {
        let gate = Arc::new(Notify::new());
        let provider = Arc::new(ScriptedProvider::gated(gate.clone()));
        provider.push_json(tesla_specs_json());
        provider.push_json(analysis_json());
        let controller = tesla_run(&provider);

        let cancelled = tokio::time::timeout(Duration::from_millis(50), controller.run()).await;
        assert!(cancelled.is_err());
        assert_eq!(controller.state(), RunState::Idle);
        assert_eq!(provider.call_count(), 1);

        controller.set_brand("Tesla").unwrap();
        let runner = controller.clone();
        let run = tokio::spawn(async move { runner.run().await });
        wait_for_calls(&provider, 2).await;
        gate.notify_one();
        wait_for_calls(&provider, 3).await;
        gate.notify_one();

        assert_eq!(run.await.unwrap(), RunState::Completed);
        assert!(controller.snapshot().result().is_some());
    }

    #[tokio::test]
    async fn test_tesla_scenario_result_shape() {
        let provider = Arc::new(ScriptedProvider::new());
        provider.push_json(tesla_specs_json());
        provider.push_json(analysis_json());
        let controller = tesla_run(&provider);

        assert_eq!(controller.run().await, RunState::Completed);
        let snapshot = controller.snapshot();
        let result = snapshot.result().unwrap();

        assert!((0.0..=100.0).contains(&result.survival_probability));
        assert!(result.kinetic_energy_kj >= 0.0);
        assert_eq!(result.specific_injuries.len(), 4);
        assert!(result.covers_required_injuries());
        for injury in &result.specific_injuries {
            assert!((0.0..=100.0).contains(&injury.chance));
            assert!(Severity::ALL.contains(&injury.severity));
        }

        let prompt = &provider.requests()[1].prompt;
        assert!(prompt.contains("- Speed: 60 km/h"));
        assert!(prompt.contains("- Object: Vehicle"));
        assert!(prompt.contains("- Seatbelt: Yes"));
        assert!(prompt.contains("Airbag Deployment Status: Optimal"));
    }

    #[tokio::test]
    async fn test_spec_lookup_failure_skips_analysis() {
        for reply in [None, Some(json!({"brand": "Tesla", "model": "Model 3"}))] {
            let provider = Arc::new(ScriptedProvider::new());
            match reply {
                None => provider.push_failure("service unavailable"),
                Some(partial) => provider.push_json(partial),
            }
            provider.push_json(analysis_json());
            let controller = tesla_run(&provider);

            assert_eq!(controller.run().await, RunState::Error);
            let snapshot = controller.snapshot();
            assert!(snapshot.specs().is_none());
            assert!(snapshot.result().is_none());
            assert_eq!(snapshot.error(), Some(RUN_FAILURE_MESSAGE));
            assert_eq!(provider.call_count(), 1);
        }
    }

    #[tokio::test]
    async fn test_analysis_failure_shows_no_partial_result() {
        let provider = Arc::new(ScriptedProvider::new());
        provider.push_json(tesla_specs_json());
        provider.push_text("{\"survivalProbability\": 80");
        let controller = tesla_run(&provider);

        assert_eq!(controller.run().await, RunState::Error);
        let snapshot = controller.snapshot();
        assert!(snapshot.result().is_none());
        assert_eq!(snapshot.error(), Some(RUN_FAILURE_MESSAGE));
        assert!(snapshot.last_failure().unwrap().contains("JSON"));
    }

    #[tokio::test]
    async fn test_edit_after_completion_returns_to_idle() {
        let provider = Arc::new(ScriptedProvider::new());
        provider.push_json(tesla_specs_json());
        provider.push_json(analysis_json());
        let controller = tesla_run(&provider);
        assert_eq!(controller.run().await, RunState::Completed);

        let mut params = controller.snapshot().params().clone();
        params.speed_kph = 90.0;
        controller.update_params(params).unwrap();

        let snapshot = controller.snapshot();
        assert_eq!(snapshot.state(), RunState::Idle);
        assert!(snapshot.result().is_none());
        assert_eq!(snapshot.progress(), 0);
    }

    #[tokio::test]
    async fn test_rerun_after_error() {
        let provider = Arc::new(ScriptedProvider::new());
        provider.push_failure("quota exceeded");
        provider.push_json(tesla_specs_json());
        provider.push_json(analysis_json());
        let controller = tesla_run(&provider);

        assert_eq!(controller.run().await, RunState::Error);
        assert_eq!(controller.run().await, RunState::Completed);
        let snapshot = controller.snapshot();
        assert!(snapshot.error().is_none());
        assert!(snapshot.last_failure().is_none());
    }

    #[tokio::test]
    async fn test_short_brand_input_never_calls_out() {
        let provider = Arc::new(ScriptedProvider::new());
        let client = client_for(&provider);
        for text in ["", "V", "é"] {
            assert!(client.suggest_brands(text).await.is_empty());
        }
        assert_eq!(provider.call_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_vo_suggestions_pass_through() {
        let provider = Arc::new(ScriptedProvider::new());
        provider.push_json(json!(["Volvo", "Volkswagen"]));
        let mut autocomplete =
            AutocompleteController::new(client_for(&provider), &AutocompleteConfig::default());

        autocomplete.on_brand_input("Vo");
        tokio::time::sleep(Duration::from_millis(501)).await;

        let brands = autocomplete.snapshot().brand_suggestions;
        assert_eq!(brands, vec!["Volvo", "Volkswagen"]);
        assert!(brands.iter().all(|b| b.contains("Vo")));
    }

    #[test]
    fn test_analysis_round_trip_through_schema() {
        let mut original: AnalysisResult = serde_json::from_value(analysis_json()).unwrap();
        original.sources.push(Source {
            title: "IIHS".to_string(),
            uri: "https://www.iihs.org".to_string(),
        });

        let mut body = serde_json::to_value(&original).unwrap();
        body.as_object_mut().unwrap().remove("sources");
        CrashAnalysis::schema().validate(&body).unwrap();

        let decoded: AnalysisResult = serde_json::from_value(body).unwrap();
        assert!(decoded.sources.is_empty());
        assert_eq!(
            decoded,
            AnalysisResult {
                sources: Vec::new(),
                ..original
            }
        );
    }
}
