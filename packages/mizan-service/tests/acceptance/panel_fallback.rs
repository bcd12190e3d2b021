use color_eyre::eyre::eyre;
use serde_json::Value;

use mizan_config::LlmProviderConfig;
use mizan_domain::verdict::{Classification, ConsensusLevel};
use mizan_service::{AuditRequest, StepStatus};

use super::{StubSearch, build_service, providers_with, system_text, test_config};

fn script(cfg: &LlmProviderConfig, messages: &[Value]) -> color_eyre::Result<String> {
	match cfg.model.as_str() {
		"specialist-model" => {
			if system_text(messages).contains("Gharar Analysis") {
				return Err(eyre!("specialist provider timeout"));
			}

			Ok(serde_json::json!({
				"classification": "Compliant",
				"confidence": 80,
				"findings": ["Structure follows murabaha requirements."],
				"issues": [],
				"compliant_aspects": ["Asset ownership precedes sale."],
				"recommendations": [],
				"summary": "No violations found.",
			})
			.to_string())
		},
		"aggregator-model" => Err(eyre!("aggregator provider timeout")),
		model => Err(eyre!("unexpected completion call for {model}")),
	}
}

#[tokio::test]
async fn one_failed_specialist_does_not_abort_the_panel() {
	let service = build_service(test_config(), providers_with(script, StubSearch::empty()));
	let response = service
		.audit_document(AuditRequest {
			document_text: "Murabaha facility agreement between bank and customer.".to_string(),
		})
		.await
		.expect("Audit failed.");

	assert_eq!(response.specialists.len(), 3);

	let failed = response
		.specialists
		.iter()
		.find(|verdict| verdict.specialist_id == "gharar_specialist")
		.expect("Missing fallback verdict.");

	assert_eq!(failed.classification, Classification::PartiallyCompliant);
	assert_eq!(failed.confidence, 0.0);
	assert!(failed.recommendations.iter().any(|r| r.contains("Manual review")));

	// Two real Compliant verdicts outvote the fallback, and the roster lists every
	// specialist in configured order, failed one included.
	assert_eq!(response.verdict.classification, Classification::Compliant);
	assert_eq!(response.verdict.consensus_level, ConsensusLevel::MajorityAgree);
	assert_eq!(response.verdict.agents_consulted, vec![
		"Riba Analysis",
		"Gharar Analysis",
		"Fiqh Review"
	]);
	assert!(response.verdict.processing_time_seconds >= 0.0);
}

fn panicking_script(cfg: &LlmProviderConfig, messages: &[Value]) -> color_eyre::Result<String> {
	match cfg.model.as_str() {
		"specialist-model" => {
			if system_text(messages).contains("Gharar Analysis") {
				panic!("specialist stub crashed");
			}

			Ok(serde_json::json!({
				"classification": "Compliant",
				"confidence": 80,
				"findings": [],
				"issues": [],
				"compliant_aspects": [],
				"recommendations": [],
				"summary": "No violations found.",
			})
			.to_string())
		},
		"aggregator-model" => Err(eyre!("aggregator provider timeout")),
		model => Err(eyre!("unexpected completion call for {model}")),
	}
}

#[tokio::test]
async fn a_panicked_specialist_still_settles_its_verdict_and_trace_step() {
	let service =
		build_service(test_config(), providers_with(panicking_script, StubSearch::empty()));
	let response = service
		.audit_document(AuditRequest {
			document_text: "Murabaha facility agreement between bank and customer.".to_string(),
		})
		.await
		.expect("Audit failed.");

	assert_eq!(response.specialists.len(), 3);

	let crashed = response
		.specialists
		.iter()
		.find(|verdict| verdict.specialist_id == "gharar_specialist")
		.expect("Missing fallback verdict.");

	assert_eq!(crashed.classification, Classification::PartiallyCompliant);
	assert_eq!(crashed.confidence, 0.0);
	assert!(crashed.findings[0].contains("did not settle"));

	// The crashed branch's trace step still reached a terminal status.
	let step = response
		.steps
		.iter()
		.find(|step| step.agent == "gharar_specialist")
		.expect("Missing specialist step.");

	assert_eq!(step.status, StepStatus::Error);
	assert!(response.steps.iter().all(|step| step.status != StepStatus::Running));
}
