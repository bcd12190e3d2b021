use color_eyre::eyre::eyre;
use serde_json::Value;

use mizan_config::LlmProviderConfig;
use mizan_domain::verdict::{Classification, ConsensusLevel, RiskLevel};
use mizan_service::AuditRequest;

use super::{StubSearch, build_service, providers_with, system_text, test_config};

fn verdict_reply(classification: &str, confidence: u32, issue: Option<&str>) -> String {
	serde_json::json!({
		"classification": classification,
		"confidence": confidence,
		"findings": [],
		"issues": issue.map(|i| vec![i]).unwrap_or_default(),
		"compliant_aspects": [],
		"recommendations": [],
		"summary": "Scripted verdict.",
	})
	.to_string()
}

fn majority_script(cfg: &LlmProviderConfig, messages: &[Value]) -> color_eyre::Result<String> {
	match cfg.model.as_str() {
		"specialist-model" => {
			let system = system_text(messages);

			if system.contains("Fiqh Review") {
				return Ok(verdict_reply("Non-Compliant", 85, Some("Conditional sale clause")));
			}

			Ok(verdict_reply("Compliant", if system.contains("Riba") { 90 } else { 80 }, None))
		},
		"aggregator-model" => Err(eyre!("aggregator provider timeout")),
		model => Err(eyre!("unexpected completion call for {model}")),
	}
}

fn unanimous_script(cfg: &LlmProviderConfig, _messages: &[Value]) -> color_eyre::Result<String> {
	match cfg.model.as_str() {
		"specialist-model" => Ok(verdict_reply("Non-Compliant", 35, Some("Riba exposure"))),
		"aggregator-model" => Err(eyre!("aggregator provider timeout")),
		model => Err(eyre!("unexpected completion call for {model}")),
	}
}

#[tokio::test]
async fn two_to_one_panels_report_a_majority() {
	let service =
		build_service(test_config(), providers_with(majority_script, StubSearch::empty()));
	let response = service
		.audit_document(AuditRequest { document_text: "Facility agreement.".to_string() })
		.await
		.expect("Audit failed.");

	assert_eq!(response.verdict.classification, Classification::Compliant);
	assert_eq!(response.verdict.consensus_level, ConsensusLevel::MajorityAgree);
	// Mean of 90, 80, 85 confidence.
	assert_eq!(response.verdict.risk_level, RiskLevel::Low);
	assert_eq!(response.verdict.issues.len(), 1);
	assert_eq!(response.verdict.issues[0].detected_by, vec!["Fiqh Review"]);
}

#[tokio::test]
async fn unanimous_low_confidence_panels_read_as_high_risk() {
	let service =
		build_service(test_config(), providers_with(unanimous_script, StubSearch::empty()));
	let response = service
		.audit_document(AuditRequest { document_text: "Facility agreement.".to_string() })
		.await
		.expect("Audit failed.");

	assert_eq!(response.verdict.classification, Classification::NonCompliant);
	assert_eq!(response.verdict.consensus_level, ConsensusLevel::AllAgree);
	assert_eq!(response.verdict.risk_level, RiskLevel::High);
	// The issue all three specialists raised collapses to one annotated entry.
	assert_eq!(response.verdict.issues.len(), 1);
	assert_eq!(response.verdict.issues[0].detected_by.len(), 3);
	assert!(response.verdict.consensus_narrative.contains("All specialists"));
}
