use std::sync::Arc;

use color_eyre::eyre::eyre;
use serde_json::Value;

use mizan_config::LlmProviderConfig;
use mizan_domain::verdict::Classification;
use mizan_service::{Providers, StepStatus};

use super::{
	FailingExtraction, ScriptedCompletion, StubEmbedding, StubExtraction, StubSearch,
	build_service, test_config, user_text,
};

/// Specialists answer Compliant only when their prompt carries the expected document
/// text, so the assertions below prove what the panel was actually shown.
fn script(cfg: &LlmProviderConfig, messages: &[Value]) -> color_eyre::Result<String> {
	match cfg.model.as_str() {
		"specialist-model" => {
			let prompt = user_text(messages);
			let classification = if prompt.contains("facility-agreement.pdf")
				|| prompt.contains("Ijara lease agreement")
			{
				"Compliant"
			} else {
				"Non-Compliant"
			};

			Ok(serde_json::json!({
				"classification": classification,
				"confidence": 80,
				"findings": [],
				"issues": [],
				"compliant_aspects": [],
				"recommendations": [],
				"summary": "Reviewed the supplied text.",
			})
			.to_string())
		},
		"aggregator-model" => Err(eyre!("aggregator provider timeout")),
		model => Err(eyre!("unexpected completion call for {model}")),
	}
}

#[tokio::test]
async fn failed_extraction_audits_a_placeholder_naming_the_file() {
	let providers = Providers::new(
		Arc::new(StubEmbedding { vector_dim: 8 }),
		Arc::new(ScriptedCompletion(script)),
		Arc::new(FailingExtraction),
		Arc::new(StubSearch::empty()),
	);
	let service = build_service(test_config(), providers);
	let response = service
		.audit_file("facility-agreement.pdf", b"%PDF-1.4 garbled scan".to_vec(), "application/pdf")
		.await
		.expect("Audit failed.");

	// The extraction step is terminal and marked as the failure it was.
	let extraction = response
		.steps
		.iter()
		.find(|step| step.agent == "document_extractor")
		.expect("Missing extraction step.");

	assert_eq!(extraction.status, StepStatus::Error);

	// Every specialist saw the placeholder that names the file, and the audit still
	// produced a full verdict.
	assert_eq!(response.specialists.len(), 3);
	assert!(
		response
			.specialists
			.iter()
			.all(|verdict| verdict.classification == Classification::Compliant)
	);
	assert_eq!(response.verdict.classification, Classification::Compliant);
}

#[tokio::test]
async fn extracted_text_feeds_the_panel() {
	let providers = Providers::new(
		Arc::new(StubEmbedding { vector_dim: 8 }),
		Arc::new(ScriptedCompletion(script)),
		Arc::new(StubExtraction {
			text: "Ijara lease agreement between lessor and lessee.".to_string(),
		}),
		Arc::new(StubSearch::empty()),
	);
	let service = build_service(test_config(), providers);
	let response = service
		.audit_file("lease.docx", b"PK docx bytes".to_vec(), "application/vnd.ms-word")
		.await
		.expect("Audit failed.");

	let extraction = response
		.steps
		.iter()
		.find(|step| step.agent == "document_extractor")
		.expect("Missing extraction step.");

	assert_eq!(extraction.status, StepStatus::Completed);
	assert!(
		response
			.specialists
			.iter()
			.all(|verdict| verdict.classification == Classification::Compliant)
	);
}

#[tokio::test]
async fn empty_uploads_are_rejected() {
	let providers = Providers::new(
		Arc::new(StubEmbedding { vector_dim: 8 }),
		Arc::new(ScriptedCompletion(script)),
		Arc::new(FailingExtraction),
		Arc::new(StubSearch::empty()),
	);
	let service = build_service(test_config(), providers);

	assert!(service.audit_file("empty.pdf", Vec::new(), "application/pdf").await.is_err());
}
