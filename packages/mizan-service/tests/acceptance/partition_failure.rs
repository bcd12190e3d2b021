use std::collections::HashMap;

use color_eyre::eyre::eyre;
use serde_json::Value;

use mizan_config::LlmProviderConfig;
use mizan_domain::intent::Intent;
use mizan_service::{QueryRequest, StepStatus};

use super::{StubSearch, build_service, providers_with, row, test_config};

fn script(cfg: &LlmProviderConfig, _messages: &[Value]) -> color_eyre::Result<String> {
	match cfg.model.as_str() {
		"guardrail-model" => Ok("RELEVANT".to_string()),
		"synthesis-model" => Ok("Answer drawn from the surviving partitions [1][2].".to_string()),
		model => Err(eyre!("unexpected completion call for {model}")),
	}
}

#[tokio::test]
async fn a_down_partition_does_not_fail_the_query() {
	let mut rows = HashMap::new();

	rows.insert(
		"sac_rulings".to_string(),
		vec![row(1, "The SAC resolved that tawarruq is permissible.", 0.7)],
	);
	rows.insert(
		"scholarly_works".to_string(),
		vec![row(2, "Scholars differ on organized tawarruq.", 0.6)],
	);

	let mut search = StubSearch::new(rows);

	// Both the ranked RPC and the listing fallback fail for this partition.
	search.failing_tables.insert("ifsa_sections".to_string());

	let service = build_service(test_config(), providers_with(script, search));
	let response = service
		.process_query(QueryRequest { query: "Is tawarruq permissible?".to_string() })
		.await
		.expect("Query failed.");

	assert_eq!(response.intent, Intent::DomainRelevant);
	assert_eq!(response.citations.len(), 2);
	assert!(response.citations.iter().all(|c| c.partition_id != "ifsa_sections"));
	assert!(!response.answer.is_empty());

	// Single-partition lookups degrade the same way instead of erroring.
	assert!(service.search_partition("ifsa_sections", &[0.0; 8]).await.is_empty());
	assert_eq!(service.search_partition("sac_rulings", &[0.0; 8]).await.len(), 1);
}

#[tokio::test]
async fn a_panicked_partition_search_still_settles_its_trace_step() {
	let mut rows = HashMap::new();

	rows.insert(
		"sac_rulings".to_string(),
		vec![row(1, "The SAC resolved that tawarruq is permissible.", 0.7)],
	);

	let mut search = StubSearch::new(rows);

	search.panicking_tables.insert("ifsa_sections".to_string());

	let service = build_service(test_config(), providers_with(script, search));
	let response = service
		.process_query(QueryRequest { query: "Is tawarruq permissible?".to_string() })
		.await
		.expect("Query failed.");

	assert!(!response.answer.is_empty());
	assert!(response.citations.iter().all(|c| c.partition_id != "ifsa_sections"));

	// The crashed branch's search step was failed rather than left running.
	assert!(
		response
			.steps
			.iter()
			.any(|step| step.agent == "knowledge_gateway" && step.status == StepStatus::Error)
	);
	assert!(response.steps.iter().all(|step| step.status != StepStatus::Running));
}
