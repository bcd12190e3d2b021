use std::collections::HashMap;

use color_eyre::eyre::eyre;
use serde_json::Value;

use mizan_config::LlmProviderConfig;
use mizan_domain::intent::Intent;
use mizan_service::QueryRequest;

use super::{StubSearch, build_service, providers_with, row, test_config};

fn script(cfg: &LlmProviderConfig, _messages: &[Value]) -> color_eyre::Result<String> {
	match cfg.model.as_str() {
		"guardrail-model" => Err(eyre!("guardrail provider timeout")),
		"synthesis-model" => Ok("Bai inah is not permissible under SAC rulings [1].".to_string()),
		model => Err(eyre!("unexpected completion call for {model}")),
	}
}

#[tokio::test]
async fn guardrail_failure_fails_open_to_retrieval() {
	let mut rows = HashMap::new();

	rows.insert(
		"sac_rulings".to_string(),
		vec![row(1, "Bai inah is not permissible.", 0.8)],
	);

	let service = build_service(test_config(), providers_with(script, StubSearch::new(rows)));
	let response = service
		.process_query(QueryRequest { query: "Is bai inah allowed?".to_string() })
		.await
		.expect("Query failed.");

	// A broken guardrail must degrade to answering, never to refusing.
	assert_eq!(response.intent, Intent::DomainRelevant);
	assert_eq!(response.citations.len(), 1);
	assert!(response.answer.contains("[1]"));
}
