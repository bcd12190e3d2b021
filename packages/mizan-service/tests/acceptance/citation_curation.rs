use std::collections::HashMap;

use color_eyre::eyre::eyre;
use serde_json::Value;

use mizan_config::LlmProviderConfig;
use mizan_domain::intent::Intent;
use mizan_service::{Error, QueryRequest};

use super::{StubSearch, build_service, providers_with, row, test_config};

fn script(cfg: &LlmProviderConfig, _messages: &[Value]) -> color_eyre::Result<String> {
	match cfg.model.as_str() {
		"guardrail-model" => Ok("RELEVANT".to_string()),
		"synthesis-model" => Ok("Tawarruq is permissible subject to conditions [1].".to_string()),
		model => Err(eyre!("unexpected completion call for {model}")),
	}
}

#[tokio::test]
async fn citations_respect_the_budget_and_authority_order() {
	let mut rows = HashMap::new();

	rows.insert(
		"sac_rulings".to_string(),
		vec![row(1, "Tawarruq is permissible subject to conditions.", 0.42)],
	);
	rows.insert(
		"scholarly_works".to_string(),
		(0..12)
			.map(|i| row(100 + i, &format!("Scholarly essay number {i} on tawarruq."), 0.95))
			.collect(),
	);

	let service = build_service(test_config(), providers_with(script, StubSearch::new(rows)));
	let response = service
		.process_query(QueryRequest { query: "Is tawarruq permissible?".to_string() })
		.await
		.expect("Query failed.");

	assert_eq!(response.intent, Intent::DomainRelevant);
	assert_eq!(response.citations.len(), 10);
	assert_eq!(
		response.citations.iter().map(|citation| citation.index).collect::<Vec<_>>(),
		(1..=10).collect::<Vec<_>>()
	);
	// The statutory ruling outranks every scholarly passage despite its lower similarity.
	assert_eq!(response.citations[0].partition_id, "sac_rulings");
	assert!(response.citations[1..].iter().all(|c| c.partition_id == "scholarly_works"));
	assert!(response.confidence > 0.0);
	assert!(response.answer.contains("[1]"));
}

#[tokio::test]
async fn blank_queries_are_rejected() {
	let service = build_service(test_config(), providers_with(script, StubSearch::empty()));
	let outcome = service.process_query(QueryRequest { query: "   ".to_string() }).await;

	assert!(matches!(outcome, Err(Error::InvalidRequest { .. })));
}
