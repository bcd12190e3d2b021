use std::sync::atomic::Ordering;

use color_eyre::eyre::eyre;
use serde_json::Value;

use mizan_config::LlmProviderConfig;
use mizan_domain::intent::Intent;
use mizan_service::QueryRequest;

use super::{StubSearch, build_service, providers_with, test_config};

fn script(cfg: &LlmProviderConfig, _messages: &[Value]) -> color_eyre::Result<String> {
	match cfg.model.as_str() {
		"guardrail-model" => Ok("OFF_TOPIC".to_string()),
		"synthesis-model" =>
			Ok("I can only help with Islamic finance compliance topics.".to_string()),
		model => Err(eyre!("unexpected completion call for {model}")),
	}
}

#[tokio::test]
async fn off_topic_queries_skip_retrieval_entirely() {
	let search = StubSearch::empty();
	let calls = search.calls.clone();
	let service = build_service(test_config(), providers_with(script, search));
	let response = service
		.process_query(QueryRequest { query: "What is the best pizza topping?".to_string() })
		.await
		.expect("Query failed.");

	assert_eq!(response.intent, Intent::OffTopic);
	assert!(response.citations.is_empty());
	assert_eq!(response.confidence, 0.0);
	assert!(response.answer.contains("Islamic finance"));
	// No partition was searched and no embedding was spent on the rejected query.
	assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn greetings_are_settled_without_the_guardrail() {
	fn greeting_script(
		cfg: &LlmProviderConfig,
		_messages: &[Value],
	) -> color_eyre::Result<String> {
		match cfg.model.as_str() {
			"synthesis-model" => Ok("Wa alaikum assalam! How can I help?".to_string()),
			model => Err(eyre!("unexpected completion call for {model}")),
		}
	}

	let search = StubSearch::empty();
	let calls = search.calls.clone();
	let service = build_service(test_config(), providers_with(greeting_script, search));
	let response = service
		.process_query(QueryRequest { query: "Assalamualaikum!".to_string() })
		.await
		.expect("Query failed.");

	assert_eq!(response.intent, Intent::Greeting);
	assert!(response.citations.is_empty());
	assert_eq!(calls.load(Ordering::SeqCst), 0);
}
