use tracing::warn;

use mizan_domain::intent::{self, Intent};

use crate::{CompletionProvider, MizanService, trace::Trace};

const GUARDRAIL_SYSTEM_PROMPT: &str = "\
You are a relevance gate for an Islamic finance compliance assistant covering Shariah \
rulings, Islamic banking regulation, takaful, and Shariah-compliant contracts. Decide \
whether the user's question belongs to that domain. Reply with exactly one word: \
RELEVANT or OFF_TOPIC.";

impl MizanService {
	/// Classifies the query before committing to retrieval. Greetings and small talk
	/// are settled by pattern match alone; everything else goes through the guardrail
	/// model. A guardrail failure fails open to DomainRelevant — availability over
	/// strictness.
	pub(crate) async fn classify(&self, query: &str, trace: &Trace) -> Intent {
		let step = trace.begin("intent_router", "Classifying query intent");

		if let Some(small_talk) = intent::match_small_talk(query) {
			trace.complete(step, Some(small_talk.as_str().to_string()));

			return small_talk;
		}

		let messages = vec![
			serde_json::json!({ "role": "system", "content": GUARDRAIL_SYSTEM_PROMPT }),
			serde_json::json!({ "role": "user", "content": query }),
		];

		match self.providers.completion.complete(&self.cfg.providers.guardrail, &messages).await {
			Ok(reply) => match parse_guardrail_reply(&reply) {
				Some(intent) => {
					trace.complete(step, Some(intent.as_str().to_string()));

					intent
				},
				None => {
					warn!(reply = reply.as_str(), "Guardrail reply unrecognized; failing open.");
					trace.complete(step, Some("domain_relevant (fail open)".to_string()));

					Intent::DomainRelevant
				},
			},
			Err(err) => {
				warn!(error = %err, "Guardrail call failed; failing open.");
				trace.complete(step, Some("domain_relevant (fail open)".to_string()));

				Intent::DomainRelevant
			},
		}
	}
}

fn parse_guardrail_reply(reply: &str) -> Option<Intent> {
	let normalized = reply.trim().to_ascii_lowercase();

	if normalized.contains("off_topic")
		|| normalized.contains("off-topic")
		|| normalized.contains("not relevant")
	{
		return Some(Intent::OffTopic);
	}
	if normalized.contains("relevant") {
		return Some(Intent::DomainRelevant);
	}

	None
}
