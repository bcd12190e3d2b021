use std::fmt::Write as _;

use mizan_domain::partition::PartitionRegistry;

use crate::{CompletionProvider, MizanService, ranker, ranker::Citation, trace::Trace};

/// Shown to the user whenever the synthesis call itself fails. The underlying error
/// stays in the trace, never in the answer.
pub const SYNTHESIS_FALLBACK: &str = "I apologize, but I was unable to compose an answer \
from the retrieved sources just now. Please try asking again in a moment.";

impl MizanService {
	/// Drafts the cited answer from the curated citation list. Citation indices were
	/// fixed by the ranker before this is called; the prompt refers to them verbatim.
	pub(crate) async fn synthesize(
		&self,
		query: &str,
		citations: &[Citation],
		trace: &Trace,
	) -> (String, f32) {
		let step = trace.begin("synthesis_agent", "Drafting cited answer");
		let confidence = ranker::confidence(citations);
		let messages = vec![
			serde_json::json!({
				"role": "system",
				"content": system_prompt(&self.registry),
			}),
			serde_json::json!({
				"role": "user",
				"content": user_prompt(query, citations),
			}),
		];

		match self.providers.completion.complete(&self.cfg.providers.synthesis, &messages).await {
			Ok(answer) => {
				trace.complete(step, Some(format!("{} citations", citations.len())));

				(answer, confidence)
			},
			Err(err) => {
				trace.fail(step, err.to_string());

				(SYNTHESIS_FALLBACK.to_string(), confidence)
			},
		}
	}
}

pub(crate) fn system_prompt(registry: &PartitionRegistry) -> String {
	format!(
		"You are a Shariah compliance assistant for Islamic finance. Answer strictly from \
the numbered sources provided; never draw on outside knowledge.\n\
Rules:\n\
- Cite every claim inline with the bracketed source number, e.g. [1] or [2][3].\n\
- When sources conflict, prefer the source higher in this authority order:\n{}\
- If the sources do not contain enough evidence to answer, say so explicitly.\n\
- Structure long answers with markdown headings.\n\
- When presenting tabular data, emit a valid markdown table including the header \
separator row.",
		registry.priority_instruction()
	)
}

pub(crate) fn user_prompt(query: &str, citations: &[Citation]) -> String {
	let mut prompt = String::from("Sources:\n");

	for citation in citations {
		let _ = write!(prompt, "[{}] {}", citation.index, citation.source_name);

		if let Some(title) = &citation.title {
			let _ = write!(prompt, " - {title}");
		}
		if let Some(page) = citation.page {
			let _ = write!(prompt, " (page {page})");
		}

		let _ = writeln!(prompt, "\n{}\n", citation.content);
	}

	if citations.is_empty() {
		prompt.push_str("(no sources retrieved)\n");
	}

	let _ = write!(prompt, "Question: {query}");

	prompt
}
