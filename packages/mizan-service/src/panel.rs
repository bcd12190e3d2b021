use std::sync::Arc;

use serde_json::Value;
use tokio::task::JoinSet;
use tracing::warn;

use mizan_config::{Config, Specialist};
use mizan_domain::{
	partition::PartitionRegistry,
	structured,
	verdict::Classification,
};

use crate::{
	CompletionProvider, EmbeddingProvider, MizanService, Providers, SearchProvider,
	gateway::search_one,
	ranker,
	trace::Trace,
};

/// Document text is embedded in the specialist prompt; anything beyond this is cut so
/// one oversized upload cannot blow the token budget.
const MAX_DOCUMENT_PROMPT_CHARS: usize = 12_000;

/// One specialist's structured analysis of a document. A verdict exists for every
/// configured specialist on every request, real or fallback; aggregation never sees an
/// absent agent.
#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct SpecialistVerdict {
	pub specialist_id: String,
	pub display_name: String,
	pub classification: Classification,
	/// 0-100.
	pub confidence: f32,
	pub findings: Vec<String>,
	pub issues: Vec<String>,
	pub compliant_aspects: Vec<String>,
	pub recommendations: Vec<String>,
	pub summary: String,
}

impl MizanService {
	/// Runs every configured specialist concurrently against the same document text,
	/// each with context retrieved from its own partition subset. Branches settle
	/// independently; a failed specialist contributes a synthetic low-confidence
	/// verdict instead of aborting the panel.
	pub(crate) async fn run_panel(
		&self,
		document_text: &str,
		trace: &Trace,
	) -> Vec<SpecialistVerdict> {
		let embed_step = trace.begin("specialist_panel", "Embedding document for retrieval");
		let texts = vec![document_text.to_string()];
		let vector = match self
			.providers
			.embedding
			.embed(&self.cfg.providers.embedding, &texts)
			.await
		{
			Ok(vectors) if !vectors.is_empty() => {
				trace.complete(embed_step, None);

				Some(Arc::new(vectors.into_iter().next().unwrap_or_default()))
			},
			Ok(_) => {
				trace.fail(embed_step, "Embedding provider returned no vectors.".to_string());

				None
			},
			Err(err) => {
				// Specialists still run; they just analyze without retrieved context.
				trace.fail(embed_step, err.to_string());

				None
			},
		};
		let document = Arc::new(document_text.to_string());
		let mut tasks = JoinSet::new();
		let mut open_steps = Vec::new();

		for (index, specialist) in self.cfg.panel.specialists.iter().enumerate() {
			let step =
				trace.begin(&specialist.id, &format!("{} analysis", specialist.display_name));
			let cfg = self.cfg.clone();
			let registry = self.registry.clone();
			let providers = self.providers.clone();
			let specialist = specialist.clone();
			let vector = vector.clone();
			let document = document.clone();

			open_steps.push(step);
			tasks.spawn(async move {
				let (verdict, error) =
					run_specialist(cfg, registry, providers, specialist, vector, document).await;

				(index, step, verdict, error)
			});
		}

		let mut verdicts: Vec<Option<SpecialistVerdict>> =
			vec![None; self.cfg.panel.specialists.len()];

		while let Some(joined) = tasks.join_next().await {
			let Ok((index, step, verdict, error)) = joined else {
				warn!("Specialist task panicked; leaving fallback verdict in place.");

				continue;
			};

			open_steps.retain(|open| *open != step);
			match error {
				Some(detail) => trace.fail(step, detail),
				None => trace.complete(
					step,
					Some(format!(
						"{} ({:.0}%)",
						verdict.classification.as_str(),
						verdict.confidence
					)),
				),
			}

			verdicts[index] = Some(verdict);
		}

		// Steps opened for panicked branches must still reach a terminal status.
		for step in open_steps {
			trace.fail(step, "Specialist task panicked.".to_string());
		}

		// A panicked branch still yields its error fallback here.
		self.cfg
			.panel
			.specialists
			.iter()
			.zip(verdicts)
			.map(|(specialist, verdict)| {
				verdict.unwrap_or_else(|| {
					error_fallback_verdict(specialist, "Specialist task did not settle.")
				})
			})
			.collect()
	}
}

async fn run_specialist(
	cfg: Arc<Config>,
	registry: Arc<PartitionRegistry>,
	providers: Providers,
	specialist: Specialist,
	vector: Option<Arc<Vec<f32>>>,
	document: Arc<String>,
) -> (SpecialistVerdict, Option<String>) {
	let context = match vector {
		Some(vector) =>
			retrieve_context(&cfg, &registry, &providers.search, &specialist, &vector).await,
		None => String::new(),
	};
	let messages = vec![
		serde_json::json!({ "role": "system", "content": specialist_system_prompt(&specialist) }),
		serde_json::json!({
			"role": "user",
			"content": specialist_user_prompt(&context, &document),
		}),
	];

	match providers.completion.complete(&cfg.providers.specialist, &messages).await {
		Ok(reply) => (parse_specialist_reply(&specialist, &reply), None),
		Err(err) => {
			warn!(
				specialist_id = specialist.id.as_str(),
				error = %err,
				"Specialist analysis failed; substituting fallback verdict."
			);

			(error_fallback_verdict(&specialist, &err.to_string()), Some(err.to_string()))
		},
	}
}

async fn retrieve_context(
	cfg: &Arc<Config>,
	registry: &Arc<PartitionRegistry>,
	search: &Arc<dyn SearchProvider>,
	specialist: &Specialist,
	vector: &Arc<Vec<f32>>,
) -> String {
	let mut results = std::collections::HashMap::new();

	// Sequential within one specialist; the panel itself is the concurrent axis.
	for partition_id in &specialist.partitions {
		let Some(partition) = registry.get(partition_id) else {
			continue;
		};
		let passages =
			search_one(cfg.clone(), search.clone(), partition.clone(), vector.clone()).await;

		results.insert(partition_id.clone(), passages);
	}

	let citations = ranker::rank(registry, results, cfg.retrieval.context_budget as usize);
	let mut context = String::new();

	for citation in &citations {
		context.push_str(&format!("[{}] {}\n{}\n\n", citation.index, citation.source_name, citation.content));
	}

	context
}

fn specialist_system_prompt(specialist: &Specialist) -> String {
	format!(
		"You are a {} specialist auditing a document for Shariah compliance. Base your \
analysis on the reference passages provided and the document text. Respond with a JSON \
object using exactly these keys: \"classification\" (one of \"Compliant\", \"Partially \
Compliant\", \"Non-Compliant\"), \"confidence\" (0-100), \"findings\" (array of \
strings), \"issues\" (array of strings), \"compliant_aspects\" (array of strings), \
\"recommendations\" (array of strings), \"summary\" (string).",
		specialist.display_name
	)
}

fn specialist_user_prompt(context: &str, document: &str) -> String {
	let truncated = match document.char_indices().nth(MAX_DOCUMENT_PROMPT_CHARS) {
		Some((offset, _)) => &document[..offset],
		None => document,
	};
	let context_block =
		if context.is_empty() { "(no reference passages retrieved)\n" } else { context };

	format!("Reference passages:\n{context_block}\nDocument under review:\n{truncated}")
}

fn parse_specialist_reply(specialist: &Specialist, reply: &str) -> SpecialistVerdict {
	let Some(payload) = structured::extract_json(reply) else {
		// Unparsable output still carries signal; keep a truncated excerpt and flag the
		// verdict for human judgment.
		return SpecialistVerdict {
			specialist_id: specialist.id.clone(),
			display_name: specialist.display_name.clone(),
			classification: Classification::PartiallyCompliant,
			confidence: 50.0,
			findings: Vec::new(),
			issues: Vec::new(),
			compliant_aspects: Vec::new(),
			recommendations: Vec::new(),
			summary: truncate_chars(reply.trim(), 500),
		};
	};

	verdict_from_json(specialist, &payload)
}

fn verdict_from_json(specialist: &Specialist, payload: &Value) -> SpecialistVerdict {
	let classification = payload
		.get("classification")
		.and_then(Value::as_str)
		.and_then(Classification::parse_lenient)
		.unwrap_or(Classification::PartiallyCompliant);
	let confidence = payload
		.get("confidence")
		.and_then(Value::as_f64)
		.map(|value| value.clamp(0.0, 100.0) as f32)
		.unwrap_or(50.0);

	SpecialistVerdict {
		specialist_id: specialist.id.clone(),
		display_name: specialist.display_name.clone(),
		classification,
		confidence,
		findings: string_array(payload, "findings"),
		issues: string_array(payload, "issues"),
		compliant_aspects: string_array(payload, "compliant_aspects"),
		recommendations: string_array(payload, "recommendations"),
		summary: payload
			.get("summary")
			.and_then(Value::as_str)
			.map(str::to_string)
			.unwrap_or_default(),
	}
}

pub(crate) fn error_fallback_verdict(specialist: &Specialist, detail: &str) -> SpecialistVerdict {
	SpecialistVerdict {
		specialist_id: specialist.id.clone(),
		display_name: specialist.display_name.clone(),
		classification: Classification::PartiallyCompliant,
		confidence: 0.0,
		findings: vec![format!("{} agent error: {detail}", specialist.display_name)],
		issues: Vec::new(),
		compliant_aspects: Vec::new(),
		recommendations: vec![
			"Manual review recommended; this analysis did not complete.".to_string(),
		],
		summary: format!("{} analysis failed and was replaced by a fallback verdict.", specialist.display_name),
	}
}

fn string_array(payload: &Value, key: &str) -> Vec<String> {
	payload
		.get(key)
		.and_then(Value::as_array)
		.map(|items| {
			items.iter().filter_map(Value::as_str).map(str::to_string).collect()
		})
		.unwrap_or_default()
}

fn truncate_chars(text: &str, max_chars: usize) -> String {
	match text.char_indices().nth(max_chars) {
		Some((offset, _)) => text[..offset].to_string(),
		None => text.to_string(),
	}
}
