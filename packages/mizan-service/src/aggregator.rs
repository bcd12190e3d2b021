use std::collections::HashMap;

use serde_json::Value;
use tracing::warn;

use mizan_domain::{
	structured,
	verdict::{self, Classification, ConsensusLevel, RiskLevel},
};

use crate::{CompletionProvider, MizanService, panel::SpecialistVerdict, trace::Trace};

/// One merged issue, annotated with every specialist that raised it.
#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct AnnotatedIssue {
	pub description: String,
	pub detected_by: Vec<String>,
}

/// The panel's final word on a document. The classification, consensus level, and risk
/// level are always derived deterministically from the specialist votes; the narrative
/// fields come from the aggregator model when it cooperates and from templated text
/// when it does not.
#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct AggregatedVerdict {
	pub classification: Classification,
	/// 0-100, mean of the specialist confidences.
	pub confidence: f32,
	pub risk_level: RiskLevel,
	pub consensus_level: ConsensusLevel,
	pub consensus_narrative: String,
	pub issues: Vec<AnnotatedIssue>,
	pub strengths: Vec<String>,
	pub recommendations: Vec<String>,
	pub final_verdict: String,
	pub suggested_structures: Vec<String>,
	pub next_steps: Vec<String>,
	pub processing_time_seconds: f64,
	pub agents_consulted: Vec<String>,
}

impl MizanService {
	/// Folds the specialist verdicts into one aggregated verdict. The vote outcome is
	/// never delegated to a model; only the prose around it is.
	pub(crate) async fn aggregate(
		&self,
		verdicts: &[SpecialistVerdict],
		trace: &Trace,
	) -> AggregatedVerdict {
		let step = trace.begin("consensus_aggregator", "Aggregating specialist verdicts");
		let mut aggregated = deterministic_aggregate(verdicts);
		let messages = vec![
			serde_json::json!({ "role": "system", "content": AGGREGATOR_SYSTEM_PROMPT }),
			serde_json::json!({
				"role": "user",
				"content": aggregator_user_prompt(verdicts, &aggregated),
			}),
		];

		match self.providers.completion.complete(&self.cfg.providers.aggregator, &messages).await {
			Ok(reply) => match structured::extract_json(&reply) {
				Some(payload) => {
					enrich_from_json(&mut aggregated, &payload);
					trace.complete(
						step,
						Some(format!(
							"{} / {}",
							aggregated.classification.as_str(),
							aggregated.consensus_level.as_str()
						)),
					);
				},
				None => {
					warn!("Aggregator reply carried no JSON; keeping deterministic summary.");
					trace.complete(step, Some("deterministic fallback".to_string()));
				},
			},
			Err(err) => {
				warn!(error = %err, "Aggregator call failed; keeping deterministic summary.");
				trace.fail(step, err.to_string());
			},
		}

		aggregated
	}
}

const AGGREGATOR_SYSTEM_PROMPT: &str = "\
You are the chief reviewer of a Shariah compliance panel. You receive the structured \
verdicts of several specialist agents on one document. Write the panel's consolidated \
report as a JSON object with exactly these keys: \"consensus_narrative\" (string \
explaining where the specialists agree and disagree), \"final_verdict\" (string, the \
panel's bottom line in two or three sentences), \"strengths\" (array of strings), \
\"recommendations\" (array of strings), \"suggested_structures\" (array of \
Shariah-compliant contract structures that would resolve the issues), \"next_steps\" \
(array of strings). The classification, consensus level, and risk level have already \
been decided by specialist vote and are included below for context; keep your narrative \
consistent with them rather than emitting your own classification.";

fn aggregator_user_prompt(verdicts: &[SpecialistVerdict], aggregated: &AggregatedVerdict) -> String {
	// The model sees exactly what aggregation saw, plus the vote it must not contradict.
	format!(
		"Specialist verdicts:\n{}\n\nPanel vote (already decided): {} at {:.0}% mean \
confidence, {}, {} risk.",
		serde_json::to_string_pretty(verdicts).unwrap_or_else(|_| "[]".to_string()),
		aggregated.classification.as_str(),
		aggregated.confidence,
		aggregated.consensus_level.as_str(),
		aggregated.risk_level.as_str(),
	)
}

/// The no-model baseline: vote, average, merge. Always computed; the model path only
/// rewrites the narrative fields on top of it.
fn deterministic_aggregate(verdicts: &[SpecialistVerdict]) -> AggregatedVerdict {
	let classifications =
		verdicts.iter().map(|verdict| verdict.classification).collect::<Vec<_>>();
	let (classification, consensus_level) = verdict::majority_vote(&classifications);
	let confidence = if verdicts.is_empty() {
		0.0
	} else {
		verdicts.iter().map(|verdict| verdict.confidence).sum::<f32>() / verdicts.len() as f32
	};
	let risk_level = verdict::risk_from_confidence(confidence);
	let issues = merge_issues(verdicts);
	let strengths = merge_strings(verdicts, |verdict| &verdict.compliant_aspects);
	let recommendations = merge_strings(verdicts, |verdict| &verdict.recommendations);
	let agents_consulted =
		verdicts.iter().map(|verdict| verdict.display_name.clone()).collect::<Vec<_>>();
	let consensus_narrative = narrative(verdicts, classification, consensus_level);
	let final_verdict = format!(
		"The panel finds the document {} with {:.0}% confidence ({}).",
		classification.as_str().to_lowercase(),
		confidence,
		consensus_level.as_str().to_lowercase(),
	);

	AggregatedVerdict {
		classification,
		confidence,
		risk_level,
		consensus_level,
		consensus_narrative,
		issues,
		strengths,
		recommendations,
		final_verdict,
		suggested_structures: Vec::new(),
		next_steps: Vec::new(),
		processing_time_seconds: 0.0,
		agents_consulted,
	}
}

/// Takes the model's prose where present; everything absent keeps the deterministic
/// value. The vote-derived fields are never overwritten.
fn enrich_from_json(aggregated: &mut AggregatedVerdict, payload: &Value) {
	if let Some(narrative) = payload.get("consensus_narrative").and_then(Value::as_str) {
		aggregated.consensus_narrative = narrative.to_string();
	}
	if let Some(final_verdict) = payload.get("final_verdict").and_then(Value::as_str) {
		aggregated.final_verdict = final_verdict.to_string();
	}
	if let Some(strengths) = string_array(payload, "strengths") {
		aggregated.strengths = strengths;
	}
	if let Some(recommendations) = string_array(payload, "recommendations") {
		aggregated.recommendations = recommendations;
	}
	if let Some(structures) = string_array(payload, "suggested_structures") {
		aggregated.suggested_structures = structures;
	}
	if let Some(next_steps) = string_array(payload, "next_steps") {
		aggregated.next_steps = next_steps;
	}
}

/// Merges the specialists' issue lists, deduplicating on normalized text and recording
/// every agent that raised each issue.
fn merge_issues(verdicts: &[SpecialistVerdict]) -> Vec<AnnotatedIssue> {
	let mut order = Vec::new();
	let mut by_key: HashMap<String, AnnotatedIssue> = HashMap::new();

	for verdict in verdicts {
		for issue in &verdict.issues {
			let key = normalize(issue);

			if key.is_empty() {
				continue;
			}

			match by_key.get_mut(&key) {
				Some(existing) =>
					if !existing.detected_by.contains(&verdict.display_name) {
						existing.detected_by.push(verdict.display_name.clone());
					},
				None => {
					order.push(key.clone());
					by_key.insert(key, AnnotatedIssue {
						description: issue.trim().to_string(),
						detected_by: vec![verdict.display_name.clone()],
					});
				},
			}
		}
	}

	order.into_iter().filter_map(|key| by_key.remove(&key)).collect()
}

fn merge_strings(
	verdicts: &[SpecialistVerdict],
	field: impl Fn(&SpecialistVerdict) -> &Vec<String>,
) -> Vec<String> {
	let mut seen = std::collections::HashSet::new();
	let mut merged = Vec::new();

	for verdict in verdicts {
		for item in field(verdict) {
			if seen.insert(normalize(item)) {
				merged.push(item.trim().to_string());
			}
		}
	}

	merged
}

fn narrative(
	verdicts: &[SpecialistVerdict],
	classification: Classification,
	consensus_level: ConsensusLevel,
) -> String {
	if verdicts.is_empty() {
		return "No specialist verdicts were available for aggregation.".to_string();
	}

	let positions = verdicts
		.iter()
		.map(|verdict| {
			format!("{}: {}", verdict.display_name, verdict.classification.as_str())
		})
		.collect::<Vec<_>>()
		.join("; ");

	match consensus_level {
		ConsensusLevel::AllAgree => format!(
			"All specialists classified the document as {} ({positions}).",
			classification.as_str()
		),
		ConsensusLevel::MajorityAgree => format!(
			"A majority of specialists classified the document as {} ({positions}).",
			classification.as_str()
		),
		ConsensusLevel::SplitOpinion => format!(
			"The specialists were split; the most conservative classification, {}, was \
adopted ({positions}).",
			classification.as_str()
		),
	}
}

fn string_array(payload: &Value, key: &str) -> Option<Vec<String>> {
	payload.get(key).and_then(Value::as_array).map(|items| {
		items.iter().filter_map(Value::as_str).map(str::to_string).collect()
	})
}

fn normalize(text: &str) -> String {
	text.split_whitespace().collect::<Vec<_>>().join(" ").to_lowercase()
}
