use std::collections::{HashMap, HashSet};

use serde_json::Value;

use mizan_domain::partition::PartitionRegistry;

use crate::gateway::RetrievedPassage;

/// A ranked, indexed reference to a retrieved passage. The 1-based `index` is assigned
/// once, at truncation time, and is the `[n]` marker the synthesized answer cites.
#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct Citation {
	pub index: u32,
	pub partition_id: String,
	pub source_name: String,
	pub authority_rank: u32,
	pub similarity: f32,
	pub content: String,
	pub title: Option<String>,
	pub url: Option<String>,
	pub page: Option<i64>,
	pub section: Option<String>,
}

/// Merges per-partition results into one ordered citation list. Authority rank beats
/// raw similarity: a statute passage at 0.42 outranks a scholarly passage at 0.95.
/// The sort is stable, so equal (authority, similarity) pairs keep their arrival order.
pub fn rank(
	registry: &PartitionRegistry,
	results: HashMap<String, Vec<RetrievedPassage>>,
	context_budget: usize,
) -> Vec<Citation> {
	let mut results = results;
	let mut merged: Vec<RetrievedPassage> = Vec::new();

	// Flatten in registry order so the pre-sort order is deterministic regardless of
	// which partition task settled first.
	for partition in registry.ordered() {
		if let Some(passages) = results.remove(&partition.id) {
			merged.extend(passages);
		}
	}

	merged.sort_by(|a, b| {
		let rank_a = registry.authority_rank(&a.partition_id);
		let rank_b = registry.authority_rank(&b.partition_id);

		rank_b
			.cmp(&rank_a)
			.then_with(|| b.similarity.total_cmp(&a.similarity))
	});

	let mut seen = HashSet::new();
	let mut citations = Vec::new();

	for passage in merged {
		if citations.len() == context_budget {
			break;
		}
		if !seen.insert(content_key(&passage.content)) {
			continue;
		}

		let index = citations.len() as u32 + 1;

		citations.push(citation_from_passage(registry, passage, index));
	}

	citations
}

/// Authority-weighted confidence for a synthesized answer, on a 0-100 scale. Several
/// low-authority, high-similarity passages score lower than fewer high-authority ones.
pub fn confidence(citations: &[Citation]) -> f32 {
	if citations.is_empty() {
		return 0.0;
	}

	let total: f32 = citations
		.iter()
		.map(|citation| citation.similarity * citation.authority_rank as f32 / 100.0)
		.sum();

	(total / citations.len() as f32 * 100.0).clamp(0.0, 100.0)
}

fn citation_from_passage(
	registry: &PartitionRegistry,
	passage: RetrievedPassage,
	index: u32,
) -> Citation {
	let title = metadata_str(&passage.metadata, "title");
	let url = metadata_str(&passage.metadata, "pdf_url")
		.or_else(|| metadata_str(&passage.metadata, "url"));
	let section = metadata_str(&passage.metadata, "section");
	let page = passage.metadata.get("page_number").and_then(Value::as_i64);

	Citation {
		index,
		source_name: registry.display_name(&passage.partition_id).to_string(),
		authority_rank: registry.authority_rank(&passage.partition_id),
		partition_id: passage.partition_id,
		similarity: passage.similarity,
		content: passage.content,
		title,
		url,
		page,
		section,
	}
}

fn metadata_str(metadata: &Value, key: &str) -> Option<String> {
	metadata.get(key).and_then(Value::as_str).map(str::to_string)
}

/// Dedupe key over normalized content: case-folded, whitespace-collapsed, hashed.
fn content_key(content: &str) -> blake3::Hash {
	let normalized =
		content.split_whitespace().collect::<Vec<_>>().join(" ").to_lowercase();

	blake3::hash(normalized.as_bytes())
}
