use std::{collections::HashMap, sync::Arc};

use serde_json::Value;
use tokio::task::JoinSet;
use tracing::warn;

use mizan_config::Config;
use mizan_domain::partition::PartitionInfo;
use mizan_storage::models::PassageRow;

use crate::{MizanService, SearchProvider, trace::Trace};

/// A passage pulled from one knowledge partition for the current request. Never
/// persisted; owned by the request that retrieved it.
#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct RetrievedPassage {
	pub partition_id: String,
	pub content: String,
	pub metadata: Value,
	pub similarity: f32,
}

impl MizanService {
	/// Searches a single partition. A failed ranked search degrades to a plain listing,
	/// and a failed listing degrades to "no evidence found" — this method never errors,
	/// because one partition being down must not fail the batch.
	pub async fn search_partition(&self, partition_id: &str, vector: &[f32]) -> Vec<RetrievedPassage> {
		let Some(partition) = self.registry.get(partition_id) else {
			warn!(partition_id, "Skipping search for unknown partition.");

			return Vec::new();
		};

		search_one(
			self.cfg.clone(),
			self.providers.search.clone(),
			partition.clone(),
			Arc::new(vector.to_vec()),
		)
		.await
	}

	/// Scatter-gather over the given partitions. Every branch settles (success or
	/// handled failure) before this returns; failed partitions contribute empty lists.
	pub(crate) async fn search_all(
		&self,
		partition_ids: &[String],
		vector: &[f32],
		trace: &Trace,
	) -> HashMap<String, Vec<RetrievedPassage>> {
		let vector = Arc::new(vector.to_vec());
		let mut tasks = JoinSet::new();
		let mut open_steps = Vec::new();

		for id in partition_ids {
			let Some(partition) = self.registry.get(id) else {
				warn!(partition_id = id.as_str(), "Skipping search for unknown partition.");

				continue;
			};
			let step = trace
				.begin("knowledge_gateway", &format!("Searching {}", partition.display_name));
			let cfg = self.cfg.clone();
			let search = self.providers.search.clone();
			let partition = partition.clone();
			let vector = vector.clone();

			open_steps.push(step);
			tasks.spawn(async move {
				let partition_id = partition.id.clone();
				let passages = search_one(cfg, search, partition, vector).await;

				(step, partition_id, passages)
			});
		}

		let mut results: HashMap<String, Vec<RetrievedPassage>> = HashMap::new();

		while let Some(joined) = tasks.join_next().await {
			let Ok((step, partition_id, passages)) = joined else {
				warn!("Partition search task panicked; treating as no evidence.");

				continue;
			};

			open_steps.retain(|open| *open != step);
			trace.complete(step, Some(format!("{} passages", passages.len())));
			results.insert(partition_id, passages);
		}

		// A panicked branch never reported back; its step must still reach a terminal
		// status.
		for step in open_steps {
			trace.fail(step, "Partition search task panicked.".to_string());
		}

		results
	}
}

pub(crate) async fn search_one(
	cfg: Arc<Config>,
	search: Arc<dyn SearchProvider>,
	partition: PartitionInfo,
	vector: Arc<Vec<f32>>,
) -> Vec<RetrievedPassage> {
	let vector_cfg = &cfg.storage.vector;
	let retrieval = &cfg.retrieval;

	match search
		.ranked_search(
			vector_cfg,
			&partition.table,
			&vector,
			retrieval.match_count,
			retrieval.match_threshold,
		)
		.await
	{
		Ok(rows) => rows.into_iter().map(|row| passage_from_row(&partition.id, row)).collect(),
		Err(err) => {
			warn!(
				partition_id = partition.id.as_str(),
				error = %err,
				"Ranked search failed; falling back to plain listing."
			);

			match search.plain_listing(vector_cfg, &partition.table, retrieval.match_count).await {
				Ok(rows) =>
					rows.into_iter().map(|row| passage_from_row(&partition.id, row)).collect(),
				Err(err) => {
					warn!(
						partition_id = partition.id.as_str(),
						error = %err,
						"Plain listing failed; partition contributes no evidence."
					);

					Vec::new()
				},
			}
		},
	}
}

fn passage_from_row(partition_id: &str, row: PassageRow) -> RetrievedPassage {
	RetrievedPassage {
		partition_id: partition_id.to_string(),
		content: row.content,
		metadata: row.metadata,
		similarity: row.similarity.clamp(0.0, 1.0),
	}
}
