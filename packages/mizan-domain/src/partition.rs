use std::collections::HashMap;

/// Immutable view over the configured knowledge partitions, ordered by descending
/// authority rank. Both the relevance ranker and the synthesis prompt builder read from
/// this one table, so the ranking rule and the prompt wording cannot drift apart.
#[derive(Debug, Clone)]
pub struct PartitionRegistry {
	ordered: Vec<PartitionInfo>,
	by_id: HashMap<String, usize>,
}

#[derive(Debug, Clone)]
pub struct PartitionInfo {
	pub id: String,
	pub table: String,
	pub display_name: String,
	pub authority_rank: u32,
}

impl PartitionRegistry {
	pub fn new(partitions: &[mizan_config::Partition]) -> Self {
		let mut ordered = partitions
			.iter()
			.map(|p| PartitionInfo {
				id: p.id.clone(),
				table: p.table.clone(),
				display_name: p.display_name.clone(),
				authority_rank: p.authority_rank,
			})
			.collect::<Vec<_>>();

		// Stable, so equal ranks keep their configured order.
		ordered.sort_by(|a, b| b.authority_rank.cmp(&a.authority_rank));

		let by_id =
			ordered.iter().enumerate().map(|(index, p)| (p.id.clone(), index)).collect();

		Self { ordered, by_id }
	}

	pub fn get(&self, id: &str) -> Option<&PartitionInfo> {
		self.by_id.get(id).map(|index| &self.ordered[*index])
	}

	pub fn authority_rank(&self, id: &str) -> u32 {
		self.get(id).map(|p| p.authority_rank).unwrap_or(0)
	}

	pub fn display_name<'a>(&'a self, id: &'a str) -> &'a str {
		self.get(id).map(|p| p.display_name.as_str()).unwrap_or(id)
	}

	/// All partitions, most authoritative first.
	pub fn ordered(&self) -> &[PartitionInfo] {
		&self.ordered
	}

	pub fn len(&self) -> usize {
		self.ordered.len()
	}

	pub fn is_empty(&self) -> bool {
		self.ordered.is_empty()
	}

	/// The verbatim priority instruction embedded in synthesis prompts. One numbered
	/// line per partition, most authoritative first.
	pub fn priority_instruction(&self) -> String {
		let mut out = String::new();

		for (index, partition) in self.ordered.iter().enumerate() {
			out.push_str(&format!(
				"{}. {} (authority {})\n",
				index + 1,
				partition.display_name,
				partition.authority_rank
			));
		}

		out
	}
}
