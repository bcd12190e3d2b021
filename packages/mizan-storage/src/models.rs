use serde::Deserialize;
use serde_json::Value;

/// One row returned by a partition search. `similarity` is absent from plain listings
/// and defaults to zero there.
#[derive(Debug, Clone, Deserialize)]
pub struct PassageRow {
	pub id: i64,
	pub content: String,
	#[serde(default)]
	pub metadata: Value,
	#[serde(default)]
	pub similarity: f32,
}
