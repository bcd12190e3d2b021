use serde::Deserialize;
use serde_json::{Map, Value};

#[derive(Debug, Deserialize)]
pub struct Config {
	pub service: Service,
	pub storage: Storage,
	pub providers: Providers,
	pub partitions: Vec<Partition>,
	pub retrieval: Retrieval,
	pub panel: Panel,
	pub extraction: Extraction,
}

#[derive(Debug, Deserialize)]
pub struct Service {
	pub http_bind: String,
	pub log_level: String,
}

#[derive(Debug, Deserialize)]
pub struct Storage {
	pub vector: VectorRest,
}

/// Supabase-style REST endpoint exposing one ranked-search RPC per partition table and a
/// plain row listing per table.
#[derive(Debug, Clone, Deserialize)]
pub struct VectorRest {
	pub rest_url: String,
	pub api_key: String,
	pub timeout_ms: u64,
}

#[derive(Debug, Deserialize)]
pub struct Providers {
	pub embedding: EmbeddingProviderConfig,
	pub guardrail: LlmProviderConfig,
	pub synthesis: LlmProviderConfig,
	pub specialist: LlmProviderConfig,
	pub aggregator: LlmProviderConfig,
}

#[derive(Debug, Deserialize)]
pub struct EmbeddingProviderConfig {
	pub provider_id: String,
	pub api_base: String,
	pub api_key: String,
	pub path: String,
	pub model: String,
	pub dimensions: u32,
	#[serde(default = "default_max_embed_chars")]
	pub max_input_chars: u32,
	pub timeout_ms: u64,
	pub default_headers: Map<String, Value>,
}

#[derive(Debug, Deserialize)]
pub struct LlmProviderConfig {
	pub provider_id: String,
	pub api_base: String,
	pub api_key: String,
	pub path: String,
	pub model: String,
	pub temperature: f32,
	pub max_tokens: u32,
	/// Optional chat-completions response format, e.g. "json_object".
	pub response_format: Option<String>,
	pub timeout_ms: u64,
	pub default_headers: Map<String, Value>,
}

/// One topic-scoped knowledge partition. Higher `authority_rank` wins when sources
/// conflict; the same table drives both ranking and the synthesis prompt.
#[derive(Debug, Clone, Deserialize)]
pub struct Partition {
	pub id: String,
	pub table: String,
	pub display_name: String,
	pub authority_rank: u32,
}

#[derive(Debug, Deserialize)]
pub struct Retrieval {
	pub match_count: u32,
	pub match_threshold: f32,
	pub context_budget: u32,
}

#[derive(Debug, Deserialize)]
pub struct Panel {
	pub specialists: Vec<Specialist>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Specialist {
	pub id: String,
	pub display_name: String,
	pub partitions: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Extraction {
	pub webhook_url: String,
	pub timeout_ms: u64,
}

fn default_max_embed_chars() -> u32 {
	8_000
}
