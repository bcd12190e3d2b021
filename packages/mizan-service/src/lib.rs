pub mod aggregator;
pub mod audit;
pub mod gateway;
pub mod panel;
pub mod query;
pub mod ranker;
pub mod router;
pub mod synthesis;
pub mod time_serde;
pub mod trace;

mod error;

use std::{future::Future, pin::Pin, sync::Arc};

use serde_json::Value;

pub use aggregator::{AggregatedVerdict, AnnotatedIssue};
pub use audit::{AuditRequest, AuditResponse};
pub use error::{Error, Result};
pub use gateway::RetrievedPassage;
pub use panel::SpecialistVerdict;
pub use query::{QueryRequest, QueryResponse};
pub use ranker::Citation;
pub use trace::{AgentStep, StepStatus, Trace};

use mizan_config::{Config, EmbeddingProviderConfig, Extraction, LlmProviderConfig, VectorRest};
use mizan_domain::partition::PartitionRegistry;
use mizan_providers::{completion, embedding, extract};
use mizan_storage::{models::PassageRow, rest::RestStore};

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

pub trait EmbeddingProvider
where
	Self: Send + Sync,
{
	fn embed<'a>(
		&'a self,
		cfg: &'a EmbeddingProviderConfig,
		texts: &'a [String],
	) -> BoxFuture<'a, color_eyre::Result<Vec<Vec<f32>>>>;
}

pub trait CompletionProvider
where
	Self: Send + Sync,
{
	fn complete<'a>(
		&'a self,
		cfg: &'a LlmProviderConfig,
		messages: &'a [Value],
	) -> BoxFuture<'a, color_eyre::Result<String>>;
}

pub trait ExtractionProvider
where
	Self: Send + Sync,
{
	fn extract<'a>(
		&'a self,
		cfg: &'a Extraction,
		file_name: &'a str,
		bytes: Vec<u8>,
		mime_type: &'a str,
	) -> BoxFuture<'a, color_eyre::Result<String>>;
}

pub trait SearchProvider
where
	Self: Send + Sync,
{
	fn ranked_search<'a>(
		&'a self,
		cfg: &'a VectorRest,
		table: &'a str,
		vector: &'a [f32],
		match_count: u32,
		match_threshold: f32,
	) -> BoxFuture<'a, color_eyre::Result<Vec<PassageRow>>>;

	fn plain_listing<'a>(
		&'a self,
		cfg: &'a VectorRest,
		table: &'a str,
		limit: u32,
	) -> BoxFuture<'a, color_eyre::Result<Vec<PassageRow>>>;
}

#[derive(Clone)]
pub struct Providers {
	pub embedding: Arc<dyn EmbeddingProvider>,
	pub completion: Arc<dyn CompletionProvider>,
	pub extraction: Arc<dyn ExtractionProvider>,
	pub search: Arc<dyn SearchProvider>,
}

pub struct MizanService {
	pub cfg: Arc<Config>,
	pub registry: Arc<PartitionRegistry>,
	pub providers: Providers,
}

struct DefaultProviders;

impl EmbeddingProvider for DefaultProviders {
	fn embed<'a>(
		&'a self,
		cfg: &'a EmbeddingProviderConfig,
		texts: &'a [String],
	) -> BoxFuture<'a, color_eyre::Result<Vec<Vec<f32>>>> {
		Box::pin(embedding::embed(cfg, texts))
	}
}

impl CompletionProvider for DefaultProviders {
	fn complete<'a>(
		&'a self,
		cfg: &'a LlmProviderConfig,
		messages: &'a [Value],
	) -> BoxFuture<'a, color_eyre::Result<String>> {
		Box::pin(completion::complete(cfg, messages))
	}
}

impl ExtractionProvider for DefaultProviders {
	fn extract<'a>(
		&'a self,
		cfg: &'a Extraction,
		file_name: &'a str,
		bytes: Vec<u8>,
		mime_type: &'a str,
	) -> BoxFuture<'a, color_eyre::Result<String>> {
		Box::pin(extract::extract_text(cfg, file_name, bytes, mime_type))
	}
}

impl SearchProvider for DefaultProviders {
	fn ranked_search<'a>(
		&'a self,
		cfg: &'a VectorRest,
		table: &'a str,
		vector: &'a [f32],
		match_count: u32,
		match_threshold: f32,
	) -> BoxFuture<'a, color_eyre::Result<Vec<PassageRow>>> {
		Box::pin(async move {
			let store = RestStore::new(cfg);

			Ok(store.ranked_search(table, vector, match_count, match_threshold).await?)
		})
	}

	fn plain_listing<'a>(
		&'a self,
		cfg: &'a VectorRest,
		table: &'a str,
		limit: u32,
	) -> BoxFuture<'a, color_eyre::Result<Vec<PassageRow>>> {
		Box::pin(async move {
			let store = RestStore::new(cfg);

			Ok(store.plain_listing(table, limit).await?)
		})
	}
}

impl Providers {
	pub fn new(
		embedding: Arc<dyn EmbeddingProvider>,
		completion: Arc<dyn CompletionProvider>,
		extraction: Arc<dyn ExtractionProvider>,
		search: Arc<dyn SearchProvider>,
	) -> Self {
		Self { embedding, completion, extraction, search }
	}
}

impl Default for Providers {
	fn default() -> Self {
		let provider = Arc::new(DefaultProviders);

		Self {
			embedding: provider.clone(),
			completion: provider.clone(),
			extraction: provider.clone(),
			search: provider,
		}
	}
}

impl MizanService {
	pub fn new(cfg: Config) -> Self {
		Self::with_providers(cfg, Providers::default())
	}

	pub fn with_providers(cfg: Config, providers: Providers) -> Self {
		let registry = Arc::new(PartitionRegistry::new(&cfg.partitions));

		Self { cfg: Arc::new(cfg), registry, providers }
	}
}
