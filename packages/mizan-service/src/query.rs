use uuid::Uuid;

use mizan_domain::intent::Intent;

use crate::{
	CompletionProvider, EmbeddingProvider, Error, MizanService, Result,
	ranker,
	ranker::Citation,
	synthesis::SYNTHESIS_FALLBACK,
	trace::{AgentStep, Trace},
};

const PERSONA_SYSTEM_PROMPT: &str = "\
You are Mizan, a friendly assistant for Islamic finance compliance questions. Reply \
briefly and warmly, and invite the user to ask about Shariah rulings, Islamic banking \
regulation, or Shariah-compliant contracts. Do not cite sources for small talk.";

const SMALL_TALK_FALLBACK: &str = "Wa alaikum assalam! I am Mizan, an Islamic finance \
compliance assistant. Ask me about Shariah rulings, Islamic banking regulation, or \
Shariah-compliant contract structures.";

const REFUSAL_SYSTEM_PROMPT: &str = "\
The user's question is outside the Islamic finance domain. Politely decline in one or \
two sentences and steer the user toward Islamic finance compliance topics. Do not \
answer the original question.";

const REFUSAL_FALLBACK: &str = "I am sorry, but I can only help with Islamic finance \
and Shariah compliance topics. Please ask me about Shariah rulings, Islamic banking \
regulation, or Shariah-compliant contracts.";

#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct QueryRequest {
	pub query: String,
}

#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct QueryResponse {
	pub trace_id: Uuid,
	pub intent: Intent,
	pub answer: String,
	pub citations: Vec<Citation>,
	/// 0-100, authority-weighted over the cited passages. Zero for answers that cite
	/// nothing (small talk, refusals, failed retrieval).
	pub confidence: f32,
	pub steps: Vec<AgentStep>,
}

impl MizanService {
	/// The conversational pipeline: intent gate, partition fan-out, authority ranking,
	/// cited synthesis. Every failure path below degrades to a usable answer; callers
	/// never see a raw provider error.
	pub async fn process_query(&self, request: QueryRequest) -> Result<QueryResponse> {
		let trace = Trace::new();

		self.process_query_traced(request, &trace).await
	}

	/// Same pipeline with a caller-supplied trace, for live step streaming via
	/// [`Trace::with_subscriber`].
	pub async fn process_query_traced(
		&self,
		request: QueryRequest,
		trace: &Trace,
	) -> Result<QueryResponse> {
		let query = request.query.trim();

		if query.is_empty() {
			return Err(Error::InvalidRequest { message: "Query must be non-empty.".to_string() });
		}

		let trace_id = Uuid::new_v4();
		let intent = self.classify(query, trace).await;
		let (answer, citations, confidence) = match intent {
			Intent::Greeting | Intent::Conversational => {
				self.skip_retrieval(trace, "Small talk bypasses retrieval.");

				(self.direct_reply(query, trace).await, Vec::new(), 0.0)
			},
			Intent::OffTopic => {
				self.skip_retrieval(trace, "Off-topic query bypasses retrieval.");

				let rejected = trace.begin("intent_router", "Rejecting off-topic query");

				trace.fail(rejected, "Query is outside the Islamic finance domain.".to_string());

				(self.refusal_reply(query, trace).await, Vec::new(), 0.0)
			},
			Intent::DomainRelevant => self.answer_from_corpus(query, trace).await,
		};

		Ok(QueryResponse {
			trace_id,
			intent,
			answer,
			citations,
			confidence,
			steps: trace.snapshot(),
		})
	}

	async fn answer_from_corpus(
		&self,
		query: &str,
		trace: &Trace,
	) -> (String, Vec<Citation>, f32) {
		let embed_step = trace.begin("embedding", "Embedding query");
		let texts = vec![query.to_string()];
		let vector = match self
			.providers
			.embedding
			.embed(&self.cfg.providers.embedding, &texts)
			.await
			.map(|mut vectors| if vectors.is_empty() { None } else { Some(vectors.remove(0)) })
		{
			Ok(Some(vector)) => {
				trace.complete(embed_step, None);

				vector
			},
			Ok(None) => {
				trace.fail(embed_step, "Embedding provider returned no vectors.".to_string());

				return (SYNTHESIS_FALLBACK.to_string(), Vec::new(), 0.0);
			},
			Err(err) => {
				trace.fail(embed_step, err.to_string());

				return (SYNTHESIS_FALLBACK.to_string(), Vec::new(), 0.0);
			},
		};
		let partition_ids = self
			.registry
			.ordered()
			.iter()
			.map(|partition| partition.id.clone())
			.collect::<Vec<_>>();
		let results = self.search_all(&partition_ids, &vector, trace).await;
		let rank_step = trace.begin("relevance_ranker", "Ranking and curating citations");
		let citations =
			ranker::rank(&self.registry, results, self.cfg.retrieval.context_budget as usize);

		trace.complete(rank_step, Some(format!("{} citations", citations.len())));

		let (answer, confidence) = self.synthesize(query, &citations, trace).await;

		(answer, citations, confidence)
	}

	async fn direct_reply(&self, query: &str, trace: &Trace) -> String {
		let step = trace.begin("synthesis_agent", "Replying to small talk");
		let messages = vec![
			serde_json::json!({ "role": "system", "content": PERSONA_SYSTEM_PROMPT }),
			serde_json::json!({ "role": "user", "content": query }),
		];

		match self.providers.completion.complete(&self.cfg.providers.synthesis, &messages).await {
			Ok(reply) => {
				trace.complete(step, None);

				reply
			},
			Err(err) => {
				trace.fail(step, err.to_string());

				SMALL_TALK_FALLBACK.to_string()
			},
		}
	}

	async fn refusal_reply(&self, query: &str, trace: &Trace) -> String {
		let step = trace.begin("synthesis_agent", "Composing polite refusal");
		let messages = vec![
			serde_json::json!({ "role": "system", "content": REFUSAL_SYSTEM_PROMPT }),
			serde_json::json!({ "role": "user", "content": query }),
		];

		match self.providers.completion.complete(&self.cfg.providers.synthesis, &messages).await {
			Ok(reply) => {
				trace.complete(step, None);

				reply
			},
			Err(err) => {
				trace.fail(step, err.to_string());

				REFUSAL_FALLBACK.to_string()
			},
		}
	}

	fn skip_retrieval(&self, trace: &Trace, reason: &str) {
		let step = trace.begin("knowledge_gateway", "Searching partitions");

		trace.skip(step, Some(reason.to_string()));
	}
}
