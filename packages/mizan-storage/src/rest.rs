use std::time::Duration;

use reqwest::{Client, header::HeaderMap};
use serde_json::Value;

use crate::{Result, models::PassageRow};

/// Thin client for a Supabase-style REST endpoint. Each partition table exposes a
/// `match_<table>` RPC for ranked similarity search; the plain table listing is the
/// degraded path when the RPC is unavailable.
pub struct RestStore {
	cfg: mizan_config::VectorRest,
}

impl RestStore {
	pub fn new(cfg: &mizan_config::VectorRest) -> Self {
		Self { cfg: cfg.clone() }
	}

	pub async fn ranked_search(
		&self,
		table: &str,
		vector: &[f32],
		match_count: u32,
		match_threshold: f32,
	) -> Result<Vec<PassageRow>> {
		let client = self.client()?;
		let url = format!("{}/rpc/match_{table}", self.cfg.rest_url);
		let body = serde_json::json!({
			"query_embedding": vector,
			"match_count": match_count,
			"match_threshold": match_threshold,
		});
		let res = client.post(url).headers(self.headers()?).json(&body).send().await?;
		let json: Value = res.error_for_status()?.json().await?;

		parse_rows(json)
	}

	/// Unranked "first k rows" fallback. Rows come back without similarity scores.
	pub async fn plain_listing(&self, table: &str, limit: u32) -> Result<Vec<PassageRow>> {
		let client = self.client()?;
		let url = format!("{}/{table}", self.cfg.rest_url);
		let res = client
			.get(url)
			.headers(self.headers()?)
			.query(&[("select", "id,content,metadata"), ("limit", &limit.to_string())])
			.send()
			.await?;
		let json: Value = res.error_for_status()?.json().await?;

		parse_rows(json)
	}

	fn client(&self) -> Result<Client> {
		Ok(Client::builder().timeout(Duration::from_millis(self.cfg.timeout_ms)).build()?)
	}

	fn headers(&self) -> Result<HeaderMap> {
		let mut headers = HeaderMap::new();

		headers.insert(
			"apikey",
			self.cfg.api_key.parse().map_err(|_| crate::Error::InvalidResponse {
				message: "API key is not a valid header value.".to_string(),
			})?,
		);
		headers.insert(
			reqwest::header::AUTHORIZATION,
			format!("Bearer {}", self.cfg.api_key).parse().map_err(|_| {
				crate::Error::InvalidResponse {
					message: "API key is not a valid header value.".to_string(),
				}
			})?,
		);

		Ok(headers)
	}
}

fn parse_rows(json: Value) -> Result<Vec<PassageRow>> {
	let Value::Array(items) = json else {
		return Err(crate::Error::InvalidResponse {
			message: "Search response is not a JSON array.".to_string(),
		});
	};
	let mut rows = Vec::with_capacity(items.len());

	for item in items {
		rows.push(serde_json::from_value::<PassageRow>(item)?);
	}

	Ok(rows)
}
