use std::time::Duration;

use color_eyre::{Result, eyre};
use reqwest::{
	Client,
	multipart::{Form, Part},
};
use serde_json::Value;

/// Sends an uploaded document to the OCR webhook and flattens the per-page payload into
/// plain text. The webhook may wrap its payload in a one-element list.
pub async fn extract_text(
	cfg: &mizan_config::Extraction,
	file_name: &str,
	bytes: Vec<u8>,
	mime_type: &str,
) -> Result<String> {
	let client = Client::builder().timeout(Duration::from_millis(cfg.timeout_ms)).build()?;
	let part = Part::bytes(bytes).file_name(file_name.to_string()).mime_str(mime_type)?;
	let form = Form::new().part("data", part);
	let res = client.post(&cfg.webhook_url).multipart(form).send().await?;
	let json: Value = res.error_for_status()?.json().await?;

	parse_extraction_response(json)
}

fn parse_extraction_response(json: Value) -> Result<String> {
	let payload = match &json {
		Value::Array(items) =>
			items.first().ok_or_else(|| eyre::eyre!("Extraction response is an empty list."))?,
		other => other,
	};
	let pages = payload
		.get("pages")
		.and_then(|v| v.as_array())
		.ok_or_else(|| eyre::eyre!("Extraction response is missing pages array."))?;
	let mut text = String::new();

	for page in pages {
		let Some(content) = page.get("content").and_then(|v| v.as_str()) else {
			continue;
		};

		if !text.is_empty() {
			text.push_str("\n\n");
		}

		text.push_str(content);
	}

	if text.trim().is_empty() {
		return Err(eyre::eyre!("Extraction response contains no page content."));
	}

	Ok(text)
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn joins_page_content() {
		let json = serde_json::json!({
			"pages": [
				{ "content": "Page one." },
				{ "content": "Page two." }
			]
		});
		let text = parse_extraction_response(json).expect("parse failed");
		assert_eq!(text, "Page one.\n\nPage two.");
	}

	#[test]
	fn unwraps_list_wrapped_payloads() {
		let json = serde_json::json!([
			{ "pages": [{ "content": "Only page." }] }
		]);
		let text = parse_extraction_response(json).expect("parse failed");
		assert_eq!(text, "Only page.");
	}

	#[test]
	fn rejects_empty_pages() {
		let json = serde_json::json!({ "pages": [] });
		assert!(parse_extraction_response(json).is_err());
	}
}
