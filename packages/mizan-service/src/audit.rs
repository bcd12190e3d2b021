use std::time::Instant;

use tracing::warn;
use uuid::Uuid;

use crate::{
	Error, ExtractionProvider, MizanService, Result,
	aggregator::AggregatedVerdict,
	panel::SpecialistVerdict,
	trace::{AgentStep, Trace},
};

#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct AuditRequest {
	pub document_text: String,
}

#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct AuditResponse {
	pub trace_id: Uuid,
	pub verdict: AggregatedVerdict,
	pub specialists: Vec<SpecialistVerdict>,
	pub steps: Vec<AgentStep>,
}

impl MizanService {
	/// Audits a document given as plain text: specialist panel, then consensus.
	pub async fn audit_document(&self, request: AuditRequest) -> Result<AuditResponse> {
		let trace = Trace::new();

		self.audit_document_traced(request, &trace).await
	}

	/// Same pipeline with a caller-supplied trace, for live step streaming.
	pub async fn audit_document_traced(
		&self,
		request: AuditRequest,
		trace: &Trace,
	) -> Result<AuditResponse> {
		let document_text = request.document_text.trim();

		if document_text.is_empty() {
			return Err(Error::InvalidRequest {
				message: "Document text must be non-empty.".to_string(),
			});
		}

		let started = Instant::now();
		let trace_id = Uuid::new_v4();
		let specialists = self.run_panel(document_text, trace).await;
		let mut verdict = self.aggregate(&specialists, trace).await;

		verdict.processing_time_seconds = started.elapsed().as_secs_f64();

		Ok(AuditResponse { trace_id, verdict, specialists, steps: trace.snapshot() })
	}

	/// Audits an uploaded file: OCR/extraction first, then the text pipeline. A failed
	/// extraction does not abort the audit; the panel runs against a placeholder that
	/// names the file, so the caller still gets a response flagging manual review.
	pub async fn audit_file(
		&self,
		file_name: &str,
		bytes: Vec<u8>,
		mime_type: &str,
	) -> Result<AuditResponse> {
		let trace = Trace::new();

		self.audit_file_traced(file_name, bytes, mime_type, &trace).await
	}

	pub async fn audit_file_traced(
		&self,
		file_name: &str,
		bytes: Vec<u8>,
		mime_type: &str,
		trace: &Trace,
	) -> Result<AuditResponse> {
		if bytes.is_empty() {
			return Err(Error::InvalidRequest {
				message: "Uploaded file must be non-empty.".to_string(),
			});
		}

		let step = trace.begin("document_extractor", &format!("Extracting text from {file_name}"));
		let document_text = match self
			.providers
			.extraction
			.extract(&self.cfg.extraction, file_name, bytes, mime_type)
			.await
		{
			Ok(text) if !text.trim().is_empty() => {
				trace.complete(step, Some(format!("{} characters", text.len())));

				text
			},
			Ok(_) => {
				trace.fail(step, "Extraction returned no text.".to_string());

				extraction_placeholder(file_name)
			},
			Err(err) => {
				warn!(file_name, error = %err, "Extraction failed; auditing placeholder text.");
				trace.fail(step, err.to_string());

				extraction_placeholder(file_name)
			},
		};

		self.audit_document_traced(AuditRequest { document_text }, trace).await
	}
}

fn extraction_placeholder(file_name: &str) -> String {
	format!(
		"No text could be extracted from the uploaded file \"{file_name}\". The document \
content is unavailable for analysis and the submission requires manual review."
	)
}
