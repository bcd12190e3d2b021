use std::sync::Mutex;

use time::OffsetDateTime;
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender, unbounded_channel};

/// Lifecycle of one traced sub-operation. Steps are appended once and mutated in place
/// to a terminal status; they are never removed within a request.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
	Pending,
	Running,
	Completed,
	Error,
	Skipped,
}

#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct AgentStep {
	pub id: u32,
	pub agent: String,
	pub action: String,
	pub status: StepStatus,
	pub result: Option<String>,
	pub detail: Option<String>,
	#[serde(with = "crate::time_serde")]
	pub started_at: OffsetDateTime,
	#[serde(with = "crate::time_serde::option")]
	pub ended_at: Option<OffsetDateTime>,
}

/// Append-only step log shared by the coordinating task and its fan-out branches. All
/// mutations funnel through one locked update path; subscribers receive a snapshot of
/// each step as it changes, which is what powers live progress streaming.
pub struct Trace {
	steps: Mutex<Vec<AgentStep>>,
	events: Option<UnboundedSender<AgentStep>>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct StepId(u32);

impl Trace {
	pub fn new() -> Self {
		Self { steps: Mutex::new(Vec::new()), events: None }
	}

	pub fn with_subscriber() -> (Self, UnboundedReceiver<AgentStep>) {
		let (sender, receiver) = unbounded_channel();

		(Self { steps: Mutex::new(Vec::new()), events: Some(sender) }, receiver)
	}

	/// Appends a step in `running` state and returns its handle.
	pub fn begin(&self, agent: &str, action: &str) -> StepId {
		let mut steps = self.steps.lock().unwrap_or_else(|err| err.into_inner());
		let id = steps.len() as u32;
		let step = AgentStep {
			id,
			agent: agent.to_string(),
			action: action.to_string(),
			status: StepStatus::Running,
			result: None,
			detail: None,
			started_at: OffsetDateTime::now_utc(),
			ended_at: None,
		};

		steps.push(step.clone());
		drop(steps);
		self.emit(step);

		StepId(id)
	}

	pub fn complete(&self, id: StepId, result: Option<String>) {
		self.finish(id, StepStatus::Completed, result, None);
	}

	pub fn fail(&self, id: StepId, detail: String) {
		self.finish(id, StepStatus::Error, None, Some(detail));
	}

	pub fn skip(&self, id: StepId, detail: Option<String>) {
		self.finish(id, StepStatus::Skipped, None, detail);
	}

	pub fn snapshot(&self) -> Vec<AgentStep> {
		self.steps.lock().unwrap_or_else(|err| err.into_inner()).clone()
	}

	fn finish(
		&self,
		StepId(id): StepId,
		status: StepStatus,
		result: Option<String>,
		detail: Option<String>,
	) {
		let mut steps = self.steps.lock().unwrap_or_else(|err| err.into_inner());
		let Some(step) = steps.get_mut(id as usize) else {
			return;
		};

		step.status = status;
		step.result = result;
		step.detail = detail;
		step.ended_at = Some(OffsetDateTime::now_utc());

		let snapshot = step.clone();

		drop(steps);
		self.emit(snapshot);
	}

	fn emit(&self, step: AgentStep) {
		if let Some(events) = &self.events {
			// A dropped receiver only disables streaming; the log itself is intact.
			let _ = events.send(step);
		}
	}
}

impl Default for Trace {
	fn default() -> Self {
		Self::new()
	}
}
