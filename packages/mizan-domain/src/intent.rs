use std::sync::OnceLock;

use regex::Regex;

/// Classified intent of an incoming query. Greeting and Conversational are matched
/// synchronously against fixed patterns; the DomainRelevant/OffTopic split needs the
/// guardrail model and is decided by the service layer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Intent {
	Greeting,
	Conversational,
	DomainRelevant,
	OffTopic,
}

impl Intent {
	pub fn as_str(self) -> &'static str {
		match self {
			Self::Greeting => "greeting",
			Self::Conversational => "conversational",
			Self::DomainRelevant => "domain_relevant",
			Self::OffTopic => "off_topic",
		}
	}
}

/// Fast pattern gate for conversational openers. Returns None for anything that needs
/// the guardrail model.
pub fn match_small_talk(query: &str) -> Option<Intent> {
	let trimmed = query.trim();

	if trimmed.is_empty() {
		return Some(Intent::Conversational);
	}
	if greeting_regex().is_match(trimmed) {
		return Some(Intent::Greeting);
	}
	if conversational_regex().is_match(trimmed) {
		return Some(Intent::Conversational);
	}

	None
}

fn greeting_regex() -> &'static Regex {
	static REGEX: OnceLock<Regex> = OnceLock::new();

	REGEX.get_or_init(|| {
		Regex::new(
			r"(?i)^\s*(hi|hello|hey|salam|salaam|assalamualaikum|assalamu\s*alaikum|good\s+(morning|afternoon|evening))[\s!,.?]*$",
		)
		.expect("Greeting pattern must compile.")
	})
}

fn conversational_regex() -> &'static Regex {
	static REGEX: OnceLock<Regex> = OnceLock::new();

	REGEX.get_or_init(|| {
		Regex::new(
			r"(?i)^\s*(thanks|thank\s+you|jazakallah(\s+khair)?|bye|goodbye|see\s+you|how\s+are\s+you|who\s+are\s+you|what\s+can\s+you\s+do|help)[\s!,.?]*$",
		)
		.expect("Conversational pattern must compile.")
	})
}
