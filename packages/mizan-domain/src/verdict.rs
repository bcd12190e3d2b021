/// Compliance classification emitted by specialists and the aggregator.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum Classification {
	Compliant,
	#[serde(rename = "Partially Compliant")]
	PartiallyCompliant,
	#[serde(rename = "Non-Compliant")]
	NonCompliant,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum RiskLevel {
	Low,
	Medium,
	High,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum ConsensusLevel {
	#[serde(rename = "All agents agree")]
	AllAgree,
	#[serde(rename = "Majority agree")]
	MajorityAgree,
	#[serde(rename = "Split opinion")]
	SplitOpinion,
}

impl Classification {
	pub fn as_str(self) -> &'static str {
		match self {
			Self::Compliant => "Compliant",
			Self::PartiallyCompliant => "Partially Compliant",
			Self::NonCompliant => "Non-Compliant",
		}
	}

	/// Tolerant parse of model output ("non-compliant", "PARTIALLY COMPLIANT", ...).
	pub fn parse_lenient(text: &str) -> Option<Self> {
		let normalized =
			text.trim().to_ascii_lowercase().replace(['-', '_'], " ").split_whitespace().collect::<Vec<_>>().join(" ");

		match normalized.as_str() {
			"compliant" | "fully compliant" => Some(Self::Compliant),
			"partially compliant" | "partial" => Some(Self::PartiallyCompliant),
			"non compliant" | "noncompliant" | "not compliant" => Some(Self::NonCompliant),
			_ => None,
		}
	}

	/// Conservatism order used to resolve true ties: a tie never resolves toward the
	/// more permissive classification.
	fn severity(self) -> u8 {
		match self {
			Self::Compliant => 0,
			Self::PartiallyCompliant => 1,
			Self::NonCompliant => 2,
		}
	}
}

impl ConsensusLevel {
	pub fn as_str(self) -> &'static str {
		match self {
			Self::AllAgree => "All agents agree",
			Self::MajorityAgree => "Majority agree",
			Self::SplitOpinion => "Split opinion",
		}
	}
}

impl RiskLevel {
	pub fn as_str(self) -> &'static str {
		match self {
			Self::Low => "Low",
			Self::Medium => "Medium",
			Self::High => "High",
		}
	}
}

/// Majority vote over specialist classifications. Ties are flagged as a split opinion
/// and resolve to the most conservative classification among the tied values.
pub fn majority_vote(classifications: &[Classification]) -> (Classification, ConsensusLevel) {
	if classifications.is_empty() {
		return (Classification::PartiallyCompliant, ConsensusLevel::SplitOpinion);
	}

	let mut counts: Vec<(Classification, usize)> = Vec::new();

	for classification in classifications {
		match counts.iter_mut().find(|(c, _)| c == classification) {
			Some((_, count)) => *count += 1,
			None => counts.push((*classification, 1)),
		}
	}

	if counts.len() == 1 {
		return (counts[0].0, ConsensusLevel::AllAgree);
	}

	let top_count = counts.iter().map(|(_, count)| *count).max().unwrap_or(0);
	let mut leaders = counts
		.iter()
		.filter(|(_, count)| *count == top_count)
		.map(|(classification, _)| *classification)
		.collect::<Vec<_>>();

	if leaders.len() == 1 {
		return (leaders[0], ConsensusLevel::MajorityAgree);
	}

	leaders.sort_by_key(|classification| std::cmp::Reverse(classification.severity()));

	(leaders[0], ConsensusLevel::SplitOpinion)
}

/// Risk thresholds over mean confidence: >70 Low, >40 Medium, else High.
pub fn risk_from_confidence(confidence: f32) -> RiskLevel {
	if confidence > 70.0 {
		RiskLevel::Low
	} else if confidence > 40.0 {
		RiskLevel::Medium
	} else {
		RiskLevel::High
	}
}
