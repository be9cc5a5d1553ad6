// Reasoning Service Boundary - Request, Reply and the Service Trait
//
// The adjudicator only ever talks to `dyn ReasoningService`; the HTTP client
// and test stubs both implement it.

use crate::error::ReasoningError;
use crate::types::{Candidate, Confidence, MetricId, Verdict, VerdictOutcome};
use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt::Write;

/// Summary of one contender as presented to the reasoning service
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateBrief {
    pub id: String,

    /// Normalized value (base units)
    pub value: Decimal,

    /// Value as printed in the document
    pub reported_value: Decimal,

    pub currency: Option<String>,
    pub scale: String,
    pub evidence: String,

    /// Section and page
    pub source: String,

    pub confidence: Confidence,

    /// Warning messages raised by the deterministic rules
    pub warnings: Vec<String>,
}

impl CandidateBrief {
    pub fn from_candidate(candidate: &Candidate, verdicts: &[Verdict]) -> Self {
        let warnings = verdicts
            .iter()
            .filter(|v| v.candidate_id == candidate.id() && v.outcome == VerdictOutcome::Warning)
            .map(|v| format!("{}: {}", v.rule, v.message))
            .collect();

        Self {
            id: candidate.id().to_string(),
            value: candidate.normalized_value(),
            reported_value: candidate.value(),
            currency: candidate.currency().map(str::to_string),
            scale: candidate.scale().to_string(),
            evidence: candidate.evidence().to_string(),
            source: candidate.provenance().to_string(),
            confidence: candidate.confidence(),
            warnings,
        }
    }
}

/// One adjudication question: pick one of `candidates`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdjudicationRequest {
    pub metric: MetricId,
    pub period: String,
    pub candidates: Vec<CandidateBrief>,
}

impl AdjudicationRequest {
    pub fn contains(&self, candidate_id: &str) -> bool {
        self.candidates.iter().any(|c| c.id == candidate_id)
    }
}

/// Reasoning service answer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReasoningReply {
    pub selected_candidate_id: String,

    #[serde(alias = "reasoning")]
    pub rationale: String,

    /// Service's own confidence, informational only
    #[serde(default)]
    pub confidence: Option<Confidence>,

    #[serde(default)]
    pub flags: Vec<String>,
}

impl ReasoningReply {
    /// Reject replies that name an unknown candidate or give no rationale
    pub fn validate(&self, request: &AdjudicationRequest) -> Result<(), ReasoningError> {
        if self.rationale.trim().is_empty() {
            return Err(ReasoningError::Malformed("empty rationale".to_string()));
        }
        if !request.contains(&self.selected_candidate_id) {
            return Err(ReasoningError::Malformed(format!(
                "selected candidate {} was not offered",
                self.selected_candidate_id
            )));
        }
        Ok(())
    }
}

/// External reasoning call used as the last rung of adjudication
#[async_trait]
pub trait ReasoningService: Send + Sync {
    /// Service name for logs
    fn name(&self) -> &'static str;

    async fn adjudicate(
        &self,
        request: &AdjudicationRequest,
    ) -> Result<ReasoningReply, ReasoningError>;
}

/// Render the natural-language prompt sent alongside the structured request
pub fn build_prompt(request: &AdjudicationRequest) -> String {
    let mut prompt = String::new();
    let _ = writeln!(
        prompt,
        "You are reviewing candidate values reported for one financial metric."
    );
    let _ = writeln!(prompt, "\nMetric: {}", request.metric);
    let _ = writeln!(prompt, "Period: {}", request.period);
    let _ = writeln!(prompt, "\nCandidates:");

    for (i, c) in request.candidates.iter().enumerate() {
        let _ = writeln!(prompt, "\nCandidate {}:", i + 1);
        let _ = writeln!(prompt, "- ID: {}", c.id);
        let _ = writeln!(
            prompt,
            "- Value: {} {} ({}), normalized {}",
            c.reported_value,
            c.currency.as_deref().unwrap_or(""),
            c.scale,
            c.value
        );
        let _ = writeln!(prompt, "- Source: {}", c.source);
        let _ = writeln!(prompt, "- Confidence: {:.2}", c.confidence);
        let _ = writeln!(prompt, "- Evidence: {}", c.evidence);
        if c.warnings.is_empty() {
            let _ = writeln!(prompt, "- Warnings: none");
        } else {
            for warning in &c.warnings {
                let _ = writeln!(prompt, "- Warning: {}", warning);
            }
        }
    }

    let _ = writeln!(
        prompt,
        "\nSelect the candidate most likely to be correct. Consider source reliability, \
         evidence quality and consistency with financial logic."
    );
    let _ = writeln!(
        prompt,
        "Respond only with a JSON object: \
         {{\"selected_candidate_id\": \"...\", \"rationale\": \"...\", \"confidence\": 0.0}}"
    );
    prompt
}

/// Parse a reply body, tolerating a Markdown code fence around the JSON
pub fn parse_reasoning_reply(body: &str) -> Result<ReasoningReply, ReasoningError> {
    let mut text = body.trim();
    if let Some(rest) = text.strip_prefix("```json") {
        text = rest;
    } else if let Some(rest) = text.strip_prefix("```") {
        text = rest;
    }
    if let Some(rest) = text.strip_suffix("```") {
        text = rest;
    }

    serde_json::from_str(text.trim()).map_err(|e| ReasoningError::Malformed(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::candidate;
    use crate::types::RuleName;

    fn request() -> AdjudicationRequest {
        let a = candidate("a", MetricId::Revenue, Decimal::new(500, 0), "millions", 0.6);
        let b = candidate("b", MetricId::Revenue, Decimal::new(520, 0), "millions", 0.6);
        let verdicts = vec![Verdict::warning(&b, RuleName::YoyPlausibility, "big jump")];
        AdjudicationRequest {
            metric: MetricId::Revenue,
            period: "FY2023".to_string(),
            candidates: vec![
                CandidateBrief::from_candidate(&a, &verdicts),
                CandidateBrief::from_candidate(&b, &verdicts),
            ],
        }
    }

    #[test]
    fn test_brief_collects_warnings_for_its_candidate_only() {
        let req = request();
        assert!(req.candidates[0].warnings.is_empty());
        assert_eq!(req.candidates[1].warnings.len(), 1);
        assert!(req.candidates[1].warnings[0].starts_with("yoy-plausibility"));
    }

    #[test]
    fn test_prompt_lists_every_candidate() {
        let prompt = build_prompt(&request());
        assert!(prompt.contains("Metric: REVENUE"));
        assert!(prompt.contains("- ID: a"));
        assert!(prompt.contains("- ID: b"));
        assert!(prompt.contains("Warning: yoy-plausibility"));
    }

    #[test]
    fn test_parse_fenced_reply() {
        let body =
            "```json\n{\"selected_candidate_id\": \"b\", \"reasoning\": \"audited table\"}\n```";
        let reply = parse_reasoning_reply(body).unwrap();
        assert_eq!(reply.selected_candidate_id, "b");
        assert_eq!(reply.rationale, "audited table");
        assert!(reply.validate(&request()).is_ok());
    }

    #[test]
    fn test_parse_garbage_is_malformed() {
        assert!(matches!(
            parse_reasoning_reply("I think it is b"),
            Err(ReasoningError::Malformed(_))
        ));
    }

    #[test]
    fn test_unknown_selection_or_empty_rationale_rejected() {
        let req = request();
        let unknown = ReasoningReply {
            selected_candidate_id: "z".to_string(),
            rationale: "because".to_string(),
            confidence: None,
            flags: Vec::new(),
        };
        assert!(unknown.validate(&req).is_err());

        let silent = ReasoningReply {
            selected_candidate_id: "a".to_string(),
            rationale: "  ".to_string(),
            confidence: None,
            flags: Vec::new(),
        };
        assert!(silent.validate(&req).is_err());
    }
}
