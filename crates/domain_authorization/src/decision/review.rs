//! AI medical-necessity review

use serde::Deserialize;

use super::{DecisionMethod, PayerDecision, PayerRequest};
use crate::error::RecoverableFailure;
use crate::ports::{CompletionParams, ReasoningService};
use crate::reasoning;

pub const AI_MEDICAL_NECESSITY_REVIEW: &str = "AI_MEDICAL_NECESSITY_REVIEW";

/// Structured judgment returned by the reasoning service
#[derive(Debug, Clone, Deserialize)]
pub struct AiJudgment {
    pub decision: String,
    #[serde(default)]
    pub confidence: Option<String>,
    #[serde(default)]
    pub reasoning: Option<String>,
    #[serde(default)]
    pub medical_necessity: Option<String>,
    #[serde(default)]
    pub code_appropriateness: Option<String>,
    #[serde(default)]
    pub missing_elements: Option<Vec<String>>,
    #[serde(default)]
    pub required_actions: Option<RequiredActions>,
    #[serde(default)]
    pub clinical_guideline_reference: Option<String>,
}

/// Required actions arrive either as prose or as a list
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum RequiredActions {
    Text(String),
    Steps(Vec<String>),
}

impl RequiredActions {
    pub fn into_text(self) -> String {
        match self {
            RequiredActions::Text(text) => text,
            RequiredActions::Steps(steps) => steps.join("; "),
        }
    }
}

impl AiJudgment {
    pub fn is_approval(&self) -> bool {
        self.decision == "APPROVED"
    }

    /// Converts the judgment into a decision; anything but an approval denies
    pub fn into_decision(self, request: &PayerRequest) -> PayerDecision {
        let confidence = self.confidence.clone().unwrap_or_else(|| "medium".to_string());

        let mut decision = if self.is_approval() {
            let mut approval = PayerDecision::approve(DecisionMethod::AiReview, &request.procedures);
            approval.reason = self.reasoning;
            approval
        } else {
            let reason = self
                .reasoning
                .unwrap_or_else(|| "Denied on medical necessity review".to_string());
            let mut denial = PayerDecision::deny(DecisionMethod::AiReview, reason, AI_MEDICAL_NECESSITY_REVIEW)
                .with_required_documents(self.missing_elements.unwrap_or_default());
            denial.next_steps = self.required_actions.map(RequiredActions::into_text);
            denial.clinical_guideline = self.clinical_guideline_reference;
            denial
        };

        decision.confidence = Some(confidence);
        decision.medical_necessity = self.medical_necessity;
        decision.code_appropriateness = self.code_appropriateness;
        decision
    }
}

fn yes_no(flag: bool) -> &'static str {
    if flag {
        "Yes"
    } else {
        "No"
    }
}

/// Review rubric sent to the reasoning service
pub fn review_prompt(request: &PayerRequest) -> String {
    let patient = if request.patient.name.is_empty() {
        "Unknown"
    } else {
        request.patient.name.as_str()
    };
    let summary = if request.clinical_summary.is_empty() {
        "Not provided"
    } else {
        request.clinical_summary.as_str()
    };
    let evidence = request.evidence;

    format!(
        r#"You are a medical necessity reviewer for a health insurance company.
Analyze this prior authorization request and determine if it should be APPROVED or DENIED.

AUTHORIZATION REQUEST:
- Patient: {patient}
- Diagnosis Codes (ICD-10): {diagnosis}
- Procedure Codes (CPT): {procedures}
- Clinical Summary: {summary}

SUPPORTING DOCUMENTATION:
- Physical Therapy Notes: {pt_notes}
- Clinical Notes: {clinical_notes}
- X-ray/Imaging: {xray}
- Referral: {referral}

CRITICAL REVIEW CRITERIA (check in this order):

1. CODE ACCURACY AND APPROPRIATENESS:
   - Do the ICD-10 diagnosis codes accurately match the clinical summary?
   - Do the CPT procedure codes match the diagnosed condition?
   - Are there any obvious mismatches? (e.g., knee procedure codes for shoulder problems, cardiac codes for musculoskeletal issues, wrong body part codes)
   - Are the codes clinically appropriate for the described condition?
   - If you detect ANY code mismatch or inappropriate code usage, this is a STRONG reason for DENIAL.

2. CLINICAL CONTEXT VALIDATION:
   - Does the clinical summary support the diagnosis codes provided?
   - Does the requested procedure make sense for the diagnosis?
   - Is this the standard of care for this condition?

3. MEDICAL NECESSITY:
   - Is this procedure medically necessary for the given diagnosis?
   - Has conservative treatment been attempted (if applicable)?
   - Are there red flag symptoms requiring immediate intervention?

4. DOCUMENTATION:
   - Is there sufficient documentation to support medical necessity?
   - Are there any missing critical documents?

5. EVIDENCE-BASED GUIDELINES:
   - Does this align with clinical practice guidelines?
   - Is this cost-effective and appropriate?

EXAMPLES OF CODE MISMATCHES TO WATCH FOR:
- Shoulder pain (M25.511) + Knee MRI (73721) = DENY (wrong body part)
- Lower back pain (M54.5) + Cardiac stress test = DENY (wrong system)
- Diabetes diagnosis (E11.x) + Orthopedic procedure = DENY (unless clinically justified)
- Minor sprain + Major surgery code = DENY (overtreatment)

Analyze the request and respond with a JSON object ONLY (no other text):
{{
  "decision": "APPROVED" or "DENIED",
  "confidence": "high" or "medium" or "low",
  "reasoning": "Clear explanation of why this decision was made, HIGHLIGHTING ANY CODE MISMATCHES (3-4 sentences)",
  "medical_necessity": "Explanation of medical necessity (or lack thereof)",
  "code_appropriateness": "Analysis of whether the codes match the clinical context",
  "missing_elements": ["list", "of", "missing", "items", "or", "incorrect", "codes"] or [],
  "required_actions": "What the provider should do to get approval (if denied)",
  "clinical_guideline_reference": "Relevant clinical practice guideline or standard of care"
}}

Be vigilant and thorough. Code accuracy is paramount. If codes don't match the clinical context, DENY and explain why."#,
        diagnosis = request.diagnosis.join(", "),
        procedures = request.procedures.join(", "),
        pt_notes = yes_no(evidence.pt_notes),
        clinical_notes = yes_no(evidence.clinical_notes),
        xray = yes_no(evidence.xray),
        referral = yes_no(evidence.referral),
    )
}

/// Runs the AI review; any failure is recoverable
pub async fn review(
    service: Option<&dyn ReasoningService>,
    request: &PayerRequest,
    params: CompletionParams,
) -> Result<PayerDecision, RecoverableFailure> {
    let judgment: AiJudgment = reasoning::judge(service, &review_prompt(request), params).await?;
    Ok(judgment.into_decision(request))
}
