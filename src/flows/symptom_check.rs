use serde::{Deserialize, Serialize};

use super::contract::{limit_text, require_text, Flow, Validate};

const MAX_SYMPTOMS: usize = 20;

const SYSTEM_PROMPT: &str = "You are a cautious triage assistant. You do not diagnose. \
List possible conditions with a likelihood of low, medium or high, pick an urgency of \
self_care, see_doctor or emergency, and give one paragraph of advice. \
Answer with a single JSON object: {\"possibleConditions\": [{\"name\": string, \"likelihood\": string}], \
\"urgency\": string, \"advice\": string}.";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SymptomCheckInput {
    pub symptoms: Vec<String>,
    #[serde(default)]
    pub age: Option<u8>,
    #[serde(default)]
    pub sex: Option<String>,
    #[serde(default)]
    pub duration_days: Option<u32>,
    #[serde(default)]
    pub pathologies: Vec<String>,
}

impl Validate for SymptomCheckInput {
    fn validate(&self) -> Result<(), String> {
        if self.symptoms.iter().all(|s| s.trim().is_empty()) {
            return Err("at least one symptom is required".into());
        }
        if self.symptoms.len() > MAX_SYMPTOMS {
            return Err(format!("at most {MAX_SYMPTOMS} symptoms"));
        }
        for symptom in &self.symptoms {
            limit_text("symptom", symptom, 200)?;
        }
        if matches!(self.age, Some(age) if age > 130) {
            return Err("age must be at most 130".into());
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Likelihood {
    Low,
    Medium,
    High,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Urgency {
    SelfCare,
    SeeDoctor,
    Emergency,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PossibleCondition {
    pub name: String,
    pub likelihood: Likelihood,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SymptomCheckOutput {
    #[serde(default)]
    pub possible_conditions: Vec<PossibleCondition>,
    pub urgency: Urgency,
    pub advice: String,
}

impl Validate for SymptomCheckOutput {
    fn validate(&self) -> Result<(), String> {
        require_text("advice", &self.advice)?;
        if self.possible_conditions.len() > 10 {
            return Err("at most 10 possible conditions".into());
        }
        for condition in &self.possible_conditions {
            require_text("condition name", &condition.name)?;
        }
        Ok(())
    }
}

/// Personal input, so results are never cached.
pub struct SymptomCheckFlow;

impl Flow for SymptomCheckFlow {
    const NAME: &'static str = "symptom_check";

    type Input = SymptomCheckInput;
    type Output = SymptomCheckOutput;

    fn system_prompt(&self) -> &str {
        SYSTEM_PROMPT
    }

    fn build_prompt(&self, input: &SymptomCheckInput) -> String {
        let symptoms: Vec<&str> = input
            .symptoms
            .iter()
            .map(|s| s.trim())
            .filter(|s| !s.is_empty())
            .collect();

        let mut prompt = format!("Symptoms: {}\n", symptoms.join("; "));
        if let Some(days) = input.duration_days {
            prompt.push_str(&format!("Duration: {days} day(s)\n"));
        }
        if let Some(age) = input.age {
            prompt.push_str(&format!("Age: {age}\n"));
        }
        if let Some(sex) = input.sex.as_deref().filter(|s| !s.trim().is_empty()) {
            prompt.push_str(&format!("Sex: {sex}\n"));
        }
        if !input.pathologies.is_empty() {
            prompt.push_str(&format!("Known conditions: {}\n", input.pathologies.join(", ")));
        }
        prompt
    }

    fn fallback_message(&self) -> &'static str {
        "We could not analyse your symptoms right now. If they are severe or getting worse, contact a doctor or emergency services."
    }
}
