use serde::{Deserialize, Serialize};

use super::contract::{limit_text, require_text, Flow, Validate};

const SYSTEM_PROMPT: &str = "You are a health companion writing one short, practical wellness tip. \
Never diagnose and never change a treatment. \
Answer with a single JSON object: {\"title\": string, \"tip\": string, \"category\": string}.";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WellnessTipInput {
    pub topic: String,
    #[serde(default)]
    pub pathologies: Vec<String>,
    /// BCP-47 tag of the answer language; English when absent.
    #[serde(default)]
    pub language: Option<String>,
}

impl Validate for WellnessTipInput {
    fn validate(&self) -> Result<(), String> {
        require_text("topic", &self.topic)?;
        limit_text("topic", &self.topic, 120)?;
        if self.pathologies.len() > 20 {
            return Err("at most 20 pathologies".into());
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WellnessTipOutput {
    pub title: String,
    pub tip: String,
    #[serde(default)]
    pub category: Option<String>,
}

impl Validate for WellnessTipOutput {
    fn validate(&self) -> Result<(), String> {
        require_text("title", &self.title)?;
        require_text("tip", &self.tip)?;
        limit_text("tip", &self.tip, 1000)
    }
}

pub struct WellnessTipFlow;

impl Flow for WellnessTipFlow {
    const NAME: &'static str = "wellness_tip";

    type Input = WellnessTipInput;
    type Output = WellnessTipOutput;

    fn system_prompt(&self) -> &str {
        SYSTEM_PROMPT
    }

    fn build_prompt(&self, input: &WellnessTipInput) -> String {
        let mut prompt = format!("Topic: {}\n", input.topic.trim());
        if !input.pathologies.is_empty() {
            prompt.push_str(&format!("Conditions to keep in mind: {}\n", input.pathologies.join(", ")));
        }
        prompt.push_str(&format!(
            "Language: {}\n",
            input.language.as_deref().unwrap_or("en")
        ));
        prompt
    }

    fn fallback_message(&self) -> &'static str {
        "Wellness tips are unavailable right now. Drink some water and take a short walk if you can."
    }

    /// Tips are generic, so equal topics share one answer.
    fn cache_key(&self, input: &WellnessTipInput) -> Option<String> {
        let mut pathologies: Vec<String> = input
            .pathologies
            .iter()
            .map(|p| p.trim().to_lowercase())
            .collect();
        pathologies.sort();
        Some(format!(
            "{}|{}|{}",
            input.topic.trim().to_lowercase(),
            pathologies.join(","),
            input.language.as_deref().unwrap_or("en").to_lowercase()
        ))
    }
}
