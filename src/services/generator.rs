use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::collections::BTreeSet;
use uuid::Uuid;

use crate::error::GenerationError;
use crate::models::trip::{PackingItem, PackingListForPerson, Traveler, TripContext};

const VALID_CATEGORIES: [&str; 9] = [
    "clothing",
    "toiletries",
    "electronics",
    "documents",
    "health",
    "comfort",
    "activities",
    "baby",
    "misc",
];

const CATEGORY_ALIASES: &[(&str, &str)] = &[
    ("skiing", "activities"),
    ("skiing & snowboarding", "activities"),
    ("snowboarding", "activities"),
    ("hiking", "activities"),
    ("beach", "activities"),
    ("camping", "activities"),
    ("biking", "activities"),
    ("water sports", "activities"),
    ("sports", "activities"),
    ("outdoor", "activities"),
    ("recreation", "activities"),
    ("entertainment", "activities"),
    ("clothes", "clothing"),
    ("hygiene", "toiletries"),
    ("tech", "electronics"),
    ("medical", "health"),
    ("medicine", "health"),
    ("papers", "documents"),
    ("infant", "baby"),
    ("miscellaneous", "misc"),
];

const ACTIVITY_KEYWORDS: [&str; 9] = [
    "ski", "snow", "hike", "beach", "camp", "bike", "sport", "swim", "surf",
];

const SYSTEM_PROMPT: &str = concat!(
    "You are a family travel packing expert. Produce a packing list for ONE traveler. ",
    "Respond with JSON only: {\"items\": [{\"name\", \"emoji\", \"quantity\", \"category\", ",
    "\"is_essential\", \"visible_to_kid\", \"notes\"}]}. Use only these categories: ",
    "clothing, toiletries, electronics, documents, health, comfort, activities, baby, misc."
);

/// Produces one traveler's packing list. Called once per traveler per fan-out.
#[async_trait]
pub trait TravelerListGenerator: Send + Sync {
    async fn generate(
        &self,
        traveler: &Traveler,
        context: &TripContext,
    ) -> Result<PackingListForPerson, GenerationError>;
}

/// Client for a Cloudflare Workers AI text model.
pub struct WorkersAiListGenerator {
    http: Client,
    account_id: String,
    api_token: String,
    model: String,
}

#[derive(Deserialize)]
struct TextResponse {
    result: TextResult,
}

#[derive(Deserialize)]
struct TextResult {
    response: String,
}

#[derive(Debug, Deserialize)]
struct GeneratedList {
    #[serde(default)]
    items: Vec<GeneratedItem>,
}

#[derive(Debug, Deserialize)]
struct GeneratedItem {
    name: Option<String>,
    emoji: Option<String>,
    quantity: Option<serde_json::Value>,
    category: Option<String>,
    #[serde(default)]
    is_essential: bool,
    visible_to_kid: Option<bool>,
    notes: Option<String>,
}

impl WorkersAiListGenerator {
    pub fn new(account_id: String, api_token: String, model: String) -> Self {
        Self {
            http: Client::new(),
            account_id,
            api_token,
            model,
        }
    }
}

#[async_trait]
impl TravelerListGenerator for WorkersAiListGenerator {
    async fn generate(
        &self,
        traveler: &Traveler,
        context: &TripContext,
    ) -> Result<PackingListForPerson, GenerationError> {
        let url = format!(
            "https://api.cloudflare.com/client/v4/accounts/{}/ai/run/{}",
            self.account_id, self.model
        );

        let request_body = serde_json::json!({
            "messages": [
                {"role": "system", "content": SYSTEM_PROMPT},
                {"role": "user", "content": traveler_prompt(traveler, context)},
            ],
            "max_tokens": 2048,
            "temperature": 0.7
        });

        let response = self
            .http
            .post(&url)
            .bearer_auth(&self.api_token)
            .json(&request_body)
            .send()
            .await?
            .error_for_status()?;

        let reply: TextResponse = response.json().await?;
        let generated: GeneratedList = serde_json::from_value(extract_json(&reply.result.response)?)
            .map_err(|e| GenerationError::Api(format!("unexpected packing list shape: {}", e)))?;

        Ok(build_list(traveler, generated.items))
    }
}

fn traveler_prompt(traveler: &Traveler, context: &TripContext) -> String {
    let mut prompt = format!(
        "Traveler: {} ({}, age {}).\nDestination: {}\nDates: {} to {} ({} days)\n",
        traveler.name,
        traveler.kind,
        traveler.age,
        context.destination,
        context.start_date,
        context.end_date,
        context.duration_days,
    );

    match &context.weather {
        Some(w) => prompt.push_str(&format!(
            "Weather: avg {}°{}, {}. {}\n",
            w.avg_temp,
            w.temp_unit,
            w.conditions
                .iter()
                .map(|c| c.to_string())
                .collect::<Vec<_>>()
                .join(", "),
            w.recommendation
        )),
        None => prompt.push_str("Weather: unknown\n"),
    }

    if !context.activities.is_empty() {
        prompt.push_str(&format!("Activities: {}\n", context.activities.join(", ")));
    }
    if !context.transport.is_empty() {
        prompt.push_str(&format!("Transport: {}\n", context.transport.join(", ")));
    }
    if context.primary_packer == Some(traveler.id) {
        prompt.push_str("This traveler is the primary packer: include shared family items.\n");
    } else {
        prompt.push_str("Do not include shared family items.\n");
    }
    prompt
}

/// Pull a JSON object out of a model reply: the whole reply, a fenced block,
/// or the outermost braces.
fn extract_json(content: &str) -> Result<serde_json::Value, GenerationError> {
    if let Ok(value) = serde_json::from_str(content) {
        return Ok(value);
    }

    if let Some(start) = content.find("```") {
        let fenced = &content[start + 3..];
        let fenced = fenced.strip_prefix("json").unwrap_or(fenced);
        if let Some(end) = fenced.find("```") {
            if let Ok(value) = serde_json::from_str(fenced[..end].trim()) {
                return Ok(value);
            }
        }
    }

    if let (Some(start), Some(end)) = (content.find('{'), content.rfind('}')) {
        if start < end {
            if let Ok(value) = serde_json::from_str(&content[start..=end]) {
                return Ok(value);
            }
        }
    }

    Err(GenerationError::Api(
        "Failed to parse JSON from model response".to_string(),
    ))
}

fn map_category(raw: &str) -> String {
    let raw = raw.trim().to_lowercase();

    if VALID_CATEGORIES.contains(&raw.as_str()) {
        return raw;
    }
    if let Some((_, mapped)) = CATEGORY_ALIASES.iter().find(|(alias, _)| *alias == raw) {
        return mapped.to_string();
    }
    if ACTIVITY_KEYWORDS.iter().any(|k| raw.contains(k)) {
        return "activities".to_string();
    }
    "misc".to_string()
}

/// Accepts numbers or strings such as "2-3" or "as needed"; defaults to 1.
fn parse_quantity(raw: Option<&serde_json::Value>) -> u32 {
    match raw {
        Some(serde_json::Value::Number(n)) => n
            .as_u64()
            .or_else(|| n.as_f64().filter(|f| *f >= 0.0).map(|f| f as u64))
            .and_then(|n| u32::try_from(n).ok())
            .unwrap_or(1),
        Some(serde_json::Value::String(s)) => {
            let digits: String = s
                .chars()
                .skip_while(|c| !c.is_ascii_digit())
                .take_while(|c| c.is_ascii_digit())
                .collect();
            digits.parse().unwrap_or(1)
        }
        _ => 1,
    }
}

fn build_list(traveler: &Traveler, generated: Vec<GeneratedItem>) -> PackingListForPerson {
    let items: Vec<PackingItem> = generated
        .into_iter()
        .map(|item| PackingItem {
            id: Uuid::new_v4(),
            person_id: traveler.id,
            name: item.name.unwrap_or_else(|| "Unknown Item".to_string()),
            emoji: item.emoji.unwrap_or_else(|| "📦".to_string()),
            quantity: parse_quantity(item.quantity.as_ref()),
            category: map_category(item.category.as_deref().unwrap_or("misc")),
            notes: item.notes,
            is_packed: false,
            is_essential: item.is_essential,
            visible_to_kid: item.visible_to_kid.unwrap_or(true),
        })
        .collect();

    let categories: BTreeSet<String> = items.iter().map(|i| i.category.clone()).collect();

    PackingListForPerson {
        person_id: traveler.id,
        person_name: traveler.name.clone(),
        items,
        categories: categories.into_iter().collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::trip::TravelerKind;
    use serde_json::json;

    fn traveler() -> Traveler {
        Traveler {
            id: Uuid::new_v4(),
            name: "Ana".to_string(),
            age: 38,
            kind: TravelerKind::Adult,
            avatar: "👩".to_string(),
        }
    }

    #[test]
    fn test_extract_plain_json() {
        let value = extract_json(r#"{"items": []}"#).unwrap();
        assert_eq!(value, json!({"items": []}));
    }

    #[test]
    fn test_extract_fenced_json() {
        let reply = "Here you go:\n```json\n{\"items\": [{\"name\": \"Hat\"}]}\n```\nEnjoy!";
        let value = extract_json(reply).unwrap();
        assert_eq!(value["items"][0]["name"], "Hat");
    }

    #[test]
    fn test_extract_embedded_braces() {
        let value = extract_json("Sure! {\"items\": []} Hope that helps.").unwrap();
        assert_eq!(value, json!({"items": []}));
    }

    #[test]
    fn test_extract_failure_is_api_error() {
        let err = extract_json("no json here").unwrap_err();
        assert!(matches!(err, GenerationError::Api(_)));
    }

    #[test]
    fn test_category_mapping() {
        assert_eq!(map_category("Clothing"), "clothing");
        assert_eq!(map_category("hygiene"), "toiletries");
        assert_eq!(map_category("Surfing Gear"), "activities");
        assert_eq!(map_category("snacks"), "misc");
    }

    #[test]
    fn test_quantity_parsing() {
        assert_eq!(parse_quantity(Some(&json!(3))), 3);
        assert_eq!(parse_quantity(Some(&json!("2-3 pairs"))), 2);
        assert_eq!(parse_quantity(Some(&json!("as needed"))), 1);
        assert_eq!(parse_quantity(Some(&json!(-4))), 1);
        assert_eq!(parse_quantity(None), 1);
    }

    #[test]
    fn test_build_list_defaults_and_categories() {
        let t = traveler();
        let generated: GeneratedList = serde_json::from_value(json!({
            "items": [
                {"name": "Sunscreen", "category": "hygiene", "quantity": 1, "is_essential": true},
                {"category": "clothes", "quantity": "4"},
                {"name": "Swim goggles", "category": "swimming"}
            ]
        }))
        .unwrap();

        let list = build_list(&t, generated.items);
        assert_eq!(list.person_id, t.id);
        assert_eq!(list.person_name, "Ana");
        assert_eq!(list.items.len(), 3);
        assert_eq!(list.items[1].name, "Unknown Item");
        assert_eq!(list.items[1].emoji, "📦");
        assert_eq!(list.items[1].quantity, 4);
        assert!(list.items[0].is_essential);
        assert!(list.items[2].visible_to_kid);
        assert_eq!(list.categories, vec!["activities", "clothing", "toiletries"]);
    }
}
