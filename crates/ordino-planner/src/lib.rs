//! LLM-backed planning against an Ollama-compatible chat API.
//!
//! [`LlmPlanner`] renders the tool catalog into a system prompt, asks the
//! model for a JSON plan, and validates the response against the registry
//! before any of it executes. Models being models, the response may come
//! wrapped in prose or a markdown fence; extraction tolerates both. A
//! response that fails to parse or validate gets exactly one more chance
//! with a simplified prompt.

use std::sync::{Arc, OnceLock};

use async_trait::async_trait;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use ordino_core::{JsonMap, Plan, PlanError, PlanStep, Planner, ToolRegistry};

const DEFAULT_BASE_URL: &str = "http://localhost:11434";
const DEFAULT_MODEL: &str = "gpt-oss";

#[derive(Debug, Serialize)]
struct ChatMessage {
    role: &'static str,
    content: String,
}

#[derive(Debug, Serialize)]
struct ChatOptions {
    temperature: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    num_predict: Option<u32>,
}

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    stream: bool,
    options: ChatOptions,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    message: ChatResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ChatResponseMessage {
    content: String,
}

/// Planner backed by an Ollama-compatible `/api/chat` endpoint.
pub struct LlmPlanner {
    client: reqwest::Client,
    registry: Arc<ToolRegistry>,
    base_url: String,
    model: String,
}

impl LlmPlanner {
    pub fn new(registry: Arc<ToolRegistry>) -> Self {
        Self::with_endpoint(registry, DEFAULT_BASE_URL, DEFAULT_MODEL)
    }

    pub fn with_endpoint(
        registry: Arc<ToolRegistry>,
        base_url: impl Into<String>,
        model: impl Into<String>,
    ) -> Self {
        Self {
            client: reqwest::Client::new(),
            registry,
            base_url: base_url.into(),
            model: model.into(),
        }
    }

    /// Render the tool catalog the way the system prompt embeds it.
    fn format_tools(&self) -> String {
        let mut rendered = String::new();
        for (name, info) in self.registry.list_tools() {
            rendered.push_str(&format!("\nTool: {name}\n"));
            rendered.push_str(&format!("Description: {}\n", info.description));
            let schema = serde_json::to_string_pretty(&info.input_schema.to_json())
                .unwrap_or_else(|_| "{}".to_string());
            rendered.push_str(&format!("Input Schema: {schema}\n"));
        }
        rendered
    }

    fn system_prompt(&self, tools_info: &str) -> String {
        format!(
            r#"You are a task planning assistant. Your job is to convert user requests into structured execution plans.

Available Tools:
{tools_info}

You must respond with ONLY a valid JSON object (no other text) with this exact structure:
{{
  "steps": [
    {{
      "step_number": 1,
      "tool": "ToolName",
      "input": {{"param": "value"}},
      "reasoning": "why this step is needed"
    }}
  ]
}}

Rules:
1. Use only the tools listed above
2. Tool names must match exactly (e.g., "Calculator", "TodoStore")
3. Input must match the tool's schema
4. Steps should be sequential and logical
5. Respond ONLY with the JSON object, no markdown, no explanation

Examples:

User: "Add a todo to buy milk"
{{
  "steps": [
    {{
      "step_number": 1,
      "tool": "TodoStore",
      "input": {{"operation": "add", "title": "Buy milk"}},
      "reasoning": "Create a new todo item with the title 'Buy milk'"
    }}
  ]
}}

User: "Calculate 15 * 8 and add the result as a todo"
{{
  "steps": [
    {{
      "step_number": 1,
      "tool": "Calculator",
      "input": {{"expression": "15 * 8"}},
      "reasoning": "Calculate the multiplication result"
    }},
    {{
      "step_number": 2,
      "tool": "TodoStore",
      "input": {{"operation": "add", "title": "Result: 120"}},
      "reasoning": "Add the calculation result as a todo"
    }}
  ]
}}"#
        )
    }

    fn fallback_prompt(&self, tools_info: &str, user_prompt: &str) -> String {
        format!(
            r#"Create a JSON plan with steps to accomplish: {user_prompt}

Available tools and their formats:
{tools_info}

Respond with ONLY this JSON format:
{{"steps": [{{"step_number": 1, "tool": "ToolName", "input": {{}}, "reasoning": "explanation"}}]}}"#
        )
    }

    async fn chat(&self, messages: Vec<ChatMessage>) -> Result<String, PlanError> {
        let request = ChatRequest {
            model: self.model.clone(),
            messages,
            stream: false,
            options: ChatOptions {
                temperature: 0.1,
                num_predict: Some(1000),
            },
        };

        let response = self
            .client
            .post(format!("{}/api/chat", self.base_url))
            .json(&request)
            .send()
            .await
            .map_err(|e| PlanError::unavailable(e.to_string()))?
            .error_for_status()
            .map_err(|e| PlanError::unavailable(e.to_string()))?;

        let body: ChatResponse = response
            .json()
            .await
            .map_err(|e| PlanError::unavailable(e.to_string()))?;
        Ok(body.message.content)
    }

    /// Parse a raw model response into a validated plan.
    fn parse_and_validate(&self, raw_response: &str) -> Result<Plan, PlanError> {
        let json_str = extract_json(raw_response);
        let plan_data: Value = serde_json::from_str(json_str)
            .map_err(|e| PlanError::invalid(format!("Invalid JSON in response: {e}")))?;

        let steps_value = plan_data
            .get("steps")
            .ok_or_else(|| PlanError::invalid("Plan missing 'steps' field"))?;
        let raw_steps = steps_value
            .as_array()
            .ok_or_else(|| PlanError::invalid("'steps' must be a list"))?;
        if raw_steps.is_empty() {
            return Err(PlanError::invalid("Plan must have at least one step"));
        }

        let mut steps = Vec::with_capacity(raw_steps.len());
        for (index, raw_step) in raw_steps.iter().enumerate() {
            let step = self
                .validate_step(raw_step)
                .map_err(|reason| PlanError::invalid(format!("Invalid step {}: {reason}", index + 1)))?;
            steps.push(step);
        }

        Ok(Plan::new(steps))
    }

    fn validate_step(&self, raw_step: &Value) -> Result<PlanStep, String> {
        let object = raw_step
            .as_object()
            .ok_or_else(|| "step must be an object".to_string())?;

        for field in ["step_number", "tool", "input", "reasoning"] {
            if !object.contains_key(field) {
                return Err(format!("Missing required field: '{field}'"));
            }
        }

        let step_number = object["step_number"]
            .as_u64()
            .and_then(|n| u32::try_from(n).ok())
            .ok_or_else(|| "step_number must be a non-negative integer".to_string())?;

        let tool_name = object["tool"]
            .as_str()
            .ok_or_else(|| "tool must be a string".to_string())?;
        let tool = self.registry.get(tool_name).ok_or_else(|| {
            format!(
                "Tool '{tool_name}' not found. Available tools: {:?}",
                self.registry.tool_names()
            )
        })?;

        let input: &JsonMap = object["input"]
            .as_object()
            .ok_or_else(|| "input must be an object".to_string())?;
        tool.input_schema()
            .validate(input)
            .map_err(|e| format!("Input validation failed for tool '{tool_name}': {e}"))?;

        let reasoning = object["reasoning"]
            .as_str()
            .ok_or_else(|| "reasoning must be a string".to_string())?;

        Ok(PlanStep {
            step_number,
            tool: tool_name.to_string(),
            input: input.clone(),
            reasoning: reasoning.to_string(),
        })
    }
}

#[async_trait]
impl Planner for LlmPlanner {
    async fn create_plan(&self, prompt: &str) -> Result<Plan, PlanError> {
        if prompt.trim().is_empty() {
            return Err(PlanError::EmptyPrompt);
        }

        let tools_info = self.format_tools();

        let first_attempt = async {
            let raw = self
                .chat(vec![
                    ChatMessage {
                        role: "system",
                        content: self.system_prompt(&tools_info),
                    },
                    ChatMessage {
                        role: "user",
                        content: prompt.to_string(),
                    },
                ])
                .await?;
            self.parse_and_validate(&raw)
        };

        match first_attempt.await {
            Ok(plan) => Ok(plan),
            Err(first_error) => {
                tracing::warn!(%first_error, "plan generation failed, retrying with simplified prompt");
                let raw = self
                    .chat(vec![ChatMessage {
                        role: "user",
                        content: self.fallback_prompt(&tools_info, prompt),
                    }])
                    .await
                    .map_err(|e| PlanError::invalid(e.to_string()))?;
                self.parse_and_validate(&raw)
                    .map_err(|e| PlanError::invalid(e.to_string()))
            }
        }
    }
}

/// Pull the JSON object out of a model response.
///
/// Preference order: fenced ```json block, then the outermost
/// brace-delimited span, then the trimmed text as-is (letting the JSON
/// parser produce the error).
fn extract_json(text: &str) -> &str {
    static FENCED: OnceLock<Regex> = OnceLock::new();
    static RAW: OnceLock<Regex> = OnceLock::new();

    let fenced = FENCED
        .get_or_init(|| Regex::new(r"(?s)```(?:json)?\s*(\{.*?\})\s*```").expect("valid regex"));
    if let Some(captures) = fenced.captures(text) {
        if let Some(group) = captures.get(1) {
            return group.as_str();
        }
    }

    let raw = RAW.get_or_init(|| Regex::new(r"(?s)\{.*\}").expect("valid regex"));
    if let Some(found) = raw.find(text) {
        return found.as_str();
    }

    text.trim()
}
