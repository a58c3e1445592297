//! Provider-specific training example shapes.
//!
//! Every format emits the same turn order: system instruction, user input,
//! the optional thinking turns (instructions, reasoning, final answer prompt),
//! then the final answer. Formats differ only in how turns are shaped.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use super::training_data::ModelTrainingData;
use crate::error::{ExportError, TrainingDataError};

/// Function name of the synthetic tool call carrying structured answers.
pub const TASK_RESPONSE_TOOL: &str = "task_response";

/// Call id used by the OpenAI tool call format.
pub const OPENAI_TOOL_CALL_ID: &str = "call_1";

/// Supported training file formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DatasetFormat {
    /// OpenAI chat format with a plaintext response.
    #[serde(rename = "openai_chat_jsonl")]
    OpenaiChat,
    /// OpenAI chat format with a JSON response for `response_format` tuning.
    #[serde(rename = "openai_chat_json_schema_jsonl")]
    OpenaiChatJsonSchema,
    /// OpenAI chat format with a tool call response.
    #[serde(rename = "openai_chat_toolcall_jsonl")]
    OpenaiChatToolcall,
    /// HuggingFace chat template.
    #[serde(rename = "huggingface_chat_template_jsonl")]
    HuggingfaceChatTemplate,
    /// HuggingFace chat template with tool calls.
    #[serde(rename = "huggingface_chat_template_toolcall_jsonl")]
    HuggingfaceChatTemplateToolcall,
    /// Vertex AI Gemini 1.5 (flash and pro) contents format.
    #[serde(rename = "vertex_gemini_1_5")]
    VertexGemini15,
}

impl DatasetFormat {
    pub const ALL: [DatasetFormat; 6] = [
        Self::OpenaiChat,
        Self::OpenaiChatJsonSchema,
        Self::OpenaiChatToolcall,
        Self::HuggingfaceChatTemplate,
        Self::HuggingfaceChatTemplateToolcall,
        Self::VertexGemini15,
    ];

    /// Identifier used on the command line and in file names.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::OpenaiChat => "openai_chat_jsonl",
            Self::OpenaiChatJsonSchema => "openai_chat_json_schema_jsonl",
            Self::OpenaiChatToolcall => "openai_chat_toolcall_jsonl",
            Self::HuggingfaceChatTemplate => "huggingface_chat_template_jsonl",
            Self::HuggingfaceChatTemplateToolcall => "huggingface_chat_template_toolcall_jsonl",
            Self::VertexGemini15 => "vertex_gemini_1_5",
        }
    }

    /// Shapes one training example for this format.
    pub fn generate(&self, data: &ModelTrainingData) -> Result<Value, TrainingDataError> {
        match self {
            Self::OpenaiChat => Ok(generate_chat_message_response(data)),
            Self::OpenaiChatJsonSchema => generate_json_schema_message(data),
            Self::OpenaiChatToolcall => generate_chat_message_toolcall(data),
            Self::HuggingfaceChatTemplate => Ok(generate_huggingface_chat_template(data)),
            Self::HuggingfaceChatTemplateToolcall => {
                generate_huggingface_chat_template_toolcall(data)
            }
            Self::VertexGemini15 => Ok(generate_vertex_gemini_1_5(data)),
        }
    }
}

impl fmt::Display for DatasetFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DatasetFormat {
    type Err = ExportError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|format| format.as_str() == s)
            .ok_or_else(|| ExportError::UnsupportedFormat(s.to_string()))
    }
}

/// System and user turns plus the thinking turns, if any, in role/content shape.
fn chat_prefix(data: &ModelTrainingData) -> Vec<Value> {
    let mut messages = vec![
        json!({"role": "system", "content": data.system_message}),
        json!({"role": "user", "content": data.input}),
    ];

    if let Some(thinking) = &data.thinking {
        messages.extend([
            json!({"role": "user", "content": thinking.instructions}),
            json!({"role": "assistant", "content": thinking.thinking}),
            json!({"role": "user", "content": thinking.final_answer_prompt}),
        ]);
    }

    messages
}

fn parse_structured_output(data: &ModelTrainingData) -> Result<Value, TrainingDataError> {
    serde_json::from_str(&data.final_output).map_err(|source| {
        TrainingDataError::MalformedPayload {
            output: data.final_output.clone(),
            source,
        }
    })
}

/// OpenAI chat format with plaintext response.
fn generate_chat_message_response(data: &ModelTrainingData) -> Value {
    let mut messages = chat_prefix(data);
    messages.push(json!({"role": "assistant", "content": data.final_output}));
    json!({ "messages": messages })
}

/// OpenAI chat format with the final answer validated and compacted to one line of JSON.
fn generate_json_schema_message(data: &ModelTrainingData) -> Result<Value, TrainingDataError> {
    let parsed = parse_structured_output(data)?;
    let compact = serde_json::to_string(&parsed).map_err(|source| {
        TrainingDataError::MalformedPayload {
            output: data.final_output.clone(),
            source,
        }
    })?;

    let mut messages = chat_prefix(data);
    messages.push(json!({"role": "assistant", "content": compact}));
    Ok(json!({ "messages": messages }))
}

/// OpenAI chat format answering through a `task_response` tool call.
fn generate_chat_message_toolcall(data: &ModelTrainingData) -> Result<Value, TrainingDataError> {
    let arguments = parse_structured_output(data)?;
    let arguments = serde_json::to_string(&arguments).map_err(|source| {
        TrainingDataError::MalformedPayload {
            output: data.final_output.clone(),
            source,
        }
    })?;

    let mut messages = chat_prefix(data);
    messages.push(json!({
        "role": "assistant",
        "content": null,
        "tool_calls": [{
            "id": OPENAI_TOOL_CALL_ID,
            "type": "function",
            "function": {
                "name": TASK_RESPONSE_TOOL,
                "arguments": arguments,
            },
        }],
    }));
    Ok(json!({ "messages": messages }))
}

/// HuggingFace chat template.
fn generate_huggingface_chat_template(data: &ModelTrainingData) -> Value {
    let mut conversations = chat_prefix(data);
    conversations.push(json!({"role": "assistant", "content": data.final_output}));
    json!({ "conversations": conversations })
}

/// HuggingFace chat template with the structured answer as a tool call.
///
/// Arguments stay a JSON object and every call gets a fresh short id.
fn generate_huggingface_chat_template_toolcall(
    data: &ModelTrainingData,
) -> Result<Value, TrainingDataError> {
    let arguments = parse_structured_output(data)?;

    let mut conversations = chat_prefix(data);
    conversations.push(json!({
        "role": "assistant",
        "tool_calls": [{
            "type": "function",
            "function": {
                "name": TASK_RESPONSE_TOOL,
                "id": short_call_id(),
                "arguments": arguments,
            },
        }],
    }));
    Ok(json!({ "conversations": conversations }))
}

/// Vertex Gemini 1.5 format. The system message moves to `systemInstruction`
/// and assistant turns use the `model` role.
fn generate_vertex_gemini_1_5(data: &ModelTrainingData) -> Value {
    let mut contents = vec![vertex_turn("user", &data.input)];

    if let Some(thinking) = &data.thinking {
        contents.extend([
            vertex_turn("user", &thinking.instructions),
            vertex_turn("model", &thinking.thinking),
            vertex_turn("user", &thinking.final_answer_prompt),
        ]);
    }

    contents.push(vertex_turn("model", &data.final_output));

    json!({
        "systemInstruction": vertex_turn("system", &data.system_message),
        "contents": contents,
    })
}

fn vertex_turn(role: &str, text: &str) -> Value {
    json!({"role": role, "parts": [{"text": text}]})
}

/// First 9 hex characters of a random UUID.
fn short_call_id() -> String {
    let mut id = uuid::Uuid::new_v4().simple().to_string();
    id.truncate(9);
    id
}
