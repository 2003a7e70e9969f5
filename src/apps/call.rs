use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};

use super::binding::{Form, SelectOption};

/// Value submitted for a single form field.
///
/// Text fields arrive as plain strings, select fields as `{label, value}`
/// objects. Anything else is kept verbatim so the handler can reject it with
/// a proper validation message instead of failing the whole decode.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Text(String),
    Option(SelectOption),
    Other(serde_json::Value),
}

impl FieldValue {
    /// The string payload: the text itself, or the option's value.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            FieldValue::Text(s) => Some(s),
            FieldValue::Option(opt) => Some(&opt.value),
            FieldValue::Other(_) => None,
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            FieldValue::Text(s) => s.is_empty(),
            FieldValue::Option(opt) => opt.value.is_empty(),
            FieldValue::Other(v) => v.is_null(),
        }
    }

    /// Short JSON type name for error messages.
    pub(crate) fn kind(&self) -> &'static str {
        match self {
            FieldValue::Text(_) => "string",
            FieldValue::Option(_) => "option",
            FieldValue::Other(serde_json::Value::Null) => "null",
            FieldValue::Other(serde_json::Value::Bool(_)) => "bool",
            FieldValue::Other(serde_json::Value::Number(_)) => "number",
            FieldValue::Other(serde_json::Value::Array(_)) => "array",
            FieldValue::Other(_) => "object",
        }
    }
}

/// Caller identity and location. Only the fields the service reads are
/// typed; everything else passes through untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CallContext {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub acting_user_id: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub channel_id: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub bot_user_id: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub bot_access_token: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub mattermost_site_url: String,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CallRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub values: HashMap<String, FieldValue>,
    /// Partial text typed into the field that triggered the call.
    #[serde(default, deserialize_with = "null_as_default")]
    pub query: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selected_field: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub context: CallContext,
}

impl CallRequest {
    /// Populated value for `name`; null and empty values count as absent.
    pub fn value(&self, name: &str) -> Option<&FieldValue> {
        self.values.get(name).filter(|v| !v.is_empty())
    }
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Kind of call, taken from the final segment of the request path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallType {
    Submit,
    Form,
    Lookup,
}

impl CallType {
    /// `/commands/dylan/submit` is a submit; a bare command path is a form
    /// request.
    pub fn from_path(path: &str) -> Self {
        match path.rsplit('/').next() {
            Some("submit") => CallType::Submit,
            Some("lookup") => CallType::Lookup,
            _ => CallType::Form,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            CallType::Submit => "submit",
            CallType::Form => "form",
            CallType::Lookup => "lookup",
        }
    }
}

impl fmt::Display for CallType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result envelope: exactly one of `ok`, `form` or `error`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CallResponse {
    Ok {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        data: Option<serde_json::Value>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        markdown: Option<String>,
    },
    Form {
        form: Form,
    },
    Error {
        error: String,
    },
}

impl CallResponse {
    pub fn data(data: serde_json::Value) -> Self {
        CallResponse::Ok {
            data: Some(data),
            markdown: None,
        }
    }

    pub fn markdown(text: impl Into<String>) -> Self {
        CallResponse::Ok {
            data: None,
            markdown: Some(text.into()),
        }
    }

    pub fn form(form: Form) -> Self {
        CallResponse::Form { form }
    }

    pub fn error(err: impl fmt::Display) -> Self {
        CallResponse::Error {
            error: err.to_string(),
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, CallResponse::Error { .. })
    }
}
