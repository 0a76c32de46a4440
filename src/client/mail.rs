//! Mail-sending POST requests
//!
//! Form fields are flattened with bracketed names (`contact_data[name]=..`)
//! so nested JSON arrives at the server as nested arrays.

use serde_json::Value;

use super::request::{ResponseShape, SSR_FLAG};

/// Which mail action the server should perform
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MailAction {
    /// Store a contact form submission and mail it
    PostContactSendMail,
    /// Send a mail without storing anything
    SendMail,
}

impl MailAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            MailAction::PostContactSendMail => "post_contact_send_mail",
            MailAction::SendMail => "send_mail",
        }
    }

    /// Resource reported in error responses
    pub fn resource(&self) -> &'static str {
        match self {
            MailAction::PostContactSendMail => "contact",
            MailAction::SendMail => "",
        }
    }
}

/// Body of a mail-sending request
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MailRequest {
    contact_target: Option<Value>,
    contact_data: Option<Value>,
    contact_items: Option<Value>,
    config_mail: Option<Value>,
    config_smtp: Option<Value>,
    shape: ResponseShape,
}

impl MailRequest {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_contact_target(mut self, value: Value) -> Self {
        self.contact_target = non_empty(value);
        self
    }

    pub fn with_contact_data(mut self, value: Value) -> Self {
        self.contact_data = non_empty(value);
        self
    }

    pub fn with_contact_items(mut self, value: Value) -> Self {
        self.contact_items = non_empty(value);
        self
    }

    pub fn with_config_mail(mut self, value: Value) -> Self {
        self.config_mail = non_empty(value);
        self
    }

    pub fn with_config_smtp(mut self, value: Value) -> Self {
        self.config_smtp = non_empty(value);
        self
    }

    pub fn with_shape(mut self, shape: ResponseShape) -> Self {
        self.shape = shape;
        self
    }

    pub fn shape(&self) -> ResponseShape {
        self.shape
    }

    /// Form fields for the given action, ready to be URL-encoded
    pub fn form_fields(&self, action: MailAction) -> Vec<(String, String)> {
        let mut fields = vec![
            ("ssr".to_string(), SSR_FLAG.to_string()),
            ("action".to_string(), action.as_str().to_string()),
        ];
        let sections = [
            ("contact_target", &self.contact_target),
            ("contact_data", &self.contact_data),
            ("contact_items", &self.contact_items),
            ("config_mail", &self.config_mail),
            ("config_smtp", &self.config_smtp),
        ];
        for (name, value) in sections {
            if let Some(value) = value {
                flatten_into(name.to_string(), value, &mut fields);
            }
        }
        fields
    }
}

fn non_empty(value: Value) -> Option<Value> {
    let empty = match &value {
        Value::Null => true,
        Value::Object(map) => map.is_empty(),
        Value::Array(items) => items.is_empty(),
        Value::String(s) => s.is_empty(),
        _ => false,
    };
    (!empty).then_some(value)
}

fn flatten_into(prefix: String, value: &Value, out: &mut Vec<(String, String)>) {
    match value {
        Value::Null => {}
        Value::Bool(b) => out.push((prefix, if *b { "1" } else { "0" }.to_string())),
        Value::Number(n) => out.push((prefix, n.to_string())),
        Value::String(s) => out.push((prefix, s.clone())),
        Value::Array(items) => {
            for (i, item) in items.iter().enumerate() {
                flatten_into(format!("{}[{}]", prefix, i), item, out);
            }
        }
        Value::Object(map) => {
            for (k, item) in map {
                flatten_into(format!("{}[{}]", prefix, k), item, out);
            }
        }
    }
}
