//! Function handlers served by the in-memory registry.
//!
//! [`Greeter`] is the tutorial function: it greets the `name` field of its
//! event, or the world when there is none.

use serde_json::Value;

/// Result of running a handler once.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HandlerOutput {
    /// Return value; `None` serialises as JSON `null`.
    pub value: Option<Value>,
    /// Lines the handler logged.
    pub log: Vec<String>,
}

/// A function body that takes an optional JSON event.
pub trait Handler: Send + Sync {
    fn handle(&self, event: Option<&Value>) -> HandlerOutput;
}

/// Greets `event.name`, falling back to "world".
///
/// Any truthy scalar counts as a name: a non-empty string, a non-zero number,
/// or `true`. Null, false, zero, objects and arrays fall back.
#[derive(Debug, Clone, Copy, Default)]
pub struct Greeter;

impl Greeter {
    pub fn greeting(event: Option<&Value>) -> String {
        match event.and_then(|e| e.get("name")).and_then(Self::display_name) {
            Some(name) => format!("Hello, {}!", name),
            None => "Hello, world!".to_string(),
        }
    }

    fn display_name(name: &Value) -> Option<String> {
        match name {
            Value::String(s) if !s.is_empty() => Some(s.clone()),
            Value::Number(n) if n.as_f64() != Some(0.0) => Some(n.to_string()),
            Value::Bool(true) => Some("true".to_string()),
            _ => None,
        }
    }
}

impl Handler for Greeter {
    fn handle(&self, event: Option<&Value>) -> HandlerOutput {
        let greeting = Self::greeting(event);
        HandlerOutput {
            log: vec![greeting.clone()],
            value: Some(Value::String(greeting)),
        }
    }
}
