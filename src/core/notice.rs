use serde_json::Value;

pub(crate) const GENERIC_ERROR_MESSAGE: &str = "Unexpected error. Please try again.";

/// Where user-facing failure notices go.
pub trait Notifier: Send + Sync {
    fn error(&self, message: &str);
}

#[derive(Debug, Default, Clone, Copy)]
pub struct TracingNotifier;

impl Notifier for TracingNotifier {
    fn error(&self, message: &str) {
        tracing::error!("{}", message);
    }
}

/// Message for an error body: `message`, then `error`, then a generic text.
pub(crate) fn error_message(body: Option<&Value>) -> String {
    body.and_then(|body| {
        ["message", "error"].iter().find_map(|field| {
            body.get(field)
                .and_then(Value::as_str)
                .filter(|message| !message.is_empty())
        })
    })
    .unwrap_or(GENERIC_ERROR_MESSAGE)
    .to_string()
}
