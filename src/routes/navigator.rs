use std::sync::{Mutex, PoisonError};

/// Navigation capability supplied by the host.
pub trait Navigator: Send + Sync {
    /// Current location: path plus optional query string and fragment.
    fn current_path(&self) -> String;

    /// Full navigation away from the current view.
    fn redirect(&self, url: &str);
}

/// Navigator for hosts without a real view stack, such as the CLI. The
/// location is fixed at construction and redirects are logged and recorded.
#[derive(Debug, Default)]
pub struct StaticNavigator {
    location: Mutex<String>,
    redirects: Mutex<Vec<String>>,
}

impl StaticNavigator {
    pub fn new(location: impl Into<String>) -> Self {
        Self {
            location: Mutex::new(location.into()),
            redirects: Mutex::new(Vec::new()),
        }
    }

    pub fn set_location(&self, location: impl Into<String>) {
        *self.location.lock().unwrap_or_else(PoisonError::into_inner) = location.into();
    }

    pub fn redirects(&self) -> Vec<String> {
        self.redirects
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl Navigator for StaticNavigator {
    fn current_path(&self) -> String {
        self.location
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn redirect(&self, url: &str) {
        tracing::warn!("Redirecting to {}", url);

        self.redirects
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(url.to_string());
    }
}
