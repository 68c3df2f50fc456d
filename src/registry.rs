//! Name-to-library resolution for the request-dispatch boundary. The
//! registry is explicit: an inbound request's first path segment selects an
//! extension library, misses are a result value rather than an error, and an
//! empty segment redirects to the default UI path.

use crate::config::StoreConfig;
use crate::error::StoreError;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

/// Fixed prefix tried before the bare library name.
const LIBRARY_PREFIX: &str = "lib";

/// Where an empty first path segment lands.
pub const DEFAULT_UI_PATH: &str = "/ui/start";

/// A library capable of serving web requests.
pub trait WebHandler: Send + Sync {
    fn handle(&self, path: &str) -> Result<String, StoreError>;
}

#[derive(Clone)]
pub enum Resolution {
    Handler(Arc<dyn WebHandler>),
    Redirect(&'static str),
    NotFound,
}

#[derive(Default)]
pub struct LibraryRegistry {
    libraries: HashMap<String, Arc<dyn WebHandler>>,
}

impl LibraryRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, name: impl Into<String>, handler: Arc<dyn WebHandler>) {
        self.libraries.insert(name.into(), handler);
    }

    /// Resolves the first path segment of an inbound request. Lookup tries
    /// the fixed prefix plus the capitalized name first, then the bare name.
    pub fn resolve(&self, first_segment: &str) -> Resolution {
        if first_segment.is_empty() {
            return Resolution::Redirect(DEFAULT_UI_PATH);
        }
        let prefixed = format!("{LIBRARY_PREFIX}{}", capitalize(first_segment));
        if let Some(handler) = self.libraries.get(&prefixed) {
            return Resolution::Handler(Arc::clone(handler));
        }
        if let Some(handler) = self.libraries.get(first_segment) {
            return Resolution::Handler(Arc::clone(handler));
        }
        debug!(segment = first_segment, "no library for path segment");
        Resolution::NotFound
    }
}

fn capitalize(name: &str) -> String {
    let mut chars = name.chars();
    match chars.next() {
        None => String::new(),
        Some(first) => first.to_uppercase().chain(chars).collect(),
    }
}

/// Renders an uncaught dispatch failure as an HTML page carrying the numeric
/// status and either the short description or the full failure trace. The
/// trace is suppressed when the configuration says so.
pub fn render_error_page(
    config: &StoreConfig,
    status: u16,
    description: &str,
    trace: Option<&str>,
) -> String {
    let body = match trace {
        Some(trace) if !config.suppress_error_traces => trace,
        _ => description,
    };
    format!(
        "<html><head><title>{status}</title></head>\
         <body><h1>{status}</h1><pre>{}</pre></body></html>",
        escape_html(body)
    )
}

fn escape_html(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

#[cfg(test)]
mod tests {
    use super::{DEFAULT_UI_PATH, LibraryRegistry, Resolution, WebHandler, render_error_page};
    use crate::config::StoreConfig;
    use crate::error::StoreError;
    use std::sync::Arc;

    struct Echo(&'static str);

    impl WebHandler for Echo {
        fn handle(&self, _path: &str) -> Result<String, StoreError> {
            Ok(self.0.to_string())
        }
    }

    #[test]
    fn prefixed_name_wins_over_bare_name() {
        let mut registry = LibraryRegistry::new();
        registry.register("libReports", Arc::new(Echo("prefixed")));
        registry.register("reports", Arc::new(Echo("bare")));

        let Resolution::Handler(handler) = registry.resolve("reports") else {
            panic!("expected a handler");
        };
        assert_eq!(handler.handle("/").expect("handle"), "prefixed");
    }

    #[test]
    fn bare_name_is_the_fallback() {
        let mut registry = LibraryRegistry::new();
        registry.register("reports", Arc::new(Echo("bare")));
        assert!(matches!(registry.resolve("reports"), Resolution::Handler(_)));
    }

    #[test]
    fn empty_segment_redirects_and_misses_are_not_errors() {
        let registry = LibraryRegistry::new();
        assert!(matches!(
            registry.resolve(""),
            Resolution::Redirect(DEFAULT_UI_PATH)
        ));
        assert!(matches!(registry.resolve("nothing"), Resolution::NotFound));
    }

    #[test]
    fn error_page_suppresses_trace_when_configured() {
        let open = render_error_page(&StoreConfig::default(), 500, "boom", Some("trace<detail>"));
        assert!(open.contains("trace&lt;detail&gt;"));

        let closed = render_error_page(&StoreConfig::production(), 500, "boom", Some("trace"));
        assert!(closed.contains("boom"));
        assert!(!closed.contains("trace"));
    }
}
