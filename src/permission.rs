use compact_str::CompactString;
use serde::{Deserialize, Serialize};

/// The caller's execution context, threaded explicitly into every operation
/// that needs it. There is no ambient or thread-local context lookup.
///
/// Semantics are intentionally strict:
/// - `admin` is the only privilege bit this layer knows about.
/// - Commit assumes the dispatching layer already vetted the caller; the
///   secret-store write re-checks `admin` on its own before mutating.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CallerContext {
    pub caller_id: String,
    pub locale: CompactString,
    // Reserved privilege flag: never deserialize from untrusted input.
    #[serde(default, skip_deserializing)]
    admin: bool,
}

impl CallerContext {
    pub fn new(caller_id: impl Into<String>) -> Self {
        Self {
            caller_id: caller_id.into(),
            locale: CompactString::const_new("en-US"),
            admin: false,
        }
    }

    pub fn admin(caller_id: impl Into<String>) -> Self {
        Self {
            caller_id: caller_id.into(),
            locale: CompactString::const_new("en-US"),
            admin: true,
        }
    }

    pub fn with_locale(mut self, locale: impl Into<CompactString>) -> Self {
        self.locale = locale.into();
        self
    }

    pub fn is_admin(&self) -> bool {
        self.admin
    }
}

#[cfg(test)]
mod tests {
    use super::CallerContext;

    #[test]
    fn admin_bit_is_never_deserialized() {
        let json = r#"{"caller_id":"mallory","locale":"en-US","admin":true}"#;
        let ctx: CallerContext = serde_json::from_str(json).expect("parse");
        assert!(!ctx.is_admin());
    }

    #[test]
    fn locale_defaults_and_overrides() {
        let ctx = CallerContext::new("alice");
        assert_eq!(ctx.locale, "en-US");
        let ctx = ctx.with_locale("de-DE");
        assert_eq!(ctx.locale, "de-DE");
    }
}
