/// Runtime configuration for the record-store core.
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Maximum number of asynchronously enqueued, not-yet-confirmed commits
    /// a streaming commit accepts before blocking on the store barrier.
    pub commit_watermark: usize,
    /// Cap on the number of distinct values returned by tag-value
    /// enumeration over a matching record set.
    pub tag_vals_cap: usize,
    /// When set, dispatch error pages carry only the short description and
    /// never the full failure trace.
    pub suppress_error_traces: bool,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            commit_watermark: 100,
            tag_vals_cap: 200,
            suppress_error_traces: false,
        }
    }
}

impl StoreConfig {
    pub fn production() -> Self {
        Self {
            suppress_error_traces: true,
            ..Self::default()
        }
    }

    pub fn development() -> Self {
        Self::default()
    }

    pub fn with_commit_watermark(mut self, watermark: usize) -> Self {
        self.commit_watermark = watermark.max(1);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::StoreConfig;

    #[test]
    fn default_watermark_is_one_hundred() {
        let config = StoreConfig::default();
        assert_eq!(config.commit_watermark, 100);
        assert_eq!(config.tag_vals_cap, 200);
        assert!(!config.suppress_error_traces);
    }

    #[test]
    fn watermark_override_never_drops_below_one() {
        let config = StoreConfig::default().with_commit_watermark(0);
        assert_eq!(config.commit_watermark, 1);
    }

    #[test]
    fn production_profile_suppresses_traces() {
        assert!(StoreConfig::production().suppress_error_traces);
    }
}
