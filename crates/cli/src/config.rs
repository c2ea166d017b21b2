use annocurate_core::classifier::DEFAULT_MAX_RESPONSE_LENGTH;
use annocurate_store::DEFAULT_PATTERN;
use anyhow::Context;

/// Defaults for command-line options, loaded from the environment.
///
/// Explicit flags always win over these values.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CliConfig {
    /// Glob for directory inputs.
    pub pattern: String,
    /// File-name prefix excluded from directory inputs.
    pub exclude_prefix: Option<String>,
    /// Maximum response length for `check` and `flag`.
    pub max_length: usize,
}

impl Default for CliConfig {
    fn default() -> Self {
        Self {
            pattern: DEFAULT_PATTERN.to_string(),
            exclude_prefix: None,
            max_length: DEFAULT_MAX_RESPONSE_LENGTH,
        }
    }
}

impl CliConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                     | Default        |
    /// |-----------------------------|----------------|
    /// | `ANNOCURATE_PATTERN`        | `shared*.json` |
    /// | `ANNOCURATE_EXCLUDE_PREFIX` | (none)         |
    /// | `ANNOCURATE_MAX_LENGTH`     | `10000`        |
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let defaults = Self::default();

        let pattern = lookup("ANNOCURATE_PATTERN")
            .filter(|p| !p.trim().is_empty())
            .unwrap_or(defaults.pattern);

        let exclude_prefix = lookup("ANNOCURATE_EXCLUDE_PREFIX").filter(|p| !p.is_empty());

        let max_length = match lookup("ANNOCURATE_MAX_LENGTH") {
            Some(raw) => raw
                .trim()
                .parse()
                .with_context(|| format!("ANNOCURATE_MAX_LENGTH must be a valid usize, got '{raw}'"))?,
            None => defaults.max_length,
        };

        Ok(Self {
            pattern,
            exclude_prefix,
            max_length,
        })
    }
}
