//! Token source DTO.

/// Where the API token came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenSource {
    /// `--token` on the command line.
    CommandLine,
    /// `PATCHBAY_API_TOKEN`.
    Environment,
    /// `[http] token` in the config file.
    ConfigFile,
}

impl TokenSource {
    /// Returns human-readable description.
    #[must_use]
    pub const fn description(&self) -> &'static str {
        match self {
            Self::CommandLine => "command line",
            Self::Environment => "environment variable",
            Self::ConfigFile => "config file",
        }
    }
}

impl std::fmt::Display for TokenSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.description())
    }
}
