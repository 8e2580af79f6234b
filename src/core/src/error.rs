use thiserror::Error;

/// Hoist error types
#[derive(Error, Debug)]
pub enum HoistError {
    /// A required collaborator or setting is missing
    #[error("Configuration error: {0}")]
    Config(String),

    /// Image, builder or driver could not be resolved
    #[error("Not found: {name}{}", format_versions(.versions))]
    NotFound { name: String, versions: Vec<String> },

    /// Index collision in a store or registry
    #[error("Duplicate: '{name}:{version}' is already registered")]
    Duplicate { name: String, version: String },

    /// Credentials resolved for a registry are not usable by the build
    #[error(
        "Invalid credentials method for '{registry}'. Found '{method}' when is expected basic auth method"
    )]
    AuthMethodMismatch { registry: String, method: String },

    /// Aggregated per-step build failures
    #[error("{}", format_errors(.0))]
    Build(Vec<HoistError>),

    /// Template rendering error
    #[error("Render error: {0}")]
    Render(String),

    /// Semantic version error
    #[error("Semver error: {0}")]
    Semver(String),

    /// Build driver error
    #[error("Driver error: {driver} - {message}")]
    Driver { driver: String, message: String },

    /// Dispatcher error
    #[error("Dispatch error: {0}")]
    Dispatch(String),

    /// Job error
    #[error("Job error: {0}")]
    Job(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

fn format_errors(errors: &[HoistError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("\n")
}

fn format_versions(versions: &[String]) -> String {
    if versions.is_empty() {
        String::new()
    } else {
        format!(" version(s) [{}]", versions.join(", "))
    }
}

impl HoistError {
    /// Shorthand for a not-found error on a single name/version pair.
    pub fn not_found(name: impl Into<String>, version: impl Into<String>) -> Self {
        HoistError::NotFound {
            name: name.into(),
            versions: vec![version.into()],
        }
    }
}

impl From<serde_json::Error> for HoistError {
    fn from(err: serde_json::Error) -> Self {
        HoistError::Serialization(err.to_string())
    }
}

impl From<serde_yaml::Error> for HoistError {
    fn from(err: serde_yaml::Error) -> Self {
        HoistError::Serialization(err.to_string())
    }
}

/// Result type alias for hoist operations
pub type Result<T> = std::result::Result<T, HoistError>;
