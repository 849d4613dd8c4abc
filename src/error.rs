// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! Error types for the label store and skeleton graph.

use std::fmt;

/// Result type alias for label operations.
pub type Result<T> = std::result::Result<T, LabelError>;

/// Main error type for the label library.
#[derive(Debug)]
pub enum LabelError {
    /// An operation was attempted before a skeleton was registered.
    SkeletonNotLoaded,
    /// Keypoint names or order in imported data differ from the skeleton.
    SkeletonMismatch {
        /// Node names of the registered skeleton, in order.
        expected: Vec<String>,
        /// Keypoint names found in the imported data, in order.
        found: Vec<String>,
    },
    /// Two skeleton nodes would share a name.
    DuplicateName(String),
    /// A named node does not exist.
    NotFound(String),
    /// Imported data holds more distinct tracks than the project allows.
    TrackCountExceeded {
        /// Distinct tracks in the import.
        found: usize,
        /// Maximum allowed by the project.
        max: usize,
    },
    /// Track names could not be mapped onto the project's names.
    TrackNameUnresolved,
    /// Unparseable file, wrong column count or non-numeric field.
    MalformedInput(String),
    /// An import was cancelled between files.
    Cancelled,
    /// Invalid configuration provided.
    ConfigError(String),
    /// YAML could not be read or written.
    YamlError(String),
    /// IO error with context (file not found, permission denied, etc.).
    IoError(String),
    /// Wrapped `std::io::Error`
    Io(std::io::Error),
}

impl LabelError {
    /// Whether this error aborts an entire import rather than a single row or file.
    #[must_use]
    pub const fn is_structural(&self) -> bool {
        matches!(
            self,
            Self::SkeletonNotLoaded
                | Self::SkeletonMismatch { .. }
                | Self::TrackCountExceeded { .. }
                | Self::TrackNameUnresolved
                | Self::Cancelled
        )
    }
}

impl fmt::Display for LabelError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SkeletonNotLoaded => write!(f, "Skeleton information has not been loaded"),
            Self::SkeletonMismatch { expected, found } => write!(
                f,
                "Skeleton mismatch: project expects [{}] but data has [{}]",
                expected.join(", "),
                found.join(", ")
            ),
            Self::DuplicateName(name) => write!(f, "Duplicate name: {name}"),
            Self::NotFound(name) => write!(f, "Not found: {name}"),
            Self::TrackCountExceeded { found, max } => write!(
                f,
                "Track count exceeded: {found} tracks found, at most {max} allowed"
            ),
            Self::TrackNameUnresolved => write!(f, "Track names could not be resolved"),
            Self::MalformedInput(msg) => write!(f, "Malformed input: {msg}"),
            Self::Cancelled => write!(f, "Import cancelled"),
            Self::ConfigError(msg) => write!(f, "Config error: {msg}"),
            Self::YamlError(msg) => write!(f, "YAML error: {msg}"),
            Self::IoError(msg) => write!(f, "IO error: {msg}"),
            Self::Io(err) => write!(f, "IO error: {err}"),
        }
    }
}

impl std::error::Error for LabelError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(err) => Some(err),
            _ => None,
        }
    }
}

impl From<std::io::Error> for LabelError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err)
    }
}

impl From<serde_yaml::Error> for LabelError {
    fn from(err: serde_yaml::Error) -> Self {
        Self::YamlError(err.to_string())
    }
}
