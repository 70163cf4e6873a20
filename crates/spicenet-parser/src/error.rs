//! Error types for spicenet-parser.

use std::fmt;
use std::path::{Path, PathBuf};

use thiserror::Error;

/// Where in the input an error was found.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Location {
    /// Source file, `None` for in-memory text.
    pub file: Option<PathBuf>,
    /// 1-based physical line; 0 when unknown.
    pub line: usize,
}

impl Location {
    pub fn new(file: Option<PathBuf>, line: usize) -> Self {
        Self { file, line }
    }

    /// Location on a line of in-memory text.
    pub fn line(line: usize) -> Self {
        Self { file: None, line }
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.file, self.line) {
            (Some(file), 0) => write!(f, "{}", file.display()),
            (Some(file), line) => write!(f, "{}:{}", file.display(), line),
            (None, 0) => write!(f, "<input>"),
            (None, line) => write!(f, "line {}", line),
        }
    }
}

#[derive(Debug, Error)]
pub enum Error {
    #[error("{location}: {message}: `{text}`")]
    MalformedInput {
        location: Location,
        message: String,
        text: String,
    },

    #[error("{location}: unknown directive .{keyword}")]
    UnknownDirective {
        location: Location,
        keyword: String,
        text: String,
    },

    #[error("{location}: {instance} references undefined subcircuit {name}")]
    UndefinedSubcircuit {
        location: Location,
        instance: String,
        name: String,
        text: String,
    },

    #[error(
        "{location}: {instance} connects {found} nodes but subcircuit {name} has {expected} ports"
    )]
    PortArityMismatch {
        location: Location,
        instance: String,
        name: String,
        expected: usize,
        found: usize,
        text: String,
    },

    #[error("{location}: subcircuit {name} is already defined with different content")]
    DuplicateSubcircuitName {
        location: Location,
        name: String,
        text: String,
    },

    #[error("recursive subcircuit instantiation: {}", chain.join(" -> "))]
    RecursiveSubcircuit { chain: Vec<String> },

    #[error("{location}: library not found: {}", path.display())]
    LibraryNotFound {
        location: Location,
        path: PathBuf,
        text: String,
    },

    #[error("{location}: model {name} is not defined in the netlist or any included library")]
    ModelNotFound {
        location: Location,
        name: String,
        text: String,
    },

    #[error("node not found: {0}")]
    NodeNotFound(String),

    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub(crate) fn malformed(location: &Location, message: impl Into<String>, text: &str) -> Self {
        Error::MalformedInput {
            location: location.clone(),
            message: message.into(),
            text: text.to_string(),
        }
    }

    /// Attach a location and source text to a circuit-level error.
    pub fn lift(err: spicenet_core::Error, location: &Location, text: &str) -> Self {
        use spicenet_core::Error as Core;
        match err {
            Core::NodeNotFound(name) => Error::NodeNotFound(name),
            Core::DuplicateSubcircuitName { name } => Error::DuplicateSubcircuitName {
                location: location.clone(),
                name,
                text: text.to_string(),
            },
            Core::UndefinedSubcircuit { instance, name } => Error::UndefinedSubcircuit {
                location: location.clone(),
                instance,
                name,
                text: text.to_string(),
            },
            Core::PortArityMismatch {
                instance,
                name,
                expected,
                found,
            } => Error::PortArityMismatch {
                location: location.clone(),
                instance,
                name,
                expected,
                found,
                text: text.to_string(),
            },
            Core::RecursiveSubcircuit { chain } => Error::RecursiveSubcircuit { chain },
        }
    }

    /// Fill in the source file on errors that were raised without one.
    pub fn in_file(mut self, path: &Path) -> Self {
        if let Some(location) = self.location_mut()
            && location.file.is_none()
        {
            location.file = Some(path.to_path_buf());
        }
        self
    }

    /// The location this error points at, if any.
    pub fn location(&self) -> Option<&Location> {
        match self {
            Error::MalformedInput { location, .. }
            | Error::UnknownDirective { location, .. }
            | Error::UndefinedSubcircuit { location, .. }
            | Error::PortArityMismatch { location, .. }
            | Error::DuplicateSubcircuitName { location, .. }
            | Error::LibraryNotFound { location, .. }
            | Error::ModelNotFound { location, .. } => Some(location),
            Error::RecursiveSubcircuit { .. } | Error::NodeNotFound(_) | Error::Io { .. } => None,
        }
    }

    fn location_mut(&mut self) -> Option<&mut Location> {
        match self {
            Error::MalformedInput { location, .. }
            | Error::UnknownDirective { location, .. }
            | Error::UndefinedSubcircuit { location, .. }
            | Error::PortArityMismatch { location, .. }
            | Error::DuplicateSubcircuitName { location, .. }
            | Error::LibraryNotFound { location, .. }
            | Error::ModelNotFound { location, .. } => Some(location),
            Error::RecursiveSubcircuit { .. } | Error::NodeNotFound(_) | Error::Io { .. } => None,
        }
    }
}

impl From<spicenet_core::Error> for Error {
    fn from(err: spicenet_core::Error) -> Self {
        Error::lift(err, &Location::default(), "")
    }
}
