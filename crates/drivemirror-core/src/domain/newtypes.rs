//! Domain newtypes with validation
//!
//! This module provides strongly-typed wrappers for the identifiers and paths
//! that cross the boundary between the local filesystem and the remote store.
//! Each newtype ensures data validity at construction time.

use std::fmt::{self, Display, Formatter};
use std::path::{Component, Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::errors::DomainError;

// ============================================================================
// Local path types
// ============================================================================

/// A validated absolute path on the local filesystem
///
/// SyncPath ensures the path is:
/// - Absolute (starts with /)
/// - Normalized (no . or .. components)
/// - Within the watched root when validated against one
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "PathBuf", into = "PathBuf")]
pub struct SyncPath(PathBuf);

impl SyncPath {
    /// Create a new SyncPath, validating it is absolute
    ///
    /// # Errors
    /// Returns `DomainError::InvalidPath` if the path is not absolute
    pub fn new(path: PathBuf) -> Result<Self, DomainError> {
        if !path.is_absolute() {
            return Err(DomainError::InvalidPath(format!(
                "Path must be absolute: {}",
                path.display()
            )));
        }

        // We don't use fs::canonicalize() as the path might not exist anymore
        let normalized = Self::normalize_path(&path)?;
        Ok(Self(normalized))
    }

    /// Get the inner path reference
    #[must_use]
    pub fn as_path(&self) -> &Path {
        &self.0
    }

    /// Convert to owned PathBuf
    #[must_use]
    pub fn into_path_buf(self) -> PathBuf {
        self.0
    }

    /// Get the path relative to a root
    ///
    /// # Errors
    /// Returns error if this path is not within the root
    pub fn relative_to(&self, root: &SyncPath) -> Result<PathBuf, DomainError> {
        self.0
            .strip_prefix(&root.0)
            .map(|p| p.to_path_buf())
            .map_err(|_| {
                DomainError::PathNotInSyncRoot(format!(
                    "{} is not within {}",
                    self.0.display(),
                    root.0.display()
                ))
            })
    }

    /// Normalize a path by resolving . and .. components
    fn normalize_path(path: &Path) -> Result<PathBuf, DomainError> {
        let mut normalized = PathBuf::new();

        for component in path.components() {
            match component {
                Component::Prefix(p) => normalized.push(p.as_os_str()),
                Component::RootDir => normalized.push("/"),
                Component::CurDir => {}
                Component::ParentDir => {
                    if !normalized.pop() {
                        return Err(DomainError::InvalidPath(
                            "Path escapes root via ..".to_string(),
                        ));
                    }
                }
                Component::Normal(c) => normalized.push(c),
            }
        }

        Ok(normalized)
    }
}

impl Display for SyncPath {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.display())
    }
}

impl TryFrom<PathBuf> for SyncPath {
    type Error = DomainError;

    fn try_from(path: PathBuf) -> Result<Self, Self::Error> {
        Self::new(path)
    }
}

impl From<SyncPath> for PathBuf {
    fn from(sync_path: SyncPath) -> Self {
        sync_path.0
    }
}

impl AsRef<Path> for SyncPath {
    fn as_ref(&self) -> &Path {
        &self.0
    }
}

// ============================================================================
// Label paths
// ============================================================================

/// Separator used between labels in a derived label-path
pub const LABEL_SEPARATOR: char = '/';

/// A `/`-joined sequence of node labels, relative to the remote root
///
/// The remote store has no native path concept; a label-path is what you get
/// by walking labels from the root down to a node. The empty label-path names
/// the root itself. Local relative paths are converted into this form so the
/// two sides can be compared byte for byte.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LabelPath(String);

impl LabelPath {
    /// The label-path of the root node
    #[must_use]
    pub fn root() -> Self {
        Self(String::new())
    }

    /// Converts a path relative to the watched root into a label-path
    ///
    /// `.` components are dropped; `..`, absolute prefixes and components that
    /// are not valid UTF-8 are rejected.
    ///
    /// # Errors
    /// Returns `DomainError::InvalidPath` for the rejected forms above
    pub fn from_relative(path: &Path) -> Result<Self, DomainError> {
        let mut labels: Vec<&str> = Vec::new();

        for component in path.components() {
            match component {
                Component::CurDir => {}
                Component::Normal(c) => {
                    let label = c.to_str().ok_or_else(|| {
                        DomainError::InvalidPath(format!(
                            "Path component is not valid UTF-8: {}",
                            path.display()
                        ))
                    })?;
                    labels.push(label);
                }
                Component::ParentDir => {
                    return Err(DomainError::InvalidPath(format!(
                        "Relative path must not contain '..': {}",
                        path.display()
                    )));
                }
                Component::RootDir | Component::Prefix(_) => {
                    return Err(DomainError::InvalidPath(format!(
                        "Expected a relative path: {}",
                        path.display()
                    )));
                }
            }
        }

        Ok(Self(labels.join("/")))
    }

    /// Get the inner string reference
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns true for the root label-path
    #[must_use]
    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }

    /// Splits the label-path into its ordered labels (empty for the root)
    #[must_use]
    pub fn segments(&self) -> Vec<&str> {
        if self.0.is_empty() {
            Vec::new()
        } else {
            self.0.split(LABEL_SEPARATOR).collect()
        }
    }

    /// Number of labels in the path (0 for the root)
    #[must_use]
    pub fn depth(&self) -> usize {
        self.segments().len()
    }

    /// Appends a label without validation
    ///
    /// Remote labels may legitimately contain the separator; such a child can
    /// never equal a label-path produced by [`LabelPath::from_relative`].
    #[must_use]
    pub fn child(&self, label: &str) -> Self {
        if self.0.is_empty() {
            Self(label.to_string())
        } else {
            Self(format!("{}{LABEL_SEPARATOR}{label}", self.0))
        }
    }

    /// Returns the label-path with its last label removed
    #[must_use]
    pub fn parent(&self) -> Option<Self> {
        if self.0.is_empty() {
            return None;
        }

        match self.0.rfind(LABEL_SEPARATOR) {
            Some(idx) => Some(Self(self.0[..idx].to_string())),
            None => Some(Self::root()),
        }
    }

    /// Returns the last label, if any
    #[must_use]
    pub fn file_name(&self) -> Option<&str> {
        if self.0.is_empty() {
            return None;
        }

        self.0.rsplit(LABEL_SEPARATOR).next()
    }
}

impl Display for LabelPath {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            write!(f, "/")
        } else {
            write!(f, "{}", self.0)
        }
    }
}

// ============================================================================
// Remote store types
// ============================================================================

/// Opaque identifier of a node in the remote store
///
/// Ids are globally unique and never interpreted; the only rules are that they
/// are non-empty and carry no whitespace or `/` (they are embedded in URLs).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RemoteId(String);

impl RemoteId {
    /// Create a new RemoteId
    ///
    /// # Errors
    /// Returns error if the ID format is invalid
    pub fn new(id: String) -> Result<Self, DomainError> {
        if id.is_empty() {
            return Err(DomainError::InvalidRemoteId(
                "Remote ID cannot be empty".to_string(),
            ));
        }

        if id.chars().any(|c| c.is_whitespace() || c == '/') {
            return Err(DomainError::InvalidRemoteId(format!(
                "Remote ID contains invalid characters: {id}"
            )));
        }

        Ok(Self(id))
    }

    /// Get the inner string reference
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for RemoteId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for RemoteId {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s.to_string())
    }
}

impl TryFrom<String> for RemoteId {
    type Error = DomainError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::new(s)
    }
}

impl From<RemoteId> for String {
    fn from(id: RemoteId) -> Self {
        id.0
    }
}
