//! Readable configuration sources.
//!
//! A [`Resource`] is an opaque handle to definition content. Contexts never
//! care where the bytes come from; they only open and hand them to a
//! [`DefinitionReader`](crate::reader::DefinitionReader).

use std::fmt;
use std::fs::File;
use std::io::{Cursor, Read};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use thiserror::Error;

/// Errors raised while resolving or opening a resource.
#[derive(Debug, Error)]
pub enum ResourceError {
    #[error("resource location is empty")]
    EmptyLocation,
    #[error("unsupported resource scheme '{scheme}' in location '{location}'")]
    UnsupportedScheme { scheme: String, location: String },
    #[error("invalid resource URL '{location}'")]
    InvalidUrl {
        location: String,
        #[source]
        source: url::ParseError,
    },
    #[error("resource not found: {description}")]
    NotFound { description: String },
    #[error("I/O error reading {description}")]
    Io {
        description: String,
        #[source]
        source: std::io::Error,
    },
}

/// Opaque, readable handle to configuration content.
pub trait Resource: Send + Sync {
    /// Human-readable identity used in logs and error messages.
    fn description(&self) -> String;

    fn exists(&self) -> bool;

    /// Open a fresh reader positioned at the start of the content.
    fn open(&self) -> Result<Box<dyn Read + Send>, ResourceError>;

    fn read_to_string(&self) -> Result<String, ResourceError> {
        let mut out = String::new();
        self.open()?
            .read_to_string(&mut out)
            .map_err(|source| ResourceError::Io {
                description: self.description(),
                source,
            })?;
        Ok(out)
    }
}

impl fmt::Debug for dyn Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.description())
    }
}

/// Resource backed by a file on disk.
#[derive(Debug, Clone)]
pub struct FileResource {
    path: PathBuf,
}

impl FileResource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Resource for FileResource {
    fn description(&self) -> String {
        format!("file [{}]", self.path.display())
    }

    fn exists(&self) -> bool {
        self.path.is_file()
    }

    fn open(&self) -> Result<Box<dyn Read + Send>, ResourceError> {
        let file = File::open(&self.path).map_err(|source| {
            if source.kind() == std::io::ErrorKind::NotFound {
                ResourceError::NotFound {
                    description: self.description(),
                }
            } else {
                ResourceError::Io {
                    description: self.description(),
                    source,
                }
            }
        })?;
        Ok(Box::new(file))
    }
}

/// Resource holding its content in memory.
#[derive(Clone)]
pub struct InMemoryResource {
    name: String,
    content: Arc<[u8]>,
}

impl InMemoryResource {
    pub fn new(name: impl Into<String>, content: impl Into<Vec<u8>>) -> Self {
        Self {
            name: name.into(),
            content: Arc::from(content.into()),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl fmt::Debug for InMemoryResource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InMemoryResource")
            .field("name", &self.name)
            .field("len", &self.content.len())
            .finish()
    }
}

impl Resource for InMemoryResource {
    fn description(&self) -> String {
        format!("in-memory [{}]", self.name)
    }

    fn exists(&self) -> bool {
        true
    }

    fn open(&self) -> Result<Box<dyn Read + Send>, ResourceError> {
        Ok(Box::new(Cursor::new(self.content.clone())))
    }
}

/// Resource compiled into the binary, e.g. via `include_bytes!`.
#[derive(Debug, Clone, Copy)]
pub struct StaticResource {
    name: &'static str,
    content: &'static [u8],
}

impl StaticResource {
    pub const fn new(name: &'static str, content: &'static [u8]) -> Self {
        Self { name, content }
    }
}

impl Resource for StaticResource {
    fn description(&self) -> String {
        format!("embedded [{}]", self.name)
    }

    fn exists(&self) -> bool {
        true
    }

    fn open(&self) -> Result<Box<dyn Read + Send>, ResourceError> {
        Ok(Box::new(self.content))
    }
}
