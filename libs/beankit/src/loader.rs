//! Location string → [`Resource`] resolution.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use dashmap::DashMap;
use url::Url;

use crate::resource::{FileResource, Resource, ResourceError};

pub const FILE_SCHEME: &str = "file";
pub const EMBEDDED_SCHEME: &str = "embedded";

/// Maps a location identifier to a readable resource.
pub trait ResourceLoader: Send + Sync {
    fn get_resource(&self, location: &str) -> Result<Arc<dyn Resource>, ResourceError>;
}

/// Resolves file-system paths and named embedded resources.
///
/// Supported forms:
/// - `file:///abs/path.xml`, `file:rel/path.xml`, or a bare path
/// - `embedded://name` for resources added via [`register_embedded`](Self::register_embedded)
///
/// Relative paths are joined onto the loader's base directory.
pub struct DefaultResourceLoader {
    base_dir: PathBuf,
    embedded: DashMap<String, Arc<dyn Resource>>,
}

impl std::fmt::Debug for DefaultResourceLoader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let embedded: Vec<String> = self.embedded.iter().map(|e| e.key().clone()).collect();
        f.debug_struct("DefaultResourceLoader")
            .field("base_dir", &self.base_dir)
            .field("embedded", &embedded)
            .finish()
    }
}

impl Default for DefaultResourceLoader {
    fn default() -> Self {
        Self::new(PathBuf::from("."))
    }
}

impl DefaultResourceLoader {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
            embedded: DashMap::new(),
        }
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    /// Make `resource` resolvable as `embedded://{name}`; replaces any earlier entry.
    pub fn register_embedded(&self, name: impl Into<String>, resource: Arc<dyn Resource>) {
        self.embedded.insert(name.into(), resource);
    }

    pub fn with_embedded(self, name: impl Into<String>, resource: Arc<dyn Resource>) -> Self {
        self.register_embedded(name, resource);
        self
    }

    fn file_resource(&self, path: &Path) -> Result<Arc<dyn Resource>, ResourceError> {
        let path = if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.base_dir.join(path)
        };
        let res = FileResource::new(path);
        if !res.exists() {
            return Err(ResourceError::NotFound {
                description: res.description(),
            });
        }
        Ok(Arc::new(res))
    }

    fn embedded_resource(&self, name: &str) -> Result<Arc<dyn Resource>, ResourceError> {
        self.embedded
            .get(name)
            .map(|r| r.value().clone())
            .ok_or_else(|| ResourceError::NotFound {
                description: format!("embedded [{name}]"),
            })
    }
}

impl ResourceLoader for DefaultResourceLoader {
    fn get_resource(&self, location: &str) -> Result<Arc<dyn Resource>, ResourceError> {
        let location = location.trim();
        if location.is_empty() {
            return Err(ResourceError::EmptyLocation);
        }

        let resolved = match location.split_once("://") {
            Some((EMBEDDED_SCHEME, name)) => self.embedded_resource(name),
            Some((FILE_SCHEME, _)) => {
                let url = Url::parse(location).map_err(|source| ResourceError::InvalidUrl {
                    location: location.to_string(),
                    source,
                })?;
                let path = url
                    .to_file_path()
                    .map_err(|_| ResourceError::NotFound {
                        description: format!("file [{location}]"),
                    })?;
                self.file_resource(&path)
            }
            Some((scheme, _)) => Err(ResourceError::UnsupportedScheme {
                scheme: scheme.to_string(),
                location: location.to_string(),
            }),
            None => match location.strip_prefix("file:") {
                Some(rest) => self.file_resource(Path::new(rest)),
                None => self.file_resource(Path::new(location)),
            },
        };

        match &resolved {
            Ok(res) => tracing::debug!(location, resource = %res.description(), "Resolved location"),
            Err(e) => tracing::debug!(location, error = %e, "Failed to resolve location"),
        }
        resolved
    }
}
