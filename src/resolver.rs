//! Cross-schema reference resolution.
//!
//! Every `xs:import`, `xs:include`, `xs:redefine` and `xs:override` found while
//! compiling is offered to the [`ResourceResolver`] first. Relative lookups are
//! always based on the directory of the *first* selected schema file, whichever
//! schema actually declared the reference. When the resolver has no answer the
//! compiler falls back to resolving against the declaring document.

use std::path::{Component, Path, PathBuf};

use url::Url;

/// Kind of schema composition element a reference came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReferenceKind {
    Import,
    Include,
    Redefine,
    Override,
}

impl ReferenceKind {
    /// Map an XSD element local name to a reference kind.
    pub fn from_local_name(name: &[u8]) -> Option<Self> {
        match name {
            b"import" => Some(ReferenceKind::Import),
            b"include" => Some(ReferenceKind::Include),
            b"redefine" => Some(ReferenceKind::Redefine),
            b"override" => Some(ReferenceKind::Override),
            _ => None,
        }
    }
}

/// A cross-schema reference as declared in a schema document
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaReference {
    pub kind: ReferenceKind,
    /// `namespace` attribute of an import
    pub namespace: Option<String>,
    /// XSD has no public identifiers; kept for parity with entity references
    pub public_id: Option<String>,
    /// `schemaLocation` attribute, verbatim
    pub system_id: Option<String>,
    /// Document that declared the reference
    pub base_uri: Option<PathBuf>,
}

/// A reference the resolver could satisfy from the local filesystem
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedInclude {
    pub system_id: String,
    pub public_id: Option<String>,
    pub path: PathBuf,
    pub base_uri: String,
    pub encoding: &'static str,
}

/// Resolves schema references against the first selected schema's directory
#[derive(Debug, Clone, Default)]
pub struct ResourceResolver {
    base_dir: Option<PathBuf>,
}

impl ResourceResolver {
    /// Build a resolver for an ordered list of selected schema files.
    pub fn new(schemas: &[PathBuf]) -> Self {
        let base_dir = schemas
            .first()
            .and_then(|first| first.parent())
            .map(Path::to_path_buf);

        Self { base_dir }
    }

    /// Directory relative lookups are based on, if any schema was selected
    pub fn base_dir(&self) -> Option<&Path> {
        self.base_dir.as_deref()
    }

    /// Resolve one reference, or `None` to let the compiler use its default
    /// strategy. Never fails.
    pub fn resolve(&self, reference: &SchemaReference) -> Option<ResolvedInclude> {
        let system_id = reference.system_id.as_deref().filter(|s| !s.is_empty())?;
        let base_dir = self.base_dir.as_ref()?;

        let candidate = resolve_location(base_dir, system_id)?;
        if !candidate.is_file() {
            return None;
        }

        let base_uri = Url::from_directory_path(base_dir)
            .map(String::from)
            .unwrap_or_else(|_| base_dir.display().to_string());

        Some(ResolvedInclude {
            system_id: system_id.to_string(),
            public_id: reference.public_id.clone(),
            path: candidate,
            base_uri,
            encoding: "UTF-8",
        })
    }
}

/// Turn a schema location or parser URL into a filesystem path.
///
/// `file:` URLs and absolute paths are percent-decoded, relative paths pass
/// through verbatim, and anything with another scheme yields `None`.
/// Single-letter schemes are drive letters.
pub fn location_to_path(location: &str) -> Option<PathBuf> {
    match Url::parse(location) {
        Ok(url) if url.scheme() == "file" => url.to_file_path().ok(),
        Ok(url) if url.scheme().len() > 1 => None,
        _ if Path::new(location).is_absolute() => Some(decode_absolute(location)),
        _ => Some(PathBuf::from(location)),
    }
}

/// libxml2 builds absolute locations by joining escaped references onto a
/// base, so `/d/my%20common.xsd` means `/d/my common.xsd`.
fn decode_absolute(location: &str) -> PathBuf {
    Url::parse(&format!("file:///{}", location.trim_start_matches('/')))
        .ok()
        .and_then(|url| url.to_file_path().ok())
        .unwrap_or_else(|| PathBuf::from(location))
}

/// Resolve a `schemaLocation` against the directory `base_dir` the way a URI
/// reference is joined onto a `file:` base: escapes are decoded and `.`/`..`
/// segments collapse. Returns `None` for remote locations.
pub fn resolve_location(base_dir: &Path, location: &str) -> Option<PathBuf> {
    let path = location_to_path(location)?;
    if path.is_absolute() {
        return Some(path);
    }
    let base = Url::from_directory_path(base_dir).ok()?;
    base.join(location).ok()?.to_file_path().ok()
}

/// Lexically collapse `.` and `..` components, the way libxml2 normalizes
/// URI paths, so differently spelled locations compare equal.
pub fn normalize_path(path: &Path) -> PathBuf {
    let mut normalized = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !normalized.pop() {
                    normalized.push("..");
                }
            }
            other => normalized.push(other.as_os_str()),
        }
    }
    normalized
}
