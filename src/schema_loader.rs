//! Discovery of the schema graph.
//!
//! Before libxml2 compiles anything, the selected schema files and everything
//! they reference are read with `quick-xml` to learn their target namespaces and
//! composition references. Each reference is offered to the
//! [`ResourceResolver`]; whenever it picks a different file than libxml2 would
//! have loaded on its own, a redirect is recorded for the compiler.

use std::collections::{HashMap, HashSet, VecDeque};
use std::path::{Path, PathBuf};

use quick_xml::NsReader;
use quick_xml::events::{BytesStart, Event};
use quick_xml::name::ResolveResult;

use crate::error::{Result, ValidationError};
use crate::resolver::{
    ReferenceKind, ResolvedInclude, ResourceResolver, SchemaReference, normalize_path,
    resolve_location,
};

pub const XSD_NAMESPACE: &str = "http://www.w3.org/2001/XMLSchema";

/// What a schema document declares about itself and its dependencies
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaDocument {
    pub path: PathBuf,
    pub target_namespace: Option<String>,
    pub references: Vec<SchemaReference>,
}

/// Reads composition references out of XSD documents
pub struct SchemaExtractor;

impl SchemaExtractor {
    /// Read `path` and collect its target namespace and every
    /// `import`/`include`/`redefine`/`override` declared on the root.
    pub fn extract(path: &Path) -> Result<SchemaDocument> {
        let content = std::fs::read(path).map_err(|e| ValidationError::SchemaUnreadable {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        Self::extract_from_bytes(path, &content).map_err(|details| {
            ValidationError::SchemaCompilation {
                schemas: vec![path.to_path_buf()],
                details: vec![details],
            }
        })
    }

    /// Same as [`extract`](Self::extract) for content already in memory;
    /// `path` is recorded as the declaring document.
    pub fn extract_from_bytes(
        path: &Path,
        content: &[u8],
    ) -> std::result::Result<SchemaDocument, String> {
        let mut reader = NsReader::from_reader(content);
        let mut buf = Vec::new();
        let mut depth = 0usize;
        let mut seen_root = false;
        let mut document = SchemaDocument {
            path: path.to_path_buf(),
            target_namespace: None,
            references: Vec::new(),
        };

        loop {
            buf.clear();
            let (namespace, event) = reader
                .read_resolved_event_into(&mut buf)
                .map_err(|e| format!("{}: {}", path.display(), e))?;

            let (start, is_empty) = match &event {
                Event::Start(start) => (start, false),
                Event::Empty(start) => (start, true),
                Event::End(_) => {
                    depth = depth.saturating_sub(1);
                    continue;
                }
                Event::Eof => break,
                _ => continue,
            };

            let in_xsd = matches!(
                &namespace,
                ResolveResult::Bound(ns) if ns.as_ref() == XSD_NAMESPACE.as_bytes()
            );
            let local_name = start.local_name();
            let local_name = local_name.as_ref();

            match depth {
                0 => {
                    if !in_xsd || local_name != b"schema" {
                        return Err(format!(
                            "{}: root element is not an XML Schema <schema>",
                            path.display()
                        ));
                    }
                    document.target_namespace = attribute(start, b"targetNamespace")?;
                    seen_root = true;
                }
                1 => match ReferenceKind::from_local_name(local_name).filter(|_| in_xsd) {
                    Some(kind) => document.references.push(SchemaReference {
                        kind,
                        namespace: attribute(start, b"namespace")?,
                        public_id: None,
                        system_id: attribute(start, b"schemaLocation")?,
                        base_uri: Some(path.to_path_buf()),
                    }),
                    // Composition elements precede every declaration.
                    None if in_xsd && local_name == b"annotation" => {}
                    None => break,
                },
                _ => {}
            }

            if !is_empty {
                depth += 1;
            }
        }

        if !seen_root {
            return Err(format!("{}: no <schema> element found", path.display()));
        }

        Ok(document)
    }
}

fn attribute(start: &BytesStart<'_>, name: &[u8]) -> std::result::Result<Option<String>, String> {
    for attr in start.attributes() {
        let attr = attr.map_err(|e| e.to_string())?;
        if attr.key.as_ref() == name {
            let value = attr.unescape_value().map_err(|e| e.to_string())?;
            return Ok(Some(value.trim().to_string()));
        }
    }
    Ok(None)
}

/// The selected schemas, the documents reachable from them, and the
/// redirects the resolver asked for
#[derive(Debug, Default)]
pub struct SchemaGraph {
    roots: Vec<SchemaDocument>,
    documents: usize,
    resolved: Vec<ResolvedInclude>,
    redirects: HashMap<PathBuf, PathBuf>,
    unresolved: Vec<String>,
}

impl SchemaGraph {
    /// Walk the graph starting at `schemas`, in order.
    ///
    /// Top-level files must be readable XSD documents. Transitively referenced
    /// files are scanned on a best-effort basis; the compiler reports anything
    /// wrong with them. A local reference that points at no file at all is
    /// collected in [`unresolved`](Self::unresolved).
    pub fn discover(schemas: &[PathBuf], resolver: &ResourceResolver) -> Result<Self> {
        let mut graph = SchemaGraph::default();
        let mut visited: HashSet<PathBuf> = HashSet::new();
        let mut queue: VecDeque<SchemaDocument> = VecDeque::new();

        for path in schemas {
            let document = SchemaExtractor::extract(path)?;
            if visited.insert(normalize_path(path)) {
                queue.push_back(document.clone());
            }
            graph.roots.push(document);
        }

        while let Some(document) = queue.pop_front() {
            graph.documents += 1;
            let declaring_dir = document.path.parent().unwrap_or(Path::new(""));

            for reference in &document.references {
                let Some(system_id) = reference.system_id.as_deref().filter(|s| !s.is_empty())
                else {
                    continue;
                };
                // Remote locations are left to libxml2, which refuses them.
                let Some(requested) =
                    resolve_location(declaring_dir, system_id).map(|p| normalize_path(&p))
                else {
                    continue;
                };

                let next = match resolver.resolve(reference) {
                    Some(resolved) => {
                        let target = normalize_path(&resolved.path);
                        if target != requested {
                            graph.redirects.entry(requested).or_insert(target.clone());
                        }
                        graph.resolved.push(resolved);
                        target
                    }
                    None => requested,
                };

                if !next.is_file() {
                    graph.unresolved.push(format!(
                        "{}: cannot resolve schemaLocation \"{}\"",
                        document.path.display(),
                        system_id
                    ));
                    continue;
                }

                if visited.insert(next.clone())
                    && let Ok(content) = std::fs::read(&next)
                    && let Ok(child) = SchemaExtractor::extract_from_bytes(&next, &content)
                {
                    queue.push_back(child);
                }
            }
        }

        Ok(graph)
    }

    /// The selected top-level documents, in caller order
    pub fn roots(&self) -> &[SchemaDocument] {
        &self.roots
    }

    /// Number of distinct documents scanned, roots included
    pub fn document_count(&self) -> usize {
        self.documents
    }

    /// References the resolver satisfied, in discovery order
    pub fn resolved(&self) -> &[ResolvedInclude] {
        &self.resolved
    }

    /// Location libxml2 would load -> file the resolver chose instead
    pub fn redirects(&self) -> &HashMap<PathBuf, PathBuf> {
        &self.redirects
    }

    /// Local references that neither the resolver nor the declaring
    /// document's directory could satisfy
    pub fn unresolved(&self) -> &[String] {
        &self.unresolved
    }
}
