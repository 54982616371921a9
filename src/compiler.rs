//! Schema compilation.
//!
//! A single selected schema with no redirected references is handed to
//! libxml2 as is. Otherwise a generated driver schema in a temporary directory
//! ties the selected files together: namespace-qualified files are imported
//! (files sharing a target namespace sit behind one per-namespace driver that
//! includes them all) and no-namespace files are included directly.
//!
//! libxml2 tells schema documents apart by the location they were requested
//! under. A redirected location is therefore served by a small forwarding
//! schema that includes the resolver's file by its absolute URL, so that file
//! is loaded once however many routes lead to it.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use quick_xml::escape::escape;
use tempfile::TempDir;
use url::Url;

use crate::error::{LibXml2Error, Result, ValidationError};
use crate::libxml2::{LibXml2Wrapper, SchemaMessage, XmlSchemaPtr};
use crate::resolver::{ResolvedInclude, ResourceResolver, normalize_path};
use crate::schema_loader::{SchemaDocument, SchemaExtractor, SchemaGraph, XSD_NAMESPACE};

/// A compiled, read-only schema graph.
///
/// Cloning is cheap and the value can be shared between threads; every
/// validation run creates its own libxml2 validation context.
#[derive(Debug, Clone)]
pub struct CompiledSchema {
    schema: XmlSchemaPtr,
    sources: Vec<PathBuf>,
    warnings: Vec<String>,
    resolved: Vec<String>,
}

impl CompiledSchema {
    /// The selected top-level schema files, absolute, in caller order
    pub fn sources(&self) -> &[PathBuf] {
        &self.sources
    }

    /// Warnings libxml2 reported while compiling
    pub fn warnings(&self) -> &[String] {
        &self.warnings
    }

    /// Cross-references the resolver satisfied, as `systemId -> path`
    pub fn resolved_references(&self) -> &[String] {
        &self.resolved
    }

    pub(crate) fn schema_ptr(&self) -> &XmlSchemaPtr {
        &self.schema
    }
}

/// Compiles an ordered set of schema files into one [`CompiledSchema`]
pub struct SchemaCompiler {
    libxml2: LibXml2Wrapper,
}

impl SchemaCompiler {
    pub fn new() -> Self {
        Self {
            libxml2: LibXml2Wrapper::new(),
        }
    }

    /// Compile `schemas` into one schema graph.
    ///
    /// # Errors
    ///
    /// - `NoSchemas` if `schemas` is empty
    /// - `SchemaUnreadable` if a selected file cannot be read
    /// - `SchemaCompilation` if any document in the graph is malformed,
    ///   violates XML Schema constraints, or references something that cannot
    ///   be loaded
    pub fn compile(&self, schemas: &[PathBuf]) -> Result<CompiledSchema> {
        if schemas.is_empty() {
            return Err(ValidationError::NoSchemas);
        }

        let sources = schemas
            .iter()
            .map(|path| std::path::absolute(path).map(|path| normalize_path(&path)))
            .collect::<std::io::Result<Vec<_>>>()?;

        let resolver = ResourceResolver::new(&sources);
        let graph = SchemaGraph::discover(&sources, &resolver)?;
        if !graph.unresolved().is_empty() {
            return Err(ValidationError::SchemaCompilation {
                schemas: sources,
                details: graph.unresolved().to_vec(),
            });
        }

        let driver = if sources.len() > 1 || !graph.redirects().is_empty() {
            Some(DriverSchema::write(graph.roots(), graph.redirects())?)
        } else {
            None
        };
        let entry = driver
            .as_ref()
            .map(DriverSchema::path)
            .unwrap_or(&sources[0]);
        let no_forwards = HashMap::new();
        let forwards = driver
            .as_ref()
            .map(DriverSchema::forwards)
            .unwrap_or(&no_forwards);

        let parsed = self
            .libxml2
            .parse_schema_file(entry, forwards)
            .map_err(|err| match err {
                LibXml2Error::SchemaParseFailed { messages } => ValidationError::SchemaCompilation {
                    schemas: sources.clone(),
                    details: if messages.is_empty() {
                        vec!["the schema compiler did not produce a schema".to_string()]
                    } else {
                        messages
                    },
                },
                other => other.into(),
            })?;

        Ok(CompiledSchema {
            schema: parsed.schema,
            sources,
            warnings: parsed.warnings.iter().map(SchemaMessage::to_string).collect(),
            resolved: graph.resolved().iter().map(describe_resolution).collect(),
        })
    }
}

impl Default for SchemaCompiler {
    fn default() -> Self {
        Self::new()
    }
}

fn describe_resolution(resolved: &ResolvedInclude) -> String {
    format!("{} -> {}", resolved.system_id, resolved.path.display())
}

/// Generated schema documents that pull the selected files into one graph
/// and forward redirected locations. The files only need to exist until
/// libxml2 has parsed them.
struct DriverSchema {
    _dir: TempDir,
    root: PathBuf,
    forwards: HashMap<PathBuf, PathBuf>,
}

impl DriverSchema {
    fn write(roots: &[SchemaDocument], redirects: &HashMap<PathBuf, PathBuf>) -> Result<Self> {
        let dir = TempDir::new()?;
        let forwards = write_forwards(dir.path(), redirects)?;

        // Group by target namespace, keeping first-seen order.
        let mut groups: Vec<(Option<&str>, Vec<&Path>)> = Vec::new();
        for document in roots {
            let namespace = document.target_namespace.as_deref();
            match groups.iter_mut().find(|(ns, _)| *ns == namespace) {
                Some((_, paths)) => paths.push(&document.path),
                None => groups.push((namespace, vec![&document.path])),
            }
        }

        let mut composition = String::new();
        for (index, (namespace, paths)) in groups.iter().enumerate() {
            match namespace {
                None => {
                    for path in paths {
                        composition.push_str(&include_element(path)?);
                    }
                }
                Some(namespace) if paths.len() == 1 => {
                    composition.push_str(&import_element(namespace, paths[0])?);
                }
                Some(namespace) => {
                    let mut includes = String::new();
                    for path in paths {
                        includes.push_str(&include_element(path)?);
                    }
                    let aggregate = dir.path().join(format!("namespace-{}.xsd", index));
                    fs::write(&aggregate, schema_document(Some(namespace), &includes))?;
                    composition.push_str(&import_element(namespace, &aggregate)?);
                }
            }
        }

        let root = dir.path().join("driver.xsd");
        fs::write(&root, schema_document(None, &composition))?;

        Ok(Self {
            _dir: dir,
            root,
            forwards,
        })
    }

    fn path(&self) -> &PathBuf {
        &self.root
    }

    /// Requested location -> forwarding schema libxml2 should load instead
    fn forwards(&self) -> &HashMap<PathBuf, PathBuf> {
        &self.forwards
    }
}

/// Write one forwarding schema per redirected location into `dir`.
///
/// A forwarding schema declares the target's own namespace and includes the
/// target by absolute URL. A target that cannot be scanned is handed to
/// libxml2 directly so its own error is reported.
fn write_forwards(
    dir: &Path,
    redirects: &HashMap<PathBuf, PathBuf>,
) -> Result<HashMap<PathBuf, PathBuf>> {
    let mut requested: Vec<&PathBuf> = redirects.keys().collect();
    requested.sort();

    let mut forwards = HashMap::new();
    for (index, location) in requested.into_iter().enumerate() {
        let target = &redirects[location];
        let forward = match SchemaExtractor::extract(target) {
            Ok(document) => {
                let path = dir.join(format!("forward-{}.xsd", index));
                let body = include_element(target)?;
                fs::write(
                    &path,
                    schema_document(document.target_namespace.as_deref(), &body),
                )?;
                path
            }
            Err(_) => target.clone(),
        };
        forwards.insert(location.clone(), forward);
    }
    Ok(forwards)
}

fn file_url(path: &Path) -> Result<String> {
    Url::from_file_path(path)
        .map(String::from)
        .map_err(|_| ValidationError::SchemaUnreadable {
            path: path.to_path_buf(),
            reason: "path cannot be expressed as a file URL".to_string(),
        })
}

fn include_element(path: &Path) -> Result<String> {
    Ok(format!(
        "  <xs:include schemaLocation=\"{}\"/>\n",
        escape(&file_url(path)?)
    ))
}

fn import_element(namespace: &str, path: &Path) -> Result<String> {
    Ok(format!(
        "  <xs:import namespace=\"{}\" schemaLocation=\"{}\"/>\n",
        escape(namespace),
        escape(&file_url(path)?)
    ))
}

fn schema_document(target_namespace: Option<&str>, body: &str) -> String {
    let target = target_namespace
        .map(|ns| format!(" targetNamespace=\"{}\"", escape(ns)))
        .unwrap_or_default();
    format!(
        "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<xs:schema xmlns:xs=\"{}\"{}>\n{}</xs:schema>\n",
        XSD_NAMESPACE, target, body
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn document(path: &str, namespace: Option<&str>) -> SchemaDocument {
        SchemaDocument {
            path: PathBuf::from(path),
            target_namespace: namespace.map(str::to_string),
            references: Vec::new(),
        }
    }

    #[test]
    fn test_empty_schema_list_is_a_precondition_error() {
        let result = SchemaCompiler::new().compile(&[]);
        assert!(matches!(result, Err(ValidationError::NoSchemas)));
    }

    #[test]
    fn test_driver_groups_by_namespace() {
        let roots = vec![
            document("/d/a.xsd", Some("urn:a")),
            document("/d/plain.xsd", None),
            document("/d/b1.xsd", Some("urn:b")),
            document("/d/b2.xsd", Some("urn:b")),
        ];

        let driver = DriverSchema::write(&roots, &HashMap::new()).unwrap();
        let root = fs::read_to_string(driver.path()).unwrap();
        assert!(driver.forwards().is_empty());

        assert!(root.contains(r#"<xs:import namespace="urn:a" schemaLocation="file:///d/a.xsd"/>"#));
        assert!(root.contains(r#"<xs:include schemaLocation="file:///d/plain.xsd"/>"#));
        assert!(!root.contains(r#"targetNamespace"#));

        let aggregate_path = driver.path().parent().unwrap().join("namespace-2.xsd");
        assert!(root.contains(&format!(
            r#"<xs:import namespace="urn:b" schemaLocation="{}"/>"#,
            Url::from_file_path(&aggregate_path).unwrap()
        )));

        let aggregate = fs::read_to_string(&aggregate_path).unwrap();
        assert!(aggregate.contains(r#"targetNamespace="urn:b""#));
        assert!(aggregate.contains("file:///d/b1.xsd"));
        assert!(aggregate.contains("file:///d/b2.xsd"));
    }

    #[test]
    fn test_redirected_locations_are_forwarded_to_the_target() {
        let dir = TempDir::new().unwrap();
        let target = dir.path().join("types.xsd");
        fs::write(
            &target,
            r#"<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema" targetNamespace="urn:types"/>"#,
        )
        .unwrap();
        let requested = dir.path().join("elsewhere").join("types.xsd");
        let redirects = HashMap::from([(requested.clone(), target.clone())]);

        let driver = DriverSchema::write(&[document("/d/a.xsd", None)], &redirects).unwrap();

        let forward = &driver.forwards()[&requested];
        assert_eq!(forward.parent(), driver.path().parent());
        let content = fs::read_to_string(forward).unwrap();
        assert!(content.contains(r#"targetNamespace="urn:types""#));
        assert!(content.contains(&format!(
            r#"<xs:include schemaLocation="{}"/>"#,
            Url::from_file_path(&target).unwrap()
        )));
    }

    #[test]
    fn test_unscannable_target_is_not_forwarded() {
        let dir = TempDir::new().unwrap();
        let target = dir.path().join("absent.xsd");
        let requested = dir.path().join("other.xsd");
        let redirects = HashMap::from([(requested.clone(), target.clone())]);

        let driver = DriverSchema::write(&[], &redirects).unwrap();
        assert_eq!(driver.forwards()[&requested], target);
    }

    #[test]
    fn test_driver_files_removed_on_drop() {
        let driver =
            DriverSchema::write(&[document("/d/a.xsd", None)], &HashMap::new()).unwrap();
        let path = driver.path().clone();
        assert!(path.exists());
        drop(driver);
        assert!(!path.exists());
    }

    #[test]
    fn test_escapes_attribute_values() {
        let element = import_element("urn:a&b", Path::new("/d/a.xsd")).unwrap();
        assert!(element.contains(r#"namespace="urn:a&amp;b""#));
    }

    #[test]
    fn test_compile_single_schema_without_driver() {
        let dir = TempDir::new().unwrap();
        let xsd = dir.path().join("simple.xsd");
        fs::write(
            &xsd,
            r#"<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema">
  <xs:element name="root" type="xs:string"/>
</xs:schema>"#,
        )
        .unwrap();

        let compiled = SchemaCompiler::new().compile(&[xsd.clone()]).unwrap();
        assert_eq!(compiled.sources(), &[xsd]);
        assert!(compiled.sources()[0].is_absolute());
    }
}
