//! LibXML2 FFI Wrapper Module
//!
//! Safe wrappers around the handful of libxml2 calls needed to compile a set of
//! XML Schema documents and check one document against the result.
//!
//! ## Why libxml2
//!
//! The Rust ecosystem has good XML parsers (`roxmltree`, `quick-xml`) but no
//! mature XSD validator, so schema compilation and validation are delegated to
//! libxml2 through direct FFI. `quick-xml` is still used on the Rust side to
//! read `import`/`include` declarations before libxml2 sees them.
//!
//! ## Cross-reference redirection
//!
//! libxml2 loads every imported or included schema through its global external
//! entity loader. [`LibXml2Wrapper::new`] installs a loader exactly once that
//! consults a thread-local redirection table before delegating to the loader
//! libxml2 shipped with. The table is only populated while
//! [`LibXml2Wrapper::parse_schema_file`] runs on the current thread, so
//! document parsing and other threads always see the stock behaviour.
//! Locations with a non-`file` scheme are refused outright: schemas are never
//! fetched over the network.
//!
//! ## Document checks
//!
//! Documents are streamed through `xmlSchemaValidateFile`. Validity errors
//! arrive through the validation context, well-formedness errors through the
//! thread's structured error handler; both feed the same collector so they
//! keep the order in which the parser met them.
//!
//! ## Thread Safety
//!
//! - **Schema parsing** is serialized behind a process-wide lock; the libxml2
//!   schema parser is not re-entrant.
//! - **Validation** is parallel: every call creates its own validation context
//!   and the compiled `xmlSchema` is only read.

use std::cell::RefCell;
use std::collections::HashMap;
use std::ffi::{CStr, CString};
use std::marker::PhantomData;
use std::path::{Path, PathBuf};
use std::ptr;
use std::sync::{Arc, Mutex, Once, OnceLock};

use libc::{c_char, c_int, c_void};

use crate::diagnostics::{DiagnosticCollector, Severity};
use crate::error::{LibXml2Error, LibXml2Result};
use crate::resolver::{location_to_path, normalize_path};

/// Global initialization flag for libxml2
static LIBXML2_INIT: Once = Once::new();

/// Loader libxml2 had installed before ours
static DEFAULT_ENTITY_LOADER: OnceLock<XmlExternalEntityLoader> = OnceLock::new();

/// Serializes `xmlSchemaParse`
static SCHEMA_PARSE_LOCK: Mutex<()> = Mutex::new(());

thread_local! {
    /// Requested schema location -> file actually handed to libxml2
    static SCHEMA_REDIRECTS: RefCell<HashMap<PathBuf, CString>> = RefCell::new(HashMap::new());
}

/// `xmlParserOption` bits
const XML_PARSE_NONET: c_int = 1 << 11;

/// `xmlErrorDomain` of schema validity errors
const XML_FROM_SCHEMASV: c_int = 17;

/// `xmlErrorLevel`
const XML_ERR_WARNING: c_int = 1;
const XML_ERR_ERROR: c_int = 2;
const XML_ERR_FATAL: c_int = 3;

/// Opaque libxml2 structures
#[repr(C)]
pub struct XmlSchema {
    _private: [u8; 0],
}

#[repr(C)]
pub struct XmlSchemaParserCtxt {
    _private: [u8; 0],
}

#[repr(C)]
pub struct XmlSchemaValidCtxt {
    _private: [u8; 0],
}

#[repr(C)]
pub struct XmlParserCtxt {
    _private: [u8; 0],
}

#[repr(C)]
pub struct XmlParserInput {
    _private: [u8; 0],
}

#[repr(C)]
pub struct XmlError {
    pub domain: c_int,
    pub code: c_int,
    pub message: *const c_char,
    pub level: c_int,
    pub file: *const c_char,
    pub line: c_int,
    pub str1: *const c_char,
    pub str2: *const c_char,
    pub str3: *const c_char,
    pub int1: c_int,
    pub int2: c_int,
    pub ctxt: *mut c_void,
    pub node: *mut c_void,
}

pub type XmlStructuredErrorFunc =
    Option<unsafe extern "C" fn(user_data: *mut c_void, error: *const XmlError)>;

pub type XmlExternalEntityLoader = Option<
    unsafe extern "C" fn(
        url: *const c_char,
        id: *const c_char,
        context: *mut XmlParserCtxt,
    ) -> *mut XmlParserInput,
>;

// External libxml2 FFI declarations
#[cfg_attr(target_os = "windows", link(name = "libxml2"))]
#[cfg_attr(not(target_os = "windows"), link(name = "xml2"))]
unsafe extern "C" {
    pub fn xmlInitParser();

    // Entity loading
    pub fn xmlGetExternalEntityLoader() -> XmlExternalEntityLoader;
    pub fn xmlSetExternalEntityLoader(f: XmlExternalEntityLoader);

    // Schema parsing functions
    pub fn xmlSchemaNewParserCtxt(url: *const c_char) -> *mut XmlSchemaParserCtxt;
    pub fn xmlSchemaSetParserStructuredErrors(
        ctxt: *mut XmlSchemaParserCtxt,
        serror: XmlStructuredErrorFunc,
        ctx: *mut c_void,
    );
    pub fn xmlSchemaParse(ctxt: *mut XmlSchemaParserCtxt) -> *mut XmlSchema;
    pub fn xmlSchemaFreeParserCtxt(ctxt: *mut XmlSchemaParserCtxt);
    pub fn xmlSchemaFree(schema: *mut XmlSchema);

    // Schema validation functions
    pub fn xmlSchemaNewValidCtxt(schema: *mut XmlSchema) -> *mut XmlSchemaValidCtxt;
    pub fn xmlSchemaFreeValidCtxt(ctxt: *mut XmlSchemaValidCtxt);
    pub fn xmlSchemaSetValidStructuredErrors(
        ctxt: *mut XmlSchemaValidCtxt,
        serror: XmlStructuredErrorFunc,
        ctx: *mut c_void,
    );
    pub fn xmlSchemaValidateFile(
        ctxt: *mut XmlSchemaValidCtxt,
        filename: *const c_char,
        options: c_int,
    ) -> c_int;

    // Error state
    pub fn xmlSetStructuredErrorFunc(ctx: *mut c_void, handler: XmlStructuredErrorFunc);
    pub fn xmlGetLastError() -> *const XmlError;
    pub fn xmlResetLastError();
}

/// Map a libxml2 error level onto a diagnostic severity.
pub fn severity_from_level(level: c_int) -> Severity {
    match level {
        XML_ERR_WARNING => Severity::Warning,
        XML_ERR_FATAL => Severity::FatalError,
        XML_ERR_ERROR => Severity::Error,
        _ => Severity::Error,
    }
}

fn line_from_raw(line: c_int) -> Option<u32> {
    u32::try_from(line).ok().filter(|&l| l > 0)
}

/// # Safety
///
/// `ptr` must be null or point to a NUL-terminated string.
unsafe fn string_from_raw(ptr: *const c_char) -> Option<String> {
    if ptr.is_null() {
        return None;
    }
    let s = unsafe { CStr::from_ptr(ptr) }.to_string_lossy();
    Some(s.trim().to_string())
}

/// Receives everything reported while one document is streamed through a
/// schema. The first fatal error outside schema validation stops the parser;
/// nothing reported after it is kept.
struct DocumentSink<'a> {
    collector: &'a mut DiagnosticCollector,
    parse_failure: Option<(String, Option<u32>)>,
}

impl DocumentSink<'_> {
    fn report(&mut self, domain: c_int, level: c_int, message: String, line: Option<u32>) {
        if self.parse_failure.is_some() {
            return;
        }
        if level == XML_ERR_FATAL && domain != XML_FROM_SCHEMASV {
            self.parse_failure = Some((message.clone(), line));
        }
        self.collector.record(severity_from_level(level), message, line);
    }
}

/// Callback for libxml2 to report parser and validation errors (structured)
unsafe extern "C" fn collect_document_error(user_data: *mut c_void, error: *const XmlError) {
    if user_data.is_null() || error.is_null() {
        return;
    }
    let sink = unsafe { &mut *(user_data as *mut DocumentSink<'_>) };
    let error = unsafe { &*error };

    let message = unsafe { string_from_raw(error.message) }
        .unwrap_or_else(|| format!("validation error (code {})", error.code));
    sink.report(error.domain, error.level, message, line_from_raw(error.line));
}

/// Routes this thread's parser errors to a structured handler, restoring the
/// default on drop
struct StructuredErrorGuard;

impl StructuredErrorGuard {
    /// # Safety
    ///
    /// `ctx` must stay valid for `handler` until the guard is dropped.
    unsafe fn install(handler: XmlStructuredErrorFunc, ctx: *mut c_void) -> Self {
        unsafe { xmlSetStructuredErrorFunc(ctx, handler) };
        StructuredErrorGuard
    }
}

impl Drop for StructuredErrorGuard {
    fn drop(&mut self) {
        unsafe { xmlSetStructuredErrorFunc(ptr::null_mut(), None) };
    }
}

/// A message reported while compiling schemas
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaMessage {
    pub severity: Severity,
    pub message: String,
    pub file: Option<String>,
    pub line: Option<u32>,
}

impl std::fmt::Display for SchemaMessage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match (&self.file, self.line) {
            (Some(file), Some(line)) => write!(f, "{}:{}: {}", file, line, self.message),
            (Some(file), None) => write!(f, "{}: {}", file, self.message),
            _ => f.write_str(&self.message),
        }
    }
}

/// Callback for libxml2 to report schema parser errors (structured)
unsafe extern "C" fn collect_schema_error(user_data: *mut c_void, error: *const XmlError) {
    if user_data.is_null() || error.is_null() {
        return;
    }
    let messages = unsafe { &mut *(user_data as *mut Vec<SchemaMessage>) };
    let error = unsafe { &*error };

    if let Some(message) = unsafe { string_from_raw(error.message) } {
        messages.push(SchemaMessage {
            severity: severity_from_level(error.level),
            message,
            file: unsafe { string_from_raw(error.file) },
            line: line_from_raw(error.line),
        });
    }
}

/// External entity loader that applies the current thread's schema redirects
unsafe extern "C" fn redirecting_entity_loader(
    url: *const c_char,
    id: *const c_char,
    context: *mut XmlParserCtxt,
) -> *mut XmlParserInput {
    let Some(default_loader) = DEFAULT_ENTITY_LOADER.get().copied().flatten() else {
        return ptr::null_mut();
    };
    if url.is_null() {
        return unsafe { default_loader(url, id, context) };
    }

    let requested = unsafe { CStr::from_ptr(url) }.to_string_lossy();
    let Some(path) = location_to_path(&requested) else {
        // Remote locations are never fetched.
        return ptr::null_mut();
    };

    let redirect = SCHEMA_REDIRECTS
        .try_with(|redirects| redirects.borrow().get(&normalize_path(&path)).cloned())
        .ok()
        .flatten()
        .or_else(|| {
            // Plain paths are joined from escaped references verbatim.
            let plain = Path::new(&*requested);
            (plain.is_absolute() && !plain.exists() && path.is_file())
                .then(|| path.to_str().and_then(|p| CString::new(p).ok()))
                .flatten()
        });

    match redirect {
        Some(target) => unsafe { default_loader(target.as_ptr(), id, context) },
        None => unsafe { default_loader(url, id, context) },
    }
}

/// Installs a redirection table for the current thread, clearing it on drop
struct RedirectGuard;

impl RedirectGuard {
    fn install(redirects: &HashMap<PathBuf, PathBuf>) -> Self {
        let table = redirects
            .iter()
            .filter_map(|(requested, target)| {
                let target = CString::new(target.to_str()?).ok()?;
                Some((normalize_path(requested), target))
            })
            .collect();
        SCHEMA_REDIRECTS.with(|current| *current.borrow_mut() = table);
        RedirectGuard
    }
}

impl Drop for RedirectGuard {
    fn drop(&mut self) {
        let _ = SCHEMA_REDIRECTS.try_with(|current| current.borrow_mut().clear());
    }
}

fn path_to_cstring(path: &Path) -> LibXml2Result<CString> {
    path.to_str()
        .and_then(|s| CString::new(s).ok())
        .ok_or_else(|| LibXml2Error::InvalidPath {
            path: path.to_path_buf(),
        })
}

/// Thread-safe wrapper for libxml2 schema pointer with proper resource management
#[derive(Debug, Clone)]
pub struct XmlSchemaPtr {
    inner: Arc<XmlSchemaInner>,
}

#[derive(Debug)]
struct XmlSchemaInner {
    ptr: *mut XmlSchema,
    _phantom: PhantomData<XmlSchema>,
}

// Safety: libxml2 documentation states that xmlSchema structures are thread-safe for reading
// See: http://xmlsoft.org/threads.html
unsafe impl Send for XmlSchemaInner {}
unsafe impl Sync for XmlSchemaInner {}

impl XmlSchemaPtr {
    /// # Safety
    ///
    /// `ptr` must be null or a schema returned by `xmlSchemaParse` that nothing
    /// else will free.
    unsafe fn from_raw(ptr: *mut XmlSchema) -> Option<Self> {
        if ptr.is_null() {
            return None;
        }
        Some(XmlSchemaPtr {
            inner: Arc::new(XmlSchemaInner {
                ptr,
                _phantom: PhantomData,
            }),
        })
    }

    pub(crate) fn as_ptr(&self) -> *mut XmlSchema {
        self.inner.ptr
    }
}

impl Drop for XmlSchemaInner {
    fn drop(&mut self) {
        if !self.ptr.is_null() {
            unsafe {
                xmlSchemaFree(self.ptr);
            }
            self.ptr = ptr::null_mut();
        }
    }
}

/// Successfully parsed schema plus the warnings libxml2 emitted on the way
#[derive(Debug)]
pub struct ParsedSchema {
    pub schema: XmlSchemaPtr,
    pub warnings: Vec<SchemaMessage>,
}

/// What happened when a document was run through a schema
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DocumentOutcome {
    /// The whole document was streamed; `code` is libxml2's return value
    Checked { code: i32 },
    /// Parsing stopped at a fatal error, reported last in the collector;
    /// diagnostics recorded before it still stand
    NotWellFormed { message: String, line: Option<u32> },
}

/// Safe access to the libxml2 functionality used by the compiler and engine
pub struct LibXml2Wrapper {
    _phantom: PhantomData<()>,
}

impl LibXml2Wrapper {
    /// Initialize libxml2 and install the redirecting entity loader, once.
    pub fn new() -> Self {
        LIBXML2_INIT.call_once(|| unsafe {
            xmlInitParser();
            let _ = DEFAULT_ENTITY_LOADER.set(xmlGetExternalEntityLoader());
            xmlSetExternalEntityLoader(Some(redirecting_entity_loader));
        });

        LibXml2Wrapper {
            _phantom: PhantomData,
        }
    }

    /// Parse the schema rooted at `path`.
    ///
    /// While parsing, any `import`/`include` whose location normalizes to a key
    /// of `redirects` is loaded from the mapped file instead.
    ///
    /// # Errors
    ///
    /// Returns `LibXml2Error::SchemaParseFailed` with every error libxml2
    /// reported if no schema could be built.
    pub fn parse_schema_file(
        &self,
        path: &Path,
        redirects: &HashMap<PathBuf, PathBuf>,
    ) -> LibXml2Result<ParsedSchema> {
        let c_path = path_to_cstring(path)?;
        let mut messages: Vec<SchemaMessage> = Vec::new();

        let _lock = SCHEMA_PARSE_LOCK
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let _redirects = RedirectGuard::install(redirects);

        let schema_ptr = unsafe {
            let parser_ctxt = xmlSchemaNewParserCtxt(c_path.as_ptr());
            if parser_ctxt.is_null() {
                return Err(LibXml2Error::ParserContextCreationFailed {
                    path: path.to_path_buf(),
                });
            }

            xmlSchemaSetParserStructuredErrors(
                parser_ctxt,
                Some(collect_schema_error),
                &mut messages as *mut Vec<SchemaMessage> as *mut c_void,
            );

            let schema_ptr = xmlSchemaParse(parser_ctxt);

            // Always free the parser context
            xmlSchemaFreeParserCtxt(parser_ctxt);
            schema_ptr
        };

        let (warnings, errors): (Vec<_>, Vec<_>) = messages
            .into_iter()
            .partition(|m| m.severity == Severity::Warning);

        match unsafe { XmlSchemaPtr::from_raw(schema_ptr) } {
            Some(schema) if errors.is_empty() => Ok(ParsedSchema { schema, warnings }),
            _ => Err(LibXml2Error::SchemaParseFailed {
                messages: errors.iter().map(ToString::to_string).collect(),
            }),
        }
    }

    /// Stream the document at `path` through `schema`, recording every
    /// warning and error in `collector` in the order libxml2 reports them.
    pub fn validate_file(
        &self,
        schema: &XmlSchemaPtr,
        path: &Path,
        collector: &mut DiagnosticCollector,
    ) -> LibXml2Result<DocumentOutcome> {
        let c_path = path_to_cstring(path)?;
        let mut sink = DocumentSink {
            collector,
            parse_failure: None,
        };
        let sink_ptr = &mut sink as *mut DocumentSink<'_> as *mut c_void;

        let code = unsafe {
            let valid_ctxt = xmlSchemaNewValidCtxt(schema.as_ptr());
            if valid_ctxt.is_null() {
                return Err(LibXml2Error::ValidationContextCreationFailed);
            }

            xmlSchemaSetValidStructuredErrors(valid_ctxt, Some(collect_document_error), sink_ptr);
            // Well-formedness errors are raised by the parser, not the validator.
            let _parser_errors =
                StructuredErrorGuard::install(Some(collect_document_error), sink_ptr);

            xmlResetLastError();
            let code = xmlSchemaValidateFile(valid_ctxt, c_path.as_ptr(), XML_PARSE_NONET);

            // Always free the validation context
            xmlSchemaFreeValidCtxt(valid_ctxt);
            code
        };

        if sink.parse_failure.is_none() && code != 0 {
            let last = unsafe { xmlGetLastError() };
            if !last.is_null() {
                let last = unsafe { &*last };
                if last.level == XML_ERR_FATAL && last.domain != XML_FROM_SCHEMASV {
                    let message = unsafe { string_from_raw(last.message) }
                        .unwrap_or_else(|| "document could not be parsed".to_string());
                    sink.report(last.domain, last.level, message, line_from_raw(last.line));
                }
            }
        }

        Ok(match sink.parse_failure {
            Some((message, line)) => DocumentOutcome::NotWellFormed { message, line },
            None => DocumentOutcome::Checked { code },
        })
    }
}

impl Default for LibXml2Wrapper {
    fn default() -> Self {
        Self::new()
    }
}
