//! Injected collaborator contracts (§6): `ModuleReader`, `ResourceReader`,
//! `SecurityManager`, the parsed CLI options struct, and the output-format
//! enum. `HttpClient` and the module-cache directory layout are documented
//! here but never implemented — they belong to the stock `https` reader and
//! the CLI surface, both out of scope (§1).
//!
//! Each collaborator's contract is a plain trait, with the embedder
//! supplying the implementation, rather than baking a concrete
//! filesystem/network implementation into the core crate.

use crate::errors::RunResult;

/// One entry in a module/resource directory listing (§6).
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct PathElement {
    pub name: String,
    pub is_directory: bool,
}

/// A module resolved from a URI, ready to be read (§6 `ModuleReader`).
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct ResolvedModule {
    pub uri: String,
}

/// Reads module source for one URI scheme (`pkl:`, `file:`, `https:`, ...).
pub trait ModuleReader {
    fn scheme(&self) -> &str;
    fn resolve(&self, uri: &str) -> RunResult<ResolvedModule>;
    fn read_source(&self, module: &ResolvedModule) -> RunResult<Vec<u8>>;
    fn list_elements(&self, uri: &str) -> RunResult<Vec<PathElement>>;
}

/// Reads resource bytes (non-module content addressed by `read()`) for one
/// URI scheme.
pub trait ResourceReader {
    fn scheme(&self) -> &str;
    fn read(&self, uri: &str) -> RunResult<Vec<u8>>;
    fn list_elements(&self, uri: &str) -> RunResult<Vec<PathElement>>;
}

/// Authorizes cross-module imports and resource reads (§6). Returning `Ok`
/// permits the operation; any `Err` is surfaced to the evaluator as
/// `SecurityDenied`, never retried.
pub trait SecurityManager {
    fn check_import_module(&self, from: &str, to: &str) -> RunResult<()>;
    fn check_read_resource(&self, from: &str, to: &str) -> RunResult<()>;
}

/// Consumed by the stock `https` reader; not part of the core evaluation
/// contract (§6: "not part of the core contract"). Declared here only so an
/// embedder wiring up a `https:` `ResourceReader` has a named seam to
/// implement against.
pub trait HttpClient {
    fn get(&self, url: &str) -> RunResult<Vec<u8>>;
}

/// Output formats the CLI surface can request (§6). Only `PklBinary` (and,
/// via `export.rs`, `Json`/`Properties`) have implementations in this
/// crate; the others are recognized as valid configuration but have no
/// writer here (surface code generation is out of scope, §1).
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OutputFormat {
    Pcf,
    Json,
    Yaml,
    Plist,
    Xml,
    PklBinary,
}

/// Parsed CLI options (§6). The CLI surface itself — argument parsing,
/// reading `env-vars`/`external-properties` from the process environment —
/// is out of scope; this struct is what that surface is expected to hand
/// the evaluator.
#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
pub struct CliOptions {
    pub source_modules: Vec<String>,
    pub allowed_modules: Vec<String>,
    pub allowed_resources: Vec<String>,
    pub root_dir: Option<String>,
    pub env_vars: std::collections::BTreeMap<String, String>,
    pub external_properties: std::collections::BTreeMap<String, String>,
    pub timeout: Option<std::time::Duration>,
    pub module_cache_dir: Option<String>,
    pub output_format: Option<OutputFormat>,
    pub output_path: Option<String>,
}

/// Process exit codes (§6).
pub mod exit_code {
    pub const SUCCESS: i32 = 0;
    pub const EVALUATION_ERROR: i32 = 1;
    pub const PROTOCOL_ERROR: i32 = 2;
    pub const CONFIGURATION_ERROR: i32 = 3;
}

/// Module-cache directory layout (§6): `<cache>/<scheme>/<host>/<path>/<sha256-of-source>.pkl`
/// plus a sibling `.meta` file carrying ETag/Last-Modified. Documented only
/// — persisting and reading this cache is a collaborator's responsibility,
/// not core evaluator logic.
pub fn cache_entry_path(cache_root: &str, scheme: &str, host: &str, path: &str, source_sha256_hex: &str) -> String {
    format!("{cache_root}/{scheme}/{host}/{path}/{source_sha256_hex}.pkl")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cache_entry_path_matches_documented_layout() {
        let path = cache_entry_path("/cache", "https", "example.com", "a/b", "deadbeef");
        assert_eq!(path, "/cache/https/example.com/a/b/deadbeef.pkl");
    }
}
