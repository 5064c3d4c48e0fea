// ABOUTME: Resolves a dotted package identifier to a directory and imports every module in it
// ABOUTME: whose file stem ends in `__prism`. Broken modules are logged and skipped, never fatal.

use std::env;
use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use thiserror::Error;
use walkdir::{DirEntry, WalkDir};

use prism_core::AgentRegistry;

use crate::manifest::{MODULE_EXTENSIONS, MODULE_SUFFIX, ManifestImporter, Module, ModuleImporter};

/// Errors that stop discovery of a package as a whole.
#[derive(Debug, Error)]
pub enum DiscoveryError {
    #[error("invalid package identifier: {0:?}")]
    InvalidPackage(String),

    #[error("package '{0}' not found on the search path or in the current directory")]
    Unresolved(String),

    #[error("'{package}' is a module, not a package: {}", .path.display())]
    NotAPackage { package: String, path: PathBuf },
}

/// A module that was found but could not be imported.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedModule {
    pub module: String,
    pub reason: String,
}

/// An agent registered during discovery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportedAgent {
    pub module: String,
    pub agent: String,
}

/// What a discovery pass did.
#[derive(Debug, Clone)]
pub struct DiscoveryReport {
    pub package: String,
    pub root: PathBuf,
    pub imported: Vec<ImportedAgent>,
    pub skipped: Vec<SkippedModule>,
}

/// Finds and imports agent modules for a package.
pub struct Discovery {
    importer: Arc<dyn ModuleImporter>,
    search_path: Vec<PathBuf>,
    cwd: Option<PathBuf>,
}

impl Default for Discovery {
    fn default() -> Self {
        Self::new(Arc::new(ManifestImporter::new()))
    }
}

impl Discovery {
    pub fn new(importer: Arc<dyn ModuleImporter>) -> Self {
        Self {
            importer,
            search_path: Vec::new(),
            cwd: None,
        }
    }

    pub fn search_path(mut self, paths: Vec<PathBuf>) -> Self {
        self.search_path = paths;
        self
    }

    /// Use a platform path list, as found in `PRISM_PATH`.
    pub fn search_path_list(self, list: impl AsRef<OsStr>) -> Self {
        let paths = env::split_paths(list.as_ref())
            .filter(|p| !p.as_os_str().is_empty())
            .collect();
        self.search_path(paths)
    }

    /// Directory used as the fallback root. Defaults to the process's working directory.
    pub fn cwd(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cwd = Some(dir.into());
        self
    }

    /// Resolve `package` to its directory.
    pub fn resolve(&self, package: &str) -> Result<PathBuf, DiscoveryError> {
        let relative = package_path(package)?;

        for root in &self.search_path {
            if let Some(found) = probe(root, &relative, package) {
                return found;
            }
        }

        let cwd = match &self.cwd {
            Some(dir) => Some(dir.clone()),
            None => env::current_dir().ok(),
        };
        if let Some(cwd) = cwd {
            if cwd.join(&relative).is_dir() {
                tracing::info!(
                    package = %package,
                    cwd = %cwd.display(),
                    "package not found on search path, adding current directory"
                );
            }
            if let Some(found) = probe(&cwd, &relative, package) {
                return found;
            }
        }

        Err(DiscoveryError::Unresolved(package.to_string()))
    }

    /// Import every matching module under `package` into `registry`.
    pub fn discover(
        &self,
        package: &str,
        registry: &AgentRegistry,
    ) -> Result<DiscoveryReport, DiscoveryError> {
        let root = self.resolve(package)?;
        let mut report = DiscoveryReport {
            package: package.to_string(),
            root: root.clone(),
            imported: Vec::new(),
            skipped: Vec::new(),
        };

        for module in find_modules(package, &root) {
            match self.importer.import(&module, registry) {
                Ok(agents) => {
                    report
                        .imported
                        .extend(agents.into_iter().map(|agent| ImportedAgent {
                            module: module.name.clone(),
                            agent,
                        }));
                }
                Err(e) => {
                    tracing::warn!(module = %module.name, error = %e, "failed to import module");
                    report.skipped.push(SkippedModule {
                        module: module.name.clone(),
                        reason: e.to_string(),
                    });
                }
            }
        }

        tracing::info!(
            package = %package,
            root = %root.display(),
            imported = report.imported.len(),
            skipped = report.skipped.len(),
            "discovery finished"
        );
        Ok(report)
    }
}

fn package_path(package: &str) -> Result<PathBuf, DiscoveryError> {
    let valid_segment = |segment: &str| {
        !segment.is_empty()
            && !segment.starts_with(|c: char| c.is_ascii_digit())
            && segment
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
    };

    if package.is_empty() || !package.split('.').all(valid_segment) {
        return Err(DiscoveryError::InvalidPackage(package.to_string()));
    }
    Ok(package.split('.').collect())
}

/// Look for the package under one root. `None` means keep searching.
fn probe(root: &Path, relative: &Path, package: &str) -> Option<Result<PathBuf, DiscoveryError>> {
    let candidate = root.join(relative);
    if candidate.is_dir() {
        return Some(Ok(candidate));
    }
    MODULE_EXTENSIONS
        .iter()
        .map(|ext| candidate.with_extension(ext))
        .find(|path| path.is_file())
        .map(|path| {
            Err(DiscoveryError::NotAPackage {
                package: package.to_string(),
                path,
            })
        })
}

fn is_hidden(entry: &DirEntry) -> bool {
    entry.depth() > 0
        && entry
            .file_name()
            .to_str()
            .map(|name| name.starts_with('.') || name == "__pycache__")
            .unwrap_or(false)
}

fn module_for(package: &str, root: &Path, path: &Path) -> Option<Module> {
    let ext = path.extension()?.to_str()?;
    if !MODULE_EXTENSIONS.contains(&ext) {
        return None;
    }
    let stem = path.file_stem()?.to_str()?;
    if !stem.ends_with(MODULE_SUFFIX) {
        return None;
    }

    let relative = path.strip_prefix(root).ok()?.with_extension("");
    let mut name = package.to_string();
    for component in relative.components() {
        name.push('.');
        name.push_str(component.as_os_str().to_str()?);
    }
    Some(Module::new(name, path))
}

/// Every matching module under `root`, in file-name order.
pub fn find_modules(package: &str, root: &Path) -> Vec<Module> {
    WalkDir::new(root)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|entry| !is_hidden(entry))
        .filter_map(|entry| match entry {
            Ok(entry) => Some(entry),
            Err(e) => {
                tracing::warn!(error = %e, "skipping unreadable path during discovery");
                None
            }
        })
        .filter(|entry| entry.file_type().is_file())
        .filter_map(|entry| module_for(package, root, entry.path()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    const AGENT: &str = "script:\n  - text: hello\n";

    fn touch(root: &Path, rel: &str, body: &str) {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, body).unwrap();
    }

    #[test]
    fn three_modules_with_one_broken_registers_two() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "agents/alpha__prism.yaml", AGENT);
        touch(dir.path(), "agents/beta__prism.yaml", "script: [oops\n");
        touch(dir.path(), "agents/nested/gamma__prism.yml", AGENT);
        touch(dir.path(), "agents/helpers.yaml", AGENT);
        touch(dir.path(), "agents/notes__prism.txt", AGENT);

        let registry = AgentRegistry::new();
        let report = Discovery::default()
            .search_path(vec![dir.path().to_path_buf()])
            .discover("agents", &registry)
            .unwrap();

        assert_eq!(registry.names(), vec!["alpha", "gamma"]);
        assert_eq!(
            report.imported,
            vec![
                ImportedAgent {
                    module: "agents.alpha__prism".to_string(),
                    agent: "alpha".to_string()
                },
                ImportedAgent {
                    module: "agents.nested.gamma__prism".to_string(),
                    agent: "gamma".to_string()
                },
            ]
        );
        assert_eq!(report.skipped.len(), 1);
        assert_eq!(report.skipped[0].module, "agents.beta__prism");
    }

    #[test]
    fn dotted_package_resolves_to_nested_directory() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "company/support/desk__prism.yaml", AGENT);

        let registry = AgentRegistry::new();
        let report = Discovery::default()
            .search_path(vec![dir.path().to_path_buf()])
            .discover("company.support", &registry)
            .unwrap();

        assert_eq!(report.root, dir.path().join("company").join("support"));
        assert_eq!(report.imported[0].module, "company.support.desk__prism");
    }

    #[test]
    fn search_path_order_wins() {
        let first = tempfile::tempdir().unwrap();
        let second = tempfile::tempdir().unwrap();
        touch(first.path(), "pkg/one__prism.yaml", AGENT);
        touch(second.path(), "pkg/two__prism.yaml", AGENT);

        let list = env::join_paths([first.path(), second.path()]).unwrap();
        let registry = AgentRegistry::new();
        Discovery::default()
            .search_path_list(list)
            .discover("pkg", &registry)
            .unwrap();

        assert_eq!(registry.names(), vec!["one"]);
    }

    #[test]
    fn falls_back_to_working_directory_once() {
        let empty = tempfile::tempdir().unwrap();
        let cwd = tempfile::tempdir().unwrap();
        touch(cwd.path(), "local_agents/helper__prism.yaml", AGENT);

        let registry = AgentRegistry::new();
        let report = Discovery::default()
            .search_path(vec![empty.path().to_path_buf()])
            .cwd(cwd.path())
            .discover("local_agents", &registry)
            .unwrap();

        assert_eq!(report.root, cwd.path().join("local_agents"));
        assert_eq!(registry.names(), vec!["helper"]);
    }

    #[test]
    fn unresolved_invalid_and_module_identifiers_fail() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "single__prism.yaml", AGENT);
        let discovery = Discovery::default()
            .search_path(vec![dir.path().to_path_buf()])
            .cwd(dir.path());

        assert!(matches!(
            discovery.resolve("missing"),
            Err(DiscoveryError::Unresolved(ref p)) if p == "missing"
        ));
        for bad in ["", "a..b", ".a", "1pkg", "a/b"] {
            assert!(
                matches!(discovery.resolve(bad), Err(DiscoveryError::InvalidPackage(_))),
                "expected {:?} to be rejected",
                bad
            );
        }
        assert!(matches!(
            discovery.resolve("single__prism"),
            Err(DiscoveryError::NotAPackage { .. })
        ));
    }

    #[test]
    fn rediscovery_overwrites_instead_of_duplicating() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "pkg/a__prism.yaml", AGENT);
        touch(dir.path(), "pkg/b__prism.yaml", AGENT);

        let registry = AgentRegistry::new();
        let discovery = Discovery::default().search_path(vec![dir.path().to_path_buf()]);
        discovery.discover("pkg", &registry).unwrap();
        discovery.discover("pkg", &registry).unwrap();

        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn hidden_directories_are_not_walked() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "pkg/.cache/stale__prism.yaml", AGENT);
        touch(dir.path(), "pkg/live__prism.yaml", AGENT);

        let modules = find_modules("pkg", &dir.path().join("pkg"));
        let names: Vec<&str> = modules.iter().map(|m| m.name.as_str()).collect();
        assert_eq!(names, vec!["pkg.live__prism"]);
    }
}
