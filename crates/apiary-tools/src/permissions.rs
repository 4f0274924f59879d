//! Permission envelope for file- and command-touching tools.

use std::path::{Component, Path, PathBuf};

use globset::{Glob, GlobSet, GlobSetBuilder};

use crate::ToolError;

/// Path and command rules resolved relative to the agent's directory.
///
/// Deny rules win over allow rules. An empty allow list permits every path;
/// write-class tools configured without explicit permissions are given
/// `allowed_paths: ["**/*"]` at definition time, so in practice they are
/// confined to the agent directory.
///
/// Paths are normalized before matching: `.`/`..` components and symlinks are
/// resolved via `canonicalize` when the path exists, with lexical collapsing
/// as the fallback for paths that are about to be created. A path that
/// normalizes to somewhere outside the agent directory can never satisfy the
/// (directory-relative) allow globs and is rejected outright.
#[derive(Debug, Clone)]
pub struct PermissionEnvelope {
    base_dir: PathBuf,
    allowed_patterns: Vec<String>,
    deny_patterns: Vec<String>,
    allowed: Option<GlobSet>,
    denied: Option<GlobSet>,
    /// Allowed command words for shell tools. Empty means unrestricted.
    allowed_commands: Vec<String>,
}

impl PermissionEnvelope {
    /// An envelope with no restrictions, rooted at `base_dir`.
    #[must_use]
    pub fn allow_all(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: normalize_path(&base_dir.into()),
            allowed_patterns: Vec::new(),
            deny_patterns: Vec::new(),
            allowed: None,
            denied: None,
            allowed_commands: Vec::new(),
        }
    }

    /// Build an envelope from glob patterns.
    ///
    /// # Errors
    ///
    /// Returns [`ToolError::InvalidArguments`] when a glob fails to compile.
    pub fn new(
        base_dir: impl Into<PathBuf>,
        allowed_paths: &[String],
        deny_paths: &[String],
        allowed_commands: &[String],
    ) -> Result<Self, ToolError> {
        let allowed = if allowed_paths.is_empty() {
            None
        } else {
            Some(compile_globs(allowed_paths)?)
        };
        let denied = if deny_paths.is_empty() {
            None
        } else {
            Some(compile_globs(deny_paths)?)
        };

        Ok(Self {
            base_dir: normalize_path(&base_dir.into()),
            allowed_patterns: allowed_paths.to_vec(),
            deny_patterns: deny_paths.to_vec(),
            allowed,
            denied,
            allowed_commands: allowed_commands.to_vec(),
        })
    }

    /// The directory the patterns resolve against.
    #[must_use]
    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    /// Resolve a (possibly relative) path against the base directory and
    /// normalize it: `canonicalize` resolves `.`, `..`, and symlinks when
    /// the path exists; lexical collapsing covers paths not created yet.
    #[must_use]
    pub fn resolve(&self, path: &str) -> PathBuf {
        let p = Path::new(path);
        let joined = if p.is_absolute() {
            p.to_path_buf()
        } else {
            self.base_dir.join(p)
        };
        normalize_path(&joined)
    }

    /// Check a path against the envelope.
    ///
    /// # Errors
    ///
    /// Returns [`ToolError::PermissionDenied`] naming the violated rule.
    pub fn check_path(&self, path: &str) -> Result<PathBuf, ToolError> {
        let resolved = self.resolve(path);
        // Globs are written relative to the agent directory; match the
        // relative form when the normalized path is inside it, the absolute
        // form otherwise.
        let (candidate, inside) = match resolved.strip_prefix(&self.base_dir) {
            Ok(relative) => (relative.to_path_buf(), true),
            Err(_) => (resolved.clone(), false),
        };

        if let Some(denied) = &self.denied {
            if denied.is_match(&candidate) {
                let rule = matching_pattern(&self.deny_patterns, &candidate)
                    .unwrap_or_else(|| "deny_paths".to_string());
                return Err(ToolError::PermissionDenied {
                    rule: format!("path {} matches deny_paths rule {rule:?}", resolved.display()),
                });
            }
        }

        if let Some(allowed) = &self.allowed {
            if !inside {
                return Err(ToolError::PermissionDenied {
                    rule: format!(
                        "path {} escapes the agent directory {}",
                        resolved.display(),
                        self.base_dir.display()
                    ),
                });
            }
            if !allowed.is_match(&candidate) {
                return Err(ToolError::PermissionDenied {
                    rule: format!(
                        "path {} matches none of allowed_paths {:?}",
                        resolved.display(),
                        self.allowed_patterns
                    ),
                });
            }
        }

        Ok(resolved)
    }

    /// Check a shell command against `allowed_commands`.
    ///
    /// The first whitespace-separated word must equal one of the allowed
    /// command names. An empty list allows everything.
    ///
    /// # Errors
    ///
    /// Returns [`ToolError::PermissionDenied`] naming the violated rule.
    pub fn check_command(&self, command: &str) -> Result<(), ToolError> {
        if self.allowed_commands.is_empty() {
            return Ok(());
        }
        let word = command.split_whitespace().next().unwrap_or_default();
        if self.allowed_commands.iter().any(|c| c == word) {
            Ok(())
        } else {
            Err(ToolError::PermissionDenied {
                rule: format!(
                    "command {word:?} is not in allowed_commands {:?}",
                    self.allowed_commands
                ),
            })
        }
    }
}

/// Canonicalize when possible; otherwise collapse `.`/`..` lexically so a
/// not-yet-created path still cannot smuggle traversal components past the
/// glob match.
fn normalize_path(path: &Path) -> PathBuf {
    path.canonicalize()
        .unwrap_or_else(|_| collapse_components(path))
}

fn collapse_components(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                // Popping at the root is a no-op, so `/..` stays at `/`.
                out.pop();
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

fn compile_globs(patterns: &[String]) -> Result<GlobSet, ToolError> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        let glob = Glob::new(pattern)
            .map_err(|e| ToolError::InvalidArguments(format!("bad glob {pattern:?}: {e}")))?;
        builder.add(glob);
    }
    builder
        .build()
        .map_err(|e| ToolError::InvalidArguments(format!("glob set: {e}")))
}

fn matching_pattern(patterns: &[String], candidate: &Path) -> Option<String> {
    patterns.iter().find_map(|p| {
        Glob::new(p).ok().and_then(|g| {
            if g.compile_matcher().is_match(candidate) {
                Some(p.clone())
            } else {
                None
            }
        })
    })
}
