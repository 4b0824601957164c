use std::io;
use std::path::{Component, Path, PathBuf};

/// Rejection reasons for a client-supplied path.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum PathViolation {
    #[error("absolute paths not allowed: {0}")]
    Absolute(String),

    #[error("path escapes working directory: {0}")]
    Escape(String),
}

/// Resolves client-relative paths against a fixed root directory.
///
/// Every handler that touches a file named by a request goes through
/// [`PathSandbox::resolve`]; the Terraform pipeline uses it to place its artifact.
#[derive(Debug, Clone)]
pub struct PathSandbox {
    root: PathBuf,
}

impl PathSandbox {
    /// The root does not need to exist yet; it is made absolute against the
    /// process working directory.
    pub fn new(root: impl AsRef<Path>) -> io::Result<Self> {
        let root = normalize(&std::path::absolute(root.as_ref())?);
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Join `relative` onto the root and verify the result stays beneath it.
    ///
    /// The check is lexical first (`..` components), then repeated on the
    /// canonical form of the longest existing prefix so that symlinks pointing
    /// outside the root are caught too.
    pub fn resolve(&self, relative: &str) -> Result<PathBuf, PathViolation> {
        let requested = Path::new(relative);
        if requested.is_absolute() || requested.has_root() {
            return Err(PathViolation::Absolute(relative.to_string()));
        }

        let joined = normalize(&self.root.join(requested));
        if !joined.starts_with(&self.root) {
            return Err(PathViolation::Escape(relative.to_string()));
        }

        if let Ok(real_root) = self.root.canonicalize() {
            let real = joined.ancestors().find_map(|p| p.canonicalize().ok());
            if let Some(real) = real {
                if !real.starts_with(&real_root) {
                    return Err(PathViolation::Escape(relative.to_string()));
                }
            }
        }

        Ok(joined)
    }
}

/// Lexical clean: drops `.` and folds `..` into its parent.
fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}
