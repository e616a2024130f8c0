//! Utility functions for path manipulation.

use camino::{Utf8Path, Utf8PathBuf};

/// Expands a leading `~/` prefix to the user's home directory.
///
/// If the `HOME` environment variable is not set, the function returns the
/// input string unchanged (i.e., the leading `~` is not expanded).
///
/// # Examples
///
/// ```
/// # use kubestrap::util::expand_tilde;
/// let home = std::env::var("HOME").expect("HOME should be set");
/// assert_eq!(expand_tilde("~/.ssh/id_rsa"), format!("{home}/.ssh/id_rsa"));
/// assert_eq!(expand_tilde("/absolute/path"), "/absolute/path");
/// ```
#[must_use]
pub fn expand_tilde(path: &str) -> String {
    if let Some(rest) = path.strip_prefix("~/")
        && let Some(home) = std::env::var_os("HOME")
    {
        return format!("{}/{rest}", home.to_string_lossy());
    }
    path.to_owned()
}

/// Resolves `path` against `base` unless it is already absolute.
#[must_use]
pub fn resolve_against(base: &Utf8Path, path: &Utf8Path) -> Utf8PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        base.join(path)
    }
}
