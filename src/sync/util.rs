//! Path helpers shared by configuration and sync code.

/// Expands a leading `~` or `~/` to the user's home directory.
///
/// Paths are returned unchanged when `HOME` is unset or when the tilde names
/// another user (`~alice/...`).
///
/// # Examples
///
/// ```
/// # use rtox::sync::expand_tilde;
/// assert_eq!(expand_tilde("/etc/ssh/ssh_known_hosts"), "/etc/ssh/ssh_known_hosts");
/// assert_eq!(expand_tilde("~alice/key"), "~alice/key");
/// ```
#[must_use]
pub fn expand_tilde(path: &str) -> String {
    let Some(home) = std::env::var_os("HOME") else {
        return path.to_owned();
    };
    let home_dir = home.to_string_lossy();
    if path == "~" {
        return home_dir.into_owned();
    }
    path.strip_prefix("~/")
        .map_or_else(|| path.to_owned(), |rest| format!("{home_dir}/{rest}"))
}
