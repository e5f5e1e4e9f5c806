//! Well-known addresses the host listens on.
//!
//! - Windows: `\\.\pipe\discord-ipc-{0..9}`
//! - Unix: `{base}/discord-ipc-{0..9}`, where `base` is the first set of
//!   `XDG_RUNTIME_DIR`, `TMPDIR`, `TMP`, `TEMP`, else `/tmp`

use std::path::PathBuf;

/// Name prefix shared by every candidate address.
pub const IPC_PREFIX: &str = "discord-ipc";

/// Number of candidate addresses probed, starting at index 0.
pub const CANDIDATE_COUNT: usize = 10;

/// Environment variables consulted for the socket directory, in order.
pub const SOCKET_DIR_VARS: [&str; 4] = ["XDG_RUNTIME_DIR", "TMPDIR", "TMP", "TEMP"];

/// Socket directory used when none of [`SOCKET_DIR_VARS`] is set.
pub const FALLBACK_SOCKET_DIR: &str = "/tmp";

/// Named pipe paths, index 0 first.
pub fn pipe_candidates() -> Vec<PathBuf> {
    (0..CANDIDATE_COUNT)
        .map(|i| PathBuf::from(format!(r"\\.\pipe\{}-{}", IPC_PREFIX, i)))
        .collect()
}

/// Resolve the socket directory using `lookup` for environment access.
pub fn socket_dir<F>(lookup: F) -> PathBuf
where
    F: Fn(&str) -> Option<String>,
{
    SOCKET_DIR_VARS
        .iter()
        .filter_map(|var| lookup(var))
        .map(|dir| dir.trim_end_matches('/').to_string())
        .find(|dir| !dir.is_empty())
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(FALLBACK_SOCKET_DIR))
}

/// Unix socket paths, index 0 first.
pub fn socket_candidates<F>(lookup: F) -> Vec<PathBuf>
where
    F: Fn(&str) -> Option<String>,
{
    let dir = socket_dir(lookup);
    (0..CANDIDATE_COUNT)
        .map(|i| dir.join(format!("{}-{}", IPC_PREFIX, i)))
        .collect()
}

/// Unix socket paths resolved from the process environment.
pub fn socket_candidates_from_env() -> Vec<PathBuf> {
    socket_candidates(|var| std::env::var(var).ok())
}
