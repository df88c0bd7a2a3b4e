// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Where config and the local object store live on disk.

use std::path::PathBuf;

use stratus_core::error::Result;

const APP_DIR: &str = "stratus";

/// Application data directory, created if missing.
///
/// Mobile hosts should set `storage_root` explicitly; this is only a
/// desktop default.
pub fn data_dir() -> Result<PathBuf> {
    let dir = base_dir(|name| std::env::var_os(name).map(PathBuf::from)).join(APP_DIR);
    std::fs::create_dir_all(&dir)?;
    Ok(dir)
}

/// Named subdirectory of [`data_dir`], e.g. `"buckets"`.
pub fn data_subdir(name: &str) -> Result<PathBuf> {
    let dir = data_dir()?.join(name);
    std::fs::create_dir_all(&dir)?;
    Ok(dir)
}

/// `$XDG_DATA_HOME`, then `$HOME/.local/share`, then the temp dir.
fn base_dir(env: impl Fn(&str) -> Option<PathBuf>) -> PathBuf {
    env("XDG_DATA_HOME")
        .filter(|p| p.is_absolute())
        .or_else(|| env("HOME").map(|home| home.join(".local").join("share")))
        .unwrap_or_else(std::env::temp_dir)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_dir_prefers_xdg_then_home() {
        let both = |name: &str| match name {
            "XDG_DATA_HOME" => Some(PathBuf::from("/xdg")),
            "HOME" => Some(PathBuf::from("/home/u")),
            _ => None,
        };
        assert_eq!(base_dir(both), PathBuf::from("/xdg"));

        let relative_xdg = |name: &str| match name {
            "XDG_DATA_HOME" => Some(PathBuf::from("relative")),
            "HOME" => Some(PathBuf::from("/home/u")),
            _ => None,
        };
        assert_eq!(base_dir(relative_xdg), PathBuf::from("/home/u/.local/share"));

        assert_eq!(base_dir(|_| None), std::env::temp_dir());
    }
}
