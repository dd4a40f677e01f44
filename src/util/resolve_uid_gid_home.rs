use anyhow::{Result, anyhow};
use nix::unistd::{Gid, Uid, getresgid, getresuid};
use std::path::PathBuf;

use crate::types::UidGidHome;

const FALLBACK_HOME: &str = "/tmp";

/**
 * We are normally run through sudo, since mounting needs root. Sandboxes and
 * config files still belong under the home of whoever invoked sudo, so work out
 * who that is.
 */
pub fn resolve_uid_gid_home() -> Result<UidGidHome> {
    let resuid = getresuid()?;
    let resgid = getresgid()?;
    resolve_from(resuid.real, resuid.effective, resgid.real, |key| {
        std::env::var(key).ok().filter(|v| !v.is_empty())
    })
}

fn resolve_from(
    real_uid: Uid,
    effective_uid: Uid,
    real_gid: Gid,
    env: impl Fn(&str) -> Option<String>,
) -> Result<UidGidHome> {
    // With setuid the real uid is already the user and SUDO_* can't be trusted
    let is_setuid = real_uid != effective_uid && effective_uid.is_root();

    let (uid, gid, home) = if is_setuid {
        (real_uid, real_gid, env("HOME"))
    } else {
        let uid = match env("SUDO_UID") {
            Some(uid) => Uid::from_raw(
                uid.parse::<u32>()
                    .map_err(|_| anyhow!("Failed to parse SUDO_UID: '{}'", uid))?,
            ),
            None => real_uid,
        };
        let gid = match env("SUDO_GID") {
            Some(gid) => Gid::from_raw(
                gid.parse::<u32>()
                    .map_err(|_| anyhow!("Failed to parse SUDO_GID: '{}'", gid))?,
            ),
            None => real_gid,
        };
        (uid, gid, env("SUDO_HOME").or_else(|| env("HOME")))
    };

    let home = home
        .map(PathBuf::from)
        .filter(|h| h.is_absolute() && h.is_dir())
        .unwrap_or_else(|| PathBuf::from(FALLBACK_HOME));

    Ok(UidGidHome { uid, gid, home })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env_of(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn test_sudo_vars_win_when_not_setuid() {
        let ugh = resolve_from(
            Uid::from_raw(0),
            Uid::from_raw(0),
            Gid::from_raw(0),
            env_of(&[("SUDO_UID", "1000"), ("SUDO_GID", "100"), ("HOME", "/")]),
        )
        .unwrap();
        assert_eq!(ugh.uid, Uid::from_raw(1000));
        assert_eq!(ugh.gid, Gid::from_raw(100));
        assert_eq!(ugh.home, PathBuf::from("/"));
    }

    #[test]
    fn test_setuid_ignores_sudo_vars() {
        let ugh = resolve_from(
            Uid::from_raw(1000),
            Uid::from_raw(0),
            Gid::from_raw(1000),
            env_of(&[("SUDO_UID", "0"), ("HOME", "/")]),
        )
        .unwrap();
        assert_eq!(ugh.uid, Uid::from_raw(1000));
    }

    #[test]
    fn test_missing_home_falls_back_to_tmp() {
        let ugh = resolve_from(
            Uid::from_raw(1000),
            Uid::from_raw(1000),
            Gid::from_raw(1000),
            env_of(&[("HOME", "/nonexistent/arch-sandbox-home")]),
        )
        .unwrap();
        assert_eq!(ugh.home, PathBuf::from(FALLBACK_HOME));
    }

    #[test]
    fn test_bad_sudo_uid() {
        assert!(
            resolve_from(
                Uid::from_raw(0),
                Uid::from_raw(0),
                Gid::from_raw(0),
                env_of(&[("SUDO_UID", "nope")]),
            )
            .is_err()
        );
    }
}
