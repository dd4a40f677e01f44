use std::path::{Path, PathBuf};

/// Expands a leading `~` or `~/` against `home`; other paths come back unchanged.
pub fn expand_tilde_path(path: &Path, home: &Path) -> PathBuf {
    match path.strip_prefix("~") {
        Ok(rest) if rest.as_os_str().is_empty() => home.to_path_buf(),
        Ok(rest) => home.join(rest),
        Err(_) => path.to_path_buf(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expand_tilde_path() {
        let home = Path::new("/home/test");
        assert_eq!(expand_tilde_path(Path::new("~"), home), home);
        assert_eq!(
            expand_tilde_path(Path::new("~/test"), home),
            home.join("test")
        );
        assert_eq!(
            expand_tilde_path(Path::new("~/test/test2"), home),
            home.join("test").join("test2")
        );
    }

    #[test]
    fn test_expand_tilde_path_untouched() {
        let home = Path::new("/home/test");
        assert_eq!(
            expand_tilde_path(Path::new("/test"), home),
            PathBuf::from("/test")
        );
        assert_eq!(
            expand_tilde_path(Path::new("~test"), home),
            PathBuf::from("~test")
        );
    }
}
