// crates/playdeck-server/src/config.rs
//
// Folder layout the producer factories read from and the log writer
// writes to. All inputs; nothing else is persisted.

use std::path::PathBuf;

#[derive(Clone, Debug)]
pub struct Paths {
    pub media_dir: PathBuf,
    pub template_dir: PathBuf,
    pub data_dir: PathBuf,
    pub log_dir: PathBuf,
}

impl Paths {
    /// Conventional layout under one root folder.
    pub fn under_root(root: impl Into<PathBuf>) -> Paths {
        let root = root.into();
        Paths {
            media_dir: root.join("media"),
            template_dir: root.join("templates"),
            data_dir: root.join("data"),
            log_dir: root.join("log"),
        }
    }
}

impl Default for Paths {
    fn default() -> Paths {
        Paths::under_root(".")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn root_layout() {
        let p = Paths::under_root("/srv/playdeck");
        assert_eq!(p.media_dir, PathBuf::from("/srv/playdeck/media"));
        assert_eq!(p.log_dir, PathBuf::from("/srv/playdeck/log"));
    }
}
