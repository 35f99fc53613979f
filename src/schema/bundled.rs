//! Meta-schemas shipped inside the binary

use include_dir::{include_dir, Dir};
use std::path::Path;

static BUNDLED: Dir<'static> = include_dir!("$CARGO_MANIFEST_DIR/calm");

/// CALM release whose meta-schemas are bundled
pub const BUNDLED_CALM_VERSION: &str = "1.1";

/// `(relative path, contents)` for every bundled schema file
pub fn bundled_files() -> Vec<(&'static Path, &'static str)> {
    let mut files = Vec::new();
    collect_files(&BUNDLED, &mut files);
    files.sort_by(|a, b| a.0.cmp(b.0));
    files
}

fn collect_files(dir: &'static Dir<'static>, files: &mut Vec<(&'static Path, &'static str)>) {
    for file in dir.files() {
        let path = file.path();
        if path.extension().map(|e| e == "json").unwrap_or(false) {
            if let Some(content) = file.contents_utf8() {
                files.push((path, content));
            }
        }
    }

    for subdir in dir.dirs() {
        collect_files(subdir, files);
    }
}
