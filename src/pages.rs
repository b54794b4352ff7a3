//! Page-image discovery under a year-structured root directory.
//!
//! Layout expected on disk:
//!
//! ```text
//! pages/
//!  ├─ 2019/
//!  │   ├─ 2019_EE_01.png
//!  │   ├─ 2019_EE_02.png
//!  │   └─ …
//!  └─ 2020/
//!      └─ 2020_EE_01.png
//! ```
//!
//! A file is a page image when its name starts with the year directory's
//! name and contains a `_<digits>.` page segment. Files that do not match
//! are skipped with a warning, never treated as an error — scan folders
//! accumulate stray notes and thumbnails.

use crate::error::ExamscribeError;
use crate::types::PageKey;
use once_cell::sync::Lazy;
use regex::Regex;
use std::path::{Path, PathBuf};
use tracing::warn;

static RE_PAGE_SEGMENT: Lazy<Regex> = Lazy::new(|| Regex::new(r"_(\d+)\.").unwrap());

const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "tiff", "bmp"];

/// One discovered page image.
#[derive(Debug, Clone)]
pub struct PageImage {
    pub key: PageKey,
    pub path: PathBuf,
}

/// Enumerate page images under `root`, optionally restricted to one year.
///
/// Year directories are the all-digit subdirectories of `root`. The result
/// is sorted lexicographically by `(year, page)`, giving the deterministic
/// backlog order resumption relies on.
pub fn scan_root(root: &Path, year: Option<&str>) -> Result<Vec<PageImage>, ExamscribeError> {
    if !root.is_dir() {
        return Err(ExamscribeError::RootNotFound {
            path: root.to_path_buf(),
        });
    }

    let year_dirs: Vec<String> = match year {
        Some(y) => {
            if !root.join(y).is_dir() {
                return Err(ExamscribeError::YearNotFound {
                    year: y.to_string(),
                    root: root.to_path_buf(),
                });
            }
            vec![y.to_string()]
        }
        None => {
            let mut dirs = Vec::new();
            for dirent in std::fs::read_dir(root)? {
                let dirent = dirent?;
                let name = dirent.file_name().to_string_lossy().into_owned();
                if dirent.path().is_dir() && name.chars().all(|c| c.is_ascii_digit()) {
                    dirs.push(name);
                }
            }
            dirs.sort();
            dirs
        }
    };

    let mut pages = Vec::new();
    for year_name in &year_dirs {
        let dir = root.join(year_name);
        let mut names: Vec<String> = std::fs::read_dir(&dir)?
            .filter_map(|e| e.ok())
            .filter(|e| e.path().is_file())
            .map(|e| e.file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();

        for name in names {
            if !has_image_extension(&name) {
                continue;
            }
            if !name.starts_with(year_name.as_str()) {
                warn!("skipping '{name}': filename does not start with year '{year_name}'");
                continue;
            }
            let Some(page) = page_number(&name) else {
                warn!("skipping '{name}': no _<page>. segment in filename");
                continue;
            };
            pages.push(PageImage {
                key: PageKey::new(year_name.clone(), page),
                path: dir.join(&name),
            });
        }
    }

    pages.sort_by(|a, b| a.key.cmp(&b.key));
    Ok(pages)
}

/// Re-locate the image file for a previously stored page key.
///
/// Used when a flagged page must be reprocessed: the stored key has leading
/// zeros stripped, so both `_7.` and `_07.` style filenames must match.
pub fn find_page_image(root: &Path, key: &PageKey) -> Option<PathBuf> {
    let dir = root.join(&key.year);
    let pattern = Regex::new(&format!(r"_0*{}\.", key.page)).ok()?;

    let mut names: Vec<String> = std::fs::read_dir(&dir)
        .ok()?
        .filter_map(|e| e.ok())
        .map(|e| e.file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();

    names
        .into_iter()
        .find(|name| {
            has_image_extension(name) && name.starts_with(&key.year) && pattern.is_match(name)
        })
        .map(|name| dir.join(name))
}

fn has_image_extension(name: &str) -> bool {
    let lower = name.to_ascii_lowercase();
    IMAGE_EXTENSIONS
        .iter()
        .any(|ext| lower.ends_with(&format!(".{ext}")))
}

/// Extract the page number from a filename, stripping leading zeros
/// (`"2019_EE_07.png"` → `"7"`).
fn page_number(name: &str) -> Option<String> {
    let caps = RE_PAGE_SEGMENT.captures(name)?;
    let stripped = caps[1].trim_start_matches('0');
    Some(if stripped.is_empty() {
        "0".to_string()
    } else {
        stripped.to_string()
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn touch(path: &Path) {
        std::fs::write(path, b"png").unwrap();
    }

    #[test]
    fn page_number_strips_leading_zeros() {
        assert_eq!(page_number("2019_EE_07.png").as_deref(), Some("7"));
        assert_eq!(page_number("2019_EE_12.png").as_deref(), Some("12"));
        assert_eq!(page_number("2019_EE.png"), None);
    }

    #[test]
    fn scan_skips_non_matching_files() {
        let tmp = tempfile::tempdir().unwrap();
        let year = tmp.path().join("2019");
        std::fs::create_dir(&year).unwrap();
        touch(&year.join("2019_EE_01.png"));
        touch(&year.join("2019_EE_02.png"));
        touch(&year.join("notes.txt"));
        touch(&year.join("stray_03.png")); // wrong prefix
        touch(&year.join("2019_cover.png")); // no page segment

        let pages = scan_root(tmp.path(), None).unwrap();
        let keys: Vec<String> = pages.iter().map(|p| p.key.to_string()).collect();
        assert_eq!(keys, vec!["2019/1", "2019/2"]);
    }

    #[test]
    fn scan_respects_year_filter() {
        let tmp = tempfile::tempdir().unwrap();
        for y in ["2019", "2020"] {
            let dir = tmp.path().join(y);
            std::fs::create_dir(&dir).unwrap();
            touch(&dir.join(format!("{y}_EE_01.png")));
        }

        let pages = scan_root(tmp.path(), Some("2020")).unwrap();
        assert_eq!(pages.len(), 1);
        assert_eq!(pages[0].key.year, "2020");

        assert!(matches!(
            scan_root(tmp.path(), Some("1999")),
            Err(ExamscribeError::YearNotFound { .. })
        ));
    }

    #[test]
    fn find_page_image_matches_zero_padded_names() {
        let tmp = tempfile::tempdir().unwrap();
        let year = tmp.path().join("2019");
        std::fs::create_dir(&year).unwrap();
        touch(&year.join("2019_EE_07.png"));
        touch(&year.join("2019_EE_17.png"));

        let key = PageKey::new("2019", "7");
        let found = find_page_image(tmp.path(), &key).unwrap();
        assert!(found.ends_with("2019_EE_07.png"));

        // "7" must not match "_17."
        let key17 = PageKey::new("2019", "17");
        let found17 = find_page_image(tmp.path(), &key17).unwrap();
        assert!(found17.ends_with("2019_EE_17.png"));
    }
}
