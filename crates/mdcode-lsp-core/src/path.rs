//! File identity shared by every lookup.
//!
//! Registry keys, snapshot-cache keys, project source names and every query
//! handed to the analysis engine are [`FileName`]s produced by one
//! [`Normalizer`]. Two spellings of the same file yield equal names; the
//! original spelling is kept next to the comparison key for I/O and URIs.

use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::path::Path;

use percent_encoding::percent_decode_str;
use url::Url;

use crate::language::Language;

/// Whether file names differing only in case refer to the same file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PathCase {
    Sensitive,
    Insensitive,
}

impl PathCase {
    /// Case handling of the host platform's default file system.
    pub fn platform_default() -> Self {
        if cfg!(any(windows, target_os = "macos")) {
            PathCase::Insensitive
        } else {
            PathCase::Sensitive
        }
    }

    /// Resolve an optional `caseSensitivePaths` override.
    pub fn from_override(case_sensitive: Option<bool>) -> Self {
        match case_sensitive {
            Some(true) => PathCase::Sensitive,
            Some(false) => PathCase::Insensitive,
            None => Self::platform_default(),
        }
    }
}

/// A normalized absolute file identity.
///
/// Equality, hashing and ordering use the normalized key only.
#[derive(Clone)]
pub struct FileName {
    key: String,
    path: String,
}

impl FileName {
    /// The comparison key.
    pub fn key(&self) -> &str {
        &self.key
    }

    /// The normalized spelling (forward slashes, original case).
    pub fn as_str(&self) -> &str {
        &self.path
    }

    pub fn as_path(&self) -> &Path {
        Path::new(&self.path)
    }

    /// The extension of the final component, without the dot.
    pub fn extension(&self) -> Option<&str> {
        let file = self.path.rsplit('/').next()?;
        let (stem, ext) = file.rsplit_once('.')?;
        if stem.is_empty() { None } else { Some(ext) }
    }

    /// Case-insensitive extension test.
    pub fn has_extension(&self, ext: &str) -> bool {
        self.extension().is_some_and(|e| e.eq_ignore_ascii_case(ext))
    }

    /// The name of the virtual file standing for block `index` of this document.
    ///
    /// Built from the already-normalized key and spelling, so the result is
    /// normalized by construction.
    pub fn virtual_block(&self, index: usize, language: Language) -> FileName {
        let suffix = format!(".__block{}.{}", index, language.extension());
        FileName {
            key: format!("{}{}", self.key, suffix),
            path: format!("{}{}", self.path, suffix),
        }
    }

    /// The directory containing this file.
    pub fn parent(&self) -> Option<&str> {
        let (dir, _) = self.path.rsplit_once('/')?;
        if dir.is_empty() { Some("/") } else { Some(dir) }
    }

    /// A `file://` URI for this name.
    pub fn to_uri(&self) -> String {
        match Url::from_file_path(&self.path) {
            Ok(url) => url.to_string(),
            Err(()) if self.path.starts_with('/') => format!("file://{}", self.path),
            Err(()) => format!("file:///{}", self.path),
        }
    }
}

impl PartialEq for FileName {
    fn eq(&self, other: &Self) -> bool {
        self.key == other.key
    }
}

impl Eq for FileName {}

impl Hash for FileName {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.key.hash(state);
    }
}

impl PartialOrd for FileName {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for FileName {
    fn cmp(&self, other: &Self) -> Ordering {
        self.key.cmp(&other.key)
    }
}

impl fmt::Display for FileName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.path)
    }
}

impl fmt::Debug for FileName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FileName({:?})", self.path)
    }
}

/// The single normalization routine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Normalizer {
    case: PathCase,
}

impl Default for Normalizer {
    fn default() -> Self {
        Self::new(PathCase::platform_default())
    }
}

impl Normalizer {
    pub fn new(case: PathCase) -> Self {
        Self { case }
    }

    pub fn case(&self) -> PathCase {
        self.case
    }

    /// Normalize an absolute path. Relative paths yield `None`.
    pub fn file_name(&self, path: impl AsRef<Path>) -> Option<FileName> {
        let raw = path.as_ref().to_string_lossy();
        self.normalize_str(&raw)
    }

    /// Resolve `relative` against `base` and normalize the result.
    pub fn join(&self, base: &FileName, relative: &str) -> Option<FileName> {
        let relative = relative.replace('\\', "/");
        if is_absolute(&relative) {
            return self.normalize_str(&relative);
        }
        self.normalize_str(&format!("{}/{}", base.as_str(), relative))
    }

    /// Normalize a `file://` URI. Other schemes yield `None`.
    pub fn from_uri(&self, uri: &str) -> Option<FileName> {
        let url = Url::parse(uri).ok()?;
        if url.scheme() != "file" {
            return None;
        }
        match url.to_file_path() {
            Ok(path) => self.file_name(path),
            // Windows-style file URIs seen on a non-Windows host.
            Err(()) => {
                let decoded = percent_decode_str(url.path()).decode_utf8_lossy();
                let trimmed = decoded.strip_prefix('/').unwrap_or(&decoded);
                if has_drive_prefix(trimmed) {
                    self.normalize_str(trimmed)
                } else {
                    self.normalize_str(&decoded)
                }
            }
        }
    }

    fn normalize_str(&self, raw: &str) -> Option<FileName> {
        let raw = raw.replace('\\', "/");
        let raw = raw.strip_prefix("//?/").unwrap_or(&raw);
        if !is_absolute(raw) {
            return None;
        }

        let (prefix, rest) = if has_drive_prefix(raw) {
            let (drive, rest) = raw.split_at(2);
            (drive.to_ascii_lowercase(), rest)
        } else {
            (String::new(), raw)
        };

        let mut parts: Vec<&str> = Vec::new();
        for component in rest.split('/') {
            match component {
                "" | "." => {}
                ".." => {
                    parts.pop();
                }
                other => parts.push(other),
            }
        }

        let path = format!("{}/{}", prefix, parts.join("/"));
        let key = match self.case {
            PathCase::Sensitive => path.clone(),
            PathCase::Insensitive => path.to_lowercase(),
        };
        Some(FileName { key, path })
    }
}

fn is_absolute(path: &str) -> bool {
    path.starts_with('/') || (has_drive_prefix(path) && path[2..].starts_with('/'))
}

fn has_drive_prefix(path: &str) -> bool {
    let bytes = path.as_bytes();
    bytes.len() >= 2 && bytes[0].is_ascii_alphabetic() && bytes[1] == b':'
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sensitive() -> Normalizer {
        Normalizer::new(PathCase::Sensitive)
    }

    fn insensitive() -> Normalizer {
        Normalizer::new(PathCase::Insensitive)
    }

    #[test]
    fn resolves_dot_segments() {
        let name = sensitive().file_name("/repo/docs/./a/../guide.md").unwrap();
        assert_eq!(name.as_str(), "/repo/docs/guide.md");
    }

    #[test]
    fn rejects_relative_paths() {
        assert!(sensitive().file_name("docs/guide.md").is_none());
    }

    #[test]
    fn backslashes_and_drive_letters() {
        let a = insensitive().file_name(r"C:\Repo\Docs\Guide.md").unwrap();
        let b = insensitive().file_name("c:/repo/docs/guide.md").unwrap();
        assert_eq!(a, b);
        assert_eq!(a.as_str(), "c:/Repo/Docs/Guide.md");
    }

    #[test]
    fn case_sensitivity_controls_equality() {
        let upper = sensitive().file_name("/repo/Guide.md").unwrap();
        let lower = sensitive().file_name("/repo/guide.md").unwrap();
        assert_ne!(upper, lower);

        let upper = insensitive().file_name("/repo/Guide.md").unwrap();
        let lower = insensitive().file_name("/repo/guide.md").unwrap();
        assert_eq!(upper, lower);
    }

    #[test]
    fn uri_and_path_agree() {
        let n = sensitive();
        let from_uri = n.from_uri("file:///repo/my%20docs/guide.md").unwrap();
        let from_path = n.file_name("/repo/my docs/guide.md").unwrap();
        assert_eq!(from_uri, from_path);
        assert_eq!(from_path.to_uri(), "file:///repo/my%20docs/guide.md");
    }

    #[cfg(unix)]
    #[test]
    fn drive_letter_uris_decode_when_not_a_local_path() {
        let name = sensitive()
            .from_uri("file://server/C:/100%25/my%20docs/notes%20")
            .unwrap();
        assert_eq!(name.as_str(), "c:/100%/my docs/notes ");
    }

    #[test]
    fn non_file_uris_do_not_resolve() {
        assert!(sensitive().from_uri("untitled:Untitled-1").is_none());
        assert!(sensitive().from_uri("not a uri").is_none());
    }

    #[test]
    fn virtual_block_names() {
        let owner = insensitive().file_name("/Repo/Guide.md").unwrap();
        let block = owner.virtual_block(2, Language::Tsx);
        assert_eq!(block.as_str(), "/Repo/Guide.md.__block2.tsx");
        assert_eq!(block.key(), "/repo/guide.md.__block2.tsx");
        assert_eq!(block.extension(), Some("tsx"));
    }

    #[test]
    fn join_relative() {
        let n = sensitive();
        let dir = n.file_name("/repo/project").unwrap();
        let joined = n.join(&dir, "src/../lib/index.ts").unwrap();
        assert_eq!(joined.as_str(), "/repo/project/lib/index.ts");
    }
}
