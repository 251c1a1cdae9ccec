//! Build manifest (`tsconfig.json` / `jsconfig.json`) reading.
//!
//! Only what the host needs is extracted: the compiler options, passed to the
//! engine untouched apart from `outDir`, and the list of project source files.
//! `extends` chains are not followed.

use std::path::Path;

use globset::{Glob, GlobBuilder, GlobSet, GlobSetBuilder};
use serde::Deserialize;
use serde_json::{Map, Value};
use tracing::debug;

use crate::error::{Error, Result};
use crate::fs::FileSystem;
use crate::path::{FileName, Normalizer};

/// Opaque compiler options.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CompilerOptions(Map<String, Value>);

impl CompilerOptions {
    pub fn new(options: Map<String, Value>) -> Self {
        Self(options)
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }

    pub fn allow_js(&self) -> bool {
        self.get("allowJs").and_then(Value::as_bool).unwrap_or(false)
    }

    pub fn target(&self) -> Option<&str> {
        self.get("target").and_then(Value::as_str)
    }

    /// Library declaration file implied by `target`.
    pub fn default_lib_file_name(&self) -> String {
        let target = self.target().map(str::to_ascii_lowercase);
        match target.as_deref() {
            None | Some("es3") | Some("es5") => "lib.d.ts".to_string(),
            Some("es6") | Some("es2015") => "lib.es6.d.ts".to_string(),
            Some(t) if t == "esnext" || t.starts_with("es20") => format!("lib.{t}.full.d.ts"),
            Some(_) => "lib.d.ts".to_string(),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct RawManifest {
    compiler_options: Map<String, Value>,
    files: Option<Vec<String>>,
    include: Option<Vec<String>>,
    exclude: Option<Vec<String>>,
}

/// The active build manifest.
#[derive(Debug, Clone)]
pub struct Manifest {
    pub path: FileName,
    /// Directory containing the manifest; relative names resolve against it.
    pub directory: FileName,
    pub compiler_options: CompilerOptions,
    /// Project source files, sorted.
    pub file_names: Vec<FileName>,
}

impl Manifest {
    /// Read and expand the manifest at `path`.
    ///
    /// `excluded_directories` are never walked and act as the default
    /// `exclude` list.
    pub fn load(
        fs: &dyn FileSystem,
        normalizer: &Normalizer,
        path: &FileName,
        excluded_directories: &[String],
    ) -> Result<Self> {
        let manifest_error = |message: String| Error::Manifest {
            path: path.to_string(),
            message,
        };

        let text = fs.read_to_string(path.as_path())?;
        let raw: RawManifest = serde_json::from_str(&strip_jsonc(&text))
            .map_err(|e| manifest_error(e.to_string()))?;
        let directory = path
            .parent()
            .and_then(|dir| normalizer.file_name(dir))
            .ok_or_else(|| manifest_error("manifest has no parent directory".to_string()))?;

        let mut options = raw.compiler_options;
        options.remove("outDir");
        let compiler_options = CompilerOptions::new(options);

        let is_js_manifest = path
            .as_str()
            .rsplit('/')
            .next()
            .is_some_and(|name| name.eq_ignore_ascii_case("jsconfig.json"));
        let allow_js = is_js_manifest || compiler_options.allow_js();

        let mut file_names = Vec::new();
        for file in raw.files.iter().flatten() {
            if let Some(name) = normalizer.join(&directory, file) {
                file_names.push(name);
            }
        }

        let include = raw.include.unwrap_or_else(|| {
            if raw.files.is_some() {
                Vec::new()
            } else {
                vec!["**/*".to_string()]
            }
        });
        let exclude = raw
            .exclude
            .unwrap_or_else(|| excluded_directories.to_vec());

        if !include.is_empty() {
            let include = build_globs(&include, false).map_err(|e| manifest_error(e.to_string()))?;
            let exclude = build_globs(&exclude, true).map_err(|e| manifest_error(e.to_string()))?;
            let root = directory.as_path();
            let skip = |name: &str| excluded_directories.iter().any(|dir| dir == name);
            for file in fs.walk(root, &skip) {
                let Some(relative) = relative_to(root, &file) else {
                    continue;
                };
                if !is_source_file(&relative, allow_js)
                    || !include.is_match(&relative)
                    || exclude.is_match(&relative)
                {
                    continue;
                }
                if let Some(name) = normalizer.file_name(&file) {
                    file_names.push(name);
                }
            }
        }

        file_names.sort();
        file_names.dedup();
        debug!(manifest = %path, files = file_names.len(), allow_js, "loaded build manifest");

        Ok(Self {
            path: path.clone(),
            directory,
            compiler_options,
            file_names,
        })
    }
}

/// Whether `name` is a source file the engine compiles.
pub fn is_source_file(name: &str, allow_js: bool) -> bool {
    let lower = name.to_ascii_lowercase();
    lower.ends_with(".ts")
        || lower.ends_with(".tsx")
        || (allow_js && (lower.ends_with(".js") || lower.ends_with(".jsx")))
}

fn relative_to(root: &Path, file: &Path) -> Option<String> {
    let relative = file.strip_prefix(root).ok()?;
    Some(relative.to_string_lossy().replace('\\', "/"))
}

/// Compile manifest patterns. A pattern naming a directory (no wildcard and
/// no extension) matches everything below it.
fn build_globs(patterns: &[String], exclude: bool) -> std::result::Result<GlobSet, globset::Error> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        let pattern = pattern.trim_start_matches("./").trim_end_matches('/');
        let is_wildcard = pattern.contains(['*', '?', '[']);
        let last = pattern.rsplit('/').next().unwrap_or(pattern);
        if !is_wildcard && !last.contains('.') {
            builder.add(glob(&format!("{pattern}/**/*"))?);
        } else if exclude && !is_wildcard {
            builder.add(glob(pattern)?);
            builder.add(glob(&format!("{pattern}/**/*"))?);
        } else {
            builder.add(glob(pattern)?);
        }
    }
    builder.build()
}

fn glob(pattern: &str) -> std::result::Result<Glob, globset::Error> {
    GlobBuilder::new(pattern).literal_separator(true).build()
}

/// Turn JSON-with-comments into plain JSON: comments become blanks and
/// trailing commas before `}` or `]` are dropped.
pub fn strip_jsonc(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();
    let mut in_string = false;

    while let Some(c) = chars.next() {
        if in_string {
            out.push(c);
            match c {
                '\\' => {
                    if let Some(escaped) = chars.next() {
                        out.push(escaped);
                    }
                }
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match c {
            '"' => {
                in_string = true;
                out.push(c);
            }
            '/' if chars.peek() == Some(&'/') => {
                while chars.peek().is_some_and(|&n| n != '\n') {
                    chars.next();
                }
            }
            '/' if chars.peek() == Some(&'*') => {
                chars.next();
                let mut prev = '\0';
                for n in chars.by_ref() {
                    if prev == '*' && n == '/' {
                        break;
                    }
                    if n == '\n' {
                        out.push('\n');
                    }
                    prev = n;
                }
                out.push(' ');
            }
            _ => out.push(c),
        }
    }

    remove_trailing_commas(&out)
}

fn remove_trailing_commas(input: &str) -> String {
    let chars: Vec<char> = input.chars().collect();
    let mut out = String::with_capacity(input.len());
    let mut in_string = false;
    let mut i = 0;
    while i < chars.len() {
        let c = chars[i];
        if in_string {
            out.push(c);
            if c == '\\' {
                if let Some(&escaped) = chars.get(i + 1) {
                    out.push(escaped);
                    i += 1;
                }
            } else if c == '"' {
                in_string = false;
            }
        } else if c == '"' {
            in_string = true;
            out.push(c);
        } else if c == ',' {
            let next = chars[i + 1..].iter().find(|n| !n.is_whitespace());
            if !matches!(next, Some('}') | Some(']')) {
                out.push(c);
            }
        } else {
            out.push(c);
        }
        i += 1;
    }
    out
}
