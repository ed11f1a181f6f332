//! Recipe source extraction
//!
//! Scans a directory for recipe tables written as JSON or as a JavaScript
//! `const recipes = { ... };` literal, and loads them into the database.

use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};
use regex::Regex;
use rusqlite::Connection;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::db;
use crate::models::{Recipe, RecipeSpec};

/// Find all files that may hold a recipe table
pub fn find_recipe_files(source_dir: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();

    for entry in WalkDir::new(source_dir)
        .follow_links(true)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|e| e.ok())
    {
        let path = entry.path();
        let is_source = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext == "js" || ext == "json");
        if entry.file_type().is_file() && is_source {
            files.push(path.to_path_buf());
        }
    }

    Ok(files)
}

/// Reduce a JavaScript object literal to plain JSON text.
///
/// Strips `//` and `/* */` comments outside string literals, an optional
/// `const|let|var NAME =` assignment, and trailing commas. Keys must still be
/// double-quoted and strings must use double quotes; anything else fails to
/// parse as JSON and is reported as an error by the caller.
///
/// Returns `Ok(None)` when the content is neither a bare object nor an
/// assignment of one.
pub fn normalize_source(content: &str) -> Result<Option<String>> {
    // String literals are matched first so comment markers inside them survive
    let comment_re = Regex::new(r#""(?:[^"\\]|\\.)*"|//[^\n]*|(?s:/\*.*?\*/)"#)?;
    let stripped = comment_re.replace_all(content, |caps: &regex::Captures<'_>| {
        let token = &caps[0];
        if token.starts_with('"') {
            token.to_string()
        } else {
            String::new()
        }
    });

    // const recipes = { ... };
    let assignment_re = Regex::new(
        r"(?s)^\s*(?:export\s+)?(?:const|let|var)\s+[A-Za-z_$][\w$]*\s*=\s*(\{.*\})\s*;?\s*$",
    )?;
    let object = match assignment_re.captures(&stripped) {
        Some(cap) => cap[1].to_string(),
        None if stripped.trim_start().starts_with('{') => stripped.trim().to_string(),
        None => return Ok(None),
    };

    let trailing_comma_re = Regex::new(r",(\s*[}\]])")?;
    Ok(Some(trailing_comma_re.replace_all(&object, "$1").into_owned()))
}

/// Parse a single recipe source file. `Ok(None)` means the file holds no recipe table.
pub fn parse_recipe_file(path: &Path) -> Result<Option<BTreeMap<String, RecipeSpec>>> {
    let content =
        fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))?;

    let Some(json) = normalize_source(&content)? else {
        return Ok(None);
    };

    let specs = serde_json::from_str(&json)
        .map_err(|e| anyhow!("{}: not a recipe table: {}", path.display(), e))?;
    Ok(Some(specs))
}

/// Extract all recipe tables below `source_dir` and populate the database
pub fn extract_to_database(conn: &mut Connection, source_dir: &Path) -> Result<ExtractStats> {
    let mut stats = ExtractStats::default();

    info!(dir = %source_dir.display(), "scanning for recipe tables");
    let files = find_recipe_files(source_dir)?;
    info!(count = files.len(), "found candidate recipe files");

    let mut accepted: BTreeMap<String, RecipeSpec> = BTreeMap::new();

    for path in &files {
        match parse_recipe_file(path) {
            Ok(Some(specs)) => {
                stats.files += 1;
                for (id, spec) in specs {
                    // Validate now so a bad row never reaches the catalog
                    if let Err(e) = Recipe::from_spec(&id, &spec) {
                        warn!(file = %path.display(), "skipping recipe: {}", e);
                        stats.errors += 1;
                        continue;
                    }
                    stats.inputs += spec.inputs.as_ref().map_or(0, Vec::len);
                    stats.recipes += 1;
                    debug!(item = %id, file = %path.display(), "parsed recipe");
                    accepted.insert(id, spec);
                }
            }
            Ok(None) => {
                stats.skipped += 1;
            }
            Err(e) => {
                warn!("error parsing {}: {:#}", path.display(), e);
                stats.errors += 1;
            }
        }
    }

    db::upsert_recipes(conn, accepted.iter().map(|(id, spec)| (id.as_str(), spec)))?;

    Ok(stats)
}

#[derive(Debug, Default)]
pub struct ExtractStats {
    pub files: usize,
    pub recipes: usize,
    pub inputs: usize,
    pub skipped: usize,
    pub errors: usize,
}

impl fmt::Display for ExtractStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Extracted {} recipes ({} inputs) from {} files. Skipped: {}, Errors: {}",
            self.recipes, self.inputs, self.files, self.skipped, self.errors
        )
    }
}
