//! Turning file paths into upload candidates, and the pre-upload plan table.

use anyhow::{bail, Context, Result};
use dataset_push_core::{classify, UploadCandidate, UploadMethod};
use std::collections::HashSet;
use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Dataset formats accepted by default: Excel, CSV, JSON, TXT, PDF, DOCX.
pub const SUPPORTED_EXTENSIONS: [&str; 6] = ["xlsx", "csv", "json", "txt", "pdf", "docx"];

/// Reads every path into memory, in order. Fails on the first unreadable
/// file or unsupported extension so nothing is uploaded from a bad selection.
pub fn load_candidates(paths: &[PathBuf], allowed_extensions: &[String]) -> Result<Vec<UploadCandidate>> {
    let mut seen = HashSet::new();
    let mut candidates = Vec::with_capacity(paths.len());

    for path in paths {
        let name = file_name(path)?;
        check_extension(&name, allowed_extensions)?;
        if !seen.insert(name.clone()) {
            warn!(name = %name, path = %path.display(), "Duplicate file name in selection, later file overwrites earlier one");
        }

        let content = fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;
        info!(name = %name, size_bytes = content.len(), "Loaded candidate");
        candidates.push(UploadCandidate::new(name, content));
    }
    Ok(candidates)
}

fn file_name(path: &Path) -> Result<String> {
    match path.file_name().and_then(|n| n.to_str()) {
        Some(name) if !name.is_empty() => Ok(name.to_string()),
        _ => bail!("{} has no usable file name", path.display()),
    }
}

fn check_extension(name: &str, allowed: &[String]) -> Result<()> {
    let ext = Path::new(name)
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase);
    let accepted = ext
        .as_deref()
        .is_some_and(|ext| allowed.iter().any(|a| a.trim_start_matches('.').eq_ignore_ascii_case(ext)));
    if !accepted {
        bail!(
            "{name}: unsupported file type (allowed: {})",
            allowed.join(", ")
        );
    }
    Ok(())
}

/// One line of the upload plan.
#[derive(Debug, Clone, PartialEq)]
pub struct PlanRow {
    pub name: String,
    pub size_mb: f64,
    pub method: UploadMethod,
}

pub fn plan(candidates: &[UploadCandidate], threshold_bytes: u64) -> Vec<PlanRow> {
    candidates
        .iter()
        .map(|c| PlanRow {
            name: c.name.clone(),
            size_mb: c.size_mb(),
            method: classify(c.size_bytes, threshold_bytes),
        })
        .collect()
}

pub fn format_plan(rows: &[PlanRow]) -> String {
    let width = rows.iter().map(|r| r.name.len()).max().unwrap_or(0).max(4);
    let mut out = String::new();
    let _ = writeln!(out, "Upload plan:");
    for row in rows {
        let _ = writeln!(
            out,
            "  {:<width$}  {:>9.2} MB  {}",
            row.name, row.size_mb, row.method
        );
    }
    let total: f64 = rows.iter().map(|r| r.size_mb).sum();
    let _ = writeln!(out, "Total size: {total:.2} MB | Files: {}", rows.len());
    out
}
