// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Project path slugs for lock and log file names.

use std::path::Path;

/// Sanitize a project path into a filesystem-friendly slug.
///
/// Lowercase; runs of non-alphanumerics collapse to a single `-`; leading
/// and trailing separators are trimmed. Stable across branches, so a
/// project has exactly one slug. Collisions between distinct paths are
/// accepted: a shared slug only makes lock gating stricter.
pub fn project_slug(project_path: &Path) -> String {
    let lowered = project_path.to_string_lossy().to_lowercase();
    let mut slug = String::with_capacity(lowered.len());
    let mut last_dash = true;
    for c in lowered.chars() {
        if c.is_ascii_alphanumeric() {
            slug.push(c);
            last_dash = false;
        } else if !last_dash {
            slug.push('-');
            last_dash = true;
        }
    }
    while slug.ends_with('-') {
        slug.pop();
    }
    slug
}

#[cfg(test)]
#[path = "slug_tests.rs"]
mod tests;
