//! Minimal unified-diff inspection.
//!
//! Only what the investigation needs: recognizing a unified diff and listing
//! the repository paths it touches. Applying patches belongs to the PR
//! pipeline.

/// True when `text` carries a file header (`diff --git`, or `---` followed by
/// `+++`) and at least one `@@` hunk header.
pub fn looks_like_unified_diff(text: &str) -> bool {
    let mut has_git_header = false;
    let mut saw_minus = false;
    let mut has_file_header = false;
    let mut has_hunk = false;

    for line in text.lines() {
        if line.starts_with("diff --git ") {
            has_git_header = true;
        } else if line.starts_with("--- ") {
            saw_minus = true;
        } else if line.starts_with("+++ ") && saw_minus {
            has_file_header = true;
        } else if line.starts_with("@@") && line.contains('-') && line.contains('+') {
            has_hunk = true;
        }
    }

    (has_git_header || has_file_header) && has_hunk
}

/// Repository-relative paths named in the diff's file headers, in order of
/// first appearance, without duplicates.
///
/// `a/` and `b/` prefixes are stripped and `/dev/null` is ignored.
pub fn touched_paths(text: &str) -> Vec<String> {
    let mut paths: Vec<String> = Vec::new();
    let mut push = |raw: &str| {
        let path = normalize_header_path(raw);
        if let Some(p) = path {
            if !paths.iter().any(|existing| existing == &p) {
                paths.push(p);
            }
        }
    };

    for line in text.lines() {
        if let Some(rest) = line.strip_prefix("diff --git ") {
            let mut parts = rest.split_whitespace();
            if let Some(a) = parts.next() {
                push(a);
            }
            if let Some(b) = parts.next() {
                push(b);
            }
        } else if let Some(rest) = line.strip_prefix("--- ") {
            push(rest);
        } else if let Some(rest) = line.strip_prefix("+++ ") {
            push(rest);
        }
    }
    paths
}

fn normalize_header_path(raw: &str) -> Option<String> {
    // Drop a trailing timestamp ("--- a/x.py\t2024-01-01 ...").
    let raw = raw.split('\t').next().unwrap_or(raw).trim();
    if raw.is_empty() || raw == "/dev/null" {
        return None;
    }
    let stripped = raw
        .strip_prefix("a/")
        .or_else(|| raw.strip_prefix("b/"))
        .unwrap_or(raw);
    Some(normalize_repo_path(stripped))
}

/// Canonical form used to compare diff paths with fetched paths: forward
/// slashes, no leading `./` or `/`.
pub fn normalize_repo_path(path: &str) -> String {
    let path = path.trim().replace('\\', "/");
    let mut p = path.as_str();
    loop {
        if let Some(rest) = p.strip_prefix("./") {
            p = rest;
        } else if let Some(rest) = p.strip_prefix('/') {
            p = rest;
        } else {
            break;
        }
    }
    p.to_string()
}
