use std::fs;
use std::path::PathBuf;
use globset::{GlobBuilder, GlobMatcher};
use log::{debug, error};
use crate::errors::MichiError::PatternError;
use crate::errors::MichiResult;

/// Split a pattern at its first `*` into the base path and the sub pattern,
/// which keeps the `*`.
pub(crate) fn split_pattern(pattern: &str) -> MichiResult<(&str, &str)> {
    match pattern.find('*') {
        Some(index) => Ok(pattern.split_at(index)),
        None => {
            error!("Glob pattern has no wildcard: {}", pattern);
            Err(PatternError(format!("'{}' contains no '*'", pattern)))
        }
    }
}

pub(crate) fn has_magic(pattern: &str) -> bool {
    pattern.contains(['*', '?', '['])
}

/// Make every character of `literal` match itself.
pub(crate) fn escape_literal(literal: &str) -> String {
    let mut escaped = String::with_capacity(literal.len());
    for c in literal.chars() {
        match c {
            '*' | '?' | '[' | ']' | '{' | '}' => {
                escaped.push('[');
                escaped.push(c);
                escaped.push(']');
            }
            _ => escaped.push(c),
        }
    }
    escaped
}

/// Shell style patterns have no `{a,b}` alternation, braces are plain characters.
pub(crate) fn shell_pattern(pattern: &str) -> String {
    pattern.replace('{', "[{]").replace('}', "[}]")
}

/// `*`, `?` and `[...]` never cross a `/`.
pub(crate) fn compile(pattern: &str) -> MichiResult<GlobMatcher> {
    GlobBuilder::new(pattern)
        .literal_separator(true)
        .backslash_escape(false)
        .build()
        .map(|glob| glob.compile_matcher())
        .map_err(|e| {
            error!("Failed to compile the glob pattern {}: {}", pattern, e);
            PatternError(format!("{}: {}", pattern, e))
        })
}

fn join(prefix: &str, name: &str) -> String {
    if prefix.is_empty() {
        name.to_string()
    } else if prefix.ends_with('/') {
        format!("{}{}", prefix, name)
    } else {
        format!("{}/{}", prefix, name)
    }
}

fn matching_children(dir: &str, component: &str) -> MichiResult<Vec<String>> {
    let matcher = compile(&shell_pattern(component))?;
    let include_hidden = component.starts_with('.');

    let read_dir = match fs::read_dir(if dir.is_empty() { "." } else { dir }) {
        Ok(read_dir) => read_dir,
        Err(e) => {
            debug!("Skip unreadable directory {:?} while globbing: {}", dir, e);
            return Ok(Vec::new());
        }
    };

    let mut names = read_dir
        .filter_map(|entry| entry.ok())
        .filter_map(|entry| entry.file_name().to_str().map(str::to_string))
        .filter(|name| include_hidden || !name.starts_with('.'))
        .filter(|name| matcher.is_match(name))
        .map(|name| join(dir, &name))
        .collect::<Vec<_>>();
    names.sort();
    Ok(names)
}

/// Glob over the local file system, one path component at a time.
/// Hidden entries only match components that start with a dot, a trailing `/` only
/// matches directories.
pub(crate) fn local_glob(pattern: &str) -> MichiResult<Vec<PathBuf>> {
    let dirs_only = pattern.ends_with('/');
    let trimmed = pattern.trim_end_matches('/');

    let (root, rest) = match trimmed.strip_prefix('/') {
        Some(rest) => ("/", rest),
        None => ("", trimmed),
    };

    let mut candidates = vec![root.to_string()];
    for component in rest.split('/').filter(|component| !component.is_empty()) {
        let mut next = Vec::new();
        for candidate in &candidates {
            if has_magic(component) {
                next.extend(matching_children(candidate, component)?);
            } else {
                next.push(join(candidate, component));
            }
        }
        candidates = next;
        if candidates.is_empty() {
            break;
        }
    }

    let matches = candidates
        .into_iter()
        .filter(|candidate| !candidate.is_empty())
        .filter(|candidate| match fs::symlink_metadata(candidate) {
            Ok(metadata) => !dirs_only || metadata.is_dir() || fs::metadata(candidate).map(|m| m.is_dir()).unwrap_or(false),
            Err(_) => false,
        })
        .map(|candidate| if dirs_only { PathBuf::from(format!("{}/", candidate)) } else { PathBuf::from(candidate) })
        .collect::<Vec<_>>();

    debug!("Local glob {} matched {} paths", pattern, matches.len());
    Ok(matches)
}
