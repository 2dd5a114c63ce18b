// ABOUTME: Surgical text patches for operator-authored unit files.
// ABOUTME: Swaps the image directive and injects a directory-permission bootstrap without reformatting.

use std::fmt::Write as _;

use tracing::debug;

use super::error::UnitError;
use super::tokenizer::{LineKind, find_section, has_section, tokenize};
use super::{CONTAINER_SECTION, INSTALL_SECTION, SERVICE_SECTION, UNIT_SECTION, keys};

/// Numeric owner applied to bootstrapped host directories.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UserInfo {
    pub uid: u32,
    pub gid: u32,
}

/// Point the unit at `image`, touching only the image line.
///
/// Replaces the first `Image=` in `[Container]`, or inserts one right after the
/// header. A unit without a `[Container]` section gets a minimal one appended.
pub fn replace_or_insert_image(text: &str, image: &str) -> Result<String, UnitError> {
    let image = image.trim();
    if image.is_empty() {
        return Err(UnitError::EmptyImage);
    }
    if image.chars().any(|c| c.is_whitespace() || c.is_control()) {
        return Err(UnitError::InvalidImage(image.to_string()));
    }
    let directive = format!("{}={image}", keys::IMAGE);

    let lines = tokenize(text);
    let Some(span) = find_section(&lines, CONTAINER_SECTION) else {
        debug!("no [{CONTAINER_SECTION}] section, appending one");
        let mut out = text.to_string();
        push_block(&mut out, &format!("[{CONTAINER_SECTION}]\n{directive}\n"));
        return Ok(out);
    };

    let existing = lines[span.header + 1..span.body_end]
        .iter()
        .find(|line| matches!(line.kind, LineKind::Directive { key, .. } if key == keys::IMAGE));

    let mut out = String::with_capacity(text.len() + directive.len() + 1);
    match existing {
        Some(line) => {
            out.push_str(&text[..line.start]);
            out.push_str(&directive);
            out.push_str(&text[line.content_end..]);
        }
        None => {
            let header = &lines[span.header];
            out.push_str(&text[..header.end]);
            if header.is_terminated() {
                out.push_str(&directive);
                out.push_str(&text[header.content_end..header.end]);
            } else {
                out.push('\n');
                out.push_str(&directive);
            }
            out.push_str(&text[header.end..]);
        }
    }
    Ok(out)
}

/// Prepend a `[Service]` section that creates `host_paths` and hands them to `owner`.
///
/// Returns the input unchanged when a `[Service]` section already exists or
/// there is nothing to create.
pub fn inject_permission_bootstrap(text: &str, owner: UserInfo, host_paths: &[String]) -> String {
    let lines = tokenize(text);
    if host_paths.is_empty() || has_section(&lines, SERVICE_SECTION) {
        return text.to_string();
    }

    let mut section = format!("[{SERVICE_SECTION}]\n");
    for path in host_paths {
        let path = quote_path(path);
        let _ = writeln!(section, "ExecStartPre=/usr/bin/mkdir -p {path}");
        let _ = writeln!(
            section,
            "ExecStartPre=/usr/bin/chown {}:{} {path}",
            owner.uid, owner.gid
        );
    }

    match find_section(&lines, CONTAINER_SECTION) {
        Some(span) => {
            let at = lines[span.header].start;
            let mut out = String::with_capacity(text.len() + section.len() + 1);
            out.push_str(&text[..at]);
            out.push_str(&section);
            out.push('\n');
            out.push_str(&text[at..]);
            out
        }
        None => {
            let mut out = text.to_string();
            push_block(&mut out, &section);
            out
        }
    }
}

/// Check that the three mandatory sections are present.
pub fn validate(text: &str) -> Result<(), UnitError> {
    let lines = tokenize(text);
    let missing: Vec<&'static str> = [UNIT_SECTION, CONTAINER_SECTION, INSTALL_SECTION]
        .into_iter()
        .filter(|name| !has_section(&lines, name))
        .collect();

    if missing.is_empty() {
        Ok(())
    } else {
        Err(UnitError::MissingSections(missing))
    }
}

/// Append `block` as a new paragraph, keeping existing bytes intact.
fn push_block(out: &mut String, block: &str) {
    if !out.is_empty() {
        if !out.ends_with('\n') {
            out.push('\n');
        }
        out.push('\n');
    }
    out.push_str(block);
}

fn quote_path(path: &str) -> String {
    if path.chars().any(char::is_whitespace) {
        format!("\"{path}\"")
    } else {
        path.to_string()
    }
}
