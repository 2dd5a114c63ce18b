// ABOUTME: Line tokenizer for section-delimited unit text.
// ABOUTME: Yields section headers and Key=Value directives with byte spans for surgical edits.

/// What a single physical line of unit text holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum LineKind<'a> {
    Blank,
    Comment,
    /// `[Name]`, carrying the name without brackets.
    Section(&'a str),
    /// `Key=Value`, both trimmed.
    Directive { key: &'a str, value: &'a str },
    /// Anything else (continuation lines, garbage). Preserved, never interpreted.
    Other,
}

/// One line of unit text with its location in the source.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Line<'a> {
    pub kind: LineKind<'a>,
    /// Section the line belongs to; `None` before the first header.
    pub section: Option<&'a str>,
    /// Byte offset of the first character.
    pub start: usize,
    /// Byte offset just past the content, before any line terminator.
    pub content_end: usize,
    /// Byte offset just past the line terminator (equals `content_end` on the last unterminated line).
    pub end: usize,
}

impl Line<'_> {
    pub fn is_terminated(&self) -> bool {
        self.end > self.content_end
    }
}

/// Tokenize `text` into lines. Offsets index into `text`.
pub(crate) fn tokenize(text: &str) -> Vec<Line<'_>> {
    let mut lines = Vec::new();
    let mut section = None;
    let mut start = 0;

    while start < text.len() {
        let rest = &text[start..];
        let (content_len, end) = match rest.find('\n') {
            Some(nl) => (nl, start + nl + 1),
            None => (rest.len(), text.len()),
        };
        let mut content = &rest[..content_len];
        if let Some(stripped) = content.strip_suffix('\r') {
            content = stripped;
        }
        let content_end = start + content.len();

        let kind = classify(content);
        if let LineKind::Section(name) = kind {
            section = Some(name);
        }

        lines.push(Line {
            kind,
            section,
            start,
            content_end,
            end,
        });
        start = end;
    }

    lines
}

fn classify(content: &str) -> LineKind<'_> {
    let trimmed = content.trim();
    if trimmed.is_empty() {
        return LineKind::Blank;
    }
    if trimmed.starts_with('#') || trimmed.starts_with(';') {
        return LineKind::Comment;
    }
    if let Some(inner) = trimmed
        .strip_prefix('[')
        .and_then(|s| s.strip_suffix(']'))
    {
        return LineKind::Section(inner.trim());
    }
    match trimmed.split_once('=') {
        Some((key, value)) if !key.trim().is_empty() => LineKind::Directive {
            key: key.trim(),
            value: value.trim(),
        },
        _ => LineKind::Other,
    }
}

/// Location of a section: its header line and the extent of its body.
#[derive(Debug, Clone, Copy)]
pub(crate) struct SectionSpan {
    /// Index of the header line in the token list.
    pub header: usize,
    /// Index one past the last line belonging to the section.
    pub body_end: usize,
}

/// Find the first section named `name`.
pub(crate) fn find_section(lines: &[Line<'_>], name: &str) -> Option<SectionSpan> {
    let header = lines
        .iter()
        .position(|line| line.kind == LineKind::Section(name))?;
    let body_end = lines[header + 1..]
        .iter()
        .position(|line| matches!(line.kind, LineKind::Section(_)))
        .map(|offset| header + 1 + offset)
        .unwrap_or(lines.len());
    Some(SectionSpan { header, body_end })
}

pub(crate) fn has_section(lines: &[Line<'_>], name: &str) -> bool {
    lines
        .iter()
        .any(|line| line.kind == LineKind::Section(name))
}

/// Directives belonging to section `name`, in order, across every occurrence of the header.
pub(crate) fn directives_in<'a>(
    lines: &'a [Line<'a>],
    name: &'a str,
) -> impl Iterator<Item = (&'a str, &'a str)> + 'a {
    lines.iter().filter_map(move |line| match line.kind {
        LineKind::Directive { key, value } if line.section == Some(name) => Some((key, value)),
        _ => None,
    })
}
