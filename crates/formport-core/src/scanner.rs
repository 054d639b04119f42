use crate::error::{ConvertError, Result};
use regex::Regex;
use std::fmt;
use std::ops::Range;
use std::path::Path;
use std::sync::OnceLock;

// ---------------------------------------------------------------------------
// Blanking pass
// ---------------------------------------------------------------------------
//
// Structure scanning (brace matching, keyword search) runs over a copy of
// the source in which every string literal, char literal and comment has
// been replaced with spaces, byte for byte. Byte offsets into the blanked
// text are therefore valid offsets into the original, which is what makes
// span-based splicing safe.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Code,
    /// Inside a `{...}` interpolation hole; depth counts nested braces.
    Hole { depth: u32 },
    Line,
    Block,
    Str { interp: bool },
    Verbatim { interp: bool },
    Char,
}

fn blank(c: u8) -> u8 {
    match c {
        b'\n' | b'\r' | b'\t' => c,
        _ => b' ',
    }
}

fn starts(b: &[u8], i: usize, pat: &[u8]) -> bool {
    b.len() >= i + pat.len() && &b[i..i + pat.len()] == pat
}

fn ambiguity(file: &str, reason: &str) -> ConvertError {
    ConvertError::ParseAmbiguity {
        file: file.to_string(),
        reason: reason.to_string(),
    }
}

fn blank_non_code(file: &str, text: &str) -> Result<String> {
    let b = text.as_bytes();
    let mut out: Vec<u8> = Vec::with_capacity(b.len());
    let mut stack: Vec<Mode> = vec![Mode::Code];
    let mut i = 0;

    while i < b.len() {
        let c = b[i];
        let mode = *stack.last().expect("mode stack is never empty");
        match mode {
            Mode::Code | Mode::Hole { .. } => {
                if c == b'/' && b.get(i + 1) == Some(&b'/') {
                    stack.push(Mode::Line);
                    out.extend_from_slice(b"  ");
                    i += 2;
                } else if c == b'/' && b.get(i + 1) == Some(&b'*') {
                    stack.push(Mode::Block);
                    out.extend_from_slice(b"  ");
                    i += 2;
                } else if starts(b, i, b"$@\"") || starts(b, i, b"@$\"") {
                    stack.push(Mode::Verbatim { interp: true });
                    out.extend_from_slice(b"   ");
                    i += 3;
                } else if starts(b, i, b"\"\"\"") {
                    return Err(ambiguity(file, "raw string literals are not supported"));
                } else if starts(b, i, b"$\"") {
                    stack.push(Mode::Str { interp: true });
                    out.extend_from_slice(b"  ");
                    i += 2;
                } else if starts(b, i, b"@\"") {
                    stack.push(Mode::Verbatim { interp: false });
                    out.extend_from_slice(b"  ");
                    i += 2;
                } else if c == b'"' {
                    stack.push(Mode::Str { interp: false });
                    out.push(b' ');
                    i += 1;
                } else if c == b'\'' {
                    stack.push(Mode::Char);
                    out.push(b' ');
                    i += 1;
                } else {
                    if let Mode::Hole { depth } = mode {
                        if c == b'{' {
                            *stack.last_mut().expect("stack checked above") =
                                Mode::Hole { depth: depth + 1 };
                        } else if c == b'}' {
                            if depth == 0 {
                                stack.pop();
                            } else {
                                *stack.last_mut().expect("stack checked above") =
                                    Mode::Hole { depth: depth - 1 };
                            }
                        }
                    }
                    out.push(c);
                    i += 1;
                }
            }
            Mode::Line => {
                if c == b'\n' {
                    stack.pop();
                    out.push(b'\n');
                } else {
                    out.push(blank(c));
                }
                i += 1;
            }
            Mode::Block => {
                if c == b'*' && b.get(i + 1) == Some(&b'/') {
                    stack.pop();
                    out.extend_from_slice(b"  ");
                    i += 2;
                } else {
                    out.push(blank(c));
                    i += 1;
                }
            }
            Mode::Str { interp } => {
                if c == b'\\' && i + 1 < b.len() {
                    out.push(b' ');
                    out.push(blank(b[i + 1]));
                    i += 2;
                } else if c == b'"' {
                    stack.pop();
                    out.push(b' ');
                    i += 1;
                } else if interp && (c == b'{' || c == b'}') && b.get(i + 1) == Some(&c) {
                    out.extend_from_slice(b"  ");
                    i += 2;
                } else if interp && c == b'{' {
                    stack.push(Mode::Hole { depth: 0 });
                    out.push(b' ');
                    i += 1;
                } else if c == b'\n' {
                    // a plain string cannot span lines; resync at the newline
                    stack.pop();
                    out.push(b'\n');
                    i += 1;
                } else {
                    out.push(blank(c));
                    i += 1;
                }
            }
            Mode::Verbatim { interp } => {
                if c == b'"' && b.get(i + 1) == Some(&b'"') {
                    out.extend_from_slice(b"  ");
                    i += 2;
                } else if c == b'"' {
                    stack.pop();
                    out.push(b' ');
                    i += 1;
                } else if interp && (c == b'{' || c == b'}') && b.get(i + 1) == Some(&c) {
                    out.extend_from_slice(b"  ");
                    i += 2;
                } else if interp && c == b'{' {
                    stack.push(Mode::Hole { depth: 0 });
                    out.push(b' ');
                    i += 1;
                } else {
                    out.push(blank(c));
                    i += 1;
                }
            }
            Mode::Char => {
                if c == b'\\' && i + 1 < b.len() {
                    out.push(b' ');
                    out.push(blank(b[i + 1]));
                    i += 2;
                } else if c == b'\'' || c == b'\n' {
                    stack.pop();
                    out.push(if c == b'\n' { b'\n' } else { b' ' });
                    i += 1;
                } else {
                    out.push(blank(c));
                    i += 1;
                }
            }
        }
    }

    match stack.last() {
        Some(Mode::Code) | Some(Mode::Line) => {}
        _ => return Err(ambiguity(file, "unterminated string or comment")),
    }
    Ok(String::from_utf8(out).expect("blanking only substitutes ASCII for whole characters"))
}

// ---------------------------------------------------------------------------
// Members
// ---------------------------------------------------------------------------

/// Only methods and properties take part in merging. Fields, events,
/// operators, indexers and nested types stay exactly where they are in the
/// existing file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MemberKind {
    Method,
    Property,
}

impl MemberKind {
    pub fn as_str(self) -> &'static str {
        match self {
            MemberKind::Method => "method",
            MemberKind::Property => "property",
        }
    }
}

impl fmt::Display for MemberKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identity of a member across the generated and existing versions of a
/// file: kind plus bare name. Overloads therefore collide on purpose; a
/// name that appears twice on either side is reported as a conflict
/// instead of being matched by guesswork.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MemberKey {
    pub kind: MemberKind,
    pub name: String,
}

impl fmt::Display for MemberKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.kind, self.name)
    }
}

/// One mergeable member of the primary type: the exact byte span it
/// occupies in the file (leading attributes included), the attribute
/// lines on their own, and a one-line signature for prompts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedMember {
    pub kind: MemberKind,
    pub name: String,
    pub attributes: Vec<String>,
    pub signature: String,
    pub span: Range<usize>,
    pub text: String,
}

impl ParsedMember {
    pub fn key(&self) -> MemberKey {
        MemberKey {
            kind: self.kind,
            name: self.name.clone(),
        }
    }
}

// ---------------------------------------------------------------------------
// ScannedFile
// ---------------------------------------------------------------------------

/// A C# source file taken apart for merging: its using directives, primary
/// type and that type's mergeable members, all as byte spans into `text`.
#[derive(Debug)]
pub struct ScannedFile {
    pub file: String,
    pub text: String,
    pub(crate) blanked: String,
    /// Using directives as they appear, trimmed, e.g. `using System;`.
    pub usings: Vec<String>,
    /// Byte span covering the whole using block, trailing newline included.
    pub using_span: Option<Range<usize>>,
    pub type_name: Option<String>,
    /// Span between the primary type's braces.
    pub body: Option<Range<usize>>,
    /// False for enums, bodyless records and files without a type; those
    /// cannot be merged member by member.
    pub structured: bool,
    pub members: Vec<ParsedMember>,
}

impl ScannedFile {
    /// Where a using block would be inserted when the file has none: the
    /// start of the first line that holds any code.
    pub fn header_insert_offset(&self) -> usize {
        let mut offset = 0;
        for line in self.blanked.split_inclusive('\n') {
            if !line.trim().is_empty() {
                return offset;
            }
            offset += line.len();
        }
        offset
    }
}

static TYPE_RE: OnceLock<Regex> = OnceLock::new();

fn type_re() -> &'static Regex {
    TYPE_RE.get_or_init(|| {
        Regex::new(
            r"\b(class|interface|record\s+struct|record\s+class|record|struct|enum)\s+([A-Za-z_][A-Za-z0-9_]*)",
        )
        .expect("type pattern compiles")
    })
}

pub fn scan_file(path: &Path) -> Result<ScannedFile> {
    let text = std::fs::read_to_string(path)?;
    scan_text(&path.display().to_string(), &text)
}

pub fn scan_text(file: &str, text: &str) -> Result<ScannedFile> {
    let blanked = blank_non_code(file, text)?;
    let (usings, using_span) = extract_usings(text, &blanked);

    let Some(caps) = type_re().captures(&blanked) else {
        return Ok(ScannedFile {
            file: file.to_string(),
            text: text.to_string(),
            blanked,
            usings,
            using_span,
            type_name: None,
            body: None,
            structured: false,
            members: Vec::new(),
        });
    };
    let keyword = caps.get(1).expect("pattern has a keyword group").as_str();
    let type_name = caps.get(2).expect("pattern has a name group").as_str().to_string();
    let decl_end = caps.get(0).expect("whole match").end();

    let Some(rel) = blanked[decl_end..].find(|c| c == '{' || c == ';') else {
        return Err(ambiguity(file, "type declaration has no body"));
    };
    let opener = decl_end + rel;
    if blanked.as_bytes()[opener] == b';' {
        // bodyless positional record
        return Ok(ScannedFile {
            file: file.to_string(),
            text: text.to_string(),
            blanked,
            usings,
            using_span,
            type_name: Some(type_name),
            body: None,
            structured: false,
            members: Vec::new(),
        });
    }

    let close = match_brace(blanked.as_bytes(), opener)
        .ok_or_else(|| ambiguity(file, "unbalanced braces"))?;
    let body = (opener + 1)..close;

    let (structured, members) = if keyword == "enum" {
        (false, Vec::new())
    } else {
        (true, parse_members(file, text, &blanked, body.clone())?)
    };

    Ok(ScannedFile {
        file: file.to_string(),
        text: text.to_string(),
        blanked,
        usings,
        using_span,
        type_name: Some(type_name),
        body: Some(body),
        structured,
        members,
    })
}

fn extract_usings(text: &str, blanked: &str) -> (Vec<String>, Option<Range<usize>>) {
    let mut usings = Vec::new();
    let mut span: Option<Range<usize>> = None;
    let mut offset = 0;
    for line in blanked.split_inclusive('\n') {
        let t = line.trim();
        if t.starts_with("namespace") || type_re().is_match(line) {
            break;
        }
        if (t.starts_with("using ") || t.starts_with("global using "))
            && t.trim_end().ends_with(';')
        {
            usings.push(text[offset..offset + line.len()].trim().to_string());
            span = Some(match span {
                None => offset..offset + line.len(),
                Some(r) => r.start..offset + line.len(),
            });
        }
        offset += line.len();
    }
    (usings, span)
}

fn match_brace(b: &[u8], open: usize) -> Option<usize> {
    let mut depth = 0u32;
    for (off, &c) in b[open..].iter().enumerate() {
        match c {
            b'{' => depth += 1,
            b'}' => {
                depth = depth.checked_sub(1)?;
                if depth == 0 {
                    return Some(open + off);
                }
            }
            _ => {}
        }
    }
    None
}

// ---------------------------------------------------------------------------
// Member segmentation
// ---------------------------------------------------------------------------

fn parse_members(
    file: &str,
    text: &str,
    blanked: &str,
    body: Range<usize>,
) -> Result<Vec<ParsedMember>> {
    let b = blanked.as_bytes();
    let mut members = Vec::new();
    let mut i = body.start;

    while i < body.end {
        if b[i].is_ascii_whitespace() {
            i += 1;
            continue;
        }
        // Preprocessor lines (#region and friends) are trivia between members
        if b[i] == b'#' {
            while i < body.end && b[i] != b'\n' {
                i += 1;
            }
            continue;
        }
        let start = i;
        let end = member_end(file, b, start, body.end)?;
        let span = start..end;
        if blanked[span.clone()].trim() != ";" {
            if let Some(m) = classify(text, blanked, span) {
                members.push(m);
            }
        }
        i = end;
    }
    Ok(members)
}

/// Find the end of the member declaration starting at `start`: the byte
/// after its closing `;` or `}`.
fn member_end(file: &str, b: &[u8], start: usize, limit: usize) -> Result<usize> {
    let mut depth = 0i32;
    let mut i = start;
    while i < limit {
        match b[i] {
            b'(' | b'[' => depth += 1,
            b')' | b']' => depth -= 1,
            b';' if depth == 0 => return Ok(i + 1),
            b'=' if depth == 0 && b.get(i + 1) == Some(&b'>') => {
                return scan_to_semicolon(file, b, i + 2, limit);
            }
            b'{' if depth == 0 => {
                let close =
                    match_brace(b, i).ok_or_else(|| ambiguity(file, "unbalanced braces"))?;
                // `{ get; set; } = initializer;`
                let mut j = close + 1;
                while j < limit && b[j].is_ascii_whitespace() {
                    j += 1;
                }
                if j < limit
                    && b[j] == b'='
                    && b.get(j + 1) != Some(&b'>')
                    && b.get(j + 1) != Some(&b'=')
                {
                    return scan_to_semicolon(file, b, j + 1, limit);
                }
                return Ok(close + 1);
            }
            _ => {}
        }
        i += 1;
    }
    Err(ambiguity(file, "member declaration runs past the end of the type body"))
}

/// After `=>` or `=`, the member runs to the next semicolon outside any
/// bracketing (lambdas and initializers may hold semicolons of their own).
fn scan_to_semicolon(file: &str, b: &[u8], from: usize, limit: usize) -> Result<usize> {
    let mut depth = 0i32;
    let mut i = from;
    while i < limit {
        match b[i] {
            b'(' | b'[' | b'{' => depth += 1,
            b')' | b']' | b'}' => depth -= 1,
            b';' if depth == 0 => return Ok(i + 1),
            _ => {}
        }
        i += 1;
    }
    Err(ambiguity(file, "unterminated expression-bodied member"))
}

// ---------------------------------------------------------------------------
// Member classification
// ---------------------------------------------------------------------------

const TYPE_KEYWORDS: &[&str] = &["class", "interface", "struct", "record", "enum", "delegate"];

/// Decide whether the segment at `span` is a mergeable member. A paren
/// group before any body marker makes it a method (constructors read as
/// methods named after their type); an accessor block or `=>` body makes
/// it a property. Everything else, fields and events included, is left to
/// the existing file.
fn classify(text: &str, blanked: &str, span: Range<usize>) -> Option<ParsedMember> {
    let decl = &blanked[span.clone()];
    let orig = &text[span.clone()];
    let (attr_spans, cut) = attribute_spans(decl);
    let sig = &decl[cut..];

    let p = sig.find('(').unwrap_or(usize::MAX);
    let br = sig.find('{').unwrap_or(usize::MAX);
    let ar = sig.find("=>").unwrap_or(usize::MAX);
    let se = sig.find(';').unwrap_or(usize::MAX);
    let asg = find_assign(sig).unwrap_or(usize::MAX);

    let tok = p.min(br).min(ar).min(se).min(asg).min(sig.len());
    let header = words(&sig[..tok]);

    if header.contains(&"event") || TYPE_KEYWORDS.iter().any(|k| header.contains(k)) {
        return None;
    }

    let (kind, name, sig_end) = if p == tok {
        if header.contains(&"operator") {
            return None;
        }
        let close = close_paren(sig, p)?;
        (MemberKind::Method, callable_name(&sig[..p]), close + 1)
    } else if br == tok || ar == tok {
        if header.contains(&"this") {
            return None;
        }
        (MemberKind::Property, last_word(&sig[..tok]), tok)
    } else {
        return None;
    };
    if name.is_empty() {
        return None;
    }

    let signature = one_line(&orig[cut..cut + sig_end]);
    let attributes = attr_spans
        .iter()
        .map(|r| orig[r.clone()].to_string())
        .collect();

    Some(ParsedMember {
        kind,
        name,
        attributes,
        signature,
        text: orig.to_string(),
        span,
    })
}

/// Leading `[...]` attribute groups of a declaration: their spans plus the
/// offset where the declaration proper starts. Bracket matching runs over
/// the blanked text; the spans are sliced from the original.
fn attribute_spans(decl: &str) -> (Vec<Range<usize>>, usize) {
    let b = decl.as_bytes();
    let mut spans = Vec::new();
    let mut i = 0;
    loop {
        while i < b.len() && b[i].is_ascii_whitespace() {
            i += 1;
        }
        if i >= b.len() || b[i] != b'[' {
            return (spans, i);
        }
        let mut depth = 0i32;
        let mut j = i;
        while j < b.len() {
            match b[j] {
                b'[' => depth += 1,
                b']' => {
                    depth -= 1;
                    if depth == 0 {
                        break;
                    }
                }
                _ => {}
            }
            j += 1;
        }
        if j >= b.len() {
            return (spans, i);
        }
        spans.push(i..j + 1);
        i = j + 1;
    }
}

fn words(s: &str) -> Vec<&str> {
    s.split(|c: char| !c.is_alphanumeric() && c != '_')
        .filter(|w| !w.is_empty())
        .collect()
}

fn last_word(s: &str) -> String {
    words(s).last().map(|w| w.to_string()).unwrap_or_default()
}

fn one_line(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// The identifier before the parameter list, with any generic parameter
/// list stripped: `public T Find<T>` names `Find`.
fn callable_name(before_paren: &str) -> String {
    let mut s = before_paren.trim_end();
    if s.ends_with('>') {
        let b = s.as_bytes();
        let mut depth = 0i32;
        for i in (0..b.len()).rev() {
            match b[i] {
                b'>' => depth += 1,
                b'<' => {
                    depth -= 1;
                    if depth == 0 {
                        s = s[..i].trim_end();
                        break;
                    }
                }
                _ => {}
            }
        }
    }
    last_word(s)
}

fn close_paren(sig: &str, open: usize) -> Option<usize> {
    let mut depth = 0i32;
    for (off, &c) in sig.as_bytes()[open..].iter().enumerate() {
        match c {
            b'(' => depth += 1,
            b')' => {
                depth -= 1;
                if depth == 0 {
                    return Some(open + off);
                }
            }
            _ => {}
        }
    }
    None
}

/// First `=` that is an assignment rather than part of `==`, `=>` or a
/// compound operator.
fn find_assign(s: &str) -> Option<usize> {
    let b = s.as_bytes();
    for (i, &c) in b.iter().enumerate() {
        if c != b'=' {
            continue;
        }
        if matches!(b.get(i + 1), Some(b'=') | Some(b'>')) {
            continue;
        }
        if i > 0
            && matches!(
                b[i - 1],
                b'=' | b'!' | b'<' | b'>' | b'+' | b'-' | b'*' | b'/' | b'%' | b'&' | b'|' | b'^'
            )
        {
            continue;
        }
        return Some(i);
    }
    None
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
