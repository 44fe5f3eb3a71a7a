//! The closed placeholder grammar shared by unit templates and phase commands.
//!
//! - `{name}` with `name` matching `[A-Za-z_][A-Za-z0-9_]*` is a placeholder.
//! - Unit syntax: `{{` and `}}` produce a literal `{` / `}`. Commands leave
//!   them as written, along with everything between them.
//! - Any other brace is literal text, so `${HOME}`, `{a,b}` and
//!   `awk '{print $1}'` pass through untouched.
//! - Unit syntax only: `{#name}` ... `{/name}` is a repeatable block. A block tag
//!   alone on its line takes that line (and its newline) with it.
//!
//! There are no expressions, filters or nested blocks.

use crate::error::{Result, SvcError};
use std::collections::{BTreeMap, HashMap};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Syntax {
    /// Placeholders only; block tags are literal text.
    Command,
    /// Placeholders plus `{#name}` / `{/name}` blocks.
    Unit,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Text(String),
    Placeholder(String),
    Block { name: String, body: Vec<Segment> },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Template {
    segments: Vec<Segment>,
}

/// The first placeholder (or block) a scope could not supply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Unresolved(pub String);

/// Values visible to a template while it renders.
pub trait Scope {
    fn lookup(&self, name: &str) -> Option<&str>;

    /// Ordered `(key, value)` entries for a repeatable block.
    fn entries(&self, _block: &str) -> Option<&[(String, String)]> {
        None
    }
}

impl Scope for HashMap<String, String> {
    fn lookup(&self, name: &str) -> Option<&str> {
        self.get(name).map(String::as_str)
    }
}

impl Scope for BTreeMap<String, String> {
    fn lookup(&self, name: &str) -> Option<&str> {
        self.get(name).map(String::as_str)
    }
}

/// Inside a block: `{key}` and `{value}` for the current entry, then the parent.
struct EntryScope<'a> {
    parent: &'a dyn Scope,
    key: &'a str,
    value: &'a str,
}

impl Scope for EntryScope<'_> {
    fn lookup(&self, name: &str) -> Option<&str> {
        match name {
            "key" => Some(self.key),
            "value" => Some(self.value),
            _ => self.parent.lookup(name),
        }
    }
}

pub fn is_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

struct OpenBlock {
    name: String,
    line: usize,
    outer: Vec<Segment>,
}

impl Template {
    pub fn parse(source: &str, syntax: Syntax) -> Result<Self> {
        let bytes = source.as_bytes();
        let len = bytes.len();
        let mut segments: Vec<Segment> = Vec::new();
        let mut open: Option<OpenBlock> = None;
        let mut text = String::new();
        let mut run_start = 0;
        let mut line = 1;
        let mut i = 0;

        while i < len {
            match bytes[i] {
                b'\n' => {
                    line += 1;
                    i += 1;
                }
                // Commands keep `{{` verbatim (Go templates, jinja); nothing
                // inside the pair is read as a placeholder.
                b'{' if syntax == Syntax::Command && bytes.get(i + 1) == Some(&b'{') => i += 2,
                b'{' if bytes.get(i + 1) == Some(&b'{') => {
                    text.push_str(&source[run_start..i]);
                    text.push('{');
                    i += 2;
                    run_start = i;
                }
                b'}' if syntax == Syntax::Unit && bytes.get(i + 1) == Some(&b'}') => {
                    text.push_str(&source[run_start..i]);
                    text.push('}');
                    i += 2;
                    run_start = i;
                }
                b'{' if i > 0 && bytes[i - 1] == b'$' => i += 1,
                b'{' => {
                    let Some(close) = source[i + 1..].find(&['}', '\n', '{'][..]).map(|o| i + 1 + o)
                    else {
                        i += 1;
                        continue;
                    };
                    if bytes[close] != b'}' {
                        i += 1;
                        continue;
                    }
                    let inner = &source[i + 1..close];

                    if is_identifier(inner) {
                        text.push_str(&source[run_start..i]);
                        flush(&mut text, &mut segments);
                        segments.push(Segment::Placeholder(inner.to_string()));
                        i = close + 1;
                        run_start = i;
                        continue;
                    }

                    let tag = match syntax {
                        Syntax::Unit => block_tag(inner),
                        Syntax::Command => None,
                    };
                    let Some((opening, name)) = tag else {
                        i += 1;
                        continue;
                    };

                    // A tag alone on its line swallows the indentation and newline.
                    let line_start = source[..i].rfind('\n').map(|p| p + 1).unwrap_or(0);
                    let indent_only = source[line_start..i].chars().all(|c| c == ' ' || c == '\t');
                    let after = &source[close + 1..];
                    let trailing = if after.starts_with("\r\n") {
                        Some(2)
                    } else if after.starts_with('\n') {
                        Some(1)
                    } else if after.is_empty() {
                        Some(0)
                    } else {
                        None
                    };
                    let tag_line = line;
                    let mut next = close + 1;
                    match (indent_only && run_start <= line_start, trailing) {
                        (true, Some(skip)) => {
                            text.push_str(&source[run_start..line_start]);
                            next += skip;
                            if skip > 0 {
                                line += 1;
                            }
                        }
                        _ => text.push_str(&source[run_start..i]),
                    }
                    flush(&mut text, &mut segments);

                    if opening {
                        if let Some(block) = &open {
                            return Err(SvcError::TemplateSyntax {
                                line: tag_line,
                                message: format!(
                                    "block '{name}' opened inside block '{}' (nesting is not supported)",
                                    block.name
                                ),
                            });
                        }
                        open = Some(OpenBlock {
                            name: name.to_string(),
                            line: tag_line,
                            outer: std::mem::take(&mut segments),
                        });
                    } else {
                        let Some(block) = open.take() else {
                            return Err(SvcError::TemplateSyntax {
                                line: tag_line,
                                message: format!("'{{/{name}}}' closes a block that was never opened"),
                            });
                        };
                        if block.name != name {
                            return Err(SvcError::TemplateSyntax {
                                line: tag_line,
                                message: format!(
                                    "'{{/{name}}}' does not match open block '{}'",
                                    block.name
                                ),
                            });
                        }
                        let body = std::mem::replace(&mut segments, block.outer);
                        segments.push(Segment::Block {
                            name: block.name,
                            body,
                        });
                    }
                    i = next;
                    run_start = i;
                }
                _ => i += 1,
            }
        }

        text.push_str(&source[run_start..]);
        flush(&mut text, &mut segments);

        if let Some(block) = open {
            return Err(SvcError::TemplateSyntax {
                line: block.line,
                message: format!("block '{}' is never closed", block.name),
            });
        }

        Ok(Template { segments })
    }

    /// Placeholder names in template order, including those inside blocks.
    pub fn placeholders(&self) -> Vec<&str> {
        fn walk<'a>(segments: &'a [Segment], out: &mut Vec<&'a str>) {
            for seg in segments {
                match seg {
                    Segment::Text(_) => {}
                    Segment::Placeholder(name) => out.push(name),
                    Segment::Block { body, .. } => walk(body, out),
                }
            }
        }
        let mut out = Vec::new();
        walk(&self.segments, &mut out);
        out
    }

    /// Render strictly: the first placeholder the scope cannot supply is an error.
    pub fn render(&self, scope: &dyn Scope) -> std::result::Result<String, Unresolved> {
        let mut out = String::new();
        render_into(&self.segments, scope, &mut out)?;
        Ok(out)
    }

    /// Render leniently: unknown placeholders are written back as `{name}`.
    pub fn render_lenient(&self, scope: &dyn Scope) -> String {
        let mut out = String::new();
        render_lenient_into(&self.segments, scope, &mut out);
        out
    }
}

fn render_into(
    segments: &[Segment],
    scope: &dyn Scope,
    out: &mut String,
) -> std::result::Result<(), Unresolved> {
    for seg in segments {
        match seg {
            Segment::Text(t) => out.push_str(t),
            Segment::Placeholder(name) => {
                let value = scope
                    .lookup(name)
                    .ok_or_else(|| Unresolved(name.clone()))?;
                out.push_str(value);
            }
            Segment::Block { name, body } => {
                let entries = scope
                    .entries(name)
                    .ok_or_else(|| Unresolved(name.clone()))?;
                for (key, value) in entries {
                    let inner = EntryScope {
                        parent: scope,
                        key,
                        value,
                    };
                    render_into(body, &inner, out)?;
                }
            }
        }
    }
    Ok(())
}

fn render_lenient_into(segments: &[Segment], scope: &dyn Scope, out: &mut String) {
    for seg in segments {
        match seg {
            Segment::Text(t) => out.push_str(t),
            Segment::Placeholder(name) => match scope.lookup(name) {
                Some(v) => out.push_str(v),
                None => {
                    out.push('{');
                    out.push_str(name);
                    out.push('}');
                }
            },
            Segment::Block { name, body } => {
                for (key, value) in scope.entries(name).unwrap_or_default() {
                    let inner = EntryScope {
                        parent: scope,
                        key,
                        value,
                    };
                    render_lenient_into(body, &inner, out);
                }
            }
        }
    }
}

fn flush(text: &mut String, segments: &mut Vec<Segment>) {
    if !text.is_empty() {
        segments.push(Segment::Text(std::mem::take(text)));
    }
}

/// `#name` opens, `/name` closes.
fn block_tag(inner: &str) -> Option<(bool, &str)> {
    if let Some(name) = inner.strip_prefix('#') {
        return is_identifier(name).then_some((true, name));
    }
    if let Some(name) = inner.strip_prefix('/') {
        return is_identifier(name).then_some((false, name));
    }
    None
}
