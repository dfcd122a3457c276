//! Safe SQL identifiers.
//!
//! [`Ident`] is a validated (optionally dotted) identifier such as `users`,
//! `public.users` or `"Order Items".id`. Column names coming from data maps,
//! select-list keys and `push_ident` all go through it, since identifiers
//! cannot be bound as parameters.
//!
//! - Unquoted parts must match `[A-Za-z_][A-Za-z0-9_$]*`.
//! - Quoted parts accept anything except NUL; `"` is escaped as `""`.

use crate::error::{FluentError, FluentResult};

/// One dot-separated segment of an [`Ident`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IdentPart {
    Unquoted(String),
    Quoted(String),
}

/// A validated SQL identifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ident {
    pub parts: Vec<IdentPart>,
}

fn invalid(input: &str, reason: impl std::fmt::Display) -> FluentError {
    FluentError::InvalidIdentifier(format!("'{input}': {reason}"))
}

impl Ident {
    /// A single always-quoted identifier, e.g. a select-list alias.
    pub fn quoted(name: &str) -> FluentResult<Self> {
        if name.is_empty() {
            return Err(invalid(name, "empty quoted identifier"));
        }
        if name.contains('\0') {
            return Err(invalid(name, "NUL character"));
        }
        Ok(Self {
            parts: vec![IdentPart::Quoted(name.to_string())],
        })
    }

    /// Parse dotted, quoted or mixed identifiers (`public."UserTable".id`).
    pub fn parse(s: &str) -> FluentResult<Self> {
        if s.is_empty() {
            return Err(invalid(s, "empty identifier"));
        }
        if s.contains('\0') {
            return Err(invalid(s, "NUL character"));
        }

        let mut parts = Vec::new();
        let mut rest = s;
        loop {
            let (part, tail) = if let Some(quoted) = rest.strip_prefix('"') {
                parse_quoted(s, quoted)?
            } else {
                parse_unquoted(s, rest)?
            };
            parts.push(part);

            match tail.strip_prefix('.') {
                Some("") => return Err(invalid(s, "trailing '.'")),
                Some(next) => rest = next,
                None if tail.is_empty() => break,
                None => {
                    let c = tail.chars().next().unwrap_or_default();
                    return Err(invalid(s, format!("expected '.' between parts, got '{c}'")));
                }
            }
        }

        Ok(Self { parts })
    }

    /// Render as plain SQL.
    pub fn to_sql(&self) -> String {
        let mut out = String::new();
        self.render(&mut out, false);
        out
    }

    /// Append to `?`-form text; question marks inside quoted parts are escaped.
    pub(crate) fn write_sql(&self, out: &mut String) {
        self.render(out, true);
    }

    fn render(&self, out: &mut String, escape_markers: bool) {
        for (i, part) in self.parts.iter().enumerate() {
            if i > 0 {
                out.push('.');
            }
            match part {
                IdentPart::Unquoted(name) => out.push_str(name),
                IdentPart::Quoted(name) => {
                    out.push('"');
                    for ch in name.chars() {
                        match ch {
                            '"' => out.push_str("\"\""),
                            '?' if escape_markers => out.push_str("\\?"),
                            _ => out.push(ch),
                        }
                    }
                    out.push('"');
                }
            }
        }
    }
}

fn parse_quoted<'a>(input: &str, body: &'a str) -> FluentResult<(IdentPart, &'a str)> {
    let mut name = String::new();
    let mut chars = body.char_indices().peekable();
    while let Some((idx, c)) = chars.next() {
        if c != '"' {
            name.push(c);
            continue;
        }
        if matches!(chars.peek(), Some((_, '"'))) {
            chars.next();
            name.push('"');
            continue;
        }
        if name.is_empty() {
            return Err(invalid(input, "empty quoted identifier"));
        }
        return Ok((IdentPart::Quoted(name), &body[idx + 1..]));
    }
    Err(invalid(input, "unclosed quoted identifier"))
}

fn parse_unquoted<'a>(input: &str, rest: &'a str) -> FluentResult<(IdentPart, &'a str)> {
    let end = rest.find('.').unwrap_or(rest.len());
    let (name, tail) = rest.split_at(end);

    let mut chars = name.chars();
    match chars.next() {
        None => return Err(invalid(input, "empty identifier segment")),
        Some(c) if c == '_' || c.is_ascii_alphabetic() => {}
        Some(c) => return Err(invalid(input, format!("invalid start character '{c}'"))),
    }
    if let Some(c) = chars.find(|c| !(*c == '_' || *c == '$' || c.is_ascii_alphanumeric())) {
        return Err(invalid(input, format!("invalid character '{c}'")));
    }
    Ok((IdentPart::Unquoted(name.to_string()), tail))
}

/// Conversion into an [`Ident`], for builder APIs.
pub trait IntoIdent {
    fn into_ident(self) -> FluentResult<Ident>;
}

impl IntoIdent for Ident {
    fn into_ident(self) -> FluentResult<Ident> {
        Ok(self)
    }
}

impl IntoIdent for &Ident {
    fn into_ident(self) -> FluentResult<Ident> {
        Ok(self.clone())
    }
}

impl IntoIdent for &str {
    fn into_ident(self) -> FluentResult<Ident> {
        Ident::parse(self)
    }
}

impl IntoIdent for String {
    fn into_ident(self) -> FluentResult<Ident> {
        Ident::parse(&self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_simple_and_dotted() {
        assert_eq!(Ident::parse("users").unwrap().to_sql(), "users");
        assert_eq!(Ident::parse("public.users").unwrap().to_sql(), "public.users");
        assert_eq!(Ident::parse("my_var$1").unwrap().to_sql(), "my_var$1");
    }

    #[test]
    fn renders_quoted_parts() {
        let ident = Ident::parse(r#"public."UserTable".id"#).unwrap();
        assert_eq!(ident.to_sql(), r#"public."UserTable".id"#);

        let ident = Ident::parse(r#""has""quote""#).unwrap();
        assert_eq!(ident.to_sql(), r#""has""quote""#);
    }

    #[test]
    fn quoted_alias_escapes_markers_in_template_text() {
        let ident = Ident::quoted("is it?").unwrap();
        assert_eq!(ident.to_sql(), r#""is it?""#);

        let mut out = String::new();
        ident.write_sql(&mut out);
        assert_eq!(out, r#""is it\?""#);
    }

    #[test]
    fn rejects_unsafe_input() {
        for bad in [
            "",
            "1table",
            "my table",
            "schema..table",
            "schema.",
            r#""unclosed"#,
            r#""""#,
            "users; drop table users; --",
        ] {
            let err = Ident::parse(bad).unwrap_err();
            assert!(
                matches!(err, FluentError::InvalidIdentifier(_)),
                "{bad:?} -> {err:?}"
            );
        }
    }
}
