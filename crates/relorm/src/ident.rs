//! SQL identifier quoting.
//!
//! [`Ident`] represents a table, alias or column name. Dotted names
//! (`post.title`) quote each segment independently; table names are a single
//! segment even when they contain dots. An embedded quote character is
//! escaped by doubling it, so any name renders to a safe identifier.
//!
//! # Example
//! ```ignore
//! use relorm::Ident;
//!
//! assert_eq!(Ident::dotted("post.title").to_sql('`'), "`post`.`title`");
//! assert_eq!(Ident::table("f`oo").to_sql('`'), "`f``oo`");
//! ```

/// A SQL identifier made of one or more segments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ident {
    pub parts: Vec<String>,
}

impl Ident {
    /// A column-style identifier: split on `.`, one segment per part.
    pub fn dotted(name: &str) -> Self {
        Self {
            parts: name.split('.').map(str::to_string).collect(),
        }
    }

    /// A table-style identifier: the whole name is one segment.
    pub fn table(name: &str) -> Self {
        Self {
            parts: vec![name.to_string()],
        }
    }

    /// Render the identifier with the given quote character.
    pub fn to_sql(&self, quote: char) -> String {
        let cap = self.parts.iter().map(|p| p.len() + 3).sum();
        let mut out = String::with_capacity(cap);
        self.write_sql(&mut out, quote);
        out
    }

    pub(crate) fn write_sql(&self, out: &mut String, quote: char) {
        for (i, part) in self.parts.iter().enumerate() {
            if i > 0 {
                out.push('.');
            }
            out.push(quote);
            for ch in part.chars() {
                if ch == quote {
                    out.push(quote);
                }
                out.push(ch);
            }
            out.push(quote);
        }
    }

    /// Parse quoted SQL back into its segments.
    ///
    /// Returns `None` when `sql` is not a sequence of quoted segments joined by `.`.
    pub fn unquote(sql: &str, quote: char) -> Option<Self> {
        let mut parts = Vec::new();
        let mut chars = sql.chars().peekable();

        loop {
            if chars.next()? != quote {
                return None;
            }
            let mut name = String::new();
            loop {
                let ch = chars.next()?;
                if ch == quote {
                    if chars.peek() == Some(&quote) {
                        chars.next();
                        name.push(quote);
                    } else {
                        break;
                    }
                } else {
                    name.push(ch);
                }
            }
            parts.push(name);
            match chars.next() {
                None => break,
                Some('.') => continue,
                Some(_) => return None,
            }
        }

        Some(Self { parts })
    }

    /// Join the segments back with `.`.
    pub fn name(&self) -> String {
        self.parts.join(".")
    }
}

/// Quote a column reference (`alias.column`).
pub fn quote_identifier(name: &str, quote: char) -> String {
    Ident::dotted(name).to_sql(quote)
}

/// Quote a table or alias name.
pub fn quote_table(name: &str, quote: char) -> String {
    Ident::table(name).to_sql(quote)
}
