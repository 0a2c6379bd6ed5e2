//! Quoted SQL identifiers
//!
//! Identifiers only reach SQL text through `Ident`, which always quotes.

use std::fmt;

/// A quoted identifier, possibly schema-qualified (`public.bugs`)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ident {
    parts: Vec<String>,
}

impl Ident {
    /// A single-part identifier (column name). Dots are kept literally.
    pub fn column(name: impl Into<String>) -> Self {
        Self {
            parts: vec![name.into()],
        }
    }

    /// A table name; dots separate schema and table.
    pub fn table(name: &str) -> Self {
        Self {
            parts: name.split('.').map(str::to_string).collect(),
        }
    }
}

impl fmt::Display for Ident {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, part) in self.parts.iter().enumerate() {
            if i > 0 {
                f.write_str(".")?;
            }
            write!(f, "\"{}\"", part.replace('"', "\"\""))?;
        }
        Ok(())
    }
}
