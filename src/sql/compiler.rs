//! # Raw Predicate Compiler
//!
//! Compiles a `Predicate` into a parameterized PostgreSQL fragment.
//!
//! - Identifiers are always quoted through `Ident`
//! - Values are always bound as positional `$n` parameters
//! - NULL arguments compile to `IS NULL`, never `= NULL`
//! - Identifier-like fields compared with UUID-shaped text are cast `::uuid`
//!
//! The output selects exactly the rows the declarative executors select for
//! the same tree.

use std::sync::OnceLock;

use regex::Regex;
use serde::Serialize;

use super::ident::Ident;
use super::param::SqlParam;
use crate::predicate::{CompareOp, Comparison, Predicate, SqlValue};

/// Field names treated as identifiers in addition to `id`, `*Id` and `*_id`
pub const IDENTIFIER_FIELDS: &[&str] = &["owner", "creator", "assignee", "parent", "tenant", "project"];

/// A compiled statement or fragment
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RawQuery {
    /// SQL text with `$n` placeholders
    pub sql: String,
    /// Bound parameters, in placeholder order
    pub params: Vec<SqlParam>,
}

impl RawQuery {
    /// Number of parameters bound so far
    pub fn param_count(&self) -> usize {
        self.params.len()
    }
}

/// Stateless compiler from predicate trees to raw SQL
pub struct RawPredicateCompiler;

impl RawPredicateCompiler {
    /// Compile a predicate.
    ///
    /// `param_offset` is the number of parameters bound before this fragment,
    /// so the first placeholder emitted is `$param_offset + 1`. Fragments can
    /// then be concatenated by threading the offset through.
    pub fn compile(predicate: &Predicate, param_offset: usize) -> RawQuery {
        let mut emitter = Emitter {
            sql: String::with_capacity(128),
            params: Vec::new(),
            offset: param_offset,
        };
        emitter.predicate(predicate);
        RawQuery {
            sql: emitter.sql,
            params: emitter.params,
        }
    }

    /// `SELECT COUNT(*)` over the rows matching `predicate`
    pub fn count_query(table: &str, predicate: &Predicate) -> RawQuery {
        let fragment = Self::compile(predicate, 0);
        RawQuery {
            sql: format!(
                "SELECT COUNT(*) FROM {} WHERE {}",
                Ident::table(table),
                fragment.sql
            ),
            params: fragment.params,
        }
    }

    /// Count at most `sample_size` rows matching `predicate`
    pub fn sample_count_query(table: &str, predicate: &Predicate, sample_size: u64) -> RawQuery {
        let fragment = Self::compile(predicate, 0);
        let mut params = fragment.params;
        params.push(SqlParam::Int(sample_size.min(i64::MAX as u64) as i64));
        RawQuery {
            sql: format!(
                "SELECT COUNT(*) FROM (SELECT 1 FROM {} WHERE {} LIMIT ${}) AS sample",
                Ident::table(table),
                fragment.sql,
                params.len()
            ),
            params,
        }
    }
}

struct Emitter {
    sql: String,
    params: Vec<SqlParam>,
    offset: usize,
}

impl Emitter {
    fn bind(&mut self, param: SqlParam) -> String {
        self.params.push(param);
        format!("${}", self.offset + self.params.len())
    }

    fn predicate(&mut self, predicate: &Predicate) {
        match predicate {
            Predicate::And(children) if children.is_empty() => self.sql.push_str("TRUE"),
            Predicate::Or(children) if children.is_empty() => self.sql.push_str("FALSE"),
            Predicate::And(children) => self.join(children, " AND "),
            Predicate::Or(children) => self.join(children, " OR "),
            Predicate::Not(inner) => {
                self.sql.push_str("NOT (");
                self.predicate(inner);
                self.sql.push(')');
            }
            Predicate::Compare(cmp) => self.comparison(cmp),
        }
    }

    fn join(&mut self, children: &[Predicate], separator: &str) {
        self.sql.push('(');
        for (i, child) in children.iter().enumerate() {
            if i > 0 {
                self.sql.push_str(separator);
            }
            self.predicate(child);
        }
        self.sql.push(')');
    }

    fn comparison(&mut self, cmp: &Comparison) {
        let column = Ident::column(cmp.field.as_str());

        if cmp.op == CompareOp::IsNull || cmp.value.is_null() {
            self.sql.push_str(&format!("{} IS NULL", column));
            return;
        }

        let rendered = match cmp.op {
            CompareOp::Equals | CompareOp::Gt | CompareOp::Gte | CompareOp::Lt | CompareOp::Lte => {
                if let SqlValue::List(items) = &cmp.value {
                    // A list argument only makes sense as membership
                    self.membership(&column, &cmp.field, items)
                } else {
                    let placeholder = self.scalar(&cmp.field, &cmp.value);
                    format!("{} {} {}", column, comparison_symbol(cmp.op), placeholder)
                }
            }
            CompareOp::In => match &cmp.value {
                SqlValue::List(items) => self.membership(&column, &cmp.field, items),
                single => self.membership(&column, &cmp.field, std::slice::from_ref(single)),
            },
            CompareOp::IEquals | CompareOp::Contains | CompareOp::StartsWith | CompareOp::EndsWith => {
                let literal = escape_like(&cmp.value.render_text());
                let pattern = match cmp.op {
                    CompareOp::IEquals => literal,
                    CompareOp::Contains => format!("%{}%", literal),
                    CompareOp::StartsWith => format!("{}%", literal),
                    _ => format!("%{}", literal),
                };
                let placeholder = self.bind(SqlParam::Text(pattern));
                format!("{} ILIKE {}", column, placeholder)
            }
            CompareOp::Matches => {
                let placeholder = self.bind(SqlParam::Text(cmp.value.render_text()));
                format!("{} @@ plainto_tsquery('simple', {})", column, placeholder)
            }
            CompareOp::IsNull => format!("{} IS NULL", column),
        };
        self.sql.push_str(&rendered);
    }

    fn membership(&mut self, column: &Ident, field: &str, items: &[SqlValue]) -> String {
        if items.is_empty() {
            return "FALSE".to_string();
        }
        let placeholders: Vec<String> = items.iter().map(|v| self.scalar(field, v)).collect();
        format!("{} IN ({})", column, placeholders.join(", "))
    }

    fn scalar(&mut self, field: &str, value: &SqlValue) -> String {
        let placeholder = self.bind(SqlParam::from_value(value));
        if needs_uuid_cast(field, value) {
            format!("{}::uuid", placeholder)
        } else {
            placeholder
        }
    }
}

fn comparison_symbol(op: CompareOp) -> &'static str {
    match op {
        CompareOp::Gt => ">",
        CompareOp::Gte => ">=",
        CompareOp::Lt => "<",
        CompareOp::Lte => "<=",
        _ => "=",
    }
}

/// Escape LIKE metacharacters so the value matches literally
pub fn escape_like(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        if matches!(c, '\\' | '%' | '_') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

/// Whether a field name denotes an identifier column
pub fn is_identifier_field(field: &str) -> bool {
    field == "id"
        || field.ends_with("Id")
        || field.ends_with("_id")
        || IDENTIFIER_FIELDS.contains(&field)
}

/// Whether a string has the canonical hyphenated UUID shape
pub fn is_uuid_literal(value: &str) -> bool {
    static UUID_SHAPE: OnceLock<Regex> = OnceLock::new();
    UUID_SHAPE
        .get_or_init(|| {
            Regex::new(r"^[0-9a-fA-F]{8}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{12}$")
                .expect("static regex")
        })
        .is_match(value)
}

/// Whether a bound value needs an explicit `::uuid` cast
pub fn needs_uuid_cast(field: &str, value: &SqlValue) -> bool {
    is_identifier_field(field) && value.as_text().is_some_and(is_uuid_literal)
}
