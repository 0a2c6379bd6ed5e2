//! Declarative rendering through `sqlx::QueryBuilder`
//!
//! Values only ever enter the statement through `push_bind`. The UUID cast
//! rule is the one the raw compiler applies, so both paths bind alike.

use sqlx::{Postgres, QueryBuilder};

use crate::predicate::{CompareOp, Comparison, OrderKey, Predicate, SqlValue};
use crate::sql::{escape_like, needs_uuid_cast, Ident};
use crate::store::FetchQuery;

/// `SELECT COUNT(*) FROM <table> WHERE <predicate>`
pub fn count_statement(table: &str, predicate: &Predicate) -> QueryBuilder<'static, Postgres> {
    let mut builder = QueryBuilder::new("SELECT COUNT(*) FROM ");
    builder.push(Ident::table(table));
    builder.push(" WHERE ");
    push_predicate(&mut builder, predicate);
    builder
}

/// Page fetch returning each row as one JSON object
pub fn fetch_statement(query: &FetchQuery) -> QueryBuilder<'static, Postgres> {
    let mut builder = QueryBuilder::new("SELECT to_jsonb(t) AS row FROM ");
    builder.push(Ident::table(&query.table));
    builder.push(" AS t WHERE ");
    push_predicate(&mut builder, &query.predicate);

    if !query.order.is_empty() {
        builder.push(" ORDER BY ");
        for (i, key) in query.order.iter().enumerate() {
            if i > 0 {
                builder.push(", ");
            }
            push_order_key(&mut builder, key);
        }
    }

    builder.push(" LIMIT ");
    builder.push_bind(i64::try_from(query.take).unwrap_or(i64::MAX));
    builder.push(" OFFSET ");
    builder.push_bind(i64::try_from(query.skip).unwrap_or(i64::MAX));
    builder
}

pub fn push_predicate(builder: &mut QueryBuilder<'_, Postgres>, predicate: &Predicate) {
    match predicate {
        Predicate::And(children) if children.is_empty() => {
            builder.push("TRUE");
        }
        Predicate::Or(children) if children.is_empty() => {
            builder.push("FALSE");
        }
        Predicate::And(children) => push_joined(builder, children, " AND "),
        Predicate::Or(children) => push_joined(builder, children, " OR "),
        Predicate::Not(inner) => {
            builder.push("NOT (");
            push_predicate(builder, inner);
            builder.push(")");
        }
        Predicate::Compare(cmp) => push_comparison(builder, cmp),
    }
}

fn push_joined(builder: &mut QueryBuilder<'_, Postgres>, children: &[Predicate], separator: &str) {
    builder.push("(");
    for (i, child) in children.iter().enumerate() {
        if i > 0 {
            builder.push(separator);
        }
        push_predicate(builder, child);
    }
    builder.push(")");
}

fn push_comparison(builder: &mut QueryBuilder<'_, Postgres>, cmp: &Comparison) {
    let column = Ident::column(cmp.field.as_str());

    if cmp.op == CompareOp::IsNull || cmp.value.is_null() {
        builder.push(column);
        builder.push(" IS NULL");
        return;
    }

    match cmp.op {
        CompareOp::In => match &cmp.value {
            SqlValue::List(items) => push_membership(builder, &column, &cmp.field, items),
            single => push_membership(builder, &column, &cmp.field, std::slice::from_ref(single)),
        },
        CompareOp::Equals | CompareOp::Gt | CompareOp::Gte | CompareOp::Lt | CompareOp::Lte => {
            if let SqlValue::List(items) = &cmp.value {
                push_membership(builder, &column, &cmp.field, items);
                return;
            }
            let symbol = match cmp.op {
                CompareOp::Gt => " > ",
                CompareOp::Gte => " >= ",
                CompareOp::Lt => " < ",
                CompareOp::Lte => " <= ",
                _ => " = ",
            };
            builder.push(column);
            builder.push(symbol);
            push_scalar(builder, &cmp.field, &cmp.value);
        }
        CompareOp::IEquals | CompareOp::Contains | CompareOp::StartsWith | CompareOp::EndsWith => {
            let literal = escape_like(&cmp.value.render_text());
            let pattern = match cmp.op {
                CompareOp::IEquals => literal,
                CompareOp::Contains => format!("%{}%", literal),
                CompareOp::StartsWith => format!("{}%", literal),
                _ => format!("%{}", literal),
            };
            builder.push(column);
            builder.push(" ILIKE ");
            builder.push_bind(pattern);
        }
        CompareOp::Matches => {
            builder.push(column);
            builder.push(" @@ plainto_tsquery('simple', ");
            builder.push_bind(cmp.value.render_text());
            builder.push(")");
        }
        CompareOp::IsNull => {
            builder.push(column);
            builder.push(" IS NULL");
        }
    }
}

fn push_membership(builder: &mut QueryBuilder<'_, Postgres>, column: &Ident, field: &str, items: &[SqlValue]) {
    if items.is_empty() {
        builder.push("FALSE");
        return;
    }
    builder.push(column);
    builder.push(" IN (");
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            builder.push(", ");
        }
        push_scalar(builder, field, item);
    }
    builder.push(")");
}

fn push_scalar(builder: &mut QueryBuilder<'_, Postgres>, field: &str, value: &SqlValue) {
    match value {
        SqlValue::Null => builder.push_bind(None::<String>),
        SqlValue::Bool(b) => builder.push_bind(*b),
        SqlValue::Int(i) => builder.push_bind(*i),
        SqlValue::Float(f) => builder.push_bind(*f),
        SqlValue::Text(s) => builder.push_bind(s.clone()),
        SqlValue::Timestamp(ts) => builder.push_bind(*ts),
        SqlValue::List(_) => builder.push_bind(value.render_text()),
    };
    if needs_uuid_cast(field, value) {
        builder.push("::uuid");
    }
}

fn push_order_key(builder: &mut QueryBuilder<'_, Postgres>, key: &OrderKey) {
    match key {
        OrderKey::Field { field, direction } => {
            builder.push(Ident::column(field.as_str()));
            builder.push(" ");
            builder.push(direction.as_sql());
        }
        OrderKey::SubstringRank { fields, terms } => {
            let blank = [String::new()];
            let terms = if terms.is_empty() { &blank[..] } else { &terms[..] };
            builder.push("(");
            for (t, term) in terms.iter().enumerate() {
                if t > 0 {
                    builder.push(" + ");
                }
                push_term_rank(builder, fields, term);
            }
            builder.push(") ASC");
        }
        OrderKey::TextRank { column, query } => {
            builder.push("ts_rank(");
            builder.push(Ident::column(column.as_str()));
            builder.push(", plainto_tsquery('simple', ");
            builder.push_bind(query.clone());
            builder.push(")) DESC");
        }
    }
}

/// `CASE` ranking one term across the searchable fields
fn push_term_rank(builder: &mut QueryBuilder<'_, Postgres>, fields: &[String], term: &str) {
    let literal = escape_like(term);
    let levels = [
        literal.clone(),
        format!("{}%", literal),
        format!("%{}%", literal),
    ];
    builder.push("CASE");
    for (rank, pattern) in levels.iter().enumerate() {
        builder.push(" WHEN ");
        for (i, field) in fields.iter().enumerate() {
            if i > 0 {
                builder.push(" OR ");
            }
            builder.push(Ident::column(field.as_str()));
            builder.push(" ILIKE ");
            builder.push_bind(pattern.clone());
        }
        builder.push(" THEN ");
        builder.push(rank);
    }
    builder.push(" ELSE 3 END");
}
