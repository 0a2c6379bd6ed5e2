//! # Raw SQL
//!
//! Parameterized PostgreSQL generation. SQL text is only ever assembled from
//! quoted identifiers, fixed keywords and `$n` placeholders.

mod compiler;
mod ident;
mod param;

pub use compiler::{
    escape_like, is_identifier_field, is_uuid_literal, needs_uuid_cast, RawPredicateCompiler,
    RawQuery, IDENTIFIER_FIELDS,
};
pub use ident::Ident;
pub use param::SqlParam;
