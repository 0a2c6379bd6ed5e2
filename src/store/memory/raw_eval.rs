//! Interpreter for compiled count statements
//!
//! Understands exactly the SQL the raw predicate compiler emits:
//!
//! ```text
//! SELECT COUNT(*) FROM <table> WHERE <expr>
//! SELECT COUNT(*) FROM (SELECT 1 FROM <table> WHERE <expr> LIMIT $n) AS sample
//!
//! expr := TRUE | FALSE
//!       | ( expr { AND expr } ) | ( expr { OR expr } )
//!       | NOT ( expr )
//!       | col IS NULL
//!       | col (= | > | >= | < | <=) arg
//!       | col IN ( arg { , arg } )
//!       | col ILIKE arg
//!       | col @@ plainto_tsquery('simple', arg)
//! arg  := $n [::uuid]
//! ```
//!
//! Evaluation follows SQL three-valued logic over JSON rows. It shares no
//! code with the declarative evaluator apart from value comparison.

use std::cmp::Ordering;

use serde_json::Value;

use crate::predicate::{tokenize, SqlValue};
use crate::sql::SqlParam;
use crate::store::{StoreError, StoreResult};

/// A parsed count statement
#[derive(Debug, Clone, PartialEq)]
pub struct CountStatement {
    pub table: String,
    pub filter: Expr,
    /// Placeholder index of the sample limit, for sampled counts
    pub limit: Option<usize>,
}

impl CountStatement {
    pub fn is_sample(&self) -> bool {
        self.limit.is_some()
    }

    /// Count the matching rows, honouring the sample limit
    pub fn count(&self, rows: &[Value], params: &[SqlParam]) -> StoreResult<u64> {
        let limit = match self.limit {
            Some(idx) => match param(params, idx)? {
                SqlParam::Int(n) if *n >= 0 => Some(*n as u64),
                other => {
                    return Err(StoreError::Query(format!("invalid LIMIT argument: {:?}", other)))
                }
            },
            None => None,
        };

        let mut matched = 0u64;
        for row in rows {
            if limit.is_some_and(|l| matched >= l) {
                break;
            }
            if self.filter.eval(row, params)? == Some(true) {
                matched += 1;
            }
        }
        Ok(matched)
    }
}

/// Argument placeholder
#[derive(Debug, Clone, PartialEq)]
pub struct Arg {
    pub index: usize,
    pub uuid_cast: bool,
}

/// Comparison symbol
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cmp {
    Eq,
    Gt,
    Gte,
    Lt,
    Lte,
}

/// Parsed boolean expression
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Literal(bool),
    And(Vec<Expr>),
    Or(Vec<Expr>),
    Not(Box<Expr>),
    IsNull(String),
    Compare(String, Cmp, Arg),
    In(String, Vec<Arg>),
    ILike(String, Arg),
    TextMatch(String, Arg),
}

impl Expr {
    /// Three-valued evaluation against one row
    pub fn eval(&self, row: &Value, params: &[SqlParam]) -> StoreResult<Option<bool>> {
        Ok(match self {
            Expr::Literal(b) => Some(*b),
            Expr::And(children) => {
                let mut result = Some(true);
                for child in children {
                    match child.eval(row, params)? {
                        Some(false) => return Ok(Some(false)),
                        None => result = None,
                        Some(true) => {}
                    }
                }
                result
            }
            Expr::Or(children) => {
                let mut result = Some(false);
                for child in children {
                    match child.eval(row, params)? {
                        Some(true) => return Ok(Some(true)),
                        None => result = None,
                        Some(false) => {}
                    }
                }
                result
            }
            Expr::Not(inner) => inner.eval(row, params)?.map(|b| !b),
            Expr::IsNull(col) => Some(column(row, col).is_null()),
            Expr::Compare(col, cmp, arg) => {
                let value = bound(params, arg)?;
                value.compare_json(column(row, col)).map(|ord| match cmp {
                    Cmp::Eq => ord == Ordering::Equal,
                    Cmp::Gt => ord == Ordering::Greater,
                    Cmp::Gte => ord != Ordering::Less,
                    Cmp::Lt => ord == Ordering::Less,
                    Cmp::Lte => ord != Ordering::Greater,
                })
            }
            Expr::In(col, args) => {
                let stored = column(row, col);
                let mut result = Some(false);
                for arg in args {
                    match bound(params, arg)?.compare_json(stored) {
                        Some(Ordering::Equal) => return Ok(Some(true)),
                        None => result = None,
                        Some(_) => {}
                    }
                }
                result
            }
            Expr::ILike(col, arg) => {
                let pattern = match param(params, arg.index)? {
                    SqlParam::Text(p) => p.to_lowercase(),
                    other => return Err(StoreError::Query(format!("ILIKE needs text, got {:?}", other))),
                };
                stored_text(column(row, col)).map(|text| like_match(&text.to_lowercase(), &pattern))
            }
            Expr::TextMatch(col, arg) => {
                let query = match param(params, arg.index)? {
                    SqlParam::Text(q) => tokenize(q),
                    other => return Err(StoreError::Query(format!("tsquery needs text, got {:?}", other))),
                };
                stored_text(column(row, col)).map(|doc| {
                    let doc = tokenize(&doc);
                    !query.is_empty() && query.iter().all(|t| doc.contains(t))
                })
            }
        })
    }
}

fn column<'a>(row: &'a Value, name: &str) -> &'a Value {
    row.get(name).unwrap_or(&Value::Null)
}

/// Pattern operators only apply to text columns
fn stored_text(value: &Value) -> Option<String> {
    value.as_str().map(str::to_string)
}

fn param(params: &[SqlParam], index: usize) -> StoreResult<&SqlParam> {
    index
        .checked_sub(1)
        .and_then(|i| params.get(i))
        .ok_or_else(|| StoreError::Query(format!("there is no parameter ${}", index)))
}

fn bound(params: &[SqlParam], arg: &Arg) -> StoreResult<SqlValue> {
    let value = match param(params, arg.index)? {
        SqlParam::Null => SqlValue::Null,
        SqlParam::Bool(b) => SqlValue::Bool(*b),
        SqlParam::Int(i) => SqlValue::Int(*i),
        SqlParam::Float(f) => SqlValue::Float(*f),
        SqlParam::Text(s) => SqlValue::Text(s.clone()),
        SqlParam::Timestamp(ts) => SqlValue::Timestamp(*ts),
    };
    if arg.uuid_cast {
        let text = value.as_text().unwrap_or_default();
        if uuid::Uuid::parse_str(text).is_err() {
            return Err(StoreError::Query(format!(
                "invalid input syntax for type uuid: \"{}\"",
                text
            )));
        }
    }
    Ok(value)
}

/// SQL LIKE matching with `\` escapes. Both sides are already lowercased.
pub fn like_match(value: &str, pattern: &str) -> bool {
    let value: Vec<char> = value.chars().collect();
    let pattern = like_tokens(pattern);
    like_from(&value, &pattern)
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum LikeToken {
    AnySeq,
    AnyOne,
    Char(char),
}

fn like_tokens(pattern: &str) -> Vec<LikeToken> {
    let mut tokens = Vec::new();
    let mut chars = pattern.chars();
    while let Some(c) = chars.next() {
        tokens.push(match c {
            '\\' => LikeToken::Char(chars.next().unwrap_or('\\')),
            '%' => LikeToken::AnySeq,
            '_' => LikeToken::AnyOne,
            other => LikeToken::Char(other),
        });
    }
    tokens
}

fn like_from(value: &[char], pattern: &[LikeToken]) -> bool {
    match pattern.split_first() {
        None => value.is_empty(),
        Some((LikeToken::AnySeq, rest)) => {
            if rest.is_empty() {
                return true; // Trailing % matches everything
            }
            (0..=value.len()).any(|i| like_from(&value[i..], rest))
        }
        Some((LikeToken::AnyOne, rest)) => !value.is_empty() && like_from(&value[1..], rest),
        Some((LikeToken::Char(p), rest)) => value.first() == Some(p) && like_from(&value[1..], rest),
    }
}

// =============================================================================
// Parsing
// =============================================================================

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Ident(String),
    Word(String),
    Param(usize),
    Str(String),
    Sym(&'static str),
}

/// Parse a compiled count statement
pub fn parse_count(sql: &str) -> StoreResult<CountStatement> {
    let tokens = lex(sql)?;
    let mut parser = Parser { tokens, pos: 0 };
    let statement = parser.statement()?;
    if parser.pos != parser.tokens.len() {
        return Err(parser.error("trailing input"));
    }
    Ok(statement)
}

fn lex(sql: &str) -> StoreResult<Vec<Token>> {
    let chars: Vec<char> = sql.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        match c {
            c if c.is_whitespace() => i += 1,
            '"' => {
                let mut ident = String::new();
                i += 1;
                loop {
                    match chars.get(i) {
                        Some('"') if chars.get(i + 1) == Some(&'"') => {
                            ident.push('"');
                            i += 2;
                        }
                        Some('"') => {
                            i += 1;
                            break;
                        }
                        Some(ch) => {
                            ident.push(*ch);
                            i += 1;
                        }
                        None => return Err(StoreError::Unsupported("unterminated identifier".into())),
                    }
                }
                tokens.push(Token::Ident(ident));
            }
            '\'' => {
                let end = chars[i + 1..]
                    .iter()
                    .position(|ch| *ch == '\'')
                    .ok_or_else(|| StoreError::Unsupported("unterminated string".into()))?;
                tokens.push(Token::Str(chars[i + 1..i + 1 + end].iter().collect()));
                i += end + 2;
            }
            '$' => {
                let digits: String = chars[i + 1..].iter().take_while(|ch| ch.is_ascii_digit()).collect();
                let index = digits
                    .parse()
                    .map_err(|_| StoreError::Unsupported("bad placeholder".into()))?;
                i += 1 + digits.len();
                tokens.push(Token::Param(index));
            }
            c if c.is_ascii_alphabetic() || c == '_' || c.is_ascii_digit() => {
                let word: String = chars[i..]
                    .iter()
                    .take_while(|ch| ch.is_ascii_alphanumeric() || **ch == '_')
                    .collect();
                i += word.len();
                tokens.push(Token::Word(word.to_ascii_uppercase()));
            }
            _ => {
                let two: String = chars[i..chars.len().min(i + 2)].iter().collect();
                let sym = match two.as_str() {
                    ">=" => Some(">="),
                    "<=" => Some("<="),
                    "::" => Some("::"),
                    "@@" => Some("@@"),
                    _ => None,
                };
                if let Some(sym) = sym {
                    tokens.push(Token::Sym(sym));
                    i += 2;
                    continue;
                }
                let sym = match c {
                    '(' => "(",
                    ')' => ")",
                    ',' => ",",
                    '.' => ".",
                    '*' => "*",
                    '=' => "=",
                    '>' => ">",
                    '<' => "<",
                    other => {
                        return Err(StoreError::Unsupported(format!("unexpected character '{}'", other)))
                    }
                };
                tokens.push(Token::Sym(sym));
                i += 1;
            }
        }
    }
    Ok(tokens)
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn error(&self, what: &str) -> StoreError {
        StoreError::Unsupported(format!("{} at token {}", what, self.pos))
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn next(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        self.pos += 1;
        token
    }

    fn eat_word(&mut self, word: &str) -> bool {
        if matches!(self.peek(), Some(Token::Word(w)) if w == word) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn eat_sym(&mut self, sym: &str) -> bool {
        if matches!(self.peek(), Some(Token::Sym(s)) if *s == sym) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn word(&mut self, word: &str) -> StoreResult<()> {
        if self.eat_word(word) {
            Ok(())
        } else {
            Err(self.error(&format!("expected {}", word)))
        }
    }

    fn sym(&mut self, sym: &str) -> StoreResult<()> {
        if self.eat_sym(sym) {
            Ok(())
        } else {
            Err(self.error(&format!("expected '{}'", sym)))
        }
    }

    fn statement(&mut self) -> StoreResult<CountStatement> {
        self.word("SELECT")?;
        self.word("COUNT")?;
        self.sym("(")?;
        self.sym("*")?;
        self.sym(")")?;
        self.word("FROM")?;

        if self.eat_sym("(") {
            self.word("SELECT")?;
            match self.next() {
                Some(Token::Word(w)) if w == "1" => {}
                _ => return Err(self.error("expected 1")),
            }
            self.word("FROM")?;
            let table = self.table()?;
            self.word("WHERE")?;
            let filter = self.expr()?;
            self.word("LIMIT")?;
            let limit = match self.next() {
                Some(Token::Param(n)) => n,
                _ => return Err(self.error("expected LIMIT placeholder")),
            };
            self.sym(")")?;
            self.word("AS")?;
            self.word("SAMPLE")?;
            return Ok(CountStatement {
                table,
                filter,
                limit: Some(limit),
            });
        }

        let table = self.table()?;
        self.word("WHERE")?;
        let filter = self.expr()?;
        Ok(CountStatement {
            table,
            filter,
            limit: None,
        })
    }

    fn table(&mut self) -> StoreResult<String> {
        let mut parts = vec![self.ident()?];
        while self.eat_sym(".") {
            parts.push(self.ident()?);
        }
        Ok(parts.join("."))
    }

    fn ident(&mut self) -> StoreResult<String> {
        match self.next() {
            Some(Token::Ident(name)) => Ok(name),
            _ => Err(self.error("expected quoted identifier")),
        }
    }

    fn expr(&mut self) -> StoreResult<Expr> {
        if self.eat_word("TRUE") {
            return Ok(Expr::Literal(true));
        }
        if self.eat_word("FALSE") {
            return Ok(Expr::Literal(false));
        }
        if self.eat_word("NOT") {
            self.sym("(")?;
            let inner = self.expr()?;
            self.sym(")")?;
            return Ok(Expr::Not(Box::new(inner)));
        }
        if self.eat_sym("(") {
            let first = self.expr()?;
            let mut children = vec![first];
            let mut joiner: Option<&str> = None;
            loop {
                if self.eat_sym(")") {
                    break;
                }
                let next_joiner = if self.eat_word("AND") {
                    "AND"
                } else if self.eat_word("OR") {
                    "OR"
                } else {
                    return Err(self.error("expected AND, OR or ')'"));
                };
                if joiner.is_some_and(|j| j != next_joiner) {
                    return Err(self.error("mixed AND/OR without parentheses"));
                }
                joiner = Some(next_joiner);
                children.push(self.expr()?);
            }
            return Ok(match joiner {
                Some("OR") => Expr::Or(children),
                _ => Expr::And(children),
            });
        }

        let column = self.ident()?;
        self.comparison(column)
    }

    fn comparison(&mut self, column: String) -> StoreResult<Expr> {
        if self.eat_word("IS") {
            self.word("NULL")?;
            return Ok(Expr::IsNull(column));
        }
        if self.eat_word("IN") {
            self.sym("(")?;
            let mut args = vec![self.arg()?];
            while self.eat_sym(",") {
                args.push(self.arg()?);
            }
            self.sym(")")?;
            return Ok(Expr::In(column, args));
        }
        if self.eat_word("ILIKE") {
            return Ok(Expr::ILike(column, self.arg()?));
        }
        if self.eat_sym("@@") {
            self.word("PLAINTO_TSQUERY")?;
            self.sym("(")?;
            match self.next() {
                Some(Token::Str(config)) if config == "simple" => {}
                _ => return Err(self.error("expected 'simple'")),
            }
            self.sym(",")?;
            let arg = self.arg()?;
            self.sym(")")?;
            return Ok(Expr::TextMatch(column, arg));
        }

        let cmp = match self.next() {
            Some(Token::Sym("=")) => Cmp::Eq,
            Some(Token::Sym(">")) => Cmp::Gt,
            Some(Token::Sym(">=")) => Cmp::Gte,
            Some(Token::Sym("<")) => Cmp::Lt,
            Some(Token::Sym("<=")) => Cmp::Lte,
            _ => return Err(self.error("expected comparison")),
        };
        Ok(Expr::Compare(column, cmp, self.arg()?))
    }

    fn arg(&mut self) -> StoreResult<Arg> {
        let index = match self.next() {
            Some(Token::Param(n)) => n,
            _ => return Err(self.error("expected placeholder")),
        };
        let uuid_cast = if self.eat_sym("::") {
            self.word("UUID")?;
            true
        } else {
            false
        };
        Ok(Arg { index, uuid_cast })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_plain_count() {
        let stmt = parse_count(r#"SELECT COUNT(*) FROM "bugs" WHERE ("status" = $1 AND "points" >= $2)"#).unwrap();
        assert_eq!(stmt.table, "bugs");
        assert!(!stmt.is_sample());
        assert_eq!(
            stmt.filter,
            Expr::And(vec![
                Expr::Compare("status".into(), Cmp::Eq, Arg { index: 1, uuid_cast: false }),
                Expr::Compare("points".into(), Cmp::Gte, Arg { index: 2, uuid_cast: false }),
            ])
        );
    }

    #[test]
    fn test_parse_sample_with_quoted_schema() {
        let stmt = parse_count(
            r#"SELECT COUNT(*) FROM (SELECT 1 FROM "app"."we""ird" WHERE NOT ("owner" = $1::uuid) LIMIT $2) AS sample"#,
        )
        .unwrap();
        assert_eq!(stmt.table, "app.we\"ird");
        assert_eq!(stmt.limit, Some(2));
    }

    #[test]
    fn test_rejects_foreign_sql() {
        assert!(parse_count("DELETE FROM bugs").is_err());
        assert!(parse_count(r#"SELECT COUNT(*) FROM "bugs" WHERE ("a" = $1 AND "b" = $2 OR "c" = $3)"#).is_err());
    }

    #[test]
    fn test_count_with_sample_limit() {
        let stmt = parse_count(r#"SELECT COUNT(*) FROM (SELECT 1 FROM "t" WHERE "n" > $1 LIMIT $2) AS sample"#).unwrap();
        let rows: Vec<Value> = (0..10).map(|n| json!({"n": n})).collect();
        assert_eq!(stmt.count(&rows, &[SqlParam::Int(2), SqlParam::Int(3)]).unwrap(), 3);
        assert_eq!(stmt.count(&rows, &[SqlParam::Int(7), SqlParam::Int(3)]).unwrap(), 2);
    }

    #[test]
    fn test_three_valued_not() {
        let stmt = parse_count(r#"SELECT COUNT(*) FROM "t" WHERE NOT ("n" = $1)"#).unwrap();
        let rows = vec![json!({"n": 1}), json!({"n": 2}), json!({"n": null})];
        // NULL = 1 is unknown, and NOT unknown is still unknown
        assert_eq!(stmt.count(&rows, &[SqlParam::Int(1)]).unwrap(), 1);
    }

    #[test]
    fn test_like_match() {
        assert!(like_match("hello world", "%lo w%"));
        assert!(like_match("hello", "h_llo"));
        assert!(!like_match("hello", "h\\_llo"));
        assert!(like_match("100%", "100\\%"));
        assert!(!like_match("1000", "100\\%"));
        assert!(like_match("", "%"));
    }

    #[test]
    fn test_uuid_cast_rejects_malformed_text() {
        let stmt = parse_count(r#"SELECT COUNT(*) FROM "t" WHERE "id" = $1::uuid"#).unwrap();
        let rows = vec![json!({"id": "x"})];
        assert!(stmt.count(&rows, &[SqlParam::Text("nope".into())]).is_err());
    }
}
