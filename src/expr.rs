//! Condition expression language for contextual assertions.
//!
//! Supported syntax:
//! - Comparisons: `==`, `!=`, `>`, `<`, `>=`, `<=`
//! - Boolean operators: `&&`, `||`, `!`
//! - Membership: `x in xs`
//! - Dot-path access into the JSON context: `resource.author`
//! - Literals: integers, floats, `"strings"`, `true`, `false`
//! - Parentheses for grouping

use serde_json::Value;

use crate::errors::AuthzError;

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// Literal value, stored as JSON so evaluation has a single value domain
    Lit(Value),
    /// Dot-path lookup into the context; missing segments yield null
    Path(Vec<String>),
    Not(Box<Expr>),
    And(Box<Expr>, Box<Expr>),
    Or(Box<Expr>, Box<Expr>),
    Cmp {
        op: CmpOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
    In {
        needle: Box<Expr>,
        haystack: Box<Expr>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CmpOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl CmpOp {
    fn symbol(self) -> &'static str {
        match self {
            CmpOp::Eq => "==",
            CmpOp::Ne => "!=",
            CmpOp::Lt => "<",
            CmpOp::Le => "<=",
            CmpOp::Gt => ">",
            CmpOp::Ge => ">=",
        }
    }
}

// ---------- Tokenizer ----------

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Ident(String),
    Num(Value),
    Str(String),
    Bool(bool),
    Cmp(CmpOp),
    And,
    Or,
    Not,
    In,
    Dot,
    LParen,
    RParen,
}

fn invalid(msg: impl Into<String>) -> AuthzError {
    AuthzError::InvalidExpr(msg.into())
}

fn tokenize(input: &str) -> Result<Vec<Token>, AuthzError> {
    let mut tokens = Vec::new();
    let mut chars = input.chars().peekable();

    while let Some(&c) = chars.peek() {
        match c {
            c if c.is_whitespace() => {
                chars.next();
            }
            '.' => {
                chars.next();
                tokens.push(Token::Dot);
            }
            '(' => {
                chars.next();
                tokens.push(Token::LParen);
            }
            ')' => {
                chars.next();
                tokens.push(Token::RParen);
            }
            '=' => {
                chars.next();
                if chars.next_if_eq(&'=').is_none() {
                    return Err(invalid("expected `==`, found a lone `=`"));
                }
                tokens.push(Token::Cmp(CmpOp::Eq));
            }
            '!' => {
                chars.next();
                if chars.next_if_eq(&'=').is_some() {
                    tokens.push(Token::Cmp(CmpOp::Ne));
                } else {
                    tokens.push(Token::Not);
                }
            }
            '<' => {
                chars.next();
                if chars.next_if_eq(&'=').is_some() {
                    tokens.push(Token::Cmp(CmpOp::Le));
                } else {
                    tokens.push(Token::Cmp(CmpOp::Lt));
                }
            }
            '>' => {
                chars.next();
                if chars.next_if_eq(&'=').is_some() {
                    tokens.push(Token::Cmp(CmpOp::Ge));
                } else {
                    tokens.push(Token::Cmp(CmpOp::Gt));
                }
            }
            '&' => {
                chars.next();
                if chars.next_if_eq(&'&').is_none() {
                    return Err(invalid("expected `&&`, found a lone `&`"));
                }
                tokens.push(Token::And);
            }
            '|' => {
                chars.next();
                if chars.next_if_eq(&'|').is_none() {
                    return Err(invalid("expected `||`, found a lone `|`"));
                }
                tokens.push(Token::Or);
            }
            '"' => {
                chars.next();
                let mut s = String::new();
                loop {
                    match chars.next() {
                        Some('"') => break,
                        Some('\\') => match chars.next() {
                            Some(escaped) => s.push(escaped),
                            None => return Err(invalid("unterminated string literal")),
                        },
                        Some(other) => s.push(other),
                        None => return Err(invalid("unterminated string literal")),
                    }
                }
                tokens.push(Token::Str(s));
            }
            c if c.is_ascii_digit() => {
                let mut num = String::new();
                while let Some(&d) = chars.peek() {
                    if d.is_ascii_digit() || d == '.' {
                        num.push(d);
                        chars.next();
                    } else {
                        break;
                    }
                }
                let value = if num.contains('.') {
                    let f: f64 = num
                        .parse()
                        .map_err(|_| invalid(format!("invalid float `{num}`")))?;
                    Value::from(f)
                } else {
                    let n: i64 = num
                        .parse()
                        .map_err(|_| invalid(format!("invalid integer `{num}`")))?;
                    Value::from(n)
                };
                tokens.push(Token::Num(value));
            }
            c if c.is_ascii_alphabetic() || c == '_' => {
                let mut word = String::new();
                while let Some(&a) = chars.peek() {
                    if a.is_ascii_alphanumeric() || a == '_' {
                        word.push(a);
                        chars.next();
                    } else {
                        break;
                    }
                }
                tokens.push(match word.as_str() {
                    "true" => Token::Bool(true),
                    "false" => Token::Bool(false),
                    "in" => Token::In,
                    _ => Token::Ident(word),
                });
            }
            other => {
                return Err(invalid(format!("unexpected character `{other}`")));
            }
        }
    }

    Ok(tokens)
}

// ---------- Parser ----------

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn bump(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        self.pos += 1;
        token
    }

    fn eat(&mut self, token: &Token) -> bool {
        if self.peek() == Some(token) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    /// or_expr = and_expr ("||" and_expr)*
    fn or_expr(&mut self) -> Result<Expr, AuthzError> {
        let mut lhs = self.and_expr()?;
        while self.eat(&Token::Or) {
            let rhs = self.and_expr()?;
            lhs = Expr::Or(Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    /// and_expr = cmp_expr ("&&" cmp_expr)*
    fn and_expr(&mut self) -> Result<Expr, AuthzError> {
        let mut lhs = self.cmp_expr()?;
        while self.eat(&Token::And) {
            let rhs = self.cmp_expr()?;
            lhs = Expr::And(Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    /// cmp_expr = unary ((cmp_op | "in") unary)?
    fn cmp_expr(&mut self) -> Result<Expr, AuthzError> {
        let lhs = self.unary()?;
        match self.peek() {
            Some(Token::Cmp(op)) => {
                let op = *op;
                self.pos += 1;
                let rhs = self.unary()?;
                Ok(Expr::Cmp {
                    op,
                    lhs: Box::new(lhs),
                    rhs: Box::new(rhs),
                })
            }
            Some(Token::In) => {
                self.pos += 1;
                let rhs = self.unary()?;
                Ok(Expr::In {
                    needle: Box::new(lhs),
                    haystack: Box::new(rhs),
                })
            }
            _ => Ok(lhs),
        }
    }

    /// unary = "!" unary | primary
    fn unary(&mut self) -> Result<Expr, AuthzError> {
        if self.eat(&Token::Not) {
            let inner = self.unary()?;
            return Ok(Expr::Not(Box::new(inner)));
        }
        self.primary()
    }

    /// primary = literal | path | "(" expr ")"
    fn primary(&mut self) -> Result<Expr, AuthzError> {
        match self.bump() {
            Some(Token::Num(v)) => Ok(Expr::Lit(v)),
            Some(Token::Str(s)) => Ok(Expr::Lit(Value::String(s))),
            Some(Token::Bool(b)) => Ok(Expr::Lit(Value::Bool(b))),
            Some(Token::Ident(first)) => {
                let mut path = vec![first];
                while self.eat(&Token::Dot) {
                    match self.bump() {
                        Some(Token::Ident(seg)) => path.push(seg),
                        _ => return Err(invalid("expected identifier after `.`")),
                    }
                }
                Ok(Expr::Path(path))
            }
            Some(Token::LParen) => {
                let inner = self.or_expr()?;
                if !self.eat(&Token::RParen) {
                    return Err(invalid("expected closing parenthesis `)`"));
                }
                Ok(inner)
            }
            other => Err(invalid(format!("unexpected token: {other:?}"))),
        }
    }
}

/// Parse a condition expression string into an AST.
pub fn parse(input: &str) -> Result<Expr, AuthzError> {
    let tokens = tokenize(input)?;
    if tokens.is_empty() {
        return Err(invalid("empty expression"));
    }
    let mut parser = Parser { tokens, pos: 0 };
    let expr = parser.or_expr()?;
    if let Some(trailing) = parser.peek() {
        return Err(invalid(format!("unexpected trailing token: {trailing:?}")));
    }
    Ok(expr)
}

// ---------- Evaluator ----------

/// Evaluate a parsed expression against a JSON context.
pub fn evaluate(expr: &Expr, context: &Value) -> Result<bool, AuthzError> {
    match eval(expr, context)? {
        Value::Bool(b) => Ok(b),
        other => Err(invalid(format!(
            "condition must evaluate to a boolean, got `{other}`"
        ))),
    }
}

fn eval(expr: &Expr, context: &Value) -> Result<Value, AuthzError> {
    match expr {
        Expr::Lit(v) => Ok(v.clone()),
        Expr::Path(segments) => {
            let mut current = context;
            for seg in segments {
                current = current.get(seg).unwrap_or(&Value::Null);
            }
            Ok(current.clone())
        }
        Expr::Not(inner) => Ok(Value::Bool(!eval_bool(inner, context, "!")?)),
        Expr::And(lhs, rhs) => {
            // short-circuit: rhs only evaluated when lhs holds
            if !eval_bool(lhs, context, "&&")? {
                return Ok(Value::Bool(false));
            }
            Ok(Value::Bool(eval_bool(rhs, context, "&&")?))
        }
        Expr::Or(lhs, rhs) => {
            if eval_bool(lhs, context, "||")? {
                return Ok(Value::Bool(true));
            }
            Ok(Value::Bool(eval_bool(rhs, context, "||")?))
        }
        Expr::Cmp { op, lhs, rhs } => {
            let l = eval(lhs, context)?;
            let r = eval(rhs, context)?;
            let result = match op {
                CmpOp::Eq => values_equal(&l, &r),
                CmpOp::Ne => !values_equal(&l, &r),
                CmpOp::Lt | CmpOp::Le | CmpOp::Gt | CmpOp::Ge => {
                    let (lf, rf) = match (l.as_f64(), r.as_f64()) {
                        (Some(lf), Some(rf)) => (lf, rf),
                        _ => {
                            return Err(invalid(format!(
                                "`{}` requires numeric operands",
                                op.symbol()
                            )));
                        }
                    };
                    match op {
                        CmpOp::Lt => lf < rf,
                        CmpOp::Le => lf <= rf,
                        CmpOp::Gt => lf > rf,
                        CmpOp::Ge => lf >= rf,
                        CmpOp::Eq | CmpOp::Ne => unreachable!(),
                    }
                }
            };
            Ok(Value::Bool(result))
        }
        Expr::In { needle, haystack } => {
            let elem = eval(needle, context)?;
            let coll = eval(haystack, context)?;
            match coll.as_array() {
                Some(items) => Ok(Value::Bool(items.iter().any(|v| values_equal(v, &elem)))),
                None => Err(invalid("`in` requires an array on the right side")),
            }
        }
    }
}

fn eval_bool(expr: &Expr, context: &Value, op: &str) -> Result<bool, AuthzError> {
    match eval(expr, context)? {
        Value::Bool(b) => Ok(b),
        _ => Err(invalid(format!("`{op}` requires boolean operands"))),
    }
}

/// JSON equality with numeric coercion, so `1 == 1.0` holds.
fn values_equal(a: &Value, b: &Value) -> bool {
    match (a.as_f64(), b.as_f64()) {
        (Some(af), Some(bf)) => af == bf,
        _ => a == b,
    }
}
