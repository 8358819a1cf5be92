//! Static vetting of a code fragment before it reaches the interpreter.
//!
//! A fragment is a list of statements, one per line: `name = expr`,
//! `local name = expr`, or a bare expression. A statement may continue onto
//! following lines only while a bracket is open. Control flow, function
//! definitions and any identifier that is neither a built-in nor defined by
//! an earlier statement are rejected.

use rustc_hash::FxHashSet;

use super::lua_tokenizer::{tokenize_lua, LuaTokenType, Token};
use super::SandboxError;

/// Names bound in every sandbox.
pub const BUILTINS: &[&str] = &["df", "len", "sum", "min", "max", "round"];

/// Globals checked, in order, for the fragment's answer.
pub const RESULT_NAMES: &[&str] = &["result", "output", "answer"];

/// Keywords allowed inside expressions. `local` is handled separately.
const EXPRESSION_KEYWORDS: &[&str] = &["and", "or", "not"];

#[derive(Debug, Clone, PartialEq)]
pub enum StatementKind {
    Assign { name: String, local: bool, expr: String },
    Expr(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    /// 1-based line the statement starts on
    pub line: usize,
    pub kind: StatementKind,
}

/// A fragment that passed validation.
#[derive(Debug, Clone, PartialEq)]
pub struct Program {
    pub statements: Vec<Statement>,
}

impl Program {
    /// The trailing bare expression, if the fragment ends with one.
    pub fn trailing_expr(&self) -> Option<&Statement> {
        self.statements.last().filter(|s| matches!(s.kind, StatementKind::Expr(_)))
    }

    /// Chunk running every statement except a trailing expression.
    ///
    /// Assignments become globals so the result names are visible
    /// afterwards; other expressions are evaluated into `_`. Statements keep
    /// their source line so interpreter errors point at the right place.
    pub fn body_chunk(&self) -> String {
        let end = if self.trailing_expr().is_some() {
            self.statements.len() - 1
        } else {
            self.statements.len()
        };

        let mut out = String::new();
        let mut line = 1;
        for stmt in &self.statements[..end] {
            pad_to_line(&mut out, &mut line, stmt.line);
            let text = match &stmt.kind {
                StatementKind::Assign { name, expr, .. } => format!("{} = {}", name, expr),
                StatementKind::Expr(expr) => format!("_ = ({})", expr),
            };
            line += text.matches('\n').count();
            out.push_str(&text);
        }
        out
    }

    /// Chunk returning the trailing expression's value.
    pub fn trailing_chunk(&self) -> Option<String> {
        let stmt = self.trailing_expr()?;
        let StatementKind::Expr(expr) = &stmt.kind else {
            return None;
        };
        let mut out = String::new();
        pad_to_line(&mut out, &mut 1, stmt.line);
        out.push_str("return (");
        out.push_str(expr);
        out.push(')');
        Some(out)
    }
}

fn pad_to_line(out: &mut String, current: &mut usize, target: usize) {
    while *current < target {
        out.push('\n');
        *current += 1;
    }
    if !out.is_empty() && !out.ends_with('\n') {
        out.push('\n');
        *current += 1;
    }
}

fn reject(line: usize, reason: impl Into<String>) -> SandboxError {
    SandboxError::Rejected { line, reason: reason.into() }
}

fn closing_for(open: &str) -> &'static str {
    match open {
        "(" => ")",
        "[" => "]",
        _ => "}",
    }
}

/// Split tokens into statements: a new statement starts on a new line
/// whenever no bracket is open.
fn split_statements<'t>(src: &str, tokens: &'t [Token]) -> Result<Vec<&'t [Token]>, SandboxError> {
    let mut statements = Vec::new();
    let mut start = 0;
    let mut stack: Vec<&str> = Vec::new();

    for (i, tok) in tokens.iter().enumerate() {
        if i > start && stack.is_empty() && tok.line != tokens[i - 1].line {
            statements.push(&tokens[start..i]);
            start = i;
        }
        if tok.kind != LuaTokenType::Punctuation {
            continue;
        }
        match tok.text(src) {
            open @ ("(" | "[" | "{") => stack.push(open),
            close @ (")" | "]" | "}") => match stack.pop() {
                Some(open) if closing_for(open) == close => {}
                _ => return Err(reject(tok.line + 1, format!("unbalanced '{}'", close))),
            },
            _ => {}
        }
    }
    if let Some(open) = stack.last() {
        let line = tokens.last().map_or(1, |t| t.line + 1);
        return Err(reject(line, format!("unclosed '{}'", open)));
    }
    if start < tokens.len() {
        statements.push(&tokens[start..]);
    }
    Ok(statements)
}

/// Check token-level rules that do not depend on statement structure.
fn check_token(src: &str, tok: &Token, first: bool) -> Result<(), SandboxError> {
    let line = tok.line + 1;
    let text = tok.text(src);
    match tok.kind {
        LuaTokenType::Invalid if text.starts_with('"') || text.starts_with('\'') => {
            Err(reject(line, "unterminated string"))
        }
        LuaTokenType::Invalid => Err(reject(line, format!("unexpected character '{}'", text))),
        LuaTokenType::String if text.contains('\n') => {
            Err(reject(line, "multi-line strings are not allowed"))
        }
        LuaTokenType::Keyword if text == "local" && first => Ok(()),
        LuaTokenType::Keyword if text == "local" => {
            Err(reject(line, "'local' may only start a statement"))
        }
        LuaTokenType::Keyword if !EXPRESSION_KEYWORDS.contains(&text) => Err(reject(
            line,
            format!("'{}' is not allowed: no control flow or function definitions", text),
        )),
        LuaTokenType::Operator if text == "..." => Err(reject(line, "varargs are not allowed")),
        LuaTokenType::Punctuation if text == "::" => Err(reject(line, "labels are not allowed")),
        LuaTokenType::Punctuation if text == ";" => {
            Err(reject(line, "one statement per line; ';' is not allowed"))
        }
        _ => Ok(()),
    }
}

/// Identifiers in `expr` that name variables, skipping field and method
/// names and table constructor keys.
fn free_identifiers<'a>(src: &'a str, expr: &[Token]) -> Vec<(&'a str, usize)> {
    let mut names = Vec::new();
    let mut stack: Vec<&str> = Vec::new();
    for (i, tok) in expr.iter().enumerate() {
        let text = tok.text(src);
        match (tok.kind, text) {
            (LuaTokenType::Punctuation, open @ ("(" | "[" | "{")) => stack.push(open),
            (LuaTokenType::Punctuation, ")" | "]" | "}") => {
                stack.pop();
            }
            (LuaTokenType::Identifier, name) => {
                let after_access = i > 0 && matches!(expr[i - 1].text(src), "." | ":");
                let is_field_key = stack.last() == Some(&"{")
                    && expr.get(i + 1).is_some_and(|n| n.is(src, LuaTokenType::Operator, "="));
                if !after_access && !is_field_key {
                    names.push((name, tok.line + 1));
                }
            }
            _ => {}
        }
    }
    names
}

/// Reject a stray `=` outside any table constructor.
fn check_no_assignment(src: &str, expr: &[Token]) -> Result<(), SandboxError> {
    let mut depth = 0usize;
    for tok in expr {
        match (tok.kind, tok.text(src)) {
            (LuaTokenType::Punctuation, "(" | "[" | "{") => depth += 1,
            (LuaTokenType::Punctuation, ")" | "]" | "}") => depth = depth.saturating_sub(1),
            (LuaTokenType::Operator, "=") if depth == 0 => {
                return Err(reject(
                    tok.line + 1,
                    "only simple assignments of the form `name = expression` are allowed",
                ));
            }
            _ => {}
        }
    }
    Ok(())
}

fn span_text<'a>(src: &'a str, tokens: &[Token]) -> &'a str {
    match (tokens.first(), tokens.last()) {
        (Some(first), Some(last)) => &src[first.range.start..last.range.end],
        _ => "",
    }
}

/// Validate a fragment and break it into statements.
pub fn validate(code: &str) -> Result<Program, SandboxError> {
    let tokens: Vec<Token> =
        tokenize_lua(code).into_iter().filter(|t| t.kind != LuaTokenType::Comment).collect();
    if tokens.is_empty() {
        return Err(reject(1, "no code to run"));
    }

    let mut defined: FxHashSet<String> = BUILTINS
        .iter()
        .chain(RESULT_NAMES.iter())
        .map(|s| s.to_string())
        .collect();
    let mut statements = Vec::new();

    for stmt in split_statements(code, &tokens)? {
        let line = stmt[0].line + 1;
        for (i, tok) in stmt.iter().enumerate() {
            check_token(code, tok, i == 0)?;
        }

        let local = stmt[0].is(code, LuaTokenType::Keyword, "local");
        let target = if local { 1 } else { 0 };
        let is_assignment = stmt.get(target).is_some_and(|t| t.kind == LuaTokenType::Identifier)
            && stmt.get(target + 1).is_some_and(|t| t.is(code, LuaTokenType::Operator, "="));

        if local && !is_assignment {
            return Err(reject(line, "'local' must be followed by `name = expression`"));
        }

        let expr_tokens = if is_assignment { &stmt[target + 2..] } else { stmt };
        if expr_tokens.is_empty() {
            return Err(reject(line, "assignment has no value"));
        }
        check_no_assignment(code, expr_tokens)?;

        for (name, at) in free_identifiers(code, expr_tokens) {
            if !defined.contains(name) {
                return Err(reject(at, format!("unknown name '{}'", name)));
            }
        }

        let expr = span_text(code, expr_tokens).to_string();
        let kind = if is_assignment {
            let name = stmt[target].text(code).to_string();
            if BUILTINS.contains(&name.as_str()) {
                return Err(reject(line, format!("cannot reassign built-in '{}'", name)));
            }
            defined.insert(name.clone());
            StatementKind::Assign { name, local, expr }
        } else {
            StatementKind::Expr(expr)
        };
        statements.push(Statement { line, kind });
    }

    Ok(Program { statements })
}
