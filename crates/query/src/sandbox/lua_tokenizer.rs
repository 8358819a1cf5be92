//! Single-pass Lua tokenizer used to vet code before it runs.
//!
//! Tokens carry byte ranges (on UTF-8 char boundaries) and the 0-based line
//! they start on. Whitespace is not emitted.

use std::ops::Range;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LuaTokenType {
    Keyword,
    /// `true`, `false`, `nil`
    Boolean,
    String,
    Number,
    Comment,
    Operator,
    Punctuation,
    Identifier,
    /// Unterminated string or a character Lua does not accept here
    Invalid,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub kind: LuaTokenType,
    pub range: Range<usize>,
    pub line: usize,
}

impl Token {
    pub fn text<'a>(&self, src: &'a str) -> &'a str {
        &src[self.range.clone()]
    }

    pub fn is(&self, src: &str, kind: LuaTokenType, text: &str) -> bool {
        self.kind == kind && self.text(src) == text
    }
}

const LUA_KEYWORDS: &[&str] = &[
    "local", "function", "if", "then", "else", "elseif", "end",
    "for", "while", "do", "return", "repeat", "until", "break",
    "in", "and", "or", "not", "goto",
];

const LUA_BOOLEANS: &[&str] = &["true", "false", "nil"];

fn classify_word(word: &str) -> LuaTokenType {
    if LUA_BOOLEANS.contains(&word) {
        LuaTokenType::Boolean
    } else if LUA_KEYWORDS.contains(&word) {
        LuaTokenType::Keyword
    } else {
        LuaTokenType::Identifier
    }
}

/// Length of a long bracket opener `[=*[` at `pos`, with its level.
fn long_bracket_open(b: &[u8], pos: usize) -> Option<(usize, usize)> {
    if b.get(pos) != Some(&b'[') {
        return None;
    }
    let mut i = pos + 1;
    while b.get(i) == Some(&b'=') {
        i += 1;
    }
    (b.get(i) == Some(&b'[')).then(|| (i + 1 - pos, i - pos - 1))
}

/// Byte offset just past the `]=*]` closer of the given level, or EOF.
fn long_bracket_close(b: &[u8], from: usize, level: usize) -> usize {
    let mut i = from;
    while i < b.len() {
        if b[i] == b']' {
            let mut j = i + 1;
            while b.get(j) == Some(&b'=') {
                j += 1;
            }
            if j - i - 1 == level && b.get(j) == Some(&b']') {
                return j + 1;
            }
        }
        i += 1;
    }
    b.len()
}

const OPERATORS: &[&str] = &[
    "...", "..", "==", "~=", "<=", ">=", "//", "<<", ">>", "::",
    "+", "-", "*", "/", "%", "^", "#", "&", "~", "|", "<", ">", "=", ".",
];

const PUNCTUATION: &[u8] = b"(){}[],;:";

/// Tokenize Lua source.
pub fn tokenize_lua(input: &str) -> Vec<Token> {
    let b = input.as_bytes();
    let mut tokens = Vec::new();
    let mut i = 0;
    let mut line = 0;

    let push = |tokens: &mut Vec<Token>, kind, start: usize, end: usize, line: usize| {
        tokens.push(Token { kind, range: start..end, line });
    };
    let newlines = |start: usize, end: usize| b[start..end].iter().filter(|&&c| c == b'\n').count();

    while i < b.len() {
        let c = b[i];

        if c == b'\n' {
            line += 1;
            i += 1;
            continue;
        }
        if c.is_ascii_whitespace() {
            i += 1;
            continue;
        }

        let start = i;

        // Comments: --[[ ... ]] or -- to end of line
        if c == b'-' && b.get(i + 1) == Some(&b'-') {
            let end = match long_bracket_open(b, i + 2) {
                Some((open_len, level)) => long_bracket_close(b, i + 2 + open_len, level),
                None => b[i..].iter().position(|&c| c == b'\n').map_or(b.len(), |p| i + p),
            };
            push(&mut tokens, LuaTokenType::Comment, start, end, line);
            line += newlines(start, end);
            i = end;
            continue;
        }

        // Quoted strings
        if c == b'"' || c == b'\'' {
            let mut j = i + 1;
            let mut kind = LuaTokenType::Invalid;
            while j < b.len() {
                match b[j] {
                    b'\\' => j += 2,
                    b'\n' => break,
                    q if q == c => {
                        j += 1;
                        kind = LuaTokenType::String;
                        break;
                    }
                    _ => j += 1,
                }
            }
            let end = j.min(b.len());
            push(&mut tokens, kind, start, end, line);
            line += newlines(start, end);
            i = end;
            continue;
        }

        // Long strings [[ ... ]]
        if let Some((open_len, level)) = long_bracket_open(b, i) {
            let end = long_bracket_close(b, i + open_len, level);
            push(&mut tokens, LuaTokenType::String, start, end, line);
            line += newlines(start, end);
            i = end;
            continue;
        }

        // Numbers: decimal, hex, floats, exponents
        if c.is_ascii_digit() || (c == b'.' && b.get(i + 1).is_some_and(u8::is_ascii_digit)) {
            let mut j = i + 1;
            while j < b.len() {
                let d = b[j];
                let after_exponent = matches!(b[j - 1], b'e' | b'E' | b'p' | b'P');
                let is_concat = d == b'.' && b.get(j + 1) == Some(&b'.');
                if (d.is_ascii_alphanumeric() || d == b'_' || d == b'.') && !is_concat
                    || (after_exponent && (d == b'+' || d == b'-'))
                {
                    j += 1;
                } else {
                    break;
                }
            }
            push(&mut tokens, LuaTokenType::Number, start, j, line);
            i = j;
            continue;
        }

        // Identifiers and keywords
        if c.is_ascii_alphabetic() || c == b'_' {
            let mut j = i + 1;
            while j < b.len() && (b[j].is_ascii_alphanumeric() || b[j] == b'_') {
                j += 1;
            }
            push(&mut tokens, classify_word(&input[start..j]), start, j, line);
            i = j;
            continue;
        }

        if let Some(op) = OPERATORS.iter().find(|op| b[i..].starts_with(op.as_bytes())) {
            let kind = if *op == "::" { LuaTokenType::Punctuation } else { LuaTokenType::Operator };
            push(&mut tokens, kind, start, i + op.len(), line);
            i += op.len();
            continue;
        }

        if PUNCTUATION.contains(&c) {
            push(&mut tokens, LuaTokenType::Punctuation, start, i + 1, line);
            i += 1;
            continue;
        }

        // Anything else, one whole char
        let width = input[i..].chars().next().map_or(1, char::len_utf8);
        push(&mut tokens, LuaTokenType::Invalid, start, i + width, line);
        i += width;
    }

    tokens
}
