//! Fingerprints of closures and functions by normalized source text.
//!
//! Compiled Rust code cannot be inspected at run time, so callables are
//! identified by their token stream instead: comments and whitespace are
//! dropped, literals are kept, and locally bound names (closure and function
//! parameters, `let` and `for` bindings) are replaced by positional
//! placeholders. Renaming a local therefore leaves the fingerprint intact
//! while changing an operator or a constant does not.

use std::collections::HashMap;

use proc_macro2::{Delimiter, TokenStream, TokenTree};
use serde::{Serialize, Serializer};
use syn::visit::Visit;

use crate::error::HashError;
use crate::ser::CODE_TOKEN;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Token {
    Ident(String),
    Literal(String),
    Punct(char),
}

impl Token {
    fn is_punct(&self, c: char) -> bool {
        matches!(self, Token::Punct(p) if *p == c)
    }

    fn is_ident(&self, name: &str) -> bool {
        matches!(self, Token::Ident(i) if i == name)
    }
}

/// Flattens a token stream, spelling group delimiters as punctuation.
fn flatten(stream: TokenStream, out: &mut Vec<Token>) {
    for tree in stream {
        match tree {
            TokenTree::Group(group) => {
                let delims = match group.delimiter() {
                    Delimiter::Parenthesis => Some(('(', ')')),
                    Delimiter::Bracket => Some(('[', ']')),
                    Delimiter::Brace => Some(('{', '}')),
                    Delimiter::None => None,
                };
                if let Some((open, _)) = delims {
                    out.push(Token::Punct(open));
                }
                flatten(group.stream(), out);
                if let Some((_, close)) = delims {
                    out.push(Token::Punct(close));
                }
            }
            TokenTree::Ident(ident) => out.push(Token::Ident(ident.to_string())),
            TokenTree::Punct(punct) => out.push(Token::Punct(punct.as_char())),
            TokenTree::Literal(lit) => out.push(Token::Literal(lit.to_string())),
        }
    }
}

/// `true` when the token at `i` follows `.`, `::` or a lifetime tick.
fn is_member(tokens: &[Token], i: usize) -> bool {
    match i.checked_sub(1).map(|p| &tokens[p]) {
        Some(prev) if prev.is_punct('.') || prev.is_punct('\'') => true,
        Some(prev) if prev.is_punct(':') => i >= 2 && tokens[i - 2].is_punct(':'),
        _ => false,
    }
}

/// Names introduced by patterns: closure and function parameters, `let`,
/// `for` and `match` bindings, in source order.
#[derive(Default)]
struct Bindings {
    names: Vec<String>,
}

impl<'ast> Visit<'ast> for Bindings {
    fn visit_pat_ident(&mut self, node: &'ast syn::PatIdent) {
        let name = node.ident.to_string();
        // uppercase idents in patterns are unit variants and constants
        if !name.starts_with(char::is_uppercase) {
            self.names.push(name);
        }
        syn::visit::visit_pat_ident(self, node);
    }
}

fn collect_bindings(src: &str) -> Result<Vec<String>, HashError> {
    let mut bindings = Bindings::default();
    if let Ok(expr) = syn::parse_str::<syn::Expr>(src) {
        bindings.visit_expr(&expr);
    } else {
        let file = syn::parse_file(src).map_err(|e| HashError::Malformed {
            what: "code",
            reason: e.to_string(),
        })?;
        bindings.visit_file(&file);
    }
    Ok(bindings.names)
}

/// Whitespace-, comment- and local-name-insensitive identity of a piece of code.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CodeFingerprint {
    normalized: String,
}

impl CodeFingerprint {
    /// Normalizes Rust source text into a fingerprint.
    ///
    /// The source must be a single expression (typically a closure) or a
    /// sequence of items such as a `fn` definition.
    pub fn from_source(src: &str) -> Result<Self, HashError> {
        let stream = src.parse::<TokenStream>().map_err(|e| {
            HashError::Malformed {
                what: "code",
                reason: e.to_string(),
            }
        })?;
        let mut placeholders: HashMap<String, usize> = HashMap::new();
        for name in collect_bindings(src)? {
            let next = placeholders.len();
            placeholders.entry(name).or_insert(next);
        }
        let mut tokens = Vec::new();
        flatten(stream, &mut tokens);
        let mut parts = Vec::with_capacity(tokens.len());
        for (i, t) in tokens.iter().enumerate() {
            let part = match t {
                Token::Ident(_) if i > 0 && tokens[i - 1].is_ident("fn") => "$fn".to_string(),
                Token::Ident(name) => match placeholders.get(name) {
                    Some(n) if !is_member(&tokens, i) => format!("${n}"),
                    _ => name.clone(),
                },
                Token::Literal(l) => l.clone(),
                Token::Punct(p) => p.to_string(),
            };
            parts.push(part);
        }
        Ok(Self {
            normalized: parts.join(" "),
        })
    }

    /// The normalized token stream.
    pub fn as_str(&self) -> &str {
        &self.normalized
    }
}

impl Serialize for CodeFingerprint {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_newtype_struct(CODE_TOKEN, &self.normalized)
    }
}

/// A callable paired with the fingerprint of its source.
///
/// Built with the [`code!`](crate::code!) macro. Serializing a `Code` yields
/// only its fingerprint, so it can be passed as a hashed argument.
#[derive(Clone)]
pub struct Code<F> {
    func: F,
    fingerprint: CodeFingerprint,
}

impl<F> Code<F> {
    /// Pairs `func` with the fingerprint of `source`.
    pub fn new(func: F, source: &str) -> Result<Self, HashError> {
        Ok(Self {
            func,
            fingerprint: CodeFingerprint::from_source(source)?,
        })
    }

    /// The wrapped callable.
    pub fn func(&self) -> &F {
        &self.func
    }

    /// The source fingerprint.
    pub fn fingerprint(&self) -> &CodeFingerprint {
        &self.fingerprint
    }
}

impl<F> Serialize for Code<F> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.fingerprint.serialize(serializer)
    }
}

/// Captures a closure together with its source fingerprint.
///
/// ```
/// let square = memo_hash::code!(|x: f64| x * x)?;
/// assert_eq!((square.func())(3.0), 9.0);
/// # Ok::<(), memo_hash::HashError>(())
/// ```
#[macro_export]
macro_rules! code {
    ($($body:tt)+) => {
        $crate::Code::new($($body)+, stringify!($($body)+))
    };
}
