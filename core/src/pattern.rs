//! `UriPattern` - Compiled route pattern
//!
//! A route pattern is a string template for URI fragments. It compiles once,
//! at sitemap construction time, into a full-match regex plus an ordered
//! list of parameter names, and it works in both directions: parse a
//! fragment into parameters, or build a fragment from parameter values.
//!
//! # Grammar
//!
//! - `{name}` - required parameter, default constraint `\w*`
//! - `{name:regex}` - parameter with a custom constraint (Rust `regex`
//!   crate syntax, linear time)
//! - `[...]` - optional group of literal text and parameters, at most one
//!   level deep
//! - everything else is literal text, never interpreted as regex syntax
//!
//! # Example
//!
//! ```
//! use waymark::UriPattern;
//!
//! let pattern = UriPattern::compile(r"user/{id:\d+}").unwrap();
//! let params = pattern.match_fragment("user/42").unwrap();
//! assert_eq!(params.as_string("id").as_deref(), Some("42"));
//! assert!(pattern.match_fragment("user/bob").is_none());
//! ```

use std::fmt;

use regex::Regex;

use crate::{NavigationParams, MAX_OPTIONAL_DEPTH, MAX_PATTERN_LENGTH};

/// Default constraint applied to `{name}` parameters without one.
pub const DEFAULT_CONSTRAINT: &str = r"\w*";

/// Errors from route pattern compilation.
///
/// Pattern compilation happens while the sitemap is being built, so every
/// variant is a configuration error that should abort start-up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PatternError {
    /// A `[` / `]` or `{` / `}` pair does not balance.
    Unbalanced {
        /// The offending raw pattern.
        pattern: String,
        /// The bracket character that does not balance.
        bracket: char,
    },
    /// Optional groups nest deeper than [`MAX_OPTIONAL_DEPTH`].
    ///
    /// Deeper nesting is rejected at build time rather than silently
    /// mis-matching at resolution time.
    NestingTooDeep {
        /// The offending raw pattern.
        pattern: String,
        /// Observed nesting depth.
        depth: usize,
        /// Maximum allowed depth.
        max: usize,
    },
    /// A `{}` placeholder has no parameter name.
    EmptyParameter {
        /// The offending raw pattern.
        pattern: String,
    },
    /// A parameter constraint is not valid regex syntax.
    BadConstraint {
        /// The offending raw pattern.
        pattern: String,
        /// The parameter whose constraint failed to compile.
        name: String,
        /// The underlying regex error message.
        source: String,
    },
    /// The pattern exceeds [`MAX_PATTERN_LENGTH`].
    TooLong {
        /// Actual length of the pattern.
        len: usize,
        /// Maximum allowed length.
        max: usize,
    },
}

impl fmt::Display for PatternError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unbalanced { pattern, bracket } => {
                write!(f, "unbalanced '{bracket}' in pattern \"{pattern}\"")
            }
            Self::NestingTooDeep {
                pattern,
                depth,
                max,
            } => write!(
                f,
                "optional groups in \"{pattern}\" nest {depth} levels deep, but at most {max} is supported"
            ),
            Self::EmptyParameter { pattern } => {
                write!(f, "empty parameter name in pattern \"{pattern}\"")
            }
            Self::BadConstraint {
                pattern,
                name,
                source,
            } => write!(
                f,
                "constraint for parameter \"{name}\" in pattern \"{pattern}\" is not valid: {source}"
            ),
            Self::TooLong { len, max } => {
                write!(f, "pattern length is {len}, but maximum allowed is {max}")
            }
        }
    }
}

impl std::error::Error for PatternError {}

/// One piece of a parsed pattern.
#[derive(Debug, Clone)]
enum Token {
    /// Literal text, emitted verbatim and matched escaped.
    Literal(String),
    /// A named parameter with its constraint.
    Param { name: String, constraint: String },
    /// An optional group. Inner tokens never contain another group.
    Optional(Vec<Token>),
}

/// A compiled route pattern.
///
/// Holds the raw template, the anchored regex it compiles to, and the
/// parameter names in first-occurrence order. Matching is full-fragment
/// only; a partial match is no match.
///
/// # Building fragments
///
/// [`build_fragment`](Self::build_fragment) is the inverse of matching.
/// A required parameter substitutes its resolved string (absent resolves
/// to the empty string). An optional group collapses to nothing only when
/// every parameter referenced inside it is absent; if any is present, the
/// whole group is emitted, with absent members as empty substrings. A
/// present-but-empty value counts as present.
///
/// # Example
///
/// ```
/// use waymark::{NavigationParams, UriPattern};
///
/// let pattern = UriPattern::compile("report[/year/{y}]").unwrap();
///
/// assert_eq!(pattern.build_fragment(&NavigationParams::new()), "report");
///
/// let params = NavigationParams::new().with("y", "2024");
/// assert_eq!(pattern.build_fragment(&params), "report/year/2024");
/// ```
#[derive(Debug, Clone)]
pub struct UriPattern {
    raw: String,
    regex: Regex,
    tokens: Vec<Token>,
    /// Parameter names, first occurrence order.
    names: Vec<String>,
    /// Parameter name per capture group, group order.
    captures: Vec<String>,
}

impl UriPattern {
    /// Compile a raw pattern string.
    ///
    /// Validation runs before compilation: bracket balance and optional
    /// group depth are checked over the whole pattern with an explicit
    /// depth counter, so malformed patterns fail loudly here instead of
    /// mis-matching later.
    ///
    /// # Errors
    ///
    /// Returns a [`PatternError`] for unbalanced brackets, optional groups
    /// nested deeper than [`MAX_OPTIONAL_DEPTH`], empty parameter names,
    /// invalid constraints, or an over-long pattern.
    pub fn compile(raw: &str) -> Result<Self, PatternError> {
        if raw.len() > MAX_PATTERN_LENGTH {
            return Err(PatternError::TooLong {
                len: raw.len(),
                max: MAX_PATTERN_LENGTH,
            });
        }
        validate_groups(raw)?;
        let tokens = parse(raw)?;

        let mut names = Vec::new();
        let mut captures = Vec::new();
        let mut source = String::from("^");
        emit_regex(&tokens, &mut source, &mut names, &mut captures);
        source.push('$');

        let regex = Regex::new(&source).map_err(|e| PatternError::BadConstraint {
            pattern: raw.to_string(),
            name: captures.last().cloned().unwrap_or_default(),
            source: e.to_string(),
        })?;

        Ok(Self {
            raw: raw.to_string(),
            regex,
            tokens,
            names,
            captures,
        })
    }

    /// The raw pattern string this compiled from.
    #[must_use]
    pub fn raw(&self) -> &str {
        &self.raw
    }

    /// Parameter names in first-occurrence order.
    #[must_use]
    pub fn param_names(&self) -> &[String] {
        &self.names
    }

    /// Match a fragment against this pattern.
    ///
    /// Returns the bound parameters when the whole fragment matches, or
    /// `None` otherwise. A non-match is not an error. Parameters inside an
    /// optional group that did not participate in the match are absent
    /// from the returned store.
    #[must_use]
    pub fn match_fragment(&self, fragment: &str) -> Option<NavigationParams> {
        let caps = self.regex.captures(fragment)?;
        let mut params = NavigationParams::new();
        for (index, name) in self.captures.iter().enumerate() {
            if let Some(m) = caps.get(index + 1) {
                params.set(name.clone(), m.as_str());
            }
        }
        Some(params)
    }

    /// Build a concrete fragment from parameter values.
    ///
    /// The inverse of [`match_fragment`](Self::match_fragment); see the
    /// type-level notes for the optional group collapse rule.
    #[must_use]
    pub fn build_fragment(&self, params: &NavigationParams) -> String {
        let mut out = String::new();
        for token in &self.tokens {
            match token {
                Token::Literal(text) => out.push_str(text),
                Token::Param { name, .. } => {
                    out.push_str(&params.as_string(name).unwrap_or_default());
                }
                Token::Optional(inner) => {
                    let any_present = inner.iter().any(|t| match t {
                        Token::Param { name, .. } => params.contains(name),
                        _ => false,
                    });
                    if any_present {
                        for t in inner {
                            match t {
                                Token::Literal(text) => out.push_str(text),
                                Token::Param { name, .. } => {
                                    out.push_str(&params.as_string(name).unwrap_or_default());
                                }
                                // Parsing caps nesting at one level.
                                Token::Optional(_) => {}
                            }
                        }
                    }
                }
            }
        }
        out
    }
}

impl fmt::Display for UriPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

/// Depth-counting validation pass over the raw pattern.
///
/// Checks `[` / `]` balance and the optional group depth cap before any
/// token parsing happens.
fn validate_groups(raw: &str) -> Result<(), PatternError> {
    let mut depth: usize = 0;
    let mut max_depth: usize = 0;
    let mut in_braces = 0usize;
    for c in raw.chars() {
        match c {
            '{' => in_braces += 1,
            '}' if in_braces > 0 => in_braces -= 1,
            '[' if in_braces == 0 => {
                depth += 1;
                max_depth = max_depth.max(depth);
            }
            ']' if in_braces == 0 => {
                if depth == 0 {
                    return Err(PatternError::Unbalanced {
                        pattern: raw.to_string(),
                        bracket: ']',
                    });
                }
                depth -= 1;
            }
            _ => {}
        }
    }
    if in_braces > 0 {
        return Err(PatternError::Unbalanced {
            pattern: raw.to_string(),
            bracket: '{',
        });
    }
    if depth != 0 {
        return Err(PatternError::Unbalanced {
            pattern: raw.to_string(),
            bracket: '[',
        });
    }
    if max_depth > MAX_OPTIONAL_DEPTH {
        return Err(PatternError::NestingTooDeep {
            pattern: raw.to_string(),
            depth: max_depth,
            max: MAX_OPTIONAL_DEPTH,
        });
    }
    Ok(())
}

/// Parse the (validated) raw pattern into tokens.
fn parse(raw: &str) -> Result<Vec<Token>, PatternError> {
    let mut top = Vec::new();
    let mut group: Option<Vec<Token>> = None;
    let mut literal = String::new();
    let mut chars = raw.chars();

    fn flush(literal: &mut String, out: &mut Vec<Token>) {
        if !literal.is_empty() {
            out.push(Token::Literal(std::mem::take(literal)));
        }
    }

    while let Some(c) = chars.next() {
        match c {
            '[' => {
                flush(&mut literal, &mut top);
                group = Some(Vec::new());
            }
            ']' => {
                let mut inner = group.take().unwrap_or_default();
                flush(&mut literal, &mut inner);
                top.push(Token::Optional(inner));
            }
            '{' => {
                let out = group.as_mut().unwrap_or(&mut top);
                flush(&mut literal, out);
                out.push(parse_param(raw, &mut chars)?);
            }
            other => literal.push(other),
        }
    }
    flush(&mut literal, &mut top);
    Ok(top)
}

/// Parse the remainder of a `{name}` or `{name:constraint}` placeholder.
///
/// The opening `{` has been consumed. Braces inside the constraint (regex
/// repetitions like `\d{4}`) are tracked so the placeholder ends at the
/// brace that balances the opener.
fn parse_param(raw: &str, chars: &mut std::str::Chars<'_>) -> Result<Token, PatternError> {
    let mut body = String::new();
    let mut depth = 1usize;
    for c in chars.by_ref() {
        match c {
            '{' => {
                depth += 1;
                body.push(c);
            }
            '}' => {
                depth -= 1;
                if depth == 0 {
                    break;
                }
                body.push(c);
            }
            other => body.push(other),
        }
    }

    let (name, constraint) = match body.split_once(':') {
        Some((name, constraint)) => (name.trim().to_string(), constraint.to_string()),
        None => (body.trim().to_string(), DEFAULT_CONSTRAINT.to_string()),
    };
    if name.is_empty() {
        return Err(PatternError::EmptyParameter {
            pattern: raw.to_string(),
        });
    }
    Regex::new(&constraint).map_err(|e| PatternError::BadConstraint {
        pattern: raw.to_string(),
        name: name.clone(),
        source: e.to_string(),
    })?;
    Ok(Token::Param { name, constraint })
}

/// Second pass: synthesize the anchored regex over the parsed tokens.
///
/// Inner tokens are emitted before their enclosing optional group closes,
/// so correctness does not depend on group ordering. Literal text is
/// escaped, never interpreted.
fn emit_regex(
    tokens: &[Token],
    source: &mut String,
    names: &mut Vec<String>,
    captures: &mut Vec<String>,
) {
    for token in tokens {
        match token {
            Token::Literal(text) => source.push_str(&regex::escape(text)),
            Token::Param { name, constraint } => {
                if !names.iter().any(|n| n == name) {
                    names.push(name.clone());
                }
                captures.push(name.clone());
                source.push('(');
                source.push_str(constraint);
                source.push(')');
            }
            Token::Optional(inner) => {
                source.push_str("(?:");
                emit_regex(inner, source, names, captures);
                source.push_str(")?");
            }
        }
    }
}
