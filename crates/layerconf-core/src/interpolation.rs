//! Evaluation of the interpolation language embedded in configuration values
//!
//! Supported forms:
//! - `%(Section.key)` or `%(key)` - reference to another parameter
//! - `%(data|filter1,filter2)` - data passed through a filter chain
//! - `%{verbatim text}` - literal region, nothing inside is evaluated
//! - `\n`, `\t`, `\r`, `\\` and `\x` - escapes (`\x` yields `x`)
//!
//! A `)` or `}` without a matching opener is an error; other special
//! characters are plain text when they do not form one of the forms above.
//!
//! Expressions nest and are evaluated innermost first:
//! `%(prefix %(name|upper)|lower)` upper-cases `name`, appends it to `prefix`
//! and lower-cases the result.

use crate::error::{Error, Result};

/// Default bound on expression nesting and reference chains
pub const DEFAULT_MAX_DEPTH: usize = 64;

/// Callbacks the evaluator uses to resolve references and run filters
pub trait Expander {
    /// Resolve a fully qualified `Section.key` reference to its text form
    fn reference(&mut self, name: &str) -> Result<String>;

    /// Run the named filter over `data`
    fn filter(&mut self, name: &str, data: &str) -> Result<String>;
}

/// Evaluator for a single configuration value
pub struct StringInterpolator<'a> {
    input: &'a str,
    default_section: &'a str,
    max_depth: usize,
}

/// Evaluation state: one accumulator per open region
struct State<'a> {
    input: &'a str,
    stack: Vec<String>,
    in_literal: bool,
    max_depth: usize,
}

impl<'a> State<'a> {
    fn top(&mut self) -> &mut String {
        // The base accumulator is never popped while tokens remain.
        let last = self.stack.len() - 1;
        &mut self.stack[last]
    }

    fn open(&mut self) -> Result<()> {
        if self.stack.len() > self.max_depth {
            return Err(Error::recursion_limit(self.max_depth));
        }
        self.stack.push(String::new());
        Ok(())
    }

    fn close(&mut self, pos: usize, what: &str) -> Result<String> {
        if self.stack.len() <= 1 {
            return Err(Error::unbalanced(format!(
                "Unbalanced {}: Can not expand '{}'",
                what,
                &self.input[..pos]
            )));
        }
        Ok(self.stack.pop().unwrap_or_default())
    }
}

impl<'a> StringInterpolator<'a> {
    /// Create an evaluator; unqualified references resolve in `default_section`
    pub fn new(input: &'a str, default_section: &'a str) -> Self {
        Self {
            input,
            default_section,
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }

    /// Set the maximum nesting depth of regions
    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    /// Evaluate the input, resolving references and filters through `expander`
    pub fn evaluate(&self, expander: &mut dyn Expander) -> Result<String> {
        let mut state = State {
            input: self.input,
            stack: vec![String::new()],
            in_literal: false,
            max_depth: self.max_depth,
        };

        let chars: Vec<(usize, char)> = self.input.char_indices().collect();
        let mut i = 0;

        while i < chars.len() {
            let (pos, c) = chars[i];
            let next = chars.get(i + 1).map(|(_, c)| *c);

            if state.in_literal {
                match (c, next) {
                    ('\\', Some('}')) => {
                        state.top().push('}');
                        i += 2;
                    }
                    ('\\', Some(other)) => {
                        state.top().push('\\');
                        state.top().push(other);
                        i += 2;
                    }
                    ('}', _) => {
                        let arg = state.close(pos, "literal sequence")?;
                        state.top().push_str(&arg);
                        state.in_literal = false;
                        i += 1;
                    }
                    _ => {
                        state.top().push(c);
                        i += 1;
                    }
                }
                continue;
            }

            match (c, next) {
                ('\\', Some(escaped)) => {
                    state.top().push(match escaped {
                        'n' => '\n',
                        't' => '\t',
                        'r' => '\r',
                        other => other,
                    });
                    i += 2;
                }
                ('%', Some('{')) => {
                    state.open()?;
                    state.in_literal = true;
                    i += 2;
                }
                ('%', Some('(')) => {
                    state.open()?;
                    i += 2;
                }
                ('|', _) => match filter_suffix(&chars, i + 1) {
                    Some((names, end)) => {
                        let mut arg = state.close(pos, "parenthesis")?;
                        for name in names.split(',').filter(|n| !n.is_empty()) {
                            arg = expander.filter(name, &arg)?;
                        }
                        state.top().push_str(&arg);
                        i = end;
                    }
                    None => {
                        state.top().push('|');
                        i += 1;
                    }
                },
                ('}', _) => {
                    return Err(Error::unbalanced(format!(
                        "Unbalanced literal sequence: Can not expand '{}'",
                        &self.input[..pos]
                    )));
                }
                (')', _) => {
                    let mut name = state.close(pos, "parenthesis")?;
                    if !name.contains('.') {
                        name = format!("{}.{}", self.default_section, name);
                    }
                    let value = expander.reference(&name)?;
                    state.top().push_str(&value);
                    i += 1;
                }
                _ => {
                    state.top().push(c);
                    i += 1;
                }
            }
        }

        if state.stack.len() != 1 {
            return Err(Error::unbalanced("Nested expression not balanced"));
        }
        Ok(state.stack.pop().unwrap_or_default())
    }
}

/// Match `name1,name2)` starting at `start`; returns the names and the index after `)`
fn filter_suffix(chars: &[(usize, char)], start: usize) -> Option<(String, usize)> {
    let mut names = String::new();
    let mut i = start;
    while let Some((_, c)) = chars.get(i) {
        match c {
            ')' if !names.is_empty() => return Some((names, i + 1)),
            c if c.is_ascii_alphanumeric() || *c == '_' || *c == ',' => {
                names.push(*c);
                i += 1;
            }
            _ => return None,
        }
    }
    None
}

/// Escape every character with a meaning in the expression language
///
/// Evaluating the result yields `input` unchanged.
pub fn escape_string(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        if matches!(c, '\\' | '%' | '(' | ')' | '{' | '}') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}
