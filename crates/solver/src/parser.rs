//! Parsing of solver stdout: the verdict line, then the model printed by
//! `(get-value ...)` or `(get-model)`.

use std::fmt;

use crate::error::SolverError;
use crate::model::Model;
use crate::result::SolverResult;

/// A parsed S-expression. Quoted symbols `|..|` come back as plain atoms.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum SExp {
    Atom(String),
    List(Vec<SExp>),
}

impl SExp {
    pub(crate) fn atom(&self) -> Option<&str> {
        match self {
            SExp::Atom(a) => Some(a),
            SExp::List(_) => None,
        }
    }
}

impl fmt::Display for SExp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SExp::Atom(a) => write!(f, "{a}"),
            SExp::List(items) => {
                write!(f, "(")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, " ")?;
                    }
                    write!(f, "{item}")?;
                }
                write!(f, ")")
            }
        }
    }
}

#[derive(Debug, PartialEq)]
enum Token {
    Open,
    Close,
    Atom(String),
}

fn tokenize(input: &str) -> Result<Vec<Token>, SolverError> {
    let mut tokens = Vec::new();
    let mut chars = input.chars().peekable();

    while let Some(&c) = chars.peek() {
        match c {
            '(' => {
                chars.next();
                tokens.push(Token::Open);
            }
            ')' => {
                chars.next();
                tokens.push(Token::Close);
            }
            ';' => {
                for c in chars.by_ref() {
                    if c == '\n' {
                        break;
                    }
                }
            }
            '|' => {
                chars.next();
                let mut symbol = String::new();
                loop {
                    match chars.next() {
                        Some('|') => break,
                        Some(c) => symbol.push(c),
                        None => {
                            return Err(SolverError::ParseError(format!(
                                "unterminated quoted symbol |{symbol}"
                            )));
                        }
                    }
                }
                tokens.push(Token::Atom(symbol));
            }
            '"' => {
                chars.next();
                let mut text = String::from('"');
                loop {
                    match chars.next() {
                        // `""` is an escaped quote inside an SMT-LIB string
                        Some('"') if chars.peek() == Some(&'"') => {
                            chars.next();
                            text.push('"');
                        }
                        Some('"') => break,
                        Some(c) => text.push(c),
                        None => {
                            return Err(SolverError::ParseError(format!(
                                "unterminated string {text}"
                            )));
                        }
                    }
                }
                text.push('"');
                tokens.push(Token::Atom(text));
            }
            c if c.is_whitespace() => {
                chars.next();
            }
            _ => {
                let mut atom = String::new();
                while let Some(&c) = chars.peek() {
                    if c.is_whitespace() || matches!(c, '(' | ')' | '|' | '"' | ';') {
                        break;
                    }
                    atom.push(c);
                    chars.next();
                }
                tokens.push(Token::Atom(atom));
            }
        }
    }

    Ok(tokens)
}

/// Parse every top-level S-expression in `input`.
pub(crate) fn parse_sexps(input: &str) -> Result<Vec<SExp>, SolverError> {
    let mut stack: Vec<Vec<SExp>> = vec![Vec::new()];

    for token in tokenize(input)? {
        match token {
            Token::Open => stack.push(Vec::new()),
            Token::Close => {
                let list = stack
                    .pop()
                    .filter(|_| !stack.is_empty())
                    .ok_or_else(|| SolverError::ParseError("unbalanced ')'".to_string()))?;
                if let Some(parent) = stack.last_mut() {
                    parent.push(SExp::List(list));
                }
            }
            Token::Atom(atom) => {
                if let Some(current) = stack.last_mut() {
                    current.push(SExp::Atom(atom));
                }
            }
        }
    }

    if stack.len() != 1 {
        return Err(SolverError::ParseError("unbalanced '('".to_string()));
    }
    Ok(stack.pop().unwrap_or_default())
}

/// Parse exactly one S-expression.
pub(crate) fn parse_sexp(input: &str) -> Result<SExp, SolverError> {
    let mut all = parse_sexps(input)?;
    if all.len() != 1 {
        return Err(SolverError::ParseError(format!(
            "expected one expression, found {}: {input}",
            all.len()
        )));
    }
    Ok(all.remove(0))
}

/// Parse solver stdout into a `SolverResult`.
///
/// Lines before the verdict may carry `success` acknowledgements or
/// warnings; an `(error ...)` line there means the script was rejected.
pub fn parse_solver_output(stdout: &str, stderr: &str) -> Result<SolverResult, SolverError> {
    let mut lines = stdout.lines();
    let mut verdict = None;

    for line in lines.by_ref() {
        let line = line.trim();
        match line {
            "sat" | "unsat" | "unknown" | "timeout" => {
                verdict = Some(line);
                break;
            }
            _ if line.starts_with("(error") => {
                return Err(SolverError::ProcessError(line.to_string()));
            }
            _ => {}
        }
    }

    let rest: Vec<&str> = lines.collect();
    let rest = rest.join("\n");

    match verdict {
        Some("unsat") => Ok(SolverResult::Unsat),
        Some("sat") => Ok(SolverResult::Sat(parse_model(&rest)?)),
        Some("unknown") => Ok(SolverResult::Unknown(extract_unknown_reason(stderr))),
        Some(_) => Ok(SolverResult::Unknown("timeout".to_string())),
        None if stderr.contains("timeout") => Ok(SolverResult::Unknown("timeout".to_string())),
        None => Err(SolverError::ParseError(format!(
            "no verdict in solver output. stdout: {} stderr: {}",
            stdout.trim(),
            stderr.trim()
        ))),
    }
}

fn extract_unknown_reason(stderr: &str) -> String {
    let stderr = stderr.trim();
    if stderr.contains("timeout") {
        "timeout".to_string()
    } else if stderr.is_empty() {
        "unknown".to_string()
    } else {
        stderr.to_string()
    }
}

/// Collect `(name value)` pairs from the model section.
///
/// Accepts `(get-value ...)` output, `((name value) ...)`, and both
/// `(get-model)` layouts: `((define-fun x () Real 1.0) ...)` and the older
/// `(model (define-fun ...) ...)`. Unrelated expressions are skipped.
fn parse_model(text: &str) -> Result<Option<Model>, SolverError> {
    if text.trim().is_empty() {
        return Ok(None);
    }

    let mut assignments = Vec::new();
    for sexp in parse_sexps(text)? {
        let SExp::List(items) = sexp else { continue };
        let entries = match items.first() {
            Some(SExp::Atom(head)) if head == "model" => &items[1..],
            Some(SExp::Atom(_)) => continue,
            _ => &items[..],
        };
        for entry in entries {
            if let Some(pair) = assignment(entry) {
                assignments.push(pair);
            }
        }
    }

    if assignments.is_empty() {
        Ok(None)
    } else {
        Ok(Some(Model::with_assignments(assignments)))
    }
}

fn assignment(entry: &SExp) -> Option<(String, String)> {
    let SExp::List(items) = entry else {
        return None;
    };
    match items.as_slice() {
        [SExp::Atom(name), value] => Some((name.clone(), value.to_string())),
        // (define-fun name () Sort value)
        [SExp::Atom(define), SExp::Atom(name), SExp::List(params), _sort, value]
            if define == "define-fun" && params.is_empty() =>
        {
            Some((name.clone(), value.to_string()))
        }
        _ => None,
    }
}
