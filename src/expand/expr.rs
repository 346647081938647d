//! Floating point expression evaluator for `#expr` and `#ifexpr`.
//!
//! Expressions are evaluated directly on the source text by recursive
//! splitting. At each precedence level, the operators outside of parentheses
//! split the text into operands, which are folded from the left so binary
//! operators stay left-associative. Operands at the highest level are unary
//! operators, functions, constants, numbers, or parenthesised groups.

use std::f64::consts::{E, PI};

/// An expression evaluation error.
#[derive(Clone, Debug, PartialEq, thiserror::Error)]
pub enum Error {
    /// Someone tried to divide by zero.
    #[error("Division by zero.")]
    DivisionByZero,
    /// An operator appeared where an operand was expected.
    #[error("Unexpected {0} operator.")]
    UnexpectedOperator(&'static str),
    /// A required operand was missing.
    #[error("Missing operand for {0}.")]
    MissingOperand(&'static str),
    /// A word that is not an operator, function, or constant.
    #[error("Unrecognized word \"{0}\".")]
    UnrecognizedWord(String),
    /// Text that could not be read as a number.
    #[error("Invalid number \"{0}\".")]
    InvalidNumber(String),
    /// An opening bracket without a closing bracket.
    #[error("Unclosed bracket.")]
    UnclosedBracket,
    /// A closing bracket without an opening bracket.
    #[error("Unexpected closing bracket.")]
    UnexpectedCloseBracket,
    /// A function was called outside of its domain.
    #[error("Invalid argument for {0}.")]
    InvalidArgument(&'static str),
    /// The result of an operation was not a number.
    #[error("The result of {0} is not a number.")]
    NotANumber(&'static str),
    /// Brackets or unary operators were nested too deeply.
    #[error("Stack exhausted.")]
    StackExhausted,
}

/// The result type for expression evaluation.
pub type Result<T = f64, E = Error> = core::result::Result<T, E>;

/// A binary operator.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
enum Op {
    Or,
    And,
    Equal,
    NotEqual,
    Less,
    Greater,
    LessEqual,
    GreaterEqual,
    Round,
    Plus,
    Minus,
    Times,
    Divide,
    Mod,
    FMod,
    Pow,
}

impl Op {
    /// The display name of the operator, for error messages.
    fn name(self) -> &'static str {
        match self {
            Op::Or => "or",
            Op::And => "and",
            Op::Equal => "=",
            Op::NotEqual => "<>",
            Op::Less => "<",
            Op::Greater => ">",
            Op::LessEqual => "<=",
            Op::GreaterEqual => ">=",
            Op::Round => "round",
            Op::Plus => "+",
            Op::Minus => "-",
            Op::Times => "*",
            Op::Divide => "/",
            Op::Mod => "mod",
            Op::FMod => "fmod",
            Op::Pow => "^",
        }
    }

    #[allow(clippy::cast_possible_truncation, clippy::float_cmp)]
    fn apply(self, left: f64, right: f64) -> Result {
        Ok(match self {
            Op::Or => f64::from(left != 0.0 || right != 0.0),
            Op::And => f64::from(left != 0.0 && right != 0.0),
            Op::Equal => f64::from(left == right),
            Op::NotEqual => f64::from(left != right),
            Op::Less => f64::from(left < right),
            Op::Greater => f64::from(left > right),
            Op::LessEqual => f64::from(left <= right),
            Op::GreaterEqual => f64::from(left >= right),
            Op::Round => {
                let factor = 10_f64.powi(right.trunc() as i32);
                let rounded = (left * factor).round() / factor;
                if rounded.is_finite() { rounded } else { left }
            }
            Op::Plus => left + right,
            Op::Minus => left - right,
            Op::Times => left * right,
            Op::Divide => {
                if right == 0.0 {
                    return Err(Error::DivisionByZero);
                }
                left / right
            }
            Op::Mod => {
                let (left, right) = (left.trunc(), right.trunc());
                if right == 0.0 {
                    return Err(Error::DivisionByZero);
                }
                left % right
            }
            Op::FMod => {
                if right == 0.0 {
                    return Err(Error::DivisionByZero);
                }
                left % right
            }
            Op::Pow => {
                let result = left.powf(right);
                if result.is_nan() {
                    return Err(Error::NotANumber(self.name()));
                }
                result
            }
        })
    }
}

/// Binary operators by precedence level, lowest first. Within a level,
/// longer spellings come before their prefixes.
static LEVELS: &[&[(&str, Op)]] = &[
    &[("or", Op::Or)],
    &[("and", Op::And)],
    &[
        ("<=", Op::LessEqual),
        (">=", Op::GreaterEqual),
        ("<>", Op::NotEqual),
        ("!=", Op::NotEqual),
        ("=", Op::Equal),
        ("<", Op::Less),
        (">", Op::Greater),
    ],
    &[("round", Op::Round)],
    &[("+", Op::Plus), ("-", Op::Minus)],
    &[
        ("*", Op::Times),
        ("/", Op::Divide),
        ("div", Op::Divide),
        ("fmod", Op::FMod),
        ("mod", Op::Mod),
    ],
    &[("^", Op::Pow)],
];

/// The maximum nesting depth of brackets and unary operators.
const MAX_DEPTH: usize = 100;

/// Unary functions.
static FUNCTIONS: &[&str] = &[
    "not", "abs", "ceil", "floor", "trunc", "ln", "exp", "sqrt", "sin", "cos", "tan",
];

/// Evaluates a mathematical expression. Returns `None` if the expression is
/// empty.
pub fn evaluate(expr: &str) -> Result<Option<f64>> {
    let expr = expr
        .replace("&minus;", "-")
        .replace('\u{2212}', "-")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .to_ascii_lowercase();

    if expr.trim().is_empty() {
        return Ok(None);
    }

    check_brackets(&expr)?;
    split(&expr, 0, 0).map(Some)
}

/// Formats an expression result. Values within epsilon of an integer are
/// written without a fractional part.
#[allow(clippy::float_cmp)]
pub fn format_result(value: f64) -> String {
    if value.is_nan() {
        "NAN".into()
    } else if value.is_infinite() {
        if value < 0.0 { "-INF" } else { "INF" }.into()
    } else if (value - value.round()).abs() < f64::EPSILON {
        let value = value.round();
        if value == 0.0 {
            "0".into()
        } else {
            format!("{value:.0}")
        }
    } else {
        format!("{value}")
    }
}

/// Rejects unbalanced brackets up front so that operand parsing can assume
/// every group is closed.
fn check_brackets(expr: &str) -> Result<()> {
    let mut depth = 0_usize;
    for c in expr.chars() {
        match c {
            '(' => depth += 1,
            ')' => depth = depth.checked_sub(1).ok_or(Error::UnexpectedCloseBracket)?,
            _ => {}
        }
    }
    if depth == 0 {
        Ok(())
    } else {
        Err(Error::UnclosedBracket)
    }
}

/// Evaluates `expr` starting at precedence level `level`. Operators on the
/// same level are folded from left to right.
fn split(expr: &str, level: usize, depth: usize) -> Result {
    if depth > MAX_DEPTH {
        return Err(Error::StackExhausted);
    }

    let Some(operators) = LEVELS.get(level) else {
        return unary(expr, depth);
    };

    let found = find_operators(expr, operators);
    let Some(&(first, _, op)) = found.first() else {
        return split(expr, level + 1, depth);
    };

    let left = &expr[..first];
    if left.trim().is_empty() {
        return Err(Error::UnexpectedOperator(op.name()));
    }

    let mut value = split(left, level + 1, depth)?;
    for (index, &(_, end, op)) in found.iter().enumerate() {
        let next = found.get(index + 1).map_or(expr.len(), |&(start, ..)| start);
        let right = &expr[end..next];
        if right.trim().is_empty() {
            return Err(Error::MissingOperand(op.name()));
        }
        value = op.apply(value, split(right, level + 1, depth)?)?;
    }
    Ok(value)
}

/// Finds every binary operator from `operators` outside of brackets, in
/// order.
fn find_operators(expr: &str, operators: &[(&str, Op)]) -> Vec<(usize, usize, Op)> {
    let bytes = expr.as_bytes();
    let mut depth = 0_usize;
    let mut found = Vec::new();
    let mut index = 0;
    while index < bytes.len() {
        match bytes[index] {
            b'(' => depth += 1,
            b')' => depth = depth.saturating_sub(1),
            c if depth == 0 && c.is_ascii() => {
                if let Some(&(spelling, op)) = operators
                    .iter()
                    .find(|(spelling, _)| matches_at(expr, index, spelling))
                {
                    let end = index + spelling.len();
                    if !is_sign(expr, index, op) {
                        found.push((index, end, op));
                    }
                    index = end;
                    continue;
                }
                // Skip the rest of a word so that e.g. `mod` is never found
                // inside `fmod`.
                if c.is_ascii_alphabetic() {
                    while index < bytes.len() && bytes[index].is_ascii_alphabetic() {
                        index += 1;
                    }
                    continue;
                }
            }
            _ => {}
        }
        index += 1;
    }
    found
}

/// Returns true if `spelling` appears at `index`. Word operators must be
/// whole words.
fn matches_at(expr: &str, index: usize, spelling: &str) -> bool {
    if !expr[index..].starts_with(spelling) {
        return false;
    }
    if !spelling.as_bytes()[0].is_ascii_alphabetic() {
        return true;
    }
    let bytes = expr.as_bytes();
    let end = index + spelling.len();
    (index == 0 || !bytes[index - 1].is_ascii_alphabetic())
        && bytes.get(end).is_none_or(|c| !c.is_ascii_alphabetic())
}

/// Returns true if the `+` or `-` at `index` is a unary sign rather than a
/// binary operator: it follows nothing, another operator, an opening bracket,
/// or the `e` of a number in exponent notation.
fn is_sign(expr: &str, index: usize, op: Op) -> bool {
    if !matches!(op, Op::Plus | Op::Minus) {
        return false;
    }

    let before = &expr[..index];
    if before.ends_with('e')
        && before[..before.len() - 1]
            .chars()
            .next_back()
            .is_some_and(|c| c.is_ascii_digit() || c == '.')
    {
        return true;
    }

    let before = before.trim_end();
    let Some(last) = before.chars().next_back() else {
        return true;
    };
    if "+-*/^=<>!(".contains(last) {
        return true;
    }

    let word_start = before
        .rfind(|c: char| !c.is_ascii_alphabetic())
        .map_or(0, |index| index + 1);
    let word = &before[word_start..];
    !word.is_empty()
        && (FUNCTIONS.contains(&word)
            || LEVELS
                .iter()
                .flat_map(|level| level.iter())
                .any(|(spelling, _)| *spelling == word))
}

/// Evaluates unary operators, functions, and atoms.
fn unary(expr: &str, depth: usize) -> Result {
    let expr = expr.trim();
    if let Some(rest) = expr.strip_prefix('-') {
        return Ok(-operand(rest, "-", depth)?);
    } else if let Some(rest) = expr.strip_prefix('+') {
        return operand(rest, "+", depth);
    }

    let word_end = expr
        .find(|c: char| !c.is_ascii_alphabetic())
        .unwrap_or(expr.len());
    if let Some(&function) = FUNCTIONS.iter().find(|name| **name == &expr[..word_end]) {
        let value = operand(&expr[word_end..], function, depth)?;
        return match function {
            "not" => Ok(f64::from(value == 0.0)),
            "abs" => Ok(value.abs()),
            "ceil" => Ok(value.ceil()),
            "floor" => Ok(value.floor()),
            "trunc" => Ok(value.trunc()),
            "ln" if value <= 0.0 => Err(Error::InvalidArgument(function)),
            "ln" => Ok(value.ln()),
            "exp" => Ok(value.exp()),
            "sqrt" if value < 0.0 => Err(Error::NotANumber(function)),
            "sqrt" => Ok(value.sqrt()),
            "sin" => Ok(value.sin()),
            "cos" => Ok(value.cos()),
            "tan" => Ok(value.tan()),
            _ => unreachable!("unhandled function {function}"),
        };
    }

    atom(expr, depth)
}

/// Evaluates the operand of a unary operator or function.
fn operand(expr: &str, op: &'static str, depth: usize) -> Result {
    if expr.trim().is_empty() {
        Err(Error::MissingOperand(op))
    } else if depth >= MAX_DEPTH {
        Err(Error::StackExhausted)
    } else {
        unary(expr, depth + 1)
    }
}

/// Evaluates a number, constant, or bracketed group.
fn atom(expr: &str, depth: usize) -> Result {
    if let Some(inner) = expr.strip_prefix('(').and_then(|rest| rest.strip_suffix(')'))
        && encloses(expr)
    {
        return if inner.trim().is_empty() {
            Err(Error::MissingOperand("()"))
        } else {
            split(inner, 0, depth + 1)
        };
    }

    match expr {
        "e" => Ok(E),
        "pi" => Ok(PI),
        "" => Err(Error::MissingOperand("()")),
        _ if expr.starts_with(|c: char| c.is_ascii_digit() || c == '.') => expr
            .parse::<f64>()
            .map_err(|_| Error::InvalidNumber(expr.to_string())),
        _ if expr.starts_with(|c: char| c.is_ascii_alphabetic()) => {
            let end = expr
                .find(|c: char| !c.is_ascii_alphabetic())
                .unwrap_or(expr.len());
            Err(Error::UnrecognizedWord(expr[..end].to_string()))
        }
        _ => Err(Error::InvalidNumber(expr.to_string())),
    }
}

/// Returns true if the opening bracket at the start of `expr` is closed by
/// the bracket at its end.
fn encloses(expr: &str) -> bool {
    let mut depth = 0_usize;
    for (index, c) in expr.char_indices() {
        match c {
            '(' => depth += 1,
            ')' => {
                depth -= 1;
                if depth == 0 {
                    return index + 1 == expr.len();
                }
            }
            _ => {}
        }
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;

    fn eval(expr: &str) -> String {
        match evaluate(expr) {
            Ok(Some(value)) => format_result(value),
            Ok(None) => String::new(),
            Err(err) => format!("error: {err}"),
        }
    }

    #[test]
    fn arithmetic() {
        assert_eq!(eval("2 + 3 * 4"), "14");
        assert_eq!(eval("(2+3)*4"), "20");
        assert_eq!(eval("1-2-3"), "-4", "subtraction is left-associative");
        assert_eq!(eval("12 / 4 / 3"), "1", "division is left-associative");
        assert_eq!(eval("7 div 2"), "3.5");
        assert_eq!(eval("2^10"), "1024");
        assert_eq!(eval("((1))"), "1");
        assert_eq!(eval("(1/3) * 3"), "1");
        assert_eq!(eval("3 / (- 0.2 )"), "-15");
        assert_eq!(eval("0.1 + 0.2"), "0.30000000000000004");
        assert_eq!(eval(""), "");
    }

    #[test]
    fn signs() {
        assert_eq!(eval("-1 + 1"), "0");
        assert_eq!(eval("+1 + 1"), "2");
        assert_eq!(eval("2 * -3"), "-6");
        assert_eq!(eval("2 - -3"), "5");
        assert_eq!(eval("-(2 + 3)"), "-5");
        assert_eq!(eval("1e4"), "10000");
        assert_eq!(eval("1e-2 * 100"), "1");
        assert_eq!(eval("5 &minus; 3"), "2");
        assert_eq!(eval("5 \u{2212} 3"), "2");
    }

    #[test]
    fn modulo() {
        assert_eq!(eval("7 mod 3"), "1");
        assert_eq!(eval("-7 mod 3"), "-1");
        assert_eq!(eval("5.7 mod 1.3"), "0");
        assert_eq!(eval("5.5 fmod 2"), "1.5");
        assert_eq!(eval("5 fmod 3 + 1"), "3");
    }

    #[test]
    fn comparisons_and_logic() {
        assert_eq!(eval("4 < 5"), "1");
        assert_eq!(eval("-2 <= -2"), "1");
        assert_eq!(eval("4 > -3"), "1");
        assert_eq!(eval("1 != 2"), "1");
        assert_eq!(eval("1 <> 1"), "0");
        assert_eq!(eval("-4 * -4 = 4 * 4"), "1");
        assert_eq!(eval("1 or 0"), "1");
        assert_eq!(eval("1 and 0"), "0");
        assert_eq!(eval("not (1 and 0)"), "1");
        assert_eq!(eval("not 0 and 1"), "1");
        assert_eq!(eval("1 + 1 = 2 and 3 > 2"), "1");
    }

    #[test]
    fn rounding_and_functions() {
        assert_eq!(eval("4.5 round 0"), "5");
        assert_eq!(eval("-4.5 round 0"), "-5");
        assert_eq!(eval("3.14159 round 2"), "3.14");
        assert_eq!(eval("1234 round -2"), "1200");
        assert_eq!(eval("1 + 2.26 round 1"), "3.3", "round binds looser than +");
        assert_eq!(eval("abs(-2)"), "2");
        assert_eq!(eval("abs -2 + 1"), "3");
        assert_eq!(eval("ceil 4.2"), "5");
        assert_eq!(eval("floor -4.5"), "-5");
        assert_eq!(eval("trunc(-4.5)"), "-4");
        assert_eq!(eval("sqrt(16)"), "4");
        assert_eq!(eval("ln(exp(1))"), "1");
        assert_eq!(eval("cos(0)"), "1");
        assert_eq!(eval("sin 0"), "0");
        assert_eq!(eval("pi"), "3.141592653589793");
        assert_eq!(eval("e"), "2.718281828459045");
    }

    #[test]
    fn errors() {
        assert_eq!(evaluate("1/0"), Err(Error::DivisionByZero));
        assert_eq!(evaluate("1 mod 0"), Err(Error::DivisionByZero));
        assert_eq!(evaluate("(1 + 2"), Err(Error::UnclosedBracket));
        assert_eq!(evaluate("1 + 2)"), Err(Error::UnexpectedCloseBracket));
        assert_eq!(evaluate("1 +"), Err(Error::MissingOperand("+")));
        assert_eq!(evaluate("* 2"), Err(Error::UnexpectedOperator("*")));
        assert_eq!(evaluate("foo"), Err(Error::UnrecognizedWord("foo".into())));
        assert_eq!(evaluate("1 , 2"), Err(Error::InvalidNumber("1 , 2".into())));
        assert_eq!(evaluate("ln 0"), Err(Error::InvalidArgument("ln")));
        assert_eq!(evaluate("sqrt -1"), Err(Error::NotANumber("sqrt")));
        assert_eq!(evaluate("()"), Err(Error::MissingOperand("()")));
        assert_eq!(evaluate("2 * * 3"), Err(Error::MissingOperand("*")));
    }

    #[test]
    fn nesting_limit() {
        let nested = |depth: usize| format!("{}1{}", "(".repeat(depth), ")".repeat(depth));
        assert_eq!(evaluate(&nested(MAX_DEPTH)), Ok(Some(1.0)));
        assert_eq!(evaluate(&nested(10_000)), Err(Error::StackExhausted));
        assert_eq!(
            evaluate(&format!("{}1", "-".repeat(10_000))),
            Err(Error::StackExhausted),
            "unary operators"
        );
        assert_eq!(
            evaluate(&format!("{}1", "not ".repeat(10_000))),
            Err(Error::StackExhausted),
            "functions"
        );
        assert_eq!(
            eval(&["1"; 10_000].join(" + ")),
            "10000",
            "long operator chains are not nested"
        );
    }

    #[test]
    fn formatting() {
        assert_eq!(format_result(-0.0), "0");
        assert_eq!(format_result(2.5), "2.5");
        assert_eq!(format_result(1e20), "100000000000000000000");
        assert_eq!(format_result(f64::INFINITY), "INF");
        assert_eq!(format_result(f64::NAN), "NAN");
    }
}
