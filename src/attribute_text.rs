//! Parser for the `Prefix({'name': value, ...})` text produced by
//! [`render_args`](crate::render_args).
//!
//! The format is flat: pairs are split on `", "`, so values that themselves contain `", "` are
//! not recovered intact. Sequences rendered by this crate never do.

use std::{collections::BTreeMap, fmt};

use alloy::primitives::U256;

/// Argument name to inferred value.
pub type ArgsMap = BTreeMap<String, ArgValue>;

#[derive(Debug, Clone, PartialEq)]
pub enum ArgValue {
    Text(String),
    Integer(U256),
    Bool(bool),
    Float(f64),
}

/// Renders values the way the argument dump spells them: `True`/`False`, and floats always with
/// a fractional part or an exponent (`-42.0`, `1e+80`).
impl fmt::Display for ArgValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArgValue::Text(s) => f.write_str(s),
            ArgValue::Integer(n) => write!(f, "{n}"),
            ArgValue::Bool(true) => f.write_str("True"),
            ArgValue::Bool(false) => f.write_str("False"),
            ArgValue::Float(x) => write_float(f, *x),
        }
    }
}

// Scientific notation outside [1e-4, 1e16), two-digit signed exponent.
fn write_float(f: &mut fmt::Formatter<'_>, x: f64) -> fmt::Result {
    if !x.is_finite() {
        return write!(f, "{x}");
    }

    let abs = x.abs();
    if abs != 0.0 && !(1e-4..1e16).contains(&abs) {
        let scientific = format!("{x:e}");
        let (mantissa, exponent) = scientific.split_once('e').unwrap_or((&scientific, "0"));
        let exponent: i32 = exponent.parse().unwrap_or_default();
        let sign = if exponent < 0 { '-' } else { '+' };
        write!(f, "{mantissa}e{sign}{:02}", exponent.unsigned_abs())
    } else if x.fract() == 0.0 {
        write!(f, "{x:.1}")
    } else {
        write!(f, "{x}")
    }
}

/// Parses `Prefix({key: value, ...})` into an [`ArgsMap`].
///
/// Values are typed by the first rule that applies:
/// 1. quoted with `'` or `"`: text without the quotes
/// 2. only ASCII digits: integer (text of more than 256 bits falls through)
/// 3. `true` / `false` in any case: boolean
/// 4. parses as a float: float
/// 5. anything else: the raw token as text
///
/// Text that does not have the `Prefix({...})` shape yields an empty map. Pairs without a `": "`
/// separator are skipped.
#[must_use]
pub fn parse_args_text(text: &str) -> ArgsMap {
    let Some(body) = inner_body(text) else {
        return ArgsMap::new();
    };

    body.split(", ")
        .filter_map(|pair| {
            let (key, value) = pair.split_once(": ")?;
            let key = unquote(key.trim()).unwrap_or_else(|| key.trim().to_owned());
            (!key.is_empty()).then(|| (key, infer(value.trim())))
        })
        .collect()
}

// Text between the first `({` preceded by a word character and the last `})`.
fn inner_body(text: &str) -> Option<&str> {
    let open = text.find("({")?;
    let has_prefix =
        text[..open].chars().next_back().is_some_and(|c| c.is_alphanumeric() || c == '_');
    let close = text.rfind("})")?;

    (has_prefix && close >= open + 2).then(|| &text[open + 2..close])
}

fn infer(token: &str) -> ArgValue {
    if let Some(text) = unquote(token) {
        return ArgValue::Text(text);
    }

    if !token.is_empty() && token.bytes().all(|b| b.is_ascii_digit()) {
        if let Ok(n) = token.parse::<U256>() {
            return ArgValue::Integer(n);
        }
    }

    if token.eq_ignore_ascii_case("true") {
        return ArgValue::Bool(true);
    }
    if token.eq_ignore_ascii_case("false") {
        return ArgValue::Bool(false);
    }

    match token.parse::<f64>() {
        Ok(x) => ArgValue::Float(x),
        Err(_) => ArgValue::Text(token.to_owned()),
    }
}

fn unquote(token: &str) -> Option<String> {
    let quote = token.chars().next().filter(|c| *c == '\'' || *c == '"')?;
    let inner = token.strip_prefix(quote)?.strip_suffix(quote)?;
    Some(inner.replace(&format!("\\{quote}"), &quote.to_string()))
}
