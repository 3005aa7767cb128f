use std::fmt;

use serde::Serializer;
use serde_derive::Serialize;

/// Characters stripped from both ends of a raw token before it is classified.
///
/// The colon matters for `key:` style fields as found in `/proc/meminfo` or `/proc/net/dev`.
pub const STRIP_CHARS: &[char] = &[':', ' ', '\t', '\r', '\n'];

/// A typed scalar, the value type shared by records, expressions and namespaces.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Value {
    #[serde(serialize_with = "serialize_number")]
    Number(f64),
    Text(String),
}

impl Value {
    /// Short name of the variant, used in error messages.
    pub fn kind(&self) -> &'static str {
        match self {
            Value::Number(_) => "number",
            Value::Text(_) => "string",
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            Value::Text(_) => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Value::Number(_) => None,
            Value::Text(s) => Some(s),
        }
    }
}

/// The canonical string form, used when a value is bound into a namespace segment.
///
/// Numbers use the shortest representation that round-trips, switching to exponent notation
/// (`1e+21`, `1.5e-05`) below `1e-4` or from `1e21` on.  The infinities print as `+Inf`/`-Inf`.
impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Number(n) => fmt_number(*n, f),
            Value::Text(s) => f.write_str(s),
        }
    }
}

fn fmt_number(n: f64, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    if n.is_nan() {
        return f.write_str("NaN");
    }
    if n.is_infinite() {
        return f.write_str(if n > 0. { "+Inf" } else { "-Inf" });
    }

    let magnitude = n.abs();
    if magnitude == 0. || (1e-4..1e21).contains(&magnitude) {
        return write!(f, "{}", n);
    }

    // `{:e}` gives e.g. `1.5e-5`, the exponent wants a sign and at least two digits
    let formatted = format!("{:e}", n);
    match formatted.split_once('e') {
        Some((mantissa, exponent)) => match exponent.parse::<i32>() {
            Ok(exp) => write!(
                f,
                "{}e{}{:02}",
                mantissa,
                if exp < 0 { '-' } else { '+' },
                exp.abs()
            ),
            Err(_) => f.write_str(&formatted),
        },
        None => f.write_str(&formatted),
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Text(s)
    }
}

// JSON has no representation for NaN or the infinities
fn serialize_number<S: Serializer>(n: &f64, serializer: S) -> Result<S::Ok, S::Error> {
    if n.is_finite() {
        serializer.serialize_f64(*n)
    } else {
        serializer.collect_str(&Value::Number(*n))
    }
}

/// Classifies a raw token as a number or a string.
///
/// The token is trimmed of [`STRIP_CHARS`] and then parsed as an `f64`, which accepts a leading
/// sign, exponent notation and `NaN`.  Anything that doesn't parse is returned as the trimmed
/// string, internal whitespace and all.
pub fn parse_value(token: &str) -> Value {
    let trimmed = token.trim_matches(STRIP_CHARS);
    match trimmed.parse::<f64>() {
        Ok(n) => Value::Number(n),
        Err(_) => Value::Text(trimmed.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numbers() {
        assert_eq!(parse_value("42"), Value::Number(42.));
        assert_eq!(parse_value("42.0"), Value::Number(42.));
        assert_eq!(parse_value("4.2e1"), Value::Number(42.));
        assert_eq!(parse_value("420e-1"), Value::Number(42.));
        assert_eq!(parse_value("-7"), Value::Number(-7.));
        assert_eq!(parse_value("42 \n"), Value::Number(42.));
        assert_eq!(parse_value("     \t42 \n"), Value::Number(42.));
        assert_eq!(parse_value("eth0:"), Value::Text("eth0".into()));
        assert_eq!(parse_value(":12:"), Value::Number(12.));

        match parse_value("NaN") {
            Value::Number(n) => assert!(n.is_nan()),
            other => panic!("expected NaN, got {:?}", other),
        }
    }

    #[test]
    fn strings_keep_inner_whitespace() {
        assert_eq!(parse_value("1 2 3\n"), Value::Text("1 2 3".into()));
        assert_eq!(parse_value("foo bar\n"), Value::Text("foo bar".into()));
        assert_eq!(parse_value("1/461"), Value::Text("1/461".into()));
        assert_eq!(parse_value(""), Value::Text("".into()));
    }

    #[test]
    fn canonical_form() {
        assert_eq!(Value::Number(42.).to_string(), "42");
        assert_eq!(Value::Number(0.25).to_string(), "0.25");
        assert_eq!(Value::Text("cpu0".into()).to_string(), "cpu0");
        assert_eq!(Value::Number(-0.5).to_string(), "-0.5");
        assert_eq!(Value::Number(0.0001).to_string(), "0.0001");
        assert_eq!(Value::Number(1e20).to_string(), "100000000000000000000");
    }

    #[test]
    fn canonical_form_exponents() {
        assert_eq!(Value::Number(1e21).to_string(), "1e+21");
        assert_eq!(Value::Number(1.5e-5).to_string(), "1.5e-05");
        assert_eq!(Value::Number(-2.5e300).to_string(), "-2.5e+300");
        assert_eq!(Value::Number(f64::INFINITY).to_string(), "+Inf");
        assert_eq!(Value::Number(f64::NEG_INFINITY).to_string(), "-Inf");
        assert_eq!(Value::Number(f64::NAN).to_string(), "NaN");
    }

    #[test]
    fn json() {
        let json = serde_json::to_string(&vec![
            Value::Number(1.5),
            Value::Text("a".into()),
            Value::Number(f64::INFINITY),
        ])
        .expect("serializable");
        assert_eq!(json, r#"[1.5,"a","+Inf"]"#);
    }
}
