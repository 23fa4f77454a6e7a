use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::LibraryError;

/// Exact fraction, always stored with a positive denominator in lowest terms.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[serde(try_from = "RawRational")]
pub struct Rational {
    numer: i64,
    denom: i64,
}

/// Persisted form; normalized through [`Rational::new`] on the way in.
#[derive(Deserialize)]
struct RawRational {
    numer: i64,
    denom: i64,
}

impl TryFrom<RawRational> for Rational {
    type Error = LibraryError;

    fn try_from(raw: RawRational) -> Result<Self, Self::Error> {
        Rational::new(raw.numer, raw.denom)
    }
}

fn gcd(mut a: u128, mut b: u128) -> u128 {
    while b != 0 {
        let t = a % b;
        a = b;
        b = t;
    }
    a
}

impl Rational {
    pub fn new(numer: i64, denom: i64) -> Result<Self, LibraryError> {
        if denom == 0 {
            return Err(LibraryError::model("rational with zero denominator"));
        }
        let (mut numer, mut denom) = (i128::from(numer), i128::from(denom));
        if denom < 0 {
            numer = -numer;
            denom = -denom;
        }
        let divisor = gcd(numer.unsigned_abs(), denom.unsigned_abs()).max(1) as i128;
        let out_of_range = |_| LibraryError::model("rational is out of range");
        Ok(Self {
            numer: i64::try_from(numer / divisor).map_err(out_of_range)?,
            denom: i64::try_from(denom / divisor).map_err(out_of_range)?,
        })
    }

    pub fn from_integer(value: i64) -> Self {
        Self {
            numer: value,
            denom: 1,
        }
    }

    pub fn numer(&self) -> i64 {
        self.numer
    }

    pub fn denom(&self) -> i64 {
        self.denom
    }

    pub fn to_f64(&self) -> f64 {
        self.numer as f64 / self.denom as f64
    }
}

impl Default for Rational {
    fn default() -> Self {
        Self::from_integer(0)
    }
}

impl fmt::Display for Rational {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.denom == 1 {
            write!(f, "{}", self.numer)
        } else {
            write!(f, "{}/{}", self.numer, self.denom)
        }
    }
}

/// A symbolic token, e.g. an enumeration choice.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Symbol(pub String);

impl Symbol {
    pub fn new(name: &str) -> Self {
        Symbol(name.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ScalarKind {
    Integer,
    Rational,
    String,
    Symbol,
}

impl fmt::Display for ScalarKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ScalarKind::Integer => "integer",
            ScalarKind::Rational => "rational",
            ScalarKind::String => "string",
            ScalarKind::Symbol => "symbol",
        };
        write!(f, "{}", s)
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Scalar {
    Integer(i64),
    Rational(Rational),
    String(String),
    Symbol(Symbol),
}

impl Scalar {
    pub fn kind(&self) -> ScalarKind {
        match self {
            Scalar::Integer(_) => ScalarKind::Integer,
            Scalar::Rational(_) => ScalarKind::Rational,
            Scalar::String(_) => ScalarKind::String,
            Scalar::Symbol(_) => ScalarKind::Symbol,
        }
    }

    pub fn as_integer(&self) -> Option<i64> {
        match self {
            Scalar::Integer(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_rational(&self) -> Option<Rational> {
        match self {
            Scalar::Integer(i) => Some(Rational::from_integer(*i)),
            Scalar::Rational(r) => Some(*r),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Scalar::String(s) => Some(s),
            Scalar::Symbol(s) => Some(s.as_str()),
            _ => None,
        }
    }

    /// Converts `self` so it can be stored where a `kind` scalar lives.
    ///
    /// Only identity conversions and integer-to-rational widening succeed.
    pub fn coerce_to(&self, kind: ScalarKind) -> Result<Scalar, LibraryError> {
        match (self, kind) {
            (value, kind) if value.kind() == kind => Ok(value.clone()),
            (Scalar::Integer(i), ScalarKind::Rational) => {
                Ok(Scalar::Rational(Rational::from_integer(*i)))
            }
            (value, kind) => Err(LibraryError::model(format!(
                "cannot store a {} value in a {} leaf",
                value.kind(),
                kind
            ))),
        }
    }
}

impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scalar::Integer(i) => write!(f, "{}", i),
            Scalar::Rational(r) => write!(f, "{}", r),
            Scalar::String(s) => write!(f, "{:?}", s),
            Scalar::Symbol(s) => write!(f, "#{}", s.as_str()),
        }
    }
}

impl From<i64> for Scalar {
    fn from(value: i64) -> Self {
        Scalar::Integer(value)
    }
}

impl From<Rational> for Scalar {
    fn from(value: Rational) -> Self {
        Scalar::Rational(value)
    }
}

impl From<&str> for Scalar {
    fn from(value: &str) -> Self {
        Scalar::String(value.to_string())
    }
}

impl From<String> for Scalar {
    fn from(value: String) -> Self {
        Scalar::String(value)
    }
}

impl From<Symbol> for Scalar {
    fn from(value: Symbol) -> Self {
        Scalar::Symbol(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rational_normalizes() {
        let r = Rational::new(4, -6).unwrap();
        assert_eq!((r.numer(), r.denom()), (-2, 3));
        assert_eq!(Rational::new(0, 5).unwrap(), Rational::from_integer(0));
        assert!(Rational::new(1, 0).is_err());
        assert_eq!(r.to_string(), "-2/3");
    }

    #[test]
    fn test_rational_extremes() {
        assert!(Rational::new(i64::MIN, -1).is_err());
        assert!(Rational::new(1, i64::MIN).is_err());
        let r = Rational::new(i64::MIN, i64::MIN).unwrap();
        assert_eq!(r, Rational::from_integer(1));
        let r = Rational::new(i64::MIN, 2).unwrap();
        assert_eq!((r.numer(), r.denom()), (i64::MIN / 2, 1));
        let r = Rational::new(i64::MAX, -1).unwrap();
        assert_eq!((r.numer(), r.denom()), (-i64::MAX, 1));
    }

    #[test]
    fn test_rational_deserializes_normalized() {
        let r: Rational = serde_json::from_str(r#"{"numer": 2, "denom": -4}"#).unwrap();
        assert_eq!(r, Rational::new(-1, 2).unwrap());
        assert_eq!(serde_json::to_string(&r).unwrap(), r#"{"numer":-1,"denom":2}"#);
        assert!(serde_json::from_str::<Rational>(r#"{"numer": 1, "denom": 0}"#).is_err());
    }

    #[test]
    fn test_coercion() {
        let widened = Scalar::Integer(3).coerce_to(ScalarKind::Rational).unwrap();
        assert_eq!(widened, Scalar::Rational(Rational::from_integer(3)));
        assert!(Scalar::from("x").coerce_to(ScalarKind::Integer).is_err());
        assert!(
            Scalar::Rational(Rational::new(1, 2).unwrap())
                .coerce_to(ScalarKind::Integer)
                .is_err()
        );
    }
}
