use std::{fmt, sync::OnceLock};

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::AppError;

fn symbol_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[A-Z0-9_-]{1,32}$").expect("valid symbol regex"))
}

/// Trading pair identifier, always held in its uppercase form.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Symbol(String);

impl Symbol {
    pub fn parse(raw: &str) -> Result<Self, AppError> {
        let sym = raw.trim().to_uppercase();
        if !symbol_re().is_match(&sym) {
            return Err(AppError::Validation(format!("invalid symbol {raw:?}")));
        }
        Ok(Self(sym))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for Symbol {
    type Error = AppError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<Symbol> for String {
    fn from(value: Symbol) -> Self {
        value.0
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn symbols_compare_case_insensitively() {
        let a = Symbol::parse("BtcUsdT").unwrap();
        let b = Symbol::parse(" btcusdt ").unwrap();
        assert_eq!(a, b);
        assert_eq!(a.as_str(), "BTCUSDT");
    }

    #[test]
    fn rejects_garbage() {
        assert!(Symbol::parse("").is_err());
        assert!(Symbol::parse("BTC USDT").is_err());
        assert!(Symbol::parse("btc/usdt").is_err());
    }

    #[test]
    fn deserializes_to_uppercase() {
        let s: Symbol = serde_json::from_str("\"ethusdt\"").unwrap();
        assert_eq!(s.as_str(), "ETHUSDT");
        assert_eq!(serde_json::to_string(&s).unwrap(), "\"ETHUSDT\"");
    }
}
