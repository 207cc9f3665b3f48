use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::Symbol;
use crate::error::{AppError, AppResult};

/// Quota cost of a 24h ticker poll upstream.
pub const WEIGHT_GET_TICKER: u32 = 2;
/// Quota cost of a kline (candles) poll upstream.
pub const WEIGHT_REQUEST_KLINE: u32 = 6;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RequestId(pub i64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SubscriberId(pub i64);

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for SubscriberId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Period {
    #[serde(rename = "4h")]
    H4,
    #[serde(rename = "8h")]
    H8,
    #[serde(rename = "12h")]
    H12,
    #[serde(rename = "24h")]
    H24,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    UpTo,
    DownTo,
    All,
}

/// What an alert watches for. Persisted as a record tagged by `type`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ConditionPayload {
    PriceTarget {
        target_price: f64,
    },
    PercentFromPoint {
        target_percent: f64,
        reference_price: f64,
    },
    PercentOverPeriod {
        target_percent: f64,
        period: Period,
    },
}

impl ConditionPayload {
    pub fn weight(&self) -> u32 {
        match self {
            Self::PriceTarget { .. } | Self::PercentFromPoint { .. } => WEIGHT_REQUEST_KLINE,
            Self::PercentOverPeriod { .. } => WEIGHT_GET_TICKER,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::PriceTarget { .. } => "price_target",
            Self::PercentFromPoint { .. } => "percent_from_point",
            Self::PercentOverPeriod { .. } => "percent_over_period",
        }
    }

    pub fn validate(&self) -> AppResult<()> {
        match *self {
            Self::PriceTarget { target_price } => {
                if !target_price.is_finite() || target_price <= 0.0 {
                    return Err(AppError::Validation(
                        "target_price must be a positive number".into(),
                    ));
                }
            }
            Self::PercentFromPoint {
                target_percent,
                reference_price,
            } => {
                if !target_percent.is_finite() {
                    return Err(AppError::Validation("target_percent must be finite".into()));
                }
                if !reference_price.is_finite() || reference_price <= 0.0 {
                    return Err(AppError::Validation(
                        "reference_price must be a positive number".into(),
                    ));
                }
            }
            Self::PercentOverPeriod { target_percent, .. } => {
                if !target_percent.is_finite() {
                    return Err(AppError::Validation("target_percent must be finite".into()));
                }
            }
        }
        Ok(())
    }

    fn key(&self) -> PayloadKey {
        match *self {
            Self::PriceTarget { target_price } => PayloadKey::PriceTarget {
                target_price: float_bits(target_price),
            },
            Self::PercentFromPoint {
                target_percent,
                reference_price,
            } => PayloadKey::PercentFromPoint {
                target_percent: float_bits(target_percent),
                reference_price: float_bits(reference_price),
            },
            Self::PercentOverPeriod {
                target_percent,
                period,
            } => PayloadKey::PercentOverPeriod {
                target_percent: float_bits(target_percent),
                period,
            },
        }
    }
}

// -0.0 and 0.0 must land on the same key.
fn float_bits(x: f64) -> u64 {
    if x == 0.0 { 0f64.to_bits() } else { x.to_bits() }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum PayloadKey {
    PriceTarget {
        target_price: u64,
    },
    PercentFromPoint {
        target_percent: u64,
        reference_price: u64,
    },
    PercentOverPeriod {
        target_percent: u64,
        period: Period,
    },
}

/// Dedup key: two requests with the same key are the same subscription.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ContentKey {
    symbol: Symbol,
    payload: PayloadKey,
    direction: Direction,
}

impl ContentKey {
    pub fn symbol(&self) -> &Symbol {
        &self.symbol
    }
}

/// The part of a request that users actually choose.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestContent {
    pub symbol: Symbol,
    pub payload: ConditionPayload,
    pub direction: Direction,
}

impl RequestContent {
    pub fn new(symbol: Symbol, payload: ConditionPayload, direction: Direction) -> Self {
        Self {
            symbol,
            payload,
            direction,
        }
    }

    pub fn content_key(&self) -> ContentKey {
        ContentKey {
            symbol: self.symbol.clone(),
            payload: self.payload.key(),
            direction: self.direction,
        }
    }
}

/// A subscriber's copy of a request. Timestamps are per holder; the id is
/// shared by every holder of the same content.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserRequest {
    pub id: RequestId,
    #[serde(flatten)]
    pub content: RequestContent,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl UserRequest {
    pub fn new(id: RequestId, content: RequestContent) -> Self {
        let now = Utc::now();
        Self {
            id,
            content,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn content_key(&self) -> ContentKey {
        self.content.content_key()
    }
}

/// Representative of one content class.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CanonicalRequest {
    pub id: RequestId,
    #[serde(flatten)]
    pub content: RequestContent,
}

impl CanonicalRequest {
    pub fn content_key(&self) -> ContentKey {
        self.content.content_key()
    }
}

impl From<&UserRequest> for CanonicalRequest {
    fn from(r: &UserRequest) -> Self {
        Self {
            id: r.id,
            content: r.content.clone(),
        }
    }
}
