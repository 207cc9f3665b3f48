use serde::Serialize;

use super::{CanonicalRequest, ConditionPayload, Period, Symbol};

/// Provider-facing key. Coarser than `ContentKey`: every price or
/// point-percent alert on a symbol is answered by one kline poll, every
/// period alert by one ticker poll per (symbol, period).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ServerKey {
    Kline(Symbol),
    Ticker(Symbol, Period),
}

/// One query the provider actually has to answer.
#[derive(Debug, Clone, Serialize)]
pub struct ServerQuery {
    pub symbol: Symbol,
    pub payload: ConditionPayload,
}

impl ServerQuery {
    pub fn server_key(&self) -> ServerKey {
        match self.payload {
            ConditionPayload::PriceTarget { .. } | ConditionPayload::PercentFromPoint { .. } => {
                ServerKey::Kline(self.symbol.clone())
            }
            ConditionPayload::PercentOverPeriod { period, .. } => {
                ServerKey::Ticker(self.symbol.clone(), period)
            }
        }
    }

    pub fn weight(&self) -> u32 {
        self.payload.weight()
    }
}

impl From<&CanonicalRequest> for ServerQuery {
    fn from(r: &CanonicalRequest) -> Self {
        Self {
            symbol: r.content.symbol.clone(),
            payload: r.content.payload,
        }
    }
}
