use crate::error::CoreError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// The exchange endpoints whose history can be pulled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Endpoint {
    ClosedPnl,
    Executions,
    InternalTransfers,
    UniversalTransfers,
    Withdrawals,
    Deposits,
}

impl Endpoint {
    pub const ALL: [Endpoint; 6] = [
        Endpoint::ClosedPnl,
        Endpoint::Executions,
        Endpoint::InternalTransfers,
        Endpoint::UniversalTransfers,
        Endpoint::Withdrawals,
        Endpoint::Deposits,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Endpoint::ClosedPnl => "closed_pnl",
            Endpoint::Executions => "executions",
            Endpoint::InternalTransfers => "internal_transfers",
            Endpoint::UniversalTransfers => "universal_transfers",
            Endpoint::Withdrawals => "withdrawals",
            Endpoint::Deposits => "deposits",
        }
    }

    /// True for the wallet-level endpoints (transfers, deposits, withdrawals).
    pub fn is_treasury(&self) -> bool {
        !matches!(self, Endpoint::ClosedPnl | Endpoint::Executions)
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Endpoint {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Endpoint::ALL
            .into_iter()
            .find(|e| e.as_str() == s)
            .ok_or_else(|| CoreError::InvalidInput("endpoint".to_string(), s.to_string()))
    }
}

/// A user-facing report: one or more endpoints aggregated under one profile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Dataset {
    ClosedPnl,
    Executions,
    Treasury,
}

impl Dataset {
    pub fn as_str(&self) -> &'static str {
        match self {
            Dataset::ClosedPnl => "closed_pnl",
            Dataset::Executions => "executions",
            Dataset::Treasury => "treasury",
        }
    }

    pub fn title(&self) -> &'static str {
        match self {
            Dataset::ClosedPnl => "PnL",
            Dataset::Executions => "Executions",
            Dataset::Treasury => "Transfers & Deposits",
        }
    }

    /// Endpoints fetched for this dataset, in fetch order.
    pub fn endpoints(&self) -> &'static [Endpoint] {
        match self {
            Dataset::ClosedPnl => &[Endpoint::ClosedPnl],
            Dataset::Executions => &[Endpoint::Executions],
            Dataset::Treasury => &[
                Endpoint::InternalTransfers,
                Endpoint::UniversalTransfers,
                Endpoint::Withdrawals,
                Endpoint::Deposits,
            ],
        }
    }

    /// The record field used to group rows (and to filter by symbol).
    pub fn group_field(&self) -> &'static str {
        match self {
            Dataset::ClosedPnl | Dataset::Executions => "symbol",
            Dataset::Treasury => "coin",
        }
    }
}

impl fmt::Display for Dataset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Dataset {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "closed_pnl" | "pnl" => Ok(Dataset::ClosedPnl),
            "executions" => Ok(Dataset::Executions),
            "treasury" | "transfers" => Ok(Dataset::Treasury),
            other => Err(CoreError::InvalidInput("dataset".to_string(), other.to_string())),
        }
    }
}
