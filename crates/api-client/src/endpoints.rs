use core_types::Endpoint;

const DAY_MS: i64 = 24 * 60 * 60 * 1000;

/// Static facts about one paginated history endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EndpointDescriptor {
    pub path: &'static str,
    /// Longest `endTime - startTime` the endpoint accepts in one query.
    pub max_window_ms: i64,
    /// Page size requested with every call (the endpoint's cap).
    pub page_limit: u32,
    /// Whether the endpoint needs the product `category` parameter.
    pub needs_category: bool,
}

pub fn descriptor(endpoint: Endpoint) -> EndpointDescriptor {
    match endpoint {
        Endpoint::ClosedPnl => EndpointDescriptor {
            path: "/v5/position/closed-pnl",
            max_window_ms: 7 * DAY_MS,
            page_limit: 100,
            needs_category: true,
        },
        Endpoint::Executions => EndpointDescriptor {
            path: "/v5/execution/list",
            max_window_ms: 7 * DAY_MS,
            page_limit: 100,
            needs_category: true,
        },
        Endpoint::InternalTransfers => EndpointDescriptor {
            path: "/v5/asset/transfer/query-inter-transfer-list",
            max_window_ms: 30 * DAY_MS,
            page_limit: 50,
            needs_category: false,
        },
        Endpoint::UniversalTransfers => EndpointDescriptor {
            path: "/v5/asset/transfer/query-universal-transfer-list",
            max_window_ms: 30 * DAY_MS,
            page_limit: 50,
            needs_category: false,
        },
        Endpoint::Withdrawals => EndpointDescriptor {
            path: "/v5/asset/withdraw/query-record",
            max_window_ms: 30 * DAY_MS,
            page_limit: 50,
            needs_category: false,
        },
        Endpoint::Deposits => EndpointDescriptor {
            path: "/v5/asset/deposit/query-record",
            max_window_ms: 30 * DAY_MS,
            page_limit: 50,
            needs_category: false,
        },
    }
}

/// Key introspection; a single unpaginated call.
pub const API_KEY_INFO_PATH: &str = "/v5/user/query-api";
