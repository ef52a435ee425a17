//! Ledger Node RPC Client
//!
//! Provides the [`ChainReader`] seam and its JSON-RPC implementation. Only the
//! handful of read methods the read models need are exposed; no signing or
//! submission happens here.

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use mg_core::{Address, GridError, GridResult, B256};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tracing::{debug, trace};

/// Upper bound of a log query
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockTag {
    Number(u64),
    Latest,
}

impl BlockTag {
    fn to_param(self) -> String {
        match self {
            BlockTag::Number(n) => format!("0x{:x}", n),
            BlockTag::Latest => "latest".to_string(),
        }
    }
}

/// Log query for one contract and one event topic
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogFilter {
    pub address: Address,
    pub topic0: B256,
    pub from_block: u64,
    pub to_block: BlockTag,
}

/// Log entry exactly as returned by the node
///
/// Fields stay in their wire form; decoding happens per log so that one
/// malformed entry cannot fail a whole query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawLog {
    pub address: String,
    #[serde(default)]
    pub topics: Vec<String>,
    #[serde(default)]
    pub data: String,
    pub block_number: Option<String>,
    pub transaction_hash: Option<String>,
    pub log_index: Option<String>,
    /// Set by the node when a reorg dropped the log
    #[serde(default)]
    pub removed: bool,
}

/// Block header fields the indexer needs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockHeader {
    pub number: u64,
    pub timestamp: DateTime<Utc>,
}

/// Read access to a ledger node
///
/// Every method is one remote round trip. Transport failures map to
/// [`GridError::RemoteUnavailable`], unexpected payloads to
/// [`GridError::Decode`].
#[async_trait]
pub trait ChainReader: Send + Sync {
    /// `eth_call` against the latest block, returning the raw return data
    async fn call(&self, to: &Address, data: &[u8]) -> GridResult<Vec<u8>>;

    /// `eth_getLogs`
    async fn get_logs(&self, filter: &LogFilter) -> GridResult<Vec<RawLog>>;

    /// `eth_getBlockByNumber`; `None` when the node does not know the block
    async fn block_header(&self, number: u64) -> GridResult<Option<BlockHeader>>;

    /// `eth_blockNumber`
    async fn block_number(&self) -> GridResult<u64>;

    /// `eth_chainId`
    async fn chain_id(&self) -> GridResult<u64>;
}

/// JSON-RPC request
#[derive(Debug, Serialize)]
struct RpcRequest<'a> {
    jsonrpc: &'static str,
    id: u64,
    method: &'a str,
    params: serde_json::Value,
}

/// JSON-RPC response
#[derive(Debug, Deserialize)]
struct RpcResponse<T> {
    result: Option<T>,
    error: Option<RpcError>,
    #[allow(dead_code)]
    id: Option<u64>,
}

/// JSON-RPC error
#[derive(Debug, Deserialize)]
struct RpcError {
    code: i64,
    message: String,
}

/// Block as returned by `eth_getBlockByNumber(_, false)`
#[derive(Debug, Deserialize)]
struct RpcBlock {
    number: String,
    timestamp: String,
}

/// JSON-RPC client for an Ethereum-compatible ledger node
pub struct JsonRpcClient {
    /// HTTP client
    client: Client,
    /// Endpoint URL
    url: String,
    /// Request ID counter
    request_id: AtomicU64,
}

impl JsonRpcClient {
    /// Create a new client with the given request timeout
    pub fn new(url: impl Into<String>, timeout_secs: u64) -> GridResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| GridError::Configuration(format!("HTTP client: {}", e)))?;

        Ok(Self {
            client,
            url: url.into(),
            request_id: AtomicU64::new(1),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Make an RPC call that must return a non-null result
    async fn call_method<T: for<'de> Deserialize<'de>>(
        &self,
        method: &str,
        params: serde_json::Value,
    ) -> GridResult<T> {
        self.call_optional(method, params)
            .await?
            .ok_or_else(|| GridError::Decode(format!("{} returned null", method)))
    }

    /// Make an RPC call whose result may be null
    async fn call_optional<T: for<'de> Deserialize<'de>>(
        &self,
        method: &str,
        params: serde_json::Value,
    ) -> GridResult<Option<T>> {
        let id = self.request_id.fetch_add(1, Ordering::SeqCst);

        let request = RpcRequest {
            jsonrpc: "2.0",
            id,
            method,
            params,
        };

        debug!(method, id, "Ledger RPC call");

        let response = self
            .client
            .post(&self.url)
            .json(&request)
            .send()
            .await
            .map_err(|e| GridError::RemoteUnavailable(format!("{}: {}", method, e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(GridError::RemoteUnavailable(format!(
                "{}: HTTP {} - {}",
                method, status, body
            )));
        }

        let body = response
            .text()
            .await
            .map_err(|e| GridError::RemoteUnavailable(format!("{}: {}", method, e)))?;
        trace!(method, id, body = %body, "Ledger RPC response");

        let rpc_response: RpcResponse<T> = serde_json::from_str(&body)
            .map_err(|e| GridError::Decode(format!("{}: {}", method, e)))?;

        if let Some(error) = rpc_response.error {
            return Err(GridError::RemoteUnavailable(format!(
                "{}: RPC error {}: {}",
                method, error.code, error.message
            )));
        }

        Ok(rpc_response.result)
    }
}

#[async_trait]
impl ChainReader for JsonRpcClient {
    async fn call(&self, to: &Address, data: &[u8]) -> GridResult<Vec<u8>> {
        let params = serde_json::json!([
            { "to": to.to_hex(), "data": format!("0x{}", hex::encode(data)) },
            "latest"
        ]);
        let result: String = self.call_method("eth_call", params).await?;
        decode_hex_data(&result)
    }

    async fn get_logs(&self, filter: &LogFilter) -> GridResult<Vec<RawLog>> {
        let params = serde_json::json!([{
            "address": filter.address.to_hex(),
            "topics": [format!("0x{}", hex::encode(filter.topic0.as_slice()))],
            "fromBlock": BlockTag::Number(filter.from_block).to_param(),
            "toBlock": filter.to_block.to_param(),
        }]);
        self.call_method("eth_getLogs", params).await
    }

    async fn block_header(&self, number: u64) -> GridResult<Option<BlockHeader>> {
        let params = serde_json::json!([BlockTag::Number(number).to_param(), false]);
        let block: Option<RpcBlock> = self.call_optional("eth_getBlockByNumber", params).await?;

        block
            .map(|b| -> GridResult<BlockHeader> {
                Ok(BlockHeader {
                    number: parse_quantity(&b.number)?,
                    timestamp: unix_timestamp(parse_quantity(&b.timestamp)?)?,
                })
            })
            .transpose()
    }

    async fn block_number(&self) -> GridResult<u64> {
        let result: String = self
            .call_method("eth_blockNumber", serde_json::json!([]))
            .await?;
        parse_quantity(&result)
    }

    async fn chain_id(&self) -> GridResult<u64> {
        let result: String = self.call_method("eth_chainId", serde_json::json!([])).await?;
        parse_quantity(&result)
    }
}

/// Parse a hex quantity such as `0x1a`
pub fn parse_quantity(s: &str) -> GridResult<u64> {
    let digits = s
        .strip_prefix("0x")
        .ok_or_else(|| GridError::Decode(format!("quantity {:?} lacks 0x prefix", s)))?;
    if digits.is_empty() {
        return Err(GridError::Decode("empty quantity".to_string()));
    }
    u64::from_str_radix(digits, 16)
        .map_err(|e| GridError::Decode(format!("quantity {:?}: {}", s, e)))
}

/// Decode `0x`-prefixed byte data; `0x` alone is empty data
pub fn decode_hex_data(s: &str) -> GridResult<Vec<u8>> {
    let digits = s
        .strip_prefix("0x")
        .ok_or_else(|| GridError::Decode(format!("data {:?} lacks 0x prefix", s)))?;
    Ok(hex::decode(digits)?)
}

/// Convert block seconds to a UTC timestamp
pub fn unix_timestamp(secs: u64) -> GridResult<DateTime<Utc>> {
    i64::try_from(secs)
        .ok()
        .and_then(|s| Utc.timestamp_opt(s, 0).single())
        .ok_or_else(|| GridError::Decode(format!("block timestamp {} out of range", secs)))
}
