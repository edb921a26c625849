//! Boundary layer for chain data arriving from an external node client
//!
//! Upstream clients deliver blocks in JSON-RPC shape: the height is a
//! `0x`-prefixed hex quantity and each transaction carries its hash. This
//! module normalizes that shape into the integer-height entities the store
//! accepts; nothing past this boundary interprets hex.

use crate::chain::Block;
use crate::error::StoreError;
use crate::persistence::Store;
use tracing::debug;

/// A block as delivered by the node client, transactions included.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct RpcBlock {
    pub number: String,
    pub hash: String,
    pub transactions: Vec<RpcTransaction>,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct RpcTransaction {
    pub hash: String,
}

/// Parses a `0x`-prefixed hex quantity into an integer height.
pub fn parse_hex_quantity(value: &str) -> Result<u64, StoreError> {
    let digits = value
        .strip_prefix("0x")
        .or_else(|| value.strip_prefix("0X"))
        .ok_or_else(|| {
            StoreError::InvalidHexQuantity(format!("Missing 0x prefix: {:?}", value))
        })?;
    if digits.is_empty() {
        return Err(StoreError::InvalidHexQuantity(format!(
            "No digits after prefix: {:?}",
            value
        )));
    }
    u64::from_str_radix(digits, 16)
        .map_err(|_| StoreError::InvalidHexQuantity(format!("Not a hex number: {:?}", value)))
}

/// Normalizes an RPC block into a store block plus its transaction hashes.
pub fn normalize(rpc: &RpcBlock) -> Result<(Block, Vec<String>), StoreError> {
    let block = Block {
        number: parse_hex_quantity(&rpc.number)?,
        hash: rpc.hash.clone(),
    };
    let tx_hashes = rpc.transactions.iter().map(|t| t.hash.clone()).collect();
    Ok((block, tx_hashes))
}

/// Normalizes and atomically ingests one RPC block.
pub fn ingest(rpc: &RpcBlock, store: &dyn Store) -> Result<(), StoreError> {
    let (block, tx_hashes) = normalize(rpc)?;
    debug!("Normalized block {} from {}", block.number, rpc.number);
    store.add_block(&block, &tx_hashes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persistence::{MemoryStore, DEFAULT_QUERY_LIMIT};

    #[test]
    fn test_parse_hex_quantity() {
        assert_eq!(parse_hex_quantity("0x0").unwrap(), 0);
        assert_eq!(parse_hex_quantity("0xa").unwrap(), 10);
        assert_eq!(parse_hex_quantity("0xFF").unwrap(), 255);
        assert_eq!(parse_hex_quantity("0Xff").unwrap(), 255);
    }

    #[test]
    fn test_parse_hex_quantity_rejects_garbage() {
        assert!(matches!(
            parse_hex_quantity("10"),
            Err(StoreError::InvalidHexQuantity(_))
        ));
        assert!(matches!(
            parse_hex_quantity("0x"),
            Err(StoreError::InvalidHexQuantity(_))
        ));
        assert!(matches!(
            parse_hex_quantity("0xzz"),
            Err(StoreError::InvalidHexQuantity(_))
        ));
    }

    #[test]
    fn test_normalize_json_payload() {
        let rpc: RpcBlock = serde_json::from_str(
            r#"{
                "number": "0x10",
                "hash": "0xabc",
                "transactions": [{"hash": "0xtx1"}, {"hash": "0xtx2"}]
            }"#,
        )
        .unwrap();

        let (block, tx_hashes) = normalize(&rpc).unwrap();
        assert_eq!(block.number, 16);
        assert_eq!(block.hash, "0xabc");
        assert_eq!(tx_hashes, vec!["0xtx1".to_string(), "0xtx2".to_string()]);
    }

    #[test]
    fn test_ingest_into_store() {
        let store = MemoryStore::new();
        let rpc = RpcBlock {
            number: "0xa".to_string(),
            hash: "0xaaa".to_string(),
            transactions: vec![RpcTransaction {
                hash: "0xtx1".to_string(),
            }],
        };

        ingest(&rpc, &store).unwrap();

        let last = store.get_last_sync().unwrap().unwrap();
        assert_eq!(last.block.number, 10);
        assert_eq!(store.get_transactions(DEFAULT_QUERY_LIMIT).unwrap().len(), 1);
    }

    #[test]
    fn test_ingest_bad_height_writes_nothing() {
        let store = MemoryStore::new();
        let rpc = RpcBlock {
            number: "nope".to_string(),
            hash: "0xaaa".to_string(),
            transactions: Vec::new(),
        };

        assert!(ingest(&rpc, &store).is_err());
        assert!(store.get_last_sync().unwrap().is_none());
    }
}
