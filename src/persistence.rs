//! Database persistence layer for chainstore

use crate::chain::{Block, LastSync, Transaction};
use crate::error::StoreError;
use rusqlite::{params, Connection};
use std::sync::{Arc, Mutex};
use tracing::debug;

/// Default row cap applied by callers that have no better limit in hand.
pub const DEFAULT_QUERY_LIMIT: u32 = 50;

/// Abstraction for block-store backends. Implementations should provide
/// atomic ingestion of a block with its transactions and reads over the
/// persisted rows.
pub trait Store: Send + Sync {
    fn get_blocks(&self, limit: u32) -> Result<Vec<Block>, StoreError>;
    fn get_transactions(&self, limit: u32) -> Result<Vec<Transaction>, StoreError>;
    fn get_last_sync(&self) -> Result<Option<LastSync>, StoreError>;
    fn add_block(&self, block: &Block, tx_hashes: &[String]) -> Result<(), StoreError>;
}

pub struct Database {
    conn: Mutex<Connection>,
}

fn is_constraint_violation(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(e, _) if e.code == rusqlite::ErrorCode::ConstraintViolation
    )
}

fn decode_height(raw: i64) -> Result<u64, StoreError> {
    u64::try_from(raw)
        .map_err(|_| StoreError::DatabaseError(format!("Invalid block number in row: {}", raw)))
}

impl Database {
    /// Opens (or creates) the store at `path` and ensures the schema exists.
    /// Safe to call repeatedly against the same file, including one already
    /// holding rows.
    pub fn open(path: &str) -> Result<Self, StoreError> {
        let conn = Connection::open(path)
            .map_err(|e| StoreError::DatabaseError(format!("Failed to open database: {}", e)))?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS blocks (
                number INTEGER PRIMARY KEY,
                hash TEXT NOT NULL
            ) STRICT",
            [],
        )
        .map_err(|e| StoreError::DatabaseError(format!("Failed to create blocks table: {}", e)))?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS transactions (
                hash TEXT PRIMARY KEY,
                block_number INTEGER NOT NULL
            ) STRICT",
            [],
        )
        .map_err(|e| {
            StoreError::DatabaseError(format!("Failed to create transactions table: {}", e))
        })?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS addresses (
                address TEXT PRIMARY KEY
            ) STRICT",
            [],
        )
        .map_err(|e| {
            StoreError::DatabaseError(format!("Failed to create addresses table: {}", e))
        })?;

        debug!("Opened block store at {}", path);

        Ok(Database {
            conn: Mutex::new(conn),
        })
    }

    pub fn get_blocks(&self, limit: u32) -> Result<Vec<Block>, StoreError> {
        let conn_guard = self
            .conn
            .lock()
            .map_err(|_| StoreError::DatabaseError("Mutex poisoned".to_string()))?;
        // No ORDER BY: row order is whatever the engine returns.
        let mut stmt = conn_guard
            .prepare("SELECT number, hash FROM blocks LIMIT ?1")
            .map_err(|e| StoreError::DatabaseError(format!("Failed to prepare query: {}", e)))?;

        let rows = stmt
            .query_map(params![limit], |row| {
                let number: i64 = row.get(0)?;
                let hash: String = row.get(1)?;
                Ok((number, hash))
            })
            .map_err(|e| StoreError::DatabaseError(format!("Failed to query blocks: {}", e)))?;

        let mut blocks = Vec::new();
        for row_result in rows {
            let (number, hash) = row_result
                .map_err(|e| StoreError::DatabaseError(format!("Failed to read row: {}", e)))?;
            blocks.push(Block {
                number: decode_height(number)?,
                hash,
            });
        }

        Ok(blocks)
    }

    pub fn get_transactions(&self, limit: u32) -> Result<Vec<Transaction>, StoreError> {
        let conn_guard = self
            .conn
            .lock()
            .map_err(|_| StoreError::DatabaseError("Mutex poisoned".to_string()))?;
        let mut stmt = conn_guard
            .prepare("SELECT hash, block_number FROM transactions LIMIT ?1")
            .map_err(|e| StoreError::DatabaseError(format!("Failed to prepare query: {}", e)))?;

        let rows = stmt
            .query_map(params![limit], |row| {
                let hash: String = row.get(0)?;
                let block_number: i64 = row.get(1)?;
                Ok((hash, block_number))
            })
            .map_err(|e| {
                StoreError::DatabaseError(format!("Failed to query transactions: {}", e))
            })?;

        let mut transactions = Vec::new();
        for row_result in rows {
            let (hash, block_number) = row_result
                .map_err(|e| StoreError::DatabaseError(format!("Failed to read row: {}", e)))?;
            transactions.push(Transaction {
                hash,
                block_number: decode_height(block_number)?,
            });
        }

        Ok(transactions)
    }

    /// Returns the highest-numbered block, or `None` when the store is empty.
    pub fn get_last_sync(&self) -> Result<Option<LastSync>, StoreError> {
        let conn_guard = self
            .conn
            .lock()
            .map_err(|_| StoreError::DatabaseError("Mutex poisoned".to_string()))?;
        let mut stmt = conn_guard
            .prepare("SELECT number, hash FROM blocks ORDER BY number DESC LIMIT 1")
            .map_err(|e| StoreError::DatabaseError(format!("Failed to prepare query: {}", e)))?;

        let mut rows = stmt
            .query_map([], |row| {
                let number: i64 = row.get(0)?;
                let hash: String = row.get(1)?;
                Ok((number, hash))
            })
            .map_err(|e| StoreError::DatabaseError(format!("Failed to query last sync: {}", e)))?;

        match rows.next() {
            Some(row_result) => {
                let (number, hash) = row_result
                    .map_err(|e| StoreError::DatabaseError(format!("Failed to read row: {}", e)))?;
                Ok(Some(LastSync {
                    block: Block {
                        number: decode_height(number)?,
                        hash,
                    },
                }))
            }
            None => Ok(None),
        }
    }

    /// Atomically saves one block together with its transactions.
    /// Either every row lands or none does: the uncommitted transaction is
    /// rolled back on any insert failure, so readers never observe a block
    /// without its transactions.
    pub fn add_block(&self, block: &Block, tx_hashes: &[String]) -> Result<(), StoreError> {
        let conn_guard = self
            .conn
            .lock()
            .map_err(|_| StoreError::DatabaseError("Mutex poisoned".to_string()))?;
        let tx = conn_guard.unchecked_transaction().map_err(|e| {
            StoreError::DatabaseError(format!("Failed to start transaction: {}", e))
        })?;

        tx.execute(
            "INSERT INTO blocks (number, hash) VALUES (?1, ?2)",
            params![block.number as i64, block.hash],
        )
        .map_err(|e| {
            if is_constraint_violation(&e) {
                StoreError::DuplicateBlock(block.number)
            } else {
                StoreError::DatabaseError(format!("Failed to insert block: {}", e))
            }
        })?;

        for hash in tx_hashes {
            tx.execute(
                "INSERT INTO transactions (hash, block_number) VALUES (?1, ?2)",
                params![hash, block.number as i64],
            )
            .map_err(|e| {
                if is_constraint_violation(&e) {
                    StoreError::DuplicateTransaction(hash.clone())
                } else {
                    StoreError::DatabaseError(format!("Failed to insert transaction: {}", e))
                }
            })?;
        }

        tx.commit()
            .map_err(|e| StoreError::DatabaseError(format!("Failed to commit transaction: {}", e)))?;

        debug!(
            "Ingested block {} with {} transactions",
            block.number,
            tx_hashes.len()
        );

        Ok(())
    }

    /// Explicit shutdown path. Consumes the store and closes the underlying
    /// connection.
    pub fn close(self) -> Result<(), StoreError> {
        let conn = self
            .conn
            .into_inner()
            .map_err(|_| StoreError::DatabaseError("Mutex poisoned".to_string()))?;
        conn.close()
            .map_err(|(_, e)| StoreError::DatabaseError(format!("Failed to close database: {}", e)))
    }
}

// Implement the Store trait for the rusqlite-backed Database
impl Store for Database {
    fn get_blocks(&self, limit: u32) -> Result<Vec<Block>, StoreError> {
        Database::get_blocks(self, limit)
    }

    fn get_transactions(&self, limit: u32) -> Result<Vec<Transaction>, StoreError> {
        Database::get_transactions(self, limit)
    }

    fn get_last_sync(&self) -> Result<Option<LastSync>, StoreError> {
        Database::get_last_sync(self)
    }

    fn add_block(&self, block: &Block, tx_hashes: &[String]) -> Result<(), StoreError> {
        Database::add_block(self, block, tx_hashes)
    }
}

/// Simple in-memory store useful for tests and ephemeral runs.
#[derive(Clone, Default)]
pub struct MemoryStore {
    blocks: Arc<Mutex<Vec<Block>>>,
    transactions: Arc<Mutex<Vec<Transaction>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Store for MemoryStore {
    fn get_blocks(&self, limit: u32) -> Result<Vec<Block>, StoreError> {
        let blocks = self
            .blocks
            .lock()
            .map_err(|_| StoreError::DatabaseError("Mutex poisoned".to_string()))?;
        Ok(blocks.iter().take(limit as usize).cloned().collect())
    }

    fn get_transactions(&self, limit: u32) -> Result<Vec<Transaction>, StoreError> {
        let transactions = self
            .transactions
            .lock()
            .map_err(|_| StoreError::DatabaseError("Mutex poisoned".to_string()))?;
        Ok(transactions.iter().take(limit as usize).cloned().collect())
    }

    fn get_last_sync(&self) -> Result<Option<LastSync>, StoreError> {
        let blocks = self
            .blocks
            .lock()
            .map_err(|_| StoreError::DatabaseError("Mutex poisoned".to_string()))?;
        Ok(blocks
            .iter()
            .max_by_key(|b| b.number)
            .map(|b| LastSync { block: b.clone() }))
    }

    fn add_block(&self, block: &Block, tx_hashes: &[String]) -> Result<(), StoreError> {
        let mut blocks = self
            .blocks
            .lock()
            .map_err(|_| StoreError::DatabaseError("Mutex poisoned".to_string()))?;
        let mut transactions = self
            .transactions
            .lock()
            .map_err(|_| StoreError::DatabaseError("Mutex poisoned".to_string()))?;

        // Validate everything before touching either list so a failed
        // ingestion leaves no partial rows, matching the SQLite rollback.
        if blocks.iter().any(|b| b.number == block.number) {
            return Err(StoreError::DuplicateBlock(block.number));
        }
        for hash in tx_hashes {
            if transactions.iter().any(|t| &t.hash == hash) {
                return Err(StoreError::DuplicateTransaction(hash.clone()));
            }
        }

        blocks.push(block.clone());
        for hash in tx_hashes {
            transactions.push(Transaction {
                hash: hash.clone(),
                block_number: block.number,
            });
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_block(number: u64, hash: &str) -> Block {
        Block {
            number,
            hash: hash.to_string(),
        }
    }

    #[test]
    fn test_database_open() {
        let db = Database::open(":memory:").unwrap();
        assert!(db.conn.lock().unwrap().is_autocommit());
    }

    #[test]
    fn test_add_block_and_read_back() {
        let db = Database::open(":memory:").unwrap();
        db.add_block(
            &test_block(1, "0xabc"),
            &["0x01".to_string(), "0x02".to_string()],
        )
        .unwrap();

        let blocks = db.get_blocks(DEFAULT_QUERY_LIMIT).unwrap();
        assert_eq!(blocks, vec![test_block(1, "0xabc")]);

        let txs = db.get_transactions(DEFAULT_QUERY_LIMIT).unwrap();
        assert_eq!(txs.len(), 2);
        assert!(txs.iter().all(|t| t.block_number == 1));
    }

    #[test]
    fn test_duplicate_transaction_rolls_back_block() {
        let db = Database::open(":memory:").unwrap();
        db.add_block(&test_block(1, "0xabc"), &["0x01".to_string()])
            .unwrap();

        // Second ingestion reuses a transaction hash: nothing from it may land.
        let err = db
            .add_block(
                &test_block(2, "0xdef"),
                &["0x02".to_string(), "0x01".to_string()],
            )
            .unwrap_err();
        assert!(matches!(err, StoreError::DuplicateTransaction(ref h) if h == "0x01"));

        assert_eq!(db.get_blocks(DEFAULT_QUERY_LIMIT).unwrap().len(), 1);
        assert_eq!(db.get_transactions(DEFAULT_QUERY_LIMIT).unwrap().len(), 1);
    }

    #[test]
    fn test_duplicate_block_is_distinct_error() {
        let db = Database::open(":memory:").unwrap();
        db.add_block(&test_block(7, "0xaaa"), &[]).unwrap();
        let err = db.add_block(&test_block(7, "0xbbb"), &[]).unwrap_err();
        assert!(matches!(err, StoreError::DuplicateBlock(7)));
    }

    #[test]
    fn test_close() {
        let db = Database::open(":memory:").unwrap();
        db.add_block(&test_block(1, "0xabc"), &[]).unwrap();
        db.close().unwrap();
    }

    #[test]
    fn test_memory_store_matches_database_semantics() {
        let store = MemoryStore::new();
        store
            .add_block(&test_block(3, "0xccc"), &["0x0a".to_string()])
            .unwrap();
        store.add_block(&test_block(9, "0x999"), &[]).unwrap();

        let last = store.get_last_sync().unwrap().unwrap();
        assert_eq!(last.block, test_block(9, "0x999"));

        let err = store
            .add_block(&test_block(3, "0xddd"), &["0x0b".to_string()])
            .unwrap_err();
        assert!(matches!(err, StoreError::DuplicateBlock(3)));
        assert_eq!(store.get_transactions(DEFAULT_QUERY_LIMIT).unwrap().len(), 1);
    }
}
