//! Chain entity types persisted by the store

/// One chain block, identified by height
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Block {
    pub number: u64,
    pub hash: String,
}

/// A transaction belonging to exactly one block
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Transaction {
    pub hash: String,
    pub block_number: u64,
}

/// The highest block recorded locally, used as a resumption point for
/// external synchronization. Derived from stored rows, never persisted.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct LastSync {
    pub block: Block,
}
