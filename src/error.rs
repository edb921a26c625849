//! Error types for chainstore

use std::fmt;

#[derive(Debug, Clone)]
pub enum StoreError {
    DatabaseError(String),
    DuplicateBlock(u64),
    DuplicateTransaction(String),
    InvalidHexQuantity(String),
    ConfigError(String),
    IoError(String),
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            StoreError::DatabaseError(msg) => write!(f, "Database error: {}", msg),
            StoreError::DuplicateBlock(number) => {
                write!(f, "Block {} already exists", number)
            }
            StoreError::DuplicateTransaction(hash) => {
                write!(f, "Transaction {} already exists", hash)
            }
            StoreError::InvalidHexQuantity(msg) => {
                write!(f, "Invalid hex quantity: {}", msg)
            }
            StoreError::ConfigError(msg) => write!(f, "Configuration error: {}", msg),
            StoreError::IoError(msg) => write!(f, "IO error: {}", msg),
        }
    }
}

impl std::error::Error for StoreError {}

impl From<std::io::Error> for StoreError {
    fn from(err: std::io::Error) -> Self {
        StoreError::IoError(err.to_string())
    }
}

/// Convenience alias used across the crate
pub type Result<T> = std::result::Result<T, StoreError>;
