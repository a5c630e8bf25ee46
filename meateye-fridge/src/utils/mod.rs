//! Utility modules for meateye-fridge

pub mod db_retry;

pub use db_retry::LockRetry;
