//! Route handlers organized by resource

pub mod health;
pub mod ingestion;
pub mod classification;
pub mod storage;
pub mod audit;
