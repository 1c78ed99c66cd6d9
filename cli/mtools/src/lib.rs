//! mtools - crowdsourced sentence-pair evaluation campaigns.
//!
//! Datasets of good/bad sentence pairs are loaded into Postgres, packed
//! into fixed-size HITs by the allocator, posted to the task marketplace,
//! and scored against the stored answer keys once workers submit.

pub mod config;
pub mod db;
pub mod deploy;
pub mod evaluate;
pub mod ingest;
pub mod review;
