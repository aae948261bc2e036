//! Persistent per-user records for the bot.
//!
//! The whole table lives in one JSON document; `UserStore` is its only writer.

pub mod user_store;

pub use user_store::UserStore;
