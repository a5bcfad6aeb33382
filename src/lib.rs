//! # Curbfare
//!
//! Food-truck discovery over San Francisco's mobile-food open data.
//!
//! Curbfare ingests the DataSF permit and schedule CSV feeds into a
//! normalized SQLite schema, embeds every menu item, and answers free-text
//! questions by ranking foods with vector similarity, expanding the winners
//! through the truck/location/schedule relations, and handing the nested
//! result to a chat-completion provider.
//!
//! ```text
//! ┌───────────┐   ┌───────────────┐   ┌──────────┐
//! │ CSV feeds │──▶│ Resolver       │──▶│  SQLite   │──▶ embedding backfill
//! │ DataSF    │   │ 4-pass import │   │ 6 tables  │
//! └───────────┘   └───────────────┘   └────┬─────┘
//!                                          │
//!                      ┌───────────────────┤
//!                      ▼                   ▼
//!                 ┌──────────┐       ┌──────────┐
//!                 │   CLI    │       │   HTTP   │
//!                 │  (curb)  │       │ (serve)  │
//!                 └──────────┘       └──────────┘
//! ```
//!
//! ## Quick start
//!
//! ```bash
//! curb init                     # create database
//! curb import                   # run the four ingestion passes
//! curb embed pending            # backfill menu-item embeddings
//! curb ask "where can I get tacos?"
//! curb serve                    # start the HTTP query endpoint
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`models`] | Feed records and the nested result tree |
//! | [`feed`] | CSV feed acquisition (HTTP or local file) |
//! | [`resolver`] | Idempotent natural-key upserts |
//! | [`ingest`] | The four ordered ingestion passes |
//! | [`embedding`] | Embedding/chat provider abstraction |
//! | [`backfill`] | Embedding backfill over foods |
//! | [`retrieve`] | Similarity ranking + relational expansion |
//! | [`answer`] | Context serialization and answer synthesis |
//! | [`server`] | HTTP query endpoint |
//! | [`db`] | Database connection |
//! | [`migrate`] | Schema creation |

pub mod answer;
pub mod ask;
pub mod backfill;
pub mod config;
pub mod db;
pub mod embedding;
pub mod error;
pub mod feed;
pub mod ingest;
pub mod migrate;
pub mod models;
pub mod resolver;
pub mod retrieve;
pub mod server;
pub mod stats;
