// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Wallet Server - Digital Wallet & e-Sign Service
//!
//! Customer accounts with a spendable balance, peer-to-peer transfers,
//! gateway-funded recharges and PDF e-signatures behind a JSON HTTP API.
//!
//! ## Modules
//!
//! - `api` - HTTP API handlers (Axum)
//! - `auth` - Token issuance, verification and password hashing
//! - `pdf` - Signature embedding and PDF inspection
//! - `providers` - Payment gateway clients (Razorpay)
//! - `storage` - Embedded ACID database (redb), document files, audit log

pub mod api;
pub mod auth;
pub mod config;
pub mod error;
pub mod expiry_sweeper;
pub mod models;
pub mod pdf;
pub mod providers;
pub mod state;
pub mod storage;
