// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//!
//! C4 — phase-switching composition of a primary (C2) and secondary (C3)
//! `StoragePort`, grounded on the phase-aware dual repository described
//! in `task_message_dual_repository.py`: one configuration value picks
//! between `primary_only`, `dual_write`, `dual_read_verify`, and
//! `secondary_only`, and `dual_read_verify` additionally emits
//! divergence metrics via the `metrics` crate.

pub mod repository;

pub use repository::DualRepository;
