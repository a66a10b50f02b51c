// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderDirection {
    Asc,
    Desc,
}

impl Default for OrderDirection {
    fn default() -> Self {
        OrderDirection::Asc
    }
}

/// Offset-pagination parameters for `list`/`find_by_field` (§4.1).
#[derive(Debug, Clone, Default)]
pub struct Pageable {
    pub limit: u64,
    pub page_number: Option<u64>,
    pub order_by: Option<String>,
    pub order_direction: Option<OrderDirection>,
}

impl Pageable {
    pub fn offset(&self) -> u64 {
        self.page_number.unwrap_or(0) * self.limit
    }
}
