//! Expected data of the order scenario.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Inclusive date range for the order-list query
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    /// First day
    pub start: NaiveDate,
    /// Last day
    pub end: NaiveDate,
}

impl DateRange {
    /// Create a range, swapping the bounds if given in reverse
    #[must_use]
    pub fn new(start: NaiveDate, end: NaiveDate) -> Self {
        if start <= end {
            Self { start, end }
        } else {
            Self {
                start: end,
                end: start,
            }
        }
    }
}

impl Default for DateRange {
    fn default() -> Self {
        Self {
            start: NaiveDate::from_ymd_opt(2025, 12, 1).unwrap_or_default(),
            end: NaiveDate::from_ymd_opt(2025, 12, 31).unwrap_or_default(),
        }
    }
}

/// One order and the values its list row and detail page must show
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OrderCase {
    /// Tenant shown in the header after login
    pub tenant: String,
    /// Query range
    pub date_range: DateRange,
    /// Order number
    pub order_number: String,
    /// Document status
    pub status: String,
    /// Ordering store
    pub store: String,
    /// Order source
    pub source: String,
    /// Order date as displayed
    pub order_date: String,
    /// Ordering store code
    pub store_code: String,
    /// Product code of the single line item
    pub product_code: String,
    /// Product name of the single line item
    pub product_name: String,
    /// Number of line-item rows carrying `product_code`
    pub line_items: usize,
}

impl Default for OrderCase {
    fn default() -> Self {
        Self {
            tenant: "合阔x".into(),
            date_range: DateRange::default(),
            order_number: "342512080002".into(),
            status: "已审核".into(),
            store: "WEN测试直营门店01".into(),
            source: "总部分配".into(),
            order_date: "2025-12-08".into(),
            store_code: "100000010".into(),
            product_code: "T20251128012".into(),
            product_name: "测试20251128012".into(),
            line_items: 1,
        }
    }
}

impl OrderCase {
    /// List-row fields as `(label, expected)` pairs
    #[must_use]
    pub fn row_fields(&self) -> [(&'static str, &str); 4] {
        [
            ("status", self.status.as_str()),
            ("store", self.store.as_str()),
            ("source", self.source.as_str()),
            ("order date", self.order_date.as_str()),
        ]
    }
}
