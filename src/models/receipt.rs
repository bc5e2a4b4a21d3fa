use bigdecimal::BigDecimal;
use serde::{Deserialize, Serialize};

use super::LineKey;

/// 收货明细 (MSEG), 同一 PO 行可以有多次部分收货
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GoodsReceiptLine {
    pub order_id: String,
    pub line_id: u32,
    pub material_id: String,
    pub received_qty: BigDecimal,
    pub received_value: BigDecimal, // DMBTR
}

impl GoodsReceiptLine {
    pub fn key(&self) -> LineKey {
        LineKey::new(self.order_id.clone(), self.line_id)
    }
}
