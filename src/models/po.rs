use bigdecimal::BigDecimal;
use serde::{Deserialize, Serialize};

/// 行键: (采购订单号, 行号) 唯一定位一条 PO 明细
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LineKey {
    pub order_id: String,
    pub line_id: u32,
}

impl LineKey {
    pub fn new(order_id: impl Into<String>, line_id: u32) -> Self {
        Self {
            order_id: order_id.into(),
            line_id,
        }
    }
}

impl std::fmt::Display for LineKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}-{}", self.order_id, self.line_id)
    }
}

/// 采购订单明细 (EKPO)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PurchaseOrderLine {
    pub order_id: String,     // EBELN
    pub line_id: u32,         // EBELP
    pub material_id: String,  // MATNR
    pub ordered_qty: BigDecimal,
    pub unit_price: BigDecimal,
    pub currency: String,
}

impl PurchaseOrderLine {
    pub fn key(&self) -> LineKey {
        LineKey::new(self.order_id.clone(), self.line_id)
    }
}
