//! Order entity, read during restock.

use chrono::{DateTime, Utc};
use common::{CompanyId, Money, OrderId};
use serde::{Deserialize, Serialize};

/// A line item on an order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderItem {
    /// Stock keeping unit.
    pub sku: String,
    /// Product name for display.
    pub name: String,
    /// Units ordered.
    pub quantity: u32,
    /// Price per unit.
    pub unit_price: Money,
}

impl OrderItem {
    pub fn new(
        sku: impl Into<String>,
        name: impl Into<String>,
        quantity: u32,
        unit_price: Money,
    ) -> Self {
        Self {
            sku: sku.into(),
            name: name.into(),
            quantity,
            unit_price,
        }
    }
}

/// A customer order. The RTO engine only reads it to enumerate the SKUs
/// and quantities to return to stock.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    pub company_id: CompanyId,
    pub items: Vec<OrderItem>,
    pub created_at: DateTime<Utc>,
}

impl Order {
    /// Returns true if the order has line items.
    pub fn has_items(&self) -> bool {
        !self.items.is_empty()
    }

    /// Returns the total quantity across all line items.
    pub fn total_quantity(&self) -> u32 {
        self.items.iter().map(|item| item.quantity).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_total_quantity() {
        let order = Order {
            id: OrderId::new(),
            company_id: CompanyId::new(),
            items: vec![
                OrderItem::new("SKU-001", "Widget", 2, Money::from_cents(1000)),
                OrderItem::new("SKU-002", "Gadget", 1, Money::from_cents(2500)),
            ],
            created_at: Utc::now(),
        };

        assert!(order.has_items());
        assert_eq!(order.total_quantity(), 3);
    }

    #[test]
    fn test_empty_order() {
        let order = Order {
            id: OrderId::new(),
            company_id: CompanyId::new(),
            items: vec![],
            created_at: Utc::now(),
        };

        assert!(!order.has_items());
        assert_eq!(order.total_quantity(), 0);
    }
}
