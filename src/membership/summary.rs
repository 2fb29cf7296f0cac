use crate::membership::Order;
use chrono::NaiveDate;

#[derive(Debug, Clone, PartialEq)]
pub struct ProductSummary {
    pub product: String,
    pub quantity: u32,
    pub last_ordered: Option<NaiveDate>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PurchaseSummary {
    pub total_items: u32,
    /// In the order each product first appears.
    pub products: Vec<ProductSummary>,
}

impl PurchaseSummary {
    pub fn from_orders(orders: &[Order]) -> Self {
        let mut summary = Self::default();

        for order in orders {
            for line in &order.lines {
                summary.total_items = summary.total_items.saturating_add(line.quantity);

                match summary.products.iter_mut().find(|p| p.product == line.product) {
                    Some(existing) => {
                        existing.quantity = existing.quantity.saturating_add(line.quantity);
                        existing.last_ordered = existing.last_ordered.max(order.placed_at);
                    }
                    None => summary.products.push(ProductSummary {
                        product: line.product.clone(),
                        quantity: line.quantity,
                        last_ordered: order.placed_at,
                    }),
                }
            }
        }

        summary
    }

    pub fn is_empty(&self) -> bool {
        self.products.is_empty()
    }
}
