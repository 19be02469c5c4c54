//! Bill of materials, proposal variant quoting and inventory costing

use bigdecimal::{BigDecimal, RoundingMode};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

use crate::tax::{PpnCalculation, PpnError, PpnRate};
use crate::types::LedgerError;
use crate::utils::money::round_money;

/// Scale kept for unit costs, finer than money so averages do not drift
const UNIT_COST_SCALE: i64 = 6;

#[derive(Debug, thiserror::Error)]
pub enum CostingError {
    #[error("Invalid quantity: {0}")]
    InvalidQuantity(String),
    #[error("Invalid cost: {0}")]
    InvalidCost(String),
    #[error("Insufficient stock: requested {requested}, on hand {on_hand}")]
    InsufficientStock {
        requested: BigDecimal,
        on_hand: BigDecimal,
    },
    #[error("Invalid margin: {0}")]
    InvalidMargin(String),
    #[error("Bill of materials '{0}' has no items")]
    EmptyBom(String),
    #[error(transparent)]
    Tax(#[from] PpnError),
}

impl From<CostingError> for LedgerError {
    fn from(err: CostingError) -> Self {
        LedgerError::Validation(err.to_string())
    }
}

fn ensure_positive_quantity(quantity: &BigDecimal) -> Result<(), CostingError> {
    if *quantity <= BigDecimal::from(0) {
        return Err(CostingError::InvalidQuantity(format!(
            "quantity must be positive, got {}",
            quantity
        )));
    }
    Ok(())
}

fn ensure_cost(unit_cost: &BigDecimal) -> Result<(), CostingError> {
    if *unit_cost < BigDecimal::from(0) {
        return Err(CostingError::InvalidCost(format!(
            "unit cost cannot be negative, got {}",
            unit_cost
        )));
    }
    Ok(())
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BomItem {
    pub sku: String,
    pub description: String,
    pub quantity: BigDecimal,
    pub unit_cost: BigDecimal,
}

impl BomItem {
    pub fn new(
        sku: impl Into<String>,
        description: impl Into<String>,
        quantity: BigDecimal,
        unit_cost: BigDecimal,
    ) -> Self {
        Self {
            sku: sku.into(),
            description: description.into(),
            quantity,
            unit_cost,
        }
    }

    pub fn line_cost(&self) -> BigDecimal {
        round_money(&(&self.quantity * &self.unit_cost))
    }
}

/// Components of one installation (panels, inverter, mounting, labour)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BillOfMaterials {
    pub name: String,
    pub items: Vec<BomItem>,
}

impl BillOfMaterials {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            items: Vec::new(),
        }
    }

    pub fn add_item(&mut self, item: BomItem) -> Result<(), CostingError> {
        ensure_positive_quantity(&item.quantity)?;
        ensure_cost(&item.unit_cost)?;
        self.items.push(item);
        Ok(())
    }

    pub fn with_item(mut self, item: BomItem) -> Result<Self, CostingError> {
        self.add_item(item)?;
        Ok(self)
    }

    pub fn total_cost(&self) -> BigDecimal {
        self.items.iter().map(|i| i.line_cost()).sum()
    }
}

/// One priced option of a proposal
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProposalVariant {
    pub name: String,
    pub bom: BillOfMaterials,
    /// Markup over cost, in percent
    pub margin_percent: BigDecimal,
    /// Installed capacity in watt-peak, for price per Wp
    pub capacity_wp: Option<BigDecimal>,
    pub ppn: PpnRate,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VariantQuote {
    pub variant: String,
    pub cost: BigDecimal,
    pub margin_amount: BigDecimal,
    /// Price before PPN
    pub selling_price: BigDecimal,
    pub tax_amount: BigDecimal,
    pub total_price: BigDecimal,
    pub price_per_wp: Option<BigDecimal>,
}

impl ProposalVariant {
    pub fn new(name: impl Into<String>, bom: BillOfMaterials, margin_percent: BigDecimal) -> Self {
        Self {
            name: name.into(),
            bom,
            margin_percent,
            capacity_wp: None,
            ppn: PpnRate::standard(),
        }
    }

    pub fn capacity_wp(mut self, capacity: BigDecimal) -> Self {
        self.capacity_wp = Some(capacity);
        self
    }

    pub fn quote(&self) -> Result<VariantQuote, CostingError> {
        if self.bom.items.is_empty() {
            return Err(CostingError::EmptyBom(self.bom.name.clone()));
        }
        if self.margin_percent < BigDecimal::from(0) {
            return Err(CostingError::InvalidMargin(format!(
                "margin cannot be negative, got {}",
                self.margin_percent
            )));
        }

        let cost = self.bom.total_cost();
        let margin_amount = round_money(&(&cost * &self.margin_percent / BigDecimal::from(100)));
        let selling_price = &cost + &margin_amount;
        let ppn = PpnCalculation::exclusive(selling_price.clone(), self.ppn.clone())?;

        let price_per_wp = match &self.capacity_wp {
            Some(capacity) if *capacity > BigDecimal::from(0) => {
                Some(round_money(&(&ppn.total_amount / capacity)))
            }
            Some(capacity) => {
                return Err(CostingError::InvalidQuantity(format!(
                    "capacity must be positive, got {}",
                    capacity
                )))
            }
            None => None,
        };

        Ok(VariantQuote {
            variant: self.name.clone(),
            cost,
            margin_amount,
            selling_price,
            tax_amount: ppn.tax_amount,
            total_price: ppn.total_amount,
            price_per_wp,
        })
    }
}

/// Quote every variant, cheapest first
pub fn compare_variants(variants: &[ProposalVariant]) -> Result<Vec<VariantQuote>, CostingError> {
    let mut quotes = variants
        .iter()
        .map(|v| v.quote())
        .collect::<Result<Vec<_>, _>>()?;
    quotes.sort_by(|a, b| a.total_price.cmp(&b.total_price));
    Ok(quotes)
}

/// Moving weighted-average inventory valuation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeightedAverageCost {
    pub quantity_on_hand: BigDecimal,
    pub average_cost: BigDecimal,
}

impl Default for WeightedAverageCost {
    fn default() -> Self {
        Self {
            quantity_on_hand: BigDecimal::from(0),
            average_cost: BigDecimal::from(0),
        }
    }
}

impl WeightedAverageCost {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn receive(&mut self, quantity: BigDecimal, unit_cost: BigDecimal) -> Result<(), CostingError> {
        ensure_positive_quantity(&quantity)?;
        ensure_cost(&unit_cost)?;

        let current_value = &self.quantity_on_hand * &self.average_cost;
        let incoming_value = &quantity * &unit_cost;
        let new_quantity = &self.quantity_on_hand + &quantity;

        self.average_cost = ((current_value + incoming_value) / &new_quantity)
            .with_scale_round(UNIT_COST_SCALE, RoundingMode::HalfUp);
        self.quantity_on_hand = new_quantity;
        Ok(())
    }

    /// Remove stock and return its cost of goods sold
    pub fn issue(&mut self, quantity: BigDecimal) -> Result<BigDecimal, CostingError> {
        ensure_positive_quantity(&quantity)?;
        if quantity > self.quantity_on_hand {
            return Err(CostingError::InsufficientStock {
                requested: quantity,
                on_hand: self.quantity_on_hand.clone(),
            });
        }

        let cogs = round_money(&(&quantity * &self.average_cost));
        self.quantity_on_hand -= &quantity;
        if self.quantity_on_hand == BigDecimal::from(0) {
            self.average_cost = BigDecimal::from(0);
        }
        Ok(cogs)
    }

    pub fn inventory_value(&self) -> BigDecimal {
        round_money(&(&self.quantity_on_hand * &self.average_cost))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CostLayer {
    pub quantity: BigDecimal,
    pub unit_cost: BigDecimal,
}

/// First-in first-out inventory valuation
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FifoCost {
    pub layers: VecDeque<CostLayer>,
}

impl FifoCost {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn receive(&mut self, quantity: BigDecimal, unit_cost: BigDecimal) -> Result<(), CostingError> {
        ensure_positive_quantity(&quantity)?;
        ensure_cost(&unit_cost)?;
        self.layers.push_back(CostLayer {
            quantity,
            unit_cost,
        });
        Ok(())
    }

    pub fn quantity_on_hand(&self) -> BigDecimal {
        self.layers.iter().map(|l| &l.quantity).sum()
    }

    /// Consume the oldest layers first and return the cost of goods sold
    pub fn issue(&mut self, quantity: BigDecimal) -> Result<BigDecimal, CostingError> {
        ensure_positive_quantity(&quantity)?;
        let on_hand = self.quantity_on_hand();
        if quantity > on_hand {
            return Err(CostingError::InsufficientStock {
                requested: quantity,
                on_hand,
            });
        }

        let zero = BigDecimal::from(0);
        let mut remaining = quantity;
        let mut cogs = zero.clone();
        while remaining > zero {
            let Some(layer) = self.layers.front_mut() else {
                break;
            };
            let taken = if layer.quantity <= remaining {
                layer.quantity.clone()
            } else {
                remaining.clone()
            };
            cogs += &taken * &layer.unit_cost;
            layer.quantity -= &taken;
            remaining -= &taken;
            if layer.quantity == zero {
                self.layers.pop_front();
            }
        }
        Ok(round_money(&cogs))
    }

    pub fn inventory_value(&self) -> BigDecimal {
        round_money(
            &self
                .layers
                .iter()
                .map(|l| &l.quantity * &l.unit_cost)
                .sum::<BigDecimal>(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn bom() -> BillOfMaterials {
        BillOfMaterials::new("PLTS 3 kWp")
            .with_item(BomItem::new("PNL-550", "Panel 550 Wp", BigDecimal::from(6), BigDecimal::from(2_000_000)))
            .unwrap()
            .with_item(BomItem::new("INV-3K", "Inverter 3 kW", BigDecimal::from(1), BigDecimal::from(6_000_000)))
            .unwrap()
    }

    #[test]
    fn test_variant_quote() {
        let variant = ProposalVariant::new("Standar", bom(), BigDecimal::from(20))
            .capacity_wp(BigDecimal::from(3_300));
        let quote = variant.quote().unwrap();

        assert_eq!(quote.cost, BigDecimal::from(18_000_000));
        assert_eq!(quote.margin_amount, BigDecimal::from(3_600_000));
        assert_eq!(quote.selling_price, BigDecimal::from(21_600_000));
        assert_eq!(quote.tax_amount, BigDecimal::from(2_376_000));
        assert_eq!(quote.total_price, BigDecimal::from(23_976_000));
        assert_eq!(quote.price_per_wp, Some(BigDecimal::from_str("7265.45").unwrap()));
    }

    #[test]
    fn test_compare_variants_orders_by_price() {
        let basic = ProposalVariant::new("Hemat", bom(), BigDecimal::from(10));
        let premium = ProposalVariant::new("Premium", bom(), BigDecimal::from(35));
        let quotes = compare_variants(&[premium, basic]).unwrap();
        assert_eq!(quotes[0].variant, "Hemat");
    }

    #[test]
    fn test_empty_bom_and_bad_items() {
        let variant = ProposalVariant::new("Kosong", BillOfMaterials::new("Kosong"), BigDecimal::from(10));
        assert!(matches!(variant.quote(), Err(CostingError::EmptyBom(_))));

        let mut bom = BillOfMaterials::new("Rusak");
        assert!(bom
            .add_item(BomItem::new("X", "Kabel", BigDecimal::from(0), BigDecimal::from(1)))
            .is_err());
    }

    #[test]
    fn test_weighted_average() {
        let mut stock = WeightedAverageCost::new();
        stock.receive(BigDecimal::from(10), BigDecimal::from(100)).unwrap();
        stock.receive(BigDecimal::from(10), BigDecimal::from(200)).unwrap();
        assert_eq!(stock.average_cost, BigDecimal::from(150));

        assert_eq!(stock.issue(BigDecimal::from(5)).unwrap(), BigDecimal::from(750));
        assert_eq!(stock.inventory_value(), BigDecimal::from(2_250));
        assert!(matches!(
            stock.issue(BigDecimal::from(100)),
            Err(CostingError::InsufficientStock { .. })
        ));
    }

    #[test]
    fn test_fifo_consumes_oldest_layers() {
        let mut stock = FifoCost::new();
        stock.receive(BigDecimal::from(10), BigDecimal::from(100)).unwrap();
        stock.receive(BigDecimal::from(10), BigDecimal::from(200)).unwrap();

        assert_eq!(stock.issue(BigDecimal::from(15)).unwrap(), BigDecimal::from(2_000));
        assert_eq!(stock.quantity_on_hand(), BigDecimal::from(5));
        assert_eq!(stock.inventory_value(), BigDecimal::from(1_000));
        assert!(stock.issue(BigDecimal::from(6)).is_err());
    }
}
