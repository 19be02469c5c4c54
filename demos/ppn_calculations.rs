//! PPN calculation examples

use std::str::FromStr;

use bigdecimal::BigDecimal;
use pembukuan_core::costing::{compare_variants, BillOfMaterials, BomItem, ProposalVariant};
use pembukuan_core::{DocumentLine, DocumentTotals, PpnCalculation, PpnCategory, PpnRate};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("Pembukuan Core - PPN Calculation Examples\n");

    // 1. Rates by category
    println!("Rates by category:");
    let categories = [
        (PpnCategory::Standard, "Barang dan jasa kena pajak"),
        (PpnCategory::Luxury, "Barang mewah"),
        (PpnCategory::Export, "Ekspor"),
        (PpnCategory::Exempt, "Kebutuhan pokok, jasa kesehatan"),
    ];
    for (category, description) in categories.iter() {
        println!("  {:?}: {}% - {}", category, category.rate().rate, description);
    }
    println!();

    // 2. Exclusive: PPN on top of the base
    let exclusive = PpnCalculation::exclusive(BigDecimal::from(1_000_000), PpnRate::standard())?;
    println!("Exclusive (PPN on top):");
    println!("  DPP:   Rp{}", exclusive.base_amount);
    println!("  PPN:   Rp{}", exclusive.tax_amount);
    println!("  Total: Rp{}", exclusive.total_amount);
    println!();

    // 3. Inclusive: split a gross amount
    let inclusive = PpnCalculation::inclusive(BigDecimal::from(1_110_000), PpnRate::standard())?;
    println!("Inclusive (PPN already in the price):");
    println!("  Total: Rp{}", inclusive.total_amount);
    println!("  DPP:   Rp{}", inclusive.base_amount);
    println!("  PPN:   Rp{}", inclusive.tax_amount);
    println!();

    // 4. Invoice totals with a discount; PPN is charged after the discount
    let lines = vec![
        DocumentLine::new("Panel surya 550 Wp", BigDecimal::from(6), BigDecimal::from(2_750_000)),
        DocumentLine::new("Inverter hybrid 3 kW", BigDecimal::from(1), BigDecimal::from(8_500_000)),
        DocumentLine::new("Jasa pemasangan", BigDecimal::from(1), BigDecimal::from(3_000_000)),
    ];
    let totals = DocumentTotals::compute(&lines, &PpnRate::standard(), &BigDecimal::from(1_000_000))?;
    println!("Invoice totals:");
    println!("  Subtotal: Rp{}", totals.subtotal);
    println!("  Diskon:   Rp{}", totals.discount_amount);
    println!("  DPP:      Rp{}", totals.taxable_base);
    println!("  PPN 11%:  Rp{}", totals.tax_amount);
    println!("  Total:    Rp{}", totals.total_amount);
    println!();

    // 5. Proposal variants priced from their bill of materials
    let on_grid = BillOfMaterials::new("On-grid 3 kWp")
        .with_item(BomItem::new("PV-550", "Panel 550 Wp", BigDecimal::from(6), BigDecimal::from(2_100_000)))?
        .with_item(BomItem::new("INV-3K", "Inverter on-grid", BigDecimal::from(1), BigDecimal::from(5_200_000)))?;
    let hybrid = BillOfMaterials::new("Hybrid 3 kWp")
        .with_item(BomItem::new("PV-550", "Panel 550 Wp", BigDecimal::from(6), BigDecimal::from(2_100_000)))?
        .with_item(BomItem::new("INV-H3K", "Inverter hybrid", BigDecimal::from(1), BigDecimal::from(8_500_000)))?
        .with_item(BomItem::new(
            "BAT-5",
            "Baterai LiFePO4 5 kWh",
            BigDecimal::from(1),
            BigDecimal::from_str("14500000.00")?,
        ))?;

    let variants = vec![
        ProposalVariant::new("Hybrid", hybrid, BigDecimal::from(25)).capacity_wp(BigDecimal::from(3_300)),
        ProposalVariant::new("On-grid", on_grid, BigDecimal::from(20)).capacity_wp(BigDecimal::from(3_300)),
    ];
    println!("Proposal variants (cheapest first):");
    for quote in compare_variants(&variants)? {
        println!(
            "  {}: cost Rp{}, price Rp{}, PPN Rp{}, total Rp{} ({:?} per Wp)",
            quote.variant,
            quote.cost,
            quote.selling_price,
            quote.tax_amount,
            quote.total_price,
            quote.price_per_wp
        );
    }

    Ok(())
}
