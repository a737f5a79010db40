//! List command implementation.

use crate::display::parse_category;
use anyhow::Result;
use ducat_lib::InstrumentRegistry;

/// List known instruments, optionally filtered by category.
pub(crate) fn list_instruments(category: Option<&str>) -> Result<()> {
    let registry = InstrumentRegistry::global();

    let mut instruments: Vec<_> = match category {
        Some(cat) => registry.by_category(parse_category(cat)?).collect(),
        None => registry.all().collect(),
    };
    instruments.sort_by(|a, b| a.id().cmp(b.id()));

    if instruments.is_empty() {
        println!("No instruments found.");
        return Ok(());
    }

    println!("{:<15} {:<20} {:<10} {:>9}", "ID", "NAME", "CATEGORY", "DECIMALS");
    println!("{}", "-".repeat(57));

    for instrument in &instruments {
        println!(
            "{:<15} {:<20} {:<10} {:>9}",
            instrument.id(),
            instrument.name(),
            instrument.category(),
            instrument.price_scale()
        );
    }

    println!("\nTotal: {} instruments", instruments.len());
    Ok(())
}
