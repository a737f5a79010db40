//! Info command implementation.

use anyhow::Result;
use ducat_lib::{HolidayCalendar, InstrumentRegistry, Symbol};

/// Show how an instrument is resolved and which days it trades.
pub(crate) fn show_info(instrument_id: &str) -> Result<()> {
    let symbol = Symbol::new(instrument_id)?;
    let registry = InstrumentRegistry::global();
    let instrument = registry.resolve(&symbol);

    if registry.get(symbol.as_str()).is_none() {
        println!("Unknown instrument {symbol}; using default forex precision.\n");
    }

    println!("Instrument:     {}", instrument.name());
    println!("ID:             {}", instrument.id());
    println!("Category:       {}", instrument.category());
    println!("Decimal Factor: {}", instrument.decimal_factor());
    println!("Price Scale:    {} decimal places", instrument.price_scale());

    let calendar = HolidayCalendar::default();
    let today = chrono::Utc::now().date_naive();
    let closed: Vec<String> = (0..7)
        .filter_map(|offset| today.checked_add_days(chrono::Days::new(offset)))
        .filter(|day| calendar.is_non_trading(*day, instrument.category()))
        .map(|day| day.format("%a %Y-%m-%d").to_string())
        .collect();
    if closed.is_empty() {
        println!("Closed (next 7 days): none");
    } else {
        println!("Closed (next 7 days): {}", closed.join(", "));
    }

    Ok(())
}
