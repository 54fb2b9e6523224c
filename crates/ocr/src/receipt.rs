use carbon_core::ParsedItem;

// Optional quantity (numeral + unit) followed by an alphabetic run for the item name.
re!(re_line_item,
    r"([0-9]+\.?[0-9]*\s*(?:kg|g|l|liter|litre|bag|unit)?)?\s*([a-z\s]+)");
re!(re_numeral,
    r"[0-9]+\.?[0-9]*");

/// Turn receipt OCR text into `(item, quantity)` records, in text order.
///
/// Names are lowercased and trimmed; a record may carry an empty name, which never matches
/// an emission factor. Quantities default to 1.0 and tokens containing `g` are treated as
/// grams and converted to kilograms.
pub fn parse_receipt(text: &str) -> Vec<ParsedItem> {
    let lowered = text.to_lowercase();
    let items: Vec<ParsedItem> = re_line_item()
        .captures_iter(&lowered)
        .map(|c| {
            let token = c.get(1).map(|m| m.as_str().trim()).unwrap_or("");
            let name = c.get(2).map(|m| m.as_str().trim()).unwrap_or("");
            ParsedItem::new(name, parse_quantity(token))
        })
        .collect();
    tracing::debug!(count = items.len(), ?items, "Parsed receipt items");
    items
}

/// Leading numeral of `token`, scaled from grams when the token mentions `g`.
///
/// The `g` check is a plain substring test, so `kg` and `bag` also divide by 1000.
fn parse_quantity(token: &str) -> f64 {
    let mut qty = re_numeral()
        .find(token)
        .and_then(|m| m.as_str().parse::<f64>().ok())
        .filter(|q| q.is_finite() && *q > 0.0)
        .unwrap_or(1.0);
    if token.contains('g') {
        qty /= 1000.0;
    }
    qty
}
