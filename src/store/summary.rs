// =============================================================================
// PRODUCT SUMMARY
// =============================================================================
// The "Products Ordered" cell is written as one line per product:
//
//     1. Athirasam (10 pcs) - Qty: 2 = $28.00
//     2. Gulab Jamun (Dry) (10 pcs) - Qty: 1 = $12.00
//
// The admin detail view parses these lines back. Writer and parser must
// stay byte-compatible; lines that do not match (older rows used a
// " | "-separated layout) come back as `SummaryLine::Raw`.
// =============================================================================

use std::sync::OnceLock;

use regex::Regex;
use rust_decimal::Decimal;
use serde::Serialize;

use crate::catalog::SelectedProduct;

use super::record::format_money;

const LINE_SEPARATOR: char = '\n';
const LEGACY_SEPARATOR: &str = " | ";

/// Render the cell text for a list of priced lines.
pub fn format_product_summary(lines: &[SelectedProduct]) -> String {
    lines
        .iter()
        .enumerate()
        .map(|(i, line)| {
            format!(
                "{}. {} ({}) - Qty: {} = {}",
                i + 1,
                line.product.name,
                line.product.pack_size,
                line.quantity,
                format_money(line.line_total)
            )
        })
        .collect::<Vec<_>>()
        .join(&LINE_SEPARATOR.to_string())
}

/// One line of a parsed summary cell.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum SummaryLine {
    #[serde(rename_all = "camelCase")]
    Parsed {
        number: u32,
        name: String,
        pack_size: String,
        quantity: u32,
        #[serde(with = "rust_decimal::serde::float")]
        price: Decimal,
    },
    Raw {
        text: String,
    },
}

fn line_pattern() -> &'static Regex {
    static LINE: OnceLock<Regex> = OnceLock::new();
    LINE.get_or_init(|| {
        // Pack size is the last parenthesised group; names may carry their own
        Regex::new(r"^([0-9]+)\.\s+(.+)\s+\(([^()]+)\)\s+-\s+Qty:\s+([0-9]+)\s+=\s+\$(.+)$")
            .expect("summary line pattern compiles")
    })
}

/// Split a summary cell into lines and parse each one.
pub fn parse_product_summary(cell: &str) -> Vec<SummaryLine> {
    let cell = cell.trim();
    if cell.is_empty() {
        return Vec::new();
    }

    let mut parts: Vec<&str> = cell.split(LINE_SEPARATOR).collect();
    if parts.len() == 1 && cell.contains(LEGACY_SEPARATOR) {
        parts = cell.split(LEGACY_SEPARATOR).collect();
    }

    parts
        .into_iter()
        .map(|part| part.trim_end_matches('\r').trim())
        .filter(|part| !part.is_empty())
        .map(parse_line)
        .collect()
}

fn parse_line(line: &str) -> SummaryLine {
    let raw = || SummaryLine::Raw {
        text: line.to_string(),
    };
    let Some(caps) = line_pattern().captures(line) else {
        return raw();
    };

    let number = caps[1].parse::<u32>();
    let quantity = caps[4].parse::<u32>();
    let price = caps[5].trim().replace(',', "").parse::<Decimal>();
    match (number, quantity, price) {
        (Ok(number), Ok(quantity), Ok(price)) => SummaryLine::Parsed {
            number,
            name: caps[2].to_string(),
            pack_size: caps[3].to_string(),
            quantity,
            price,
        },
        _ => raw(),
    }
}
