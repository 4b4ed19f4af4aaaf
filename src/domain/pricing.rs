//! Price breakdown derivation for booking quotes
//!
//! Quotes arrive from the backend as floats. They are converted to
//! `Decimal` once at the boundary and all sums are exact from there on.
//! Only `tax` and `total` are rounded (2 dp, midpoint away from zero);
//! display strings round every amount.

use crate::error::ValidationError;
use rust_decimal::prelude::FromPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

/// Tax rate applied when the quote does not carry one (8%)
pub const DEFAULT_TAX_RATE: Decimal = Decimal::from_parts(8, 0, 0, false, 2);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModifierKind {
    Weekend,
    PeakHour,
    Surge,
    Area,
}

impl ModifierKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ModifierKind::Weekend => "weekend",
            ModifierKind::PeakHour => "peak_hour",
            ModifierKind::Surge => "surge",
            ModifierKind::Area => "area",
        }
    }
}

/// Surcharge or reduction as supplied by the backend
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuoteModifier {
    #[serde(rename = "type")]
    pub kind: ModifierKind,
    pub name: String,
    #[serde(default)]
    pub amount: Option<f64>,
}

/// Raw pricing quote. Numeric fields stay optional so that a missing
/// field is reported as such instead of failing deserialization.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PricingQuote {
    pub base_price: Option<f64>,
    pub sub_services: Option<f64>,
    #[serde(default)]
    pub modifiers: Vec<QuoteModifier>,
    pub travel_fee: Option<f64>,
    pub tax_rate: Option<f64>,
    pub discount: Option<f64>,
}

impl PricingQuote {
    /// Quote with the three required amounts set and everything else defaulted
    pub fn new(base_price: f64, sub_services: f64, travel_fee: f64) -> Self {
        Self {
            base_price: Some(base_price),
            sub_services: Some(sub_services),
            travel_fee: Some(travel_fee),
            ..Default::default()
        }
    }

    pub fn with_modifier(mut self, kind: ModifierKind, name: &str, amount: f64) -> Self {
        self.modifiers.push(QuoteModifier { kind, name: name.to_string(), amount: Some(amount) });
        self
    }

    pub fn with_tax_rate(mut self, tax_rate: f64) -> Self {
        self.tax_rate = Some(tax_rate);
        self
    }

    pub fn with_discount(mut self, discount: f64) -> Self {
        self.discount = Some(discount);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BreakdownModifier {
    #[serde(rename = "type")]
    pub kind: ModifierKind,
    pub name: String,
    pub amount: Decimal,
}

/// Render-ready breakdown. Replaced wholesale whenever the quote changes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PriceBreakdown {
    pub base_price: Decimal,
    pub sub_services: Decimal,
    /// Same order as the quote
    pub modifiers: Vec<BreakdownModifier>,
    pub travel_fee: Decimal,
    /// Exact sum, not rounded
    pub subtotal: Decimal,
    pub tax_rate: Decimal,
    pub tax: Decimal,
    pub discount: Decimal,
    pub total: Decimal,
}

/// Derive a breakdown from a backend quote.
///
/// `basePrice`, `subServices`, `travelFee` and every modifier `amount` are
/// required. `taxRate` defaults to [`DEFAULT_TAX_RATE`], `discount` to zero.
pub fn compute_breakdown(quote: Option<&PricingQuote>) -> Result<PriceBreakdown, ValidationError> {
    let quote = quote.ok_or(ValidationError::MissingQuote)?;

    let base_price = required(quote.base_price, "basePrice")?;
    let sub_services = required(quote.sub_services, "subServices")?;
    let travel_fee = required(quote.travel_fee, "travelFee")?;
    let tax_rate = optional(quote.tax_rate, "taxRate", DEFAULT_TAX_RATE)?;
    let discount = optional(quote.discount, "discount", Decimal::ZERO)?;

    let modifiers = quote
        .modifiers
        .iter()
        .enumerate()
        .map(|(i, m)| {
            let field = format!("modifiers[{i}].amount");
            let amount = match m.amount {
                Some(v) => to_decimal(v, &field)?,
                None => return Err(ValidationError::MissingField(field)),
            };
            Ok(BreakdownModifier { kind: m.kind, name: m.name.clone(), amount })
        })
        .collect::<Result<Vec<_>, _>>()?;

    let subtotal = [base_price, sub_services, travel_fee]
        .into_iter()
        .chain(modifiers.iter().map(|m| m.amount))
        .try_fold(Decimal::ZERO, Decimal::checked_add)
        .ok_or_else(|| out_of_range("subtotal"))?;
    let tax = subtotal.checked_mul(tax_rate).map(round2).ok_or_else(|| out_of_range("tax"))?;
    let total = subtotal
        .checked_add(tax)
        .and_then(|v| v.checked_sub(discount))
        .map(round2)
        .ok_or_else(|| out_of_range("total"))?;

    Ok(PriceBreakdown {
        base_price,
        sub_services,
        modifiers,
        travel_fee,
        subtotal,
        tax_rate,
        tax,
        discount,
        total,
    })
}

fn required(value: Option<f64>, field: &str) -> Result<Decimal, ValidationError> {
    match value {
        Some(v) => to_decimal(v, field),
        None => Err(ValidationError::MissingField(field.to_string())),
    }
}

fn optional(value: Option<f64>, field: &str, default: Decimal) -> Result<Decimal, ValidationError> {
    match value {
        Some(v) => to_decimal(v, field),
        None => Ok(default),
    }
}

fn out_of_range(field: &str) -> ValidationError {
    ValidationError::OutOfRange(field.to_string())
}

fn to_decimal(value: f64, field: &str) -> Result<Decimal, ValidationError> {
    if !value.is_finite() {
        return Err(ValidationError::NonFinite(field.to_string()));
    }
    Decimal::from_f64(value).ok_or_else(|| out_of_range(field))
}

/// Round to cents, half away from zero
#[inline]
pub fn round2(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

/// `$12.50` style string for an unsigned amount
pub fn format_money(value: Decimal) -> String {
    let mut cents = round2(value.abs());
    cents.rescale(2);
    format!("${cents}")
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineKind {
    Base,
    SubServices,
    Modifier(ModifierKind),
    TravelFee,
    Subtotal,
    Tax,
    Discount,
    Total,
}

/// One row of the price breakdown panel
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DisplayLine {
    pub kind: LineKind,
    pub label: String,
    pub amount: String,
}

impl DisplayLine {
    fn new(kind: LineKind, label: impl Into<String>, amount: String) -> Self {
        Self { kind, label: label.into(), amount }
    }
}

impl PriceBreakdown {
    /// Rows in panel order. Zero sub-services, travel fee and discount are
    /// omitted here; the breakdown itself still carries them.
    pub fn display_lines(&self) -> Vec<DisplayLine> {
        let mut lines = Vec::with_capacity(self.modifiers.len() + 7);

        lines.push(DisplayLine::new(LineKind::Base, "Base Service", format_money(self.base_price)));

        if self.sub_services > Decimal::ZERO {
            lines.push(DisplayLine::new(
                LineKind::SubServices,
                "Additional Services",
                format_money(self.sub_services),
            ));
        }

        for m in &self.modifiers {
            let amount = if m.amount > Decimal::ZERO {
                format!("+{}", format_money(m.amount))
            } else if m.amount < Decimal::ZERO {
                format!("-{}", format_money(m.amount))
            } else {
                format_money(m.amount)
            };
            lines.push(DisplayLine::new(LineKind::Modifier(m.kind), m.name.clone(), amount));
        }

        if self.travel_fee > Decimal::ZERO {
            lines.push(DisplayLine::new(
                LineKind::TravelFee,
                "Travel Fee",
                format_money(self.travel_fee),
            ));
        }

        lines.push(DisplayLine::new(LineKind::Subtotal, "Subtotal", format_money(self.subtotal)));

        let pct = (self.tax_rate * Decimal::ONE_HUNDRED).normalize();
        lines.push(DisplayLine::new(LineKind::Tax, format!("Tax ({pct}%)"), format_money(self.tax)));

        if self.discount > Decimal::ZERO {
            lines.push(DisplayLine::new(
                LineKind::Discount,
                "Discount",
                format!("-{}", format_money(self.discount)),
            ));
        }

        lines.push(DisplayLine::new(LineKind::Total, "Total", format_money(self.total)));
        lines
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    fn weekend_quote() -> PricingQuote {
        PricingQuote::new(100.0, 0.0, 10.0)
            .with_modifier(ModifierKind::Weekend, "Weekend", 15.0)
            .with_tax_rate(0.08)
            .with_discount(5.0)
    }

    #[test]
    fn test_weekend_example() {
        let b = compute_breakdown(Some(&weekend_quote())).unwrap();
        assert_eq!(b.subtotal, dec("125"));
        assert_eq!(b.tax, dec("10.00"));
        assert_eq!(b.total, dec("130.00"));
        // zero sub-services is kept in the data
        assert_eq!(b.sub_services, Decimal::ZERO);
    }

    #[test]
    fn test_total_matches_formula() {
        let quotes = [
            weekend_quote(),
            PricingQuote::new(49.99, 12.5, 3.33)
                .with_modifier(ModifierKind::Surge, "Surge", 7.77)
                .with_modifier(ModifierKind::Area, "Remote area", -2.01)
                .with_tax_rate(0.0725)
                .with_discount(1.5),
            PricingQuote::new(0.1, 0.2, 0.0),
        ];

        for quote in &quotes {
            let b = compute_breakdown(Some(quote)).unwrap();
            let mods: Decimal = b.modifiers.iter().map(|m| m.amount).sum();
            let expected = round2(
                b.base_price + b.sub_services + b.travel_fee + mods + b.tax - b.discount,
            );
            assert_eq!(b.total, expected);
            assert_eq!(b.tax, round2(b.subtotal * b.tax_rate));
        }
    }

    #[test]
    fn test_no_float_drift() {
        let b = compute_breakdown(Some(&PricingQuote::new(0.1, 0.2, 0.0))).unwrap();
        assert_eq!(b.subtotal, dec("0.3"));
        assert_eq!(b.tax, dec("0.02"));
        assert_eq!(b.total, dec("0.32"));
    }

    #[test]
    fn test_tax_rounds_half_away_from_zero() {
        // 1.5625 * 0.08 = 0.125
        let b = compute_breakdown(Some(&PricingQuote::new(1.5625, 0.0, 0.0))).unwrap();
        assert_eq!(b.tax, dec("0.13"));
    }

    #[test]
    fn test_default_tax_rate_and_discount() {
        let b = compute_breakdown(Some(&PricingQuote::new(50.0, 0.0, 0.0))).unwrap();
        assert_eq!(b.tax_rate, dec("0.08"));
        assert_eq!(b.discount, Decimal::ZERO);
        assert_eq!(b.tax, dec("4.00"));
        assert_eq!(b.total, dec("54.00"));
    }

    #[test]
    fn test_idempotent() {
        let quote = weekend_quote();
        let first = compute_breakdown(Some(&quote)).unwrap();
        let second = compute_breakdown(Some(&quote)).unwrap();
        assert_eq!(first, second);
        assert_eq!(
            serde_json::to_string(&first).unwrap(),
            serde_json::to_string(&second).unwrap()
        );
    }

    #[test]
    fn test_modifier_order_preserved() {
        let pool = [
            (ModifierKind::Weekend, "Weekend", 15.0),
            (ModifierKind::PeakHour, "Peak hour", 8.0),
            (ModifierKind::Surge, "Surge", 4.5),
            (ModifierKind::Area, "Area", -3.0),
            (ModifierKind::Surge, "Late surge", 1.25),
        ];

        for len in 0..=pool.len() {
            // every rotation of the first `len` entries
            for shift in 0..len.max(1) {
                let mut quote = PricingQuote::new(20.0, 0.0, 0.0);
                let order: Vec<_> = (0..len).map(|i| pool[(i + shift) % len]).collect();
                for (kind, name, amount) in &order {
                    quote = quote.with_modifier(*kind, name, *amount);
                }

                let b = compute_breakdown(Some(&quote)).unwrap();
                let names: Vec<&str> = b.modifiers.iter().map(|m| m.name.as_str()).collect();
                let expected: Vec<&str> = order.iter().map(|(_, n, _)| *n).collect();
                assert_eq!(names, expected);
            }
        }
    }

    #[test]
    fn test_missing_quote() {
        assert_eq!(compute_breakdown(None), Err(ValidationError::MissingQuote));
    }

    #[test]
    fn test_missing_required_field() {
        let mut quote = weekend_quote();
        quote.travel_fee = None;
        assert_eq!(
            compute_breakdown(Some(&quote)),
            Err(ValidationError::MissingField("travelFee".to_string()))
        );
    }

    #[test]
    fn test_missing_modifier_amount() {
        let mut quote = weekend_quote();
        quote.modifiers.push(QuoteModifier {
            kind: ModifierKind::Area,
            name: "Area".to_string(),
            amount: None,
        });
        assert_eq!(
            compute_breakdown(Some(&quote)),
            Err(ValidationError::MissingField("modifiers[1].amount".to_string()))
        );
    }

    #[test]
    fn test_non_finite_rejected() {
        let quote = PricingQuote::new(f64::NAN, 0.0, 0.0);
        assert_eq!(
            compute_breakdown(Some(&quote)),
            Err(ValidationError::NonFinite("basePrice".to_string()))
        );

        let quote = PricingQuote::new(10.0, 0.0, 0.0).with_tax_rate(f64::INFINITY);
        assert_eq!(
            compute_breakdown(Some(&quote)),
            Err(ValidationError::NonFinite("taxRate".to_string()))
        );
    }

    #[test]
    fn test_overflowing_quote_is_out_of_range() {
        let quote = PricingQuote::new(7.0e28, 7.0e28, 0.0);
        assert_eq!(
            compute_breakdown(Some(&quote)),
            Err(ValidationError::OutOfRange("subtotal".to_string()))
        );

        let quote = PricingQuote::new(1e20, 0.0, 0.0).with_tax_rate(1e12);
        assert_eq!(
            compute_breakdown(Some(&quote)),
            Err(ValidationError::OutOfRange("tax".to_string()))
        );

        let quote = PricingQuote::new(7.0e28, 0.0, 0.0).with_tax_rate(0.0).with_discount(-7.0e28);
        assert_eq!(
            compute_breakdown(Some(&quote)),
            Err(ValidationError::OutOfRange("total".to_string()))
        );
    }

    #[test]
    fn test_deserialize_backend_quote() {
        let json = r#"{
            "basePrice": 100,
            "subServices": 0,
            "modifiers": [{"type": "peak_hour", "name": "Evening peak", "amount": 12.5}],
            "travelFee": 10,
            "taxRate": 0.08,
            "discount": 0
        }"#;
        let quote: PricingQuote = serde_json::from_str(json).unwrap();
        assert_eq!(quote.modifiers[0].kind, ModifierKind::PeakHour);

        let b = compute_breakdown(Some(&quote)).unwrap();
        assert_eq!(b.subtotal, dec("122.5"));
        assert_eq!(b.tax, dec("9.80"));
        assert_eq!(b.total, dec("132.30"));
    }

    #[test]
    fn test_display_lines_suppress_zero_rows() {
        let b = compute_breakdown(Some(&weekend_quote())).unwrap();
        let lines = b.display_lines();
        let labels: Vec<&str> = lines.iter().map(|l| l.label.as_str()).collect();
        assert_eq!(
            labels,
            ["Base Service", "Weekend", "Travel Fee", "Subtotal", "Tax (8%)", "Discount", "Total"]
        );

        let amounts: Vec<&str> = lines.iter().map(|l| l.amount.as_str()).collect();
        assert_eq!(
            amounts,
            ["$100.00", "+$15.00", "$10.00", "$125.00", "$10.00", "-$5.00", "$130.00"]
        );
    }

    #[test]
    fn test_display_lines_negative_modifier_and_sub_services() {
        let quote = PricingQuote::new(40.0, 12.0, 0.0)
            .with_modifier(ModifierKind::Area, "Loyalty area", -4.0);
        let b = compute_breakdown(Some(&quote)).unwrap();
        let lines = b.display_lines();

        assert_eq!(lines[1].kind, LineKind::SubServices);
        assert_eq!(lines[1].amount, "$12.00");
        assert_eq!(lines[2].kind, LineKind::Modifier(ModifierKind::Area));
        assert_eq!(lines[2].amount, "-$4.00");
        assert!(lines.iter().all(|l| l.kind != LineKind::TravelFee));
        assert!(lines.iter().all(|l| l.kind != LineKind::Discount));
    }

    #[test]
    fn test_format_money() {
        assert_eq!(format_money(dec("125")), "$125.00");
        assert_eq!(format_money(dec("0.005")), "$0.01");
        assert_eq!(format_money(dec("-3.5")), "$3.50");
    }
}
