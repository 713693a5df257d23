//! Add/delete operations over the settings collections.
//!
//! Settings are never edited in place: every change produces a fresh
//! [`AppState`] that the caller persists in full.

use std::fmt;

use chrono::Utc;
use clap::ValueEnum;
use tracing::debug;

use crate::model::{AppState, BusinessProfile, Identified, Package, PaymentMethod};

const DEFAULT_FOOTER_NOTE: &str = "Thank you for your business.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Collection {
    Business,
    Package,
    Payment,
    Currency,
}

impl fmt::Display for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let title = match self {
            Collection::Business => "Businesses",
            Collection::Package => "Packages",
            Collection::Payment => "Payment Methods",
            Collection::Currency => "Currencies",
        };
        f.write_str(title)
    }
}

#[derive(Debug, Clone, Default)]
pub struct NewBusiness {
    pub name: String,
    pub email: String,
    pub website: String,
    pub footer_note: String,
}

/// Package form input; numeric fields are raw text and parsed leniently.
#[derive(Debug, Clone, Default)]
pub struct NewPackage {
    pub name: String,
    pub price: String,
    pub currency: Option<String>,
    pub duration_months: String,
}

#[derive(Debug, Clone, Default)]
pub struct NewPaymentMethod {
    pub name: String,
    pub details: String,
}

#[derive(Debug, Clone)]
pub enum SettingsChange {
    AddBusiness(NewBusiness),
    AddPackage(NewPackage),
    AddPaymentMethod(NewPaymentMethod),
    AddCurrency(String),
    /// Removes by id, or by code for currencies. No cascade.
    Remove(Collection, String),
}

impl AppState {
    pub fn apply(&self, change: SettingsChange) -> AppState {
        let mut next = self.clone();
        match change {
            SettingsChange::AddBusiness(input) => {
                let id = next_id(&next.businesses);
                let footer_note = if input.footer_note.is_empty() {
                    DEFAULT_FOOTER_NOTE.to_string()
                } else {
                    input.footer_note
                };
                next.businesses.push(BusinessProfile {
                    id,
                    name: input.name,
                    email: input.email,
                    website: input.website,
                    footer_note,
                });
            }
            SettingsChange::AddPackage(input) => {
                let id = next_id(&next.packages);
                let currency = input
                    .currency
                    .filter(|c| !c.is_empty())
                    .or_else(|| next.currencies.first().cloned())
                    .unwrap_or_else(|| "USD".to_string());
                next.packages.push(Package {
                    id,
                    name: input.name,
                    price: parse_price(&input.price),
                    currency,
                    duration_months: parse_duration(&input.duration_months),
                    features: vec![],
                });
            }
            SettingsChange::AddPaymentMethod(input) => {
                let id = next_id(&next.payment_methods);
                next.payment_methods.push(PaymentMethod {
                    id,
                    name: input.name,
                    details: input.details,
                });
            }
            SettingsChange::AddCurrency(code) => {
                let code = code.trim().to_uppercase();
                if code.is_empty() || next.currencies.contains(&code) {
                    debug!(%code, "currency ignored");
                } else {
                    next.currencies.push(code);
                }
            }
            SettingsChange::Remove(collection, key) => match collection {
                Collection::Business => next.businesses.retain(|b| b.id != key),
                Collection::Package => next.packages.retain(|p| p.id != key),
                Collection::Payment => next.payment_methods.retain(|p| p.id != key),
                Collection::Currency => next.currencies.retain(|c| *c != key),
            },
        }
        next
    }
}

/// Millisecond timestamp id, bumped past any id already in the collection.
fn next_id<T: Identified>(existing: &[T]) -> String {
    let mut candidate = Utc::now().timestamp_millis();
    while existing.iter().any(|item| item.id() == candidate.to_string()) {
        candidate += 1;
    }
    candidate.to_string()
}

/// Numeric prefix of `input`, the way a form field would read it.
fn leading_number(input: &str) -> Option<f64> {
    let trimmed = input.trim();
    let end = trimmed
        .char_indices()
        .take_while(|(i, c)| c.is_ascii_digit() || *c == '.' || (*i == 0 && (*c == '-' || *c == '+')))
        .map(|(i, c)| i + c.len_utf8())
        .last()?;
    trimmed[..end].parse().ok()
}

pub fn parse_price(input: &str) -> f64 {
    leading_number(input)
        .filter(|p| p.is_finite() && *p > 0.0)
        .unwrap_or(0.0)
}

pub fn parse_duration(input: &str) -> f64 {
    leading_number(input)
        .filter(|d| d.is_finite() && *d > 0.0)
        .unwrap_or(1.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::default_settings;

    #[test]
    fn lenient_numbers() {
        assert_eq!(parse_price("12.5"), 12.5);
        assert_eq!(parse_price("20abc"), 20.0);
        assert_eq!(parse_price("abc"), 0.0);
        assert_eq!(parse_price(""), 0.0);
        assert_eq!(parse_price("-4"), 0.0);
        assert_eq!(parse_duration("6"), 6.0);
        assert_eq!(parse_duration("1.5"), 1.5);
        assert_eq!(parse_duration("0"), 1.0);
        assert_eq!(parse_duration("soon"), 1.0);
    }

    #[test]
    fn package_defaults_to_first_currency() {
        let mut state = default_settings();
        state.currencies = vec!["EUR".into(), "USD".into()];
        let next = state.apply(SettingsChange::AddPackage(NewPackage {
            name: "Weekly".into(),
            price: "x".into(),
            currency: None,
            duration_months: "".into(),
        }));
        let added = next.packages.last().unwrap();
        assert_eq!(added.name, "Weekly");
        assert_eq!(added.currency, "EUR");
        assert_eq!(added.price, 0.0);
        assert_eq!(added.duration_months, 1.0);
        assert!(added.features.is_empty());
        assert_eq!(state.packages.len() + 1, next.packages.len());
    }

    #[test]
    fn business_gets_default_footer_and_unique_id() {
        let state = default_settings();
        let input = NewBusiness {
            name: "StreamMax".into(),
            ..Default::default()
        };
        let next = state
            .apply(SettingsChange::AddBusiness(input.clone()))
            .apply(SettingsChange::AddBusiness(input));
        let added: Vec<_> = next.businesses.iter().skip(3).collect();
        assert_eq!(added.len(), 2);
        assert_ne!(added[0].id, added[1].id);
        assert_eq!(added[0].footer_note, "Thank you for your business.");
    }

    #[test]
    fn duplicate_currency_is_a_no_op() {
        let state = default_settings();
        let next = state.apply(SettingsChange::AddCurrency(" eur ".into()));
        assert_eq!(next.currencies, state.currencies);
        let next = state.apply(SettingsChange::AddCurrency("   ".into()));
        assert_eq!(next.currencies, state.currencies);
    }

    #[test]
    fn remove_does_not_touch_other_collections() {
        let state = default_settings();
        let next = state.apply(SettingsChange::Remove(Collection::Payment, "2".into()));
        assert_eq!(next.payment_methods.len(), 2);
        assert!(next.payment_methods.iter().all(|p| p.id != "2"));
        assert_eq!(next.businesses, state.businesses);

        let next = state.apply(SettingsChange::Remove(Collection::Currency, "GBP".into()));
        assert_eq!(next.currencies, vec!["USD", "EUR", "CAD", "AUD"]);
    }
}
