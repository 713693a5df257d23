//! Invoice preview: reference resolution, expiry arithmetic and output.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{Datelike, Days, NaiveDate};
use comfy_table::{Attribute, Cell, Table};
use serde::Serialize;
use tera::{Context, Tera};
use tracing::{debug, info, warn};

use crate::error::{Result, StreambillError};
use crate::model::{
    AppState, BusinessProfile, Identified, InvoiceData, Package, PackageSelection, PaymentMethod,
};
use crate::store::Store;

const TEMPLATE_NAME: &str = "invoice.html";

// Embed template at compile time so a fresh data root can be seeded
const DEFAULT_TEMPLATE: &str = include_str!("../templates/invoice.html");

/// Outcome of looking up a stored reference.
#[derive(Debug, Clone, PartialEq)]
pub enum Resolution<T> {
    Resolved(T),
    Missing,
}

pub fn lookup<'a, T: Identified>(items: &'a [T], id: &str) -> Resolution<&'a T> {
    match items.iter().find(|item| item.id() == id) {
        Some(item) => Resolution::Resolved(item),
        None => Resolution::Missing,
    }
}

/// A draft with every reference resolved against the current settings.
#[derive(Debug, Clone)]
pub struct ResolvedInvoice<'a> {
    pub invoice: &'a InvoiceData,
    pub business: &'a BusinessProfile,
    pub package: Package,
    pub payment: &'a PaymentMethod,
}

pub fn resolve<'a>(invoice: &'a InvoiceData, settings: &'a AppState) -> Result<ResolvedInvoice<'a>> {
    let business = lookup(&settings.businesses, &invoice.business_id);
    let package = match invoice.package_selection() {
        PackageSelection::Custom(custom) => Resolution::Resolved(custom.to_package()),
        PackageSelection::Catalog(id) => match lookup(&settings.packages, &id) {
            Resolution::Resolved(pkg) => Resolution::Resolved(pkg.clone()),
            Resolution::Missing => Resolution::Missing,
        },
    };
    let payment = lookup(&settings.payment_methods, &invoice.payment_method_id);

    match (business, package, payment) {
        (Resolution::Resolved(business), Resolution::Resolved(package), Resolution::Resolved(payment)) => {
            Ok(ResolvedInvoice {
                invoice,
                business,
                package,
                payment,
            })
        }
        (business, package, payment) => {
            let mut missing = Vec::new();
            if business == Resolution::Missing {
                missing.push("business");
            }
            if package == Resolution::Missing {
                missing.push("package");
            }
            if payment == Resolution::Missing {
                missing.push("payment method");
            }
            warn!(invoice_number = %invoice.invoice_number, ?missing, "draft references missing settings");
            Err(StreambillError::MissingData { missing })
        }
    }
}

/// Advances `date` by whole calendar months.
///
/// Fractional months are truncated. The day of month is kept and overflows
/// into the following month when the target month is shorter, so Jan 31
/// plus one month is Mar 3 in a common year.
pub fn add_months(date: NaiveDate, months: f64) -> Option<NaiveDate> {
    let offset = months.trunc();
    if !offset.is_finite() || offset.abs() > f64::from(i32::MAX) * 12.0 {
        return None;
    }
    let month_index = (date.year() as i64 * 12 + date.month0() as i64).checked_add(offset as i64)?;
    let year = i32::try_from(month_index.div_euclid(12)).ok()?;
    let month = month_index.rem_euclid(12) as u32 + 1;
    NaiveDate::from_ymd_opt(year, month, 1)?.checked_add_days(Days::new(date.day() as u64 - 1))
}

/// `D MMM YYYY`, e.g. `5 Mar 2025`.
pub fn format_date(date: NaiveDate) -> String {
    date.format("%-d %b %Y").to_string()
}

/// Two decimals, halves rounded away from zero (`10.125` is `10.13`).
pub fn format_money(amount: f64, currency: &str) -> String {
    format!("{:.2} {}", (amount * 100.0).round() / 100.0, currency)
}

pub fn duration_label(months: f64) -> String {
    let unit = if months == 1.0 { "Month" } else { "Months" };
    format!("{} {}", months, unit)
}

#[derive(Debug, Serialize)]
pub struct LineItemView {
    pub name: String,
    pub description: String,
    pub duration: String,
    pub amount: String,
}

/// Everything the printable document shows, already formatted.
#[derive(Debug, Serialize)]
pub struct InvoiceView {
    pub invoice_number: String,
    pub status: String,
    pub business_name: String,
    pub business_website: String,
    pub business_email: String,
    pub customer_name: String,
    pub customer_id: String,
    pub username: Option<String>,
    pub password: String,
    pub issue_date: String,
    pub expiry_date: String,
    pub payment_name: String,
    pub payment_details: String,
    pub item: LineItemView,
    pub subtotal: String,
    pub total: String,
    pub footer_note: String,
    pub custom_note: Option<String>,
}

impl InvoiceView {
    pub fn build(resolved: &ResolvedInvoice<'_>) -> Result<Self> {
        let ResolvedInvoice {
            invoice,
            business,
            package,
            payment,
        } = resolved;
        let expiry = add_months(invoice.issue_date, package.duration_months).ok_or(
            StreambillError::DateOutOfRange {
                issue_date: invoice.issue_date,
                months: package.duration_months,
            },
        )?;
        let amount = format_money(package.price, &package.currency);
        let non_empty = |value: &Option<String>| value.clone().filter(|v| !v.is_empty());

        Ok(Self {
            invoice_number: invoice.invoice_number.clone(),
            status: "PAID".to_string(),
            business_name: business.name.clone(),
            business_website: business.website.clone(),
            business_email: business.email.clone(),
            customer_name: non_empty(&invoice.customer_name)
                .unwrap_or_else(|| "Valued Customer".to_string()),
            customer_id: invoice.customer_id.clone(),
            username: non_empty(&invoice.customer_username),
            password: non_empty(&invoice.customer_password)
                .unwrap_or_else(|| "••••••••".to_string()),
            issue_date: format_date(invoice.issue_date),
            expiry_date: format_date(expiry),
            payment_name: payment.name.clone(),
            payment_details: payment.details.clone(),
            item: LineItemView {
                name: package.name.clone(),
                description: "Premium IPTV Subscription".to_string(),
                duration: duration_label(package.duration_months),
                amount: amount.clone(),
            },
            subtotal: amount.clone(),
            total: amount,
            footer_note: business.footer_note.clone(),
            custom_note: non_empty(&invoice.custom_note),
        })
    }

    /// Compact terminal rendition of the document.
    pub fn to_table(&self) -> Table {
        let mut table = Table::new();
        table.set_header(vec![
            Cell::new(format!("{} | INVOICE {}", self.business_name, self.invoice_number))
                .add_attribute(Attribute::Bold),
            Cell::new(format!("STATUS: {}", self.status)).add_attribute(Attribute::Bold),
        ]);
        let rows = [
            ("Bill To", format!("{} (ID: {})", self.customer_name, self.customer_id)),
            ("Issue Date", self.issue_date.clone()),
            ("Payment Method", self.payment_name.clone()),
            (
                "Username",
                self.username.clone().unwrap_or_else(|| "See Email".to_string()),
            ),
            ("Password", self.password.clone()),
            ("Package", format!("{} - {}", self.item.name, self.item.description)),
            ("Duration", self.item.duration.clone()),
            ("Total", self.total.clone()),
            ("Subscription Expiry", self.expiry_date.clone()),
        ];
        for (label, value) in rows {
            table.add_row(vec![Cell::new(label), Cell::new(value)]);
        }
        table
    }
}

/// Loads the draft and settings and builds the printable view.
pub fn load_view(store: &Store) -> Result<InvoiceView> {
    let invoice = store.load_draft().ok_or(StreambillError::NoDraft)?;
    let settings = store.load_settings();
    let resolved = resolve(&invoice, &settings)?;
    InvoiceView::build(&resolved)
}

/// The HTML template set, read from `<root>/templates`.
pub struct Templates {
    tera: Tera,
}

impl Templates {
    /// Seeds the default template into `<root>/templates` when absent, then
    /// loads whatever is there so users can customize the layout.
    pub fn load(root: &Path) -> Result<Self> {
        let template_dir = root.join("templates");
        fs::create_dir_all(&template_dir).map_err(|e| StreambillError::io(&template_dir, e))?;
        let template_path = template_dir.join(TEMPLATE_NAME);
        if !template_path.exists() {
            info!(path = %template_path.display(), "initializing default template");
            fs::write(&template_path, DEFAULT_TEMPLATE)
                .map_err(|e| StreambillError::io(&template_path, e))?;
        }

        let mut tera = Tera::default();
        tera.add_template_file(&template_path, Some(TEMPLATE_NAME))?;
        Ok(Self { tera })
    }

    pub fn builtin() -> Result<Self> {
        let mut tera = Tera::default();
        tera.add_raw_template(TEMPLATE_NAME, DEFAULT_TEMPLATE)?;
        Ok(Self { tera })
    }

    pub fn render(&self, view: &InvoiceView) -> Result<String> {
        let context = Context::from_serialize(view)?;
        Ok(self.tera.render(TEMPLATE_NAME, &context)?)
    }
}

/// Writes the rendered document to `<root>/output/<invoice number>.html`.
pub fn write_document(root: &Path, view: &InvoiceView, html: &str) -> Result<PathBuf> {
    let output_dir = root.join("output");
    fs::create_dir_all(&output_dir).map_err(|e| StreambillError::io(&output_dir, e))?;
    let file_stem: String = view
        .invoice_number
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' { c } else { '_' })
        .collect();
    let path = output_dir.join(format!("{}.html", file_stem));
    fs::write(&path, html).map_err(|e| StreambillError::io(&path, e))?;
    debug!(path = %path.display(), "document written");
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn add_months_plain() {
        assert_eq!(add_months(date(2025, 1, 15), 3.0), Some(date(2025, 4, 15)));
        assert_eq!(add_months(date(2025, 11, 10), 12.0), Some(date(2026, 11, 10)));
        assert_eq!(add_months(date(2025, 6, 30), 6.0), Some(date(2025, 12, 30)));
    }

    #[test]
    fn add_months_overflows_short_months() {
        assert_eq!(add_months(date(2025, 1, 31), 1.0), Some(date(2025, 3, 3)));
        assert_eq!(add_months(date(2024, 1, 31), 1.0), Some(date(2024, 3, 2)));
        assert_eq!(add_months(date(2025, 8, 31), 1.0), Some(date(2025, 10, 1)));
    }

    #[test]
    fn add_months_truncates_fractions() {
        assert_eq!(add_months(date(2025, 1, 15), 1.5), Some(date(2025, 2, 15)));
        assert_eq!(add_months(date(2025, 1, 15), f64::NAN), None);
    }

    #[test]
    fn add_months_out_of_range_is_none() {
        assert_eq!(add_months(date(2025, 1, 15), 1e20), None);
        assert_eq!(add_months(date(2025, 1, 15), -1e20), None);
        assert_eq!(add_months(date(2025, 1, 15), f64::INFINITY), None);
        assert_eq!(add_months(date(2025, 1, 15), 12.0 * 300_000.0), None);
    }

    #[test]
    fn formatting() {
        assert_eq!(format_date(date(2025, 3, 5)), "5 Mar 2025");
        assert_eq!(format_money(15.0, "USD"), "15.00 USD");
        assert_eq!(format_money(19.999, "EUR"), "20.00 EUR");
        assert_eq!(format_money(0.125, "USD"), "0.13 USD");
        assert_eq!(format_money(10.125, "USD"), "10.13 USD");
        assert_eq!(duration_label(1.0), "1 Month");
        assert_eq!(duration_label(3.0), "3 Months");
        assert_eq!(duration_label(1.5), "1.5 Months");
        assert_eq!(duration_label(1e20), "100000000000000000000 Months");
    }

    #[test]
    fn builtin_template_renders_and_escapes() {
        let view = InvoiceView {
            invoice_number: "INV-2025-7".into(),
            status: "PAID".into(),
            business_name: "Stream <Co>".into(),
            business_website: "www.example.com".into(),
            business_email: "".into(),
            customer_name: "Valued Customer".into(),
            customer_id: "CUST00001".into(),
            username: None,
            password: "••••••••".into(),
            issue_date: "15 Jan 2025".into(),
            expiry_date: "15 Apr 2025".into(),
            payment_name: "PayPal".into(),
            payment_details: "Send payment".into(),
            item: LineItemView {
                name: "3 Months".into(),
                description: "Premium IPTV Subscription".into(),
                duration: "3 Months".into(),
                amount: "25.00 USD".into(),
            },
            subtotal: "25.00 USD".into(),
            total: "25.00 USD".into(),
            footer_note: "Thanks".into(),
            custom_note: None,
        };
        let html = Templates::builtin().unwrap().render(&view).unwrap();
        assert!(html.contains("INV-2025-7"));
        assert!(html.contains("Stream &lt;Co&gt;"));
        assert!(html.contains("See Email"));
        assert!(html.contains("@media print"));
    }
}
