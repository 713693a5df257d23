use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Reserved package id marking an inline custom package on the wire.
pub const CUSTOM_PACKAGE_ID: &str = "custom";

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct BusinessProfile {
    pub id: String,
    pub name: String,
    pub email: String,
    pub website: String,
    pub footer_note: String,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Package {
    pub id: String,
    pub name: String,
    pub price: f64,
    pub currency: String,
    pub duration_months: f64,
    #[serde(default)]
    pub features: Vec<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PaymentMethod {
    pub id: String,
    pub name: String, // PayPal, Crypto, Bank Transfer
    pub details: String,
}

/// The persisted configuration root.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AppState {
    pub businesses: Vec<BusinessProfile>,
    pub packages: Vec<Package>,
    pub payment_methods: Vec<PaymentMethod>,
    pub currencies: Vec<String>,
}

/// The single draft invoice, in its stored shape.
///
/// Settings entities are referenced by id only and re-resolved at render
/// time. When `package_id` is [`CUSTOM_PACKAGE_ID`] the `custom_package_*`
/// fields describe the line item instead; use [`InvoiceData::package_selection`]
/// rather than comparing ids.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct InvoiceData {
    #[serde(default)]
    pub id: String,
    pub invoice_number: String,
    pub issue_date: NaiveDate,
    pub customer_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub customer_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub customer_username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub customer_password: Option<String>,
    pub business_id: String,
    pub package_id: String,
    #[serde(default)]
    pub payment_method_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom_note: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom_package_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom_package_price: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom_package_currency: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom_package_duration: Option<f64>,
}

/// Inline line item entered on the invoice instead of a catalog package.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CustomPackage {
    pub name: Option<String>,
    pub price: Option<f64>,
    pub currency: Option<String>,
    pub duration_months: Option<f64>,
}

impl CustomPackage {
    /// Synthesizes a package-shaped record, filling absent fields.
    pub fn to_package(&self) -> Package {
        Package {
            id: CUSTOM_PACKAGE_ID.to_string(),
            name: self
                .name
                .clone()
                .filter(|n| !n.is_empty())
                .unwrap_or_else(|| "Custom Service".to_string()),
            price: self.price.filter(|p| p.is_finite()).unwrap_or(0.0),
            currency: self
                .currency
                .clone()
                .filter(|c| !c.is_empty())
                .unwrap_or_else(|| "USD".to_string()),
            duration_months: self
                .duration_months
                .filter(|d| d.is_finite() && *d != 0.0)
                .unwrap_or(1.0),
            features: vec![],
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum PackageSelection {
    Catalog(String),
    Custom(CustomPackage),
}

impl InvoiceData {
    pub fn package_selection(&self) -> PackageSelection {
        if self.package_id == CUSTOM_PACKAGE_ID {
            PackageSelection::Custom(CustomPackage {
                name: self.custom_package_name.clone(),
                price: self.custom_package_price,
                currency: self.custom_package_currency.clone(),
                duration_months: self.custom_package_duration,
            })
        } else {
            PackageSelection::Catalog(self.package_id.clone())
        }
    }
}

/// Records that live in an id-keyed settings collection.
pub trait Identified {
    fn id(&self) -> &str;
}

impl Identified for BusinessProfile {
    fn id(&self) -> &str {
        &self.id
    }
}

impl Identified for Package {
    fn id(&self) -> &str {
        &self.id
    }
}

impl Identified for PaymentMethod {
    fn id(&self) -> &str {
        &self.id
    }
}
