//! Working state of the invoice form.
//!
//! A [`Composer`] is created fresh each time the form is entered. It owns a
//! [`SettingsHandle`] so that settings managed from within the form are
//! persisted immediately, and it re-runs the fill-once defaults after every
//! settings change.

use chrono::{Datelike, Local, NaiveDate, Utc};
use rand::Rng;
use tracing::{debug, info};

use crate::catalog::SettingsChange;
use crate::error::{Result, ValidationError};
use crate::model::{AppState, CUSTOM_PACKAGE_ID, CustomPackage, InvoiceData};
use crate::store::{SettingsHandle, Store};

/// Package chosen on the form.
#[derive(Debug, Clone, PartialEq)]
pub enum PackageChoice {
    Catalog(String),
    Custom,
}

/// Draft form fields. `None` marks a selection that has not been made yet.
#[derive(Debug, Clone, PartialEq)]
pub struct DraftForm {
    pub id: String,
    pub invoice_number: String,
    pub issue_date: NaiveDate,
    pub customer_id: String,
    pub customer_name: String,
    pub customer_username: String,
    pub customer_password: String,
    pub business_id: Option<String>,
    pub package: Option<PackageChoice>,
    pub payment_method_id: Option<String>,
    pub custom_note: String,
    /// Inline fields, kept while another package is selected.
    pub custom: CustomPackage,
}

impl DraftForm {
    pub fn new(issue_date: NaiveDate, rng: &mut impl Rng) -> Self {
        Self {
            id: Utc::now().timestamp_millis().to_string(),
            invoice_number: invoice_number(issue_date.year(), rng),
            issue_date,
            customer_id: String::new(),
            customer_name: String::new(),
            customer_username: String::new(),
            customer_password: String::new(),
            business_id: None,
            package: None,
            payment_method_id: None,
            custom_note: String::new(),
            custom: CustomPackage {
                duration_months: Some(1.0),
                ..Default::default()
            },
        }
    }

    /// Fills unset selections from the first entry of each collection.
    /// Fields that already hold a value are left alone.
    pub fn reconcile(&mut self, settings: &AppState) {
        if self.business_id.is_none() {
            self.business_id = settings.businesses.first().map(|b| b.id.clone());
        }
        if self.package.is_none() {
            self.package = settings
                .packages
                .first()
                .map(|p| PackageChoice::Catalog(p.id.clone()));
        }
        if self.payment_method_id.is_none() {
            self.payment_method_id = settings.payment_methods.first().map(|p| p.id.clone());
        }
        if self.custom.currency.is_none() {
            self.custom.currency = settings.currencies.first().cloned();
        }
    }

    pub fn validate(&self) -> std::result::Result<(), ValidationError> {
        let business_set = self.business_id.as_deref().is_some_and(|id| !id.is_empty());
        let package_set = match &self.package {
            Some(PackageChoice::Catalog(id)) => !id.is_empty(),
            Some(PackageChoice::Custom) => true,
            None => false,
        };
        if !business_set || !package_set || self.customer_id.is_empty() {
            return Err(ValidationError::MissingRequired);
        }

        if self.package == Some(PackageChoice::Custom) {
            let named = self.custom.name.as_deref().is_some_and(|n| !n.is_empty());
            let priced = self.custom.price.is_some_and(|p| p != 0.0 && !p.is_nan());
            if !named || !priced {
                return Err(ValidationError::CustomPackageIncomplete);
            }
        }
        Ok(())
    }

    /// The stored shape of this form. Custom fields are written only when
    /// the custom package is selected.
    pub fn to_invoice(&self) -> InvoiceData {
        let optional = |s: &str| (!s.is_empty()).then(|| s.to_string());
        let (package_id, custom) = match &self.package {
            Some(PackageChoice::Catalog(id)) => (id.clone(), None),
            Some(PackageChoice::Custom) => (CUSTOM_PACKAGE_ID.to_string(), Some(&self.custom)),
            None => (String::new(), None),
        };

        InvoiceData {
            id: self.id.clone(),
            invoice_number: self.invoice_number.clone(),
            issue_date: self.issue_date,
            customer_id: self.customer_id.clone(),
            customer_name: optional(&self.customer_name),
            customer_username: optional(&self.customer_username),
            customer_password: optional(&self.customer_password),
            business_id: self.business_id.clone().unwrap_or_default(),
            package_id,
            payment_method_id: self.payment_method_id.clone().unwrap_or_default(),
            custom_note: optional(&self.custom_note),
            custom_package_name: custom.and_then(|c| c.name.clone()),
            custom_package_price: custom.and_then(|c| c.price),
            custom_package_currency: custom.and_then(|c| c.currency.clone()),
            custom_package_duration: custom.and_then(|c| c.duration_months),
        }
    }
}

/// `CUST` followed by a zero-padded number in `0..=99999`.
pub fn customer_id(rng: &mut impl Rng) -> String {
    format!("CUST{:05}", rng.gen_range(0..100_000))
}

/// `INV-<year>-<n>` with `n` in `0..=9999`, unpadded.
pub fn invoice_number(year: i32, rng: &mut impl Rng) -> String {
    format!("INV-{}-{}", year, rng.gen_range(0..10_000))
}

pub struct Composer {
    settings: SettingsHandle,
    draft: DraftForm,
}

impl Composer {
    pub fn enter(store: Store, today: NaiveDate, rng: &mut impl Rng) -> Self {
        let settings = SettingsHandle::load(store);
        let mut draft = DraftForm::new(today, rng);
        draft.reconcile(settings.state());
        debug!(invoice_number = %draft.invoice_number, "composer entered");
        Self { settings, draft }
    }

    pub fn settings(&self) -> &AppState {
        self.settings.state()
    }

    pub fn draft(&self) -> &DraftForm {
        &self.draft
    }

    pub fn draft_mut(&mut self) -> &mut DraftForm {
        &mut self.draft
    }

    /// Replaces and persists the settings, then refills unset selections.
    pub fn update_settings(&mut self, next: AppState) -> Result<()> {
        self.settings.update(next)?;
        self.draft.reconcile(self.settings.state());
        Ok(())
    }

    pub fn apply(&mut self, change: SettingsChange) -> Result<()> {
        let next = self.settings.state().apply(change);
        self.update_settings(next)
    }

    pub fn generate_customer_id(&mut self, rng: &mut impl Rng) {
        self.draft.customer_id = customer_id(rng);
    }

    pub fn generate_invoice_number(&mut self, rng: &mut impl Rng) {
        let year = Local::now().year();
        self.draft.invoice_number = invoice_number(year, rng);
    }

    /// Validates the form and, when it passes, saves it as the draft.
    pub fn handle_preview(&self) -> Result<InvoiceData> {
        self.draft.validate()?;
        let invoice = self.draft.to_invoice();
        self.settings.store().save_draft(&invoice)?;
        info!(invoice_number = %invoice.invoice_number, "draft ready for preview");
        Ok(invoice)
    }
}
