//! Local persistence for settings and the draft invoice.
//!
//! Both records are JSON files under the data root and every write replaces
//! the whole file. Reads fail open: anything missing or unparseable yields the
//! defaults (settings) or nothing (draft).

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::catalog::SettingsChange;
use crate::error::{Result, StreambillError};
use crate::model::{AppState, BusinessProfile, InvoiceData, Package, PaymentMethod};

const SETTINGS_FILE: &str = "settings.json";
const DRAFT_FILE: &str = "draft.json";

#[derive(Debug, Clone)]
pub struct Store {
    root: PathBuf,
}

/// Settings as found on disk; older records predate the currency list.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct StoredSettings {
    businesses: Vec<BusinessProfile>,
    packages: Vec<Package>,
    payment_methods: Vec<PaymentMethod>,
    #[serde(default)]
    currencies: Option<Vec<String>>,
}

impl From<StoredSettings> for AppState {
    fn from(stored: StoredSettings) -> Self {
        AppState {
            businesses: stored.businesses,
            packages: stored.packages,
            payment_methods: stored.payment_methods,
            currencies: stored.currencies.unwrap_or_else(default_currencies),
        }
    }
}

impl Store {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn load_settings(&self) -> AppState {
        match self.read_record::<StoredSettings>(SETTINGS_FILE) {
            Some(stored) => stored.into(),
            None => default_settings(),
        }
    }

    pub fn save_settings(&self, state: &AppState) -> Result<()> {
        self.write_record(SETTINGS_FILE, state)
    }

    pub fn save_draft(&self, invoice: &InvoiceData) -> Result<()> {
        self.write_record(DRAFT_FILE, invoice)?;
        info!(invoice_number = %invoice.invoice_number, "draft saved");
        Ok(())
    }

    pub fn load_draft(&self) -> Option<InvoiceData> {
        self.read_record(DRAFT_FILE)
    }

    fn read_record<T: for<'de> Deserialize<'de>>(&self, name: &str) -> Option<T> {
        let path = self.root.join(name);
        let content = match fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) => {
                debug!(path = %path.display(), error = %e, "record not readable");
                return None;
            }
        };
        match serde_json::from_str(&content) {
            Ok(value) => Some(value),
            Err(e) => {
                debug!(path = %path.display(), error = %e, "record not parseable, ignoring");
                None
            }
        }
    }

    // Write to a sibling and rename so readers never see a half-written record.
    fn write_record<T: Serialize>(&self, name: &str, value: &T) -> Result<()> {
        fs::create_dir_all(&self.root).map_err(|e| StreambillError::io(&self.root, e))?;
        let path = self.root.join(name);
        let tmp = self.root.join(format!("{name}.tmp"));
        let json = serde_json::to_string_pretty(value)?;
        fs::write(&tmp, json).map_err(|e| StreambillError::io(&tmp, e))?;
        fs::rename(&tmp, &path).map_err(|e| StreambillError::io(&path, e))?;
        debug!(path = %path.display(), "record written");
        Ok(())
    }
}

/// In-memory settings paired with the store that persists them.
///
/// [`SettingsHandle::update`] is the only way to change the held state, so
/// memory and disk never disagree after a successful call.
#[derive(Debug)]
pub struct SettingsHandle {
    store: Store,
    state: AppState,
}

impl SettingsHandle {
    pub fn load(store: Store) -> Self {
        let state = store.load_settings();
        Self { store, state }
    }

    pub fn state(&self) -> &AppState {
        &self.state
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    pub fn update(&mut self, next: AppState) -> Result<()> {
        self.store.save_settings(&next)?;
        self.state = next;
        Ok(())
    }

    pub fn apply(&mut self, change: SettingsChange) -> Result<()> {
        let next = self.state.apply(change);
        self.update(next)
    }
}

pub fn default_currencies() -> Vec<String> {
    ["USD", "EUR", "GBP", "CAD", "AUD"]
        .iter()
        .map(|c| c.to_string())
        .collect()
}

pub fn default_settings() -> AppState {
    let business = |id: &str, name: &str, email: &str, website: &str, footer: &str| BusinessProfile {
        id: id.into(),
        name: name.into(),
        email: email.into(),
        website: website.into(),
        footer_note: footer.into(),
    };
    let package = |id: &str, name: &str, price: f64, months: f64, features: &[&str]| Package {
        id: id.into(),
        name: name.into(),
        price,
        currency: "USD".into(),
        duration_months: months,
        features: features.iter().map(|f| f.to_string()).collect(),
    };
    let payment = |id: &str, name: &str, details: &str| PaymentMethod {
        id: id.into(),
        name: name.into(),
        details: details.into(),
    };
    let premium = ["4K + 8K Channels", "Multi-Device", "VOD Library", "Priority Support"];

    AppState {
        businesses: vec![
            business(
                "1",
                "SkyHub8K",
                "support@skyhub8k.com",
                "www.skyhub8k.com",
                "Experience streaming like never before.",
            ),
            business(
                "2",
                "Watchlyy",
                "help@watchlyy.com",
                "www.watchlyy.com",
                "Your gateway to unlimited channels.",
            ),
            business("3", "SkyHubTV", "", "www.skyhubtv.com", ""),
        ],
        packages: vec![
            package("1", "1 Month", 15.0, 1.0, &["4K Channels", "Anti-Freeze", "24/7 Support"]),
            package("2", "3 Months", 25.0, 3.0, &premium),
            package("3", "6 Months", 35.0, 6.0, &premium),
            package("4", "12 Months", 50.0, 12.0, &premium),
        ],
        payment_methods: vec![
            payment("1", "PayPal", "Send payment to: (Friends & Family)"),
            payment("2", "Bank Transfer", "Send payment to: (Friends & Family)"),
            payment("3", "Bitcoin", ""),
        ],
        currencies: default_currencies(),
    }
}
