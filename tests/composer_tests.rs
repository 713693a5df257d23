//! Invoice form behavior against a real data directory.

use chrono::{Datelike, Local, NaiveDate};
use rand::SeedableRng;
use rand::rngs::StdRng;
use regex::Regex;
use streambill::catalog::{Collection, NewBusiness, SettingsChange};
use streambill::composer::{Composer, PackageChoice, customer_id, invoice_number};
use streambill::model::{AppState, CUSTOM_PACKAGE_ID};
use streambill::store::Store;
use streambill::{StreambillError, ValidationError};
use tempfile::TempDir;

fn today() -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 1, 15).unwrap()
}

fn enter(dir: &TempDir) -> Composer {
    let mut rng = StdRng::seed_from_u64(42);
    Composer::enter(Store::new(dir.path()), today(), &mut rng)
}

#[test]
fn generated_customer_ids_match_format() {
    let re = Regex::new(r"^CUST\d{5}$").unwrap();
    let mut rng = StdRng::seed_from_u64(1);
    for _ in 0..500 {
        let id = customer_id(&mut rng);
        assert_eq!(id.len(), 9);
        assert!(re.is_match(&id), "{id}");
    }
}

#[test]
fn generated_invoice_numbers_carry_current_year() {
    let dir = TempDir::new().unwrap();
    let mut composer = enter(&dir);
    let mut rng = StdRng::seed_from_u64(3);
    composer.generate_invoice_number(&mut rng);

    let re = Regex::new(&format!(r"^INV-{}-\d{{1,4}}$", Local::now().year())).unwrap();
    assert!(re.is_match(&composer.draft().invoice_number));
    assert!(Regex::new(r"^INV-2031-\d{1,4}$")
        .unwrap()
        .is_match(&invoice_number(2031, &mut rng)));
}

#[test]
fn generate_customer_id_overwrites_input() {
    let dir = TempDir::new().unwrap();
    let mut composer = enter(&dir);
    composer.draft_mut().customer_id = "manual".into();
    let mut rng = StdRng::seed_from_u64(9);
    composer.generate_customer_id(&mut rng);
    assert!(composer.draft().customer_id.starts_with("CUST"));
}

#[test]
fn fresh_form_selects_first_entries_once() {
    let dir = TempDir::new().unwrap();
    let mut composer = enter(&dir);
    let draft = composer.draft();
    assert_eq!(draft.business_id.as_deref(), Some("1"));
    assert_eq!(draft.package, Some(PackageChoice::Catalog("1".into())));
    assert_eq!(draft.payment_method_id.as_deref(), Some("1"));

    composer.draft_mut().business_id = Some("2".into());
    composer.draft_mut().payment_method_id = Some("3".into());
    composer
        .apply(SettingsChange::AddBusiness(NewBusiness {
            name: "StreamMax".into(),
            ..Default::default()
        }))
        .unwrap();
    composer
        .apply(SettingsChange::Remove(Collection::Business, "1".into()))
        .unwrap();

    assert_eq!(composer.draft().business_id.as_deref(), Some("2"));
    assert_eq!(composer.draft().payment_method_id.as_deref(), Some("3"));
}

#[test]
fn first_business_added_later_is_picked_up() {
    let dir = TempDir::new().unwrap();
    let store = Store::new(dir.path());
    store
        .save_settings(&AppState {
            businesses: vec![],
            packages: vec![],
            payment_methods: vec![],
            currencies: vec![],
        })
        .unwrap();

    let mut composer = enter(&dir);
    assert_eq!(composer.draft().business_id, None);
    assert_eq!(composer.draft().custom.currency, None);

    composer
        .apply(SettingsChange::AddBusiness(NewBusiness {
            name: "First".into(),
            ..Default::default()
        }))
        .unwrap();
    composer
        .apply(SettingsChange::AddCurrency("eur".into()))
        .unwrap();

    let first_id = composer.settings().businesses[0].id.clone();
    assert_eq!(composer.draft().business_id, Some(first_id));
    assert_eq!(composer.draft().custom.currency.as_deref(), Some("EUR"));
    assert_eq!(store.load_settings(), *composer.settings());
}

#[test]
fn rejected_submission_leaves_stored_draft_alone() {
    let dir = TempDir::new().unwrap();
    let store = Store::new(dir.path());

    let mut composer = enter(&dir);
    composer.draft_mut().customer_id = "CUST00001".into();
    let saved = composer.handle_preview().unwrap();

    let mut second = enter(&dir);
    second.draft_mut().business_id = None;
    second.draft_mut().customer_id = "CUST00002".into();
    match second.handle_preview() {
        Err(StreambillError::Validation(ValidationError::MissingRequired)) => {}
        other => panic!("expected validation failure, got {other:?}"),
    }
    assert_eq!(store.load_draft(), Some(saved));
}

#[test]
fn missing_customer_id_is_rejected() {
    let dir = TempDir::new().unwrap();
    let composer = enter(&dir);
    let err = composer.handle_preview().unwrap_err();
    assert!(matches!(
        err,
        StreambillError::Validation(ValidationError::MissingRequired)
    ));
    assert_eq!(Store::new(dir.path()).load_draft(), None);
}

#[test]
fn custom_package_requires_name_and_price() {
    let dir = TempDir::new().unwrap();
    let mut composer = enter(&dir);
    composer.draft_mut().customer_id = "CUST00001".into();
    composer.draft_mut().package = Some(PackageChoice::Custom);

    composer.draft_mut().custom.price = Some(20.0);
    assert!(matches!(
        composer.handle_preview(),
        Err(StreambillError::Validation(ValidationError::CustomPackageIncomplete))
    ));

    composer.draft_mut().custom.price = None;
    composer.draft_mut().custom.name = Some("Gold".into());
    assert!(matches!(
        composer.handle_preview(),
        Err(StreambillError::Validation(ValidationError::CustomPackageIncomplete))
    ));

    composer.draft_mut().custom.price = Some(20.0);
    let invoice = composer.handle_preview().unwrap();
    assert_eq!(invoice.package_id, CUSTOM_PACKAGE_ID);
    assert_eq!(invoice.custom_package_currency.as_deref(), Some("USD"));
    assert_eq!(invoice.custom_package_duration, Some(1.0));
}

#[test]
fn duplicate_currency_keeps_registry_unchanged() {
    let dir = TempDir::new().unwrap();
    let mut composer = enter(&dir);
    let before = composer.settings().currencies.clone();
    composer
        .apply(SettingsChange::AddCurrency("gbp".into()))
        .unwrap();
    assert_eq!(composer.settings().currencies, before);
}
