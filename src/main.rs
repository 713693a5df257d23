use std::fmt;
use std::path::{Path, PathBuf};
use std::process::Command;

use anyhow::Context as _;
use chrono::Local;
use clap::{ArgAction, Parser, Subcommand};
use comfy_table::{Cell, Table};
use inquire::list_option::ListOption;
use inquire::{DateSelect, InquireError, Select, Text};
use tracing::{debug, warn};
use tracing_subscriber::EnvFilter;

use streambill::catalog::{
    Collection, NewBusiness, NewPackage, NewPaymentMethod, SettingsChange, parse_duration,
    parse_price,
};
use streambill::composer::{Composer, PackageChoice};
use streambill::config::Config;
use streambill::model::{AppState, InvoiceData, Package};
use streambill::render::{self, Templates, duration_label, format_date};
use streambill::store::{SettingsHandle, Store};
use streambill::StreambillError;

// ==========================================
// Constants
// ==========================================
const CUSTOM_PACKAGE_OPT: &str = "➕ Custom Package";
const ADD_OPT: &str = "➕ Add";
const DELETE_OPT: &str = "🗑  Delete";
const DONE_OPT: &str = "✅ Done";

// ==========================================
// CLI
// ==========================================

#[derive(Parser)]
#[command(name = "streambill", about = "Invoice generator for IPTV resellers")]
struct Cli {
    /// Use this data directory instead of the configured one
    #[arg(long, global = true, value_name = "DIR")]
    data_dir: Option<PathBuf>,

    /// Increase log verbosity (-v, -vv, -vvv)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Compose a new invoice, then preview it
    New,
    /// Preview the saved draft invoice
    Preview,
    /// Render the draft and open it for printing
    Print,
    /// Add or delete businesses, packages, payment methods or currencies
    Manage {
        #[arg(value_enum)]
        collection: Collection,
    },
    /// List everything configured
    List,
    /// Configure data directory
    Config,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let root = match &cli.data_dir {
        Some(dir) => dir.clone(),
        None => Config::load().data_dir(),
    };
    debug!(root = %root.display(), "using data directory");
    let store = Store::new(root);

    let Some(command) = cli.command else {
        use clap::CommandFactory;
        Cli::command().print_help()?;
        return Ok(());
    };

    match command {
        Commands::New => {
            if run_composer(&store)?.is_some() {
                show_preview(&store)?;
            }
        }
        Commands::Preview => {
            show_preview(&store)?;
        }
        Commands::Print => {
            if let Some(path) = show_preview(&store)? {
                open_document(&path);
            }
        }
        Commands::Manage { collection } => {
            let mut handle = SettingsHandle::load(store);
            loop {
                match prompt_settings_change(handle.state(), collection)? {
                    ManageStep::Change(change) => handle.apply(change)?,
                    ManageStep::Skip => {}
                    ManageStep::Done => break,
                }
            }
        }
        Commands::List => {
            let settings = store.load_settings();
            for collection in [
                Collection::Business,
                Collection::Package,
                Collection::Payment,
                Collection::Currency,
            ] {
                println!("\n--- {} ---", collection);
                println!("{}", collection_table(&settings, collection));
            }
        }
        Commands::Config => {
            setup_config_wizard()?;
        }
    }
    Ok(())
}

fn init_tracing(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(format!("streambill={level}")))
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

// ==========================================
// 1. Invoice Form
// ==========================================

#[derive(Clone, Copy, PartialEq)]
enum FormAction {
    Business,
    CustomerName,
    CustomerId,
    GenerateCustomerId,
    Username,
    Password,
    Package,
    CustomName,
    CustomPrice,
    CustomCurrency,
    CustomDuration,
    PaymentMethod,
    InvoiceNumber,
    GenerateInvoiceNumber,
    IssueDate,
    Note,
    Manage(Collection),
    Preview,
    Cancel,
}

struct MenuEntry {
    action: FormAction,
    label: String,
}

impl fmt::Display for MenuEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.label)
    }
}

fn or_empty(value: &str) -> &str {
    if value.is_empty() { "(empty)" } else { value }
}

fn form_menu(composer: &Composer) -> Vec<MenuEntry> {
    let settings = composer.settings();
    let draft = composer.draft();
    let entry = |action, label: String| MenuEntry { action, label };

    let business = match &draft.business_id {
        Some(id) => settings
            .businesses
            .iter()
            .find(|b| &b.id == id)
            .map(|b| b.name.clone())
            .unwrap_or_else(|| "(deleted)".to_string()),
        None => "(none)".to_string(),
    };
    let package = match &draft.package {
        Some(PackageChoice::Catalog(id)) => settings
            .packages
            .iter()
            .find(|p| &p.id == id)
            .map(package_label)
            .unwrap_or_else(|| "(deleted)".to_string()),
        Some(PackageChoice::Custom) => CUSTOM_PACKAGE_OPT.to_string(),
        None => "(none)".to_string(),
    };
    let payment = match &draft.payment_method_id {
        Some(id) => settings
            .payment_methods
            .iter()
            .find(|p| &p.id == id)
            .map(|p| p.name.clone())
            .unwrap_or_else(|| "(deleted)".to_string()),
        None => "(none)".to_string(),
    };

    let mut menu = vec![
        entry(FormAction::Business, format!("Business: {}", business)),
        entry(
            FormAction::CustomerName,
            format!("Customer Name: {}", or_empty(&draft.customer_name)),
        ),
        entry(
            FormAction::CustomerId,
            format!("Customer ID: {}", or_empty(&draft.customer_id)),
        ),
        entry(FormAction::GenerateCustomerId, "🔄 Auto-generate Customer ID".into()),
        entry(
            FormAction::Username,
            format!("Username: {}", or_empty(&draft.customer_username)),
        ),
        entry(
            FormAction::Password,
            format!("Password: {}", or_empty(&draft.customer_password)),
        ),
        entry(FormAction::Package, format!("Package: {}", package)),
    ];

    if draft.package == Some(PackageChoice::Custom) {
        let custom = &draft.custom;
        menu.extend([
            entry(
                FormAction::CustomName,
                format!("   Package Name: {}", or_empty(custom.name.as_deref().unwrap_or(""))),
            ),
            entry(
                FormAction::CustomPrice,
                format!(
                    "   Price: {}",
                    custom.price.map(|p| p.to_string()).unwrap_or_else(|| "(empty)".into())
                ),
            ),
            entry(
                FormAction::CustomCurrency,
                format!("   Currency: {}", custom.currency.as_deref().unwrap_or("(none)")),
            ),
            entry(
                FormAction::CustomDuration,
                format!(
                    "   Duration: {}",
                    duration_label(custom.duration_months.unwrap_or(1.0))
                ),
            ),
        ]);
    }

    menu.extend([
        entry(FormAction::PaymentMethod, format!("Payment Method: {}", payment)),
        entry(
            FormAction::InvoiceNumber,
            format!("Invoice #: {}", draft.invoice_number),
        ),
        entry(FormAction::GenerateInvoiceNumber, "🔄 New Invoice Number".into()),
        entry(
            FormAction::IssueDate,
            format!("Issue Date: {}", format_date(draft.issue_date)),
        ),
        entry(FormAction::Note, format!("Note: {}", or_empty(&draft.custom_note))),
        entry(
            FormAction::Manage(Collection::Business),
            "⚙️  Manage Businesses".into(),
        ),
        entry(FormAction::Manage(Collection::Package), "⚙️  Manage Packages".into()),
        entry(
            FormAction::Manage(Collection::Payment),
            "⚙️  Manage Payment Methods".into(),
        ),
        entry(
            FormAction::Manage(Collection::Currency),
            "⚙️  Manage Currencies".into(),
        ),
        entry(FormAction::Preview, "👁  Preview Invoice".into()),
        entry(FormAction::Cancel, "❌ Cancel".into()),
    ]);
    menu
}

fn package_label(p: &Package) -> String {
    format!(
        "{} — {} {} ({})",
        p.name,
        p.price,
        p.currency,
        duration_label(p.duration_months)
    )
}

/// Runs the invoice form until the draft is saved or the user cancels.
fn run_composer(store: &Store) -> anyhow::Result<Option<InvoiceData>> {
    let mut rng = rand::thread_rng();
    let mut composer = Composer::enter(store.clone(), Local::now().date_naive(), &mut rng);
    let mut cursor = 0;

    println!("\n--- New Invoice ---");
    loop {
        let menu = form_menu(&composer);
        cursor = cursor.min(menu.len() - 1);
        let Some(choice) = Select::new("Invoice:", menu)
            .with_starting_cursor(cursor)
            .with_page_size(15)
            .raw_prompt()
            .map_or_else(skipped, |choice| Ok(Some(choice)))?
        else {
            return Ok(None);
        };
        cursor = choice.index;

        match choice.value.action {
            FormAction::Business => {
                let options = composer
                    .settings()
                    .businesses
                    .iter()
                    .map(|b| (b.id.clone(), b.name.clone()))
                    .collect();
                let current = composer.draft().business_id.clone();
                if let Some(id) = select_id("Business Identity:", options, current.as_deref())? {
                    composer.draft_mut().business_id = Some(id);
                }
            }
            FormAction::CustomerName => {
                let value = prompt_text("Customer Name:", &composer.draft().customer_name)?;
                composer.draft_mut().customer_name = value;
            }
            FormAction::CustomerId => {
                let value = prompt_text("Customer ID:", &composer.draft().customer_id)?;
                composer.draft_mut().customer_id = value;
            }
            FormAction::GenerateCustomerId => composer.generate_customer_id(&mut rng),
            FormAction::Username => {
                let value = prompt_text("Username (Optional):", &composer.draft().customer_username)?;
                composer.draft_mut().customer_username = value;
            }
            FormAction::Password => {
                let value = prompt_text("Password (Optional):", &composer.draft().customer_password)?;
                composer.draft_mut().customer_password = value;
            }
            FormAction::Package => {
                let mut options: Vec<(String, String)> = composer
                    .settings()
                    .packages
                    .iter()
                    .map(|p| (p.id.clone(), package_label(p)))
                    .collect();
                options.push((String::new(), CUSTOM_PACKAGE_OPT.to_string()));
                let current = match &composer.draft().package {
                    Some(PackageChoice::Catalog(id)) => Some(id.clone()),
                    Some(PackageChoice::Custom) => Some(String::new()),
                    None => None,
                };
                if let Some(id) = select_id("Service Package:", options, current.as_deref())? {
                    composer.draft_mut().package = Some(if id.is_empty() {
                        PackageChoice::Custom
                    } else {
                        PackageChoice::Catalog(id)
                    });
                }
            }
            FormAction::CustomName => {
                let current = composer.draft().custom.name.clone().unwrap_or_default();
                let value = prompt_text("Package Name:", &current)?;
                composer.draft_mut().custom.name = Some(value);
            }
            FormAction::CustomPrice => {
                let current = composer
                    .draft()
                    .custom
                    .price
                    .map(|p| p.to_string())
                    .unwrap_or_default();
                let value = prompt_text("Price:", &current)?;
                composer.draft_mut().custom.price = Some(parse_price(&value));
            }
            FormAction::CustomCurrency => {
                let options = composer
                    .settings()
                    .currencies
                    .iter()
                    .map(|c| (c.clone(), c.clone()))
                    .collect();
                let current = composer.draft().custom.currency.clone();
                if let Some(code) = select_id("Currency:", options, current.as_deref())? {
                    composer.draft_mut().custom.currency = Some(code);
                }
            }
            FormAction::CustomDuration => {
                let current = composer
                    .draft()
                    .custom
                    .duration_months
                    .map(|d| d.to_string())
                    .unwrap_or_default();
                let value = prompt_text("Duration (Months):", &current)?;
                composer.draft_mut().custom.duration_months = Some(parse_duration(&value));
            }
            FormAction::PaymentMethod => {
                let options = composer
                    .settings()
                    .payment_methods
                    .iter()
                    .map(|p| (p.id.clone(), p.name.clone()))
                    .collect();
                let current = composer.draft().payment_method_id.clone();
                if let Some(id) = select_id("Payment Method:", options, current.as_deref())? {
                    composer.draft_mut().payment_method_id = Some(id);
                }
            }
            FormAction::InvoiceNumber => {
                let value = prompt_text("Invoice Number:", &composer.draft().invoice_number)?;
                composer.draft_mut().invoice_number = value;
            }
            FormAction::GenerateInvoiceNumber => composer.generate_invoice_number(&mut rng),
            FormAction::IssueDate => {
                if let Some(date) = DateSelect::new("Issue Date:")
                    .with_default(composer.draft().issue_date)
                    .prompt_skippable()?
                {
                    composer.draft_mut().issue_date = date;
                }
            }
            FormAction::Note => {
                let value = prompt_text("Note (Optional):", &composer.draft().custom_note)?;
                composer.draft_mut().custom_note = value;
            }
            FormAction::Manage(collection) => loop {
                match prompt_settings_change(composer.settings(), collection)? {
                    ManageStep::Change(change) => composer.apply(change)?,
                    ManageStep::Skip => {}
                    ManageStep::Done => break,
                }
            },
            FormAction::Preview => match composer.handle_preview() {
                Ok(invoice) => return Ok(Some(invoice)),
                Err(StreambillError::Validation(e)) => println!("❌ {}", e),
                Err(e) => return Err(e.into()),
            },
            FormAction::Cancel => return Ok(None),
        }
    }
}

fn prompt_text(message: &str, current: &str) -> anyhow::Result<String> {
    let value = Text::new(message).with_initial_value(current).prompt_skippable()?;
    Ok(value.map(|v| v.trim().to_string()).unwrap_or_else(|| current.to_string()))
}

/// Select among `(id, label)` pairs, starting at `current`.
fn select_id(
    message: &str,
    options: Vec<(String, String)>,
    current: Option<&str>,
) -> anyhow::Result<Option<String>> {
    if options.is_empty() {
        println!("❌ Nothing configured yet. Use the Manage options to add one.");
        return Ok(None);
    }
    let start = current
        .and_then(|id| options.iter().position(|(key, _)| key == id))
        .unwrap_or(0);
    let labels: Vec<String> = options.iter().map(|(_, label)| label.clone()).collect();
    let picked = Select::new(message, labels)
        .with_starting_cursor(start)
        .raw_prompt()
        .map_or_else(skipped, |choice| Ok(Some(choice)))?;
    Ok(picked.map(|choice| options[choice.index].0.clone()))
}

// Esc and Ctrl-C both leave the current prompt without a choice
fn skipped<T>(err: InquireError) -> Result<Option<ListOption<T>>, InquireError> {
    match err {
        InquireError::OperationCanceled | InquireError::OperationInterrupted => Ok(None),
        other => Err(other),
    }
}

// ==========================================
// 2. Settings Manager
// ==========================================

enum ManageStep {
    Change(SettingsChange),
    Skip,
    Done,
}

fn collection_table(settings: &AppState, collection: Collection) -> Table {
    let mut table = Table::new();
    match collection {
        Collection::Business => {
            table.set_header(vec!["ID", "Name", "Email", "Website", "Footer Note"]);
            for b in &settings.businesses {
                table.add_row(vec![&b.id, &b.name, &b.email, &b.website, &b.footer_note]);
            }
        }
        Collection::Package => {
            table.set_header(vec!["ID", "Name", "Price", "Duration"]);
            for p in &settings.packages {
                table.add_row(vec![
                    Cell::new(&p.id),
                    Cell::new(&p.name),
                    Cell::new(render::format_money(p.price, &p.currency)),
                    Cell::new(duration_label(p.duration_months)),
                ]);
            }
        }
        Collection::Payment => {
            table.set_header(vec!["ID", "Name", "Details"]);
            for p in &settings.payment_methods {
                table.add_row(vec![&p.id, &p.name, &p.details]);
            }
        }
        Collection::Currency => {
            table.set_header(vec!["Code"]);
            for c in &settings.currencies {
                table.add_row(vec![c]);
            }
        }
    }
    table
}

fn prompt_settings_change(settings: &AppState, collection: Collection) -> anyhow::Result<ManageStep> {
    println!("\n--- {} ---", collection);
    println!("{}", collection_table(settings, collection));

    let action = Select::new(
        &format!("Manage {}:", collection),
        vec![ADD_OPT, DELETE_OPT, DONE_OPT],
    )
    .prompt_skippable()?;

    match action {
        Some(ADD_OPT) => Ok(ManageStep::Change(prompt_new_entry(settings, collection)?)),
        Some(DELETE_OPT) => {
            let options: Vec<(String, String)> = match collection {
                Collection::Business => settings
                    .businesses
                    .iter()
                    .map(|b| (b.id.clone(), b.name.clone()))
                    .collect(),
                Collection::Package => settings
                    .packages
                    .iter()
                    .map(|p| (p.id.clone(), package_label(p)))
                    .collect(),
                Collection::Payment => settings
                    .payment_methods
                    .iter()
                    .map(|p| (p.id.clone(), p.name.clone()))
                    .collect(),
                Collection::Currency => settings
                    .currencies
                    .iter()
                    .map(|c| (c.clone(), c.clone()))
                    .collect(),
            };
            Ok(match select_id("Delete which?", options, None)? {
                Some(key) => ManageStep::Change(SettingsChange::Remove(collection, key)),
                None => ManageStep::Skip,
            })
        }
        _ => Ok(ManageStep::Done),
    }
}

fn prompt_new_entry(settings: &AppState, collection: Collection) -> anyhow::Result<SettingsChange> {
    let change = match collection {
        Collection::Business => SettingsChange::AddBusiness(NewBusiness {
            name: Text::new("Name:").prompt()?,
            email: Text::new("Email:").prompt()?,
            website: Text::new("Website:").prompt()?,
            footer_note: Text::new("Footer Note (Optional):").prompt()?,
        }),
        Collection::Package => {
            let name = Text::new("Name:").prompt()?;
            let price = Text::new("Price:").prompt()?;
            let currency = if settings.currencies.is_empty() {
                None
            } else {
                Select::new("Currency:", settings.currencies.clone()).prompt_skippable()?
            };
            let duration_months = Text::new("Duration (Months):").with_default("1").prompt()?;
            SettingsChange::AddPackage(NewPackage {
                name,
                price,
                currency,
                duration_months,
            })
        }
        Collection::Payment => SettingsChange::AddPaymentMethod(NewPaymentMethod {
            name: Text::new("Name:").prompt()?,
            details: Text::new("Details / Instructions:").prompt()?,
        }),
        Collection::Currency => {
            SettingsChange::AddCurrency(Text::new("Currency Code (e.g. USD):").prompt()?)
        }
    };
    Ok(change)
}

// ==========================================
// 3. Preview & Print
// ==========================================

/// Renders the draft to the terminal and writes the printable document.
/// Without a draft the user is sent to the invoice form first.
fn show_preview(store: &Store) -> anyhow::Result<Option<PathBuf>> {
    let view = match render::load_view(store) {
        Ok(view) => view,
        Err(StreambillError::NoDraft) => {
            println!("💡 No draft invoice yet. Opening the invoice form.");
            return match run_composer(store)? {
                Some(_) => show_preview(store),
                None => Ok(None),
            };
        }
        Err(StreambillError::MissingData { missing }) => {
            println!(
                "❌ Error: Missing data ({}). Go back to the form and reselect.",
                missing.join(", ")
            );
            return Ok(None);
        }
        Err(e) => return Err(e.into()),
    };

    println!("{}", view.to_table());

    let templates = Templates::load(store.root()).context("loading invoice template")?;
    let html = templates.render(&view)?;
    let path = render::write_document(store.root(), &view, &html)?;
    println!("✅ Invoice written: {:?}", path);
    Ok(Some(path))
}

// Opens the document in the default viewer, where the print dialog lives
fn open_document(path: &Path) {
    println!("🖨  Opening for print: {:?}", path);

    #[cfg(target_os = "macos")]
    let viewer = "open";
    #[cfg(target_os = "windows")]
    let viewer = "explorer";
    #[cfg(not(any(target_os = "macos", target_os = "windows")))]
    let viewer = "xdg-open";

    if !launch_viewer(viewer, path) {
        println!("❌ Could not start a viewer. Open the file above to print it.");
    }
}

fn launch_viewer(viewer: &str, path: &Path) -> bool {
    match Command::new(viewer).arg(path).spawn() {
        Ok(_) => true,
        Err(e) => {
            warn!(viewer, path = %path.display(), error = %e, "failed to launch document viewer");
            false
        }
    }
}

// ==========================================
// 4. Config
// ==========================================

fn setup_config_wizard() -> anyhow::Result<Config> {
    println!("\n⚙️  --- Configuration Setup ---");
    let current = Config::load();
    let data_root = Text::new("Data Directory:")
        .with_default(&current.data_root)
        .prompt()?;

    let config = Config { data_root };
    let path = config.save()?;
    println!("✅ Settings saved to {:?}", path);
    Ok(config)
}
