use std::fs::OpenOptions;
use std::path::PathBuf;
use std::sync::Mutex;

use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use tokio::runtime::Runtime;
use tracing_subscriber::EnvFilter;

use ik_app::{AppContext, InventoryViewModel, TapOutcome, WidgetRoute, DUPLICATE_CODE_MESSAGE};
use ik_core::{apply_edit, parse_new_item, InventoryItem, UserRequest};
use ik_store::{resolve_backend, resolve_data_path, set_config, Backend, DataDir};
use ik_utils::format_currency;

const NOT_SIGNED_IN: &str = "Not signed in. Run `ik login` first.";

#[derive(Parser)]
#[command(name = "ik", version, about = "InvKeeper inventory manager")]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Initialize the data directory.
    Init {
        /// Optional path to initialize the data directory at.
        #[arg(long)]
        path: Option<String>,
        /// Inventory backend to use.
        #[arg(long, value_enum, default_value = "local")]
        backend: BackendArg,
    },
    /// Sign in with email and password.
    Login {
        email: String,
        #[arg(long)]
        password: String,
    },
    /// Create an account and sign in.
    Register {
        email: String,
        #[arg(long)]
        password: String,
    },
    /// Sign out and hide widget values.
    Logout,
    /// Show session, backend, and data directory.
    Status,
    /// List inventory items.
    List,
    /// Add an item.
    Add {
        code: String,
        name: String,
        price: String,
        quantity: String,
    },
    /// Show a single item by key.
    Show { key: i64 },
    /// Edit the name, price, or quantity of an item.
    Edit {
        key: i64,
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        price: Option<String>,
        #[arg(long)]
        quantity: Option<String>,
    },
    /// Delete an item by key.
    Delete {
        key: i64,
        /// Confirm the deletion.
        #[arg(long)]
        yes: bool,
    },
    /// Print the aggregate inventory value.
    Total,
    /// Inspect or toggle a summary widget.
    Widget {
        #[command(subcommand)]
        command: WidgetCommand,
    },
}

#[derive(Subcommand)]
enum WidgetCommand {
    /// Render a widget instance.
    Show { id: u32 },
    /// Flip the visibility of a widget instance.
    Toggle { id: u32 },
}

#[derive(Clone, Copy, ValueEnum)]
enum BackendArg {
    Local,
    Document,
}

impl From<BackendArg> for Backend {
    fn from(value: BackendArg) -> Self {
        match value {
            BackendArg::Local => Backend::Local,
            BackendArg::Document => Backend::Document,
        }
    }
}

pub fn run() -> Result<()> {
    let cli = Cli::parse();

    if let Some(Command::Init { path, backend }) = &cli.command {
        init_logging_to_stderr();
        let path = match path {
            Some(path) => PathBuf::from(path),
            None => DataDir::default_path()?,
        };
        let data = DataDir::new(path.clone());
        data.init().context("failed to initialize data directory")?;
        set_config(&path, (*backend).into()).context("failed to write config")?;
        println!("InvKeeper initialized at {} ({})", path.display(), Backend::from(*backend));
        return Ok(());
    }

    let data = DataDir::new(resolve_data_path()?);
    if !data.exists() {
        return Err(anyhow!(
            "InvKeeper is not initialized. Run `ik init` to get started."
        ));
    }
    let backend = resolve_backend()?;

    let Some(command) = cli.command else {
        init_logging_to_file(&data)?;
        let ctx = AppContext::open(&data, backend).context("failed to open inventory")?;
        return ik_tui::run(&ctx);
    };

    init_logging_to_stderr();
    let ctx = AppContext::open(&data, backend).context("failed to open inventory")?;
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("failed to initialize runtime")?;

    match command {
        Command::Login { email, password } => login(&ctx, &runtime, &email, &password),
        Command::Register { email, password } => register(&ctx, &runtime, email, password),
        Command::Logout => {
            ctx.logout().context("failed to sign out")?;
            println!("Signed out");
            Ok(())
        }
        Command::Status => {
            println!("{}", status_line(&ctx, &data, backend));
            Ok(())
        }
        Command::Widget { command } => widget(&ctx, command),
        command => {
            require_session(&ctx)?;
            inventory_command(&ctx.inventory, &runtime, command)
        }
    }
}

fn init_logging_to_stderr() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter())
        .with_writer(std::io::stderr)
        .try_init();
}

fn init_logging_to_file(data: &DataDir) -> Result<()> {
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(data.log_path())
        .context("failed to open log file")?;
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter())
        .with_ansi(false)
        .with_writer(Mutex::new(file))
        .try_init();
    Ok(())
}

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
}

fn require_session(ctx: &AppContext) -> Result<()> {
    if ctx.session.is_logged_in() {
        Ok(())
    } else {
        Err(anyhow!(NOT_SIGNED_IN))
    }
}

fn login(ctx: &AppContext, runtime: &Runtime, email: &str, password: &str) -> Result<()> {
    let response = runtime.block_on(ctx.login.login(email, password));
    if response.is_successful {
        println!("{}", response.message);
        Ok(())
    } else {
        Err(anyhow!(response.message))
    }
}

fn register(ctx: &AppContext, runtime: &Runtime, email: String, password: String) -> Result<()> {
    if !ctx.login.validate_password(&password) {
        return Err(anyhow!("password must be 6 to 10 characters"));
    }
    let response = runtime.block_on(ctx.login.register(UserRequest::new(email, password)));
    if response.is_successful {
        println!("{}", response.message);
        Ok(())
    } else {
        Err(anyhow!(response.message))
    }
}

fn status_line(ctx: &AppContext, data: &DataDir, backend: Backend) -> String {
    let session = if ctx.session.is_logged_in() {
        "signed in"
    } else {
        "signed out"
    };
    format!("{session}\t{backend}\t{}", data.path().display())
}

fn inventory_command(inventory: &InventoryViewModel, runtime: &Runtime, command: Command) -> Result<()> {
    match command {
        Command::List => {
            runtime.block_on(inventory.load());
            for item in inventory.current_items() {
                println!("{}", item_row(&item));
            }
            Ok(())
        }
        Command::Add {
            code,
            name,
            price,
            quantity,
        } => {
            let item = parse_new_item(&code, &name, &price, &quantity).context("invalid item")?;
            if runtime.block_on(inventory.save(item)) {
                println!("Item saved");
                Ok(())
            } else {
                Err(anyhow!(DUPLICATE_CODE_MESSAGE))
            }
        }
        Command::Show { key } => {
            let item = find_item(inventory, runtime, key)?;
            println!("{}", item_details(&item));
            Ok(())
        }
        Command::Edit {
            key,
            name,
            price,
            quantity,
        } => {
            let item = find_item(inventory, runtime, key)?;
            let name = name.unwrap_or_else(|| item.name.clone());
            let price = price.unwrap_or_else(|| item.price.to_string());
            let quantity = quantity.unwrap_or_else(|| item.quantity.to_string());
            let edited = apply_edit(&item, &name, &price, &quantity).context("invalid edit")?;
            if runtime.block_on(inventory.update(edited)) {
                println!("Item updated");
                Ok(())
            } else {
                Err(anyhow!("failed to update item"))
            }
        }
        Command::Delete { key, yes } => {
            if !yes {
                return Err(anyhow!("refusing to delete without --yes"));
            }
            let item = find_item(inventory, runtime, key)?;
            if runtime.block_on(inventory.delete(item.clone())) {
                println!("{} deleted", item.name);
                Ok(())
            } else {
                Err(anyhow!("failed to delete item"))
            }
        }
        Command::Total => {
            runtime.block_on(inventory.load());
            let total = ik_core::inventory_total(&inventory.current_items());
            println!("{}", format_currency(total));
            Ok(())
        }
        _ => Err(anyhow!("not an inventory command")),
    }
}

fn find_item(inventory: &InventoryViewModel, runtime: &Runtime, key: i64) -> Result<InventoryItem> {
    runtime
        .block_on(inventory.get_by_id(key))
        .ok_or_else(|| anyhow!("item not found"))
}

fn widget(ctx: &AppContext, command: WidgetCommand) -> Result<()> {
    match command {
        WidgetCommand::Show { id } => {
            println!("{}", ctx.widget.render(id));
            Ok(())
        }
        WidgetCommand::Toggle { id } => match ctx.widget.tap_toggle(id) {
            TapOutcome::Rendered(view) => {
                println!("{view}");
                Ok(())
            }
            TapOutcome::Route(WidgetRoute::Login) => Err(anyhow!(NOT_SIGNED_IN)),
            TapOutcome::Route(WidgetRoute::Inventory) => Ok(()),
        },
    }
}

fn item_row(item: &InventoryItem) -> String {
    format!(
        "{}\t{}\t{}\t{}",
        item.key(),
        item.code,
        item.name,
        format_currency(u128::from(item.price))
    )
}

fn item_details(item: &InventoryItem) -> String {
    let total = InventoryViewModel::product_total(item.price, item.quantity);
    format!(
        "Code: {}\nName: {}\nPrice: {}\nQuantity: {}\nTotal: {}",
        item.code,
        item.name,
        format_currency(u128::from(item.price)),
        item.quantity,
        format_currency(total)
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_widget_and_delete() {
        let cli = Cli::try_parse_from(["ik", "widget", "toggle", "3"]).expect("parse");
        assert!(matches!(
            cli.command,
            Some(Command::Widget {
                command: WidgetCommand::Toggle { id: 3 }
            })
        ));
        let cli = Cli::try_parse_from(["ik", "delete", "7", "--yes"]).expect("parse");
        assert!(matches!(cli.command, Some(Command::Delete { key: 7, yes: true })));
        assert!(Cli::try_parse_from(["ik", "init", "--backend", "remote"]).is_err());
    }

    #[test]
    fn item_details_snapshot() {
        let item = InventoryItem::new(200, "New Item", 20, 5).unwrap().with_id(1);
        insta::assert_snapshot!(item_details(&item), @r###"
        Code: 200
        Name: New Item
        Price: $ 20,00
        Quantity: 5
        Total: $ 100,00
        "###);
        assert_eq!(item_row(&item), "1\t200\tNew Item\t$ 20,00");
    }

    #[test]
    fn inventory_commands_require_session() {
        let temp = tempfile::TempDir::new().expect("temp dir");
        let data = DataDir::new(temp.path().to_path_buf());
        data.init().expect("init");
        let ctx = AppContext::open(&data, Backend::Local).expect("open");
        let err = require_session(&ctx).unwrap_err();
        assert_eq!(err.to_string(), NOT_SIGNED_IN);
        assert!(status_line(&ctx, &data, Backend::Local).starts_with("signed out\tlocal"));

        ctx.session.save_login_state(true).unwrap();
        assert!(require_session(&ctx).is_ok());
    }

    #[test]
    fn add_then_delete_through_commands() {
        let temp = tempfile::TempDir::new().expect("temp dir");
        let data = DataDir::new(temp.path().to_path_buf());
        data.init().expect("init");
        let ctx = AppContext::open(&data, Backend::Document).expect("open");
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .expect("runtime");

        let add = Command::Add {
            code: "12".into(),
            name: "Washer".into(),
            price: "3".into(),
            quantity: "4".into(),
        };
        inventory_command(&ctx.inventory, &runtime, add).expect("add");
        let again = Command::Add {
            code: "12".into(),
            name: "Other".into(),
            price: "1".into(),
            quantity: "1".into(),
        };
        let err = inventory_command(&ctx.inventory, &runtime, again).unwrap_err();
        assert_eq!(err.to_string(), DUPLICATE_CODE_MESSAGE);

        let refused = inventory_command(&ctx.inventory, &runtime, Command::Delete { key: 12, yes: false });
        assert!(refused.is_err());
        inventory_command(&ctx.inventory, &runtime, Command::Delete { key: 12, yes: true }).expect("delete");
        assert!(runtime.block_on(ctx.inventory.get_by_id(12)).is_none());
    }
}
