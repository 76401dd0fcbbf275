//! Storeline CLI - Catalog sync, order queue and notification tools.
//!
//! # Usage
//!
//! ```bash
//! # Keep the catalog in sync and print alerts until Ctrl+C
//! storeline watch --seller 7
//!
//! # Show the trending view with scores
//! storeline trending --limit 10
//!
//! # Filter the cached catalog
//! storeline browse --view women --color red --max-price 40 --sort price-low
//!
//! # Work a seller's order queue
//! storeline orders list --seller 7 --status pending
//! storeline orders set-status --seller 7 1042 shipped
//!
//! # Notifications
//! storeline notifications poll
//! storeline notifications mark-read 31
//! ```
//!
//! Configuration comes from the environment; see
//! [`storeline_storefront::config`].

#![cfg_attr(not(test), forbid(unsafe_code))]

use clap::{Parser, Subcommand};
use rust_decimal::Decimal;
use sentry::integrations::tracing as sentry_tracing;
use storeline_core::{NotificationId, OrderId, OrderStatus, SellerId};
use storeline_storefront::catalog::{SortKey, ViewKey};
use storeline_storefront::config::SyncConfig;
use storeline_storefront::orders::FilterKey;
use storeline_storefront::state::ClientState;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod commands;

#[derive(Parser)]
#[command(name = "storeline")]
#[command(author, version, about = "Storeline catalog sync tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Keep the catalog and notifications in sync until interrupted
    Watch {
        /// Also keep this seller's order queue loaded
        #[arg(long)]
        seller: Option<SellerId>,
    },
    /// Print the trending view with scores
    Trending {
        /// Show at most this many items
        #[arg(short, long)]
        limit: Option<usize>,
    },
    /// Filter and sort a cached catalog view
    Browse(BrowseArgs),
    /// Work a seller's order queue
    Orders {
        #[command(subcommand)]
        action: OrdersAction,
    },
    /// Poll and manage notifications
    Notifications {
        #[command(subcommand)]
        action: NotificationsAction,
    },
}

#[derive(clap::Args)]
pub(crate) struct BrowseArgs {
    /// View to filter (`all`, `men`, `women`, `unisex`, `on-sale`, `new-arrivals`, `trending`)
    #[arg(long, default_value = "all")]
    view: ViewKey,

    /// Text matched against title and description
    #[arg(short, long)]
    query: Option<String>,

    #[arg(long)]
    min_price: Option<Decimal>,

    #[arg(long)]
    max_price: Option<Decimal>,

    /// Keep items offered in any of these sizes
    #[arg(long = "size")]
    sizes: Vec<String>,

    /// Keep items offered in any of these colors
    #[arg(long = "color")]
    colors: Vec<String>,

    /// Keep items of any of these clothing types
    #[arg(long = "type")]
    clothing_types: Vec<String>,

    /// Keep items tagged with any of these occasions
    #[arg(long = "occasion")]
    occasions: Vec<String>,

    #[arg(long)]
    new_arrivals: bool,

    #[arg(long)]
    on_sale: bool,

    /// Sort order (`featured`, `price-low`, `price-high`, `name`)
    #[arg(long, default_value = "featured")]
    sort: SortKey,
}

#[derive(Subcommand)]
enum OrdersAction {
    /// List orders, optionally for one status
    List {
        #[arg(long)]
        seller: SellerId,

        /// `all`, `pending`, `processing`, `shipped`, `delivered` or `cancelled`
        #[arg(long, default_value = "all")]
        status: FilterKey,

        /// Fetch the queue again instead of showing the cached copy
        #[arg(long)]
        refresh: bool,
    },
    /// Move an order to a new status
    SetStatus {
        #[arg(long)]
        seller: SellerId,

        order: OrderId,

        status: OrderStatus,
    },
}

#[derive(Subcommand)]
enum NotificationsAction {
    /// Run one poll and print the feed
    Poll,
    /// Mark a notification as read
    MarkRead { id: NotificationId },
    /// Delete a notification
    Delete { id: NotificationId },
}

/// Initialize Sentry error tracking and return guard that must be kept alive.
fn init_sentry(config: &SyncConfig) -> Option<sentry::ClientInitGuard> {
    let dsn = config.sentry_dsn.as_ref()?;

    let guard = sentry::init((
        dsn.as_str(),
        sentry::ClientOptions {
            release: sentry::release_name!(),
            attach_stacktrace: true,
            ..Default::default()
        },
    ));

    tracing::info!("Sentry initialized");
    Some(guard)
}

/// Filter tracing events to Sentry event types.
fn sentry_event_filter(metadata: &tracing::Metadata<'_>) -> sentry_tracing::EventFilter {
    match *metadata.level() {
        tracing::Level::ERROR | tracing::Level::WARN => sentry_tracing::EventFilter::Event,
        tracing::Level::INFO | tracing::Level::DEBUG => sentry_tracing::EventFilter::Breadcrumb,
        _ => sentry_tracing::EventFilter::Ignore,
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Configuration is needed before Sentry, which must precede the subscriber
    let config = match SyncConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            #[allow(clippy::print_stderr)]
            {
                eprintln!("Configuration error: {e}");
            }
            std::process::exit(2);
        }
    };

    let _sentry_guard = init_sentry(&config);

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "storeline_storefront=info,storeline_cli=info".into());

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .with(sentry_tracing::layer().event_filter(sentry_event_filter))
        .init();

    let result: Result<(), Box<dyn std::error::Error>> = match ClientState::new(config) {
        Ok(state) => run(cli, state).await,
        Err(e) => Err(e.into()),
    };

    if let Err(e) = result {
        tracing::error!("Command failed: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli, state: ClientState) -> Result<(), Box<dyn std::error::Error>> {
    match cli.command {
        Commands::Watch { seller } => commands::watch::run(&state, seller).await?,
        Commands::Trending { limit } => commands::catalog::trending(&state, limit).await?,
        Commands::Browse(args) => commands::catalog::browse(&state, &args).await?,
        Commands::Orders { action } => match action {
            OrdersAction::List {
                seller,
                status,
                refresh,
            } => {
                commands::orders::list(&state, seller, status, refresh).await?;
            }
            OrdersAction::SetStatus {
                seller,
                order,
                status,
            } => commands::orders::set_status(&state, seller, order, status).await?,
        },
        Commands::Notifications { action } => match action {
            NotificationsAction::Poll => commands::notifications::poll(&state).await?,
            NotificationsAction::MarkRead { id } => {
                commands::notifications::mark_read(&state, id).await?;
            }
            NotificationsAction::Delete { id } => {
                commands::notifications::delete(&state, id).await?;
            }
        },
    }
    Ok(())
}
