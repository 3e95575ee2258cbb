use anyhow::Result;
use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(name = "qbt")]
#[command(about = "Quick order cart-state tooling", long_about = None)]
struct Cli {
    #[command(subcommand)]
    cmd: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compute layered config hash + print canonical JSON
    ConfigHash {
        /// Paths in merge order (base -> env -> site overrides...)
        #[arg(required = true)]
        paths: Vec<String>,
    },

    /// Snapshot token utilities
    Token {
        #[command(subcommand)]
        cmd: TokenCmd,
    },

    /// Quantity normalization
    Quantity {
        #[command(subcommand)]
        cmd: QuantityCmd,
    },

    /// Compare a rendered snapshot against a live one and print the report
    Reconcile {
        /// Render-time snapshot as JSON, e.g. '{"101":2}'
        #[arg(long)]
        rendered: String,

        /// Live cart snapshot as JSON
        #[arg(long)]
        live: String,
    },
}

#[derive(Subcommand)]
enum TokenCmd {
    /// Encode a snapshot for a session and print the hidden form fields
    Mint {
        /// Session identity the token is bound to
        #[arg(long)]
        session: String,

        /// Snapshot as JSON object of product id -> quantity
        #[arg(long)]
        snapshot: String,

        /// DEV | PRODUCTION (falls back to QBT_MODE, then DEV)
        #[arg(long)]
        mode: Option<String>,

        /// Layered config paths in merge order (falls back to QBT_CONFIG)
        #[arg(long = "config")]
        config_paths: Vec<String>,
    },

    /// Verify and decode a submitted token
    Verify {
        #[arg(long)]
        session: String,

        /// `cart_state` field value
        #[arg(long)]
        payload: String,

        /// `cart_state_hash` field value
        #[arg(long)]
        tag: String,

        #[arg(long)]
        mode: Option<String>,

        #[arg(long = "config")]
        config_paths: Vec<String>,
    },
}

#[derive(Subcommand)]
enum QuantityCmd {
    /// Normalize a raw quantity for a product at the given display price
    Normalize {
        /// Raw quantity as typed by the shopper
        #[arg(long)]
        qty: String,

        /// Display price in major units (e.g. 9.95)
        #[arg(long)]
        price: f64,

        /// Layered config paths; quantity policy defaults apply when omitted
        #[arg(long = "config")]
        config_paths: Vec<String>,
    },
}

fn init_tracing() {
    // stdout carries command output; diagnostics go to stderr.
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "warn".into()),
        )
        .init();
}

fn main() -> Result<()> {
    let _ = dotenvy::from_filename(".env.local");
    init_tracing();

    let cli = Cli::parse();

    match cli.cmd {
        Commands::ConfigHash { paths } => {
            let path_refs: Vec<&str> = paths.iter().map(|s| s.as_str()).collect();
            let loaded = qbt_config::load_layered_yaml(&path_refs)?;
            println!("config_hash={}", loaded.config_hash);
            println!("{}", loaded.canonical_json);
        }

        Commands::Token { cmd } => match cmd {
            TokenCmd::Mint {
                session,
                snapshot,
                mode,
                config_paths,
            } => {
                let mode = commands::resolve_mode(mode.as_deref())?;
                let out = commands::token::mint(mode, &config_paths, &session, &snapshot)?;
                println!("cart_state={}", out.token.payload);
                println!("cart_state_hash={}", out.token.tag);
                println!("nonce={}", out.nonce);
            }
            TokenCmd::Verify {
                session,
                payload,
                tag,
                mode,
                config_paths,
            } => {
                let mode = commands::resolve_mode(mode.as_deref())?;
                let snap = commands::token::verify(mode, &config_paths, &session, &payload, &tag)?;
                println!("valid=true");
                println!("snapshot={}", serde_json::to_string(&snap)?);
            }
        },

        Commands::Quantity { cmd } => match cmd {
            QuantityCmd::Normalize {
                qty,
                price,
                config_paths,
            } => {
                let n = commands::quantity::normalize(&config_paths, &qty, price)?;
                println!("step={}", n.step);
                println!("quantity={}", n.quantity);
            }
        },

        Commands::Reconcile { rendered, live } => {
            let rendered = commands::parse_snapshot_json(&rendered).map_err(|e| e.context("--rendered"))?;
            let live = commands::parse_snapshot_json(&live).map_err(|e| e.context("--live"))?;
            let report = qbt_reconcile::reconcile(&rendered, &live);
            println!("clean={}", report.is_clean());
            for diff in &report.diffs {
                println!("diff={}", serde_json::to_string(diff)?);
            }
        }
    }

    Ok(())
}
