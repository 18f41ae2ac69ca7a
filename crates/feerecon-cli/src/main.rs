//! # feerecon CLI entry point
//!
//! Parses command-line arguments and dispatches to subcommand handlers.
//! Mirrors the teacher CLI's verbosity/`ExitCode` shape, adapted for an
//! async subcommand surface since every handler here talks to Postgres,
//! CFS, the object store, or the event bus.

use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use feerecon_cli::{dispatch, eft_credit_link, reconcile, routing_slip_link, serve};
use feerecon_core::config::Settings;

/// Fee reconciliation engine CLI.
///
/// Dispatches pending invoices to CFS, links settled EFT/routing-slip
/// credits, reconciles CAS/EFT/JV settlement files pulled from object
/// storage, and serves liveness/readiness probes.
#[derive(Parser, Debug)]
#[command(name = "feerecon", version, about, long_about = None)]
struct Cli {
    /// Enable verbose output. Repeat for more verbosity (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Dispatch pending invoices to CFS (§4.3).
    DispatchInvoices,

    /// Link settled EFT transactions to their short name's CFS account (§4.8).
    LinkEftCredits,

    /// Reverse previously linked EFT credits that CFS has since rejected (§4.8).
    ReverseEftCredits,

    /// Link settled routing slips to their CFS account (§4.5).
    RoutingSlipLink,

    /// Reconcile a CAS settlement CSV pulled from object storage (§4.4).
    ReconcileCas {
        bucket: String,
        key: String,
    },

    /// Reconcile an EFT TDI17 file pulled from object storage (§4.7).
    ReconcileEft {
        bucket: String,
        key: String,
    },

    /// Reconcile a JV feedback file pulled from object storage (§4.9).
    ReconcileJv {
        bucket: String,
        key: String,

        /// Treat the file as an acknowledgement-only delivery.
        #[arg(long, conflicts_with = "feedback")]
        ack: bool,

        /// Treat the file as carrying batch content (the default).
        #[arg(long, conflicts_with = "ack")]
        feedback: bool,
    },

    /// Serve `/health/liveness` and `/health/readiness`.
    Serve {
        #[arg(long, default_value = "0.0.0.0:8080")]
        addr: String,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let filter = match cli.verbose {
        0 => EnvFilter::new("warn"),
        1 => EnvFilter::new("info"),
        2 => EnvFilter::new("debug"),
        _ => EnvFilter::new("trace"),
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    tracing::debug!("feerecon CLI starting");

    let settings = Arc::new(Settings::from_env());

    let result = match cli.command {
        Commands::DispatchInvoices => dispatch::run(settings).await,
        Commands::LinkEftCredits => eft_credit_link::run_link(settings).await,
        Commands::ReverseEftCredits => eft_credit_link::run_reverse(settings).await,
        Commands::RoutingSlipLink => routing_slip_link::run(settings).await,
        Commands::ReconcileCas { bucket, key } => reconcile::run_cas(settings, &bucket, &key).await,
        Commands::ReconcileEft { bucket, key } => reconcile::run_eft(settings, &bucket, &key).await,
        Commands::ReconcileJv { bucket, key, ack, .. } => {
            reconcile::run_jv(settings, &bucket, &key, ack).await
        }
        Commands::Serve { addr } => run_serve(settings, &addr).await,
    };

    match result {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            tracing::error!("{e:#}");
            ExitCode::from(1)
        }
    }
}

async fn run_serve(settings: Arc<Settings>, addr: &str) -> anyhow::Result<u8> {
    let ctx = feerecon_cli::bootstrap::build_context(settings, None).await?;
    serve::run(ctx, addr).await?;
    Ok(0)
}
