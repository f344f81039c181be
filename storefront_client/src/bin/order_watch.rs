use anyhow::{anyhow, Result};
use clap::{Parser, Subcommand};
use log::*;
use reconciliation_engine::{db_types::OrderId, order_objects::OrderView};
use storefront_client::{is_terminal, RedirectOutcome, StatusNotifier, StorefrontClient};

#[derive(Parser, Debug)]
#[command(version, about = "Follow storefront orders from the command line")]
pub struct Arguments {
    /// The storefront server's base URL
    #[arg(short, long, env = "SF_CLIENT_SERVER", default_value = "http://127.0.0.1:8480")]
    server: String,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Check that the server is up
    Health,
    /// Print an order
    Show {
        order_id: OrderId,
    },
    /// Ask the server to verify a payment with the gateway
    Verify {
        reference: String,
    },
    /// Follow an order's status until it reaches a final state, or until interrupted
    Watch {
        order_id: OrderId,
        /// The gateway reference from the redirect. If given, the payment is verified before watching starts.
        #[arg(short, long)]
        reference: Option<String>,
        /// Stop as soon as the order has been paid
        #[arg(long)]
        until_paid: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    env_logger::init();
    let args = Arguments::parse();
    let client = StorefrontClient::new(&args.server)?;
    match args.command {
        Command::Health => println!("{}", client.health().await?.trim()),
        Command::Show { order_id } => {
            let view = client.order(&order_id).await?.ok_or_else(|| anyhow!("Order {order_id} does not exist"))?;
            print_order(&view);
        },
        Command::Verify { reference } => {
            let response = client.verify_payment(&reference).await?;
            println!("{}", serde_json::to_string_pretty(&response)?);
        },
        Command::Watch { order_id, reference, until_paid } => watch(client, order_id, reference, until_paid).await?,
    }
    Ok(())
}

async fn watch(client: StorefrontClient, order_id: OrderId, reference: Option<String>, until_paid: bool) -> Result<()> {
    if let Some(reference) = reference {
        match client.verify_on_redirect(&reference).await {
            RedirectOutcome::Verified(response) => {
                println!("Payment {} is {} ({})", response.reference, response.status, response.amount);
                if let Some(warning) = response.warning {
                    println!("Warning: {warning}");
                }
            },
            RedirectOutcome::Unverified { warning } => println!("Could not verify the payment yet: {warning}"),
        }
    }
    let notifier = StatusNotifier::start(order_id.clone(), client.clone(), client);
    let mut updates = notifier.watch();
    loop {
        let current = updates.borrow_and_update().clone();
        if let Some(view) = current {
            print_order(&view);
            if is_terminal(view.order.status) || (until_paid && view.order.is_paid()) {
                break;
            }
        }
        tokio::select! {
            changed = updates.changed() => {
                if changed.is_err() {
                    warn!("Status updates for {order_id} ended");
                    break;
                }
            },
            _ = tokio::signal::ctrl_c() => {
                info!("Interrupted");
                break;
            },
        }
    }
    Ok(())
}

fn print_order(view: &OrderView) {
    let order = &view.order;
    println!(
        "[{}] {} ({}): {} / payment {} / total {}",
        order.updated_at.format("%H:%M:%S"),
        order.order_id,
        order.order_number,
        order.status,
        order.payment_status,
        order.total_amount
    );
    if let Some(code) = &order.tracking_code {
        println!("    tracking: {code} {}", order.tracking_url.as_deref().unwrap_or_default());
    }
}
