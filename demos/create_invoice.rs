//! Creates one invoice against the API configured in the environment.
//!
//! ```text
//! BITBANKER_API_KEY=... cargo run --example create_invoice
//! ```

use bitbanker_sdk::{AsyncBitbankerClient, ClientConfig, Currency, Error, InvoiceData};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    let config = ClientConfig::from_dotenv()?;
    println!("Using API at {}", config.base_url());
    let client = AsyncBitbankerClient::with_config(config)?;

    let invoice = InvoiceData::new(
        vec![Currency::Eth, Currency::Btc],
        "1000",
        "invoice number 1",
        "invoice header",
    )?
    .with_convert_payments(false);

    match client.create_invoice(&invoice).await {
        Ok(created) => {
            println!("Invoice {} created", created.id());
            println!("Payment link: {}", created.link());
            for (currency, address) in created.addresses() {
                println!("  {currency}: {address}");
            }
        }
        Err(Error::Response { status, body }) => {
            eprintln!("API rejected the invoice ({status}): {body}");
        }
        Err(e) => return Err(e.into()),
    }

    Ok(())
}
