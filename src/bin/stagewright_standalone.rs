//! stagewright-standalone: run `PlaceOrder` against the demo warehouse.
//!
//! ```text
//! stagewright-standalone [CUSTOMER] [PART] [QUANTITY]
//! ```
//!
//! Defaults to "Mr. Customer", "Left-Handed Widget", 3. Configuration is read
//! from `stagewright.yaml`, `STAGEWRIGHT_CONFIG` and `STAGEWRIGHT__*`
//! environment variables; logging from `STAGEWRIGHT_LOG`.

use tracing::{error, info};

use stagewright::config::Config;
use stagewright::standalone::{Standalone, PLACE_ORDER};
use stagewright::types::Value;
use stagewright::utils::bootstrap::init_tracing;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing();

    let config = Config::load(None)?;
    let standalone = Standalone::build(&config).await?;

    let mut args = std::env::args().skip(1);
    let customer = args.next().unwrap_or_else(|| "Mr. Customer".to_string());
    let part = args.next().unwrap_or_else(|| "Left-Handed Widget".to_string());
    let quantity: i64 = match args.next() {
        Some(raw) => raw.parse()?,
        None => 3,
    };

    info!(%customer, %part, quantity, "Placing order");
    let response = standalone
        .engine()
        .call(
            PLACE_ORDER,
            vec![Value::from(customer), Value::from(part), Value::from(quantity)],
        )
        .await;

    if response.is_success() {
        let order_id = response
            .result()
            .and_then(|t| t.get_named(0, "ORDERID"))
            .map(ToString::to_string)
            .unwrap_or_default();
        println!("{}: ORDERID {}", response.status, order_id);
    } else {
        error!(status = %response.status, "Order not placed");
        println!(
            "{}: {}",
            response.status,
            response.status_string.as_deref().unwrap_or_default()
        );
    }
    Ok(())
}
