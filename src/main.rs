use tracing::{error, info, warn, Instrument};

use cart_sync::app_system::{setup_tracing, AppContext};
use cart_sync::config::AppConfig;

#[tokio::main]
async fn main() -> Result<(), String> {
    setup_tracing();

    let config = AppConfig::from_env().map_err(|e| e.to_string())?;
    info!(base_url = %config.base_url, "Starting cart demo");

    let ctx = AppContext::new(config);
    let drawer = ctx.cart_component();

    let span = tracing::info_span!("cart_load");
    async {
        drawer.init().await;
        info!(items = drawer.item_count(), "Cart loaded");
    }
    .instrument(span)
    .await;

    let span = tracing::info_span!("add_to_cart", product_id = 1);
    let added = async {
        info!("Adding one unit");
        ctx.cart.add_item(1, 1).await
    }
    .instrument(span)
    .await;

    if added {
        let cart = ctx.cart.get_cart().await;
        info!(total_items = cart.total_items, total_price = %cart.total_price, "Cart updated");
    } else {
        match ctx.cart.last_failure() {
            Some(failure) => {
                error!(status = ?failure.status, message = %failure.message, "Add failed")
            }
            None => warn!("Add failed without a server response"),
        }
    }

    for toast in ctx.notifications.tray().visible() {
        info!(kind = %toast.kind, message = %toast.message, "Toast");
    }

    drawer.destroy();
    ctx.shutdown();

    info!("Demo completed");
    Ok(())
}
