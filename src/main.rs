use std::net::SocketAddr;
use std::sync::Arc;
use tracing::info;

use route_editor::{config, editor::MapEditor, handlers, osrm::OsrmClient, telemetry};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    telemetry::init_telemetry()?;
    let config = config::CONFIG.clone();

    info!("Routing backend: {}", config.routing_url);
    info!("Route cache size: {}", config.route_cache_size);
    info!("Max post size: {}", config.max_post_size);

    let backend = Arc::new(OsrmClient::new(config.routing_options())?);
    let editor = Arc::new(MapEditor::new(backend));
    let api = handlers::routes(editor, config.max_post_size.as_u64());

    let addr = SocketAddr::from((config.bind, config.port));
    info!("Listening on http://{}", addr);
    warp::serve(api).run(addr).await;
    Ok(())
}
