use std::env;
use std::sync::Arc;

use itinera::api::{AuthAPI, RouteAPI};
use itinera::config::Config;
use itinera::gateway::Gateway;
use itinera::http::{HttpTransport, Transport};
use itinera::session::SessionStore;

#[tokio::main]
async fn main() {
    dotenv::dotenv().ok();
    tracing_subscriber::fmt::init();

    let config = Config::from_env().unwrap();
    let session = Arc::new(SessionStore::new());
    let transport: Arc<dyn Transport> = Arc::new(HttpTransport::new(config.api_base.clone()));
    let gateway = Gateway::new(&config, transport, session);

    let email = env::var("ITINERA_EMAIL").unwrap();
    let password = env::var("ITINERA_PASSWORD").unwrap();

    gateway.login(&email, &password).await.unwrap();

    let routes = gateway.get_routes().await.unwrap();
    tracing::info!(count = routes.len(), "fetched saved routes");

    for route in routes {
        tracing::info!(id = %route.id, name = %route.name, stops = route.stops.len(), "route");
    }
}
