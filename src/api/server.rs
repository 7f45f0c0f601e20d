use crate::api::routes;
use crate::modules::ModulesManager;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::info;

/// Starts and runs the HTTP server using Axum web framework
///
/// # Arguments
/// * `port` - Port number to listen on for incoming HTTP connections
/// * `manager` - Tool manager serving every route
///
/// # Returns
/// * `Result<(), std::io::Error>` - Returns when the listener fails or the server stops
pub async fn launch_server(port: u16, manager: Arc<ModulesManager>) -> Result<(), std::io::Error> {
    let app = routes::app(manager);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));

    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("Listening on http://{}", addr);
    axum::serve(listener, app).await
}
