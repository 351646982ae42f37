//! Read-only status API plus the forced check trigger

mod error;
mod routes;
mod view;

use routes::routes;

use actix_web::{App, HttpServer, web};
use fleetwatch::Monitor;
use std::net::SocketAddr;
use tracing::info;

/// Serve the status API until the server is stopped
pub async fn serve(monitor: Monitor, addr: SocketAddr) -> std::io::Result<()> {
    let data = web::Data::new(monitor);

    info!(%addr, "status API listening");
    HttpServer::new(move || App::new().app_data(data.clone()).configure(routes))
        .bind(addr)?
        .run()
        .await
}
