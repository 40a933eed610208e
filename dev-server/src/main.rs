// dev-server/src/main.rs
use actix_web::{web, App, HttpServer};
use campus_dev_server::{configure, AppState};
use common::{setup_tracing, Config};

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    let config = Config::from_env();
    setup_tracing(&config.log_level);

    let server_addr = config.dev_server.addr.clone();
    tracing::info!(
        "Starting dev BFF on {} ({} role assignments)",
        server_addr,
        config.dev_server.roles.len()
    );

    let state = AppState::start(config.dev_server);
    let limiter = state.rate_limiter();
    let state_data = web::Data::new(state);

    HttpServer::new(move || {
        App::new()
            .wrap(limiter.clone())
            .app_data(state_data.clone())
            .configure(configure)
    })
    .bind(&server_addr)?
    .run()
    .await
}
