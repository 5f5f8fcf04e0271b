use std::{
    env,
    net::{Ipv6Addr, SocketAddr},
};

use axum::{extract::DefaultBodyLimit, routing::get};
use log::info;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};

mod auth;
mod comments;
mod context;
mod docs;
mod errors;
pub mod logging;
mod playlists;
mod schemas;
mod serialized;
mod streaming;
mod tracks;
mod users;

pub use context::{App, ServerContext};
pub use errors::{ServerError, ServerResult};

/// The default port the server will listen on.
pub const DEFAULT_PORT: u16 = 9350;

/// Uploads can be whole albums, so the body limit is generous
const MAX_BODY_SIZE: usize = 256 * 1024 * 1024;

pub type Router = axum::Router<ServerContext>;

/// Starts the opentone server
pub async fn run_server(context: ServerContext) {
    let port = env::var("OPENTONE_SERVER_PORT")
        .map(|x| x.parse::<u16>().expect("Port must be a number"))
        .unwrap_or(DEFAULT_PORT);

    let addr: SocketAddr = (Ipv6Addr::UNSPECIFIED, port).into();

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let version_one_router = Router::new()
        .nest("/auth", auth::router())
        .nest("/tracks", tracks::router())
        .nest("/users", users::router().merge(streaming::router()))
        .nest("/comments", comments::router())
        .nest("/playlists", playlists::router());

    let root_router = Router::new()
        .nest("/v1", version_one_router)
        .route("/api.json", get(docs::docs))
        .layer(DefaultBodyLimit::max(MAX_BODY_SIZE))
        .layer(cors)
        .with_state(context);

    let listener = TcpListener::bind(&addr).await.expect("listens on address");

    info!("Listening on port {port}");

    axum::serve(
        listener,
        root_router.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await
    .expect("server runs");
}
