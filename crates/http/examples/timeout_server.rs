use std::error::Error;

use bytes::Bytes;
use futures::SinkExt;
use http::{Request, Response, StatusCode};
use http_body_util::Full;
use tokio_tungstenite::tungstenite::Message;
use tracing::{Level, error, info, warn};
use tracing_subscriber::FmtSubscriber;

use deadline_http::config::ServerConfig;
use deadline_http::connection::OnUpgrade;
use deadline_http::handler::make_handler;
use deadline_http::protocol::body::ReqBody;
use deadline_http::server::Server;
use deadline_http::websocket::{handshake_response, is_upgrade_request};

#[tokio::main]
async fn main() {
    let subscriber = FmtSubscriber::builder().with_max_level(Level::INFO).finish();
    tracing::subscriber::set_global_default(subscriber).expect("setting default subscriber failed");

    let server = match Server::builder()
        .address("127.0.0.1:8080")
        .handler(make_handler(route))
        .config(ServerConfig::builder().request_timeout_secs(0.6))
        .build()
    {
        Ok(server) => server,
        Err(e) => {
            error!(cause = %e, "build server error");
            return;
        }
    };

    server.start().await;
}

async fn route(mut request: Request<ReqBody>) -> Result<Response<Full<Bytes>>, Box<dyn Error + Send + Sync>> {
    info!(path = request.uri().path(), "receive request");

    match request.uri().path() {
        "/1" => Ok(Response::new(Full::new(Bytes::from_static(b"OK")))),

        "/ws1" if is_upgrade_request(&request) => {
            let Some(builder) = handshake_response(&request) else {
                return Ok(status(StatusCode::BAD_REQUEST));
            };
            let Some(on_upgrade) = OnUpgrade::on(&mut request) else {
                return Ok(status(StatusCode::BAD_REQUEST));
            };

            tokio::spawn(async move {
                let upgraded = match on_upgrade.await {
                    Ok(upgraded) => upgraded,
                    Err(e) => {
                        warn!(cause = %e, "upgrade failed");
                        return;
                    }
                };

                let mut ws = upgraded.into_websocket().await;
                if let Err(e) = ws.send(Message::text("OK")).await {
                    warn!(cause = %e, "websocket send failed");
                }
                if let Err(e) = ws.close(None).await {
                    warn!(cause = %e, "websocket close failed");
                }
            });

            Ok(builder.body(Full::new(Bytes::new()))?)
        }

        _ => Ok(status(StatusCode::NOT_FOUND)),
    }
}

fn status(status: StatusCode) -> Response<Full<Bytes>> {
    let mut response = Response::new(Full::new(Bytes::new()));
    *response.status_mut() = status;
    response
}
