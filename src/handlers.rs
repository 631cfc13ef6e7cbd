use crate::peers::{LeaveOutcome, PeerRequest};
use crate::store::MembershipStore;
use hyper::header::{HeaderValue, CONTENT_TYPE};
use hyper::server::conn::Http;
use hyper::service::service_fn;
use hyper::{Body, Method, Request, Response, StatusCode};
use std::net::{SocketAddr, SocketAddrV4};
use tokio::net::TcpStream;
use tracing::{error, info};

/// State shared by every connection of the discovery service.
#[derive(Clone)]
pub struct DiscoveryService {
    pub store: MembershipStore,
    /// Port every node of the network serves on.
    pub port: u16,
}

pub async fn handle_connection(stream: TcpStream, remote: SocketAddr, service: DiscoveryService) {
    let svc = service_fn(move |req| {
        let service = service.clone();
        async move { route_request(req, remote, service).await }
    });

    if let Err(e) = Http::new().serve_connection(stream, svc).await {
        error!("connection error with {}: {}", remote, e);
    }
}

pub async fn route_request(
    req: Request<Body>,
    remote: SocketAddr,
    service: DiscoveryService,
) -> Result<Response<Body>, hyper::Error> {
    let method = req.method().clone();
    let path = req.uri().path().to_string();

    match (&method, path.as_str()) {
        (&Method::GET, "/") => match service.store.addresses() {
            Ok(addresses) => Ok(json_response(
                StatusCode::OK,
                serde_json::json!(addresses).to_string(),
            )),
            Err(e) => {
                error!("failed to list members: {}", e);
                Ok(error_response(StatusCode::INTERNAL_SERVER_ERROR, &e.to_string()))
            }
        },

        (&Method::GET, "/join") => {
            // Joiners are reachable on the same port we serve on.
            let address = format!("{}:{}", remote.ip(), service.port);
            match service.store.add(&address) {
                Ok(added) => {
                    if added {
                        info!("{} joined the network", address);
                    }
                    Ok(json_response(
                        StatusCode::CREATED,
                        serde_json::json!({ "status": "joined", "address": address }).to_string(),
                    ))
                }
                Err(e) => {
                    error!("failed to register {}: {}", address, e);
                    Ok(error_response(StatusCode::INTERNAL_SERVER_ERROR, &e.to_string()))
                }
            }
        }

        // Peers accepted by a sweep of this node.
        (&Method::POST, "/peers") => {
            let address = match read_peer_request(req).await? {
                Ok(request) => request.address,
                Err(response) => return Ok(response),
            };
            match service.store.add(&address) {
                Ok(true) => {
                    info!("Registered active peer {}", address);
                    Ok(json_response(
                        StatusCode::CREATED,
                        serde_json::json!({ "status": "registered", "address": address }).to_string(),
                    ))
                }
                Ok(false) => Ok(json_response(
                    StatusCode::OK,
                    serde_json::json!({ "status": "known", "address": address }).to_string(),
                )),
                Err(e) => {
                    error!("failed to register {}: {}", address, e);
                    Ok(error_response(StatusCode::INTERNAL_SERVER_ERROR, &e.to_string()))
                }
            }
        }

        (&Method::POST, "/leave") => {
            let address = match read_peer_request(req).await? {
                Ok(request) => request.address,
                Err(response) => return Ok(response),
            };
            match service.store.leave(&address, &[]) {
                LeaveOutcome::Left(address) => Ok(json_response(
                    StatusCode::OK,
                    serde_json::json!({ "status": "left", "address": address }).to_string(),
                )),
                LeaveOutcome::NotConnected(_) => {
                    Ok(error_response(StatusCode::NOT_FOUND, "not connected"))
                }
                LeaveOutcome::ErrorDeleting { detail, .. } => {
                    Ok(error_response(StatusCode::INTERNAL_SERVER_ERROR, &detail))
                }
            }
        }

        _ => Ok(error_response(StatusCode::NOT_FOUND, "not found")),
    }
}

/// Decode a `{"address": "ip:port"}` body, or the 400 to answer with.
async fn read_peer_request(
    req: Request<Body>,
) -> Result<std::result::Result<PeerRequest, Response<Body>>, hyper::Error> {
    let body = hyper::body::to_bytes(req.into_body()).await?;
    let request = match serde_json::from_slice::<PeerRequest>(&body) {
        Ok(request) => request,
        Err(_) => return Ok(Err(error_response(StatusCode::BAD_REQUEST, "invalid JSON"))),
    };
    if request.address.parse::<SocketAddrV4>().is_err() {
        return Ok(Err(error_response(
            StatusCode::BAD_REQUEST,
            &format!("invalid address: {}", request.address),
        )));
    }
    Ok(Ok(request))
}

fn error_response(status: StatusCode, message: &str) -> Response<Body> {
    json_response(status, serde_json::json!({ "error": message }).to_string())
}

fn json_response(status: StatusCode, body: String) -> Response<Body> {
    let mut response = Response::new(Body::from(body));
    *response.status_mut() = status;
    response
        .headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    response
}
