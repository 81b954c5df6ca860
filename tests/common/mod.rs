#![allow(dead_code)]

use hyper::service::{make_service_fn, service_fn};
use hyper::{Body, Request, Response, Server};
use std::collections::HashMap;
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

/// A request as seen by the stub server
#[derive(Debug, Clone)]
pub struct StubRequest {
    pub method: String,
    pub target: String,
    pub headers: HashMap<String, String>,
    pub body: Vec<u8>,
}

impl StubRequest {
    fn url(&self) -> url::Url {
        url::Url::parse(&format!("http://stub{}", self.target)).unwrap()
    }

    pub fn path(&self) -> String {
        self.url().path().to_string()
    }

    pub fn query(&self, key: &str) -> Option<String> {
        self.url()
            .query_pairs()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.into_owned())
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }

    pub fn form(&self) -> HashMap<String, String> {
        url::form_urlencoded::parse(&self.body)
            .into_owned()
            .collect()
    }
}

#[derive(Debug, Clone)]
pub struct StubResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl StubResponse {
    pub fn json(status: u16, value: serde_json::Value) -> Self {
        StubResponse {
            status,
            headers: vec![("Content-Type".to_string(), "application/json".to_string())],
            body: value.to_string().into_bytes(),
        }
    }

    pub fn bytes(status: u16, body: impl Into<Vec<u8>>) -> Self {
        StubResponse {
            status,
            headers: vec![(
                "Content-Type".to_string(),
                "application/octet-stream".to_string(),
            )],
            body: body.into(),
        }
    }

    pub fn empty(status: u16) -> Self {
        StubResponse {
            status,
            headers: Vec::new(),
            body: Vec::new(),
        }
    }

    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.headers.push((name.to_string(), value.to_string()));
        self
    }
}

/// hyper server on a loopback port that records every request
pub struct StubServer {
    pub addr: SocketAddr,
    pub requests: Arc<Mutex<Vec<StubRequest>>>,
}

impl StubServer {
    pub async fn start<F>(handler: F) -> Self
    where
        F: Fn(&StubRequest) -> StubResponse + Send + Sync + 'static,
    {
        let requests = Arc::new(Mutex::new(Vec::new()));
        let handler = Arc::new(handler);

        let recorded = Arc::clone(&requests);
        let make_service = make_service_fn(move |_| {
            let handler = Arc::clone(&handler);
            let recorded = Arc::clone(&recorded);
            async move {
                Ok::<_, Infallible>(service_fn(move |req| {
                    respond(req, Arc::clone(&handler), Arc::clone(&recorded))
                }))
            }
        });

        let server = Server::bind(&SocketAddr::from(([127, 0, 0, 1], 0))).serve(make_service);
        let addr = server.local_addr();
        tokio::spawn(async move {
            let _ = server.await;
        });

        StubServer { addr, requests }
    }

    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub fn requests(&self) -> Vec<StubRequest> {
        self.requests.lock().unwrap().clone()
    }
}

async fn respond<F>(
    req: Request<Body>,
    handler: Arc<F>,
    recorded: Arc<Mutex<Vec<StubRequest>>>,
) -> Result<Response<Body>, Infallible>
where
    F: Fn(&StubRequest) -> StubResponse,
{
    let (parts, body) = req.into_parts();
    let body = hyper::body::to_bytes(body).await.unwrap_or_default();
    let request = StubRequest {
        method: parts.method.to_string(),
        target: parts
            .uri
            .path_and_query()
            .map(|pq| pq.as_str().to_string())
            .unwrap_or_else(|| "/".to_string()),
        headers: parts
            .headers
            .iter()
            .map(|(name, value)| {
                (
                    name.as_str().to_ascii_lowercase(),
                    value.to_str().unwrap_or_default().to_string(),
                )
            })
            .collect(),
        body: body.to_vec(),
    };

    let stub = handler(&request);
    recorded.lock().unwrap().push(request);

    let mut response = Response::builder().status(stub.status);
    for (name, value) in &stub.headers {
        response = response.header(name.as_str(), value.as_str());
    }
    Ok(response.body(Body::from(stub.body)).unwrap())
}

/// Writes an "installed" OAuth client descriptor pointing at `token_uri`
pub fn write_client_secret(dir: &std::path::Path, token_uri: &str) -> std::path::PathBuf {
    let path = dir.join("client_secret.json");
    let json = serde_json::json!({
        "installed": {
            "client_id": "test-client.apps.googleusercontent.com",
            "client_secret": "test-secret",
            "auth_uri": "https://accounts.google.com/o/oauth2/auth",
            "token_uri": token_uri,
            "redirect_uris": ["http://localhost"]
        }
    });
    std::fs::write(&path, json.to_string()).unwrap();
    path
}
