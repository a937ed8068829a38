use anyhow::Result;
use hyper::{body::to_bytes, Body};
use kube::{error::ErrorResponse, Client};
use serde::Serialize;

pub type ApiServerHandle = tower_test::mock::Handle<http::Request<Body>, http::Response<Body>>;

// Create a kube client whose requests are answered by the returned handle
pub fn mock_client() -> (Client, ApiServerHandle) {
    let (mock_service, handle) =
        tower_test::mock::pair::<http::Request<Body>, http::Response<Body>>();
    (Client::new(mock_service, "default"), handle)
}

pub async fn timeout_after_1s(handle: tokio::task::JoinHandle<()>) {
    tokio::time::timeout(std::time::Duration::from_secs(1), handle)
        .await
        .expect("timeout on mock apiserver")
        .expect("stub succeeded")
}

/// A request received by the stub API server.
#[derive(Debug)]
pub struct Request {
    pub method: String,
    pub path: String,
    pub body: serde_json::Value,
}

impl Request {
    pub async fn from_request(request: http::Request<Body>) -> Result<Self> {
        let method = request.method().to_string();
        let path = request.uri().path().to_owned();
        let body_bytes = to_bytes(request.into_body()).await?;
        let body = if body_bytes.is_empty() {
            serde_json::Value::Null
        } else {
            serde_json::from_slice(&body_bytes)?
        };
        Ok(Self { method, path, body })
    }
}

/// Answers the requests of a mocked kube client one at a time.
pub struct ApiServerVerifier(ApiServerHandle);

impl ApiServerVerifier {
    pub fn new(handle: ApiServerHandle) -> Self {
        Self(handle)
    }

    // Respond with `response`, or with a NotFound error when it is None.
    pub async fn handle_request_response<T>(&mut self, response: Option<&T>) -> Result<Request>
    where
        T: ?Sized + Serialize,
    {
        let (request, send) = self.0.next_request().await.expect("service not called");
        let request = Request::from_request(request).await?;

        let response = if let Some(response) = response {
            http::Response::builder().body(Body::from(serde_json::to_vec(response)?))?
        } else {
            let error = ErrorResponse {
                status: "Failure".to_owned(),
                code: 404,
                message: "stub message".to_owned(),
                reason: "NotFound".to_owned(),
            };
            http::Response::builder()
                .status(404)
                .body(Body::from(serde_json::to_vec(&error)?))?
        };
        send.send_response(response);
        Ok(request)
    }

    // Respond with the body of the request, as the apiserver does for create and replace.
    pub async fn handle_echo(&mut self) -> Result<Request> {
        let (request, send) = self.0.next_request().await.expect("service not called");
        let request = Request::from_request(request).await?;
        send.send_response(
            http::Response::builder().body(Body::from(serde_json::to_vec(&request.body)?))?,
        );
        Ok(request)
    }

    // Respond with an error status and reason.
    pub async fn handle_error(&mut self, code: u16, reason: &str) -> Result<Request> {
        let (request, send) = self.0.next_request().await.expect("service not called");
        let request = Request::from_request(request).await?;
        let error = ErrorResponse {
            status: "Failure".to_owned(),
            code,
            message: "stub message".to_owned(),
            reason: reason.to_owned(),
        };
        send.send_response(
            http::Response::builder()
                .status(code)
                .body(Body::from(serde_json::to_vec(&error)?))?,
        );
        Ok(request)
    }
}
