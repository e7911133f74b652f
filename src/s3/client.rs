//! S3 control-plane client for bucket configuration
//!
//! - HTTP/1.1 hyper client over native-tls
//! - Path-style addressing (`{endpoint}/{bucket}?sub-resource=`)
//! - Every request signed with SigV4; bodies carry Content-MD5
//! - No retries: every failure goes straight back to the caller

use crate::s3::api::BucketApi;
use crate::s3::signer::SignerV4;
use crate::s3::types::{
    BucketPolicy, CreateBucketConfiguration, ErrorDocument, PublicAccessBlockConfiguration,
    WebsiteConfiguration,
};
use async_trait::async_trait;
use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper::{Method, Request, StatusCode};
use hyper_tls::HttpsConnector;
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::client::legacy::Client as HyperClient;
use hyper_util::rt::TokioExecutor;
use native_tls::TlsConnector;
use std::collections::BTreeMap;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

/// S3 client errors
#[derive(Error, Debug)]
pub enum S3Error {
    #[error("HTTP error: {0}")]
    Http(#[from] hyper::http::Error),

    #[error("Hyper error: {0}")]
    Hyper(#[from] hyper::Error),

    #[error("Request failed: {0}")]
    Client(#[from] hyper_util::client::legacy::Error),

    #[error("TLS error: {0}")]
    Tls(#[from] native_tls::Error),

    /// Error document returned by the provider
    #[error("{code}: {message}")]
    Service {
        status: StatusCode,
        code: String,
        message: String,
        request_id: Option<String>,
    },

    /// Non-success response without a parseable error document
    #[error("S3 error: {status} - {message}")]
    S3Response { status: StatusCode, message: String },

    #[error("Request timed out after {0:?}")]
    Timeout(Duration),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

pub type Result<T> = std::result::Result<T, S3Error>;

impl S3Error {
    /// Build a provider error from a status code, error code and message
    pub fn service(status: u16, code: impl Into<String>, message: impl Into<String>) -> Self {
        S3Error::Service {
            status: StatusCode::from_u16(status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR),
            code: code.into(),
            message: message.into(),
            request_id: None,
        }
    }

    /// Map a non-success response to an error, preferring the `<Error>` document
    fn from_response(status: StatusCode, body: &[u8]) -> Self {
        match ErrorDocument::parse(body) {
            Some(doc) => S3Error::Service {
                status,
                code: doc.code,
                message: doc.message,
                request_id: doc.request_id,
            },
            None => S3Error::S3Response {
                status,
                message: String::from_utf8_lossy(body).trim().to_string(),
            },
        }
    }

    /// Provider error code, or a local code for transport-level failures
    pub fn code(&self) -> String {
        match self {
            S3Error::Service { code, .. } => code.clone(),
            S3Error::S3Response { status, .. } => format!("Http{}", status.as_u16()),
            S3Error::Http(_) | S3Error::Hyper(_) | S3Error::Client(_) | S3Error::Tls(_) => {
                "NetworkError".to_string()
            }
            S3Error::Timeout(_) => "RequestTimeout".to_string(),
            S3Error::InvalidRequest(_) => "InvalidRequest".to_string(),
        }
    }

    /// Human-readable detail without the code prefix
    pub fn message(&self) -> String {
        match self {
            S3Error::Service { message, .. } => message.clone(),
            S3Error::S3Response { status, message } if message.is_empty() => status.to_string(),
            S3Error::S3Response { message, .. } => message.clone(),
            other => other.to_string(),
        }
    }

    /// HTTP status of the response, when one was received
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            S3Error::Service { status, .. } | S3Error::S3Response { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// Regional AWS endpoint for `region`
pub fn regional_endpoint(region: &str) -> String {
    format!("https://s3.{}.amazonaws.com", region)
}

/// S3 client bound to one region and endpoint
///
/// Clone is cheap - the underlying HTTP client uses Arc internally.
#[derive(Clone)]
pub struct S3Client {
    client: HyperClient<HttpsConnector<HttpConnector>, Full<Bytes>>,
    signer: SignerV4,
    endpoint: String,
    timeout: Option<Duration>,
}

impl std::fmt::Debug for S3Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("S3Client")
            .field("endpoint", &self.endpoint)
            .field("signer", &self.signer)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

impl S3Client {
    /// Create a client for `region` talking to the regional AWS endpoint.
    ///
    /// `insecure` disables certificate and hostname verification, for
    /// self-signed S3-compatible test endpoints only.
    pub fn new(
        access_key: String,
        secret_key: &str,
        region: &str,
        insecure: bool,
    ) -> Result<Self> {
        let mut http = HttpConnector::new();
        http.set_nodelay(true);
        http.enforce_http(false);
        http.set_connect_timeout(Some(Duration::from_secs(10)));

        let tls = if insecure {
            tracing::warn!("INSECURE TLS MODE ENABLED: Certificate verification is disabled!");
            TlsConnector::builder()
                .danger_accept_invalid_certs(true)
                .danger_accept_invalid_hostnames(true)
                .build()?
        } else {
            TlsConnector::new()?
        };

        let https = HttpsConnector::from((http, tls.into()));

        let client = HyperClient::builder(TokioExecutor::new())
            .pool_idle_timeout(Duration::from_secs(30))
            .set_host(true)
            .build(https);

        Ok(Self {
            client,
            signer: SignerV4::new(access_key, secret_key, region),
            endpoint: regional_endpoint(region),
            timeout: None,
        })
    }

    /// Point the client at a different endpoint (e.g. MinIO or LocalStack)
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into().trim_end_matches('/').to_string();
        self
    }

    /// Use temporary credentials
    pub fn with_session_token(mut self, token: Option<String>) -> Self {
        self.signer = self.signer.with_session_token(token);
        self
    }

    /// Bound each request (connect, send and body) by `timeout`
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn region(&self) -> &str {
        self.signer.region()
    }

    /// `{endpoint}/{bucket}`, plus `?{sub_resource}=` when given
    fn bucket_url(&self, bucket: &str, sub_resource: Option<&str>) -> String {
        let mut url = String::with_capacity(self.endpoint.len() + bucket.len() + 24);
        url.push_str(&self.endpoint);
        url.push('/');
        url.push_str(bucket);
        if let Some(sub) = sub_resource {
            // Explicit empty value so the canonical query string is "sub="
            url.push('?');
            url.push_str(sub);
            url.push('=');
        }
        url
    }

    /// Sign and send one request, returning the response body on 2xx
    async fn send(
        &self,
        method: Method,
        url: &str,
        body: Vec<u8>,
        content_type: &str,
    ) -> Result<Bytes> {
        let mut headers = BTreeMap::new();
        // S3 answers 411 MissingContentLength to a PUT without one, even when empty
        headers.insert("content-length".to_string(), body.len().to_string());
        if !body.is_empty() {
            let md5_hash = md5::compute(&body);
            let md5_base64 =
                base64::Engine::encode(&base64::engine::general_purpose::STANDARD, &md5_hash[..]);
            headers.insert("content-type".to_string(), content_type.to_string());
            headers.insert("content-md5".to_string(), md5_base64);
        }

        let signed_headers = self.signer.sign(method.as_str(), url, headers, &body);

        let mut req = Request::builder().method(method.clone()).uri(url);
        for (key, value) in signed_headers.iter() {
            req = req.header(key, value);
        }
        let request = req.body(Full::new(Bytes::from(body)))?;

        debug!(method = %method, url = %url, "sending request");

        let exchange = async {
            let response = self.client.request(request).await?;
            let status = response.status();
            let body_bytes = response.collect().await?.to_bytes();
            Ok::<_, S3Error>((status, body_bytes))
        };

        let (status, body_bytes) = match self.timeout {
            Some(timeout) => tokio::time::timeout(timeout, exchange)
                .await
                .map_err(|_| S3Error::Timeout(timeout))??,
            None => exchange.await?,
        };

        debug!(status = %status, url = %url, "response received");

        if !status.is_success() {
            return Err(S3Error::from_response(status, &body_bytes));
        }

        Ok(body_bytes)
    }
}

#[async_trait]
impl BucketApi for S3Client {
    async fn create_bucket(
        &self,
        bucket: &str,
        configuration: Option<CreateBucketConfiguration>,
    ) -> Result<()> {
        let url = self.bucket_url(bucket, None);
        let body = configuration
            .map(|c| c.to_xml().into_bytes())
            .unwrap_or_default();
        self.send(Method::PUT, &url, body, "application/xml").await?;
        Ok(())
    }

    async fn put_public_access_block(
        &self,
        bucket: &str,
        configuration: &PublicAccessBlockConfiguration,
    ) -> Result<()> {
        let url = self.bucket_url(bucket, Some("publicAccessBlock"));
        self.send(
            Method::PUT,
            &url,
            configuration.to_xml().into_bytes(),
            "application/xml",
        )
        .await?;
        Ok(())
    }

    async fn put_bucket_website(
        &self,
        bucket: &str,
        configuration: &WebsiteConfiguration,
    ) -> Result<()> {
        let url = self.bucket_url(bucket, Some("website"));
        self.send(
            Method::PUT,
            &url,
            configuration.to_xml().into_bytes(),
            "application/xml",
        )
        .await?;
        Ok(())
    }

    async fn put_bucket_policy(&self, bucket: &str, policy: &BucketPolicy) -> Result<()> {
        let url = self.bucket_url(bucket, Some("policy"));
        let body = policy
            .to_json()
            .map_err(|e| S3Error::InvalidRequest(format!("policy serialization: {}", e)))?;
        self.send(Method::PUT, &url, body.into_bytes(), "application/json")
            .await?;
        Ok(())
    }
}
