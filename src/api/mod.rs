//! HTTP client for the Hypeman API.

pub mod error;
pub mod types;

use std::pin::Pin;
use std::time::Duration;

use bytes::Bytes;
use futures::{Stream, StreamExt};
use reqwest::header::ACCEPT;
use reqwest::multipart::{Form, Part};
use reqwest::{Client, Method, RequestBuilder, Response, Url};

pub use error::ApiError;
pub use types::{
    AttachVolumeRequest, AvailableDevice, Build, BuildRequest, CreateImageRequest,
    CreateInstanceRequest, CreateVolumeRequest, Device, GpuRequest, Image, ImageStatus, Instance,
    InstanceGpu, NetworkSettings, RegisterDeviceRequest, Volume, VolumeMount,
};

use crate::events::EventStream;
use crate::output::Document;

/// Response body as it arrives.
pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes, reqwest::Error>> + Send>>;

#[derive(Debug, Clone)]
pub struct ClientOptions {
    pub base_url: String,
    pub api_key: Option<String>,
    pub user_agent: String,
    pub connect_timeout: Duration,
}

pub struct ApiClient {
    http: Client,
    base_url: Url,
    api_key: Option<String>,
}

impl ApiClient {
    pub fn new(options: ClientOptions) -> Result<Self, ApiError> {
        let base_url = Url::parse(&options.base_url).map_err(|e| ApiError::InvalidBaseUrl {
            url: options.base_url.clone(),
            reason: e.to_string(),
        })?;
        if base_url.cannot_be_a_base() {
            return Err(ApiError::InvalidBaseUrl {
                url: options.base_url,
                reason: "not a hierarchical URL".to_string(),
            });
        }

        let http = Client::builder()
            .user_agent(options.user_agent)
            .connect_timeout(options.connect_timeout)
            .build()?;

        Ok(Self {
            http,
            base_url,
            api_key: options.api_key.filter(|k| !k.is_empty()),
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Base URL plus path segments, each percent-encoded.
    fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    fn request(&self, method: Method, url: Url) -> RequestBuilder {
        let builder = self.http.request(method, url);
        match &self.api_key {
            Some(key) => builder.bearer_auth(key),
            None => builder,
        }
    }

    async fn send(&self, builder: RequestBuilder) -> Result<Response, ApiError> {
        let request = builder.build()?;
        let method = request.method().clone();
        let url = request.url().clone();

        let response = self.http.execute(request).await?;
        let status = response.status();
        tracing::debug!(%method, %url, status = status.as_u16(), "api request");

        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(ApiError::Status {
            status: status.as_u16(),
            body: body.trim().to_string(),
        })
    }

    async fn document(&self, builder: RequestBuilder) -> Result<Document, ApiError> {
        let response = self.send(builder).await?;
        let bytes = response.bytes().await?;
        Ok(Document::from_bytes(&bytes)?)
    }

    async fn get(&self, segments: &[&str]) -> Result<Document, ApiError> {
        self.document(self.request(Method::GET, self.endpoint(segments)))
            .await
    }

    pub async fn list_builds(&self) -> Result<Document, ApiError> {
        self.get(&["builds"]).await
    }

    pub async fn get_build(&self, id: &str) -> Result<Document, ApiError> {
        self.get(&["builds", id]).await
    }

    pub async fn create_build(&self, build: BuildRequest) -> Result<Document, ApiError> {
        let source = Part::bytes(build.source)
            .file_name(build.source_file_name)
            .mime_str("application/gzip")?;
        let mut form = Form::new().part("source", source);
        let fields = [
            ("dockerfile", build.dockerfile),
            ("base_image_digest", build.base_image_digest),
            ("cache_scope", build.cache_scope),
            ("global_cache_key", build.global_cache_key),
            ("is_admin_build", build.is_admin_build.then(|| "true".to_string())),
            ("secrets", build.secrets),
            ("timeout_seconds", build.timeout_seconds.map(|t| t.to_string())),
        ];
        for (name, value) in fields {
            if let Some(value) = value {
                form = form.text(name, value);
            }
        }

        let builder = self
            .request(Method::POST, self.endpoint(&["builds"]))
            .multipart(form);
        self.document(builder).await
    }

    /// Open the build's event stream. With `follow` the server keeps the
    /// connection open after replaying buffered events.
    pub async fn build_events(
        &self,
        id: &str,
        follow: bool,
        idle_timeout: Option<Duration>,
    ) -> Result<EventStream<ByteStream>, ApiError> {
        let mut url = self.endpoint(&["builds", id, "events"]);
        if follow {
            url.query_pairs_mut().append_pair("follow", "true");
        }
        let builder = self
            .request(Method::GET, url)
            .header(ACCEPT, "text/event-stream");
        let response = self.send(builder).await?;
        tracing::debug!(build = %id, follow, "build event stream opened");
        Ok(EventStream::new(response.bytes_stream().boxed(), idle_timeout))
    }

    pub async fn list_images(&self) -> Result<Document, ApiError> {
        self.get(&["images"]).await
    }

    pub async fn get_image(&self, name: &str) -> Result<Document, ApiError> {
        self.get(&["images", name]).await
    }

    pub async fn create_image(&self, name: &str) -> Result<Document, ApiError> {
        let body = CreateImageRequest {
            name: name.to_string(),
        };
        let builder = self
            .request(Method::POST, self.endpoint(&["images"]))
            .json(&body);
        self.document(builder).await
    }

    pub async fn delete_image(&self, name: &str) -> Result<(), ApiError> {
        self.send(self.request(Method::DELETE, self.endpoint(&["images", name])))
            .await?;
        Ok(())
    }

    pub async fn list_instances(&self) -> Result<Document, ApiError> {
        self.get(&["instances"]).await
    }

    pub async fn create_instance(
        &self,
        body: &CreateInstanceRequest,
    ) -> Result<Document, ApiError> {
        let builder = self
            .request(Method::POST, self.endpoint(&["instances"]))
            .json(body);
        self.document(builder).await
    }

    /// Stream an instance's console log.
    pub async fn instance_logs(
        &self,
        id: &str,
        tail: u32,
        follow: bool,
    ) -> Result<ByteStream, ApiError> {
        let mut url = self.endpoint(&["instances", id, "logs"]);
        {
            let mut query = url.query_pairs_mut();
            query.append_pair("tail", &tail.to_string());
            if follow {
                query.append_pair("follow", "true");
            }
        }
        let response = self.send(self.request(Method::GET, url)).await?;
        Ok(response.bytes_stream().boxed())
    }

    pub async fn list_volumes(&self) -> Result<Document, ApiError> {
        self.get(&["volumes"]).await
    }

    pub async fn create_volume(&self, body: &CreateVolumeRequest) -> Result<Document, ApiError> {
        let builder = self
            .request(Method::POST, self.endpoint(&["volumes"]))
            .json(body);
        self.document(builder).await
    }

    pub async fn get_volume(&self, id: &str) -> Result<Document, ApiError> {
        self.get(&["volumes", id]).await
    }

    pub async fn delete_volume(&self, id: &str) -> Result<(), ApiError> {
        self.send(self.request(Method::DELETE, self.endpoint(&["volumes", id])))
            .await?;
        Ok(())
    }

    pub async fn attach_volume(
        &self,
        instance_id: &str,
        volume_id: &str,
        body: &AttachVolumeRequest,
    ) -> Result<Document, ApiError> {
        let url = self.endpoint(&["instances", instance_id, "volumes", volume_id]);
        self.document(self.request(Method::POST, url).json(body))
            .await
    }

    pub async fn detach_volume(
        &self,
        instance_id: &str,
        volume_id: &str,
    ) -> Result<Document, ApiError> {
        let url = self.endpoint(&["instances", instance_id, "volumes", volume_id]);
        self.document(self.request(Method::DELETE, url)).await
    }

    /// Passthrough-capable PCI devices on the host.
    pub async fn available_devices(&self) -> Result<Document, ApiError> {
        self.get(&["devices", "available"]).await
    }

    pub async fn register_device(
        &self,
        body: &RegisterDeviceRequest,
    ) -> Result<Document, ApiError> {
        let builder = self
            .request(Method::POST, self.endpoint(&["devices"]))
            .json(body);
        self.document(builder).await
    }

    pub async fn list_devices(&self) -> Result<Document, ApiError> {
        self.get(&["devices"]).await
    }

    pub async fn get_device(&self, id: &str) -> Result<Document, ApiError> {
        self.get(&["devices", id]).await
    }

    pub async fn delete_device(&self, id: &str) -> Result<(), ApiError> {
        self.send(self.request(Method::DELETE, self.endpoint(&["devices", id])))
            .await?;
        Ok(())
    }

    pub async fn resources(&self) -> Result<Document, ApiError> {
        self.get(&["resources"]).await
    }
}
