//! Typed CRUD over the system service's inventory endpoints.

use std::marker::PhantomData;

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::json;

use crate::config::Service;
use crate::error::ApiError;
use crate::http::{ApiClient, ApiRequest};
use crate::model::{
    Accessory, Computer, Envelope, Lab, Part, PartStatus, PartStatusUpdate, PartStatuses, Report,
    ReportKind, User,
};

/// A record type served under one collection path.
pub trait Resource: Serialize + DeserializeOwned + Send + Sync + 'static {
    /// Collection path on the system service, e.g. `/labs`.
    const PATH: &'static str;
    /// Singular name used in error messages.
    const NAME: &'static str;

    /// Path segment identifying this record, once the server assigned one.
    fn key(&self) -> Option<String>;
}

impl Resource for Lab {
    const PATH: &'static str = "/labs";
    const NAME: &'static str = "lab";
    fn key(&self) -> Option<String> {
        self.id.map(|id| id.to_string())
    }
}

impl Resource for Computer {
    const PATH: &'static str = "/computers";
    const NAME: &'static str = "computer";
    fn key(&self) -> Option<String> {
        self.id.map(|id| id.to_string())
    }
}

impl Resource for Accessory {
    const PATH: &'static str = "/accessories";
    const NAME: &'static str = "accessory";
    fn key(&self) -> Option<String> {
        self.id.map(|id| id.to_string())
    }
}

impl Resource for Report {
    const PATH: &'static str = "/reports";
    const NAME: &'static str = "report";
    fn key(&self) -> Option<String> {
        self.id.map(|id| id.to_string())
    }
}

/// Users are addressed by email.
impl Resource for User {
    const PATH: &'static str = "/users";
    const NAME: &'static str = "user";
    fn key(&self) -> Option<String> {
        (!self.email.is_empty()).then(|| self.email.clone())
    }
}

/// Type-safe CRUD client for a single resource.
///
/// Request bodies are sent as `{"data": record}` and every response is
/// unwrapped from the same envelope.
pub struct ResourceClient<T: Resource> {
    api: ApiClient,
    _phantom: PhantomData<T>,
}

impl<T: Resource> Clone for ResourceClient<T> {
    fn clone(&self) -> Self {
        Self::new(self.api.clone())
    }
}

impl<T: Resource> ResourceClient<T> {
    pub fn new(api: ApiClient) -> Self {
        Self {
            api,
            _phantom: PhantomData,
        }
    }

    fn item_path(id: &str) -> String {
        format!("{}/{}", T::PATH, urlencoding::encode(id))
    }

    fn fallback(verb: &str) -> String {
        format!("unknown error when {} {}", verb, T::NAME)
    }

    pub async fn list(&self) -> Result<Vec<T>, ApiError> {
        let req = ApiRequest::get(Service::System, T::PATH).fallback(Self::fallback("listing"));
        let env: Envelope<Vec<T>> = self.api.send_json(&req).await?;
        Ok(env.data)
    }

    pub async fn get(&self, id: &str) -> Result<T, ApiError> {
        let req = ApiRequest::get(Service::System, Self::item_path(id))
            .fallback(Self::fallback("fetching"));
        let env: Envelope<T> = self.api.send_json(&req).await?;
        Ok(env.data)
    }

    /// Create a record; returns it as stored by the server.
    pub async fn create(&self, item: &T) -> Result<T, ApiError> {
        let req = ApiRequest::post(Service::System, T::PATH)
            .body(json!({ "data": item }))
            .fallback(Self::fallback("creating"));
        let env: Envelope<T> = self.api.send_json(&req).await?;
        Ok(env.data)
    }

    pub async fn update(&self, id: &str, item: &T) -> Result<T, ApiError> {
        let req = ApiRequest::put(Service::System, Self::item_path(id))
            .body(json!({ "data": item }))
            .fallback(Self::fallback("updating"));
        let env: Envelope<T> = self.api.send_json(&req).await?;
        Ok(env.data)
    }

    pub async fn delete(&self, id: &str) -> Result<(), ApiError> {
        let req = ApiRequest::delete(Service::System, Self::item_path(id))
            .fallback(Self::fallback("deleting"));
        self.api.send_empty(&req).await
    }
}

/// Inventory operations that go beyond plain CRUD.
#[derive(Clone)]
pub struct InventoryApi {
    api: ApiClient,
}

impl InventoryApi {
    pub fn new(api: ApiClient) -> Self {
        Self { api }
    }

    pub fn labs(&self) -> ResourceClient<Lab> {
        ResourceClient::new(self.api.clone())
    }

    pub fn computers(&self) -> ResourceClient<Computer> {
        ResourceClient::new(self.api.clone())
    }

    pub fn accessories(&self) -> ResourceClient<Accessory> {
        ResourceClient::new(self.api.clone())
    }

    pub fn reports(&self) -> ResourceClient<Report> {
        ResourceClient::new(self.api.clone())
    }

    pub fn users(&self) -> ResourceClient<User> {
        ResourceClient::new(self.api.clone())
    }

    /// Computers assigned to the lab named `lab`.
    pub async fn computers_in_lab(&self, lab: &str) -> Result<Vec<Computer>, ApiError> {
        let all = self.computers().list().await?;
        Ok(all.into_iter().filter(|c| c.lab_name == lab).collect())
    }

    /// Part statuses of every computer.
    pub async fn part_statuses(&self) -> Result<Vec<PartStatuses>, ApiError> {
        let req = ApiRequest::get(Service::System, "/computers/statuses")
            .fallback("unknown error when fetching computer statuses");
        let env: Envelope<Vec<PartStatuses>> = self.api.send_json(&req).await?;
        Ok(env.data)
    }

    /// Record the condition of one part.
    pub async fn set_part_status(
        &self,
        computer_id: i64,
        part: Part,
        status: PartStatus,
    ) -> Result<(), ApiError> {
        let update = PartStatusUpdate { part, status };
        let req = ApiRequest::put(Service::System, format!("/computers/{computer_id}/status"))
            .body(json!({ "data": update }))
            .fallback("unknown error when updating computer status");
        self.api.send_empty(&req).await
    }

    /// Reports filed by admins or by students.
    pub async fn reports_by(&self, kind: ReportKind) -> Result<Vec<Report>, ApiError> {
        let req = ApiRequest::get(Service::System, Report::PATH)
            .query("kind", kind.as_str())
            .fallback("unknown error when fetching reports");
        let env: Envelope<Vec<Report>> = self.api.send_json(&req).await?;
        Ok(env.data)
    }

    pub async fn delete_user_by_email(&self, email: &str) -> Result<(), ApiError> {
        self.users().delete(email).await
    }
}
