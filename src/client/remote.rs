use crate::error::FlagsError;
use gmsflags_schema::{
    AndroidPackageResponse, ApiErrorBody, ClearCacheReport, DeleteReport, FlagType, FlagValue,
    FlagsResponse, HealthResponse, OverrideReport, OverrideRequest, UsersResponse,
};
use reqwest::RequestBuilder;
use serde::de::DeserializeOwned;
use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::sync::Arc;
use url::Url;

/// Remote reference to the privileged service's database.
///
/// Cheap to clone. Holds no file access of its own; every call is one request
/// to the service. Once the service is gone every call fails with
/// [`FlagsError::ConnectionLost`].
#[derive(Debug, Clone)]
pub struct RootDatabase {
    client: reqwest::Client,
    base: Url,
    token: Arc<str>,
}

impl RootDatabase {
    pub fn new(addr: SocketAddr, token: Arc<str>) -> Result<Self, FlagsError> {
        let base = Url::parse(&format!("http://{addr}/"))?;
        // Loopback only; an ambient HTTP_PROXY must never see the token.
        let client = reqwest::Client::builder().no_proxy().build()?;
        Ok(Self {
            client,
            base,
            token,
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base
    }

    fn endpoint(&self, segments: &[&str]) -> Result<Url, FlagsError> {
        let mut url = self.base.clone();
        url.path_segments_mut()
            .map_err(|()| FlagsError::InvalidValue(format!("{} cannot be a base", self.base)))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    async fn send<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T, FlagsError> {
        let resp = request
            .bearer_auth(self.token.as_ref())
            .send()
            .await
            .map_err(FlagsError::from_transport)?;

        let status = resp.status();
        if status.is_success() {
            resp.json::<T>().await.map_err(FlagsError::from_transport)
        } else {
            let body = resp.json::<ApiErrorBody>().await.ok();
            Err(FlagsError::from_api(status, body))
        }
    }

    pub async fn health(&self) -> Result<HealthResponse, FlagsError> {
        let url = self.endpoint(&["health"])?;
        self.send(self.client.get(url)).await
    }

    pub async fn list_users(&self) -> Result<Vec<String>, FlagsError> {
        let url = self.endpoint(&["users"])?;
        let resp: UsersResponse = self.send(self.client.get(url)).await?;
        Ok(resp.users)
    }

    /// Effective values: override if present, else the newest default.
    pub async fn query_flags(
        &self,
        package: &str,
        flag_type: FlagType,
        user: &str,
    ) -> Result<BTreeMap<String, FlagValue>, FlagsError> {
        let url = self.endpoint(&["packages", package, "flags"])?;
        let request = self
            .client
            .get(url)
            .query(&[("type", flag_type.as_str()), ("user", user)]);
        let resp: FlagsResponse = self.send(request).await?;
        Ok(resp.flags)
    }

    pub async fn query_overrides(
        &self,
        package: &str,
        flag_type: FlagType,
        user: &str,
    ) -> Result<BTreeMap<String, FlagValue>, FlagsError> {
        let url = self.endpoint(&["packages", package, "overrides"])?;
        let request = self
            .client
            .get(url)
            .query(&[("type", flag_type.as_str()), ("user", user)]);
        let resp: FlagsResponse = self.send(request).await?;
        Ok(resp.flags)
    }

    pub async fn android_package(&self, package: &str) -> Result<String, FlagsError> {
        let url = self.endpoint(&["packages", package, "android-package"])?;
        let resp: AndroidPackageResponse = self.send(self.client.get(url)).await?;
        Ok(resp.android_package)
    }

    pub async fn override_flag(
        &self,
        package: &str,
        request: &OverrideRequest,
    ) -> Result<OverrideReport, FlagsError> {
        let url = self.endpoint(&["packages", package, "overrides"])?;
        self.send(self.client.post(url).json(request)).await
    }

    pub async fn delete_overrides(&self, package: &str) -> Result<DeleteReport, FlagsError> {
        let url = self.endpoint(&["packages", package, "overrides"])?;
        self.send(self.client.delete(url)).await
    }

    pub async fn delete_override(
        &self,
        package: &str,
        name: &str,
    ) -> Result<DeleteReport, FlagsError> {
        let url = self.endpoint(&["packages", package, "overrides", name])?;
        self.send(self.client.delete(url)).await
    }

    pub async fn clear_cache(&self, package: &str) -> Result<ClearCacheReport, FlagsError> {
        let url = self.endpoint(&["packages", package, "cache:clear"])?;
        self.send(self.client.post(url)).await
    }
}
