use serde::Serialize;

use crate::api::response::ApiResponse;
use crate::roles::naming::RoleName;
use crate::session::session::Session;

pub const ROLES: &str = "roles";
pub const PERMISSIONS: &str = "permissions";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RolePayload<'a> {
    pub name: &'a RoleName,
}

/// Calls against `api/{org}/roles`. Every call returns the raw response; asserting on the
/// status is up to the caller.
#[derive(Debug, Clone, Copy)]
pub struct RoleClient<'a> {
    session: &'a Session,
}

impl<'a> RoleClient<'a> {
    pub fn new(session: &'a Session) -> RoleClient<'a> {
        RoleClient { session }
    }

    pub async fn list(&self) -> anyhow::Result<ApiResponse> {
        self.session.get(&[ROLES]).await
    }

    pub async fn create(&self, name: &RoleName) -> anyhow::Result<ApiResponse> {
        self.create_with(&RolePayload { name }).await
    }

    pub async fn create_with<T>(&self, payload: &T) -> anyhow::Result<ApiResponse>
    where
        T: Serialize + ?Sized,
    {
        self.session.post_json(&[ROLES], payload).await
    }

    pub async fn get(&self, name: &RoleName) -> anyhow::Result<ApiResponse> {
        self.session.get(&[ROLES, name.as_str()]).await
    }

    pub async fn permissions(&self, name: &RoleName, category: &str) -> anyhow::Result<ApiResponse> {
        self.session
            .get(&[ROLES, name.as_str(), PERMISSIONS, category])
            .await
    }

    pub async fn update(&self, name: &RoleName) -> anyhow::Result<ApiResponse> {
        self.session
            .put_json(&[ROLES, name.as_str()], &[], &RolePayload { name })
            .await
    }

    pub async fn rotate_token(&self, name: &RoleName) -> anyhow::Result<ApiResponse> {
        self.session
            .put_json(
                &[ROLES, name.as_str()],
                &[("rotateToken", "true")],
                &RolePayload { name },
            )
            .await
    }

    pub async fn delete(&self, name: &RoleName) -> anyhow::Result<ApiResponse> {
        self.session.delete(&[ROLES, name.as_str()]).await
    }
}
