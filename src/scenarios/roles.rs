use anyhow::ensure;
use log::info;
use reqwest::StatusCode;
use serde::Serialize;
use serde_json::Value;

use crate::api::response::ApiResponse;
use crate::roles::{with_role, RoleClient, RoleName};
use crate::session::session::Session;

/// Email-shaped identifiers the roles endpoint must reject.
pub const INVALID_EMAILS: [&str; 4] = ["invalid_email", "", "email@", "@domain.com"];

/// Categories whose permissions are read during the lifecycle probes.
pub const STREAM_PERMISSIONS: &str = "stream";
pub const LOGS_PERMISSIONS: &str = "logs";

/// User-shaped body posted to the roles endpoint; it carries no role name.
#[derive(Debug, Clone, Serialize)]
pub struct UserShapedPayload<'a> {
    pub email: &'a str,
    pub organization: &'a str,
    pub first_name: &'a str,
    pub last_name: &'a str,
}

pub async fn list_roles(session: &Session) -> anyhow::Result<ApiResponse> {
    let response = RoleClient::new(session).list().await?.expect_ok()?;
    info!("Listed roles in org {}", session.org());
    Ok(response)
}

/// create → delete
pub async fn create_delete(session: &Session, name: RoleName) -> anyhow::Result<()> {
    with_role(session, name, |session, name| async move {
        RoleClient::new(&session).delete(&name).await?.expect_ok()?;
        anyhow::Ok(())
    })
    .await
}

/// create → permissions(category) → delete
pub async fn create_permissions_delete(
    session: &Session,
    name: RoleName,
    category: &str,
) -> anyhow::Result<()> {
    let category = category.to_string();
    with_role(session, name, |session, name| async move {
        let roles = RoleClient::new(&session);
        roles.permissions(&name, &category).await?.expect_ok()?;
        roles.delete(&name).await?.expect_ok()?;
        anyhow::Ok(())
    })
    .await
}

/// create → permissions(category) → update → delete
pub async fn create_permissions_update_delete(
    session: &Session,
    name: RoleName,
    category: &str,
) -> anyhow::Result<()> {
    let category = category.to_string();
    with_role(session, name, |session, name| async move {
        let roles = RoleClient::new(&session);
        roles.permissions(&name, &category).await?.expect_ok()?;
        roles.update(&name).await?.expect_ok()?;
        roles.delete(&name).await?.expect_ok()?;
        anyhow::Ok(())
    })
    .await
}

/// create → get → rotate token → delete
pub async fn create_get_rotate_delete(session: &Session, name: RoleName) -> anyhow::Result<()> {
    with_role(session, name, |session, name| async move {
        let roles = RoleClient::new(&session);
        roles.get(&name).await?.expect_ok()?;
        roles.rotate_token(&name).await?.expect_ok()?;
        roles.delete(&name).await?.expect_ok()?;
        anyhow::Ok(())
    })
    .await
}

/// create → get (body names the role) → update → delete → get (404 or empty)
pub async fn full_lifecycle(session: &Session, name: RoleName) -> anyhow::Result<()> {
    with_role(session, name, |session, name| async move {
        let roles = RoleClient::new(&session);

        let role = roles.get(&name).await?.expect_ok()?;
        let body: Value = role.json()?;
        ensure!(
            names_role(&body, name.as_str()),
            "GET role {} did not return \"name\":\"{}\": {}",
            name,
            name,
            role.text()
        );

        roles.update(&name).await?.expect_ok()?;
        roles.delete(&name).await?.expect_ok()?;
        roles.get(&name).await?.expect_absent()?;
        anyhow::Ok(())
    })
    .await
}

/// Posting a user-shaped body with a malformed email must be rejected with 400.
pub async fn reject_invalid_email(session: &Session, email: &str) -> anyhow::Result<ApiResponse> {
    let payload = UserShapedPayload {
        email,
        organization: session.org(),
        first_name: "",
        last_name: "",
    };

    let response = RoleClient::new(session)
        .create_with(&payload)
        .await?
        .expect_status(StatusCode::BAD_REQUEST)?;
    Ok(response)
}

/// True when some object in `body` has `"name": name`.
pub fn names_role(body: &Value, name: &str) -> bool {
    match body {
        Value::Object(fields) => {
            fields.get("name").and_then(Value::as_str) == Some(name)
                || fields.values().any(|value| names_role(value, name))
        }
        Value::Array(items) => items.iter().any(|value| names_role(value, name)),
        _ => false,
    }
}
