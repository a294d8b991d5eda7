use std::future::Future;
use std::panic::{resume_unwind, AssertUnwindSafe};

use futures::FutureExt;
use log::{debug, info, warn};
use reqwest::StatusCode;

use crate::roles::client::RoleClient;
use crate::roles::naming::RoleName;
use crate::session::session::Session;

/// Creates the role, runs `body` with it and deletes it again however `body` ends: with a
/// value, with an error or with a panic.
///
/// Creation must answer 200, otherwise nothing was acquired and `body` never runs. A body
/// that already deleted the role is fine: cleanup skips a role that reads back as absent
/// and takes a 404 on its own delete as released. When both `body` and cleanup fail, the
/// body's failure is reported and cleanup is logged.
pub async fn with_role<F, Fut, T>(session: &Session, name: RoleName, body: F) -> anyhow::Result<T>
where
    F: FnOnce(Session, RoleName) -> Fut,
    Fut: Future<Output = anyhow::Result<T>>,
{
    RoleClient::new(session).create(&name).await?.expect_ok()?;
    info!("Created role {}", name);

    let outcome = AssertUnwindSafe(body(session.clone(), name.clone()))
        .catch_unwind()
        .await;

    let cleanup = release(session, &name).await;

    match outcome {
        Err(panic) => {
            if let Err(err) = cleanup {
                warn!("Role {} may be orphaned after a panic: {:#}", name, err);
            }
            resume_unwind(panic)
        }
        Ok(Err(err)) => {
            if let Err(cleanup_err) = cleanup {
                warn!("Role {} may be orphaned: {:#}", name, cleanup_err);
            }
            Err(err)
        }
        Ok(Ok(value)) => {
            cleanup?;
            Ok(value)
        }
    }
}

async fn release(session: &Session, name: &RoleName) -> anyhow::Result<()> {
    let roles = RoleClient::new(session);

    let current = roles.get(name).await?;
    if current.is_absent() {
        debug!("Role {} already gone ({})", name, current.status);
        return Ok(());
    }

    let deleted = roles.delete(name).await?;
    if deleted.status == StatusCode::NOT_FOUND {
        debug!("Role {} was deleted before cleanup", name);
        return Ok(());
    }

    deleted.expect_ok()?;
    info!("Deleted role {}", name);
    Ok(())
}
