use axum::{extract::FromRequestParts, http::request::Parts};

use crate::{
    error::AppError,
    state::identity::{GuestSlot, Identity, UserId},
};

const USER_ID_HEADER: &str = "x-user-id";
const USER_NAME_HEADER: &str = "x-user-name";

/// Identity forwarded by the authenticating proxy in front of the service.
///
/// Requests without `x-user-id` are anonymous.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Caller {
    /// Authenticated user, if any.
    pub user: Option<UserId>,
    /// Display name supplied with the identity.
    pub name: Option<String>,
}

impl Caller {
    /// The authenticated user, or `403` for anonymous callers.
    pub fn require_user(&self) -> Result<UserId, AppError> {
        self.user
            .ok_or_else(|| AppError::Forbidden("authentication required".into()))
    }

    /// The authenticated user when present, otherwise the guest slot from the body.
    pub fn identity(&self, guest_id: Option<u32>) -> Result<Identity, AppError> {
        match (self.user, guest_id) {
            (Some(user), _) => Ok(Identity::User(user)),
            (None, Some(slot)) => Ok(Identity::Guest(GuestSlot::new(slot))),
            (None, None) => Err(AppError::BadRequest(
                "guestId is required for anonymous callers".into(),
            )),
        }
    }
}

impl<S> FromRequestParts<S> for Caller
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let header = |name: &str| {
            parts
                .headers
                .get(name)
                .and_then(|value| value.to_str().ok())
                .map(str::trim)
                .filter(|value| !value.is_empty())
        };

        let user = header(USER_ID_HEADER)
            .map(|raw| {
                raw.parse::<i64>()
                    .map(UserId)
                    .map_err(|_| AppError::BadRequest(format!("invalid {USER_ID_HEADER} header")))
            })
            .transpose()?;
        let name = header(USER_NAME_HEADER).map(str::to_owned);
        Ok(Self { user, name })
    }
}

#[cfg(test)]
mod tests {
    use axum::http::Request;

    use super::*;

    async fn extract(request: Request<()>) -> Result<Caller, AppError> {
        let (mut parts, _) = request.into_parts();
        Caller::from_request_parts(&mut parts, &()).await
    }

    #[tokio::test]
    async fn headers_become_an_authenticated_caller() {
        let request = Request::builder()
            .header("x-user-id", "42")
            .header("x-user-name", "Ann")
            .body(())
            .unwrap();
        let caller = extract(request).await.unwrap();
        assert_eq!(caller.user, Some(UserId(42)));
        assert_eq!(caller.name.as_deref(), Some("Ann"));
        assert_eq!(caller.identity(Some(3)).unwrap(), Identity::User(UserId(42)));
    }

    #[tokio::test]
    async fn anonymous_callers_need_a_guest_slot() {
        let caller = extract(Request::new(())).await.unwrap();
        assert!(caller.require_user().is_err());
        assert_eq!(
            caller.identity(Some(0)).unwrap(),
            Identity::Guest(GuestSlot::CREATOR)
        );
        assert!(caller.identity(None).is_err());
    }

    #[tokio::test]
    async fn malformed_user_id_is_rejected() {
        let request = Request::builder()
            .header("x-user-id", "abc")
            .body(())
            .unwrap();
        assert!(matches!(extract(request).await, Err(AppError::BadRequest(_))));
    }
}
