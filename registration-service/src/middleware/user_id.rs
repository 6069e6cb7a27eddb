use axum::async_trait;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use service_core::error::AppError;

pub const USER_ID_HEADER: &str = "X-User-ID";

/// Longest requester id the `users` relation can hold.
const MAX_USER_ID_LEN: usize = 64;

/// Requester id taken from the `X-User-ID` header set by the authenticating
/// frontend. The id is also recorded on the request span.
#[derive(Debug, Clone)]
pub struct UserId(pub String);

#[async_trait]
impl<S> FromRequestParts<S> for UserId
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let missing = || AppError::Unauthorized(anyhow::anyhow!("Missing X-User-ID header"));

        let user_id = parts
            .headers
            .get(USER_ID_HEADER)
            .ok_or_else(missing)?
            .to_str()
            .map_err(|_| {
                AppError::BadRequest(anyhow::anyhow!(
                    "X-User-ID must contain visible ASCII characters only"
                ))
            })?
            .trim();

        if user_id.is_empty() {
            return Err(missing());
        }

        if user_id.len() > MAX_USER_ID_LEN {
            return Err(AppError::BadRequest(anyhow::anyhow!(
                "X-User-ID must be at most {} characters",
                MAX_USER_ID_LEN
            )));
        }

        tracing::Span::current().record("user_id", user_id);

        Ok(UserId(user_id.to_string()))
    }
}
