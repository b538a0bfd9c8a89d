use axum::extract::{Request, State};
use axum::middleware::Next;
use axum::response::Response;

use crate::error::ApiError;
use crate::handlers::AppState;
use crate::store::EntryStore;

/// Resolve the acting user from the `x-actor-id` header and inject it into
/// the request. Authentication proper is an upstream concern; this service
/// only needs an already-resolved actor with a role.
pub async fn resolve_actor<S: EntryStore>(
    State(state): State<AppState<S>>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let header = request
        .headers()
        .get("x-actor-id")
        .and_then(|value| value.to_str().ok())
        .ok_or_else(|| ApiError::unauthorized("Missing x-actor-id header"))?;

    let actor_id: i64 = header
        .parse()
        .map_err(|_| ApiError::unauthorized("Invalid x-actor-id header"))?;

    let actor = state
        .store
        .find_user(actor_id)
        .await?
        .ok_or_else(|| ApiError::unauthorized("Unknown actor"))?;

    request.extensions_mut().insert(actor);
    Ok(next.run(request).await)
}
