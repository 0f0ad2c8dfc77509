use std::sync::Arc;

use axum::{
    Json, Router,
    body::Bytes,
    extract::State,
    http::Method,
    routing::get,
};
use chrono::Utc;
use crates::domain::{
    entities::user_data::UserDataEntity,
    repositories::{identity::IdentityRepository, user_data::UserDataRepository},
    value_objects::user_actions::{UserAction, UserActionReceipt, UserActionRequest},
};
use tracing::{info, warn};

use super::browser_cors;
use crate::{
    axum_http::{auth::BearerToken, default_routers, error_responses::AppError},
    usecases::user_data::{UserDataError, UserDataUseCase},
};

pub fn routes<U, I>(usecase: Arc<UserDataUseCase<U, I>>) -> Router
where
    U: UserDataRepository + Send + Sync + 'static,
    I: IdentityRepository + Send + Sync + 'static,
{
    Router::new()
        .route(
            "/",
            get(load_user_data::<U, I>)
                .post(apply_action::<U, I>)
                .fallback(default_routers::method_not_allowed),
        )
        .layer(browser_cors([Method::GET, Method::POST, Method::OPTIONS]))
        .with_state(usecase)
}

pub async fn load_user_data<U, I>(
    State(usecase): State<Arc<UserDataUseCase<U, I>>>,
    BearerToken(token): BearerToken,
) -> Result<Json<UserDataEntity>, AppError>
where
    U: UserDataRepository + Send + Sync + 'static,
    I: IdentityRepository + Send + Sync + 'static,
{
    let user = usecase.authenticate(&token).await?;
    let record = usecase
        .load_user_data(&user.id, Utc::now().date_naive())
        .await?;

    Ok(Json(record))
}

pub async fn apply_action<U, I>(
    State(usecase): State<Arc<UserDataUseCase<U, I>>>,
    BearerToken(token): BearerToken,
    body: Bytes,
) -> Result<Json<UserActionReceipt>, AppError>
where
    U: UserDataRepository + Send + Sync + 'static,
    I: IdentityRepository + Send + Sync + 'static,
{
    let user = usecase.authenticate(&token).await?;

    let request: UserActionRequest = serde_json::from_slice(&body).map_err(|err| {
        warn!(user_id = %user.id, error = %err, "user_data router: invalid request body");
        AppError::BadRequest("Invalid request body".to_string())
    })?;
    let action = UserAction::try_from(request).map_err(UserDataError::from)?;
    info!(user_id = %user.id, action = action.name(), "user_data router: action received");

    usecase
        .apply_action(&user.id, action, Utc::now().date_naive())
        .await?;

    Ok(Json(UserActionReceipt { success: true }))
}
