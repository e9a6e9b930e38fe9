//! User endpoints. All of them sit behind the mandatory gate.

use axum::{
    Extension,
    extract::{
        Path, State,
        rejection::{JsonRejection, PathRejection},
    },
    response::Json,
};

use crate::api::{AppState, error::ApiError};
use crate::auth::context::UserContext;
use crate::auth::user::User;
use crate::client::{BookmarkRequest, CreatePaperRequest, TokenResponse};

type ApiResult<T> = Result<Json<T>, ApiError>;

pub async fn me(
    State(state): State<AppState>,
    Extension(ctx): Extension<UserContext>,
) -> ApiResult<User> {
    let caller = ctx.user_id()?;
    Ok(Json(state.service.me(caller).await?))
}

pub async fn user(
    State(state): State<AppState>,
    Extension(ctx): Extension<UserContext>,
    id: Result<Path<i64>, PathRejection>,
) -> ApiResult<User> {
    let caller = ctx.user_id()?;
    let Path(id) = id?;
    Ok(Json(state.service.user(caller, id).await?))
}

pub async fn token(
    State(state): State<AppState>,
    Extension(ctx): Extension<UserContext>,
    id: Result<Path<i64>, PathRejection>,
) -> ApiResult<TokenResponse> {
    let caller = ctx.user_id()?;
    let Path(id) = id?;
    let access_token = state.service.token(caller, id).await?;
    Ok(Json(TokenResponse { access_token }))
}

pub async fn create_paper(
    State(state): State<AppState>,
    Extension(ctx): Extension<UserContext>,
    id: Result<Path<i64>, PathRejection>,
    body: Result<Json<CreatePaperRequest>, JsonRejection>,
) -> ApiResult<User> {
    let caller = ctx.user_id()?;
    let Path(id) = id?;
    let Json(body) = body?;
    Ok(Json(state.service.create_paper(caller, id, body.paper_id).await?))
}

pub async fn bookmark(
    State(state): State<AppState>,
    Extension(ctx): Extension<UserContext>,
    body: Result<Json<BookmarkRequest>, JsonRejection>,
) -> ApiResult<User> {
    let caller = ctx.user_id()?;
    let Json(body) = body?;
    Ok(Json(
        state
            .service
            .bookmark(caller, body.paper_id, body.bookmark)
            .await?,
    ))
}
