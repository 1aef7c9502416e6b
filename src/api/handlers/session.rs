use axum::Json;
use axum::extract::State;
use axum_extra::extract::cookie::CookieJar;
use tracing::warn;

use crate::api::cookies::{self, REFRESH_TOKEN, SESSION_ID};
use crate::api::dto::{LoginRequest, LoginResponse, MeResponse, SuccessResponse, UserView};
use crate::api::extractors::AuthCtxExtractor;
use crate::error::AppError;
use crate::services::auth::LoginOutcome;
use crate::state::AppState;

/// `POST /auth/login`
///
/// On success sets the token cookies and replaces the CSRF session. A user
/// with two-factor enabled gets `twoFactorEnabled: true` and no cookies until
/// the code is supplied.
pub async fn login(
    State(state): State<AppState>,
    jar: CookieJar,
    Json(req): Json<LoginRequest>,
) -> Result<(CookieJar, Json<LoginResponse>), AppError> {
    if req.email.trim().is_empty() || req.password.is_empty() {
        return Err(AppError::InvalidRequest(
            "email and password are required".to_string(),
        ));
    }

    match state.sessions.login(&req.into()).await? {
        LoginOutcome::TwoFactorRequired { user } => Ok((
            jar,
            Json(LoginResponse {
                user: UserView::from(&user),
                two_factor_enabled: true,
            }),
        )),
        LoginOutcome::Authenticated { user, tokens } => {
            let previous = cookies::value(&jar, SESSION_ID);
            let session = state
                .csrf
                .rotate(previous.as_deref())
                .await
                .map_err(|e| {
                    tracing::error!(error = %e, "failed to rotate csrf session");
                    AppError::Internal
                })?;

            let jar = state.cookies.with_token_pair(jar, &tokens);
            let jar = state.cookies.with_csrf_session(jar, &session);

            Ok((
                jar,
                Json(LoginResponse {
                    user: UserView::from(&user),
                    two_factor_enabled: false,
                }),
            ))
        }
    }
}

/// `POST /auth/refresh`
///
/// Any failure also tells the browser to drop the auth cookies.
pub async fn refresh(
    State(state): State<AppState>,
    jar: CookieJar,
) -> Result<(CookieJar, Json<SuccessResponse>), (CookieJar, AppError)> {
    let Some(token) = cookies::value(&jar, REFRESH_TOKEN) else {
        return Err((cookies::without_auth(jar), AppError::Unauthenticated));
    };

    match state.sessions.refresh(&token).await {
        Ok(pair) => Ok((
            state.cookies.with_token_pair(jar, &pair),
            Json(SuccessResponse::ok()),
        )),
        Err(e) => Err((cookies::without_auth(jar), e)),
    }
}

/// `POST /auth/logout`. Always succeeds.
pub async fn logout(
    State(state): State<AppState>,
    jar: CookieJar,
) -> (CookieJar, Json<SuccessResponse>) {
    let refresh = cookies::value(&jar, REFRESH_TOKEN);
    state.sessions.logout(refresh.as_deref()).await;

    if let Some(sid) = cookies::value(&jar, SESSION_ID)
        && let Err(e) = state.csrf.revoke(&sid).await
    {
        warn!(error = %e, "failed to revoke csrf session on logout");
    }

    let jar = cookies::without_csrf_session(cookies::without_auth(jar));
    (jar, Json(SuccessResponse::ok()))
}

/// `GET /auth/me`
pub async fn me(
    State(state): State<AppState>,
    AuthCtxExtractor(ctx): AuthCtxExtractor,
) -> Result<Json<MeResponse>, AppError> {
    let user = state.sessions.current_user(ctx.principal).await?;
    Ok(Json(MeResponse {
        user: UserView::from(&user),
    }))
}
