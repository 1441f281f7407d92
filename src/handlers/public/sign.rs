// handlers/public/sign.rs - POST /sign/{up,in,refresh}
//
// Credential bodies carry either a password or an OAuth identity. When both
// are present the password wins.

use axum::extract::State;
use serde::Deserialize;

use crate::error::Error;
use crate::middleware::{ApiResponse, ApiResult, JsonBody};
use crate::models::OAuthIdentity;
use crate::services::{Credential, SignReply, SignUp};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct OAuthBody {
    #[serde(default)]
    pub provider: String,
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub email: String,
}

#[derive(Debug, Deserialize)]
pub struct SignUpBody {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
    pub password: Option<String>,
    pub oauth: Option<OAuthBody>,
    pub photo: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SignInBody {
    #[serde(default)]
    pub email: String,
    pub password: Option<String>,
    pub oauth: Option<OAuthBody>,
}

#[derive(Debug, Deserialize)]
pub struct RefreshBody {
    #[serde(default)]
    pub refresh_token: String,
}

fn credential(password: Option<String>, oauth: Option<OAuthBody>) -> Result<Credential, Error> {
    match (password, oauth) {
        (Some(password), _) => Ok(Credential::Password(password)),
        (None, Some(oauth)) => Ok(Credential::OAuth {
            provider: oauth.provider,
            identity: OAuthIdentity {
                id: oauth.id,
                email: oauth.email,
            },
        }),
        (None, None) => Err(Error::invalid_param("password or oauth identity required")),
    }
}

/// POST /sign/up - create an account and return its first tokens
pub async fn sign_up(
    State(state): State<AppState>,
    JsonBody(body): JsonBody<SignUpBody>,
) -> ApiResult<SignReply> {
    let request = SignUp {
        name: body.name,
        email: body.email,
        photo_url: body.photo,
        credential: credential(body.password, body.oauth)?,
    };

    let reply = state.identity.sign_up(request).await?;
    Ok(ApiResponse::created(reply))
}

/// POST /sign/in - exchange a credential for tokens
pub async fn sign_in(
    State(state): State<AppState>,
    JsonBody(body): JsonBody<SignInBody>,
) -> ApiResult<SignReply> {
    let credential = credential(body.password, body.oauth)?;
    let reply = state.identity.sign_in(&body.email, credential).await?;
    Ok(ApiResponse::success(reply))
}

/// POST /sign/refresh - exchange a refresh token for a new token pair
pub async fn sign_refresh(
    State(state): State<AppState>,
    JsonBody(body): JsonBody<RefreshBody>,
) -> ApiResult<SignReply> {
    let reply = state.identity.refresh(&body.refresh_token).await?;
    Ok(ApiResponse::success(reply))
}
