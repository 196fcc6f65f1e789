//! Request extractors
//!
//! - [`CurrentUser`]: staff, from `Authorization: Bearer <jwt>`
//! - [`CustomerTable`]: customer device, from `?table=&token=`

use axum::extract::{FromRequestParts, Query};
use axum::http::request::Parts;
use shared::dto::TableAccess;
use shared::error::AppError;
use shared::session::TableInfo;

use crate::auth::{CurrentUser, JwtError, JwtService};
use crate::core::ServerState;
use crate::security_log;

/// JWT Auth Extractor
impl FromRequestParts<ServerState> for CurrentUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &ServerState,
    ) -> Result<Self, Self::Rejection> {
        // Check if already extracted
        if let Some(user) = parts.extensions.get::<CurrentUser>() {
            return Ok(user.clone());
        }

        let auth_header = parts
            .headers
            .get(http::header::AUTHORIZATION)
            .and_then(|h| h.to_str().ok());

        let token = match auth_header {
            Some(header) => JwtService::extract_from_header(header)
                .ok_or_else(|| AppError::invalid_token("Invalid authorization header"))?,
            None => {
                security_log!("WARN", "auth_missing", uri = format!("{:?}", parts.uri));
                return Err(AppError::not_authenticated());
            }
        };

        let user = authenticate_staff(&state.jwt_service, token, &parts.uri)?;
        parts.extensions.insert(user.clone());
        Ok(user)
    }
}

/// Validate a staff token (header or `access_token` query on the socket)
pub fn authenticate_staff(
    jwt_service: &JwtService,
    token: &str,
    uri: &http::Uri,
) -> Result<CurrentUser, AppError> {
    match jwt_service.validate_token(token) {
        Ok(claims) => Ok(CurrentUser::from(claims)),
        Err(e) => {
            security_log!(
                "WARN",
                "auth_failed",
                error = format!("{}", e),
                uri = format!("{:?}", uri)
            );
            match e {
                JwtError::ExpiredToken => Err(AppError::token_expired()),
                _ => Err(AppError::invalid_token("Invalid token")),
            }
        }
    }
}

/// Customer device authorized for one table (token checked against the
/// table's current epoch)
#[derive(Debug, Clone)]
pub struct CustomerTable {
    pub table: TableInfo,
    pub token: String,
}

impl CustomerTable {
    pub fn table_id(&self) -> &str {
        &self.table.table_id
    }
}

impl FromRequestParts<ServerState> for CustomerTable {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &ServerState,
    ) -> Result<Self, Self::Rejection> {
        let Query(access) = Query::<TableAccess>::from_request_parts(parts, state)
            .await
            .map_err(|_| AppError::invalid_table_token())?;

        let table = authorize_customer(state, &access)?;
        Ok(Self {
            table,
            token: access.token,
        })
    }
}

/// Shared by the HTTP extractor and the realtime socket
pub fn authorize_customer(state: &ServerState, access: &TableAccess) -> Result<TableInfo, AppError> {
    state
        .manager
        .authorize_table(&access.table, &access.token)
        .map_err(|e| {
            security_log!(
                "WARN",
                "table_token_rejected",
                table_id = access.table.as_str(),
                error = format!("{}", e)
            );
            AppError::from(e)
        })
}
