use std::{collections::HashMap, sync::Arc};

use async_trait::async_trait;
use axum::{
    extract::{Request, State},
    http::header::AUTHORIZATION,
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::MethodRouter,
};
use serde::Deserialize;
use tracing::{debug, warn};

use crate::{config::AuthConfig, error::ApiError};

/// What the identity provider told us about the caller.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Introspection {
    pub subject: Option<String>,
    pub roles: Vec<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("authorization header is empty")]
    EmptyHeader,

    #[error("invalid authorization header, must be prefixed with Bearer")]
    MissingBearer,

    #[error("token is not active")]
    Inactive,

    #[error("missing required role {0}")]
    MissingRole(String),

    #[error("token introspection failed: {0}")]
    Introspection(#[from] reqwest::Error),
}

/// Decides whether the bearer of an `Authorization` header holds a role.
#[async_trait]
pub trait Authorizer: Send + Sync {
    async fn check_authorization(
        &self,
        header: &str,
        role: &str,
    ) -> Result<Introspection, AuthError>;
}

/// Guards `route` so it only runs for callers holding `role`. Rejected
/// requests get a 401 and never reach the handler.
pub fn requires_role<S>(
    route: MethodRouter<S>,
    authorizer: &Arc<dyn Authorizer>,
    role: &'static str,
) -> MethodRouter<S>
where
    S: Clone + Send + Sync + 'static,
{
    let check = RoleCheck {
        authorizer: authorizer.clone(),
        role,
    };

    route.route_layer(middleware::from_fn_with_state(check, check_role))
}

#[derive(Clone)]
struct RoleCheck {
    authorizer: Arc<dyn Authorizer>,
    role: &'static str,
}

async fn check_role(State(check): State<RoleCheck>, mut request: Request, next: Next) -> Response {
    let header = request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default()
        .to_owned();

    match check
        .authorizer
        .check_authorization(&header, check.role)
        .await
    {
        Ok(introspection) => {
            debug!(
                role = check.role,
                subject = ?introspection.subject,
                roles = ?introspection.roles,
                "authorized request"
            );
            request.extensions_mut().insert(introspection);
            next.run(request).await
        }
        Err(err) => {
            warn!(role = check.role, error = %err, "rejected request");
            ApiError::Unauthorized(err).into_response()
        }
    }
}

#[derive(Debug, Deserialize)]
struct IntrospectionResponse {
    active: bool,

    #[serde(default)]
    sub: Option<String>,

    #[serde(rename = "urn:zitadel:iam:org:project:roles", default)]
    roles: HashMap<String, serde_json::Value>,
}

/// Checks bearer tokens with OAuth2 token introspection (RFC 7662). Roles
/// are read from the `urn:zitadel:iam:org:project:roles` claim.
#[derive(Clone)]
pub struct IntrospectionAuthorizer {
    client: reqwest::Client,
    endpoint: String,
    client_id: String,
    client_secret: String,
}

impl IntrospectionAuthorizer {
    pub fn new(
        endpoint: impl Into<String>,
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
    ) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: endpoint.into(),
            client_id: client_id.into(),
            client_secret: client_secret.into(),
        }
    }

    pub fn from_config(config: &AuthConfig) -> Self {
        Self::new(
            config.introspection_url(),
            &config.auth_client_id,
            &config.auth_client_secret,
        )
    }
}

#[async_trait]
impl Authorizer for IntrospectionAuthorizer {
    async fn check_authorization(
        &self,
        header: &str,
        role: &str,
    ) -> Result<Introspection, AuthError> {
        if header.is_empty() {
            return Err(AuthError::EmptyHeader);
        }

        let token = header
            .strip_prefix("Bearer ")
            .ok_or(AuthError::MissingBearer)?;

        let response: IntrospectionResponse = self
            .client
            .post(&self.endpoint)
            .basic_auth(&self.client_id, Some(&self.client_secret))
            .form(&[("token", token)])
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        if !response.active {
            return Err(AuthError::Inactive);
        }

        if !response.roles.contains_key(role) {
            return Err(AuthError::MissingRole(role.to_owned()));
        }

        let mut roles: Vec<_> = response.roles.into_keys().collect();
        roles.sort_unstable();

        Ok(Introspection {
            subject: response.sub,
            roles,
        })
    }
}
