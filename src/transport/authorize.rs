//! Authorization seam
//!
//! Every transport operation asks an `Authorizer` before touching a recipe.
//! The policy itself lives outside this crate.

use crate::transport::Band;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Kind of access being requested
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Access {
    Read,
    Write,
}

/// One authorization question
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthorizeRequest {
    pub id: String,
    pub authorize: Access,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub band: Option<Band>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,
}

impl AuthorizeRequest {
    pub fn read(id: impl Into<String>, band: Option<Band>, user: Option<String>) -> Self {
        Self {
            id: id.into(),
            authorize: Access::Read,
            band,
            user,
        }
    }

    pub fn write(id: impl Into<String>, band: Band, user: Option<String>) -> Self {
        Self {
            id: id.into(),
            authorize: Access::Write,
            band: Some(band),
            user,
        }
    }
}

/// Decides whether a request may proceed
#[async_trait]
pub trait Authorizer: Send + Sync {
    async fn authorize(&self, request: &AuthorizeRequest) -> bool;
}

/// Grants everything
#[derive(Debug, Clone, Copy, Default)]
pub struct AllowAll;

#[async_trait]
impl Authorizer for AllowAll {
    async fn authorize(&self, _request: &AuthorizeRequest) -> bool {
        true
    }
}

/// Adapts a synchronous predicate into an `Authorizer`
pub struct FnAuthorizer<F> {
    predicate: F,
}

impl<F> FnAuthorizer<F>
where
    F: Fn(&AuthorizeRequest) -> bool + Send + Sync,
{
    pub fn new(predicate: F) -> Self {
        Self { predicate }
    }
}

#[async_trait]
impl<F> Authorizer for FnAuthorizer<F>
where
    F: Fn(&AuthorizeRequest) -> bool + Send + Sync,
{
    async fn authorize(&self, request: &AuthorizeRequest) -> bool {
        (self.predicate)(request)
    }
}
