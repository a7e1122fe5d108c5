//! Maps an authentication credential onto a marketplace [`User`].
//!
//! Rather than a single fallback (look up by id, and if that fails, by email), the resolver runs an explicit, ordered
//! chain of [`ResolutionStrategy`]s. The first strategy that finds a user wins. Backend errors stop the chain; a
//! strategy that simply finds nothing hands over to the next one.
use std::fmt::Debug;

use log::*;
use serde::{Deserialize, Serialize};

use crate::{
    db_types::User,
    mpe_api::errors::MarketplaceError,
    traits::{IdentityStore, StoreError},
};

/// The claims the marketplace cares about, taken from a verified token.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credential {
    /// The token subject. For marketplace-issued tokens this is the numeric user id.
    pub subject: Option<String>,
    pub email: Option<String>,
}

impl Credential {
    pub fn new(subject: Option<String>, email: Option<String>) -> Self {
        Self { subject, email }
    }

    pub fn for_user_id(id: i64) -> Self {
        Self { subject: Some(id.to_string()), email: None }
    }

    pub fn for_email<S: Into<String>>(email: S) -> Self {
        Self { subject: None, email: Some(email.into()) }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolutionStrategy {
    /// The subject is parsed as a user id
    ById,
    /// Case-insensitive match on the email claim
    ByEmail,
}

impl ResolutionStrategy {
    pub fn name(&self) -> &'static str {
        match self {
            ResolutionStrategy::ById => "by_id",
            ResolutionStrategy::ByEmail => "by_email",
        }
    }

    async fn attempt<B: IdentityStore>(&self, db: &B, credential: &Credential) -> Result<Option<User>, StoreError> {
        match self {
            ResolutionStrategy::ById => {
                let id = credential.subject.as_deref().and_then(|s| s.trim().parse::<i64>().ok());
                match id {
                    Some(id) => db.fetch_user_by_id(id).await,
                    None => Ok(None),
                }
            },
            ResolutionStrategy::ByEmail => {
                let email = credential.email.as_deref().map(str::trim).filter(|e| e.contains('@'));
                match email {
                    Some(email) => db.fetch_user_by_email(email).await,
                    None => Ok(None),
                }
            },
        }
    }
}

pub struct IdentityApi<B> {
    db: B,
    chain: Vec<ResolutionStrategy>,
}

impl<B> Debug for IdentityApi<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "IdentityApi({:?})", self.chain)
    }
}

impl<B> IdentityApi<B> {
    /// Resolves by id first, then by email.
    pub fn new(db: B) -> Self {
        Self::with_chain(db, vec![ResolutionStrategy::ById, ResolutionStrategy::ByEmail])
    }

    pub fn with_chain(db: B, chain: Vec<ResolutionStrategy>) -> Self {
        Self { db, chain }
    }

    pub fn chain(&self) -> &[ResolutionStrategy] {
        &self.chain
    }
}

impl<B: IdentityStore> IdentityApi<B> {
    /// Runs the strategy chain. `Ok(None)` means the credential is well-formed but matches nobody.
    pub async fn resolve(&self, credential: &Credential) -> Result<Option<User>, MarketplaceError> {
        for strategy in &self.chain {
            if let Some(user) = strategy.attempt(&self.db, credential).await? {
                trace!("🪪️ Credential resolved to user #{} using {}", user.id, strategy.name());
                return Ok(Some(user));
            }
            trace!("🪪️ Strategy {} found no user", strategy.name());
        }
        debug!("🪪️ No user matches credential (sub: {:?}, email: {:?})", credential.subject, credential.email);
        Ok(None)
    }

    /// Like [`Self::resolve`], but a missing credential or an unknown user is an authentication failure.
    pub async fn require_user(&self, credential: Option<&Credential>) -> Result<User, MarketplaceError> {
        let credential = credential.ok_or(MarketplaceError::Unauthenticated)?;
        self.resolve(credential).await?.ok_or(MarketplaceError::Unauthenticated)
    }
}
