use std::sync::Arc;

use crate::error::{Error, Result};
use crate::store::PrivilegeStore;
use crate::types::{ObjectRef, Privilege};

/// Single choke point for authorization. Every entry point calls `require`
/// before touching the catalog, the engine or the file store.
#[derive(Clone)]
pub struct AccessGate {
    privileges: Arc<dyn PrivilegeStore>,
}

impl AccessGate {
    pub fn new(privileges: Arc<dyn PrivilegeStore>) -> Self {
        Self { privileges }
    }

    /// Returns true if `principal` holds `required` on `object`. A failed
    /// lookup counts as not holding it.
    pub fn check(&self, principal: &str, object: &ObjectRef, required: Privilege) -> bool {
        match self.privileges.has_privilege(principal, object, required) {
            Ok(granted) => granted,
            Err(e) => {
                tracing::warn!(%principal, %object, error = %e, "privilege lookup failed");
                false
            }
        }
    }

    /// Check if `principal` holds `required`, returning access denied if not.
    pub fn require(&self, principal: &str, object: &ObjectRef, required: Privilege) -> Result<()> {
        if !self.check(principal, object, required) {
            tracing::debug!(%principal, %object, privilege = %required, "access denied");
            return Err(Error::AccessDenied);
        }
        Ok(())
    }
}
