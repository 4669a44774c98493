//! Agent Capabilities
//!
//! The agent's abilities are a fixed set: one required query capability
//! (the data source) plus optionally registered auxiliary capabilities.
//! Registration is checked up front: duplicate or reserved names are
//! rejected, so there is no runtime probing of what a capability can do.
//!
//! Lifecycle is explicit: [`AuxCapability::close`] is a defaulted no-op
//! that capabilities holding connections or files override.

use crate::error::{Result, TabletalkError};

/// Name of the fixed query slot; reserved at registration
pub const QUERY_CAPABILITY: &str = "query";

/// An auxiliary capability registered with the agent
///
/// Auxiliary capabilities are opaque to the pipeline; they exist so a
/// deployment can hang extra abilities off the agent and enumerate them in
/// the context summary.
pub trait AuxCapability: Send {
    /// Unique capability name
    fn name(&self) -> &str;

    /// Release held resources; default is a no-op
    fn close(&mut self) {}
}

/// Fixed capability set: the query slot plus registered auxiliaries
pub struct CapabilitySet<Q> {
    query: Q,
    aux: Vec<Box<dyn AuxCapability>>,
}

impl<Q> CapabilitySet<Q> {
    /// Create a set with the required query capability
    pub fn new(query: Q) -> Self {
        Self { query, aux: Vec::new() }
    }

    /// The query capability
    pub fn query(&self) -> &Q {
        &self.query
    }

    /// Register an auxiliary capability
    ///
    /// Fails if the name is reserved or already registered. The check
    /// happens here, at registration time, not when the capability is used.
    pub fn register(&mut self, capability: Box<dyn AuxCapability>) -> Result<()> {
        let name = capability.name();

        if name == QUERY_CAPABILITY {
            return Err(TabletalkError::capability_conflict(format!(
                "name '{QUERY_CAPABILITY}' is reserved for the query capability"
            )));
        }
        if self.aux.iter().any(|existing| existing.name() == name) {
            return Err(TabletalkError::capability_conflict(format!(
                "capability '{name}' is already registered"
            )));
        }

        self.aux.push(capability);
        Ok(())
    }

    /// Registered capability names, the fixed query slot first
    #[must_use]
    pub fn names(&self) -> Vec<String> {
        std::iter::once(QUERY_CAPABILITY.to_string())
            .chain(self.aux.iter().map(|c| c.name().to_string()))
            .collect()
    }

    /// Close every auxiliary capability
    pub fn close_all(&mut self) {
        for capability in &mut self.aux {
            capability.close();
        }
    }
}
