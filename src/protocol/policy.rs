//! Timeout normalization and outcome-to-status mapping
//!
//! Pure functions shared by the registration handlers.

use super::message::{DuaStatus, MlrStatus};
use crate::bbr::tables::{ListenerError, NdProxyError};

/// Timeout value reserved for persistent registrations
pub const PERSISTENT_TIMEOUT: u32 = u32::MAX;

/// Result of normalizing a requested MLR timeout
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NormalizedTimeout {
    /// Timeout as requested on the wire
    pub requested: u32,
    /// Timeout to apply, in seconds
    pub effective: u32,
}

impl NormalizedTimeout {
    /// Returns whether clamping changed the requested value
    pub fn was_clamped(&self) -> bool {
        self.requested != self.effective
    }
}

/// Normalizes a Timeout TLV value into `[min, max]`
///
/// Zero passes through untouched since it requests deregistration.
/// `u32::MAX` asks for a persistent registration, which is refused.
pub fn normalize_mlr_timeout(requested: u32, min: u32, max: u32) -> Result<NormalizedTimeout, MlrStatus> {
    if requested == PERSISTENT_TIMEOUT {
        return Err(MlrStatus::NoPersistent);
    }

    let effective = if requested == 0 {
        0
    } else {
        requested.clamp(min, max)
    };

    Ok(NormalizedTimeout { requested, effective })
}

/// Maps a failed listener admission to its MLR status
pub fn mlr_status_for(error: &ListenerError) -> MlrStatus {
    match error {
        ListenerError::InvalidAddress(_) => MlrStatus::Invalid,
        ListenerError::NoBufs => MlrStatus::NoResources,
    }
}

/// Maps an ND proxy registration result to its DUA status
pub fn dua_status_for(result: &Result<(), NdProxyError>) -> DuaStatus {
    match result {
        Ok(()) => DuaStatus::Success,
        Err(NdProxyError::Duplicated { .. }) => DuaStatus::Duplicate,
        Err(NdProxyError::NoBufs) => DuaStatus::NoResources,
        Err(NdProxyError::Other(_)) => DuaStatus::GeneralFailure,
    }
}
