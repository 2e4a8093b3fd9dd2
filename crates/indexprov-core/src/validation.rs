//! Advertisement validation: signature verification and structural checks.

use crate::advertisement::{Advertisement, MAX_CONTEXT_ID_LEN, MAX_METADATA_LEN};
use crate::error::ValidationError;

/// Validate an advertisement's structure and main signature.
///
/// This performs:
/// - Size limits on context id and metadata
/// - Address requirements
/// - Extended provider rules
/// - Signature verification against `provider`
pub fn validate_advertisement(ad: &Advertisement) -> Result<(), ValidationError> {
    validate_advertisement_structure(ad)?;
    ad.verify_signature()
        .map_err(|_| ValidationError::SignatureFailed)?;
    Ok(())
}

/// Validate advertisement structure without signature verification.
pub fn validate_advertisement_structure(ad: &Advertisement) -> Result<(), ValidationError> {
    if ad.context_id.len() > MAX_CONTEXT_ID_LEN {
        return Err(ValidationError::StructuralError(format!(
            "context id exceeds {} bytes",
            MAX_CONTEXT_ID_LEN
        )));
    }
    if ad.metadata.len() > MAX_METADATA_LEN {
        return Err(ValidationError::StructuralError(format!(
            "metadata exceeds {} bytes",
            MAX_METADATA_LEN
        )));
    }

    if !ad.is_rm && ad.addresses.is_empty() {
        return Err(ValidationError::MissingAddresses);
    }
    if ad.is_rm && !ad.entries.is_none() {
        return Err(ValidationError::RemovalWithEntries);
    }

    if let Some(xp) = &ad.extended_provider {
        if xp.override_providers && ad.context_id.is_empty() {
            return Err(ValidationError::OverrideWithoutContext);
        }
        for info in &xp.providers {
            if info.addresses.is_empty() {
                return Err(ValidationError::ExtendedProviderMissingAddresses(
                    info.id.to_string(),
                ));
            }
        }
    }

    Ok(())
}
