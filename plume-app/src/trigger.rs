//! Shared-secret gate for externally triggered jobs.
//!
//! The periodic trigger is outside our trust boundary, so ingest and sweep
//! entry points verify the secret before anything touches the store. The
//! comparison goes through blake3 digests, which compare in constant time.

use plume_common::PlumeError;

pub fn verify_trigger_secret(provided: Option<&str>, expected: &str) -> Result<(), PlumeError> {
    let Some(provided) = provided else {
        return Err(PlumeError::TriggerRejected("missing trigger secret"));
    };
    if blake3::hash(provided.as_bytes()) != blake3::hash(expected.as_bytes()) {
        return Err(PlumeError::TriggerRejected("invalid trigger secret"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn matching_secret_passes() {
        assert!(verify_trigger_secret(Some("sesame"), "sesame").is_ok());
    }

    #[test]
    fn missing_and_wrong_secrets_are_rejected() {
        assert!(matches!(
            verify_trigger_secret(None, "sesame"),
            Err(PlumeError::TriggerRejected(reason)) if reason.contains("missing")
        ));
        assert!(matches!(
            verify_trigger_secret(Some("open says me"), "sesame"),
            Err(PlumeError::TriggerRejected(reason)) if reason.contains("invalid")
        ));
    }
}
