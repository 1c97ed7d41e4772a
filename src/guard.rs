//! Optimistic concurrency on the etag.
//!
//! Two checks protect an update. The handler compares the caller's `If-Match` against the
//! etag of the record it just loaded, which rejects callers that read an older version.
//! The driver then persists with the loaded etag as the expected value, so a write that
//! lands between load and persist is rejected by the store as well. Neither check retries
//! or merges.

use crate::error::ResourceError;
use resource_store::Etag;

/// `None` means the caller did not send an etag: the update is unconditional.
pub fn check_if_match(supplied: Option<&Etag>, current: &Etag) -> Result<(), ResourceError> {
    match supplied {
        Some(supplied) if supplied != current => Err(ResourceError::PreconditionFailed {
            supplied: supplied.clone(),
            current: current.clone(),
        }),
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_check_if_match() {
        let current = Etag::compute(&("example.com.", "", 1)).unwrap();
        let stale = Etag::compute(&("example.com.", "", 0)).unwrap();

        assert!(check_if_match(None, &current).is_ok());
        assert!(check_if_match(Some(&current), &current).is_ok());
        assert_eq!(
            check_if_match(Some(&stale), &current),
            Err(ResourceError::PreconditionFailed {
                supplied: stale,
                current
            })
        );
    }
}
