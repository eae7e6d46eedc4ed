//! Continuation tokens issued by the in-memory store.

use crate::errors::DbError;
use crate::types::ContinuationToken;
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize)]
struct ResumePoint {
    after: u64,
}

/// Token resuming after the document stored at sequence `after`.
pub(crate) fn encode(after: u64) -> ContinuationToken {
    ContinuationToken::new(hex::encode(format!("{{\"after\":{after}}}")))
}

/// `None` for the start token.
pub(crate) fn decode(token: &ContinuationToken) -> Result<Option<u64>, DbError> {
    if token.is_empty() {
        return Ok(None);
    }
    let malformed = || DbError::InvalidArgument("malformed continuation token".into());
    let raw = hex::decode(token.as_str()).map_err(|_| malformed())?;
    let point: ResumePoint = serde_json::from_slice(&raw).map_err(|_| malformed())?;
    Ok(Some(point.after))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resume_point_survives_the_trip() {
        let t = encode(41);
        assert!(!t.is_empty());
        assert_eq!(decode(&t).unwrap(), Some(41));
    }

    #[test]
    fn start_token_decodes_to_none() {
        assert_eq!(decode(&ContinuationToken::start()).unwrap(), None);
    }

    #[test]
    fn garbage_is_invalid_argument() {
        for raw in ["zz", "7b7d", &hex::encode("{\"after\":\"x\"}")] {
            let err = decode(&ContinuationToken::new(raw)).unwrap_err();
            assert!(matches!(err, DbError::InvalidArgument(_)), "{raw}");
        }
    }
}
