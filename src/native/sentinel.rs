//! Parser for sentinel-prefixed replies.
//!
//! Scripts that cannot return typed structures report their outcome as a
//! string beginning with `SUCCESS:` or `ERROR:`.  The reply is parsed here,
//! at the boundary, so nothing downstream handles the raw string.  Any other
//! shape is treated as a failure.

use super::outcome::{CommandOutcome, FailureKind, NativeValue};
use super::runner::classify_native_error;

/// Prefix of a successful reply.
pub const SUCCESS_PREFIX: &str = "SUCCESS:";

/// Prefix of a failed reply.
pub const ERROR_PREFIX: &str = "ERROR:";

/// A parsed sentinel reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SentinelReply {
    /// `SUCCESS:<detail>`
    Success(String),
    /// `ERROR:<detail>`
    Error(String),
    /// Anything else, kept verbatim for diagnostics.
    Unrecognized(String),
}

impl SentinelReply {
    /// Parse a raw reply.  Leading and trailing whitespace is ignored, and
    /// the prefix match is case-sensitive.
    pub fn parse(raw: &str) -> Self {
        let trimmed = raw.trim();
        if let Some(detail) = trimmed.strip_prefix(SUCCESS_PREFIX) {
            SentinelReply::Success(detail.trim().to_owned())
        } else if let Some(detail) = trimmed.strip_prefix(ERROR_PREFIX) {
            SentinelReply::Error(detail.trim().to_owned())
        } else {
            SentinelReply::Unrecognized(trimmed.to_owned())
        }
    }

    /// Convert into a [`CommandOutcome`].
    ///
    /// `ERROR:` details are tagged by the native error they carry;
    /// unrecognized replies are always [`FailureKind::NativeError`].
    pub fn into_outcome(self) -> CommandOutcome {
        match self {
            SentinelReply::Success(detail) => CommandOutcome::Success(NativeValue::Text(detail)),
            SentinelReply::Error(detail) => {
                CommandOutcome::failure(classify_native_error(&detail), detail)
            }
            SentinelReply::Unrecognized(raw) => {
                let detail = if raw.is_empty() {
                    "empty reply from script".to_owned()
                } else {
                    format!("unrecognized reply from script: {raw}")
                };
                CommandOutcome::failure(FailureKind::NativeError, detail)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn success_prefix_parses() {
        assert_eq!(
            SentinelReply::parse("SUCCESS: sent to +15550100\n"),
            SentinelReply::Success("sent to +15550100".to_owned())
        );
    }

    #[test]
    fn error_prefix_parses() {
        assert_eq!(
            SentinelReply::parse("ERROR:buddy not found"),
            SentinelReply::Error("buddy not found".to_owned())
        );
    }

    #[test]
    fn success_with_empty_detail() {
        assert_eq!(
            SentinelReply::parse("SUCCESS:"),
            SentinelReply::Success(String::new())
        );
    }

    #[test]
    fn lowercase_prefix_is_unrecognized() {
        assert!(matches!(
            SentinelReply::parse("success: maybe"),
            SentinelReply::Unrecognized(_)
        ));
    }

    #[test]
    fn unrecognized_becomes_native_failure() {
        let outcome = SentinelReply::parse("true").into_outcome();
        assert_eq!(outcome.failure_kind(), Some(FailureKind::NativeError));
    }

    #[test]
    fn empty_reply_becomes_native_failure() {
        match SentinelReply::parse("   ").into_outcome() {
            CommandOutcome::Failure { detail, .. } => assert!(detail.contains("empty reply")),
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn error_reply_carrying_access_code_is_access_denied() {
        let outcome =
            SentinelReply::parse("ERROR:Not authorized to send Apple events to Messages. (-1743)")
                .into_outcome();
        assert_eq!(outcome.failure_kind(), Some(FailureKind::AccessDenied));
    }

    #[test]
    fn error_reply_with_invalid_index_stays_native() {
        let detail = "Can’t get account 1 whose service type = iMessage. Invalid index. (-1719)";
        match SentinelReply::parse(&format!("ERROR:{detail}")).into_outcome() {
            CommandOutcome::Failure { kind, detail: got } => {
                assert_eq!(kind, FailureKind::NativeError);
                assert_eq!(got, detail);
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn success_reply_becomes_text_value() {
        let outcome = SentinelReply::parse("SUCCESS:done").into_outcome();
        assert_eq!(outcome, CommandOutcome::Success(NativeValue::Text("done".to_owned())));
    }
}
