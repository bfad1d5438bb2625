//! Reply parsing
//!
//! Every command gets exactly one reply. A server `ERROR <code> <reason>`
//! line is an ordinary reply here, not a failure.

use crate::codec::CodecError;

/// The positive acknowledgment, byte for byte
pub const OK_REPLY: &[u8] = b"OK!\n";

const OK_LINE: &str = "OK!";
const ERROR_PREFIX: &str = "ERROR ";

/// Whether a reply is exactly `OK!\n`
pub fn is_ok(raw: &[u8]) -> bool {
    raw == OK_REPLY
}

/// Clean up a status reply so it can be shown to a user
///
/// `ERROR <code> <reason>` becomes `<code>: <reason>`. Anything else is
/// returned as-is without its surrounding newlines.
pub fn format_response(raw: &[u8]) -> String {
    let text = String::from_utf8_lossy(raw);
    let text = text.trim_matches('\n');
    match text.strip_prefix(ERROR_PREFIX) {
        Some(rest) => match rest.split_once(' ') {
            Some((code, reason)) => format!("{}: {}", code, reason),
            None => rest.to_string(),
        },
        None => text.to_string(),
    }
}

/// Parse a `WHO` reply: `OK!` followed by one user id per line
pub fn parse_user_list(raw: &[u8]) -> Result<Vec<String>, CodecError> {
    let text = String::from_utf8_lossy(raw);
    let mut lines = text.trim_matches('\n').split('\n');
    let first = lines.next().unwrap_or_default();
    if first != OK_LINE {
        return Err(CodecError::UnexpectedReply {
            expected: OK_LINE.to_string(),
            got: first.to_string(),
        });
    }
    Ok(lines.map(str::to_string).collect())
}

/// Check a `LOGOUT` reply, which must be exactly `OK!\n`
pub fn expect_ok(raw: &[u8]) -> Result<(), CodecError> {
    if is_ok(raw) {
        Ok(())
    } else {
        Err(CodecError::UnexpectedReply {
            expected: String::from_utf8_lossy(OK_REPLY).into_owned(),
            got: String::from_utf8_lossy(raw).into_owned(),
        })
    }
}
