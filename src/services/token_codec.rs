//! Generates and parses the opaque code embedded in each QR image.
//!
//! Code layout: `{KIND}-{unix_ts}-{subject id, zero-padded}-{nonce}-{date}`,
//! e.g. `TKT-1766998800-00000042-xK3mPq9Z-20261229`. The kind tag lets a
//! scanner route validation without a database lookup; the trailing date is
//! diagnostic only. Authorization decisions always come from the stored
//! credential row, never from fields parsed out of the code.

use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use rand::{distributions::Alphanumeric, rngs::OsRng, Rng};

use crate::models::SubjectKind;

const NONCE_LEN: usize = 8;
const SUBJECT_ID_WIDTH: usize = 8;
const DATE_FORMAT: &str = "%Y%m%d";
const FIELD_COUNT: usize = 5;

#[derive(thiserror::Error, Debug, PartialEq, Eq)]
pub enum EncodingError {
    #[error("subject id must be positive, got {0}")]
    NonPositiveSubjectId(i64),
}

#[derive(thiserror::Error, Debug, PartialEq, Eq)]
pub enum MalformedCodeError {
    #[error("expected {FIELD_COUNT} fields, found {0}")]
    FieldCount(usize),

    #[error("unrecognized kind tag: {0}")]
    KindTag(String),

    #[error("timestamp field does not parse")]
    Timestamp,

    #[error("subject id field does not parse")]
    SubjectId,

    #[error("nonce field is not {NONCE_LEN} alphanumeric characters")]
    Nonce,

    #[error("date field does not parse")]
    Date,
}

/// Fields recovered from a well-formed code. `valid_until` is the embedded
/// diagnostic date; callers re-check expiry against the stored credential.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedCode {
    pub kind: SubjectKind,
    pub subject_id: i64,
    pub issued_at: DateTime<Utc>,
    pub valid_until: NaiveDate,
}

/// Builds a fresh redemption code. The nonce is drawn from the operating
/// system CSPRNG; unguessability of the code is a security property.
pub fn encode(
    kind: SubjectKind,
    subject_id: i64,
    valid_until: DateTime<Utc>,
) -> Result<String, EncodingError> {
    if subject_id <= 0 {
        return Err(EncodingError::NonPositiveSubjectId(subject_id));
    }

    let nonce: String = OsRng
        .sample_iter(&Alphanumeric)
        .take(NONCE_LEN)
        .map(char::from)
        .collect();

    Ok(format!(
        "{}-{}-{:0width$}-{}-{}",
        kind.code_prefix(),
        Utc::now().timestamp(),
        subject_id,
        nonce,
        valid_until.format(DATE_FORMAT),
        width = SUBJECT_ID_WIDTH,
    ))
}

pub fn decode(code: &str) -> Result<DecodedCode, MalformedCodeError> {
    let fields: Vec<&str> = code.split('-').collect();
    if fields.len() != FIELD_COUNT {
        return Err(MalformedCodeError::FieldCount(fields.len()));
    }

    let kind = SubjectKind::from_code_prefix(fields[0])
        .ok_or_else(|| MalformedCodeError::KindTag(fields[0].to_string()))?;

    let ts: i64 = fields[1].parse().map_err(|_| MalformedCodeError::Timestamp)?;
    let issued_at = Utc
        .timestamp_opt(ts, 0)
        .single()
        .ok_or(MalformedCodeError::Timestamp)?;

    let subject_id: i64 = fields[2].parse().map_err(|_| MalformedCodeError::SubjectId)?;
    if subject_id <= 0 {
        return Err(MalformedCodeError::SubjectId);
    }

    let nonce = fields[3];
    if nonce.len() != NONCE_LEN || !nonce.chars().all(|c| c.is_ascii_alphanumeric()) {
        return Err(MalformedCodeError::Nonce);
    }

    let valid_until = NaiveDate::parse_from_str(fields[4], DATE_FORMAT)
        .map_err(|_| MalformedCodeError::Date)?;

    Ok(DecodedCode {
        kind,
        subject_id,
        issued_at,
        valid_until,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_round_trip() {
        let valid_until = Utc::now() + Duration::days(3);
        for kind in [SubjectKind::Ticket, SubjectKind::Coupon] {
            for id in [1i64, 42, 99_999_999, 123_456_789_012] {
                let code = encode(kind, id, valid_until).unwrap();
                let decoded = decode(&code).unwrap();
                assert_eq!(decoded.kind, kind);
                assert_eq!(decoded.subject_id, id);
                assert_eq!(decoded.valid_until, valid_until.date_naive());
            }
        }
    }

    #[test]
    fn test_encode_rejects_non_positive_ids() {
        let valid_until = Utc::now();
        assert_eq!(
            encode(SubjectKind::Ticket, 0, valid_until),
            Err(EncodingError::NonPositiveSubjectId(0))
        );
        assert_eq!(
            encode(SubjectKind::Ticket, -7, valid_until),
            Err(EncodingError::NonPositiveSubjectId(-7))
        );
    }

    #[test]
    fn test_nonce_varies_between_codes() {
        let valid_until = Utc::now() + Duration::days(1);
        let a = encode(SubjectKind::Coupon, 5, valid_until).unwrap();
        let b = encode(SubjectKind::Coupon, 5, valid_until).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_decode_rejects_malformed_codes() {
        assert_eq!(
            decode("TKT-123-00000001-abcdefgh"),
            Err(MalformedCodeError::FieldCount(4))
        );
        assert_eq!(
            decode("ZZZ-1766998800-00000042-xK3mPq9Z-20261229"),
            Err(MalformedCodeError::KindTag("ZZZ".to_string()))
        );
        assert_eq!(
            decode("TKT-notats-00000042-xK3mPq9Z-20261229"),
            Err(MalformedCodeError::Timestamp)
        );
        assert_eq!(
            decode("TKT-1766998800-badid123-xK3mPq9Z-20261229"),
            Err(MalformedCodeError::SubjectId)
        );
        assert_eq!(
            decode("TKT-1766998800-00000000-xK3mPq9Z-20261229"),
            Err(MalformedCodeError::SubjectId)
        );
        assert_eq!(
            decode("TKT-1766998800-00000042-short-20261229"),
            Err(MalformedCodeError::Nonce)
        );
        assert_eq!(
            decode("TKT-1766998800-00000042-xK3mPq9Z-20261332"),
            Err(MalformedCodeError::Date)
        );
    }

    #[test]
    fn test_decoded_expiry_is_not_authoritative() {
        // A well-formed code with a future embedded date still decodes; the
        // caller is expected to check the stored credential, so decode must
        // not be treated as an authorization pass.
        let decoded = decode("CPN-1766998800-00000042-xK3mPq9Z-29991231").unwrap();
        assert_eq!(decoded.kind, SubjectKind::Coupon);
        assert_eq!(decoded.valid_until, NaiveDate::from_ymd_opt(2999, 12, 31).unwrap());
    }
}
