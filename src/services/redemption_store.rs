//! Owns the ticket/coupon + QR credential state machine.
//!
//! Every transition that two callers could race on is delegated to a
//! conditional update in the storage layer; this module decides ordering of
//! the precondition checks and translates refusals into typed errors.

use chrono::{DateTime, Utc};

use crate::models::credential::NewCredential;
use crate::models::subject::NewSubject;
use crate::models::{QrCredential, Subject, SubjectKind, SubjectStatus};
use crate::services::qr_render::{self, RenderError};
use crate::services::token_codec::{self, EncodingError};
use crate::storage::{Storage, StorageError};

#[derive(thiserror::Error, Debug)]
pub enum RedemptionError {
    #[error("subject not found")]
    NotFound,

    #[error("subject belongs to a different owner")]
    Forbidden,

    #[error("credential already used")]
    AlreadyUsed,

    #[error("credential expired")]
    Expired,

    #[error("subject status is {0}, not VALID")]
    InvalidStatus(SubjectStatus),

    #[error("code generation failed: {0}")]
    Encoding(#[from] EncodingError),

    #[error("QR rendering failed: {0}")]
    Render(#[from] RenderError),

    #[error("storage error: {0}")]
    Storage(#[from] StorageError),
}

/// What a new subject is redeemable against. The kind falls out of the
/// reference: seats make tickets, discounts make coupons.
#[derive(Debug, Clone)]
pub enum SubjectRef {
    Seat {
        showtime_id: i64,
        seat_number: i32,
    },
    Discount {
        store_id: i64,
        discount_type: String,
        discount_value: i32,
    },
}

impl SubjectRef {
    pub fn kind(&self) -> SubjectKind {
        match self {
            SubjectRef::Seat { .. } => SubjectKind::Ticket,
            SubjectRef::Discount { .. } => SubjectKind::Coupon,
        }
    }
}

/// Outcome of a non-mutating code check. Carries the refusal reason for
/// logging, but callers only get durability guarantees from `redeem`.
#[derive(Debug, Clone)]
pub enum Validation {
    Valid { kind: SubjectKind, subject_id: i64 },
    Invalid { reason: InvalidReason },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvalidReason {
    Malformed,
    UnknownCode,
    AlreadyUsed,
    Expired,
    NotRedeemable,
}

impl Validation {
    pub fn is_ok(&self) -> bool {
        matches!(self, Validation::Valid { .. })
    }

    pub fn result_type(&self) -> &'static str {
        match self {
            Validation::Valid { .. } => "valid",
            Validation::Invalid { reason } => match reason {
                InvalidReason::Malformed => "malformed",
                InvalidReason::UnknownCode => "unknown_code",
                InvalidReason::AlreadyUsed => "already_used",
                InvalidReason::Expired => "expired",
                InvalidReason::NotRedeemable => "not_redeemable",
            },
        }
    }
}

/// Creates a subject and its credential as one unit: the id is allocated up
/// front, the code and image are generated from it, then both rows are
/// written atomically. No orphan subjects without a credential.
#[tracing::instrument(skip(storage, subject_ref), fields(kind = %subject_ref.kind()))]
pub async fn issue(
    storage: &dyn Storage,
    owner_id: i64,
    subject_ref: SubjectRef,
    valid_until: DateTime<Utc>,
) -> Result<(Subject, QrCredential), RedemptionError> {
    let kind = subject_ref.kind();
    let subject_id = storage.next_subject_id().await?;

    let code = token_codec::encode(kind, subject_id, valid_until)?;
    let image_b64 = qr_render::render_png_base64(&code)?;

    let subject = match subject_ref {
        SubjectRef::Seat {
            showtime_id,
            seat_number,
        } => NewSubject {
            id: subject_id,
            kind,
            owner_id,
            showtime_id: Some(showtime_id),
            seat_number: Some(seat_number),
            store_id: None,
            discount_type: None,
            discount_value: None,
        },
        SubjectRef::Discount {
            store_id,
            discount_type,
            discount_value,
        } => NewSubject {
            id: subject_id,
            kind,
            owner_id,
            showtime_id: None,
            seat_number: None,
            store_id: Some(store_id),
            discount_type: Some(discount_type),
            discount_value: Some(discount_value),
        },
    };

    let credential = NewCredential {
        subject_id,
        subject_kind: kind,
        code,
        image_b64,
        valid_until,
    };

    let (subject, credential) = storage
        .insert_subject_with_credential(subject, credential)
        .await?;

    tracing::info!(subject_id = subject.id, kind = %subject.kind, "subject issued");

    Ok((subject, credential))
}

/// Read-only code check. Never marks anything used; the stored credential,
/// not the fields embedded in the code, decides the outcome.
#[tracing::instrument(skip(storage, code))]
pub async fn validate(storage: &dyn Storage, code: &str) -> Result<Validation, StorageError> {
    let invalid = |reason| Ok(Validation::Invalid { reason });

    if let Err(e) = token_codec::decode(code) {
        tracing::debug!(error = %e, "code failed to parse");
        return invalid(InvalidReason::Malformed);
    }

    let Some(credential) = storage.fetch_credential_by_code(code).await? else {
        return invalid(InvalidReason::UnknownCode);
    };

    if credential.used {
        return invalid(InvalidReason::AlreadyUsed);
    }
    if credential.valid_until <= Utc::now() {
        return invalid(InvalidReason::Expired);
    }

    let subject = storage
        .fetch_subject(credential.subject_kind, credential.subject_id)
        .await?;
    match subject {
        Some(s) if s.status == SubjectStatus::Valid => Ok(Validation::Valid {
            kind: credential.subject_kind,
            subject_id: credential.subject_id,
        }),
        _ => invalid(InvalidReason::NotRedeemable),
    }
}

/// The state transition. Preconditions fail fast in a fixed order; the
/// used-flag flip itself is a single conditional update, so two concurrent
/// redeems for the same credential cannot both succeed.
#[tracing::instrument(skip(storage))]
pub async fn redeem(
    storage: &dyn Storage,
    kind: SubjectKind,
    subject_id: i64,
    caller_owner_id: i64,
) -> Result<QrCredential, RedemptionError> {
    let subject = storage
        .fetch_subject(kind, subject_id)
        .await?
        .ok_or(RedemptionError::NotFound)?;

    if subject.owner_id != caller_owner_id {
        return Err(RedemptionError::Forbidden);
    }
    match subject.status {
        SubjectStatus::Valid => {}
        // A consumed subject reads as "already used" no matter whether the
        // caller raced the winning redeem or arrived a day late.
        SubjectStatus::Used => return Err(RedemptionError::AlreadyUsed),
        status => return Err(RedemptionError::InvalidStatus(status)),
    }

    let mut credential = storage
        .fetch_credential_for_subject(kind, subject_id)
        .await?
        .ok_or(RedemptionError::NotFound)?;

    if credential.used {
        return Err(RedemptionError::AlreadyUsed);
    }
    let now = Utc::now();
    if credential.valid_until <= now {
        return Err(RedemptionError::Expired);
    }

    if !storage.mark_redeemed(credential.id, now).await? {
        // The guarded flip refused: either another redeem won, or a cancel
        // or the expiry sweep moved the subject off VALID since our read.
        // Refetch so the refusal names the state the subject ended up in.
        let latest = storage
            .fetch_subject(kind, subject_id)
            .await?
            .ok_or(RedemptionError::NotFound)?;
        return Err(match latest.status {
            SubjectStatus::Used | SubjectStatus::Valid => RedemptionError::AlreadyUsed,
            status => RedemptionError::InvalidStatus(status),
        });
    }

    credential.used = true;
    credential.used_at = Some(now);
    credential.updated_at = now;

    tracing::info!(subject_id, kind = %kind, "credential redeemed");

    Ok(credential)
}

/// Rotates the secret: a brand-new code and image overwrite the existing
/// credential row, so the previous code can never validate again. Only
/// VALID subjects may be reissued.
#[tracing::instrument(skip(storage))]
pub async fn reissue(
    storage: &dyn Storage,
    kind: SubjectKind,
    subject_id: i64,
) -> Result<(String, String), RedemptionError> {
    let subject = storage
        .fetch_subject(kind, subject_id)
        .await?
        .ok_or(RedemptionError::NotFound)?;

    if subject.status != SubjectStatus::Valid {
        return Err(RedemptionError::InvalidStatus(subject.status));
    }

    let credential = storage
        .fetch_credential_for_subject(kind, subject_id)
        .await?
        .ok_or(RedemptionError::NotFound)?;

    let code = token_codec::encode(kind, subject_id, credential.valid_until)?;
    let image_b64 = qr_render::render_png_base64(&code)?;

    if !storage
        .overwrite_credential(credential.id, &code, &image_b64)
        .await?
    {
        return Err(RedemptionError::NotFound);
    }

    tracing::info!(subject_id, kind = %kind, "credential reissued");

    Ok((code, image_b64))
}

/// Cancels a VALID subject, exactly once. Seat release for tickets is the
/// orchestrator's job; this only owns the status transition.
#[tracing::instrument(skip(storage))]
pub async fn cancel(
    storage: &dyn Storage,
    kind: SubjectKind,
    subject_id: i64,
    caller_owner_id: i64,
) -> Result<Subject, RedemptionError> {
    let mut subject = storage
        .fetch_subject(kind, subject_id)
        .await?
        .ok_or(RedemptionError::NotFound)?;

    if subject.owner_id != caller_owner_id {
        return Err(RedemptionError::Forbidden);
    }
    if subject.status != SubjectStatus::Valid {
        return Err(RedemptionError::InvalidStatus(subject.status));
    }

    if !storage
        .set_subject_status_if(kind, subject_id, SubjectStatus::Valid, SubjectStatus::Cancelled)
        .await?
    {
        // Lost a race with redeem or the expiry sweep; report the status
        // the subject actually ended up in.
        let latest = storage
            .fetch_subject(kind, subject_id)
            .await?
            .ok_or(RedemptionError::NotFound)?;
        return Err(RedemptionError::InvalidStatus(latest.status));
    }

    subject.status = SubjectStatus::Cancelled;

    tracing::info!(subject_id, kind = %kind, "subject cancelled");

    Ok(subject)
}

/// Housekeeping sweep: VALID subjects whose credential expiry has passed
/// become EXPIRED. Seats are deliberately not released; a lapsed time slot
/// stays consumed.
#[tracing::instrument(skip(storage))]
pub async fn expire_overdue(storage: &dyn Storage, now: DateTime<Utc>) -> Result<u64, StorageError> {
    let expired = storage.expire_overdue(now).await?;
    if expired > 0 {
        tracing::info!(expired, "expired overdue subjects");
    }
    Ok(expired)
}
