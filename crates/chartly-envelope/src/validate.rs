// SPDX-License-Identifier: MIT OR Apache-2.0
use crate::{
    Envelope, MAX_DEDUP_KEY_LEN, MAX_ID_LEN, MAX_QUEUE_NAME_LEN, MAX_TYPE_LEN,
};

/// Reasons an [`Envelope`] fails validation.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum EnvelopeError {
    /// `queue_name` was empty.
    #[error("queue_name must not be empty")]
    EmptyQueueName,
    /// `queue_name` exceeded [`MAX_QUEUE_NAME_LEN`].
    #[error("queue_name exceeds {MAX_QUEUE_NAME_LEN} bytes")]
    QueueNameTooLong,
    /// `id` was empty.
    #[error("id must not be empty")]
    EmptyId,
    /// `id` exceeded [`MAX_ID_LEN`].
    #[error("id exceeds {MAX_ID_LEN} bytes")]
    IdTooLong,
    /// `type` was empty after normalization.
    #[error("type must not be empty")]
    EmptyType,
    /// `type` exceeded [`MAX_TYPE_LEN`].
    #[error("type exceeds {MAX_TYPE_LEN} bytes")]
    TypeTooLong,
    /// `dedup_key` exceeded [`MAX_DEDUP_KEY_LEN`].
    #[error("dedup_key exceeds {MAX_DEDUP_KEY_LEN} bytes")]
    DedupKeyTooLong,
    /// `payload_bytes` did not match the actual payload length.
    #[error("payload_bytes ({declared}) does not match payload length ({actual})")]
    PayloadSizeMismatch {
        /// Declared size.
        declared: u64,
        /// Actual payload length.
        actual: u64,
    },
    /// `payload_bytes` exceeded the caller-supplied limit.
    #[error("payload_bytes ({actual}) exceeds the limit ({limit})")]
    PayloadTooLarge {
        /// Actual payload size.
        actual: u64,
        /// Configured limit.
        limit: u64,
    },
}

pub(crate) fn validate(envelope: &Envelope, max_payload_bytes: u64) -> Result<(), EnvelopeError> {
    if envelope.queue_name.is_empty() {
        return Err(EnvelopeError::EmptyQueueName);
    }
    if envelope.queue_name.len() > MAX_QUEUE_NAME_LEN {
        return Err(EnvelopeError::QueueNameTooLong);
    }
    if envelope.id.is_empty() {
        return Err(EnvelopeError::EmptyId);
    }
    if envelope.id.len() > MAX_ID_LEN {
        return Err(EnvelopeError::IdTooLong);
    }
    if envelope.type_.is_empty() {
        return Err(EnvelopeError::EmptyType);
    }
    if envelope.type_.len() > MAX_TYPE_LEN {
        return Err(EnvelopeError::TypeTooLong);
    }
    if let Some(dedup_key) = &envelope.dedup_key {
        if dedup_key.len() > MAX_DEDUP_KEY_LEN {
            return Err(EnvelopeError::DedupKeyTooLong);
        }
    }
    let actual = envelope.payload.as_ref().map_or(0, |p| p.len() as u64);
    if actual != envelope.payload_bytes {
        return Err(EnvelopeError::PayloadSizeMismatch {
            declared: envelope.payload_bytes,
            actual,
        });
    }
    if envelope.payload_bytes > max_payload_bytes {
        return Err(EnvelopeError::PayloadTooLarge {
            actual: envelope.payload_bytes,
            limit: max_payload_bytes,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::DEFAULT_MAX_PAYLOAD_BYTES;
    use chrono::{TimeZone, Utc};

    fn t0() -> chrono::DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()
    }

    #[test]
    fn valid_envelope_passes() {
        let e = Envelope::new("q", "id", "job", t0()).with_payload(b"hi".to_vec());
        assert_eq!(e.validate(DEFAULT_MAX_PAYLOAD_BYTES), Ok(()));
    }

    #[test]
    fn empty_type_is_rejected() {
        let e = Envelope::new("q", "id", "", t0());
        assert_eq!(e.validate(DEFAULT_MAX_PAYLOAD_BYTES), Err(EnvelopeError::EmptyType));
    }

    #[test]
    fn payload_size_mismatch_is_rejected() {
        let mut e = Envelope::new("q", "id", "job", t0()).with_payload(b"hi".to_vec());
        e.payload_bytes = 99;
        assert_eq!(
            e.validate(DEFAULT_MAX_PAYLOAD_BYTES),
            Err(EnvelopeError::PayloadSizeMismatch { declared: 99, actual: 2 })
        );
    }

    #[test]
    fn oversize_payload_is_rejected() {
        let e = Envelope::new("q", "id", "job", t0()).with_payload(vec![0u8; 10]);
        assert_eq!(
            e.validate(5),
            Err(EnvelopeError::PayloadTooLarge { actual: 10, limit: 5 })
        );
    }

    #[test]
    fn empty_queue_name_is_rejected() {
        let e = Envelope::new("", "id", "job", t0());
        assert_eq!(e.validate(DEFAULT_MAX_PAYLOAD_BYTES), Err(EnvelopeError::EmptyQueueName));
    }
}
