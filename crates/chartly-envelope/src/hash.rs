// SPDX-License-Identifier: MIT OR Apache-2.0
use crate::Envelope;

/// Compute the stable SHA-256 hash of an envelope.
///
/// Built from a fixed-order, NUL-terminated field serialization rather than
/// canonical JSON: envelope headers are a flat string map, so there is no
/// nesting to justify `chartly_canon::canonical_json_bytes`'s generality,
/// and a flat segment layout is cheaper to hash incrementally.
///
/// The envelope is expected to already be normalized ([`Envelope::normalize`])
/// so that two envelopes differing only in header insertion order, casing,
/// or incidental whitespace hash identically.
///
/// # Examples
///
/// ```
/// use chartly_envelope::Envelope;
/// use chrono::{TimeZone, Utc};
///
/// let t = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
/// let mut a = Envelope::new("q", "id", "job", t)
///     .with_header("a", "1")
///     .with_header("b", "2");
/// let mut b = Envelope::new("q", "id", "job", t)
///     .with_header("b", "2")
///     .with_header("a", "1");
/// a.normalize();
/// b.normalize();
/// assert_eq!(a.stable_hash(), b.stable_hash());
/// ```
#[must_use]
pub fn stable_envelope_hash(envelope: &Envelope) -> String {
    let mut buf = Vec::new();
    push_segment(&mut buf, envelope.queue_name.as_bytes());
    push_segment(&mut buf, envelope.id.as_bytes());
    push_segment(&mut buf, envelope.type_.as_bytes());
    push_segment(&mut buf, envelope.tenant.as_deref().unwrap_or("").as_bytes());
    push_segment(&mut buf, envelope.dedup_key.as_deref().unwrap_or("").as_bytes());
    push_segment(&mut buf, envelope.attempt.to_string().as_bytes());
    push_segment(&mut buf, envelope.payload_bytes.to_string().as_bytes());
    for (k, v) in &envelope.headers {
        push_segment(&mut buf, k.as_bytes());
        push_segment(&mut buf, v.as_bytes());
    }
    push_segment(&mut buf, envelope.payload.as_deref().unwrap_or(&[]));
    chartly_canon::sha256_hex(&buf)
}

fn push_segment(buf: &mut Vec<u8>, segment: &[u8]) {
    buf.extend_from_slice(segment);
    buf.push(0);
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn t0() -> chrono::DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()
    }

    #[test]
    fn hash_is_stable_across_header_insertion_order() {
        let mut a = Envelope::new("q", "id", "job", t0())
            .with_header("a", "1")
            .with_header("b", "2");
        let mut b = Envelope::new("q", "id", "job", t0())
            .with_header("b", "2")
            .with_header("a", "1");
        a.normalize();
        b.normalize();
        assert_eq!(stable_envelope_hash(&a), stable_envelope_hash(&b));
    }

    #[test]
    fn hash_changes_with_payload() {
        let e1 = Envelope::new("q", "id", "job", t0()).with_payload(b"one".to_vec());
        let e2 = Envelope::new("q", "id", "job", t0()).with_payload(b"two".to_vec());
        assert_ne!(stable_envelope_hash(&e1), stable_envelope_hash(&e2));
    }

    #[test]
    fn hash_changes_with_attempt() {
        let mut e1 = Envelope::new("q", "id", "job", t0());
        let mut e2 = e1.clone();
        e2.attempt = 1;
        assert_ne!(stable_envelope_hash(&e1), stable_envelope_hash(&e2));
        e1.attempt = 1;
        assert_eq!(stable_envelope_hash(&e1), stable_envelope_hash(&e2));
    }

    #[test]
    fn hash_is_a_64_char_lowercase_hex_string() {
        let e = Envelope::new("q", "id", "job", t0());
        let h = stable_envelope_hash(&e);
        assert_eq!(h.len(), 64);
        assert!(h.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
    }
}
