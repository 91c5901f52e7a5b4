// SPDX-License-Identifier: MIT OR Apache-2.0
use chartly_deadletter::DeadLetterRecord;
use chartly_envelope::Envelope;
use chrono::{TimeZone, Utc};

fn t(secs: i64) -> chrono::DateTime<Utc> {
    Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
}

#[test]
fn exhausted_envelope_produces_a_verifiable_record() {
    let mut envelope = Envelope::new("ingest", "evt-9", "job.run", t(0)).with_payload(b"x".to_vec());
    envelope.attempt = 10;
    envelope.normalize();

    let mut record = DeadLetterRecord::new(
        "dlq-record-1",
        envelope,
        10,
        "max_attempts_exceeded:10",
        t(0),
        t(30),
        t(30),
    )
    .with_extra("source", "worker-3");

    record.normalize();
    record.compute_hash();

    assert!(record.verify_hash());
    assert_eq!(record.final_attempt, 10);
}
