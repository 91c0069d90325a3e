// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! UTC timestamp helpers shared by every event emitter.

use chrono::{DateTime, SecondsFormat, TimeZone, Utc};

/// Current time as an ISO-8601 UTC string.
pub fn utc_iso_now() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Epoch milliseconds rendered as an ISO-8601 UTC string.
pub fn utc_iso_from_epoch_ms(epoch_ms: u64) -> String {
    let dt: DateTime<Utc> = Utc
        .timestamp_millis_opt(epoch_ms as i64)
        .single()
        .unwrap_or_default();
    dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// `YYYY-MM-DD` date component for an epoch-seconds value, in UTC.
pub fn utc_date_from_epoch_secs(epoch_secs: u64) -> String {
    let dt: DateTime<Utc> = Utc
        .timestamp_opt(epoch_secs as i64, 0)
        .single()
        .unwrap_or_default();
    dt.format("%Y-%m-%d").to_string()
}
