// SPDX-License-Identifier: MIT OR Apache-2.0
/*!
Managed file names.

Every file in a managed directory is named `{prefix}.{YYYY-MM-DD}.{HH-MM-SS}-{micros}.log`, with the
creation time in UTC and the microseconds zero-padded to six digits. Names are fixed width after the
prefix, so sorting them as strings sorts them by creation time.

Anything else in the directory is left alone.
*/

use chrono::{DateTime, NaiveDateTime, Timelike, Utc};

const EXTENSION: &str = ".log";
const STAMP_FORMAT: &str = "%Y-%m-%d.%H-%M-%S";
const STAMP_WIDTH: usize = "2024-01-01.00-00-00".len();
const MICROS_WIDTH: usize = 6;

pub(crate) fn file_name(prefix: &str, created: DateTime<Utc>) -> String {
    // a leap second reports 1_000_000 or more; fold it into the last representable microsecond
    let micros = created.timestamp_subsec_micros().min(999_999);
    format!(
        "{prefix}.{}-{micros:0width$}{EXTENSION}",
        created.format(STAMP_FORMAT),
        width = MICROS_WIDTH
    )
}

/// The creation time encoded in `name`, if it is one of ours.
pub(crate) fn parse_file_name(prefix: &str, name: &str) -> Option<DateTime<Utc>> {
    let rest = name
        .strip_prefix(prefix)?
        .strip_prefix('.')?
        .strip_suffix(EXTENSION)?;
    if rest.len() != STAMP_WIDTH + 1 + MICROS_WIDTH || !rest.is_ascii() {
        return None;
    }
    let (stamp, micros) = rest.split_at(STAMP_WIDTH);
    let micros = micros.strip_prefix('-')?;
    if !micros.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let micros: u32 = micros.parse().ok()?;
    let naive = NaiveDateTime::parse_from_str(stamp, STAMP_FORMAT).ok()?;
    Some(naive.with_nanosecond(micros * 1_000)?.and_utc())
}
