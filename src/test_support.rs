//! Sentence builders shared by the unit tests

use chrono::{DateTime, TimeZone, Utc};

use crate::core::checksum;

/// Wrap a body into a `$` sentence with a correct checksum
pub fn sentence(body: &str) -> String {
    format!("${}*{:02X}", body, checksum(body))
}

/// RMC sentence for 1 June 2024 at the given time of day
pub fn rmc(hours: u32, minutes: u32, seconds: u32) -> String {
    sentence(&format!(
        "GPRMC,{:02}{:02}{:02}.00,A,5213.240,N,00451.110,E,5.2,181.0,010624,,,A",
        hours, minutes, seconds
    ))
}

/// Timestamp on 1 June 2024, matching `rmc`
pub fn at(hours: u32, minutes: u32, seconds: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 6, 1, hours, minutes, seconds).unwrap()
}
