//! Request signing for the PTV timetable API
//!
//! Every request carries the developer id and an HMAC-SHA1 signature of the
//! path-and-query, keyed with the developer key.

use hmac::{Hmac, Mac};
use sha1::Sha1;

type HmacSha1 = Hmac<Sha1>;

/// Build a signed request URL
///
/// Appends `devid=<device_id>` to `request` (a path with optional query),
/// signs the resulting string and appends `&signature=<hex>`.
#[must_use]
pub fn sign_url(base_url: &str, request: &str, device_id: &str, api_key: &str) -> String {
    let separator = if request.contains('?') { '&' } else { '?' };
    let raw = format!("{request}{separator}devid={device_id}");
    let signature = signature(&raw, api_key);

    format!("{}{raw}&signature={signature}", base_url.trim_end_matches('/'))
}

/// Hex-encoded HMAC-SHA1 of `raw` keyed with `api_key`
#[must_use]
pub fn signature(raw: &str, api_key: &str) -> String {
    // HMAC accepts keys of any length
    let Ok(mut mac) = HmacSha1::new_from_slice(api_key.as_bytes()) else {
        return String::new();
    };
    mac.update(raw.as_bytes());
    hex::encode(mac.finalize().into_bytes())
}

/// Strip the signature from a signed URL before it goes into a log line
#[must_use]
pub fn redact(url: &str) -> &str {
    url.rsplit_once("&signature=").map_or(url, |(head, _)| head)
}
