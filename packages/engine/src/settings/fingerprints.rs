// packages/engine/src/settings/fingerprints.rs
//! TLS fingerprint identities
//!
//! Names are passed through verbatim in the transport config header; the
//! spoofing server maps them onto its client profiles.

/// Fingerprint that selects the spoofing server's built-in client profile
pub const DEFAULT_FINGERPRINT: &str = "Default";

/// Every identity the spoofing server recognises
pub const FINGERPRINTS: &[&str] = &[
    DEFAULT_FINGERPRINT,
    "Chrome 120",
    "Chrome 117",
    "Chrome 116 PSK PQ",
    "Chrome 116 PSK",
    "Chrome 112",
    "Chrome 111",
    "Chrome 110",
    "Chrome 109",
    "Chrome 108",
    "Chrome 107",
    "Chrome 106",
    "Chrome 105",
    "Chrome 104",
    "Chrome 103",
    "Firefox 117",
    "Firefox 110",
    "Firefox 108",
    "Firefox 106",
    "Firefox 105",
    "Firefox 104",
    "Firefox 102",
    "Opera 91",
    "Opera 90",
    "Opera 89",
    "Safari 16.0",
    "Safari 15.6.1",
    "Safari ipad 15.6",
    "Safari ios 16.0",
    "Safari ios 15.6",
    "Safari ios 15.5",
    "OkHttp4 android 13",
    "OkHttp4 android 12",
    "OkHttp4 android 11",
    "OkHttp4 android 10",
    "OkHttp4 android 9",
    "OkHttp4 android 8",
    "OkHttp4 android 7",
];

/// Whether `name` is in the catalogue (exact, case-sensitive match)
pub fn is_known_fingerprint(name: &str) -> bool {
    FINGERPRINTS.contains(&name)
}
