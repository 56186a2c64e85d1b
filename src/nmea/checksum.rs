//! # NMEA Checksum
//!
//! XOR-fold checksum over the sentence body.
//!
//! The fold covers every byte strictly between the `$` start sentinel and the
//! `*` separator. The LiDAR feed renders the result in decimal, without
//! zero-padding.

/// XOR-fold every byte of `body`
///
/// # Arguments
///
/// * `body` - Sentence text between `$` and `*`, commas included
///
/// # Returns
///
/// * `u8` - Folded checksum (0 for an empty body)
///
/// # Examples
///
/// ```
/// use nmea_bridge::nmea::checksum::xor_checksum;
///
/// assert_eq!(xor_checksum("AB"), b'A' ^ b'B');
/// ```
pub fn xor_checksum(body: &str) -> u8 {
    body.bytes().fold(0u8, |acc, byte| acc ^ byte)
}

/// Render a checksum as it appears after the `*` separator
pub fn format_checksum(checksum: u8) -> String {
    checksum.to_string()
}
