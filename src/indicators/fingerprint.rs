//! Deterministic identity for an indicator request.

use crate::indicators::taxonomy::IndicatorOptions;

/// 32-bit signed identity of an indicator request. Registry lookup key.
///
/// This is a non-cryptographic rolling hash: collisions are possible in
/// principle, and the fingerprint is still the sole deduplication key.
/// Callers that need stronger identity must layer it on top.
pub type Fingerprint = i32;

/// Fingerprint of `(symbol, interval, name, options)`.
///
/// Hashes `lowercase(symbol) + "_" + interval + "_" + lowercase(name) + "_"
/// + canonical_json(options)` with `acc = truncate32(acc * 31 + c)` over
/// UTF-16 code units, where `truncate32` reinterprets the result as a
/// two's-complement 32-bit integer. The option bag serializes with sorted
/// keys, so insertion order never changes the identity; the serialized form
/// of each value does (e.g. `14` and `14.0` differ).
pub fn fingerprint(
    symbol: &str,
    interval: &str,
    name: &str,
    options: &IndicatorOptions,
) -> Fingerprint {
    let options_json = serde_json::to_string(options).unwrap_or_default();
    let seed = format!(
        "{}_{}_{}_{}",
        symbol.to_lowercase(),
        interval,
        name.to_lowercase(),
        options_json
    );

    let mut acc: i32 = 0;
    for unit in seed.encode_utf16() {
        acc = acc
            .wrapping_shl(5)
            .wrapping_sub(acc)
            .wrapping_add(unit as i32);
    }
    acc
}
