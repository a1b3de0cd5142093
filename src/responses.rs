//! Helpers for extracting values from accumulated responses

/// Returns the position of the first occurrence of needle
pub(crate) fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    if needle.is_empty() {
        return Some(0);
    }

    haystack.windows(needle.len()).position(|window| window == needle)
}

/// Returns true if the haystack contains the needle
pub(crate) fn contains(haystack: &[u8], needle: &[u8]) -> bool {
    find(haystack, needle).is_some()
}

/// Returns the bytes between the first occurrence of prefix and the next terminator.
/// None if prefix or terminator are missing.
pub(crate) fn field_after<'r>(response: &'r [u8], prefix: &[u8], terminator: u8) -> Option<&'r [u8]> {
    let start = find(response, prefix)? + prefix.len();
    let length = response[start..].iter().position(|byte| *byte == terminator)?;
    Some(&response[start..start + length])
}
