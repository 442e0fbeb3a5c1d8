//! IPv6 text normalization.
//!
//! Converts any legally-abbreviated IPv6 text (including a trailing `%zone`
//! suffix, which is discarded) into the canonical fully-expanded 8-group
//! lower-case form. The canonical form is the basis for classification and
//! deduplication, so it is produced here and nowhere else.

use crate::base::LookupError;

/// Expand abbreviated IPv6 text into canonical 8-group lower-case form.
///
/// A trailing `%zone` suffix (e.g. `%en1`) is stripped before expansion and
/// never appears in the output. Fails with [`LookupError::MalformedAddress`]
/// on more than one `::`, more than 8 groups, non-hex groups, or an address
/// without `::` that does not already contain exactly 8 groups.
///
/// Idempotent: `normalize_ipv6(normalize_ipv6(x)?) == normalize_ipv6(x)` for
/// any syntactically valid input.
pub fn normalize_ipv6(text: &str) -> Result<String, LookupError> {
    // Zone suffixes come from link-local interface addresses; the zone is
    // meaningless for classification.
    let stripped = match text.split_once('%') {
        Some((addr, _zone)) if !addr.is_empty() => addr,
        Some(_) => return Err(LookupError::malformed(text)),
        None => text,
    };

    let (left, right, has_gap) = match stripped.split_once("::") {
        Some((l, r)) => {
            if r.contains("::") {
                // A second `::` is always invalid.
                return Err(LookupError::malformed(text));
            }
            (l, r, true)
        }
        None => (stripped, "", false),
    };

    let left_groups = parse_groups(left, text)?;
    let right_groups = parse_groups(right, text)?;

    let mut groups: Vec<u16> = Vec::with_capacity(8);
    if has_gap {
        let used = left_groups.len() + right_groups.len();
        if used > 8 {
            // The zero-fill count went negative: too many explicit groups.
            return Err(LookupError::malformed(text));
        }
        groups.extend_from_slice(&left_groups);
        groups.resize(8 - right_groups.len(), 0);
        groups.extend_from_slice(&right_groups);
    } else {
        if left_groups.len() != 8 {
            return Err(LookupError::malformed(text));
        }
        groups = left_groups;
    }

    Ok(groups_to_canonical(&groups))
}

/// Render 8 address groups as the canonical expanded text form.
pub(crate) fn groups_to_canonical(groups: &[u16]) -> String {
    debug_assert_eq!(groups.len(), 8);
    let mut out = String::with_capacity(39);
    for (i, g) in groups.iter().enumerate() {
        if i > 0 {
            out.push(':');
        }
        out.push_str(&format!("{:04x}", g));
    }
    out
}

fn parse_groups(side: &str, original: &str) -> Result<Vec<u16>, LookupError> {
    if side.is_empty() {
        return Ok(Vec::new());
    }
    side.split(':')
        .map(|group| {
            if group.is_empty() || group.len() > 4 {
                return Err(LookupError::malformed(original));
            }
            u16::from_str_radix(group, 16).map_err(|_| LookupError::malformed(original))
        })
        .collect()
}

/// Apply the conventional zero-run shortening to a canonical address.
///
/// The longest run of consecutive all-zero groups is replaced with `::`,
/// ties broken by the leftmost run. Runs of length 1 are compressed as well;
/// the choice is applied consistently and only affects display form, never
/// classification (which always works on the canonical expansion).
pub(crate) fn compress_ipv6(canonical: &str) -> String {
    let groups: Vec<String> = canonical
        .split(':')
        .map(|g| {
            let trimmed = g.trim_start_matches('0');
            if trimmed.is_empty() { "0" } else { trimmed }.to_string()
        })
        .collect();

    let mut best_start = 0usize;
    let mut best_len = 0usize;
    let mut run_start = 0usize;
    let mut run_len = 0usize;
    for (i, g) in groups.iter().enumerate() {
        if g == "0" {
            if run_len == 0 {
                run_start = i;
            }
            run_len += 1;
            if run_len > best_len {
                best_start = run_start;
                best_len = run_len;
            }
        } else {
            run_len = 0;
        }
    }

    if best_len == 0 {
        return groups.join(":");
    }

    let head = groups[..best_start].join(":");
    let tail = groups[best_start + best_len..].join(":");
    format!("{}::{}", head, tail)
}
