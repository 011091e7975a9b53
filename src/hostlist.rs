//! Host list folding.
//!
//! Large fleets usually follow a naming scheme (`node001`, `node002`, ...).
//! [`fold`] compresses such a set into range notation so a line listing
//! hundreds of hosts stays readable:
//!
//! ```text
//! node1,node2,node3,node7,login  =>  login,node[1-3,7]
//! ```
//!
//! Hosts group together when they share a literal prefix and a trailing
//! numeric suffix printed with the same zero padding; `c09` and `c10` both
//! print as two digits and fold to `c[09-10]`. Everything else is listed
//! literally.
//! [`expand`] is the inverse and is used to check that folding is lossless.

use std::collections::{BTreeMap, BTreeSet};

use crate::error::{Error, Result};

/// A host name split into `prefix` + number.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Numbered<'a> {
    prefix: &'a str,
    /// Zero-padding width, 0 when the number carries no leading zero.
    width: usize,
    /// Number of digits as written.
    digits: usize,
    value: u64,
}

/// Width of a digit run: its length when zero padded, otherwise 0.
fn padding_width(digits: &str) -> usize {
    if digits.len() > 1 && digits.starts_with('0') {
        digits.len()
    } else {
        0
    }
}

fn split_numbered(name: &str) -> Option<Numbered<'_>> {
    // Names that would not survive expansion stay literal.
    if name.contains(['[', ']', ',']) {
        return None;
    }
    let digits_start = name
        .char_indices()
        .rev()
        .take_while(|(_, c)| c.is_ascii_digit())
        .last()
        .map(|(idx, _)| idx)?;
    let digits = &name[digits_start..];
    let value = digits.parse::<u64>().ok()?;
    Some(Numbered {
        prefix: &name[..digits_start],
        width: padding_width(digits),
        digits: digits.len(),
        value,
    })
}

/// Range group a number joins.
///
/// An unpadded number prints the same under any padding width up to its own
/// length, so it joins the widest padded group of its prefix that allows it
/// (`c10` joins `c08`, `c09`).
fn group_width(number: &Numbered<'_>, padded: &BTreeSet<usize>) -> usize {
    if number.width > 0 {
        return number.width;
    }
    padded.range(..=number.digits).next_back().copied().unwrap_or(0)
}

fn format_number(value: u64, width: usize) -> String {
    format!("{:0width$}", value, width = width)
}

/// Compress ascending values into `a-b,c` notation.
fn compress(values: &BTreeSet<u64>, width: usize) -> String {
    let mut parts = Vec::new();
    let mut iter = values.iter().copied();
    let Some(first) = iter.next() else {
        return String::new();
    };
    let (mut start, mut prev) = (first, first);
    for value in iter {
        if value == prev + 1 {
            prev = value;
            continue;
        }
        parts.push(range_text(start, prev, width));
        start = value;
        prev = value;
    }
    parts.push(range_text(start, prev, width));
    parts.join(",")
}

fn range_text(start: u64, end: u64, width: usize) -> String {
    if start == end {
        format_number(start, width)
    } else {
        format!("{}-{}", format_number(start, width), format_number(end, width))
    }
}

/// Fold a set of host names into compact range notation.
///
/// The output does not depend on input order and duplicates collapse.
///
/// ```
/// use fleetrecap::hostlist::fold;
///
/// assert_eq!(fold(["d2", "d1"]), "d[1-2]");
/// assert_eq!(fold(["web1"]), "web1");
/// ```
pub fn fold<I, S>(hosts: I) -> String
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let names: BTreeSet<String> = hosts.into_iter().map(|h| h.as_ref().to_string()).collect();

    let mut literals: Vec<&str> = Vec::new();
    let mut parsed: Vec<Numbered<'_>> = Vec::new();
    let mut padded: BTreeMap<&str, BTreeSet<usize>> = BTreeMap::new();
    for name in &names {
        match split_numbered(name) {
            Some(number) => {
                if number.width > 0 {
                    padded.entry(number.prefix).or_default().insert(number.width);
                }
                parsed.push(number);
            }
            None => literals.push(name),
        }
    }

    let no_padding = BTreeSet::new();
    let mut numbered: BTreeMap<(&str, usize), BTreeSet<u64>> = BTreeMap::new();
    for number in &parsed {
        let widths = padded.get(number.prefix).unwrap_or(&no_padding);
        numbered
            .entry((number.prefix, group_width(number, widths)))
            .or_default()
            .insert(number.value);
    }

    // ordered by prefix, then lowest number; literals first within a prefix
    let mut fragments: Vec<(&str, Option<u64>, String)> = Vec::new();
    for ((prefix, width), values) in &numbered {
        let Some(first) = values.iter().next().copied() else {
            continue;
        };
        let text = if values.len() == 1 {
            format!("{}{}", prefix, format_number(first, *width))
        } else {
            format!("{}[{}]", prefix, compress(values, *width))
        };
        fragments.push((*prefix, Some(first), text));
    }
    fragments.extend(literals.into_iter().map(|name| (name, None, name.to_string())));
    fragments.sort();

    fragments
        .into_iter()
        .map(|(_, _, text)| text)
        .collect::<Vec<_>>()
        .join(",")
}

/// Split on commas that are not inside brackets.
fn split_fragments(pattern: &str) -> Result<Vec<&str>> {
    let mut fragments = Vec::new();
    let mut depth = 0usize;
    let mut start = 0;
    for (idx, c) in pattern.char_indices() {
        match c {
            '[' => depth += 1,
            ']' => {
                depth = depth
                    .checked_sub(1)
                    .ok_or_else(|| Error::InvalidHostPattern(pattern.to_string()))?;
            }
            ',' if depth == 0 => {
                fragments.push(&pattern[start..idx]);
                start = idx + 1;
            }
            _ => {}
        }
    }
    if depth != 0 {
        return Err(Error::InvalidHostPattern(pattern.to_string()));
    }
    fragments.push(&pattern[start..]);
    Ok(fragments)
}

fn parse_bound(text: &str, pattern: &str) -> Result<(u64, usize)> {
    let value = text
        .parse::<u64>()
        .map_err(|_| Error::InvalidHostPattern(pattern.to_string()))?;
    Ok((value, padding_width(text)))
}

/// Expand a folded host pattern back into host names.
///
/// Names are returned in pattern order.
pub fn expand(pattern: &str) -> Result<Vec<String>> {
    let mut hosts = Vec::new();
    if pattern.is_empty() {
        return Ok(hosts);
    }

    for fragment in split_fragments(pattern)? {
        let Some(open) = fragment.find('[') else {
            if fragment.is_empty() || fragment.contains(']') {
                return Err(Error::InvalidHostPattern(pattern.to_string()));
            }
            hosts.push(fragment.to_string());
            continue;
        };
        let body = fragment[open + 1..]
            .strip_suffix(']')
            .ok_or_else(|| Error::InvalidHostPattern(pattern.to_string()))?;
        let prefix = &fragment[..open];

        for range in body.split(',') {
            let (start, end) = match range.split_once('-') {
                Some((start, end)) => (parse_bound(start, pattern)?, parse_bound(end, pattern)?),
                None => {
                    let bound = parse_bound(range, pattern)?;
                    (bound, bound)
                }
            };
            if start.0 > end.0 {
                return Err(Error::InvalidHostPattern(pattern.to_string()));
            }
            let width = start.1.max(end.1);
            for value in start.0..=end.0 {
                hosts.push(format!("{}{}", prefix, format_number(value, width)));
            }
        }
    }

    Ok(hosts)
}
