//! Output file-name formatting.
//!
//! Turns a resolved song plus a user template like
//! `${name} - ${singer}` into a filesystem-safe file name. Three passes:
//! placeholder substitution, `$fillLength(...)` evaluation, then invalid
//! character escaping.

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::warn;

use crate::model::Song;

/// Free-text fields longer than this are truncated before substitution.
const MAX_FIELD_LEN: usize = 128;
const TRUNCATED_LEN: usize = 125;

static FILL_LENGTH_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\$fillLength\([^)]*\)").expect("fillLength regex"));

/// Build the output file name for a song.
///
/// `index` is the song's position in the caller's save batch; it is
/// substituted verbatim, without length capping.
pub fn output_name(song: &Song, index: usize, format: &str, singer_separator: &str) -> String {
    let name = format
        .replace("${index}", &index.to_string())
        .replace("${id}", &song.display_id)
        .replace("${name}", &control_length(&song.name))
        .replace("${singer}", &control_length(&song.singer.join(singer_separator)))
        .replace("${album}", &control_length(&song.album));

    safe_filename(&resolve_fill_length(&name))
}

fn control_length(s: &str) -> String {
    if s.chars().count() > MAX_FIELD_LEN {
        let head: String = s.chars().take(TRUNCATED_LEN).collect();
        format!("{head}...")
    } else {
        s.to_string()
    }
}

/// Evaluate `$fillLength(value, padChar, targetLength)` occurrences:
/// left-pad `value` with repetitions of `padChar` until it reaches
/// `targetLength`. Malformed argument lists (wrong arity, non-integer
/// length, empty pad) are left unresolved in place.
fn resolve_fill_length(content: &str) -> String {
    let mut out = content.to_string();

    for m in FILL_LENGTH_RE.find_iter(content) {
        let raw = m.as_str();
        // Strip "$fillLength(" and ")".
        let inner = &raw["$fillLength(".len()..raw.len() - 1];
        let args: Vec<&str> = inner.split(',').collect();
        if args.len() != 3 {
            warn!(raw, "fillLength expects 3 arguments, leaving unresolved");
            continue;
        }

        let target: usize = match args[2].trim().parse() {
            Ok(n) => n,
            Err(_) => {
                warn!(raw, "fillLength length is not an integer, leaving unresolved");
                continue;
            }
        };
        let pad: Vec<char> = args[1].chars().collect();
        if pad.is_empty() {
            warn!(raw, "fillLength pad is empty, leaving unresolved");
            continue;
        }

        let mut res: Vec<char> = args[0].chars().collect();
        while res.len() < target {
            let diff = target - res.len();
            let prefix = if diff < pad.len() { &pad[..diff] } else { &pad[..] };
            let mut padded = prefix.to_vec();
            padded.extend_from_slice(&res);
            res = padded;
        }

        out = out.replace(raw, &res.into_iter().collect::<String>());
    }

    out
}

/// Escape characters that are invalid in file names on at least one of the
/// supported platforms, substituting visually similar characters where one
/// exists.
fn safe_filename(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '"' => out.push_str("''"),
            '<' => out.push('\u{02c2}'),  // modifier letter left arrowhead
            '>' => out.push('\u{02c3}'),  // modifier letter right arrowhead
            '|' => out.push('\u{2223}'),  // divides
            ':' => out.push('-'),
            '*' => out.push('\u{2217}'),  // asterisk operator
            '\\' | '/' => out.push('\u{2044}'), // fraction slash
            '\0' | '\x0c' | '?' => {}
            '\t' | '\n' | '\r' | '\x0b' => out.push(' '),
            c if c.is_control() => out.push('_'),
            c => out.push(c),
        }
    }
    out
}
