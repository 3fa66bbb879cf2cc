//! Download file naming
//!
//! A file is named after the `Content-Disposition` filename when the server
//! sends one, otherwise after the last segment of its URL. Names are made
//! safe for common filesystems and then de-duplicated across the batch so
//! that two URLs never write to the same file.

use crate::pattern::match_subject;
use sha2::{Digest, Sha256};
use std::collections::HashSet;
use url::Url;

/// Characters replaced by `_` in file names
const UNSAFE_CHARS: &[char] = &['<', '>', ':', '"', '/', '\\', '|', '?', '*'];

/// Hex characters of the URL hash used for disambiguation
const HASH_LEN: usize = 8;

/// Returns the hex SHA-256 of a URL
pub fn url_digest(url: &Url) -> String {
    hex::encode(Sha256::digest(url.as_str().as_bytes()))
}

/// Returns the short hash used in generated names
pub fn url_hash(url: &Url) -> String {
    let digest = url_digest(url);
    digest[..HASH_LEN].to_string()
}

/// Extracts the filename from a `Content-Disposition` header value
///
/// The RFC 5987 `filename*` form wins over plain `filename`.
///
/// # Examples
///
/// ```
/// use recursive_dl::download::filename_from_disposition;
///
/// assert_eq!(
///     filename_from_disposition(r#"attachment; filename="Track 01.flac""#).as_deref(),
///     Some("Track 01.flac")
/// );
/// assert_eq!(
///     filename_from_disposition("attachment; filename*=UTF-8''caf%C3%A9.mp3").as_deref(),
///     Some("café.mp3")
/// );
/// assert_eq!(filename_from_disposition("inline"), None);
/// ```
pub fn filename_from_disposition(header: &str) -> Option<String> {
    let mut plain = None;
    let mut extended = None;

    for param in split_params(header).into_iter().skip(1) {
        let Some((key, value)) = param.split_once('=') else {
            continue;
        };
        let key = key.trim().to_ascii_lowercase();
        let value = value.trim();

        match key.as_str() {
            "filename*" => {
                // charset'language'percent-encoded
                let encoded = value.splitn(3, '\'').nth(2).unwrap_or(value);
                if let Ok(decoded) = urlencoding::decode(encoded) {
                    extended = Some(decoded.into_owned());
                }
            }
            "filename" => {
                plain = Some(value.trim_matches(|c| c == '"' || c == '\'').to_string());
            }
            _ => {}
        }
    }

    extended.or(plain).filter(|name| !name.trim().is_empty())
}

/// Splits a header value on `;`, ignoring separators inside double quotes
fn split_params(header: &str) -> Vec<&str> {
    let mut params = Vec::new();
    let mut start = 0;
    let mut quoted = false;
    let mut escaped = false;

    for (i, c) in header.char_indices() {
        match c {
            _ if escaped => escaped = false,
            '\\' if quoted => escaped = true,
            '"' => quoted = !quoted,
            ';' if !quoted => {
                params.push(&header[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    params.push(&header[start..]);
    params
}

/// Makes a file name safe to create in the output directory
///
/// Path separators, reserved characters and control characters become `_`;
/// leading and trailing dots and whitespace are dropped. May return an empty
/// string.
pub fn sanitize_filename(raw: &str) -> String {
    let replaced: String = raw
        .chars()
        .map(|c| {
            if UNSAFE_CHARS.contains(&c) || c.is_control() {
                '_'
            } else {
                c
            }
        })
        .collect();

    replaced
        .trim_matches(|c: char| c == '.' || c.is_whitespace())
        .to_string()
}

/// Picks the base name for a URL before de-duplication
///
/// Uses the server-supplied name if given, otherwise the decoded final URL
/// segment. Falls back to `file-<hash>` when nothing usable remains.
pub fn base_name(url: &Url, disposition: Option<&str>) -> String {
    let candidate = disposition
        .map(sanitize_filename)
        .filter(|name| !name.is_empty())
        .unwrap_or_else(|| sanitize_filename(&match_subject(url)));

    if candidate.is_empty() {
        format!("file-{}", url_hash(url))
    } else {
        candidate
    }
}

/// Inserts `-<hash>` between the stem and the extension of a name
fn with_hash(name: &str, hash: &str) -> String {
    match name.rfind('.') {
        Some(dot) if dot > 0 => format!("{}-{}{}", &name[..dot], hash, &name[dot..]),
        _ => format!("{}-{}", name, hash),
    }
}

/// Resolves name clashes across a batch
///
/// Entries are processed in URL order. The first URL claiming a name keeps
/// it; later ones get the short URL hash spliced in before the extension.
/// Names are compared case-insensitively so the result is also safe on
/// case-folding filesystems. The returned list is sorted by URL.
///
/// # Examples
///
/// ```
/// use recursive_dl::download::assign_names;
/// use url::Url;
///
/// let a = Url::parse("https://example.com/a/song.mp3").unwrap();
/// let b = Url::parse("https://example.com/b/song.mp3").unwrap();
/// let named = assign_names(vec![
///     (b.clone(), "song.mp3".to_string()),
///     (a.clone(), "song.mp3".to_string()),
/// ]);
///
/// assert_eq!(named[0], (a, "song.mp3".to_string()));
/// assert!(named[1].1.starts_with("song-") && named[1].1.ends_with(".mp3"));
/// ```
pub fn assign_names(mut entries: Vec<(Url, String)>) -> Vec<(Url, String)> {
    entries.sort_by(|a, b| a.0.cmp(&b.0));

    let mut claimed: HashSet<String> = HashSet::new();
    let mut named = Vec::with_capacity(entries.len());

    for (url, name) in entries {
        let mut chosen = name.clone();
        if claimed.contains(&chosen.to_lowercase()) {
            let digest = url_digest(&url);
            let mut len = HASH_LEN;
            chosen = with_hash(&name, &digest[..len]);
            while claimed.contains(&chosen.to_lowercase()) && len < digest.len() {
                len = (len * 2).min(digest.len());
                chosen = with_hash(&name, &digest[..len]);
            }
        }

        claimed.insert(chosen.to_lowercase());
        named.push((url, chosen));
    }

    named
}
