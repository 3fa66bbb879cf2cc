/// Checks if a candidate string matches a shell-style glob
///
/// Supported syntax:
/// - `*` matches any run of characters, including none
/// - `?` matches exactly one character
/// - every other character matches itself
///
/// The whole candidate must be consumed, so `*.mp3` only matches strings
/// ending in `.mp3`. Matching is case-sensitive.
///
/// # Examples
///
/// ```
/// use recursive_dl::pattern::matches_glob;
///
/// assert!(matches_glob("*.mp3", "song.mp3"));
/// assert!(matches_glob("track?.flac", "track7.flac"));
/// assert!(!matches_glob("*.mp3", "song.mp3.txt"));
/// assert!(!matches_glob("*.mp3", "SONG.MP3"));
/// ```
pub fn matches_glob(pattern: &str, candidate: &str) -> bool {
    let pattern: Vec<char> = pattern.chars().collect();
    let candidate: Vec<char> = candidate.chars().collect();

    let (mut p, mut c) = (0, 0);
    // Position of the last `*` seen and the candidate index it was tried at
    let mut backtrack: Option<(usize, usize)> = None;

    while c < candidate.len() {
        match pattern.get(p) {
            Some('*') => {
                backtrack = Some((p, c));
                p += 1;
            }
            Some('?') => {
                p += 1;
                c += 1;
            }
            Some(&ch) if ch == candidate[c] => {
                p += 1;
                c += 1;
            }
            _ => match backtrack {
                Some((star, tried)) => {
                    // Let the star swallow one more character
                    p = star + 1;
                    c = tried + 1;
                    backtrack = Some((star, tried + 1));
                }
                None => return false,
            },
        }
    }

    // Trailing stars match the empty remainder
    pattern[p..].iter().all(|&ch| ch == '*')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_suffix_match() {
        assert!(matches_glob("*.mp3", "a.mp3"));
        assert!(matches_glob("*.mp3", ".mp3"));
        assert!(!matches_glob("*.mp3", "a.mp4"));
        assert!(!matches_glob("*.mp3", "a.mp3x"));
    }

    #[test]
    fn test_literal_pattern() {
        assert!(matches_glob("index.html", "index.html"));
        assert!(!matches_glob("index.html", "xindex.html"));
        assert!(!matches_glob("index.html", "index.htm"));
    }

    #[test]
    fn test_question_mark() {
        assert!(matches_glob("disc?.flac", "disc1.flac"));
        assert!(!matches_glob("disc?.flac", "disc.flac"));
        assert!(!matches_glob("disc?.flac", "disc12.flac"));
    }

    #[test]
    fn test_multiple_stars_backtrack() {
        assert!(matches_glob("*-live-*.flac", "band-live-1999.flac"));
        assert!(matches_glob("*a*b", "xxaxxab"));
        assert!(!matches_glob("*a*b", "xxaxxa"));
        assert!(matches_glob("**.ogg", "x.ogg"));
    }

    #[test]
    fn test_star_alone() {
        assert!(matches_glob("*", ""));
        assert!(matches_glob("*", "anything at all"));
    }

    #[test]
    fn test_empty_candidate() {
        assert!(!matches_glob("*.mp3", ""));
        assert!(matches_glob("", ""));
        assert!(!matches_glob("", "a"));
    }

    #[test]
    fn test_case_sensitivity() {
        assert!(!matches_glob("*.flac", "a.FLAC"));
        assert!(matches_glob("*.FLAC", "a.FLAC"));
    }

    #[test]
    fn test_unicode() {
        assert!(matches_glob("*.mp3", "café.mp3"));
        assert!(matches_glob("caf?.mp3", "café.mp3"));
    }
}
