use crate::identity::VideoId;
use crate::store::TranscriptStore;
use crate::transcription::Transcript;

/// Segments ending within this many seconds past the playback position are
/// still "heard" context.
pub const LOOKAHEAD_SECS: f64 = 10.0;

/// Upper bound on the context handed to the question-answering collaborator.
pub const MAX_CONTEXT_CHARS: usize = 2000;

/// Bounded transcript context at a playback timestamp.
///
/// Unknown identifiers resolve to an empty string rather than an error;
/// the Q&A collaborator treats "no context" as answerable from nothing.
pub async fn context_at(store: &TranscriptStore, id: &VideoId, at_seconds: f64) -> String {
    match store.load(id).await {
        Ok(transcript) => window(&transcript, at_seconds),
        Err(_) => String::new(),
    }
}

/// Every segment ending at or before `at_seconds + LOOKAHEAD_SECS`, joined
/// with single spaces and truncated to the trailing `MAX_CONTEXT_CHARS`
/// characters. Keeping the tail biases context toward what was just said,
/// which is what a question mid-lecture is usually about.
pub(crate) fn window(transcript: &Transcript, at_seconds: f64) -> String {
    let cutoff = at_seconds + LOOKAHEAD_SECS;

    let joined = transcript
        .segments
        .iter()
        .filter(|seg| seg.end <= cutoff)
        .map(|seg| seg.text.as_str())
        .collect::<Vec<_>>()
        .join(" ");

    tail_chars(&joined, MAX_CONTEXT_CHARS).to_string()
}

/// Last `n` characters of a string (character count, not bytes)
fn tail_chars(s: &str, n: usize) -> &str {
    if n == 0 {
        return "";
    }
    match s.char_indices().rev().nth(n - 1) {
        Some((idx, _)) => &s[idx..],
        None => s,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transcription::Segment;

    fn transcript(ends: &[f64]) -> Transcript {
        Transcript {
            full_text: String::new(),
            segments: ends
                .iter()
                .map(|&end| Segment {
                    start: end - 1.0,
                    end,
                    text: format!("seg{}", end as u64),
                })
                .collect(),
        }
    }

    #[test]
    fn lookahead_boundary_is_inclusive() {
        // Query at 10s: the grace window reaches to 20s, so a segment
        // ending exactly at 20s is included.
        let t = transcript(&[5.0, 12.0, 20.0]);
        assert_eq!(window(&t, 10.0), "seg5 seg12 seg20");

        // One ending past the window is not.
        let t = transcript(&[5.0, 12.0, 20.5]);
        assert_eq!(window(&t, 10.0), "seg5 seg12");
    }

    #[test]
    fn early_playback_yields_empty_context() {
        let t = transcript(&[30.0, 60.0]);
        assert_eq!(window(&t, 0.0), "");
    }

    #[test]
    fn truncation_keeps_the_trailing_chars() {
        let long_text = "x".repeat(1500);
        let t = Transcript {
            full_text: String::new(),
            segments: vec![
                Segment { start: 0.0, end: 1.0, text: long_text.clone() },
                Segment { start: 1.0, end: 2.0, text: long_text },
                Segment { start: 2.0, end: 3.0, text: "TAIL".to_string() },
            ],
        };

        let ctx = window(&t, 60.0);
        assert_eq!(ctx.chars().count(), MAX_CONTEXT_CHARS);
        assert!(ctx.ends_with("TAIL"));
        // trailing truncation, so the front of the join is gone
        assert!(!ctx.starts_with("x".repeat(1500).as_str()));
    }

    #[test]
    fn tail_chars_respects_multibyte_boundaries() {
        let s = "강의 내용입니다";
        assert_eq!(tail_chars(s, 4), "내용입니다".chars().skip(1).collect::<String>());
        assert_eq!(tail_chars(s, 100), s);
        assert_eq!(tail_chars(s, 0), "");
    }

    #[tokio::test]
    async fn unknown_id_resolves_to_empty_string() {
        let dir = tempfile::tempdir().unwrap();
        let store = TranscriptStore::new(dir.path()).await.unwrap();
        let ctx = context_at(&store, &VideoId::for_url("https://example.com/none"), 10.0).await;
        assert_eq!(ctx, "");
    }
}
