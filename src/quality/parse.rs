//! Reading a score out of whatever the model said.
//!
//! Models are asked for JSON but do not always comply, so the parser
//! falls back through progressively looser forms. The outcome is a tagged
//! value; "the model said something odd" is an expected case, not an error.

use once_cell::sync::Lazy;
use regex::Regex;

pub const MIN_SCORE: i64 = 1;
pub const MAX_SCORE: i64 = 10;

static LABELED: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(?:rating|score|quality)\b[^0-9\n-]{0,12}(-?\d+(?:\.\d+)?)")
        .expect("valid regex")
});

static OUT_OF_TEN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(-?\d+(?:\.\d+)?)\s*(?:/|\bout\s+of)\s*10\b").expect("valid regex")
});

/// The scale itself ("1 to 10", "1-10"), never the score.
static SCALE_RANGE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b\d+(?:\.\d+)?\s*(?:-|–|—|\bto\b)\s*10\b").expect("valid regex")
});

static FIRST_NUMBER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"-?\d+(?:\.\d+)?").expect("valid regex"));

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RatingParse {
    Parsed {
        /// Always within 1..=10
        score: u8,
        feedback: String,
        /// The value the model gave when it had to be clamped
        clamped_from: Option<i64>,
    },
    Unparseable {
        raw: String,
    },
}

/// Remove a surrounding ```json ... ``` fence.
fn strip_fence(text: &str) -> &str {
    let text = text.trim();
    let text = text
        .strip_prefix("```json")
        .or_else(|| text.strip_prefix("```"))
        .unwrap_or(text);
    text.strip_suffix("```").unwrap_or(text).trim()
}

fn number_to_i64(text: &str) -> Option<i64> {
    let value: f64 = text.parse().ok()?;
    if !value.is_finite() {
        return None;
    }
    Some(value.round().clamp(i64::MIN as f64, i64::MAX as f64) as i64)
}

fn json_number(value: &serde_json::Value) -> Option<i64> {
    match value {
        serde_json::Value::Number(n) => n.as_i64().or_else(|| {
            n.as_f64()
                .filter(|f| f.is_finite())
                .map(|f| f.round() as i64)
        }),
        serde_json::Value::String(s) => number_to_i64(s.trim()),
        _ => None,
    }
}

/// `{"rating": n, "feedback": "..."}`, possibly wrapped in prose.
fn parse_json(text: &str) -> Option<(i64, Option<String>)> {
    let candidate = strip_fence(text);
    let object = serde_json::from_str::<serde_json::Value>(candidate)
        .ok()
        .or_else(|| {
            let start = candidate.find('{')?;
            let end = candidate.rfind('}')?;
            if end <= start {
                return None;
            }
            serde_json::from_str::<serde_json::Value>(&candidate[start..=end]).ok()
        })?;

    let object = object.as_object()?;
    let score = ["rating", "score", "quality"]
        .iter()
        .find_map(|key| object.get(*key).and_then(json_number))?;
    let feedback = object
        .get("feedback")
        .and_then(|f| f.as_str())
        .map(|f| f.trim().to_string())
        .filter(|f| !f.is_empty());

    Some((score, feedback))
}

fn parse_text(text: &str) -> Option<i64> {
    let text = SCALE_RANGE.replace_all(text, " ");
    let text = text.as_ref();
    [&*LABELED, &*OUT_OF_TEN]
        .iter()
        .find_map(|re| re.captures(text).and_then(|c| number_to_i64(&c[1])))
        .or_else(|| {
            FIRST_NUMBER
                .find(text)
                .and_then(|m| number_to_i64(m.as_str()))
        })
}

/// Find the score in a rating response.
///
/// Tried in order: a JSON object with `rating`/`score`, a labeled number
/// (`Rating: 7`), an `N/10` or `N out of 10` form, the first number in the
/// text. Scale descriptions such as "1 to 10" or "1-10" are ignored by the
/// text forms. Decimals are rounded half away from zero, so 7.5 becomes 8
/// and 7.4 becomes 7. Values outside 1..=10 are then clamped. Feedback is
/// the JSON `feedback` field when there is one, otherwise the whole
/// response.
pub fn parse_rating(raw: &str) -> RatingParse {
    let trimmed = raw.trim();

    let (value, feedback) = match parse_json(trimmed) {
        Some((value, feedback)) => (Some(value), feedback),
        None => (parse_text(trimmed), None),
    };

    let value = match value {
        Some(value) => value,
        None => {
            return RatingParse::Unparseable {
                raw: raw.to_string(),
            }
        }
    };

    let score = value.clamp(MIN_SCORE, MAX_SCORE);
    RatingParse::Parsed {
        score: score as u8,
        feedback: feedback.unwrap_or_else(|| trimmed.to_string()),
        clamped_from: (score != value).then_some(value),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parsed(raw: &str) -> (u8, String, Option<i64>) {
        match parse_rating(raw) {
            RatingParse::Parsed {
                score,
                feedback,
                clamped_from,
            } => (score, feedback, clamped_from),
            RatingParse::Unparseable { raw } => panic!("unparseable: {raw:?}"),
        }
    }

    #[test]
    fn test_leading_integer_keeps_full_text() {
        let (score, feedback, clamped) = parsed("I'd say 7 — decent coverage.");
        assert_eq!(score, 7);
        assert_eq!(feedback, "I'd say 7 — decent coverage.");
        assert_eq!(clamped, None);
    }

    #[test]
    fn test_no_integer_is_unparseable() {
        assert_eq!(
            parse_rating("Great note!"),
            RatingParse::Unparseable {
                raw: "Great note!".to_string()
            }
        );
        assert!(matches!(parse_rating(""), RatingParse::Unparseable { .. }));
    }

    #[test]
    fn test_json_object() {
        let (score, feedback, _) =
            parsed(r#"{"rating": 9, "feedback": "Add an example to illustrate the concepts."}"#);
        assert_eq!(score, 9);
        assert_eq!(feedback, "Add an example to illustrate the concepts.");
    }

    #[test]
    fn test_fenced_json_and_string_rating() {
        let (score, feedback, _) = parsed("```json\n{\"rating\": \"6\", \"feedback\": \"Link sources.\"}\n```");
        assert_eq!(score, 6);
        assert_eq!(feedback, "Link sources.");
    }

    #[test]
    fn test_json_inside_prose() {
        let (score, feedback, _) = parsed("Here you go: {\"score\": 4, \"feedback\": \"Too short.\"} Hope it helps");
        assert_eq!(score, 4);
        assert_eq!(feedback, "Too short.");
    }

    #[test]
    fn test_json_without_feedback_uses_text() {
        let (score, feedback, _) = parsed(r#"{"rating": 5}"#);
        assert_eq!(score, 5);
        assert_eq!(feedback, r#"{"rating": 5}"#);
    }

    #[test]
    fn test_labeled_beats_first_number() {
        let (score, _, _) = parsed("On a 1-10 scale.\n**Rating:** 8\nFeedback: more detail");
        assert_eq!(score, 8);
    }

    #[test]
    fn test_out_of_ten() {
        let (score, _, _) = parsed("Considering 3 aspects, this is a solid 6/10.");
        assert_eq!(score, 6);
    }

    #[test]
    fn test_out_of_range_is_clamped() {
        assert_eq!(parsed("Rating: 12").0, 10);
        assert_eq!(parsed("Rating: 12").2, Some(12));
        assert_eq!(parsed("score: 0").0, 1);
        assert_eq!(parsed(r#"{"rating": -3, "feedback": "x"}"#).2, Some(-3));
    }

    #[test]
    fn test_scale_description_is_not_the_score() {
        let text = "On a scale of 1 to 10, I'd give this note a 7. Add examples.";
        let (score, feedback, clamped) = parsed(text);
        assert_eq!(score, 7);
        assert_eq!(feedback, text);
        assert_eq!(clamped, None);

        assert_eq!(parsed("Using a 1-10 scale, this earns 4.").0, 4);
        assert_eq!(parsed("Scale 1–10: I'd go with 6").0, 6);
        assert_eq!(parsed("From 1 TO 10 it is a 3").0, 3);
    }

    #[test]
    fn test_out_of_ten_words() {
        assert_eq!(parsed("I would give it 7 out of 10, it lacks sources.").0, 7);
        assert_eq!(parsed("Across 2 sections: 5 Out Of 10").0, 5);
    }

    #[test]
    fn test_decimal_rounds() {
        assert_eq!(parsed("Rating: 7.6").0, 8);
        assert_eq!(parsed("Rating: 7.5").0, 8);
        assert_eq!(parsed("Rating: 7.4").0, 7);
        assert_eq!(parsed(r#"{"rating": 6.5}"#).0, 7);
    }
}
