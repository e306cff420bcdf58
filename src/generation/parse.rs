//! Turn raw provider text into a [`GeneratedQuestion`].

use serde::Deserialize;

use super::{GeneratedQuestion, GenerationError, GenerationResult};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawQuestion {
    question: String,
    correct_answer: String,
    #[serde(default)]
    incorrect_answers: Vec<String>,
}

/// Extract the JSON object from a model reply, tolerating code fences and
/// chatter around it.
fn json_body(raw: &str) -> Option<&str> {
    let start = raw.find('{')?;
    let end = raw.rfind('}')?;
    (start < end).then(|| &raw[start..=end])
}

/// Parse and validate a model reply.
///
/// Truncated or incomplete replies are reported as
/// [`GenerationError::Malformed`] so the caller can discard them.
pub fn parse_generated(raw: &str) -> GenerationResult<GeneratedQuestion> {
    let body = json_body(raw)
        .ok_or_else(|| GenerationError::Malformed("no JSON object in response".into()))?;
    let parsed: RawQuestion = serde_json::from_str(body)
        .map_err(|err| GenerationError::Malformed(format!("invalid question JSON: {err}")))?;

    let question = parsed.question.trim().to_owned();
    let correct_answer = parsed.correct_answer.trim().to_owned();
    if question.is_empty() {
        return Err(GenerationError::Malformed("empty question text".into()));
    }
    if correct_answer.is_empty() {
        return Err(GenerationError::Malformed("empty correct answer".into()));
    }

    let mut incorrect_answers: Vec<String> = Vec::new();
    for answer in parsed.incorrect_answers {
        let answer = answer.trim();
        if answer.is_empty()
            || answer.eq_ignore_ascii_case(&correct_answer)
            || incorrect_answers
                .iter()
                .any(|seen| seen.eq_ignore_ascii_case(answer))
        {
            continue;
        }
        incorrect_answers.push(answer.to_owned());
    }
    if incorrect_answers.is_empty() {
        return Err(GenerationError::Malformed(
            "no usable incorrect answers".into(),
        ));
    }
    incorrect_answers.truncate(3);

    Ok(GeneratedQuestion {
        question,
        correct_answer,
        incorrect_answers,
    })
}
