//! Validation of classifier replies into typed decisions.
//!
//! The reply must be a single JSON object (optionally wrapped in a markdown
//! code fence) whose `status` and `action` fall inside the closed
//! enumerations. Anything else is a [`AppError::ClassifierParse`].

use serde::Deserialize;

use super::ClassifierReply;
use crate::models::decision::{Decision, DecisionAction, DecisionOrigin, WorkerStatus};
use crate::{AppError, Result};

/// Wire shape of a verdict. Only used inside this module.
#[derive(Debug, Deserialize)]
struct WireVerdict {
    status: String,
    action: String,
    #[serde(default)]
    keys: Option<String>,
    #[serde(default, alias = "justification")]
    reasoning: Option<String>,
    confidence: serde_json::Value,
}

/// Validate a classifier reply into a [`Decision`].
///
/// # Errors
///
/// Returns `AppError::ClassifierParse` if the text is not a JSON object of
/// the expected shape, a status or action is unrecognized, the confidence is
/// outside `0..=100`, or a `send_keys` action carries no keys.
pub fn parse_reply(reply: &ClassifierReply) -> Result<Decision> {
    let body = strip_code_fence(&reply.text);
    let wire: WireVerdict = serde_json::from_str(body)
        .map_err(|err| AppError::ClassifierParse(format!("malformed verdict JSON: {err}")))?;

    let status = WorkerStatus::parse_reported(&wire.status)
        .known()
        .map_err(|raw| AppError::ClassifierParse(format!("unrecognized status '{raw}'")))?;
    let action = DecisionAction::parse_reported(&wire.action)
        .known()
        .map_err(|raw| AppError::ClassifierParse(format!("unrecognized action '{raw}'")))?;
    let confidence = parse_confidence(&wire.confidence)?;
    let justification = wire
        .reasoning
        .ok_or_else(|| AppError::ClassifierParse("missing reasoning".into()))?;

    let keys = wire.keys.filter(|keys| !keys.is_empty());
    let keys = match action {
        DecisionAction::SendKeys if keys.is_none() => {
            return Err(AppError::ClassifierParse(
                "send_keys action without keys".into(),
            ));
        }
        DecisionAction::SendKeys | DecisionAction::Approve => keys,
        DecisionAction::Intervene | DecisionAction::None => None,
    };

    Ok(Decision {
        status,
        action,
        keys,
        justification,
        confidence,
        usage: reply.usage,
        origin: DecisionOrigin::Classifier,
    })
}

fn parse_confidence(value: &serde_json::Value) -> Result<u8> {
    let number = value
        .as_f64()
        .ok_or_else(|| AppError::ClassifierParse(format!("confidence is not a number: {value}")))?;

    if !(0.0..=100.0).contains(&number) {
        return Err(AppError::ClassifierParse(format!(
            "confidence {number} outside 0..=100"
        )));
    }

    // Range checked above.
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    Ok(number.round() as u8)
}

/// Strip a surrounding markdown code fence, if any.
fn strip_code_fence(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    // Drop the info string (e.g. `json`) on the opening line.
    let body = rest.split_once('\n').map_or("", |(_, body)| body);
    body.trim_end()
        .strip_suffix("```")
        .unwrap_or(body)
        .trim()
}
