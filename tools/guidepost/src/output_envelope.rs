use crate::errors::GuidepostError;
use crate::submission::Submission;
use serde::{Deserialize, Serialize};

pub const START_MARKER: &str = "<<GUIDEPOST_JSON_START>>";
pub const END_MARKER: &str = "<<GUIDEPOST_JSON_END>>";
pub const SCHEMA_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputEnvelope {
    pub schema_version: u32,
    pub task_title: String,
    pub responses: Submission,
}

pub fn render_envelope(task_title: &str, responses: &Submission) -> Result<String, GuidepostError> {
    let envelope = OutputEnvelope {
        schema_version: SCHEMA_VERSION,
        task_title: task_title.to_string(),
        responses: responses.clone(),
    };
    let body = serde_json::to_string(&envelope)
        .map_err(|e| GuidepostError::OutputEnvelope(e.to_string()))?;
    Ok(format!("{START_MARKER}\n{body}\n{END_MARKER}"))
}

pub fn parse_last_envelope(raw_text: &str) -> Result<OutputEnvelope, GuidepostError> {
    let start = raw_text
        .rfind(START_MARKER)
        .ok_or_else(|| GuidepostError::OutputEnvelope("missing start marker".to_string()))?;
    let end = raw_text
        .rfind(END_MARKER)
        .ok_or_else(|| GuidepostError::OutputEnvelope("missing end marker".to_string()))?;

    if end <= start {
        return Err(GuidepostError::OutputEnvelope(
            "end marker appears before start marker".to_string(),
        ));
    }

    let body_start = start + START_MARKER.len();
    let body = raw_text[body_start..end].trim();

    let envelope: OutputEnvelope = serde_json::from_str(body)
        .map_err(|e| GuidepostError::OutputEnvelope(format!("invalid json: {e}")))?;

    if envelope.schema_version != SCHEMA_VERSION {
        return Err(GuidepostError::OutputEnvelope(
            "schema_version must be 1".to_string(),
        ));
    }

    if envelope.responses.entries().len() != 4 {
        return Err(GuidepostError::OutputEnvelope(format!(
            "expected 4 responses, got {}",
            envelope.responses.entries().len()
        )));
    }

    Ok(envelope)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::draft::ResponseDraft;
    use crate::types::TaskSuccess;

    fn submission() -> Submission {
        Submission::from_draft(&ResponseDraft {
            task_success: Some(TaskSuccess::Yes),
            difficulty: Some(2),
            confusing: "filters".to_string(),
            worked_well: "search".to_string(),
        })
        .expect("complete")
    }

    #[test]
    fn parses_the_last_envelope_in_noisy_output() {
        let first = render_envelope("old", &submission()).expect("render");
        let second = render_envelope("Checkout flow", &submission()).expect("render");
        let raw = format!("banner\n{first}\nnoise\n{second}\ntrailer");
        let envelope = parse_last_envelope(&raw).expect("parse");
        assert_eq!(envelope.task_title, "Checkout flow");
        assert_eq!(envelope.responses, submission());
    }

    #[test]
    fn rejects_missing_markers_and_bad_versions() {
        let err = parse_last_envelope("no markers here").expect_err("missing");
        assert!(matches!(err, GuidepostError::OutputEnvelope(message) if message.contains("start marker")));

        let raw = format!("{START_MARKER}{{\"schema_version\":2,\"task_title\":\"t\",\"responses\":[]}}{END_MARKER}");
        let err = parse_last_envelope(&raw).expect_err("version");
        assert!(matches!(err, GuidepostError::OutputEnvelope(message) if message.contains("schema_version")));

        let raw = format!("{END_MARKER} {START_MARKER}");
        assert!(parse_last_envelope(&raw).is_err());
    }
}
