//! Extraction stage: transcribes the incoming text and page images into the
//! session's initial code buffer.

use anyhow::{Result, anyhow};
use tracing::{info, instrument, warn};

use crate::core::listing::{line_count, lines_without_numbers, normalize_listing};
use crate::core::session::{ImagePart, ListingSource, Session, SessionEvent};
use crate::io::prompt::render_extract_prompt;
use crate::io::transform::{TextTransform, TransformRequest, TransformTask};

/// Transcribe the session's inputs into its initial listing.
///
/// Fails when the session has neither text nor images, and when the
/// collaborator's reply contains no code at all. On success the normalized
/// listing becomes `session.current_code`.
#[instrument(skip_all)]
pub fn run_extraction<T: TextTransform>(transform: &T, session: &mut Session) -> Result<()> {
    let source = listing_source(session).ok_or_else(|| {
        anyhow!("nothing to extract: provide listing text or at least one page image")
    })?;

    let image_urls: Vec<String> = session.images.iter().map(ImagePart::data_url).collect();
    let prompt = render_extract_prompt(session.source_text.as_deref(), &image_urls)?;
    let reply = transform.transform(&TransformRequest {
        task: TransformTask::Extract,
        prompt,
    })?;

    let listing = normalize_listing(&reply);
    if listing.is_empty() {
        return Err(anyhow!("extraction produced no code"));
    }
    let unnumbered = lines_without_numbers(&listing);
    if !unnumbered.is_empty() {
        warn!(lines = ?unnumbered, "extracted listing has lines without line numbers");
    }

    let lines = line_count(&listing);
    session.current_code = Some(listing);
    session.push_event(SessionEvent::CodeExtracted { source, lines });
    info!(lines, source = source.as_str(), "extraction installed initial listing");
    Ok(())
}

fn listing_source(session: &Session) -> Option<ListingSource> {
    let has_text = session
        .source_text
        .as_deref()
        .is_some_and(|s| !s.trim().is_empty());
    let has_images = !session.images.is_empty();
    match (has_text, has_images) {
        (true, true) => Some(ListingSource::Both),
        (true, false) => Some(ListingSource::Text),
        (false, true) => Some(ListingSource::Images),
        (false, false) => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::ScriptedTransform;

    #[test]
    fn extraction_installs_normalized_listing() {
        let mut session = Session::new("run-1");
        session.source_text = Some("10 PRINT \"HI\"\n20 GO TO 10\n".to_string());

        let transform = ScriptedTransform::new(vec!["```\n10 PRINT \"HI\"\n20 GO TO 10\n```\n"]);
        run_extraction(&transform, &mut session).expect("extract");

        assert_eq!(
            session.current_code.as_deref(),
            Some("10 PRINT \"HI\"\n20 GO TO 10\n")
        );
        assert!(matches!(
            session.history.last().map(|e| &e.event),
            Some(SessionEvent::CodeExtracted {
                source: ListingSource::Text,
                lines: 2
            })
        ));
    }

    #[test]
    fn extraction_requires_some_input() {
        let mut session = Session::new("run-1");
        let transform = ScriptedTransform::new(vec!["10 PRINT\n"]);
        let err = run_extraction(&transform, &mut session).unwrap_err();
        assert!(err.to_string().contains("nothing to extract"));
        assert_eq!(transform.requests().len(), 0, "collaborator never called");
    }

    #[test]
    fn extraction_embeds_images_as_data_urls() {
        let mut session = Session::new("run-1");
        session.images.push(ImagePart {
            mime_type: "image/png".to_string(),
            b64: "QUJD".to_string(),
        });

        let transform = ScriptedTransform::new(vec!["10 PRINT \"HI\"\n"]);
        run_extraction(&transform, &mut session).expect("extract");

        let requests = transform.requests();
        assert!(requests[0].prompt.contains("data:image/png;base64,QUJD"));
        assert!(matches!(
            session.history.last().map(|e| &e.event),
            Some(SessionEvent::CodeExtracted {
                source: ListingSource::Images,
                ..
            })
        ));
    }

    #[test]
    fn empty_reply_is_an_error() {
        let mut session = Session::new("run-1");
        session.source_text = Some("10 PRINT\n".to_string());
        let transform = ScriptedTransform::new(vec!["\n\n"]);
        let err = run_extraction(&transform, &mut session).unwrap_err();
        assert!(err.to_string().contains("no code"));
        assert!(session.current_code.is_none());
    }
}
