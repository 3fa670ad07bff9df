//! Upload intake: turns incoming image payloads into session state.
//!
//! Payloads arrive either as raw bytes (files read from disk) or as base64
//! text from an upstream client, possibly wrapped in a `data:` URL and
//! possibly missing its padding. Intake repairs what it can, skips what it
//! cannot, and stores clean re-encoded base64 in the session so every later
//! stage sees one canonical form.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use tracing::{debug, instrument, warn};

use crate::core::session::{ImagePart, Session, SessionEvent};

/// One incoming upload part, before decoding.
#[derive(Debug, Clone)]
pub struct UploadPart {
    pub mime_type: String,
    pub data: UploadData,
}

/// Payload encodings accepted from upstream.
#[derive(Debug, Clone)]
pub enum UploadData {
    /// Raw image bytes.
    Raw(Vec<u8>),
    /// Base64 text, optionally with a `data:` URL wrapper and missing
    /// padding.
    B64(String),
}

/// Decode a base64 payload, stripping any `data:` URL wrapper and repairing
/// missing padding.
pub fn decode_b64_payload(payload: &str) -> Result<Vec<u8>> {
    let body = match payload.strip_prefix("data:") {
        Some(rest) => match rest.split_once(',') {
            Some((_, data)) => data,
            None => payload,
        },
        None => payload,
    };

    let mut body = body.trim().to_string();
    let rem = body.len() % 4;
    if rem != 0 {
        body.push_str(&"=".repeat(4 - rem));
    }
    STANDARD
        .decode(body.as_bytes())
        .context("decode base64 image payload")
}

/// Decode a fresh set of uploads into the session.
///
/// All previously stored upload state is cleared first, so a run can never
/// observe a stale image from an earlier request. Non-image parts and parts
/// whose payload will not decode are skipped with a warning. Returns how
/// many parts were kept.
#[instrument(skip_all, fields(parts = parts.len()))]
pub fn intake_uploads(session: &mut Session, parts: &[UploadPart]) -> usize {
    session.clear_uploads();

    let mut kept = 0usize;
    for (i, part) in parts.iter().enumerate() {
        if !part.mime_type.starts_with("image/") {
            debug!(part = i, mime = %part.mime_type, "skipping non-image part");
            continue;
        }
        let bytes = match &part.data {
            UploadData::Raw(bytes) => bytes.clone(),
            UploadData::B64(text) => match decode_b64_payload(text) {
                Ok(bytes) => bytes,
                Err(err) => {
                    warn!(part = i, err = %err, "skipping undecodable image part");
                    continue;
                }
            },
        };
        session.images.push(ImagePart {
            mime_type: part.mime_type.clone(),
            b64: STANDARD.encode(&bytes),
        });
        kept += 1;
    }

    if kept > 0 {
        session.push_event(SessionEvent::ImagesReceived { count: kept });
    }
    debug!(kept, "upload intake finished");
    kept
}

/// Read image files from disk into upload parts, guessing the MIME type from
/// each extension.
pub fn load_upload_parts(paths: &[PathBuf]) -> Result<Vec<UploadPart>> {
    let mut parts = Vec::with_capacity(paths.len());
    for path in paths {
        let bytes = fs::read(path).with_context(|| format!("read image {}", path.display()))?;
        parts.push(UploadPart {
            mime_type: mime_for_extension(path),
            data: UploadData::Raw(bytes),
        });
    }
    Ok(parts)
}

fn mime_for_extension(path: &Path) -> String {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase);
    match ext.as_deref() {
        Some("png") => "image/png",
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("gif") => "image/gif",
        Some("bmp") => "image/bmp",
        Some("webp") => "image/webp",
        _ => "application/octet-stream",
    }
    .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decode_strips_data_url_wrapper() {
        let decoded = decode_b64_payload("data:image/png;base64,QUJD").expect("decode");
        assert_eq!(decoded, b"ABC");
    }

    #[test]
    fn decode_repairs_missing_padding() {
        // "QUJDRA" is "ABCD" minus its "==" padding.
        let decoded = decode_b64_payload("QUJDRA").expect("decode");
        assert_eq!(decoded, b"ABCD");
    }

    #[test]
    fn decode_rejects_garbage() {
        assert!(decode_b64_payload("data:image/png;base64,@@@@").is_err());
    }

    #[test]
    fn intake_clears_previous_uploads_first() {
        let mut session = Session::new("run-1");
        session.images.push(ImagePart {
            mime_type: "image/png".to_string(),
            b64: "c3RhbGU=".to_string(),
        });

        let kept = intake_uploads(
            &mut session,
            &[UploadPart {
                mime_type: "image/jpeg".to_string(),
                data: UploadData::Raw(b"fresh".to_vec()),
            }],
        );

        assert_eq!(kept, 1);
        assert_eq!(session.images.len(), 1);
        assert_eq!(session.images[0].mime_type, "image/jpeg");
    }

    #[test]
    fn intake_skips_bad_parts_and_keeps_good_ones() {
        let mut session = Session::new("run-1");
        let parts = vec![
            UploadPart {
                mime_type: "text/plain".to_string(),
                data: UploadData::Raw(b"not an image".to_vec()),
            },
            UploadPart {
                mime_type: "image/png".to_string(),
                data: UploadData::B64("@@@@".to_string()),
            },
            UploadPart {
                mime_type: "image/png".to_string(),
                data: UploadData::B64("QUJD".to_string()),
            },
        ];

        let kept = intake_uploads(&mut session, &parts);
        assert_eq!(kept, 1);
        assert_eq!(session.images[0].b64, "QUJD");
    }

    #[test]
    fn intake_of_nothing_records_no_event() {
        let mut session = Session::new("run-1");
        assert_eq!(intake_uploads(&mut session, &[]), 0);
        assert!(session.history.is_empty());
    }

    #[test]
    fn mime_guess_covers_common_scans() {
        assert_eq!(mime_for_extension(Path::new("page.PNG")), "image/png");
        assert_eq!(mime_for_extension(Path::new("page.jpeg")), "image/jpeg");
        assert_eq!(
            mime_for_extension(Path::new("page.tapdump")),
            "application/octet-stream"
        );
    }
}
