//! Prompt rendering for the transform collaborators.

use anyhow::Result;
use minijinja::{Environment, context};

const EXTRACT_TEMPLATE: &str = include_str!("prompts/extract.md");
const CORRECT_TEMPLATE: &str = include_str!("prompts/correct.md");
const SUMMARY_TEMPLATE: &str = include_str!("prompts/summary.md");

/// Template engine wrapper around minijinja.
struct PromptEngine {
    env: Environment<'static>,
}

impl PromptEngine {
    fn new() -> Self {
        let mut env = Environment::new();
        env.add_template("extract", EXTRACT_TEMPLATE)
            .expect("extract template should be valid");
        env.add_template("correct", CORRECT_TEMPLATE)
            .expect("correct template should be valid");
        env.add_template("summary", SUMMARY_TEMPLATE)
            .expect("summary template should be valid");
        Self { env }
    }
}

/// Build the transcription prompt from the raw input text and the uploaded
/// pages rendered as data URLs.
pub fn render_extract_prompt(source_text: Option<&str>, image_urls: &[String]) -> Result<String> {
    let engine = PromptEngine::new();
    let template = engine.env.get_template("extract")?;
    let rendered = template.render(context! {
        source_text => source_text.map(str::trim).filter(|s| !s.is_empty()),
        images => image_urls,
    })?;
    Ok(rendered)
}

/// Build the correction prompt from the current listing and the assembler
/// diagnostic, passed through verbatim.
pub fn render_correct_prompt(current_code: &str, validation_errors: &str) -> Result<String> {
    let engine = PromptEngine::new();
    let template = engine.env.get_template("correct")?;
    let rendered = template.render(context! {
        current_code => current_code.trim_end(),
        validation_errors => validation_errors.trim(),
    })?;
    Ok(rendered)
}

/// Build the closing-report prompt from the final listing, the rendered
/// session log, and the published URL.
pub fn render_summary_prompt(
    current_code: &str,
    history_log: &str,
    tap_public_url: &str,
) -> Result<String> {
    let engine = PromptEngine::new();
    let template = engine.env.get_template("summary")?;
    let rendered = template.render(context! {
        current_code => current_code.trim_end(),
        history_log => history_log.trim_end(),
        tap_public_url => tap_public_url,
    })?;
    Ok(rendered)
}
