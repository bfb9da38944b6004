//! Generation orchestrator: job post in, application draft out.
//!
//! Stateless request/response transform over the store and the chat model:
//! retrieve top-k relevant chunks, build one prompt, issue one low-temperature
//! chat completion, and coerce the response into the draft schema. A response
//! that cannot be coerced degrades to [`ApplicationDraft::Raw`] — a
//! generation failure must always be visible to the caller, never silently
//! dropped.

use anyhow::Result;

use crate::extract::{extract_json, normalize_draft};
use crate::models::ApplicationDraft;
use crate::ollama::{ChatModel, Embedder};
use crate::search::search;
use crate::store::Store;

/// Visible separator between retrieved chunks in the context block.
const CONTEXT_SEPARATOR: &str = "\n\n---\n\n";

pub const SYSTEM_PROMPT: &str = "You tailor job applications using the user's materials. \
Be concise, include measurable achievements, keep facts truthful, avoid cliches.";

fn build_user_prompt(job_post: &str, context: &str) -> String {
    format!(
        r#"You are given a NEW JOB POST and a set of RELEVANT MATERIAL (snippets from my past applications/CV).
Return a STRICT JSON object with EXACTLY these keys:

{{
  "cover_letter_markdown": string,
  "cv_bullets": ["..."],
  "ats_report": {{
    "covered": ["..."],
    "missing": ["..."]
  }}
}}

Rules:
- Output ONLY valid JSON (no markdown fences).
- cover_letter_markdown: 250-350 words, Markdown, no salutations beyond Dear Hiring Manager.
- cv_bullets: 6-10 concise bullets with metrics.
- ats_report.covered: job keywords present in the draft; ats_report.missing: important job keywords not covered.
- Keep facts accurate and aligned with RELEVANT MATERIAL.

NEW JOB POST:
{job_post}

RELEVANT MATERIAL (top matches from user's past applications/CV):
{context}
"#
    )
}

/// Draft application materials for `job_post` from the `top_k` most
/// relevant stored chunks. Safe to call repeatedly and concurrently — no
/// shared mutable state beyond the store itself.
pub async fn generate(
    store: &Store,
    embedder: &dyn Embedder,
    chat: &dyn ChatModel,
    job_post: &str,
    top_k: usize,
) -> Result<ApplicationDraft> {
    let hits = search(store, embedder, job_post, top_k).await?;
    let context: Vec<&str> = hits.iter().map(|hit| hit.text.as_str()).collect();
    let prompt = build_user_prompt(job_post, &context.join(CONTEXT_SEPARATOR));

    let raw = chat.chat(SYSTEM_PROMPT, &prompt).await?;
    Ok(finish_draft(raw))
}

/// Coerce raw model output into a draft, or fall back to the raw text so
/// the human can still read something.
pub fn finish_draft(raw: String) -> ApplicationDraft {
    match extract_json(&raw).and_then(normalize_draft) {
        Some(draft) => ApplicationDraft::Structured(draft),
        None => ApplicationDraft::Raw { raw },
    }
}
