//! services/api/src/intake/mod.rs
//!
//! The client-side intake pipeline: validate each upload, compress it, and
//! encode it as an inline attachment, then assemble the outbound user
//! message. Files are processed concurrently and partial failures reject
//! only the offending file.

pub mod compressor;
pub mod validator;

pub use compressor::{compress, CompressError, CompressedImage, OUTPUT_CONTENT_TYPE};
pub use validator::{validate, UploadCandidate, UploadRejection, MAX_UPLOAD_BYTES};

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use coffee_analysis_core::domain::{Attachment, ChatMessage, Role};
use tracing::warn;

/// Maximum number of attachments on a single message.
pub const MAX_ATTACHMENTS: usize = 5;

/// The prompt sent when the user submits images without any text. It asks
/// the model for the NODE validation step, the roast-circle reading, and a
/// sales-quality description, in the phrasing the extraction engine is
/// tuned for.
pub const ANALYSIS_PROMPT: &str = r#"The image uploaded is a coffee bean product sold by the artisanal coffee shop called NODE COFFEE ROASTERS.

STEP 1 - VALIDATION:
If the NODE logo (dark navy blue, circular, around center of the package) is not present, respond with: "Please take a picture of a product sold by NODE COFFEE ROASTERS."

STEP 2 - ROAST LEVEL ANALYSIS (CRITICAL):
Locate the roast level indicator - a horizontal row of 5 circles positioned between the words "LIGHT" and "DARK" on the package.

Examine each circle from LEFT to RIGHT:
- Filled circles appear DARK/BLACK/SOLID
- Unfilled circles appear WHITE/LIGHT with just an outline
- Count ONLY the consecutive filled circles starting from the left

Report your findings as:
"Circle analysis: [describe what you see for each of the 5 positions]"
"Roast level: X/5"

STEP 3 - COMPLETE ANALYSIS:
Provide a concise expert description suitable for selling to customers, written as a coffee professional would describe it.

Include these metrics:
- Roast Profile: X/5 (already determined above)
- Tasting Notes: [extract from package text]
- Origin: [extract from package text]"#;

/// Why a single file was dropped from the batch.
#[derive(Debug, thiserror::Error)]
pub enum IntakeError {
    #[error(transparent)]
    Rejected(#[from] UploadRejection),
    #[error(transparent)]
    Compress(#[from] CompressError),
    #[error("Too many files: at most {MAX_ATTACHMENTS} attachments per message")]
    TooManyFiles,
}

/// The result of preparing a batch of uploads: successfully encoded
/// attachments in submission order, plus the per-file failures.
#[derive(Debug, Default)]
pub struct IntakeOutcome {
    pub attachments: Vec<Attachment>,
    pub rejected: Vec<(String, IntakeError)>,
}

fn prepare_one(candidate: UploadCandidate) -> Result<Attachment, IntakeError> {
    validate(&candidate)?;
    let compressed = compress(&candidate.data)?;
    Ok(Attachment {
        name: candidate.file_name,
        content_type: OUTPUT_CONTENT_TYPE.to_string(),
        url: format!(
            "data:{};base64,{}",
            OUTPUT_CONTENT_TYPE,
            BASE64.encode(&compressed.data)
        ),
    })
}

/// Validates and compresses every candidate concurrently, awaiting all of
/// them before the message is constructed. One invalid file among several
/// rejects only that file; the rest proceed.
pub async fn prepare_attachments(candidates: Vec<UploadCandidate>) -> IntakeOutcome {
    let mut outcome = IntakeOutcome::default();

    let mut tasks = Vec::new();
    for (index, candidate) in candidates.into_iter().enumerate() {
        let file_name = candidate.file_name.clone();
        if index >= MAX_ATTACHMENTS {
            outcome.rejected.push((file_name, IntakeError::TooManyFiles));
            continue;
        }
        // Decode/encode is CPU-bound; run off the async pool.
        tasks.push((
            file_name,
            tokio::task::spawn_blocking(move || prepare_one(candidate)),
        ));
    }

    for (file_name, task) in tasks {
        match task.await {
            Ok(Ok(attachment)) => outcome.attachments.push(attachment),
            Ok(Err(e)) => {
                warn!(file = %file_name, error = %e, "upload rejected during intake");
                outcome.rejected.push((file_name, e));
            }
            Err(e) => {
                warn!(file = %file_name, error = %e, "intake task failed");
                outcome.rejected.push((
                    file_name,
                    IntakeError::Compress(CompressError::Decode(image::ImageError::IoError(
                        std::io::Error::other(e.to_string()),
                    ))),
                ));
            }
        }
    }

    outcome
}

/// Assembles the outbound user message. When the user supplied no text but
/// did attach images, the canonical analysis prompt is substituted.
pub fn build_user_message(text: &str, attachments: Vec<Attachment>) -> ChatMessage {
    let content = if text.trim().is_empty() && !attachments.is_empty() {
        ANALYSIS_PROMPT.to_string()
    } else {
        text.to_string()
    };
    ChatMessage {
        role: Role::User,
        content,
        attachments,
    }
}
