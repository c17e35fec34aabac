//! Turning a finished assistant message into something a user can see.

use parley_assistant::types::{Annotation, Message, MessageContent};
use parley_assistant::AssistantApi;

/// A downloadable output of the assistant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attachment {
    pub name: String,
    pub bytes: Vec<u8>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Reply {
    pub text: String,
    pub files: Vec<Attachment>,
    pub images: Vec<Attachment>,
}

/// Render `message` block by block.
///
/// Text is concatenated in order. `file_path` annotations and image blocks are
/// downloaded; a download that fails is logged and left out of the reply.
pub async fn render(api: &dyn AssistantApi, message: &Message) -> Reply {
    let mut reply = Reply::default();

    for block in &message.content {
        match block {
            MessageContent::Text { text } => {
                reply.text.push_str(&text.value);
                for annotation in &text.annotations {
                    let Annotation::FilePath { text, file_path } = annotation else {
                        continue;
                    };
                    match api.file_content(&file_path.file_id).await {
                        Ok(bytes) => reply.files.push(Attachment {
                            name: attachment_name(text, &file_path.file_id),
                            bytes,
                        }),
                        Err(e) => tracing::warn!(
                            file_id = %file_path.file_id,
                            error = %e,
                            "failed to download generated file"
                        ),
                    }
                }
            }
            MessageContent::ImageFile { image_file } => {
                let file_id = &image_file.file_id;
                match api.file_content(file_id).await {
                    Ok(bytes) => {
                        let name = format!("{file_id}.png");
                        reply.text.push_str(&format!("[Image generated: {name}]\n"));
                        reply.images.push(Attachment { name, bytes });
                    }
                    Err(e) => tracing::warn!(
                        file_id = %file_id,
                        error = %e,
                        "failed to download generated image"
                    ),
                }
            }
            MessageContent::Unsupported => {
                tracing::debug!(message_id = %message.id, "skipping unsupported content block");
            }
        }
    }

    reply
}

/// Last `/`-separated segment of the annotation text, else the file id.
fn attachment_name(annotation_text: &str, file_id: &str) -> String {
    match annotation_text.rsplit('/').next() {
        Some(seg) if !seg.is_empty() => seg.to_string(),
        _ => file_id.to_string(),
    }
}
