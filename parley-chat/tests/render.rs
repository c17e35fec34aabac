mod common;

use common::FakeAssistant;
use parley_assistant::types::Message;
use parley_chat::{render, Attachment};
use serde_json::json;

fn message(content: serde_json::Value) -> Message {
    serde_json::from_value(json!({"id": "msg_9", "role": "assistant", "content": content})).unwrap()
}

#[tokio::test]
async fn text_blocks_and_image_render_in_order() {
    let api = FakeAssistant::new();
    api.files
        .lock()
        .unwrap()
        .insert("file-img".into(), vec![0x89, b'P', b'N', b'G']);

    let msg = message(json!([
        {"type": "text", "text": {"value": "Here is the chart.\n", "annotations": []}},
        {"type": "image_file", "image_file": {"file_id": "file-img"}},
        {"type": "text", "text": {"value": "Anything else?", "annotations": []}}
    ]));

    let reply = render(&api, &msg).await;

    assert_eq!(
        reply.text,
        "Here is the chart.\n[Image generated: file-img.png]\nAnything else?"
    );
    assert_eq!(
        reply.images,
        vec![Attachment {
            name: "file-img.png".into(),
            bytes: vec![0x89, b'P', b'N', b'G'],
        }]
    );
    assert!(reply.files.is_empty());
}

#[tokio::test]
async fn generated_files_are_attached_and_failures_skipped() {
    let api = FakeAssistant::new();
    api.files
        .lock()
        .unwrap()
        .insert("file-csv".into(), b"a,b\n1,2\n".to_vec());

    let msg = message(json!([
        {"type": "text", "text": {
            "value": "Download the data.",
            "annotations": [
                {"type": "file_path", "text": "sandbox:/mnt/data/table.csv", "file_path": {"file_id": "file-csv"}},
                {"type": "file_path", "text": "sandbox:/mnt/data/gone.txt", "file_path": {"file_id": "file-missing"}},
                {"type": "file_citation", "text": "[1]", "file_citation": {"file_id": "file-doc"}}
            ]
        }},
        {"type": "image_file", "image_file": {"file_id": "file-lost"}},
        {"type": "image_url", "image_url": {"url": "https://example.com/x.png"}}
    ]));

    let reply = render(&api, &msg).await;

    assert_eq!(reply.text, "Download the data.");
    assert_eq!(reply.files.len(), 1);
    assert_eq!(reply.files[0].name, "table.csv");
    assert_eq!(reply.files[0].bytes, b"a,b\n1,2\n");
    assert!(reply.images.is_empty());
    // Citations are never downloaded.
    assert!(api.calls_to("file_content").iter().all(|(id, _)| id != "file-doc"));
}
