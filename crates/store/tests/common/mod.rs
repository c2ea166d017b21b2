#![allow(dead_code)]

use std::path::{Path, PathBuf};

use serde_json::{json, Value};

/// A record with one clean model and one model carrying every kind of defect
/// except `too_long`.
pub fn defective_record(image_id: &str) -> Value {
    json!({
        "image": {"id": image_id, "name": format!("{image_id}.png"), "source": "nsd"},
        "annotations": [
            {
                "model": "gemma3:4b",
                "temperature": 0.3,
                "prompts": {
                    "general_description": {
                        "prompt_text": "Describe",
                        "response": "A red kite over a green field.",
                        "response_format": "text",
                        "response_data": null,
                        "error": null,
                        "token_metrics": {"input_tokens": 10, "output_tokens": 20, "total_tokens": 30},
                        "performance_metrics": {"generation_duration_ms": 812.5, "tokens_per_second": 24.6}
                    },
                    "mood_emotions": {"prompt_text": "Mood", "response": "Breezy.", "reviewer_note": "keep"}
                }
            },
            {
                "model": "qwen2.5vl:7b",
                "prompts": {
                    "general_description": {"response": "   "},
                    "structured_inventory": {
                        "response": "{\"plants\": {}}",
                        "response_format": "json",
                        "response_data": {"plants": {}}
                    },
                    "mood_emotions": {"response": "", "error": "JSON parsing failed: EOF"}
                }
            }
        ],
        "run_id": "batch-7"
    })
}

/// A record where every model answered every prompt cleanly.
pub fn clean_record(image_id: &str) -> Value {
    let prompt = |text: &str, tokens: u64| {
        json!({"response": text, "token_metrics": {"total_tokens": tokens}})
    };
    json!({
        "image": {"id": image_id, "name": format!("{image_id}.png")},
        "annotations": [
            {
                "model": "gemma3:4b",
                "prompts": {
                    "general_description": prompt("A harbour.", 100),
                    "foreground_background": prompt("Boats in front.", 100),
                    "entities_interactions": prompt("Gulls and boats.", 100),
                    "mood_emotions": prompt("Calm.", 100),
                    "structured_inventory": {
                        "response": "{}",
                        "response_format": "json",
                        "response_data": {"natural": {"water": {"color": ["blue"]}}},
                        "token_metrics": {"total_tokens": 100}
                    }
                }
            },
            {
                "model": "qwen2.5vl:7b",
                "prompts": {
                    "general_description": prompt("A big harbour.", 5000)
                }
            }
        ]
    })
}

pub fn write_json(dir: &Path, name: &str, value: &Value) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, serde_json::to_string_pretty(value).expect("serialize fixture"))
        .expect("write fixture");
    path
}

pub fn read_json(path: &Path) -> Value {
    let text = std::fs::read_to_string(path).expect("read output");
    serde_json::from_str(&text).expect("parse output")
}
