//! JSON Schemas for Generation Outputs
//!
//! One schema per generation operation. Providers embed the schema in the
//! prompt; the typed payloads in `llm.rs` mirror these shapes.

use serde_json::{Value, json};

/// Schema provider for generation operations
pub struct GenerationSchemas;

impl GenerationSchemas {
    pub fn summary() -> Value {
        json!({
            "type": "object",
            "required": ["summary"],
            "additionalProperties": false,
            "properties": {
                "summary": {
                    "type": "string",
                    "description": "Concise synopsis in plain prose"
                }
            }
        })
    }

    pub fn character_list() -> Value {
        json!({
            "type": "object",
            "required": ["characters"],
            "additionalProperties": false,
            "properties": {
                "characters": {
                    "type": "array",
                    "items": {
                        "type": "object",
                        "required": ["name", "is_main"],
                        "additionalProperties": false,
                        "properties": {
                            "name": {"type": "string"},
                            "is_main": {
                                "type": "boolean",
                                "description": "True for protagonists and recurring leads"
                            },
                            "description": {"type": "string"}
                        }
                    }
                }
            }
        })
    }

    pub fn character_forms() -> Value {
        json!({
            "type": "object",
            "required": ["forms"],
            "additionalProperties": false,
            "properties": {
                "forms": {
                    "type": "array",
                    "description": "Distinct visual looks of the character across the story",
                    "items": {
                        "type": "object",
                        "required": ["name", "appearance"],
                        "additionalProperties": false,
                        "properties": {
                            "name": {"type": "string", "description": "Short label, e.g. 'school uniform'"},
                            "appearance": {"type": "string", "description": "Face, hair, build, clothing, props"}
                        }
                    }
                }
            }
        })
    }

    pub fn location_list() -> Value {
        json!({
            "type": "object",
            "required": ["locations"],
            "additionalProperties": false,
            "properties": {
                "locations": {
                    "type": "array",
                    "items": {
                        "type": "object",
                        "required": ["name", "type"],
                        "additionalProperties": false,
                        "properties": {
                            "name": {"type": "string"},
                            "type": {
                                "type": "string",
                                "enum": ["core", "secondary"],
                                "description": "core = recurring or story-critical set"
                            },
                            "description": {"type": "string"}
                        }
                    }
                }
            }
        })
    }

    pub fn location_visuals() -> Value {
        json!({
            "type": "object",
            "required": ["atmosphere", "lighting", "key_elements"],
            "additionalProperties": false,
            "properties": {
                "atmosphere": {"type": "string"},
                "lighting": {"type": "string"},
                "key_elements": {
                    "type": "array",
                    "items": {"type": "string"},
                    "description": "Props and set pieces that must stay consistent"
                }
            }
        })
    }

    pub fn shot_list() -> Value {
        json!({
            "type": "object",
            "required": ["shots"],
            "additionalProperties": false,
            "properties": {
                "shots": {
                    "type": "array",
                    "items": {
                        "type": "object",
                        "required": ["id", "description", "duration", "shot_type"],
                        "additionalProperties": false,
                        "properties": {
                            "id": {
                                "type": "string",
                                "description": "episode-scene-shot, e.g. '1-2-03'"
                            },
                            "description": {"type": "string"},
                            "duration": {"type": "number", "description": "Seconds"},
                            "shot_type": {"type": "string", "description": "e.g. wide, medium, close-up"},
                            "movement": {"type": "string", "description": "Camera movement"},
                            "dialogue": {"type": "string"}
                        }
                    }
                }
            }
        })
    }

    pub fn scene_prompts() -> Value {
        json!({
            "type": "object",
            "required": ["prompts"],
            "additionalProperties": false,
            "properties": {
                "prompts": {
                    "type": "array",
                    "items": {
                        "type": "object",
                        "required": ["id", "prompt"],
                        "additionalProperties": false,
                        "properties": {
                            "id": {"type": "string", "description": "Shot id, unchanged"},
                            "prompt": {"type": "string", "description": "Video-generation prompt"}
                        }
                    }
                }
            }
        })
    }

    /// All schemas with their operation names
    pub fn all_schemas() -> Vec<(&'static str, Value)> {
        vec![
            ("summary", Self::summary()),
            ("character_list", Self::character_list()),
            ("character_forms", Self::character_forms()),
            ("location_list", Self::location_list()),
            ("location_visuals", Self::location_visuals()),
            ("shot_list", Self::shot_list()),
            ("scene_prompts", Self::scene_prompts()),
        ]
    }
}
