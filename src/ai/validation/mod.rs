//! AI Response Validation
//!
//! Turns raw model output into JSON values. Payload shape checks live with
//! the typed results in `generation`.

mod json_repair;

pub use json_repair::{JsonRepairer, extract_json_from_response, extract_json_with_repair_status};
