//! Custom view markup
//!
//! The vendor renders JSON view trees. We open a single full-screen text view
//! and afterwards only patch that view by id.

use serde_json::json;

/// Id of the one text element we ever update.
pub const TEXT_VIEW_ID: &str = "tv_content";

const TEXT_COLOR: &str = "#FF00FF00";
const BACKGROUND_COLOR: &str = "#FF000000";

fn sp(size: f32) -> String {
    if size.fract() == 0.0 {
        format!("{:.0}sp", size)
    } else {
        format!("{}sp", size)
    }
}

/// Layout passed to `open_custom_view`. The text starts empty; content is
/// pushed with [`text_patch`] once the view is confirmed open.
pub fn open_layout(text_size: f32) -> String {
    json!({
        "type": "LinearLayout",
        "props": {
            "layout_width": "match_parent",
            "layout_height": "match_parent",
            "orientation": "vertical",
            "gravity": "center_horizontal",
            "paddingTop": "24dp",
            "paddingBottom": "24dp",
            "backgroundColor": BACKGROUND_COLOR,
        },
        "children": [
            {
                "type": "TextView",
                "props": {
                    "id": TEXT_VIEW_ID,
                    "layout_width": "match_parent",
                    "layout_height": "wrap_content",
                    "text": "",
                    "textSize": sp(text_size),
                    "textColor": TEXT_COLOR,
                    "gravity": "start",
                }
            }
        ]
    })
    .to_string()
}

pub fn text_patch(text: &str) -> String {
    json!([
        {
            "action": "update",
            "id": TEXT_VIEW_ID,
            "props": { "text": text }
        }
    ])
    .to_string()
}

pub fn text_size_patch(text_size: f32) -> String {
    json!([
        {
            "action": "update",
            "id": TEXT_VIEW_ID,
            "props": { "textSize": sp(text_size) }
        }
    ])
    .to_string()
}

/// Pull the text back out of a patch. Used by the simulated backend and tests.
pub fn patched_text(patch: &str) -> Option<String> {
    let value: serde_json::Value = serde_json::from_str(patch).ok()?;
    value
        .as_array()?
        .iter()
        .filter(|op| op["id"] == TEXT_VIEW_ID)
        .find_map(|op| op["props"]["text"].as_str().map(str::to_string))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn layout_contains_text_view() {
        let layout: serde_json::Value = serde_json::from_str(&open_layout(16.0)).unwrap();
        let child = &layout["children"][0];
        assert_eq!(child["type"], "TextView");
        assert_eq!(child["props"]["id"], TEXT_VIEW_ID);
        assert_eq!(child["props"]["textSize"], "16sp");
    }

    #[test]
    fn patch_escapes_text() {
        let text = "line \"one\"\nline two";
        let patch = text_patch(text);
        assert_eq!(patched_text(&patch).as_deref(), Some(text));
    }

    #[test]
    fn fractional_sizes_keep_precision() {
        let patch: serde_json::Value = serde_json::from_str(&text_size_patch(14.5)).unwrap();
        assert_eq!(patch[0]["props"]["textSize"], "14.5sp");
        assert_eq!(patched_text(&text_size_patch(14.5)), None);
    }
}
