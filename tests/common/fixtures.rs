//! Photo API response fixtures

use serde_json::{Value, json};

/// A single photo object as served by the collection endpoints
pub fn photo_json(id: &str) -> Value {
    json!({
        "id": id,
        "width": 4000,
        "height": 3000,
        "color": "#60544D",
        "created_at": "2016-05-03T11:00:28-04:00",
        "user": {
            "id": format!("{}-owner", id),
            "username": "photographer",
            "name": "Jane Photographer",
            "profile_image": {
                "small": "https://images.example.com/profile-1?w=32",
                "medium": "https://images.example.com/profile-1?w=64",
                "large": "https://images.example.com/profile-1?w=128"
            }
        },
        "urls": {
            "raw": format!("https://images.example.com/{}", id),
            "full": format!("https://images.example.com/{}?q=85", id),
            "regular": format!("https://images.example.com/{}?w=1080", id),
            "small": format!("https://images.example.com/{}?w=400", id),
            "thumb": format!("https://images.example.com/{}?w=200", id)
        }
    })
}

/// A page of `count` photos with ids `{prefix}-0`, `{prefix}-1`, ...
pub fn page_json(prefix: &str, count: usize) -> Value {
    Value::Array(
        (0..count)
            .map(|i| photo_json(&format!("{}-{}", prefix, i)))
            .collect(),
    )
}

/// Minimal PNG-like payload for image download tests
pub const IMAGE_BYTES: &[u8] = b"\x89PNG\r\n\x1a\nnot-really-an-image";
