//! Helpers for image references returned by providers.

use base64::engine::general_purpose::STANDARD as B64_ENGINE;
use base64::Engine;

pub const DEFAULT_IMAGE_MIME: &str = "image/png";

/// True for references that can be displayed as-is: inline data URLs and
/// absolute HTTP(S) URLs.
pub fn is_displayable_reference(reference: &str) -> bool {
    reference.starts_with("data:image/")
        || reference.starts_with("https://")
        || reference.starts_with("http://")
}

/// Turn a raw base64 payload into an inline PNG reference. Payloads that are
/// already displayable pass through unchanged.
pub fn wrap_inline_image(payload: &str) -> String {
    let payload = payload.trim();
    if is_displayable_reference(payload) {
        payload.to_string()
    } else {
        format!("data:{DEFAULT_IMAGE_MIME};base64,{payload}")
    }
}

/// Decode the bytes of a `data:image/...;base64,` reference.
pub fn decode_inline_image(reference: &str) -> Option<Vec<u8>> {
    let rest = reference.strip_prefix("data:image/")?;
    let (header, body) = rest.split_once(',')?;
    if !header.ends_with(";base64") {
        return None;
    }
    B64_ENGINE.decode(body.trim()).ok()
}

/// File name for saving a provider's image: the provider key plus a slug of
/// the first ten characters of the prompt.
pub fn download_filename(provider_key: &str, prompt: &str) -> String {
    let prefix: String = prompt.trim().chars().take(10).collect();
    let mut slug = String::new();
    let mut in_space = false;
    for ch in prefix.to_lowercase().chars() {
        if ch.is_whitespace() {
            if !in_space {
                slug.push('-');
            }
            in_space = true;
            continue;
        }
        in_space = false;
        if ch.is_ascii_lowercase() || ch.is_ascii_digit() || ch == '-' {
            slug.push(ch);
        }
    }

    if slug.is_empty() {
        format!("{provider_key}-image.png")
    } else {
        format!("{provider_key}_{slug}.png")
    }
}
