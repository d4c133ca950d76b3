// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

/// Backend placeholder for the item's title
const TITLE_FIELD: &str = "%(title)s";
/// Backend placeholder for the final file extension
const EXT_FIELD: &str = "%(ext)s";

/// `"720p - "` for a known height, nothing otherwise
fn height_prefix(height_px: u32) -> Option<String> {
    (height_px > 0).then(|| format!("{}p - ", height_px))
}

/// Output name (without extension) for a title at a given height.
///
/// A height of 0 means unknown and yields the title alone.
pub fn output_name(height_px: u32, title: &str) -> String {
    match height_prefix(height_px) {
        Some(prefix) => format!("{}{}", prefix, title),
        None => title.to_string(),
    }
}

/// Backend naming template producing [`output_name`] plus the extension
pub fn output_template(height_px: u32) -> String {
    format!("{}.{}", output_name(height_px, TITLE_FIELD), EXT_FIELD)
}

/// Shorten a title for log and status lines
pub fn truncate_title(title: &str, max_chars: usize) -> String {
    if title.chars().count() <= max_chars {
        title.to_string()
    } else {
        let kept: String = title.chars().take(max_chars.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}
