//! Stream handles
//!
//! An [`InputStream`] decodes a media file into interleaved `f32` samples,
//! an [`OutputStream`] encodes them into a WAV or FLAC file. Each owns exactly one
//! file resource and is released by consuming `close`.

mod input;
mod output;

pub use input::InputStream;
pub use output::OutputStream;

use std::path::Path;

/// Lowercase file extension, or an empty string
pub(crate) fn extension_of(path: &Path) -> String {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extension_is_lowercased() {
        assert_eq!(extension_of(Path::new("/a/b/Song.WAV")), "wav");
        assert_eq!(extension_of(Path::new("/a/b/noext")), "");
    }
}
