// Frame-rate extraction from FFmpeg diagnostic output
//
// FFmpeg reports progress on stderr as lines like
// `frame=  240 fps= 30.1 q=28.0 size=...`. The benchmark keeps the last
// value it sees; a line without a parsable token is ignored.

/// Parse the `fps=` token out of one stderr line.
pub fn parse_fps_token(line: &str) -> Option<f32> {
    let lower = line.to_ascii_lowercase();
    let at = lower.find("fps=")?;
    let rest = lower[at + 4..].trim_start();
    let end = rest
        .find(|c: char| !c.is_ascii_digit() && c != '.')
        .unwrap_or(rest.len());
    rest[..end].parse().ok()
}

/// Running fps reduction over a stream of stderr lines.
#[derive(Debug, Default)]
pub struct FpsScanner {
    last: Option<f32>,
}

impl FpsScanner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn feed(&mut self, line: &str) {
        if let Some(fps) = parse_fps_token(line) {
            self.last = Some(fps);
        }
    }

    /// The final frame rate, or `None` when no token was ever seen.
    pub fn finish(self) -> Option<f32> {
        self.last
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_progress_line() {
        let line = "frame=  240 fps= 30.1 q=28.0 size=    1024kB time=00:00:08.00 bitrate=1048.6kbits/s speed=1.01x";
        assert_eq!(parse_fps_token(line), Some(30.1));
    }

    #[test]
    fn test_parse_integer_fps() {
        assert_eq!(parse_fps_token("frame= 10 fps=0 q=0.0 size= 0kB"), Some(0.0));
        assert_eq!(parse_fps_token("frame= 99 fps=612 q=-0.0"), Some(612.0));
    }

    #[test]
    fn test_lines_without_token_are_ignored() {
        assert_eq!(parse_fps_token("Stream #0:0: Video: h264"), None);
        assert_eq!(parse_fps_token(""), None);
        assert_eq!(parse_fps_token("fps=garbage q=1"), None);
    }

    #[test]
    fn test_scanner_keeps_last_value() {
        let mut scanner = FpsScanner::new();
        scanner.feed("Input #0, mov,mp4");
        scanner.feed("frame=  30 fps= 12.0 q=28.0");
        scanner.feed("frame= 300 fps= 29.9 q=28.0");
        scanner.feed("video:1024kB audio:0kB");
        assert_eq!(scanner.finish(), Some(29.9));
    }

    #[test]
    fn test_scanner_empty_stream() {
        assert_eq!(FpsScanner::new().finish(), None);
    }
}
