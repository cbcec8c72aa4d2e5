use std::path::PathBuf;

/// Characters that cannot appear in a file name on at least one supported
/// platform. Control characters are rejected as well.
const HOSTILE_FILENAME_CHARS: &[char] = &['<', '>', ':', '"', '/', '\\', '|', '?', '*'];

pub const OUTPUT_DIR_ENV: &str = "TUBE_GRABBER_OUTPUT_DIR";

fn is_hostile(c: char) -> bool {
    c.is_control() || HOSTILE_FILENAME_CHARS.contains(&c)
}

/// Sanitize filename to remove invalid characters
pub fn sanitize_filename(filename: &str) -> String {
    filename
        .chars()
        .map(|c| if is_hostile(c) { '_' } else { c })
        .collect::<String>()
        .trim_matches(|c: char| c == '.' || c.is_whitespace())
        .to_string()
}

/// Character class matching what `sanitize_filename` replaces, in the regex
/// dialect shared by `regex` and yt-dlp.
pub fn hostile_filename_pattern() -> String {
    let escaped: String = HOSTILE_FILENAME_CHARS
        .iter()
        .map(|c| regex::escape(&c.to_string()))
        .collect();
    format!(r"[{}\x00-\x1f\x7f-\x9f]", escaped)
}

/// Bytes rendered as mebibytes with two decimals, e.g. `1.50MB`.
pub fn format_megabytes(bytes: f64) -> String {
    format!("{:.2}MB", bytes / (1024.0 * 1024.0))
}

/// Seconds rendered as `minutes:seconds`.
pub fn format_eta(seconds: u64) -> String {
    format!("{}:{:02}", seconds / 60, seconds % 60)
}

/// `<cwd>/outputs` unless overridden through the environment.
pub fn default_output_dir() -> PathBuf {
    if let Some(dir) = std::env::var_os(OUTPUT_DIR_ENV).filter(|v| !v.is_empty()) {
        return PathBuf::from(dir);
    }
    std::env::current_dir()
        .unwrap_or_else(|_| PathBuf::from("."))
        .join("outputs")
}

pub fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "tube_grabber=info".into());

    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}
