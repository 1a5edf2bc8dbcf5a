/// Lexically normalize a document base directory.
///
/// Separators are collapsed (`\` counts as one), `.` segments are dropped
/// and `..` cancels the segment before it. A leading `..` survives on
/// relative paths and is dropped at the root of absolute ones. The result
/// always ends with `/`, and a path that normalizes to nothing is `./`.
/// The filesystem is never consulted.
pub fn normalize_base(path: &str) -> String {
    let path = path.replace('\\', "/");
    let absolute = path.starts_with('/');

    let mut segments: Vec<&str> = Vec::new();
    for segment in path.split('/') {
        match segment {
            "" | "." => {}
            ".." => match segments.last() {
                Some(&last) if last != ".." => {
                    segments.pop();
                }
                _ if absolute => {}
                _ => segments.push(".."),
            },
            _ => segments.push(segment),
        }
    }

    let mut normalized = String::with_capacity(path.len() + 2);
    if absolute {
        normalized.push('/');
    } else if segments.is_empty() {
        normalized.push_str("./");
    }
    for segment in segments {
        normalized.push_str(segment);
        normalized.push('/');
    }
    normalized
}
