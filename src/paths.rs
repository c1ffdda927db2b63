use std::ffi::OsStr;
use std::path::{Component, Path, PathBuf};

/// Renders a path with forward slashes only, the separator every playlist
/// line is written with regardless of platform.
pub fn forward_slashes(path: &Path) -> String {
    path.to_string_lossy().replace('\\', "/")
}

fn component_eq_ci(left: &OsStr, right: &OsStr) -> bool {
    left.to_string_lossy()
        .eq_ignore_ascii_case(right.to_string_lossy().as_ref())
}

/// Component-wise, case-insensitive path equality. Playlist storage paths
/// come from hosts and watchers that disagree on casing, so identity
/// matching must not.
pub fn paths_equal_ci(a: &Path, b: &Path) -> bool {
    let mut left = a.components();
    let mut right = b.components();

    loop {
        match (left.next(), right.next()) {
            (Some(l), Some(r)) if component_eq_ci(l.as_os_str(), r.as_os_str()) => {}
            (None, None) => return true,
            _ => return false,
        }
    }
}

/// Whether `path` sits at or below `root`, comparing whole components so
/// `/music/place` is not "within" `/music/pl`.
pub fn is_within_ci(path: &Path, root: &Path) -> bool {
    let mut path_components = path.components();
    for root_component in root.components() {
        let Some(path_component) = path_components.next() else {
            return false;
        };
        if !component_eq_ci(path_component.as_os_str(), root_component.as_os_str()) {
            return false;
        }
    }
    true
}

/// Deepest directory containing every given file, or `None` when the set
/// is empty or shares no ancestor (e.g. different drives).
pub fn common_root(paths: &[PathBuf]) -> Option<PathBuf> {
    let first = paths.first()?;
    let mut candidate = first.parent()?.to_path_buf();

    for path in &paths[1..] {
        loop {
            if is_within_ci(path, &candidate) {
                break;
            }
            candidate = candidate.parent()?.to_path_buf();
        }
    }

    Some(candidate)
}

/// Rewrites `target` relative to `base_dir`, or `None` when the two share
/// no common prefix and no relative form exists.
pub fn relative_to(target: &Path, base_dir: &Path) -> Option<PathBuf> {
    let target_components: Vec<Component> = target.components().collect();
    let base_components: Vec<Component> = base_dir.components().collect();

    let mut shared = 0;
    while shared < target_components.len()
        && shared < base_components.len()
        && component_eq_ci(
            target_components[shared].as_os_str(),
            base_components[shared].as_os_str(),
        )
    {
        shared += 1;
    }

    // Nothing in common (not even a root): different volume, no relative
    // path is expressible.
    if shared == 0 {
        return None;
    }

    let mut relative = PathBuf::new();
    for _ in shared..base_components.len() {
        relative.push("..");
    }
    for component in &target_components[shared..] {
        relative.push(component.as_os_str());
    }

    if relative.as_os_str().is_empty() {
        relative.push(".");
    }
    Some(relative)
}

/// Strips a `file://` URI wrapper, percent-decoding the remainder. Returns
/// the input unchanged when it is not a file URI.
pub fn strip_file_uri(line: &str) -> String {
    let lower = line.to_ascii_lowercase();
    let Some(rest) = lower
        .starts_with("file://")
        .then(|| &line["file://".len()..])
    else {
        return line.to_string();
    };

    let decoded = percent_decode(rest);

    // `file:///C:/...` keeps a spurious leading slash in front of the
    // drive letter; `file:///home/...` must keep its root slash.
    let bytes = decoded.as_bytes();
    if bytes.first() == Some(&b'/') && bytes.get(2) == Some(&b':') {
        decoded[1..].to_string()
    } else {
        decoded
    }
}

fn percent_decode(input: &str) -> String {
    fn hex_digit(byte: u8) -> Option<u8> {
        (byte as char).to_digit(16).map(|value| value as u8)
    }

    let bytes = input.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut index = 0;
    while index < bytes.len() {
        if bytes[index] == b'%' && index + 2 < bytes.len() {
            if let (Some(high), Some(low)) = (hex_digit(bytes[index + 1]), hex_digit(bytes[index + 2]))
            {
                out.push(high << 4 | low);
                index += 3;
                continue;
            }
        }
        out.push(bytes[index]);
        index += 1;
    }
    String::from_utf8_lossy(&out).into_owned()
}
