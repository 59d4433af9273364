//! Uniform identifier for "a file that may live inside an archive".

use std::fmt;

/// Separator between the archive path and the internal path in the wire form.
/// Never occurs in legal filesystem paths on the target platforms.
const SEPARATOR: char = '|';

/// A path that either denotes a plain filesystem file (`internal_path` empty)
/// or an entry inside an archive (both parts set).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct VirtualPath {
    archive_path: String,
    internal_path: String,
}

impl VirtualPath {
    /// Build a VirtualPath denoting a plain filesystem file.
    pub fn from_plain(path: impl AsRef<str>) -> Self {
        Self {
            archive_path: normalize_separators(path.as_ref()),
            internal_path: String::new(),
        }
    }

    /// Build a VirtualPath denoting an entry inside an archive.
    pub fn from_archive_entry(archive_path: impl AsRef<str>, internal_path: impl AsRef<str>) -> Self {
        Self {
            archive_path: normalize_separators(archive_path.as_ref()),
            internal_path: strip_leading_slash(&normalize_separators(internal_path.as_ref())),
        }
    }

    /// Split `s` on the first `|`. Absent separator yields `(s, "")`.
    pub fn parse(s: &str) -> Self {
        match s.split_once(SEPARATOR) {
            Some((archive, internal)) => Self::from_archive_entry(archive, internal),
            None => Self::from_plain(s),
        }
    }

    pub fn to_string_form(&self) -> String {
        if self.internal_path.is_empty() {
            self.archive_path.clone()
        } else {
            format!("{}{}{}", self.archive_path, SEPARATOR, self.internal_path)
        }
    }

    pub fn archive_path(&self) -> &str {
        &self.archive_path
    }

    pub fn internal_path(&self) -> &str {
        &self.internal_path
    }

    pub fn is_in_archive(&self) -> bool {
        !self.internal_path.is_empty()
    }

    pub fn is_empty(&self) -> bool {
        self.archive_path.is_empty()
    }

    /// Last path component: internal-path component when in-archive, else the
    /// filesystem filename.
    pub fn filename(&self) -> String {
        let source = if self.is_in_archive() {
            self.internal_path.as_str()
        } else {
            self.archive_path.as_str()
        };
        source
            .rsplit('/')
            .find(|seg| !seg.is_empty())
            .unwrap_or(source)
            .to_string()
    }

    /// Extension of `filename()`, excluding a leading dot (so `.gitignore` has
    /// no extension).
    pub fn extension(&self) -> String {
        let name = self.filename();
        match name.rfind('.') {
            Some(pos) if pos > 0 => name[pos + 1..].to_string(),
            _ => String::new(),
        }
    }

    /// Parent VirtualPath. For an in-archive path, strips the last internal
    /// component (or returns the archive root if none remains). For a plain
    /// path, steps to the filesystem parent, or the empty VirtualPath if there
    /// is none.
    pub fn parent(&self) -> VirtualPath {
        if self.is_in_archive() {
            return match self.internal_path.rfind('/') {
                Some(pos) => VirtualPath::from_archive_entry(
                    self.archive_path.clone(),
                    self.internal_path[..pos].to_string(),
                ),
                None => VirtualPath::from_plain(self.archive_path.clone()),
            };
        }

        if self.archive_path.is_empty() {
            return VirtualPath::default();
        }

        match parent_of_plain_path(&self.archive_path) {
            Some(parent) if parent != self.archive_path => VirtualPath::from_plain(parent),
            _ => VirtualPath::default(),
        }
    }

    /// Join a child path segment. If in-archive (or the VirtualPath has no
    /// internal path to branch off a filesystem join from), appends to the
    /// internal path; otherwise performs a plain filesystem join.
    pub fn join(&self, child: impl AsRef<str>) -> VirtualPath {
        let child = normalize_separators(child.as_ref());
        let child = strip_leading_slash(&child);

        if self.is_in_archive() || self.internal_path.is_empty() && self.archive_path.is_empty() {
            let internal = if self.internal_path.is_empty() {
                child
            } else {
                format!("{}/{}", self.internal_path, child)
            };
            return VirtualPath::from_archive_entry(self.archive_path.clone(), internal);
        }

        if !self.is_in_archive() && self.internal_path.is_empty() {
            // Plain filesystem join: treat archive_path as an ordinary path.
            let joined = if self.archive_path.is_empty() || self.archive_path.ends_with('/') {
                format!("{}{}", self.archive_path, child)
            } else {
                format!("{}/{}", self.archive_path, child)
            };
            return VirtualPath::from_plain(joined);
        }

        VirtualPath::from_archive_entry(self.archive_path.clone(), child)
    }
}

impl fmt::Display for VirtualPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_string_form())
    }
}

impl PartialOrd for VirtualPath {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for VirtualPath {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        (self.archive_path.as_str(), self.internal_path.as_str())
            .cmp(&(other.archive_path.as_str(), other.internal_path.as_str()))
    }
}

fn normalize_separators(s: &str) -> String {
    s.replace('\\', "/")
}

fn strip_leading_slash(s: &str) -> String {
    s.trim_start_matches('/').to_string()
}

fn parent_of_plain_path(path: &str) -> Option<String> {
    let trimmed = path.trim_end_matches('/');
    if trimmed.is_empty() {
        return None;
    }
    match trimmed.rfind('/') {
        Some(0) => Some("/".to_string()),
        Some(pos) => Some(trimmed[..pos].to_string()),
        None => Some(String::new()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_plain_path_has_no_internal_part() {
        let v = VirtualPath::parse("/home/user/pic.png");
        assert!(!v.is_in_archive());
        assert_eq!(v.archive_path(), "/home/user/pic.png");
        assert_eq!(v.internal_path(), "");
    }

    #[test]
    fn parse_archive_path_splits_on_first_separator() {
        let v = VirtualPath::parse("arc.zip|inside/pic.jpg");
        assert!(v.is_in_archive());
        assert_eq!(v.archive_path(), "arc.zip");
        assert_eq!(v.internal_path(), "inside/pic.jpg");
    }

    #[test]
    fn parse_normalizes_backslashes_and_strips_leading_slash() {
        let v = VirtualPath::parse(r"arc.zip|\inside\pic.jpg");
        assert_eq!(v.internal_path(), "inside/pic.jpg");
    }

    #[test]
    fn round_trip_parse_and_to_string() {
        for s in [
            "/plain/path/file.png",
            "arc.zip|inside/pic.jpg",
            "arc.zip|",
            "arc.zip|a/b/c.png",
        ] {
            let v = VirtualPath::parse(s);
            let v2 = VirtualPath::parse(&v.to_string_form());
            assert_eq!(v, v2, "round-trip failed for {s:?}");
        }
    }

    #[test]
    fn filename_uses_last_internal_component_when_in_archive() {
        let v = VirtualPath::parse("arc.zip|a/b/pic.jpg");
        assert_eq!(v.filename(), "pic.jpg");
    }

    #[test]
    fn filename_uses_filesystem_name_when_plain() {
        let v = VirtualPath::parse("/a/b/pic.jpg");
        assert_eq!(v.filename(), "pic.jpg");
    }

    #[test]
    fn extension_excludes_leading_dot() {
        let v = VirtualPath::parse("/a/.gitignore");
        assert_eq!(v.extension(), "");
        let v = VirtualPath::parse("/a/pic.jpeg");
        assert_eq!(v.extension(), "jpeg");
    }

    #[test]
    fn parent_of_in_archive_path_strips_last_component() {
        let v = VirtualPath::parse("arc.zip|a/b/pic.jpg");
        let parent = v.parent();
        assert_eq!(parent.archive_path(), "arc.zip");
        assert_eq!(parent.internal_path(), "a/b");
    }

    #[test]
    fn parent_of_archive_root_entry_is_archive_root() {
        let v = VirtualPath::parse("arc.zip|pic.jpg");
        let parent = v.parent();
        assert!(!parent.is_in_archive());
        assert_eq!(parent.archive_path(), "arc.zip");
    }

    #[test]
    fn join_appends_to_internal_path_when_in_archive() {
        let v = VirtualPath::parse("arc.zip|a");
        let joined = v.join("b.png");
        assert_eq!(joined.to_string_form(), "arc.zip|a/b.png");
    }

    #[test]
    fn join_is_plain_filesystem_join_otherwise() {
        let v = VirtualPath::parse("/a/b");
        let joined = v.join("c.png");
        assert_eq!(joined.to_string_form(), "/a/b/c.png");
    }

    #[test]
    fn ordering_is_lexicographic_archive_then_internal() {
        let a = VirtualPath::parse("a.zip|x");
        let b = VirtualPath::parse("b.zip|a");
        assert!(a < b);

        let c = VirtualPath::parse("a.zip|a");
        let d = VirtualPath::parse("a.zip|b");
        assert!(c < d);
    }

    #[test]
    fn empty_archive_path_is_the_empty_path() {
        let v = VirtualPath::default();
        assert!(v.is_empty());
    }
}
