//! 逻辑路径解析：把调用方提供的相对路径约束在存储根目录之内。

use std::fmt;
use std::path::{Component, Path, PathBuf};

/// Resolves untrusted logical paths against a fixed storage root.
#[derive(Clone, Debug)]
pub struct PathResolver {
    root: PathBuf,
}

/// 解析成功的目标：逻辑路径（可回显给调用方）与绝对路径（仅供后端使用）。
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ResolvedPath {
    logical: String,
    absolute: PathBuf,
}

impl ResolvedPath {
    pub fn logical(&self) -> &str {
        &self.logical
    }

    pub fn absolute(&self) -> &Path {
        &self.absolute
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PathRejection {
    Empty,
    DriveMarker,
    InvalidSegment,
    EscapesRoot,
}

impl fmt::Display for PathRejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PathRejection::Empty => f.write_str("empty path"),
            PathRejection::DriveMarker => f.write_str("drive or volume marker"),
            PathRejection::InvalidSegment => f.write_str("invalid path segment"),
            PathRejection::EscapesRoot => f.write_str("path escapes storage root"),
        }
    }
}

impl PathResolver {
    /// `root` 应为绝对路径；`.` 分量会被剔除以便逐段比较。
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root: PathBuf = root.into();
        let root = root
            .components()
            .filter(|component| !matches!(component, Component::CurDir))
            .collect();
        Self { root }
    }

    pub fn root_path(&self) -> &Path {
        &self.root
    }

    /// 规范化 `.`、`..` 与分隔符后拼接到根目录，结果必须严格位于根目录之下。
    pub fn resolve(&self, logical: &str) -> Result<ResolvedPath, PathRejection> {
        let unified = logical.trim().replace('\\', "/");
        let trimmed = unified.trim_start_matches('/');
        if trimmed.is_empty() {
            return Err(PathRejection::Empty);
        }

        let mut absolute = self.root.clone();
        for segment in trimmed.split('/') {
            match segment {
                "" | "." => continue,
                ".." => {
                    absolute.pop();
                }
                // Any segment, not only the first, on every host platform.
                name if is_drive_marker(name) => return Err(PathRejection::DriveMarker),
                name if name.contains('\0') => return Err(PathRejection::InvalidSegment),
                name => {
                    // A single segment must stay a single normal component.
                    let mut components = Path::new(name).components();
                    match (components.next(), components.next()) {
                        (Some(Component::Normal(_)), None) => absolute.push(name),
                        _ => return Err(PathRejection::InvalidSegment),
                    }
                }
            }
        }

        if !self.is_strictly_within(&absolute) {
            return Err(PathRejection::EscapesRoot);
        }

        let logical = absolute
            .strip_prefix(&self.root)
            .map_err(|_| PathRejection::EscapesRoot)?
            .components()
            .map(|component| component.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");

        Ok(ResolvedPath { logical, absolute })
    }

    /// Ancestor check on path components, so `/data/uploads2` is not inside `/data/uploads`.
    pub fn is_strictly_within(&self, candidate: &Path) -> bool {
        candidate != self.root && candidate.starts_with(&self.root)
    }
}

fn is_drive_marker(segment: &str) -> bool {
    let bytes = segment.as_bytes();
    bytes.len() >= 2 && bytes[0].is_ascii_alphabetic() && bytes[1] == b':'
}
