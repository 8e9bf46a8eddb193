use std::fmt;

/// User-visible folder path. The first segment is always the root folder's
/// name, so two paths are equal only if their whole chain from the root is.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct VirtualPath {
    segments: Vec<String>,
}

impl VirtualPath {
    pub fn root(name: impl Into<String>) -> Self {
        Self {
            segments: vec![name.into()],
        }
    }

    pub fn is_root(&self) -> bool {
        self.segments.len() == 1
    }

    /// `None` at the root
    pub fn parent(&self) -> Option<VirtualPath> {
        if self.is_root() {
            return None;
        }
        Some(Self {
            segments: self.segments[..self.segments.len() - 1].to_vec(),
        })
    }

    pub fn join(&self, name: impl Into<String>) -> VirtualPath {
        let mut segments = self.segments.clone();
        segments.push(name.into());
        Self { segments }
    }

    /// Last segment
    pub fn name(&self) -> &str {
        self.segments.last().map(String::as_str).unwrap_or_default()
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    pub fn depth(&self) -> usize {
        self.segments.len() - 1
    }
}

impl fmt::Display for VirtualPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.segments.join("/"))
    }
}
