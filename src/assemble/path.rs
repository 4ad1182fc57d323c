/// A `/`-separated archive entry name split into segments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveEntryPath {
    segments: Vec<String>,
    is_file: bool,
}

impl ArchiveEntryPath {
    /// Parses an entry name; a trailing `/` marks a directory.
    pub fn parse(name: &str) -> Self {
        let is_file = !name.ends_with('/');
        let segments = name
            .split('/')
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect();
        Self { segments, is_file }
    }

    pub fn is_file(&self) -> bool {
        self.is_file
    }

    /// The entry name as stored in the archive; directories end with `/`.
    pub fn entry_name(&self) -> String {
        let mut name = self.path_string();
        if !self.is_file {
            name.push('/');
        }
        name
    }

    pub fn path_string(&self) -> String {
        self.segments.join("/")
    }

    /// Enclosing directory, `None` for top-level entries.
    pub fn parent(&self) -> Option<Self> {
        if self.segments.len() <= 1 {
            return None;
        }
        Some(Self {
            segments: self.segments[..self.segments.len() - 1].to_vec(),
            is_file: false,
        })
    }

    pub fn last_name(&self) -> &str {
        self.segments.last().map_or("", String::as_str)
    }

    pub fn is_class_file(&self) -> bool {
        self.is_file && self.last_name().ends_with(".class")
    }
}
