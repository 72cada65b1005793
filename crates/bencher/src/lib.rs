//! Shared fixtures of the benchmarks.

/// Boundary of every form under `resources/form`.
pub const FORM_BOUNDARY: &str = "----MicroFormBoundary7MA4YWxkTrZu0gW";

#[derive(Debug, Copy, Clone)]
pub struct TestCase {
    name: &'static str,
    file: TestFile,
    fragment: usize,
}

impl TestCase {
    /// A case delivering `file` in transport chunks of at most `fragment` bytes.
    pub fn new(name: &'static str, file: TestFile, fragment: usize) -> Self {
        Self { name, file, fragment }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn file(&self) -> &TestFile {
        &self.file
    }

    pub fn file_name(&self) -> &'static str {
        self.file().file_name
    }

    pub fn fragment(&self) -> usize {
        self.fragment
    }

    /// The file content split the way a transport would deliver it.
    pub fn chunks(&self) -> Vec<&'static [u8]> {
        self.file.content().as_bytes().chunks(self.fragment).collect()
    }
}

#[derive(Debug, Copy, Clone)]
pub struct TestFile {
    file_name: &'static str,
    content: &'static str,
}

impl TestFile {
    pub const fn new(file_name: &'static str, content: &'static str) -> Self {
        Self { file_name, content }
    }

    pub fn content(&self) -> &'static str {
        self.content
    }

    pub fn file_name(&self) -> &'static str {
        self.file_name
    }
}
