//! Serialization options for the settings part.

/// Options controlling how a settings tree is written back to the package.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteOptions {
    /// Emit the `<?xml ...?>` declaration
    pub include_declaration: bool,

    /// Mark the document `standalone="yes"` in the declaration
    pub standalone: bool,

    /// Indent nested elements by this many spaces (None = single line)
    pub indent: Option<usize>,
}

impl Default for WriteOptions {
    fn default() -> Self {
        Self {
            include_declaration: true,
            standalone: true,
            indent: None,
        }
    }
}

impl WriteOptions {
    /// Create new write options.
    pub fn new() -> Self {
        Self::default()
    }

    /// Enable or disable the XML declaration.
    pub fn with_declaration(mut self, include: bool) -> Self {
        self.include_declaration = include;
        self
    }

    /// Set the standalone flag of the XML declaration.
    pub fn with_standalone(mut self, standalone: bool) -> Self {
        self.standalone = standalone;
        self
    }

    /// Pretty-print with the given indentation width.
    pub fn with_indent(mut self, width: usize) -> Self {
        self.indent = Some(width);
        self
    }
}
