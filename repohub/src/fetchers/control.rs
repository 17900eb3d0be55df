//! Tokenizer for line-oriented, blank-line-delimited metadata such as the
//! output of `apt-cache dumpavail`.
//!
//! Each block is a run of `Field: value` lines. Only recognized fields are
//! kept; indented continuation lines are skipped, so multi-line fields keep
//! their first line (for `Description` that is the synopsis).

/// Fields the tokenizer extracts, with the line prefix that introduces them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    Package,
    Name,
    Description,
    Version,
    Homepage,
    Section,
}

impl Field {
    pub const ALL: [Field; 6] = [
        Field::Package,
        Field::Name,
        Field::Description,
        Field::Version,
        Field::Homepage,
        Field::Section,
    ];

    pub fn key(&self) -> &'static str {
        match self {
            Field::Package => "Package",
            Field::Name => "Name",
            Field::Description => "Description",
            Field::Version => "Version",
            Field::Homepage => "Homepage",
            Field::Section => "Section",
        }
    }

    fn from_key(key: &str) -> Option<Field> {
        Field::ALL.into_iter().find(|field| field.key() == key)
    }
}

/// One block's worth of recognized fields; anything may be missing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedRecord {
    pub package: Option<String>,
    pub name: Option<String>,
    pub description: Option<String>,
    pub version: Option<String>,
    pub homepage: Option<String>,
    pub section: Option<String>,
}

impl ParsedRecord {
    fn set(&mut self, field: Field, value: String) {
        let slot = match field {
            Field::Package => &mut self.package,
            Field::Name => &mut self.name,
            Field::Description => &mut self.description,
            Field::Version => &mut self.version,
            Field::Homepage => &mut self.homepage,
            Field::Section => &mut self.section,
        };
        *slot = Some(value);
    }

    /// The identifier, falling back to the name. `None` means the block
    /// cannot become a package.
    pub fn identifier(&self) -> Option<&str> {
        self.package.as_deref().or(self.name.as_deref())
    }

    pub fn display_name(&self) -> Option<&str> {
        self.name.as_deref().or(self.package.as_deref())
    }
}

/// Splits `text` into blocks and tokenizes each one. Blocks with no
/// recognized fields are not returned.
pub fn parse_blocks(text: &str) -> Vec<ParsedRecord> {
    let mut records = Vec::new();
    let mut current = ParsedRecord::default();
    let mut has_fields = false;

    for line in text.lines() {
        if line.trim().is_empty() {
            if has_fields {
                records.push(std::mem::take(&mut current));
                has_fields = false;
            }
            continue;
        }

        if let Some((field, value)) = tokenize_line(line) {
            if let Some(value) = value {
                current.set(field, value);
            }
            has_fields = true;
        }
    }

    if has_fields {
        records.push(current);
    }

    records
}

/// Returns the recognized field of a line and its trimmed value, if any.
fn tokenize_line(line: &str) -> Option<(Field, Option<String>)> {
    // Continuation line
    if line.starts_with(' ') || line.starts_with('\t') {
        return None;
    }

    let (key, value) = line.split_once(':')?;
    let field = Field::from_key(key)?;
    let value = value.trim();
    let value = (!value.is_empty()).then(|| value.to_string());
    Some((field, value))
}
