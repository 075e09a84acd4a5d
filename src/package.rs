//! Package storage: the part streams a settings part reads from and commits
//! to, and a ZIP-backed OOXML package that provides them.

use crate::error::{Error, Result};
use crate::settings::SettingsPart;
use std::cell::RefCell;
use std::collections::HashMap;
use std::fs::File;
use std::io::{self, BufReader, Cursor, Read, Seek, Write};
use std::path::Path;
use std::rc::Rc;
use tracing::debug;

/// Relationship type suffix of the main document part.
const OFFICE_DOCUMENT_REL: &str = "/officeDocument";

/// Relationship type suffix of the settings part.
const SETTINGS_REL: &str = "/settings";

/// A named part inside a package that can be read from and written to.
///
/// Writes through [`PackagePart::output_stream`] replace the part's content
/// when the stream is flushed.
pub trait PackagePart {
    /// Part name within the package (e.g., "word/settings.xml").
    fn name(&self) -> &str;

    /// Open the current content for reading.
    fn input_stream(&self) -> io::Result<Box<dyn Read + '_>>;

    /// Open the part for writing.
    fn output_stream(&mut self) -> io::Result<Box<dyn Write + '_>>;
}

/// A part held entirely in memory.
#[derive(Debug, Clone, Default)]
pub struct MemoryPart {
    name: String,
    data: Option<Vec<u8>>,
}

impl MemoryPart {
    /// Create a part with existing content.
    pub fn new(name: impl Into<String>, data: impl Into<Vec<u8>>) -> Self {
        Self {
            name: name.into(),
            data: Some(data.into()),
        }
    }

    /// Create a part that has never been written.
    pub fn empty(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            data: None,
        }
    }

    /// Current content, if any has been stored.
    pub fn data(&self) -> Option<&[u8]> {
        self.data.as_deref()
    }
}

impl PackagePart for MemoryPart {
    fn name(&self) -> &str {
        &self.name
    }

    fn input_stream(&self) -> io::Result<Box<dyn Read + '_>> {
        match self.data {
            Some(ref data) => Ok(Box::new(data.as_slice())),
            None => Err(io::Error::new(
                io::ErrorKind::NotFound,
                format!("part {} has no content", self.name),
            )),
        }
    }

    fn output_stream(&mut self) -> io::Result<Box<dyn Write + '_>> {
        Ok(Box::new(MemoryPartWriter {
            target: &mut self.data,
            buf: Vec::new(),
        }))
    }
}

struct MemoryPartWriter<'a> {
    target: &'a mut Option<Vec<u8>>,
    buf: Vec<u8>,
}

impl Write for MemoryPartWriter<'_> {
    fn write(&mut self, data: &[u8]) -> io::Result<usize> {
        self.buf.extend_from_slice(data);
        Ok(data.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        *self.target = Some(self.buf.clone());
        Ok(())
    }
}

/// A relationship entry from a .rels file.
#[derive(Debug, Clone)]
pub struct Relationship {
    /// Relationship ID (e.g., "rId1")
    pub id: String,
    /// Relationship type URI
    pub rel_type: String,
    /// Target path (relative or absolute)
    pub target: String,
    /// Whether the target is external
    pub external: bool,
}

/// Collection of relationships parsed from a .rels file.
#[derive(Debug, Clone, Default)]
pub struct Relationships {
    /// Map from relationship ID to relationship data
    pub by_id: HashMap<String, Relationship>,
    /// Map from relationship type to list of relationships
    pub by_type: HashMap<String, Vec<Relationship>>,
}

impl Relationships {
    /// Create a new empty relationships collection.
    pub fn new() -> Self {
        Self::default()
    }

    /// Get a relationship by ID.
    pub fn get(&self, id: &str) -> Option<&Relationship> {
        self.by_id.get(id)
    }

    /// First internal relationship whose type URI ends with `suffix`.
    ///
    /// Matching on the suffix covers both the transitional and the strict
    /// relationship namespaces.
    pub fn find_by_type_suffix(&self, suffix: &str) -> Option<&Relationship> {
        self.by_type
            .iter()
            .filter(|(rel_type, _)| rel_type.ends_with(suffix))
            .flat_map(|(_, rels)| rels.iter())
            .find(|rel| !rel.external)
    }

    /// Add a relationship.
    pub fn add(&mut self, rel: Relationship) {
        self.by_type
            .entry(rel.rel_type.clone())
            .or_default()
            .push(rel.clone());
        self.by_id.insert(rel.id.clone(), rel);
    }
}

/// Decode XML bytes to a string, honouring UTF-8 and UTF-16 byte order marks.
pub fn decode_xml_bytes(bytes: &[u8]) -> Result<String> {
    if let Some(rest) = bytes.strip_prefix(b"\xEF\xBB\xBF") {
        return String::from_utf8(rest.to_vec())
            .map_err(|e| Error::InvalidData(format!("invalid UTF-8: {}", e)));
    }
    if let Some(rest) = bytes.strip_prefix(b"\xFF\xFE") {
        return decode_utf16(rest, u16::from_le_bytes).map(|s| declare_utf8(&s));
    }
    if let Some(rest) = bytes.strip_prefix(b"\xFE\xFF") {
        return decode_utf16(rest, u16::from_be_bytes).map(|s| declare_utf8(&s));
    }
    String::from_utf8(bytes.to_vec())
        .map_err(|e| Error::InvalidData(format!("invalid UTF-8: {}", e)))
}

fn decode_utf16(bytes: &[u8], unit: fn([u8; 2]) -> u16) -> Result<String> {
    let chunks = bytes.chunks_exact(2);
    if !chunks.remainder().is_empty() {
        return Err(Error::InvalidData("invalid UTF-16: odd number of bytes".to_string()));
    }
    let units = chunks.map(|pair| unit([pair[0], pair[1]]));
    char::decode_utf16(units)
        .collect::<std::result::Result<String, _>>()
        .map_err(|e| Error::InvalidData(format!("invalid UTF-16: {}", e)))
}

/// Rewrite a UTF-16 encoding declaration after the text has been decoded,
/// so the XML reader does not try to decode it a second time.
fn declare_utf8(content: &str) -> String {
    if !content.starts_with("<?xml") {
        return content.to_string();
    }
    match content.find("?>") {
        Some(end) => {
            let (decl, rest) = content.split_at(end);
            let decl = ["\"UTF-16\"", "'UTF-16'", "\"utf-16\"", "'utf-16'"]
                .iter()
                .fold(decl.to_string(), |decl, token| decl.replace(token, "\"UTF-8\""));
            format!("{}{}", decl, rest)
        }
        None => content.to_string(),
    }
}

#[derive(Debug, Default)]
struct PartStore {
    /// Entries in archive order
    entries: Vec<(String, Vec<u8>)>,
}

impl PartStore {
    fn get(&self, name: &str) -> Option<&[u8]> {
        self.entries
            .iter()
            .find(|(entry, _)| entry == name)
            .map(|(_, data)| data.as_slice())
    }

    fn put(&mut self, name: &str, data: Vec<u8>) {
        match self.entries.iter_mut().find(|(entry, _)| entry == name) {
            Some((_, existing)) => *existing = data,
            None => self.entries.push((name.to_string(), data)),
        }
    }
}

/// An OOXML package loaded into memory.
///
/// Part handles share the package's storage, so a committed part is
/// included the next time the package is saved.
pub struct OoxmlPackage {
    store: Rc<RefCell<PartStore>>,
}

impl OoxmlPackage {
    /// Open a package from a file path.
    ///
    /// # Example
    ///
    /// ```no_run
    /// use docx_settings::package::OoxmlPackage;
    ///
    /// let package = OoxmlPackage::open("document.docx")?;
    /// # Ok::<(), docx_settings::Error>(())
    /// ```
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let file = File::open(path.as_ref())?;
        let mut reader = BufReader::new(file);
        let mut data = Vec::new();
        reader.read_to_end(&mut data)?;
        Self::from_bytes(data)
    }

    /// Create a package from a byte vector.
    pub fn from_bytes(data: Vec<u8>) -> Result<Self> {
        let mut archive = zip::ZipArchive::new(Cursor::new(data))?;
        let mut store = PartStore::default();
        for index in 0..archive.len() {
            let mut file = archive.by_index(index)?;
            if file.is_dir() {
                continue;
            }
            let name = file.name().to_string();
            let mut data = Vec::new();
            file.read_to_end(&mut data)?;
            store.entries.push((name, data));
        }
        debug!(parts = store.entries.len(), "opened package");
        Ok(Self {
            store: Rc::new(RefCell::new(store)),
        })
    }

    /// Create a package from a reader.
    pub fn from_reader<R: Read + Seek>(mut reader: R) -> Result<Self> {
        let mut data = Vec::new();
        reader.read_to_end(&mut data)?;
        Self::from_bytes(data)
    }

    /// Read a part's raw bytes.
    pub fn read_binary(&self, name: &str) -> Result<Vec<u8>> {
        self.store
            .borrow()
            .get(name)
            .map(<[u8]>::to_vec)
            .ok_or_else(|| Error::MissingComponent(name.to_string()))
    }

    /// Read a part as text.
    pub fn read_xml(&self, name: &str) -> Result<String> {
        decode_xml_bytes(&self.read_binary(name)?)
    }

    /// Check if a part exists.
    pub fn exists(&self, name: &str) -> bool {
        self.store.borrow().get(name).is_some()
    }

    /// List all part names, in archive order.
    pub fn list_files(&self) -> Vec<String> {
        self.store
            .borrow()
            .entries
            .iter()
            .map(|(name, _)| name.clone())
            .collect()
    }

    /// Read the relationships of a part (its `_rels/<name>.rels` file).
    pub fn read_relationships(&self, part_path: &str) -> Result<Relationships> {
        let rels_path = if part_path.is_empty() || part_path == "/" {
            "_rels/.rels".to_string()
        } else {
            let path = Path::new(part_path);
            let filename = path.file_name().unwrap_or_default().to_string_lossy();
            match path.parent().filter(|p| !p.as_os_str().is_empty()) {
                Some(parent) => format!("{}/_rels/{}.rels", parent.display(), filename),
                None => format!("_rels/{}.rels", filename),
            }
        };
        self.parse_relationships(&rels_path)
    }

    /// Read package-level relationships (_rels/.rels).
    pub fn read_package_relationships(&self) -> Result<Relationships> {
        self.parse_relationships("_rels/.rels")
    }

    /// Path of the main document part.
    pub fn main_document_path(&self) -> Result<String> {
        let rels = self.read_package_relationships()?;
        rels.find_by_type_suffix(OFFICE_DOCUMENT_REL)
            .map(|rel| Self::resolve_path("", &rel.target))
            .ok_or_else(|| Error::MissingComponent("officeDocument relationship".to_string()))
    }

    /// Path of the settings part, if the main document has one.
    pub fn settings_part_path(&self) -> Result<Option<String>> {
        let document = self.main_document_path()?;
        let rels = self.read_relationships(&document)?;
        Ok(rels
            .find_by_type_suffix(SETTINGS_REL)
            .map(|rel| Self::resolve_path(&document, &rel.target)))
    }

    /// Get a handle to an existing part.
    pub fn part(&self, name: &str) -> Result<PackagePartHandle> {
        if !self.exists(name) {
            return Err(Error::MissingComponent(name.to_string()));
        }
        Ok(PackagePartHandle {
            store: Rc::clone(&self.store),
            name: name.to_string(),
        })
    }

    /// Construct the settings part of the main document, unread.
    ///
    /// Returns `None` when the document has no settings relationship.
    pub fn settings_part(&self) -> Result<Option<SettingsPart>> {
        match self.settings_part_path()? {
            Some(path) => {
                let handle = self.part(&path)?;
                Ok(Some(SettingsPart::from_part(Box::new(handle))))
            }
            None => Ok(None),
        }
    }

    /// Write the package to a new ZIP archive.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let store = self.store.borrow();
        let mut zip = zip::ZipWriter::new(Cursor::new(Vec::new()));
        let options = zip::write::SimpleFileOptions::default()
            .compression_method(zip::CompressionMethod::Deflated);

        for (name, data) in &store.entries {
            zip.start_file(name.as_str(), options)?;
            zip.write_all(data)?;
        }

        let cursor = zip.finish()?;
        Ok(cursor.into_inner())
    }

    /// Write the package to a file.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let data = self.to_bytes()?;
        std::fs::write(path, &data)?;
        debug!(path = %path.display(), bytes = data.len(), "saved package");
        Ok(())
    }

    /// Parse a relationships file. A missing or empty file has no relationships.
    fn parse_relationships(&self, rels_path: &str) -> Result<Relationships> {
        let content = match self.read_xml(rels_path) {
            Ok(c) => c,
            Err(Error::MissingComponent(_)) => return Ok(Relationships::new()),
            Err(e) => return Err(e),
        };

        if content.trim().is_empty() {
            return Ok(Relationships::new());
        }

        let mut rels = Relationships::new();
        let mut reader = quick_xml::Reader::from_str(&content);
        reader.config_mut().trim_text(true);

        loop {
            match reader.read_event()? {
                quick_xml::events::Event::Empty(e)
                    if e.local_name().as_ref() == b"Relationship" =>
                {
                    let mut rel = Relationship {
                        id: String::new(),
                        rel_type: String::new(),
                        target: String::new(),
                        external: false,
                    };

                    for attr in e.attributes() {
                        let attr = attr?;
                        let value = attr.unescape_value()?.into_owned();
                        match attr.key.as_ref() {
                            b"Id" => rel.id = value,
                            b"Type" => rel.rel_type = value,
                            b"Target" => rel.target = value,
                            b"TargetMode" => rel.external = value.eq_ignore_ascii_case("external"),
                            _ => {}
                        }
                    }

                    if !rel.id.is_empty() {
                        rels.add(rel);
                    }
                }
                quick_xml::events::Event::Eof => break,
                _ => {}
            }
        }

        Ok(rels)
    }

    /// Resolve a relationship target against the part that owns it.
    pub fn resolve_path(base: &str, relative: &str) -> String {
        if let Some(stripped) = relative.strip_prefix('/') {
            return stripped.to_string();
        }

        let base_dir = Path::new(base).parent().unwrap_or(Path::new(""));

        let mut result = base_dir.to_path_buf();
        for component in Path::new(relative).components() {
            match component {
                std::path::Component::ParentDir => {
                    result.pop();
                }
                std::path::Component::Normal(c) => {
                    result.push(c);
                }
                _ => {}
            }
        }

        result.to_string_lossy().replace('\\', "/")
    }
}

impl std::fmt::Debug for OoxmlPackage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OoxmlPackage")
            .field("parts", &self.store.borrow().entries.len())
            .finish()
    }
}

/// A part inside an [`OoxmlPackage`].
#[derive(Clone)]
pub struct PackagePartHandle {
    store: Rc<RefCell<PartStore>>,
    name: String,
}

impl PackagePart for PackagePartHandle {
    fn name(&self) -> &str {
        &self.name
    }

    fn input_stream(&self) -> io::Result<Box<dyn Read + '_>> {
        let data = self.store.borrow().get(&self.name).map(<[u8]>::to_vec);
        match data {
            Some(data) => Ok(Box::new(Cursor::new(data))),
            None => Err(io::Error::new(
                io::ErrorKind::NotFound,
                format!("part {} not found in package", self.name),
            )),
        }
    }

    fn output_stream(&mut self) -> io::Result<Box<dyn Write + '_>> {
        Ok(Box::new(PackagePartWriter {
            store: Rc::clone(&self.store),
            name: self.name.clone(),
            buf: Vec::new(),
        }))
    }
}

impl std::fmt::Debug for PackagePartHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PackagePartHandle")
            .field("name", &self.name)
            .finish()
    }
}

struct PackagePartWriter {
    store: Rc<RefCell<PartStore>>,
    name: String,
    buf: Vec<u8>,
}

impl Write for PackagePartWriter {
    fn write(&mut self, data: &[u8]) -> io::Result<usize> {
        self.buf.extend_from_slice(data);
        Ok(data.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.store.borrow_mut().put(&self.name, self.buf.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn build_docx(with_settings: bool) -> Vec<u8> {
        use zip::write::SimpleFileOptions;

        let mut zip = zip::ZipWriter::new(Cursor::new(Vec::new()));
        let options =
            SimpleFileOptions::default().compression_method(zip::CompressionMethod::Stored);

        zip.start_file("_rels/.rels", options).unwrap();
        zip.write_all(
            br#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">
  <Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument" Target="word/document.xml"/>
</Relationships>"#,
        )
        .unwrap();

        zip.start_file("word/document.xml", options).unwrap();
        zip.write_all(br#"<w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main"><w:body/></w:document>"#)
            .unwrap();

        zip.start_file("word/_rels/document.xml.rels", options).unwrap();
        if with_settings {
            zip.write_all(
                br#"<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">
  <Relationship Id="rId3" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/settings" Target="settings.xml"/>
</Relationships>"#,
            )
            .unwrap();
            zip.start_file("word/settings.xml", options).unwrap();
            zip.write_all(br#"<w:settings xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main"><w:zoom w:percent="100"/></w:settings>"#)
                .unwrap();
        } else {
            zip.write_all(br#"<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"/>"#)
                .unwrap();
        }

        zip.finish().unwrap().into_inner()
    }

    #[test]
    fn test_resolve_path() {
        assert_eq!(
            OoxmlPackage::resolve_path("word/document.xml", "settings.xml"),
            "word/settings.xml"
        );
        assert_eq!(
            OoxmlPackage::resolve_path("word/document.xml", "../customXml/item1.xml"),
            "customXml/item1.xml"
        );
        assert_eq!(
            OoxmlPackage::resolve_path("word/document.xml", "/word/settings.xml"),
            "word/settings.xml"
        );
        assert_eq!(OoxmlPackage::resolve_path("", "word/document.xml"), "word/document.xml");
    }

    #[test]
    fn test_relationship_lookup() {
        let mut rels = Relationships::new();
        rels.add(Relationship {
            id: "rId1".to_string(),
            rel_type: "http://purl.oclc.org/ooxml/officeDocument/relationships/settings".to_string(),
            target: "settings.xml".to_string(),
            external: false,
        });

        assert!(rels.get("rId1").is_some());
        assert!(rels.get("rId2").is_none());
        assert_eq!(rels.find_by_type_suffix("/settings").unwrap().id, "rId1");
        assert!(rels.find_by_type_suffix("/styles").is_none());
    }

    #[test]
    fn test_locate_settings_part() {
        let package = OoxmlPackage::from_bytes(build_docx(true)).unwrap();
        assert_eq!(package.main_document_path().unwrap(), "word/document.xml");
        assert_eq!(
            package.settings_part_path().unwrap().as_deref(),
            Some("word/settings.xml")
        );
        assert!(package.settings_part().unwrap().is_some());
    }

    #[test]
    fn test_missing_settings_part() {
        let package = OoxmlPackage::from_bytes(build_docx(false)).unwrap();
        assert!(package.settings_part_path().unwrap().is_none());
        assert!(package.settings_part().unwrap().is_none());
        assert!(matches!(
            package.part("word/settings.xml"),
            Err(Error::MissingComponent(_))
        ));
    }

    #[test]
    fn test_handle_write_is_saved() {
        let package = OoxmlPackage::from_bytes(build_docx(true)).unwrap();
        let mut handle = package.part("word/settings.xml").unwrap();
        {
            let mut out = handle.output_stream().unwrap();
            out.write_all(b"<replaced/>").unwrap();
            out.flush().unwrap();
        }

        let reopened = OoxmlPackage::from_bytes(package.to_bytes().unwrap()).unwrap();
        assert_eq!(reopened.read_binary("word/settings.xml").unwrap(), b"<replaced/>");
        assert_eq!(reopened.list_files(), package.list_files());
    }

    #[test]
    fn test_memory_part_streams() {
        let mut part = MemoryPart::empty("word/settings.xml");
        assert!(part.input_stream().is_err());
        {
            let mut out = part.output_stream().unwrap();
            out.write_all(b"abc").unwrap();
            out.flush().unwrap();
        }
        let mut text = String::new();
        part.input_stream().unwrap().read_to_string(&mut text).unwrap();
        assert_eq!(text, "abc");
    }

    #[test]
    fn test_decode_xml_bytes() {
        let utf16_le = b"\xFF\xFE<\0?\0x\0m\0l\0>\0";
        assert_eq!(decode_xml_bytes(utf16_le).unwrap(), "<?xml>");

        let utf16_be = b"\xFE\xFF\0<\0?\0x\0m\0l\0>";
        assert_eq!(decode_xml_bytes(utf16_be).unwrap(), "<?xml>");

        let utf8_bom = b"\xEF\xBB\xBF<?xml>";
        assert_eq!(decode_xml_bytes(utf8_bom).unwrap(), "<?xml>");

        assert!(decode_xml_bytes(b"\xC3\x28").is_err());
    }

    #[test]
    fn test_decode_odd_utf16_length() {
        let truncated = b"\xFF\xFE<\0a\0/\0>\0\x20";
        assert!(matches!(decode_xml_bytes(truncated), Err(Error::InvalidData(_))));
    }

    #[test]
    fn test_unreadable_relationships_are_reported() {
        use zip::write::SimpleFileOptions;

        let mut zip = zip::ZipWriter::new(Cursor::new(Vec::new()));
        let options =
            SimpleFileOptions::default().compression_method(zip::CompressionMethod::Stored);
        zip.start_file("_rels/.rels", options).unwrap();
        zip.write_all(
            br#"<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">
  <Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument" Target="word/document.xml"/>
</Relationships>"#,
        )
        .unwrap();
        zip.start_file("word/document.xml", options).unwrap();
        zip.write_all(b"<w:document/>").unwrap();
        zip.start_file("word/_rels/document.xml.rels", options).unwrap();
        zip.write_all(b"<Relationships>\xC3\x28</Relationships>").unwrap();
        let data = zip.finish().unwrap().into_inner();

        let package = OoxmlPackage::from_bytes(data).unwrap();
        assert!(matches!(package.settings_part_path(), Err(Error::InvalidData(_))));
        let unrelated = package.read_relationships("word/styles.xml").unwrap();
        assert!(unrelated.get("rId1").is_none());
    }

    #[test]
    fn test_declare_utf8() {
        let decl = r#"<?xml version="1.0" encoding="UTF-16"?><a/>"#;
        assert_eq!(
            declare_utf8(decl),
            r#"<?xml version="1.0" encoding="UTF-8"?><a/>"#
        );
    }
}
