//! Typed tree for the `w:settings` root element.
//!
//! Only a handful of sub-nodes are modelled. Everything else between the
//! root tags (other settings, extension elements, comments) is captured as
//! raw events and written back unchanged and in place.

use super::options::WriteOptions;
use super::types::{OnOff, ProtectionKind};
use crate::error::{Error, Result};
use crate::package::decode_xml_bytes;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, Event};
use quick_xml::name::{Namespace, ResolveResult};
use quick_xml::{NsReader, Writer};
use tracing::{debug, trace};

/// WordprocessingML main namespace.
pub const WORDML_NS: &str = "http://schemas.openxmlformats.org/wordprocessingml/2006/main";

/// Prefixes bound on the root element when a tree is serialized.
pub const NAMESPACE_PREFIXES: &[(&str, &str)] = &[(WORDML_NS, "w")];

/// Child sequence of `CT_Settings`, used to place sub-nodes created on demand.
const SCHEMA_ORDER: &[&str] = &[
    "writeProtection",
    "view",
    "zoom",
    "removePersonalInformation",
    "removeDateAndTime",
    "doNotDisplayPageBoundaries",
    "displayBackgroundShape",
    "printPostScriptOverText",
    "printFractionalCharacterWidth",
    "printFormsData",
    "embedTrueTypeFonts",
    "embedSystemFonts",
    "saveSubsetFonts",
    "saveFormsData",
    "mirrorMargins",
    "alignBordersAndEdges",
    "bordersDoNotSurroundHeader",
    "bordersDoNotSurroundFooter",
    "gutterAtTop",
    "hideSpellingErrors",
    "hideGrammaticalErrors",
    "activeWritingStyle",
    "proofState",
    "formsDesign",
    "attachedTemplate",
    "linkStyles",
    "stylePaneFormatFilter",
    "stylePaneSortMethod",
    "documentType",
    "mailMerge",
    "revisionView",
    "trackRevisions",
    "doNotTrackMoves",
    "doNotTrackFormatting",
    "documentProtection",
    "autoFormatOverride",
    "styleLockTheme",
    "styleLockQFSet",
    "defaultTabStop",
    "autoHyphenation",
    "consecutiveHyphenLimit",
    "hyphenationZone",
    "doNotHyphenateCaps",
    "showEnvelope",
    "summaryLength",
    "clickAndTypeStyle",
    "defaultTableStyle",
    "evenAndOddHeaders",
    "bookFoldRevPrinting",
    "bookFoldPrinting",
    "bookFoldPrintingSheets",
    "drawingGridHorizontalSpacing",
    "drawingGridVerticalSpacing",
    "displayHorizontalDrawingGridEvery",
    "displayVerticalDrawingGridEvery",
    "doNotUseMarginsForDrawingGridOrigin",
    "drawingGridHorizontalOrigin",
    "drawingGridVerticalOrigin",
    "doNotShadeFormData",
    "noPunctuationKerning",
    "characterSpacingControl",
    "printTwoOnOne",
    "strictFirstAndLastChars",
    "noLineBreaksAfter",
    "noLineBreaksBefore",
    "savePreviewPicture",
    "doNotValidateAgainstSchema",
    "saveInvalidXml",
    "ignoreMixedContent",
    "alwaysShowPlaceholderText",
    "doNotDemarcateInvalidXml",
    "saveXmlDataOnly",
    "useXSLTWhenSaving",
    "saveThroughXslt",
    "showXMLTags",
    "alwaysMergeEmptyNamespace",
    "updateFields",
    "hdrShapeDefaults",
    "footnotePr",
    "endnotePr",
    "compat",
    "docVars",
    "rsids",
    "mathPr",
    "attachedSchema",
    "themeFontLang",
    "clrSchemeMapping",
    "doNotIncludeSubdocsInStats",
    "doNotAutoCompressPictures",
    "forceUpgrade",
    "captions",
    "readModeInkLockDown",
    "smartTagType",
    "schemaLibrary",
    "shapeDefaults",
    "doNotEmbedSmartTags",
    "decimalSymbol",
    "listSeparator",
];

fn schema_rank(local_name: &str) -> Option<usize> {
    SCHEMA_ORDER.iter().position(|name| *name == local_name)
}

fn wordml_prefix() -> &'static str {
    NAMESPACE_PREFIXES
        .iter()
        .find(|(uri, _)| *uri == WORDML_NS)
        .map(|(_, prefix)| *prefix)
        .unwrap_or("w")
}

fn qualified(local_name: &str) -> String {
    format!("{}:{}", wordml_prefix(), local_name)
}

fn is_wordml(ns: &ResolveResult<'_>) -> bool {
    matches!(ns, ResolveResult::Bound(Namespace(uri)) if *uri == WORDML_NS.as_bytes())
}

/// An attribute as read from the source, with its WordprocessingML local
/// name when the attribute lives in that namespace.
struct ParsedAttribute {
    key: String,
    wordml_local: Option<String>,
    value: String,
}

fn read_attributes(
    reader: &NsReader<&[u8]>,
    start: &BytesStart<'_>,
) -> Result<Vec<ParsedAttribute>> {
    let mut attrs = Vec::new();
    for attr in start.attributes() {
        let attr = attr?;
        let wordml_local = {
            let (ns, local) = reader.resolve_attribute(attr.key);
            is_wordml(&ns).then(|| String::from_utf8_lossy(local.as_ref()).into_owned())
        };
        attrs.push(ParsedAttribute {
            key: String::from_utf8_lossy(attr.key.as_ref()).into_owned(),
            wordml_local,
            value: attr.unescape_value()?.into_owned(),
        });
    }
    Ok(attrs)
}

fn wordml_local_name(reader: &NsReader<&[u8]>, start: &BytesStart<'_>) -> Option<String> {
    let (ns, local) = reader.resolve_element(start.name());
    is_wordml(&ns).then(|| String::from_utf8_lossy(local.as_ref()).into_owned())
}

fn push_attributes(element: &mut BytesStart<'_>, attrs: &[(String, String)]) {
    for (key, value) in attrs {
        element.push_attribute((key.as_str(), value.as_str()));
    }
}

/// `w:zoom`: the magnification the document opens at.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Zoom {
    /// Zoom percentage as stored in `w:percent`
    pub percent: Option<String>,
    /// Attributes not modelled above (e.g. `w:val`), in document order
    pub other_attributes: Vec<(String, String)>,
}

impl Zoom {
    /// Parse `w:percent` as an integer.
    pub fn percent_value(&self) -> Result<i64> {
        let text = self
            .percent
            .as_deref()
            .ok_or(Error::MissingSubstructure("w:zoom/@w:percent"))?;
        text.trim().parse().map_err(|_| Error::MalformedValue {
            attribute: "w:percent",
            value: text.to_string(),
        })
    }

    /// Store `value` as the decimal text of `w:percent`.
    pub fn set_percent_value(&mut self, value: i64) {
        self.percent = Some(value.to_string());
    }

    fn from_attributes(attrs: Vec<ParsedAttribute>) -> Self {
        let mut zoom = Zoom::default();
        for attr in attrs {
            match attr.wordml_local.as_deref() {
                Some("percent") => zoom.percent = Some(attr.value),
                _ => zoom.other_attributes.push((attr.key, attr.value)),
            }
        }
        zoom
    }

    fn to_element(&self) -> BytesStart<'static> {
        let mut element = BytesStart::new(qualified("zoom"));
        if let Some(ref percent) = self.percent {
            element.push_attribute((qualified("percent").as_str(), percent.as_str()));
        }
        push_attributes(&mut element, &self.other_attributes);
        element
    }
}

/// `w:documentProtection`: which editing restriction applies, and whether
/// it is enforced.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DocumentProtection {
    /// Protection kind (`w:edit`)
    pub edit: Option<ProtectionKind>,
    /// Enforcement flag (`w:enforcement`)
    pub enforcement: Option<OnOff>,
    /// Attributes not modelled above (password hash, salt, ...)
    pub other_attributes: Vec<(String, String)>,
}

impl DocumentProtection {
    /// Enforcement is active only for the `"1"` sentinel.
    pub fn is_enforced(&self) -> bool {
        self.enforcement.is_some_and(|value| value.is_on_sentinel())
    }

    /// Active enforcement of exactly `kind`.
    pub fn is_enforced_with(&self, kind: ProtectionKind) -> bool {
        self.is_enforced() && self.edit == Some(kind)
    }

    fn from_attributes(attrs: Vec<ParsedAttribute>) -> Result<Self> {
        let mut protection = DocumentProtection::default();
        for attr in attrs {
            match attr.wordml_local.as_deref() {
                Some("edit") => protection.edit = Some(attr.value.parse()?),
                Some("enforcement") => {
                    let value = attr.value.parse().map_err(|_| Error::MalformedValue {
                        attribute: "w:enforcement",
                        value: attr.value.clone(),
                    })?;
                    protection.enforcement = Some(value);
                }
                _ => protection.other_attributes.push((attr.key, attr.value)),
            }
        }
        Ok(protection)
    }

    fn to_element(&self) -> BytesStart<'static> {
        let mut element = BytesStart::new(qualified("documentProtection"));
        if let Some(edit) = self.edit {
            element.push_attribute((qualified("edit").as_str(), edit.as_str()));
        }
        if let Some(enforcement) = self.enforcement {
            element.push_attribute((qualified("enforcement").as_str(), enforcement.as_str()));
        }
        push_attributes(&mut element, &self.other_attributes);
        element
    }
}

/// Settings that are plain on/off toggles (`CT_OnOff`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FlagKind {
    /// `w:trackRevisions`
    TrackRevisions,
    /// `w:updateFields`
    UpdateFields,
}

impl FlagKind {
    /// Element local name.
    pub fn local_name(&self) -> &'static str {
        match self {
            FlagKind::TrackRevisions => "trackRevisions",
            FlagKind::UpdateFields => "updateFields",
        }
    }

    fn from_local_name(name: &str) -> Option<Self> {
        match name {
            "trackRevisions" => Some(FlagKind::TrackRevisions),
            "updateFields" => Some(FlagKind::UpdateFields),
            _ => None,
        }
    }
}

/// A `CT_OnOff` element. Present without `w:val` means on.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OnOffFlag {
    /// Explicit value (`w:val`)
    pub val: Option<OnOff>,
    /// Attributes not modelled above
    pub other_attributes: Vec<(String, String)>,
}

impl OnOffFlag {
    /// Effective truth value.
    pub fn is_on(&self) -> bool {
        self.val.map_or(true, |value| value.is_truthy())
    }

    /// Set an explicit value.
    pub fn set(&mut self, on: bool) {
        self.val = Some(OnOff::from(on));
    }

    fn from_attributes(attrs: Vec<ParsedAttribute>) -> Result<Self> {
        let mut flag = OnOffFlag::default();
        for attr in attrs {
            match attr.wordml_local.as_deref() {
                Some("val") => flag.val = Some(attr.value.parse()?),
                _ => flag.other_attributes.push((attr.key, attr.value)),
            }
        }
        Ok(flag)
    }

    fn to_element(&self, kind: FlagKind) -> BytesStart<'static> {
        let mut element = BytesStart::new(qualified(kind.local_name()));
        if let Some(val) = self.val {
            element.push_attribute((qualified("val").as_str(), val.as_str()));
        }
        push_attributes(&mut element, &self.other_attributes);
        element
    }
}

/// Content the tree does not model, kept as the exact event sequence.
#[derive(Debug, Clone, PartialEq, Eq)]
struct OpaqueNode {
    /// Local name when the element is in the WordprocessingML namespace
    wordml_local: Option<String>,
    events: Vec<Event<'static>>,
}

/// Position of one child of the root element.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Slot {
    Zoom,
    DocumentProtection,
    Flag(FlagKind),
    Opaque(OpaqueNode),
}

impl Slot {
    fn schema_rank(&self) -> Option<usize> {
        match self {
            Slot::Zoom => schema_rank("zoom"),
            Slot::DocumentProtection => schema_rank("documentProtection"),
            Slot::Flag(kind) => schema_rank(kind.local_name()),
            Slot::Opaque(node) => node.wordml_local.as_deref().and_then(schema_rank),
        }
    }
}

/// In-memory form of a settings part.
///
/// Modelled sub-nodes live in `Option` fields; `children` records where each
/// of them sits among the pass-through content.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SettingsTree {
    prolog: Vec<Event<'static>>,
    epilog: Vec<Event<'static>>,
    root_attributes: Vec<(String, String)>,
    zoom: Option<Zoom>,
    document_protection: Option<DocumentProtection>,
    track_revisions: Option<OnOffFlag>,
    update_fields: Option<OnOffFlag>,
    children: Vec<Slot>,
}

impl SettingsTree {
    /// Create an empty `w:settings` tree.
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a complete settings document.
    ///
    /// Comments and processing instructions around the root element are
    /// kept; any other content outside it is an error.
    pub fn parse(data: &[u8]) -> Result<Self> {
        let text = decode_xml_bytes(data)?;
        let mut reader = NsReader::from_str(&text);
        reader.config_mut().trim_text(true);

        let mut prolog = Vec::new();
        let mut tree = loop {
            match reader.read_event()? {
                Event::Start(e) => {
                    let mut tree = Self::from_root(&reader, &e)?;
                    tree.read_children(&mut reader)?;
                    break tree;
                }
                Event::Empty(e) => break Self::from_root(&reader, &e)?,
                Event::Eof => {
                    return Err(Error::InvalidData("no w:settings root element".to_string()));
                }
                event => {
                    if let Some(event) = outside_root(event)? {
                        prolog.push(event);
                    }
                }
            }
        };
        tree.prolog = prolog;

        loop {
            match reader.read_event()? {
                Event::Eof => break,
                Event::Start(_) | Event::Empty(_) => {
                    return Err(Error::InvalidData("more than one root element".to_string()));
                }
                event => {
                    if let Some(event) = outside_root(event)? {
                        tree.epilog.push(event);
                    }
                }
            }
        }

        trace!(children = tree.children.len(), "parsed settings tree");
        Ok(tree)
    }

    fn from_root(reader: &NsReader<&[u8]>, start: &BytesStart<'_>) -> Result<Self> {
        if wordml_local_name(reader, start).as_deref() != Some("settings") {
            return Err(Error::InvalidData(format!(
                "expected w:settings root element, found <{}>",
                String::from_utf8_lossy(start.name().as_ref())
            )));
        }

        let mut root_attributes = Vec::new();
        for attr in read_attributes(reader, start)? {
            for (uri, prefix) in NAMESPACE_PREFIXES {
                if attr.key == format!("xmlns:{}", prefix) && attr.value != *uri {
                    return Err(Error::InvalidData(format!(
                        "prefix {} is bound to {}",
                        prefix, attr.value
                    )));
                }
            }
            root_attributes.push((attr.key, attr.value));
        }

        Ok(Self {
            root_attributes,
            ..Default::default()
        })
    }

    fn read_children(&mut self, reader: &mut NsReader<&[u8]>) -> Result<()> {
        loop {
            match reader.read_event()? {
                Event::End(_) => return Ok(()),
                Event::Eof => {
                    return Err(Error::InvalidData(
                        "unexpected end of document inside w:settings".to_string(),
                    ));
                }
                Event::Empty(e) => self.read_element(reader, e, false)?,
                Event::Start(e) => self.read_element(reader, e, true)?,
                Event::Decl(_) | Event::DocType(_) => {}
                other => self.children.push(Slot::Opaque(OpaqueNode {
                    wordml_local: None,
                    events: vec![other.into_owned()],
                })),
            }
        }
    }

    fn read_element(
        &mut self,
        reader: &mut NsReader<&[u8]>,
        start: BytesStart<'_>,
        has_content: bool,
    ) -> Result<()> {
        let local = wordml_local_name(reader, &start);

        if let Some(kind) = local.as_deref().and_then(FlagKind::from_local_name) {
            let flag = OnOffFlag::from_attributes(read_attributes(reader, &start)?)?;
            skip_content(reader, &start, has_content)?;
            if self.flag_slot(kind).replace(flag).is_some() {
                return Err(duplicate(kind.local_name()));
            }
            self.children.push(Slot::Flag(kind));
            return Ok(());
        }

        match local.as_deref() {
            Some("zoom") => {
                let zoom = Zoom::from_attributes(read_attributes(reader, &start)?);
                skip_content(reader, &start, has_content)?;
                if self.zoom.replace(zoom).is_some() {
                    return Err(duplicate("zoom"));
                }
                self.children.push(Slot::Zoom);
            }
            Some("documentProtection") => {
                let protection =
                    DocumentProtection::from_attributes(read_attributes(reader, &start)?)?;
                skip_content(reader, &start, has_content)?;
                if self.document_protection.replace(protection).is_some() {
                    return Err(duplicate("documentProtection"));
                }
                self.children.push(Slot::DocumentProtection);
            }
            _ => {
                let events = if has_content {
                    collect_subtree(reader, start)?
                } else {
                    vec![Event::Empty(start.into_owned())]
                };
                self.children.push(Slot::Opaque(OpaqueNode {
                    wordml_local: local.clone(),
                    events,
                }));
            }
        }
        Ok(())
    }

    /// Serialize the tree to a complete XML document.
    pub fn to_xml(&self, options: &WriteOptions) -> Result<Vec<u8>> {
        let mut writer = match options.indent {
            Some(width) => Writer::new_with_indent(Vec::new(), b' ', width),
            None => Writer::new(Vec::new()),
        };

        if options.include_declaration {
            let standalone = options.standalone.then_some("yes");
            writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), standalone)))?;
        }
        for event in &self.prolog {
            writer.write_event(event.clone())?;
        }

        let root_name = qualified("settings");
        let mut root = BytesStart::new(root_name.as_str());
        for (uri, prefix) in NAMESPACE_PREFIXES {
            let key = format!("xmlns:{}", prefix);
            if !self.root_attributes.iter().any(|(k, _)| *k == key) {
                root.push_attribute((key.as_str(), *uri));
            }
        }
        push_attributes(&mut root, &self.root_attributes);

        if self.children.is_empty() {
            writer.write_event(Event::Empty(root))?;
        } else {
            writer.write_event(Event::Start(root))?;
            for slot in &self.children {
                self.write_slot(&mut writer, slot)?;
            }
            writer.write_event(Event::End(BytesEnd::new(root_name.as_str())))?;
        }
        for event in &self.epilog {
            writer.write_event(event.clone())?;
        }

        Ok(writer.into_inner())
    }

    fn write_slot(&self, writer: &mut Writer<Vec<u8>>, slot: &Slot) -> Result<()> {
        let element = match slot {
            Slot::Zoom => self.zoom.as_ref().map(Zoom::to_element),
            Slot::DocumentProtection => self
                .document_protection
                .as_ref()
                .map(DocumentProtection::to_element),
            Slot::Flag(kind) => self.flag(*kind).map(|flag| flag.to_element(*kind)),
            Slot::Opaque(node) => {
                for event in &node.events {
                    writer.write_event(event.clone())?;
                }
                None
            }
        };
        if let Some(element) = element {
            writer.write_event(Event::Empty(element))?;
        }
        Ok(())
    }

    /// Root attributes (namespace declarations included), in document order.
    pub fn root_attributes(&self) -> &[(String, String)] {
        &self.root_attributes
    }

    /// Number of children of the root element.
    pub fn len(&self) -> usize {
        self.children.len()
    }

    /// Whether the root element has no children.
    pub fn is_empty(&self) -> bool {
        self.children.is_empty()
    }

    /// The `w:zoom` sub-node, if present.
    pub fn zoom(&self) -> Option<&Zoom> {
        self.zoom.as_ref()
    }

    /// The `w:zoom` sub-node, created empty if absent.
    pub fn zoom_or_insert(&mut self) -> &mut Zoom {
        if self.zoom.is_none() {
            self.place(Slot::Zoom);
        }
        self.zoom.get_or_insert_with(Zoom::default)
    }

    /// The `w:documentProtection` sub-node, if present.
    pub fn document_protection(&self) -> Option<&DocumentProtection> {
        self.document_protection.as_ref()
    }

    /// The `w:documentProtection` sub-node, created with no attributes if absent.
    pub fn document_protection_or_insert(&mut self) -> &mut DocumentProtection {
        if self.document_protection.is_none() {
            self.place(Slot::DocumentProtection);
        }
        self.document_protection
            .get_or_insert_with(DocumentProtection::default)
    }

    /// An on/off flag sub-node, if present.
    pub fn flag(&self, kind: FlagKind) -> Option<&OnOffFlag> {
        match kind {
            FlagKind::TrackRevisions => self.track_revisions.as_ref(),
            FlagKind::UpdateFields => self.update_fields.as_ref(),
        }
    }

    /// An on/off flag sub-node, created without `w:val` if absent.
    pub fn flag_or_insert(&mut self, kind: FlagKind) -> &mut OnOffFlag {
        if self.flag(kind).is_none() {
            self.place(Slot::Flag(kind));
        }
        self.flag_slot(kind).get_or_insert_with(OnOffFlag::default)
    }

    fn flag_slot(&mut self, kind: FlagKind) -> &mut Option<OnOffFlag> {
        match kind {
            FlagKind::TrackRevisions => &mut self.track_revisions,
            FlagKind::UpdateFields => &mut self.update_fields,
        }
    }

    /// Insert a new slot after the last sibling that precedes it in the
    /// schema sequence.
    fn place(&mut self, slot: Slot) {
        let index = match slot.schema_rank() {
            Some(rank) => self
                .children
                .iter()
                .rposition(|child| child.schema_rank().is_some_and(|r| r < rank))
                .map_or(0, |i| i + 1),
            None => self.children.len(),
        };
        debug!(?slot, index, "creating settings sub-node");
        self.children.insert(index, slot);
    }
}

/// Keep comments and processing instructions found outside the root element.
fn outside_root(event: Event<'_>) -> Result<Option<Event<'static>>> {
    match event {
        Event::Comment(_) | Event::PI(_) => Ok(Some(event.into_owned())),
        Event::Decl(_) | Event::DocType(_) => Ok(None),
        _ => Err(Error::InvalidData("content outside of the root element".to_string())),
    }
}

fn duplicate(name: &str) -> Error {
    Error::InvalidData(format!("duplicate w:{} element", name))
}

fn skip_content(
    reader: &mut NsReader<&[u8]>,
    start: &BytesStart<'_>,
    has_content: bool,
) -> Result<()> {
    if has_content {
        reader.read_to_end(start.name())?;
    }
    Ok(())
}

fn collect_subtree(
    reader: &mut NsReader<&[u8]>,
    start: BytesStart<'_>,
) -> Result<Vec<Event<'static>>> {
    let mut events = vec![Event::Start(start.into_owned())];
    let mut depth = 1usize;
    while depth > 0 {
        let event = reader.read_event()?;
        match event {
            Event::Start(_) => depth += 1,
            Event::End(_) => depth -= 1,
            Event::Eof => {
                return Err(Error::InvalidData(
                    "unexpected end of document inside w:settings".to_string(),
                ));
            }
            _ => {}
        }
        events.push(event.into_owned());
    }
    Ok(events)
}
