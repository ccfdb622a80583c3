//! XMP properties, flattened into `Xmp.<prefix>.<path>` keys.
//!
//! A packet is parsed into a small element tree with `quick-xml`, then every
//! property of every `rdf:Description` becomes one entry. Structs and arrays
//! of structs are flattened: the container itself is an entry whose value is
//! `type="Struct"` (or `type="Seq"`, ...) and each field follows it with a
//! path key such as `Xmp.xmpMM.History[1]/stEvt:action`.
//!
//! Serializing goes the other way: the tree is rebuilt from the keys, in
//! store order, so a field must come after the container that holds it.

use std::collections::HashMap;
use std::fmt;

use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};

use super::{Metadata, MetaValue};
use crate::diagnostics::Diagnostics;
use crate::rows::{ARRAY_SEPARATOR, join};

// ============================================================================
// Namespaces
// ============================================================================

const RDF_NS: &str = "http://www.w3.org/1999/02/22-rdf-syntax-ns#";

static BUILTIN_NAMESPACES: &[(&str, &str)] = &[
    ("dc", "http://purl.org/dc/elements/1.1/"),
    ("xmp", "http://ns.adobe.com/xap/1.0/"),
    ("xmpRights", "http://ns.adobe.com/xap/1.0/rights/"),
    ("xmpMM", "http://ns.adobe.com/xap/1.0/mm/"),
    ("xmpBJ", "http://ns.adobe.com/xap/1.0/bj/"),
    ("xmpTPg", "http://ns.adobe.com/xap/1.0/t/pg/"),
    ("xmpDM", "http://ns.adobe.com/xmp/1.0/DynamicMedia/"),
    ("xmpG", "http://ns.adobe.com/xap/1.0/g/"),
    ("xmpGImg", "http://ns.adobe.com/xap/1.0/g/img/"),
    ("stEvt", "http://ns.adobe.com/xap/1.0/sType/ResourceEvent#"),
    ("stRef", "http://ns.adobe.com/xap/1.0/sType/ResourceRef#"),
    ("stDim", "http://ns.adobe.com/xap/1.0/sType/Dimensions#"),
    ("pdf", "http://ns.adobe.com/pdf/1.3/"),
    ("photoshop", "http://ns.adobe.com/photoshop/1.0/"),
    ("crs", "http://ns.adobe.com/camera-raw-settings/1.0/"),
    ("tiff", "http://ns.adobe.com/tiff/1.0/"),
    ("exif", "http://ns.adobe.com/exif/1.0/"),
    ("exifEX", "http://cipa.jp/exif/1.0/"),
    ("aux", "http://ns.adobe.com/exif/1.0/aux/"),
    ("iptc", "http://iptc.org/std/Iptc4xmpCore/1.0/xmlns/"),
    ("iptcExt", "http://iptc.org/std/Iptc4xmpExt/2008-02-29/"),
    ("lr", "http://ns.adobe.com/lightroom/1.0/"),
    ("MicrosoftPhoto", "http://ns.microsoft.com/photo/1.0/"),
    ("digiKam", "http://www.digikam.org/ns/1.0/"),
];

/// Prefix to URI registry: the built-in schemas plus whatever a parsed
/// packet declared.
#[derive(Debug, Clone, Default)]
pub struct Namespaces {
    custom: Vec<(String, String)>,
}

impl Namespaces {
    pub fn uri(&self, prefix: &str) -> Option<&str> {
        BUILTIN_NAMESPACES
            .iter()
            .find(|(p, _)| *p == prefix)
            .map(|(_, u)| *u)
            .or_else(|| {
                self.custom
                    .iter()
                    .find(|(p, _)| p == prefix)
                    .map(|(_, u)| u.as_str())
            })
    }

    pub fn prefix(&self, uri: &str) -> Option<&str> {
        BUILTIN_NAMESPACES
            .iter()
            .find(|(_, u)| *u == uri)
            .map(|(p, _)| *p)
            .or_else(|| {
                self.custom
                    .iter()
                    .find(|(_, u)| u == uri)
                    .map(|(p, _)| p.as_str())
            })
    }

    /// Register `uri`, preferring `wanted` as its prefix. Returns the prefix
    /// the URI is known by.
    pub fn register(&mut self, wanted: &str, uri: &str) -> String {
        if let Some(prefix) = self.prefix(uri) {
            return prefix.to_string();
        }
        let mut prefix = wanted.to_string();
        let mut n = 1;
        while self.uri(&prefix).is_some() {
            prefix = format!("{wanted}{n}");
            n += 1;
        }
        self.custom.push((prefix.clone(), uri.to_string()));
        prefix
    }
}

// ============================================================================
// Values
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArrayKind {
    Bag,
    Seq,
    Alt,
}

impl ArrayKind {
    fn rdf_name(self) -> &'static str {
        match self {
            ArrayKind::Bag => "rdf:Bag",
            ArrayKind::Seq => "rdf:Seq",
            ArrayKind::Alt => "rdf:Alt",
        }
    }

    fn from_rdf_name(name: &str) -> Option<Self> {
        match name {
            "rdf:Bag" => Some(ArrayKind::Bag),
            "rdf:Seq" => Some(ArrayKind::Seq),
            "rdf:Alt" => Some(ArrayKind::Alt),
            _ => None,
        }
    }
}

/// Registered type of a property.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum XmpType {
    Text,
    Array(ArrayKind),
    LangAlt,
}

static PROPERTY_TYPES: &[(&str, &str, XmpType)] = &[
    ("dc", "contributor", XmpType::Array(ArrayKind::Bag)),
    ("dc", "creator", XmpType::Array(ArrayKind::Seq)),
    ("dc", "date", XmpType::Array(ArrayKind::Seq)),
    ("dc", "description", XmpType::LangAlt),
    ("dc", "language", XmpType::Array(ArrayKind::Bag)),
    ("dc", "publisher", XmpType::Array(ArrayKind::Bag)),
    ("dc", "relation", XmpType::Array(ArrayKind::Bag)),
    ("dc", "rights", XmpType::LangAlt),
    ("dc", "subject", XmpType::Array(ArrayKind::Bag)),
    ("dc", "title", XmpType::LangAlt),
    ("dc", "type", XmpType::Array(ArrayKind::Bag)),
    ("xmp", "Advisory", XmpType::Array(ArrayKind::Bag)),
    ("xmp", "Identifier", XmpType::Array(ArrayKind::Bag)),
    ("xmpRights", "Owner", XmpType::Array(ArrayKind::Bag)),
    ("xmpRights", "UsageTerms", XmpType::LangAlt),
    ("photoshop", "SupplementalCategories", XmpType::Array(ArrayKind::Bag)),
    ("lr", "hierarchicalSubject", XmpType::Array(ArrayKind::Bag)),
    ("digiKam", "TagsList", XmpType::Array(ArrayKind::Seq)),
    ("MicrosoftPhoto", "LastKeywordXMP", XmpType::Array(ArrayKind::Bag)),
    ("MicrosoftPhoto", "LastKeywordIPTC", XmpType::Array(ArrayKind::Bag)),
    ("iptc", "SubjectCode", XmpType::Array(ArrayKind::Bag)),
    ("iptc", "Scene", XmpType::Array(ArrayKind::Bag)),
    ("tiff", "BitsPerSample", XmpType::Array(ArrayKind::Seq)),
    ("tiff", "YCbCrSubSampling", XmpType::Array(ArrayKind::Seq)),
    ("exif", "ISOSpeedRatings", XmpType::Array(ArrayKind::Seq)),
    ("exif", "SubjectArea", XmpType::Array(ArrayKind::Seq)),
    ("exif", "ComponentsConfiguration", XmpType::Array(ArrayKind::Seq)),
];

/// What a struct or struct array entry stands for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Composite {
    Struct,
    Array(ArrayKind),
}

impl Composite {
    fn name(self) -> &'static str {
        match self {
            Composite::Struct => "Struct",
            Composite::Array(ArrayKind::Bag) => "Bag",
            Composite::Array(ArrayKind::Seq) => "Seq",
            Composite::Array(ArrayKind::Alt) => "Alt",
        }
    }

    fn from_name(name: &str) -> Option<Self> {
        match name {
            "Struct" => Some(Composite::Struct),
            "Bag" => Some(Composite::Array(ArrayKind::Bag)),
            "Seq" => Some(Composite::Array(ArrayKind::Seq)),
            "Alt" => Some(Composite::Array(ArrayKind::Alt)),
            _ => None,
        }
    }
}

const DEFAULT_LANG: &str = "x-default";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum XmpValue {
    Text(Vec<u8>),
    Array(ArrayKind, Vec<Vec<u8>>),
    LangAlt(Vec<(String, Vec<u8>)>),
    /// A struct or array of structs; its members are separate entries.
    Container(Composite),
}

impl XmpValue {
    /// An empty value of the given registered type.
    pub fn empty(ty: XmpType) -> Self {
        match ty {
            XmpType::Text => XmpValue::Text(Vec::new()),
            XmpType::Array(kind) => XmpValue::Array(kind, Vec::new()),
            XmpType::LangAlt => XmpValue::LangAlt(Vec::new()),
        }
    }

    /// Apply one written piece of text.
    ///
    /// Arrays append non-empty pieces, language alternatives replace the
    /// piece's language (`lang="de" text`, x-default otherwise), and text
    /// values are overwritten. `type="Seq"` and friends turn a text value into
    /// a container.
    pub fn assign(&mut self, piece: &[u8]) -> Result<(), String> {
        match self {
            XmpValue::Array(_, items) => {
                if !piece.is_empty() {
                    items.push(piece.to_vec());
                }
            }
            XmpValue::LangAlt(items) => {
                let (lang, text) = split_lang(piece)?;
                match items.iter_mut().find(|(l, _)| *l == lang) {
                    Some(item) => item.1 = text,
                    None if lang == DEFAULT_LANG => items.insert(0, (lang, text)),
                    None => items.push((lang, text)),
                }
            }
            XmpValue::Text(_) | XmpValue::Container(_) => {
                *self = match piece.strip_prefix(b"type=") {
                    Some(rest) => {
                        let end = rest.iter().position(|&b| b == b' ').unwrap_or(rest.len());
                        let name = String::from_utf8_lossy(&rest[..end]);
                        let name = name.trim_matches('"');
                        let composite = Composite::from_name(name)
                            .ok_or_else(|| format!("Invalid value for XMP type `{name}'"))?;
                        XmpValue::Container(composite)
                    }
                    None => XmpValue::Text(piece.to_vec()),
                };
            }
        }
        Ok(())
    }
}

fn split_lang(piece: &[u8]) -> Result<(String, Vec<u8>), String> {
    let Some(rest) = piece.strip_prefix(b"lang=") else {
        return Ok((DEFAULT_LANG.to_string(), piece.to_vec()));
    };
    let (lang, text) = match rest.strip_prefix(b"\"") {
        Some(quoted) => {
            let end = quoted
                .iter()
                .position(|&b| b == b'"')
                .ok_or_else(|| "Invalid LangAlt value: missing closing quote".to_string())?;
            (&quoted[..end], quoted.get(end + 1..).unwrap_or_default())
        }
        None => {
            let end = rest.iter().position(|&b| b == b' ').unwrap_or(rest.len());
            (&rest[..end], rest.get(end..).unwrap_or_default())
        }
    };
    let lang = std::str::from_utf8(lang)
        .ok()
        .filter(|l| !l.is_empty() && l.bytes().all(|b| b.is_ascii_alphanumeric() || b == b'-'))
        .ok_or_else(|| format!("Invalid language qualifier '{}'", String::from_utf8_lossy(lang)))?;
    let text = text.strip_prefix(b" ").unwrap_or(text);
    Ok((lang.to_string(), text.to_vec()))
}

impl MetaValue for XmpValue {
    fn type_name(&self) -> Option<&'static str> {
        Some(match self {
            XmpValue::Text(_) | XmpValue::Container(_) => "XmpText",
            XmpValue::Array(ArrayKind::Bag, _) => "XmpBag",
            XmpValue::Array(ArrayKind::Seq, _) => "XmpSeq",
            XmpValue::Array(ArrayKind::Alt, _) => "XmpAlt",
            XmpValue::LangAlt(_) => "LangAlt",
        })
    }

    fn to_bytes(&self) -> Vec<u8> {
        match self {
            XmpValue::Text(v) => v.clone(),
            XmpValue::Array(_, items) => join(items, ARRAY_SEPARATOR),
            XmpValue::LangAlt(items) => {
                let parts: Vec<Vec<u8>> = items
                    .iter()
                    .map(|(lang, text)| {
                        let mut part = format!("lang=\"{lang}\" ").into_bytes();
                        part.extend_from_slice(text);
                        part
                    })
                    .collect();
                join(&parts, ARRAY_SEPARATOR)
            }
            XmpValue::Container(c) => format!("type=\"{}\"", c.name()).into_bytes(),
        }
    }
}

// ============================================================================
// Keys
// ============================================================================

/// `Xmp.<prefix>.<property path>`
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct XmpKey(String);

impl XmpKey {
    fn from_parts(prefix: &str, path: &str) -> Self {
        XmpKey(format!("Xmp.{prefix}.{path}"))
    }

    pub fn prefix(&self) -> &str {
        self.split().0
    }

    /// Everything after the prefix, e.g. `History[1]/stEvt:action`.
    pub fn path(&self) -> &str {
        self.split().1
    }

    fn split(&self) -> (&str, &str) {
        let rest = &self.0[4..];
        rest.split_once('.').unwrap_or((rest, ""))
    }

    pub fn is_nested(&self) -> bool {
        self.path().contains(['[', '/'])
    }

    /// Registered type for values written to this key.
    pub fn default_type(&self) -> XmpType {
        if self.is_nested() {
            return XmpType::Text;
        }
        let (prefix, name) = self.split();
        PROPERTY_TYPES
            .iter()
            .find(|(p, n, _)| *p == prefix && *n == name)
            .map_or(XmpType::Text, |(_, _, t)| *t)
    }
}

impl fmt::Display for XmpKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ============================================================================
// Store
// ============================================================================

/// The XMP store of one image.
#[derive(Debug, Clone, Default)]
pub struct XmpData {
    entries: Metadata<XmpKey, XmpValue>,
    namespaces: Namespaces,
}

impl XmpData {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> &Metadata<XmpKey, XmpValue> {
        &self.entries
    }

    pub fn entries_mut(&mut self) -> &mut Metadata<XmpKey, XmpValue> {
        &mut self.entries
    }

    pub fn namespaces(&self) -> &Namespaces {
        &self.namespaces
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Validate a key against the namespace registry.
    pub fn key(&self, text: &str) -> Result<XmpKey, String> {
        let rest = text
            .strip_prefix("Xmp.")
            .ok_or_else(|| format!("Invalid XMP key `{text}'"))?;
        let (prefix, path) = rest
            .split_once('.')
            .filter(|(p, path)| !p.is_empty() && !path.is_empty())
            .ok_or_else(|| format!("Invalid XMP key `{text}'"))?;
        if self.namespaces.uri(prefix).is_none() {
            return Err(format!("No namespace info available for XMP prefix `{prefix}'"));
        }
        Ok(XmpKey::from_parts(prefix, path))
    }

    /// Write one piece to `key`, creating the entry with the key's
    /// registered type when it does not exist yet.
    pub fn assign(&mut self, key: XmpKey, piece: &[u8]) -> Result<(), String> {
        if let Some(value) = self.entries.get_mut(&key) {
            return value.assign(piece);
        }
        let mut value = XmpValue::empty(key.default_type());
        value.assign(piece)?;
        self.entries.add(key, value);
        Ok(())
    }
}

// ============================================================================
// Parsing
// ============================================================================

#[derive(Debug, Default)]
struct Element {
    name: String,
    attrs: Vec<(String, String)>,
    children: Vec<Element>,
    text: String,
}

impl Element {
    fn attr(&self, name: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    /// Attributes that are properties rather than syntax.
    fn property_attrs(&self) -> impl Iterator<Item = &(String, String)> {
        self.attrs.iter().filter(|(k, _)| {
            k != "xmlns"
                && !k.starts_with("xmlns:")
                && !k.starts_with("rdf:")
                && !k.starts_with("xml:")
        })
    }

    fn is_resource(&self) -> bool {
        self.attr("rdf:parseType") == Some("Resource")
    }

    fn child(&self, name: &str) -> Option<&Element> {
        self.children.iter().find(|c| c.name == name)
    }

    fn is_simple(&self) -> bool {
        self.children.is_empty() && self.property_attrs().next().is_none() && !self.is_resource()
    }

    fn find(&self, name: &str) -> Option<&Element> {
        if self.name == name {
            return Some(self);
        }
        self.children.iter().find_map(|c| c.find(name))
    }

    fn walk<'a>(&'a self, f: &mut impl FnMut(&'a Element)) {
        f(self);
        for child in &self.children {
            child.walk(f);
        }
    }

    /// Rewrite names in any of `aliases` to the `rdf:` prefix the
    /// flattener matches on.
    fn rename_prefix(&mut self, aliases: &[String]) {
        let rename = |name: &mut String| {
            let renamed = match name.split_once(':') {
                Some((prefix, local)) if aliases.iter().any(|a| a == prefix) => format!("rdf:{local}"),
                _ => return,
            };
            *name = renamed;
        };
        rename(&mut self.name);
        for (key, _) in &mut self.attrs {
            rename(key);
        }
        for child in &mut self.children {
            child.rename_prefix(aliases);
        }
    }
}

fn start_element(e: &BytesStart<'_>) -> Result<Element, String> {
    let name = std::str::from_utf8(e.name().as_ref())
        .map_err(|err| err.to_string())?
        .to_string();
    let mut attrs = Vec::new();
    for attr in e.attributes() {
        let attr = attr.map_err(|err| err.to_string())?;
        let key = std::str::from_utf8(attr.key.as_ref())
            .map_err(|err| err.to_string())?
            .to_string();
        let value = attr.unescape_value().map_err(|err| err.to_string())?;
        attrs.push((key, value.into_owned()));
    }
    Ok(Element {
        name,
        attrs,
        ..Element::default()
    })
}

fn parse_tree(xml: &str) -> Result<Element, String> {
    let mut reader = Reader::from_str(xml);
    let mut stack = vec![Element::default()];

    loop {
        match reader.read_event().map_err(|e| e.to_string())? {
            Event::Start(e) => stack.push(start_element(&e)?),
            Event::Empty(e) => {
                let element = start_element(&e)?;
                if let Some(parent) = stack.last_mut() {
                    parent.children.push(element);
                }
            }
            Event::End(_) => {
                let element = stack.pop().ok_or("unbalanced end tag")?;
                let parent = stack.last_mut().ok_or("unbalanced end tag")?;
                parent.children.push(element);
            }
            Event::Text(t) => {
                let text = t.unescape().map_err(|e| e.to_string())?;
                if let Some(top) = stack.last_mut() {
                    top.text.push_str(&text);
                }
            }
            Event::CData(c) => {
                if let Some(top) = stack.last_mut() {
                    top.text.push_str(&String::from_utf8_lossy(&c));
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    match (stack.pop(), stack.is_empty()) {
        (Some(root), true) => Ok(root),
        _ => Err("unclosed element".to_string()),
    }
}

/// Turns the element tree into flattened entries.
struct Flattener<'a> {
    /// Document prefix to registered prefix.
    prefixes: HashMap<String, String>,
    out: &'a mut XmpData,
    diag: &'a mut Diagnostics,
}

impl Flattener<'_> {
    fn qualified(&mut self, name: &str) -> Option<String> {
        let (doc_prefix, local) = name.split_once(':')?;
        match self.prefixes.get(doc_prefix) {
            Some(prefix) => Some(format!("{prefix}:{local}")),
            None => {
                self.diag.warn(format!("XMP property {name} has no namespace; skipping"));
                None
            }
        }
    }

    fn push(&mut self, key: String, value: XmpValue) {
        self.out.entries.add(XmpKey(key), value);
    }

    fn description(&mut self, desc: &Element) {
        for (name, value) in desc.property_attrs() {
            if let Some(q) = self.qualified(name) {
                self.push(top_key(&q), XmpValue::Text(value.as_bytes().to_vec()));
            }
        }
        for child in &desc.children {
            if let Some(q) = self.qualified(&child.name) {
                self.property(top_key(&q), child);
            }
        }
    }

    fn property(&mut self, path: String, el: &Element) {
        if let Some((kind, array)) = el
            .children
            .iter()
            .find_map(|c| ArrayKind::from_rdf_name(&c.name).map(|k| (k, c)))
        {
            self.array(path, kind, array);
        } else if el.is_resource() {
            self.push(path.clone(), XmpValue::Container(Composite::Struct));
            self.fields(&path, el);
        } else if let Some(desc) = el.child("rdf:Description") {
            self.push(path.clone(), XmpValue::Container(Composite::Struct));
            self.fields(&path, desc);
        } else if let Some(resource) = el.attr("rdf:resource") {
            self.push(path, XmpValue::Text(resource.as_bytes().to_vec()));
        } else if !el.is_simple() {
            self.push(path.clone(), XmpValue::Container(Composite::Struct));
            self.fields(&path, el);
        } else {
            self.push(path, XmpValue::Text(el.text.as_bytes().to_vec()));
        }
    }

    fn array(&mut self, path: String, kind: ArrayKind, array: &Element) {
        let items: Vec<&Element> = array.children.iter().filter(|c| c.name == "rdf:li").collect();

        let lang_alt = kind == ArrayKind::Alt
            && !items.is_empty()
            && items.iter().all(|li| li.is_simple() && li.attr("xml:lang").is_some());
        if lang_alt {
            let entries = items
                .iter()
                .map(|li| {
                    let lang = li.attr("xml:lang").unwrap_or(DEFAULT_LANG).to_string();
                    (lang, li.text.as_bytes().to_vec())
                })
                .collect();
            self.push(path, XmpValue::LangAlt(entries));
            return;
        }

        if items.iter().all(|li| li.is_simple()) {
            let texts = items.iter().map(|li| li.text.as_bytes().to_vec()).collect();
            self.push(path, XmpValue::Array(kind, texts));
            return;
        }

        self.push(path.clone(), XmpValue::Container(Composite::Array(kind)));
        for (i, li) in items.iter().enumerate() {
            let item_path = format!("{path}[{}]", i + 1);
            if li.is_simple() {
                self.push(item_path, XmpValue::Text(li.text.as_bytes().to_vec()));
            } else if let Some(desc) = li.child("rdf:Description") {
                self.fields(&item_path, desc);
            } else {
                self.fields(&item_path, li);
            }
        }
    }

    fn fields(&mut self, base: &str, el: &Element) {
        for (name, value) in el.property_attrs() {
            if let Some(q) = self.qualified(name) {
                self.push(format!("{base}/{q}"), XmpValue::Text(value.as_bytes().to_vec()));
            }
        }
        for child in &el.children {
            if child.name == "rdf:Description" {
                continue;
            }
            if let Some(q) = self.qualified(&child.name) {
                self.property(format!("{base}/{q}"), child);
            }
        }
    }
}

/// `dc:subject` becomes `Xmp.dc.subject`.
fn top_key(qualified: &str) -> String {
    match qualified.split_once(':') {
        Some((prefix, local)) => format!("Xmp.{prefix}.{local}"),
        None => format!("Xmp.{qualified}"),
    }
}

/// Parse an XMP packet. Returns `None` when the packet is not well-formed XML.
pub fn decode(packet: &str, diag: &mut Diagnostics) -> Option<XmpData> {
    let mut out = XmpData::new();
    if packet.trim().is_empty() {
        return Some(out);
    }

    let mut root = match parse_tree(packet) {
        Ok(root) => root,
        Err(e) => {
            diag.warn(format!("XMP parsing failure: {e}"));
            return None;
        }
    };

    let mut declared = Vec::new();
    root.walk(&mut |el| {
        for (k, v) in &el.attrs {
            if let Some(prefix) = k.strip_prefix("xmlns:") {
                declared.push((prefix.to_string(), v.clone()));
            }
        }
    });

    let rdf_aliases: Vec<String> = declared
        .iter()
        .filter(|(prefix, uri)| uri == RDF_NS && prefix != "rdf")
        .map(|(prefix, _)| prefix.clone())
        .collect();

    let mut prefixes = HashMap::new();
    for (doc_prefix, uri) in declared {
        if uri == RDF_NS || doc_prefix == "x" || prefixes.contains_key(&doc_prefix) {
            continue;
        }
        let prefix = out.namespaces.register(&doc_prefix, &uri);
        prefixes.insert(doc_prefix, prefix);
    }

    if !rdf_aliases.is_empty() {
        root.rename_prefix(&rdf_aliases);
    }

    let Some(rdf) = root.find("rdf:RDF") else {
        diag.warn("XMP packet has no rdf:RDF element");
        return Some(out);
    };

    let mut flattener = Flattener {
        prefixes,
        out: &mut out,
        diag: &mut *diag,
    };
    for desc in rdf.children.iter().filter(|c| c.name == "rdf:Description") {
        flattener.description(desc);
    }

    diag.debug(format!("Decoded {} XMP entries", out.entries.len()));
    Some(out)
}

// ============================================================================
// Serializing
// ============================================================================

const NOT_AN_ARRAY: &str = "XMP Toolkit error 102: Indexing applied to non-array";
const NOT_A_STRUCT: &str = "XMP Toolkit error 102: Named children only allowed for schemas and structs";
const INVALID_UTF8: &str = "XMP Toolkit error 5: Invalid UTF-8 data byte";

#[derive(Debug, Clone, PartialEq)]
enum Node {
    Text(String),
    Array(ArrayKind, Vec<Node>),
    LangAlt(Vec<(String, String)>),
    Struct(Vec<(String, Node)>),
}

#[derive(Debug, Clone, PartialEq)]
enum Step {
    Field(String),
    Index(usize),
}

impl Step {
    fn unreachable_error(&self) -> &'static str {
        match self {
            Step::Index(_) => NOT_AN_ARRAY,
            Step::Field(_) => NOT_A_STRUCT,
        }
    }
}

/// Split `History[1]/stEvt:action` (under `prefix`) into steps.
fn parse_path(prefix: &str, path: &str) -> Option<Vec<Step>> {
    let first_end = path.find(['[', '/']).unwrap_or(path.len());
    let mut steps = vec![Step::Field(format!("{prefix}:{}", &path[..first_end]))];
    let mut rest = &path[first_end..];

    while !rest.is_empty() {
        if let Some(tail) = rest.strip_prefix('[') {
            let close = tail.find(']')?;
            let index: usize = tail[..close].parse().ok().filter(|&i| i > 0)?;
            steps.push(Step::Index(index));
            rest = &tail[close + 1..];
        } else if let Some(tail) = rest.strip_prefix('/') {
            let end = tail.find(['[', '/']).unwrap_or(tail.len());
            let name = &tail[..end];
            if !name.contains(':') {
                return None;
            }
            steps.push(Step::Field(name.to_string()));
            rest = &tail[end..];
        } else {
            return None;
        }
    }
    Some(steps)
}

fn place(node: &mut Node, steps: &[Step], value: Node) -> Result<(), &'static str> {
    let Some((step, rest)) = steps.split_first() else {
        *node = value;
        return Ok(());
    };
    match (node, step) {
        (Node::Struct(fields), Step::Field(name)) => {
            let pos = fields.iter().position(|(n, _)| n == name);
            match (pos, rest.first()) {
                (Some(i), _) => place(&mut fields[i].1, rest, value),
                (None, None) => {
                    fields.push((name.clone(), value));
                    Ok(())
                }
                (None, Some(next)) => Err(next.unreachable_error()),
            }
        }
        (Node::Array(_, items), Step::Index(n)) => {
            let idx = n - 1;
            if idx > items.len() {
                return Err(NOT_AN_ARRAY);
            }
            if idx == items.len() {
                if rest.is_empty() {
                    items.push(value);
                    return Ok(());
                }
                items.push(Node::Struct(Vec::new()));
            }
            place(&mut items[idx], rest, value)
        }
        (_, step) => Err(step.unreachable_error()),
    }
}

fn utf8(bytes: &[u8]) -> Result<String, &'static str> {
    String::from_utf8(bytes.to_vec()).map_err(|_| INVALID_UTF8)
}

fn to_node(value: &XmpValue) -> Result<Node, &'static str> {
    Ok(match value {
        XmpValue::Text(v) => Node::Text(utf8(v)?),
        XmpValue::Array(kind, items) => Node::Array(
            *kind,
            items
                .iter()
                .map(|i| utf8(i).map(Node::Text))
                .collect::<Result<_, _>>()?,
        ),
        XmpValue::LangAlt(items) => Node::LangAlt(
            items
                .iter()
                .map(|(l, t)| utf8(t).map(|t| (l.clone(), t)))
                .collect::<Result<_, _>>()?,
        ),
        XmpValue::Container(Composite::Struct) => Node::Struct(Vec::new()),
        XmpValue::Container(Composite::Array(kind)) => Node::Array(*kind, Vec::new()),
    })
}

fn collect_prefixes(name: &str, node: &Node, out: &mut Vec<String>) {
    if let Some((prefix, _)) = name.split_once(':') {
        if prefix != "rdf" && !out.iter().any(|p| p == prefix) {
            out.push(prefix.to_string());
        }
    }
    match node {
        Node::Array(_, items) => items.iter().for_each(|i| collect_prefixes("rdf:li", i, out)),
        Node::Struct(fields) => fields.iter().for_each(|(n, f)| collect_prefixes(n, f, out)),
        Node::Text(_) | Node::LangAlt(_) => {}
    }
}

fn xml_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

fn write_node(xml: &mut String, name: &str, node: &Node, depth: usize) {
    let pad = "  ".repeat(depth);
    match node {
        Node::Text(text) => {
            xml.push_str(&format!("{pad}<{name}>{}</{name}>\n", xml_escape(text)));
        }
        Node::Array(kind, items) => {
            let array = kind.rdf_name();
            xml.push_str(&format!("{pad}<{name}>\n"));
            if items.is_empty() {
                xml.push_str(&format!("{pad}  <{array}/>\n"));
            } else {
                xml.push_str(&format!("{pad}  <{array}>\n"));
                for item in items {
                    write_node(xml, "rdf:li", item, depth + 2);
                }
                xml.push_str(&format!("{pad}  </{array}>\n"));
            }
            xml.push_str(&format!("{pad}</{name}>\n"));
        }
        Node::LangAlt(items) => {
            xml.push_str(&format!("{pad}<{name}>\n{pad}  <rdf:Alt>\n"));
            for (lang, text) in items {
                xml.push_str(&format!(
                    "{pad}    <rdf:li xml:lang=\"{}\">{}</rdf:li>\n",
                    xml_escape(lang),
                    xml_escape(text)
                ));
            }
            xml.push_str(&format!("{pad}  </rdf:Alt>\n{pad}</{name}>\n"));
        }
        Node::Struct(fields) if fields.is_empty() => {
            xml.push_str(&format!("{pad}<{name} rdf:parseType=\"Resource\"/>\n"));
        }
        Node::Struct(fields) => {
            xml.push_str(&format!("{pad}<{name} rdf:parseType=\"Resource\">\n"));
            for (field, value) in fields {
                write_node(xml, field, value, depth + 1);
            }
            xml.push_str(&format!("{pad}</{name}>\n"));
        }
    }
}

fn build_tree(data: &XmpData) -> Result<Vec<(String, Node)>, String> {
    let mut root = Node::Struct(Vec::new());
    for d in data.entries.iter() {
        let steps = parse_path(d.key.prefix(), d.key.path())
            .ok_or_else(|| format!("Invalid XMP key `{}'", d.key))?;
        let node = to_node(&d.value).map_err(str::to_string)?;
        place(&mut root, &steps, node).map_err(str::to_string)?;
    }
    match root {
        Node::Struct(props) => Ok(props),
        _ => Ok(Vec::new()),
    }
}

/// Serialize the store into a packet. On failure the reasons are reported
/// as errors and `None` is returned.
pub fn encode(data: &XmpData, diag: &mut Diagnostics) -> Option<String> {
    let props = match build_tree(data) {
        Ok(props) => props,
        Err(e) => {
            diag.error(e);
            diag.error("Failed to encode XMP metadata.");
            return None;
        }
    };

    let mut prefixes = Vec::new();
    for (name, node) in &props {
        collect_prefixes(name, node, &mut prefixes);
    }

    let mut xml = String::new();
    xml.push_str("<?xpacket begin=\"\u{feff}\" id=\"W5M0MpCehiHzreSzNTczkc9d\"?>\n");
    xml.push_str("<x:xmpmeta xmlns:x=\"adobe:ns:meta/\" x:xmptk=\"imgmeta\">\n");
    xml.push_str(&format!(" <rdf:RDF xmlns:rdf=\"{RDF_NS}\">\n"));
    xml.push_str("  <rdf:Description rdf:about=\"\"");
    for prefix in &prefixes {
        let Some(uri) = data.namespaces.uri(prefix) else {
            diag.error(format!("No namespace info available for XMP prefix `{prefix}'"));
            diag.error("Failed to encode XMP metadata.");
            return None;
        };
        xml.push_str(&format!("\n    xmlns:{prefix}=\"{}\"", xml_escape(uri)));
    }
    xml.push_str(">\n");
    for (name, node) in &props {
        write_node(&mut xml, name, node, 3);
    }
    xml.push_str("  </rdf:Description>\n");
    xml.push_str(" </rdf:RDF>\n");
    xml.push_str("</x:xmpmeta>\n");
    xml.push_str("<?xpacket end=\"w\"?>");
    Some(xml)
}
