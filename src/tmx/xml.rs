//! Thin layer over quick-xml: a small element tree for reading and an
//! event sink for writing.

use crate::error::{MapError, Result};
use quick_xml::events::{BytesCData, BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::{Reader, Writer};
use std::io::{BufRead, Write};
use std::str::FromStr;

/// One parsed element. Text holds the concatenated character data of the
/// element itself, whitespace-only runs dropped.
#[derive(Debug, Clone, Default)]
pub(crate) struct Element {
    pub name: String,
    pub attrs: Vec<(String, String)>,
    pub children: Vec<Element>,
    pub text: String,
    pub position: u64,
}

fn element_from_start(start: &BytesStart<'_>, position: u64) -> Result<Element> {
    let name = String::from_utf8_lossy(start.name().as_ref()).into_owned();
    let mut attrs = Vec::new();
    for attr in start.attributes() {
        let attr = attr.map_err(|e| MapError::Xml {
            position,
            source: e.into(),
        })?;
        let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
        let value = attr
            .unescape_value()
            .map_err(|source| MapError::Xml { position, source })?
            .into_owned();
        attrs.push((key, value));
    }
    Ok(Element {
        name,
        attrs,
        position,
        ..Default::default()
    })
}

fn attach(stack: &mut [Element], root: &mut Option<Element>, el: Element) {
    match stack.last_mut() {
        Some(parent) => parent.children.push(el),
        None => {
            if root.is_none() {
                *root = Some(el);
            }
        }
    }
}

/// Parses a whole document and returns its root element.
pub(crate) fn parse_document<R: BufRead>(input: R) -> Result<Element> {
    let mut reader = Reader::from_reader(input);
    let mut buf = Vec::new();
    let mut stack: Vec<Element> = Vec::new();
    let mut root = None;

    loop {
        let position = reader.buffer_position() as u64;
        let event = reader
            .read_event_into(&mut buf)
            .map_err(|source| MapError::Xml {
                position: reader.buffer_position() as u64,
                source,
            })?;
        match event {
            Event::Start(start) => stack.push(element_from_start(&start, position)?),
            Event::Empty(start) => {
                let el = element_from_start(&start, position)?;
                attach(&mut stack, &mut root, el);
            }
            Event::End(_) => {
                if let Some(el) = stack.pop() {
                    attach(&mut stack, &mut root, el);
                }
            }
            Event::Text(text) => {
                if let Some(top) = stack.last_mut() {
                    let text = text
                        .unescape()
                        .map_err(|source| MapError::Xml { position, source })?;
                    if !text.trim().is_empty() {
                        top.text.push_str(&text);
                    }
                }
            }
            Event::CData(data) => {
                if let Some(top) = stack.last_mut() {
                    top.text.push_str(&String::from_utf8_lossy(&data));
                }
            }
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    if let Some(open) = stack.pop() {
        return Err(MapError::UnclosedElement { element: open.name });
    }
    root.ok_or_else(|| MapError::UnclosedElement {
        element: "document".to_owned(),
    })
}

impl Element {
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn required(&self, name: &'static str) -> Result<&str> {
        self.attr(name).ok_or_else(|| MapError::MissingAttribute {
            element: self.name.clone(),
            attribute: name,
            position: self.position,
        })
    }

    pub fn invalid(&self, name: &str, value: &str) -> MapError {
        MapError::InvalidAttribute {
            element: self.name.clone(),
            attribute: name.to_owned(),
            value: value.to_owned(),
            position: self.position,
        }
    }

    pub fn parse<T: FromStr>(&self, name: &str) -> Result<Option<T>> {
        match self.attr(name) {
            None => Ok(None),
            Some(raw) => raw
                .trim()
                .parse()
                .map(Some)
                .map_err(|_| self.invalid(name, raw)),
        }
    }

    pub fn parse_or<T: FromStr>(&self, name: &str, default: T) -> Result<T> {
        Ok(self.parse(name)?.unwrap_or(default))
    }

    pub fn parse_required<T: FromStr>(&self, name: &'static str) -> Result<T> {
        let raw = self.required(name)?;
        raw.trim().parse().map_err(|_| self.invalid(name, raw))
    }

    /// Boolean attribute written either as `0`/`1` or `false`/`true`.
    pub fn flag(&self, name: &str, default: bool) -> Result<bool> {
        match self.attr(name).map(str::trim) {
            None => Ok(default),
            Some("1") | Some("true") => Ok(true),
            Some("0") | Some("false") => Ok(false),
            Some(raw) => Err(self.invalid(name, raw)),
        }
    }

    pub fn child(&self, name: &str) -> Option<&Element> {
        self.children.iter().find(|c| c.name == name)
    }
}

/// Start tag under construction.
pub(crate) struct Tag {
    start: BytesStart<'static>,
}

impl Tag {
    pub fn new(name: &str) -> Self {
        Tag {
            start: BytesStart::new(name.to_owned()),
        }
    }

    pub fn attr(mut self, key: &str, value: impl ToString) -> Self {
        self.start.push_attribute((key, value.to_string().as_str()));
        self
    }

    pub fn attr_if(self, cond: bool, key: &str, value: impl ToString) -> Self {
        if cond {
            self.attr(key, value)
        } else {
            self
        }
    }

    pub fn attr_opt<V: ToString>(self, key: &str, value: Option<V>) -> Self {
        match value {
            Some(v) => self.attr(key, v),
            None => self,
        }
    }

    fn name(&self) -> String {
        String::from_utf8_lossy(self.start.name().as_ref()).into_owned()
    }
}

/// Indented event writer.
pub(crate) struct XmlSink<W: Write> {
    writer: Writer<W>,
    open: Vec<String>,
}

impl<W: Write> XmlSink<W> {
    pub fn new(out: W) -> Self {
        XmlSink {
            writer: Writer::new_with_indent(out, b' ', 1),
            open: Vec::new(),
        }
    }

    pub fn declaration(&mut self) -> Result<()> {
        self.writer
            .write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;
        Ok(())
    }

    pub fn doctype(&mut self, root: &str, system_id: &str) -> Result<()> {
        let body = format!("{root} SYSTEM \"{system_id}\"");
        self.writer
            .write_event(Event::DocType(BytesText::from_escaped(body)))?;
        Ok(())
    }

    pub fn comment(&mut self, text: &str) -> Result<()> {
        self.writer
            .write_event(Event::Comment(BytesText::new(&format!(" {text} "))))?;
        Ok(())
    }

    pub fn open(&mut self, tag: Tag) -> Result<()> {
        self.open.push(tag.name());
        self.writer.write_event(Event::Start(tag.start))?;
        Ok(())
    }

    pub fn empty(&mut self, tag: Tag) -> Result<()> {
        self.writer.write_event(Event::Empty(tag.start))?;
        Ok(())
    }

    /// Closes the innermost element opened with [`XmlSink::open`].
    pub fn close(&mut self) -> Result<()> {
        if let Some(name) = self.open.pop() {
            self.writer.write_event(Event::End(BytesEnd::new(name)))?;
        }
        Ok(())
    }

    /// Writes `<tag>text</tag>` with escaped text content.
    pub fn text_element(&mut self, tag: Tag, text: &str) -> Result<()> {
        self.open(tag)?;
        self.writer.write_event(Event::Text(BytesText::new(text)))?;
        self.close()
    }

    /// Writes `<tag><![CDATA[text]]></tag>`. A `]]>` inside the text is split
    /// across two sections.
    pub fn cdata_element(&mut self, tag: Tag, text: &str) -> Result<()> {
        self.open(tag)?;
        let mut rest = text;
        while let Some(at) = rest.find("]]>") {
            let (head, tail) = rest.split_at(at + 2);
            self.writer
                .write_event(Event::CData(BytesCData::new(head)))?;
            rest = tail;
        }
        self.writer.write_event(Event::CData(BytesCData::new(rest)))?;
        self.close()
    }

    pub fn into_inner(self) -> W {
        self.writer.into_inner()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write(f: impl FnOnce(&mut XmlSink<&mut Vec<u8>>) -> Result<()>) -> String {
        let mut out = Vec::new();
        let mut sink = XmlSink::new(&mut out);
        f(&mut sink).expect("write");
        String::from_utf8(out).expect("utf8")
    }

    #[test]
    fn parses_nested_elements_with_attributes() {
        let doc = r#"<?xml version="1.0"?>
<root a="1" b="x &amp; y">
  <child n="0"/>
  <child n="1">  text &lt;here&gt; </child>
  <other><![CDATA[line one
line two]]></other>
</root>"#;
        let root = parse_document(doc.as_bytes()).expect("well-formed");
        assert_eq!(root.name, "root");
        assert_eq!(root.attr("b"), Some("x & y"));
        assert_eq!(root.parse_required::<u32>("a").expect("number"), 1);
        assert_eq!(root.children.len(), 3);
        assert_eq!(root.children[1].text, "  text <here> ");
        assert_eq!(root.child("other").map(|e| e.text.as_str()), Some("line one\nline two"));
    }

    #[test]
    fn attribute_errors_name_the_element() {
        let root = parse_document(r#"<layer width="wide"/>"#.as_bytes()).expect("well-formed");
        let err = root.parse_required::<u32>("width").expect_err("not a number");
        assert!(matches!(
            err,
            MapError::InvalidAttribute { ref element, ref value, .. } if element == "layer" && value == "wide"
        ));
        let err = root.required("height").expect_err("absent");
        assert!(matches!(err, MapError::MissingAttribute { attribute: "height", .. }));
        assert!(root.flag("visible", true).expect("default"));
    }

    #[test]
    fn mismatched_tags_are_rejected() {
        let err = parse_document("<a><b></a>".as_bytes()).expect_err("mismatch");
        assert!(matches!(err, MapError::Xml { .. }));
    }

    #[test]
    fn cdata_terminator_is_split() {
        let xml = write(|s| s.cdata_element(Tag::new("p"), "a]]>b"));
        assert!(xml.contains("<![CDATA[a]]]]><![CDATA[>b]]>"), "{xml}");
        let back = parse_document(xml.as_bytes()).expect("well-formed");
        assert_eq!(back.text, "a]]>b");
    }

    #[test]
    fn sink_writes_indented_tree() {
        let xml = write(|s| {
            s.open(Tag::new("map").attr("version", "1.0"))?;
            s.empty(Tag::new("layer").attr_if(false, "x", 1).attr_opt("name", Some("g")))?;
            s.close()
        });
        assert_eq!(xml, "<map version=\"1.0\">\n <layer name=\"g\"/>\n</map>");
    }
}
