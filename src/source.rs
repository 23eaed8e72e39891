use std::collections::HashSet;
use std::io::Cursor;
use std::path::Path;

use image::{DynamicImage, GrayImage, RgbImage};
use lopdf::content::{Content, Operation};
use lopdf::{Dictionary, Document, Object, ObjectId, Stream};
use tracing::{debug, warn};

use crate::error::{ExtractError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageFormat {
    Jpeg,
    Jpx,
    Png,
    /// Undecoded stream bytes in a layout we do not convert.
    Raw,
}

impl ImageFormat {
    pub fn extension(self) -> &'static str {
        match self {
            ImageFormat::Jpeg => "jpeg",
            ImageFormat::Jpx => "jpx",
            ImageFormat::Png => "png",
            ImageFormat::Raw => "bin",
        }
    }
}

/// Placement on the page in PDF user space.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct BBox {
    pub x0: f64,
    pub y0: f64,
    pub x1: f64,
    pub y1: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PageImage {
    pub bytes: Vec<u8>,
    pub format: ImageFormat,
    pub bbox: BBox,
}

/// Anything that can hand out a document's pages as text plus images.
pub trait PageSource {
    fn page_count(&self) -> usize;
    fn page_text(&self, index: usize) -> Result<String>;
    /// Embedded images in the order the page paints them.
    fn page_images(&self, index: usize) -> Result<Vec<PageImage>>;
}

pub struct PdfSource {
    doc: Document,
    page_ids: Vec<ObjectId>,
}

impl PdfSource {
    pub fn open(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(ExtractError::InputNotFound(path.to_path_buf()));
        }
        let doc = Document::load(path)?;
        Ok(Self::from_document(doc))
    }

    pub fn from_document(doc: Document) -> Self {
        // get_pages is keyed by 1-based page number
        let page_ids = doc.get_pages().into_values().collect();
        PdfSource { doc, page_ids }
    }

    fn page_id(&self, index: usize) -> Result<ObjectId> {
        self.page_ids
            .get(index)
            .copied()
            .ok_or(ExtractError::PageOutOfRange {
                index,
                count: self.page_ids.len(),
            })
    }

    fn page_resources(&self, page_id: ObjectId) -> Result<Option<&Dictionary>> {
        match resolve_inherited(&self.doc, page_id, b"Resources")? {
            Some(obj) => Ok(resolve(&self.doc, obj)?.as_dict().ok()),
            None => Ok(None),
        }
    }
}

impl PageSource for PdfSource {
    fn page_count(&self) -> usize {
        self.page_ids.len()
    }

    fn page_text(&self, index: usize) -> Result<String> {
        let page_id = self.page_id(index)?;
        let content = self.doc.get_and_decode_page_content(page_id)?;
        Ok(text_lines(&content.operations))
    }

    fn page_images(&self, index: usize) -> Result<Vec<PageImage>> {
        let page_id = self.page_id(index)?;
        let resources = self.page_resources(page_id)?;
        if !resources.is_some_and(|r| r.has(b"XObject")) {
            return Ok(Vec::new());
        }

        let content = self.doc.get_and_decode_page_content(page_id)?;
        let mut collector = ImageCollector {
            doc: &self.doc,
            seen: HashSet::new(),
            images: Vec::new(),
        };
        collector.walk(&content.operations, resources, Matrix::IDENTITY, 0)?;

        debug!(page = index, count = collector.images.len(), "images painted on page");
        Ok(collector.images)
    }
}

/// Nested form XObjects deeper than this are not followed.
const MAX_FORM_DEPTH: usize = 8;

/// Gathers each image XObject once, at its first paint, following forms.
struct ImageCollector<'a> {
    doc: &'a Document,
    seen: HashSet<ObjectId>,
    images: Vec<PageImage>,
}

impl<'a> ImageCollector<'a> {
    fn walk(
        &mut self,
        ops: &[Operation],
        resources: Option<&'a Dictionary>,
        base: Matrix,
        depth: usize,
    ) -> Result<()> {
        let mut ctm = base;
        let mut saved = Vec::new();

        for op in ops {
            match op.operator.as_str() {
                "q" => saved.push(ctm),
                "Q" => {
                    if let Some(m) = saved.pop() {
                        ctm = m;
                    }
                }
                "cm" => {
                    if let Some(m) = Matrix::from_operands(&op.operands) {
                        ctm = m.then(&ctm);
                    }
                }
                "Do" => {
                    let Some(name) = op.operands.first().and_then(|o| o.as_name().ok()) else {
                        continue;
                    };
                    if let Some((id, stream)) = xobject(self.doc, resources, name)? {
                        self.paint(id, stream, resources, ctm, depth)?;
                    }
                }
                _ => {}
            }
        }
        Ok(())
    }

    fn paint(
        &mut self,
        id: Option<ObjectId>,
        stream: &'a Stream,
        inherited: Option<&'a Dictionary>,
        ctm: Matrix,
        depth: usize,
    ) -> Result<()> {
        match subtype(stream) {
            Some(b"Image") => {
                if let Some(id) = id {
                    if !self.seen.insert(id) {
                        return Ok(());
                    }
                }
                let (bytes, format) = decode_image(stream)?;
                self.images.push(PageImage {
                    bytes,
                    format,
                    bbox: ctm.unit_square_bbox(),
                });
            }
            Some(b"Form") if depth < MAX_FORM_DEPTH => {
                let matrix = stream
                    .dict
                    .get(b"Matrix")
                    .and_then(Object::as_array)
                    .ok()
                    .and_then(|m| Matrix::from_operands(m))
                    .unwrap_or(Matrix::IDENTITY);
                // A form without its own resources uses the painting context's.
                let resources = match stream.dict.get(b"Resources") {
                    Ok(obj) => resolve(self.doc, obj)?.as_dict().ok(),
                    Err(_) => inherited,
                };
                let content = match plain_content(stream).and_then(|data| Ok(Content::decode(&data)?)) {
                    Ok(content) => content,
                    Err(e) => {
                        warn!(error = %e, "unreadable form XObject skipped");
                        return Ok(());
                    }
                };
                self.walk(&content.operations, resources, matrix.then(&ctm), depth + 1)?;
            }
            _ => {}
        }
        Ok(())
    }
}

/// Named XObject from a resource dictionary, with its object id when indirect.
fn xobject<'a>(
    doc: &'a Document,
    resources: Option<&'a Dictionary>,
    name: &[u8],
) -> Result<Option<(Option<ObjectId>, &'a Stream)>> {
    let Some(xobjects) = resources.and_then(|r| r.get(b"XObject").ok()) else {
        return Ok(None);
    };
    let Ok(xobjects) = resolve(doc, xobjects)?.as_dict() else {
        return Ok(None);
    };
    let Ok(entry) = xobjects.get(name) else {
        return Ok(None);
    };
    let id = entry.as_reference().ok();
    Ok(resolve(doc, entry)?.as_stream().ok().map(|s| (id, s)))
}

fn subtype(stream: &Stream) -> Option<&[u8]> {
    stream.dict.get(b"Subtype").and_then(Object::as_name).ok()
}

fn resolve<'a>(doc: &'a Document, obj: &'a Object) -> Result<&'a Object> {
    match obj {
        Object::Reference(id) => Ok(doc.get_object(*id)?),
        other => Ok(other),
    }
}

/// Look `key` up on the page, then up the `/Parent` chain.
fn resolve_inherited<'a>(doc: &'a Document, page_id: ObjectId, key: &[u8]) -> Result<Option<&'a Object>> {
    let mut current = page_id;
    loop {
        let dict: &Dictionary = doc.get_dictionary(current)?;
        if let Ok(value) = dict.get(key) {
            return Ok(Some(value));
        }
        match dict.get(b"Parent").and_then(Object::as_reference) {
            Ok(parent) => current = parent,
            Err(_) => return Ok(None),
        }
    }
}

/// Reassembles the text-showing operators of a content stream into lines.
/// A line ends at `ET`, at `T*`, `'` and `"`, and wherever `Td`, `TD` or `Tm`
/// moves the baseline.
fn text_lines(ops: &[Operation]) -> String {
    let mut text = TextLines::default();
    let mut leading = 0.0;

    for op in ops {
        let operands = &op.operands;
        match op.operator.as_str() {
            "BT" => text.y = 0.0,
            "ET" => text.break_line(),
            "TL" => leading = operands.first().and_then(number).unwrap_or(leading),
            "Td" | "TD" => {
                let ty = operands.get(1).and_then(number).unwrap_or(0.0);
                if op.operator == "TD" {
                    leading = -ty;
                }
                text.move_to(text.y + ty);
            }
            "Tm" => {
                if let Some(y) = operands.get(5).and_then(number) {
                    text.move_to(y);
                }
            }
            "T*" => text.next_line(leading),
            "Tj" => text.show(operands.first()),
            "'" => {
                text.next_line(leading);
                text.show(operands.first());
            }
            "\"" => {
                text.next_line(leading);
                text.show(operands.get(2));
            }
            "TJ" => {
                let Some(Ok(items)) = operands.first().map(Object::as_array) else {
                    continue;
                };
                for item in items {
                    match number(item) {
                        // Kerning this wide is a word gap.
                        Some(adjust) if adjust < -200.0 => text.space(),
                        Some(_) => {}
                        None => text.show(Some(item)),
                    }
                }
            }
            _ => {}
        }
    }
    text.break_line();
    text.out
}

#[derive(Default)]
struct TextLines {
    out: String,
    line: String,
    y: f64,
}

impl TextLines {
    fn show(&mut self, operand: Option<&Object>) {
        if let Some(s) = operand.and_then(pdf_string) {
            self.line.push_str(&s);
        }
    }

    fn space(&mut self) {
        if !self.line.is_empty() && !self.line.ends_with(' ') {
            self.line.push(' ');
        }
    }

    fn break_line(&mut self) {
        let line = self.line.trim();
        if !line.is_empty() {
            self.out.push_str(line);
            self.out.push('\n');
        }
        self.line.clear();
    }

    fn next_line(&mut self, leading: f64) {
        self.break_line();
        self.y -= leading;
    }

    fn move_to(&mut self, y: f64) {
        if (y - self.y).abs() > f64::EPSILON {
            self.break_line();
        } else {
            self.space();
        }
        self.y = y;
    }
}

/// Text string bytes: UTF-16BE when marked with a BOM, single-byte otherwise.
fn pdf_string(obj: &Object) -> Option<String> {
    let Object::String(bytes, _) = obj else {
        return None;
    };
    Some(match bytes.strip_prefix(&[0xFE_u8, 0xFF][..]) {
        Some(utf16) => {
            let units: Vec<u16> = utf16
                .chunks_exact(2)
                .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
                .collect();
            String::from_utf16_lossy(&units)
        }
        None => bytes.iter().map(|&b| char::from(b)).collect(),
    })
}

fn number(obj: &Object) -> Option<f64> {
    match obj {
        Object::Integer(i) => Some(*i as f64),
        Object::Real(r) => Some(*r as f64),
        _ => None,
    }
}

fn filter_names(stream: &Stream) -> Vec<Vec<u8>> {
    match stream.dict.get(b"Filter") {
        Ok(Object::Name(name)) => vec![name.clone()],
        Ok(Object::Array(filters)) => filters
            .iter()
            .filter_map(|f| f.as_name().ok().map(<[u8]>::to_vec))
            .collect(),
        _ => Vec::new(),
    }
}

fn plain_content(stream: &Stream) -> Result<Vec<u8>> {
    if stream.dict.has(b"Filter") {
        Ok(stream.decompressed_content()?)
    } else {
        Ok(stream.content.clone())
    }
}

/// Undo the first `filters` of an image stream, in order.
fn unfilter(stream: &Stream, filters: &[Vec<u8>]) -> Result<Vec<u8>> {
    let Some(last) = filters.len().checked_sub(1) else {
        return Ok(stream.content.clone());
    };
    let mut plain = stream.clone();
    // lopdf refuses to decode streams marked as images
    plain.dict.remove(b"Subtype");
    let names = filters.iter().map(|f| Object::Name(f.clone())).collect();
    plain.dict.set("Filter", Object::Array(names));
    if let Ok(Object::Array(params)) = stream.dict.get(b"DecodeParms") {
        match params.get(last) {
            Some(p @ Object::Dictionary(_)) => plain.dict.set("DecodeParms", p.clone()),
            _ => {
                plain.dict.remove(b"DecodeParms");
            }
        }
    }
    Ok(plain.decompressed_content()?)
}

fn dict_int(dict: &Dictionary, key: &[u8]) -> Option<i64> {
    dict.get(key).and_then(Object::as_i64).ok()
}

/// Image bytes in their native encoding where one exists, PNG for 8-bit RGB
/// and grayscale samples, raw stream data otherwise.
fn decode_image(stream: &Stream) -> Result<(Vec<u8>, ImageFormat)> {
    let mut filters = filter_names(stream);
    let native = match filters.last().map(Vec::as_slice) {
        Some(b"DCTDecode") => Some(ImageFormat::Jpeg),
        Some(b"JPXDecode") => Some(ImageFormat::Jpx),
        _ => None,
    };
    if native.is_some() {
        filters.pop();
    }

    let samples = match unfilter(stream, &filters) {
        Ok(samples) => samples,
        Err(e) => {
            warn!(error = %e, filters = filters.len(), "cannot undo image filters, writing stream bytes");
            return Ok((stream.content.clone(), ImageFormat::Raw));
        }
    };
    if let Some(format) = native {
        return Ok((samples, format));
    }

    let dict = &stream.dict;
    let width = dict_int(dict, b"Width").unwrap_or(0) as u32;
    let height = dict_int(dict, b"Height").unwrap_or(0) as u32;
    let bits = dict_int(dict, b"BitsPerComponent").unwrap_or(8);
    let color_space = dict.get(b"ColorSpace").and_then(Object::as_name).ok();

    let decoded = match (color_space, bits) {
        (Some(b"DeviceRGB"), 8) => RgbImage::from_raw(width, height, samples.clone()).map(DynamicImage::ImageRgb8),
        (Some(b"DeviceGray"), 8) => GrayImage::from_raw(width, height, samples.clone()).map(DynamicImage::ImageLuma8),
        _ => None,
    };

    match decoded {
        Some(img) => {
            let mut buf = Cursor::new(Vec::new());
            img.write_to(&mut buf, image::ImageFormat::Png)?;
            Ok((buf.into_inner(), ImageFormat::Png))
        }
        None => {
            warn!(
                width,
                height,
                bits,
                "unsupported image layout, writing raw samples"
            );
            Ok((samples, ImageFormat::Raw))
        }
    }
}

/// PDF affine matrix `[a b c d e f]`.
#[derive(Debug, Clone, Copy, PartialEq)]
struct Matrix([f64; 6]);

impl Matrix {
    const IDENTITY: Matrix = Matrix([1.0, 0.0, 0.0, 1.0, 0.0, 0.0]);

    fn from_operands(operands: &[Object]) -> Option<Self> {
        if operands.len() != 6 {
            return None;
        }
        let mut m = [0.0; 6];
        for (slot, obj) in m.iter_mut().zip(operands) {
            *slot = number(obj)?;
        }
        Some(Matrix(m))
    }

    /// `self` applied first, then `other`.
    fn then(&self, other: &Matrix) -> Matrix {
        let [a, b, c, d, e, f] = self.0;
        let [oa, ob, oc, od, oe, of] = other.0;
        Matrix([
            a * oa + b * oc,
            a * ob + b * od,
            c * oa + d * oc,
            c * ob + d * od,
            e * oa + f * oc + oe,
            e * ob + f * od + of,
        ])
    }

    fn apply(&self, x: f64, y: f64) -> (f64, f64) {
        let [a, b, c, d, e, f] = self.0;
        (a * x + c * y + e, b * x + d * y + f)
    }

    /// Images are painted into the unit square of the current space.
    fn unit_square_bbox(&self) -> BBox {
        let corners = [self.apply(0.0, 0.0), self.apply(1.0, 0.0), self.apply(0.0, 1.0), self.apply(1.0, 1.0)];
        let mut bbox = BBox {
            x0: f64::INFINITY,
            y0: f64::INFINITY,
            x1: f64::NEG_INFINITY,
            y1: f64::NEG_INFINITY,
        };
        for (x, y) in corners {
            bbox.x0 = bbox.x0.min(x);
            bbox.y0 = bbox.y0.min(y);
            bbox.x1 = bbox.x1.max(x);
            bbox.y1 = bbox.y1.max(y);
        }
        bbox
    }
}
