//! Stroke-to-PDF rendering.
//!
//! Output pages are 600 pt tall with the aspect ratio of the tablet's
//! 1404x1872 canvas. Each page draws its background template first (an
//! image XObject scaled to fill the page), then every stroke in file
//! order as a round-capped polyline. Pen opacity goes through ExtGState
//! dictionaries, one per distinct alpha used by the document.

use super::{LinesFile, Stroke, CANVAS_HEIGHT, CANVAS_WIDTH};
use crate::error::{RemfsError, Result};
use flate2::write::ZlibEncoder;
use flate2::Compression;
use log::warn;
use pdf_writer::types::{LineCapStyle, LineJoinStyle};
use pdf_writer::{Content, Filter, Finish, Name, Pdf, Rect, Ref};
use std::collections::BTreeSet;
use std::io::Write;
use std::path::PathBuf;
use zune_png::zune_core::colorspace::ColorSpace;
use zune_png::zune_core::result::DecodingResult;
use zune_png::PngDecoder;

const PAGE_HEIGHT: f32 = 600.0;

/// Per-stroke draw parameters after applying the pen table. Widths are
/// in stroke units; the dynamic brushes recompute theirs per segment.
struct PenStyle {
    width: f32,
    opacity: f32,
    colour: u32,
    dynamic: bool,
}

fn pen_style(stroke: &Stroke) -> PenStyle {
    let w = stroke.width;
    let (width, opacity, colour, dynamic) = match stroke.pen {
        // Dynamic brushes; width (and opacity for pen 1) vary per segment.
        0 | 1 => (w, 1.0, stroke.colour, true),
        // Ballpoint / fineliner.
        2 | 4 => (32.0 * w * w - 116.0 * w + 107.0, 1.0, stroke.colour, false),
        // Marker.
        3 => (64.0 * w - 112.0, 0.9, stroke.colour, false),
        // Highlighter.
        5 => (30.0, 0.2, stroke.colour, false),
        // Eraser paints canvas white.
        6 => (1280.0 * w * w - 4800.0 * w + 4510.0, 1.0, 2, false),
        // Sharp pencil.
        7 => (16.0 * w - 27.0, 0.9, stroke.colour, false),
        // Erase-area strokes are bookkeeping, not ink.
        8 => (w, 0.0, stroke.colour, false),
        other => {
            warn!("unknown pen {}, drawing invisible", other);
            (w, 0.0, stroke.colour, false)
        }
    };
    PenStyle {
        width,
        opacity,
        colour,
        dynamic,
    }
}

fn segment_width(pen: u32, base: f32, pressure: f32, tilt: f32) -> f32 {
    match pen {
        0 => (5.0 * tilt) * (6.0 * base - 10.0) * (1.0 + 2.0 * pressure.powi(3)),
        1 => (10.0 * tilt - 2.0) * (8.0 * base - 14.0),
        _ => base,
    }
}

fn segment_opacity(pen: u32, pressure: f32) -> Option<f32> {
    match pen {
        1 => Some((pressure - 0.2) * (pressure - 0.2)),
        _ => None,
    }
}

fn grey_level(colour: u32) -> f32 {
    match colour {
        0 => 0.0,
        1 => 128.0 / 255.0,
        2 => 1.0,
        _ => 0.0,
    }
}

/// Alpha quantised to a permille so ExtGState dictionaries can be
/// shared; also doubles as the resource name (`a200`, `a900`, ...).
fn alpha_key(opacity: f32) -> u16 {
    (opacity.clamp(0.0, 1.0) * 1000.0).round() as u16
}

fn collect_alphas(doc: &LinesFile) -> BTreeSet<u16> {
    let mut alphas = BTreeSet::new();
    for stroke in doc
        .pages
        .iter()
        .flat_map(|p| &p.layers)
        .flat_map(|l| &l.strokes)
    {
        let style = pen_style(stroke);
        alphas.insert(alpha_key(style.opacity));
        for seg in &stroke.segments {
            if let Some(op) = segment_opacity(stroke.pen, seg.pressure) {
                alphas.insert(alpha_key(op));
            }
        }
    }
    alphas
}

/// A decoded template image ready for embedding: 8-bit samples,
/// Zlib-compressed, either DeviceRGB or DeviceGray.
struct TemplateImage {
    samples: Vec<u8>,
    width: u32,
    height: u32,
    grayscale: bool,
}

fn decode_template(path: &PathBuf) -> Option<TemplateImage> {
    let data = std::fs::read(path).ok()?;
    let mut decoder = PngDecoder::new(data.as_slice());
    decoder.decode_headers().ok()?;
    let colorspace = decoder.get_colorspace()?;
    let (width, height) = {
        let info = decoder.get_info()?;
        (info.width as u32, info.height as u32)
    };
    let decoded = decoder.decode().ok()?;

    let raw = match decoded {
        DecodingResult::U8(buf) => buf,
        DecodingResult::U16(buf) => buf.into_iter().map(|v| (v >> 8) as u8).collect(),
        _ => return None,
    };

    // Templates are opaque backgrounds; alpha channels are dropped.
    let (samples, grayscale) = match colorspace {
        ColorSpace::RGB => (raw, false),
        ColorSpace::RGBA => (
            raw.chunks_exact(4).flat_map(|px| px[..3].to_vec()).collect(),
            false,
        ),
        ColorSpace::Luma => (raw, true),
        ColorSpace::LumaA => (raw.chunks_exact(2).map(|px| px[0]).collect(), true),
        _ => return None,
    };

    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(&samples).ok()?;
    let samples = encoder.finish().ok()?;

    Some(TemplateImage {
        samples,
        width,
        height,
        grayscale,
    })
}

/// Render a decoded notebook to PDF bytes. `templates` holds one
/// optional PNG path per page; a short list leaves the remaining pages
/// untemplated.
pub fn render(doc: &LinesFile, templates: &[Option<PathBuf>]) -> Result<Vec<u8>> {
    let page_w = PAGE_HEIGHT * CANVAS_WIDTH / CANVAS_HEIGHT;
    let page_h = PAGE_HEIGHT;
    let xfactor = page_w / CANVAS_WIDTH;
    let yfactor = page_h / CANVAS_HEIGHT;

    let mut pdf = Pdf::new();
    let mut alloc = Ref::new(1);
    let catalog_ref = alloc.bump();
    let page_tree_ref = alloc.bump();

    // One shared ExtGState per distinct alpha in the document.
    let alphas = collect_alphas(doc);
    let gs_refs: Vec<(u16, Ref)> = alphas.into_iter().map(|a| (a, alloc.bump())).collect();
    for &(key, gs_ref) in &gs_refs {
        let alpha = key as f32 / 1000.0;
        pdf.ext_graphics(gs_ref)
            .stroking_alpha(alpha)
            .non_stroking_alpha(alpha);
    }
    let gs_name = |key: u16| format!("a{}", key);

    let mut page_refs = Vec::with_capacity(doc.pages.len());
    let mut deferred = Vec::new();

    for (pageno, page) in doc.pages.iter().enumerate() {
        let page_ref = alloc.bump();
        let content_ref = alloc.bump();
        page_refs.push(page_ref);

        let template = templates
            .get(pageno)
            .and_then(|t| t.as_ref())
            .and_then(|path| {
                let image = decode_template(path);
                if image.is_none() {
                    warn!("template {:?} did not decode, skipping", path);
                }
                image
            })
            .map(|image| (alloc.bump(), image));

        let mut content = Content::new();
        content.set_line_cap(LineCapStyle::RoundCap);
        content.set_line_join(LineJoinStyle::RoundJoin);

        if template.is_some() {
            content.save_state();
            content.transform([page_w, 0.0, 0.0, page_h, 0.0, 0.0]);
            content.x_object(Name(b"Tpl"));
            content.restore_state();
        }

        for stroke in page.layers.iter().flat_map(|l| &l.strokes) {
            if stroke.segments.is_empty() {
                continue;
            }
            let style = pen_style(stroke);
            content.set_stroke_gray(grey_level(style.colour));

            if style.dynamic {
                // Width (and pen 1 opacity) change per segment, so each
                // segment pair is its own stroked path.
                let mut prev = None;
                for seg in &stroke.segments {
                    let w = segment_width(stroke.pen, style.width, seg.pressure, seg.tilt);
                    let op = segment_opacity(stroke.pen, seg.pressure).unwrap_or(style.opacity);
                    if let Some((px, py)) = prev {
                        content.set_parameters(Name(gs_name(alpha_key(op)).as_bytes()));
                        content.set_line_width(w.max(0.0) * xfactor);
                        content.move_to(px, py);
                        content.line_to(seg.x * xfactor, page_h - seg.y * yfactor);
                        content.stroke();
                    }
                    prev = Some((seg.x * xfactor, page_h - seg.y * yfactor));
                }
            } else {
                content.set_parameters(Name(gs_name(alpha_key(style.opacity)).as_bytes()));
                content.set_line_width(style.width.max(0.0) * xfactor);
                let first = &stroke.segments[0];
                content.move_to(first.x * xfactor, page_h - first.y * yfactor);
                for seg in &stroke.segments[1..] {
                    content.line_to(seg.x * xfactor, page_h - seg.y * yfactor);
                }
                content.stroke();
            }
        }

        let content_bytes = content.finish();

        let mut pdf_page = pdf.page(page_ref);
        pdf_page.media_box(Rect::new(0.0, 0.0, page_w, page_h));
        pdf_page.parent(page_tree_ref);
        pdf_page.contents(content_ref);
        let mut resources = pdf_page.resources();
        let mut states = resources.ext_g_states();
        for &(key, gs_ref) in &gs_refs {
            states.pair(Name(gs_name(key).as_bytes()), gs_ref);
        }
        states.finish();
        if let Some((img_ref, _)) = &template {
            resources.x_objects().pair(Name(b"Tpl"), *img_ref);
        }
        resources.finish();
        pdf_page.finish();

        deferred.push((content_ref, content_bytes, template));
    }

    for (content_ref, content_bytes, template) in deferred {
        pdf.stream(content_ref, &content_bytes);
        if let Some((img_ref, image)) = template {
            let mut xobj = pdf.image_xobject(img_ref, &image.samples);
            xobj.filter(Filter::FlateDecode);
            xobj.width(image.width as i32);
            xobj.height(image.height as i32);
            if image.grayscale {
                xobj.color_space().device_gray();
            } else {
                xobj.color_space().device_rgb();
            }
            xobj.bits_per_component(8);
            xobj.finish();
        }
    }

    pdf.pages(page_tree_ref)
        .kids(page_refs.iter().copied())
        .count(page_refs.len() as i32);
    pdf.catalog(catalog_ref).pages(page_tree_ref);

    let bytes = pdf.finish();
    if bytes.is_empty() {
        return Err(RemfsError::Lines("empty render".to_string()));
    }
    Ok(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lines::testdata::{LinesBuilder, RawStroke};
    use crate::lines::parse;

    fn page_count(pdf: &[u8]) -> usize {
        // "/Type /Page " never matches the page tree's "/Type /Pages".
        pdf.windows(12).filter(|w| *w == b"/Type /Page ").count()
    }

    #[test]
    fn one_pdf_page_per_lines_page() {
        let blob = LinesBuilder::new()
            .page(&[vec![RawStroke::pen_line(vec![(0.0, 0.0), (700.0, 900.0)])]])
            .page(&[vec![]])
            .page(&[vec![RawStroke::pen_line(vec![(10.0, 10.0), (20.0, 20.0)])]])
            .build();
        let doc = parse(&blob).unwrap();
        let pdf = render(&doc, &[]).unwrap();
        assert!(pdf.starts_with(b"%PDF"));
        assert_eq!(page_count(&pdf), 3);
    }

    #[test]
    fn unknown_pen_renders_without_error() {
        let blob = LinesBuilder::new()
            .page(&[vec![RawStroke {
                pen: 99,
                colour: 0,
                width: 2.0,
                points: vec![(0.0, 0.0), (5.0, 5.0)],
            }]])
            .build();
        let doc = parse(&blob).unwrap();
        assert!(render(&doc, &[]).unwrap().starts_with(b"%PDF"));
    }

    #[test]
    fn highlighter_alpha_becomes_an_ext_g_state() {
        let blob = LinesBuilder::new()
            .page(&[vec![RawStroke {
                pen: 5,
                colour: 1,
                width: 2.0,
                points: vec![(0.0, 0.0), (100.0, 0.0)],
            }]])
            .build();
        let doc = parse(&blob).unwrap();
        let pdf = render(&doc, &[]).unwrap();
        // 0.2 alpha quantises to the a200 graphics state.
        assert!(pdf.windows(5).any(|w| w == b"/a200"));
    }

    #[test]
    fn missing_template_files_are_skipped() {
        let blob = LinesBuilder::new()
            .page(&[vec![RawStroke::pen_line(vec![(0.0, 0.0), (1.0, 1.0)])]])
            .build();
        let doc = parse(&blob).unwrap();
        let gone = Some(PathBuf::from("/no/such/template.png"));
        let pdf = render(&doc, &[gone]).unwrap();
        assert_eq!(page_count(&pdf), 1);
    }

    #[test]
    fn pen_zero_width_tracks_tilt_and_pressure() {
        // Stroke units: base width 2, pressure 0.5, tilt 0.5 comes from
        // the builder's canned segment values.
        let w = segment_width(0, 2.0, 0.5, 0.5);
        assert!((w - (2.5 * 2.0 * 1.25)).abs() < 1e-4);
        assert_eq!(segment_width(2, 7.0, 0.9, 0.1), 7.0);
    }
}

