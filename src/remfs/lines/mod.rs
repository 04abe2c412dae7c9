//! # Notebook stroke files
//!
//! Handwritten notebooks live on the tablet as `.lines` files: a binary
//! container of pages, layers and pen strokes, where every stroke is a
//! polyline of pressure/tilt-annotated segments. [`parse`] decodes the
//! container; [`render`] turns the decoded strokes into a PDF a desktop
//! viewer can open.
//!
//! Layout (all little-endian):
//!
//! ```text
//! "reMarkable lines with selections and layers"   43-byte header
//! u32 page count (>= 1)
//! per page:  u8 layer count, u8 reserved, u16 reserved
//! per layer: u32 stroke count
//! per stroke: u32 pen, u32 colour, u32 reserved, f32 width, u32 segments
//! per segment: f32 x, y, pressure, tilt, reserved
//! ```

use crate::error::{RemfsError, Result};
use log::warn;

pub mod render;

const HEADER: &[u8; 43] = b"reMarkable lines with selections and layers";

/// Stroke canvas dimensions of the tablet, in stroke units.
pub const CANVAS_WIDTH: f32 = 1404.0;
pub const CANVAS_HEIGHT: f32 = 1872.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Segment {
    pub x: f32,
    pub y: f32,
    pub pressure: f32,
    pub tilt: f32,
}

#[derive(Debug, Clone)]
pub struct Stroke {
    pub pen: u32,
    pub colour: u32,
    pub width: f32,
    pub segments: Vec<Segment>,
}

#[derive(Debug, Clone)]
pub struct Layer {
    pub strokes: Vec<Stroke>,
}

#[derive(Debug, Clone)]
pub struct Page {
    pub layers: Vec<Layer>,
}

#[derive(Debug, Clone)]
pub struct LinesFile {
    pub pages: Vec<Page>,
}

impl LinesFile {
    /// Total number of segments across all pages, layers and strokes.
    pub fn segment_count(&self) -> usize {
        self.pages
            .iter()
            .flat_map(|p| &p.layers)
            .flat_map(|l| &l.strokes)
            .map(|s| s.segments.len())
            .sum()
    }
}

struct Cursor<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn take(&mut self, n: usize) -> Result<&'a [u8]> {
        if self.pos + n > self.data.len() {
            return Err(RemfsError::Lines(format!(
                "truncated at offset {} (wanted {} bytes of {})",
                self.pos,
                n,
                self.data.len()
            )));
        }
        let slice = &self.data[self.pos..self.pos + n];
        self.pos += n;
        Ok(slice)
    }

    fn u8(&mut self) -> Result<u8> {
        Ok(self.take(1)?[0])
    }

    fn u16(&mut self) -> Result<u16> {
        Ok(u16::from_le_bytes(self.take(2)?.try_into().unwrap()))
    }

    fn u32(&mut self) -> Result<u32> {
        Ok(u32::from_le_bytes(self.take(4)?.try_into().unwrap()))
    }

    fn f32(&mut self) -> Result<f32> {
        Ok(f32::from_le_bytes(self.take(4)?.try_into().unwrap()))
    }
}

/// Decode a `.lines` blob.
pub fn parse(data: &[u8]) -> Result<LinesFile> {
    let mut cur = Cursor { data, pos: 0 };

    let header = cur.take(HEADER.len())?;
    if header != HEADER {
        return Err(RemfsError::Lines("bad header".to_string()));
    }
    let npages = cur.u32()?;
    if npages < 1 {
        return Err(RemfsError::Lines("page count is zero".to_string()));
    }

    let mut pages = Vec::with_capacity(npages.min(1024) as usize);
    for pageno in 0..npages {
        let nlayers = cur.u8()?;
        let reserved_b = cur.u8()?;
        let reserved_h = cur.u16()?;
        if reserved_b != 0 || reserved_h != 0 {
            // Possibly layer-visibility flags; nothing we render.
            warn!("unexpected reserved values on page {}", pageno + 1);
        }

        let mut layers = Vec::with_capacity(nlayers as usize);
        for _ in 0..nlayers {
            let nstrokes = cur.u32()?;
            let mut strokes = Vec::with_capacity(nstrokes.min(65_536) as usize);
            for _ in 0..nstrokes {
                let pen = cur.u32()?;
                let colour = cur.u32()?;
                let _reserved = cur.u32()?;
                let width = cur.f32()?;
                let nsegments = cur.u32()?;

                let mut segments = Vec::with_capacity(nsegments.min(65_536) as usize);
                for _ in 0..nsegments {
                    let x = cur.f32()?;
                    let y = cur.f32()?;
                    let pressure = cur.f32()?;
                    let tilt = cur.f32()?;
                    let _reserved = cur.f32()?;
                    segments.push(Segment {
                        x,
                        y,
                        pressure,
                        tilt,
                    });
                }
                strokes.push(Stroke {
                    pen,
                    colour,
                    width,
                    segments,
                });
            }
            layers.push(Layer { strokes });
        }
        pages.push(Page { layers });
    }

    Ok(LinesFile { pages })
}


#[cfg(test)]
mod tests {
    use super::testdata::{LinesBuilder, RawStroke};
    use super::*;

    #[test]
    fn parses_pages_layers_strokes() {
        let blob = LinesBuilder::new()
            .page(&[vec![
                RawStroke::pen_line(vec![(0.0, 0.0), (100.0, 100.0)]),
                RawStroke::pen_line(vec![(5.0, 5.0), (6.0, 6.0), (7.0, 7.0)]),
            ]])
            .page(&[vec![], vec![RawStroke::pen_line(vec![(1.0, 2.0)])]])
            .build();

        let doc = parse(&blob).unwrap();
        assert_eq!(doc.pages.len(), 2);
        assert_eq!(doc.pages[0].layers.len(), 1);
        assert_eq!(doc.pages[0].layers[0].strokes.len(), 2);
        assert_eq!(doc.pages[1].layers.len(), 2);
        // Segment accounting: sum over every stroke's segment count.
        assert_eq!(doc.segment_count(), 2 + 3 + 1);
        let seg = &doc.pages[0].layers[0].strokes[0].segments[1];
        assert_eq!((seg.x, seg.y), (100.0, 100.0));
    }

    #[test]
    fn rejects_bad_header() {
        let err = parse(b"not a lines file at all, nowhere near it....").unwrap_err();
        assert!(matches!(err, RemfsError::Lines(_)));
    }

    #[test]
    fn rejects_zero_pages() {
        let mut blob = Vec::new();
        blob.extend_from_slice(HEADER);
        blob.extend_from_slice(&0u32.to_le_bytes());
        assert!(matches!(parse(&blob), Err(RemfsError::Lines(_))));
    }

    #[test]
    fn rejects_truncation_mid_stroke() {
        let blob = LinesBuilder::new()
            .page(&[vec![RawStroke::pen_line(vec![(0.0, 0.0), (1.0, 1.0)])]])
            .build();
        let err = parse(&blob[..blob.len() - 7]).unwrap_err();
        assert!(matches!(err, RemfsError::Lines(_)));
    }

    #[test]
    fn too_short_for_header_is_malformed() {
        assert!(matches!(parse(b"reMark"), Err(RemfsError::Lines(_))));
    }
}
