//! Grid pagination: ordered assets → pages of positioned slots.
//!
//! Layout is pure. It reads nothing but the geometry and the sequence, so the
//! same inputs always give the same document.
//!
//! Cards fill a row left to right. When a row is full the cursor moves down
//! one row; when the next row would cross the bottom margin, a new page
//! starts at row 0. No page is ever emitted empty.

use crate::config::Geometry;
use crate::output::{Document, ImageAsset, Page, RenderSlot};
use std::sync::Arc;
use tracing::debug;

pub struct PageLayout {
    geometry: Geometry,
}

impl PageLayout {
    pub fn new(geometry: Geometry) -> Self {
        Self { geometry }
    }

    pub fn geometry(&self) -> &Geometry {
        &self.geometry
    }

    /// Place every asset of `sequence`, in order, one slot per element.
    pub fn layout(&self, sequence: &[Arc<ImageAsset>]) -> Document {
        let g = &self.geometry;
        let columns = g.columns.max(1);
        let mut pages: Vec<Page> = Vec::new();
        let mut current = Page {
            index: 0,
            slots: Vec::new(),
        };
        let mut row = 0usize;

        for (i, asset) in sequence.iter().enumerate() {
            let column = i % columns;
            if column == 0 && i > 0 {
                row += 1;
                // `row` is 0-based, so `row + 1` rows would be in use.
                if !g.fits_rows(row + 1) {
                    let index = current.index + 1;
                    pages.push(std::mem::replace(
                        &mut current,
                        Page {
                            index,
                            slots: Vec::new(),
                        },
                    ));
                    row = 0;
                }
            }

            let (x, y) = g.cell_origin(row, column);
            current.slots.push(RenderSlot {
                asset: Arc::clone(asset),
                page_index: current.index,
                row,
                column,
                x,
                y,
            });
        }

        if !current.slots.is_empty() {
            pages.push(current);
        }

        debug!(
            "Laid out {} slots on {} pages",
            sequence.len(),
            pages.len()
        );

        Document {
            geometry: self.geometry.clone(),
            pages,
        }
    }
}
