use std::collections::VecDeque;

use indicatif::ProgressBar;
use tracing::{debug, info, trace};

use crate::error::Result;
use crate::parser::images::ImagePolicy;
use crate::parser::{self, DocumentState, Question};
use crate::sink::ImageStore;
use crate::source::{PageImage, PageSource};

/// Pages rendered ahead of the (sequential) parse.
const RENDER_CHUNK: usize = 32;

pub struct Extraction {
    pub questions: Vec<Question>,
    pub pages: usize,
    pub images_stored: usize,
}

struct RenderedPage {
    index: usize,
    text: String,
    images: Vec<PageImage>,
}

fn render<S: PageSource + ?Sized>(source: &S, index: usize) -> Result<RenderedPage> {
    Ok(RenderedPage {
        index,
        text: source.page_text(index)?,
        images: source.page_images(index)?,
    })
}

#[cfg(feature = "rayon")]
fn render_chunk<S: PageSource + Sync>(source: &S, pages: &[usize]) -> Result<Vec<RenderedPage>> {
    use rayon::prelude::*;
    pages.par_iter().map(|&i| render(source, i)).collect()
}

#[cfg(not(feature = "rayon"))]
fn render_chunk<S: PageSource + Sync>(source: &S, pages: &[usize]) -> Result<Vec<RenderedPage>> {
    pages.iter().map(|&i| render(source, i)).collect()
}

/// Whole-document run. Rendering may happen in parallel; storing images,
/// parsing and image assignment always follow page order so the section and
/// the image counter thread through the document correctly.
pub fn run<S: PageSource + Sync>(
    source: &S,
    store: &ImageStore,
    policy: &dyn ImagePolicy,
    progress: &ProgressBar,
) -> Result<Extraction> {
    let mut state = DocumentState::default();
    let mut questions = Vec::new();
    let page_count = source.page_count();
    let pages: Vec<usize> = (0..page_count).collect();

    for chunk in pages.chunks(RENDER_CHUNK) {
        for page in render_chunk(source, chunk)? {
            let mut refs = VecDeque::with_capacity(page.images.len());
            for image in &page.images {
                let stored = store.store(page.index, state.image_counter, image)?;
                trace!(page = page.index, bbox = ?image.bbox, path = %stored, "image stored");
                refs.push_back(stored);
                state.image_counter += 1;
            }

            let parsed = parser::parse_page(&mut state, page.index, &page.text, refs, policy);
            debug!(
                page = page.index,
                questions = parsed.len(),
                images = page.images.len(),
                section = %state.section,
                "page parsed"
            );
            questions.extend(parsed);
            progress.inc(1);
        }
    }

    info!(
        pages = page_count,
        questions = questions.len(),
        images = state.image_counter,
        "extraction finished"
    );
    Ok(Extraction {
        questions,
        pages: page_count,
        images_stored: state.image_counter,
    })
}
