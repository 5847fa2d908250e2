//! Typst-backed math engine.
//!
//! LaTeX source is converted to Typst markup with MiTeX, compiled against a
//! minimal in-memory `World`, and rendered to SVG. Results are cached by a
//! hash of the source and display mode.

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use parking_lot::Mutex;
use sha2::{Digest, Sha256};
use tracing::debug;

use typst::diag::{FileError, FileResult};
use typst::foundations::{Bytes, Datetime};
use typst::syntax::{FileId, Source, VirtualPath};
use typst::text::{Font, FontBook};
use typst::utils::LazyHash;
use typst::{Library, LibraryExt, World};

use crate::render::typeset::{EngineLoader, MathEngine};

/// Minimal `World` for compiling one virtual math document.
struct MathWorld {
    library: LazyHash<Library>,
    book: LazyHash<FontBook>,
    fonts: Vec<Font>,
    main_id: FileId,
    source: Source,
}

impl MathWorld {
    fn new(content: &str, fonts: Vec<Font>) -> Self {
        let library = LazyHash::new(Library::builder().build());
        let book = LazyHash::new(FontBook::from_fonts(fonts.iter()));
        let main_id = FileId::new(None, VirtualPath::new("main.typ"));
        let source = Source::new(main_id, content.to_string());
        Self {
            library,
            book,
            fonts,
            main_id,
            source,
        }
    }
}

impl World for MathWorld {
    fn library(&self) -> &LazyHash<Library> {
        &self.library
    }

    fn book(&self) -> &LazyHash<FontBook> {
        &self.book
    }

    fn main(&self) -> FileId {
        self.main_id
    }

    fn source(&self, id: FileId) -> FileResult<Source> {
        if id == self.main_id {
            Ok(self.source.clone())
        } else {
            Err(FileError::NotFound(id.vpath().as_rootless_path().into()))
        }
    }

    fn file(&self, id: FileId) -> FileResult<Bytes> {
        Err(FileError::NotFound(id.vpath().as_rootless_path().into()))
    }

    fn font(&self, index: usize) -> Option<Font> {
        self.fonts.get(index).cloned()
    }

    fn today(&self, _offset: Option<i64>) -> Option<Datetime> {
        Datetime::from_ymd(2024, 1, 1)
    }
}

pub struct TypstEngine {
    fonts: Vec<Font>,
    cache: Mutex<HashMap<String, String>>,
}

impl TypstEngine {
    /// Decode the embedded fonts. This is the expensive part and the reason
    /// the engine sits behind a lazy loader.
    pub fn new() -> Result<Self> {
        let fonts: Vec<Font> = typst_assets::fonts()
            .filter_map(|data| Font::new(Bytes::new(data), 0))
            .collect();
        if fonts.is_empty() {
            return Err(anyhow!("no embedded fonts available"));
        }
        Ok(Self {
            fonts,
            cache: Mutex::new(HashMap::new()),
        })
    }

    fn cache_key(tex: &str, display: bool) -> String {
        let mut hasher = Sha256::new();
        hasher.update(tex.as_bytes());
        hasher.update(if display { b"block " } else { b"inline" });
        format!("{:x}", hasher.finalize())
    }

    fn compile_to_svg(&self, document: &str) -> Result<String> {
        let world = MathWorld::new(document, self.fonts.clone());
        let compiled = typst::compile::<typst::layout::PagedDocument>(&world);
        let document = compiled.output.map_err(|errors| {
            let messages: Vec<String> =
                errors.iter().map(|e| e.message.to_string()).collect();
            anyhow!("typst compilation failed: {}", messages.join(", "))
        })?;
        let page = document
            .pages
            .first()
            .ok_or_else(|| anyhow!("typst produced no pages"))?;
        Ok(typst_svg::svg_frame(&page.frame))
    }
}

/// Rewrite Typst function names MiTeX emits that Typst does not define.
fn fix_mitex_output(code: &str) -> String {
    let mut code = code
        .replace("mitexsqrt", "sqrt")
        .replace("mitexmathbf", "bold")
        .replace("tfrac", "frac")
        .replace("pmatrix", "mat")
        .replace("aligned", "cases");
    while let Some(start) = code.find("#textmath[") {
        let after = start + "#textmath[".len();
        let Some(end) = code[after..].find(']') else { break };
        let content = code[after..after + end].to_string();
        code = format!("{}#text[{}]{}", &code[..start], content, &code[after + end + 1..]);
    }
    code
}

impl MathEngine for TypstEngine {
    fn render(&self, tex: &str, display: bool) -> Result<String> {
        let key = Self::cache_key(tex, display);
        if let Some(svg) = self.cache.lock().get(&key) {
            debug!(tex, "math cache hit");
            return Ok(svg.clone());
        }

        let typst_code = mitex::convert_math(tex, None)
            .map_err(|e| anyhow!("failed to convert math source: {tex} - {e}"))?;
        let typst_code = fix_mitex_output(&typst_code);

        // Spaces around the body switch Typst into display math.
        let document = if display {
            format!(
                "#set page(width: auto, height: auto, margin: (x: 8pt, y: 10pt))\n$ {typst_code} $"
            )
        } else {
            format!(
                "#set page(width: auto, height: auto, margin: (x: 4pt, y: 6pt))\n${typst_code}$"
            )
        };

        let svg = self
            .compile_to_svg(&document)
            .context("failed to compile math to SVG")?;
        self.cache.lock().insert(key, svg.clone());
        Ok(svg)
    }
}

/// Builds a [`TypstEngine`] off the async runtime's worker threads.
pub struct TypstEngineLoader;

#[async_trait]
impl EngineLoader for TypstEngineLoader {
    async fn load(&self) -> Result<Arc<dyn MathEngine>> {
        let engine = tokio::task::spawn_blocking(TypstEngine::new)
            .await
            .map_err(|e| anyhow!("engine load task failed: {e}"))??;
        Ok(Arc::new(engine))
    }
}
