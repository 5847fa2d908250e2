//! Second-stage math typesetting over a rendered block tree.
//!
//! The markdown pipeline leaves math nodes unrendered so message text can
//! appear immediately. A [`Typesetter`] owns a lazily loaded engine and
//! fills in [`MathNode::rendered`] afterwards. The engine is loaded at most
//! once per typesetter; concurrent callers await the same in-flight load
//! instead of starting their own.
//!
//! Typesetting is best effort. A node the engine cannot render keeps its
//! encoded source and stays unrendered, so a consumer can still show the
//! raw expression.

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use tokio::sync::OnceCell;
use tracing::warn;

use crate::render::node::{Block, Inline, MathNode};

/// A loaded math engine. Rendering itself is synchronous.
pub trait MathEngine: Send + Sync {
    /// Render math source to a markup fragment (typically SVG).
    fn render(&self, tex: &str, display: bool) -> Result<String>;
}

/// Deferred engine construction. Loading is the expensive step, so it runs
/// only when the first math node actually needs it.
#[async_trait]
pub trait EngineLoader: Send + Sync {
    async fn load(&self) -> Result<Arc<dyn MathEngine>>;
}

pub struct Typesetter {
    loader: Box<dyn EngineLoader>,
    engine: OnceCell<Arc<dyn MathEngine>>,
}

impl Typesetter {
    pub fn new(loader: Box<dyn EngineLoader>) -> Self {
        Self {
            loader,
            engine: OnceCell::new(),
        }
    }

    /// Fill in `rendered` for every math node in `blocks`.
    ///
    /// A failed engine load leaves the whole tree unrendered and is retried
    /// on the next call. Per-node render failures are logged and skipped.
    pub async fn typeset(&self, blocks: &mut [Block]) {
        if !has_math(blocks) {
            return;
        }
        let engine = match self.engine.get_or_try_init(|| self.loader.load()).await {
            Ok(engine) => Arc::clone(engine),
            Err(err) => {
                warn!(error = %err, "math engine unavailable");
                return;
            }
        };
        for block in blocks.iter_mut() {
            typeset_block(engine.as_ref(), block);
        }
    }
}

fn has_math(blocks: &[Block]) -> bool {
    fn inline_has_math(content: &[Inline]) -> bool {
        content.iter().any(|inline| match inline {
            Inline::Math(_) => true,
            Inline::Bold(children) | Inline::Italic(children) => inline_has_math(children),
            _ => false,
        })
    }
    blocks.iter().any(|block| match block {
        Block::MathBlock(_) => true,
        Block::Paragraph(content) | Block::Blockquote(content) => inline_has_math(content),
        Block::Heading { content, .. } => inline_has_math(content),
        Block::UnorderedList(items) | Block::OrderedList(items) => {
            items.iter().any(|item| inline_has_math(item))
        }
        Block::Table { headers, rows } => {
            headers.iter().any(|cell| inline_has_math(cell))
                || rows.iter().flatten().any(|cell| inline_has_math(cell))
        }
        Block::CodeBlock { .. } => false,
    })
}

fn typeset_block(engine: &dyn MathEngine, block: &mut Block) {
    match block {
        Block::MathBlock(node) => typeset_node(engine, node),
        Block::Paragraph(content) | Block::Blockquote(content) => {
            typeset_inlines(engine, content);
        }
        Block::Heading { content, .. } => typeset_inlines(engine, content),
        Block::UnorderedList(items) | Block::OrderedList(items) => {
            for item in items {
                typeset_inlines(engine, item);
            }
        }
        Block::Table { headers, rows } => {
            for cell in headers {
                typeset_inlines(engine, cell);
            }
            for cell in rows.iter_mut().flatten() {
                typeset_inlines(engine, cell);
            }
        }
        Block::CodeBlock { .. } => {}
    }
}

fn typeset_inlines(engine: &dyn MathEngine, content: &mut [Inline]) {
    for inline in content {
        match inline {
            Inline::Math(node) => typeset_node(engine, node),
            Inline::Bold(children) | Inline::Italic(children) => {
                typeset_inlines(engine, children);
            }
            _ => {}
        }
    }
}

fn typeset_node(engine: &dyn MathEngine, node: &mut MathNode) {
    if node.rendered.is_some() {
        return;
    }
    match engine.render(&node.source(), node.display) {
        Ok(markup) => node.rendered = Some(markup),
        Err(err) => warn!(error = %err, "failed to typeset math node"),
    }
}
