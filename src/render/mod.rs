//! Message rendering: sanitization, markdown parsing, and math typesetting.

pub mod markdown;
pub mod math;
pub mod node;
pub mod sanitize;
pub mod typeset;

#[cfg(feature = "math-render")]
pub mod engine;

pub use markdown::{render, render_html};
pub use node::{Block, Inline, MathNode, to_html};
pub use typeset::{EngineLoader, MathEngine, Typesetter};
