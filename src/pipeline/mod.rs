//! Pipeline stages for diagram rendering.
//!
//! Each submodule implements exactly one step. Stages that need a browser
//! sit behind [`session::DiagramRenderer`], so everything else can be
//! tested with a fake renderer.
//!
//! ## Data Flow
//!
//! ```text
//! input ──▶ extract ──▶ session ──▶ transform ──▶ dist/
//! (*.md)    (fences)    (Chrome)    (write + substitute)
//! ```
//!
//! 1. [`input`]      — list eligible documents once, sorted by name
//! 2. [`extract`]    — find mermaid fences in document order
//! 3. [`session`]    — render one diagram per fresh page; uses [`host`] for
//!    the hosting page and scripts, [`capture`] to check the screenshot
//! 4. [`transform`]  — write each image and rewrite the document through
//!    [`substitute`]

pub mod capture;
pub mod extract;
pub mod host;
pub mod input;
pub mod session;
pub mod substitute;
pub mod transform;
