//! The view-layer contract a terminal drawer implements to render a running
//! pipeline. Out of scope for this crate (`spec.md` §1): no implementation
//! is shipped, only the trait a downstream CLI would implement against, so
//! its method set has a stable name to depend on. Grounded on
//! `examples/original_source/internal/draw/drawer.go`'s method set.

/// A nested, line-oriented view surface. Implementations are only required
/// to accept calls in a well-formed nested order (an `EndEntry`/`EndLine`
/// for every `NewEntry`/`NewLine`); no color or width semantics are part of
/// this crate's contract.
pub trait Drawer {
    /// Opens a new entry at nesting level `level`, labeled `text`.
    fn new_entry(&mut self, level: usize, text: &str);

    /// Closes the entry opened at nesting level `level`.
    fn end_entry(&mut self, level: usize);

    /// Starts a new section within the current entry.
    fn new_section(&mut self);

    /// Writes a full line of text within the current section.
    fn new_line(&mut self, text: &str);

    /// Writes `text` at column `col` of the current line.
    fn new_column(&mut self, col: usize, text: &str);

    /// Terminates the current line.
    fn end_line(&mut self);
}
