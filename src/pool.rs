//! One `RustParser` per thread.
//!
//! A history walk parses dozens of snapshots per run, often from several
//! worker threads; the grammar is loaded once per thread and reused.

use crate::ts::{RustParser, TreeSitterError};
use std::cell::RefCell;

thread_local! {
    static PARSER: RefCell<Option<RustParser>> = const { RefCell::new(None) };
}

/// Run `f` with this thread's parser, creating it on first use.
///
/// ```no_run
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// use refactor_audit::pool::with_parser;
///
/// let tree = with_parser(|parser| parser.parse_strict("fn total() -> u32 { 0 }"))??;
/// assert_eq!(tree.root_node().kind(), "source_file");
/// # Ok(())
/// # }
/// ```
pub fn with_parser<F, R>(f: F) -> Result<R, TreeSitterError>
where
    F: FnOnce(&mut RustParser) -> R,
{
    PARSER.with(|cell| {
        let mut slot = cell.borrow_mut();
        let parser = match slot.take() {
            Some(parser) => slot.insert(parser),
            None => slot.insert(RustParser::new()?),
        };
        Ok(f(parser))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_thread_reuses_its_parser() {
        let first = with_parser(|p| p as *const RustParser as usize).unwrap();
        let second = with_parser(|p| p as *const RustParser as usize).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn other_threads_get_their_own() {
        let here = with_parser(|p| p as *const RustParser as usize).unwrap();
        let there = std::thread::spawn(|| {
            with_parser(|p| p.parse_strict("fn f() {}").is_ok()).unwrap()
        })
        .join()
        .unwrap();
        assert!(there);
        assert_ne!(here, 0);
    }
}
