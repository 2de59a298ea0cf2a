//! Intermediate code: the flattened token-and-node encoding of a routine
//! body, produced by the parser and replayed by the executor.
//!
//! The buffer is append-only. Items are:
//!
//! - token codes (the source token stream of the body);
//! - symbol-table node references, one after each identifier/literal code;
//! - line markers, inserted at statement heads for runtime diagnostics;
//! - location markers, forward-reference branch targets patched ("fixed up")
//!   exactly once when the target position becomes known;
//! - CASE jump tables mapping selector ordinals to branch positions.
//!
//! Positions are item indices. The builder tracks open fixups and checks that
//! all of them were closed when the buffer is finalized; an unpatched marker
//! is a translator bug, not a user-facing error.

use rustc_hash::FxHashMap;

use crate::constants::MAX_ICODE_ITEMS;
use crate::errors::Abort;
use crate::scanner::token::TokenCode;
use crate::symtab::NodeId;

/// One intermediate-code item.
#[derive(Debug, Clone, PartialEq)]
pub enum IcodeItem {
    Code(TokenCode),
    Node(NodeId),
    LineMarker(u32),
    Location(usize),
    CaseTable(FxHashMap<i32, usize>),
}

/// A finalized, immutable routine body.
#[derive(Debug, Default)]
pub struct Icode {
    items: Vec<IcodeItem>,
}

impl Icode {
    pub fn item(&self, position: usize) -> Option<&IcodeItem> {
        self.items.get(position)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// Handle to one unpatched location marker.
///
/// Deliberately not `Copy`/`Clone`: `fixup_location_marker` consumes it, so a
/// marker cannot be patched twice.
#[derive(Debug)]
pub struct MarkerHandle {
    position: usize,
}

/// Append-only builder for one routine's intermediate code.
#[derive(Debug, Default)]
pub struct IcodeBuilder {
    items: Vec<IcodeItem>,
    open_fixups: Vec<usize>,
}

impl IcodeBuilder {
    pub fn new() -> Self {
        IcodeBuilder::default()
    }

    fn append(&mut self, item: IcodeItem) -> Result<usize, Abort> {
        if self.items.len() >= MAX_ICODE_ITEMS {
            return Err(Abort::CodeSegmentOverflow);
        }
        self.items.push(item);
        Ok(self.items.len() - 1)
    }

    pub fn put_code(&mut self, code: TokenCode) -> Result<(), Abort> {
        self.append(IcodeItem::Code(code)).map(|_| ())
    }

    pub fn put_node(&mut self, id: NodeId) -> Result<(), Abort> {
        self.append(IcodeItem::Node(id)).map(|_| ())
    }

    /// Append a placeholder for a forward branch target.
    pub fn put_location_marker(&mut self) -> Result<MarkerHandle, Abort> {
        let position = self.append(IcodeItem::Location(usize::MAX))?;
        self.open_fixups.push(position);
        Ok(MarkerHandle { position })
    }

    /// Patch a marker with the current append position.
    pub fn fixup_location_marker(&mut self, marker: MarkerHandle) {
        let target = self.items.len();
        self.open_fixups.retain(|p| *p != marker.position);
        self.items[marker.position] = IcodeItem::Location(target);
    }

    /// Append a CASE jump table.
    pub fn put_case_table(&mut self, table: FxHashMap<i32, usize>) -> Result<(), Abort> {
        self.append(IcodeItem::CaseTable(table)).map(|_| ())
    }

    /// Retroactively insert a line marker just before the most recently
    /// appended item, so a statement's head token ends up preceded by its
    /// line number without any emission lookahead.
    pub fn insert_line_marker(&mut self, line: u32) -> Result<(), Abort> {
        if self.items.len() >= MAX_ICODE_ITEMS {
            return Err(Abort::CodeSegmentOverflow);
        }
        let at = self.items.len().saturating_sub(1);
        self.items.insert(at, IcodeItem::LineMarker(line));
        for position in &mut self.open_fixups {
            if *position >= at {
                *position += 1;
            }
        }
        Ok(())
    }

    /// The position the next appended item will occupy.
    pub fn current_position(&self) -> usize {
        self.items.len()
    }

    /// Finalize. Checks the builder invariant that every opened fixup was
    /// closed.
    pub fn finish(self) -> Icode {
        debug_assert!(
            self.open_fixups.is_empty(),
            "unpatched location marker(s) at {:?}",
            self.open_fixups
        );
        Icode { items: self.items }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_append_and_read_back() {
        let mut builder = IcodeBuilder::new();
        builder.put_code(TokenCode::Begin).unwrap();
        builder.put_code(TokenCode::End).unwrap();
        let code = builder.finish();
        assert_eq!(code.len(), 2);
        assert_eq!(code.item(0), Some(&IcodeItem::Code(TokenCode::Begin)));
        assert_eq!(code.item(1), Some(&IcodeItem::Code(TokenCode::End)));
        assert_eq!(code.item(2), None);
    }

    #[test]
    fn test_location_marker_fixup() {
        let mut builder = IcodeBuilder::new();
        builder.put_code(TokenCode::While).unwrap();
        let marker = builder.put_location_marker().unwrap();
        builder.put_code(TokenCode::Do).unwrap();
        builder.put_code(TokenCode::End).unwrap();
        builder.fixup_location_marker(marker);
        let code = builder.finish();
        assert_eq!(code.item(1), Some(&IcodeItem::Location(4)));
    }

    #[test]
    #[should_panic(expected = "unpatched location marker")]
    fn test_unpatched_marker_is_caught() {
        let mut builder = IcodeBuilder::new();
        let _marker = builder.put_location_marker().unwrap();
        let _ = builder.finish();
    }

    #[test]
    fn test_line_marker_inserted_before_last_item() {
        let mut builder = IcodeBuilder::new();
        builder.put_code(TokenCode::Begin).unwrap();
        builder.put_code(TokenCode::Identifier).unwrap();
        builder.insert_line_marker(7).unwrap();
        let code = builder.finish();
        assert_eq!(code.item(0), Some(&IcodeItem::Code(TokenCode::Begin)));
        assert_eq!(code.item(1), Some(&IcodeItem::LineMarker(7)));
        assert_eq!(code.item(2), Some(&IcodeItem::Code(TokenCode::Identifier)));
    }

    #[test]
    fn test_overflow_is_fatal() {
        let mut builder = IcodeBuilder::new();
        for _ in 0..MAX_ICODE_ITEMS {
            builder.put_code(TokenCode::Semicolon).unwrap();
        }
        assert_eq!(
            builder.put_code(TokenCode::Semicolon),
            Err(Abort::CodeSegmentOverflow)
        );
    }

    #[test]
    fn test_case_table_round_trip() {
        let mut builder = IcodeBuilder::new();
        let mut table = FxHashMap::default();
        table.insert(1, 10usize);
        table.insert(2, 20usize);
        builder.put_case_table(table.clone()).unwrap();
        let code = builder.finish();
        assert_eq!(code.item(0), Some(&IcodeItem::CaseTable(table)));
    }
}
