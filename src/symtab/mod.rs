//! Symbol table: a node arena with one binary search tree per scope.
//!
//! Every declared name becomes a [`Node`] in the arena, addressed by a stable
//! [`NodeId`]. A scope is a [`TableId`] naming a BST root; the tree is ordered
//! by the byte-wise name ordering and is never rebalanced. Sibling
//! declarations (parameters, record fields, locals) are additionally threaded
//! through the `next` link in declaration order, which is what parameter
//! binding and local allocation iterate.
//!
//! The [`ScopeStack`] is the display: the active table per lexical nesting
//! level, searched innermost-first so shadowing falls out of the walk order.
//!
//! Redefinition contract: [`Symtab::enter`] is insert-or-return-existing
//! (used to pool literal constants); [`Symtab::enter_new`] hands the existing
//! node back as an error so the caller can flag `IdentifierRedefined`.
//! Declarations always go through `enter_new`.

pub mod types;

use std::rc::Rc;

use crate::constants::MAX_NESTING_LEVEL;
use crate::errors::Abort;
use crate::icode::Icode;
use types::TypeId;

/// Stable index of a node in the symbol-table arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(u32);

impl NodeId {
    fn index(self) -> usize {
        self.0 as usize
    }
}

/// Index of one scope table (a BST root) in the arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TableId(u32);

impl TableId {
    fn index(self) -> usize {
        self.0 as usize
    }
}

/// One declared name.
#[derive(Debug)]
pub struct Node {
    pub name: String,
    left: Option<NodeId>,
    right: Option<NodeId>,
    /// Next sibling in declaration order (parameters, fields, locals).
    pub next: Option<NodeId>,
    /// Lexical nesting level of the scope this name was declared in.
    pub level: usize,
    pub defn: Definition,
    pub type_id: Option<TypeId>,
}

/// What a name is defined as, with the kind-specific payload.
#[derive(Debug)]
pub enum Definition {
    Undefined,
    Constant(ConstantValue),
    Type,
    Variable { offset: usize },
    Field { offset: usize },
    ValueParam { offset: usize },
    VarParam { offset: usize },
    Program(Box<RoutineInfo>),
    Procedure(Box<RoutineInfo>),
    Function(Box<RoutineInfo>),
}

/// Discriminant of [`Definition`], for dispatch without borrowing the
/// payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DefnKind {
    Undefined,
    Constant,
    Type,
    Variable,
    Field,
    ValueParam,
    VarParam,
    Program,
    Procedure,
    Function,
}

impl DefnKind {
    /// Definitions that name a datum an expression can load or store.
    pub fn is_data(self) -> bool {
        matches!(
            self,
            DefnKind::Variable
                | DefnKind::Field
                | DefnKind::ValueParam
                | DefnKind::VarParam
                | DefnKind::Undefined
        )
    }
}

impl Definition {
    pub fn kind(&self) -> DefnKind {
        match self {
            Definition::Undefined => DefnKind::Undefined,
            Definition::Constant(_) => DefnKind::Constant,
            Definition::Type => DefnKind::Type,
            Definition::Variable { .. } => DefnKind::Variable,
            Definition::Field { .. } => DefnKind::Field,
            Definition::ValueParam { .. } => DefnKind::ValueParam,
            Definition::VarParam { .. } => DefnKind::VarParam,
            Definition::Program(_) => DefnKind::Program,
            Definition::Procedure(_) => DefnKind::Procedure,
            Definition::Function(_) => DefnKind::Function,
        }
    }

    /// Frame slot offset for data definitions.
    pub fn offset(&self) -> Option<usize> {
        match self {
            Definition::Variable { offset }
            | Definition::Field { offset }
            | Definition::ValueParam { offset }
            | Definition::VarParam { offset } => Some(*offset),
            _ => None,
        }
    }

    pub fn routine(&self) -> Option<&RoutineInfo> {
        match self {
            Definition::Program(info)
            | Definition::Procedure(info)
            | Definition::Function(info) => Some(info),
            _ => None,
        }
    }

    pub fn routine_mut(&mut self) -> Option<&mut RoutineInfo> {
        match self {
            Definition::Program(info)
            | Definition::Procedure(info)
            | Definition::Function(info) => Some(info),
            _ => None,
        }
    }
}

/// Value payload of a constant definition.
#[derive(Debug, Clone, PartialEq)]
pub enum ConstantValue {
    Integer(i32),
    Real(f32),
    Character(char),
    Str(String),
}

/// Routine metadata: scope, parameter/local chains, frame slot counts, and
/// (for declared routines) the intermediate code of the body.
#[derive(Debug)]
pub struct RoutineInfo {
    pub code: RoutineCode,
    pub scope: TableId,
    pub first_param: Option<NodeId>,
    pub first_local: Option<NodeId>,
    pub param_count: usize,
    pub local_count: usize,
    pub icode: Option<Rc<Icode>>,
}

impl RoutineInfo {
    pub fn declared(scope: TableId) -> Self {
        RoutineInfo {
            code: RoutineCode::Declared,
            scope,
            first_param: None,
            first_local: None,
            param_count: 0,
            local_count: 0,
            icode: None,
        }
    }

    pub fn standard(routine: StandardRoutine, scope: TableId) -> Self {
        RoutineInfo {
            code: RoutineCode::Standard(routine),
            scope,
            first_param: None,
            first_local: None,
            param_count: 0,
            local_count: 0,
            icode: None,
        }
    }
}

/// Declared in source, or one of the predefined standard routines.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoutineCode {
    Declared,
    Standard(StandardRoutine),
}

/// The predefined routines, dispatched by code rather than by name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StandardRoutine {
    Read,
    Readln,
    Write,
    Writeln,
    Abs,
    ArcTan,
    Chr,
    Cos,
    Exp,
    Ln,
    Odd,
    Ord,
    Pred,
    Round,
    Sin,
    Sqr,
    Sqrt,
    Succ,
    Trunc,
}

impl StandardRoutine {
    pub fn name(self) -> &'static str {
        match self {
            StandardRoutine::Read => "read",
            StandardRoutine::Readln => "readln",
            StandardRoutine::Write => "write",
            StandardRoutine::Writeln => "writeln",
            StandardRoutine::Abs => "abs",
            StandardRoutine::ArcTan => "arctan",
            StandardRoutine::Chr => "chr",
            StandardRoutine::Cos => "cos",
            StandardRoutine::Exp => "exp",
            StandardRoutine::Ln => "ln",
            StandardRoutine::Odd => "odd",
            StandardRoutine::Ord => "ord",
            StandardRoutine::Pred => "pred",
            StandardRoutine::Round => "round",
            StandardRoutine::Sin => "sin",
            StandardRoutine::Sqr => "sqr",
            StandardRoutine::Sqrt => "sqrt",
            StandardRoutine::Succ => "succ",
            StandardRoutine::Trunc => "trunc",
        }
    }

    pub fn is_function(self) -> bool {
        !matches!(
            self,
            StandardRoutine::Read
                | StandardRoutine::Readln
                | StandardRoutine::Write
                | StandardRoutine::Writeln
        )
    }
}

struct Table {
    root: Option<NodeId>,
}

/// The whole symbol-table forest: node arena plus scope tables.
pub struct Symtab {
    nodes: Vec<Node>,
    tables: Vec<Table>,
}

impl Symtab {
    pub fn new() -> Self {
        Symtab {
            nodes: Vec::new(),
            tables: Vec::new(),
        }
    }

    /// Create an empty scope table.
    pub fn new_table(&mut self) -> TableId {
        self.tables.push(Table { root: None });
        TableId((self.tables.len() - 1) as u32)
    }

    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.index()]
    }

    pub fn node_mut(&mut self, id: NodeId) -> &mut Node {
        &mut self.nodes[id.index()]
    }

    /// Search one scope's tree for `name`.
    pub fn search(&self, table: TableId, name: &str) -> Option<NodeId> {
        let mut current = self.tables[table.index()].root;
        while let Some(id) = current {
            let node = self.node(id);
            current = match name.cmp(node.name.as_str()) {
                std::cmp::Ordering::Less => node.left,
                std::cmp::Ordering::Greater => node.right,
                std::cmp::Ordering::Equal => return Some(id),
            };
        }
        None
    }

    /// Insert-or-return-existing.
    pub fn enter(&mut self, table: TableId, name: &str, level: usize) -> NodeId {
        match self.search(table, name) {
            Some(id) => id,
            None => self.insert(table, name, level),
        }
    }

    /// Insert a new name; an already-present name is returned as `Err` so the
    /// caller can report the redefinition.
    pub fn enter_new(
        &mut self,
        table: TableId,
        name: &str,
        level: usize,
    ) -> Result<NodeId, NodeId> {
        match self.search(table, name) {
            Some(existing) => Err(existing),
            None => Ok(self.insert(table, name, level)),
        }
    }

    fn insert(&mut self, table: TableId, name: &str, level: usize) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        self.nodes.push(Node {
            name: name.to_string(),
            left: None,
            right: None,
            next: None,
            level,
            defn: Definition::Undefined,
            type_id: None,
        });

        let mut current = match self.tables[table.index()].root {
            Some(root) => root,
            None => {
                self.tables[table.index()].root = Some(id);
                return id;
            }
        };
        loop {
            let go_left = name < self.node(current).name.as_str();
            let child = if go_left {
                self.node(current).left
            } else {
                self.node(current).right
            };
            match child {
                Some(next) => current = next,
                None => {
                    let node = self.node_mut(current);
                    if go_left {
                        node.left = Some(id);
                    } else {
                        node.right = Some(id);
                    }
                    return id;
                }
            }
        }
    }

    /// Create a node that belongs to no scope tree, used for error recovery
    /// when a declaration has no usable name.
    pub fn orphan(&mut self, name: &str, level: usize) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        self.nodes.push(Node {
            name: name.to_string(),
            left: None,
            right: None,
            next: None,
            level,
            defn: Definition::Undefined,
            type_id: None,
        });
        id
    }

    /// Iterate a sibling chain in declaration order.
    pub fn chain(&self, first: Option<NodeId>) -> NodeChain<'_> {
        NodeChain {
            symtab: self,
            current: first,
        }
    }
}

impl Default for Symtab {
    fn default() -> Self {
        Self::new()
    }
}

/// Iterator over `next`-linked siblings.
pub struct NodeChain<'a> {
    symtab: &'a Symtab,
    current: Option<NodeId>,
}

impl Iterator for NodeChain<'_> {
    type Item = NodeId;

    fn next(&mut self) -> Option<NodeId> {
        let id = self.current?;
        self.current = self.symtab.node(id).next;
        Some(id)
    }
}

/// The display: active scope tables indexed by nesting level.
pub struct ScopeStack {
    stack: Vec<TableId>,
}

impl ScopeStack {
    pub fn new(global: TableId) -> Self {
        ScopeStack {
            stack: vec![global],
        }
    }

    /// Push a scope for a routine body being entered.
    pub fn enter_scope(&mut self, table: TableId) -> Result<(), Abort> {
        if self.stack.len() >= MAX_NESTING_LEVEL {
            return Err(Abort::NestingTooDeep);
        }
        self.stack.push(table);
        Ok(())
    }

    pub fn exit_scope(&mut self) -> TableId {
        debug_assert!(self.stack.len() > 1, "cannot exit the global scope");
        self.stack.pop().unwrap_or(self.stack[0])
    }

    /// Current nesting level; the global scope is level 0.
    pub fn level(&self) -> usize {
        self.stack.len() - 1
    }

    /// The innermost scope's table.
    pub fn local_table(&self) -> TableId {
        self.stack[self.stack.len() - 1]
    }

    pub fn global_table(&self) -> TableId {
        self.stack[0]
    }

    /// Search from the innermost scope outward; the first hit shadows the
    /// rest.
    pub fn search_all(&self, symtab: &Symtab, name: &str) -> Option<NodeId> {
        self.stack
            .iter()
            .rev()
            .find_map(|table| symtab.search(*table, name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_search_returns_none_for_missing_name() {
        let mut symtab = Symtab::new();
        let table = symtab.new_table();
        assert_eq!(symtab.search(table, "missing"), None);
        symtab.enter(table, "present", 0);
        assert_eq!(symtab.search(table, "missing"), None);
    }

    #[test]
    fn test_enter_returns_existing() {
        let mut symtab = Symtab::new();
        let table = symtab.new_table();
        let first = symtab.enter(table, "x", 0);
        let second = symtab.enter(table, "x", 0);
        assert_eq!(first, second);
    }

    #[test]
    fn test_enter_new_reports_duplicate() {
        let mut symtab = Symtab::new();
        let table = symtab.new_table();
        let first = symtab.enter_new(table, "x", 0).unwrap();
        assert_eq!(symtab.enter_new(table, "x", 0), Err(first));
    }

    #[test]
    fn test_bst_ordering_invariant() {
        let mut symtab = Symtab::new();
        let table = symtab.new_table();
        for name in ["m", "c", "t", "a", "e", "p", "z"] {
            symtab.enter(table, name, 0);
        }

        fn check(symtab: &Symtab, id: NodeId, min: &str, max: &str) {
            let node = symtab.node(id);
            assert!(node.name.as_str() > min && node.name.as_str() < max);
            if let Some(left) = node.left {
                check(symtab, left, min, &node.name);
            }
            if let Some(right) = node.right {
                check(symtab, right, &node.name, max);
            }
        }
        let root = symtab.search(table, "m").unwrap();
        check(&symtab, root, "", "\u{10ffff}");

        for name in ["a", "c", "e", "m", "p", "t", "z"] {
            assert!(symtab.search(table, name).is_some());
        }
    }

    #[test]
    fn test_scope_shadowing_and_exit() {
        let mut symtab = Symtab::new();
        let global = symtab.new_table();
        let inner = symtab.new_table();

        let outer_x = symtab.enter(global, "x", 0);
        let mut scopes = ScopeStack::new(global);
        scopes.enter_scope(inner).unwrap();
        let inner_x = symtab.enter(inner, "x", scopes.level());
        let inner_only = symtab.enter(inner, "y", scopes.level());

        assert_eq!(scopes.search_all(&symtab, "x"), Some(inner_x));
        assert_eq!(scopes.search_all(&symtab, "y"), Some(inner_only));

        scopes.exit_scope();
        assert_eq!(scopes.search_all(&symtab, "x"), Some(outer_x));
        assert_eq!(scopes.search_all(&symtab, "y"), None);
    }

    #[test]
    fn test_nesting_too_deep() {
        let mut symtab = Symtab::new();
        let global = symtab.new_table();
        let mut scopes = ScopeStack::new(global);
        for _ in 1..MAX_NESTING_LEVEL {
            let table = symtab.new_table();
            scopes.enter_scope(table).unwrap();
        }
        let table = symtab.new_table();
        assert_eq!(scopes.enter_scope(table), Err(Abort::NestingTooDeep));
    }

    #[test]
    fn test_sibling_chain_order() {
        let mut symtab = Symtab::new();
        let table = symtab.new_table();
        let a = symtab.enter(table, "alpha", 0);
        let b = symtab.enter(table, "beta", 0);
        let c = symtab.enter(table, "gamma", 0);
        symtab.node_mut(a).next = Some(b);
        symtab.node_mut(b).next = Some(c);

        let chained: Vec<NodeId> = symtab.chain(Some(a)).collect();
        assert_eq!(chained, vec![a, b, c]);
    }
}
