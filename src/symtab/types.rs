//! Type descriptors and compatibility checking.
//!
//! Types are nominal: two named types are identical exactly when they share a
//! [`TypeId`]. The only structural comparison the language needs is between
//! character arrays of equal length, which is how string literals become
//! assignable to `array [..] of char` targets.
//!
//! Byte sizes follow the original data model (integer 2, real 4, char 1,
//! enumeration 2) and are computed recursively at construction, memoized in
//! the descriptor.

use crate::symtab::{ConstantValue, Definition, NodeId, Symtab, TableId};

pub const INTEGER_SIZE: usize = 2;
pub const REAL_SIZE: usize = 4;
pub const CHAR_SIZE: usize = 1;
pub const ENUM_SIZE: usize = 2;

/// Stable index of a type descriptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TypeId(u32);

impl TypeId {
    fn index(self) -> usize {
        self.0 as usize
    }
}

/// One type's shape.
#[derive(Debug)]
pub struct TypeDesc {
    pub form: TypeForm,
    pub size: usize,
    /// The entry that named this type; `None` for anonymous structural types.
    pub ident: Option<NodeId>,
}

#[derive(Debug)]
pub enum TypeForm {
    Scalar(ScalarKind),
    Enumeration {
        /// Constant entries in ordinal order.
        constants: Vec<NodeId>,
        max: i32,
    },
    Subrange {
        base: TypeId,
        min: i32,
        max: i32,
    },
    Array {
        index: TypeId,
        element: TypeId,
        count: usize,
        min_index: i32,
        max_index: i32,
    },
    Record {
        fields: TableId,
        first_field: Option<NodeId>,
    },
    /// Poison type assigned to erroneous constructs so one error does not
    /// cascade.
    Dummy,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScalarKind {
    Integer,
    Real,
    Character,
}

/// Arena of type descriptors plus the predefined type ids.
pub struct TypeTable {
    descs: Vec<TypeDesc>,
    pub integer: TypeId,
    pub real: TypeId,
    pub character: TypeId,
    pub boolean: TypeId,
    pub dummy: TypeId,
}

impl TypeTable {
    /// Build the table and enter the predefined identifiers (`integer`,
    /// `real`, `char`, `boolean`, `false`, `true`, `maxint`) into the global
    /// scope.
    pub fn new(symtab: &mut Symtab, global: TableId) -> Self {
        let mut table = TypeTable {
            descs: Vec::new(),
            integer: TypeId(0),
            real: TypeId(0),
            character: TypeId(0),
            boolean: TypeId(0),
            dummy: TypeId(0),
        };

        table.integer = table.add(TypeDesc {
            form: TypeForm::Scalar(ScalarKind::Integer),
            size: INTEGER_SIZE,
            ident: None,
        });
        table.real = table.add(TypeDesc {
            form: TypeForm::Scalar(ScalarKind::Real),
            size: REAL_SIZE,
            ident: None,
        });
        table.character = table.add(TypeDesc {
            form: TypeForm::Scalar(ScalarKind::Character),
            size: CHAR_SIZE,
            ident: None,
        });
        table.dummy = table.add(TypeDesc {
            form: TypeForm::Dummy,
            size: 0,
            ident: None,
        });

        let false_id = symtab.enter(global, "false", 0);
        let true_id = symtab.enter(global, "true", 0);
        table.boolean = table.add(TypeDesc {
            form: TypeForm::Enumeration {
                constants: vec![false_id, true_id],
                max: 1,
            },
            size: ENUM_SIZE,
            ident: None,
        });
        {
            let node = symtab.node_mut(false_id);
            node.defn = Definition::Constant(ConstantValue::Integer(0));
            node.type_id = Some(table.boolean);
            node.next = Some(true_id);
        }
        {
            let node = symtab.node_mut(true_id);
            node.defn = Definition::Constant(ConstantValue::Integer(1));
            node.type_id = Some(table.boolean);
        }

        for (name, type_id) in [
            ("integer", table.integer),
            ("real", table.real),
            ("char", table.character),
            ("boolean", table.boolean),
        ] {
            let id = symtab.enter(global, name, 0);
            let node = symtab.node_mut(id);
            node.defn = Definition::Type;
            node.type_id = Some(type_id);
            table.get_mut(type_id).ident = Some(id);
        }

        let maxint = symtab.enter(global, "maxint", 0);
        let node = symtab.node_mut(maxint);
        node.defn = Definition::Constant(ConstantValue::Integer(i32::MAX));
        node.type_id = Some(table.integer);

        table
    }

    pub fn add(&mut self, desc: TypeDesc) -> TypeId {
        self.descs.push(desc);
        TypeId((self.descs.len() - 1) as u32)
    }

    pub fn get(&self, id: TypeId) -> &TypeDesc {
        &self.descs[id.index()]
    }

    pub fn get_mut(&mut self, id: TypeId) -> &mut TypeDesc {
        &mut self.descs[id.index()]
    }

    pub fn size(&self, id: TypeId) -> usize {
        self.get(id).size
    }

    /// Strip one subrange layer to its underlying type.
    pub fn base_type(&self, id: TypeId) -> TypeId {
        match self.get(id).form {
            TypeForm::Subrange { base, .. } => base,
            _ => id,
        }
    }

    pub fn is_integer(&self, id: TypeId) -> bool {
        self.base_type(id) == self.integer
    }

    pub fn is_real(&self, id: TypeId) -> bool {
        self.base_type(id) == self.real
    }

    pub fn is_char(&self, id: TypeId) -> bool {
        self.base_type(id) == self.character
    }

    pub fn is_boolean(&self, id: TypeId) -> bool {
        self.base_type(id) == self.boolean
    }

    pub fn is_dummy(&self, id: TypeId) -> bool {
        id == self.dummy
    }

    /// Ordinal types: integer, char, enumerations, and subranges of those.
    pub fn is_ordinal(&self, id: TypeId) -> bool {
        let base = self.base_type(id);
        matches!(
            self.get(base).form,
            TypeForm::Scalar(ScalarKind::Integer)
                | TypeForm::Scalar(ScalarKind::Character)
                | TypeForm::Enumeration { .. }
        )
    }

    /// Min/max ordinals enforced on stores into this type, if any.
    pub fn subrange_bounds(&self, id: TypeId) -> Option<(i32, i32)> {
        match self.get(id).form {
            TypeForm::Subrange { min, max, .. } => Some((min, max)),
            _ => None,
        }
    }

    /// Length of a character array, if this is one.
    pub fn char_array_length(&self, id: TypeId) -> Option<usize> {
        match self.get(id).form {
            TypeForm::Array { element, count, .. } if self.is_char(element) => Some(count),
            _ => None,
        }
    }

    /// Assignment compatibility of `source` into `target`:
    ///
    /// - identical descriptors are always compatible;
    /// - an integer expression widens into a real target;
    /// - a subrange is interchangeable with its base type (range checked at
    ///   run time);
    /// - a character array target accepts a string of the same length;
    /// - anything else must match nominally.
    pub fn is_assignment_compatible(&self, target: TypeId, source: TypeId) -> bool {
        if self.is_dummy(target) || self.is_dummy(source) {
            return true;
        }
        if target == source {
            return true;
        }
        let target_base = self.base_type(target);
        let source_base = self.base_type(source);
        if target_base == source_base {
            return true;
        }
        if target_base == self.real && source_base == self.integer {
            return true;
        }
        match (
            self.char_array_length(target_base),
            self.char_array_length(source_base),
        ) {
            (Some(a), Some(b)) => a == b,
            _ => false,
        }
    }

    /// Whether two operand types can meet a relational operator.
    pub fn are_comparison_compatible(&self, a: TypeId, b: TypeId) -> bool {
        if self.is_dummy(a) || self.is_dummy(b) {
            return true;
        }
        let a_base = self.base_type(a);
        let b_base = self.base_type(b);

        let a_numeric = a_base == self.integer || a_base == self.real;
        let b_numeric = b_base == self.integer || b_base == self.real;
        if a_numeric && b_numeric {
            return true;
        }

        if a_base == b_base {
            return matches!(
                self.get(a_base).form,
                TypeForm::Scalar(_) | TypeForm::Enumeration { .. }
            );
        }

        match (self.char_array_length(a_base), self.char_array_length(b_base)) {
            (Some(la), Some(lb)) => la == lb,
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::symtab::Symtab;

    fn setup() -> (Symtab, TypeTable) {
        let mut symtab = Symtab::new();
        let global = symtab.new_table();
        let types = TypeTable::new(&mut symtab, global);
        (symtab, types)
    }

    #[test]
    fn test_predefined_identifiers() {
        let (symtab, types) = setup();
        let global = TableId(0);
        let integer = symtab.search(global, "integer").unwrap();
        assert!(matches!(symtab.node(integer).defn, Definition::Type));
        assert_eq!(symtab.node(integer).type_id, Some(types.integer));

        let t = symtab.search(global, "true").unwrap();
        assert!(matches!(
            symtab.node(t).defn,
            Definition::Constant(ConstantValue::Integer(1))
        ));
        assert_eq!(symtab.node(t).type_id, Some(types.boolean));
    }

    #[test]
    fn test_identity_is_compatible() {
        let (_, types) = setup();
        for id in [types.integer, types.real, types.character, types.boolean] {
            assert!(types.is_assignment_compatible(id, id));
        }
    }

    #[test]
    fn test_integer_widens_into_real_but_not_back() {
        let (_, types) = setup();
        assert!(types.is_assignment_compatible(types.real, types.integer));
        assert!(!types.is_assignment_compatible(types.integer, types.real));
    }

    #[test]
    fn test_subrange_compatible_with_base() {
        let (_, mut types) = setup();
        let small = types.add(TypeDesc {
            form: TypeForm::Subrange {
                base: types.integer,
                min: 1,
                max: 10,
            },
            size: INTEGER_SIZE,
            ident: None,
        });
        assert!(types.is_assignment_compatible(small, types.integer));
        assert!(types.is_assignment_compatible(types.integer, small));
        assert_eq!(types.base_type(small), types.integer);
        assert_eq!(types.subrange_bounds(small), Some((1, 10)));
    }

    #[test]
    fn test_char_arrays_compare_by_length() {
        let (_, mut types) = setup();
        let mut make = |count: usize| {
            let index = types.add(TypeDesc {
                form: TypeForm::Subrange {
                    base: types.integer,
                    min: 1,
                    max: count as i32,
                },
                size: INTEGER_SIZE,
                ident: None,
            });
            types.add(TypeDesc {
                form: TypeForm::Array {
                    index,
                    element: types.character,
                    count,
                    min_index: 1,
                    max_index: count as i32,
                },
                size: count * CHAR_SIZE,
                ident: None,
            })
        };
        let five_a = make(5);
        let five_b = make(5);
        let seven = make(7);
        assert!(types.is_assignment_compatible(five_a, five_b));
        assert!(!types.is_assignment_compatible(five_a, seven));
    }

    #[test]
    fn test_distinct_enums_incompatible() {
        let (_, mut types) = setup();
        let color = types.add(TypeDesc {
            form: TypeForm::Enumeration {
                constants: vec![],
                max: 2,
            },
            size: ENUM_SIZE,
            ident: None,
        });
        let fruit = types.add(TypeDesc {
            form: TypeForm::Enumeration {
                constants: vec![],
                max: 2,
            },
            size: ENUM_SIZE,
            ident: None,
        });
        assert!(!types.is_assignment_compatible(color, fruit));
        assert!(types.are_comparison_compatible(color, color));
        assert!(!types.are_comparison_compatible(color, fruit));
    }

    #[test]
    fn test_array_size_algebra() {
        let (_, mut types) = setup();
        let index = types.add(TypeDesc {
            form: TypeForm::Subrange {
                base: types.integer,
                min: 1,
                max: 10,
            },
            size: INTEGER_SIZE,
            ident: None,
        });
        let count = 10usize;
        let element_size = types.size(types.real);
        let array = types.add(TypeDesc {
            form: TypeForm::Array {
                index,
                element: types.real,
                count,
                min_index: 1,
                max_index: 10,
            },
            size: count * element_size,
            ident: None,
        });
        assert_eq!(types.size(array), count * REAL_SIZE);
    }
}
