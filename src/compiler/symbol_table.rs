use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

/// Where a resolved name lives, which decides the opcode that loads it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    Global,
    Local,
    Builtin,
    Free,
    Function,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Symbol {
    pub name: String,
    pub scope: Scope,
    pub index: usize,
}

/// One lexical scope's name table. Tables chain to their enclosing scope
/// via `outer`; resolution walks outward and converts anything that
/// crosses a function boundary (other than globals and builtins) into a
/// free symbol of the inner table.
#[derive(Debug, Default)]
pub struct SymbolTable {
    pub outer: Option<Rc<RefCell<SymbolTable>>>,
    store: HashMap<String, Symbol>,
    /// Count of `define`d symbols, which is also the next local/global slot.
    pub num_definitions: usize,
    /// Outer-scope symbols this table's function captures, in capture order.
    /// Consumed by the compiler when it emits `OpClosure`.
    pub free_symbols: Vec<Symbol>,
}

impl SymbolTable {
    pub fn new() -> Rc<RefCell<SymbolTable>> {
        Rc::new(RefCell::new(SymbolTable::default()))
    }

    pub fn new_enclosed(outer: Rc<RefCell<SymbolTable>>) -> Rc<RefCell<SymbolTable>> {
        Rc::new(RefCell::new(SymbolTable {
            outer: Some(outer),
            ..SymbolTable::default()
        }))
    }

    /// Bind a name in this scope: global in the outermost table, local in
    /// any enclosed one. Slot indices count up from zero per table.
    pub fn define(&mut self, name: &str) -> Symbol {
        let symbol = Symbol {
            name: name.to_string(),
            scope: if self.outer.is_none() { Scope::Global } else { Scope::Local },
            index: self.num_definitions,
        };
        self.store.insert(name.to_string(), symbol.clone());
        self.num_definitions += 1;
        symbol
    }

    /// Register a builtin at its fixed table index. Does not consume a slot.
    pub fn define_builtin(&mut self, index: usize, name: &str) -> Symbol {
        let symbol = Symbol { name: name.to_string(), scope: Scope::Builtin, index };
        self.store.insert(name.to_string(), symbol.clone());
        symbol
    }

    /// Bind a function literal's own name inside its body, so recursive
    /// calls resolve to the executing closure rather than a slot.
    pub fn define_function_name(&mut self, name: &str) -> Symbol {
        let symbol = Symbol { name: name.to_string(), scope: Scope::Function, index: 0 };
        self.store.insert(name.to_string(), symbol.clone());
        symbol
    }

    fn define_free(&mut self, original: Symbol) -> Symbol {
        let symbol = Symbol {
            name: original.name.clone(),
            scope: Scope::Free,
            index: self.free_symbols.len(),
        };
        self.free_symbols.push(original);
        self.store.insert(symbol.name.clone(), symbol.clone());
        symbol
    }

    /// Look a name up through the scope chain. A hit in an outer table
    /// that is neither global nor builtin is re-registered here as a free
    /// symbol; that rewrite is what accumulates each function's capture
    /// list during the single compile pass.
    pub fn resolve(&mut self, name: &str) -> Option<Symbol> {
        if let Some(symbol) = self.store.get(name) {
            return Some(symbol.clone());
        }
        let outer = self.outer.clone()?;
        let symbol = outer.borrow_mut().resolve(name)?;
        match symbol.scope {
            Scope::Global | Scope::Builtin => Some(symbol),
            _ => Some(self.define_free(symbol)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sym(name: &str, scope: Scope, index: usize) -> Symbol {
        Symbol { name: name.to_string(), scope, index }
    }

    #[test]
    fn define_assigns_sequential_slots() {
        let global = SymbolTable::new();
        assert_eq!(global.borrow_mut().define("a"), sym("a", Scope::Global, 0));
        assert_eq!(global.borrow_mut().define("b"), sym("b", Scope::Global, 1));

        let local = SymbolTable::new_enclosed(global);
        assert_eq!(local.borrow_mut().define("c"), sym("c", Scope::Local, 0));
        assert_eq!(local.borrow_mut().define("d"), sym("d", Scope::Local, 1));
    }

    #[test]
    fn resolve_global_from_any_depth() {
        let global = SymbolTable::new();
        global.borrow_mut().define("a");
        let mid = SymbolTable::new_enclosed(global);
        let inner = SymbolTable::new_enclosed(mid);

        assert_eq!(
            inner.borrow_mut().resolve("a"),
            Some(sym("a", Scope::Global, 0))
        );
        assert!(inner.borrow().free_symbols.is_empty());
    }

    #[test]
    fn resolve_local_shadows_nothing_it_should_not() {
        let global = SymbolTable::new();
        global.borrow_mut().define("a");
        let local = SymbolTable::new_enclosed(global);
        local.borrow_mut().define("a");

        assert_eq!(
            local.borrow_mut().resolve("a"),
            Some(sym("a", Scope::Local, 0))
        );
    }

    #[test]
    fn crossing_a_function_boundary_promotes_to_free() {
        // fn(a,b){ fn(c,d){ fn(e,f){ a + c + e } } }
        let global = SymbolTable::new();
        global.borrow_mut().define("a");
        global.borrow_mut().define("b");

        let first = SymbolTable::new_enclosed(global);
        first.borrow_mut().define("c");
        first.borrow_mut().define("d");

        let second = SymbolTable::new_enclosed(Rc::clone(&first));
        second.borrow_mut().define("e");
        second.borrow_mut().define("f");

        {
            let mut table = first.borrow_mut();
            assert_eq!(table.resolve("a"), Some(sym("a", Scope::Global, 0)));
            assert_eq!(table.resolve("c"), Some(sym("c", Scope::Local, 0)));
        }
        {
            let mut table = second.borrow_mut();
            assert_eq!(table.resolve("a"), Some(sym("a", Scope::Global, 0)));
            assert_eq!(table.resolve("e"), Some(sym("e", Scope::Local, 0)));
            // c lives in the middle table: free here, index 0.
            assert_eq!(table.resolve("c"), Some(sym("c", Scope::Free, 0)));
            assert_eq!(table.resolve("d"), Some(sym("d", Scope::Free, 1)));
        }

        // The captured originals keep their outer-scope identity.
        assert_eq!(
            second.borrow().free_symbols,
            vec![sym("c", Scope::Local, 0), sym("d", Scope::Local, 1)]
        );
        // The middle table is unchanged by the inner resolution.
        assert!(first.borrow().free_symbols.is_empty());
    }

    #[test]
    fn free_promotion_cascades_through_middle_scopes() {
        let global = SymbolTable::new();
        let outer_fn = SymbolTable::new_enclosed(global);
        outer_fn.borrow_mut().define("a");
        let mid_fn = SymbolTable::new_enclosed(Rc::clone(&outer_fn));
        let inner_fn = SymbolTable::new_enclosed(Rc::clone(&mid_fn));

        // Innermost use of the outermost local: free at index 0 here, and
        // the middle table now carries a free entry of its own.
        assert_eq!(
            inner_fn.borrow_mut().resolve("a"),
            Some(sym("a", Scope::Free, 0))
        );
        assert_eq!(
            mid_fn.borrow().free_symbols,
            vec![sym("a", Scope::Local, 0)]
        );
        assert_eq!(
            inner_fn.borrow().free_symbols,
            vec![sym("a", Scope::Free, 0)]
        );
    }

    #[test]
    fn builtins_resolve_unchanged_everywhere() {
        let global = SymbolTable::new();
        global.borrow_mut().define_builtin(0, "len");
        global.borrow_mut().define_builtin(5, "push");
        let inner = SymbolTable::new_enclosed(SymbolTable::new_enclosed(global));

        assert_eq!(
            inner.borrow_mut().resolve("len"),
            Some(sym("len", Scope::Builtin, 0))
        );
        assert_eq!(
            inner.borrow_mut().resolve("push"),
            Some(sym("push", Scope::Builtin, 5))
        );
        assert!(inner.borrow().free_symbols.is_empty());
    }

    #[test]
    fn builtin_definition_does_not_consume_slots() {
        let global = SymbolTable::new();
        global.borrow_mut().define_builtin(3, "len");
        assert_eq!(global.borrow().num_definitions, 0);
        assert_eq!(global.borrow_mut().define("x"), sym("x", Scope::Global, 0));
    }

    #[test]
    fn function_name_resolves_to_self() {
        let global = SymbolTable::new();
        let fn_scope = SymbolTable::new_enclosed(global);
        fn_scope.borrow_mut().define_function_name("fib");

        assert_eq!(
            fn_scope.borrow_mut().resolve("fib"),
            Some(sym("fib", Scope::Function, 0))
        );
    }

    #[test]
    fn shadowing_a_function_name_wins() {
        let global = SymbolTable::new();
        let fn_scope = SymbolTable::new_enclosed(global);
        fn_scope.borrow_mut().define_function_name("f");
        fn_scope.borrow_mut().define("f");

        assert_eq!(
            fn_scope.borrow_mut().resolve("f"),
            Some(sym("f", Scope::Local, 0))
        );
    }

    #[test]
    fn unresolved_name_is_none() {
        let global = SymbolTable::new();
        assert_eq!(global.borrow_mut().resolve("ghost"), None);
    }
}
