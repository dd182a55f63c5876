//! Canonical LR(1) parsing table construction (§4.D).
//!
//! `TableBuilder::build` computes FIRST sets, the canonical collection of
//! LR(1) item sets via closure/goto, and fills the action/goto tables,
//! resolving shift/reduce conflicts by operator precedence and failing hard
//! on any reduce/reduce conflict. The result is exposed both as a sparse
//! (hash-keyed) table for construction-time bookkeeping and a dense
//! (array-indexed) table for the parser's hot loop, mirroring the
//! sparse-then-densify pattern the bytecode compiler upstream uses for its
//! jump-table dispatch.

use crate::error::{Error, Result};
use crate::grammar::{
    Associativity, Grammar, NonTerminal, PrecedenceEntry, Symbol, Terminal, ALL_NON_TERMINALS,
    ALL_TERMINALS,
};
use std::collections::{BTreeSet, HashMap};

/// An LR(1) item: a production, a dot position within its right-hand side,
/// and a single lookahead terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Item {
    pub production: usize,
    pub dot: usize,
    pub lookahead: Terminal,
}

pub type ItemSet = BTreeSet<Item>;

/// A parser action. Absent cells in the dense table default to
/// `Error(None)`; the parser runtime fills in a descriptive message from
/// the offending token at the point of failure.
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    Shift(usize),
    Reduce(usize),
    Accept,
    Error(Option<String>),
}

#[derive(Debug, Clone, Default)]
pub struct TableStats {
    pub states: usize,
    pub action_cells_total: usize,
    pub action_cells_filled: usize,
    pub goto_cells_total: usize,
    pub goto_cells_filled: usize,
}

impl TableStats {
    pub fn action_density(&self) -> f64 {
        if self.action_cells_total == 0 {
            0.0
        } else {
            self.action_cells_filled as f64 / self.action_cells_total as f64
        }
    }

    pub fn goto_density(&self) -> f64 {
        if self.goto_cells_total == 0 {
            0.0
        } else {
            self.goto_cells_filled as f64 / self.goto_cells_total as f64
        }
    }
}

/// The finished LR(1) parsing table: both a sparse map (used for
/// diagnostics / introspection) and a dense array (used by the parser's
/// inner loop), kept in agreement by construction.
pub struct ParsingTable {
    action_sparse: HashMap<(usize, Terminal), Action>,
    goto_sparse: HashMap<(usize, NonTerminal), usize>,
    action_dense: Vec<Vec<Action>>,
    goto_dense: Vec<Vec<i64>>,
    pub num_states: usize,
    pub stats: TableStats,
}

impl ParsingTable {
    pub fn action(&self, state: usize, terminal: Terminal) -> &Action {
        &self.action_dense[state][terminal.index()]
    }

    pub fn goto(&self, state: usize, non_terminal: NonTerminal) -> Option<usize> {
        match self.goto_dense[state][non_terminal.index()] {
            -1 => None,
            s => Some(s as usize),
        }
    }

    pub fn action_sparse(&self, state: usize, terminal: Terminal) -> Option<&Action> {
        self.action_sparse.get(&(state, terminal))
    }

    pub fn goto_sparse(&self, state: usize, non_terminal: NonTerminal) -> Option<usize> {
        self.goto_sparse.get(&(state, non_terminal)).copied()
    }
}

/// Computes FIRST sets for every non-terminal and whether each is nullable,
/// then builds the canonical LR(1) collection and derives the action/goto
/// tables from it.
pub struct TableBuilder<'g> {
    grammar: &'g Grammar,
    first_sets: HashMap<NonTerminal, BTreeSet<Terminal>>,
    nullable: HashMap<NonTerminal, bool>,
}

impl<'g> TableBuilder<'g> {
    pub fn new(grammar: &'g Grammar) -> Self {
        let mut builder = Self {
            grammar,
            first_sets: HashMap::new(),
            nullable: HashMap::new(),
        };
        builder.compute_first_sets();
        builder
    }

    fn compute_first_sets(&mut self) {
        for &nt in ALL_NON_TERMINALS {
            self.first_sets.insert(nt, BTreeSet::new());
            self.nullable.insert(nt, false);
        }
        let mut changed = true;
        while changed {
            changed = false;
            for prod in &self.grammar.productions {
                let mut seq_nullable = true;
                for symbol in &prod.right {
                    match symbol {
                        Symbol::Terminal(term) => {
                            if self.first_sets.get_mut(&prod.left).unwrap().insert(*term) {
                                changed = true;
                            }
                            seq_nullable = false;
                            break;
                        }
                        Symbol::NonTerminal(inner) => {
                            let inner_first = self.first_sets[inner].clone();
                            let before = self.first_sets[&prod.left].len();
                            self.first_sets
                                .get_mut(&prod.left)
                                .unwrap()
                                .extend(inner_first);
                            if self.first_sets[&prod.left].len() != before {
                                changed = true;
                            }
                            if !self.nullable[inner] {
                                seq_nullable = false;
                                break;
                            }
                        }
                    }
                }
                if seq_nullable && !self.nullable[&prod.left] {
                    self.nullable.insert(prod.left, true);
                    changed = true;
                }
            }
        }
    }

    /// FIRST of a symbol sequence followed by a trailing lookahead,
    /// i.e. FIRST(beta a) used when computing item closures.
    fn first_of_sequence(&self, symbols: &[Symbol], trailing: Terminal) -> BTreeSet<Terminal> {
        let mut result = BTreeSet::new();
        let mut all_nullable_so_far = true;
        for symbol in symbols {
            match symbol {
                Symbol::Terminal(term) => {
                    result.insert(*term);
                    all_nullable_so_far = false;
                    break;
                }
                Symbol::NonTerminal(nt) => {
                    result.extend(self.first_sets[nt].iter().copied());
                    if !self.nullable[nt] {
                        all_nullable_so_far = false;
                        break;
                    }
                }
            }
        }
        if all_nullable_so_far {
            result.insert(trailing);
        }
        result
    }

    fn closure(&self, items: ItemSet) -> ItemSet {
        let mut items = items;
        loop {
            let mut additions = Vec::new();
            for item in &items {
                let prod = &self.grammar.productions[item.production];
                if item.dot >= prod.right.len() {
                    continue;
                }
                if let Symbol::NonTerminal(b) = prod.right[item.dot] {
                    let beta = &prod.right[item.dot + 1..];
                    let lookaheads = self.first_of_sequence(beta, item.lookahead);
                    for (pid, candidate) in self.grammar.productions.iter().enumerate() {
                        if candidate.left != b {
                            continue;
                        }
                        for &la in &lookaheads {
                            let new_item = Item {
                                production: pid,
                                dot: 0,
                                lookahead: la,
                            };
                            if !items.contains(&new_item) {
                                additions.push(new_item);
                            }
                        }
                    }
                }
            }
            if additions.is_empty() {
                break;
            }
            items.extend(additions);
        }
        items
    }

    fn goto(&self, items: &ItemSet, symbol: Symbol) -> ItemSet {
        let mut moved = BTreeSet::new();
        for item in items {
            let prod = &self.grammar.productions[item.production];
            if item.dot < prod.right.len() && prod.right[item.dot] == symbol {
                moved.insert(Item {
                    production: item.production,
                    dot: item.dot + 1,
                    lookahead: item.lookahead,
                });
            }
        }
        self.closure(moved)
    }

    /// Builds the canonical LR(1) collection and both table representations.
    pub fn build(&self) -> Result<ParsingTable> {
        let augmented_production = self
            .grammar
            .productions
            .iter()
            .position(|p| p.left == self.grammar.augmented_start)
            .expect("augmented start production must exist");

        let start_item = Item {
            production: augmented_production,
            dot: 0,
            lookahead: Terminal::Dollar,
        };
        let start_state = self.closure(BTreeSet::from([start_item]));

        let mut states: Vec<ItemSet> = vec![start_state.clone()];
        let mut index_of: HashMap<ItemSet, usize> = HashMap::new();
        index_of.insert(start_state, 0);

        let mut worklist = vec![0usize];
        let mut transitions: HashMap<(usize, Symbol), usize> = HashMap::new();

        while let Some(state_id) = worklist.pop() {
            let items = states[state_id].clone();
            let mut symbols: BTreeSet<Symbol> = BTreeSet::new();
            for item in &items {
                let prod = &self.grammar.productions[item.production];
                if item.dot < prod.right.len() {
                    symbols.insert(prod.right[item.dot]);
                }
            }
            for symbol in symbols {
                let target = self.goto(&items, symbol);
                if target.is_empty() {
                    continue;
                }
                let target_id = if let Some(&id) = index_of.get(&target) {
                    id
                } else {
                    let id = states.len();
                    index_of.insert(target.clone(), id);
                    states.push(target);
                    worklist.push(id);
                    id
                };
                transitions.insert((state_id, symbol), target_id);
            }
        }

        let num_states = states.len();
        let mut action_dense: Vec<Vec<Action>> = (0..num_states)
            .map(|_| {
                (0..ALL_TERMINALS.len())
                    .map(|_| Action::Error(None))
                    .collect()
            })
            .collect();
        let mut goto_dense: Vec<Vec<i64>> = (0..num_states)
            .map(|_| vec![-1i64; ALL_NON_TERMINALS.len()])
            .collect();
        let mut action_sparse = HashMap::new();
        let mut goto_sparse = HashMap::new();

        for (&(state_id, symbol), &target) in &transitions {
            match symbol {
                Symbol::Terminal(term) => {
                    action_sparse.insert((state_id, term), Action::Shift(target));
                    action_dense[state_id][term.index()] = Action::Shift(target);
                }
                Symbol::NonTerminal(nt) => {
                    goto_sparse.insert((state_id, nt), target);
                    goto_dense[state_id][nt.index()] = target as i64;
                }
            }
        }

        for (state_id, items) in states.iter().enumerate() {
            for item in items {
                let prod = &self.grammar.productions[item.production];
                if item.dot != prod.right.len() {
                    continue;
                }
                if prod.left == self.grammar.augmented_start {
                    self.set_action(
                        &mut action_sparse,
                        &mut action_dense,
                        state_id,
                        item.lookahead,
                        Action::Accept,
                        None,
                    )?;
                    continue;
                }
                let reduce = Action::Reduce(item.production);
                self.set_action(
                    &mut action_sparse,
                    &mut action_dense,
                    state_id,
                    item.lookahead,
                    reduce,
                    prod.precedence,
                )?;
            }
        }

        let action_cells_total = num_states * ALL_TERMINALS.len();
        let action_cells_filled = action_dense
            .iter()
            .flatten()
            .filter(|a| !matches!(a, Action::Error(_)))
            .count();
        let goto_cells_total = num_states * ALL_NON_TERMINALS.len();
        let goto_cells_filled = goto_dense.iter().flatten().filter(|&&g| g != -1).count();

        Ok(ParsingTable {
            action_sparse,
            goto_sparse,
            action_dense,
            goto_dense,
            num_states,
            stats: TableStats {
                states: num_states,
                action_cells_total,
                action_cells_filled,
                goto_cells_total,
                goto_cells_filled,
            },
        })
    }

    /// Installs `action` into the table at `(state, lookahead)`, resolving a
    /// conflict with whatever is already there via operator precedence
    /// (§4.D). Reduce/reduce conflicts on the same lookahead are always
    /// fatal.
    #[allow(clippy::too_many_arguments)]
    fn set_action(
        &self,
        sparse: &mut HashMap<(usize, Terminal), Action>,
        dense: &mut [Vec<Action>],
        state: usize,
        lookahead: Terminal,
        action: Action,
        reduce_precedence: Option<PrecedenceEntry>,
    ) -> Result<()> {
        let existing = dense[state][lookahead.index()].clone();
        let resolved = match existing {
            Action::Error(_) => action,
            Action::Shift(_) if matches!(action, Action::Shift(_)) => action,
            Action::Shift(_) => {
                self.resolve_shift_reduce(lookahead, existing, action, reduce_precedence)?
            }
            Action::Reduce(existing_prod) => match action {
                Action::Shift(_) => {
                    let existing_prec = self.grammar.productions[existing_prod].precedence;
                    self.resolve_shift_reduce(lookahead, action, existing, existing_prec)?
                }
                Action::Reduce(new_prod) => {
                    return Err(Error::GrammarConflict {
                        message: format!(
                            "reduce/reduce conflict in state {state} on lookahead {lookahead:?} between productions {existing_prod} and {new_prod}"
                        ),
                    });
                }
                Action::Accept => {
                    return Err(Error::GrammarConflict {
                        message: format!(
                            "accept/reduce conflict in state {state} on lookahead {lookahead:?}"
                        ),
                    });
                }
                Action::Error(_) => existing,
            },
            Action::Accept => existing,
        };
        dense[state][lookahead.index()] = resolved.clone();
        sparse.insert((state, lookahead), resolved);
        Ok(())
    }

    /// Resolves a shift/reduce conflict by comparing the reducing
    /// production's dominant-operator precedence to the lookahead
    /// terminal's precedence. Equal precedence defers to associativity.
    /// With no declared precedence on either side, shift wins — the
    /// conventional yacc default — which this grammar's layered precedence
    /// ladder never actually exercises.
    fn resolve_shift_reduce(
        &self,
        lookahead: Terminal,
        shift: Action,
        reduce: Action,
        reduce_precedence: Option<PrecedenceEntry>,
    ) -> Result<Action> {
        let lookahead_precedence = self.grammar.precedence.get(&lookahead).copied();
        match (reduce_precedence, lookahead_precedence) {
            (Some(r), Some(l)) => {
                if r.level > l.level {
                    Ok(reduce)
                } else if r.level < l.level {
                    Ok(shift)
                } else {
                    match r.assoc {
                        Associativity::Left => Ok(reduce),
                        Associativity::Right => Ok(shift),
                    }
                }
            }
            _ => Ok(shift),
        }
    }
}

/// Convenience wrapper: builds the default grammar's table.
pub fn build_default_table() -> Result<ParsingTable> {
    let grammar = Grammar::new();
    TableBuilder::new(&grammar).build()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::AstNode;
    use crate::grammar::{BuilderFn, Production};

    #[test]
    fn default_grammar_builds_without_conflict() {
        let table = build_default_table().expect("grammar must be conflict-free");
        assert!(table.num_states > 0);
        assert!(table.stats.action_density() > 0.0);
    }

    #[test]
    fn start_state_accepts_on_well_formed_input_path() {
        let table = build_default_table().unwrap();
        // State 0 must have at least one shift action for a leading atom.
        let has_shift = ALL_TERMINALS
            .iter()
            .any(|&t| matches!(table.action(0, t), Action::Shift(_)));
        assert!(has_shift);
    }

    fn passthrough(mut s: Vec<crate::grammar::StackSymbol>) -> Result<AstNode> {
        s.pop().unwrap().into_node()
    }

    fn fake_binary(_s: Vec<crate::grammar::StackSymbol>) -> Result<AstNode> {
        AstNode::number(0.0)
    }

    /// A deliberately ambiguous toy grammar (classic dangling-`if`-style
    /// expression ambiguity: `E -> E + E | id`) to prove the precedence
    /// conflict-resolution machinery actually activates, since the real
    /// grammar's precedence ladder is unambiguous by construction and never
    /// exercises it through `build_default_table` alone.
    fn ambiguous_grammar() -> Grammar {
        use NonTerminal::*;
        let identity_builder: BuilderFn = passthrough;
        let binary_builder: BuilderFn = fake_binary;
        let productions = vec![
            Production {
                id: 0,
                left: AugmentedStart,
                right: vec![Symbol::NonTerminal(Start)],
                builder: identity_builder,
                precedence: None,
            },
            Production {
                id: 1,
                left: Start,
                right: vec![Symbol::NonTerminal(Expr)],
                builder: identity_builder,
                precedence: None,
            },
            Production {
                id: 2,
                left: Expr,
                right: vec![
                    Symbol::NonTerminal(Expr),
                    Symbol::Terminal(Terminal::Plus),
                    Symbol::NonTerminal(Expr),
                ],
                builder: binary_builder,
                precedence: Some(PrecedenceEntry {
                    level: 5,
                    assoc: Associativity::Left,
                }),
            },
            Production {
                id: 3,
                left: Expr,
                right: vec![Symbol::Terminal(Terminal::Number)],
                builder: identity_builder,
                precedence: None,
            },
        ];
        let mut precedence = HashMap::new();
        precedence.insert(
            Terminal::Plus,
            PrecedenceEntry {
                level: 5,
                assoc: Associativity::Left,
            },
        );
        Grammar {
            productions,
            start: Start,
            augmented_start: AugmentedStart,
            precedence,
        }
    }

    #[test]
    fn shift_reduce_conflict_resolved_by_left_associativity() {
        let grammar = ambiguous_grammar();
        let table = TableBuilder::new(&grammar)
            .build()
            .expect("precedence must resolve the classic dangling-expr conflict");
        // Left associativity on `+` at equal precedence means reduce wins,
        // so `num + num . + num` must reduce rather than shift somewhere.
        let has_reduce = (0..table.num_states)
            .any(|s| matches!(table.action(s, Terminal::Plus), Action::Reduce(_)));
        assert!(has_reduce);
    }

    #[test]
    fn reduce_reduce_conflict_is_rejected() {
        use NonTerminal::*;
        let identity_builder: BuilderFn = passthrough;
        let productions = vec![
            Production {
                id: 0,
                left: AugmentedStart,
                right: vec![Symbol::NonTerminal(Start)],
                builder: identity_builder,
                precedence: None,
            },
            Production {
                id: 1,
                left: Start,
                right: vec![Symbol::NonTerminal(Expr)],
                builder: identity_builder,
                precedence: None,
            },
            // Two distinct reductions to the same nonterminal possibility
            // with overlapping lookahead and no distinguishing context.
            Production {
                id: 2,
                left: Expr,
                right: vec![Symbol::NonTerminal(Atom)],
                builder: identity_builder,
                precedence: None,
            },
            Production {
                id: 3,
                left: Atom,
                right: vec![Symbol::Terminal(Terminal::Number)],
                builder: identity_builder,
                precedence: None,
            },
            Production {
                id: 4,
                left: Expr,
                right: vec![Symbol::Terminal(Terminal::Number)],
                builder: identity_builder,
                precedence: None,
            },
        ];
        let grammar = Grammar {
            productions,
            start: Start,
            augmented_start: AugmentedStart,
            precedence: HashMap::new(),
        };
        let result = TableBuilder::new(&grammar).build();
        assert!(matches!(result, Err(Error::GrammarConflict { .. })));
    }
}
