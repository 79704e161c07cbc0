//! Circular dependency detection for formula cells.
//!
//! When a formula is entered, we must verify it doesn't create a cycle
//! (e.g., A1 references B1, B1 references C1, C1 references A1).
//! This module uses depth-first search over a neighbor function, so a
//! candidate edge set can be overlaid on the graph without copying it.

use std::collections::HashSet;

use super::CellRef;

/// Reusable DFS state: the explicit stack of `(cell, next neighbor index)`
/// frames, the cells on it, and fully explored cells.
#[derive(Clone, Debug, Default)]
pub(crate) struct CycleScratch {
    on_stack: HashSet<CellRef>,
    finished: HashSet<CellRef>,
    frames: Vec<(CellRef, usize)>,
}

impl CycleScratch {
    fn reset(&mut self) {
        self.on_stack.clear();
        self.finished.clear();
        self.frames.clear();
    }
}

/// Detect a cycle reachable from `start`.
///
/// Returns the cycle path from the first occurrence of the repeated cell
/// through back to it, inclusive (`[A1, B1, A1]`; `[A1, A1]` for a self-reference).
/// The walk is iterative, so chain length is bounded by memory, not the stack.
pub(crate) fn detect_cycle<'a, F>(
    start: &CellRef,
    neighbors: F,
    scratch: &mut CycleScratch,
) -> Option<Vec<CellRef>>
where
    F: Fn(&CellRef) -> &'a [CellRef],
{
    scratch.reset();
    let CycleScratch {
        on_stack,
        finished,
        frames,
    } = scratch;

    on_stack.insert(start.clone());
    frames.push((start.clone(), 0));

    while let Some((current, idx)) = frames.last_mut() {
        let next = neighbors(current).get(*idx).cloned();
        *idx += 1;

        match next {
            Some(next) if on_stack.contains(&next) => {
                let first = frames.iter().position(|(c, _)| *c == next)?;
                let mut cycle: Vec<CellRef> = frames[first..].iter().map(|(c, _)| c.clone()).collect();
                cycle.push(next);
                return Some(cycle);
            }
            Some(next) => {
                if !finished.contains(&next) {
                    on_stack.insert(next.clone());
                    frames.push((next, 0));
                }
            }
            None => {
                if let Some((done, _)) = frames.pop() {
                    on_stack.remove(&done);
                    finished.insert(done);
                }
            }
        }
    }
    None
}
