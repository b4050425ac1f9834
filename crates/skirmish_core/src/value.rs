//! Value cells: one data-access interface over plain and reactive storage.
//!
//! Combat logic reads and writes unit state only through [`ValueCell`].
//! A battle picks the storage style once through its [`CellFamily`]:
//!
//! - [`Direct`] stores every field as a [`Plain`] value.
//! - [`Observed`] stores every field as a [`Reactive`] value that notifies
//!   subscribed listeners on change.
//!
//! Targeting, the behavior machine and combat resolution are generic over
//! the family and never care which one is in use.
//!
//! # Example
//!
//! ```
//! use std::cell::Cell;
//! use std::rc::Rc;
//! use skirmish_core::value::{Reactive, ValueCell};
//!
//! let seen = Rc::new(Cell::new(0));
//! let mut health = Reactive::new(100_u32);
//! let sink = Rc::clone(&seen);
//! health.subscribe(move |value| sink.set(*value));
//!
//! health.set(70);
//! assert_eq!(health.get(), 70);
//! assert_eq!(seen.get(), 70);
//! ```

use std::fmt;
use std::rc::Rc;

/// Read-current-value / write-and-notify contract.
pub trait ValueCell<T: Copy> {
    /// Wrap an initial value.
    fn new(value: T) -> Self
    where
        Self: Sized;

    /// Read the current value.
    fn get(&self) -> T;

    /// Write a value (and notify listeners, if the cell has any).
    fn set(&mut self, value: T);
}

/// Bounds every cell-stored value satisfies.
pub trait CellValue: Copy + PartialEq + fmt::Debug + 'static {}

impl<T: Copy + PartialEq + fmt::Debug + 'static> CellValue for T {}

/// Selects the storage style for every cell-backed unit field.
pub trait CellFamily: 'static {
    /// The cell type for values of type `T`.
    type Cell<T: CellValue>: ValueCell<T> + Clone + fmt::Debug;
}

/// Build a cell of family `F` holding `value`.
pub fn new_cell<F: CellFamily, T: CellValue>(value: T) -> F::Cell<T> {
    <F::Cell<T> as ValueCell<T>>::new(value)
}

/// Plain-field storage family.
#[derive(Debug, Clone, Copy, Default)]
pub struct Direct;

impl CellFamily for Direct {
    type Cell<T: CellValue> = Plain<T>;
}

/// Reactive storage family.
#[derive(Debug, Clone, Copy, Default)]
pub struct Observed;

impl CellFamily for Observed {
    type Cell<T: CellValue> = Reactive<T>;
}

/// A value stored directly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Plain<T>(T);

impl<T: Copy> ValueCell<T> for Plain<T> {
    fn new(value: T) -> Self {
        Self(value)
    }

    fn get(&self) -> T {
        self.0
    }

    fn set(&mut self, value: T) {
        self.0 = value;
    }
}

/// Change listener attached to a [`Reactive`] cell.
pub type Listener<T> = Rc<dyn Fn(&T)>;

/// A value that notifies listeners whenever it changes.
///
/// Writing the value it already holds is not a change and notifies nobody.
#[derive(Clone)]
pub struct Reactive<T> {
    value: T,
    listeners: Vec<Listener<T>>,
}

impl<T> Reactive<T> {
    /// Attach a listener called with the new value after each change.
    pub fn subscribe(&mut self, listener: impl Fn(&T) + 'static) {
        self.listeners.push(Rc::new(listener));
    }

    /// Number of attached listeners.
    #[must_use]
    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }
}

impl<T: Copy + PartialEq> ValueCell<T> for Reactive<T> {
    fn new(value: T) -> Self {
        Self {
            value,
            listeners: Vec::new(),
        }
    }

    fn get(&self) -> T {
        self.value
    }

    fn set(&mut self, value: T) {
        if self.value == value {
            return;
        }
        self.value = value;
        for listener in &self.listeners {
            listener(&self.value);
        }
    }
}

impl<T: fmt::Debug> fmt::Debug for Reactive<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Reactive")
            .field("value", &self.value)
            .field("listeners", &self.listeners.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    #[test]
    fn plain_cell_reads_back_writes() {
        let mut cell = Plain::new(5_u32);
        cell.set(9);
        assert_eq!(cell.get(), 9);
    }

    #[test]
    fn reactive_cell_notifies_only_on_change() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let mut cell = Reactive::new(Some(1_u64));
        let sink = Rc::clone(&log);
        cell.subscribe(move |v| sink.borrow_mut().push(*v));

        cell.set(Some(1));
        cell.set(None);
        cell.set(Some(4));

        assert_eq!(*log.borrow(), vec![None, Some(4)]);
    }

    fn bump<F: CellFamily>() -> u32 {
        let mut cell = new_cell::<F, u32>(1);
        cell.set(cell.get() + 1);
        cell.get()
    }

    #[test]
    fn families_are_interchangeable() {
        assert_eq!(bump::<Direct>(), 2);
        assert_eq!(bump::<Observed>(), 2);
    }
}
