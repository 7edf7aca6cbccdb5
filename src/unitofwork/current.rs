// Copyright 2025 Cowboy AI, LLC.

//! Per-thread stack of current units of work

use super::UnitOfWork;
use std::cell::RefCell;

thread_local! {
    static CURRENT: RefCell<Vec<UnitOfWork>> = const { RefCell::new(Vec::new()) };
}

pub(super) fn push(unit_of_work: UnitOfWork) {
    CURRENT.with(|stack| stack.borrow_mut().push(unit_of_work));
}

/// Remove `unit_of_work` wherever it sits in the stack
pub(super) fn remove(unit_of_work: &UnitOfWork) {
    CURRENT.with(|stack| stack.borrow_mut().retain(|u| !u.is_same(unit_of_work)));
}

pub(super) fn current() -> Option<UnitOfWork> {
    CURRENT.with(|stack| stack.borrow().last().cloned())
}

pub(super) fn depth() -> usize {
    CURRENT.with(|stack| stack.borrow().len())
}
