//! One ordered log of every collaborator call, shared by the fake adapter
//! and the fake store, so tests can assert on cross-collaborator ordering
//! such as "bring_down, then write, then bring_up".

use std::sync::{Arc, Mutex};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    BringUp { id: String, config: String },
    BringDown { id: String, config: String },
    Write { id: String, config: String },
    Delete { id: String },
}

#[derive(Debug, Clone, Default)]
pub struct Journal {
    calls: Arc<Mutex<Vec<Call>>>,
}

impl Journal {
    pub fn record(&self, call: Call) {
        self.calls.lock().unwrap().push(call);
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn clear(&self) {
        self.calls.lock().unwrap().clear();
    }

    pub fn count(&self, pred: impl Fn(&Call) -> bool) -> usize {
        self.calls.lock().unwrap().iter().filter(|c| pred(c)).count()
    }
}

pub fn up(id: &str, config: &str) -> Call {
    Call::BringUp {
        id: id.into(),
        config: config.into(),
    }
}

pub fn down(id: &str, config: &str) -> Call {
    Call::BringDown {
        id: id.into(),
        config: config.into(),
    }
}

pub fn write(id: &str, config: &str) -> Call {
    Call::Write {
        id: id.into(),
        config: config.into(),
    }
}

pub fn delete(id: &str) -> Call {
    Call::Delete { id: id.into() }
}
