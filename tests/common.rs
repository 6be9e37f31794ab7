#![allow(dead_code)]

use std::sync::{Arc, Mutex, Once};

use rust_pro::{Error, Outcome};

static INIT: Once = Once::new();

/// Sets up the tracing subscriber for tests, ensuring it's only initialized once.
pub fn setup_tracing() {
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt().with_test_writer().try_init();
    });
}

/// Records which callbacks of a chain ran, in order
#[derive(Clone, Default)]
pub struct Trail(Arc<Mutex<String>>);

impl Trail {
    pub fn push(&self, tag: &str) {
        self.0.lock().unwrap().push_str(tag);
    }

    pub fn get(&self) -> String {
        self.0.lock().unwrap().clone()
    }

    /// Value or rejection callback that records `tag` and resolves with `value`
    pub fn mark(&self, tag: &'static str, value: i32) -> impl FnOnce(i32) -> Outcome<i32> + Send + 'static {
        let trail = self.clone();
        move |_| {
            trail.push(tag);
            Ok(value)
        }
    }

    /// Error callback that records `tag` and resolves with `value`
    pub fn mark_error(
        &self,
        tag: &'static str,
        value: i32,
    ) -> impl FnOnce(Error) -> Outcome<i32> + Send + 'static {
        let trail = self.clone();
        move |_| {
            trail.push(tag);
            Ok(value)
        }
    }

    /// Unit-valued variants for chains over `()`
    pub fn mark_unit(&self, tag: &'static str) -> impl FnOnce(()) -> Outcome<()> + Send + 'static {
        let trail = self.clone();
        move |_| {
            trail.push(tag);
            Ok(())
        }
    }

    pub fn mark_unit_error(&self, tag: &'static str) -> impl FnOnce(Error) -> Outcome<()> + Send + 'static {
        let trail = self.clone();
        move |_| {
            trail.push(tag);
            Ok(())
        }
    }
}
