use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use simplisync::browser::{DriverError, Locator, PageDriver};

/// One recorded driver call, in the order the flow issued it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Op {
    Navigate(String),
    WaitFor(String),
    Click(String),
    Fill { selector: String, text: String },
    ReadText(String),
    Eval(String),
    EnterFrame(String),
    LeaveFrame,
}

/// Scripted page driver. Selectors listed as present resolve immediately;
/// everything else times out without sleeping, so flow tests run fast.
pub struct MockDriver {
    present: HashSet<String>,
    frames: HashSet<String>,
    texts: HashMap<String, String>,
    eval_result: serde_json::Value,
    ops: Mutex<Vec<Op>>,
    closes: AtomicUsize,
}

impl Default for MockDriver {
    fn default() -> Self {
        Self {
            present: HashSet::new(),
            frames: HashSet::new(),
            texts: HashMap::new(),
            eval_result: serde_json::Value::Null,
            ops: Mutex::new(Vec::new()),
            closes: AtomicUsize::new(0),
        }
    }
}

impl MockDriver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_present(mut self, selector: impl Into<String>) -> Self {
        self.present.insert(selector.into());
        self
    }

    pub fn with_frame(mut self, name: impl Into<String>) -> Self {
        self.frames.insert(name.into());
        self
    }

    pub fn with_text(mut self, selector: impl Into<String>, text: impl Into<String>) -> Self {
        self.texts.insert(selector.into(), text.into());
        self
    }

    pub fn with_eval_result(mut self, value: serde_json::Value) -> Self {
        self.eval_result = value;
        self
    }

    pub fn recorded(&self) -> Vec<Op> {
        self.ops.lock().unwrap().clone()
    }

    pub fn close_count(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }

    fn record(&self, op: Op) {
        self.ops.lock().unwrap().push(op);
    }
}

#[async_trait]
impl PageDriver for MockDriver {
    async fn navigate(&self, url: &str) -> Result<(), DriverError> {
        self.record(Op::Navigate(url.to_string()));
        Ok(())
    }

    async fn wait_for(&self, locator: &Locator, timeout: Duration) -> Result<(), DriverError> {
        self.record(Op::WaitFor(locator.css.to_string()));
        if self.present.contains(locator.css) {
            Ok(())
        } else {
            Err(DriverError::Timeout {
                what: locator.to_string(),
                timeout,
            })
        }
    }

    async fn click(&self, locator: &Locator) -> Result<(), DriverError> {
        self.record(Op::Click(locator.css.to_string()));
        Ok(())
    }

    async fn fill(&self, locator: &Locator, text: &str) -> Result<(), DriverError> {
        self.record(Op::Fill {
            selector: locator.css.to_string(),
            text: text.to_string(),
        });
        Ok(())
    }

    async fn read_text(&self, locator: &Locator) -> Result<String, DriverError> {
        self.record(Op::ReadText(locator.css.to_string()));
        Ok(self.texts.get(locator.css).cloned().unwrap_or_default())
    }

    async fn eval(&self, expression: &str) -> Result<serde_json::Value, DriverError> {
        self.record(Op::Eval(expression.to_string()));
        Ok(self.eval_result.clone())
    }

    async fn enter_frame(&self, name: &str, timeout: Duration) -> Result<(), DriverError> {
        self.record(Op::EnterFrame(name.to_string()));
        if self.frames.contains(name) {
            Ok(())
        } else {
            Err(DriverError::Timeout {
                what: format!("frame {name:?}"),
                timeout,
            })
        }
    }

    async fn leave_frame(&self) {
        self.record(Op::LeaveFrame);
    }

    async fn close(&self) {
        self.closes.fetch_add(1, Ordering::SeqCst);
    }
}
