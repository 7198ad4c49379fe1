//! Test and helper mocks for changer_core

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use changer_traits::Transport;

use crate::util::lock;

#[derive(Debug, Default)]
struct Script {
    replies: HashMap<String, VecDeque<String>>,
    otherwise: Option<String>,
    pending: Option<String>,
    written: Vec<String>,
    fail_writes: bool,
}

/// Transport answering from canned replies keyed by the exact command line.
///
/// Queued replies are consumed in order; the last one for a command sticks.
/// Unscripted commands get the `otherwise` reply, or nothing (a timeout).
/// Clones share the script, so a test can keep one to inspect traffic.
#[derive(Debug, Clone, Default)]
pub struct ScriptedTransport {
    script: Arc<Mutex<Script>>,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reply(self, cmd: &str, line: &str) -> Self {
        self.push_reply(cmd, line);
        self
    }

    pub fn otherwise(self, line: &str) -> Self {
        lock(&self.script).otherwise = Some(line.to_string());
        self
    }

    pub fn push_reply(&self, cmd: &str, line: &str) {
        lock(&self.script)
            .replies
            .entry(cmd.to_string())
            .or_default()
            .push_back(line.to_string());
    }

    pub fn set_fail_writes(&self, fail: bool) {
        lock(&self.script).fail_writes = fail;
    }

    /// Every command written so far, in order.
    pub fn written(&self) -> Vec<String> {
        lock(&self.script).written.clone()
    }

    pub fn count_of(&self, cmd: &str) -> usize {
        lock(&self.script).written.iter().filter(|c| *c == cmd).count()
    }
}

impl Transport for ScriptedTransport {
    fn write_line(&mut self, line: &str) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let mut guard = lock(&self.script);
        let s = &mut *guard;
        if s.fail_writes {
            return Err(Box::new(std::io::Error::other("scripted write failure")));
        }
        s.written.push(line.to_string());
        let reply = match s.replies.get_mut(line) {
            Some(q) if q.len() > 1 => q.pop_front(),
            Some(q) => q.front().cloned(),
            None => s.otherwise.clone(),
        };
        s.pending = reply;
        Ok(())
    }

    fn read_line(&mut self, _timeout: Duration) -> String {
        lock(&self.script).pending.take().unwrap_or_default()
    }
}
