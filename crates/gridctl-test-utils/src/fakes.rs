//! Fake catalog, agents and process control.

use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;

use gridctl_core::{Error, Result};
use gridctl_server::{AgentInfo, AgentMonitor, Catalog, ProcessControl};

/// Catalog with a fixed membership, or a failing one.
#[derive(Debug, Default)]
pub struct FakeCatalog {
    hosts: Vec<String>,
    fail: bool,
    queries: AtomicUsize,
}

impl FakeCatalog {
    pub fn new(hosts: &[&str]) -> Self {
        Self {
            hosts: hosts.iter().map(|h| h.to_string()).collect(),
            ..Self::default()
        }
    }

    /// A catalog whose query always fails.
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    /// How many times membership was queried.
    pub fn queries(&self) -> usize {
        self.queries.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Catalog for FakeCatalog {
    async fn resource_hosts(&self) -> Result<Vec<String>> {
        self.queries.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(Error::Catalog {
                message: "catalog unavailable".into(),
            });
        }
        Ok(self.hosts.clone())
    }
}

/// Agent monitor whose live count drops by one on every check.
#[derive(Debug, Default)]
pub struct FakeAgents {
    remaining: AtomicUsize,
    sticky: bool,
    checks: AtomicUsize,
}

impl FakeAgents {
    /// `count` agents that finish one per drain check.
    pub fn draining(count: usize) -> Self {
        Self {
            remaining: AtomicUsize::new(count),
            ..Self::default()
        }
    }

    /// `count` agents that never finish.
    pub fn stuck(count: usize) -> Self {
        Self {
            remaining: AtomicUsize::new(count),
            sticky: true,
            ..Self::default()
        }
    }

    /// How many times the live count was checked.
    pub fn checks(&self) -> usize {
        self.checks.load(Ordering::SeqCst)
    }
}

impl AgentMonitor for FakeAgents {
    fn agents(&self) -> Vec<AgentInfo> {
        (0..self.remaining.load(Ordering::SeqCst))
            .map(|i| AgentInfo {
                pid: 1000 + i as i32,
                age: Duration::from_secs(7),
            })
            .collect()
    }

    fn live_count(&self) -> usize {
        self.checks.fetch_add(1, Ordering::SeqCst);
        let current = self.remaining.load(Ordering::SeqCst);
        if !self.sticky && current > 0 {
            self.remaining.store(current - 1, Ordering::SeqCst);
        }
        current
    }
}

/// Records terminated pids instead of signalling anything.
#[derive(Debug, Default)]
pub struct RecordingTerminator {
    terminated: Mutex<Vec<i32>>,
    ages: HashMap<i32, Duration>,
}

impl RecordingTerminator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Report `age` for `pid`.
    pub fn with_age(mut self, pid: i32, age: Duration) -> Self {
        self.ages.insert(pid, age);
        self
    }

    pub fn terminated(&self) -> Vec<i32> {
        self.terminated.lock().unwrap().clone()
    }
}

impl ProcessControl for RecordingTerminator {
    fn terminate(&self, pid: i32) -> Result<()> {
        self.terminated.lock().unwrap().push(pid);
        Ok(())
    }

    fn age(&self, pid: i32) -> Option<Duration> {
        self.ages.get(&pid).copied()
    }
}
