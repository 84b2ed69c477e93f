//! Typed control requests.
//!
//! The option map of a [`CommandEnvelope`] is decoded exactly once, at the
//! protocol boundary, into a [`ControlRequest`]: a closed command, a target
//! selector and a wait policy. Everything past the boundary works with these
//! types, never with raw option keys.

use std::fmt;
use std::str::FromStr;

use gridctl_core::constants::{
    ALL_OPT, FORCE_AFTER_KW, HOST_KW, HOSTS_OPT, OPTION_KW, WAIT_FOREVER_KW,
};
use gridctl_core::{Error, Result};

use crate::envelope::CommandEnvelope;

/// Lifecycle commands understood by every executor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ControlCommand {
    Status,
    Ping,
    Pause,
    Resume,
    Shutdown,
}

impl ControlCommand {
    /// Every command, in table order.
    pub const ALL: [ControlCommand; 5] = [
        ControlCommand::Status,
        ControlCommand::Ping,
        ControlCommand::Pause,
        ControlCommand::Resume,
        ControlCommand::Shutdown,
    ];

    /// Wire name of the command.
    pub fn as_str(&self) -> &'static str {
        match self {
            ControlCommand::Status => "status",
            ControlCommand::Ping => "ping",
            ControlCommand::Pause => "pause",
            ControlCommand::Resume => "resume",
            ControlCommand::Shutdown => "shutdown",
        }
    }
}

impl fmt::Display for ControlCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ControlCommand {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        ControlCommand::ALL
            .into_iter()
            .find(|c| c.as_str() == s)
            .ok_or_else(|| Error::Protocol {
                message: format!("invalid command [{}]", s),
            })
    }
}

/// Which hosts a request targets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TargetSelector {
    /// Every member of the grid.
    All,
    /// An explicit (possibly empty) host list, in caller order.
    Hosts(Vec<String>),
}

/// How long shutdown waits for draining.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WaitPolicy {
    /// Use the configured control timeout.
    #[default]
    None,
    /// Give up after this many seconds.
    ForceAfter(u64),
    /// Never give up draining.
    Forever,
}

/// A fully decoded control request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControlRequest {
    pub command: ControlCommand,
    pub target: TargetSelector,
    pub wait: WaitPolicy,
}

impl ControlRequest {
    pub fn new(command: ControlCommand, target: TargetSelector) -> Self {
        Self {
            command,
            target,
            wait: WaitPolicy::None,
        }
    }

    pub fn with_wait(mut self, wait: WaitPolicy) -> Self {
        self.wait = wait;
        self
    }

    /// The same command and wait policy, aimed at a single host.
    ///
    /// Used when forwarding: a forwarded request never carries the `all`
    /// selector, so it cannot fan out again.
    pub fn retarget(&self, host: &str) -> Self {
        Self {
            command: self.command,
            target: TargetSelector::Hosts(vec![host.to_string()]),
            wait: self.wait,
        }
    }

    /// Lower into the raw envelope.
    pub fn to_envelope(&self) -> CommandEnvelope {
        let mut envelope = CommandEnvelope::new(self.command.as_str());

        match &self.target {
            TargetSelector::All => {
                envelope.options.insert(OPTION_KW.into(), ALL_OPT.into());
            }
            TargetSelector::Hosts(hosts) => {
                envelope.options.insert(OPTION_KW.into(), HOSTS_OPT.into());
                for (i, host) in hosts.iter().enumerate() {
                    envelope
                        .options
                        .insert(format!("{}_{}", HOST_KW, i), host.clone());
                }
            }
        }

        match self.wait {
            WaitPolicy::None => {}
            WaitPolicy::ForceAfter(secs) => {
                envelope
                    .options
                    .insert(FORCE_AFTER_KW.into(), secs.to_string());
            }
            WaitPolicy::Forever => {
                envelope.options.insert(WAIT_FOREVER_KW.into(), "0".into());
            }
        }

        envelope
    }

    /// Decode the typed request from a raw envelope.
    ///
    /// Rejects unknown commands, unknown option keys, a missing or invalid
    /// selector, and conflicting wait policies.
    pub fn from_envelope(envelope: &CommandEnvelope) -> Result<Self> {
        let command: ControlCommand = envelope.command.parse()?;

        let mut option: Option<&str> = None;
        let mut hosts: Vec<(u64, String)> = Vec::new();
        let mut wait = WaitPolicy::None;

        for (key, value) in &envelope.options {
            if key == OPTION_KW {
                option = Some(value.as_str());
            } else if key == FORCE_AFTER_KW {
                let secs = value.parse::<u64>().map_err(|_| Error::Protocol {
                    message: format!("invalid {} value [{}]", FORCE_AFTER_KW, value),
                })?;
                if wait == WaitPolicy::Forever {
                    return Err(conflicting_wait());
                }
                wait = WaitPolicy::ForceAfter(secs);
            } else if key == WAIT_FOREVER_KW {
                if matches!(wait, WaitPolicy::ForceAfter(_)) {
                    return Err(conflicting_wait());
                }
                wait = WaitPolicy::Forever;
            } else if let Some(index) = host_index(key) {
                hosts.push((index, value.clone()));
            } else {
                return Err(Error::Protocol {
                    message: format!("invalid option key [{}]", key),
                });
            }
        }

        let target = match option {
            Some(ALL_OPT) => TargetSelector::All,
            Some(HOSTS_OPT) => {
                hosts.sort_by_key(|(index, _)| *index);
                TargetSelector::Hosts(hosts.into_iter().map(|(_, h)| h).collect())
            }
            Some(other) => {
                return Err(Error::Protocol {
                    message: format!("invalid option value [{}]", other),
                });
            }
            None => {
                return Err(Error::Protocol {
                    message: "option parameter is empty".into(),
                });
            }
        };

        Ok(Self {
            command,
            target,
            wait,
        })
    }
}

/// Numeric suffix of a `server_control_host_<n>` key.
fn host_index(key: &str) -> Option<u64> {
    key.strip_prefix(HOST_KW)?.strip_prefix('_')?.parse().ok()
}

fn conflicting_wait() -> Error {
    Error::Protocol {
        message: format!(
            "{} and {} are mutually exclusive",
            FORCE_AFTER_KW, WAIT_FOREVER_KW
        ),
    }
}
