//! Standard ingress rule set applied to every VM
//!
//! Azure expresses these as NSG rules, GCP as VPC firewall rules. The table
//! itself is provider independent.

use std::fmt;

/// Port the consensus layer listens on (any protocol)
pub const CONSENSUS_PORT: u16 = 18551;

/// Rule protocol
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Protocol {
    Tcp,
    /// Any protocol
    All,
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Protocol::Tcp => write!(f, "tcp"),
            Protocol::All => write!(f, "all"),
        }
    }
}

/// A single ingress rule
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NsgRule {
    pub name: String,
    pub priority: u16,
    pub port: u16,
    pub protocol: Protocol,
    /// Source address prefix, `*` for anywhere
    pub source: String,
}

impl NsgRule {
    pub fn new(
        name: impl Into<String>,
        priority: u16,
        port: u16,
        protocol: Protocol,
        source: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            priority,
            port,
            protocol,
            source: source.into(),
        }
    }

    fn tcp_any(port: u16, priority: u16) -> Self {
        Self::new(format!("TCP{}", port), priority, port, Protocol::Tcp, "*")
    }

    /// Source as a CIDR range (`*` becomes `0.0.0.0/0`)
    pub fn source_range(&self) -> &str {
        if self.source == "*" {
            "0.0.0.0/0"
        } else {
            &self.source
        }
    }
}

/// The fixed rule set. SSH is restricted to `source_ip`.
pub fn standard_rules(source_ip: &str) -> Vec<NsgRule> {
    vec![
        NsgRule::new("AllowSSH", 100, 22, Protocol::Tcp, source_ip),
        NsgRule::new("AllowAnyHTTPInbound", 101, 80, Protocol::Tcp, "*"),
        NsgRule::new("AllowAnyHTTPSInbound", 102, 443, Protocol::Tcp, "*"),
        NsgRule::tcp_any(7878, 115),
        NsgRule::tcp_any(7936, 116),
        NsgRule::tcp_any(8545, 110),
        NsgRule::tcp_any(8551, 111),
        NsgRule::tcp_any(8645, 112),
        NsgRule::tcp_any(8745, 113),
        NsgRule::new(
            format!("ANY{}", CONSENSUS_PORT),
            114,
            CONSENSUS_PORT,
            Protocol::All,
            "*",
        ),
    ]
}
