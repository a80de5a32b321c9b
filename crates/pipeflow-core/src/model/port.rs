//! ポート定義

use crate::error::{ConfigurationError, Result};
use std::fmt;
use std::str::FromStr;

/// ポートマッピング（compose の短縮記法 `host:container[/udp]`）
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Port {
    pub host: u16,
    pub container: u16,
    pub protocol: Protocol,
}

/// プロトコル種別
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Protocol {
    #[default]
    Tcp,
    Udp,
}

impl Protocol {
    /// 文字列からProtocolをパース
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "tcp" => Some(Self::Tcp),
            "udp" => Some(Self::Udp),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Tcp => "tcp",
            Self::Udp => "udp",
        }
    }
}

impl Port {
    /// TCPのポートマッピングを作成
    pub fn new(host: u16, container: u16) -> Self {
        Self {
            host,
            container,
            protocol: Protocol::Tcp,
        }
    }

    /// `8080:8080` / `5353:53/udp` 形式をパース
    pub fn parse(s: &str) -> Result<Self> {
        let invalid = || ConfigurationError::InvalidPort(s.to_string());

        let (mapping, protocol) = match s.trim().split_once('/') {
            Some((mapping, proto)) => (mapping, Protocol::parse(proto).ok_or_else(invalid)?),
            None => (s.trim(), Protocol::Tcp),
        };

        let (host, container) = mapping.split_once(':').ok_or_else(invalid)?;
        let host = host.parse::<u16>().map_err(|_| invalid())?;
        let container = container.parse::<u16>().map_err(|_| invalid())?;

        Ok(Self {
            host,
            container,
            protocol,
        })
    }
}

impl FromStr for Port {
    type Err = ConfigurationError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl fmt::Display for Port {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.container)?;
        if self.protocol == Protocol::Udp {
            write!(f, "/udp")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_tcp_port() {
        let port = Port::parse("8080:80").unwrap();
        assert_eq!(port, Port::new(8080, 80));
        assert_eq!(port.to_string(), "8080:80");
    }

    #[test]
    fn test_parse_udp_port() {
        let port: Port = "5353:53/udp".parse().unwrap();
        assert_eq!(port.protocol, Protocol::Udp);
        assert_eq!(port.to_string(), "5353:53/udp");
    }

    #[test]
    fn test_parse_invalid_port() {
        assert!(matches!(
            Port::parse("8080"),
            Err(ConfigurationError::InvalidPort(_))
        ));
        assert!(Port::parse("http:80").is_err());
        assert!(Port::parse("8080:80/sctp").is_err());
        assert!(Port::parse("70000:80").is_err());
    }
}
