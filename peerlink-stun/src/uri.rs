#[cfg(test)]
mod uri_test;

use crate::{DEFAULT_PORT, DEFAULT_TLS_PORT};
use shared::error::*;
use std::fmt;
use std::net::{IpAddr, SocketAddr};

// SCHEME definitions from RFC 7064 Section 3.2.

pub const SCHEME: &str = "stun";
pub const SCHEME_SECURE: &str = "stuns";

// URI as defined in RFC 7064.
#[derive(PartialEq, Eq, Debug, Clone)]
pub struct Uri {
    pub scheme: String,
    pub host: String,
    pub port: Option<u16>,
}

impl fmt::Display for Uri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let host = if self.host.contains(':') {
            "[".to_owned() + self.host.as_str() + "]"
        } else {
            self.host.clone()
        };

        if let Some(port) = self.port {
            write!(f, "{}:{}:{}", self.scheme, host, port)
        } else {
            write!(f, "{}:{}", self.scheme, host)
        }
    }
}

impl Uri {
    // parse_uri parses URI from string.
    pub fn parse_uri(raw: &str) -> Result<Self> {
        let (scheme, rest) = raw.split_once(':').ok_or(Error::ErrInvalidUrl)?;
        if scheme != SCHEME && scheme != SCHEME_SECURE {
            return Err(Error::ErrSchemeType);
        }
        if rest.is_empty() || rest.starts_with("//") || rest.contains('?') {
            return Err(Error::ErrInvalidUrl);
        }

        let (host, port) = if let Some(v6) = rest.strip_prefix('[') {
            let (host, tail) = v6.split_once(']').ok_or(Error::ErrHost)?;
            let port = match tail.strip_prefix(':') {
                Some(p) => Some(p),
                None if tail.is_empty() => None,
                None => return Err(Error::ErrPort),
            };
            (host, port)
        } else {
            match rest.rsplit_once(':') {
                Some((host, port)) => (host, Some(port)),
                None => (rest, None),
            }
        };

        if host.is_empty() || host.contains(':') && !rest.starts_with('[') {
            return Err(Error::ErrHost);
        }

        let port = match port {
            Some(p) => Some(p.parse::<u16>().map_err(|_| Error::ErrPort)?),
            None => None,
        };

        Ok(Uri {
            scheme: scheme.to_owned(),
            host: host.to_owned(),
            port,
        })
    }

    /// port_or_default returns the explicit port or the IANA default for the scheme.
    pub fn port_or_default(&self) -> u16 {
        self.port.unwrap_or(if self.scheme == SCHEME_SECURE {
            DEFAULT_TLS_PORT
        } else {
            DEFAULT_PORT
        })
    }

    /// socket_addr returns the server address when host is an IP literal,
    /// None when it needs to be resolved.
    pub fn socket_addr(&self) -> Option<SocketAddr> {
        self.host
            .parse::<IpAddr>()
            .ok()
            .map(|ip| SocketAddr::new(ip, self.port_or_default()))
    }
}
