use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::net::{IpAddr, SocketAddr, ToSocketAddrs};
use std::rc::Rc;
use std::sync::mpsc;
use std::thread;

use shared::error::*;

/// Address family a host name should resolve to.
#[derive(Default, Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum AddressFamily {
    #[default]
    Ipv4,
    Ipv6,
}

impl fmt::Display for AddressFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match *self {
            AddressFamily::Ipv4 => "ipv4",
            AddressFamily::Ipv6 => "ipv6",
        };
        write!(f, "{s}")
    }
}

impl AddressFamily {
    pub fn of(ip: &IpAddr) -> Self {
        if ip.is_ipv4() {
            AddressFamily::Ipv4
        } else {
            AddressFamily::Ipv6
        }
    }

    pub fn matches(&self, ip: &IpAddr) -> bool {
        *self == AddressFamily::of(ip)
    }
}

/// AsyncDnsResolver resolves one host name off the network context.
///
/// `start` never blocks. The owner learns that a result may be ready through
/// its own completion path and then reads `result`, which stays `None` while
/// the lookup is in flight.
pub trait AsyncDnsResolver {
    fn start(&mut self, hostname: &str, family: AddressFamily);
    fn result(&mut self) -> Option<Result<IpAddr>>;
}

/// Creates one resolver per lookup.
pub trait AsyncDnsResolverFactory {
    fn create(&self) -> Box<dyn AsyncDnsResolver>;
}

#[derive(Default)]
struct StaticHosts {
    hosts: HashMap<String, Vec<IpAddr>>,
    hold: bool,
}

/// StaticResolverFactory answers lookups from an in-memory host table.
///
/// While held, every resolver it created reports its lookup as pending.
#[derive(Default, Clone)]
pub struct StaticResolverFactory {
    table: Rc<RefCell<StaticHosts>>,
}

impl StaticResolverFactory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_host(self, hostname: &str, ip: IpAddr) -> Self {
        self.table
            .borrow_mut()
            .hosts
            .entry(hostname.to_owned())
            .or_default()
            .push(ip);
        self
    }

    /// hold keeps lookups pending until released with `hold(false)`.
    pub fn hold(&self, hold: bool) {
        self.table.borrow_mut().hold = hold;
    }
}

impl AsyncDnsResolverFactory for StaticResolverFactory {
    fn create(&self) -> Box<dyn AsyncDnsResolver> {
        Box::new(StaticResolver {
            table: Rc::clone(&self.table),
            query: None,
        })
    }
}

pub struct StaticResolver {
    table: Rc<RefCell<StaticHosts>>,
    query: Option<(String, AddressFamily)>,
}

impl AsyncDnsResolver for StaticResolver {
    fn start(&mut self, hostname: &str, family: AddressFamily) {
        self.query = Some((hostname.to_owned(), family));
    }

    fn result(&mut self) -> Option<Result<IpAddr>> {
        let (hostname, family) = self.query.as_ref()?;
        let table = self.table.borrow();
        if table.hold {
            return None;
        }

        if let Ok(ip) = hostname.parse::<IpAddr>() {
            return Some(Ok(ip));
        }

        let found = table
            .hosts
            .get(hostname)
            .and_then(|ips| ips.iter().find(|ip| family.matches(ip)).copied());
        Some(found.ok_or_else(|| Error::ErrDnsResolveFailed(hostname.clone())))
    }
}

/// ThreadResolverFactory resolves through the operating system on a worker
/// thread. The answer is handed back over a channel and picked up by `result`.
#[derive(Default, Clone, Copy)]
pub struct ThreadResolverFactory;

impl AsyncDnsResolverFactory for ThreadResolverFactory {
    fn create(&self) -> Box<dyn AsyncDnsResolver> {
        Box::new(ThreadResolver::default())
    }
}

#[derive(Default)]
pub struct ThreadResolver {
    rx: Option<mpsc::Receiver<std::result::Result<IpAddr, String>>>,
    answer: Option<std::result::Result<IpAddr, String>>,
}

impl AsyncDnsResolver for ThreadResolver {
    fn start(&mut self, hostname: &str, family: AddressFamily) {
        let (tx, rx) = mpsc::channel();
        let hostname = hostname.to_owned();
        thread::spawn(move || {
            let answer = (hostname.as_str(), 0)
                .to_socket_addrs()
                .map_err(|err| err.to_string())
                .and_then(|mut addrs| {
                    addrs
                        .find(|addr: &SocketAddr| family.matches(&addr.ip()))
                        .map(|addr| addr.ip())
                        .ok_or_else(|| format!("no {family} address"))
                });
            // The owner may have gone away; nothing to report then.
            let _ = tx.send(answer);
        });
        self.rx = Some(rx);
        self.answer = None;
    }

    fn result(&mut self) -> Option<Result<IpAddr>> {
        if self.answer.is_none() {
            match self.rx.as_ref()?.try_recv() {
                Ok(answer) => self.answer = Some(answer),
                Err(mpsc::TryRecvError::Empty) => return None,
                Err(mpsc::TryRecvError::Disconnected) => {
                    self.answer = Some(Err("resolver worker exited".to_owned()))
                }
            }
        }

        self.answer.as_ref().map(|answer| match answer {
            Ok(ip) => Ok(*ip),
            Err(reason) => Err(Error::ErrDnsResolveFailed(reason.clone())),
        })
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_static_resolver() -> Result<()> {
        let factory = StaticResolverFactory::new()
            .with_host("stun.example.org", "192.0.2.1".parse()?)
            .with_host("stun.example.org", "2001:db8::1".parse()?);

        let mut r = factory.create();
        assert!(r.result().is_none(), "not started");

        r.start("stun.example.org", AddressFamily::Ipv6);
        assert_eq!(r.result(), Some(Ok("2001:db8::1".parse()?)));

        factory.hold(true);
        let mut r = factory.create();
        r.start("stun.example.org", AddressFamily::Ipv4);
        assert!(r.result().is_none(), "held");
        factory.hold(false);
        assert_eq!(r.result(), Some(Ok("192.0.2.1".parse()?)));

        let mut r = factory.create();
        r.start("unknown.example.org", AddressFamily::Ipv4);
        assert_eq!(
            r.result(),
            Some(Err(Error::ErrDnsResolveFailed(
                "unknown.example.org".to_owned()
            )))
        );

        Ok(())
    }
}
