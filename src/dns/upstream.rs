//! Forwarding of escalated questions to upstream resolvers.

use crate::dns::cache::AnswerCache;
use crate::dns::fqdn;
use crate::resolver::normalize_name;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::UdpSocket;
use tracing::{debug, warn};
use trust_dns_client::client::{AsyncClient, ClientHandle};
use trust_dns_client::error::ClientError;
use trust_dns_client::udp::UdpClientStream;
use trust_dns_server::client::rr::{DNSClass, Name, Record, RecordType};

/// The ordered list of upstream servers, and the answers they gave while still fresh.
pub struct Upstream {
    servers: Vec<SocketAddr>,
    timeout: Duration,
    cache: AnswerCache,
}

impl Upstream {
    pub fn new(servers: Vec<SocketAddr>, timeout: Duration) -> Self {
        Self {
            servers,
            timeout,
            cache: AnswerCache::new(),
        }
    }

    /// Ask each server in turn, returning the answers of the first one that has any. Failures
    /// and timeouts move on to the next server. Answers are cached until their smallest TTL
    /// expires.
    pub async fn query(&self, name: &str, rrtype: RecordType, rrclass: u16) -> Vec<Record> {
        let key = (normalize_name(name), rrtype, rrclass);
        if let Some(answers) = self.cache.get(&key) {
            debug!("cached upstream answer for {name} ({rrtype})");
            return answers;
        }

        let fqdn = match fqdn(name) {
            Ok(fqdn) => fqdn,
            Err(err) => {
                warn!("not forwarding invalid name \"{name}\": {err}");
                return Vec::default();
            }
        };
        let class = DNSClass::from_u16(rrclass).unwrap_or(DNSClass::IN);

        for server in &self.servers {
            debug!("querying upstream {server} for {fqdn} ({rrtype})");
            match self.query_server(*server, fqdn.clone(), class, rrtype).await {
                Ok(answers) if !answers.is_empty() => {
                    self.cache.insert(key, &answers);
                    return answers;
                }
                Ok(_) => {}
                Err(err) => warn!("upstream {server} failed for {fqdn}: {err}"),
            }
        }
        debug!("upstream had no results for {fqdn}");
        Vec::default()
    }

    async fn query_server(
        &self,
        server: SocketAddr,
        name: Name,
        class: DNSClass,
        rrtype: RecordType,
    ) -> Result<Vec<Record>, ClientError> {
        let stream = UdpClientStream::<UdpSocket>::with_timeout(server, self.timeout);
        let (mut client, background) = AsyncClient::connect(stream).await?;
        tokio::spawn(background);
        let response = client.query(name, class, rrtype).await?;
        Ok(response.answers().to_vec())
    }
}
