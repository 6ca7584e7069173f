use crate::config::{Config, Shared};
use crate::dns::handlers::Handler;
use crate::dns::upstream::Upstream;
use crate::resolver::Engine;
use std::io;
use std::sync::Arc;
use tokio::net::{TcpListener, UdpSocket};
use trust_dns_server::ServerFuture;

/// Bind every configured listen address. Each address gets its own server so handlers know the
/// local address a query arrived on.
pub async fn new(
    config: Shared,
    engine: Engine,
) -> anyhow::Result<Vec<ServerFuture<Handler>>> {
    let mut udp_sockets = Vec::new();
    for udp_addr in &config.dns_udp_bind_addrs {
        udp_sockets.push(UdpSocket::bind(udp_addr).await?);
    }
    let mut tcp_listeners = Vec::new();
    for tcp_addr in &config.dns_tcp_bind_addrs {
        tcp_listeners.push(TcpListener::bind(tcp_addr).await?);
    }
    Ok(serve(&config, engine, udp_sockets, tcp_listeners)?)
}

/// Create servers for already bound sockets. All of them share one upstream forwarder.
///
/// # Errors
///
/// Returns an error when the local address of a socket can't be read.
pub fn serve(
    config: &Config,
    engine: Engine,
    udp_sockets: Vec<UdpSocket>,
    tcp_listeners: Vec<TcpListener>,
) -> io::Result<Vec<ServerFuture<Handler>>> {
    let upstream = Arc::new(Upstream::new(
        config.upstreams.clone(),
        config.upstream_timeout,
    ));
    let handler = |local_addr| {
        Handler::new(
            engine.clone(),
            upstream.clone(),
            config.max_cname_depth,
            local_addr,
        )
    };

    let mut servers = Vec::new();
    for socket in udp_sockets {
        let mut dns_server = ServerFuture::new(handler(socket.local_addr()?));
        dns_server.register_socket(socket);
        servers.push(dns_server);
    }
    for listener in tcp_listeners {
        let mut dns_server = ServerFuture::new(handler(listener.local_addr()?));
        dns_server.register_listener(listener, config.dns_tcp_timeout);
        servers.push(dns_server);
    }
    Ok(servers)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::binding_store::InMemoryBindingStore;
    use crate::dns::upstream::tests::fake_upstream;
    use crate::dyndns::checksum;
    use crate::dyndns::tests::FixedClock;
    use crate::resolver::{handler_fn, BindingRegistry, Query, Response};
    use std::net::{Ipv4Addr, SocketAddr};
    use std::str::FromStr;
    use std::sync::atomic::Ordering;
    use std::time::Duration;
    use trust_dns_client::client::{AsyncClient, ClientHandle};
    use trust_dns_client::udp::UdpClientStream;
    use trust_dns_server::client::op::{Message, MessageType, OpCode, Query as Question, ResponseCode};
    use trust_dns_server::client::rr::{DNSClass, Name, RData, RecordType};
    use trust_dns_server::proto::serialize::binary::BinEncodable;

    const NOW: i64 = 1_700_000_000;

    fn config(upstreams: &[SocketAddr]) -> Config {
        let upstreams: Vec<String> = upstreams.iter().map(ToString::to_string).collect();
        Config::try_from_str(
            &serde_json::json!({
                "dns_udp_bind_addrs": ["127.0.0.1:0"],
                "upstreams": upstreams,
                "upstream_timeout": 2,
                "dyndns": {
                    "zone_root": "dyn.domain.tld",
                    "keys": { "domain1": "secret_key1" }
                },
                "bindings": [
                    { "type": "A", "name": "a.example",
                      "records": [{ "type": "CNAME", "target": "b.example", "ttl": 60 }] },
                    { "type": "A", "name": "b.example",
                      "records": [{ "type": "A", "ip": "1.2.3.4", "ttl": 60, "authoritative": true }] },
                    { "type": "A", "name": "outside.example",
                      "records": [{ "type": "CNAME", "target": "elsewhere.example", "ttl": 60 }] }
                ]
            })
            .to_string(),
        )
        .unwrap()
    }

    /// Start a UDP server on loopback and return its address.
    async fn start(config: Config) -> SocketAddr {
        let store = Arc::new(InMemoryBindingStore::new());
        let mut registry = config
            .registry(store, Arc::new(FixedClock(NOW)))
            .unwrap();
        start_with(config, &mut registry).await
    }

    async fn start_with(config: Config, registry: &mut BindingRegistry) -> SocketAddr {
        let engine = Engine::new(registry.freeze(), config.upstream_configured());
        let socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let addr = socket.local_addr().unwrap();
        for server in serve(&config, engine, vec![socket], vec![]).unwrap() {
            tokio::spawn(server.block_until_done());
        }
        addr
    }

    async fn client(server: SocketAddr) -> AsyncClient {
        let stream = UdpClientStream::<UdpSocket>::with_timeout(server, Duration::from_secs(5));
        let (client, background) = AsyncClient::connect(stream).await.unwrap();
        tokio::spawn(background);
        client
    }

    fn name(s: &str) -> Name {
        Name::from_str(s).unwrap()
    }

    /// `(owner, rdata)` of every answer.
    fn answers(response: &Message) -> Vec<(String, RData)> {
        response
            .answers()
            .iter()
            .map(|record| (record.name().to_string(), record.data().cloned().unwrap()))
            .collect()
    }

    #[tokio::test]
    async fn cname_chain_is_answered_authoritatively() {
        let server = start(config(&[])).await;
        let mut client = client(server).await;

        let response = client
            .query(name("A.Example."), DNSClass::IN, RecordType::A)
            .await
            .unwrap();
        assert_eq!(response.response_code(), ResponseCode::NoError);
        assert!(response.header().authoritative());
        assert_eq!(
            answers(&response),
            vec![
                ("a.example.".to_string(), RData::CNAME(name("b.example."))),
                ("b.example.".to_string(), RData::A(Ipv4Addr::new(1, 2, 3, 4))),
            ]
        );
    }

    #[tokio::test]
    async fn non_authoritative_answers_clear_aa() {
        let mut registry = BindingRegistry::new();
        registry
            .register(
                RecordType::A,
                "plain.example",
                handler_fn("plain", |_: &Query| Some(vec![Response::a("192.0.2.5", 5).into()])),
            )
            .unwrap();
        let server = start_with(config(&[]), &mut registry).await;
        let mut client = client(server).await;

        let response = client
            .query(name("plain.example."), DNSClass::IN, RecordType::A)
            .await
            .unwrap();
        assert!(!response.header().authoritative());
        assert_eq!(response.answers().len(), 1);
    }

    #[tokio::test]
    async fn dynamic_update_over_the_wire() {
        let server = start(config(&[])).await;
        let mut client = client(server).await;

        let response = client
            .query(name("domain1.dyn.domain.tld."), DNSClass::IN, RecordType::A)
            .await
            .unwrap();
        assert_eq!(
            answers(&response)[0],
            (
                "domain1.dyn.domain.tld.".to_string(),
                RData::CNAME(name("unbound.dyn.domain.tld."))
            )
        );

        let ts = NOW.to_string();
        let command = format!(
            "{}.{ts}.configure.domain1.dyn.domain.tld.",
            checksum("secret_key1", &ts)
        );
        let response = client
            .query(name(&command), DNSClass::IN, RecordType::A)
            .await
            .unwrap();
        assert_eq!(
            answers(&response),
            vec![
                (command.clone(), RData::CNAME(name("ok.dyn.domain.tld."))),
                (
                    "ok.dyn.domain.tld.".to_string(),
                    RData::A(Ipv4Addr::UNSPECIFIED)
                ),
            ]
        );

        let response = client
            .query(name("domain1.dyn.domain.tld."), DNSClass::IN, RecordType::A)
            .await
            .unwrap();
        assert!(response.header().authoritative());
        assert_eq!(response.answers()[0].ttl(), 3600);
        assert_eq!(
            response.answers()[0].data(),
            Some(&RData::A(Ipv4Addr::LOCALHOST))
        );
    }

    #[tokio::test]
    async fn unanswered_names_are_nxdomain() {
        let server = start(config(&[])).await;
        let mut client = client(server).await;

        let response = client
            .query(name("nothing.example."), DNSClass::IN, RecordType::A)
            .await
            .unwrap();
        assert_eq!(response.response_code(), ResponseCode::NXDomain);
        assert!(response.answers().is_empty());
    }

    #[tokio::test]
    async fn escalations_are_forwarded_upstream() {
        let (upstream, hits) = fake_upstream(Some(Ipv4Addr::new(192, 0, 2, 99))).await;
        let server = start(config(&[upstream])).await;
        let mut client = client(server).await;

        let response = client
            .query(name("elsewhere.example."), DNSClass::IN, RecordType::A)
            .await
            .unwrap();
        assert!(!response.header().authoritative());
        assert_eq!(
            answers(&response),
            vec![(
                "elsewhere.example.".to_string(),
                RData::A(Ipv4Addr::new(192, 0, 2, 99))
            )]
        );

        let response = client
            .query(name("outside.example."), DNSClass::IN, RecordType::A)
            .await
            .unwrap();
        assert_eq!(
            answers(&response),
            vec![
                (
                    "outside.example.".to_string(),
                    RData::CNAME(name("elsewhere.example."))
                ),
                (
                    "elsewhere.example.".to_string(),
                    RData::A(Ipv4Addr::new(192, 0, 2, 99))
                ),
            ]
        );
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn empty_escalation_is_nxdomain() {
        let (upstream, hits) = fake_upstream(None).await;
        let server = start(config(&[upstream])).await;
        let mut client = client(server).await;

        let response = client
            .query(name("elsewhere.example."), DNSClass::IN, RecordType::A)
            .await
            .unwrap();
        assert_eq!(response.response_code(), ResponseCode::NXDomain);
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn other_opcodes_are_not_implemented() {
        let server = start(config(&[])).await;

        let mut request = Message::new();
        request
            .set_id(4242)
            .set_message_type(MessageType::Query)
            .set_op_code(OpCode::Notify)
            .add_query(Question::query(name("a.example."), RecordType::SOA));
        let socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        socket
            .send_to(&request.to_bytes().unwrap(), server)
            .await
            .unwrap();

        let mut buf = [0u8; 512];
        let (len, _) = tokio::time::timeout(Duration::from_secs(5), socket.recv_from(&mut buf))
            .await
            .unwrap()
            .unwrap();
        let response = Message::from_vec(&buf[..len]).unwrap();
        assert_eq!(response.id(), 4242);
        assert_eq!(response.response_code(), ResponseCode::NotImp);
    }
}
